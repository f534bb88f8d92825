// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Crab command line: crontab import and export, job reports and queries.

use std::ffi::OsString;
use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod commands;
mod context;

use commands::crontab::{ExportArgs, ImportArgs};
use commands::history::{FailuresArgs, OutputArgs};
use commands::jobs::{ConfigureArgs, InfoArgs, JobIdArgs, JobsArgs};
use commands::report::{FinishArgs, StartArgs};
use context::Context;

/// Crab - cron job history tracking.
#[derive(Parser, Debug)]
#[command(name = "crab", about = "Cron job history tracking", version)]
struct Args {
	/// Configuration file (default: /etc/crab/server.toml)
	#[arg(long, global = true)]
	config: Option<PathBuf>,

	/// Print results as JSON
	#[arg(long, global = true)]
	json: bool,

	#[command(subcommand)]
	command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
	/// Import a user's crontab, marking jobs no longer present as deleted
	ImportCrontab(ImportArgs),
	/// Write the stored jobs of a user as a crontab
	ExportCrontab(ExportArgs),
	/// Show the crontab text as last imported
	RawCrontab(ExportArgs),
	/// Record that a job started
	Start(StartArgs),
	/// Record that a job finished
	Finish(FinishArgs),
	/// List jobs
	Jobs(JobsArgs),
	/// Show a job with its configuration and recent finishes
	Info(InfoArgs),
	/// Change a job's configuration
	Configure(ConfigureArgs),
	/// Show recent failed and warning finishes
	Failures(FailuresArgs),
	/// Show the output of a finish
	Output(OutputArgs),
	/// Mark a job as deleted
	Delete(JobIdArgs),
	/// Clear a job's deleted mark
	Undelete(JobIdArgs),
}

/// Parse arguments after loading `.env`, so it can supply the
/// `env`-backed defaults such as `CRABCLIENTHOSTNAME`.
fn parse_args<I, T>(env_file: Option<&Path>, argv: I) -> Result<Args, clap::Error>
where
	I: IntoIterator<Item = T>,
	T: Into<OsString> + Clone,
{
	if let Some(path) = env_file {
		dotenvy::from_path(path).ok();
	} else {
		dotenvy::dotenv().ok();
	}
	Args::try_parse_from(argv)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
	let args = parse_args(None, std::env::args_os()).unwrap_or_else(|e| e.exit());

	let config = match &args.config {
		Some(path) => crab_server_config::load_config_with_file(path)?,
		None => crab_server_config::load_config()?,
	};

	tracing_subscriber::registry()
		.with(
			tracing_subscriber::EnvFilter::try_from_default_env()
				.unwrap_or_else(|_| config.logging.level.clone().into()),
		)
		.with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
		.init();

	let ctx = Context::open(config, args.json).await?;

	match args.command {
		Command::ImportCrontab(a) => commands::crontab::import(&ctx, a).await,
		Command::ExportCrontab(a) => commands::crontab::export(&ctx, a).await,
		Command::RawCrontab(a) => commands::crontab::raw(&ctx, a).await,
		Command::Start(a) => commands::report::start(&ctx, a).await,
		Command::Finish(a) => commands::report::finish(&ctx, a).await,
		Command::Jobs(a) => commands::jobs::list(&ctx, a).await,
		Command::Info(a) => commands::jobs::info(&ctx, a).await,
		Command::Configure(a) => commands::jobs::configure(&ctx, a).await,
		Command::Failures(a) => commands::history::failures(&ctx, a).await,
		Command::Output(a) => commands::history::output(&ctx, a).await,
		Command::Delete(a) => commands::jobs::delete(&ctx, a).await,
		Command::Undelete(a) => commands::jobs::undelete(&ctx, a).await,
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use clap::CommandFactory;
	use crab_core::{CrabStatus, JobId};

	#[test]
	fn test_cli_definition() {
		Args::command().debug_assert();
	}

	#[test]
	fn test_parse_finish() {
		let args = Args::try_parse_from([
			"crab",
			"finish",
			"--host",
			"web1",
			"--user",
			"deploy",
			"--crabid",
			"backup",
			"--status",
			"fail",
			"backup.sh --full",
		])
		.unwrap();

		match args.command {
			Command::Finish(finish) => {
				assert_eq!(finish.scope.host, "web1");
				assert_eq!(finish.crabid.as_deref(), Some("backup"));
				assert_eq!(finish.status, CrabStatus::Fail);
				assert_eq!(finish.command, "backup.sh --full");
			}
			other => panic!("unexpected command: {other:?}"),
		}
	}

	#[test]
	fn test_parse_numeric_status() {
		let args = Args::try_parse_from([
			"crab", "finish", "--host", "h", "--user", "u", "--status", "1", "job",
		])
		.unwrap();
		match args.command {
			Command::Finish(finish) => assert_eq!(finish.status, CrabStatus::Fail),
			other => panic!("unexpected command: {other:?}"),
		}
	}

	#[test]
	fn test_parse_global_flags_after_subcommand() {
		let args = Args::try_parse_from(["crab", "delete", "42", "--json"]).unwrap();
		assert!(args.json);
		match args.command {
			Command::Delete(delete) => assert_eq!(delete.job_id, JobId(42)),
			other => panic!("unexpected command: {other:?}"),
		}
	}

	#[test]
	fn test_dotenv_supplies_scope_defaults() {
		let dir = tempfile::tempdir().unwrap();
		let env_file = dir.path().join(".env");
		std::fs::write(
			&env_file,
			"CRABCLIENTHOSTNAME=dotenv-host\nCRABUSERNAME=dotenv-user\n",
		)
		.unwrap();

		let args = parse_args(Some(&env_file), ["crab", "start", "nightly.sh"]).unwrap();
		match args.command {
			Command::Start(start) => {
				assert_eq!(start.scope.host, "dotenv-host");
				assert_eq!(start.scope.user, "dotenv-user");
				assert_eq!(start.command, "nightly.sh");
			}
			other => panic!("unexpected command: {other:?}"),
		}
	}

	#[test]
	fn test_rejects_bad_job_id() {
		assert!(Args::try_parse_from(["crab", "undelete", "abc"]).is_err());
	}
}
