// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use std::path::PathBuf;

use colored::Colorize;
use crab_core::CrabStatus;
use crab_server_store::{OutputOutcome, Report};

use super::ScopeArgs;
use crate::context::Context;

#[derive(Debug, Clone, clap::Args)]
pub struct StartArgs {
	#[command(flatten)]
	pub scope: ScopeArgs,

	/// Stable identifier of the job
	#[arg(long, env = "CRABID")]
	pub crabid: Option<String>,

	/// Command line of the job
	pub command: String,
}

#[derive(Debug, Clone, clap::Args)]
pub struct FinishArgs {
	#[command(flatten)]
	pub scope: ScopeArgs,

	/// Stable identifier of the job
	#[arg(long, env = "CRABID")]
	pub crabid: Option<String>,

	/// Result of the run, by name (e.g. `fail`) or numeric code
	#[arg(long, default_value = "success")]
	pub status: CrabStatus,

	/// File holding the job's standard output
	#[arg(long)]
	pub stdout_file: Option<PathBuf>,

	/// File holding the job's standard error
	#[arg(long)]
	pub stderr_file: Option<PathBuf>,

	/// Command line of the job
	pub command: String,
}

impl StartArgs {
	fn report(&self) -> Report<'_> {
		Report {
			host: &self.scope.host,
			user: &self.scope.user,
			crabid: self.crabid.as_deref(),
			command: &self.command,
		}
	}
}

impl FinishArgs {
	fn report(&self) -> Report<'_> {
		Report {
			host: &self.scope.host,
			user: &self.scope.user,
			crabid: self.crabid.as_deref(),
			command: &self.command,
		}
	}
}

pub async fn start(ctx: &Context, args: StartArgs) -> anyhow::Result<()> {
	let receipt = ctx.engine.report_start(&args.report()).await?;

	if ctx.json {
		return ctx.print_json(&receipt);
	}
	if receipt.inhibit {
		println!("job {} is inhibited", receipt.job_id);
	} else {
		println!("job {} started", receipt.job_id);
	}
	Ok(())
}

pub async fn finish(ctx: &Context, args: FinishArgs) -> anyhow::Result<()> {
	let stdout = read_optional(args.stdout_file.as_ref()).await?;
	let stderr = read_optional(args.stderr_file.as_ref()).await?;

	let receipt = ctx
		.engine
		.report_finish(
			&args.report(),
			args.status,
			stdout.as_deref(),
			stderr.as_deref(),
		)
		.await?;

	if ctx.json {
		return ctx.print_json(&receipt);
	}
	println!(
		"job {} finish {} recorded as {}",
		receipt.job_id, receipt.finish_id, receipt.status
	);
	if let OutputOutcome::Failed(reason) = &receipt.output {
		eprintln!("{} output not stored: {}", "warning:".yellow(), reason);
	}
	Ok(())
}

async fn read_optional(path: Option<&PathBuf>) -> anyhow::Result<Option<String>> {
	match path {
		Some(path) => Ok(Some(tokio::fs::read_to_string(path).await?)),
		None => Ok(None),
	}
}
