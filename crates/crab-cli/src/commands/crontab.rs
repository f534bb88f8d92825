// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use std::path::PathBuf;

use colored::Colorize;

use super::{read_input, ScopeArgs};
use crate::context::Context;

#[derive(Debug, Clone, clap::Args)]
pub struct ImportArgs {
	#[command(flatten)]
	pub scope: ScopeArgs,

	/// Timezone for jobs not covered by a CRON_TZ line
	#[arg(long)]
	pub timezone: Option<String>,

	/// Import lines addressed to other hosts or users as well
	#[arg(long)]
	pub no_filter: bool,

	/// Crontab file to read (standard input if omitted)
	pub file: Option<PathBuf>,
}

#[derive(Debug, Clone, clap::Args)]
pub struct ExportArgs {
	#[command(flatten)]
	pub scope: ScopeArgs,
}

pub async fn import(ctx: &Context, args: ImportArgs) -> anyhow::Result<()> {
	let crontab = read_input(args.file.as_deref()).await?;
	let allow_filter = ctx.config.engine.allow_filter && !args.no_filter;

	let warnings = ctx
		.engine
		.sync_crontab(
			&args.scope.host,
			&args.scope.user,
			&crontab,
			args.timezone.as_deref(),
			allow_filter,
		)
		.await?;

	if ctx.json {
		return ctx.print_json(&warnings);
	}
	for warning in &warnings {
		eprintln!("{} {}", "warning:".yellow(), warning);
	}
	Ok(())
}

pub async fn export(ctx: &Context, args: ExportArgs) -> anyhow::Result<()> {
	let crontab = ctx
		.engine
		.get_crontab(&args.scope.host, &args.scope.user)
		.await?;
	print!("{crontab}");
	Ok(())
}

pub async fn raw(ctx: &Context, args: ExportArgs) -> anyhow::Result<()> {
	match ctx
		.engine
		.get_raw_crontab(&args.scope.host, &args.scope.user)
		.await?
	{
		Some(crontab) => print!("{crontab}"),
		None => anyhow::bail!(
			"no crontab imported for {}@{}",
			args.scope.user,
			args.scope.host
		),
	}
	Ok(())
}
