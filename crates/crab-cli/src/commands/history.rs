// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use colored::Colorize;
use crab_core::{FinishId, JobId};
use serde::Serialize;

use super::ScopeArgs;
use crate::context::Context;

#[derive(Debug, Clone, clap::Args)]
pub struct FailuresArgs {
	/// Number of events to show (defaults to engine.fail_events_limit)
	#[arg(short, long)]
	pub limit: Option<u32>,
}

#[derive(Debug, Clone, clap::Args)]
pub struct OutputArgs {
	pub finish_id: FinishId,

	/// Job the finish belongs to
	#[arg(long)]
	pub job: JobId,

	#[command(flatten)]
	pub scope: ScopeArgs,

	#[arg(long)]
	pub crabid: Option<String>,
}

pub async fn failures(ctx: &Context, args: FailuresArgs) -> anyhow::Result<()> {
	let limit = args.limit.unwrap_or(ctx.config.engine.fail_events_limit);
	let events = ctx.engine.get_fail_events(limit).await?;

	if ctx.json {
		return ctx.print_json(&events);
	}
	for event in &events {
		let status = if event.status.is_error() {
			event.status.to_string().red()
		} else {
			event.status.to_string().yellow()
		};
		println!(
			"{} {} {}@{} {} {}",
			event.datetime.format("%Y-%m-%d %H:%M:%S"),
			status,
			event.user,
			event.host,
			event.crabid.as_deref().unwrap_or("-"),
			event.command
		);
	}
	Ok(())
}

#[derive(Serialize)]
struct Output {
	stdout: String,
	stderr: String,
}

pub async fn output(ctx: &Context, args: OutputArgs) -> anyhow::Result<()> {
	let (stdout, stderr) = ctx
		.engine
		.get_job_output(
			args.finish_id,
			&args.scope.host,
			&args.scope.user,
			args.job,
			args.crabid.as_deref(),
		)
		.await?;

	if ctx.json {
		return ctx.print_json(&Output { stdout, stderr });
	}
	print!("{stdout}");
	eprint!("{stderr}");
	Ok(())
}
