// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use colored::Colorize;
use crab_core::{next_run, Job, JobConfig, JobFilter, JobId};
use serde::Serialize;

use crate::context::Context;

#[derive(Debug, Clone, clap::Args)]
pub struct JobsArgs {
	#[arg(long)]
	pub host: Option<String>,

	#[arg(long)]
	pub user: Option<String>,

	#[arg(long)]
	pub crabid: Option<String>,

	/// Include deleted jobs
	#[arg(long)]
	pub deleted: bool,
}

#[derive(Debug, Clone, clap::Args)]
pub struct JobIdArgs {
	pub job_id: JobId,
}

#[derive(Debug, Clone, clap::Args)]
pub struct InfoArgs {
	pub job_id: JobId,

	/// Number of recent finishes to show
	#[arg(short, long, default_value = "10")]
	pub limit: u32,
}

#[derive(Debug, Clone, clap::Args)]
pub struct ConfigureArgs {
	pub job_id: JobId,

	/// Tell the client not to run the job
	#[arg(long)]
	pub inhibit: Option<bool>,

	/// Output must match this pattern for a run to succeed
	#[arg(long)]
	pub success_pattern: Option<String>,

	/// Output matching this pattern marks a run as a warning
	#[arg(long)]
	pub warning_pattern: Option<String>,

	/// Output matching this pattern marks a run as failed
	#[arg(long)]
	pub fail_pattern: Option<String>,

	/// Minutes a job may start late before it counts as missed
	#[arg(long)]
	pub graceperiod: Option<u32>,

	/// Minutes a job may run before it counts as timed out
	#[arg(long)]
	pub timeout: Option<u32>,

	#[arg(long)]
	pub note: Option<String>,
}

pub async fn list(ctx: &Context, args: JobsArgs) -> anyhow::Result<()> {
	let filter = JobFilter {
		host: args.host,
		user: args.user,
		include_deleted: args.deleted,
		crabid: args.crabid,
		..Default::default()
	};
	let jobs = ctx.engine.get_jobs(&filter).await?;

	if ctx.json {
		return ctx.print_json(&jobs);
	}
	for job in &jobs {
		println!("{}", job_line(job));
	}
	Ok(())
}

#[derive(Serialize)]
struct JobInfo {
	job: Job,
	config: Option<JobConfig>,
	last_start: Option<crab_core::StartEvent>,
	finishes: Vec<crab_core::FinishEvent>,
}

pub async fn info(ctx: &Context, args: InfoArgs) -> anyhow::Result<()> {
	let job = ctx.engine.get_job_info(args.job_id).await?;
	let config = ctx.engine.get_job_config(args.job_id).await?;
	let last_start = ctx.engine.get_job_starts(args.job_id, 1).await?.pop();
	let finishes = ctx.engine.get_job_finishes(args.job_id, args.limit).await?;

	if ctx.json {
		return ctx.print_json(&JobInfo {
			job,
			config,
			last_start,
			finishes,
		});
	}

	println!("{}", job_line(&job));
	if let Some(time) = &job.time {
		match next_run(time, job.timezone.as_deref(), chrono::Utc::now()) {
			Ok(Some(next)) => println!("  next run: {}", next.format("%Y-%m-%d %H:%M:%S UTC")),
			Ok(None) => {}
			Err(e) => println!("  next run: {}", e.to_string().dimmed()),
		}
	}
	if let Some(start) = &last_start {
		println!("  last start: {}", start.datetime.format("%Y-%m-%d %H:%M:%S"));
	}
	if let Some(config) = &config {
		if config.inhibit {
			println!("  {}", "inhibited".yellow());
		}
		if let Some(note) = &config.note {
			println!("  note: {note}");
		}
	}
	for finish in &finishes {
		println!(
			"  {} {} {}",
			finish.finish_id,
			finish.datetime.format("%Y-%m-%d %H:%M:%S"),
			finish.status
		);
	}
	Ok(())
}

pub async fn configure(ctx: &Context, args: ConfigureArgs) -> anyhow::Result<()> {
	let mut config = ctx
		.engine
		.get_job_config(args.job_id)
		.await?
		.unwrap_or_default();

	if let Some(inhibit) = args.inhibit {
		config.inhibit = inhibit;
	}
	// An empty value clears the setting.
	set_text(&mut config.success_pattern, args.success_pattern);
	set_text(&mut config.warning_pattern, args.warning_pattern);
	set_text(&mut config.fail_pattern, args.fail_pattern);
	set_text(&mut config.note, args.note);
	if args.graceperiod.is_some() {
		config.graceperiod = args.graceperiod;
	}
	if args.timeout.is_some() {
		config.timeout = args.timeout;
	}

	ctx.engine.write_job_config(args.job_id, &config).await?;
	if ctx.json {
		return ctx.print_json(&config);
	}
	Ok(())
}

pub async fn delete(ctx: &Context, args: JobIdArgs) -> anyhow::Result<()> {
	ctx.engine.delete_job(args.job_id).await?;
	Ok(())
}

pub async fn undelete(ctx: &Context, args: JobIdArgs) -> anyhow::Result<()> {
	ctx.engine.undelete_job(args.job_id).await?;
	Ok(())
}

fn set_text(target: &mut Option<String>, value: Option<String>) {
	if let Some(value) = value {
		*target = (!value.is_empty()).then_some(value);
	}
}

fn job_line(job: &Job) -> String {
	let id = job.id.to_string();
	let crabid = job.crabid.as_deref().unwrap_or("-");
	let time = job.time.as_deref().unwrap_or("-");
	let line = format!(
		"{:>5} {}@{} {} [{}] {}",
		id, job.user, job.host, crabid, time, job.command
	);
	if job.is_deleted() {
		line.dimmed().to_string()
	} else {
		line
	}
}
