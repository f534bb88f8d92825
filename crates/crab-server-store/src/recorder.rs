// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Recording job starts and finishes.

use serde::{Deserialize, Serialize};
use tracing::instrument;

use crab_core::{
	classify_status, combined_output, CrabStatus, FinishId, JobId, JobOutput, OutputKey,
};

use crate::engine::CrabEngine;
use crate::error::Result;
use crate::resolver::{resolve_job, Sighting};

/// A job execution as reported by the client wrapper.
#[derive(Debug, Clone, Copy)]
pub struct Report<'a> {
	pub host: &'a str,
	pub user: &'a str,
	pub crabid: Option<&'a str>,
	pub command: &'a str,
}

impl<'a> Report<'a> {
	fn sighting(&self) -> Sighting<'a> {
		Sighting {
			host: self.host,
			user: self.user,
			crabid: self.crabid,
			command: self.command,
			time: None,
			timezone: None,
		}
	}
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StartReceipt {
	pub job_id: JobId,
	/// The job is configured not to run.
	pub inhibit: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", content = "reason", rename_all = "snake_case")]
pub enum OutputOutcome {
	/// There was no output to keep.
	NotCaptured,
	Written,
	/// The finish was recorded but its output could not be stored.
	Failed(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FinishReceipt {
	pub job_id: JobId,
	pub finish_id: FinishId,
	/// Status after classification against the job's output patterns.
	pub status: CrabStatus,
	pub output: OutputOutcome,
}

impl CrabEngine {
	#[instrument(skip(self, report), fields(host = %report.host, user = %report.user, crabid = ?report.crabid))]
	pub async fn report_start(&self, report: &Report<'_>) -> Result<StartReceipt> {
		let mut tx = self.store.begin().await?;
		let resolved = resolve_job(&mut *tx, &report.sighting()).await?;
		tx.log_start(resolved.id, report.command).await?;
		let inhibit = tx
			.get_job_config(resolved.id)
			.await?
			.is_some_and(|config| config.inhibit);
		tx.commit().await?;

		tracing::debug!(job_id = %resolved.id, inhibit, "job started");
		Ok(StartReceipt {
			job_id: resolved.id,
			inhibit,
		})
	}

	/// Record a finish and store its output.
	///
	/// The finish is committed before output is written. A failure to write
	/// output does not fail the call; it is reported in
	/// [`FinishReceipt::output`].
	#[instrument(skip(self, report, stdout, stderr), fields(host = %report.host, user = %report.user, crabid = ?report.crabid, status = %status))]
	pub async fn report_finish(
		&self,
		report: &Report<'_>,
		status: CrabStatus,
		stdout: Option<&str>,
		stderr: Option<&str>,
	) -> Result<FinishReceipt> {
		let mut tx = self.store.begin().await?;
		let resolved = resolve_job(&mut *tx, &report.sighting()).await?;

		let status = match tx.get_job_config(resolved.id).await? {
			Some(config) => classify_status(status, &config, &combined_output(stdout, stderr)),
			None => status,
		};

		let finish_id = tx.log_finish(resolved.id, report.command, status).await?;
		tx.commit().await?;

		tracing::debug!(job_id = %resolved.id, %finish_id, %status, "job finished");

		let output = self
			.store_output(report, resolved.id, finish_id, stdout, stderr)
			.await;

		Ok(FinishReceipt {
			job_id: resolved.id,
			finish_id,
			status,
			output,
		})
	}

	async fn store_output(
		&self,
		report: &Report<'_>,
		job_id: JobId,
		finish_id: FinishId,
		stdout: Option<&str>,
		stderr: Option<&str>,
	) -> OutputOutcome {
		let has_output = [stdout, stderr].iter().flatten().any(|s| !s.is_empty());
		if !has_output {
			return OutputOutcome::NotCaptured;
		}

		match self
			.write_output(report, job_id, finish_id, stdout, stderr)
			.await
		{
			Ok(()) => OutputOutcome::Written,
			Err(e) => {
				tracing::warn!(%job_id, %finish_id, error = %e, "failed to store job output");
				OutputOutcome::Failed(e.to_string())
			}
		}
	}

	async fn write_output(
		&self,
		report: &Report<'_>,
		job_id: JobId,
		finish_id: FinishId,
		stdout: Option<&str>,
		stderr: Option<&str>,
	) -> Result<()> {
		// Output is filed under the crabid, so look it up when the report
		// left it out.
		let crabid = match report.crabid {
			Some(crabid) => Some(crabid.to_string()),
			None => {
				let mut tx = self.store.begin().await?;
				tx.get_job(job_id).await?.and_then(|job| job.crabid)
			}
		};

		let key = OutputKey {
			finish_id,
			host: report.host.to_string(),
			user: report.user.to_string(),
			job_id,
			crabid,
		};
		let Some(output) = JobOutput::from_streams(key, stdout, stderr) else {
			return Ok(());
		};

		match &self.output_store {
			Some(output_store) => output_store.write_job_output(&output).await,
			None => {
				let mut tx = self.store.begin().await?;
				tx.write_job_output(&output).await?;
				tx.commit().await
			}
		}
	}
}
