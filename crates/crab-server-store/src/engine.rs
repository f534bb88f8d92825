// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! The engine ties the job store, the resolver and the optional output
//! store together. Crontab sync lives in [`crate::sync`] and execution
//! reports in [`crate::recorder`]; this module holds construction, the
//! query surface and administrative changes.

use std::sync::Arc;

use tracing::instrument;

use crab_core::{
	write_crontab, FailEvent, FinishEvent, FinishId, Job, JobConfig, JobFilter, JobId, JobUpdate,
	OutputKey, StartEvent,
};

use crate::error::{Result, StoreError};
use crate::output_store::OutputStore;
use crate::port::{JobStore, StoreTransaction};
use crate::resolver::{resolve_job, Sighting};

#[derive(Clone)]
pub struct CrabEngine {
	pub(crate) store: Arc<dyn JobStore>,
	pub(crate) output_store: Option<Arc<dyn OutputStore>>,
}

impl CrabEngine {
	pub fn new(store: Arc<dyn JobStore>) -> Self {
		Self {
			store,
			output_store: None,
		}
	}

	/// Send job output (and raw crontabs, if supported) to a separate store.
	pub fn with_output_store(mut self, output_store: Arc<dyn OutputStore>) -> Self {
		self.output_store = Some(output_store);
		self
	}

	pub fn has_output_store(&self) -> bool {
		self.output_store.is_some()
	}

	/// Resolve a job in its own transaction and return its id.
	#[instrument(skip(self, sighting), fields(host = %sighting.host, user = %sighting.user, crabid = ?sighting.crabid))]
	pub async fn check_job(&self, sighting: &Sighting<'_>) -> Result<JobId> {
		let mut tx = self.store.begin().await?;
		let resolved = resolve_job(&mut *tx, sighting).await?;
		tx.commit().await?;
		Ok(resolved.id)
	}

	#[instrument(skip(self))]
	pub async fn get_jobs(&self, filter: &JobFilter) -> Result<Vec<Job>> {
		let mut tx = self.store.begin().await?;
		tx.get_jobs(filter).await
	}

	#[instrument(skip(self))]
	pub async fn get_job_info(&self, id: JobId) -> Result<Job> {
		let mut tx = self.store.begin().await?;
		require_job(&mut *tx, id).await
	}

	#[instrument(skip(self))]
	pub async fn get_job_config(&self, id: JobId) -> Result<Option<JobConfig>> {
		let mut tx = self.store.begin().await?;
		tx.get_job_config(id).await
	}

	#[instrument(skip(self, config))]
	pub async fn write_job_config(&self, id: JobId, config: &JobConfig) -> Result<()> {
		let mut tx = self.store.begin().await?;
		require_job(&mut *tx, id).await?;
		tx.write_job_config(id, config).await?;
		tx.commit().await
	}

	#[instrument(skip(self))]
	pub async fn get_job_starts(&self, id: JobId, limit: u32) -> Result<Vec<StartEvent>> {
		let mut tx = self.store.begin().await?;
		tx.get_job_starts(id, limit).await
	}

	#[instrument(skip(self))]
	pub async fn get_job_finishes(&self, id: JobId, limit: u32) -> Result<Vec<FinishEvent>> {
		let mut tx = self.store.begin().await?;
		tx.get_job_finishes(id, limit).await
	}

	/// Most recent unsuccessful finishes across all jobs, newest first.
	#[instrument(skip(self))]
	pub async fn get_fail_events(&self, limit: u32) -> Result<Vec<FailEvent>> {
		let mut tx = self.store.begin().await?;
		tx.get_fail_events(limit).await
	}

	/// Fetch the output of one finish.
	///
	/// The crabid used to locate the output is taken from the stored job
	/// when the job exists, since the caller's copy may be stale or absent.
	#[instrument(skip(self, host, user, crabid))]
	pub async fn get_job_output(
		&self,
		finish_id: FinishId,
		host: &str,
		user: &str,
		job_id: JobId,
		crabid: Option<&str>,
	) -> Result<(String, String)> {
		let mut tx = self.store.begin().await?;
		let stored_crabid = match tx.get_job(job_id).await? {
			Some(job) => job.crabid,
			None => crabid.map(String::from),
		};
		let key = OutputKey {
			finish_id,
			host: host.to_string(),
			user: user.to_string(),
			job_id,
			crabid: stored_crabid,
		};

		let output = match &self.output_store {
			Some(output_store) => {
				drop(tx);
				output_store.get_job_output(&key).await?
			}
			None => tx.get_job_output(&key).await?,
		};

		output.ok_or_else(|| StoreError::NotFound(format!("output for finish {finish_id}")))
	}

	/// Render the active jobs of one host and user as a crontab.
	#[instrument(skip(self))]
	pub async fn get_crontab(&self, host: &str, user: &str) -> Result<String> {
		let jobs = self.get_jobs(&JobFilter::scope(host, user)).await?;
		Ok(write_crontab(&jobs))
	}

	/// The crontab text as last imported.
	#[instrument(skip(self))]
	pub async fn get_raw_crontab(&self, host: &str, user: &str) -> Result<Option<String>> {
		if let Some(raw) = self.output_store.as_deref().and_then(|s| s.raw_crontabs()) {
			return raw.get_raw_crontab(host, user).await;
		}
		let mut tx = self.store.begin().await?;
		tx.get_raw_crontab(host, user).await
	}

	#[instrument(skip(self))]
	pub async fn delete_job(&self, id: JobId) -> Result<()> {
		let mut tx = self.store.begin().await?;
		require_job(&mut *tx, id).await?;
		tx.delete_job(id).await?;
		tx.commit().await?;
		tracing::info!(job_id = %id, "job deleted");
		Ok(())
	}

	#[instrument(skip(self))]
	pub async fn undelete_job(&self, id: JobId) -> Result<()> {
		self.update_job(id, &JobUpdate::default()).await
	}

	/// Apply an update. Any update also clears the deletion marker.
	#[instrument(skip(self, update))]
	pub async fn update_job(&self, id: JobId, update: &JobUpdate) -> Result<()> {
		let mut tx = self.store.begin().await?;
		require_job(&mut *tx, id).await?;
		tx.update_job(id, update).await?;
		tx.commit().await?;
		if update.is_empty() {
			tracing::info!(job_id = %id, "job undeleted");
		} else {
			tracing::info!(job_id = %id, "job updated");
		}
		Ok(())
	}
}

pub(crate) async fn require_job(tx: &mut dyn StoreTransaction, id: JobId) -> Result<Job> {
	tx.get_job(id)
		.await?
		.ok_or_else(|| StoreError::NotFound(format!("job {id}")))
}
