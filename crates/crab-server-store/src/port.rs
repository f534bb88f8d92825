// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Persistence interface used by the engine.
//!
//! All access goes through a [`StoreTransaction`], which holds the store's
//! exclusive lock from [`JobStore::begin`] until it is committed or dropped.
//! Dropping a transaction without committing rolls it back, so an early
//! return on error leaves the store as it was and releases the lock.

use async_trait::async_trait;

use crab_core::{
	CrabStatus, FailEvent, FinishEvent, FinishId, Job, JobConfig, JobFilter, JobId, JobOutput,
	JobUpdate, NewJob, OutputKey, StartEvent,
};

use crate::error::Result;

/// A store of jobs, events and output.
#[async_trait]
pub trait JobStore: Send + Sync {
	/// Acquire the store lock and open a transaction.
	async fn begin(&self) -> Result<Box<dyn StoreTransaction>>;
}

/// An open, exclusive transaction on a [`JobStore`].
#[async_trait]
pub trait StoreTransaction: Send {
	// Jobs
	/// Jobs matching the filter, in ascending id order.
	async fn get_jobs(&mut self, filter: &JobFilter) -> Result<Vec<Job>>;
	async fn get_job(&mut self, id: JobId) -> Result<Option<Job>>;
	/// Returns the new job's id, or `None` if the store could not report one.
	async fn insert_job(&mut self, job: &NewJob) -> Result<Option<JobId>>;
	/// Apply the update and clear the job's deletion marker.
	async fn update_job(&mut self, id: JobId, update: &JobUpdate) -> Result<()>;
	/// Set the deletion marker unless it is already set.
	async fn delete_job(&mut self, id: JobId) -> Result<()>;

	// Configuration
	async fn get_job_config(&mut self, id: JobId) -> Result<Option<JobConfig>>;
	async fn write_job_config(&mut self, id: JobId, config: &JobConfig) -> Result<()>;

	// Events
	async fn log_start(&mut self, id: JobId, command: &str) -> Result<()>;
	async fn get_job_starts(&mut self, id: JobId, limit: u32) -> Result<Vec<StartEvent>>;
	async fn log_finish(&mut self, id: JobId, command: &str, status: CrabStatus)
		-> Result<FinishId>;
	async fn get_job_finishes(&mut self, id: JobId, limit: u32) -> Result<Vec<FinishEvent>>;
	/// Most recent unsuccessful finishes, newest first.
	async fn get_fail_events(&mut self, limit: u32) -> Result<Vec<FailEvent>>;

	// Output and raw crontabs, used when no separate output store is configured
	async fn write_job_output(&mut self, output: &JobOutput) -> Result<()>;
	async fn get_job_output(&mut self, key: &OutputKey) -> Result<Option<(String, String)>>;
	async fn write_raw_crontab(&mut self, host: &str, user: &str, crontab: &str) -> Result<()>;
	async fn get_raw_crontab(&mut self, host: &str, user: &str) -> Result<Option<String>>;

	/// Make the transaction's changes permanent and release the lock.
	async fn commit(self: Box<Self>) -> Result<()>;
}
