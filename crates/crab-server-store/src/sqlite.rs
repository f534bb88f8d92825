// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! SQLite implementation of the job store.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use sqlx::{Sqlite, SqlitePool, Transaction};
use tokio::sync::{Mutex, OwnedMutexGuard};
use tracing::instrument;

use crab_core::{
	CrabStatus, FailEvent, FinishEvent, FinishId, Job, JobConfig, JobFilter, JobId, JobOutput,
	JobUpdate, NewJob, OutputKey, StartEvent,
};

use crate::error::{Result, StoreError};
use crate::port::{JobStore, StoreTransaction};

/// Default bound on waiting for the store lock.
pub const DEFAULT_LOCK_TIMEOUT: Duration = Duration::from_secs(30);

/// Tuning for [`SqliteJobStore`].
#[derive(Debug, Clone)]
pub struct StoreOptions {
	/// How long [`JobStore::begin`] waits for another operation to finish.
	pub lock_timeout: Duration,
}

impl Default for StoreOptions {
	fn default() -> Self {
		Self {
			lock_timeout: DEFAULT_LOCK_TIMEOUT,
		}
	}
}

/// Job store backed by a SQLite database.
///
/// Operations are serialized by a lock owned by this value (and shared by
/// its clones), so run one store per database file.
#[derive(Clone)]
pub struct SqliteJobStore {
	pool: SqlitePool,
	lock: Arc<Mutex<()>>,
	lock_timeout: Duration,
}

impl SqliteJobStore {
	pub fn new(pool: SqlitePool) -> Self {
		Self::with_options(pool, StoreOptions::default())
	}

	pub fn with_options(pool: SqlitePool, options: StoreOptions) -> Self {
		Self {
			pool,
			lock: Arc::new(Mutex::new(())),
			lock_timeout: options.lock_timeout,
		}
	}

	pub fn pool(&self) -> &SqlitePool {
		&self.pool
	}
}

#[async_trait]
impl JobStore for SqliteJobStore {
	#[instrument(skip(self))]
	async fn begin(&self) -> Result<Box<dyn StoreTransaction>> {
		let lock = tokio::time::timeout(self.lock_timeout, Arc::clone(&self.lock).lock_owned())
			.await
			.map_err(|_| StoreError::LockTimeout(self.lock_timeout))?;

		// Take the write lock up front so other processes wait on busy_timeout
		// instead of failing when a read snapshot is upgraded.
		let tx = self.pool.begin_with("BEGIN IMMEDIATE").await?;

		Ok(Box::new(SqliteTransaction { tx, _lock: lock }))
	}
}

/// Transaction on a [`SqliteJobStore`]. Holds the store lock until dropped.
pub struct SqliteTransaction {
	// Declared first so the rollback is queued before the lock is released.
	tx: Transaction<'static, Sqlite>,
	_lock: OwnedMutexGuard<()>,
}

#[async_trait]
impl StoreTransaction for SqliteTransaction {
	#[instrument(skip(self, filter), fields(host = ?filter.host, user = ?filter.user))]
	async fn get_jobs(&mut self, filter: &JobFilter) -> Result<Vec<Job>> {
		let rows = sqlx::query_as::<_, JobRow>(
			r#"
			SELECT id, host, user, crabid, command, time, timezone, installed, deleted
			FROM crab_jobs
			WHERE (?1 IS NULL OR host = ?1)
			  AND (?2 IS NULL OR user = ?2)
			  AND (?3 OR deleted IS NULL)
			  AND (?4 IS NULL OR crabid = ?4)
			  AND (?5 IS NULL OR command = ?5)
			  AND (NOT ?6 OR crabid IS NULL)
			ORDER BY id ASC
			"#,
		)
		.bind(filter.host.as_deref())
		.bind(filter.user.as_deref())
		.bind(filter.include_deleted)
		.bind(filter.crabid.as_deref())
		.bind(filter.command.as_deref())
		.bind(filter.without_crabid)
		.fetch_all(&mut *self.tx)
		.await?;

		rows.into_iter().map(TryInto::try_into).collect()
	}

	#[instrument(skip(self), fields(job_id = %id))]
	async fn get_job(&mut self, id: JobId) -> Result<Option<Job>> {
		let row = sqlx::query_as::<_, JobRow>(
			r#"
			SELECT id, host, user, crabid, command, time, timezone, installed, deleted
			FROM crab_jobs
			WHERE id = ?
			"#,
		)
		.bind(id.0)
		.fetch_optional(&mut *self.tx)
		.await?;

		row.map(TryInto::try_into).transpose()
	}

	#[instrument(skip(self, job), fields(host = %job.host, user = %job.user, crabid = ?job.crabid))]
	async fn insert_job(&mut self, job: &NewJob) -> Result<Option<JobId>> {
		let result = sqlx::query(
			r#"
			INSERT INTO crab_jobs (host, user, crabid, command, time, timezone, installed)
			VALUES (?, ?, ?, ?, ?, ?, ?)
			"#,
		)
		.bind(&job.host)
		.bind(&job.user)
		.bind(&job.crabid)
		.bind(&job.command)
		.bind(&job.time)
		.bind(&job.timezone)
		.bind(now_text())
		.execute(&mut *self.tx)
		.await?;

		let rowid = result.last_insert_rowid();
		Ok((result.rows_affected() == 1 && rowid > 0).then_some(JobId(rowid)))
	}

	#[instrument(skip(self, update), fields(job_id = %id))]
	async fn update_job(&mut self, id: JobId, update: &JobUpdate) -> Result<()> {
		sqlx::query(
			r#"
			UPDATE crab_jobs
			SET crabid = COALESCE(?, crabid),
				command = COALESCE(?, command),
				time = COALESCE(?, time),
				timezone = COALESCE(?, timezone),
				deleted = NULL
			WHERE id = ?
			"#,
		)
		.bind(&update.crabid)
		.bind(&update.command)
		.bind(&update.time)
		.bind(&update.timezone)
		.bind(id.0)
		.execute(&mut *self.tx)
		.await?;

		Ok(())
	}

	#[instrument(skip(self), fields(job_id = %id))]
	async fn delete_job(&mut self, id: JobId) -> Result<()> {
		sqlx::query("UPDATE crab_jobs SET deleted = ? WHERE id = ? AND deleted IS NULL")
			.bind(now_text())
			.bind(id.0)
			.execute(&mut *self.tx)
			.await?;

		Ok(())
	}

	#[instrument(skip(self), fields(job_id = %id))]
	async fn get_job_config(&mut self, id: JobId) -> Result<Option<JobConfig>> {
		let row = sqlx::query_as::<_, JobConfigRow>(
			r#"
			SELECT inhibit, success_pattern, warning_pattern, fail_pattern,
				   graceperiod, timeout, note
			FROM crab_job_configs
			WHERE job_id = ?
			"#,
		)
		.bind(id.0)
		.fetch_optional(&mut *self.tx)
		.await?;

		Ok(row.map(Into::into))
	}

	#[instrument(skip(self, config), fields(job_id = %id, inhibit = config.inhibit))]
	async fn write_job_config(&mut self, id: JobId, config: &JobConfig) -> Result<()> {
		sqlx::query(
			r#"
			INSERT INTO crab_job_configs (
				job_id, inhibit, success_pattern, warning_pattern, fail_pattern,
				graceperiod, timeout, note
			)
			VALUES (?, ?, ?, ?, ?, ?, ?, ?)
			ON CONFLICT(job_id) DO UPDATE SET
				inhibit = excluded.inhibit,
				success_pattern = excluded.success_pattern,
				warning_pattern = excluded.warning_pattern,
				fail_pattern = excluded.fail_pattern,
				graceperiod = excluded.graceperiod,
				timeout = excluded.timeout,
				note = excluded.note
			"#,
		)
		.bind(id.0)
		.bind(config.inhibit)
		.bind(&config.success_pattern)
		.bind(&config.warning_pattern)
		.bind(&config.fail_pattern)
		.bind(config.graceperiod.map(i64::from))
		.bind(config.timeout.map(i64::from))
		.bind(&config.note)
		.execute(&mut *self.tx)
		.await?;

		Ok(())
	}

	#[instrument(skip(self, command), fields(job_id = %id))]
	async fn log_start(&mut self, id: JobId, command: &str) -> Result<()> {
		sqlx::query("INSERT INTO crab_job_starts (job_id, command, datetime) VALUES (?, ?, ?)")
			.bind(id.0)
			.bind(command)
			.bind(now_text())
			.execute(&mut *self.tx)
			.await?;

		Ok(())
	}

	#[instrument(skip(self), fields(job_id = %id))]
	async fn get_job_starts(&mut self, id: JobId, limit: u32) -> Result<Vec<StartEvent>> {
		let rows = sqlx::query_as::<_, StartRow>(
			r#"
			SELECT job_id, command, datetime
			FROM crab_job_starts
			WHERE job_id = ?
			ORDER BY datetime DESC, id DESC
			LIMIT ?
			"#,
		)
		.bind(id.0)
		.bind(i64::from(limit))
		.fetch_all(&mut *self.tx)
		.await?;

		rows.into_iter().map(TryInto::try_into).collect()
	}

	#[instrument(skip(self, command), fields(job_id = %id, status = %status))]
	async fn log_finish(
		&mut self,
		id: JobId,
		command: &str,
		status: CrabStatus,
	) -> Result<FinishId> {
		let result = sqlx::query(
			r#"
			INSERT INTO crab_job_finishes (job_id, command, status, datetime)
			VALUES (?, ?, ?, ?)
			"#,
		)
		.bind(id.0)
		.bind(command)
		.bind(status.code())
		.bind(now_text())
		.execute(&mut *self.tx)
		.await?;

		Ok(FinishId(result.last_insert_rowid()))
	}

	#[instrument(skip(self), fields(job_id = %id))]
	async fn get_job_finishes(&mut self, id: JobId, limit: u32) -> Result<Vec<FinishEvent>> {
		let rows = sqlx::query_as::<_, FinishRow>(
			r#"
			SELECT id, job_id, command, status, datetime
			FROM crab_job_finishes
			WHERE job_id = ?
			ORDER BY datetime DESC, id DESC
			LIMIT ?
			"#,
		)
		.bind(id.0)
		.bind(i64::from(limit))
		.fetch_all(&mut *self.tx)
		.await?;

		rows.into_iter().map(TryInto::try_into).collect()
	}

	#[instrument(skip(self))]
	async fn get_fail_events(&mut self, limit: u32) -> Result<Vec<FailEvent>> {
		let rows = sqlx::query_as::<_, FailEventRow>(
			r#"
			SELECT f.id AS finish_id, f.job_id, j.host, j.user, j.crabid,
				   f.command, f.status, f.datetime
			FROM crab_job_finishes f
			JOIN crab_jobs j ON j.id = f.job_id
			WHERE f.status != ?
			ORDER BY f.datetime DESC, f.id DESC
			LIMIT ?
			"#,
		)
		.bind(CrabStatus::Success.code())
		.bind(i64::from(limit))
		.fetch_all(&mut *self.tx)
		.await?;

		rows.into_iter().map(TryInto::try_into).collect()
	}

	#[instrument(skip(self, output), fields(finish_id = %output.key.finish_id, job_id = %output.key.job_id))]
	async fn write_job_output(&mut self, output: &JobOutput) -> Result<()> {
		sqlx::query(
			r#"
			INSERT INTO crab_job_outputs (finish_id, stdout, stderr)
			VALUES (?, ?, ?)
			ON CONFLICT(finish_id) DO UPDATE SET
				stdout = excluded.stdout,
				stderr = excluded.stderr
			"#,
		)
		.bind(output.key.finish_id.0)
		.bind(&output.stdout)
		.bind(&output.stderr)
		.execute(&mut *self.tx)
		.await?;

		Ok(())
	}

	#[instrument(skip(self, key), fields(finish_id = %key.finish_id, job_id = %key.job_id))]
	async fn get_job_output(&mut self, key: &OutputKey) -> Result<Option<(String, String)>> {
		let row = sqlx::query_as::<_, (String, String)>(
			r#"
			SELECT o.stdout, o.stderr
			FROM crab_job_outputs o
			JOIN crab_job_finishes f ON f.id = o.finish_id
			WHERE o.finish_id = ? AND f.job_id = ?
			"#,
		)
		.bind(key.finish_id.0)
		.bind(key.job_id.0)
		.fetch_optional(&mut *self.tx)
		.await?;

		Ok(row)
	}

	#[instrument(skip(self, crontab))]
	async fn write_raw_crontab(&mut self, host: &str, user: &str, crontab: &str) -> Result<()> {
		sqlx::query(
			r#"
			INSERT INTO crab_raw_crontabs (host, user, crontab, updated_at)
			VALUES (?, ?, ?, ?)
			ON CONFLICT(host, user) DO UPDATE SET
				crontab = excluded.crontab,
				updated_at = excluded.updated_at
			"#,
		)
		.bind(host)
		.bind(user)
		.bind(crontab)
		.bind(now_text())
		.execute(&mut *self.tx)
		.await?;

		Ok(())
	}

	#[instrument(skip(self))]
	async fn get_raw_crontab(&mut self, host: &str, user: &str) -> Result<Option<String>> {
		let crontab = sqlx::query_scalar::<_, String>(
			"SELECT crontab FROM crab_raw_crontabs WHERE host = ? AND user = ?",
		)
		.bind(host)
		.bind(user)
		.fetch_optional(&mut *self.tx)
		.await?;

		Ok(crontab)
	}

	#[instrument(skip(self))]
	async fn commit(self: Box<Self>) -> Result<()> {
		let SqliteTransaction { tx, _lock } = *self;
		tx.commit().await?;
		Ok(())
	}
}

/// Timestamps are stored as fixed-precision RFC 3339 so they sort as text.
fn now_text() -> String {
	Utc::now().to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn parse_timestamp(value: &str, field: &str) -> Result<DateTime<Utc>> {
	DateTime::parse_from_rfc3339(value)
		.map(|dt| dt.with_timezone(&Utc))
		.map_err(|_| StoreError::Internal(format!("Invalid {field}: {value}")))
}

// Database row types for sqlx

#[derive(sqlx::FromRow)]
struct JobRow {
	id: i64,
	host: String,
	user: String,
	crabid: Option<String>,
	command: String,
	time: Option<String>,
	timezone: Option<String>,
	installed: String,
	deleted: Option<String>,
}

impl TryFrom<JobRow> for Job {
	type Error = StoreError;

	fn try_from(row: JobRow) -> Result<Self> {
		Ok(Job {
			id: JobId(row.id),
			host: row.host,
			user: row.user,
			crabid: row.crabid,
			command: row.command,
			time: row.time,
			timezone: row.timezone,
			installed: parse_timestamp(&row.installed, "installed")?,
			deleted: row
				.deleted
				.map(|s| parse_timestamp(&s, "deleted"))
				.transpose()?,
		})
	}
}

#[derive(sqlx::FromRow)]
struct JobConfigRow {
	inhibit: bool,
	success_pattern: Option<String>,
	warning_pattern: Option<String>,
	fail_pattern: Option<String>,
	graceperiod: Option<i64>,
	timeout: Option<i64>,
	note: Option<String>,
}

impl From<JobConfigRow> for JobConfig {
	fn from(row: JobConfigRow) -> Self {
		JobConfig {
			inhibit: row.inhibit,
			success_pattern: row.success_pattern,
			warning_pattern: row.warning_pattern,
			fail_pattern: row.fail_pattern,
			graceperiod: row.graceperiod.and_then(|m| u32::try_from(m).ok()),
			timeout: row.timeout.and_then(|m| u32::try_from(m).ok()),
			note: row.note,
		}
	}
}

#[derive(sqlx::FromRow)]
struct StartRow {
	job_id: i64,
	command: String,
	datetime: String,
}

impl TryFrom<StartRow> for StartEvent {
	type Error = StoreError;

	fn try_from(row: StartRow) -> Result<Self> {
		Ok(StartEvent {
			job_id: JobId(row.job_id),
			command: row.command,
			datetime: parse_timestamp(&row.datetime, "datetime")?,
		})
	}
}

#[derive(sqlx::FromRow)]
struct FinishRow {
	id: i64,
	job_id: i64,
	command: String,
	status: i32,
	datetime: String,
}

impl TryFrom<FinishRow> for FinishEvent {
	type Error = StoreError;

	fn try_from(row: FinishRow) -> Result<Self> {
		Ok(FinishEvent {
			finish_id: FinishId(row.id),
			job_id: JobId(row.job_id),
			command: row.command,
			status: CrabStatus::from_code(row.status),
			datetime: parse_timestamp(&row.datetime, "datetime")?,
		})
	}
}

#[derive(sqlx::FromRow)]
struct FailEventRow {
	finish_id: i64,
	job_id: i64,
	host: String,
	user: String,
	crabid: Option<String>,
	command: String,
	status: i32,
	datetime: String,
}

impl TryFrom<FailEventRow> for FailEvent {
	type Error = StoreError;

	fn try_from(row: FailEventRow) -> Result<Self> {
		Ok(FailEvent {
			finish_id: FinishId(row.finish_id),
			job_id: JobId(row.job_id),
			host: row.host,
			user: row.user,
			crabid: row.crabid,
			command: row.command,
			status: CrabStatus::from_code(row.status),
			datetime: parse_timestamp(&row.datetime, "datetime")?,
		})
	}
}
