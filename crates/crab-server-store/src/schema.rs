// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Database schema.

use sqlx::SqlitePool;

use crate::error::Result;

const SCHEMA: &[&str] = &[
	r#"
	CREATE TABLE IF NOT EXISTS crab_jobs (
		id INTEGER PRIMARY KEY AUTOINCREMENT,
		host TEXT NOT NULL,
		user TEXT NOT NULL,
		crabid TEXT,
		command TEXT NOT NULL,
		time TEXT,
		timezone TEXT,
		installed TEXT NOT NULL,
		deleted TEXT
	)
	"#,
	"CREATE INDEX IF NOT EXISTS idx_crab_jobs_scope ON crab_jobs(host, user)",
	r#"
	CREATE TABLE IF NOT EXISTS crab_job_starts (
		id INTEGER PRIMARY KEY AUTOINCREMENT,
		job_id INTEGER NOT NULL REFERENCES crab_jobs(id),
		command TEXT NOT NULL,
		datetime TEXT NOT NULL
	)
	"#,
	"CREATE INDEX IF NOT EXISTS idx_crab_job_starts_job ON crab_job_starts(job_id)",
	r#"
	CREATE TABLE IF NOT EXISTS crab_job_finishes (
		id INTEGER PRIMARY KEY AUTOINCREMENT,
		job_id INTEGER NOT NULL REFERENCES crab_jobs(id),
		command TEXT NOT NULL,
		status INTEGER NOT NULL,
		datetime TEXT NOT NULL
	)
	"#,
	"CREATE INDEX IF NOT EXISTS idx_crab_job_finishes_job ON crab_job_finishes(job_id)",
	"CREATE INDEX IF NOT EXISTS idx_crab_job_finishes_datetime ON crab_job_finishes(datetime)",
	r#"
	CREATE TABLE IF NOT EXISTS crab_job_configs (
		job_id INTEGER PRIMARY KEY REFERENCES crab_jobs(id),
		inhibit INTEGER NOT NULL DEFAULT 0,
		success_pattern TEXT,
		warning_pattern TEXT,
		fail_pattern TEXT,
		graceperiod INTEGER,
		timeout INTEGER,
		note TEXT
	)
	"#,
	r#"
	CREATE TABLE IF NOT EXISTS crab_job_outputs (
		finish_id INTEGER PRIMARY KEY REFERENCES crab_job_finishes(id),
		stdout TEXT NOT NULL,
		stderr TEXT NOT NULL
	)
	"#,
	r#"
	CREATE TABLE IF NOT EXISTS crab_raw_crontabs (
		host TEXT NOT NULL,
		user TEXT NOT NULL,
		crontab TEXT NOT NULL,
		updated_at TEXT NOT NULL,
		PRIMARY KEY (host, user)
	)
	"#,
];

/// Create any missing tables and indexes.
#[tracing::instrument(skip(pool))]
pub async fn run_migrations(pool: &SqlitePool) -> Result<()> {
	for statement in SCHEMA {
		sqlx::query(statement).execute(pool).await?;
	}
	tracing::debug!(statements = SCHEMA.len(), "database schema up to date");
	Ok(())
}
