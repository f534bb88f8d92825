// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Job types for cron job tracking.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Unique identifier for a job, assigned by the store on first insert.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct JobId(pub i64);

impl fmt::Display for JobId {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "{}", self.0)
	}
}

impl FromStr for JobId {
	type Err = std::num::ParseIntError;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		Ok(Self(s.parse()?))
	}
}

/// A cron job as known to the store.
///
/// Jobs are never removed. A job that disappears from its crontab gets a
/// `deleted` timestamp, which is cleared again if the job is seen later.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Job {
	pub id: JobId,
	pub host: String,
	pub user: String,

	/// User-assigned identifier, the strongest matching signal.
	pub crabid: Option<String>,
	pub command: String,

	/// Schedule fields from the crontab: "0 * * * *" or "@daily"
	pub time: Option<String>,
	/// IANA timezone from CRON_TZ
	pub timezone: Option<String>,

	pub installed: DateTime<Utc>,
	pub deleted: Option<DateTime<Utc>>,
}

impl Job {
	pub fn is_deleted(&self) -> bool {
		self.deleted.is_some()
	}
}

/// Per-job settings maintained outside the engine.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobConfig {
	/// Suppress alerting and mark new runs as inhibited.
	pub inhibit: bool,

	/// Output must match this pattern for the run to count as a success.
	pub success_pattern: Option<String>,
	/// Output matching this pattern downgrades the run to a warning.
	pub warning_pattern: Option<String>,
	/// Output matching this pattern marks the run as failed.
	pub fail_pattern: Option<String>,

	/// Minutes after the scheduled time before a missing start is reported.
	pub graceperiod: Option<u32>,
	/// Minutes a run may take before it is reported as timed out.
	pub timeout: Option<u32>,

	pub note: Option<String>,
}

/// Search criteria for listing jobs.
///
/// Empty criteria match every non-deleted job.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct JobFilter {
	pub host: Option<String>,
	pub user: Option<String>,
	pub include_deleted: bool,
	pub crabid: Option<String>,
	pub command: Option<String>,
	/// Only match jobs that have no crabid.
	pub without_crabid: bool,
}

impl JobFilter {
	/// Filter for all non-deleted jobs of one host and user.
	pub fn scope(host: &str, user: &str) -> Self {
		Self {
			host: Some(host.to_string()),
			user: Some(user.to_string()),
			..Default::default()
		}
	}

	pub fn include_deleted(mut self) -> Self {
		self.include_deleted = true;
		self
	}

	pub fn with_crabid(mut self, crabid: &str) -> Self {
		self.crabid = Some(crabid.to_string());
		self
	}

	pub fn with_command(mut self, command: &str) -> Self {
		self.command = Some(command.to_string());
		self
	}

	pub fn without_crabid(mut self) -> Self {
		self.without_crabid = true;
		self
	}
}

/// Fields for inserting a new job.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewJob {
	pub host: String,
	pub user: String,
	pub crabid: Option<String>,
	pub command: String,
	pub time: Option<String>,
	pub timezone: Option<String>,
}

/// Partial update of a job.
///
/// `None` fields are left unchanged. Applying any update clears the
/// deletion marker, so an empty update is an undelete.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct JobUpdate {
	pub crabid: Option<String>,
	pub command: Option<String>,
	pub time: Option<String>,
	pub timezone: Option<String>,
}

impl JobUpdate {
	pub fn is_empty(&self) -> bool {
		self.crabid.is_none() && self.command.is_none() && self.time.is_none() && self.timezone.is_none()
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use proptest::prelude::*;

	proptest! {
		#[test]
		fn job_id_roundtrip(n in any::<i64>()) {
			let id = JobId(n);
			let parsed: JobId = id.to_string().parse().unwrap();
			prop_assert_eq!(id, parsed);
		}
	}

	#[test]
	fn scope_filter_excludes_deleted() {
		let filter = JobFilter::scope("host1", "alice");
		assert_eq!(filter.host.as_deref(), Some("host1"));
		assert_eq!(filter.user.as_deref(), Some("alice"));
		assert!(!filter.include_deleted);
		assert!(!filter.without_crabid);
	}

	#[test]
	fn filter_builders_compose() {
		let filter = JobFilter::scope("h", "u")
			.include_deleted()
			.with_command("echo hi")
			.without_crabid();
		assert!(filter.include_deleted);
		assert!(filter.without_crabid);
		assert_eq!(filter.command.as_deref(), Some("echo hi"));
		assert!(filter.crabid.is_none());
	}

	#[test]
	fn empty_update_is_undelete() {
		assert!(JobUpdate::default().is_empty());
		let update = JobUpdate {
			time: Some("@daily".to_string()),
			..Default::default()
		};
		assert!(!update.is_empty());
	}
}
