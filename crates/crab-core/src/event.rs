// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Execution event types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::{CrabStatus, JobId};

/// Identifier of a finish record, also the key for its output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FinishId(pub i64);

impl fmt::Display for FinishId {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "{}", self.0)
	}
}

impl FromStr for FinishId {
	type Err = std::num::ParseIntError;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		Ok(Self(s.parse()?))
	}
}

/// A job start as reported by a client.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StartEvent {
	pub job_id: JobId,
	pub command: String,
	pub datetime: DateTime<Utc>,
}

/// A job finish as reported by a client, after status classification.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FinishEvent {
	pub finish_id: FinishId,
	pub job_id: JobId,
	pub command: String,
	pub status: CrabStatus,
	pub datetime: DateTime<Utc>,
}

/// A failed or warning finish joined with its job, for failure feeds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FailEvent {
	pub finish_id: FinishId,
	pub job_id: JobId,
	pub host: String,
	pub user: String,
	pub crabid: Option<String>,
	/// Command as run, which may differ from the job's current command.
	pub command: String,
	pub status: CrabStatus,
	pub datetime: DateTime<Utc>,
}
