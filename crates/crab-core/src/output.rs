// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Job output types.

use serde::{Deserialize, Serialize};

use crate::{FinishId, JobId};

/// Identifies the output of one finished run.
///
/// Output stores may lay out their data by any of these fields, so callers
/// must pass the job's real crabid rather than whatever a report contained.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutputKey {
	pub finish_id: FinishId,
	pub host: String,
	pub user: String,
	pub job_id: JobId,
	pub crabid: Option<String>,
}

/// Captured output of one finished run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobOutput {
	pub key: OutputKey,
	pub stdout: String,
	pub stderr: String,
}

impl JobOutput {
	/// Build the record to write, or `None` when there is nothing to keep.
	pub fn from_streams(key: OutputKey, stdout: Option<&str>, stderr: Option<&str>) -> Option<Self> {
		let stdout = stdout.unwrap_or_default();
		let stderr = stderr.unwrap_or_default();
		if stdout.is_empty() && stderr.is_empty() {
			return None;
		}
		Some(Self {
			key,
			stdout: stdout.to_string(),
			stderr: stderr.to_string(),
		})
	}
}

/// Text that status patterns are matched against: the streams that were
/// reported, joined by a single newline.
/// No blank line separates stdout from stderr.
pub fn combined_output(stdout: Option<&str>, stderr: Option<&str>) -> String {
	[stdout, stderr]
		.into_iter()
		.flatten()
		.collect::<Vec<_>>()
		.join("\n")
}

#[cfg(test)]
mod tests {
	use super::*;

	fn key() -> OutputKey {
		OutputKey {
			finish_id: FinishId(7),
			host: "host1".to_string(),
			user: "alice".to_string(),
			job_id: JobId(3),
			crabid: None,
		}
	}

	#[test]
	fn empty_streams_produce_no_output() {
		assert!(JobOutput::from_streams(key(), None, None).is_none());
		assert!(JobOutput::from_streams(key(), Some(""), Some("")).is_none());
	}

	#[test]
	fn either_stream_is_enough() {
		let out = JobOutput::from_streams(key(), None, Some("oops")).unwrap();
		assert_eq!(out.stdout, "");
		assert_eq!(out.stderr, "oops");
	}

	#[test]
	fn combined_output_joins_present_streams() {
		assert_eq!(combined_output(Some("out"), Some("err")), "out\nerr");
		assert_eq!(combined_output(None, Some("err")), "err");
		assert_eq!(combined_output(Some("out"), None), "out");
		assert_eq!(combined_output(None, None), "");
	}
}
