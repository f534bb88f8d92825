// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Job run status codes and pattern-based classification.

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::{CrabError, JobConfig};

/// Status of a finished job run.
///
/// The integer codes are what clients report and what the store persists.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CrabStatus {
	Success,
	Fail,
	/// Client could not determine the outcome
	Unknown,
	CouldNotStart,
	/// Previous run still active, this one was skipped
	AlreadyRunning,
	Warning,
	/// Run suppressed by the job's inhibit setting
	Inhibited,
}

impl CrabStatus {
	pub const ALL: [CrabStatus; 7] = [
		Self::Success,
		Self::Fail,
		Self::Unknown,
		Self::CouldNotStart,
		Self::AlreadyRunning,
		Self::Warning,
		Self::Inhibited,
	];

	pub fn code(self) -> i32 {
		match self {
			Self::Success => 0,
			Self::Fail => 1,
			Self::Unknown => 2,
			Self::CouldNotStart => 3,
			Self::AlreadyRunning => 4,
			Self::Warning => 5,
			Self::Inhibited => 6,
		}
	}

	/// Decode a reported status code. Codes we don't know are `Unknown`.
	pub fn from_code(code: i32) -> Self {
		match code {
			0 => Self::Success,
			1 => Self::Fail,
			3 => Self::CouldNotStart,
			4 => Self::AlreadyRunning,
			5 => Self::Warning,
			6 => Self::Inhibited,
			_ => Self::Unknown,
		}
	}

	/// Human-readable label.
	pub fn name(self) -> &'static str {
		match self {
			Self::Success => "Succeeded",
			Self::Fail => "Failed",
			Self::Unknown => "Unknown",
			Self::CouldNotStart => "Could not start",
			Self::AlreadyRunning => "Already running",
			Self::Warning => "Warning",
			Self::Inhibited => "Inhibited",
		}
	}

	pub fn is_ok(self) -> bool {
		self == Self::Success
	}

	pub fn is_warning(self) -> bool {
		matches!(
			self,
			Self::Unknown | Self::AlreadyRunning | Self::Warning | Self::Inhibited
		)
	}

	pub fn is_error(self) -> bool {
		matches!(self, Self::Fail | Self::Unknown | Self::CouldNotStart)
	}
}

impl fmt::Display for CrabStatus {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			Self::Success => write!(f, "success"),
			Self::Fail => write!(f, "fail"),
			Self::Unknown => write!(f, "unknown"),
			Self::CouldNotStart => write!(f, "could_not_start"),
			Self::AlreadyRunning => write!(f, "already_running"),
			Self::Warning => write!(f, "warning"),
			Self::Inhibited => write!(f, "inhibited"),
		}
	}
}

impl FromStr for CrabStatus {
	type Err = CrabError;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		match s {
			"success" => Ok(Self::Success),
			"fail" => Ok(Self::Fail),
			"unknown" => Ok(Self::Unknown),
			"could_not_start" => Ok(Self::CouldNotStart),
			"already_running" => Ok(Self::AlreadyRunning),
			"warning" => Ok(Self::Warning),
			"inhibited" => Ok(Self::Inhibited),
			other => other
				.parse::<i32>()
				.map(Self::from_code)
				.map_err(|_| CrabError::InvalidStatus(s.to_string())),
		}
	}
}

/// Apply a job's status patterns to the output of a run.
///
/// `AlreadyRunning` and `Inhibited` describe runs that never executed the
/// command, so their output is not inspected.
pub fn classify_status(status: CrabStatus, config: &JobConfig, output: &str) -> CrabStatus {
	if matches!(status, CrabStatus::AlreadyRunning | CrabStatus::Inhibited) {
		return status;
	}

	if pattern_matches(config.fail_pattern.as_deref(), output) == Some(true) {
		return CrabStatus::Fail;
	}

	if pattern_matches(config.warning_pattern.as_deref(), output) == Some(true) {
		return CrabStatus::Warning;
	}

	if pattern_matches(config.success_pattern.as_deref(), output) == Some(false) {
		return CrabStatus::Fail;
	}

	status
}

/// `None` when there is no usable pattern.
fn pattern_matches(pattern: Option<&str>, output: &str) -> Option<bool> {
	let pattern = pattern.filter(|p| !p.is_empty())?;
	match Regex::new(pattern) {
		Ok(re) => Some(re.is_match(output)),
		Err(e) => {
			tracing::warn!(pattern = %pattern, error = %e, "ignoring invalid status pattern");
			None
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use proptest::prelude::*;

	fn config(success: Option<&str>, warning: Option<&str>, fail: Option<&str>) -> JobConfig {
		JobConfig {
			success_pattern: success.map(String::from),
			warning_pattern: warning.map(String::from),
			fail_pattern: fail.map(String::from),
			..Default::default()
		}
	}

	proptest! {
		#[test]
		fn status_code_roundtrip(status in proptest::sample::select(CrabStatus::ALL.to_vec())) {
			prop_assert_eq!(CrabStatus::from_code(status.code()), status);
		}

		#[test]
		fn status_string_roundtrip(status in proptest::sample::select(CrabStatus::ALL.to_vec())) {
			let parsed: CrabStatus = status.to_string().parse().unwrap();
			prop_assert_eq!(parsed, status);
		}

		#[test]
		fn no_patterns_keeps_status(
			status in proptest::sample::select(CrabStatus::ALL.to_vec()),
			output in ".{0,64}",
		) {
			prop_assert_eq!(classify_status(status, &JobConfig::default(), &output), status);
		}
	}

	#[test]
	fn unknown_codes_decode_as_unknown() {
		assert_eq!(CrabStatus::from_code(42), CrabStatus::Unknown);
		assert_eq!(CrabStatus::from_code(-1), CrabStatus::Unknown);
		assert_eq!("17".parse::<CrabStatus>().unwrap(), CrabStatus::Unknown);
		assert!("bogus".parse::<CrabStatus>().is_err());
	}

	#[test]
	fn error_and_warning_sets() {
		assert!(CrabStatus::Fail.is_error());
		assert!(CrabStatus::CouldNotStart.is_error());
		assert!(CrabStatus::Unknown.is_error());
		assert!(CrabStatus::Unknown.is_warning());
		assert!(CrabStatus::Warning.is_warning());
		assert!(!CrabStatus::Warning.is_error());
		assert!(CrabStatus::Success.is_ok());
		assert!(!CrabStatus::Success.is_warning());
	}

	#[test]
	fn fail_pattern_wins() {
		let cfg = config(Some("done"), Some("slow"), Some("ERROR"));
		assert_eq!(
			classify_status(CrabStatus::Success, &cfg, "slow\nERROR: boom\ndone"),
			CrabStatus::Fail
		);
	}

	#[test]
	fn warning_pattern_downgrades_success() {
		let cfg = config(None, Some("deprecated"), None);
		assert_eq!(
			classify_status(CrabStatus::Success, &cfg, "deprecated flag used"),
			CrabStatus::Warning
		);
	}

	#[test]
	fn missing_success_pattern_is_failure() {
		let cfg = config(Some("^all good$"), None, None);
		assert_eq!(
			classify_status(CrabStatus::Success, &cfg, "something else"),
			CrabStatus::Fail
		);
		let multi = config(Some("(?m)^all good$"), None, None);
		assert_eq!(
			classify_status(CrabStatus::Success, &multi, "noise\nall good"),
			CrabStatus::Success
		);
	}

	#[test]
	fn already_running_is_never_reclassified() {
		let cfg = config(None, None, Some(".*"));
		assert_eq!(
			classify_status(CrabStatus::AlreadyRunning, &cfg, "anything"),
			CrabStatus::AlreadyRunning
		);
		assert_eq!(
			classify_status(CrabStatus::Inhibited, &cfg, "anything"),
			CrabStatus::Inhibited
		);
	}

	#[test]
	fn invalid_and_empty_patterns_are_ignored() {
		let cfg = config(Some(""), Some("("), Some("["));
		assert_eq!(
			classify_status(CrabStatus::Success, &cfg, "output"),
			CrabStatus::Success
		);
	}
}
