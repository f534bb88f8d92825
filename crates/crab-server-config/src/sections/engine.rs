// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Engine behaviour settings.

use serde::Deserialize;

const DEFAULT_FAIL_EVENTS_LIMIT: u32 = 20;

#[derive(Debug, Clone, PartialEq)]
pub struct EngineConfig {
	/// Default number of events returned by failure queries.
	pub fail_events_limit: u32,
	/// Honour `CRABCLIENTHOSTNAME` and `CRABUSERNAME` when importing crontabs.
	pub allow_filter: bool,
}

impl Default for EngineConfig {
	fn default() -> Self {
		EngineConfigLayer::default().finalize()
	}
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct EngineConfigLayer {
	#[serde(default)]
	pub fail_events_limit: Option<u32>,
	#[serde(default)]
	pub allow_filter: Option<bool>,
}

impl EngineConfigLayer {
	pub fn merge(&mut self, other: EngineConfigLayer) {
		if other.fail_events_limit.is_some() {
			self.fail_events_limit = other.fail_events_limit;
		}
		if other.allow_filter.is_some() {
			self.allow_filter = other.allow_filter;
		}
	}

	pub fn finalize(self) -> EngineConfig {
		EngineConfig {
			fail_events_limit: self.fail_events_limit.unwrap_or(DEFAULT_FAIL_EVENTS_LIMIT),
			allow_filter: self.allow_filter.unwrap_or(true),
		}
	}
}
