// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Database configuration.

use std::time::Duration;

use serde::Deserialize;

const DEFAULT_URL: &str = "sqlite:./crab.db";
const DEFAULT_LOCK_TIMEOUT_SECS: u64 = 30;

/// Database configuration (runtime, fully resolved).
#[derive(Debug, Clone)]
pub struct DatabaseConfig {
	pub url: String,
	/// How long an operation waits for another to release the job store.
	pub lock_timeout_secs: u64,
}

impl DatabaseConfig {
	pub fn lock_timeout(&self) -> Duration {
		Duration::from_secs(self.lock_timeout_secs)
	}
}

impl Default for DatabaseConfig {
	fn default() -> Self {
		DatabaseConfigLayer::default().finalize()
	}
}

/// Database configuration layer (partial, for merging).
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DatabaseConfigLayer {
	#[serde(default)]
	pub url: Option<String>,
	#[serde(default)]
	pub lock_timeout_secs: Option<u64>,
}

impl DatabaseConfigLayer {
	pub fn merge(&mut self, other: DatabaseConfigLayer) {
		if other.url.is_some() {
			self.url = other.url;
		}
		if other.lock_timeout_secs.is_some() {
			self.lock_timeout_secs = other.lock_timeout_secs;
		}
	}

	pub fn finalize(self) -> DatabaseConfig {
		DatabaseConfig {
			url: self.url.unwrap_or_else(|| DEFAULT_URL.to_string()),
			lock_timeout_secs: self.lock_timeout_secs.unwrap_or(DEFAULT_LOCK_TIMEOUT_SECS),
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_defaults() {
		let config = DatabaseConfigLayer::default().finalize();
		assert_eq!(config.url, "sqlite:./crab.db");
		assert_eq!(config.lock_timeout(), Duration::from_secs(30));
	}

	#[test]
	fn test_custom_values() {
		let layer = DatabaseConfigLayer {
			url: Some("sqlite:/var/lib/crab/crab.db".to_string()),
			lock_timeout_secs: Some(5),
		};
		let config = layer.finalize();
		assert_eq!(config.url, "sqlite:/var/lib/crab/crab.db");
		assert_eq!(config.lock_timeout_secs, 5);
	}

	#[test]
	fn test_deserialize_partial() {
		let layer: DatabaseConfigLayer = toml::from_str("lock_timeout_secs = 10\n").unwrap();
		assert!(layer.url.is_none());
		assert_eq!(layer.lock_timeout_secs, Some(10));
	}
}
