// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Configuration for the Crab server.
//!
//! Configuration is layered from built-in defaults, a TOML file and
//! `CRAB_SERVER_*` environment variables, later sources overriding earlier
//! ones field by field.
//!
//! ```toml
//! [database]
//! url = "sqlite:/var/lib/crab/crab.db"
//! lock_timeout_secs = 30
//!
//! [output]
//! dir = "/var/lib/crab/files"
//!
//! [logging]
//! level = "info"
//!
//! [engine]
//! fail_events_limit = 20
//! allow_filter = true
//! ```

pub mod error;
pub mod layer;
pub mod sections;
pub mod sources;

pub use error::ConfigError;
pub use layer::CrabConfigLayer;
pub use sections::*;
pub use sources::{ConfigSource, DefaultsSource, EnvSource, Precedence, TomlSource};

use tracing::{debug, info};

/// Fully resolved server configuration.
#[derive(Debug, Clone, Default)]
pub struct CrabServerConfig {
	pub database: DatabaseConfig,
	pub output: OutputConfig,
	pub logging: LoggingConfig,
	pub engine: EngineConfig,
}

/// Load configuration from all sources with standard precedence.
///
/// Precedence (highest to lowest):
/// 1. Environment variables (`CRAB_SERVER_*`)
/// 2. Config file (`/etc/crab/server.toml`)
/// 3. Built-in defaults
pub fn load_config() -> Result<CrabServerConfig, ConfigError> {
	let sources: Vec<Box<dyn ConfigSource>> = vec![
		Box::new(DefaultsSource),
		Box::new(TomlSource::system()),
		Box::new(EnvSource),
	];
	load_from_sources(sources)
}

/// Load configuration from environment only.
pub fn load_config_from_env() -> Result<CrabServerConfig, ConfigError> {
	let sources: Vec<Box<dyn ConfigSource>> = vec![Box::new(EnvSource)];
	load_from_sources(sources)
}

/// Load configuration with a custom config file path.
pub fn load_config_with_file(
	config_path: impl Into<std::path::PathBuf>,
) -> Result<CrabServerConfig, ConfigError> {
	let sources: Vec<Box<dyn ConfigSource>> = vec![
		Box::new(DefaultsSource),
		Box::new(TomlSource::new(config_path)),
		Box::new(EnvSource),
	];
	load_from_sources(sources)
}

fn load_from_sources(
	mut sources: Vec<Box<dyn ConfigSource>>,
) -> Result<CrabServerConfig, ConfigError> {
	sources.sort_by_key(|s| s.precedence());

	let mut merged = CrabConfigLayer::default();
	for source in sources {
		debug!(source = source.name(), "loading configuration source");
		merged.merge(source.load()?);
	}

	finalize(merged)
}

/// Finalize configuration layer into resolved config.
fn finalize(layer: CrabConfigLayer) -> Result<CrabServerConfig, ConfigError> {
	let config = CrabServerConfig {
		database: layer.database.unwrap_or_default().finalize(),
		output: layer.output.unwrap_or_default().finalize(),
		logging: layer.logging.unwrap_or_default().finalize(),
		engine: layer.engine.unwrap_or_default().finalize(),
	};

	validate_config(&config)?;

	info!(
		database = %config.database.url,
		lock_timeout_secs = config.database.lock_timeout_secs,
		output_dir = ?config.output.dir,
		allow_filter = config.engine.allow_filter,
		"Server configuration loaded"
	);

	Ok(config)
}

/// Validate cross-field configuration rules.
fn validate_config(config: &CrabServerConfig) -> Result<(), ConfigError> {
	if config.database.lock_timeout_secs == 0 {
		return Err(ConfigError::Validation(
			"database.lock_timeout_secs must be at least 1".to_string(),
		));
	}
	if config.engine.fail_events_limit == 0 {
		return Err(ConfigError::Validation(
			"engine.fail_events_limit must be at least 1".to_string(),
		));
	}
	if config.output.dir.as_ref().is_some_and(|d| d.as_os_str().is_empty()) {
		return Err(ConfigError::Validation(
			"output.dir must not be empty".to_string(),
		));
	}

	Ok(())
}

#[cfg(test)]
mod tests {
	use super::*;
	use std::io::Write;
	use std::path::PathBuf;

	#[test]
	fn test_defaults_are_valid() {
		let config = finalize(CrabConfigLayer::default()).unwrap();
		assert_eq!(config.database.url, "sqlite:./crab.db");
		assert!(config.output.dir.is_none());
		assert_eq!(config.logging.level, "info");
		assert_eq!(config.engine.fail_events_limit, 20);
	}

	#[test]
	fn test_zero_lock_timeout_rejected() {
		let layer = CrabConfigLayer {
			database: Some(DatabaseConfigLayer {
				lock_timeout_secs: Some(0),
				..Default::default()
			}),
			..Default::default()
		};
		assert!(matches!(finalize(layer), Err(ConfigError::Validation(_))));
	}

	#[test]
	fn test_zero_fail_events_limit_rejected() {
		let layer = CrabConfigLayer {
			engine: Some(EngineConfigLayer {
				fail_events_limit: Some(0),
				..Default::default()
			}),
			..Default::default()
		};
		assert!(matches!(finalize(layer), Err(ConfigError::Validation(_))));
	}

	#[test]
	fn test_file_overrides_defaults() {
		let mut file = tempfile::NamedTempFile::new().unwrap();
		write!(
			file,
			"[output]\ndir = \"/srv/crab\"\n\n[logging]\nlevel = \"debug\"\n"
		)
		.unwrap();

		let mut merged = CrabConfigLayer::default();
		merged.merge(DefaultsSource.load().unwrap());
		merged.merge(TomlSource::new(file.path()).load().unwrap());
		let config = finalize(merged).unwrap();

		assert_eq!(config.output.dir, Some(PathBuf::from("/srv/crab")));
		assert_eq!(config.logging.level, "debug");
		assert_eq!(config.database.lock_timeout_secs, 30);
	}
}
