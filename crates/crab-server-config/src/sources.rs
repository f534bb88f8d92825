// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Configuration sources: environment variables and TOML files.

use std::path::PathBuf;

use tracing::{debug, trace};

use crate::error::ConfigError;
use crate::layer::CrabConfigLayer;
use crate::sections::{
	DatabaseConfigLayer, EngineConfigLayer, LoggingConfigLayer, OutputConfigLayer,
};

/// Source precedence levels (higher = overrides lower).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Precedence {
	Defaults = 10,
	ConfigFile = 20,
	Environment = 50,
}

/// Trait for configuration sources.
pub trait ConfigSource: Send + Sync {
	fn name(&self) -> &'static str;
	fn precedence(&self) -> Precedence;
	fn load(&self) -> Result<CrabConfigLayer, ConfigError>;
}

/// Built-in defaults source.
pub struct DefaultsSource;

impl ConfigSource for DefaultsSource {
	fn name(&self) -> &'static str {
		"defaults"
	}

	fn precedence(&self) -> Precedence {
		Precedence::Defaults
	}

	fn load(&self) -> Result<CrabConfigLayer, ConfigError> {
		debug!("loading defaults");
		Ok(CrabConfigLayer::default())
	}
}

/// TOML file configuration source. A missing file is not an error.
pub struct TomlSource {
	path: PathBuf,
}

impl TomlSource {
	pub fn new(path: impl Into<PathBuf>) -> Self {
		Self { path: path.into() }
	}

	pub fn system() -> Self {
		Self::new("/etc/crab/server.toml")
	}
}

impl ConfigSource for TomlSource {
	fn name(&self) -> &'static str {
		"toml-config"
	}

	fn precedence(&self) -> Precedence {
		Precedence::ConfigFile
	}

	fn load(&self) -> Result<CrabConfigLayer, ConfigError> {
		if !self.path.exists() {
			debug!(path = %self.path.display(), "config file not found, skipping");
			return Ok(CrabConfigLayer::default());
		}

		debug!(path = %self.path.display(), "loading config file");
		let content = std::fs::read_to_string(&self.path).map_err(|e| ConfigError::FileRead {
			path: self.path.clone(),
			source: e,
		})?;

		let layer: CrabConfigLayer =
			toml::from_str(&content).map_err(|e| ConfigError::TomlParse {
				path: self.path.clone(),
				source: e,
			})?;

		trace!("parsed config layer from TOML");
		Ok(layer)
	}
}

/// Environment variable source.
///
/// Convention: CRAB_SERVER_<SECTION>_<FIELD>
pub struct EnvSource;

impl ConfigSource for EnvSource {
	fn name(&self) -> &'static str {
		"environment"
	}

	fn precedence(&self) -> Precedence {
		Precedence::Environment
	}

	fn load(&self) -> Result<CrabConfigLayer, ConfigError> {
		debug!("loading environment variables");
		Ok(CrabConfigLayer {
			database: Some(DatabaseConfigLayer {
				url: env_var("CRAB_SERVER_DATABASE_URL"),
				lock_timeout_secs: env_u64("CRAB_SERVER_DATABASE_LOCK_TIMEOUT_SECS")?,
			}),
			output: Some(OutputConfigLayer {
				dir: env_var("CRAB_SERVER_OUTPUT_DIR").map(PathBuf::from),
			}),
			logging: Some(LoggingConfigLayer {
				level: env_var("CRAB_SERVER_LOG_LEVEL"),
			}),
			engine: Some(EngineConfigLayer {
				fail_events_limit: env_u32("CRAB_SERVER_FAIL_EVENTS_LIMIT")?,
				allow_filter: env_bool("CRAB_SERVER_ALLOW_FILTER"),
			}),
		})
	}
}

fn env_var(name: &str) -> Option<String> {
	std::env::var(name).ok().filter(|s| !s.is_empty())
}

fn env_bool(name: &str) -> Option<bool> {
	env_var(name).map(|v| v.eq_ignore_ascii_case("true") || v == "1")
}

fn env_u32(name: &str) -> Result<Option<u32>, ConfigError> {
	match env_var(name) {
		Some(v) => v.parse().map(Some).map_err(|_| ConfigError::InvalidValue {
			key: name.to_string(),
			message: format!("invalid u32 value '{v}'"),
		}),
		None => Ok(None),
	}
}

fn env_u64(name: &str) -> Result<Option<u64>, ConfigError> {
	match env_var(name) {
		Some(v) => v.parse().map(Some).map_err(|_| ConfigError::InvalidValue {
			key: name.to_string(),
			message: format!("invalid u64 value '{v}'"),
		}),
		None => Ok(None),
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use std::io::Write;

	#[test]
	fn test_precedence_ordering() {
		assert!(Precedence::Environment > Precedence::ConfigFile);
		assert!(Precedence::ConfigFile > Precedence::Defaults);
	}

	#[test]
	fn test_defaults_source_returns_empty_layer() {
		let layer = DefaultsSource.load().unwrap();
		assert!(layer.database.is_none());
		assert!(layer.engine.is_none());
	}

	#[test]
	fn test_toml_source_missing_file_returns_empty() {
		let layer = TomlSource::new("/nonexistent/crab.toml").load().unwrap();
		assert!(layer.database.is_none());
	}

	#[test]
	fn test_toml_source_reads_sections() {
		let mut file = tempfile::NamedTempFile::new().unwrap();
		write!(
			file,
			r#"
[database]
url = "sqlite:/var/lib/crab/crab.db"

[output]
dir = "/var/lib/crab/files"

[engine]
allow_filter = false
"#
		)
		.unwrap();

		let layer = TomlSource::new(file.path()).load().unwrap();
		assert_eq!(
			layer.database.unwrap().url.as_deref(),
			Some("sqlite:/var/lib/crab/crab.db")
		);
		assert_eq!(
			layer.output.unwrap().dir,
			Some(PathBuf::from("/var/lib/crab/files"))
		);
		assert_eq!(layer.engine.unwrap().allow_filter, Some(false));
		assert!(layer.logging.is_none());
	}

	#[test]
	fn test_toml_source_reports_parse_errors() {
		let mut file = tempfile::NamedTempFile::new().unwrap();
		write!(file, "[database\nurl = ").unwrap();

		match TomlSource::new(file.path()).load() {
			Err(ConfigError::TomlParse { path, .. }) => assert_eq!(path, file.path()),
			other => panic!("unexpected result: {other:?}"),
		}
	}

	#[test]
	fn test_env_helpers() {
		std::env::set_var("CRAB_TEST_SOURCES_NUMBER", "12");
		std::env::set_var("CRAB_TEST_SOURCES_BAD_NUMBER", "twelve");
		std::env::set_var("CRAB_TEST_SOURCES_FLAG", "TRUE");
		std::env::set_var("CRAB_TEST_SOURCES_EMPTY", "");

		assert_eq!(env_u32("CRAB_TEST_SOURCES_NUMBER").unwrap(), Some(12));
		assert_eq!(env_u64("CRAB_TEST_SOURCES_NUMBER").unwrap(), Some(12));
		assert!(matches!(
			env_u64("CRAB_TEST_SOURCES_BAD_NUMBER"),
			Err(ConfigError::InvalidValue { .. })
		));
		assert_eq!(env_bool("CRAB_TEST_SOURCES_FLAG"), Some(true));
		assert_eq!(env_var("CRAB_TEST_SOURCES_EMPTY"), None);
		assert_eq!(env_var("CRAB_TEST_SOURCES_UNSET"), None);
	}
}
