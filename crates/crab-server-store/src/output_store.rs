// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Separate storage for job output and raw crontabs.
//!
//! When an [`OutputStore`] is configured the engine writes output there
//! instead of into the job store. Raw crontabs follow the same route when
//! the output store also implements [`RawCrontabStore`].

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tracing::instrument;

use crab_core::{JobOutput, OutputKey};

use crate::error::{Result, StoreError};

#[async_trait]
pub trait OutputStore: Send + Sync {
	async fn write_job_output(&self, output: &JobOutput) -> Result<()>;

	/// Returns `(stdout, stderr)` or `None` if nothing was stored for the key.
	async fn get_job_output(&self, key: &OutputKey) -> Result<Option<(String, String)>>;

	/// Raw crontab storage, if this store provides it.
	fn raw_crontabs(&self) -> Option<&dyn RawCrontabStore> {
		None
	}
}

#[async_trait]
pub trait RawCrontabStore: Send + Sync {
	async fn write_raw_crontab(&self, host: &str, user: &str, crontab: &str) -> Result<()>;
	async fn get_raw_crontab(&self, host: &str, user: &str) -> Result<Option<String>>;
}

/// Output store that keeps plain files under a root directory.
///
/// ```text
/// <root>/output/<host>/<user>/<crabid or job id>/<finish id>.stdout
/// <root>/output/<host>/<user>/<crabid or job id>/<finish id>.stderr
/// <root>/crontab/<host>/<user>
/// ```
#[derive(Debug, Clone)]
pub struct FileOutputStore {
	root: PathBuf,
}

impl FileOutputStore {
	pub fn new(root: impl Into<PathBuf>) -> Self {
		Self { root: root.into() }
	}

	pub fn root(&self) -> &Path {
		&self.root
	}

	fn output_dir(&self, key: &OutputKey) -> Result<PathBuf> {
		let job_dir = match &key.crabid {
			Some(crabid) => crabid.clone(),
			None => key.job_id.to_string(),
		};
		Ok(self
			.root
			.join("output")
			.join(checked_component(&key.host)?)
			.join(checked_component(&key.user)?)
			.join(checked_component(&job_dir)?))
	}

	fn crontab_path(&self, host: &str, user: &str) -> Result<PathBuf> {
		Ok(self
			.root
			.join("crontab")
			.join(checked_component(host)?)
			.join(checked_component(user)?))
	}
}

#[async_trait]
impl OutputStore for FileOutputStore {
	#[instrument(skip(self, output), fields(finish_id = %output.key.finish_id, job_id = %output.key.job_id))]
	async fn write_job_output(&self, output: &JobOutput) -> Result<()> {
		let dir = self.output_dir(&output.key)?;
		tokio::fs::create_dir_all(&dir).await.map_err(sink_error)?;

		let finish = output.key.finish_id.to_string();
		tokio::fs::write(dir.join(format!("{finish}.stdout")), &output.stdout)
			.await
			.map_err(sink_error)?;
		tokio::fs::write(dir.join(format!("{finish}.stderr")), &output.stderr)
			.await
			.map_err(sink_error)?;

		tracing::debug!(dir = %dir.display(), "wrote job output");
		Ok(())
	}

	#[instrument(skip(self, key), fields(finish_id = %key.finish_id, job_id = %key.job_id))]
	async fn get_job_output(&self, key: &OutputKey) -> Result<Option<(String, String)>> {
		let dir = self.output_dir(key)?;
		let finish = key.finish_id.to_string();

		let stdout = read_optional(&dir.join(format!("{finish}.stdout"))).await?;
		let stderr = read_optional(&dir.join(format!("{finish}.stderr"))).await?;

		if stdout.is_none() && stderr.is_none() {
			return Ok(None);
		}
		Ok(Some((stdout.unwrap_or_default(), stderr.unwrap_or_default())))
	}

	fn raw_crontabs(&self) -> Option<&dyn RawCrontabStore> {
		Some(self)
	}
}

#[async_trait]
impl RawCrontabStore for FileOutputStore {
	#[instrument(skip(self, crontab))]
	async fn write_raw_crontab(&self, host: &str, user: &str, crontab: &str) -> Result<()> {
		let path = self.crontab_path(host, user)?;
		if let Some(parent) = path.parent() {
			tokio::fs::create_dir_all(parent).await.map_err(sink_error)?;
		}
		tokio::fs::write(&path, crontab).await.map_err(sink_error)?;
		Ok(())
	}

	#[instrument(skip(self))]
	async fn get_raw_crontab(&self, host: &str, user: &str) -> Result<Option<String>> {
		read_optional(&self.crontab_path(host, user)?).await
	}
}

/// Reject anything that would not stay a single directory entry.
fn checked_component(value: &str) -> Result<&str> {
	if value.is_empty()
		|| value == "."
		|| value == ".."
		|| value.contains(['/', '\\', '\0'])
	{
		return Err(StoreError::InvalidPath(value.to_string()));
	}
	Ok(value)
}

async fn read_optional(path: &Path) -> Result<Option<String>> {
	match tokio::fs::read_to_string(path).await {
		Ok(content) => Ok(Some(content)),
		Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
		Err(e) => Err(sink_error(e)),
	}
}

fn sink_error(e: std::io::Error) -> StoreError {
	StoreError::SinkUnavailable(e.to_string())
}

#[cfg(test)]
mod tests {
	use super::*;
	use crab_core::{FinishId, JobId};
	use tempfile::TempDir;

	fn key(crabid: Option<&str>) -> OutputKey {
		OutputKey {
			finish_id: FinishId(7),
			host: "web1".to_string(),
			user: "deploy".to_string(),
			job_id: JobId(3),
			crabid: crabid.map(String::from),
		}
	}

	#[tokio::test]
	async fn test_write_and_read_output() {
		let dir = TempDir::new().unwrap();
		let store = FileOutputStore::new(dir.path());

		let output = JobOutput::from_streams(key(Some("backup")), Some("done"), Some("warn")).unwrap();
		store.write_job_output(&output).await.unwrap();

		assert!(dir.path().join("output/web1/deploy/backup/7.stdout").exists());
		assert_eq!(
			store.get_job_output(&key(Some("backup"))).await.unwrap(),
			Some(("done".to_string(), "warn".to_string()))
		);
	}

	#[tokio::test]
	async fn test_output_without_crabid_uses_job_id() {
		let dir = TempDir::new().unwrap();
		let store = FileOutputStore::new(dir.path());

		let output = JobOutput::from_streams(key(None), Some("x"), None).unwrap();
		store.write_job_output(&output).await.unwrap();

		assert!(dir.path().join("output/web1/deploy/3/7.stdout").exists());
		assert!(store.get_job_output(&key(Some("other"))).await.unwrap().is_none());
		assert_eq!(
			store.get_job_output(&key(None)).await.unwrap(),
			Some(("x".to_string(), String::new()))
		);
	}

	#[tokio::test]
	async fn test_missing_output_is_none() {
		let dir = TempDir::new().unwrap();
		let store = FileOutputStore::new(dir.path());
		assert!(store.get_job_output(&key(None)).await.unwrap().is_none());
	}

	#[tokio::test]
	async fn test_rejects_path_traversal() {
		let dir = TempDir::new().unwrap();
		let store = FileOutputStore::new(dir.path());

		let mut bad = key(Some("../escape"));
		let output = JobOutput::from_streams(bad.clone(), Some("x"), None).unwrap();
		assert!(matches!(
			store.write_job_output(&output).await,
			Err(StoreError::InvalidPath(_))
		));

		bad.crabid = None;
		bad.host = "..".to_string();
		assert!(matches!(
			store.get_job_output(&bad).await,
			Err(StoreError::InvalidPath(_))
		));
	}

	#[tokio::test]
	async fn test_raw_crontab_roundtrip() {
		let dir = TempDir::new().unwrap();
		let store = FileOutputStore::new(dir.path());
		let raw = store.raw_crontabs().unwrap();

		assert!(raw.get_raw_crontab("web1", "deploy").await.unwrap().is_none());
		raw.write_raw_crontab("web1", "deploy", "@daily backup\n").await.unwrap();
		assert_eq!(
			raw.get_raw_crontab("web1", "deploy").await.unwrap().as_deref(),
			Some("@daily backup\n")
		);
		assert!(dir.path().join("crontab/web1/deploy").exists());
	}

	#[test]
	fn test_checked_component() {
		assert!(checked_component("host-1.example").is_ok());
		assert!(checked_component("").is_err());
		assert!(checked_component(".").is_err());
		assert!(checked_component("a/b").is_err());
		assert!(checked_component("a\\b").is_err());
	}
}
