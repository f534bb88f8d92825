// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Reconciling stored jobs with an imported crontab.

use std::collections::BTreeSet;
use std::fmt;

use serde::{Deserialize, Serialize};
use tracing::instrument;

use crab_core::{parse_crontab, JobFilter, JobId, Observation};

use crate::engine::CrabEngine;
use crate::error::Result;
use crate::resolver::{resolve_job, Sighting};

/// Crontab variable naming the host a job is meant for.
pub const HOSTNAME_VAR: &str = "CRABCLIENTHOSTNAME";
/// Crontab variable naming the user a job is meant for.
pub const USERNAME_VAR: &str = "CRABUSERNAME";

/// A non-fatal problem found while importing a crontab.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SyncWarning {
	/// A line the crontab parser could not use.
	Codec { message: String },
	SkippedHost { rule: String },
	SkippedUser { rule: String },
	/// Two lines resolved to the same job.
	Duplicate { rule: String },
}

impl fmt::Display for SyncWarning {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			SyncWarning::Codec { message } => f.write_str(message),
			SyncWarning::SkippedHost { rule } => {
				write!(f, "Skipped job for other hostname: {rule}")
			}
			SyncWarning::SkippedUser { rule } => write!(f, "Skipped job for other user: {rule}"),
			SyncWarning::Duplicate { rule } => {
				write!(f, "Indistinguishable duplicated job: {rule}")
			}
		}
	}
}

/// Ids present before an import that the import did not see.
pub fn stale_ids(snapshot: &BTreeSet<JobId>, observed: &BTreeSet<JobId>) -> BTreeSet<JobId> {
	snapshot.difference(observed).copied().collect()
}

/// Why an observation is excluded from this host and user, if it is.
fn filter_observation(obs: &Observation, host: &str, user: &str) -> Option<SyncWarning> {
	let rule = || obs.rule.clone();
	match obs.vars.get(HOSTNAME_VAR) {
		Some(h) if h != host => return Some(SyncWarning::SkippedHost { rule: rule() }),
		_ => {}
	}
	match obs.vars.get(USERNAME_VAR) {
		Some(u) if u != user => Some(SyncWarning::SkippedUser { rule: rule() }),
		_ => None,
	}
}

impl CrabEngine {
	/// Import a user's crontab.
	///
	/// Every job line is resolved to a stored job and active jobs of this
	/// host and user that no longer appear are marked deleted. The raw text
	/// is kept for [`CrabEngine::get_raw_crontab`]. With `allow_filter`,
	/// lines addressed to another host or user through
	/// `CRABCLIENTHOSTNAME` or `CRABUSERNAME` are skipped.
	#[instrument(skip(self, crontab), fields(lines = crontab.lines().count()))]
	pub async fn sync_crontab(
		&self,
		host: &str,
		user: &str,
		crontab: &str,
		timezone: Option<&str>,
		allow_filter: bool,
	) -> Result<Vec<SyncWarning>> {
		self.write_raw_crontab(host, user, crontab).await?;

		let mut tx = self.store.begin().await?;

		let snapshot: BTreeSet<JobId> = tx
			.get_jobs(&JobFilter::scope(host, user))
			.await?
			.into_iter()
			.map(|job| job.id)
			.collect();

		let (observations, codec_warnings) = parse_crontab(crontab, timezone);
		let mut warnings: Vec<SyncWarning> = codec_warnings
			.into_iter()
			.map(|message| SyncWarning::Codec { message })
			.collect();

		let mut observed = BTreeSet::new();
		for obs in &observations {
			if allow_filter {
				if let Some(skipped) = filter_observation(obs, host, user) {
					tracing::debug!(rule = %obs.rule, "skipping job for another host or user");
					warnings.push(skipped);
					continue;
				}
			}

			let sighting = Sighting {
				host,
				user,
				crabid: obs.crabid.as_deref(),
				command: &obs.command,
				time: obs.time.as_deref(),
				timezone: obs.timezone.as_deref(),
			};
			let resolved = resolve_job(&mut *tx, &sighting).await?;

			if !observed.insert(resolved.id) {
				warnings.push(SyncWarning::Duplicate {
					rule: obs.rule.clone(),
				});
			}
		}

		let stale = stale_ids(&snapshot, &observed);
		for id in &stale {
			tx.delete_job(*id).await?;
		}

		tx.commit().await?;

		tracing::info!(
			host,
			user,
			jobs = observed.len(),
			deleted = stale.len(),
			warnings = warnings.len(),
			"crontab imported"
		);
		Ok(warnings)
	}

	async fn write_raw_crontab(&self, host: &str, user: &str, crontab: &str) -> Result<()> {
		if let Some(raw) = self.output_store.as_deref().and_then(|s| s.raw_crontabs()) {
			return raw.write_raw_crontab(host, user, crontab).await;
		}
		let mut tx = self.store.begin().await?;
		tx.write_raw_crontab(host, user, crontab).await?;
		tx.commit().await
	}
}
