// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Mapping of job sightings onto stored job records.
//!
//! A sighting is anything that names a job: a crontab line, a start report
//! or a finish report. Resolution finds the record it refers to, bringing
//! the record up to date or creating it as needed, so that repeated
//! sightings of the same job always land on the same id.
//!
//! With a crabid the crabid is authoritative: a record holding that crabid
//! is used even if the command changed, otherwise an anonymous record with
//! the same command is adopted. Without a crabid the command identifies the
//! job. Fields the sighting does not carry never count as a change.

use tracing::instrument;

use crab_core::{Job, JobFilter, JobId, JobUpdate, NewJob};

use crate::error::{Result, StoreError};
use crate::port::StoreTransaction;

/// A job as seen by a crontab import or an execution report.
#[derive(Debug, Clone, Copy)]
pub struct Sighting<'a> {
	pub host: &'a str,
	pub user: &'a str,
	pub crabid: Option<&'a str>,
	pub command: &'a str,
	pub time: Option<&'a str>,
	pub timezone: Option<&'a str>,
}

/// What resolution did to the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resolution {
	/// The record already matched.
	Unchanged,
	/// The record was changed or undeleted.
	Updated,
	/// An anonymous record was given the sighting's crabid.
	Adopted,
	/// A new record was created.
	Inserted,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Resolved {
	pub id: JobId,
	pub action: Resolution,
}

enum Lookup {
	Found(Job),
	NotFound,
}

/// Resolve a sighting to a job id within the caller's transaction.
#[instrument(skip(tx, sighting), fields(host = %sighting.host, user = %sighting.user, crabid = ?sighting.crabid))]
pub async fn resolve_job(
	tx: &mut dyn StoreTransaction,
	sighting: &Sighting<'_>,
) -> Result<Resolved> {
	let scope = JobFilter::scope(sighting.host, sighting.user).include_deleted();

	if let Some(crabid) = sighting.crabid {
		if let Lookup::Found(job) = first(tx, scope.clone().with_crabid(crabid)).await? {
			if !needs_update(&job, sighting, true) {
				return Ok(Resolved {
					id: job.id,
					action: Resolution::Unchanged,
				});
			}
			let update = JobUpdate {
				crabid: None,
				command: Some(sighting.command.to_string()),
				time: sighting.time.map(String::from),
				timezone: sighting.timezone.map(String::from),
			};
			tx.update_job(job.id, &update).await?;
			tracing::debug!(job_id = %job.id, "updated job identified by crabid");
			return Ok(Resolved {
				id: job.id,
				action: Resolution::Updated,
			});
		}

		let anonymous = scope
			.clone()
			.with_command(sighting.command)
			.without_crabid();
		if let Lookup::Found(job) = first(tx, anonymous).await? {
			let update = JobUpdate {
				crabid: Some(crabid.to_string()),
				command: None,
				time: sighting.time.map(String::from),
				timezone: sighting.timezone.map(String::from),
			};
			tx.update_job(job.id, &update).await?;
			tracing::debug!(job_id = %job.id, crabid, "adopted anonymous job");
			return Ok(Resolved {
				id: job.id,
				action: Resolution::Adopted,
			});
		}
	} else if let Lookup::Found(job) = first(tx, scope.with_command(sighting.command)).await? {
		if !needs_update(&job, sighting, false) {
			return Ok(Resolved {
				id: job.id,
				action: Resolution::Unchanged,
			});
		}
		let update = JobUpdate {
			crabid: None,
			command: None,
			time: sighting.time.map(String::from),
			timezone: sighting.timezone.map(String::from),
		};
		tx.update_job(job.id, &update).await?;
		tracing::debug!(job_id = %job.id, "updated job identified by command");
		return Ok(Resolved {
			id: job.id,
			action: Resolution::Updated,
		});
	}

	let new_job = NewJob {
		host: sighting.host.to_string(),
		user: sighting.user.to_string(),
		crabid: sighting.crabid.map(String::from),
		command: sighting.command.to_string(),
		time: sighting.time.map(String::from),
		timezone: sighting.timezone.map(String::from),
	};
	let id = tx.insert_job(&new_job).await?.ok_or_else(|| {
		tracing::error!(host = sighting.host, user = sighting.user, "inserted job has no id");
		StoreError::StoreConsistency(format!(
			"inserted job for {}@{} but no id was returned",
			sighting.user, sighting.host
		))
	})?;
	tracing::info!(job_id = %id, host = sighting.host, user = sighting.user, "new job");

	Ok(Resolved {
		id,
		action: Resolution::Inserted,
	})
}

/// Lowest-id match, so older records win when several qualify.
async fn first(tx: &mut dyn StoreTransaction, filter: JobFilter) -> Result<Lookup> {
	Ok(match tx.get_jobs(&filter).await?.into_iter().next() {
		Some(job) => Lookup::Found(job),
		None => Lookup::NotFound,
	})
}

fn needs_update(job: &Job, sighting: &Sighting<'_>, compare_command: bool) -> bool {
	fn differs(stored: Option<&str>, seen: Option<&str>) -> bool {
		seen.is_some() && seen != stored
	}

	job.is_deleted()
		|| (compare_command && job.command != sighting.command)
		|| differs(job.time.as_deref(), sighting.time)
		|| differs(job.timezone.as_deref(), sighting.timezone)
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::port::JobStore;
	use crate::testing::create_test_store;

	fn sighting<'a>(crabid: Option<&'a str>, command: &'a str, time: Option<&'a str>) -> Sighting<'a> {
		Sighting {
			host: "h",
			user: "u",
			crabid,
			command,
			time,
			timezone: None,
		}
	}

	#[tokio::test]
	async fn test_repeated_sighting_is_unchanged() {
		let store = create_test_store().await;
		let mut tx = store.begin().await.unwrap();

		let s = sighting(None, "backup.sh", Some("0 2 * * *"));
		let first = resolve_job(&mut *tx, &s).await.unwrap();
		assert_eq!(first.action, Resolution::Inserted);

		let second = resolve_job(&mut *tx, &s).await.unwrap();
		assert_eq!(second.id, first.id);
		assert_eq!(second.action, Resolution::Unchanged);
	}

	#[tokio::test]
	async fn test_missing_time_is_wildcard() {
		let store = create_test_store().await;
		let mut tx = store.begin().await.unwrap();

		let scheduled = resolve_job(&mut *tx, &sighting(None, "job", Some("@hourly")))
			.await
			.unwrap();
		let reported = resolve_job(&mut *tx, &sighting(None, "job", None)).await.unwrap();
		assert_eq!(reported.id, scheduled.id);
		assert_eq!(reported.action, Resolution::Unchanged);

		let job = tx.get_job(scheduled.id).await.unwrap().unwrap();
		assert_eq!(job.time.as_deref(), Some("@hourly"));
	}

	#[tokio::test]
	async fn test_crabid_adopts_anonymous_job() {
		let store = create_test_store().await;
		let mut tx = store.begin().await.unwrap();

		let anon = resolve_job(&mut *tx, &sighting(None, "sync.sh", Some("@daily")))
			.await
			.unwrap();
		let named = resolve_job(&mut *tx, &sighting(Some("sync"), "sync.sh", Some("@daily")))
			.await
			.unwrap();
		assert_eq!(named.id, anon.id);
		assert_eq!(named.action, Resolution::Adopted);

		let job = tx.get_job(anon.id).await.unwrap().unwrap();
		assert_eq!(job.crabid.as_deref(), Some("sync"));
	}

	#[tokio::test]
	async fn test_crabid_follows_command_change() {
		let store = create_test_store().await;
		let mut tx = store.begin().await.unwrap();

		let old = resolve_job(&mut *tx, &sighting(Some("rep"), "report --v1", Some("@daily")))
			.await
			.unwrap();
		let new = resolve_job(&mut *tx, &sighting(Some("rep"), "report --v2", Some("@daily")))
			.await
			.unwrap();
		assert_eq!(new.id, old.id);
		assert_eq!(new.action, Resolution::Updated);
		assert_eq!(tx.get_job(old.id).await.unwrap().unwrap().command, "report --v2");
	}

	#[tokio::test]
	async fn test_deleted_job_is_restored() {
		let store = create_test_store().await;
		let mut tx = store.begin().await.unwrap();

		let s = sighting(None, "cleanup", Some("@weekly"));
		let first = resolve_job(&mut *tx, &s).await.unwrap();
		tx.delete_job(first.id).await.unwrap();

		let again = resolve_job(&mut *tx, &s).await.unwrap();
		assert_eq!(again.id, first.id);
		assert_eq!(again.action, Resolution::Updated);
		assert!(!tx.get_job(first.id).await.unwrap().unwrap().is_deleted());
	}

	#[tokio::test]
	async fn test_different_crabids_same_command_are_distinct() {
		let store = create_test_store().await;
		let mut tx = store.begin().await.unwrap();

		let a = resolve_job(&mut *tx, &sighting(Some("a"), "run", None)).await.unwrap();
		let b = resolve_job(&mut *tx, &sighting(Some("b"), "run", None)).await.unwrap();
		assert_ne!(a.id, b.id);
		assert_eq!(b.action, Resolution::Inserted);
	}

	#[tokio::test]
	async fn test_scope_separates_users() {
		let store = create_test_store().await;
		let mut tx = store.begin().await.unwrap();

		let mine = resolve_job(&mut *tx, &sighting(None, "x", None)).await.unwrap();
		let theirs = resolve_job(
			&mut *tx,
			&Sighting {
				user: "other",
				..sighting(None, "x", None)
			},
		)
		.await
		.unwrap();
		assert_ne!(mine.id, theirs.id);
	}
}
