// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Reading and writing crontab text.
//!
//! Besides job lines, a crontab may carry variable assignments. Three are
//! interpreted here:
//!
//! - `CRON_TZ` sets the timezone of the jobs that follow it,
//! - `CRABID` names the next job (a command may also start with `CRABID=x`),
//! - everything else, e.g. `CRABCLIENTHOSTNAME` or `CRABUSERNAME`, is passed
//!   through in [`Observation::vars`].

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::LazyLock;

use crate::schedule::{is_valid_time, validate_timezone};
use crate::Job;

static VARIABLE_RE: LazyLock<Regex> =
	LazyLock::new(|| Regex::new(r"^([A-Za-z_][A-Za-z0-9_]*)\s*=\s*(.*)$").unwrap());

static FIELDS_RE: LazyLock<Regex> =
	LazyLock::new(|| Regex::new(r"^(\S+\s+\S+\s+\S+\s+\S+\s+\S+)\s+(\S.*)$").unwrap());

static KEYWORD_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^(@\w+)\s+(\S.*)$").unwrap());

static INLINE_CRABID_RE: LazyLock<Regex> =
	LazyLock::new(|| Regex::new(r"^CRABID=(\S+)\s+(\S.*)$").unwrap());

/// One job as declared in a crontab.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Observation {
	pub crabid: Option<String>,
	pub command: String,
	pub time: Option<String>,
	pub timezone: Option<String>,
	/// Variables in effect for this job
	pub vars: BTreeMap<String, String>,
	/// The source line, for messages about this job
	pub rule: String,
}

/// Parse crontab text into job observations.
///
/// Lines that cannot be understood are skipped and described in the
/// returned warnings; parsing itself never fails. `timezone` applies to
/// jobs not covered by a `CRON_TZ` assignment.
pub fn parse_crontab(text: &str, timezone: Option<&str>) -> (Vec<Observation>, Vec<String>) {
	let mut jobs = Vec::new();
	let mut warnings = Vec::new();

	let mut current_tz = timezone.map(String::from);
	let mut crabid: Option<String> = None;
	let mut vars = BTreeMap::new();

	for line in text.lines() {
		let line = line.trim();
		if line.is_empty() || line.starts_with('#') {
			continue;
		}

		if let Some(caps) = VARIABLE_RE.captures(line) {
			let name = &caps[1];
			let value = unquote(caps[2].trim());
			match name {
				"CRON_TZ" => {
					if value.is_empty() {
						current_tz = timezone.map(String::from);
					} else if validate_timezone(value).is_ok() {
						current_tz = Some(value.to_string());
					} else {
						warnings.push(format!("Unknown timezone: {}", value));
						current_tz = timezone.map(String::from);
					}
				}
				"CRABID" => crabid = Some(value.to_string()),
				_ => {
					vars.insert(name.to_string(), value.to_string());
				}
			}
			continue;
		}

		let Some((time, command)) = split_job_line(line) else {
			warnings.push(format!("Did not recognise line: {}", line));
			continue;
		};

		if !is_valid_time(&time) {
			warnings.push(format!("Invalid schedule: {}", line));
			crabid = None;
			continue;
		}

		let (line_crabid, command) = match INLINE_CRABID_RE.captures(command) {
			Some(caps) => (Some(caps[1].to_string()), caps[2].to_string()),
			None => (None, command.to_string()),
		};

		jobs.push(Observation {
			crabid: line_crabid.or_else(|| crabid.take()),
			command,
			time: Some(time),
			timezone: current_tz.clone(),
			vars: vars.clone(),
			rule: line.to_string(),
		});

		// A CRABID line only names the job that directly follows it.
		crabid = None;
	}

	(jobs, warnings)
}

/// Split a job line into normalized time fields and the command.
fn split_job_line(line: &str) -> Option<(String, &str)> {
	if line.starts_with('@') {
		let caps = KEYWORD_RE.captures(line)?;
		let command = caps.get(2)?.as_str();
		return Some((caps[1].to_string(), command));
	}

	let caps = FIELDS_RE.captures(line)?;
	let time = caps[1].split_whitespace().collect::<Vec<_>>().join(" ");
	let command = caps.get(2)?.as_str();
	Some((time, command))
}

fn unquote(value: &str) -> &str {
	for quote in ['"', '\''] {
		if value.len() >= 2 && value.starts_with(quote) && value.ends_with(quote) {
			return &value[1..value.len() - 1];
		}
	}
	value
}

/// Render jobs as crontab text.
///
/// `CRON_TZ` lines are written whenever the timezone changes and `CRABID`
/// lines precede jobs that have one, so [`parse_crontab`] reads the result
/// back as the same jobs. Jobs with no known schedule have only been seen
/// in start/finish reports and are written as comments.
pub fn write_crontab(jobs: &[Job]) -> String {
	let mut lines = Vec::new();
	let mut current_tz: Option<&str> = None;

	for job in jobs {
		let Some(time) = job.time.as_deref() else {
			lines.push(format!("# {}", job.command));
			continue;
		};

		let tz = job.timezone.as_deref();
		if tz != current_tz {
			lines.push(format!("CRON_TZ={}", tz.unwrap_or_default()));
			current_tz = tz;
		}

		if let Some(crabid) = &job.crabid {
			lines.push(format!("CRABID={}", crabid));
		}

		lines.push(format!("{} {}", time, job.command));
	}

	let mut text = lines.join("\n");
	if !text.is_empty() {
		text.push('\n');
	}
	text
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::JobId;
	use chrono::Utc;
	use proptest::prelude::*;

	fn job(id: i64, crabid: Option<&str>, command: &str, time: Option<&str>, tz: Option<&str>) -> Job {
		Job {
			id: JobId(id),
			host: "host1".to_string(),
			user: "alice".to_string(),
			crabid: crabid.map(String::from),
			command: command.to_string(),
			time: time.map(String::from),
			timezone: tz.map(String::from),
			installed: Utc::now(),
			deleted: None,
		}
	}

	#[test]
	fn parses_plain_jobs() {
		let text = "# backups\n\n0 2 * * * /usr/bin/backup --all\n@hourly  echo tick\n";
		let (jobs, warnings) = parse_crontab(text, None);
		assert!(warnings.is_empty());
		assert_eq!(jobs.len(), 2);
		assert_eq!(jobs[0].time.as_deref(), Some("0 2 * * *"));
		assert_eq!(jobs[0].command, "/usr/bin/backup --all");
		assert_eq!(jobs[0].crabid, None);
		assert_eq!(jobs[0].rule, "0 2 * * * /usr/bin/backup --all");
		assert_eq!(jobs[1].time.as_deref(), Some("@hourly"));
		assert_eq!(jobs[1].command, "echo tick");
	}

	#[test]
	fn normalizes_field_spacing() {
		let (jobs, _) = parse_crontab("0   2\t* *  *   run it", None);
		assert_eq!(jobs[0].time.as_deref(), Some("0 2 * * *"));
		assert_eq!(jobs[0].command, "run it");
	}

	#[test]
	fn crabid_line_applies_to_next_job_only() {
		let text = "CRABID=nightly\n0 0 * * * first\n0 1 * * * second\n";
		let (jobs, _) = parse_crontab(text, None);
		assert_eq!(jobs[0].crabid.as_deref(), Some("nightly"));
		assert_eq!(jobs[1].crabid, None);
	}

	#[test]
	fn inline_crabid_is_stripped_from_command() {
		let (jobs, _) = parse_crontab("*/5 * * * * CRABID=poll FOO=1 poll.sh", None);
		assert_eq!(jobs[0].crabid.as_deref(), Some("poll"));
		assert_eq!(jobs[0].command, "FOO=1 poll.sh");
	}

	#[test]
	fn timezone_handling() {
		let text = "0 0 * * * a\nCRON_TZ=Europe/Paris\n0 0 * * * b\nCRON_TZ=\n0 0 * * * c\n";
		let (jobs, warnings) = parse_crontab(text, Some("UTC"));
		assert!(warnings.is_empty());
		assert_eq!(jobs[0].timezone.as_deref(), Some("UTC"));
		assert_eq!(jobs[1].timezone.as_deref(), Some("Europe/Paris"));
		assert_eq!(jobs[2].timezone.as_deref(), Some("UTC"));
	}

	#[test]
	fn unknown_timezone_warns_and_resets() {
		let text = "CRON_TZ=Europe/Paris\nCRON_TZ=Mars/Olympus\n0 0 * * * a\n";
		let (jobs, warnings) = parse_crontab(text, None);
		assert_eq!(warnings, vec!["Unknown timezone: Mars/Olympus".to_string()]);
		assert_eq!(jobs[0].timezone, None);
	}

	#[test]
	fn variables_are_carried_forward() {
		let text = "0 0 * * * a\nCRABUSERNAME=\"bob\"\nCRABCLIENTHOSTNAME=h2\n0 0 * * * b\n";
		let (jobs, _) = parse_crontab(text, None);
		assert!(jobs[0].vars.is_empty());
		assert_eq!(jobs[1].vars.get("CRABUSERNAME").map(String::as_str), Some("bob"));
		assert_eq!(jobs[1].vars.get("CRABCLIENTHOSTNAME").map(String::as_str), Some("h2"));
	}

	#[test]
	fn malformed_lines_warn_and_continue() {
		let text = "this is nonsense\n* * * *\n0 0 * * * ok\n@fortnightly run\n0 0 * * $x run\n";
		let (jobs, warnings) = parse_crontab(text, None);
		assert_eq!(jobs.len(), 1);
		assert_eq!(jobs[0].command, "ok");
		assert_eq!(warnings.len(), 4);
		assert_eq!(warnings[0], "Did not recognise line: this is nonsense");
		assert_eq!(warnings[2], "Invalid schedule: @fortnightly run");
	}

	#[test]
	fn write_emits_timezone_and_crabid_lines() {
		let jobs = vec![
			job(1, None, "a", Some("0 0 * * *"), None),
			job(2, Some("bee"), "b", Some("@daily"), Some("Europe/Paris")),
			job(3, None, "c", Some("5 * * * *"), Some("Europe/Paris")),
			job(4, None, "d", Some("5 * * * *"), None),
			job(5, None, "reported only", None, None),
		];
		assert_eq!(
			write_crontab(&jobs),
			"0 0 * * * a\n\
			 CRON_TZ=Europe/Paris\n\
			 CRABID=bee\n\
			 @daily b\n\
			 5 * * * * c\n\
			 CRON_TZ=\n\
			 5 * * * * d\n\
			 # reported only\n"
		);
	}

	#[test]
	fn write_empty() {
		assert_eq!(write_crontab(&[]), "");
	}

	#[test]
	fn write_then_parse_reproduces_jobs() {
		let jobs = vec![
			job(1, Some("x"), "echo x", Some("0 0 * * *"), None),
			job(2, None, "echo y", Some("*/10 * * * 1-5"), Some("Asia/Tokyo")),
			job(3, Some("z"), "echo z", Some("@weekly"), Some("Asia/Tokyo")),
		];
		let (parsed, warnings) = parse_crontab(&write_crontab(&jobs), None);
		assert!(warnings.is_empty());
		assert_eq!(parsed.len(), jobs.len());
		for (job, obs) in jobs.iter().zip(&parsed) {
			assert_eq!(obs.crabid, job.crabid);
			assert_eq!(obs.command, job.command);
			assert_eq!(obs.time, job.time);
			assert_eq!(obs.timezone, job.timezone);
		}
	}

	proptest! {
		#[test]
		fn parse_never_panics(text in "(?s).{0,200}") {
			let _ = parse_crontab(&text, None);
		}

		#[test]
		fn roundtrip_simple_commands(
			commands in proptest::collection::vec("[a-z][a-z0-9 ./-]{0,20}[a-z0-9]", 1..5),
			crabids in proptest::collection::vec(proptest::option::of("[a-z][a-z0-9_-]{0,8}"), 5),
		) {
			let jobs: Vec<Job> = commands
				.iter()
				.enumerate()
				.map(|(i, cmd)| job(i as i64, crabids[i].as_deref(), cmd, Some("15 3 * * *"), None))
				.collect();
			let (parsed, warnings) = parse_crontab(&write_crontab(&jobs), None);
			prop_assert!(warnings.is_empty());
			prop_assert_eq!(parsed.len(), jobs.len());
			for (job, obs) in jobs.iter().zip(&parsed) {
				prop_assert_eq!(&obs.crabid, &job.crabid);
				prop_assert_eq!(&obs.command, &job.command);
			}
		}
	}
}
