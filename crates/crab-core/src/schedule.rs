// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Crontab schedule checks and next run calculation.

use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use cron::Schedule;
use std::str::FromStr;

use crate::error::{CrabError, Result};

/// `@` shortcuts accepted in place of the five time fields.
pub const SCHEDULE_KEYWORDS: [&str; 8] = [
	"@reboot",
	"@yearly",
	"@annually",
	"@monthly",
	"@weekly",
	"@daily",
	"@midnight",
	"@hourly",
];

/// Check that a schedule looks like something cron accepts.
///
/// This is a syntactic check only: five fields made of numbers, names,
/// `*`, `-`, `/` and `,`, or one of the `@` keywords. Range errors are
/// left for cron itself to report.
pub fn is_valid_time(time: &str) -> bool {
	if time.starts_with('@') {
		return SCHEDULE_KEYWORDS.contains(&time);
	}

	let fields: Vec<&str> = time.split_whitespace().collect();
	fields.len() == 5
		&& fields.iter().all(|field| {
			field
				.chars()
				.all(|c| c.is_ascii_alphanumeric() || matches!(c, '*' | '-' | '/' | ','))
		})
}

/// Validate an IANA timezone name.
pub fn validate_timezone(timezone: &str) -> Result<Tz> {
	timezone
		.parse()
		.map_err(|_| CrabError::InvalidTimezone(timezone.to_string()))
}

/// Calculate when a job is next due after the given instant.
///
/// Returns `None` for `@reboot`, which has no place on the calendar.
/// Schedules are interpreted in `timezone`, or UTC when it is not set.
pub fn next_run(
	time: &str,
	timezone: Option<&str>,
	after: DateTime<Utc>,
) -> Result<Option<DateTime<Utc>>> {
	let Some(expression) = expand_keyword(time) else {
		return Ok(None);
	};

	let schedule = Schedule::from_str(&to_cron_crate_format(&expression))
		.map_err(|e| CrabError::InvalidSchedule(format!("{time}: {e}")))?;

	let tz = match timezone {
		Some(name) => validate_timezone(name)?,
		None => Tz::UTC,
	};

	Ok(schedule
		.after(&after.with_timezone(&tz))
		.next()
		.map(|next| next.with_timezone(&Utc)))
}

fn expand_keyword(time: &str) -> Option<String> {
	let expanded = match time {
		"@reboot" => return None,
		"@yearly" | "@annually" => "0 0 1 1 *",
		"@monthly" => "0 0 1 * *",
		"@weekly" => "0 0 * * 0",
		"@daily" | "@midnight" => "0 0 * * *",
		"@hourly" => "0 * * * *",
		other => other,
	};
	Some(expanded.to_string())
}

/// Convert five crontab fields to the seven-field form of the `cron` crate.
///
/// Seconds are pinned to 0 and any year matches. Crontab numbers days of
/// the week 0-7 from Sunday, the `cron` crate 1-7 from Sunday.
fn to_cron_crate_format(expression: &str) -> String {
	let fields: Vec<&str> = expression.split_whitespace().collect();
	if fields.len() != 5 {
		return expression.to_string();
	}
	format!(
		"0 {} {} {} {} {} *",
		fields[0],
		fields[1],
		fields[2],
		fields[3],
		convert_day_of_week(fields[4])
	)
}

fn convert_day_of_week(field: &str) -> String {
	field
		.split(',')
		.map(|item| {
			let (range, step) = match item.split_once('/') {
				Some((range, step)) => (range, Some(step)),
				None => (item, None),
			};
			let range = match range.split_once('-') {
				Some((start, end)) => match (start.parse::<u8>(), end.parse::<u8>()) {
					// Ranges running up to Sunday as 7 wrap in the cron crate's numbering.
					(Ok(start), Ok(7)) if start > 0 && step.is_none() => {
						format!("{}-7,1", start + 1)
					}
					(Ok(start), Ok(end)) => format!("{}-{}", shift_day(start), shift_day(end)),
					_ => range.to_string(),
				},
				None => match range.parse::<u8>() {
					Ok(day) => shift_day(day).to_string(),
					Err(_) => range.to_string(),
				},
			};
			match step {
				Some(step) => format!("{range}/{step}"),
				None => range,
			}
		})
		.collect::<Vec<_>>()
		.join(",")
}

fn shift_day(day: u8) -> u8 {
	if day == 7 {
		1
	} else {
		day + 1
	}
}
