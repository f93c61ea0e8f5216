// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Schedule parsing and next run calculation.

use std::str::FromStr;
use std::time::Duration;

use chrono::{DateTime, Datelike, LocalResult, NaiveDate, NaiveDateTime, TimeZone, Timelike};

use crate::error::{CronError, Result};
use crate::field::{parse_field, Field, FieldSet};

/// Named shortcuts and the 5-field expressions they stand for.
const SHORTCUTS: &[(&str, &str)] = &[
	("@yearly", "0 0 1 1 *"),
	("@annually", "0 0 1 1 *"),
	("@monthly", "0 0 1 * *"),
	("@weekly", "0 0 * * 0"),
	("@daily", "0 0 * * *"),
	("@midnight", "0 0 * * *"),
	("@hourly", "0 * * * *"),
];

/// How far ahead `next_after` searches before giving up.
///
/// Four years so that a leap-day schedule such as `0 0 29 2 *` is always found.
const SEARCH_HORIZON_DAYS: i64 = 4 * 366;

/// A parsed schedule.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Schedule {
	/// Calendar match over the five cron fields.
	Cron(CronFields),
	/// Fixed interval from `@every <duration>`.
	Every(Duration),
}

/// The value sets of a 5-field cron expression. None of them is ever empty.
///
/// Day-of-month and day-of-week are combined with AND: `0 0 13 * 5` only
/// fires on a Friday the 13th. Classic cron ORs these two fields when both
/// are restricted, so schedules ported from crontab may need adjusting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CronFields {
	pub minute: FieldSet,
	pub hour: FieldSet,
	pub day_of_month: FieldSet,
	pub month: FieldSet,
	/// 0 = Sunday through 6 = Saturday.
	pub day_of_week: FieldSet,
}

impl CronFields {
	fn parse(expr: &str) -> Result<Self> {
		let parts: Vec<&str> = expr.split_whitespace().collect();
		if parts.len() != Field::ALL.len() {
			return Err(CronError::FieldCount { found: parts.len() });
		}

		Ok(Self {
			minute: parse_field(parts[0], Field::Minute)?,
			hour: parse_field(parts[1], Field::Hour)?,
			day_of_month: parse_field(parts[2], Field::DayOfMonth)?,
			month: parse_field(parts[3], Field::Month)?,
			day_of_week: parse_field(parts[4], Field::DayOfWeek)?,
		})
	}

	/// Whether a calendar time satisfies all five fields.
	pub fn matches<T: Datelike + Timelike>(&self, time: &T) -> bool {
		self.minute.contains(time.minute())
			&& self.hour.contains(time.hour())
			&& self.day_matches(time)
			&& self.month.contains(time.month())
	}

	fn day_matches<T: Datelike>(&self, time: &T) -> bool {
		self.day_of_month.contains(time.day())
			&& self
				.day_of_week
				.contains(time.weekday().num_days_from_sunday())
	}

	/// First local minute strictly after `after` that matches, scanning at most
	/// [`SEARCH_HORIZON_DAYS`] ahead. Whole months, days and hours that cannot
	/// match are skipped in one step.
	fn next_local(&self, after: NaiveDateTime) -> Option<NaiveDateTime> {
		let mut candidate = after.with_second(0)?.with_nanosecond(0)? + chrono::Duration::minutes(1);
		let horizon = candidate + chrono::Duration::days(SEARCH_HORIZON_DAYS);

		while candidate < horizon {
			if !self.month.contains(candidate.month()) {
				candidate = first_of_next_month(candidate.date())?;
				continue;
			}
			if !self.day_matches(&candidate) {
				candidate = candidate.date().succ_opt()?.and_hms_opt(0, 0, 0)?;
				continue;
			}
			if !self.hour.contains(candidate.hour()) {
				candidate = candidate.date().and_hms_opt(candidate.hour(), 0, 0)?
					+ chrono::Duration::hours(1);
				continue;
			}
			if !self.minute.contains(candidate.minute()) {
				candidate += chrono::Duration::minutes(1);
				continue;
			}
			return Some(candidate);
		}
		None
	}
}

fn first_of_next_month(date: NaiveDate) -> Option<NaiveDateTime> {
	let (year, month) = if date.month() == 12 {
		(date.year() + 1, 1)
	} else {
		(date.year(), date.month() + 1)
	};
	NaiveDate::from_ymd_opt(year, month, 1)?.and_hms_opt(0, 0, 0)
}

impl Schedule {
	/// Parse a 5-field cron expression, a named shortcut (`@daily`, ...) or
	/// `@every <duration>`.
	pub fn parse(expr: &str) -> Result<Self> {
		let expr = expr.trim();
		if expr.is_empty() {
			return Err(CronError::Empty);
		}

		if let Some(rest) = expr.strip_prefix("@every") {
			if rest.is_empty() || rest.starts_with(char::is_whitespace) {
				return parse_every(rest.trim()).map(Schedule::Every);
			}
		}

		let expanded = SHORTCUTS
			.iter()
			.find(|(name, _)| *name == expr)
			.map(|(_, fields)| *fields)
			.unwrap_or(expr);

		CronFields::parse(expanded).map(Schedule::Cron)
	}

	/// The fixed interval of an `@every` schedule.
	pub fn interval(&self) -> Option<Duration> {
		match self {
			Schedule::Every(interval) => Some(*interval),
			Schedule::Cron(_) => None,
		}
	}

	/// Earliest time after `after` that satisfies the schedule.
	///
	/// Cron schedules are evaluated on the wall clock of `after`'s timezone and
	/// always return a time strictly later than `after`. Local times skipped by
	/// a DST transition never match; repeated local times resolve to the
	/// earliest instant that is still after `after`. Returns `None` when no
	/// match exists within four years (e.g. `0 0 30 2 *`).
	pub fn next_after<Tz: TimeZone>(&self, after: &DateTime<Tz>) -> Option<DateTime<Tz>> {
		match self {
			Schedule::Every(interval) => {
				let delta = chrono::Duration::from_std(*interval).ok()?;
				after.clone().checked_add_signed(delta)
			}
			Schedule::Cron(fields) => {
				let tz = after.timezone();
				let mut local = after.naive_local();
				let limit = local + chrono::Duration::days(SEARCH_HORIZON_DAYS);
				loop {
					local = fields.next_local(local)?;
					// Matches that only ever fall into DST gaps must not search forever.
					if local >= limit {
						return None;
					}
					let resolved = match tz.from_local_datetime(&local) {
						LocalResult::Single(dt) => Some(dt),
						LocalResult::Ambiguous(earliest, latest) => {
							if earliest > *after {
								Some(earliest)
							} else {
								Some(latest)
							}
						}
						LocalResult::None => None,
					};
					match resolved {
						Some(dt) if dt > *after => return Some(dt),
						_ => continue,
					}
				}
			}
		}
	}

	/// Up to `count` successive run times after `after`.
	pub fn upcoming<Tz: TimeZone>(&self, after: &DateTime<Tz>, count: usize) -> Vec<DateTime<Tz>> {
		let mut times = Vec::with_capacity(count);
		let mut cursor = after.clone();
		for _ in 0..count {
			match self.next_after(&cursor) {
				Some(next) => {
					cursor = next.clone();
					times.push(next);
				}
				None => break,
			}
		}
		times
	}
}

impl FromStr for Schedule {
	type Err = CronError;

	fn from_str(s: &str) -> Result<Self> {
		Schedule::parse(s)
	}
}

fn parse_every(input: &str) -> Result<Duration> {
	let interval = humantime::parse_duration(input).map_err(|e| CronError::InvalidDuration {
		input: input.to_string(),
		message: e.to_string(),
	})?;

	if interval.is_zero() {
		return Err(CronError::InvalidDuration {
			input: input.to_string(),
			message: "duration must be greater than zero".to_string(),
		});
	}
	Ok(interval)
}
