// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Single cron field parsing.
//!
//! A field is a comma-separated list of parts. Each part is `*`, `N`, `N-M`,
//! `*/S` or `N-M/S`. Steps are applied to the position inside the expanded
//! candidate list, so `1-10/3` yields `1, 4, 7, 10`.

use std::fmt;

use crate::error::{CronError, Result};

/// Position of a field inside a 5-field cron expression.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Field {
	Minute,
	Hour,
	DayOfMonth,
	Month,
	DayOfWeek,
}

impl Field {
	/// Fields in expression order.
	pub const ALL: [Field; 5] = [
		Field::Minute,
		Field::Hour,
		Field::DayOfMonth,
		Field::Month,
		Field::DayOfWeek,
	];

	pub fn min(self) -> u8 {
		match self {
			Field::Minute | Field::Hour | Field::DayOfWeek => 0,
			Field::DayOfMonth | Field::Month => 1,
		}
	}

	pub fn max(self) -> u8 {
		match self {
			Field::Minute => 59,
			Field::Hour => 23,
			Field::DayOfMonth => 31,
			Field::Month => 12,
			Field::DayOfWeek => 6,
		}
	}

	pub fn as_str(self) -> &'static str {
		match self {
			Field::Minute => "minute",
			Field::Hour => "hour",
			Field::DayOfMonth => "day-of-month",
			Field::Month => "month",
			Field::DayOfWeek => "day-of-week",
		}
	}
}

impl fmt::Display for Field {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(self.as_str())
	}
}

/// The set of values a field accepts, stored as a bitmask.
///
/// Every field bound fits below 64, so one `u64` covers all of them.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct FieldSet(u64);

impl FieldSet {
	/// Set containing every value in the field's bound.
	pub fn full(field: Field) -> Self {
		let mut set = Self::default();
		for value in field.min()..=field.max() {
			set.insert(value);
		}
		set
	}

	pub fn contains(&self, value: u32) -> bool {
		value < 64 && self.0 & (1u64 << value) != 0
	}

	pub fn is_empty(&self) -> bool {
		self.0 == 0
	}

	pub fn len(&self) -> usize {
		self.0.count_ones() as usize
	}

	/// Values in ascending order.
	pub fn values(&self) -> impl Iterator<Item = u8> + '_ {
		(0u8..64).filter(move |v| self.contains(*v as u32))
	}

	fn insert(&mut self, value: u8) {
		self.0 |= 1u64 << value;
	}
}

/// Parse one field of a 5-field expression.
pub(crate) fn parse_field(expr: &str, field: Field) -> Result<FieldSet> {
	let mut set = FieldSet::default();
	for part in expr.split(',') {
		for value in expand_part(part, field)? {
			set.insert(value);
		}
	}

	if set.is_empty() {
		return Err(CronError::EmptyField { field });
	}
	Ok(set)
}

fn expand_part(part: &str, field: Field) -> Result<Vec<u8>> {
	let (base, step) = match part.split_once('/') {
		Some((base, step)) => (base, Some(parse_step(step, field)?)),
		None => (part, None),
	};

	let candidates: Vec<u8> = if base == "*" {
		(field.min()..=field.max()).collect()
	} else if let Some((lo, hi)) = base.split_once('-') {
		let lo = parse_value(lo, field)?;
		let hi = parse_value(hi, field)?;
		if lo > hi {
			return Err(CronError::InvalidRange {
				field,
				range: base.to_string(),
			});
		}
		(lo..=hi).collect()
	} else {
		// A step needs `*` or a range to walk over.
		if step.is_some() {
			return Err(CronError::InvalidStep {
				field,
				step: part.to_string(),
			});
		}
		vec![parse_value(base, field)?]
	};

	Ok(match step {
		Some(step) => candidates.into_iter().step_by(step).collect(),
		None => candidates,
	})
}

fn parse_step(step: &str, field: Field) -> Result<usize> {
	match step.parse::<usize>() {
		Ok(n) if n > 0 => Ok(n),
		_ => Err(CronError::InvalidStep {
			field,
			step: step.to_string(),
		}),
	}
}

fn parse_value(text: &str, field: Field) -> Result<u8> {
	let value: u32 = text.parse().map_err(|_| CronError::InvalidValue {
		field,
		value: text.to_string(),
	})?;

	if value < field.min() as u32 || value > field.max() as u32 {
		return Err(CronError::OutOfRange {
			field,
			value,
			min: field.min(),
			max: field.max(),
		});
	}
	Ok(value as u8)
}

#[cfg(test)]
mod tests {
	use super::*;
	use proptest::prelude::*;

	fn values(expr: &str, field: Field) -> Vec<u8> {
		parse_field(expr, field).unwrap().values().collect()
	}

	#[test]
	fn test_wildcard_covers_bound() {
		assert_eq!(parse_field("*", Field::Minute).unwrap().len(), 60);
		assert_eq!(values("*", Field::DayOfMonth).first(), Some(&1));
		assert_eq!(values("*", Field::DayOfWeek), vec![0, 1, 2, 3, 4, 5, 6]);
	}

	#[test]
	fn test_step_over_wildcard() {
		assert_eq!(values("*/15", Field::Minute), vec![0, 15, 30, 45]);
	}

	#[test]
	fn test_step_applies_to_position_in_range() {
		assert_eq!(values("1-10/3", Field::Minute), vec![1, 4, 7, 10]);
		assert_eq!(values("*/5", Field::Month), vec![1, 6, 11]);
	}

	#[test]
	fn test_range_and_list() {
		assert_eq!(values("1-5", Field::Minute), vec![1, 2, 3, 4, 5]);
		assert_eq!(values("5,1,3,1", Field::Hour), vec![1, 3, 5]);
		assert_eq!(values("1-2,20-22/2", Field::Hour), vec![1, 2, 20, 22]);
	}

	#[test]
	fn test_out_of_range_values() {
		assert!(matches!(
			parse_field("60", Field::Minute),
			Err(CronError::OutOfRange { value: 60, max: 59, .. })
		));
		assert!(parse_field("59", Field::Minute).is_ok());
		assert!(parse_field("0", Field::DayOfMonth).is_err());
		assert!(parse_field("13", Field::Month).is_err());
		assert!(parse_field("7", Field::DayOfWeek).is_err());
		assert!(parse_field("20-24", Field::Hour).is_err());
	}

	#[test]
	fn test_malformed_parts() {
		assert!(matches!(
			parse_field("a", Field::Minute),
			Err(CronError::InvalidValue { .. })
		));
		assert!(matches!(
			parse_field("1,,2", Field::Minute),
			Err(CronError::InvalidValue { .. })
		));
		assert!(matches!(
			parse_field("10-5", Field::Minute),
			Err(CronError::InvalidRange { .. })
		));
		assert!(matches!(
			parse_field("*/0", Field::Minute),
			Err(CronError::InvalidStep { .. })
		));
		assert!(matches!(
			parse_field("5/2", Field::Minute),
			Err(CronError::InvalidStep { .. })
		));
		assert!(matches!(
			parse_field("*/x", Field::Minute),
			Err(CronError::InvalidStep { .. })
		));
	}

	#[test]
	fn test_field_display() {
		assert_eq!(Field::DayOfMonth.to_string(), "day-of-month");
		assert_eq!(Field::DayOfWeek.to_string(), "day-of-week");
	}

	proptest! {
		#[test]
		fn single_value_accepted_only_within_bound(
			field in prop_oneof![
				Just(Field::Minute),
				Just(Field::Hour),
				Just(Field::DayOfMonth),
				Just(Field::Month),
				Just(Field::DayOfWeek),
			],
			value in 0u32..100,
		) {
			let result = parse_field(&value.to_string(), field);
			let in_bound = value >= field.min() as u32 && value <= field.max() as u32;
			prop_assert_eq!(result.is_ok(), in_bound);
			if in_bound {
				let set = result.unwrap();
				prop_assert_eq!(set.len(), 1);
				prop_assert!(set.contains(value));
			}
		}

		#[test]
		fn wildcard_step_keeps_every_nth(step in 1usize..70) {
			let set = parse_field(&format!("*/{step}"), Field::Minute).unwrap();
			for minute in 0u32..60 {
				prop_assert_eq!(set.contains(minute), minute as usize % step == 0);
			}
		}
	}
}
