// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Error types for cron expression parsing.

use thiserror::Error;

use crate::field::Field;

/// Result type for cron parsing.
pub type Result<T> = std::result::Result<T, CronError>;

/// Errors produced while parsing a schedule expression.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CronError {
	#[error("empty schedule expression")]
	Empty,

	#[error("invalid cron expression: expected 5 fields (minute hour day month weekday), found {found}")]
	FieldCount { found: usize },

	#[error("{field} value {value} out of range: must be between {min} and {max}")]
	OutOfRange {
		field: Field,
		value: u32,
		min: u8,
		max: u8,
	},

	#[error("invalid {field} value '{value}'")]
	InvalidValue { field: Field, value: String },

	#[error("invalid {field} range '{range}'")]
	InvalidRange { field: Field, range: String },

	#[error("invalid {field} step '{step}'")]
	InvalidStep { field: Field, step: String },

	#[error("{field} field matches no values")]
	EmptyField { field: Field },

	#[error("invalid @every duration '{input}': {message}")]
	InvalidDuration { input: String, message: String },
}
