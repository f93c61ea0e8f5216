// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use std::time::Duration;

use pasta_cron_core::CronError;

/// Outcome of a single handler execution. Recorded on the task, never fatal
/// to the scheduler.
#[derive(Debug, thiserror::Error)]
pub enum JobError {
	#[error("Job failed: {message}")]
	Failed { message: String, retryable: bool },

	#[error("Job cancelled")]
	Cancelled,

	#[error("Job exceeded its {0:?} deadline")]
	TimedOut(Duration),

	#[error("Job panicked: {0}")]
	Panicked(String),
}

impl JobError {
	pub fn failed(message: impl Into<String>) -> Self {
		JobError::Failed {
			message: message.into(),
			retryable: false,
		}
	}

	pub fn retryable(message: impl Into<String>) -> Self {
		JobError::Failed {
			message: message.into(),
			retryable: true,
		}
	}
}

/// Registration and lifecycle errors. These are configuration problems and
/// should abort startup.
#[derive(Debug, thiserror::Error)]
pub enum SchedulerError {
	#[error("Task id must not be empty")]
	MissingId,

	#[error("Task {task_id} has no handler")]
	MissingHandler { task_id: String },

	#[error("Task {task_id} has an invalid schedule: {source}")]
	InvalidSchedule {
		task_id: String,
		#[source]
		source: CronError,
	},

	#[error("Task not found: {0}")]
	NotFound(String),

	#[error("Scheduler is already running")]
	AlreadyRunning,

	#[error("No tokio runtime available to run the task")]
	NoRuntime,
}

pub type Result<T> = std::result::Result<T, SchedulerError>;
