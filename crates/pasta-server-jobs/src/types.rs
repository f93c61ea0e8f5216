// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

/// Last known execution status of a task.
///
/// `Pending -> Running -> {Complete, Failed}`, and back to `Running` on the
/// next occurrence. `Skipped` is only set by the catch-up runner.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
	Pending,
	Running,
	Complete,
	Failed,
	Skipped,
}

impl TaskStatus {
	pub fn as_str(&self) -> &'static str {
		match self {
			TaskStatus::Pending => "pending",
			TaskStatus::Running => "running",
			TaskStatus::Complete => "complete",
			TaskStatus::Failed => "failed",
			TaskStatus::Skipped => "skipped",
		}
	}
}

impl fmt::Display for TaskStatus {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(self.as_str())
	}
}

/// What caused a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TriggerSource {
	Schedule,
	CatchUp,
	Manual,
	Retry,
}

impl TriggerSource {
	pub fn as_str(&self) -> &'static str {
		match self {
			TriggerSource::Schedule => "schedule",
			TriggerSource::CatchUp => "catch_up",
			TriggerSource::Manual => "manual",
			TriggerSource::Retry => "retry",
		}
	}
}

impl fmt::Display for TriggerSource {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(self.as_str())
	}
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobOutput {
	pub message: String,
}

impl JobOutput {
	pub fn new(message: impl Into<String>) -> Self {
		Self {
			message: message.into(),
		}
	}
}

/// Re-run a task inside the same run when its handler reports a retryable
/// failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
	pub max_retries: u32,
	pub delay: Duration,
}

impl RetryPolicy {
	pub fn new(max_retries: u32, delay: Duration) -> Self {
		Self { max_retries, delay }
	}
}

/// Result of asking the scheduler to execute a task once.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunOutcome {
	Completed,
	Failed(String),
	/// The overlap guard found the task already running; nothing was executed.
	AlreadyRunning,
}
