// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Task registration input and the registry's per-task record.

use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use pasta_cron_core::Schedule;

use crate::health::{determine_health_state, TaskSnapshot};
use crate::job::Job;
use crate::types::{RetryPolicy, TaskStatus};

/// Everything needed to register a task.
#[derive(Clone)]
pub struct TaskSpec {
	pub id: String,
	pub name: String,
	pub description: String,
	/// Cron, shortcut or `@every` expression. `None` means manual trigger only.
	pub schedule: Option<String>,
	pub enabled: bool,
	/// May be skipped by the catch-up runner when its last run is stale.
	pub skippable: bool,
	pub retry: Option<RetryPolicy>,
	/// Last run known to the caller, e.g. from before a restart.
	pub last_run: Option<DateTime<Utc>>,
	pub handler: Option<Arc<dyn Job>>,
}

impl TaskSpec {
	pub fn new(id: impl Into<String>, handler: Arc<dyn Job>) -> Self {
		let id = id.into();
		Self {
			name: id.clone(),
			id,
			description: String::new(),
			schedule: None,
			enabled: true,
			skippable: false,
			retry: None,
			last_run: None,
			handler: Some(handler),
		}
	}

	pub fn name(mut self, name: impl Into<String>) -> Self {
		self.name = name.into();
		self
	}

	pub fn description(mut self, description: impl Into<String>) -> Self {
		self.description = description.into();
		self
	}

	pub fn schedule(mut self, schedule: impl Into<String>) -> Self {
		self.schedule = Some(schedule.into());
		self
	}

	pub fn enabled(mut self, enabled: bool) -> Self {
		self.enabled = enabled;
		self
	}

	pub fn skippable(mut self, skippable: bool) -> Self {
		self.skippable = skippable;
		self
	}

	pub fn retry(mut self, policy: RetryPolicy) -> Self {
		self.retry = Some(policy);
		self
	}

	pub fn last_run(mut self, last_run: DateTime<Utc>) -> Self {
		self.last_run = Some(last_run);
		self
	}
}

impl fmt::Debug for TaskSpec {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("TaskSpec")
			.field("id", &self.id)
			.field("name", &self.name)
			.field("schedule", &self.schedule)
			.field("enabled", &self.enabled)
			.field("skippable", &self.skippable)
			.field("retry", &self.retry)
			.field("last_run", &self.last_run)
			.field("has_handler", &self.handler.is_some())
			.finish()
	}
}

/// Mutable run-state, guarded by the task's own lock.
#[derive(Debug, Clone)]
pub(crate) struct TaskState {
	pub(crate) enabled: bool,
	pub(crate) status: TaskStatus,
	pub(crate) last_run: Option<DateTime<Utc>>,
	pub(crate) next_run: Option<DateTime<Utc>>,
	pub(crate) last_error: Option<String>,
	pub(crate) run_count: u64,
	pub(crate) failure_count: u64,
	pub(crate) consecutive_failures: u32,
}

/// A registered task. Immutable apart from `state`.
pub(crate) struct Task {
	pub(crate) id: String,
	pub(crate) name: String,
	pub(crate) description: String,
	pub(crate) expression: Option<String>,
	pub(crate) schedule: Option<Schedule>,
	pub(crate) skippable: bool,
	pub(crate) retry: Option<RetryPolicy>,
	pub(crate) handler: Arc<dyn Job>,
	pub(crate) state: Mutex<TaskState>,
}

impl Task {
	/// Enabled, scheduled, and next run strictly before `now`.
	pub(crate) fn is_due(&self, now: DateTime<Utc>) -> bool {
		let state = self.state.lock();
		state.enabled && state.next_run.is_some_and(|next| next < now)
	}

	pub(crate) fn snapshot(&self) -> TaskSnapshot {
		let state = self.state.lock().clone();
		TaskSnapshot {
			id: self.id.clone(),
			name: self.name.clone(),
			description: self.description.clone(),
			schedule: self.expression.clone(),
			enabled: state.enabled,
			skippable: self.skippable,
			status: state.status,
			last_run: state.last_run,
			next_run: state.next_run,
			last_error: state.last_error,
			run_count: state.run_count,
			failure_count: state.failure_count,
			consecutive_failures: state.consecutive_failures,
			health: determine_health_state(state.consecutive_failures),
		}
	}
}
