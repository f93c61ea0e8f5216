// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use crate::types::TaskStatus;
use chrono::{DateTime, Utc};
use serde::Serialize;

/// Point-in-time view of one task, safe to hand to an operator endpoint.
#[derive(Debug, Clone, Serialize)]
pub struct TaskSnapshot {
	pub id: String,
	pub name: String,
	pub description: String,
	pub schedule: Option<String>,
	pub enabled: bool,
	pub skippable: bool,
	pub status: TaskStatus,
	pub last_run: Option<DateTime<Utc>>,
	pub next_run: Option<DateTime<Utc>>,
	pub last_error: Option<String>,
	pub run_count: u64,
	pub failure_count: u64,
	pub consecutive_failures: u32,
	pub health: HealthState,
}

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum HealthState {
	Healthy,
	Degraded,
	Unhealthy,
}

#[derive(Debug, Clone, Serialize)]
pub struct SchedulerStatus {
	pub running: bool,
	pub timezone: String,
	pub health: HealthState,
	pub tasks: Vec<TaskSnapshot>,
}

pub(crate) fn determine_health_state(consecutive_failures: u32) -> HealthState {
	match consecutive_failures {
		0 => HealthState::Healthy,
		1 | 2 => HealthState::Degraded,
		_ => HealthState::Unhealthy,
	}
}

/// Worst health across all tasks; healthy when there are none.
pub(crate) fn overall_health(tasks: &[TaskSnapshot]) -> HealthState {
	let mut worst = HealthState::Healthy;
	for task in tasks {
		match task.health {
			HealthState::Unhealthy => return HealthState::Unhealthy,
			HealthState::Degraded => worst = HealthState::Degraded,
			HealthState::Healthy => {}
		}
	}
	worst
}
