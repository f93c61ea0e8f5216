// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Startup wiring for the pasta-server process: turns resolved configuration
//! into a [`JobScheduler`] with the built-in tasks registered.

pub mod jobs;

use std::sync::Arc;

use chrono::{DateTime, TimeZone};
use pasta_cron_core::{CronError, Schedule};
use pasta_server_config::{ConfigError, SchedulerConfig};
use pasta_server_jobs::{JobScheduler, SchedulerError, SchedulerOptions, TaskSpec};
use tracing::{info, warn};

use crate::jobs::StatusReportJob;

#[derive(Debug, thiserror::Error)]
pub enum ServerError {
	#[error(transparent)]
	Config(#[from] ConfigError),

	#[error(transparent)]
	Scheduler(#[from] SchedulerError),

	#[error(transparent)]
	Cron(#[from] CronError),
}

pub fn scheduler_options(config: &SchedulerConfig) -> Result<SchedulerOptions, ServerError> {
	Ok(SchedulerOptions {
		timezone: config.tz()?,
		catch_up_window: config.catch_up_window(),
		task_timeout: config.task_timeout(),
		shutdown_grace: config.shutdown_grace(),
		max_concurrent_tasks: config.max_concurrent_tasks,
		..Default::default()
	})
}

/// Apply `[scheduler.tasks.<id>]` overrides on top of a task's built-in defaults.
pub fn apply_override(mut spec: TaskSpec, config: &SchedulerConfig) -> TaskSpec {
	let Some(task) = config.task_override(&spec.id) else {
		return spec;
	};
	if let Some(schedule) = &task.schedule {
		spec.schedule = Some(schedule.clone());
	}
	if let Some(enabled) = task.enabled {
		spec.enabled = enabled;
	}
	if let Some(skippable) = task.skippable {
		spec.skippable = skippable;
	}
	spec
}

/// Build the scheduler and register every built-in task.
///
/// Any invalid schedule, including one from an override, fails here so the
/// process never starts with a task silently dropped.
pub fn build_scheduler(config: &SchedulerConfig) -> Result<Arc<JobScheduler>, ServerError> {
	let scheduler = Arc::new(JobScheduler::new(scheduler_options(config)?));

	let status_report = TaskSpec::new(
		StatusReportJob::ID,
		Arc::new(StatusReportJob::new(Arc::downgrade(&scheduler))),
	)
	.name("Scheduler Status Report")
	.description("Log a summary of every task's run state and health")
	.schedule(StatusReportJob::DEFAULT_SCHEDULE)
	.skippable(true);
	scheduler.register(apply_override(status_report, config))?;

	let known = scheduler.task_ids();
	for id in config.tasks.keys().filter(|id| !known.contains(id)) {
		warn!(task_id = %id, "Ignoring override for unknown task");
	}

	info!(task_count = known.len(), "Registered built-in tasks");
	Ok(scheduler)
}

/// The next `count` run times of `expr` strictly after `after`.
pub fn preview<Tz: TimeZone>(
	expr: &str,
	count: usize,
	after: &DateTime<Tz>,
) -> Result<Vec<DateTime<Tz>>, CronError> {
	Ok(Schedule::parse(expr)?.upcoming(after, count))
}

#[cfg(test)]
mod tests {
	use super::*;
	use pasta_server_config::{SchedulerConfigLayer, TaskOverride};
	use pasta_server_jobs::job_fn;
	use std::collections::BTreeMap;
	use std::time::Duration;

	fn config_with_override(id: &str, task: TaskOverride) -> SchedulerConfig {
		SchedulerConfigLayer {
			tasks: Some(BTreeMap::from([(id.to_string(), task)])),
			..Default::default()
		}
		.finalize()
	}

	#[test]
	fn test_scheduler_options_from_config() {
		let config = SchedulerConfigLayer {
			timezone: Some("Europe/Paris".to_string()),
			task_timeout_secs: Some(42),
			max_concurrent_tasks: Some(3),
			..Default::default()
		}
		.finalize();
		let options = scheduler_options(&config).unwrap();
		assert_eq!(options.timezone, chrono_tz::Europe::Paris);
		assert_eq!(options.task_timeout, Duration::from_secs(42));
		assert_eq!(options.catch_up_window, Duration::from_secs(86400));
		assert_eq!(options.max_concurrent_tasks, Some(3));
		assert_eq!(options.tick_interval, Duration::from_secs(1));
	}

	#[test]
	fn test_scheduler_options_rejects_bad_timezone() {
		let config = SchedulerConfig {
			timezone: "Nowhere/Special".to_string(),
			..Default::default()
		};
		assert!(matches!(
			scheduler_options(&config),
			Err(ServerError::Config(_))
		));
	}

	#[test]
	fn test_apply_override_replaces_only_set_fields() {
		let handler = job_fn(|_ctx| async { Ok(Default::default()) });
		let spec = TaskSpec::new("cleanup", handler)
			.schedule("@daily")
			.skippable(true);
		let config = config_with_override(
			"cleanup",
			TaskOverride {
				enabled: Some(false),
				..Default::default()
			},
		);

		let spec = apply_override(spec, &config);
		assert!(!spec.enabled);
		assert!(spec.skippable);
		assert_eq!(spec.schedule.as_deref(), Some("@daily"));
	}

	#[test]
	fn test_apply_override_ignores_other_tasks() {
		let handler = job_fn(|_ctx| async { Ok(Default::default()) });
		let spec = TaskSpec::new("cleanup", handler).schedule("@daily");
		let config = config_with_override(
			"other",
			TaskOverride {
				schedule: Some("@hourly".to_string()),
				..Default::default()
			},
		);
		let spec = apply_override(spec, &config);
		assert_eq!(spec.schedule.as_deref(), Some("@daily"));
	}

	#[test]
	fn test_build_scheduler_registers_status_report() {
		let scheduler = build_scheduler(&SchedulerConfig::default()).unwrap();
		let task = scheduler.get(StatusReportJob::ID).unwrap();
		assert_eq!(task.schedule.as_deref(), Some("@every 5m"));
		assert!(task.skippable);
		assert!(task.enabled);
		assert!(task.next_run.is_some());
	}

	#[test]
	fn test_build_scheduler_applies_override() {
		let config = config_with_override(
			StatusReportJob::ID,
			TaskOverride {
				schedule: Some("*/10 * * * *".to_string()),
				enabled: Some(false),
				..Default::default()
			},
		);
		let scheduler = build_scheduler(&config).unwrap();
		let task = scheduler.get(StatusReportJob::ID).unwrap();
		assert_eq!(task.schedule.as_deref(), Some("*/10 * * * *"));
		assert!(!task.enabled);
	}

	#[test]
	fn test_build_scheduler_rejects_invalid_override_schedule() {
		let config = config_with_override(
			StatusReportJob::ID,
			TaskOverride {
				schedule: Some("every now and then".to_string()),
				..Default::default()
			},
		);
		match build_scheduler(&config) {
			Err(ServerError::Scheduler(SchedulerError::InvalidSchedule { task_id, .. })) => {
				assert_eq!(task_id, StatusReportJob::ID)
			}
			other => panic!("Expected InvalidSchedule, got: {:?}", other.err()),
		}
	}

	#[test]
	fn test_preview_lists_successive_runs() {
		let after = chrono::Utc.with_ymd_and_hms(2024, 6, 15, 10, 7, 0).unwrap();
		let runs = preview("*/15 * * * *", 3, &after).unwrap();
		let minutes: Vec<String> = runs.iter().map(|t| t.format("%H:%M").to_string()).collect();
		assert_eq!(minutes, vec!["10:15", "10:30", "10:45"]);

		let err = preview("not a cron", 3, &after).unwrap_err();
		assert!(err.to_string().contains("5 fields"));
	}
}
