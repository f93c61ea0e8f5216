// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use std::sync::Weak;

use async_trait::async_trait;
use pasta_server_jobs::{
	HealthState, Job, JobContext, JobError, JobOutput, JobScheduler, SchedulerStatus, TaskStatus,
};
use tracing::{debug, info, instrument, warn};

/// Periodically logs the scheduler's own status snapshot.
///
/// Holds a weak handle so the scheduler can own this job without a cycle.
pub struct StatusReportJob {
	scheduler: Weak<JobScheduler>,
}

impl StatusReportJob {
	pub const ID: &'static str = "scheduler-status-report";
	pub const DEFAULT_SCHEDULE: &'static str = "@every 5m";

	pub fn new(scheduler: Weak<JobScheduler>) -> Self {
		Self { scheduler }
	}
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusSummary {
	pub total: usize,
	pub enabled: usize,
	pub running: usize,
	pub failed: usize,
	pub skipped: usize,
	pub health: HealthState,
	/// Ids of tasks whose consecutive failures make them unhealthy.
	pub unhealthy: Vec<String>,
}

impl StatusSummary {
	pub fn from_status(status: &SchedulerStatus) -> Self {
		let count = |wanted: TaskStatus| status.tasks.iter().filter(|t| t.status == wanted).count();
		let mut unhealthy: Vec<String> = status
			.tasks
			.iter()
			.filter(|t| t.health == HealthState::Unhealthy)
			.map(|t| t.id.clone())
			.collect();
		unhealthy.sort();

		Self {
			total: status.tasks.len(),
			enabled: status.tasks.iter().filter(|t| t.enabled).count(),
			running: count(TaskStatus::Running),
			failed: count(TaskStatus::Failed),
			skipped: count(TaskStatus::Skipped),
			health: status.health,
			unhealthy,
		}
	}
}

#[async_trait]
impl Job for StatusReportJob {
	#[instrument(skip(self, ctx), fields(task_id = StatusReportJob::ID, run_id = %ctx.run_id))]
	async fn run(&self, ctx: &JobContext) -> Result<JobOutput, JobError> {
		if ctx.is_cancelled() {
			return Err(JobError::Cancelled);
		}

		let scheduler = self
			.scheduler
			.upgrade()
			.ok_or_else(|| JobError::failed("scheduler is no longer available"))?;
		let status = scheduler.status();
		let summary = StatusSummary::from_status(&status);

		info!(
			total = summary.total,
			enabled = summary.enabled,
			running = summary.running,
			failed = summary.failed,
			skipped = summary.skipped,
			health = ?summary.health,
			timezone = %status.timezone,
			"Scheduler status"
		);
		if !summary.unhealthy.is_empty() {
			warn!(tasks = ?summary.unhealthy, "Tasks failing repeatedly");
		}
		match serde_json::to_string(&status) {
			Ok(json) => debug!(status = %json, "Scheduler status snapshot"),
			Err(e) => debug!(error = %e, "Failed to serialize scheduler status"),
		}

		Ok(JobOutput::new(format!(
			"{} tasks, {} failed, {} unhealthy",
			summary.total,
			summary.failed,
			summary.unhealthy.len()
		)))
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use chrono::Utc;
	use pasta_server_jobs::{job_fn, RunOutcome, SchedulerOptions, TaskSnapshot, TaskSpec, TriggerSource};
	use std::sync::Arc;
	use std::time::Duration;
	use tokio_util::sync::CancellationToken;

	fn snapshot(id: &str, status: TaskStatus, health: HealthState, enabled: bool) -> TaskSnapshot {
		TaskSnapshot {
			id: id.to_string(),
			name: id.to_string(),
			description: String::new(),
			schedule: None,
			enabled,
			skippable: false,
			status,
			last_run: None,
			next_run: None,
			last_error: None,
			run_count: 0,
			failure_count: 0,
			consecutive_failures: 0,
			health,
		}
	}

	fn context() -> JobContext {
		JobContext {
			run_id: "run-1".to_string(),
			task_id: StatusReportJob::ID.to_string(),
			triggered_by: TriggerSource::Manual,
			attempt: 0,
			cancellation_token: CancellationToken::new(),
			deadline: tokio::time::Instant::now() + Duration::from_secs(60),
		}
	}

	#[test]
	fn test_summary_counts_by_status() {
		let status = SchedulerStatus {
			running: true,
			timezone: "UTC".to_string(),
			health: HealthState::Unhealthy,
			tasks: vec![
				snapshot("b-broken", TaskStatus::Failed, HealthState::Unhealthy, true),
				snapshot("a-broken", TaskStatus::Failed, HealthState::Unhealthy, true),
				snapshot("flaky", TaskStatus::Failed, HealthState::Degraded, true),
				snapshot("busy", TaskStatus::Running, HealthState::Healthy, true),
				snapshot("stale", TaskStatus::Skipped, HealthState::Healthy, false),
			],
		};

		let summary = StatusSummary::from_status(&status);
		assert_eq!(summary.total, 5);
		assert_eq!(summary.enabled, 4);
		assert_eq!(summary.running, 1);
		assert_eq!(summary.failed, 3);
		assert_eq!(summary.skipped, 1);
		assert_eq!(summary.health, HealthState::Unhealthy);
		assert_eq!(summary.unhealthy, vec!["a-broken", "b-broken"]);
	}

	#[tokio::test]
	async fn test_report_runs_through_scheduler() {
		let scheduler = Arc::new(JobScheduler::new(SchedulerOptions::default()));
		scheduler
			.register(TaskSpec::new(
				StatusReportJob::ID,
				Arc::new(StatusReportJob::new(Arc::downgrade(&scheduler))),
			))
			.unwrap();
		scheduler
			.register(
				TaskSpec::new("idle", job_fn(|_ctx| async { Ok(JobOutput::default()) }))
					.schedule("@hourly"),
			)
			.unwrap();

		let outcome = scheduler.trigger_job(StatusReportJob::ID).await.unwrap();
		assert_eq!(outcome, RunOutcome::Completed);

		let task = scheduler.get(StatusReportJob::ID).unwrap();
		assert_eq!(task.status, TaskStatus::Complete);
		assert!(task.last_run.unwrap() <= Utc::now());
	}

	#[tokio::test]
	async fn test_report_fails_when_scheduler_dropped() {
		let scheduler = Arc::new(JobScheduler::new(SchedulerOptions::default()));
		let job = StatusReportJob::new(Arc::downgrade(&scheduler));
		drop(scheduler);

		match job.run(&context()).await {
			Err(JobError::Failed { message, retryable }) => {
				assert!(message.contains("no longer available"));
				assert!(!retryable);
			}
			other => panic!("Expected failure, got: {:?}", other),
		}
	}

	#[tokio::test]
	async fn test_report_honours_cancellation() {
		let scheduler = Arc::new(JobScheduler::new(SchedulerOptions::default()));
		let job = StatusReportJob::new(Arc::downgrade(&scheduler));
		let ctx = context();
		ctx.cancellation_token.cancel();
		assert!(matches!(job.run(&ctx).await, Err(JobError::Cancelled)));
	}
}
