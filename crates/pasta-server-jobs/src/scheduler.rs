// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use crate::context::JobContext;
use crate::error::{JobError, Result, SchedulerError};
use crate::health::{overall_health, SchedulerStatus, TaskSnapshot};
use crate::task::{Task, TaskSpec, TaskState};
use crate::types::{JobOutput, RunOutcome, TaskStatus, TriggerSource};
use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use futures::FutureExt;
use parking_lot::{Mutex as SyncMutex, RwLock};
use pasta_cron_core::Schedule;
use std::any::Any;
use std::collections::HashMap;
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, Semaphore};
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{debug, info, instrument, warn};

pub const DEFAULT_TICK_INTERVAL: Duration = Duration::from_secs(1);
pub const DEFAULT_TASK_TIMEOUT: Duration = Duration::from_secs(5 * 60);
pub const DEFAULT_CATCH_UP_WINDOW: Duration = Duration::from_secs(24 * 60 * 60);
pub const DEFAULT_SHUTDOWN_GRACE: Duration = Duration::from_secs(30);

#[derive(Debug, Clone)]
pub struct SchedulerOptions {
	/// Zone whose wall clock cron fields are matched against.
	pub timezone: Tz,
	/// Non-skippable tasks whose last run is older than this are run once at start.
	pub catch_up_window: Duration,
	/// Deadline for a single run, after which the handler's token is cancelled.
	pub task_timeout: Duration,
	pub tick_interval: Duration,
	/// How long `stop` waits for in-flight runs.
	pub shutdown_grace: Duration,
	/// Upper bound on concurrently executing handlers. `None` is unbounded.
	pub max_concurrent_tasks: Option<usize>,
}

impl Default for SchedulerOptions {
	fn default() -> Self {
		Self {
			timezone: chrono_tz::UTC,
			catch_up_window: DEFAULT_CATCH_UP_WINDOW,
			task_timeout: DEFAULT_TASK_TIMEOUT,
			tick_interval: DEFAULT_TICK_INTERVAL,
			shutdown_grace: DEFAULT_SHUTDOWN_GRACE,
			max_concurrent_tasks: None,
		}
	}
}

struct Inner {
	tasks: RwLock<HashMap<String, Arc<Task>>>,
	options: SchedulerOptions,
	permits: Option<Arc<Semaphore>>,
	tracker: TaskTracker,
	/// Lifetime token of the current start/stop cycle. Replaced on stop.
	shutdown: SyncMutex<CancellationToken>,
	running: AtomicBool,
}

/// Cron-driven scheduler for in-process background tasks.
///
/// One loop ticks every [`SchedulerOptions::tick_interval`], picks up enabled
/// tasks whose next run has passed, and runs each on its own tokio task. A
/// task that is still running when it comes due again is skipped, not queued.
pub struct JobScheduler {
	inner: Arc<Inner>,
	loop_handle: Mutex<Option<JoinHandle<()>>>,
}

impl JobScheduler {
	/// A zero `tick_interval` is replaced with [`DEFAULT_TICK_INTERVAL`].
	pub fn new(mut options: SchedulerOptions) -> Self {
		if options.tick_interval.is_zero() {
			warn!(default = ?DEFAULT_TICK_INTERVAL, "Zero tick interval requested, using the default");
			options.tick_interval = DEFAULT_TICK_INTERVAL;
		}
		let permits = options
			.max_concurrent_tasks
			.map(|n| Arc::new(Semaphore::new(n.max(1))));
		Self {
			inner: Arc::new(Inner {
				tasks: RwLock::new(HashMap::new()),
				options,
				permits,
				tracker: TaskTracker::new(),
				shutdown: SyncMutex::new(CancellationToken::new()),
				running: AtomicBool::new(false),
			}),
			loop_handle: Mutex::new(None),
		}
	}

	pub fn options(&self) -> &SchedulerOptions {
		&self.inner.options
	}

	/// Add a task, replacing any task registered under the same id.
	///
	/// The schedule is parsed here and the first next run computed, so an
	/// invalid task set fails before the scheduler is started.
	#[instrument(skip(self, spec), fields(task_id = %spec.id))]
	pub fn register(&self, spec: TaskSpec) -> Result<()> {
		if spec.id.trim().is_empty() {
			return Err(SchedulerError::MissingId);
		}
		let handler = spec.handler.ok_or_else(|| SchedulerError::MissingHandler {
			task_id: spec.id.clone(),
		})?;

		let expression = spec.schedule.filter(|s| !s.trim().is_empty());
		let schedule = expression
			.as_deref()
			.map(Schedule::parse)
			.transpose()
			.map_err(|source| SchedulerError::InvalidSchedule {
				task_id: spec.id.clone(),
				source,
			})?;

		let next_run = schedule
			.as_ref()
			.and_then(|s| self.inner.next_run_after(s, Utc::now()));

		let task = Task {
			id: spec.id.clone(),
			name: spec.name,
			description: spec.description,
			expression,
			schedule,
			skippable: spec.skippable,
			retry: spec.retry,
			handler,
			state: SyncMutex::new(TaskState {
				enabled: spec.enabled,
				status: TaskStatus::Pending,
				last_run: spec.last_run,
				next_run,
				last_error: None,
				run_count: 0,
				failure_count: 0,
				consecutive_failures: 0,
			}),
		};

		let replaced = self
			.inner
			.tasks
			.write()
			.insert(spec.id, Arc::new(task))
			.is_some();
		info!(?next_run, replaced, "Task registered");
		Ok(())
	}

	#[instrument(skip(self))]
	pub fn remove(&self, task_id: &str) -> Result<()> {
		self.inner
			.tasks
			.write()
			.remove(task_id)
			.map(|_| info!("Task removed"))
			.ok_or_else(|| SchedulerError::NotFound(task_id.to_string()))
	}

	pub fn get(&self, task_id: &str) -> Option<TaskSnapshot> {
		self.inner.task(task_id).ok().map(|task| task.snapshot())
	}

	/// Snapshot of every task, in no particular order.
	pub fn list(&self) -> Vec<TaskSnapshot> {
		self.inner.all_tasks().iter().map(|t| t.snapshot()).collect()
	}

	pub fn task_ids(&self) -> Vec<String> {
		self.inner.tasks.read().keys().cloned().collect()
	}

	/// Enable or disable automatic triggering. Manual triggers keep working.
	#[instrument(skip(self))]
	pub fn set_enabled(&self, task_id: &str, enabled: bool) -> Result<()> {
		let task = self.inner.task(task_id)?;
		task.state.lock().enabled = enabled;
		info!("Task enabled flag updated");
		Ok(())
	}

	pub fn is_running(&self) -> bool {
		self.inner.running.load(Ordering::SeqCst)
	}

	pub fn status(&self) -> SchedulerStatus {
		let tasks = self.list();
		SchedulerStatus {
			running: self.is_running(),
			timezone: self.inner.options.timezone.name().to_string(),
			health: overall_health(&tasks),
			tasks,
		}
	}

	/// Recompute next runs, run the catch-up pass, then spawn the tick loop.
	///
	/// Catch-up runs are awaited, so `start` returns after they finish.
	#[instrument(skip(self))]
	pub async fn start(&self) -> Result<()> {
		let mut loop_handle = self.loop_handle.lock().await;
		if loop_handle.is_some() {
			return Err(SchedulerError::AlreadyRunning);
		}

		let now = Utc::now();
		self.inner.refresh_next_runs(now);
		self.inner.catch_up(now).await;

		let shutdown = self.inner.shutdown.lock().clone();
		*loop_handle = Some(tokio::spawn(run_loop(Arc::clone(&self.inner), shutdown)));
		self.inner.running.store(true, Ordering::SeqCst);

		info!(
			task_count = self.inner.tasks.read().len(),
			timezone = %self.inner.options.timezone,
			"Job scheduler started"
		);
		Ok(())
	}

	/// Cancel the loop and every in-flight run, then wait for the loop to exit
	/// and for runs to finish, the latter for at most the shutdown grace.
	#[instrument(skip(self))]
	pub async fn stop(&self) {
		let Some(handle) = self.loop_handle.lock().await.take() else {
			debug!("Job scheduler not running");
			return;
		};

		let shutdown = std::mem::replace(&mut *self.inner.shutdown.lock(), CancellationToken::new());
		shutdown.cancel();
		if let Err(e) = handle.await {
			warn!(error = %e, "Scheduler loop terminated abnormally");
		}
		self.inner.running.store(false, Ordering::SeqCst);

		let tracker = &self.inner.tracker;
		tracker.close();
		if tokio::time::timeout(self.inner.options.shutdown_grace, tracker.wait())
			.await
			.is_err()
		{
			warn!(
				in_flight = tracker.len(),
				"Shutdown grace period elapsed with task runs still in flight"
			);
		}
		tracker.reopen();

		info!("Job scheduler stopped");
	}

	/// Trigger a task in the background, regardless of schedule or enabled flag.
	///
	/// The run is spawned on the current tokio runtime; called outside one,
	/// this returns [`SchedulerError::NoRuntime`].
	#[instrument(skip(self))]
	pub fn run_now(&self, task_id: &str) -> Result<()> {
		let task = self.inner.task(task_id)?;
		if tokio::runtime::Handle::try_current().is_err() {
			return Err(SchedulerError::NoRuntime);
		}
		info!("Manual trigger requested");
		self.inner.dispatch(task, TriggerSource::Manual);
		Ok(())
	}

	/// Trigger a task and wait for the run to finish.
	#[instrument(skip(self))]
	pub async fn trigger_job(&self, task_id: &str) -> Result<RunOutcome> {
		let task = self.inner.task(task_id)?;
		Ok(Arc::clone(&self.inner)
			.run_task(task, TriggerSource::Manual)
			.await)
	}
}

impl Inner {
	fn task(&self, task_id: &str) -> Result<Arc<Task>> {
		self.tasks
			.read()
			.get(task_id)
			.cloned()
			.ok_or_else(|| SchedulerError::NotFound(task_id.to_string()))
	}

	fn all_tasks(&self) -> Vec<Arc<Task>> {
		self.tasks.read().values().cloned().collect()
	}

	fn next_run_after(&self, schedule: &Schedule, after: DateTime<Utc>) -> Option<DateTime<Utc>> {
		let local = after.with_timezone(&self.options.timezone);
		schedule
			.next_after(&local)
			.map(|next| next.with_timezone(&Utc))
	}

	fn refresh_next_runs(&self, now: DateTime<Utc>) {
		for task in self.all_tasks() {
			if let Some(schedule) = &task.schedule {
				let next_run = self.next_run_after(schedule, now);
				task.state.lock().next_run = next_run;
			}
		}
	}

	fn due_tasks(&self, now: DateTime<Utc>) -> Vec<Arc<Task>> {
		self.tasks
			.read()
			.values()
			.filter(|task| task.is_due(now))
			.cloned()
			.collect()
	}

	fn dispatch(self: &Arc<Self>, task: Arc<Task>, triggered_by: TriggerSource) {
		let inner = Arc::clone(self);
		self.tracker.spawn(async move {
			inner.run_task(task, triggered_by).await;
		});
	}

	fn dispatch_due(self: &Arc<Self>, now: DateTime<Utc>) {
		for task in self.due_tasks(now) {
			debug!(task_id = %task.id, "Task due");
			self.dispatch(task, TriggerSource::Schedule);
		}
	}

	/// Run every enabled, non-skippable task whose last run predates the
	/// catch-up window. Stale skippable tasks are marked skipped instead.
	async fn catch_up(self: &Arc<Self>, now: DateTime<Utc>) {
		let Some(cutoff) = chrono::Duration::from_std(self.options.catch_up_window)
			.ok()
			.and_then(|window| now.checked_sub_signed(window))
		else {
			return;
		};

		let mut runs = Vec::new();
		for task in self.all_tasks() {
			if !mark_catch_up(&task, cutoff) {
				continue;
			}
			info!(task_id = %task.id, "Catching up missed task run");
			runs.push(Arc::clone(self).run_task(task, TriggerSource::CatchUp));
		}

		if !runs.is_empty() {
			let count = runs.len();
			futures::future::join_all(runs).await;
			info!(count, "Catch-up runs finished");
		}
	}

	/// Execute a task once. The only guard against overlapping runs is the
	/// `Running` status check below.
	async fn run_task(self: Arc<Self>, task: Arc<Task>, triggered_by: TriggerSource) -> RunOutcome {
		{
			let mut state = task.state.lock();
			if state.status == TaskStatus::Running {
				debug!(task_id = %task.id, trigger = %triggered_by, "Task already running, skipping");
				return RunOutcome::AlreadyRunning;
			}
			state.status = TaskStatus::Running;
		}

		// Taken before queueing on the pool so a stop during the wait reaches this run.
		let token = self.shutdown.lock().child_token();
		let run_id = uuid::Uuid::new_v4().to_string();

		let _permit = match &self.permits {
			Some(permits) => tokio::select! {
				biased;
				_ = token.cancelled() => {
					info!(task_id = %task.id, run_id = %run_id, "Task cancelled while waiting for a worker permit");
					return self.record_result(&task, &run_id, Err(JobError::Cancelled));
				}
				permit = Arc::clone(permits).acquire_owned() => permit.ok(),
			},
			None => None,
		};

		let deadline = Instant::now() + self.options.task_timeout;
		spawn_deadline_watchdog(token.clone(), deadline);

		info!(task_id = %task.id, run_id = %run_id, trigger = %triggered_by, "Running task");
		let result = self
			.execute(&task, &run_id, triggered_by, &token, deadline)
			.await;
		token.cancel();

		self.record_result(&task, &run_id, result)
	}

	/// Store a run's result on the task and schedule its next occurrence.
	fn record_result(
		&self,
		task: &Task,
		run_id: &str,
		result: std::result::Result<JobOutput, JobError>,
	) -> RunOutcome {
		let finished = Utc::now();
		let next_run = task
			.schedule
			.as_ref()
			.and_then(|s| self.next_run_after(s, finished));

		let mut state = task.state.lock();
		state.last_run = Some(finished);
		state.next_run = next_run;
		state.run_count += 1;
		match result {
			Ok(output) => {
				state.status = TaskStatus::Complete;
				state.last_error = None;
				state.consecutive_failures = 0;
				info!(
					task_id = %task.id,
					run_id = %run_id,
					message = %output.message,
					?next_run,
					"Task completed successfully"
				);
				RunOutcome::Completed
			}
			Err(e) => {
				let message = e.to_string();
				state.status = TaskStatus::Failed;
				state.last_error = Some(message.clone());
				state.failure_count += 1;
				state.consecutive_failures += 1;
				warn!(
					task_id = %task.id,
					run_id = %run_id,
					error = %message,
					consecutive_failures = state.consecutive_failures,
					?next_run,
					"Task failed"
				);
				RunOutcome::Failed(message)
			}
		}
	}

	/// Invoke the handler, retrying in place when the task has a retry policy
	/// and the failure is retryable.
	async fn execute(
		&self,
		task: &Task,
		run_id: &str,
		triggered_by: TriggerSource,
		token: &CancellationToken,
		deadline: Instant,
	) -> std::result::Result<JobOutput, JobError> {
		let mut attempt = 0u32;
		loop {
			let ctx = JobContext {
				run_id: run_id.to_string(),
				task_id: task.id.clone(),
				triggered_by: if attempt > 0 {
					TriggerSource::Retry
				} else {
					triggered_by
				},
				attempt,
				cancellation_token: token.clone(),
				deadline,
			};

			let result = match AssertUnwindSafe(task.handler.run(&ctx)).catch_unwind().await {
				Ok(result) => result,
				Err(panic) => Err(JobError::Panicked(panic_message(panic.as_ref()))),
			};
			let result = match result {
				Err(JobError::Cancelled) if ctx.deadline_exceeded() => {
					Err(JobError::TimedOut(self.options.task_timeout))
				}
				other => other,
			};

			let retry_delay = match (&result, task.retry) {
				(Err(JobError::Failed { retryable: true, .. }), Some(policy))
					if attempt < policy.max_retries =>
				{
					Some(policy.delay)
				}
				_ => None,
			};
			let Some(delay) = retry_delay else {
				return result;
			};

			attempt += 1;
			warn!(
				task_id = %task.id,
				run_id = %run_id,
				attempt,
				delay_ms = delay.as_millis() as u64,
				"Task failed, retrying"
			);
			tokio::select! {
				_ = tokio::time::sleep(delay) => {}
				_ = token.cancelled() => return result,
			}
		}
	}
}

/// Decide a task's catch-up fate under its lock. Returns true when it should run.
fn mark_catch_up(task: &Task, cutoff: DateTime<Utc>) -> bool {
	let mut state = task.state.lock();
	let stale = state.enabled && state.last_run.is_some_and(|last| last < cutoff);
	if !stale {
		return false;
	}
	if task.skippable {
		if state.status != TaskStatus::Running {
			state.status = TaskStatus::Skipped;
		}
		info!(task_id = %task.id, last_run = ?state.last_run, "Skipping missed run of skippable task");
		return false;
	}
	true
}

async fn run_loop(inner: Arc<Inner>, shutdown: CancellationToken) {
	let mut ticker = tokio::time::interval(inner.options.tick_interval);
	ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

	info!("Scheduler loop started");
	loop {
		tokio::select! {
			_ = shutdown.cancelled() => break,
			_ = ticker.tick() => inner.dispatch_due(Utc::now()),
		}
	}
	info!("Scheduler loop exited");
}

/// Cancel `token` at `deadline` unless it is cancelled first.
fn spawn_deadline_watchdog(token: CancellationToken, deadline: Instant) {
	tokio::spawn(async move {
		tokio::select! {
			_ = tokio::time::sleep_until(deadline) => token.cancel(),
			_ = token.cancelled() => {}
		}
	});
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
	if let Some(s) = panic.downcast_ref::<&str>() {
		s.to_string()
	} else if let Some(s) = panic.downcast_ref::<String>() {
		s.clone()
	} else {
		"unknown panic".to_string()
	}
}
