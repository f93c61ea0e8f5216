// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! In-process task scheduler for pasta-server housekeeping work.
//!
//! Tasks are registered with a cron expression (see [`pasta_cron_core`]) and
//! an async [`Job`] handler. The [`JobScheduler`] runs a single tick loop,
//! dispatches due tasks onto their own tokio tasks, replays stale tasks once
//! at start-up, and exposes per-task status for health reporting.

pub mod context;
pub mod error;
pub mod health;
pub mod job;
pub mod scheduler;
pub mod task;
pub mod types;

pub use context::JobContext;
pub use error::{JobError, Result, SchedulerError};
pub use health::{HealthState, SchedulerStatus, TaskSnapshot};
pub use job::{job_fn, FnJob, Job};
pub use scheduler::{JobScheduler, SchedulerOptions};
pub use task::TaskSpec;
pub use types::{JobOutput, RetryPolicy, RunOutcome, TaskStatus, TriggerSource};
