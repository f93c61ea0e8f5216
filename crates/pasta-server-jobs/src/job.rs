// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use crate::context::JobContext;
use crate::error::JobError;
use crate::types::JobOutput;
use async_trait::async_trait;
use std::future::Future;
use std::sync::Arc;

/// A unit of background work.
#[async_trait]
pub trait Job: Send + Sync {
	async fn run(&self, ctx: &JobContext) -> Result<JobOutput, JobError>;
}

/// Adapts an async closure into a [`Job`].
pub struct FnJob<F> {
	f: F,
}

#[async_trait]
impl<F, Fut> Job for FnJob<F>
where
	F: Fn(JobContext) -> Fut + Send + Sync,
	Fut: Future<Output = Result<JobOutput, JobError>> + Send,
{
	async fn run(&self, ctx: &JobContext) -> Result<JobOutput, JobError> {
		(self.f)(ctx.clone()).await
	}
}

/// Build a job handler from a closure.
///
/// ```ignore
/// let handler = job_fn(|ctx| async move {
///     tracing::info!(run_id = %ctx.run_id, "tick");
///     Ok(JobOutput::default())
/// });
/// ```
pub fn job_fn<F, Fut>(f: F) -> Arc<dyn Job>
where
	F: Fn(JobContext) -> Fut + Send + Sync + 'static,
	Fut: Future<Output = Result<JobOutput, JobError>> + Send + 'static,
{
	Arc::new(FnJob { f })
}
