// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use crate::types::TriggerSource;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

/// Execution context handed to a job handler.
///
/// The token is cancelled when the run's deadline passes or the scheduler
/// stops. Handlers are never aborted; they are expected to watch the token.
#[derive(Debug, Clone)]
pub struct JobContext {
	pub run_id: String,
	pub task_id: String,
	pub triggered_by: TriggerSource,
	/// 0 for the first attempt, incremented on each retry.
	pub attempt: u32,
	pub cancellation_token: CancellationToken,
	pub deadline: Instant,
}

impl JobContext {
	pub fn is_cancelled(&self) -> bool {
		self.cancellation_token.is_cancelled()
	}

	/// Resolves once the run is cancelled or its deadline passes.
	pub async fn cancelled(&self) {
		self.cancellation_token.cancelled().await
	}

	pub fn deadline_exceeded(&self) -> bool {
		Instant::now() >= self.deadline
	}
}
