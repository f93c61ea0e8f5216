// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Configuration sections for pasta-server.

pub mod logging;
pub mod scheduler;

pub use logging::{LoggingConfig, LoggingConfigLayer};
pub use scheduler::{SchedulerConfig, SchedulerConfigLayer, TaskOverride};
