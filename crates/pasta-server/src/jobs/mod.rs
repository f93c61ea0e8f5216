// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Built-in tasks registered by pasta-server itself.

mod status_report;

pub use status_report::{StatusReportJob, StatusSummary};
