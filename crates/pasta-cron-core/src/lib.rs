// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Cron schedules for Pasta's in-process task scheduler.
//!
//! Supported syntax:
//!
//! ```text
//! <minute> <hour> <day-of-month> <month> <day-of-week>
//! @every <duration>            e.g. "90s", "15m", "1h30m"
//! @yearly | @annually | @monthly | @weekly | @daily | @midnight | @hourly
//! ```
//!
//! Each field accepts `*`, `N`, `N,M,...`, `N-M`, `*/S` and `N-M/S`.

pub mod error;
pub mod field;
pub mod schedule;

pub use error::{CronError, Result};
pub use field::{Field, FieldSet};
pub use schedule::{CronFields, Schedule};
