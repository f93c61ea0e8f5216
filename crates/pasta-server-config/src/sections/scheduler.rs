// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Scheduler configuration section.

use std::collections::BTreeMap;
use std::time::Duration;

use chrono_tz::Tz;
use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

const DEFAULT_TIMEZONE: &str = "UTC";
const DEFAULT_CATCH_UP_WINDOW_SECS: u64 = 86400; // 24 hours
const DEFAULT_TASK_TIMEOUT_SECS: u64 = 300;
const DEFAULT_SHUTDOWN_GRACE_SECS: u64 = 30;

/// Per-task overrides, keyed by task id under `[scheduler.tasks.<id>]`.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct TaskOverride {
	pub schedule: Option<String>,
	pub enabled: Option<bool>,
	pub skippable: Option<bool>,
}

impl TaskOverride {
	pub fn merge(&mut self, other: Self) {
		if other.schedule.is_some() {
			self.schedule = other.schedule;
		}
		if other.enabled.is_some() {
			self.enabled = other.enabled;
		}
		if other.skippable.is_some() {
			self.skippable = other.skippable;
		}
	}
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct SchedulerConfigLayer {
	pub enabled: Option<bool>,
	pub timezone: Option<String>,
	pub catch_up_window_secs: Option<u64>,
	pub task_timeout_secs: Option<u64>,
	pub shutdown_grace_secs: Option<u64>,
	pub max_concurrent_tasks: Option<usize>,
	pub tasks: Option<BTreeMap<String, TaskOverride>>,
}

impl SchedulerConfigLayer {
	pub fn merge(&mut self, other: Self) {
		if other.enabled.is_some() {
			self.enabled = other.enabled;
		}
		if other.timezone.is_some() {
			self.timezone = other.timezone;
		}
		if other.catch_up_window_secs.is_some() {
			self.catch_up_window_secs = other.catch_up_window_secs;
		}
		if other.task_timeout_secs.is_some() {
			self.task_timeout_secs = other.task_timeout_secs;
		}
		if other.shutdown_grace_secs.is_some() {
			self.shutdown_grace_secs = other.shutdown_grace_secs;
		}
		if other.max_concurrent_tasks.is_some() {
			self.max_concurrent_tasks = other.max_concurrent_tasks;
		}
		if let Some(tasks) = other.tasks {
			let merged = self.tasks.get_or_insert_with(BTreeMap::new);
			for (id, task) in tasks {
				merged.entry(id).or_default().merge(task);
			}
		}
	}

	pub fn finalize(self) -> SchedulerConfig {
		SchedulerConfig {
			enabled: self.enabled.unwrap_or(true),
			timezone: self
				.timezone
				.unwrap_or_else(|| DEFAULT_TIMEZONE.to_string()),
			catch_up_window_secs: self
				.catch_up_window_secs
				.unwrap_or(DEFAULT_CATCH_UP_WINDOW_SECS),
			task_timeout_secs: self.task_timeout_secs.unwrap_or(DEFAULT_TASK_TIMEOUT_SECS),
			shutdown_grace_secs: self
				.shutdown_grace_secs
				.unwrap_or(DEFAULT_SHUTDOWN_GRACE_SECS),
			max_concurrent_tasks: self.max_concurrent_tasks,
			tasks: self.tasks.unwrap_or_default(),
		}
	}
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SchedulerConfig {
	pub enabled: bool,
	/// IANA zone name, e.g. `Europe/Berlin`.
	pub timezone: String,
	pub catch_up_window_secs: u64,
	pub task_timeout_secs: u64,
	pub shutdown_grace_secs: u64,
	pub max_concurrent_tasks: Option<usize>,
	pub tasks: BTreeMap<String, TaskOverride>,
}

impl SchedulerConfig {
	pub fn tz(&self) -> Result<Tz, ConfigError> {
		self.timezone
			.parse::<Tz>()
			.map_err(|e| ConfigError::InvalidValue {
				key: "scheduler.timezone".to_string(),
				message: e.to_string(),
			})
	}

	pub fn catch_up_window(&self) -> Duration {
		Duration::from_secs(self.catch_up_window_secs)
	}

	pub fn task_timeout(&self) -> Duration {
		Duration::from_secs(self.task_timeout_secs)
	}

	pub fn shutdown_grace(&self) -> Duration {
		Duration::from_secs(self.shutdown_grace_secs)
	}

	pub fn task_override(&self, task_id: &str) -> Option<&TaskOverride> {
		self.tasks.get(task_id)
	}
}

impl Default for SchedulerConfig {
	fn default() -> Self {
		SchedulerConfigLayer::default().finalize()
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_default_values() {
		let config = SchedulerConfig::default();
		assert!(config.enabled);
		assert_eq!(config.timezone, "UTC");
		assert_eq!(config.catch_up_window(), Duration::from_secs(86400));
		assert_eq!(config.task_timeout(), Duration::from_secs(300));
		assert_eq!(config.shutdown_grace(), Duration::from_secs(30));
		assert!(config.max_concurrent_tasks.is_none());
		assert!(config.tasks.is_empty());
	}

	#[test]
	fn test_layer_finalize_with_values() {
		let layer = SchedulerConfigLayer {
			enabled: Some(false),
			timezone: Some("Europe/Berlin".to_string()),
			task_timeout_secs: Some(60),
			max_concurrent_tasks: Some(4),
			..Default::default()
		};
		let config = layer.finalize();
		assert!(!config.enabled);
		assert_eq!(config.tz().unwrap(), chrono_tz::Europe::Berlin);
		assert_eq!(config.task_timeout(), Duration::from_secs(60));
		assert_eq!(config.catch_up_window_secs, 86400);
		assert_eq!(config.max_concurrent_tasks, Some(4));
	}

	#[test]
	fn test_invalid_timezone() {
		let config = SchedulerConfig {
			timezone: "Mars/Olympus_Mons".to_string(),
			..Default::default()
		};
		match config.tz() {
			Err(ConfigError::InvalidValue { key, .. }) => assert_eq!(key, "scheduler.timezone"),
			other => panic!("Expected InvalidValue, got: {:?}", other),
		}
	}

	#[test]
	fn test_merge_overwrites() {
		let mut base = SchedulerConfigLayer {
			timezone: Some("UTC".to_string()),
			catch_up_window_secs: Some(3600),
			..Default::default()
		};
		let overlay = SchedulerConfigLayer {
			timezone: Some("Asia/Tokyo".to_string()),
			..Default::default()
		};
		base.merge(overlay);
		assert_eq!(base.timezone.as_deref(), Some("Asia/Tokyo"));
		assert_eq!(base.catch_up_window_secs, Some(3600));
	}

	#[test]
	fn test_merge_task_overrides_per_key() {
		let mut base = SchedulerConfigLayer {
			tasks: Some(BTreeMap::from([(
				"cleanup".to_string(),
				TaskOverride {
					schedule: Some("@daily".to_string()),
					skippable: Some(true),
					..Default::default()
				},
			)])),
			..Default::default()
		};
		let overlay = SchedulerConfigLayer {
			tasks: Some(BTreeMap::from([
				(
					"cleanup".to_string(),
					TaskOverride {
						enabled: Some(false),
						..Default::default()
					},
				),
				(
					"report".to_string(),
					TaskOverride {
						schedule: Some("@hourly".to_string()),
						..Default::default()
					},
				),
			])),
			..Default::default()
		};
		base.merge(overlay);

		let config = base.finalize();
		let cleanup = config.task_override("cleanup").unwrap();
		assert_eq!(cleanup.schedule.as_deref(), Some("@daily"));
		assert_eq!(cleanup.enabled, Some(false));
		assert_eq!(cleanup.skippable, Some(true));
		assert_eq!(
			config.task_override("report").unwrap().schedule.as_deref(),
			Some("@hourly")
		);
		assert!(config.task_override("missing").is_none());
	}

	#[test]
	fn test_deserialize_layer_empty() {
		let layer: SchedulerConfigLayer = toml::from_str("").unwrap();
		assert!(layer.enabled.is_none());
		assert!(layer.timezone.is_none());
		assert!(layer.tasks.is_none());
	}

	#[test]
	fn test_deserialize_layer_with_tasks() {
		let toml_str = r#"
timezone = "America/New_York"
max_concurrent_tasks = 2

[tasks.scheduler-status-report]
schedule = "*/10 * * * *"
enabled = false
"#;
		let layer: SchedulerConfigLayer = toml::from_str(toml_str).unwrap();
		assert_eq!(layer.timezone.as_deref(), Some("America/New_York"));
		assert_eq!(layer.max_concurrent_tasks, Some(2));
		let tasks = layer.tasks.unwrap();
		let task = &tasks["scheduler-status-report"];
		assert_eq!(task.schedule.as_deref(), Some("*/10 * * * *"));
		assert_eq!(task.enabled, Some(false));
		assert!(task.skippable.is_none());
	}
}
