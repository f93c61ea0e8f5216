// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Logging configuration section.

use serde::{Deserialize, Serialize};

fn default_level() -> String {
	"info".to_string()
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct LoggingConfigLayer {
	/// `EnvFilter` directive string, e.g. `info,pasta_server_jobs=debug`.
	pub level: Option<String>,
}

impl LoggingConfigLayer {
	pub fn merge(&mut self, other: Self) {
		if other.level.is_some() {
			self.level = other.level;
		}
	}

	pub fn finalize(self) -> LoggingConfig {
		LoggingConfig {
			level: self.level.unwrap_or_else(default_level),
		}
	}
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LoggingConfig {
	pub level: String,
}

impl Default for LoggingConfig {
	fn default() -> Self {
		Self {
			level: default_level(),
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_layer_finalize_defaults() {
		let config = LoggingConfigLayer::default().finalize();
		assert_eq!(config, LoggingConfig::default());
		assert_eq!(config.level, "info");
	}

	#[test]
	fn test_merge_keeps_base_when_overlay_empty() {
		let mut base = LoggingConfigLayer {
			level: Some("debug".to_string()),
		};
		base.merge(LoggingConfigLayer::default());
		assert_eq!(base.level.as_deref(), Some("debug"));

		base.merge(LoggingConfigLayer {
			level: Some("warn".to_string()),
		});
		assert_eq!(base.level.as_deref(), Some("warn"));
	}

	#[test]
	fn test_serde_roundtrip() {
		let config = LoggingConfig {
			level: "info,pasta_server_jobs=trace".to_string(),
		};
		let toml_str = toml::to_string(&config).unwrap();
		let parsed: LoggingConfig = toml::from_str(&toml_str).unwrap();
		assert_eq!(config, parsed);
	}
}
