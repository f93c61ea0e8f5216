// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Centralized configuration management for Pasta server.
//!
//! This crate provides:
//! - Layered configuration from multiple sources (defaults, TOML file, environment)
//! - Type-safe configuration with validation
//! - Consistent environment variable naming (`PASTA_SERVER_*`)
//!
//! # Usage
//!
//! ```ignore
//! use pasta_server_config::load_config;
//!
//! let config = load_config()?;
//! println!("Scheduling in {}", config.scheduler.timezone);
//! ```

pub mod error;
pub mod layer;
pub mod sections;
pub mod sources;

pub use error::ConfigError;
pub use layer::ServerConfigLayer;
pub use sections::*;
pub use sources::{ConfigSource, DefaultsSource, EnvSource, Precedence, TomlSource};

use tracing::{debug, info};

/// Fully resolved server configuration.
#[derive(Debug, Clone, Default)]
pub struct ServerConfig {
	pub scheduler: SchedulerConfig,
	pub logging: LoggingConfig,
}

/// Load configuration from all sources with standard precedence.
///
/// Precedence (highest to lowest):
/// 1. Environment variables (`PASTA_SERVER_*`)
/// 2. Config file (`/etc/pasta/server.toml`)
/// 3. Built-in defaults
pub fn load_config() -> Result<ServerConfig, ConfigError> {
	load_from_sources(vec![
		Box::new(DefaultsSource),
		Box::new(TomlSource::system()),
		Box::new(EnvSource),
	])
}

/// Load configuration from environment only (for testing or simple deployments).
pub fn load_config_from_env() -> Result<ServerConfig, ConfigError> {
	let mut merged = ServerConfigLayer::default();
	merged.merge(EnvSource.load()?);
	finalize(merged)
}

/// Load configuration with a custom config file path.
pub fn load_config_with_file(
	config_path: impl Into<std::path::PathBuf>,
) -> Result<ServerConfig, ConfigError> {
	load_from_sources(vec![
		Box::new(DefaultsSource),
		Box::new(TomlSource::new(config_path)),
		Box::new(EnvSource),
	])
}

fn load_from_sources(mut sources: Vec<Box<dyn ConfigSource>>) -> Result<ServerConfig, ConfigError> {
	sources.sort_by_key(|s| s.precedence());

	let mut merged = ServerConfigLayer::default();
	for source in sources {
		debug!(source = source.name(), "loading configuration source");
		let layer = source.load()?;
		merged.merge(layer);
	}

	finalize(merged)
}

/// Finalize configuration layer into resolved config.
pub fn finalize(layer: ServerConfigLayer) -> Result<ServerConfig, ConfigError> {
	let scheduler = layer.scheduler.unwrap_or_default().finalize();
	let logging = layer.logging.unwrap_or_default().finalize();

	validate_config(&scheduler)?;

	info!(
		scheduler_enabled = scheduler.enabled,
		timezone = %scheduler.timezone,
		catch_up_window_secs = scheduler.catch_up_window_secs,
		task_timeout_secs = scheduler.task_timeout_secs,
		max_concurrent_tasks = ?scheduler.max_concurrent_tasks,
		task_overrides = scheduler.tasks.len(),
		log_level = %logging.level,
		"Server configuration loaded"
	);

	Ok(ServerConfig { scheduler, logging })
}

/// Validate cross-field configuration rules.
fn validate_config(scheduler: &SchedulerConfig) -> Result<(), ConfigError> {
	if let Err(e) = scheduler.tz() {
		return Err(ConfigError::Validation(format!(
			"PASTA_SERVER_SCHEDULER_TIMEZONE / scheduler.timezone must be an IANA zone name: {e}"
		)));
	}

	if scheduler.task_timeout_secs == 0 {
		return Err(ConfigError::Validation(
			"scheduler.task_timeout_secs must be greater than zero".to_string(),
		));
	}

	if scheduler.max_concurrent_tasks == Some(0) {
		return Err(ConfigError::Validation(
			"scheduler.max_concurrent_tasks must be greater than zero when set".to_string(),
		));
	}

	Ok(())
}

#[cfg(test)]
mod tests {
	use super::*;
	use std::io::Write;

	#[test]
	fn test_finalize_empty_layer_uses_defaults() {
		let config = finalize(ServerConfigLayer::default()).unwrap();
		assert_eq!(config.scheduler, SchedulerConfig::default());
		assert_eq!(config.logging, LoggingConfig::default());
	}

	#[test]
	fn test_invalid_timezone_rejected() {
		let scheduler = SchedulerConfig {
			timezone: "Not/AZone".to_string(),
			..Default::default()
		};
		let result = validate_config(&scheduler);
		assert!(matches!(result, Err(ConfigError::Validation(_))));
		assert!(result.unwrap_err().to_string().contains("IANA"));
	}

	#[test]
	fn test_zero_timeout_rejected() {
		let scheduler = SchedulerConfig {
			task_timeout_secs: 0,
			..Default::default()
		};
		assert!(validate_config(&scheduler).is_err());
	}

	#[test]
	fn test_zero_pool_rejected() {
		let scheduler = SchedulerConfig {
			max_concurrent_tasks: Some(0),
			..Default::default()
		};
		assert!(validate_config(&scheduler).is_err());

		let scheduler = SchedulerConfig {
			max_concurrent_tasks: Some(8),
			..Default::default()
		};
		assert!(validate_config(&scheduler).is_ok());
	}

	#[test]
	fn test_file_layer_overrides_defaults() {
		let mut file = tempfile::NamedTempFile::new().unwrap();
		writeln!(
			file,
			r#"
[scheduler]
enabled = false
shutdown_grace_secs = 5
"#
		)
		.unwrap();

		let mut merged = ServerConfigLayer::default();
		merged.merge(DefaultsSource.load().unwrap());
		merged.merge(TomlSource::new(file.path()).load().unwrap());
		let config = finalize(merged).unwrap();

		assert!(!config.scheduler.enabled);
		assert_eq!(config.scheduler.shutdown_grace_secs, 5);
		assert_eq!(config.scheduler.task_timeout_secs, 300);
	}
}
