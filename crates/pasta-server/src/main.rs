// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Pasta server binary: hosts the in-process task scheduler.

use std::path::PathBuf;

use chrono::Utc;
use chrono_tz::Tz;
use clap::{Parser, Subcommand};
use pasta_server_config::{ConfigError, LoggingConfig, ServerConfig};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod version;

/// Pasta server - runs scheduled background tasks.
#[derive(Parser, Debug)]
#[command(name = "pasta-server", about = "Pasta task scheduler server", version)]
struct Args {
	/// Config file to read instead of /etc/pasta/server.toml
	#[arg(long, global = true, env = "PASTA_SERVER_CONFIG")]
	config: Option<PathBuf>,

	#[command(subcommand)]
	command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
	/// Validate configuration and built-in task schedules, then exit
	Check,
	/// Print the next run times of a schedule expression
	Next {
		/// Cron, shortcut or `@every` expression
		expr: String,
		#[arg(long, default_value_t = 5)]
		count: usize,
		#[arg(long, default_value = "UTC")]
		timezone: String,
	},
	/// Show version and build information
	Version,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
	let args = Args::parse();

	match args.command {
		Some(Command::Version) => {
			println!("{}", version::format_version_info());
			return Ok(());
		}
		Some(Command::Next {
			expr,
			count,
			timezone,
		}) => {
			let tz: Tz = timezone.parse().map_err(|e| ConfigError::InvalidValue {
				key: "--timezone".to_string(),
				message: format!("{e}"),
			})?;
			let now = Utc::now().with_timezone(&tz);
			for time in pasta_server::preview(&expr, count, &now)? {
				println!("{}", time.to_rfc3339());
			}
			return Ok(());
		}
		_ => {}
	}

	// Load .env file if present
	dotenvy::dotenv().ok();

	let config = load_config(args.config)?;
	init_tracing(&config.logging);

	let scheduler = pasta_server::build_scheduler(&config.scheduler)?;

	if matches!(args.command, Some(Command::Check)) {
		tracing::info!(
			tasks = ?scheduler.task_ids(),
			timezone = %config.scheduler.timezone,
			"Configuration OK"
		);
		println!("configuration OK ({} tasks)", scheduler.task_ids().len());
		return Ok(());
	}

	if !config.scheduler.enabled {
		tracing::warn!("Scheduler disabled by configuration, exiting");
		return Ok(());
	}

	tracing::info!(
		timezone = %config.scheduler.timezone,
		tasks = scheduler.task_ids().len(),
		"starting pasta-server"
	);
	scheduler.start().await?;

	tokio::signal::ctrl_c().await?;
	tracing::info!("Received shutdown signal");
	scheduler.stop().await;

	tracing::info!("Server shutdown complete");
	Ok(())
}

fn load_config(path: Option<PathBuf>) -> Result<ServerConfig, ConfigError> {
	match path {
		Some(path) => pasta_server_config::load_config_with_file(path),
		None => pasta_server_config::load_config(),
	}
}

fn init_tracing(logging: &LoggingConfig) {
	tracing_subscriber::registry()
		.with(
			tracing_subscriber::EnvFilter::try_from_default_env()
				.unwrap_or_else(|_| logging.level.clone().into()),
		)
		.with(tracing_subscriber::fmt::layer())
		.init();
}
