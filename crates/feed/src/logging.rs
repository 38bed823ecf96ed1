// Copyright 2025 itscheems
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Logging initialization for the feed handler
//!
//! # Configuration
//!
//! - `RUST_LOG`: Log level filter (default: `info`)
//!   - Per target: `RUST_LOG=info,feed=debug,orderbook=debug,transport=trace`
//!
//! - `LOG_DIR`: Root directory for log files (default: `{workspace_root}/logs`)
//!   - Files land in `{LOG_DIR}/feed/`
//!
//! - `LOG_TO_CONSOLE`: Mirror output on stderr (default: `false`)
//!   - `true`, `1` or `yes` enable it
//!
//! Files rotate daily (UTC): `feed.2026-01-03.log`. Each line carries a
//! UTC timestamp, thread id, level, target and structured fields.

use std::{
	env,
	path::{Path, PathBuf},
	sync::OnceLock,
};

use anyhow::{Context, Result};
use tracing::info;
use tracing_appender::{
	non_blocking,
	non_blocking::{NonBlocking, WorkerGuard},
	rolling::{RollingFileAppender, Rotation},
};
use tracing_subscriber::{
	EnvFilter, fmt, layer::SubscriberExt, registry::Registry, util::SubscriberInitExt,
};

use crate::config::{DEFAULT_LOG_LEVEL, DEFAULT_LOG_TO_CONSOLE, LOG_COMPONENT_NAME};

static FILE_GUARD: OnceLock<WorkerGuard> = OnceLock::new();

/// Resolved logging settings
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogSettings {
	/// Filter directive used when `RUST_LOG` is not set or invalid
	pub level: String,
	/// Directory the rolling files are written to
	pub dir: PathBuf,
	pub console: bool,
}

impl LogSettings {
	/// Read `RUST_LOG`, `LOG_DIR` and `LOG_TO_CONSOLE`
	pub fn from_env() -> Self {
		let root = env::var_os("LOG_DIR")
			.map(PathBuf::from)
			.unwrap_or_else(|| workspace_root().join("logs"));

		Self {
			level: env::var("RUST_LOG").unwrap_or_else(|_| DEFAULT_LOG_LEVEL.to_string()),
			dir: root.join(LOG_COMPONENT_NAME),
			console: env::var("LOG_TO_CONSOLE")
				.map(|v| parse_flag(&v))
				.unwrap_or(DEFAULT_LOG_TO_CONSOLE),
		}
	}
}

fn parse_flag(value: &str) -> bool {
	matches!(value.trim().to_ascii_lowercase().as_str(), "true" | "1" | "yes")
}

/// Nearest ancestor whose Cargo.toml declares a `[workspace]`
///
/// Starts from the crate directory at build time, else the working directory.
fn workspace_root() -> PathBuf {
	let start = env::var_os("CARGO_MANIFEST_DIR")
		.map(PathBuf::from)
		.or_else(|| env::current_dir().ok())
		.unwrap_or_else(|| PathBuf::from("."));

	let found = start
		.ancestors()
		.find(|dir| {
			std::fs::read_to_string(dir.join("Cargo.toml"))
				.map(|manifest| manifest.contains("[workspace]"))
				.unwrap_or(false)
		})
		.map(Path::to_path_buf);

	found.unwrap_or(start)
}

fn file_writer(dir: &Path) -> Result<NonBlocking> {
	std::fs::create_dir_all(dir)
		.with_context(|| format!("Failed to create log directory: {}", dir.display()))?;

	let appender = RollingFileAppender::builder()
		.rotation(Rotation::DAILY)
		.filename_prefix(LOG_COMPONENT_NAME)
		.filename_suffix("log")
		.build(dir)
		.with_context(|| format!("Failed to create rolling log file in {}", dir.display()))?;

	let (writer, guard) = non_blocking(appender);
	// Only the first initialization keeps its guard
	let _ = FILE_GUARD.set(guard);
	Ok(writer)
}

/// Initialize logging from the environment
///
/// Call once, before the transport is configured or any worker starts.
pub fn init_logging() -> Result<()> {
	dotenv::dotenv().ok();
	init_with(&LogSettings::from_env())
}

/// Install the global subscriber for `settings`
pub fn init_with(settings: &LogSettings) -> Result<()> {
	let filter =
		EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&settings.level));

	let file_layer = fmt::layer()
		.with_writer(file_writer(&settings.dir)?)
		.with_timer(fmt::time::UtcTime::rfc_3339())
		.with_thread_ids(true)
		.with_target(true)
		.with_ansi(false);

	let console_layer = settings.console.then(|| {
		fmt::layer()
			.with_writer(std::io::stderr)
			.with_timer(fmt::time::UtcTime::rfc_3339())
			.with_thread_names(true)
			.with_target(true)
	});

	Registry::default()
		.with(filter)
		.with(file_layer)
		.with(console_layer)
		.try_init()
		.context("Failed to install tracing subscriber")?;

	info!(
		target: "server",
		level = %settings.level,
		dir = %settings.dir.display(),
		console = settings.console,
		"Logging initialized ({}.YYYY-MM-DD.log, daily rolling)",
		LOG_COMPONENT_NAME
	);

	Ok(())
}
