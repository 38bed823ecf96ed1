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

//! Feed handler entry point
//!
//! Wires up the components in order:
//! - Configuration (file given as first argument, else environment)
//! - Transport (UDP feed socket, TCP order channel)
//! - Feed handler (connect, then reporters, feed worker, heartbeat)
//! - Supervision until Ctrl-C or a failed worker

use std::sync::Arc;

use anyhow::{Context, Result, bail};
use tokio::signal;
use tracing::{error, info};

use anvil_feed::{FeedConfig, FeedHandler, StartError, TracingSink, Transport};

#[tokio::main]
async fn main() -> Result<()> {
	anvil_feed::logging::init_logging()?;

	// Unset keys fall back to defaults; malformed values are an error
	let path = std::env::args().nth(1);
	let config = FeedConfig::load(path.as_deref()).with_context(|| match &path {
		Some(path) => format!("Failed to load configuration from {}", path),
		None => "Failed to load configuration from environment".to_string(),
	})?;

	info!(target: "server", "Starting Anvil Feed Handler");
	info!(target: "server", "Feed endpoint: {}:{}", config.feed_addr, config.feed_port);
	info!(target: "server", "Order endpoint: {}:{}", config.order_host, config.order_port);
	info!(target: "server", "Receive buffer: {} bytes", config.recv_buffer_size);

	let transport =
		Arc::new(Transport::configure(&config).context("Failed to configure transport")?);

	let handler = FeedHandler::new(config, transport, Arc::new(TracingSink::new()));
	let running = match handler.start() {
		Ok(running) => running,
		Err(StartError::ConnectFailed(e)) => {
			error!(target: "server", error = %e, "Order endpoint unreachable, exiting");
			return Err(e).context("Failed to connect to order endpoint");
		}
		Err(e) => return Err(e).context("Failed to start feed handler"),
	};

	let mut monitor = running.monitor();
	let supervision = tokio::task::spawn_blocking(move || monitor.wait());

	let failure = tokio::select! {
		result = supervision => result.context("Supervision task failed")?,
		_ = signal::ctrl_c() => {
			info!(target: "server", "Shutting down...");
			None
		}
	};

	running.shutdown();

	if let Some(exit) = failure {
		bail!("Worker {} exited abnormally: {:?}", exit.worker, exit.reason);
	}

	info!(target: "server", "Shutdown complete");
	Ok(())
}
