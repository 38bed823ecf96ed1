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

use std::{
	io,
	sync::Arc,
	thread::{self, JoinHandle},
	time::Duration,
};

use crossbeam::channel::Sender;
use serde::Serialize;
use tracing::{debug, info, warn};

use super::{ExitGuard, ExitReason, ShutdownSignal, WorkerExit};
use crate::{OrderBook, transport::Transport};

/// Configuration for the heartbeat worker
#[derive(Debug, Clone)]
pub struct HeartbeatConfig {
	pub interval: Duration,
}

/// Status line written to the reliable channel
#[derive(Debug, Serialize)]
struct Heartbeat {
	#[serde(rename = "type")]
	kind: &'static str,
	seq: u64,
	bids: usize,
	asks: usize,
}

/// Heartbeat Worker - periodic connectivity status on the reliable channel
///
/// Writes one newline-terminated JSON line per interval. A send that
/// fails (channel closed, peer gone) is logged and the next interval
/// tries again; the worker never reconnects.
pub struct HeartbeatWorker;

impl HeartbeatWorker {
	pub const NAME: &'static str = "heartbeat";

	pub fn spawn(
		transport: Arc<Transport>,
		book: Arc<OrderBook>,
		config: HeartbeatConfig,
		shutdown: ShutdownSignal,
		exits: Sender<WorkerExit>,
	) -> io::Result<JoinHandle<()>> {
		thread::Builder::new()
			.name(Self::NAME.to_string())
			.spawn(move || {
				let guard = ExitGuard::new(Self::NAME, exits);
				info!(
					target: "heartbeat",
					interval_ms = config.interval.as_millis() as u64,
					"Heartbeat worker started"
				);
				let reason = Self::run(&transport, &book, &config, &shutdown);
				info!(target: "heartbeat", reason = ?reason, "Heartbeat worker stopped");
				guard.finish(reason);
			})
	}

	pub fn run(
		transport: &Transport,
		book: &OrderBook,
		config: &HeartbeatConfig,
		shutdown: &ShutdownSignal,
	) -> ExitReason {
		if config.interval.is_zero() {
			return ExitReason::Failed("heartbeat interval must be greater than zero".to_string());
		}

		let mut seq = 0;

		loop {
			if shutdown.wait_timeout(config.interval) {
				return ExitReason::Stopped;
			}

			seq += 1;
			let line = match Self::encode(seq, book) {
				Ok(line) => line,
				Err(e) => return ExitReason::Failed(format!("Failed to encode heartbeat: {}", e)),
			};

			match transport.send_reliable(&line) {
				Ok(sent) => debug!(target: "heartbeat", seq = seq, sent = sent, "Heartbeat sent"),
				Err(e) => warn!(target: "heartbeat", seq = seq, error = %e, "Heartbeat not sent"),
			}
		}
	}

	fn encode(seq: u64, book: &OrderBook) -> Result<Vec<u8>, serde_json::Error> {
		let (bids, asks) = book.depth();
		let mut line = serde_json::to_vec(&Heartbeat {
			kind: "heartbeat",
			seq,
			bids,
			asks,
		})?;
		line.push(b'\n');
		Ok(line)
	}
}
