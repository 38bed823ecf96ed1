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
	thread::JoinHandle,
	time::{Duration, Instant},
};

use crossbeam::channel::{Receiver, RecvTimeoutError, Sender, unbounded};
use tracing::{error, info, warn};

use crate::worker::{ExitReason, ShutdownSignal, WorkerExit};

/// Supervisor - owns worker threads and observes how they end
///
/// Workers are registered after being spawned with the supervisor's
/// shutdown signal and exit sender. The supervisor does not restart
/// anything: it only makes exits visible (see [`ExitMonitor`]) and
/// guarantees that every worker is signalled and joined on shutdown.
pub struct Supervisor {
	shutdown: ShutdownSignal,
	exits_tx: Sender<WorkerExit>,
	exits_rx: Receiver<WorkerExit>,
	workers: Vec<(String, JoinHandle<()>)>,
}

impl Supervisor {
	pub fn new() -> Self {
		let (exits_tx, exits_rx) = unbounded();
		Self {
			shutdown: ShutdownSignal::new(),
			exits_tx,
			exits_rx,
			workers: Vec::new(),
		}
	}

	/// Signal to hand to every supervised worker
	pub fn shutdown_signal(&self) -> ShutdownSignal {
		self.shutdown.clone()
	}

	/// Channel workers report their exit on
	pub fn exit_sender(&self) -> Sender<WorkerExit> {
		self.exits_tx.clone()
	}

	pub fn register(&mut self, name: impl Into<String>, handle: JoinHandle<()>) {
		let name = name.into();
		info!(target: "supervisor", worker = %name, "Worker registered");
		self.workers.push((name, handle));
	}

	pub fn worker_count(&self) -> usize {
		self.workers.len()
	}

	/// Monitor over the exits of all currently registered workers
	pub fn monitor(&self) -> ExitMonitor {
		ExitMonitor {
			exits: self.exits_rx.clone(),
			running: self.workers.len(),
		}
	}

	/// Signal every worker and join them all
	pub fn shutdown(mut self) {
		self.stop_workers();
	}

	fn stop_workers(&mut self) {
		if self.workers.is_empty() {
			return;
		}

		info!(target: "supervisor", workers = self.workers.len(), "Stopping workers");
		self.shutdown.trigger();

		for (name, handle) in self.workers.drain(..) {
			if let Err(e) = handle.join() {
				warn!(target: "supervisor", worker = %name, error = ?e, "Worker thread panicked");
			}
		}

		info!(target: "supervisor", "All workers stopped");
	}
}

impl Default for Supervisor {
	fn default() -> Self {
		Self::new()
	}
}

impl Drop for Supervisor {
	fn drop(&mut self) {
		self.stop_workers();
	}
}

/// Blocking view over worker exits
///
/// Completed and stopped workers are logged and counted down; the first
/// failed or panicked worker is returned to the caller.
pub struct ExitMonitor {
	exits: Receiver<WorkerExit>,
	running: usize,
}

impl ExitMonitor {
	/// Number of workers that have not reported an exit yet
	pub fn running(&self) -> usize {
		self.running
	}

	/// Block until a worker fails or every worker has exited
	pub fn wait(&mut self) -> Option<WorkerExit> {
		while self.running > 0 {
			match self.exits.recv() {
				Ok(exit) => {
					if let Some(failure) = self.record(exit) {
						return Some(failure);
					}
				}
				Err(_) => return None,
			}
		}
		None
	}

	/// Like [`ExitMonitor::wait`], giving up after `timeout`
	pub fn wait_timeout(&mut self, timeout: Duration) -> Option<WorkerExit> {
		let deadline = Instant::now() + timeout;
		while self.running > 0 {
			let remaining = deadline.saturating_duration_since(Instant::now());
			match self.exits.recv_timeout(remaining) {
				Ok(exit) => {
					if let Some(failure) = self.record(exit) {
						return Some(failure);
					}
				}
				Err(RecvTimeoutError::Timeout) | Err(RecvTimeoutError::Disconnected) => {
					return None;
				}
			}
		}
		None
	}

	fn record(&mut self, exit: WorkerExit) -> Option<WorkerExit> {
		self.running = self.running.saturating_sub(1);

		match &exit.reason {
			ExitReason::Completed | ExitReason::Stopped => {
				info!(
					target: "supervisor",
					worker = %exit.worker,
					reason = ?exit.reason,
					running = self.running,
					"Worker exited"
				);
				None
			}
			ExitReason::Failed(message) => {
				error!(
					target: "supervisor",
					worker = %exit.worker,
					error = %message,
					"Worker failed"
				);
				Some(exit)
			}
			ExitReason::Panicked => {
				error!(target: "supervisor", worker = %exit.worker, "Worker panicked");
				Some(exit)
			}
		}
	}
}
