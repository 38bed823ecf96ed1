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

//! Worker threads and the plumbing they share
//!
//! Every worker runs on its own named OS thread, observes a
//! [`ShutdownSignal`] at each point where it may block, and reports how it
//! ended through a [`WorkerExit`] message so the supervisor can react.

mod feed;
mod heartbeat;
mod reporter;

pub use feed::FeedWorker;
pub use heartbeat::{HeartbeatConfig, HeartbeatWorker};
pub use reporter::{ReporterConfig, SideReporter};

use std::{sync::Arc, time::Duration};

use crossbeam::channel::Sender;
use parking_lot::{Condvar, Mutex};

/// Cooperative cancellation signal shared by all workers
///
/// Cloning is cheap; every clone observes the same flag.
#[derive(Debug, Clone, Default)]
pub struct ShutdownSignal {
	inner: Arc<SignalState>,
}

#[derive(Debug, Default)]
struct SignalState {
	triggered: Mutex<bool>,
	cond: Condvar,
}

impl ShutdownSignal {
	pub fn new() -> Self {
		Self::default()
	}

	/// Request shutdown and wake every waiter
	pub fn trigger(&self) {
		let mut triggered = self.inner.triggered.lock();
		*triggered = true;
		self.inner.cond.notify_all();
	}

	pub fn is_triggered(&self) -> bool {
		*self.inner.triggered.lock()
	}

	/// Sleep for up to `timeout`, returning early on shutdown
	///
	/// Returns `true` if shutdown was requested.
	pub fn wait_timeout(&self, timeout: Duration) -> bool {
		let mut triggered = self.inner.triggered.lock();
		if !*triggered {
			// Spurious wakeups only shorten one interval
			let _ = self.inner.cond.wait_for(&mut triggered, timeout);
		}
		*triggered
	}
}

/// How a worker ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExitReason {
	/// Finished its work (e.g. a run-once reporter)
	Completed,
	/// Observed the shutdown signal
	Stopped,
	/// Hit an unrecoverable error
	Failed(String),
	/// Thread unwound without reporting
	Panicked,
}

impl ExitReason {
	pub fn is_failure(&self) -> bool {
		matches!(self, ExitReason::Failed(_) | ExitReason::Panicked)
	}
}

/// Exit report sent by a worker to its supervisor
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkerExit {
	pub worker: String,
	pub reason: ExitReason,
}

/// Reports a worker's exit exactly once
///
/// Created at the top of the worker thread. If the thread unwinds before
/// `finish` is called, the drop reports `Panicked`.
pub(crate) struct ExitGuard {
	worker: String,
	exits: Sender<WorkerExit>,
	reported: bool,
}

impl ExitGuard {
	pub(crate) fn new(worker: impl Into<String>, exits: Sender<WorkerExit>) -> Self {
		Self {
			worker: worker.into(),
			exits,
			reported: false,
		}
	}

	pub(crate) fn finish(mut self, reason: ExitReason) {
		self.send(reason);
	}

	fn send(&mut self, reason: ExitReason) {
		if self.reported {
			return;
		}
		self.reported = true;
		// The supervisor may already be gone during process exit
		let _ = self.exits.send(WorkerExit {
			worker: self.worker.clone(),
			reason,
		});
	}
}

impl Drop for ExitGuard {
	fn drop(&mut self) {
		self.send(ExitReason::Panicked);
	}
}
