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

use std::{io, sync::Arc};

use anvil_sdk::types::Side;
use thiserror::Error;
use tracing::{error, info};

use crate::{
	FeedConfig, OrderBook,
	event::{EventSink, FeedEvent},
	processor::{FeedProcessor, FeedStats},
	supervisor::{ExitMonitor, Supervisor},
	transport::{Transport, TransportError},
	worker::{FeedWorker, HeartbeatConfig, HeartbeatWorker, ReporterConfig, SideReporter},
};

/// Error types for starting the feed handler
#[derive(Debug, Error)]
pub enum StartError {
	#[error("Reliable channel connection failed: {0}")]
	ConnectFailed(#[source] TransportError),
	#[error("Failed to spawn worker {worker}: {source}")]
	Spawn {
		worker: String,
		#[source]
		source: io::Error,
	},
}

/// Feed handler wiring
///
/// Holds the shared pieces (transport, book, sink) until `start` is
/// called. Start-up order:
/// 1. Connect the reliable channel (no worker starts if this fails)
/// 2. Start one reporter per side
/// 3. Start the feed worker
/// 4. Start the heartbeat worker, when configured
pub struct FeedHandler {
	config: FeedConfig,
	transport: Arc<Transport>,
	book: Arc<OrderBook>,
	sink: Arc<dyn EventSink>,
}

impl FeedHandler {
	pub fn new(config: FeedConfig, transport: Arc<Transport>, sink: Arc<dyn EventSink>) -> Self {
		Self {
			config,
			transport,
			book: Arc::new(OrderBook::new()),
			sink,
		}
	}

	pub fn book(&self) -> &Arc<OrderBook> {
		&self.book
	}

	pub fn transport(&self) -> &Arc<Transport> {
		&self.transport
	}

	/// Connect and start every worker
	pub fn start(self) -> Result<RunningFeed, StartError> {
		let remote = self.transport.remote_order_addr();

		if let Err(e) = self.transport.try_connect_reliable() {
			self.sink.report(FeedEvent::ConnectionFailed {
				remote,
				reason: e.to_string(),
			});
			error!(target: "server", remote = %remote, "Not starting workers without order connectivity");
			return Err(StartError::ConnectFailed(e));
		}
		self.sink.report(FeedEvent::ConnectionEstablished { remote });

		let mut supervisor = Supervisor::new();
		let processor = Arc::new(FeedProcessor::new(self.book.clone(), self.sink.clone()));

		for side in [Side::Buy, Side::Sell] {
			let config = ReporterConfig {
				side,
				interval: self.config.report_interval(),
			};
			let handle = SideReporter::spawn(
				self.book.clone(),
				self.sink.clone(),
				config,
				supervisor.shutdown_signal(),
				supervisor.exit_sender(),
			)
			.map_err(|source| StartError::Spawn {
				worker: SideReporter::worker_name(side),
				source,
			})?;
			supervisor.register(SideReporter::worker_name(side), handle);
		}

		let handle = FeedWorker::spawn(
			self.transport.clone(),
			processor.clone(),
			self.config.recv_buffer_size,
			supervisor.shutdown_signal(),
			supervisor.exit_sender(),
		)
		.map_err(|source| StartError::Spawn {
			worker: FeedWorker::NAME.to_string(),
			source,
		})?;
		supervisor.register(FeedWorker::NAME, handle);

		if let Some(interval) = self.config.heartbeat_interval() {
			let handle = HeartbeatWorker::spawn(
				self.transport.clone(),
				self.book.clone(),
				HeartbeatConfig { interval },
				supervisor.shutdown_signal(),
				supervisor.exit_sender(),
			)
			.map_err(|source| StartError::Spawn {
				worker: HeartbeatWorker::NAME.to_string(),
				source,
			})?;
			supervisor.register(HeartbeatWorker::NAME, handle);
		}

		info!(
			target: "server",
			workers = supervisor.worker_count(),
			feed_addr = %self.transport.local_feed_addr(),
			"Feed handler started"
		);

		Ok(RunningFeed {
			supervisor,
			transport: self.transport,
			book: self.book,
			processor,
		})
	}
}

/// A started feed handler
///
/// Dropping it stops and joins every worker; `shutdown` additionally
/// tears the transport down.
pub struct RunningFeed {
	supervisor: Supervisor,
	transport: Arc<Transport>,
	book: Arc<OrderBook>,
	processor: Arc<FeedProcessor>,
}

impl RunningFeed {
	pub fn book(&self) -> &Arc<OrderBook> {
		&self.book
	}

	pub fn transport(&self) -> &Arc<Transport> {
		&self.transport
	}

	pub fn stats(&self) -> FeedStats {
		self.processor.stats()
	}

	pub fn worker_count(&self) -> usize {
		self.supervisor.worker_count()
	}

	/// Exit monitor over all started workers
	pub fn monitor(&self) -> ExitMonitor {
		self.supervisor.monitor()
	}

	/// Stop all workers, then release the sockets
	///
	/// The reliable channel is closed before joining so a worker blocked in
	/// a write returns straight away.
	pub fn shutdown(self) {
		info!(target: "server", "Shutting down feed handler");
		self.supervisor.shutdown_signal().trigger();
		self.transport.close_reliable();
		self.supervisor.shutdown();
		self.transport.teardown();
		info!(target: "server", stats = ?self.processor.stats(), "Feed handler stopped");
	}
}
