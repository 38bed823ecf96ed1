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
};

use crossbeam::channel::Sender;
use tracing::{error, info, trace};

use super::{ExitGuard, ExitReason, ShutdownSignal, WorkerExit};
use crate::{
	processor::FeedProcessor,
	transport::{ReceiveError, Transport},
};

/// Feed ingestion worker
///
/// The single writer of the order book. It loops over:
/// 1. Receive one datagram (bounded by the transport's poll interval)
/// 2. Decode, validate and apply it through the [`FeedProcessor`]
///
/// Messages are applied in arrival order, one at a time. Bad messages are
/// discarded by the processor; only a fatal socket error or a closed
/// transport ends the loop, and that is reported as a failed exit.
pub struct FeedWorker;

impl FeedWorker {
	pub const NAME: &'static str = "feed";

	/// Spawn the worker on a dedicated thread
	pub fn spawn(
		transport: Arc<Transport>,
		processor: Arc<FeedProcessor>,
		buffer_size: usize,
		shutdown: ShutdownSignal,
		exits: Sender<WorkerExit>,
	) -> io::Result<JoinHandle<()>> {
		thread::Builder::new()
			.name(Self::NAME.to_string())
			.spawn(move || {
				let guard = ExitGuard::new(Self::NAME, exits);
				info!(
					target: "feed",
					feed_addr = %transport.local_feed_addr(),
					"Feed worker started"
				);
				let reason = Self::run(&transport, &processor, buffer_size, &shutdown);
				info!(
					target: "feed",
					reason = ?reason,
					stats = ?processor.stats(),
					"Feed worker stopped"
				);
				guard.finish(reason);
			})
	}

	/// Receive loop; returns when shutdown is requested or the feed dies
	pub fn run(
		transport: &Transport,
		processor: &FeedProcessor,
		buffer_size: usize,
		shutdown: &ShutdownSignal,
	) -> ExitReason {
		let mut buf = vec![0u8; buffer_size.max(1)];

		loop {
			if shutdown.is_triggered() {
				return ExitReason::Stopped;
			}

			match transport.receive_unreliable(&mut buf) {
				Ok(len) => {
					let outcome = processor.process(&buf[..len]);
					trace!(target: "feed", len = len, outcome = ?outcome, "Datagram processed");
				}
				Err(ReceiveError::NoData) => continue,
				Err(ReceiveError::Closed) if shutdown.is_triggered() => {
					return ExitReason::Stopped;
				}
				Err(e) => {
					error!(target: "feed", error = %e, "Feed channel failed, stopping ingestion");
					return ExitReason::Failed(e.to_string());
				}
			}
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::{FeedConfig, OrderBook, event::MemoryEventSink, types::Order};
	use anvil_sdk::types::Side;
	use crossbeam::channel::unbounded;
	use std::{net::UdpSocket, time::Duration};

	fn transport() -> Arc<Transport> {
		let config = FeedConfig {
			feed_port: 0,
			recv_poll_interval_ms: 10,
			..FeedConfig::default()
		};
		Arc::new(Transport::configure(&config).unwrap())
	}

	#[test]
	fn test_run_stops_on_shutdown() {
		let transport = transport();
		let processor = FeedProcessor::new(Arc::new(OrderBook::new()), Arc::new(MemoryEventSink::new()));
		let shutdown = ShutdownSignal::new();
		shutdown.trigger();

		let reason = FeedWorker::run(&transport, &processor, 1024, &shutdown);
		assert_eq!(reason, ExitReason::Stopped);
	}

	#[test]
	fn test_teardown_without_shutdown_is_failure() {
		let transport = transport();
		let processor = FeedProcessor::new(Arc::new(OrderBook::new()), Arc::new(MemoryEventSink::new()));
		transport.teardown();

		let reason = FeedWorker::run(&transport, &processor, 1024, &ShutdownSignal::new());
		assert!(matches!(reason, ExitReason::Failed(_)));
	}

	#[test]
	fn test_spawned_worker_applies_datagrams() {
		let transport = transport();
		let book = Arc::new(OrderBook::new());
		let processor = Arc::new(FeedProcessor::new(book.clone(), Arc::new(MemoryEventSink::new())));
		let shutdown = ShutdownSignal::new();
		let (tx, rx) = unbounded();

		let handle =
			FeedWorker::spawn(transport.clone(), processor, 1024, shutdown.clone(), tx).unwrap();

		let sender = UdpSocket::bind("127.0.0.1:0").unwrap();
		sender
			.send_to(
				br#"{"order_id":3,"price":7.25,"quantity":4,"action":"add","type":"sell"}"#,
				transport.local_feed_addr(),
			)
			.unwrap();

		let mut applied = false;
		for _ in 0..200 {
			if book.get(Side::Sell, 3).is_some() {
				applied = true;
				break;
			}
			thread::sleep(Duration::from_millis(10));
		}
		assert!(applied);
		assert_eq!(book.get(Side::Sell, 3), Some(Order::new(3, 7.25, 4)));

		shutdown.trigger();
		handle.join().unwrap();
		let exit = rx.recv_timeout(Duration::from_secs(1)).unwrap();
		assert_eq!(exit.worker, "feed");
		assert_eq!(exit.reason, ExitReason::Stopped);
	}
}
