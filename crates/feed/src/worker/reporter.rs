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

use anvil_sdk::types::Side;
use crossbeam::channel::Sender;
use tracing::info;

use super::{ExitGuard, ExitReason, ShutdownSignal, WorkerExit};
use crate::{
	OrderBook,
	event::{EventSink, FeedEvent},
};

/// Configuration for a side reporter
#[derive(Debug, Clone)]
pub struct ReporterConfig {
	/// Side of the book to traverse
	pub side: Side,
	/// Time between traversals; `None` (or zero) traverses once and exits
	pub interval: Option<Duration>,
}

impl ReporterConfig {
	pub fn once(side: Side) -> Self {
		Self {
			side,
			interval: None,
		}
	}
}

/// Side Reporter - surfaces one side of the book to the event sink
///
/// Each pass copies the side under the book lock, then reports every
/// order followed by a summary, with the lock already released.
pub struct SideReporter;

impl SideReporter {
	/// Thread name for the reporter of a side
	pub fn worker_name(side: Side) -> String {
		match side {
			Side::Buy => "reporter-bids".to_string(),
			Side::Sell => "reporter-asks".to_string(),
		}
	}

	pub fn spawn(
		book: Arc<OrderBook>,
		sink: Arc<dyn EventSink>,
		config: ReporterConfig,
		shutdown: ShutdownSignal,
		exits: Sender<WorkerExit>,
	) -> io::Result<JoinHandle<()>> {
		let name = Self::worker_name(config.side);

		thread::Builder::new().name(name.clone()).spawn(move || {
			let guard = ExitGuard::new(name, exits);
			info!(
				target: "reporter",
				side = %config.side,
				interval = ?config.interval,
				"Reporter started"
			);
			let reason = Self::run(&book, sink.as_ref(), &config, &shutdown);
			info!(target: "reporter", side = %config.side, reason = ?reason, "Reporter stopped");
			guard.finish(reason);
		})
	}

	pub fn run(
		book: &OrderBook,
		sink: &dyn EventSink,
		config: &ReporterConfig,
		shutdown: &ShutdownSignal,
	) -> ExitReason {
		let mut pass = 1;

		loop {
			if shutdown.is_triggered() {
				return ExitReason::Stopped;
			}

			Self::report_once(book, sink, config.side, pass);

			// A zero interval would spin on the book lock; report once instead
			match config.interval.filter(|interval| !interval.is_zero()) {
				None => return ExitReason::Completed,
				Some(interval) => {
					if shutdown.wait_timeout(interval) {
						return ExitReason::Stopped;
					}
				}
			}

			pass += 1;
		}
	}

	/// Traverse one side once; returns the number of orders reported
	pub fn report_once(book: &OrderBook, sink: &dyn EventSink, side: Side, pass: u64) -> usize {
		let orders = book.snapshot(side);

		for order in &orders {
			sink.report(FeedEvent::OrderReported {
				side,
				order_id: order.order_id,
				price: order.price,
				quantity: order.quantity,
			});
		}

		sink.report(FeedEvent::SideReported {
			side,
			order_count: orders.len(),
			pass,
		});

		orders.len()
	}
}
