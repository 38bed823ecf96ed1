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

use std::sync::Arc;

use parking_lot::Mutex;
use tracing::{error, info, warn};

use super::{EventSink, FeedEvent};

/// Sink that turns every event into a structured `tracing` record
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingSink;

impl TracingSink {
	pub fn new() -> Self {
		Self
	}
}

impl EventSink for TracingSink {
	fn report(&self, event: FeedEvent) {
		let label = event.label();
		match event {
			FeedEvent::OrderApplied {
				order_id,
				side,
				price,
				quantity,
				replaced,
			} => {
				info!(
					target: "feed",
					order_id = order_id,
					side = %side,
					price = price,
					quantity = quantity,
					replaced = replaced,
					"{}", label
				);
			}
			FeedEvent::DecodeFailed {
				reason,
				payload_len,
			} => {
				warn!(
					target: "feed",
					reason = %reason,
					payload_len = payload_len,
					"{}", label
				);
			}
			FeedEvent::ValidationFailed { field, reason } => {
				warn!(
					target: "feed",
					field = %field,
					reason = %reason,
					"{}", label
				);
			}
			FeedEvent::ConnectionEstablished { remote } => {
				info!(target: "transport", remote = %remote, "{}", label);
			}
			FeedEvent::ConnectionFailed { remote, reason } => {
				error!(
					target: "transport",
					remote = %remote,
					reason = %reason,
					"{}", label
				);
			}
			FeedEvent::OrderReported {
				side,
				order_id,
				price,
				quantity,
			} => {
				info!(
					target: "reporter",
					side = %side,
					order_id = order_id,
					price = price,
					quantity = quantity,
					"{}", label
				);
			}
			FeedEvent::SideReported {
				side,
				order_count,
				pass,
			} => {
				info!(
					target: "reporter",
					side = %side,
					order_count = order_count,
					pass = pass,
					"{}", label
				);
			}
		}
	}
}

/// In-memory sink recording every event
///
/// Clones share the same event list, so a test can keep one handle and
/// give another to the component under test.
#[derive(Debug, Default, Clone)]
pub struct MemoryEventSink {
	events: Arc<Mutex<Vec<FeedEvent>>>,
}

impl MemoryEventSink {
	pub fn new() -> Self {
		Self::default()
	}

	/// Copy of all recorded events in arrival order
	pub fn events(&self) -> Vec<FeedEvent> {
		self.events.lock().clone()
	}

	/// Number of recorded failure events
	pub fn failure_count(&self) -> usize {
		self.events.lock().iter().filter(|e| e.is_failure()).count()
	}

	/// Number of recorded events with the given label
	pub fn count(&self, label: &str) -> usize {
		self.events
			.lock()
			.iter()
			.filter(|e| e.label() == label)
			.count()
	}

	pub fn clear(&self) {
		self.events.lock().clear();
	}
}

impl EventSink for MemoryEventSink {
	fn report(&self, event: FeedEvent) {
		self.events.lock().push(event);
	}
}
