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

mod sink;

use std::net::SocketAddr;

use anvil_sdk::types::Side;
use serde::Serialize;

use crate::types::OrderId;

pub use sink::{MemoryEventSink, TracingSink};

/// Observability events emitted by the feed handler
///
/// Each variant carries enough structured fields to reconstruct what
/// happened without parsing a message string.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum FeedEvent {
	/// An `add` was applied to the book
	OrderApplied {
		order_id: OrderId,
		side: Side,
		price: f64,
		quantity: u64,
		/// Whether an existing order with the same id was overwritten
		replaced: bool,
	},

	/// Payload could not be parsed as a structured document
	DecodeFailed { reason: String, payload_len: usize },

	/// Document parsed but a required field was missing or ill-typed
	ValidationFailed { field: String, reason: String },

	/// Reliable channel handshake succeeded
	ConnectionEstablished { remote: SocketAddr },

	/// Reliable channel handshake failed
	ConnectionFailed { remote: SocketAddr, reason: String },

	/// One order surfaced by a reporter traversal
	OrderReported {
		side: Side,
		order_id: OrderId,
		price: f64,
		quantity: u64,
	},

	/// End of one reporter traversal
	SideReported {
		side: Side,
		order_count: usize,
		pass: u64,
	},
}

impl FeedEvent {
	/// Short label, used as the message of the emitted log line
	pub fn label(&self) -> &'static str {
		match self {
			FeedEvent::OrderApplied { .. } => "order_applied",
			FeedEvent::DecodeFailed { .. } => "decode_failed",
			FeedEvent::ValidationFailed { .. } => "validation_failed",
			FeedEvent::ConnectionEstablished { .. } => "connection_established",
			FeedEvent::ConnectionFailed { .. } => "connection_failed",
			FeedEvent::OrderReported { .. } => "order_reported",
			FeedEvent::SideReported { .. } => "side_reported",
		}
	}

	/// True for events describing a discarded or failed operation
	pub fn is_failure(&self) -> bool {
		matches!(
			self,
			FeedEvent::DecodeFailed { .. }
				| FeedEvent::ValidationFailed { .. }
				| FeedEvent::ConnectionFailed { .. }
		)
	}
}

/// Event Sink trait - destination for observability events
///
/// The feed handler reports what it does through this trait instead of
/// formatting output itself. Implementations must be cheap and must not
/// block for long: `report` is called from the feed worker between
/// datagrams and from reporters while they traverse a snapshot.
pub trait EventSink: Send + Sync {
	fn report(&self, event: FeedEvent);
}
