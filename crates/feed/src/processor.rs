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

use std::sync::{
	Arc,
	atomic::{AtomicU64, Ordering},
};

use anvil_sdk::types::Side;
use serde_json::{Map, Value};
use thiserror::Error;
use tracing::debug;

use crate::{
	OrderBook,
	event::{EventSink, FeedEvent},
	types::{Action, FeedCommand, Order},
};

/// Payload could not be parsed into a structured document
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Failed to decode payload: {reason}")]
pub struct DecodeError {
	pub reason: String,
}

/// Document parsed but violates the field contract
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Invalid field `{field}`: {reason}")]
pub struct ValidationError {
	pub field: String,
	pub reason: String,
}

impl ValidationError {
	fn new(field: &str, reason: impl Into<String>) -> Self {
		Self {
			field: field.to_string(),
			reason: reason.into(),
		}
	}
}

/// Why a message was dropped
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DiscardReason {
	#[error(transparent)]
	Decode(#[from] DecodeError),
	#[error(transparent)]
	Validation(#[from] ValidationError),
}

/// What happened to one inbound message
#[derive(Debug, Clone, PartialEq)]
pub enum MessageOutcome {
	/// An `add` was applied to the book
	Applied { side: Side, order: Order, replaced: bool },
	/// Valid message whose action has no effect on the book
	Ignored { action: String },
	/// Message dropped at decode or validation
	Discarded(DiscardReason),
}

/// Counters kept by a processor
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FeedStats {
	pub received: u64,
	pub applied: u64,
	pub ignored: u64,
	pub discarded: u64,
}

#[derive(Debug, Default)]
struct Counters {
	received: AtomicU64,
	applied: AtomicU64,
	ignored: AtomicU64,
	discarded: AtomicU64,
}

/// Decode a raw payload into a JSON document
pub fn decode(payload: &[u8]) -> Result<Value, DecodeError> {
	serde_json::from_slice(payload).map_err(|e| DecodeError {
		reason: e.to_string(),
	})
}

/// Check the field contract and build a command
///
/// Every required field is checked before the action is looked at, so an
/// unsupported action with a malformed body is still a validation failure.
pub fn validate(document: &Value) -> Result<FeedCommand, ValidationError> {
	let fields = document
		.as_object()
		.ok_or_else(|| ValidationError::new("<document>", "expected a JSON object"))?;

	let order_id = unsigned_field(fields, "order_id")?;

	let price = required(fields, "price")?
		.as_f64()
		.ok_or_else(|| ValidationError::new("price", "expected a number"))?;
	if !price.is_finite() || price <= 0.0 {
		return Err(ValidationError::new("price", "must be a positive number"));
	}

	let quantity = unsigned_field(fields, "quantity")?;
	if quantity == 0 {
		return Err(ValidationError::new("quantity", "must be greater than zero"));
	}

	let action = string_field(fields, "action")?;

	let side_tag = string_field(fields, "type")?;
	let side = Side::from_tag(side_tag).ok_or_else(|| {
		ValidationError::new(
			"type",
			format!("expected \"buy\" or \"sell\", got \"{}\"", side_tag),
		)
	})?;

	Ok(FeedCommand {
		action: Action::from_tag(action),
		side,
		order: Order::new(order_id, price, quantity),
	})
}

fn required<'a>(fields: &'a Map<String, Value>, name: &str) -> Result<&'a Value, ValidationError> {
	match fields.get(name) {
		Some(Value::Null) | None => Err(ValidationError::new(name, "missing required field")),
		Some(value) => Ok(value),
	}
}

fn unsigned_field(fields: &Map<String, Value>, name: &str) -> Result<u64, ValidationError> {
	required(fields, name)?
		.as_u64()
		.ok_or_else(|| ValidationError::new(name, "expected a non-negative integer"))
}

fn string_field<'a>(fields: &'a Map<String, Value>, name: &str) -> Result<&'a str, ValidationError> {
	required(fields, name)?
		.as_str()
		.ok_or_else(|| ValidationError::new(name, "expected a string"))
}

/// Feed Processor - turns raw datagrams into book mutations
///
/// Each message moves through `received -> decoded -> validated -> applied`,
/// or stops at `discarded`. Discards are never fatal: the failure is
/// reported to the event sink and the caller moves on to the next message.
///
/// Decoding and validation happen before the book lock is taken.
pub struct FeedProcessor {
	book: Arc<OrderBook>,
	sink: Arc<dyn EventSink>,
	counters: Counters,
}

impl FeedProcessor {
	pub fn new(book: Arc<OrderBook>, sink: Arc<dyn EventSink>) -> Self {
		Self {
			book,
			sink,
			counters: Counters::default(),
		}
	}

	/// Process one inbound payload
	pub fn process(&self, payload: &[u8]) -> MessageOutcome {
		self.counters.received.fetch_add(1, Ordering::Relaxed);

		let command = match decode(payload) {
			Ok(document) => match validate(&document) {
				Ok(command) => command,
				Err(e) => {
					self.sink.report(FeedEvent::ValidationFailed {
						field: e.field.clone(),
						reason: e.reason.clone(),
					});
					return self.discard(e.into());
				}
			},
			Err(e) => {
				self.sink.report(FeedEvent::DecodeFailed {
					reason: e.reason.clone(),
					payload_len: payload.len(),
				});
				return self.discard(e.into());
			}
		};

		self.apply(command)
	}

	/// Apply a validated command to the book
	pub fn apply(&self, command: FeedCommand) -> MessageOutcome {
		match command.action {
			Action::Add => {
				let replaced = self.book.upsert(command.side, command.order).is_some();
				self.counters.applied.fetch_add(1, Ordering::Relaxed);

				self.sink.report(FeedEvent::OrderApplied {
					order_id: command.order.order_id,
					side: command.side,
					price: command.order.price,
					quantity: command.order.quantity,
					replaced,
				});

				MessageOutcome::Applied {
					side: command.side,
					order: command.order,
					replaced,
				}
			}
			Action::Other(action) => {
				self.counters.ignored.fetch_add(1, Ordering::Relaxed);
				debug!(
					target: "feed",
					action = %action,
					order_id = command.order.order_id,
					side = %command.side,
					"Action has no effect on the book"
				);
				MessageOutcome::Ignored { action }
			}
		}
	}

	pub fn stats(&self) -> FeedStats {
		FeedStats {
			received: self.counters.received.load(Ordering::Relaxed),
			applied: self.counters.applied.load(Ordering::Relaxed),
			ignored: self.counters.ignored.load(Ordering::Relaxed),
			discarded: self.counters.discarded.load(Ordering::Relaxed),
		}
	}

	pub fn book(&self) -> &Arc<OrderBook> {
		&self.book
	}

	fn discard(&self, reason: DiscardReason) -> MessageOutcome {
		self.counters.discarded.fetch_add(1, Ordering::Relaxed);
		debug!(target: "feed", reason = %reason, "Message discarded");
		MessageOutcome::Discarded(reason)
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::event::MemoryEventSink;

	fn setup() -> (FeedProcessor, Arc<OrderBook>, MemoryEventSink) {
		let book = Arc::new(OrderBook::new());
		let sink = MemoryEventSink::new();
		let processor = FeedProcessor::new(book.clone(), Arc::new(sink.clone()));
		(processor, book, sink)
	}

	#[test]
	fn test_add_buy_goes_to_bids() {
		let (processor, book, sink) = setup();

		let outcome = processor.process(
			br#"{"order_id":1,"price":10.5,"quantity":2,"action":"add","type":"buy"}"#,
		);

		assert_eq!(
			outcome,
			MessageOutcome::Applied {
				side: Side::Buy,
				order: Order::new(1, 10.5, 2),
				replaced: false,
			}
		);
		assert_eq!(book.snapshot(Side::Buy), vec![Order::new(1, 10.5, 2)]);
		assert_eq!(book.len(Side::Sell), 0);
		assert_eq!(sink.count("order_applied"), 1);
	}

	#[test]
	fn test_add_sell_goes_to_asks() {
		let (processor, book, _sink) = setup();

		processor.process(br#"{"order_id":9,"price":3,"quantity":1,"action":"add","type":"sell"}"#);

		assert_eq!(book.get(Side::Sell, 9), Some(Order::new(9, 3.0, 1)));
		assert_eq!(book.len(Side::Buy), 0);
	}

	#[test]
	fn test_missing_quantity_is_discarded() {
		let (processor, book, sink) = setup();

		let outcome =
			processor.process(br#"{"order_id":1,"price":10,"action":"add","type":"buy"}"#);

		match outcome {
			MessageOutcome::Discarded(DiscardReason::Validation(e)) => {
				assert_eq!(e.field, "quantity");
			}
			other => panic!("expected validation discard, got {other:?}"),
		}
		assert!(book.is_empty());
		assert_eq!(sink.failure_count(), 1);
		assert_eq!(sink.events().len(), 1);
	}

	#[test]
	fn test_unknown_side_is_discarded() {
		let (processor, book, sink) = setup();

		processor.process(
			br#"{"order_id":1,"price":10,"quantity":1,"action":"add","type":"unknown"}"#,
		);

		assert!(book.is_empty());
		assert_eq!(
			sink.events(),
			vec![FeedEvent::ValidationFailed {
				field: "type".to_string(),
				reason: "expected \"buy\" or \"sell\", got \"unknown\"".to_string(),
			}]
		);
	}

	#[test]
	fn test_unimplemented_action_is_silent_noop() {
		let (processor, book, sink) = setup();

		let outcome = processor.process(
			br#"{"order_id":1,"price":10,"quantity":1,"action":"cancel","type":"buy"}"#,
		);

		assert_eq!(
			outcome,
			MessageOutcome::Ignored {
				action: "cancel".to_string()
			}
		);
		assert!(book.is_empty());
		assert_eq!(sink.failure_count(), 0);
		assert!(sink.events().is_empty());
	}

	#[test]
	fn test_malformed_json_is_decode_failure() {
		let (processor, book, sink) = setup();

		let outcome = processor.process(b"{\"order_id\": 1, \"price\"");

		assert!(matches!(
			outcome,
			MessageOutcome::Discarded(DiscardReason::Decode(_))
		));
		assert!(book.is_empty());
		assert_eq!(sink.count("decode_failed"), 1);
	}

	#[test]
	fn test_field_type_checks() {
		let cases: &[(&[u8], &str)] = &[
			(br#"[1,2,3]"#, "<document>"),
			(
				br#"{"order_id":"1","price":10,"quantity":1,"action":"add","type":"buy"}"#,
				"order_id",
			),
			(
				br#"{"order_id":-4,"price":10,"quantity":1,"action":"add","type":"buy"}"#,
				"order_id",
			),
			(
				br#"{"order_id":1,"price":"10","quantity":1,"action":"add","type":"buy"}"#,
				"price",
			),
			(
				br#"{"order_id":1,"price":0,"quantity":1,"action":"add","type":"buy"}"#,
				"price",
			),
			(
				br#"{"order_id":1,"price":10,"quantity":1.5,"action":"add","type":"buy"}"#,
				"quantity",
			),
			(
				br#"{"order_id":1,"price":10,"quantity":0,"action":"add","type":"buy"}"#,
				"quantity",
			),
			(
				br#"{"order_id":1,"price":10,"quantity":1,"action":7,"type":"buy"}"#,
				"action",
			),
			(
				br#"{"order_id":1,"price":10,"quantity":1,"action":"add","type":null}"#,
				"type",
			),
			(
				br#"{"order_id":1,"price":10,"quantity":1,"action":"add","type":"Buy"}"#,
				"type",
			),
		];

		for (payload, field) in cases {
			let document = decode(payload).unwrap();
			let err = validate(&document).unwrap_err();
			assert_eq!(&err.field, field, "payload: {}", String::from_utf8_lossy(payload));
		}
	}

	#[test]
	fn test_cancel_with_bad_body_still_fails_validation() {
		let (processor, _book, sink) = setup();

		processor.process(br#"{"order_id":1,"price":10,"action":"cancel","type":"buy"}"#);

		assert_eq!(sink.failure_count(), 1);
	}

	#[test]
	fn test_stats_track_outcomes() {
		let (processor, _book, _sink) = setup();

		processor.process(br#"{"order_id":1,"price":10,"quantity":1,"action":"add","type":"buy"}"#);
		processor.process(br#"{"order_id":1,"price":11,"quantity":1,"action":"add","type":"buy"}"#);
		processor
			.process(br#"{"order_id":1,"price":10,"quantity":1,"action":"modify","type":"buy"}"#);
		processor.process(b"not json");

		assert_eq!(
			processor.stats(),
			FeedStats {
				received: 4,
				applied: 2,
				ignored: 1,
				discarded: 1,
			}
		);
	}

	#[test]
	fn test_overwrite_reports_replacement() {
		let (processor, book, sink) = setup();

		processor.process(br#"{"order_id":5,"price":10,"quantity":1,"action":"add","type":"sell"}"#);
		let outcome = processor
			.process(br#"{"order_id":5,"price":12,"quantity":3,"action":"add","type":"sell"}"#);

		assert!(matches!(outcome, MessageOutcome::Applied { replaced: true, .. }));
		assert_eq!(book.snapshot(Side::Sell), vec![Order::new(5, 12.0, 3)]);
		assert!(matches!(
			sink.events().last(),
			Some(FeedEvent::OrderApplied { replaced: true, .. })
		));
	}
}
