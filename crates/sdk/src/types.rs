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

use std::fmt;

use serde::{Deserialize, Serialize};

/// Order side (buy or sell)
///
/// On the wire this is the `type` tag of a feed message, spelled exactly
/// `"buy"` or `"sell"`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Side {
	Buy,
	Sell,
}

impl Side {
	/// Wire tag for this side
	pub fn as_str(&self) -> &'static str {
		match self {
			Side::Buy => "buy",
			Side::Sell => "sell",
		}
	}

	/// Parse a wire tag. Matching is exact and case-sensitive.
	pub fn from_tag(tag: &str) -> Option<Self> {
		match tag {
			"buy" => Some(Side::Buy),
			"sell" => Some(Side::Sell),
			_ => None,
		}
	}
}

impl fmt::Display for Side {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(self.as_str())
	}
}

/// Action tag that adds (or replaces) an order on the book
pub const ACTION_ADD: &str = "add";

/// Market data message as published on the feed
///
/// This is the producer-side representation of one datagram. The feed
/// handler does not deserialize into this struct; it validates the raw
/// document field by field so that every failure can name the offending field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeedMessage {
	/// Order identity, unique within a side
	pub order_id: u64,
	/// Limit price
	pub price: f64,
	/// Order quantity
	pub quantity: u64,
	/// Action tag (`"add"` is the only action that mutates the book)
	pub action: String,
	/// Side tag
	#[serde(rename = "type")]
	pub side: Side,
}

impl FeedMessage {
	/// Build an `add` message
	pub fn add(order_id: u64, side: Side, price: f64, quantity: u64) -> Self {
		Self {
			order_id,
			price,
			quantity,
			action: ACTION_ADD.to_string(),
			side,
		}
	}

	/// Build a message with an arbitrary action tag
	pub fn with_action(
		order_id: u64,
		side: Side,
		price: f64,
		quantity: u64,
		action: impl Into<String>,
	) -> Self {
		Self {
			order_id,
			price,
			quantity,
			action: action.into(),
			side,
		}
	}

	/// Serialize to the JSON wire form
	pub fn to_bytes(&self) -> Result<Vec<u8>, serde_json::Error> {
		serde_json::to_vec(self)
	}
}
