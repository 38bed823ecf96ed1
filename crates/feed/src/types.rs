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

use anvil_sdk::types::{ACTION_ADD, Side};
use serde::{Deserialize, Serialize};

/// Order identity, unique within one side of the book
pub type OrderId = u64;

/// Resting order as stored in the book
///
/// Orders carry no lifecycle of their own: they are built once from a
/// validated feed message and replaced wholesale when the same identity
/// arrives again on the same side.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Order {
	/// Order identity (book key)
	pub order_id: OrderId,
	/// Limit price, finite and strictly positive
	pub price: f64,
	/// Quantity, strictly positive
	pub quantity: u64,
}

impl Order {
	pub fn new(order_id: OrderId, price: f64, quantity: u64) -> Self {
		Self {
			order_id,
			price,
			quantity,
		}
	}
}

/// Action carried by a feed message
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
	/// Insert or overwrite the order on its side
	Add,
	/// Syntactically valid action with no effect on the book
	Other(String),
}

impl Action {
	pub fn from_tag(tag: &str) -> Self {
		if tag == ACTION_ADD {
			Action::Add
		} else {
			Action::Other(tag.to_string())
		}
	}

	pub fn as_str(&self) -> &str {
		match self {
			Action::Add => ACTION_ADD,
			Action::Other(tag) => tag,
		}
	}
}

/// Validated command decoded from one datagram
#[derive(Debug, Clone, PartialEq)]
pub struct FeedCommand {
	pub action: Action,
	pub side: Side,
	pub order: Order,
}
