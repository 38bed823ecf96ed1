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

use std::collections::BTreeMap;

use anvil_sdk::types::Side;
use parking_lot::Mutex;
use tracing::debug;

use crate::types::{Order, OrderId};

/// Both sides of the book, guarded together
#[derive(Debug, Default)]
struct Sides {
	bids: BTreeMap<OrderId, Order>,
	asks: BTreeMap<OrderId, Order>,
}

impl Sides {
	fn side(&self, side: Side) -> &BTreeMap<OrderId, Order> {
		match side {
			Side::Buy => &self.bids,
			Side::Sell => &self.asks,
		}
	}

	fn side_mut(&mut self, side: Side) -> &mut BTreeMap<OrderId, Order> {
		match side {
			Side::Buy => &mut self.bids,
			Side::Sell => &mut self.asks,
		}
	}
}

/// Order book keyed by order identity (internally synchronized)
///
/// Holds one map per side, each ordered by order id so traversals are
/// deterministic. Prices are stored but not aggregated into levels.
///
/// Concurrency characteristics:
/// - One mutex guards both sides; every read and write goes through it
/// - A traversal of one side observes that side before or after any
///   given upsert, never in between
/// - Two traversals (bids, then asks) are NOT a joint snapshot
/// - No references to the inner maps ever leave this type
///
/// Share it across workers as `Arc<OrderBook>`.
#[derive(Debug, Default)]
pub struct OrderBook {
	sides: Mutex<Sides>,
}

impl OrderBook {
	/// Create an empty order book
	pub fn new() -> Self {
		Self::default()
	}

	/// Insert or overwrite an order by identity
	///
	/// Last write wins: the previous value for the same id on the same
	/// side is replaced and returned.
	pub fn upsert(&self, side: Side, order: Order) -> Option<Order> {
		let replaced = self.sides.lock().side_mut(side).insert(order.order_id, order);

		debug!(
			target: "orderbook",
			order_id = order.order_id,
			price = order.price,
			quantity = order.quantity,
			side = %side,
			replaced = replaced.is_some(),
			"Order upserted"
		);

		replaced
	}

	/// Copy of one side in identity order, taken under the book lock
	pub fn snapshot(&self, side: Side) -> Vec<Order> {
		self.sides.lock().side(side).values().copied().collect()
	}

	/// Visit every order on one side in identity order while holding the lock
	///
	/// The callback runs under the book lock; keep it short and free of I/O.
	pub fn for_each<F>(&self, side: Side, mut f: F)
	where
		F: FnMut(&Order),
	{
		let sides = self.sides.lock();
		for order in sides.side(side).values() {
			f(order);
		}
	}

	/// Look up one order
	pub fn get(&self, side: Side, order_id: OrderId) -> Option<Order> {
		self.sides.lock().side(side).get(&order_id).copied()
	}

	/// Number of orders on one side
	pub fn len(&self, side: Side) -> usize {
		self.sides.lock().side(side).len()
	}

	/// True when both sides are empty
	pub fn is_empty(&self) -> bool {
		let sides = self.sides.lock();
		sides.bids.is_empty() && sides.asks.is_empty()
	}

	/// Order counts for (bids, asks), read under a single lock acquisition
	pub fn depth(&self) -> (usize, usize) {
		let sides = self.sides.lock();
		(sides.bids.len(), sides.asks.len())
	}
}
