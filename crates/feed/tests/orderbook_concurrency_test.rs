//! Concurrent access to the order book
//!
//! One writer, several readers: readers must never observe a partially
//! written order or a side mid-update.

use std::{
	sync::{
		Arc,
		atomic::{AtomicBool, Ordering},
	},
	thread,
	time::Duration,
};

use anvil_feed::{MemoryEventSink, Order, OrderBook, worker::SideReporter};
use anvil_sdk::Side;

const WRITES: u64 = 20_000;
const IDS: u64 = 32;

/// Every write keeps quantity == price * 100, so a torn read breaks it
fn order(order_id: u64, step: u64) -> Order {
	let quantity = step + 1;
	Order::new(order_id, quantity as f64 / 100.0, quantity)
}

fn is_consistent(order: &Order) -> bool {
	(order.price * 100.0).round() as u64 == order.quantity
}

#[test]
fn test_readers_never_see_torn_orders() {
	let book = Arc::new(OrderBook::new());
	let done = Arc::new(AtomicBool::new(false));

	let writer = {
		let book = book.clone();
		let done = done.clone();
		thread::spawn(move || {
			for step in 0..WRITES {
				let side = if step % 2 == 0 { Side::Buy } else { Side::Sell };
				book.upsert(side, order(step % IDS, step));
			}
			done.store(true, Ordering::Release);
		})
	};

	let readers: Vec<_> = [Side::Buy, Side::Sell]
		.into_iter()
		.map(|side| {
			let book = book.clone();
			let done = done.clone();
			thread::spawn(move || {
				let mut passes = 0u64;
				while !done.load(Ordering::Acquire) {
					let snapshot = book.snapshot(side);
					assert!(snapshot.iter().all(is_consistent));
					assert!(snapshot.windows(2).all(|w| w[0].order_id < w[1].order_id));
					assert!(snapshot.len() as u64 <= IDS);

					book.for_each(side, |order| assert!(is_consistent(order)));
					passes += 1;
				}
				passes
			})
		})
		.collect();

	writer.join().unwrap();
	for reader in readers {
		reader.join().unwrap();
	}

	let (bids, asks) = book.depth();
	assert_eq!(bids as u64, IDS / 2);
	assert_eq!(asks as u64, IDS / 2);
	assert_eq!(book.get(Side::Sell, IDS - 1), Some(order(IDS - 1, WRITES - 1)));
}

#[test]
fn test_reporters_run_alongside_writer() {
	let book = Arc::new(OrderBook::new());
	let sink = MemoryEventSink::new();

	let writer = {
		let book = book.clone();
		thread::spawn(move || {
			for step in 0..WRITES {
				book.upsert(Side::Buy, order(step % IDS, step));
			}
		})
	};

	let mut pass = 1;
	while !writer.is_finished() {
		let reported = SideReporter::report_once(&book, &sink, Side::Buy, pass);
		assert!(reported as u64 <= IDS);
		// The other side is never written
		assert_eq!(SideReporter::report_once(&book, &sink, Side::Sell, pass), 0);
		pass += 1;
		thread::sleep(Duration::from_micros(50));
	}
	writer.join().unwrap();

	assert_eq!(SideReporter::report_once(&book, &sink, Side::Buy, pass) as u64, IDS);
	assert_eq!(sink.failure_count(), 0);
}
