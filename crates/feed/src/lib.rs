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

//! Anvil Feed Handler
//!
//! This crate ingests a market data feed over UDP, validates and decodes
//! each datagram, and applies it to an in-memory order book that reporter
//! workers read concurrently. A separate TCP channel carries order
//! connectivity and must be up before any worker starts.
//!
//! Architecture:
//! - Transport owning the UDP feed socket and the TCP order channel
//! - Feed worker as the single writer of the book, applying in arrival order
//! - Internally synchronized order book (one lock for both sides)
//! - Reporter workers traversing one side each
//! - Supervisor observing worker exits, with cooperative shutdown

pub mod config;
pub mod event;
pub mod handler;
pub mod logging;
pub mod orderbook;
pub mod processor;
pub mod supervisor;
pub mod transport;
pub mod types;
pub mod worker;

pub use config::FeedConfig;
pub use event::{EventSink, FeedEvent, MemoryEventSink, TracingSink};
pub use handler::{FeedHandler, RunningFeed, StartError};
pub use orderbook::OrderBook;
pub use processor::{DiscardReason, FeedProcessor, FeedStats, MessageOutcome};
pub use supervisor::{ExitMonitor, Supervisor};
pub use transport::{ConnectionState, ReceiveError, Transport, TransportError};
pub use types::*;
pub use worker::{ExitReason, ShutdownSignal, WorkerExit};
