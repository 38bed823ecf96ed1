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

//! Socket ownership for the feed handler
//!
//! A [`Transport`] owns two sockets with independent lifecycles:
//! - an unreliable UDP socket bound to a local endpoint, carrying the feed
//! - a reliable TCP stream to a remote endpoint, used for order connectivity
//!
//! Losing datagrams never stalls the feed, and a broken reliable channel
//! never stalls feed processing. Both sockets are released on `teardown`
//! or on drop, whichever comes first. Writes on the reliable channel are
//! bounded by a write timeout and can be interrupted by `close_reliable`.

use std::{
	fmt, io,
	io::Write,
	net::{Shutdown, SocketAddr, TcpStream, ToSocketAddrs, UdpSocket},
	sync::Arc,
	time::Duration,
};

use parking_lot::{Mutex, RwLock};
use thiserror::Error;
use tracing::{debug, error, info, trace, warn};

use crate::config::FeedConfig;

/// State of the reliable channel
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
	/// No handshake attempted yet
	NotAttempted,
	/// Handshake succeeded and the stream has not been closed
	Connected,
	/// Handshake failed, or the stream was closed
	Disconnected,
}

impl fmt::Display for ConnectionState {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		let s = match self {
			ConnectionState::NotAttempted => "not_attempted",
			ConnectionState::Connected => "connected",
			ConnectionState::Disconnected => "disconnected",
		};
		f.write_str(s)
	}
}

/// Error types for transport operations
#[derive(Debug, Error)]
pub enum TransportError {
	#[error("Transport initialization failed: {0}")]
	Init(String),
	#[error("Failed to connect to {remote}: {source}")]
	Connect {
		remote: SocketAddr,
		#[source]
		source: io::Error,
	},
	#[error("Reliable channel not connected (state: {0})")]
	NotConnected(ConnectionState),
	#[error("Send failed: {0}")]
	Send(#[source] io::Error),
}

/// Outcome of a receive call that produced no payload
#[derive(Debug, Error)]
pub enum ReceiveError {
	/// Nothing arrived within the poll interval; try again
	#[error("No datagram available")]
	NoData,
	/// The socket reported an error; the feed cannot continue
	#[error("Feed socket error: {0}")]
	Fatal(#[source] io::Error),
	/// The transport was torn down
	#[error("Feed channel closed")]
	Closed,
}

impl ReceiveError {
	/// True when the receive loop must stop
	pub fn is_fatal(&self) -> bool {
		!matches!(self, ReceiveError::NoData)
	}
}

#[derive(Debug)]
struct ReliableChannel {
	// Shared with in-flight writers so a close can interrupt them
	stream: Option<Arc<TcpStream>>,
	state: ConnectionState,
}

/// Owner of the feed (UDP) and order connectivity (TCP) sockets
///
/// Shared between workers as `Arc<Transport>`. Concurrent `send_reliable`
/// calls are serialized by a send lock; the channel state has its own lock
/// that is never held across a write. The feed socket is only read by the
/// feed worker.
#[derive(Debug)]
pub struct Transport {
	feed_socket: RwLock<Option<UdpSocket>>,
	feed_addr: SocketAddr,
	remote: SocketAddr,
	connect_timeout: Option<Duration>,
	send_timeout: Duration,
	send_lock: Mutex<()>,
	reliable: Mutex<ReliableChannel>,
}

impl Transport {
	/// Bind the feed socket and resolve the order endpoint
	///
	/// The reliable channel is prepared but not connected; call
	/// [`Transport::connect_reliable`] before starting any worker.
	pub fn configure(config: &FeedConfig) -> Result<Self, TransportError> {
		let feed_socket = UdpSocket::bind((config.feed_addr, config.feed_port)).map_err(|e| {
			TransportError::Init(format!(
				"Failed to bind feed socket on {}:{}: {}",
				config.feed_addr, config.feed_port, e
			))
		})?;

		feed_socket
			.set_read_timeout(Some(config.recv_poll_interval()))
			.map_err(|e| TransportError::Init(format!("Failed to set feed read timeout: {}", e)))?;

		let feed_addr = feed_socket
			.local_addr()
			.map_err(|e| TransportError::Init(format!("Failed to read feed address: {}", e)))?;

		let remote = (config.order_host.as_str(), config.order_port)
			.to_socket_addrs()
			.map_err(|e| {
				TransportError::Init(format!(
					"Failed to resolve order endpoint {}:{}: {}",
					config.order_host, config.order_port, e
				))
			})?
			.next()
			.ok_or_else(|| {
				TransportError::Init(format!(
					"Order endpoint {}:{} resolved to no address",
					config.order_host, config.order_port
				))
			})?;

		info!(
			target: "transport",
			feed_addr = %feed_addr,
			order_addr = %remote,
			"Transport configured"
		);

		Ok(Self {
			feed_socket: RwLock::new(Some(feed_socket)),
			feed_addr,
			remote,
			connect_timeout: config.connect_timeout(),
			send_timeout: config.send_timeout(),
			send_lock: Mutex::new(()),
			reliable: Mutex::new(ReliableChannel {
				stream: None,
				state: ConnectionState::NotAttempted,
			}),
		})
	}

	/// Address the feed socket is bound to
	pub fn local_feed_addr(&self) -> SocketAddr {
		self.feed_addr
	}

	/// Resolved address of the order endpoint
	pub fn remote_order_addr(&self) -> SocketAddr {
		self.remote
	}

	pub fn connection_state(&self) -> ConnectionState {
		self.reliable.lock().state
	}

	pub fn is_connected(&self) -> bool {
		self.connection_state() == ConnectionState::Connected
	}

	/// Perform the reliable handshake once
	///
	/// Returns `true` when the channel is connected afterwards. There is
	/// no retry; a failed attempt leaves the state `Disconnected`.
	pub fn connect_reliable(&self) -> bool {
		self.try_connect_reliable().is_ok()
	}

	/// Same as [`Transport::connect_reliable`], keeping the failure reason
	pub fn try_connect_reliable(&self) -> Result<(), TransportError> {
		let mut channel = self.reliable.lock();
		if channel.state == ConnectionState::Connected {
			debug!(target: "transport", remote = %self.remote, "Already connected");
			return Ok(());
		}

		let result = match self.connect_timeout {
			Some(timeout) => TcpStream::connect_timeout(&self.remote, timeout),
			None => TcpStream::connect(self.remote),
		};

		match result {
			Ok(stream) => {
				if let Err(e) = stream.set_nodelay(true) {
					warn!(target: "transport", error = %e, "Failed to set TCP_NODELAY");
				}
				if let Err(e) = stream.set_write_timeout(Some(self.send_timeout)) {
					warn!(target: "transport", error = %e, "Failed to set write timeout");
				}
				channel.stream = Some(Arc::new(stream));
				channel.state = ConnectionState::Connected;
				info!(target: "transport", remote = %self.remote, "Connected to order endpoint");
				Ok(())
			}
			Err(source) => {
				channel.stream = None;
				channel.state = ConnectionState::Disconnected;
				error!(
					target: "transport",
					remote = %self.remote,
					error = %source,
					"Failed to connect to order endpoint"
				);
				Err(TransportError::Connect {
					remote: self.remote,
					source,
				})
			}
		}
	}

	/// Send raw bytes on the reliable channel
	///
	/// Issues a single write and returns how many bytes the kernel took,
	/// which may be fewer than `bytes.len()`; the remainder is not retried.
	/// When the channel is not connected nothing is sent and
	/// `NotConnected` is returned. A write that exceeds the send timeout, or
	/// is cut short by `close_reliable`, is returned as `Send`. A write
	/// error leaves the connection state unchanged.
	pub fn send_reliable(&self, bytes: &[u8]) -> Result<usize, TransportError> {
		let _sending = self.send_lock.lock();

		let stream = {
			let channel = self.reliable.lock();
			match (&channel.stream, channel.state) {
				(Some(stream), ConnectionState::Connected) => Arc::clone(stream),
				(_, state) => {
					warn!(target: "transport", state = %state, "Reliable channel is not connected");
					return Err(TransportError::NotConnected(state));
				}
			}
		};

		match (&*stream).write(bytes) {
			Ok(sent) => {
				if sent < bytes.len() {
					warn!(
						target: "transport",
						sent = sent,
						len = bytes.len(),
						"Partial write on reliable channel"
					);
				}
				Ok(sent)
			}
			Err(e) => {
				warn!(target: "transport", error = %e, "Write on reliable channel failed");
				Err(TransportError::Send(e))
			}
		}
	}

	/// Block until a datagram arrives or the poll interval elapses
	///
	/// Returns the payload length written into `buf`. Datagrams larger
	/// than `buf` are truncated by the OS.
	pub fn receive_unreliable(&self, buf: &mut [u8]) -> Result<usize, ReceiveError> {
		let feed = self.feed_socket.read();
		let Some(socket) = feed.as_ref() else {
			return Err(ReceiveError::Closed);
		};

		match socket.recv_from(buf) {
			Ok((0, _)) => Err(ReceiveError::NoData),
			Ok((len, peer)) => {
				trace!(target: "transport", len = len, peer = %peer, "Datagram received");
				Ok(len)
			}
			Err(e)
				if matches!(
					e.kind(),
					io::ErrorKind::WouldBlock | io::ErrorKind::TimedOut | io::ErrorKind::Interrupted
				) =>
			{
				Err(ReceiveError::NoData)
			}
			Err(e) => Err(ReceiveError::Fatal(e)),
		}
	}

	/// Close the reliable channel (idempotent)
	///
	/// Never waits for an in-flight `send_reliable`: the shutdown makes a
	/// blocked write return with an error.
	pub fn close_reliable(&self) {
		let mut channel = self.reliable.lock();
		if let Some(stream) = channel.stream.take() {
			if let Err(e) = stream.shutdown(Shutdown::Both) {
				debug!(target: "transport", error = %e, "Reliable shutdown reported an error");
			}
			info!(target: "transport", remote = %self.remote, "Reliable channel closed");
		}
		if channel.state == ConnectionState::Connected {
			channel.state = ConnectionState::Disconnected;
		}
	}

	/// Release both channels (idempotent)
	///
	/// The feed socket is dropped, so its port is free once this returns;
	/// later receives answer `Closed`. A receive in progress finishes its
	/// poll interval first.
	pub fn teardown(&self) {
		self.close_reliable();
		if self.feed_socket.write().take().is_some() {
			info!(target: "transport", feed_addr = %self.feed_addr, "Feed channel closed");
		}
	}
}

impl Drop for Transport {
	fn drop(&mut self) {
		self.teardown();
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use std::{io::Read, net::TcpListener};

	fn test_config(order_port: u16) -> FeedConfig {
		FeedConfig {
			feed_port: 0,
			order_port,
			recv_poll_interval_ms: 20,
			..FeedConfig::default()
		}
	}

	fn closed_port() -> u16 {
		let listener = TcpListener::bind("127.0.0.1:0").unwrap();
		listener.local_addr().unwrap().port()
	}

	#[test]
	fn test_configure_binds_ephemeral_port() {
		let transport = Transport::configure(&test_config(8080)).unwrap();
		assert_ne!(transport.local_feed_addr().port(), 0);
		assert_eq!(transport.connection_state(), ConnectionState::NotAttempted);
	}

	#[test]
	fn test_configure_rejects_unresolvable_host() {
		let config = FeedConfig {
			order_host: "host name with spaces".to_string(),
			..test_config(8080)
		};
		assert!(matches!(
			Transport::configure(&config),
			Err(TransportError::Init(_))
		));
	}

	#[test]
	fn test_send_before_connect_is_reported() {
		let transport = Transport::configure(&test_config(8080)).unwrap();
		let result = transport.send_reliable(b"status");
		assert!(matches!(
			result,
			Err(TransportError::NotConnected(ConnectionState::NotAttempted))
		));
	}

	#[test]
	fn test_connect_failure_marks_disconnected() {
		let transport = Transport::configure(&test_config(closed_port())).unwrap();

		assert!(!transport.connect_reliable());
		assert_eq!(transport.connection_state(), ConnectionState::Disconnected);
		assert!(matches!(
			transport.send_reliable(b"x"),
			Err(TransportError::NotConnected(ConnectionState::Disconnected))
		));
	}

	#[test]
	fn test_connect_send_and_close() {
		let listener = TcpListener::bind("127.0.0.1:0").unwrap();
		let port = listener.local_addr().unwrap().port();
		let transport = Transport::configure(&test_config(port)).unwrap();

		assert!(transport.connect_reliable());
		assert!(transport.is_connected());
		// A second call does not open another connection
		assert!(transport.connect_reliable());

		let (mut peer, _) = listener.accept().unwrap();
		assert_eq!(transport.send_reliable(b"hello").unwrap(), 5);

		let mut buf = [0u8; 5];
		peer.read_exact(&mut buf).unwrap();
		assert_eq!(&buf, b"hello");

		transport.close_reliable();
		transport.close_reliable();
		assert_eq!(transport.connection_state(), ConnectionState::Disconnected);
		assert!(transport.send_reliable(b"late").is_err());
	}

	#[test]
	fn test_receive_times_out_with_no_data() {
		let transport = Transport::configure(&test_config(8080)).unwrap();
		let mut buf = [0u8; 64];

		let err = transport.receive_unreliable(&mut buf).unwrap_err();
		assert!(matches!(err, ReceiveError::NoData));
		assert!(!err.is_fatal());
	}

	#[test]
	fn test_receive_datagram_then_teardown() {
		let transport = Transport::configure(&test_config(8080)).unwrap();
		let sender = UdpSocket::bind("127.0.0.1:0").unwrap();
		sender
			.send_to(b"{\"k\":1}", transport.local_feed_addr())
			.unwrap();

		let mut buf = [0u8; 64];
		let mut received = None;
		for _ in 0..50 {
			match transport.receive_unreliable(&mut buf) {
				Ok(len) => {
					received = Some(len);
					break;
				}
				Err(ReceiveError::NoData) => continue,
				Err(e) => panic!("unexpected receive error: {e}"),
			}
		}
		assert_eq!(received, Some(7));
		assert_eq!(&buf[..7], b"{\"k\":1}");

		transport.teardown();
		transport.teardown();
		let err = transport.receive_unreliable(&mut buf).unwrap_err();
		assert!(matches!(err, ReceiveError::Closed));
		assert!(err.is_fatal());
	}

	fn stalled_peer(send_timeout_ms: u64) -> (Arc<Transport>, TcpStream) {
		let listener = TcpListener::bind("127.0.0.1:0").unwrap();
		let config = FeedConfig {
			send_timeout_ms,
			..test_config(listener.local_addr().unwrap().port())
		};
		let transport = Arc::new(Transport::configure(&config).unwrap());
		assert!(transport.connect_reliable());
		// Accepted but never read from
		let (peer, _) = listener.accept().unwrap();
		(transport, peer)
	}

	#[test]
	fn test_send_times_out_when_peer_stops_reading() {
		let (transport, _peer) = stalled_peer(100);
		let chunk = vec![b'x'; 1 << 20];

		let mut failure = None;
		for _ in 0..256 {
			if let Err(e) = transport.send_reliable(&chunk) {
				failure = Some(e);
				break;
			}
		}

		assert!(matches!(failure, Some(TransportError::Send(_))));
		assert_eq!(transport.connection_state(), ConnectionState::Connected);
	}

	#[test]
	fn test_close_interrupts_blocked_send() {
		let (transport, _peer) = stalled_peer(60_000);
		let (tx, rx) = crossbeam::channel::bounded(1);

		let sender = {
			let transport = transport.clone();
			std::thread::spawn(move || {
				let result = transport.send_reliable(&vec![b'x'; 64 << 20]);
				tx.send(result.is_ok()).ok();
			})
		};

		std::thread::sleep(Duration::from_millis(300));
		// State queries do not wait for the write
		assert_eq!(transport.connection_state(), ConnectionState::Connected);

		let (closed_tx, closed_rx) = crossbeam::channel::bounded(1);
		let closer = {
			let transport = transport.clone();
			std::thread::spawn(move || {
				transport.close_reliable();
				closed_tx.send(()).ok();
			})
		};

		assert!(closed_rx.recv_timeout(Duration::from_secs(3)).is_ok());
		assert!(rx.recv_timeout(Duration::from_secs(3)).is_ok());
		sender.join().unwrap();
		closer.join().unwrap();
		assert_eq!(transport.connection_state(), ConnectionState::Disconnected);
	}

	#[test]
	fn test_teardown_frees_feed_port() {
		let transport = Transport::configure(&test_config(8080)).unwrap();
		let addr = transport.local_feed_addr();

		transport.teardown();

		assert!(UdpSocket::bind(addr).is_ok());
	}
}
