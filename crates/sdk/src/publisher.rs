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

use std::net::{SocketAddr, ToSocketAddrs, UdpSocket};

use thiserror::Error;

use crate::types::FeedMessage;

/// Error types for publisher operations
#[derive(Debug, Error)]
pub enum PublishError {
	#[error("Network error: {0}")]
	Network(String),
	#[error("Serialization error: {0}")]
	Serialization(String),
	#[error("Datagram truncated: sent {sent} of {len} bytes")]
	Truncated { sent: usize, len: usize },
}

/// Datagram publisher for the market data feed
///
/// Sends one JSON document per datagram to a feed handler's UDP endpoint.
/// Delivery is not acknowledged; a successful `publish` only means the
/// datagram left the local socket.
pub struct FeedPublisher {
	socket: UdpSocket,
	target: SocketAddr,
}

impl FeedPublisher {
	/// Create a publisher targeting the given feed address
	///
	/// The local socket is bound to an ephemeral port on the unspecified
	/// address of the target's family.
	pub fn new(target: impl ToSocketAddrs) -> Result<Self, PublishError> {
		let target = target
			.to_socket_addrs()
			.map_err(|e| PublishError::Network(format!("Invalid target address: {}", e)))?
			.next()
			.ok_or_else(|| PublishError::Network("Target address did not resolve".to_string()))?;

		let bind_addr: SocketAddr = if target.is_ipv4() {
			([0, 0, 0, 0], 0).into()
		} else {
			(std::net::Ipv6Addr::UNSPECIFIED, 0).into()
		};

		let socket = UdpSocket::bind(bind_addr)
			.map_err(|e| PublishError::Network(format!("Bind failed: {}", e)))?;

		Ok(Self { socket, target })
	}

	/// Address datagrams are sent to
	pub fn target(&self) -> SocketAddr {
		self.target
	}

	/// Publish a typed feed message
	pub fn publish(&self, message: &FeedMessage) -> Result<(), PublishError> {
		let bytes = message
			.to_bytes()
			.map_err(|e| PublishError::Serialization(e.to_string()))?;
		self.publish_raw(&bytes)
	}

	/// Publish an arbitrary payload as a single datagram
	///
	/// Useful for exercising the handler with malformed documents.
	pub fn publish_raw(&self, payload: &[u8]) -> Result<(), PublishError> {
		let sent = self
			.socket
			.send_to(payload, self.target)
			.map_err(|e| PublishError::Network(format!("Send failed: {}", e)))?;

		if sent != payload.len() {
			return Err(PublishError::Truncated {
				sent,
				len: payload.len(),
			});
		}

		Ok(())
	}
}
