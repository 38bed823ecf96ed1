// Copyright 2025 chenjjiaa
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

use std::{
	net::{IpAddr, Ipv4Addr},
	time::Duration,
};

use serde::{Deserialize, Serialize};

// Logging configuration constants
/// Default log level (can be overridden by RUST_LOG environment variable)
pub const DEFAULT_LOG_LEVEL: &str = "info";

/// Default log directory component name
pub const LOG_COMPONENT_NAME: &str = "feed";

/// Default console output enabled (can be overridden by LOG_TO_CONSOLE environment variable)
pub const DEFAULT_LOG_TO_CONSOLE: bool = false;

// Transport configuration constants
/// Local UDP port the market data feed is received on
pub const DEFAULT_FEED_PORT: u16 = 8081;

/// Remote TCP port of the order connectivity endpoint
pub const DEFAULT_ORDER_PORT: u16 = 8080;

/// Receive buffer size; larger datagrams are truncated by the OS
pub const DEFAULT_RECV_BUFFER_SIZE: usize = 1024;

/// Upper bound on a single blocking receive before the shutdown flag is rechecked
pub const DEFAULT_RECV_POLL_INTERVAL_MS: u64 = 250;

/// Upper bound on a single write to the order endpoint
pub const DEFAULT_SEND_TIMEOUT_MS: u64 = 1000;

/// Environment variable prefix (e.g. `FEED_FEED_PORT=9001`)
pub const ENV_PREFIX: &str = "FEED";

/// Feed handler configuration
///
/// Every field has a default, so a partial file or a handful of
/// environment variables is enough to override what is needed.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FeedConfig {
	/// Local address the UDP feed socket is bound to
	pub feed_addr: IpAddr,
	/// Local UDP port (0 picks an ephemeral port)
	pub feed_port: u16,
	/// Host of the reliable order connectivity endpoint
	pub order_host: String,
	/// Port of the reliable order connectivity endpoint
	pub order_port: u16,
	/// Size of the datagram receive buffer in bytes
	pub recv_buffer_size: usize,
	/// Read timeout on the feed socket (milliseconds)
	pub recv_poll_interval_ms: u64,
	/// Optional TCP connect timeout (milliseconds); OS default when absent
	pub connect_timeout_ms: Option<u64>,
	/// Write timeout on the reliable channel (milliseconds)
	pub send_timeout_ms: u64,
	/// Reporter cadence (milliseconds); reporters run once when absent
	pub report_interval_ms: Option<u64>,
	/// Heartbeat cadence on the reliable channel (milliseconds); disabled when absent
	pub heartbeat_interval_ms: Option<u64>,
}

impl Default for FeedConfig {
	fn default() -> Self {
		Self {
			feed_addr: IpAddr::V4(Ipv4Addr::LOCALHOST),
			feed_port: DEFAULT_FEED_PORT,
			order_host: Ipv4Addr::LOCALHOST.to_string(),
			order_port: DEFAULT_ORDER_PORT,
			recv_buffer_size: DEFAULT_RECV_BUFFER_SIZE,
			recv_poll_interval_ms: DEFAULT_RECV_POLL_INTERVAL_MS,
			connect_timeout_ms: None,
			send_timeout_ms: DEFAULT_SEND_TIMEOUT_MS,
			report_interval_ms: None,
			heartbeat_interval_ms: None,
		}
	}
}

impl FeedConfig {
	/// Load from `path` when given, otherwise from the environment alone
	pub fn load(path: Option<&str>) -> Result<Self, config::ConfigError> {
		match path {
			Some(path) => Self::from_file(path),
			None => Self::from_env(),
		}
	}

	/// Load configuration from environment variables
	pub fn from_env() -> Result<Self, config::ConfigError> {
		let cfg = config::Config::builder()
			.add_source(config::Environment::with_prefix(ENV_PREFIX).try_parsing(true))
			.build()?;

		Self::checked(cfg.try_deserialize()?)
	}

	/// Load configuration from file
	pub fn from_file(path: &str) -> Result<Self, config::ConfigError> {
		let cfg = config::Config::builder()
			.add_source(config::File::with_name(path))
			.add_source(config::Environment::with_prefix(ENV_PREFIX).try_parsing(true))
			.build()?;

		Self::checked(cfg.try_deserialize()?)
	}

	fn checked(config: Self) -> Result<Self, config::ConfigError> {
		config.validate()?;
		Ok(config)
	}

	/// Reject values that would make a worker spin
	///
	/// A configured interval of zero is an error; leave the key out to get
	/// run-once reporting or to disable the heartbeat.
	pub fn validate(&self) -> Result<(), config::ConfigError> {
		let intervals = [
			("recv_poll_interval_ms", Some(self.recv_poll_interval_ms)),
			("send_timeout_ms", Some(self.send_timeout_ms)),
			("connect_timeout_ms", self.connect_timeout_ms),
			("report_interval_ms", self.report_interval_ms),
			("heartbeat_interval_ms", self.heartbeat_interval_ms),
		];

		for (key, value) in intervals {
			if value == Some(0) {
				return Err(config::ConfigError::Message(format!(
					"{} must be greater than zero",
					key
				)));
			}
		}

		if self.recv_buffer_size == 0 {
			return Err(config::ConfigError::Message(
				"recv_buffer_size must be greater than zero".to_string(),
			));
		}

		Ok(())
	}

	pub fn recv_poll_interval(&self) -> Duration {
		Duration::from_millis(self.recv_poll_interval_ms.max(1))
	}

	pub fn send_timeout(&self) -> Duration {
		Duration::from_millis(self.send_timeout_ms.max(1))
	}

	pub fn connect_timeout(&self) -> Option<Duration> {
		Self::non_zero(self.connect_timeout_ms)
	}

	/// Reporter cadence; zero is treated like absent
	pub fn report_interval(&self) -> Option<Duration> {
		Self::non_zero(self.report_interval_ms)
	}

	/// Heartbeat cadence; zero is treated like absent
	pub fn heartbeat_interval(&self) -> Option<Duration> {
		Self::non_zero(self.heartbeat_interval_ms)
	}

	fn non_zero(ms: Option<u64>) -> Option<Duration> {
		ms.filter(|ms| *ms > 0).map(Duration::from_millis)
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_defaults_match_reference_endpoints() {
		let config = FeedConfig::default();
		assert_eq!(config.feed_addr, IpAddr::V4(Ipv4Addr::LOCALHOST));
		assert_eq!(config.feed_port, 8081);
		assert_eq!(config.order_host, "127.0.0.1");
		assert_eq!(config.order_port, 8080);
		assert_eq!(config.recv_buffer_size, 1024);
		assert!(config.report_interval().is_none());
		assert!(config.heartbeat_interval().is_none());
	}

	#[test]
	fn test_partial_source_keeps_defaults() {
		let cfg = config::Config::builder()
			.set_override("feed_port", 9001)
			.unwrap()
			.set_override("report_interval_ms", 500)
			.unwrap()
			.build()
			.unwrap();
		let config: FeedConfig = cfg.try_deserialize().unwrap();

		assert_eq!(config.feed_port, 9001);
		assert_eq!(config.report_interval(), Some(Duration::from_millis(500)));
		assert_eq!(config.order_port, DEFAULT_ORDER_PORT);
		assert_eq!(config.recv_buffer_size, DEFAULT_RECV_BUFFER_SIZE);
	}

	#[test]
	fn test_poll_interval_never_zero() {
		let config = FeedConfig {
			recv_poll_interval_ms: 0,
			..FeedConfig::default()
		};
		assert_eq!(config.recv_poll_interval(), Duration::from_millis(1));
	}

	#[test]
	fn test_zero_intervals_treated_as_absent() {
		let config = FeedConfig {
			report_interval_ms: Some(0),
			heartbeat_interval_ms: Some(0),
			connect_timeout_ms: Some(0),
			send_timeout_ms: 0,
			..FeedConfig::default()
		};

		assert!(config.report_interval().is_none());
		assert!(config.heartbeat_interval().is_none());
		assert!(config.connect_timeout().is_none());
		assert_eq!(config.send_timeout(), Duration::from_millis(1));
	}

	#[test]
	fn test_validate_rejects_zero_interval() {
		for key in ["report_interval_ms", "heartbeat_interval_ms", "send_timeout_ms"] {
			let cfg = config::Config::builder()
				.set_override(key, 0)
				.unwrap()
				.build()
				.unwrap();
			let config: FeedConfig = cfg.try_deserialize().unwrap();

			let err = config.validate().unwrap_err();
			assert!(err.to_string().contains(key), "{err}");
		}

		assert!(FeedConfig::default().validate().is_ok());
	}

	#[test]
	fn test_load_reports_malformed_file() {
		let dir = std::env::temp_dir().join(format!("anvil-feed-config-{}", std::process::id()));
		std::fs::create_dir_all(&dir).unwrap();

		let bad_port = dir.join("bad_port.toml");
		std::fs::write(&bad_port, "feed_port = \"not-a-port\"\n").unwrap();
		assert!(FeedConfig::load(bad_port.to_str()).is_err());

		let zero_interval = dir.join("zero_interval.toml");
		std::fs::write(&zero_interval, "report_interval_ms = 0\n").unwrap();
		let err = FeedConfig::load(zero_interval.to_str()).unwrap_err();
		assert!(err.to_string().contains("report_interval_ms"), "{err}");

		let good = dir.join("good.toml");
		std::fs::write(&good, "feed_port = 9100\nheartbeat_interval_ms = 250\n").unwrap();
		let config = FeedConfig::load(good.to_str()).unwrap();
		assert_eq!(config.feed_port, 9100);
		assert_eq!(config.heartbeat_interval(), Some(Duration::from_millis(250)));

		std::fs::remove_dir_all(dir).ok();
	}
}
