// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Tracker configuration.

use std::time::Duration;

use crate::error::{AnalyticsError, Result};

/// Default ingestion endpoint.
pub const DEFAULT_SERVER_URL: &str = "https://capture.pulse.dev";

/// Configuration for a [`Tracker`](crate::Tracker).
#[derive(Debug, Clone)]
pub struct TrackerConfig {
	/// Base URL of the ingestion server.
	pub server_url: String,
	/// Interval between automatic flushes.
	pub flush_interval: Duration,
	/// Flush pending items when the host app reports entering the background.
	pub flush_on_background: bool,
	/// Emit debug-level tracing for every transport request and response.
	pub log_network_activity: bool,
	/// Number of queued items that triggers an early flush.
	pub max_batch_size: usize,
	/// Maximum number of items queued before dropping oldest.
	pub max_queue_size: usize,
	/// Per-request HTTP timeout.
	pub request_timeout: Duration,
}

impl Default for TrackerConfig {
	fn default() -> Self {
		Self {
			server_url: DEFAULT_SERVER_URL.to_string(),
			flush_interval: Duration::from_secs(60),
			flush_on_background: true,
			log_network_activity: false,
			max_batch_size: 50,
			max_queue_size: 5000,
			request_timeout: Duration::from_secs(10),
		}
	}
}

impl TrackerConfig {
	/// Validates the configuration, returning the parsed server URL.
	pub fn parse_server_url(&self) -> Result<reqwest::Url> {
		let url = reqwest::Url::parse(&self.server_url)
			.map_err(|e| AnalyticsError::InvalidServerUrl(format!("{}: {e}", self.server_url)))?;
		if !matches!(url.scheme(), "http" | "https") {
			return Err(AnalyticsError::InvalidServerUrl(format!(
				"{}: unsupported scheme",
				self.server_url
			)));
		}
		Ok(url)
	}
}
