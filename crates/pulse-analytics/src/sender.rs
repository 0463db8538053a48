// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! HTTP transport for encoded batches.

use pulse_analytics_core::{Event, ProfileUpdate, ProjectToken};
use pulse_common_http::{retry, RetryConfig};
use reqwest::Url;
use tracing::debug;

use crate::config::TrackerConfig;
use crate::error::{AnalyticsError, Result};
use crate::serialize;

/// Sends encoded batches to the ingestion server.
///
/// Events go to `{server_url}/track`, profile updates to
/// `{server_url}/engage`, both as `data=<base64>` form bodies. Transient
/// failures are retried with exponential backoff.
pub(crate) struct HttpBatchSender {
	client: reqwest::Client,
	track_url: Url,
	engage_url: Url,
	token: ProjectToken,
	retry_config: RetryConfig,
	log_network_activity: bool,
}

impl HttpBatchSender {
	pub(crate) fn new(config: &TrackerConfig, token: ProjectToken) -> Result<Self> {
		let base = config.parse_server_url()?;
		let join = |segment: &str| {
			base.join(segment)
				.map_err(|e| AnalyticsError::InvalidServerUrl(e.to_string()))
		};
		let client = pulse_common_http::builder()
			.timeout(config.request_timeout)
			.build()
			.map_err(AnalyticsError::RequestFailed)?;

		Ok(Self {
			client,
			track_url: join("track")?,
			engage_url: join("engage")?,
			token,
			retry_config: RetryConfig::default(),
			log_network_activity: config.log_network_activity,
		})
	}

	#[cfg(test)]
	pub(crate) fn with_retry_config(mut self, retry_config: RetryConfig) -> Self {
		self.retry_config = retry_config;
		self
	}

	async fn post_once(&self, url: &Url, payload: &str, count: usize) -> Result<()> {
		if self.log_network_activity {
			debug!(url = %url, count, "Sending analytics batch");
		}

		let response = self
			.client
			.post(url.clone())
			.header("X-Pulse-Lib", "pulse-rust")
			.header("X-Pulse-Lib-Version", env!("CARGO_PKG_VERSION"))
			.form(&[("data", payload)])
			.send()
			.await?;

		let status = response.status();
		if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
			let retry_after_secs = response
				.headers()
				.get(reqwest::header::RETRY_AFTER)
				.and_then(|v| v.to_str().ok())
				.and_then(|s| s.parse().ok());
			return Err(AnalyticsError::RateLimited { retry_after_secs });
		}
		if !status.is_success() {
			let message = response.text().await.unwrap_or_default();
			return Err(AnalyticsError::ServerError {
				status: status.as_u16(),
				message,
			});
		}

		if self.log_network_activity {
			debug!(url = %url, status = status.as_u16(), "Batch accepted");
		}
		Ok(())
	}

	async fn post_batch(&self, url: &Url, payload: String, count: usize) -> Result<()> {
		retry(&self.retry_config, || {
			self.post_once(url, &payload, count)
		})
		.await
	}
}

#[async_trait::async_trait]
impl crate::batch::BatchSender for HttpBatchSender {
	async fn send_events(&self, events: Vec<Event>) -> Result<()> {
		let payload = serialize::encode_events(&events, &self.token)?;
		self.post_batch(&self.track_url, payload, events.len()).await
	}

	async fn send_profiles(&self, updates: Vec<ProfileUpdate>) -> Result<()> {
		let payload = serialize::encode_profiles(&updates, &self.token)?;
		self.post_batch(&self.engage_url, payload, updates.len())
			.await
	}
}
