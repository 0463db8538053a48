// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Error types for the analytics SDK.

use pulse_analytics_core::{EventError, PropertyError, TokenError};
use pulse_common_http::RetryableError;
use thiserror::Error;

/// Analytics SDK errors.
#[derive(Debug, Error)]
pub enum AnalyticsError {
	/// Project token is missing or malformed.
	#[error("invalid project token: {0}")]
	InvalidToken(#[from] TokenError),

	/// Server URL is missing or invalid.
	#[error("invalid server URL: {0}")]
	InvalidServerUrl(String),

	/// Event name validation failed.
	#[error("invalid event: {0}")]
	InvalidEvent(#[from] EventError),

	/// A property key or value is not serializable.
	#[error("property validation failed: {0}")]
	InvalidProperty(#[from] PropertyError),

	/// Distinct ID validation failed.
	#[error("invalid distinct ID: {0}")]
	InvalidDistinctId(String),

	/// A profile operation was attempted before `identify`.
	#[error("no identity set: call identify before profile operations")]
	NoIdentity,

	/// Encoding an otherwise-valid record set failed.
	#[error("serialization error: {0}")]
	Serialization(String),

	/// HTTP request failed.
	#[error("HTTP request failed: {0}")]
	RequestFailed(#[from] reqwest::Error),

	/// Server returned an error response.
	#[error("server error ({status}): {message}")]
	ServerError { status: u16, message: String },

	/// Rate limited by the server.
	#[error("rate limited, retry after {retry_after_secs:?} seconds")]
	RateLimited { retry_after_secs: Option<u64> },

	/// Client has been shut down.
	#[error("client has been shut down")]
	ClientShutdown,
}

impl RetryableError for AnalyticsError {
	fn is_retryable(&self) -> bool {
		match self {
			AnalyticsError::RequestFailed(e) => e.is_retryable(),
			AnalyticsError::ServerError { status, .. } => {
				matches!(*status, 429 | 408 | 500 | 502 | 503 | 504)
			}
			AnalyticsError::RateLimited { .. } => true,
			_ => false,
		}
	}
}

/// Result type alias for analytics operations.
pub type Result<T> = std::result::Result<T, AnalyticsError>;
