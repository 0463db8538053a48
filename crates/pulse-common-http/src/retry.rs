// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights
// reserved. SPDX-License-Identifier: Proprietary

//! Retry logic with exponential backoff for transient failures.

use std::future::Future;
use std::time::Duration;

use tracing::{debug, warn};

/// Errors that can classify themselves as retryable.
///
/// Transient failures (timeouts, connection resets, 5xx responses) should
/// return `true`; permanent failures (validation, auth) must return `false`
/// so retries never mask a caller bug.
pub trait RetryableError {
	fn is_retryable(&self) -> bool;
}

impl RetryableError for reqwest::Error {
	fn is_retryable(&self) -> bool {
		if self.is_timeout() || self.is_connect() {
			return true;
		}
		match self.status() {
			Some(status) => {
				matches!(status.as_u16(), 429 | 408 | 500 | 502 | 503 | 504)
			}
			None => self.is_request(),
		}
	}
}

/// Configuration for retry behavior.
#[derive(Debug, Clone)]
pub struct RetryConfig {
	/// Total attempts, including the first.
	pub max_attempts: u32,
	/// Backoff before the first retry.
	pub initial_backoff: Duration,
	/// Cap applied to the exponential backoff.
	pub max_backoff: Duration,
	/// Add up to 50% random jitter to each backoff.
	pub jitter: bool,
}

impl Default for RetryConfig {
	fn default() -> Self {
		Self {
			max_attempts: 3,
			initial_backoff: Duration::from_millis(500),
			max_backoff: Duration::from_secs(30),
			jitter: true,
		}
	}
}

impl RetryConfig {
	/// A config that never retries.
	pub fn no_retries() -> Self {
		Self {
			max_attempts: 1,
			..Self::default()
		}
	}

	fn backoff_for_attempt(&self, attempt: u32) -> Duration {
		let exp = self
			.initial_backoff
			.saturating_mul(2u32.saturating_pow(attempt));
		let capped = exp.min(self.max_backoff);
		if self.jitter {
			let jitter_ms = (capped.as_millis() as u64 / 2).max(1);
			capped + Duration::from_millis(fastrand::u64(0..jitter_ms))
		} else {
			capped
		}
	}
}

/// Runs `operation` until it succeeds, fails permanently, or exhausts
/// `config.max_attempts`. Only errors reporting `is_retryable()` are retried.
pub async fn retry<T, E, F, Fut>(config: &RetryConfig, mut operation: F) -> Result<T, E>
where
	E: RetryableError + std::fmt::Display,
	F: FnMut() -> Fut,
	Fut: Future<Output = Result<T, E>>,
{
	let mut attempt = 0;
	loop {
		match operation().await {
			Ok(value) => return Ok(value),
			Err(err) => {
				attempt += 1;
				if attempt >= config.max_attempts || !err.is_retryable() {
					return Err(err);
				}
				let backoff = config.backoff_for_attempt(attempt - 1);
				warn!(
					error = %err,
					attempt,
					max_attempts = config.max_attempts,
					backoff_ms = backoff.as_millis() as u64,
					"Retrying after transient failure"
				);
				tokio::time::sleep(backoff).await;
				debug!(attempt = attempt + 1, "Retry attempt starting");
			}
		}
	}
}
