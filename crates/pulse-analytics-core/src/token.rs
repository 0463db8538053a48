// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Project token type for SDK authentication.
//!
//! Every tracked event and profile update is attributed to a project via its
//! token. The token is a secret; `Debug` and `Display` render a redacted form
//! so it never leaks into logs in full.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors from project token construction.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TokenError {
	/// Token string was empty.
	#[error("project token cannot be empty")]
	Empty,

	/// Token string contained whitespace or control characters.
	#[error("project token contains whitespace or control characters")]
	InvalidCharacters,
}

/// A validated project token.
///
/// Construct with [`ProjectToken::new`]; an empty or malformed token is
/// rejected up front so a misconfigured client fails at initialization
/// rather than at flush time.
#[derive(Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ProjectToken(String);

impl ProjectToken {
	/// Creates a token, rejecting empty or malformed input.
	pub fn new(token: impl Into<String>) -> Result<Self, TokenError> {
		let token = token.into();
		if token.is_empty() {
			return Err(TokenError::Empty);
		}
		if token.chars().any(|c| c.is_whitespace() || c.is_control()) {
			return Err(TokenError::InvalidCharacters);
		}
		Ok(Self(token))
	}

	/// Returns the raw token value for request construction.
	pub fn expose(&self) -> &str {
		&self.0
	}

	/// Returns a redacted rendering safe for logs: the first four
	/// characters followed by an ellipsis.
	pub fn redacted(&self) -> String {
		let prefix: String = self.0.chars().take(4).collect();
		format!("{prefix}…")
	}
}

impl std::fmt::Debug for ProjectToken {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_tuple("ProjectToken").field(&self.redacted()).finish()
	}
}

impl std::fmt::Display for ProjectToken {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		write!(f, "{}", self.redacted())
	}
}

impl std::str::FromStr for ProjectToken {
	type Err = TokenError;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		Self::new(s)
	}
}
