// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Immutable event records.

use chrono::{DateTime, Utc};
use thiserror::Error;
use uuid::Uuid;

use crate::token::ProjectToken;
use crate::value::Properties;

/// Maximum length of an event name.
pub const MAX_EVENT_NAME_LENGTH: usize = 200;

/// Maximum length of a distinct ID.
pub const MAX_DISTINCT_ID_LENGTH: usize = 200;

/// Errors from event construction.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum EventError {
	#[error("event name cannot be empty")]
	EmptyName,

	#[error("event name exceeds maximum length")]
	NameTooLong,

	#[error("event name contains invalid characters")]
	InvalidName,
}

fn validate_event_name(name: &str) -> Result<(), EventError> {
	if name.is_empty() {
		return Err(EventError::EmptyName);
	}
	if name.len() > MAX_EVENT_NAME_LENGTH {
		return Err(EventError::NameTooLong);
	}
	let valid = name
		.chars()
		.all(|c| c.is_alphanumeric() || matches!(c, '_' | '$' | '.' | ' ' | '-'));
	if !valid {
		return Err(EventError::InvalidName);
	}
	Ok(())
}

/// A named occurrence with an attached property mapping.
///
/// Events are immutable once created: the distinct ID, merged properties,
/// and timestamp are snapshots taken at creation time. `insert_id` is a
/// random UUID the backend uses for deduplication.
#[derive(Debug, Clone, PartialEq)]
pub struct Event {
	name: String,
	distinct_id: Option<String>,
	properties: Properties,
	timestamp: DateTime<Utc>,
	insert_id: Uuid,
}

impl Event {
	/// Creates an event, validating the name. Properties should already be
	/// merged (super-properties under call-site properties) and validated
	/// by the caller.
	pub fn new(
		name: impl Into<String>,
		distinct_id: Option<String>,
		properties: Properties,
	) -> Result<Self, EventError> {
		let name = name.into();
		validate_event_name(&name)?;
		Ok(Self {
			name,
			distinct_id,
			properties,
			timestamp: Utc::now(),
			insert_id: Uuid::new_v4(),
		})
	}

	pub fn name(&self) -> &str {
		&self.name
	}

	pub fn distinct_id(&self) -> Option<&str> {
		self.distinct_id.as_deref()
	}

	pub fn properties(&self) -> &Properties {
		&self.properties
	}

	pub fn timestamp(&self) -> DateTime<Utc> {
		self.timestamp
	}

	pub fn insert_id(&self) -> Uuid {
		self.insert_id
	}

	/// Projects the event to its ingestion wire shape:
	///
	/// ```json
	/// {"event": "...", "properties": {"token": "...", "distinct_id": "...",
	///  "time": 1700000000, "$insert_id": "...", ...}}
	/// ```
	pub fn to_payload(&self, token: &ProjectToken) -> serde_json::Value {
		let mut properties = match self.properties.to_json() {
			serde_json::Value::Object(map) => map,
			_ => serde_json::Map::new(),
		};
		properties.insert(
			"token".to_string(),
			serde_json::Value::String(token.expose().to_string()),
		);
		if let Some(distinct_id) = &self.distinct_id {
			properties.insert(
				"distinct_id".to_string(),
				serde_json::Value::String(distinct_id.clone()),
			);
		}
		properties.insert(
			"time".to_string(),
			serde_json::Value::Number(self.timestamp.timestamp().into()),
		);
		properties.insert(
			"$insert_id".to_string(),
			serde_json::Value::String(self.insert_id.to_string()),
		);

		serde_json::json!({
			"event": self.name,
			"properties": serde_json::Value::Object(properties),
		})
	}
}
