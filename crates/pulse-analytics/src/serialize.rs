// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Transport encoding for event and profile batches.
//!
//! Batches travel as a JSON array of record payloads, serialized and then
//! base64-encoded (standard alphabet). Property keys serialize in sorted
//! order and records keep their input order, so encoding is deterministic:
//! the same input sequence always yields the same string.

use base64::prelude::*;
use pulse_analytics_core::{Event, ProfileUpdate, ProjectToken, Properties};

use crate::error::{AnalyticsError, Result};

/// Maximum serialized size of a single record's properties.
pub const MAX_PROPERTIES_SIZE: usize = 1024 * 1024; // 1MB

/// Validates a property mapping as a precondition for queueing.
///
/// Beyond [`Properties::validate`], this enforces the backend's serialized
/// size cap so an oversized record is rejected at the introducing call
/// rather than at flush time.
pub fn validate_record(properties: &Properties) -> Result<()> {
	properties.validate()?;
	let serialized = serde_json::to_string(&properties.to_json())
		.map_err(|e| AnalyticsError::Serialization(e.to_string()))?;
	if serialized.len() > MAX_PROPERTIES_SIZE {
		return Err(AnalyticsError::Serialization(format!(
			"properties exceed maximum size ({} > {MAX_PROPERTIES_SIZE} bytes)",
			serialized.len()
		)));
	}
	Ok(())
}

/// Encodes an ordered sequence of events into a transport string.
pub fn encode_events(events: &[Event], token: &ProjectToken) -> Result<String> {
	for event in events {
		validate_record(event.properties())?;
	}
	let payloads: Vec<serde_json::Value> =
		events.iter().map(|e| e.to_payload(token)).collect();
	encode_payloads(&payloads)
}

/// Encodes an ordered sequence of profile updates into a transport string.
pub fn encode_profiles(updates: &[ProfileUpdate], token: &ProjectToken) -> Result<String> {
	for update in updates {
		update.validate()?;
		if let Some(props) = update.operation().properties() {
			validate_record(props)?;
		}
	}
	let payloads: Vec<serde_json::Value> =
		updates.iter().map(|u| u.to_payload(token)).collect();
	encode_payloads(&payloads)
}

fn encode_payloads(payloads: &[serde_json::Value]) -> Result<String> {
	let json = serde_json::to_string(payloads)
		.map_err(|e| AnalyticsError::Serialization(e.to_string()))?;
	Ok(BASE64_STANDARD.encode(json))
}
