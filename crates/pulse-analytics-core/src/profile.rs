// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Profile-mutation operations.
//!
//! Profile updates are distinct from events: they mutate the server-side
//! record for a single identified user rather than appending to a stream.
//! Each update carries exactly one operation.

use chrono::{DateTime, Utc};

use crate::token::ProjectToken;
use crate::value::{Properties, PropertyError};

/// A single profile mutation.
#[derive(Debug, Clone, PartialEq)]
pub enum ProfileOperation {
	/// Overwrite properties.
	Set(Properties),
	/// Set properties only where currently absent.
	SetOnce(Properties),
	/// Numerically accumulate into properties. Values must be numeric.
	Increment(Properties),
	/// Append values to list-valued properties.
	Append(Properties),
	/// Union values into list-valued properties (no duplicates).
	Union(Properties),
	/// Remove the named properties.
	Unset(Vec<String>),
	/// Remove the profile entirely.
	Delete,
}

impl ProfileOperation {
	/// The wire key for this operation.
	pub fn key(&self) -> &'static str {
		match self {
			ProfileOperation::Set(_) => "$set",
			ProfileOperation::SetOnce(_) => "$set_once",
			ProfileOperation::Increment(_) => "$add",
			ProfileOperation::Append(_) => "$append",
			ProfileOperation::Union(_) => "$union",
			ProfileOperation::Unset(_) => "$unset",
			ProfileOperation::Delete => "$delete",
		}
	}

	/// The property mapping carried by this operation, if any.
	pub fn properties(&self) -> Option<&Properties> {
		match self {
			ProfileOperation::Set(props)
			| ProfileOperation::SetOnce(props)
			| ProfileOperation::Increment(props)
			| ProfileOperation::Append(props)
			| ProfileOperation::Union(props) => Some(props),
			ProfileOperation::Unset(_) | ProfileOperation::Delete => None,
		}
	}

	/// Validates the operation payload.
	///
	/// Property-carrying operations validate their mapping; `Increment`
	/// additionally requires every value to be numeric.
	pub fn validate(&self) -> Result<(), PropertyError> {
		match self {
			ProfileOperation::Set(props)
			| ProfileOperation::SetOnce(props)
			| ProfileOperation::Append(props)
			| ProfileOperation::Union(props) => props.validate(),
			ProfileOperation::Increment(props) => {
				props.validate()?;
				for (key, value) in props.iter() {
					if !value.is_numeric() {
						return Err(PropertyError::NotNumeric {
							key: key.to_string(),
						});
					}
				}
				Ok(())
			}
			ProfileOperation::Unset(_) | ProfileOperation::Delete => Ok(()),
		}
	}

	fn payload_value(&self) -> serde_json::Value {
		match self {
			ProfileOperation::Set(props)
			| ProfileOperation::SetOnce(props)
			| ProfileOperation::Increment(props)
			| ProfileOperation::Append(props)
			| ProfileOperation::Union(props) => props.to_json(),
			ProfileOperation::Unset(names) => serde_json::Value::Array(
				names
					.iter()
					.map(|n| serde_json::Value::String(n.clone()))
					.collect(),
			),
			// The delete operation carries an empty string payload.
			ProfileOperation::Delete => serde_json::Value::String(String::new()),
		}
	}
}

/// A profile mutation scoped to one identified user.
#[derive(Debug, Clone, PartialEq)]
pub struct ProfileUpdate {
	distinct_id: String,
	operation: ProfileOperation,
	timestamp: DateTime<Utc>,
}

impl ProfileUpdate {
	/// Creates an update stamped with the current time.
	pub fn new(distinct_id: impl Into<String>, operation: ProfileOperation) -> Self {
		Self {
			distinct_id: distinct_id.into(),
			operation,
			timestamp: Utc::now(),
		}
	}

	pub fn distinct_id(&self) -> &str {
		&self.distinct_id
	}

	pub fn operation(&self) -> &ProfileOperation {
		&self.operation
	}

	pub fn timestamp(&self) -> DateTime<Utc> {
		self.timestamp
	}

	/// Validates the underlying operation.
	pub fn validate(&self) -> Result<(), PropertyError> {
		self.operation.validate()
	}

	/// Projects the update to its engage wire shape:
	///
	/// ```json
	/// {"$token": "...", "$distinct_id": "...", "$time": 1700000000000,
	///  "$set": {...}}
	/// ```
	pub fn to_payload(&self, token: &ProjectToken) -> serde_json::Value {
		let mut map = serde_json::Map::new();
		map.insert(
			"$token".to_string(),
			serde_json::Value::String(token.expose().to_string()),
		);
		map.insert(
			"$distinct_id".to_string(),
			serde_json::Value::String(self.distinct_id.clone()),
		);
		map.insert(
			"$time".to_string(),
			serde_json::Value::Number(self.timestamp.timestamp_millis().into()),
		);
		map.insert(self.operation.key().to_string(), self.operation.payload_value());
		serde_json::Value::Object(map)
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::value::PropertyValue;
	use proptest::prelude::*;

	fn token() -> ProjectToken {
		ProjectToken::new("testtoken").unwrap()
	}

	#[test]
	fn operation_keys() {
		assert_eq!(ProfileOperation::Set(Properties::new()).key(), "$set");
		assert_eq!(ProfileOperation::SetOnce(Properties::new()).key(), "$set_once");
		assert_eq!(ProfileOperation::Increment(Properties::new()).key(), "$add");
		assert_eq!(ProfileOperation::Append(Properties::new()).key(), "$append");
		assert_eq!(ProfileOperation::Union(Properties::new()).key(), "$union");
		assert_eq!(ProfileOperation::Unset(vec![]).key(), "$unset");
		assert_eq!(ProfileOperation::Delete.key(), "$delete");
	}

	#[test]
	fn properties_accessor_covers_property_carrying_operations() {
		let props = Properties::new().insert("plan", "pro");
		assert!(ProfileOperation::Set(props.clone()).properties().is_some());
		assert!(ProfileOperation::Increment(props).properties().is_some());
		assert!(ProfileOperation::Unset(vec!["plan".into()]).properties().is_none());
		assert!(ProfileOperation::Delete.properties().is_none());
	}

	#[test]
	fn set_payload_shape() {
		let update = ProfileUpdate::new(
			"user_1",
			ProfileOperation::Set(Properties::new().insert("plan", "pro")),
		);
		let payload = update.to_payload(&token());

		assert_eq!(payload["$token"], "testtoken");
		assert_eq!(payload["$distinct_id"], "user_1");
		assert_eq!(payload["$set"]["plan"], "pro");
		assert!(payload["$time"].is_i64());
	}

	#[test]
	fn unset_payload_is_name_list() {
		let update = ProfileUpdate::new(
			"user_1",
			ProfileOperation::Unset(vec!["name".into(), "email".into()]),
		);
		let payload = update.to_payload(&token());
		assert_eq!(payload["$unset"], serde_json::json!(["name", "email"]));
	}

	#[test]
	fn delete_payload_is_empty_string() {
		let update = ProfileUpdate::new("user_1", ProfileOperation::Delete);
		let payload = update.to_payload(&token());
		assert_eq!(payload["$delete"], "");
	}

	#[test]
	fn increment_requires_numeric_values() {
		let ok = ProfileOperation::Increment(
			Properties::new().insert("logins", 1).insert("spend", 9.5),
		);
		assert!(ok.validate().is_ok());

		let bad = ProfileOperation::Increment(Properties::new().insert("logins", "one"));
		assert_eq!(
			bad.validate().unwrap_err(),
			PropertyError::NotNumeric {
				key: "logins".into()
			}
		);
	}

	#[test]
	fn validate_propagates_property_errors() {
		let op = ProfileOperation::Set(Properties::new().insert("bad", f64::NAN));
		assert!(matches!(
			op.validate().unwrap_err(),
			PropertyError::NonFiniteNumber { .. }
		));
	}

	#[test]
	fn append_accepts_list_values() {
		let op = ProfileOperation::Append(
			Properties::new().insert("tags", PropertyValue::Text("new".into())),
		);
		assert!(op.validate().is_ok());
	}

	proptest! {
		#[test]
		fn payload_always_carries_scoping_fields(
			distinct_id in "[a-zA-Z0-9_]{1,50}",
			key in "[a-z]{1,10}",
			value in "[a-zA-Z0-9]{1,20}",
		) {
			let update = ProfileUpdate::new(
				distinct_id.clone(),
				ProfileOperation::Set(Properties::new().insert(key, value)),
			);
			let payload = update.to_payload(&token());
			prop_assert_eq!(payload["$distinct_id"].as_str(), Some(distinct_id.as_str()));
			prop_assert_eq!(payload["$token"].as_str(), Some("testtoken"));
			prop_assert!(payload.get("$set").is_some());
		}
	}
}
