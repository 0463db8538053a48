// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Typed property values and property mappings.
//!
//! Event and profile properties are heterogeneous bags. Rather than passing
//! raw JSON around, values are a closed tagged union so serialization is
//! total for anything that passes [`Properties::validate`]. The one value
//! class JSON cannot represent - non-finite floats - is caught by validation
//! before a record is ever queued.

use std::collections::BTreeMap;

use chrono::{DateTime, SecondsFormat, Utc};
use serde::ser::{SerializeMap, SerializeSeq};
use serde::{Serialize, Serializer};
use thiserror::Error;

/// Maximum length of a property key.
pub const MAX_KEY_LENGTH: usize = 200;

/// Maximum nesting depth for list and map values.
pub const MAX_NESTING_DEPTH: usize = 10;

/// Errors from property validation.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum PropertyError {
	/// A property key was empty.
	#[error("property key cannot be empty")]
	EmptyKey,

	/// A property key exceeded [`MAX_KEY_LENGTH`].
	#[error("property key {key:?} exceeds maximum length")]
	KeyTooLong { key: String },

	/// A numeric value was NaN or infinite and cannot be serialized.
	#[error("property {key:?} is not a finite number")]
	NonFiniteNumber { key: String },

	/// Nesting exceeded [`MAX_NESTING_DEPTH`].
	#[error("property {key:?} exceeds maximum nesting depth")]
	TooDeep { key: String },

	/// A value required to be numeric (e.g. an increment amount) was not.
	#[error("property {key:?} must be numeric")]
	NotNumeric { key: String },
}

/// A single property value.
///
/// The variants are exactly the value types the analytics backend accepts:
/// strings, integers, floats, booleans, dates, lists, and nested mappings.
#[derive(Debug, Clone, PartialEq)]
pub enum PropertyValue {
	Text(String),
	Int(i64),
	Float(f64),
	Bool(bool),
	Date(DateTime<Utc>),
	List(Vec<PropertyValue>),
	Map(Properties),
}

impl PropertyValue {
	/// Returns `true` for `Int` and `Float` values.
	pub fn is_numeric(&self) -> bool {
		matches!(self, PropertyValue::Int(_) | PropertyValue::Float(_))
	}

	/// Converts an arbitrary JSON value into a property value.
	///
	/// Unsigned integers above `i64::MAX` degrade to `Float`; JSON `null`
	/// becomes an empty string (the backend has no null value type).
	pub fn from_json(value: serde_json::Value) -> Self {
		match value {
			serde_json::Value::Null => PropertyValue::Text(String::new()),
			serde_json::Value::Bool(b) => PropertyValue::Bool(b),
			serde_json::Value::Number(n) => {
				if let Some(i) = n.as_i64() {
					PropertyValue::Int(i)
				} else {
					PropertyValue::Float(n.as_f64().unwrap_or(0.0))
				}
			}
			serde_json::Value::String(s) => PropertyValue::Text(s),
			serde_json::Value::Array(items) => {
				PropertyValue::List(items.into_iter().map(Self::from_json).collect())
			}
			serde_json::Value::Object(map) => {
				let mut props = Properties::new();
				for (k, v) in map {
					props.set(k, Self::from_json(v));
				}
				PropertyValue::Map(props)
			}
		}
	}

	/// Projects this value to JSON. Dates render as RFC 3339 UTC strings.
	///
	/// Non-finite floats project to JSON `null`; [`Properties::validate`]
	/// rejects them before any record reaches serialization.
	pub fn to_json(&self) -> serde_json::Value {
		match self {
			PropertyValue::Text(s) => serde_json::Value::String(s.clone()),
			PropertyValue::Int(i) => serde_json::Value::Number((*i).into()),
			PropertyValue::Float(f) => serde_json::Number::from_f64(*f)
				.map(serde_json::Value::Number)
				.unwrap_or(serde_json::Value::Null),
			PropertyValue::Bool(b) => serde_json::Value::Bool(*b),
			PropertyValue::Date(d) => {
				serde_json::Value::String(d.to_rfc3339_opts(SecondsFormat::Millis, true))
			}
			PropertyValue::List(items) => {
				serde_json::Value::Array(items.iter().map(|v| v.to_json()).collect())
			}
			PropertyValue::Map(props) => props.to_json(),
		}
	}

	fn validate(&self, key: &str, depth: usize) -> Result<(), PropertyError> {
		if depth > MAX_NESTING_DEPTH {
			return Err(PropertyError::TooDeep {
				key: key.to_string(),
			});
		}
		match self {
			PropertyValue::Float(f) if !f.is_finite() => Err(PropertyError::NonFiniteNumber {
				key: key.to_string(),
			}),
			PropertyValue::List(items) => {
				for item in items {
					item.validate(key, depth + 1)?;
				}
				Ok(())
			}
			PropertyValue::Map(props) => props.validate_at_depth(depth + 1),
			_ => Ok(()),
		}
	}
}

impl Serialize for PropertyValue {
	fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
		match self {
			PropertyValue::Text(s) => serializer.serialize_str(s),
			PropertyValue::Int(i) => serializer.serialize_i64(*i),
			PropertyValue::Float(f) => serializer.serialize_f64(*f),
			PropertyValue::Bool(b) => serializer.serialize_bool(*b),
			PropertyValue::Date(d) => {
				serializer.serialize_str(&d.to_rfc3339_opts(SecondsFormat::Millis, true))
			}
			PropertyValue::List(items) => {
				let mut seq = serializer.serialize_seq(Some(items.len()))?;
				for item in items {
					seq.serialize_element(item)?;
				}
				seq.end()
			}
			PropertyValue::Map(props) => props.serialize(serializer),
		}
	}
}

impl From<&str> for PropertyValue {
	fn from(s: &str) -> Self {
		PropertyValue::Text(s.to_string())
	}
}

impl From<String> for PropertyValue {
	fn from(s: String) -> Self {
		PropertyValue::Text(s)
	}
}

impl From<i32> for PropertyValue {
	fn from(i: i32) -> Self {
		PropertyValue::Int(i64::from(i))
	}
}

impl From<i64> for PropertyValue {
	fn from(i: i64) -> Self {
		PropertyValue::Int(i)
	}
}

impl From<u32> for PropertyValue {
	fn from(i: u32) -> Self {
		PropertyValue::Int(i64::from(i))
	}
}

impl From<f64> for PropertyValue {
	fn from(f: f64) -> Self {
		PropertyValue::Float(f)
	}
}

impl From<bool> for PropertyValue {
	fn from(b: bool) -> Self {
		PropertyValue::Bool(b)
	}
}

impl From<DateTime<Utc>> for PropertyValue {
	fn from(d: DateTime<Utc>) -> Self {
		PropertyValue::Date(d)
	}
}

impl<T: Into<PropertyValue>> From<Vec<T>> for PropertyValue {
	fn from(items: Vec<T>) -> Self {
		PropertyValue::List(items.into_iter().map(Into::into).collect())
	}
}

impl From<Properties> for PropertyValue {
	fn from(props: Properties) -> Self {
		PropertyValue::Map(props)
	}
}

/// A string-keyed property mapping.
///
/// Keys are kept in sorted order so JSON projections are deterministic:
/// the same mapping always serializes to the same string.
///
/// # Example
///
/// ```
/// use pulse_analytics_core::Properties;
///
/// let props = Properties::new()
///     .insert("button_name", "checkout")
///     .insert("price", 99.99)
///     .insert("is_premium", true);
/// ```
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Properties {
	inner: BTreeMap<String, PropertyValue>,
}

impl Properties {
	/// Creates a new empty mapping.
	pub fn new() -> Self {
		Self {
			inner: BTreeMap::new(),
		}
	}

	/// Inserts a key-value pair (builder pattern).
	pub fn insert<K, V>(mut self, key: K, value: V) -> Self
	where
		K: Into<String>,
		V: Into<PropertyValue>,
	{
		self.inner.insert(key.into(), value.into());
		self
	}

	/// Inserts a key-value pair in place.
	pub fn set<K, V>(&mut self, key: K, value: V)
	where
		K: Into<String>,
		V: Into<PropertyValue>,
	{
		self.inner.insert(key.into(), value.into());
	}

	/// Merges `other` into this mapping. On key collision the value from
	/// `other` wins.
	pub fn merge(mut self, other: Properties) -> Self {
		for (k, v) in other.inner {
			self.inner.insert(k, v);
		}
		self
	}

	/// Merges `other` in, keeping existing values on key collision.
	pub fn merge_missing(&mut self, other: Properties) {
		for (k, v) in other.inner {
			self.inner.entry(k).or_insert(v);
		}
	}

	/// Removes a key, returning its value if present.
	pub fn remove(&mut self, key: &str) -> Option<PropertyValue> {
		self.inner.remove(key)
	}

	/// Removes all entries.
	pub fn clear(&mut self) {
		self.inner.clear();
	}

	/// Gets a value by key.
	pub fn get(&self, key: &str) -> Option<&PropertyValue> {
		self.inner.get(key)
	}

	/// Returns `true` if the key is present.
	pub fn contains_key(&self, key: &str) -> bool {
		self.inner.contains_key(key)
	}

	/// Returns `true` if the mapping is empty.
	pub fn is_empty(&self) -> bool {
		self.inner.is_empty()
	}

	/// Returns the number of entries.
	pub fn len(&self) -> usize {
		self.inner.len()
	}

	/// Iterates entries in key order.
	pub fn iter(&self) -> impl Iterator<Item = (&str, &PropertyValue)> {
		self.inner.iter().map(|(k, v)| (k.as_str(), v))
	}

	/// Checks that every key and value is acceptable to the backend.
	///
	/// Rejects empty or oversized keys, non-finite floats, and nesting
	/// deeper than [`MAX_NESTING_DEPTH`]. Run before queueing a record so
	/// bad data is surfaced from the call that introduced it.
	pub fn validate(&self) -> Result<(), PropertyError> {
		self.validate_at_depth(0)
	}

	fn validate_at_depth(&self, depth: usize) -> Result<(), PropertyError> {
		for (key, value) in &self.inner {
			if key.is_empty() {
				return Err(PropertyError::EmptyKey);
			}
			if key.len() > MAX_KEY_LENGTH {
				return Err(PropertyError::KeyTooLong { key: key.clone() });
			}
			value.validate(key, depth)?;
		}
		Ok(())
	}

	/// Projects the mapping to a JSON object with keys in sorted order.
	pub fn to_json(&self) -> serde_json::Value {
		let mut map = serde_json::Map::new();
		for (k, v) in &self.inner {
			map.insert(k.clone(), v.to_json());
		}
		serde_json::Value::Object(map)
	}
}

impl Serialize for Properties {
	fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
		let mut map = serializer.serialize_map(Some(self.inner.len()))?;
		for (k, v) in &self.inner {
			map.serialize_entry(k, v)?;
		}
		map.end()
	}
}

impl From<serde_json::Value> for Properties {
	fn from(value: serde_json::Value) -> Self {
		match PropertyValue::from_json(value) {
			PropertyValue::Map(props) => props,
			_ => Properties::new(),
		}
	}
}

impl FromIterator<(String, PropertyValue)> for Properties {
	fn from_iter<I: IntoIterator<Item = (String, PropertyValue)>>(iter: I) -> Self {
		Self {
			inner: iter.into_iter().collect(),
		}
	}
}
