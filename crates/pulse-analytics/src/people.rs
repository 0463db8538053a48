// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Profile operations scoped to the tracker's current identity.

use chrono::Utc;
use pulse_analytics_core::{
	ProfileOperation, ProfileUpdate, Properties, PropertyValue,
};
use std::sync::Arc;

use crate::batch::QueuedItem;
use crate::error::{AnalyticsError, Result};
use crate::serialize::validate_record;
use crate::tracker::TrackerState;

/// Handle for mutating the profile of the currently identified user.
///
/// Obtained from [`Tracker::people`](crate::Tracker::people); shares the
/// tracker's state, so it always reflects the latest `identify` call. Every
/// operation fails with [`AnalyticsError::NoIdentity`] until an identity is
/// set.
#[derive(Clone)]
pub struct People {
	state: Arc<TrackerState>,
}

impl People {
	pub(crate) fn new(state: Arc<TrackerState>) -> Self {
		Self { state }
	}

	fn require_identity(&self) -> Result<String> {
		self.state.distinct_id().ok_or(AnalyticsError::NoIdentity)
	}

	async fn enqueue(&self, operation: ProfileOperation) -> Result<()> {
		let distinct_id = self.require_identity()?;
		operation.validate()?;
		if let Some(props) = operation.properties() {
			validate_record(props)?;
		}
		let update = ProfileUpdate::new(distinct_id, operation);
		self.state
			.processor
			.enqueue(QueuedItem::Profile(update))
			.await
	}

	/// Overwrites profile properties.
	pub async fn set(&self, properties: Properties) -> Result<()> {
		self.enqueue(ProfileOperation::Set(properties)).await
	}

	/// Overwrites a single profile property.
	pub async fn set_one(
		&self,
		name: impl Into<String>,
		value: impl Into<PropertyValue>,
	) -> Result<()> {
		self.set(Properties::new().insert(name, value)).await
	}

	/// Sets properties only where currently absent on the profile.
	pub async fn set_once(&self, properties: Properties) -> Result<()> {
		self.enqueue(ProfileOperation::SetOnce(properties)).await
	}

	/// Numerically accumulates into profile properties.
	///
	/// Every value must be numeric; anything else fails validation.
	pub async fn increment(&self, properties: Properties) -> Result<()> {
		self.enqueue(ProfileOperation::Increment(properties)).await
	}

	/// Increments a single profile property by `amount`.
	pub async fn increment_one(&self, name: impl Into<String>, amount: f64) -> Result<()> {
		self.increment(Properties::new().insert(name, amount)).await
	}

	/// Appends values to list-valued profile properties.
	pub async fn append(&self, properties: Properties) -> Result<()> {
		self.enqueue(ProfileOperation::Append(properties)).await
	}

	/// Unions values into list-valued profile properties.
	pub async fn union(&self, properties: Properties) -> Result<()> {
		self.enqueue(ProfileOperation::Union(properties)).await
	}

	/// Removes the named properties from the profile.
	pub async fn unset(&self, names: Vec<String>) -> Result<()> {
		self.enqueue(ProfileOperation::Unset(names)).await
	}

	/// Records a monetary transaction against the profile.
	pub async fn track_charge(&self, amount: f64) -> Result<()> {
		self.track_charge_with_properties(amount, Properties::new())
			.await
	}

	/// Records a monetary transaction with extra transaction properties.
	pub async fn track_charge_with_properties(
		&self,
		amount: f64,
		properties: Properties,
	) -> Result<()> {
		let transaction = properties
			.insert("$amount", amount)
			.insert("$time", Utc::now());
		self.append(Properties::new().insert("$transactions", transaction))
			.await
	}

	/// Removes the profile's transaction history.
	pub async fn clear_charges(&self) -> Result<()> {
		self.set(Properties::new().insert("$transactions", PropertyValue::List(Vec::new())))
			.await
	}

	/// Removes the profile entirely.
	pub async fn delete_user(&self) -> Result<()> {
		self.enqueue(ProfileOperation::Delete).await
	}

	/// Associates a push device token with the profile.
	///
	/// The raw token bytes are hex-encoded and unioned into the profile's
	/// device list, so registering the same device twice is idempotent.
	pub async fn add_push_device_token(&self, token: &[u8]) -> Result<()> {
		self.union(Properties::new().insert("$ios_devices", vec![hex::encode(token)]))
			.await
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::tracker::Tracker;
	use crate::tracker::test_support::CapturingSender;
	use pulse_analytics_core::PropertyError;

	async fn tracker_with_sender() -> (Tracker, Arc<CapturingSender>) {
		let sender = Arc::new(CapturingSender::new());
		let tracker = Tracker::builder()
			.token("testtoken")
			.sender(sender.clone())
			.build()
			.await
			.unwrap();
		(tracker, sender)
	}

	#[tokio::test]
	async fn operations_require_identity() {
		let (tracker, _sender) = tracker_with_sender().await;
		let people = tracker.people();

		let result = people.set(Properties::new().insert("plan", "pro")).await;
		assert!(matches!(result, Err(AnalyticsError::NoIdentity)));

		let result = people.track_charge(9.99).await;
		assert!(matches!(result, Err(AnalyticsError::NoIdentity)));

		let result = people.delete_user().await;
		assert!(matches!(result, Err(AnalyticsError::NoIdentity)));
	}

	#[tokio::test]
	async fn set_is_scoped_to_current_identity() {
		let (tracker, sender) = tracker_with_sender().await;
		tracker.identify("user_9").unwrap();

		let people = tracker.people();
		people.set_one("plan", "pro").await.unwrap();
		tracker.flush().await.unwrap();

		let updates = sender.profiles().await;
		assert_eq!(updates.len(), 1);
		assert_eq!(updates[0].distinct_id(), "user_9");
		assert!(matches!(
			updates[0].operation(),
			ProfileOperation::Set(props) if props.contains_key("plan")
		));
	}

	#[tokio::test]
	async fn people_handle_follows_later_identify() {
		let (tracker, sender) = tracker_with_sender().await;
		let people = tracker.people();

		tracker.identify("first").unwrap();
		people.set_one("a", 1).await.unwrap();

		tracker.identify("second").unwrap();
		people.set_one("b", 2).await.unwrap();

		tracker.flush().await.unwrap();
		let updates = sender.profiles().await;
		assert_eq!(updates[0].distinct_id(), "first");
		assert_eq!(updates[1].distinct_id(), "second");
	}

	#[tokio::test]
	async fn increment_rejects_non_numeric_values() {
		let (tracker, _sender) = tracker_with_sender().await;
		tracker.identify("user_1").unwrap();

		let result = tracker
			.people()
			.increment(Properties::new().insert("logins", "three"))
			.await;

		assert!(matches!(
			result,
			Err(AnalyticsError::InvalidProperty(PropertyError::NotNumeric { .. }))
		));
	}

	#[tokio::test]
	async fn set_rejects_oversized_property_payload() {
		let (tracker, sender) = tracker_with_sender().await;
		tracker.identify("user_1").unwrap();

		let blob = Properties::new()
			.insert("blob", "x".repeat(crate::serialize::MAX_PROPERTIES_SIZE + 1));
		let result = tracker.people().set(blob).await;
		assert!(matches!(result, Err(AnalyticsError::Serialization(_))));

		tracker.flush().await.unwrap();
		assert!(sender.profiles().await.is_empty());
	}

	#[tokio::test]
	async fn track_charge_appends_transaction() {
		let (tracker, sender) = tracker_with_sender().await;
		tracker.identify("user_1").unwrap();

		tracker.people().track_charge(25.0).await.unwrap();
		tracker.flush().await.unwrap();

		let updates = sender.profiles().await;
		let ProfileOperation::Append(props) = updates[0].operation() else {
			panic!("expected append operation");
		};
		let Some(PropertyValue::Map(transaction)) = props.get("$transactions") else {
			panic!("expected transaction map");
		};
		assert_eq!(transaction.get("$amount"), Some(&PropertyValue::Float(25.0)));
		assert!(transaction.contains_key("$time"));
	}

	#[tokio::test]
	async fn clear_charges_resets_transactions() {
		let (tracker, sender) = tracker_with_sender().await;
		tracker.identify("user_1").unwrap();

		tracker.people().clear_charges().await.unwrap();
		tracker.flush().await.unwrap();

		let updates = sender.profiles().await;
		let ProfileOperation::Set(props) = updates[0].operation() else {
			panic!("expected set operation");
		};
		assert_eq!(
			props.get("$transactions"),
			Some(&PropertyValue::List(Vec::new()))
		);
	}

	#[tokio::test]
	async fn push_device_token_is_hex_encoded_union() {
		let (tracker, sender) = tracker_with_sender().await;
		tracker.identify("user_1").unwrap();

		tracker
			.people()
			.add_push_device_token(&[0xde, 0xad, 0xbe, 0xef])
			.await
			.unwrap();
		tracker.flush().await.unwrap();

		let updates = sender.profiles().await;
		let ProfileOperation::Union(props) = updates[0].operation() else {
			panic!("expected union operation");
		};
		assert_eq!(
			props.get("$ios_devices"),
			Some(&PropertyValue::List(vec![PropertyValue::Text(
				"deadbeef".into()
			)]))
		);
	}

	#[tokio::test]
	async fn unset_carries_property_names() {
		let (tracker, sender) = tracker_with_sender().await;
		tracker.identify("user_1").unwrap();

		tracker
			.people()
			.unset(vec!["name".into(), "email".into()])
			.await
			.unwrap();
		tracker.flush().await.unwrap();

		let updates = sender.profiles().await;
		assert!(matches!(
			updates[0].operation(),
			ProfileOperation::Unset(names) if names.len() == 2
		));
	}
}
