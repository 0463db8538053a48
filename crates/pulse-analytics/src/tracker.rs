// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! The tracker: identity, super-properties, and the event pipeline.

use std::sync::{Arc, Mutex, MutexGuard};

use pulse_analytics_core::event::MAX_DISTINCT_ID_LENGTH;
use pulse_analytics_core::{Event, ProjectToken, Properties, PropertyValue, TokenError};
use tokio::task::JoinHandle;
use tracing::{debug, info};

use crate::batch::{BatchConfig, BatchProcessor, BatchSender, QueuedItem};
use crate::config::TrackerConfig;
use crate::delegate::WeakFlushDelegate;
use crate::error::{AnalyticsError, Result};
use crate::people::People;
use crate::sender::HttpBatchSender;
use crate::serialize::validate_record;

// A poisoned lock still holds structurally valid state; recover the guard
// rather than propagating a panic from an unrelated thread.
fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
	mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

#[derive(Default)]
struct IdentityState {
	distinct_id: Option<String>,
	name_tag: Option<String>,
}

/// State shared between a [`Tracker`] and its [`People`] handles.
pub(crate) struct TrackerState {
	config: TrackerConfig,
	identity: Mutex<IdentityState>,
	super_properties: Mutex<Properties>,
	pub(crate) processor: Arc<BatchProcessor>,
}

impl TrackerState {
	pub(crate) fn distinct_id(&self) -> Option<String> {
		lock(&self.identity).distinct_id.clone()
	}
}

/// Builder for [`Tracker`].
pub struct TrackerBuilder {
	token: Option<String>,
	config: TrackerConfig,
	delegate: Option<WeakFlushDelegate>,
	sender: Option<Arc<dyn BatchSender>>,
}

impl TrackerBuilder {
	fn new() -> Self {
		Self {
			token: None,
			config: TrackerConfig::default(),
			delegate: None,
			sender: None,
		}
	}

	/// Sets the project token (required).
	pub fn token(mut self, token: impl Into<String>) -> Self {
		self.token = Some(token.into());
		self
	}

	/// Overrides the full configuration.
	pub fn config(mut self, config: TrackerConfig) -> Self {
		self.config = config;
		self
	}

	/// Sets the ingestion server base URL.
	pub fn server_url(mut self, url: impl Into<String>) -> Self {
		self.config.server_url = url.into();
		self
	}

	/// Sets the automatic flush interval.
	pub fn flush_interval(mut self, interval: std::time::Duration) -> Self {
		self.config.flush_interval = interval;
		self
	}

	/// Controls flushing when the host app enters the background.
	pub fn flush_on_background(mut self, enabled: bool) -> Self {
		self.config.flush_on_background = enabled;
		self
	}

	/// Enables debug-level tracing of transport activity.
	pub fn log_network_activity(mut self, enabled: bool) -> Self {
		self.config.log_network_activity = enabled;
		self
	}

	/// Installs a flush delegate by weak reference.
	pub fn delegate(mut self, delegate: WeakFlushDelegate) -> Self {
		self.delegate = Some(delegate);
		self
	}

	/// Overrides the transport (used by tests).
	pub fn sender(mut self, sender: Arc<dyn BatchSender>) -> Self {
		self.sender = Some(sender);
		self
	}

	/// Validates the configuration and starts the tracker.
	pub async fn build(self) -> Result<Tracker> {
		let token = ProjectToken::new(self.token.ok_or(TokenError::Empty)?)?;

		let sender = match self.sender {
			Some(sender) => sender,
			None => Arc::new(HttpBatchSender::new(&self.config, token.clone())?),
		};

		let batch_config = BatchConfig {
			max_batch_size: self.config.max_batch_size,
			flush_interval: self.config.flush_interval,
			max_queue_size: self.config.max_queue_size,
		};
		let processor = Arc::new(BatchProcessor::new(batch_config, sender, self.delegate));

		let flush_task = {
			let processor = processor.clone();
			tokio::spawn(async move { processor.run().await })
		};

		info!(token = %token, server_url = %self.config.server_url, "Tracker started");

		Ok(Tracker {
			state: Arc::new(TrackerState {
				config: self.config,
				identity: Mutex::new(IdentityState::default()),
				super_properties: Mutex::new(Properties::new()),
				processor,
			}),
			flush_task: Mutex::new(Some(flush_task)),
		})
	}
}

/// The analytics tracker.
///
/// Owns the project token, the current identity, the super-properties
/// mapping merged into every tracked event, and the background flush
/// pipeline. Obtain one via [`Tracker::builder`].
///
/// # Example
///
/// ```ignore
/// use pulse_analytics::{Properties, Tracker};
///
/// let tracker = Tracker::builder()
///     .token("a1b2c3d4e5f60718293a4b5c6d7e8f90")
///     .build()
///     .await?;
///
/// tracker.identify("user_123")?;
/// tracker
///     .track("signup_completed", Properties::new().insert("plan", "pro"))
///     .await?;
/// tracker.shutdown().await?;
/// ```
pub struct Tracker {
	state: Arc<TrackerState>,
	flush_task: Mutex<Option<JoinHandle<()>>>,
}

impl Tracker {
	/// Returns a builder.
	pub fn builder() -> TrackerBuilder {
		TrackerBuilder::new()
	}

	/// Records an event.
	///
	/// Call-site properties are merged over the current super-properties;
	/// on key collision the call's value wins. Validation failures surface
	/// here, not at flush time.
	pub async fn track(&self, name: impl Into<String>, properties: Properties) -> Result<()> {
		let merged = {
			let supers = lock(&self.state.super_properties);
			supers.clone()
		}
		.merge(properties);
		validate_record(&merged)?;

		let event = Event::new(name, self.state.distinct_id(), merged)?;
		debug!(event = event.name(), "Tracking event");
		self.state.processor.enqueue(QueuedItem::Event(event)).await
	}

	/// Sets the current identity. Subsequent events and profile operations
	/// are attributed to it.
	pub fn identify(&self, distinct_id: impl Into<String>) -> Result<()> {
		let distinct_id = distinct_id.into();
		if distinct_id.is_empty() {
			return Err(AnalyticsError::InvalidDistinctId(
				"distinct ID cannot be empty".to_string(),
			));
		}
		if distinct_id.len() > MAX_DISTINCT_ID_LENGTH {
			return Err(AnalyticsError::InvalidDistinctId(
				"distinct ID exceeds maximum length".to_string(),
			));
		}
		lock(&self.state.identity).distinct_id = Some(distinct_id);
		Ok(())
	}

	/// Returns the current distinct ID, if identified.
	pub fn distinct_id(&self) -> Option<String> {
		self.state.distinct_id()
	}

	/// Sets a human-readable label for the current user.
	pub fn set_name_tag(&self, name_tag: impl Into<String>) {
		lock(&self.state.identity).name_tag = Some(name_tag.into());
	}

	/// Returns the current name tag.
	pub fn name_tag(&self) -> Option<String> {
		lock(&self.state.identity).name_tag.clone()
	}

	/// Merges properties into the super-properties mapping; the caller's
	/// values overwrite existing keys.
	pub fn register_super_properties(&self, properties: Properties) -> Result<()> {
		properties.validate()?;
		let mut supers = lock(&self.state.super_properties);
		let merged = supers.clone().merge(properties);
		*supers = merged;
		Ok(())
	}

	/// Merges properties, keeping existing values: a key already registered
	/// is never overwritten.
	pub fn register_super_properties_once(&self, properties: Properties) -> Result<()> {
		properties.validate()?;
		lock(&self.state.super_properties).merge_missing(properties);
		Ok(())
	}

	/// Like [`register_super_properties_once`](Self::register_super_properties_once),
	/// but a key whose current value equals `default` is treated as unset
	/// and overwritten. A key holding any other value is never overwritten.
	pub fn register_super_properties_once_with_default(
		&self,
		properties: Properties,
		default: PropertyValue,
	) -> Result<()> {
		properties.validate()?;
		let mut supers = lock(&self.state.super_properties);
		for (key, value) in properties.iter() {
			match supers.get(key) {
				Some(current) if *current != default => {}
				_ => supers.set(key.to_string(), value.clone()),
			}
		}
		Ok(())
	}

	/// Removes one super-property.
	pub fn unregister_super_property(&self, name: &str) {
		lock(&self.state.super_properties).remove(name);
	}

	/// Removes all super-properties.
	pub fn clear_super_properties(&self) {
		lock(&self.state.super_properties).clear();
	}

	/// Returns a snapshot of the current super-properties.
	pub fn current_super_properties(&self) -> Properties {
		lock(&self.state.super_properties).clone()
	}

	/// Clears identity, name tag, super-properties, and all pending items,
	/// returning the tracker to its initial configuration.
	pub async fn reset(&self) {
		{
			let mut identity = lock(&self.state.identity);
			identity.distinct_id = None;
			identity.name_tag = None;
		}
		lock(&self.state.super_properties).clear();
		let dropped = self.state.processor.clear().await;
		if dropped > 0 {
			debug!(dropped, "Discarded pending items on reset");
		}
	}

	/// Flushes pending items now, subject to the delegate.
	pub async fn flush(&self) -> Result<()> {
		self.state.processor.flush().await
	}

	/// Notifies the tracker that the host app entered the background,
	/// flushing if the configuration asks for it.
	pub async fn on_enter_background(&self) -> Result<()> {
		if self.state.config.flush_on_background {
			debug!("Flushing on background transition");
			self.flush().await
		} else {
			Ok(())
		}
	}

	/// Returns the Profile surface bound to this tracker's identity.
	pub fn people(&self) -> People {
		People::new(self.state.clone())
	}

	/// Returns the number of items waiting to be sent.
	pub async fn pending(&self) -> usize {
		self.state.processor.queue_len().await
	}

	/// Stops the background task after a final flush. Further track or
	/// profile calls fail with [`AnalyticsError::ClientShutdown`].
	pub async fn shutdown(&self) -> Result<()> {
		self.state.processor.shutdown();
		let task = lock(&self.flush_task).take();
		if let Some(task) = task {
			task.await.map_err(|_| AnalyticsError::ClientShutdown)?;
		}
		Ok(())
	}
}
