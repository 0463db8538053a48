// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Queueing and background flush for events and profile updates.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use pulse_analytics_core::{Event, ProfileUpdate};
use tokio::sync::{Mutex, Notify};
use tracing::{debug, error, info, warn};

use crate::delegate::{flush_permitted, WeakFlushDelegate};
use crate::error::{AnalyticsError, Result};

/// Configuration for the batch queue.
#[derive(Debug, Clone)]
pub struct BatchConfig {
	/// Number of queued items that triggers an early flush.
	pub max_batch_size: usize,
	/// Interval between automatic flushes.
	pub flush_interval: Duration,
	/// Maximum number of items to queue before dropping oldest.
	pub max_queue_size: usize,
}

impl Default for BatchConfig {
	fn default() -> Self {
		Self {
			max_batch_size: 50,
			flush_interval: Duration::from_secs(60),
			max_queue_size: 5000,
		}
	}
}

/// A queued record waiting to be sent.
#[derive(Debug, Clone)]
pub enum QueuedItem {
	Event(Event),
	Profile(ProfileUpdate),
}

impl QueuedItem {
	fn describe(&self) -> &str {
		match self {
			QueuedItem::Event(event) => event.name(),
			QueuedItem::Profile(update) => update.operation().key(),
		}
	}
}

/// Transport seam for delivering batches.
#[async_trait::async_trait]
pub trait BatchSender: Send + Sync {
	/// Sends a batch of events to the ingestion endpoint.
	async fn send_events(&self, events: Vec<Event>) -> Result<()>;

	/// Sends a batch of profile updates to the engage endpoint.
	async fn send_profiles(&self, updates: Vec<ProfileUpdate>) -> Result<()>;
}

/// The queue and flush pipeline behind a tracker.
///
/// One background task owns sending, so at most one flush is in flight at
/// any time. Every flush attempt consults the delegate first; a veto leaves
/// the queue untouched.
pub struct BatchProcessor {
	config: BatchConfig,
	sender: Arc<dyn BatchSender>,
	delegate: Option<WeakFlushDelegate>,
	queue: Mutex<Vec<QueuedItem>>,
	shutdown: AtomicBool,
	flush_notify: Notify,
}

impl BatchProcessor {
	/// Creates a new processor.
	pub fn new(
		config: BatchConfig,
		sender: Arc<dyn BatchSender>,
		delegate: Option<WeakFlushDelegate>,
	) -> Self {
		Self {
			config,
			sender,
			delegate,
			queue: Mutex::new(Vec::new()),
			shutdown: AtomicBool::new(false),
			flush_notify: Notify::new(),
		}
	}

	/// Enqueues a record for batched sending.
	pub async fn enqueue(&self, item: QueuedItem) -> Result<()> {
		if self.shutdown.load(Ordering::SeqCst) {
			return Err(AnalyticsError::ClientShutdown);
		}

		let mut queue = self.queue.lock().await;

		// If queue is at max, drop oldest items
		while queue.len() >= self.config.max_queue_size {
			let dropped = queue.remove(0);
			warn!(
				item = %dropped.describe(),
				"Dropped queued item due to queue overflow"
			);
		}

		queue.push(item);

		// Check if we should flush based on batch size
		if queue.len() >= self.config.max_batch_size {
			drop(queue);
			self.flush_notify.notify_one();
		}

		Ok(())
	}

	/// Attempts a flush of queued items, honoring the delegate.
	pub async fn flush(&self) -> Result<()> {
		let items = {
			let mut queue = self.queue.lock().await;
			if queue.is_empty() {
				return Ok(());
			}
			if !flush_permitted(&self.delegate, queue.len()) {
				debug!(pending = queue.len(), "Flush vetoed by delegate");
				return Ok(());
			}
			std::mem::take(&mut *queue)
		};

		debug!(count = items.len(), "Flushing batch");

		let mut events = Vec::new();
		let mut profiles = Vec::new();
		for item in items {
			match item {
				QueuedItem::Event(event) => events.push(event),
				QueuedItem::Profile(update) => profiles.push(update),
			}
		}

		if !events.is_empty() {
			self.sender.send_events(events).await?;
		}
		if !profiles.is_empty() {
			self.sender.send_profiles(profiles).await?;
		}
		Ok(())
	}

	/// Discards all queued items without sending them.
	pub async fn clear(&self) -> usize {
		let mut queue = self.queue.lock().await;
		let dropped = queue.len();
		queue.clear();
		dropped
	}

	/// Returns the number of items currently queued.
	pub async fn queue_len(&self) -> usize {
		self.queue.lock().await.len()
	}

	/// Signals the processor to shut down.
	pub fn shutdown(&self) {
		self.shutdown.store(true, Ordering::SeqCst);
		self.flush_notify.notify_one();
	}

	/// Returns true if shutdown has been requested.
	pub fn is_shutdown(&self) -> bool {
		self.shutdown.load(Ordering::SeqCst)
	}

	/// Runs the background flush loop.
	pub async fn run(&self) {
		info!(
			flush_interval_secs = self.config.flush_interval.as_secs(),
			max_batch_size = self.config.max_batch_size,
			"Starting analytics batch processor"
		);

		loop {
			tokio::select! {
				_ = tokio::time::sleep(self.config.flush_interval) => {
					if self.shutdown.load(Ordering::SeqCst) {
						break;
					}

					if let Err(e) = self.flush().await {
						error!(error = %e, "Failed to flush batch");
					}
				}
				_ = self.flush_notify.notified() => {
					if self.shutdown.load(Ordering::SeqCst) {
						// Final flush before shutdown
						if let Err(e) = self.flush().await {
							error!(error = %e, "Failed to flush batch on shutdown");
						}
						break;
					}

					if let Err(e) = self.flush().await {
						error!(error = %e, "Failed to flush batch");
					}
				}
			}
		}

		info!("Analytics batch processor stopped");
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::delegate::FlushDelegate;
	use pulse_analytics_core::{ProfileOperation, Properties};
	use std::sync::atomic::AtomicUsize;

	struct MockSender {
		sent_events: Mutex<Vec<Vec<Event>>>,
		sent_profiles: Mutex<Vec<Vec<ProfileUpdate>>>,
		should_fail: AtomicBool,
	}

	impl MockSender {
		fn new() -> Self {
			Self {
				sent_events: Mutex::new(Vec::new()),
				sent_profiles: Mutex::new(Vec::new()),
				should_fail: AtomicBool::new(false),
			}
		}
	}

	#[async_trait::async_trait]
	impl BatchSender for MockSender {
		async fn send_events(&self, events: Vec<Event>) -> Result<()> {
			if self.should_fail.load(Ordering::SeqCst) {
				return Err(AnalyticsError::ServerError {
					status: 500,
					message: "mock failure".to_string(),
				});
			}
			self.sent_events.lock().await.push(events);
			Ok(())
		}

		async fn send_profiles(&self, updates: Vec<ProfileUpdate>) -> Result<()> {
			if self.should_fail.load(Ordering::SeqCst) {
				return Err(AnalyticsError::ServerError {
					status: 500,
					message: "mock failure".to_string(),
				});
			}
			self.sent_profiles.lock().await.push(updates);
			Ok(())
		}
	}

	fn event_item(name: &str) -> QueuedItem {
		QueuedItem::Event(
			Event::new(name, Some("test_user".to_string()), Properties::new()).unwrap(),
		)
	}

	fn profile_item() -> QueuedItem {
		QueuedItem::Profile(ProfileUpdate::new(
			"test_user",
			ProfileOperation::Set(Properties::new().insert("plan", "pro")),
		))
	}

	fn processor_with(
		sender: Arc<MockSender>,
		delegate: Option<WeakFlushDelegate>,
	) -> BatchProcessor {
		let config = BatchConfig {
			max_batch_size: 100,
			flush_interval: Duration::from_secs(60),
			max_queue_size: 1000,
		};
		BatchProcessor::new(config, sender, delegate)
	}

	#[tokio::test]
	async fn enqueue_single_item() {
		let sender = Arc::new(MockSender::new());
		let processor = processor_with(sender, None);

		processor.enqueue(event_item("test")).await.unwrap();

		assert_eq!(processor.queue_len().await, 1);
	}

	#[tokio::test]
	async fn flush_splits_events_and_profiles() {
		let sender = Arc::new(MockSender::new());
		let processor = processor_with(sender.clone(), None);

		processor.enqueue(event_item("event1")).await.unwrap();
		processor.enqueue(profile_item()).await.unwrap();
		processor.enqueue(event_item("event2")).await.unwrap();

		processor.flush().await.unwrap();

		let events = sender.sent_events.lock().await;
		let profiles = sender.sent_profiles.lock().await;
		assert_eq!(events.len(), 1);
		assert_eq!(events[0].len(), 2);
		assert_eq!(events[0][0].name(), "event1");
		assert_eq!(events[0][1].name(), "event2");
		assert_eq!(profiles.len(), 1);
		assert_eq!(profiles[0].len(), 1);
		assert_eq!(processor.queue_len().await, 0);
	}

	#[tokio::test]
	async fn flush_empty_queue_succeeds_without_sending() {
		let sender = Arc::new(MockSender::new());
		let processor = processor_with(sender.clone(), None);

		processor.flush().await.unwrap();

		assert!(sender.sent_events.lock().await.is_empty());
		assert!(sender.sent_profiles.lock().await.is_empty());
	}

	#[tokio::test]
	async fn queue_overflow_drops_oldest() {
		let sender = Arc::new(MockSender::new());
		let config = BatchConfig {
			max_batch_size: 100,
			flush_interval: Duration::from_secs(60),
			max_queue_size: 3,
		};
		let processor = BatchProcessor::new(config, sender.clone(), None);

		for i in 0..5 {
			processor
				.enqueue(event_item(&format!("event{i}")))
				.await
				.unwrap();
		}

		assert_eq!(processor.queue_len().await, 3);

		processor.flush().await.unwrap();
		let events = sender.sent_events.lock().await;
		assert_eq!(events[0].len(), 3);
		assert_eq!(events[0][0].name(), "event2");
		assert_eq!(events[0][1].name(), "event3");
		assert_eq!(events[0][2].name(), "event4");
	}

	#[tokio::test]
	async fn shutdown_prevents_enqueue() {
		let sender = Arc::new(MockSender::new());
		let processor = processor_with(sender, None);

		processor.shutdown();

		let result = processor.enqueue(event_item("test")).await;
		assert!(matches!(result, Err(AnalyticsError::ClientShutdown)));
	}

	#[tokio::test]
	async fn flush_failure_returns_error_and_drops_items() {
		let sender = Arc::new(MockSender::new());
		sender.should_fail.store(true, Ordering::SeqCst);
		let processor = processor_with(sender, None);

		processor.enqueue(event_item("test")).await.unwrap();

		let result = processor.flush().await;
		assert!(matches!(result, Err(AnalyticsError::ServerError { .. })));
	}

	struct VetoDelegate {
		allow: AtomicBool,
		asked: AtomicUsize,
	}

	impl FlushDelegate for VetoDelegate {
		fn should_flush(&self, _pending: usize) -> bool {
			self.asked.fetch_add(1, Ordering::SeqCst);
			self.allow.load(Ordering::SeqCst)
		}
	}

	#[tokio::test]
	async fn delegate_veto_keeps_items_queued() {
		let sender = Arc::new(MockSender::new());
		let delegate = Arc::new(VetoDelegate {
			allow: AtomicBool::new(false),
			asked: AtomicUsize::new(0),
		});
		let handle: Arc<dyn FlushDelegate> = delegate.clone();
		let weak = Arc::downgrade(&handle);
		let processor = processor_with(sender.clone(), Some(weak));

		processor.enqueue(event_item("held")).await.unwrap();
		processor.flush().await.unwrap();

		assert_eq!(processor.queue_len().await, 1);
		assert!(sender.sent_events.lock().await.is_empty());
		assert_eq!(delegate.asked.load(Ordering::SeqCst), 1);

		// Permission granted on a later attempt releases the queue.
		delegate.allow.store(true, Ordering::SeqCst);
		processor.flush().await.unwrap();
		assert_eq!(processor.queue_len().await, 0);
		assert_eq!(sender.sent_events.lock().await.len(), 1);
	}

	#[tokio::test]
	async fn dropped_delegate_does_not_block_flush() {
		let sender = Arc::new(MockSender::new());
		let delegate: Arc<dyn FlushDelegate> = Arc::new(VetoDelegate {
			allow: AtomicBool::new(false),
			asked: AtomicUsize::new(0),
		});
		let weak = Arc::downgrade(&delegate);
		drop(delegate);
		let processor = processor_with(sender.clone(), Some(weak));

		processor.enqueue(event_item("sent")).await.unwrap();
		processor.flush().await.unwrap();

		assert_eq!(sender.sent_events.lock().await.len(), 1);
	}

	#[tokio::test]
	async fn clear_discards_without_sending() {
		let sender = Arc::new(MockSender::new());
		let processor = processor_with(sender.clone(), None);

		processor.enqueue(event_item("a")).await.unwrap();
		processor.enqueue(event_item("b")).await.unwrap();

		assert_eq!(processor.clear().await, 2);
		assert_eq!(processor.queue_len().await, 0);
		assert!(sender.sent_events.lock().await.is_empty());
	}

	#[tokio::test]
	async fn background_run_flushes_on_notify() {
		let sender = Arc::new(MockSender::new());
		let config = BatchConfig {
			max_batch_size: 2,
			flush_interval: Duration::from_secs(600),
			max_queue_size: 100,
		};
		let processor = Arc::new(BatchProcessor::new(config, sender.clone(), None));

		let runner = {
			let processor = processor.clone();
			tokio::spawn(async move { processor.run().await })
		};

		// Reaching max_batch_size wakes the run loop.
		processor.enqueue(event_item("a")).await.unwrap();
		processor.enqueue(event_item("b")).await.unwrap();

		tokio::time::timeout(Duration::from_secs(5), async {
			loop {
				if !sender.sent_events.lock().await.is_empty() {
					break;
				}
				tokio::time::sleep(Duration::from_millis(10)).await;
			}
		})
		.await
		.expect("batch was never flushed");

		processor.shutdown();
		runner.await.unwrap();
	}
}
