// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Product analytics Rust SDK for Pulse.
//!
//! This crate provides a client library for tracking user-behavior events
//! and mutating user profiles against the Pulse ingestion server. Events are
//! queued in memory and flushed in batches by a background task.
//!
//! # Features
//!
//! - **Event Tracking**: Named events with typed property mappings
//! - **Super-properties**: Properties merged into every tracked event
//! - **Identity**: `identify` attributes subsequent activity to one user
//! - **Profiles**: set/increment/append/charge operations per user
//! - **Batched Flush**: Interval- and size-triggered background uploads
//! - **Flush Delegation**: A host-owned delegate can veto any flush
//!
//! # Example
//!
//! ```ignore
//! use pulse_analytics::{Properties, Tracker};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let tracker = Tracker::builder()
//!         .token("a1b2c3d4e5f60718293a4b5c6d7e8f90")
//!         .build()
//!         .await?;
//!
//!     tracker.identify("user_123")?;
//!     tracker
//!         .track("signup_completed", Properties::new().insert("plan", "pro"))
//!         .await?;
//!
//!     let people = tracker.people();
//!     people.set_one("plan", "pro").await?;
//!     people.track_charge(49.99).await?;
//!
//!     tracker.shutdown().await?;
//!     Ok(())
//! }
//! ```

mod batch;
mod config;
mod delegate;
mod error;
mod people;
mod sender;
mod serialize;
mod tracker;

pub use batch::{BatchConfig, BatchProcessor, BatchSender, QueuedItem};
pub use config::{TrackerConfig, DEFAULT_SERVER_URL};
pub use delegate::{FlushDelegate, WeakFlushDelegate};
pub use error::{AnalyticsError, Result};
pub use people::People;
pub use serialize::{encode_events, encode_profiles, validate_record, MAX_PROPERTIES_SIZE};
pub use tracker::{Tracker, TrackerBuilder};

// Re-export core types for convenience
pub use pulse_analytics_core::{
	Event, EventError, ProfileOperation, ProfileUpdate, ProjectToken, Properties,
	PropertyError, PropertyValue, TokenError,
};
