// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Flush delegation.
//!
//! A host application can install a [`FlushDelegate`] to gate uploads, for
//! example to suppress flushing on a metered connection. The tracker holds
//! the delegate by [`Weak`] reference only: the host owns it, and a dropped
//! delegate never blocks flushing.
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//! use pulse_analytics::FlushDelegate;
//!
//! struct WifiOnly {
//!     on_wifi: std::sync::atomic::AtomicBool,
//! }
//!
//! impl FlushDelegate for WifiOnly {
//!     fn should_flush(&self, _pending: usize) -> bool {
//!         self.on_wifi.load(std::sync::atomic::Ordering::Relaxed)
//!     }
//! }
//!
//! let delegate: Arc<dyn FlushDelegate> = Arc::new(WifiOnly {
//!     on_wifi: std::sync::atomic::AtomicBool::new(true),
//! });
//! let weak = Arc::downgrade(&delegate);
//! # let _ = weak;
//! ```

use std::sync::Weak;

/// Capability for vetoing a flush attempt.
///
/// `should_flush` is consulted before every flush, whatever the trigger
/// (interval, batch size, explicit call, background transition, shutdown).
/// Returning `false` suppresses that attempt; queued items are kept and the
/// next trigger asks again.
pub trait FlushDelegate: Send + Sync + 'static {
	/// Returns whether a flush of `pending` queued items may proceed.
	fn should_flush(&self, pending: usize) -> bool;
}

/// Weak handle to an installed delegate.
pub type WeakFlushDelegate = Weak<dyn FlushDelegate>;

/// Resolves the delegate decision: an absent or dropped delegate permits
/// the flush.
pub(crate) fn flush_permitted(delegate: &Option<WeakFlushDelegate>, pending: usize) -> bool {
	match delegate {
		Some(weak) => match weak.upgrade() {
			Some(delegate) => delegate.should_flush(pending),
			None => true,
		},
		None => true,
	}
}
