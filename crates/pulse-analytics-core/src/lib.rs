// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Core types for the Pulse product analytics SDK.
//!
//! This crate holds the transport-agnostic data model shared by the SDK
//! client (and, in principle, a server ingesting its payloads):
//!
//! - `token` - Project token validation and redaction
//! - `value` - Typed property values and property mappings
//! - `event` - Immutable event records
//! - `profile` - Profile-mutation operations (set/increment/append/...)

pub mod event;
pub mod profile;
pub mod token;
pub mod value;

pub use event::{Event, EventError};
pub use profile::{ProfileOperation, ProfileUpdate};
pub use token::{ProjectToken, TokenError};
pub use value::{Properties, PropertyError, PropertyValue};
