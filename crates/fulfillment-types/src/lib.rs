//! Common types module for the fulfillment system.
//!
//! This module defines the core data types shared by every fulfillment
//! crate: orders and their statuses, batches and batch candidates, events,
//! storage keys, API bodies and configuration validation.

/// API types for HTTP endpoints and request/response structures.
pub mod api;
/// Batch records and candidate batch descriptors.
pub mod batch;
/// Event types for inter-service communication and notifications.
pub mod events;
/// Order records, statuses and transition results.
pub mod order;
/// Registry trait for named, pluggable implementations.
pub mod registry;
/// Storage keys and document queries.
pub mod storage;
/// Utility functions: identifiers, timestamps, formatting.
pub mod utils;
/// Configuration validation types for ensuring type-safe configurations.
pub mod validation;

// Re-export all types for convenient access
pub use api::*;
pub use batch::*;
pub use events::*;
pub use order::*;
pub use registry::*;
pub use storage::*;
pub use utils::{current_timestamp, truncate_id, IdGenerator, IdKind};
pub use validation::*;
