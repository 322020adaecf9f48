//! Utility functions shared across the fulfillment crates.

pub mod formatting;
pub mod helpers;
pub mod ids;

pub use formatting::truncate_id;
pub use helpers::current_timestamp;
pub use ids::{IdGenerator, IdKind};
