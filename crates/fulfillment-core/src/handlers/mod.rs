//! Handlers for order intake, exception resolution and batch lifecycle.
//!
//! Each handler owns one slice of the write path and goes through the order
//! state machine for anything that changes an order.

pub mod batch;
pub mod order;

pub use batch::{BatchError, BatchHandler};
pub use order::{OrderError, OrderHandler};
