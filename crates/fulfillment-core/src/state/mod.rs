//! State management for orders.
//!
//! This module provides the transition policy that decides which status
//! changes are legal, and the state machine that applies them to stored
//! orders, plus the rules used to classify exceptions.

pub mod analysis;
pub mod order;
pub mod policy;

pub use analysis::analyze_errors;
pub use order::{OrderStateMachine, TransitionError};
pub use policy::TransitionPolicy;
