//! Identifier generation for orders and batches.
//!
//! Identifiers are time-biased (`ORD-20261019143501123-000042`): a UTC
//! millisecond timestamp followed by a process-wide sequence number, so two
//! identifiers generated in the same millisecond never collide.

use chrono::Utc;
use std::sync::atomic::{AtomicU64, Ordering};

/// Kind of entity an identifier is generated for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IdKind {
	Order,
	Batch,
}

impl IdKind {
	fn prefix(&self) -> &'static str {
		match self {
			IdKind::Order => "ORD",
			IdKind::Batch => "BATCH",
		}
	}
}

/// Generator of unique, time-ordered string identifiers.
///
/// Safe to share across tasks; uniqueness holds for concurrent callers of
/// the same generator.
#[derive(Debug, Default)]
pub struct IdGenerator {
	sequence: AtomicU64,
}

impl IdGenerator {
	pub fn new() -> Self {
		Self::default()
	}

	/// Produces the next identifier for the given kind.
	pub fn next_id(&self, kind: IdKind) -> String {
		let seq = self.sequence.fetch_add(1, Ordering::Relaxed) % 1_000_000;
		format!(
			"{}-{}-{:06}",
			kind.prefix(),
			Utc::now().format("%Y%m%d%H%M%S%3f"),
			seq
		)
	}
}
