//! Batch types for grouping orders that are fulfilled together.
//!
//! A `BatchDescriptor` is the ephemeral candidate produced by a batching
//! strategy; a `Batch` is the persisted record created once an operator
//! promotes a descriptor.

use crate::Order;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Which heuristic (or operator) produced a batch.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "lowercase")]
pub enum BatchKind {
	Region,
	Urgency,
	Product,
	#[default]
	Manual,
}

impl fmt::Display for BatchKind {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		let s = match self {
			BatchKind::Region => "region",
			BatchKind::Urgency => "urgency",
			BatchKind::Product => "product",
			BatchKind::Manual => "manual",
		};
		f.write_str(s)
	}
}

/// Priority flag attached to a candidate batch.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum BatchPriority {
	High,
}

/// Candidate batch produced by a batching strategy.
///
/// Descriptors are recomputed on every suggestion request and are never
/// persisted until promoted through batch creation.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct BatchDescriptor {
	#[serde(rename = "type", default)]
	pub kind: BatchKind,
	pub name: String,
	#[serde(default)]
	pub description: String,
	/// Snapshot of the member orders at suggestion time.
	#[serde(default, skip_serializing_if = "Vec::is_empty")]
	pub orders: Vec<Order>,
	pub order_ids: Vec<String>,
	/// Estimated minutes saved by processing the members together.
	#[serde(rename = "savings_minutes", default)]
	pub savings_estimate: f64,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub priority: Option<BatchPriority>,
}

impl BatchDescriptor {
	/// Builds a descriptor from member orders, deriving the identifier list.
	pub fn from_orders(
		kind: BatchKind,
		name: impl Into<String>,
		description: impl Into<String>,
		orders: Vec<Order>,
		savings_estimate: f64,
		priority: Option<BatchPriority>,
	) -> Self {
		let order_ids = orders.iter().map(|o| o.id.clone()).collect();
		Self {
			kind,
			name: name.into(),
			description: description.into(),
			orders,
			order_ids,
			savings_estimate,
			priority,
		}
	}

	/// Number of member orders.
	pub fn member_count(&self) -> usize {
		self.order_ids.len()
	}

	pub fn is_high_priority(&self) -> bool {
		self.priority == Some(BatchPriority::High)
	}
}

/// Lifecycle status of a persisted batch.
///
/// Batches are recorded once and never closed, so `active` is the only
/// state written today.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum BatchStatus {
	Active,
}

/// A persisted group of orders intended to be processed together.
///
/// The member list is a snapshot taken at creation time; member orders keep
/// evolving independently afterwards.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Batch {
	#[serde(rename = "batch_id")]
	pub id: String,
	pub name: String,
	pub description: String,
	#[serde(rename = "type")]
	pub kind: BatchKind,
	pub order_ids: Vec<String>,
	/// Always equal to `order_ids.len()`.
	pub order_count: usize,
	pub status: BatchStatus,
	pub created_at: u64,
	pub created_by: String,
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_manual_descriptor_defaults() {
		let descriptor: BatchDescriptor = serde_json::from_value(serde_json::json!({
			"name": "Picked by hand",
			"order_ids": ["ORD-1", "ORD-2"]
		}))
		.unwrap();
		assert_eq!(descriptor.kind, BatchKind::Manual);
		assert_eq!(descriptor.member_count(), 2);
		assert!(descriptor.orders.is_empty());
		assert!(!descriptor.is_high_priority());
	}

	#[test]
	fn test_batch_serializes_wire_names() {
		let batch = Batch {
			id: "BATCH-1".into(),
			name: "CA Orders".into(),
			description: String::new(),
			kind: BatchKind::Region,
			order_ids: vec![],
			order_count: 0,
			status: BatchStatus::Active,
			created_at: 1,
			created_by: "fulfillment".into(),
		};
		let value = serde_json::to_value(&batch).unwrap();
		assert_eq!(value["batch_id"], "BATCH-1");
		assert_eq!(value["type"], "region");
		assert_eq!(value["status"], "active");
	}
}
