//! Order types for the fulfillment system.
//!
//! This module defines the order record tracked through the fulfillment
//! lifecycle, its status enumeration, and the result types produced when
//! status changes are applied to one or many orders.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// A customer purchase record tracked through the fulfillment lifecycle.
///
/// Orders are created by the intake process in either `Validated` or
/// `Exception` state and are afterwards mutated only through the status
/// transition engine.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Order {
	/// Unique identifier assigned at intake.
	#[serde(rename = "order_id")]
	pub id: String,
	/// Current status of the order.
	pub status: OrderStatus,
	/// Timestamp (unix seconds) when this order was created.
	pub created_at: u64,
	/// Timestamp (unix seconds) when this order was last updated.
	pub updated_at: u64,
	/// Attribution tag of the component that last wrote this order.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub updated_by: Option<String>,
	/// Write counter, incremented on every persisted change.
	#[serde(default)]
	pub revision: u64,
	/// Customer contact details, carried through unchanged.
	#[serde(default)]
	pub customer: Customer,
	/// Shipping address. The `state` field drives region batching.
	#[serde(default)]
	pub address: ShippingAddress,
	/// Line items of the order.
	#[serde(default, rename = "items")]
	pub line_items: Vec<LineItem>,
	/// Payment summary.
	#[serde(default)]
	pub payment: PaymentSummary,
	/// Findings recorded at intake, including duplicate detection.
	#[serde(default)]
	pub validation: IntakeReport,
	/// Latest rule-based analysis of the exception, if one was requested.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub analysis: Option<ExceptionAnalysis>,
	/// Exception resolution record, present once an exception was resolved.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub resolution: Option<ExceptionResolution>,
}

impl Order {
	/// Returns the region used for batching, if the address carries one.
	///
	/// Surrounding whitespace is trimmed, so `" CA"` and `"CA"` are the same
	/// region and a blank state is none.
	pub fn region(&self) -> Option<&str> {
		self.address
			.state
			.as_deref()
			.map(str::trim)
			.filter(|s| !s.is_empty())
	}
}

/// Customer contact details.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Customer {
	#[serde(default)]
	pub name: Option<String>,
	#[serde(default)]
	pub email: Option<String>,
	#[serde(default)]
	pub phone: Option<String>,
}

/// Shipping address of an order.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ShippingAddress {
	#[serde(default)]
	pub street: Option<String>,
	#[serde(default)]
	pub city: Option<String>,
	/// State or region code, e.g. "CA".
	#[serde(default)]
	pub state: Option<String>,
	#[serde(default)]
	pub zip_code: Option<String>,
	#[serde(default)]
	pub country: Option<String>,
}

/// A single line of an order.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LineItem {
	/// Product identifier (SKU). Items without one are ignored by product batching.
	#[serde(default)]
	pub sku: Option<String>,
	/// Human readable product name.
	#[serde(default)]
	pub name: Option<String>,
	#[serde(default)]
	pub quantity: u32,
	#[serde(default)]
	pub price: f64,
}

/// Payment summary of an order.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct PaymentSummary {
	#[serde(default)]
	pub method: Option<String>,
	#[serde(default)]
	pub status: Option<String>,
	#[serde(default)]
	pub amount: f64,
}

/// Record written when an order leaves the exception state through manual resolution.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ExceptionResolution {
	pub notes: String,
	pub resolved_at: u64,
	pub resolved_by: String,
}

/// Errors and warnings produced by intake validation.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct IntakeReport {
	#[serde(default)]
	pub errors: Vec<String>,
	#[serde(default)]
	pub warnings: Vec<String>,
}

/// Area an exception falls into.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ExceptionCategory {
	Data,
	Address,
	Payment,
	Other,
}

/// How urgently an exception needs an operator.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ExceptionPriority {
	High,
	Medium,
	Low,
}

/// Operator guidance for an order stuck in `exception`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ExceptionAnalysis {
	pub category: ExceptionCategory,
	pub priority: ExceptionPriority,
	pub root_cause: String,
	pub resolution_steps: Vec<String>,
	pub customer_message: String,
	pub suggested_action: String,
	pub analyzed_at: u64,
}

/// An order as submitted by the intake process, before an identifier is assigned.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewOrder {
	/// Outcome of intake validation: `Validated` or `Exception`.
	pub status: OrderStatus,
	#[serde(default)]
	pub customer: Customer,
	#[serde(default)]
	pub address: ShippingAddress,
	#[serde(default, rename = "items")]
	pub line_items: Vec<LineItem>,
	#[serde(default)]
	pub payment: PaymentSummary,
	#[serde(default)]
	pub validation: IntakeReport,
}

/// Status of an order in the fulfillment lifecycle.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "lowercase")]
pub enum OrderStatus {
	/// Order passed intake validation and is eligible for batching.
	Validated,
	/// Payment is being processed.
	Processing,
	/// Payment has been captured.
	Paid,
	/// Items are being picked from the warehouse.
	Picking,
	/// Items have been packed.
	Packed,
	/// Order has left the warehouse.
	Shipped,
	/// Order reached the customer.
	Delivered,
	/// Order needs manual intervention.
	Exception,
}

impl OrderStatus {
	/// All statuses in lifecycle order.
	pub const ALL: [OrderStatus; 8] = [
		OrderStatus::Validated,
		OrderStatus::Processing,
		OrderStatus::Paid,
		OrderStatus::Picking,
		OrderStatus::Packed,
		OrderStatus::Shipped,
		OrderStatus::Delivered,
		OrderStatus::Exception,
	];

	/// Returns the wire representation of the status.
	pub fn as_str(&self) -> &'static str {
		match self {
			OrderStatus::Validated => "validated",
			OrderStatus::Processing => "processing",
			OrderStatus::Paid => "paid",
			OrderStatus::Picking => "picking",
			OrderStatus::Packed => "packed",
			OrderStatus::Shipped => "shipped",
			OrderStatus::Delivered => "delivered",
			OrderStatus::Exception => "exception",
		}
	}
}

impl fmt::Display for OrderStatus {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(self.as_str())
	}
}

impl FromStr for OrderStatus {
	type Err = String;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		OrderStatus::ALL
			.into_iter()
			.find(|status| status.as_str() == s)
			.ok_or_else(|| format!("Unknown order status: {}", s))
	}
}

/// Result of a committed single-order status change.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TransitionOutcome {
	pub order_id: String,
	pub previous_status: OrderStatus,
	#[serde(rename = "status")]
	pub new_status: OrderStatus,
	/// Revision of the order after the write.
	pub revision: u64,
}

/// Per-member result of a bulk status application.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct OrderResult {
	pub order_id: String,
	pub success: bool,
	/// Machine readable error code when the member failed.
	#[serde(skip_serializing_if = "Option::is_none")]
	pub error_code: Option<String>,
	/// Human readable error when the member failed.
	#[serde(skip_serializing_if = "Option::is_none")]
	pub error: Option<String>,
}

/// Aggregate result of applying one status to many orders.
///
/// `results` is ordered like the input identifiers.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct BulkResult {
	pub total: usize,
	pub succeeded: usize,
	pub failed: usize,
	pub results: Vec<OrderResult>,
}

impl BulkResult {
	/// Appends a member result and updates the counters.
	pub fn push(&mut self, result: OrderResult) {
		self.total += 1;
		if result.success {
			self.succeeded += 1;
		} else {
			self.failed += 1;
		}
		self.results.push(result);
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_status_round_trips_through_str() {
		for status in OrderStatus::ALL {
			assert_eq!(status.as_str().parse::<OrderStatus>().unwrap(), status);
		}
		assert!("completed".parse::<OrderStatus>().is_err());
	}

	#[test]
	fn test_order_deserializes_document_shape() {
		let json = serde_json::json!({
			"order_id": "ORD-1",
			"status": "validated",
			"created_at": 10,
			"updated_at": 10,
			"address": { "state": "CA" },
			"items": [{ "sku": "SKU-1", "name": "Widget", "quantity": 2, "price": 9.5 }]
		});
		let order: Order = serde_json::from_value(json).unwrap();
		assert_eq!(order.id, "ORD-1");
		assert_eq!(order.region(), Some("CA"));
		assert_eq!(order.revision, 0);
		assert_eq!(order.line_items[0].sku.as_deref(), Some("SKU-1"));
	}

	#[test]
	fn test_region_is_trimmed() {
		let order: Order = serde_json::from_value(serde_json::json!({
			"order_id": "ORD-3",
			"status": "validated",
			"created_at": 0,
			"updated_at": 0,
			"address": { "state": " CA " }
		}))
		.unwrap();
		assert_eq!(order.region(), Some("CA"));
	}

	#[test]
	fn test_blank_region_is_none() {
		let order: Order = serde_json::from_value(serde_json::json!({
			"order_id": "ORD-2",
			"status": "validated",
			"created_at": 0,
			"updated_at": 0,
			"address": { "state": "  " }
		}))
		.unwrap();
		assert_eq!(order.region(), None);
	}

	#[test]
	fn test_bulk_result_counts() {
		let mut result = BulkResult::default();
		result.push(OrderResult {
			order_id: "a".into(),
			success: true,
			error_code: None,
			error: None,
		});
		result.push(OrderResult {
			order_id: "b".into(),
			success: false,
			error_code: Some("ORDER_NOT_FOUND".into()),
			error: Some("missing".into()),
		});
		assert_eq!((result.total, result.succeeded, result.failed), (2, 1, 1));
		assert_eq!(result.results[1].order_id, "b");
	}
}
