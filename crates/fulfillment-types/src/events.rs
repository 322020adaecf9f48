//! Event types for inter-service communication.
//!
//! Two kinds of events live here: in-process events broadcast on the event
//! bus so observers can react to state changes, and notification requests
//! handed to the outbound notification sink for customer communication.

use crate::{BatchKind, OrderStatus};
use serde::{Deserialize, Serialize};

/// Main event type encompassing all in-process fulfillment events.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum FulfillmentEvent {
	/// Events from the order lifecycle.
	Order(OrderEvent),
	/// Events from the batch lifecycle.
	Batch(BatchEvent),
}

/// Events related to order state.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum OrderEvent {
	/// A new order has been registered by intake.
	Registered { order_id: String, status: OrderStatus },
	/// An order status change has been committed.
	StatusChanged {
		order_id: String,
		from: OrderStatus,
		to: OrderStatus,
	},
	/// An exception order was resolved back into the pipeline.
	ExceptionResolved { order_id: String },
}

/// Events related to batches.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum BatchEvent {
	/// A batch has been persisted.
	Created {
		batch_id: String,
		kind: BatchKind,
		order_count: usize,
	},
}

/// Request for customer communication about an order.
///
/// Published fire-and-forget to the notification sink; the sink decides how
/// (or whether) the customer is contacted.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct NotificationRequest {
	pub order_id: String,
	/// Event name, the wire form of the target status (e.g. "shipped").
	pub event: String,
	/// Unix seconds when the request was produced.
	pub timestamp: u64,
	/// Attribution tag of the producing service.
	#[serde(rename = "agent")]
	pub origin: String,
}

impl NotificationRequest {
	pub fn for_status(order_id: &str, status: OrderStatus, timestamp: u64, origin: &str) -> Self {
		Self {
			order_id: order_id.to_string(),
			event: status.as_str().to_string(),
			timestamp,
			origin: origin.to_string(),
		}
	}
}
