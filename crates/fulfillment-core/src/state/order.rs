//! Order state machine implementation.
//!
//! Applies status changes to stored orders, enforcing the transition policy.
//! Each committed change bumps the order revision, is announced on the event
//! bus and, for statuses customers care about, queues a notification.

use crate::engine::event_bus::EventBus;
use crate::state::TransitionPolicy;
use fulfillment_notify::NotificationService;
use fulfillment_storage::{StorageError, StorageService};
use fulfillment_types::{
	current_timestamp, truncate_id, BulkResult, FulfillmentEvent, NotificationRequest, Order,
	OrderEvent, OrderResult, OrderStatus, Query, SortOrder, StorageKey, TransitionOutcome,
};
use std::collections::HashSet;
use std::sync::Arc;
use thiserror::Error;
use tracing::instrument;

/// Errors that can occur while reading or changing an order.
#[derive(Debug, Error)]
pub enum TransitionError {
	#[error("Order not found: {0}")]
	NotFound(String),
	#[error("Invalid status transition from {from} to {to}")]
	InvalidTransition { from: OrderStatus, to: OrderStatus },
	#[error("Order revision is {actual}, expected {expected}")]
	Conflict { expected: u64, actual: u64 },
	#[error("Storage error: {0}")]
	Storage(#[from] StorageError),
}

impl TransitionError {
	/// Machine readable code reported to callers.
	pub fn code(&self) -> &'static str {
		match self {
			TransitionError::NotFound(_) => "ORDER_NOT_FOUND",
			TransitionError::InvalidTransition { .. } => "INVALID_TRANSITION",
			TransitionError::Conflict { .. } => "REVISION_CONFLICT",
			TransitionError::Storage(e) if e.is_unavailable() => "STORAGE_UNAVAILABLE",
			TransitionError::Storage(_) => "STORAGE_ERROR",
		}
	}

	/// Whether retrying the same call later may succeed.
	pub fn is_retryable(&self) -> bool {
		match self {
			TransitionError::Conflict { .. } => true,
			TransitionError::Storage(e) => e.is_unavailable(),
			_ => false,
		}
	}

	fn from_storage(order_id: &str, err: StorageError) -> Self {
		match err {
			StorageError::NotFound => TransitionError::NotFound(order_id.to_string()),
			other => TransitionError::Storage(other),
		}
	}
}

/// Manages order status transitions and persistence.
pub struct OrderStateMachine {
	storage: Arc<StorageService>,
	notifications: Arc<NotificationService>,
	event_bus: EventBus,
	/// Attribution tag written to `updated_by` and notification requests.
	agent: String,
	notify_on: HashSet<OrderStatus>,
}

impl OrderStateMachine {
	pub fn new(
		storage: Arc<StorageService>,
		notifications: Arc<NotificationService>,
		event_bus: EventBus,
		agent: impl Into<String>,
		notify_on: impl IntoIterator<Item = OrderStatus>,
	) -> Self {
		Self {
			storage,
			notifications,
			event_bus,
			agent: agent.into(),
			notify_on: notify_on.into_iter().collect(),
		}
	}

	pub fn agent(&self) -> &str {
		&self.agent
	}

	pub async fn get_order(&self, order_id: &str) -> Result<Order, TransitionError> {
		self.storage
			.retrieve(StorageKey::Orders.as_str(), order_id)
			.await
			.map_err(|e| TransitionError::from_storage(order_id, e))
	}

	/// Persists a new order record as is.
	pub async fn store_order(&self, order: &Order) -> Result<(), TransitionError> {
		self.storage
			.store(StorageKey::Orders.as_str(), &order.id, order)
			.await?;
		Ok(())
	}

	/// Lists orders newest first, optionally restricted to one status.
	pub async fn list_orders(
		&self,
		status: Option<OrderStatus>,
		limit: usize,
	) -> Result<Vec<Order>, TransitionError> {
		let orders = match status {
			Some(status) => {
				let query = Query::field_equals("status", status.as_str())
					.order_by("created_at", SortOrder::Descending)
					.limit(limit);
				self.storage
					.query(StorageKey::Orders.as_str(), &query)
					.await?
			},
			None => {
				let mut orders: Vec<Order> = self
					.storage
					.retrieve_all(StorageKey::Orders.as_str())
					.await?;
				orders.sort_by(|a, b| b.created_at.cmp(&a.created_at));
				orders.truncate(limit);
				orders
			},
		};
		Ok(orders)
	}

	/// Validated orders considered for batching, oldest first.
	///
	/// Oldest first keeps aged orders inside the window when more than
	/// `limit` orders are waiting.
	pub async fn working_set(&self, limit: usize) -> Result<Vec<Order>, TransitionError> {
		let query = Query::field_equals("status", OrderStatus::Validated.as_str())
			.order_by("created_at", SortOrder::Ascending)
			.limit(limit);
		Ok(self
			.storage
			.query(StorageKey::Orders.as_str(), &query)
			.await?)
	}

	/// Every stored order placed with this customer email.
	pub async fn orders_with_email(&self, email: &str) -> Result<Vec<Order>, TransitionError> {
		let query = Query::field_equals("customer.email", email);
		Ok(self
			.storage
			.query(StorageKey::Orders.as_str(), &query)
			.await?)
	}

	/// Writes back a modified order.
	///
	/// Stamps `updated_at` and `updated_by` and bumps the revision.
	pub(crate) async fn persist(&self, order: &mut Order) -> Result<(), TransitionError> {
		order.updated_at = current_timestamp();
		order.updated_by = Some(self.agent.clone());
		order.revision += 1;

		self.storage
			.update(StorageKey::Orders.as_str(), &order.id, order)
			.await
			.map_err(|e| TransitionError::from_storage(&order.id, e))
	}

	/// Moves one order to `new_status`.
	///
	/// With `expected_revision`, the change is refused when the stored order
	/// has been written since the caller read it. Writing the current status
	/// again succeeds and bumps the revision. It emits no `StatusChanged`
	/// event but still notifies when the status is in `notify_on`.
	#[instrument(skip_all, fields(order_id = %truncate_id(order_id), to = %new_status))]
	pub async fn apply_transition(
		&self,
		order_id: &str,
		new_status: OrderStatus,
		expected_revision: Option<u64>,
	) -> Result<TransitionOutcome, TransitionError> {
		let mut order = self.get_order(order_id).await?;

		if let Some(expected) = expected_revision {
			if order.revision != expected {
				return Err(TransitionError::Conflict {
					expected,
					actual: order.revision,
				});
			}
		}

		let previous = order.status;
		if !TransitionPolicy::is_allowed(previous, new_status) {
			tracing::debug!(from = %previous, "Rejected status transition");
			return Err(TransitionError::InvalidTransition {
				from: previous,
				to: new_status,
			});
		}

		order.status = new_status;
		self.persist(&mut order).await?;

		if previous != new_status {
			tracing::info!(from = %previous, revision = order.revision, "Order status changed");
			self.event_bus
				.publish(FulfillmentEvent::Order(OrderEvent::StatusChanged {
					order_id: order.id.clone(),
					from: previous,
					to: new_status,
				}))
				.ok();
		}

		if self.notify_on.contains(&new_status) {
			self.notifications.notify(NotificationRequest::for_status(
				&order.id,
				new_status,
				order.updated_at,
				&self.agent,
			));
		}

		Ok(TransitionOutcome {
			order_id: order.id,
			previous_status: previous,
			new_status,
			revision: order.revision,
		})
	}

	/// Applies `new_status` to each order in turn.
	///
	/// A failing member never stops the rest; results keep input order.
	pub async fn bulk_apply(&self, order_ids: &[String], new_status: OrderStatus) -> BulkResult {
		let mut result = BulkResult::default();

		for order_id in order_ids {
			let member = match self.apply_transition(order_id, new_status, None).await {
				Ok(_) => OrderResult {
					order_id: order_id.clone(),
					success: true,
					error_code: None,
					error: None,
				},
				Err(e) => {
					tracing::warn!(
						order_id = %truncate_id(order_id),
						to = %new_status,
						error = %e,
						"Bulk status change failed for order"
					);
					OrderResult {
						order_id: order_id.clone(),
						success: false,
						error_code: Some(e.code().to_string()),
						error: Some(e.to_string()),
					}
				},
			};
			result.push(member);
		}

		result
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::test_support::{harness, order_with_status, Harness};
	use std::time::Duration;

	#[tokio::test]
	async fn test_forward_transition_bumps_revision() {
		let Harness { state_machine, .. } = harness().await;
		let order = order_with_status("ORD-1", OrderStatus::Validated, 100);
		state_machine.store_order(&order).await.unwrap();

		let outcome = state_machine
			.apply_transition("ORD-1", OrderStatus::Processing, None)
			.await
			.unwrap();
		assert_eq!(outcome.previous_status, OrderStatus::Validated);
		assert_eq!(outcome.new_status, OrderStatus::Processing);
		assert_eq!(outcome.revision, 1);

		let stored = state_machine.get_order("ORD-1").await.unwrap();
		assert_eq!(stored.status, OrderStatus::Processing);
		assert_eq!(stored.updated_by.as_deref(), Some("test-fulfillment"));
		assert!(stored.updated_at >= order.updated_at);
	}

	#[tokio::test]
	async fn test_skipping_ahead_is_rejected() {
		let Harness { state_machine, .. } = harness().await;
		state_machine
			.store_order(&order_with_status("ORD-1", OrderStatus::Paid, 100))
			.await
			.unwrap();

		let err = state_machine
			.apply_transition("ORD-1", OrderStatus::Shipped, None)
			.await
			.unwrap_err();
		assert!(matches!(
			err,
			TransitionError::InvalidTransition {
				from: OrderStatus::Paid,
				to: OrderStatus::Shipped
			}
		));
		assert_eq!(err.code(), "INVALID_TRANSITION");

		let stored = state_machine.get_order("ORD-1").await.unwrap();
		assert_eq!(stored.status, OrderStatus::Paid);
		assert_eq!(stored.revision, 0);
	}

	#[tokio::test]
	async fn test_terminal_status_stays_put() {
		let Harness { state_machine, .. } = harness().await;
		state_machine
			.store_order(&order_with_status("ORD-1", OrderStatus::Delivered, 100))
			.await
			.unwrap();

		for status in OrderStatus::ALL {
			let result = state_machine.apply_transition("ORD-1", status, None).await;
			assert_eq!(result.is_ok(), status == OrderStatus::Delivered, "{}", status);
		}
	}

	#[tokio::test]
	async fn test_unknown_order() {
		let Harness { state_machine, .. } = harness().await;
		let err = state_machine
			.apply_transition("ORD-missing", OrderStatus::Paid, None)
			.await
			.unwrap_err();
		assert!(matches!(err, TransitionError::NotFound(id) if id == "ORD-missing"));
	}

	#[tokio::test]
	async fn test_stale_revision_conflicts() {
		let Harness { state_machine, .. } = harness().await;
		state_machine
			.store_order(&order_with_status("ORD-1", OrderStatus::Validated, 100))
			.await
			.unwrap();
		state_machine
			.apply_transition("ORD-1", OrderStatus::Processing, Some(0))
			.await
			.unwrap();

		let err = state_machine
			.apply_transition("ORD-1", OrderStatus::Paid, Some(0))
			.await
			.unwrap_err();
		assert!(matches!(err, TransitionError::Conflict { expected: 0, actual: 1 }));
		assert!(err.is_retryable());
	}

	#[tokio::test]
	async fn test_exception_notifies_once() {
		let Harness {
			state_machine,
			notifications,
			sink,
			..
		} = harness().await;
		state_machine
			.store_order(&order_with_status("ORD-1", OrderStatus::Processing, 100))
			.await
			.unwrap();

		state_machine
			.apply_transition("ORD-1", OrderStatus::Exception, None)
			.await
			.unwrap();
		notifications.shutdown().await;

		let published = sink.published();
		assert_eq!(published.len(), 1);
		assert_eq!(published[0].order_id, "ORD-1");
		assert_eq!(published[0].event, "exception");
		assert_eq!(published[0].origin, "test-fulfillment");
	}

	#[tokio::test]
	async fn test_same_status_write_notifies_without_event() {
		let Harness {
			state_machine,
			notifications,
			sink,
			event_bus,
			..
		} = harness().await;
		state_machine
			.store_order(&order_with_status("ORD-1", OrderStatus::Shipped, 100))
			.await
			.unwrap();
		let mut events = event_bus.subscribe();

		let outcome = state_machine
			.apply_transition("ORD-1", OrderStatus::Shipped, None)
			.await
			.unwrap();
		assert_eq!(outcome.revision, 1);
		assert_eq!(outcome.previous_status, OrderStatus::Shipped);
		notifications.shutdown().await;

		let published = sink.published();
		assert_eq!(published.len(), 1);
		assert_eq!(published[0].event, "shipped");
		assert!(events.try_recv().is_err());
	}

	#[tokio::test]
	async fn test_same_status_write_outside_notify_on_is_quiet() {
		let Harness {
			state_machine,
			notifications,
			sink,
			..
		} = harness().await;
		state_machine
			.store_order(&order_with_status("ORD-1", OrderStatus::Picking, 100))
			.await
			.unwrap();

		state_machine
			.apply_transition("ORD-1", OrderStatus::Picking, None)
			.await
			.unwrap();
		notifications.shutdown().await;

		assert!(sink.published().is_empty());
	}

	#[tokio::test]
	async fn test_status_change_is_broadcast() {
		let Harness {
			state_machine,
			event_bus,
			..
		} = harness().await;
		state_machine
			.store_order(&order_with_status("ORD-1", OrderStatus::Paid, 100))
			.await
			.unwrap();
		let mut events = event_bus.subscribe();

		state_machine
			.apply_transition("ORD-1", OrderStatus::Picking, None)
			.await
			.unwrap();

		match events.recv().await.unwrap() {
			FulfillmentEvent::Order(OrderEvent::StatusChanged { order_id, from, to }) => {
				assert_eq!(order_id, "ORD-1");
				assert_eq!(from, OrderStatus::Paid);
				assert_eq!(to, OrderStatus::Picking);
			},
			other => panic!("unexpected event: {:?}", other),
		}
	}

	#[tokio::test]
	async fn test_bulk_apply_isolates_failures() {
		let Harness {
			state_machine,
			notifications,
			sink,
			..
		} = harness().await;
		state_machine
			.store_order(&order_with_status("A", OrderStatus::Packed, 100))
			.await
			.unwrap();
		state_machine
			.store_order(&order_with_status("C", OrderStatus::Packed, 100))
			.await
			.unwrap();
		let ids = vec!["A".to_string(), "B".to_string(), "C".to_string()];

		let result = state_machine.bulk_apply(&ids, OrderStatus::Shipped).await;
		notifications.shutdown().await;

		assert_eq!((result.total, result.succeeded, result.failed), (3, 2, 1));
		let order: Vec<_> = result.results.iter().map(|r| r.order_id.as_str()).collect();
		assert_eq!(order, vec!["A", "B", "C"]);
		assert!(!result.results[1].success);
		assert_eq!(result.results[1].error_code.as_deref(), Some("ORDER_NOT_FOUND"));

		let mut notified: Vec<_> = sink.published().into_iter().map(|r| r.order_id).collect();
		notified.sort();
		assert_eq!(notified, vec!["A", "C"]);
	}

	#[tokio::test]
	async fn test_bulk_apply_leaves_rejected_members_untouched() {
		let Harness { state_machine, .. } = harness().await;
		state_machine
			.store_order(&order_with_status("A", OrderStatus::Validated, 100))
			.await
			.unwrap();
		state_machine
			.store_order(&order_with_status("B", OrderStatus::Picking, 100))
			.await
			.unwrap();
		let ids = vec!["A".to_string(), "B".to_string()];

		let result = state_machine.bulk_apply(&ids, OrderStatus::Paid).await;
		assert_eq!((result.succeeded, result.failed), (1, 1));
		assert_eq!(result.results[1].error_code.as_deref(), Some("INVALID_TRANSITION"));

		let rejected = state_machine.get_order("B").await.unwrap();
		assert_eq!(rejected.status, OrderStatus::Picking);
		assert_eq!(rejected.revision, 0);
		assert_eq!(rejected.updated_at, 100);
		assert_eq!(rejected.updated_by, None);

		let moved = state_machine.get_order("A").await.unwrap();
		assert_eq!(moved.status, OrderStatus::Paid);
		assert_eq!(moved.revision, 1);
	}

	#[tokio::test]
	async fn test_working_set_is_oldest_first() {
		let Harness { state_machine, .. } = harness().await;
		for (id, status, created) in [
			("ORD-1", OrderStatus::Validated, 300),
			("ORD-2", OrderStatus::Validated, 100),
			("ORD-3", OrderStatus::Paid, 50),
			("ORD-4", OrderStatus::Validated, 200),
		] {
			state_machine
				.store_order(&order_with_status(id, status, created))
				.await
				.unwrap();
		}

		let ids: Vec<_> = state_machine
			.working_set(2)
			.await
			.unwrap()
			.into_iter()
			.map(|o| o.id)
			.collect();
		assert_eq!(ids, vec!["ORD-2", "ORD-4"]);
	}

	#[tokio::test]
	async fn test_bulk_apply_empty() {
		let Harness { state_machine, .. } = harness().await;
		let result = state_machine.bulk_apply(&[], OrderStatus::Paid).await;
		assert_eq!(result, BulkResult::default());
	}

	#[tokio::test]
	async fn test_list_orders_newest_first() {
		let Harness { state_machine, .. } = harness().await;
		for (id, status, created) in [
			("ORD-1", OrderStatus::Validated, 100),
			("ORD-2", OrderStatus::Paid, 300),
			("ORD-3", OrderStatus::Validated, 200),
		] {
			state_machine
				.store_order(&order_with_status(id, status, created))
				.await
				.unwrap();
		}

		let validated = state_machine
			.list_orders(Some(OrderStatus::Validated), 10)
			.await
			.unwrap();
		let ids: Vec<_> = validated.iter().map(|o| o.id.as_str()).collect();
		assert_eq!(ids, vec!["ORD-3", "ORD-1"]);

		let all = state_machine.list_orders(None, 2).await.unwrap();
		let ids: Vec<_> = all.iter().map(|o| o.id.as_str()).collect();
		assert_eq!(ids, vec!["ORD-2", "ORD-3"]);
	}

	#[tokio::test(start_paused = true)]
	async fn test_storage_timeout_is_retryable() {
		let state_machine = crate::test_support::slow_state_machine(Duration::from_millis(50));

		let err = state_machine
			.apply_transition("ORD-1", OrderStatus::Paid, None)
			.await
			.unwrap_err();
		assert!(matches!(
			err,
			TransitionError::Storage(StorageError::Timeout { .. })
		));
		assert_eq!(err.code(), "STORAGE_UNAVAILABLE");
		assert!(err.is_retryable());
	}
}
