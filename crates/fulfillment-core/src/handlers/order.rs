//! Order handler for intake registration and exception resolution.
//!
//! Intake hands over orders that already passed (or failed) validation; the
//! handler flags likely duplicates, assigns identifiers and persists them.
//! Orders that landed in `exception` can be analyzed and returned to
//! `validated` by an operator.

use crate::engine::event_bus::EventBus;
use crate::state::{analyze_errors, OrderStateMachine, TransitionError};
use fulfillment_types::{
	current_timestamp, truncate_id, Customer, ExceptionAnalysis, ExceptionResolution,
	FulfillmentEvent, IdGenerator, IdKind, NewOrder, Order, OrderEvent, OrderStatus,
	PaymentSummary,
};
use std::sync::Arc;
use thiserror::Error;
use tracing::instrument;

/// Errors that can occur during order intake and resolution.
#[derive(Debug, Error)]
pub enum OrderError {
	#[error("Orders must be registered as validated or exception, got {0}")]
	InvalidInitialStatus(OrderStatus),
	#[error(transparent)]
	State(#[from] TransitionError),
}

impl OrderError {
	pub fn code(&self) -> &'static str {
		match self {
			OrderError::InvalidInitialStatus(_) => "INVALID_STATUS",
			OrderError::State(e) => e.code(),
		}
	}
}

/// Orders from the same customer for the same amount within this many
/// seconds are flagged as duplicates.
pub const DUPLICATE_WINDOW_SECS: u64 = 24 * 60 * 60;

/// Handler for order intake and exception resolution.
pub struct OrderHandler {
	state_machine: Arc<OrderStateMachine>,
	event_bus: EventBus,
	ids: Arc<IdGenerator>,
}

impl OrderHandler {
	pub fn new(
		state_machine: Arc<OrderStateMachine>,
		event_bus: EventBus,
		ids: Arc<IdGenerator>,
	) -> Self {
		Self {
			state_machine,
			event_bus,
			ids,
		}
	}

	/// Assigns an identifier to a new order and persists it.
	///
	/// An order matching a recent one by customer email and payment amount
	/// is stored in `exception` with a duplicate error on its intake report.
	pub async fn register(&self, new_order: NewOrder) -> Result<Order, OrderError> {
		if !matches!(
			new_order.status,
			OrderStatus::Validated | OrderStatus::Exception
		) {
			return Err(OrderError::InvalidInitialStatus(new_order.status));
		}

		let now = current_timestamp();
		let mut status = new_order.status;
		let mut validation = new_order.validation;
		if let Some(duplicate_of) = self
			.find_duplicate(&new_order.customer, &new_order.payment, now)
			.await
		{
			tracing::warn!(duplicate_of = %truncate_id(&duplicate_of), "Potential duplicate order");
			validation
				.errors
				.push(format!("Potential duplicate order detected ({})", duplicate_of));
			status = OrderStatus::Exception;
		}

		let order = Order {
			id: self.ids.next_id(IdKind::Order),
			status,
			created_at: now,
			updated_at: now,
			updated_by: Some(self.state_machine.agent().to_string()),
			revision: 0,
			customer: new_order.customer,
			address: new_order.address,
			line_items: new_order.line_items,
			payment: new_order.payment,
			validation,
			analysis: None,
			resolution: None,
		};
		self.state_machine.store_order(&order).await?;

		tracing::info!(
			order_id = %truncate_id(&order.id),
			status = %order.status,
			"Registered order"
		);
		self.event_bus
			.publish(FulfillmentEvent::Order(OrderEvent::Registered {
				order_id: order.id.clone(),
				status: order.status,
			}))
			.ok();

		Ok(order)
	}

	/// Id of a stored order placed by the same email for the same amount
	/// within the duplicate window.
	///
	/// Lookup failures are logged and treated as "no duplicate".
	async fn find_duplicate(
		&self,
		customer: &Customer,
		payment: &PaymentSummary,
		now: u64,
	) -> Option<String> {
		let email = customer.email.as_deref().filter(|e| !e.is_empty())?;
		let candidates = match self.state_machine.orders_with_email(email).await {
			Ok(orders) => orders,
			Err(e) => {
				tracing::warn!(error = %e, "Duplicate check failed");
				return None;
			},
		};

		candidates
			.into_iter()
			.filter(|o| o.payment.amount == payment.amount)
			.filter(|o| now.saturating_sub(o.created_at) < DUPLICATE_WINDOW_SECS)
			.map(|o| o.id)
			.next()
	}

	/// Classifies the order's exception from its intake errors and stores
	/// the result on the order. Any later analysis replaces it.
	#[instrument(skip_all, fields(order_id = %truncate_id(order_id)))]
	pub async fn analyze_exception(&self, order_id: &str) -> Result<ExceptionAnalysis, OrderError> {
		let mut order = self.state_machine.get_order(order_id).await?;
		let analysis = analyze_errors(&order.validation.errors, current_timestamp());

		order.analysis = Some(analysis.clone());
		self.state_machine.persist(&mut order).await?;

		tracing::info!(category = ?analysis.category, priority = ?analysis.priority, "Analyzed order exception");
		Ok(analysis)
	}

	/// Returns an exception order to `validated`, recording who resolved it.
	///
	/// Only orders currently in `exception` can be resolved. No customer
	/// notification is sent.
	#[instrument(skip_all, fields(order_id = %truncate_id(order_id)))]
	pub async fn resolve_exception(&self, order_id: &str, notes: String) -> Result<Order, OrderError> {
		let mut order = self.state_machine.get_order(order_id).await?;
		if order.status != OrderStatus::Exception {
			return Err(TransitionError::InvalidTransition {
				from: order.status,
				to: OrderStatus::Validated,
			}
			.into());
		}

		order.status = OrderStatus::Validated;
		order.resolution = Some(ExceptionResolution {
			notes,
			resolved_at: current_timestamp(),
			resolved_by: self.state_machine.agent().to_string(),
		});
		self.state_machine.persist(&mut order).await?;

		tracing::info!("Resolved order exception");
		self.event_bus
			.publish(FulfillmentEvent::Order(OrderEvent::ExceptionResolved {
				order_id: order.id.clone(),
			}))
			.ok();

		Ok(order)
	}
}
