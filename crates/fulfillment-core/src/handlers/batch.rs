//! Batch handler for promoting candidates into persisted batches.
//!
//! A batch freezes its member list at creation. Applying a status to a batch
//! fans out to the members through the state machine; the batch record
//! itself is never rewritten.

use crate::engine::event_bus::EventBus;
use crate::state::OrderStateMachine;
use fulfillment_storage::{StorageError, StorageService};
use fulfillment_types::{
	current_timestamp, truncate_id, Batch, BatchDescriptor, BatchEvent, BatchStatus, BulkResult,
	FulfillmentEvent, IdGenerator, IdKind, OrderStatus, StorageKey,
};
use std::sync::Arc;
use thiserror::Error;
use tracing::instrument;

/// Errors that can occur while creating or reading batches.
#[derive(Debug, Error)]
pub enum BatchError {
	#[error("Batch not found: {0}")]
	NotFound(String),
	#[error("Unknown member orders: {}", .0.join(", "))]
	UnknownOrders(Vec<String>),
	#[error("Storage error: {0}")]
	Storage(#[from] StorageError),
}

impl BatchError {
	pub fn code(&self) -> &'static str {
		match self {
			BatchError::NotFound(_) => "BATCH_NOT_FOUND",
			BatchError::UnknownOrders(_) => "UNKNOWN_ORDERS",
			BatchError::Storage(e) if e.is_unavailable() => "STORAGE_UNAVAILABLE",
			BatchError::Storage(_) => "STORAGE_ERROR",
		}
	}

	pub fn is_retryable(&self) -> bool {
		matches!(self, BatchError::Storage(e) if e.is_unavailable())
	}
}

/// Handler for the batch lifecycle.
pub struct BatchHandler {
	storage: Arc<StorageService>,
	state_machine: Arc<OrderStateMachine>,
	event_bus: EventBus,
	ids: Arc<IdGenerator>,
}

impl BatchHandler {
	pub fn new(
		storage: Arc<StorageService>,
		state_machine: Arc<OrderStateMachine>,
		event_bus: EventBus,
		ids: Arc<IdGenerator>,
	) -> Self {
		Self {
			storage,
			state_machine,
			event_bus,
			ids,
		}
	}

	/// Persists a new active batch over the descriptor's member ids.
	///
	/// Every member must exist at creation time. An empty member list is
	/// accepted; minimum sizes only apply to suggestions.
	pub async fn create(&self, descriptor: BatchDescriptor) -> Result<Batch, BatchError> {
		let mut unknown = Vec::new();
		for order_id in &descriptor.order_ids {
			if !self
				.storage
				.exists(StorageKey::Orders.as_str(), order_id)
				.await?
			{
				unknown.push(order_id.clone());
			}
		}
		if !unknown.is_empty() {
			return Err(BatchError::UnknownOrders(unknown));
		}

		let batch = Batch {
			id: self.ids.next_id(IdKind::Batch),
			name: descriptor.name,
			description: descriptor.description,
			kind: descriptor.kind,
			order_count: descriptor.order_ids.len(),
			order_ids: descriptor.order_ids,
			status: BatchStatus::Active,
			created_at: current_timestamp(),
			created_by: self.state_machine.agent().to_string(),
		};
		self.storage
			.store(StorageKey::Batches.as_str(), &batch.id, &batch)
			.await?;

		tracing::info!(
			batch_id = %truncate_id(&batch.id),
			kind = %batch.kind,
			order_count = batch.order_count,
			"Created batch"
		);
		self.event_bus
			.publish(FulfillmentEvent::Batch(BatchEvent::Created {
				batch_id: batch.id.clone(),
				kind: batch.kind,
				order_count: batch.order_count,
			}))
			.ok();

		Ok(batch)
	}

	pub async fn get(&self, batch_id: &str) -> Result<Batch, BatchError> {
		self.storage
			.retrieve(StorageKey::Batches.as_str(), batch_id)
			.await
			.map_err(|e| match e {
				StorageError::NotFound => BatchError::NotFound(batch_id.to_string()),
				other => BatchError::Storage(other),
			})
	}

	/// Applies `new_status` to every member of a batch.
	///
	/// Members that moved on since the batch was created simply fail
	/// individually in the result.
	#[instrument(skip_all, fields(batch_id = %truncate_id(batch_id), to = %new_status))]
	pub async fn bulk_apply_status(
		&self,
		batch_id: &str,
		new_status: OrderStatus,
	) -> Result<BulkResult, BatchError> {
		let batch = self.get(batch_id).await?;
		let result = self
			.state_machine
			.bulk_apply(&batch.order_ids, new_status)
			.await;

		tracing::info!(
			succeeded = result.succeeded,
			failed = result.failed,
			"Applied status to batch"
		);
		Ok(result)
	}
}
