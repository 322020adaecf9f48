//! Core fulfillment engine that ties the services together.
//!
//! This module contains the FulfillmentEngine struct, the single entry point
//! for everything the HTTP layer can do: order intake, status changes, batch
//! suggestion and the batch lifecycle. It also runs the background loop
//! that cleans up storage and reacts to new orders.

pub mod event_bus;
pub mod lifecycle;

use crate::handlers::{BatchError, BatchHandler, OrderError, OrderHandler};
use crate::state::{OrderStateMachine, TransitionError};
use fulfillment_batching::BatchingService;
use fulfillment_config::Config;
use fulfillment_notify::NotificationService;
use fulfillment_storage::StorageService;
use fulfillment_types::{
	current_timestamp, truncate_id, Batch, BatchDescriptor, BulkResult, ExceptionAnalysis,
	FulfillmentEvent, IdGenerator, NewOrder, Order, OrderEvent, OrderStatus, TransitionOutcome,
};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::{broadcast, Semaphore};
use tracing::instrument;

/// Errors that can occur during engine operations.
#[derive(Debug, Error)]
pub enum EngineError {
	#[error("Configuration error: {0}")]
	Config(String),
	#[error("Service error: {0}")]
	Service(String),
	#[error("Handler error: {0}")]
	Handler(String),
}

/// Capacity of the in-process event bus.
const EVENT_BUS_CAPACITY: usize = 1000;

/// Upper bound on background handler tasks running at once.
const MAX_BACKGROUND_TASKS: usize = 16;

/// Main fulfillment engine.
#[derive(Clone)]
pub struct FulfillmentEngine {
	/// Service configuration.
	pub(crate) config: Config,
	/// Storage service for orders and batches.
	pub(crate) storage: Arc<StorageService>,
	/// Outbound customer notifications.
	pub(crate) notifications: Arc<NotificationService>,
	/// Batch suggestion strategies and ranking.
	pub(crate) batching: Arc<BatchingService>,
	/// Event bus for in-process observers.
	pub(crate) event_bus: event_bus::EventBus,
	/// Order state machine
	pub(crate) state_machine: Arc<OrderStateMachine>,
	/// Order intake and exception handler
	pub(crate) order_handler: Arc<OrderHandler>,
	/// Batch lifecycle handler
	pub(crate) batch_handler: Arc<BatchHandler>,
}

impl FulfillmentEngine {
	/// Creates a new engine over already constructed services.
	pub fn new(
		config: Config,
		storage: Arc<StorageService>,
		notifications: Arc<NotificationService>,
		batching: Arc<BatchingService>,
		event_bus: event_bus::EventBus,
	) -> Self {
		let ids = Arc::new(IdGenerator::new());

		let state_machine = Arc::new(OrderStateMachine::new(
			storage.clone(),
			notifications.clone(),
			event_bus.clone(),
			config.service.id.clone(),
			config.notifications.notify_on.iter().copied(),
		));

		let order_handler = Arc::new(OrderHandler::new(
			state_machine.clone(),
			event_bus.clone(),
			ids.clone(),
		));

		let batch_handler = Arc::new(BatchHandler::new(
			storage.clone(),
			state_machine.clone(),
			event_bus.clone(),
			ids,
		));

		Self {
			config,
			storage,
			notifications,
			batching,
			event_bus,
			state_machine,
			order_handler,
			batch_handler,
		}
	}

	/// Creates an event bus sized for the engine.
	pub fn default_event_bus() -> event_bus::EventBus {
		event_bus::EventBus::new(EVENT_BUS_CAPACITY)
	}

	/// Ranked batch candidates over the oldest waiting validated orders.
	pub async fn suggest_batches(&self) -> Result<Vec<BatchDescriptor>, TransitionError> {
		let working_set = self
			.state_machine
			.working_set(self.config.batching.working_set_limit)
			.await?;
		let suggestions = self.batching.suggest(&working_set, current_timestamp());

		tracing::debug!(
			working_set = working_set.len(),
			suggestions = suggestions.len(),
			"Computed batch suggestions"
		);
		Ok(suggestions)
	}

	pub async fn create_batch(&self, descriptor: BatchDescriptor) -> Result<Batch, BatchError> {
		self.batch_handler.create(descriptor).await
	}

	pub async fn get_batch(&self, batch_id: &str) -> Result<Batch, BatchError> {
		self.batch_handler.get(batch_id).await
	}

	/// Moves a single order to `new_status`, optionally guarded by the
	/// revision the caller last saw.
	pub async fn apply_order_status(
		&self,
		order_id: &str,
		new_status: OrderStatus,
		expected_revision: Option<u64>,
	) -> Result<TransitionOutcome, TransitionError> {
		self.state_machine
			.apply_transition(order_id, new_status, expected_revision)
			.await
	}

	pub async fn bulk_apply_batch_status(
		&self,
		batch_id: &str,
		new_status: OrderStatus,
	) -> Result<BulkResult, BatchError> {
		self.batch_handler
			.bulk_apply_status(batch_id, new_status)
			.await
	}

	pub async fn register_order(&self, new_order: NewOrder) -> Result<Order, OrderError> {
		self.order_handler.register(new_order).await
	}

	pub async fn get_order(&self, order_id: &str) -> Result<Order, TransitionError> {
		self.state_machine.get_order(order_id).await
	}

	pub async fn list_orders(
		&self,
		status: Option<OrderStatus>,
		limit: usize,
	) -> Result<Vec<Order>, TransitionError> {
		self.state_machine.list_orders(status, limit).await
	}

	pub async fn list_exceptions(&self, limit: usize) -> Result<Vec<Order>, TransitionError> {
		self.state_machine
			.list_orders(Some(OrderStatus::Exception), limit)
			.await
	}

	pub async fn resolve_exception(&self, order_id: &str, notes: String) -> Result<Order, OrderError> {
		self.order_handler.resolve_exception(order_id, notes).await
	}

	/// Classifies an order's exception and stores the result on the order.
	pub async fn analyze_exception(&self, order_id: &str) -> Result<ExceptionAnalysis, OrderError> {
		self.order_handler.analyze_exception(order_id).await
	}

	/// Main execution loop, stopped by Ctrl-C.
	pub async fn run(&self) -> Result<(), EngineError> {
		self.run_until(async {
			if let Err(e) = tokio::signal::ctrl_c().await {
				tracing::error!(error = %e, "Failed to listen for shutdown signal");
			}
		})
		.await
	}

	/// Main execution loop, stopped when `shutdown` completes.
	///
	/// Periodically removes expired storage entries and looks for batch
	/// opportunities whenever a validated order is registered. Drains pending
	/// notifications before returning.
	pub async fn run_until<S>(&self, shutdown: S) -> Result<(), EngineError>
	where
		S: Future<Output = ()>,
	{
		self.initialize().await?;

		let mut event_receiver = self.event_bus.subscribe();

		// Start storage cleanup task
		let storage = self.storage.clone();
		let cleanup_interval = tokio::time::interval(Duration::from_secs(
			self.config.storage.cleanup_interval_seconds.max(1),
		));
		let cleanup_handle = tokio::spawn(async move {
			let mut interval = cleanup_interval;
			loop {
				interval.tick().await;
				match storage.cleanup_expired().await {
					Ok(count) if count > 0 => {
						tracing::debug!(removed = count, "Storage cleanup removed expired entries");
					},
					Err(e) => {
						tracing::warn!(error = %e, "Storage cleanup failed");
					},
					_ => {},
				}
			}
		});

		let semaphore = Arc::new(Semaphore::new(MAX_BACKGROUND_TASKS));
		tokio::pin!(shutdown);

		loop {
			tokio::select! {
				event = event_receiver.recv() => match event {
					Ok(FulfillmentEvent::Order(OrderEvent::Registered {
						order_id,
						status: OrderStatus::Validated,
					})) => {
						self.spawn_handler(&semaphore, move |engine| async move {
							engine.log_batch_opportunities(&order_id).await
						})
						.await;
					},
					Ok(_) => {},
					Err(broadcast::error::RecvError::Lagged(skipped)) => {
						tracing::warn!(skipped, "Event receiver lagged");
					},
					Err(broadcast::error::RecvError::Closed) => break,
				},

				_ = &mut shutdown => {
					break;
				}
			}
		}

		cleanup_handle.abort();
		self.shutdown().await
	}

	/// Logs every current suggestion that includes a freshly registered order.
	#[instrument(skip_all, fields(order_id = %truncate_id(order_id)))]
	async fn log_batch_opportunities(&self, order_id: &str) -> Result<(), EngineError> {
		let suggestions = self
			.suggest_batches()
			.await
			.map_err(|e| EngineError::Handler(format!("Failed to compute suggestions: {}", e)))?;

		for batch in suggestions
			.iter()
			.filter(|b| b.order_ids.iter().any(|id| id == order_id))
		{
			tracing::info!(
				batch = %batch.name,
				kind = %batch.kind,
				order_count = batch.member_count(),
				"Order can join a suggested batch"
			);
		}
		Ok(())
	}

	/// Returns a reference to the event bus.
	pub fn event_bus(&self) -> &event_bus::EventBus {
		&self.event_bus
	}

	/// Returns a reference to the configuration.
	pub fn config(&self) -> &Config {
		&self.config
	}

	/// Returns a reference to the storage service.
	pub fn storage(&self) -> &Arc<StorageService> {
		&self.storage
	}

	/// Spawns a background handler, holding a semaphore permit while it runs.
	async fn spawn_handler<F, Fut>(&self, semaphore: &Arc<Semaphore>, handler: F)
	where
		F: FnOnce(FulfillmentEngine) -> Fut + Send + 'static,
		Fut: Future<Output = Result<(), EngineError>> + Send,
	{
		let engine = self.clone();
		match semaphore.clone().acquire_owned().await {
			Ok(permit) => {
				tokio::spawn(async move {
					let _permit = permit;
					if let Err(e) = handler(engine).await {
						tracing::error!(error = %e, "Handler error");
					}
				});
			},
			Err(e) => {
				tracing::error!(error = %e, "Failed to acquire semaphore permit");
			},
		}
	}
}
