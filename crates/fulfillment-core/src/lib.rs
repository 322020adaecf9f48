//! Core fulfillment engine.
//!
//! Ties storage, notifications and batching together behind the
//! [`FulfillmentEngine`]: the order status state machine, order intake and
//! exception resolution, batch suggestion and the batch lifecycle.

pub mod builder;
pub mod engine;
pub mod handlers;
pub mod state;

pub use builder::{BuilderError, FulfillmentBuilder, FulfillmentFactories};
pub use engine::{event_bus::EventBus, EngineError, FulfillmentEngine};
pub use handlers::{BatchError, OrderError};
pub use state::{TransitionError, TransitionPolicy};

#[cfg(test)]
pub(crate) mod test_support {
	use crate::engine::event_bus::EventBus;
	use crate::engine::FulfillmentEngine;
	use crate::state::OrderStateMachine;
	use async_trait::async_trait;
	use fulfillment_batching::{get_all_strategy_implementations, BatchingService};
	use fulfillment_config::Config;
	use fulfillment_notify::testing::RecordingSink;
	use fulfillment_notify::NotificationService;
	use fulfillment_storage::implementations::memory::MemoryStorage;
	use fulfillment_storage::{StorageError, StorageInterface, StorageService};
	use fulfillment_types::{
		ConfigSchema, LineItem, NewOrder, Order, OrderStatus, ShippingAddress, ValidationError,
	};
	use std::collections::HashMap;
	use std::sync::atomic::{AtomicUsize, Ordering};
	use std::sync::Arc;
	use std::time::Duration;

	pub struct Harness {
		pub storage: Arc<StorageService>,
		pub state_machine: Arc<OrderStateMachine>,
		pub notifications: Arc<NotificationService>,
		pub sink: RecordingSink,
		pub event_bus: EventBus,
	}

	fn default_notify_on() -> Vec<OrderStatus> {
		vec![
			OrderStatus::Shipped,
			OrderStatus::Delivered,
			OrderStatus::Exception,
		]
	}

	pub async fn harness() -> Harness {
		let storage = Arc::new(StorageService::new(Box::new(MemoryStorage::new())));
		let sink = RecordingSink::new();
		let notifications = Arc::new(NotificationService::new(
			Box::new(sink.clone()),
			100,
			Duration::from_secs(1),
		));
		let event_bus = EventBus::new(64);
		let state_machine = Arc::new(OrderStateMachine::new(
			storage.clone(),
			notifications.clone(),
			event_bus.clone(),
			"test-fulfillment",
			default_notify_on(),
		));

		Harness {
			storage,
			state_machine,
			notifications,
			sink,
			event_bus,
		}
	}

	/// Engine over memory storage with a recording sink.
	pub fn engine(config: Config) -> (FulfillmentEngine, RecordingSink) {
		let storage = Arc::new(StorageService::new(Box::new(MemoryStorage::new())));
		let sink = RecordingSink::new();
		let notifications = Arc::new(NotificationService::new(
			Box::new(sink.clone()),
			config.notifications.queue_capacity,
			Duration::from_secs(1),
		));
		let factories: HashMap<String, _> = get_all_strategy_implementations()
			.into_iter()
			.map(|(name, factory)| (name.to_string(), factory))
			.collect();
		let batching = BatchingService::from_config(&config.batching, &factories).unwrap();

		let engine = FulfillmentEngine::new(
			config,
			storage,
			notifications,
			Arc::new(batching),
			EventBus::new(64),
		);
		(engine, sink)
	}

	pub fn order_with_status(id: &str, status: OrderStatus, created_at: u64) -> Order {
		Order {
			id: id.to_string(),
			status,
			created_at,
			updated_at: created_at,
			updated_by: None,
			revision: 0,
			customer: Default::default(),
			address: Default::default(),
			line_items: Vec::new(),
			payment: Default::default(),
			validation: Default::default(),
			analysis: None,
			resolution: None,
		}
	}

	/// Intake payload with one line item whose SKU is unique per call.
	pub fn new_order(status: OrderStatus, state: Option<&str>) -> NewOrder {
		static NEXT_SKU: AtomicUsize = AtomicUsize::new(0);
		let sku = format!("SKU-{}", NEXT_SKU.fetch_add(1, Ordering::Relaxed));

		NewOrder {
			status,
			customer: Default::default(),
			address: ShippingAddress {
				state: state.map(str::to_string),
				..Default::default()
			},
			line_items: vec![LineItem {
				name: Some(format!("Product {}", sku)),
				sku: Some(sku),
				quantity: 1,
				price: 10.0,
			}],
			payment: Default::default(),
			validation: Default::default(),
		}
	}

	/// Storage backend that never answers in time.
	struct SlowStorage;

	struct NoConfig;

	impl ConfigSchema for NoConfig {
		fn validate(&self, _config: &toml::Value) -> Result<(), ValidationError> {
			Ok(())
		}
	}

	#[async_trait]
	impl StorageInterface for SlowStorage {
		async fn get_bytes(&self, _key: &str) -> Result<Vec<u8>, StorageError> {
			tokio::time::sleep(Duration::from_secs(60)).await;
			Err(StorageError::NotFound)
		}

		async fn set_bytes(
			&self,
			_key: &str,
			_value: Vec<u8>,
			_ttl: Option<Duration>,
		) -> Result<(), StorageError> {
			tokio::time::sleep(Duration::from_secs(60)).await;
			Ok(())
		}

		async fn delete(&self, _key: &str) -> Result<(), StorageError> {
			Ok(())
		}

		async fn exists(&self, _key: &str) -> Result<bool, StorageError> {
			tokio::time::sleep(Duration::from_secs(60)).await;
			Ok(false)
		}

		async fn scan(&self, _namespace: &str) -> Result<Vec<Vec<u8>>, StorageError> {
			tokio::time::sleep(Duration::from_secs(60)).await;
			Ok(Vec::new())
		}

		fn config_schema(&self) -> Box<dyn ConfigSchema> {
			Box::new(NoConfig)
		}
	}

	/// State machine whose storage calls all exceed `timeout`.
	pub fn slow_state_machine(timeout: Duration) -> OrderStateMachine {
		let storage = Arc::new(StorageService::with_timeout(Box::new(SlowStorage), timeout));
		let notifications = Arc::new(NotificationService::new(
			Box::new(RecordingSink::new()),
			10,
			Duration::from_secs(1),
		));
		OrderStateMachine::new(
			storage,
			notifications,
			EventBus::new(8),
			"test-fulfillment",
			default_notify_on(),
		)
	}
}
