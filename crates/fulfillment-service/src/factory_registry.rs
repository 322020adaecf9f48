//! Dynamic factory registry for fulfillment implementations.
//!
//! This module provides a centralized registry for all factory functions,
//! allowing dynamic instantiation of implementations based on configuration.

use fulfillment_batching::StrategyFactory;
use fulfillment_config::Config;
use fulfillment_core::{FulfillmentBuilder, FulfillmentEngine, FulfillmentFactories};
use fulfillment_notify::NotificationFactory;
use fulfillment_storage::StorageFactory;
use std::collections::HashMap;
use std::sync::OnceLock;

/// Global registry for all implementation factories
pub struct FactoryRegistry {
	pub storage: HashMap<String, StorageFactory>,
	pub notification: HashMap<String, NotificationFactory>,
	pub strategy: HashMap<String, StrategyFactory>,
}

impl FactoryRegistry {
	/// Create a new empty registry
	pub fn new() -> Self {
		Self {
			storage: HashMap::new(),
			notification: HashMap::new(),
			strategy: HashMap::new(),
		}
	}

	/// Register a storage implementation
	pub fn register_storage(&mut self, name: impl Into<String>, factory: StorageFactory) {
		self.storage.insert(name.into(), factory);
	}

	/// Register a notification sink implementation
	pub fn register_notification(&mut self, name: impl Into<String>, factory: NotificationFactory) {
		self.notification.insert(name.into(), factory);
	}

	/// Register a batching strategy implementation
	pub fn register_strategy(&mut self, name: impl Into<String>, factory: StrategyFactory) {
		self.strategy.insert(name.into(), factory);
	}
}

// Global registry instance
static REGISTRY: OnceLock<FactoryRegistry> = OnceLock::new();

/// Initialize the global registry with all available implementations
pub fn initialize_registry() -> &'static FactoryRegistry {
	REGISTRY.get_or_init(|| {
		let mut registry = FactoryRegistry::new();

		for (name, factory) in fulfillment_storage::get_all_implementations() {
			tracing::debug!("Registering storage implementation: {}", name);
			registry.register_storage(name, factory);
		}

		for (name, factory) in fulfillment_notify::get_all_implementations() {
			tracing::debug!("Registering notification implementation: {}", name);
			registry.register_notification(name, factory);
		}

		for (name, factory) in fulfillment_batching::get_all_strategy_implementations() {
			tracing::debug!("Registering strategy implementation: {}", name);
			registry.register_strategy(name, factory);
		}

		registry
	})
}

/// Get the global factory registry
pub fn get_registry() -> &'static FactoryRegistry {
	initialize_registry()
}

/// Macro to pick the factories for every implementation name in config
macro_rules! build_factories {
	($registry:expr, $names:expr, $registry_field:ident, $type_name:literal) => {{
		let mut factories = HashMap::new();
		for name in $names {
			if let Some(factory) = $registry.$registry_field.get(name) {
				factories.insert(name.clone(), *factory);
			} else {
				let mut available: Vec<_> = $registry.$registry_field.keys().cloned().collect();
				available.sort();
				return Err(format!(
					"Unknown {} implementation '{}'. Available: [{}]",
					$type_name,
					name,
					available.join(", ")
				)
				.into());
			}
		}
		factories
	}};
}

/// Build the engine using the registry and config.
///
/// Must be called inside a tokio runtime.
pub fn build_engine_from_config(
	config: Config,
) -> Result<FulfillmentEngine, Box<dyn std::error::Error>> {
	let registry = get_registry();

	let storage_factories =
		build_factories!(registry, config.storage.implementations.keys(), storage, "storage");
	let notification_factories = build_factories!(
		registry,
		config.notifications.implementations.keys(),
		notification,
		"notification"
	);
	let strategy_factories =
		build_factories!(registry, config.batching.strategies.iter(), strategy, "strategy");

	let factories = FulfillmentFactories {
		storage_factories,
		notification_factories,
		strategy_factories,
	};

	Ok(FulfillmentBuilder::new(config).build(factories)?)
}

#[cfg(test)]
mod tests {
	use super::*;
	use fulfillment_config::ConfigBuilder;

	#[test]
	fn test_registry_has_all_implementations() {
		let registry = get_registry();
		for name in ["memory", "file"] {
			assert!(registry.storage.contains_key(name));
		}
		for name in ["log", "webhook"] {
			assert!(registry.notification.contains_key(name));
		}
		for name in ["region", "urgency", "product"] {
			assert!(registry.strategy.contains_key(name));
		}
	}

	#[tokio::test]
	async fn test_build_engine_from_default_config() {
		let engine = build_engine_from_config(ConfigBuilder::new().build()).unwrap();
		assert_eq!(engine.config().service.id, "test-fulfillment");
		engine.shutdown().await.unwrap();
	}

	#[tokio::test]
	async fn test_unknown_implementation_lists_available() {
		let config = ConfigBuilder::new().storage_primary("postgres").build();
		let err = build_engine_from_config(config).err().unwrap();
		let message = err.to_string();
		assert!(message.contains("postgres"));
		assert!(message.contains("file, memory"));
	}
}
