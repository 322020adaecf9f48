//! Builder pattern for constructing fulfillment engines.
//!
//! Composes a FulfillmentEngine from pluggable storage backends,
//! notification sinks and batching strategies, each created through a
//! factory function keyed by implementation name.

use crate::engine::FulfillmentEngine;
use fulfillment_batching::{BatchingError, BatchingService, BatchingStrategy};
use fulfillment_config::Config;
use fulfillment_notify::{NotificationInterface, NotificationService, NotifyError};
use fulfillment_storage::{StorageError, StorageInterface, StorageService};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

/// Errors that can occur during engine construction.
#[derive(Debug, Error)]
pub enum BuilderError {
	#[error("Configuration error: {0}")]
	Config(String),
	#[error("Missing required component: {0}")]
	MissingComponent(String),
}

/// Container for all factory functions needed to build a FulfillmentEngine.
pub struct FulfillmentFactories<SF, NF, STF> {
	pub storage_factories: HashMap<String, SF>,
	pub notification_factories: HashMap<String, NF>,
	pub strategy_factories: HashMap<String, STF>,
}

/// Builder for constructing a FulfillmentEngine with pluggable implementations.
pub struct FulfillmentBuilder {
	config: Config,
}

impl FulfillmentBuilder {
	/// Creates a new FulfillmentBuilder with the given configuration.
	pub fn new(config: Config) -> Self {
		Self { config }
	}

	/// Builds the FulfillmentEngine using factories for each component type.
	///
	/// Must be called inside a tokio runtime, since the notification
	/// dispatcher starts immediately.
	pub fn build<SF, NF, STF>(
		self,
		factories: FulfillmentFactories<SF, NF, STF>,
	) -> Result<FulfillmentEngine, BuilderError>
	where
		SF: Fn(&toml::Value) -> Result<Box<dyn StorageInterface>, StorageError>,
		NF: Fn(&toml::Value) -> Result<Box<dyn NotificationInterface>, NotifyError>,
		STF: Fn(&toml::Value) -> Result<Box<dyn BatchingStrategy>, BatchingError>,
	{
		// Create storage implementations
		let mut storage_impls = HashMap::new();
		for (name, config) in &self.config.storage.implementations {
			if let Some(factory) = factories.storage_factories.get(name) {
				let created = factory(config).and_then(|implementation| {
					implementation
						.config_schema()
						.validate(config)
						.map_err(|e| StorageError::Configuration(e.to_string()))?;
					Ok(implementation)
				});
				match created {
					Ok(implementation) => {
						storage_impls.insert(name.clone(), implementation);
						let is_primary = &self.config.storage.primary == name;
						tracing::info!(component = "storage", implementation = %name, enabled = %is_primary, "Loaded");
					},
					Err(e) => {
						tracing::error!(
							component = "storage",
							implementation = %name,
							error = %e,
							"Failed to create storage implementation"
						);
						return Err(BuilderError::Config(format!(
							"Failed to create storage implementation '{}': {}",
							name, e
						)));
					},
				}
			}
		}

		let primary_storage = &self.config.storage.primary;
		let storage_backend = storage_impls.remove(primary_storage).ok_or_else(|| {
			BuilderError::MissingComponent(format!(
				"Primary storage '{}' has no registered implementation",
				primary_storage
			))
		})?;
		let storage = Arc::new(StorageService::with_timeout(
			storage_backend,
			Duration::from_millis(self.config.storage.operation_timeout_ms),
		));

		// Create notification sinks
		let mut notification_impls = HashMap::new();
		for (name, config) in &self.config.notifications.implementations {
			if let Some(factory) = factories.notification_factories.get(name) {
				let created = factory(config).and_then(|implementation| {
					implementation
						.config_schema()
						.validate(config)
						.map_err(|e| NotifyError::Configuration(e.to_string()))?;
					Ok(implementation)
				});
				match created {
					Ok(implementation) => {
						notification_impls.insert(name.clone(), implementation);
						let is_primary = &self.config.notifications.primary == name;
						tracing::info!(component = "notifications", implementation = %name, enabled = %is_primary, "Loaded");
					},
					Err(e) => {
						tracing::error!(
							component = "notifications",
							implementation = %name,
							error = %e,
							"Failed to create notification sink"
						);
						return Err(BuilderError::Config(format!(
							"Failed to create notification sink '{}': {}",
							name, e
						)));
					},
				}
			}
		}

		let primary_sink = &self.config.notifications.primary;
		let sink = notification_impls.remove(primary_sink).ok_or_else(|| {
			BuilderError::MissingComponent(format!(
				"Primary notification sink '{}' has no registered implementation",
				primary_sink
			))
		})?;
		let notifications = Arc::new(NotificationService::new(
			sink,
			self.config.notifications.queue_capacity,
			Duration::from_secs(self.config.notifications.publish_timeout_seconds),
		));

		// Create batching strategies in configured order
		let batching =
			BatchingService::from_config(&self.config.batching, &factories.strategy_factories)
				.map_err(|e| {
					tracing::error!(component = "batching", error = %e, "Failed to create strategies");
					BuilderError::Config(format!("Failed to create batching strategies: {}", e))
				})?;

		Ok(FulfillmentEngine::new(
			self.config,
			storage,
			notifications,
			Arc::new(batching),
			FulfillmentEngine::default_event_bus(),
		))
	}
}
