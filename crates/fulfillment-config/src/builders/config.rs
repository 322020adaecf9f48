//! Configuration builder for creating test and development configurations.

use crate::{
	ApiConfig, BatchingConfig, Config, NotificationsConfig, ServiceConfig, StorageConfig,
};
use fulfillment_types::OrderStatus;
use std::collections::HashMap;

/// Builder for creating `Config` instances with a fluent API.
///
/// Defaults to memory storage, the log sink and the standard batching
/// thresholds, which is what most engine tests want.
#[derive(Debug, Clone)]
pub struct ConfigBuilder {
	service_id: String,
	storage_primary: String,
	storage_operation_timeout_ms: u64,
	storage_cleanup_interval_seconds: u64,
	notifications_primary: String,
	queue_capacity: usize,
	notify_on: Option<Vec<OrderStatus>>,
	batching: BatchingConfig,
	api: Option<ApiConfig>,
}

impl Default for ConfigBuilder {
	fn default() -> Self {
		Self::new()
	}
}

impl ConfigBuilder {
	pub fn new() -> Self {
		Self {
			service_id: "test-fulfillment".to_string(),
			storage_primary: "memory".to_string(),
			storage_operation_timeout_ms: 5000,
			storage_cleanup_interval_seconds: 60,
			notifications_primary: "log".to_string(),
			queue_capacity: 1000,
			notify_on: None,
			batching: BatchingConfig::default(),
			api: None,
		}
	}

	pub fn service_id(mut self, id: impl Into<String>) -> Self {
		self.service_id = id.into();
		self
	}

	pub fn storage_primary(mut self, primary: impl Into<String>) -> Self {
		self.storage_primary = primary.into();
		self
	}

	pub fn storage_operation_timeout_ms(mut self, timeout: u64) -> Self {
		self.storage_operation_timeout_ms = timeout;
		self
	}

	pub fn storage_cleanup_interval_seconds(mut self, interval: u64) -> Self {
		self.storage_cleanup_interval_seconds = interval;
		self
	}

	pub fn notifications_primary(mut self, primary: impl Into<String>) -> Self {
		self.notifications_primary = primary.into();
		self
	}

	pub fn queue_capacity(mut self, capacity: usize) -> Self {
		self.queue_capacity = capacity;
		self
	}

	pub fn notify_on(mut self, statuses: Vec<OrderStatus>) -> Self {
		self.notify_on = Some(statuses);
		self
	}

	/// Replaces the whole batching section.
	pub fn batching(mut self, batching: BatchingConfig) -> Self {
		self.batching = batching;
		self
	}

	pub fn api(mut self, api: Option<ApiConfig>) -> Self {
		self.api = api;
		self
	}

	/// Builds the `Config`. Storage and notification primaries get an empty
	/// implementation table so the result passes validation.
	pub fn build(self) -> Config {
		let empty_table = || toml::Value::Table(toml::Table::new());

		Config {
			service: ServiceConfig {
				id: self.service_id,
			},
			storage: StorageConfig {
				implementations: HashMap::from([(self.storage_primary.clone(), empty_table())]),
				primary: self.storage_primary,
				operation_timeout_ms: self.storage_operation_timeout_ms,
				cleanup_interval_seconds: self.storage_cleanup_interval_seconds,
			},
			batching: self.batching,
			notifications: NotificationsConfig {
				implementations: HashMap::from([(
					self.notifications_primary.clone(),
					empty_table(),
				)]),
				primary: self.notifications_primary,
				queue_capacity: self.queue_capacity,
				publish_timeout_seconds: 10,
				notify_on: self.notify_on.unwrap_or_else(|| {
					vec![
						OrderStatus::Shipped,
						OrderStatus::Delivered,
						OrderStatus::Exception,
					]
				}),
			},
			api: self.api,
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_built_config_round_trips_through_parser() {
		let config = ConfigBuilder::new()
			.service_id("builder-test")
			.notify_on(vec![OrderStatus::Delivered])
			.build();
		let text = toml::to_string(&config).unwrap();
		let parsed: Config = text.parse().unwrap();
		assert_eq!(parsed.service.id, "builder-test");
		assert_eq!(parsed.notifications.notify_on, vec![OrderStatus::Delivered]);
		assert_eq!(parsed.storage.primary, "memory");
	}
}
