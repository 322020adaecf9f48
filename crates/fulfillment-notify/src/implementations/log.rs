//! Notification sink that writes requests to the service log.
//!
//! Stands in for a real customer-messaging integration in development and
//! in deployments where another system tails the log.

use crate::{NotificationInterface, NotifyError};
use async_trait::async_trait;
use fulfillment_types::{
	truncate_id, ConfigSchema, Field, FieldType, ImplementationRegistry, NotificationRequest,
	Schema, ValidationError,
};

const LEVELS: &[&str] = &["debug", "info", "warn"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Level {
	Debug,
	Info,
	Warn,
}

/// Logs each notification request at a configured level.
pub struct LogNotifier {
	level: Level,
}

impl LogNotifier {
	pub fn new() -> Self {
		Self { level: Level::Info }
	}
}

impl Default for LogNotifier {
	fn default() -> Self {
		Self::new()
	}
}

#[async_trait]
impl NotificationInterface for LogNotifier {
	fn config_schema(&self) -> Box<dyn ConfigSchema> {
		Box::new(LogNotifierSchema)
	}

	async fn publish(&self, request: &NotificationRequest) -> Result<(), NotifyError> {
		let order_id = truncate_id(&request.order_id);
		match self.level {
			Level::Debug => tracing::debug!(
				order_id = %order_id,
				event = %request.event,
				agent = %request.origin,
				"Customer notification requested"
			),
			Level::Info => tracing::info!(
				order_id = %order_id,
				event = %request.event,
				agent = %request.origin,
				"Customer notification requested"
			),
			Level::Warn => tracing::warn!(
				order_id = %order_id,
				event = %request.event,
				agent = %request.origin,
				"Customer notification requested"
			),
		}
		Ok(())
	}
}

/// Configuration schema for LogNotifier.
pub struct LogNotifierSchema;

impl ConfigSchema for LogNotifierSchema {
	fn validate(&self, config: &toml::Value) -> Result<(), ValidationError> {
		Schema::new(vec![], vec![Field::new("level", FieldType::OneOf(LEVELS))]).validate(config)
	}
}

/// Factory function to create a log sink from configuration.
///
/// Configuration parameters:
/// - `level`: one of "debug", "info", "warn" (default: "info")
pub fn create_notifier(
	config: &toml::Value,
) -> Result<Box<dyn NotificationInterface>, NotifyError> {
	LogNotifierSchema
		.validate(config)
		.map_err(|e| NotifyError::Configuration(e.to_string()))?;

	let level = match config.get("level").and_then(|v| v.as_str()) {
		Some("debug") => Level::Debug,
		Some("warn") => Level::Warn,
		_ => Level::Info,
	};
	Ok(Box::new(LogNotifier { level }))
}

/// Registry for the log sink implementation.
pub struct Registry;

impl ImplementationRegistry for Registry {
	const NAME: &'static str = "log";
	type Factory = crate::NotificationFactory;

	fn factory() -> Self::Factory {
		create_notifier
	}
}

impl crate::NotificationRegistry for Registry {}
