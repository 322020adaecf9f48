//! Lifecycle management for the fulfillment engine.
//!
//! Handles initialization and shutdown procedures for the engine, making
//! sure queued customer notifications are published before the process
//! exits.

use super::FulfillmentEngine;

impl FulfillmentEngine {
	/// Performs any initialization required before running
	pub async fn initialize(&self) -> Result<(), super::EngineError> {
		tracing::info!(
			service_id = %self.config.service.id,
			strategies = ?self.batching.strategy_names().collect::<Vec<_>>(),
			"Initializing fulfillment engine"
		);
		Ok(())
	}

	/// Performs cleanup operations
	pub async fn shutdown(&self) -> Result<(), super::EngineError> {
		tracing::info!("Shutting down fulfillment engine");

		// Publish whatever is still queued, then stop the dispatcher.
		self.notifications.shutdown().await;

		Ok(())
	}
}
