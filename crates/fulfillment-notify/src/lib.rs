//! Customer notification module for the fulfillment system.
//!
//! Status changes that customers care about (shipment, delivery, exceptions)
//! produce a `NotificationRequest`. Requests are handed to a bounded queue
//! and published by a single dispatcher task, so the code committing a status
//! change never waits on, or fails because of, the downstream sink.

use async_trait::async_trait;
use fulfillment_types::{truncate_id, ConfigSchema, ImplementationRegistry, NotificationRequest};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::{mpsc, watch, Mutex};
use tokio::task::JoinHandle;

/// Re-export implementations
pub mod implementations {
	pub mod log;
	pub mod webhook;
}

#[cfg(any(test, feature = "testing"))]
pub mod testing;

/// Errors that can occur while publishing notifications.
#[derive(Debug, Error)]
pub enum NotifyError {
	/// Error that occurs during network communication with the sink.
	#[error("Network error: {0}")]
	Network(String),
	/// The sink answered but refused the request.
	#[error("Notification rejected with status {0}")]
	Rejected(u16),
	/// The sink did not answer within the publish timeout.
	#[error("Notification publish timed out after {0:?}")]
	Timeout(Duration),
	/// Error that occurs when building a sink from invalid configuration.
	#[error("Configuration error: {0}")]
	Configuration(String),
}

/// Trait defining the interface for notification sinks.
///
/// A sink receives one request at a time from the dispatcher and reports
/// whether it was accepted. Retrying is the sink's own concern.
#[async_trait]
pub trait NotificationInterface: Send + Sync {
	/// Returns the configuration schema for this sink.
	fn config_schema(&self) -> Box<dyn ConfigSchema>;

	/// Publishes a single notification request.
	async fn publish(&self, request: &NotificationRequest) -> Result<(), NotifyError>;
}

/// Type alias for notification sink factory functions.
pub type NotificationFactory =
	fn(&toml::Value) -> Result<Box<dyn NotificationInterface>, NotifyError>;

/// Registry trait for notification sink implementations.
pub trait NotificationRegistry: ImplementationRegistry<Factory = NotificationFactory> {}

/// Get all registered notification sink implementations.
pub fn get_all_implementations() -> Vec<(&'static str, NotificationFactory)> {
	use implementations::{log, webhook};

	vec![
		(log::Registry::NAME, log::Registry::factory()),
		(webhook::Registry::NAME, webhook::Registry::factory()),
	]
}

/// Fire-and-forget notification publisher.
///
/// Owns a bounded queue and the dispatcher task draining it. Must be created
/// inside a tokio runtime.
pub struct NotificationService {
	sender: mpsc::Sender<NotificationRequest>,
	shutdown: watch::Sender<bool>,
	dispatcher: Mutex<Option<JoinHandle<()>>>,
}

impl NotificationService {
	/// Creates the service and starts its dispatcher.
	///
	/// `capacity` bounds the number of queued requests; `publish_timeout`
	/// bounds every call into the sink.
	pub fn new(
		sink: Box<dyn NotificationInterface>,
		capacity: usize,
		publish_timeout: Duration,
	) -> Self {
		let (sender, receiver) = mpsc::channel(capacity.max(1));
		let (shutdown, shutdown_rx) = watch::channel(false);
		let dispatcher = tokio::spawn(dispatch_loop(
			Arc::from(sink),
			receiver,
			shutdown_rx,
			publish_timeout,
		));

		Self {
			sender,
			shutdown,
			dispatcher: Mutex::new(Some(dispatcher)),
		}
	}

	/// Queues a request for publishing.
	///
	/// Never blocks. Returns whether the request was queued; a full or closed
	/// queue drops the request with a warning.
	pub fn notify(&self, request: NotificationRequest) -> bool {
		match self.sender.try_send(request) {
			Ok(()) => true,
			Err(mpsc::error::TrySendError::Full(request)) => {
				tracing::warn!(
					order_id = %truncate_id(&request.order_id),
					event = %request.event,
					"Notification queue full, dropping request"
				);
				false
			},
			Err(mpsc::error::TrySendError::Closed(request)) => {
				tracing::warn!(
					order_id = %truncate_id(&request.order_id),
					event = %request.event,
					"Notification dispatcher stopped, dropping request"
				);
				false
			},
		}
	}

	/// Stops the dispatcher after publishing whatever is already queued.
	pub async fn shutdown(&self) {
		self.shutdown.send_replace(true);
		if let Some(handle) = self.dispatcher.lock().await.take() {
			if let Err(e) = handle.await {
				tracing::warn!(error = %e, "Notification dispatcher ended abnormally");
			}
		}
	}
}

async fn dispatch_loop(
	sink: Arc<dyn NotificationInterface>,
	mut receiver: mpsc::Receiver<NotificationRequest>,
	mut shutdown: watch::Receiver<bool>,
	publish_timeout: Duration,
) {
	loop {
		tokio::select! {
			biased;
			request = receiver.recv() => match request {
				Some(request) => publish_one(sink.as_ref(), &request, publish_timeout).await,
				None => break,
			},
			_ = shutdown.changed() => {
				receiver.close();
				while let Some(request) = receiver.recv().await {
					publish_one(sink.as_ref(), &request, publish_timeout).await;
				}
				break;
			}
		}
	}
	tracing::debug!("Notification dispatcher stopped");
}

async fn publish_one(
	sink: &dyn NotificationInterface,
	request: &NotificationRequest,
	publish_timeout: Duration,
) {
	let result = match tokio::time::timeout(publish_timeout, sink.publish(request)).await {
		Ok(result) => result,
		Err(_) => Err(NotifyError::Timeout(publish_timeout)),
	};

	match result {
		Ok(()) => tracing::debug!(
			order_id = %truncate_id(&request.order_id),
			event = %request.event,
			"Notification published"
		),
		Err(e) => tracing::warn!(
			order_id = %truncate_id(&request.order_id),
			event = %request.event,
			error = %e,
			"Failed to publish notification"
		),
	}
}
