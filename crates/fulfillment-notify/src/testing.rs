//! In-memory sink for tests that need to observe published notifications.

use crate::{NotificationInterface, NotifyError};
use async_trait::async_trait;
use fulfillment_types::{ConfigSchema, NotificationRequest, Schema, ValidationError};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Records every request it accepts. Clones share the same record.
#[derive(Clone, Default)]
pub struct RecordingSink {
	published: Arc<Mutex<Vec<NotificationRequest>>>,
	attempts: Arc<AtomicUsize>,
	fail: bool,
	delay: Option<Duration>,
}

impl RecordingSink {
	pub fn new() -> Self {
		Self::default()
	}

	/// A sink that rejects every request after counting the attempt.
	pub fn failing() -> Self {
		Self {
			fail: true,
			..Self::default()
		}
	}

	/// A sink that waits `delay` before accepting each request.
	pub fn with_delay(delay: Duration) -> Self {
		Self {
			delay: Some(delay),
			..Self::default()
		}
	}

	/// Requests accepted so far, in publish order.
	pub fn published(&self) -> Vec<NotificationRequest> {
		self.published
			.lock()
			.map(|guard| guard.clone())
			.unwrap_or_default()
	}

	/// Number of publish calls, successful or not.
	pub fn attempts(&self) -> usize {
		self.attempts.load(Ordering::SeqCst)
	}
}

struct NoConfig;

impl ConfigSchema for NoConfig {
	fn validate(&self, config: &toml::Value) -> Result<(), ValidationError> {
		Schema::new(vec![], vec![]).validate(config)
	}
}

#[async_trait]
impl NotificationInterface for RecordingSink {
	fn config_schema(&self) -> Box<dyn ConfigSchema> {
		Box::new(NoConfig)
	}

	async fn publish(&self, request: &NotificationRequest) -> Result<(), NotifyError> {
		self.attempts.fetch_add(1, Ordering::SeqCst);
		if let Some(delay) = self.delay {
			tokio::time::sleep(delay).await;
		}
		if self.fail {
			return Err(NotifyError::Network("sink unavailable".into()));
		}
		if let Ok(mut published) = self.published.lock() {
			published.push(request.clone());
		}
		Ok(())
	}
}
