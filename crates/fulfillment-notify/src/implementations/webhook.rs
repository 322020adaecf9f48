//! Notification sink that POSTs each request as JSON to an HTTP endpoint.

use crate::{NotificationInterface, NotifyError};
use async_trait::async_trait;
use fulfillment_types::{
	ConfigSchema, Field, FieldType, ImplementationRegistry, NotificationRequest, Schema,
	ValidationError,
};
use std::time::Duration;

/// Delivers notification requests to a webhook.
///
/// Any 2xx answer counts as accepted. Non-2xx answers and transport errors
/// are reported to the dispatcher, which logs them.
pub struct WebhookNotifier {
	client: reqwest::Client,
	url: String,
	timeout: Duration,
	auth_token: Option<String>,
}

impl WebhookNotifier {
	pub fn new(
		url: String,
		timeout: Duration,
		auth_token: Option<String>,
	) -> Result<Self, NotifyError> {
		let client = reqwest::Client::builder()
			.timeout(timeout)
			.build()
			.map_err(|e| NotifyError::Configuration(format!("Failed to build HTTP client: {}", e)))?;
		Ok(Self {
			client,
			url,
			timeout,
			auth_token,
		})
	}
}

#[async_trait]
impl NotificationInterface for WebhookNotifier {
	fn config_schema(&self) -> Box<dyn ConfigSchema> {
		Box::new(WebhookNotifierSchema)
	}

	async fn publish(&self, request: &NotificationRequest) -> Result<(), NotifyError> {
		let mut call = self.client.post(&self.url).json(request);
		if let Some(token) = &self.auth_token {
			call = call.bearer_auth(token);
		}

		let response = call.send().await.map_err(|e| {
			if e.is_timeout() {
				NotifyError::Timeout(self.timeout)
			} else {
				NotifyError::Network(e.to_string())
			}
		})?;

		let status = response.status();
		if !status.is_success() {
			return Err(NotifyError::Rejected(status.as_u16()));
		}
		Ok(())
	}
}

/// Configuration schema for WebhookNotifier.
pub struct WebhookNotifierSchema;

impl ConfigSchema for WebhookNotifierSchema {
	fn validate(&self, config: &toml::Value) -> Result<(), ValidationError> {
		let schema = Schema::new(
			vec![Field::new("url", FieldType::String).with_validator(|value| {
				match value.as_str() {
					Some(url) if url.starts_with("http://") || url.starts_with("https://") => {
						Ok(())
					},
					_ => Err("url must start with http:// or https://".to_string()),
				}
			})],
			vec![
				Field::new(
					"timeout_seconds",
					FieldType::Integer {
						min: Some(1),
						max: Some(300),
					},
				),
				Field::new("auth_token", FieldType::String),
			],
		);
		schema.validate(config)
	}
}

/// Factory function to create a webhook sink from configuration.
///
/// Configuration parameters:
/// - `url`: endpoint receiving the JSON body (required)
/// - `timeout_seconds`: HTTP timeout, 1 to 300 (default: 5)
/// - `auth_token`: optional bearer token
pub fn create_notifier(
	config: &toml::Value,
) -> Result<Box<dyn NotificationInterface>, NotifyError> {
	WebhookNotifierSchema
		.validate(config)
		.map_err(|e| NotifyError::Configuration(e.to_string()))?;

	let url = config
		.get("url")
		.and_then(|v| v.as_str())
		.ok_or_else(|| NotifyError::Configuration("url is required".into()))?
		.to_string();
	let timeout = config
		.get("timeout_seconds")
		.and_then(|v| v.as_integer())
		.map(|secs| Duration::from_secs(secs as u64))
		.unwrap_or(Duration::from_secs(5));
	let auth_token = config
		.get("auth_token")
		.and_then(|v| v.as_str())
		.map(str::to_string);

	Ok(Box::new(WebhookNotifier::new(url, timeout, auth_token)?))
}

/// Registry for the webhook sink implementation.
pub struct Registry;

impl ImplementationRegistry for Registry {
	const NAME: &'static str = "webhook";
	type Factory = crate::NotificationFactory;

	fn factory() -> Self::Factory {
		create_notifier
	}
}

impl crate::NotificationRegistry for Registry {}
