//! Configuration module for the fulfillment service.
//!
//! This module provides structures and utilities for managing service
//! configuration. It supports loading configuration from TOML files and
//! validates that all required values are set and within bounds before
//! anything is constructed from them.
//!
//! ## Modular Configuration Support
//!
//! Configurations can be split into multiple files for better organization:
//! - Use `include = ["file1.toml", "file2.toml"]` to include other config files
//! - Each top-level section must be unique across all files (no duplicates allowed)

mod loader;

#[cfg(any(test, feature = "testing"))]
pub mod builders {
	pub mod config;
}
#[cfg(any(test, feature = "testing"))]
pub use builders::config::ConfigBuilder;

use fulfillment_types::OrderStatus;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::path::Path;
use std::str::FromStr;
use thiserror::Error;

/// Errors that can occur during configuration operations.
#[derive(Debug, Error)]
pub enum ConfigError {
	/// Error that occurs during file I/O operations.
	#[error("IO error: {0}")]
	Io(#[from] std::io::Error),
	/// Error that occurs when parsing TOML configuration.
	#[error("Configuration error: {0}")]
	Parse(String),
	/// Error that occurs when configuration validation fails.
	#[error("Validation error: {0}")]
	Validation(String),
}

impl From<toml::de::Error> for ConfigError {
	fn from(err: toml::de::Error) -> Self {
		// Keep the message, drop the echoed input.
		ConfigError::Parse(err.message().to_string())
	}
}

/// Main configuration structure for the fulfillment service.
///
/// Loaded once at start-up and passed explicitly to every constructor; no
/// component reads configuration from anywhere else.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
	/// Identity of this service instance.
	pub service: ServiceConfig,
	/// Configuration for the storage backend.
	pub storage: StorageConfig,
	/// Batch suggestion thresholds and strategy selection.
	#[serde(default)]
	pub batching: BatchingConfig,
	/// Configuration for customer notifications.
	pub notifications: NotificationsConfig,
	/// Configuration for the HTTP API server.
	pub api: Option<ApiConfig>,
}

/// Configuration specific to the service instance.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServiceConfig {
	/// Identifier written as the attribution tag on every order and batch write.
	pub id: String,
}

/// Configuration for the storage backend.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StorageConfig {
	/// Which implementation to use as primary.
	pub primary: String,
	/// Map of storage implementation names to their configurations.
	pub implementations: HashMap<String, toml::Value>,
	/// Upper bound in milliseconds for a single storage call.
	#[serde(default = "default_operation_timeout_ms")]
	pub operation_timeout_ms: u64,
	/// Interval in seconds for cleaning up expired storage entries.
	#[serde(default = "default_cleanup_interval_seconds")]
	pub cleanup_interval_seconds: u64,
}

fn default_operation_timeout_ms() -> u64 {
	5000
}

fn default_cleanup_interval_seconds() -> u64 {
	3600
}

/// Thresholds for batch suggestion and ranking.
///
/// Per-strategy tables (`[batching.implementations.<name>]`) are validated
/// by the strategy's own schema when it is built.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct BatchingConfig {
	/// Maximum number of validated orders considered per suggestion request.
	#[serde(default = "default_working_set_limit")]
	pub working_set_limit: usize,
	/// Maximum number of ranked suggestions returned.
	#[serde(default = "default_suggestion_limit")]
	pub suggestion_limit: usize,
	/// Batches with more members than this receive the large-batch multiplier.
	#[serde(default = "default_large_batch_threshold")]
	pub large_batch_threshold: usize,
	#[serde(default = "default_large_batch_multiplier")]
	pub large_batch_multiplier: f64,
	#[serde(default = "default_priority_multiplier")]
	pub priority_multiplier: f64,
	/// Strategy names in run order. Run order breaks score ties.
	#[serde(default = "default_strategies")]
	pub strategies: Vec<String>,
	/// Map of strategy names to their configurations.
	#[serde(default)]
	pub implementations: HashMap<String, toml::Value>,
}

fn default_working_set_limit() -> usize {
	100
}

fn default_suggestion_limit() -> usize {
	10
}

fn default_large_batch_threshold() -> usize {
	10
}

fn default_large_batch_multiplier() -> f64 {
	1.5
}

fn default_priority_multiplier() -> f64 {
	2.0
}

fn default_strategies() -> Vec<String> {
	vec!["region".into(), "urgency".into(), "product".into()]
}

impl Default for BatchingConfig {
	fn default() -> Self {
		Self {
			working_set_limit: default_working_set_limit(),
			suggestion_limit: default_suggestion_limit(),
			large_batch_threshold: default_large_batch_threshold(),
			large_batch_multiplier: default_large_batch_multiplier(),
			priority_multiplier: default_priority_multiplier(),
			strategies: default_strategies(),
			implementations: HashMap::new(),
		}
	}
}

/// Configuration for customer notifications.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct NotificationsConfig {
	/// Which sink implementation to use as primary.
	pub primary: String,
	/// Map of sink implementation names to their configurations.
	pub implementations: HashMap<String, toml::Value>,
	/// Capacity of the outbound notification queue. Requests beyond this are
	/// dropped with a warning.
	#[serde(default = "default_queue_capacity")]
	pub queue_capacity: usize,
	/// Upper bound in seconds for a single publish call.
	#[serde(default = "default_publish_timeout_seconds")]
	pub publish_timeout_seconds: u64,
	/// Target statuses that trigger a customer notification.
	#[serde(default = "default_notify_on")]
	pub notify_on: Vec<OrderStatus>,
}

fn default_queue_capacity() -> usize {
	1000
}

fn default_publish_timeout_seconds() -> u64 {
	10
}

fn default_notify_on() -> Vec<OrderStatus> {
	vec![
		OrderStatus::Shipped,
		OrderStatus::Delivered,
		OrderStatus::Exception,
	]
}

/// Configuration for the HTTP API server.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ApiConfig {
	/// Whether the API server is enabled.
	#[serde(default)]
	pub enabled: bool,
	/// Host address to bind the server to.
	#[serde(default = "default_api_host")]
	pub host: String,
	/// Port to bind the server to.
	#[serde(default = "default_api_port")]
	pub port: u16,
	/// Request timeout in seconds.
	#[serde(default = "default_api_timeout")]
	pub timeout_seconds: u64,
	/// Maximum request size in bytes.
	#[serde(default = "default_max_request_size")]
	pub max_request_size: usize,
	/// CORS configuration.
	pub cors: Option<CorsConfig>,
}

/// CORS configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct CorsConfig {
	/// Allowed origins for CORS.
	pub allowed_origins: Vec<String>,
	/// Allowed headers for CORS.
	pub allowed_headers: Vec<String>,
	/// Allowed methods for CORS.
	pub allowed_methods: Vec<String>,
}

fn default_api_host() -> String {
	"127.0.0.1".to_string()
}

fn default_api_port() -> u16 {
	3000
}

fn default_api_timeout() -> u64 {
	30
}

fn default_max_request_size() -> usize {
	1024 * 1024 // 1MB
}

/// Resolves environment variables in a string.
///
/// Replaces ${VAR_NAME} with the value of the environment variable VAR_NAME.
/// Supports default values with ${VAR_NAME:-default_value}.
///
/// Input strings are limited to 1MB to bound regex work.
pub(crate) fn resolve_env_vars(input: &str) -> Result<String, ConfigError> {
	const MAX_INPUT_SIZE: usize = 1024 * 1024;
	if input.len() > MAX_INPUT_SIZE {
		return Err(ConfigError::Validation(format!(
			"Configuration file too large: {} bytes (max: {} bytes)",
			input.len(),
			MAX_INPUT_SIZE
		)));
	}

	let re = Regex::new(r"\$\{([A-Z_][A-Z0-9_]{0,127})(?::-([^}]{0,256}))?\}")
		.map_err(|e| ConfigError::Parse(format!("Regex error: {}", e)))?;

	let mut result = String::with_capacity(input.len());
	let mut last_end = 0;

	for cap in re.captures_iter(input) {
		let (Some(full_match), Some(var_name)) = (cap.get(0), cap.get(1)) else {
			continue;
		};
		let default_value = cap.get(2).map(|m| m.as_str());

		let value = match (std::env::var(var_name.as_str()), default_value) {
			(Ok(v), _) => v,
			(Err(_), Some(default)) => default.to_string(),
			(Err(_), None) => {
				return Err(ConfigError::Validation(format!(
					"Environment variable '{}' not found",
					var_name.as_str()
				)))
			},
		};

		result.push_str(&input[last_end..full_match.start()]);
		result.push_str(&value);
		last_end = full_match.end();
	}
	result.push_str(&input[last_end..]);

	Ok(result)
}

impl Config {
	/// Loads configuration from a file with environment variable resolution.
	///
	/// Supports modular configuration through `include = ["a.toml", ...]`.
	/// Each top-level section must be unique across all configuration files.
	pub async fn from_file(path: &str) -> Result<Self, ConfigError> {
		let path_buf = Path::new(path);
		let base_dir = path_buf.parent().unwrap_or_else(|| Path::new("."));

		let mut loader = loader::ConfigLoader::new(base_dir);
		let file_name = path_buf
			.file_name()
			.ok_or_else(|| ConfigError::Validation(format!("Invalid path: {}", path)))?;
		loader.load_config(file_name).await
	}

	/// Validates the configuration to ensure all required fields are properly set.
	fn validate(&self) -> Result<(), ConfigError> {
		if self.service.id.trim().is_empty() {
			return Err(ConfigError::Validation("Service ID cannot be empty".into()));
		}

		self.validate_storage()?;
		self.validate_batching()?;
		self.validate_notifications()?;

		if let Some(api) = self.api.as_ref().filter(|api| api.enabled) {
			if api.port == 0 {
				return Err(ConfigError::Validation("API port cannot be 0".into()));
			}
			if api.timeout_seconds == 0 {
				return Err(ConfigError::Validation(
					"API timeout_seconds must be greater than 0".into(),
				));
			}
		}

		Ok(())
	}

	fn validate_storage(&self) -> Result<(), ConfigError> {
		let storage = &self.storage;
		if storage.implementations.is_empty() {
			return Err(ConfigError::Validation(
				"At least one storage implementation must be configured".into(),
			));
		}
		if !storage.implementations.contains_key(&storage.primary) {
			return Err(ConfigError::Validation(format!(
				"Primary storage '{}' not found in implementations",
				storage.primary
			)));
		}
		if storage.operation_timeout_ms == 0 {
			return Err(ConfigError::Validation(
				"Storage operation_timeout_ms must be greater than 0".into(),
			));
		}
		if storage.cleanup_interval_seconds == 0 {
			return Err(ConfigError::Validation(
				"Storage cleanup_interval_seconds must be greater than 0".into(),
			));
		}
		if storage.cleanup_interval_seconds > 86400 {
			return Err(ConfigError::Validation(
				"Storage cleanup_interval_seconds cannot exceed 86400 (24 hours)".into(),
			));
		}
		Ok(())
	}

	fn validate_batching(&self) -> Result<(), ConfigError> {
		let batching = &self.batching;
		if batching.working_set_limit == 0 {
			return Err(ConfigError::Validation(
				"batching.working_set_limit must be greater than 0".into(),
			));
		}
		if batching.suggestion_limit == 0 {
			return Err(ConfigError::Validation(
				"batching.suggestion_limit must be greater than 0".into(),
			));
		}
		for (name, value) in [
			("large_batch_multiplier", batching.large_batch_multiplier),
			("priority_multiplier", batching.priority_multiplier),
		] {
			if !value.is_finite() || value < 1.0 {
				return Err(ConfigError::Validation(format!(
					"batching.{} must be a finite number >= 1.0, got {}",
					name, value
				)));
			}
		}
		if batching.strategies.is_empty() {
			return Err(ConfigError::Validation(
				"At least one batching strategy must be enabled".into(),
			));
		}
		let mut seen = HashSet::new();
		for name in &batching.strategies {
			if !seen.insert(name.as_str()) {
				return Err(ConfigError::Validation(format!(
					"Batching strategy '{}' listed more than once",
					name
				)));
			}
		}
		if let Some(unused) = batching
			.implementations
			.keys()
			.find(|name| !seen.contains(name.as_str()))
		{
			return Err(ConfigError::Validation(format!(
				"Batching implementation '{}' is configured but not listed in batching.strategies",
				unused
			)));
		}
		Ok(())
	}

	fn validate_notifications(&self) -> Result<(), ConfigError> {
		let notifications = &self.notifications;
		if notifications.implementations.is_empty() {
			return Err(ConfigError::Validation(
				"At least one notification implementation must be configured".into(),
			));
		}
		if !notifications
			.implementations
			.contains_key(&notifications.primary)
		{
			return Err(ConfigError::Validation(format!(
				"Primary notification sink '{}' not found in implementations",
				notifications.primary
			)));
		}
		if notifications.queue_capacity == 0 {
			return Err(ConfigError::Validation(
				"notifications.queue_capacity must be greater than 0".into(),
			));
		}
		if notifications.publish_timeout_seconds == 0 {
			return Err(ConfigError::Validation(
				"notifications.publish_timeout_seconds must be greater than 0".into(),
			));
		}
		Ok(())
	}
}

/// Parses configuration from a TOML string.
///
/// Environment variables are resolved and the configuration is validated
/// after parsing.
impl FromStr for Config {
	type Err = ConfigError;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		let resolved = resolve_env_vars(s)?;
		let config: Config = toml::from_str(&resolved)?;
		config.validate()?;
		Ok(config)
	}
}
