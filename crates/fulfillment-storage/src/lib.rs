//! Storage module for the fulfillment system.
//!
//! This module provides abstractions for persistent storage of order and
//! batch documents, supporting different backend implementations such as
//! in-memory or file-based storage. Documents are stored as JSON, which lets
//! the typed service answer field-equality queries over any backend.

use async_trait::async_trait;
use fulfillment_types::{field_at, ConfigSchema, ImplementationRegistry, Query, SortOrder};
use serde::{de::DeserializeOwned, Serialize};
use std::cmp::Ordering;
use std::future::Future;
use std::time::Duration;
use thiserror::Error;

/// Re-export implementations
pub mod implementations {
	pub mod file;
	pub mod memory;
}

/// Errors that can occur during storage operations.
#[derive(Debug, Error)]
pub enum StorageError {
	/// Error that occurs when a requested item is not found.
	#[error("Not found")]
	NotFound,
	/// Error that occurs during serialization/deserialization.
	#[error("Serialization error: {0}")]
	Serialization(String),
	/// Error that occurs in the storage backend.
	#[error("Backend error: {0}")]
	Backend(String),
	/// Error that occurs when a backend call exceeds the operation timeout.
	#[error("Storage operation '{operation}' timed out after {timeout_ms}ms")]
	Timeout { operation: &'static str, timeout_ms: u64 },
	/// Error that occurs during configuration validation.
	#[error("Configuration error: {0}")]
	Configuration(String),
}

impl StorageError {
	/// Whether the backend could not be reached or answered too slowly,
	/// as opposed to a problem with the data or the request.
	pub fn is_unavailable(&self) -> bool {
		matches!(self, StorageError::Backend(_) | StorageError::Timeout { .. })
	}
}

/// Trait defining the low-level interface for storage backends.
///
/// This trait must be implemented by any storage backend that wants to
/// integrate with the fulfillment system. It provides basic key-value
/// operations with optional TTL support, plus a namespace scan used for
/// queries.
#[async_trait]
pub trait StorageInterface: Send + Sync {
	/// Retrieves raw bytes for the given key.
	async fn get_bytes(&self, key: &str) -> Result<Vec<u8>, StorageError>;

	/// Stores raw bytes with optional time-to-live.
	async fn set_bytes(
		&self,
		key: &str,
		value: Vec<u8>,
		ttl: Option<Duration>,
	) -> Result<(), StorageError>;

	/// Deletes the value associated with the given key.
	async fn delete(&self, key: &str) -> Result<(), StorageError>;

	/// Checks if a key exists in storage.
	async fn exists(&self, key: &str) -> Result<bool, StorageError>;

	/// Returns the values of every live key in a namespace.
	///
	/// Ordering is unspecified; callers sort as needed.
	async fn scan(&self, namespace: &str) -> Result<Vec<Vec<u8>>, StorageError>;

	/// Returns the configuration schema for validation.
	fn config_schema(&self) -> Box<dyn ConfigSchema>;

	/// Removes expired entries from storage (optional operation).
	/// Returns the number of entries removed.
	async fn cleanup_expired(&self) -> Result<usize, StorageError> {
		Ok(0)
	}
}

/// Type alias for storage factory functions.
pub type StorageFactory = fn(&toml::Value) -> Result<Box<dyn StorageInterface>, StorageError>;

/// Registry trait for storage implementations.
pub trait StorageRegistry: ImplementationRegistry<Factory = StorageFactory> {}

/// Get all registered storage implementations.
///
/// Returns a vector of (name, factory) tuples for all available storage implementations.
pub fn get_all_implementations() -> Vec<(&'static str, StorageFactory)> {
	use implementations::{file, memory};

	vec![
		(file::Registry::NAME, file::Registry::factory()),
		(memory::Registry::NAME, memory::Registry::factory()),
	]
}

/// Default bound applied to every backend call.
pub const DEFAULT_OPERATION_TIMEOUT: Duration = Duration::from_secs(5);

/// High-level storage service that provides typed operations.
///
/// The StorageService wraps a low-level storage backend and provides
/// convenient methods for storing, retrieving and querying typed documents
/// with automatic JSON serialization. Every backend call is bounded by the
/// operation timeout.
pub struct StorageService {
	/// The underlying storage backend implementation.
	backend: Box<dyn StorageInterface>,
	/// Upper bound for a single backend call.
	operation_timeout: Duration,
}

impl StorageService {
	/// Creates a new StorageService with the specified backend.
	pub fn new(backend: Box<dyn StorageInterface>) -> Self {
		Self::with_timeout(backend, DEFAULT_OPERATION_TIMEOUT)
	}

	/// Creates a new StorageService with an explicit per-call timeout.
	pub fn with_timeout(backend: Box<dyn StorageInterface>, operation_timeout: Duration) -> Self {
		Self {
			backend,
			operation_timeout,
		}
	}

	async fn bounded<T, F>(&self, operation: &'static str, fut: F) -> Result<T, StorageError>
	where
		F: Future<Output = Result<T, StorageError>>,
	{
		match tokio::time::timeout(self.operation_timeout, fut).await {
			Ok(result) => result,
			Err(_) => Err(StorageError::Timeout {
				operation,
				timeout_ms: self.operation_timeout.as_millis() as u64,
			}),
		}
	}

	fn key(namespace: &str, id: &str) -> String {
		format!("{}:{}", namespace, id)
	}

	/// Stores a serializable value, creating or overwriting it.
	pub async fn store<T: Serialize>(
		&self,
		namespace: &str,
		id: &str,
		data: &T,
	) -> Result<(), StorageError> {
		let key = Self::key(namespace, id);
		let bytes =
			serde_json::to_vec(data).map_err(|e| StorageError::Serialization(e.to_string()))?;
		self.bounded("set", self.backend.set_bytes(&key, bytes, None))
			.await
	}

	/// Retrieves and deserializes a value from storage.
	pub async fn retrieve<T: DeserializeOwned>(
		&self,
		namespace: &str,
		id: &str,
	) -> Result<T, StorageError> {
		let key = Self::key(namespace, id);
		let bytes = self.bounded("get", self.backend.get_bytes(&key)).await?;
		serde_json::from_slice(&bytes).map_err(|e| StorageError::Serialization(e.to_string()))
	}

	/// Updates an existing value in storage.
	///
	/// Returns `NotFound` if the key doesn't exist, making it semantically
	/// different from store() which will create or overwrite.
	pub async fn update<T: Serialize>(
		&self,
		namespace: &str,
		id: &str,
		data: &T,
	) -> Result<(), StorageError> {
		let key = Self::key(namespace, id);

		if !self.bounded("exists", self.backend.exists(&key)).await? {
			return Err(StorageError::NotFound);
		}

		let bytes =
			serde_json::to_vec(data).map_err(|e| StorageError::Serialization(e.to_string()))?;
		self.bounded("set", self.backend.set_bytes(&key, bytes, None))
			.await
	}

	/// Checks if a value exists in storage.
	pub async fn exists(&self, namespace: &str, id: &str) -> Result<bool, StorageError> {
		let key = Self::key(namespace, id);
		self.bounded("exists", self.backend.exists(&key)).await
	}

	/// Runs a field-equality query over every document in a namespace.
	///
	/// Documents that are not valid JSON, or that match but fail to
	/// deserialize into `T`, are skipped with a warning rather than failing
	/// the whole query.
	pub async fn query<T: DeserializeOwned>(
		&self,
		namespace: &str,
		query: &Query,
	) -> Result<Vec<T>, StorageError> {
		let raw = self.bounded("scan", self.backend.scan(namespace)).await?;

		let mut matches: Vec<serde_json::Value> = raw
			.iter()
			.filter_map(|bytes| match serde_json::from_slice::<serde_json::Value>(bytes) {
				Ok(doc) => Some(doc),
				Err(e) => {
					tracing::warn!(namespace, error = %e, "Skipping unreadable document");
					None
				},
			})
			.filter(|doc| field_at(doc, &query.field) == Some(&query.value))
			.collect();

		if let Some((field, order)) = &query.order_by {
			matches.sort_by(|a, b| {
				let ord = compare_fields(field_at(a, field), field_at(b, field));
				match order {
					SortOrder::Ascending => ord,
					SortOrder::Descending => ord.reverse(),
				}
			});
		}

		let limit = query.limit.unwrap_or(usize::MAX);
		let mut results = Vec::new();
		for doc in matches {
			if results.len() >= limit {
				break;
			}
			match serde_json::from_value::<T>(doc) {
				Ok(item) => results.push(item),
				Err(e) => {
					tracing::warn!(namespace, error = %e, "Skipping malformed document");
				},
			}
		}

		Ok(results)
	}

	/// Retrieves every readable document in a namespace, in unspecified order.
	///
	/// Documents that fail to deserialize into `T` are skipped with a warning.
	pub async fn retrieve_all<T: DeserializeOwned>(
		&self,
		namespace: &str,
	) -> Result<Vec<T>, StorageError> {
		let raw = self.bounded("scan", self.backend.scan(namespace)).await?;
		Ok(raw
			.iter()
			.filter_map(|bytes| match serde_json::from_slice::<T>(bytes) {
				Ok(item) => Some(item),
				Err(e) => {
					tracing::warn!(namespace, error = %e, "Skipping malformed document");
					None
				},
			})
			.collect())
	}

	/// Removes expired entries from storage.
	///
	/// Returns the number of entries that were removed.
	/// This is a no-op for backends that don't support TTL.
	pub async fn cleanup_expired(&self) -> Result<usize, StorageError> {
		self.bounded("cleanup", self.backend.cleanup_expired())
			.await
	}
}

/// Orders two optional JSON values: numbers numerically, strings
/// lexicographically, missing values last.
fn compare_fields(a: Option<&serde_json::Value>, b: Option<&serde_json::Value>) -> Ordering {
	use serde_json::Value;
	match (a, b) {
		(Some(Value::Number(x)), Some(Value::Number(y))) => x
			.as_f64()
			.partial_cmp(&y.as_f64())
			.unwrap_or(Ordering::Equal),
		(Some(Value::String(x)), Some(Value::String(y))) => x.cmp(y),
		(Some(_), None) => Ordering::Less,
		(None, Some(_)) => Ordering::Greater,
		_ => Ordering::Equal,
	}
}

#[cfg(test)]
mod tests {
	use super::implementations::memory::MemoryStorage;
	use super::*;
	use fulfillment_types::Schema;
	use serde::Deserialize;

	#[derive(Debug, Serialize, Deserialize, PartialEq)]
	struct Doc {
		id: String,
		status: String,
		created_at: u64,
	}

	fn doc(id: &str, status: &str, created_at: u64) -> Doc {
		Doc {
			id: id.into(),
			status: status.into(),
			created_at,
		}
	}

	#[tokio::test]
	async fn test_update_requires_existing_key() {
		let storage = StorageService::new(Box::new(MemoryStorage::new()));
		let result = storage.update("orders", "a", &doc("a", "paid", 1)).await;
		assert!(matches!(result, Err(StorageError::NotFound)));

		storage.store("orders", "a", &doc("a", "validated", 1)).await.unwrap();
		storage.update("orders", "a", &doc("a", "paid", 1)).await.unwrap();
		let stored: Doc = storage.retrieve("orders", "a").await.unwrap();
		assert_eq!(stored.status, "paid");
	}

	#[tokio::test]
	async fn test_query_filters_sorts_and_limits() {
		let storage = StorageService::new(Box::new(MemoryStorage::new()));
		storage.store("orders", "a", &doc("a", "validated", 10)).await.unwrap();
		storage.store("orders", "b", &doc("b", "paid", 20)).await.unwrap();
		storage.store("orders", "c", &doc("c", "validated", 30)).await.unwrap();
		storage.store("orders", "d", &doc("d", "validated", 5)).await.unwrap();
		storage.store("batches", "e", &doc("e", "validated", 50)).await.unwrap();

		let query = Query::field_equals("status", "validated")
			.order_by("created_at", SortOrder::Descending)
			.limit(2);
		let found: Vec<Doc> = storage.query("orders", &query).await.unwrap();
		let ids: Vec<&str> = found.iter().map(|d| d.id.as_str()).collect();
		assert_eq!(ids, vec!["c", "a"]);
	}

	#[tokio::test]
	async fn test_query_skips_malformed_documents() {
		let backend = MemoryStorage::new();
		backend
			.set_bytes("orders:bad", b"{not json".to_vec(), None)
			.await
			.unwrap();
		backend
			.set_bytes(
				"orders:partial",
				br#"{"id":"partial","status":"validated"}"#.to_vec(),
				None,
			)
			.await
			.unwrap();
		let storage = StorageService::new(Box::new(backend));
		storage.store("orders", "ok", &doc("ok", "validated", 1)).await.unwrap();

		let found: Vec<Doc> = storage
			.query("orders", &Query::field_equals("status", "validated"))
			.await
			.unwrap();
		assert_eq!(found, vec![doc("ok", "validated", 1)]);
	}

	struct SlowStorage;

	struct NoSchema;

	impl ConfigSchema for NoSchema {
		fn validate(&self, config: &toml::Value) -> Result<(), fulfillment_types::ValidationError> {
			Schema::new(vec![], vec![]).validate(config)
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
			Ok(())
		}

		async fn delete(&self, _key: &str) -> Result<(), StorageError> {
			Ok(())
		}

		async fn exists(&self, _key: &str) -> Result<bool, StorageError> {
			Ok(false)
		}

		async fn scan(&self, _namespace: &str) -> Result<Vec<Vec<u8>>, StorageError> {
			Ok(vec![])
		}

		fn config_schema(&self) -> Box<dyn ConfigSchema> {
			Box::new(NoSchema)
		}
	}

	#[tokio::test(start_paused = true)]
	async fn test_backend_call_times_out() {
		let storage =
			StorageService::with_timeout(Box::new(SlowStorage), Duration::from_millis(50));
		let result: Result<Doc, _> = storage.retrieve("orders", "a").await;
		assert!(matches!(
			result,
			Err(StorageError::Timeout {
				operation: "get",
				timeout_ms: 50
			})
		));
	}
}
