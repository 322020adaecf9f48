//! In-memory storage backend.
//!
//! Keeps documents in a HashMap behind an async read-write lock. Useful for
//! tests and single-process deployments where persistence across restarts
//! is not required. TTLs are honoured on read and by `cleanup_expired`.

use crate::{StorageError, StorageInterface};
use async_trait::async_trait;
use fulfillment_types::{ConfigSchema, ImplementationRegistry, Schema, ValidationError};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tokio::time::Instant;

struct Entry {
	value: Vec<u8>,
	expires_at: Option<Instant>,
}

impl Entry {
	fn is_live(&self, now: Instant) -> bool {
		self.expires_at.is_none_or(|at| now < at)
	}
}

/// In-memory storage implementation.
pub struct MemoryStorage {
	store: Arc<RwLock<HashMap<String, Entry>>>,
}

impl MemoryStorage {
	/// Creates a new MemoryStorage instance.
	pub fn new() -> Self {
		Self {
			store: Arc::new(RwLock::new(HashMap::new())),
		}
	}
}

impl Default for MemoryStorage {
	fn default() -> Self {
		Self::new()
	}
}

#[async_trait]
impl StorageInterface for MemoryStorage {
	async fn get_bytes(&self, key: &str) -> Result<Vec<u8>, StorageError> {
		let store = self.store.read().await;
		store
			.get(key)
			.filter(|entry| entry.is_live(Instant::now()))
			.map(|entry| entry.value.clone())
			.ok_or(StorageError::NotFound)
	}

	async fn set_bytes(
		&self,
		key: &str,
		value: Vec<u8>,
		ttl: Option<Duration>,
	) -> Result<(), StorageError> {
		let expires_at = ttl
			.filter(|ttl| !ttl.is_zero())
			.map(|ttl| Instant::now() + ttl);
		let mut store = self.store.write().await;
		store.insert(key.to_string(), Entry { value, expires_at });
		Ok(())
	}

	async fn delete(&self, key: &str) -> Result<(), StorageError> {
		let mut store = self.store.write().await;
		store.remove(key);
		Ok(())
	}

	async fn exists(&self, key: &str) -> Result<bool, StorageError> {
		let store = self.store.read().await;
		Ok(store
			.get(key)
			.is_some_and(|entry| entry.is_live(Instant::now())))
	}

	async fn scan(&self, namespace: &str) -> Result<Vec<Vec<u8>>, StorageError> {
		let prefix = format!("{}:", namespace);
		let now = Instant::now();
		let store = self.store.read().await;
		Ok(store
			.iter()
			.filter(|(key, entry)| key.starts_with(&prefix) && entry.is_live(now))
			.map(|(_, entry)| entry.value.clone())
			.collect())
	}

	fn config_schema(&self) -> Box<dyn ConfigSchema> {
		Box::new(MemoryStorageSchema)
	}

	async fn cleanup_expired(&self) -> Result<usize, StorageError> {
		let now = Instant::now();
		let mut store = self.store.write().await;
		let before = store.len();
		store.retain(|_, entry| entry.is_live(now));
		Ok(before - store.len())
	}
}

/// Configuration schema for MemoryStorage.
pub struct MemoryStorageSchema;

impl ConfigSchema for MemoryStorageSchema {
	fn validate(&self, config: &toml::Value) -> Result<(), ValidationError> {
		Schema::new(vec![], vec![]).validate(config)
	}
}

/// Factory function to create a memory storage backend from configuration.
///
/// Memory storage takes no configuration parameters.
pub fn create_storage(_config: &toml::Value) -> Result<Box<dyn StorageInterface>, StorageError> {
	Ok(Box::new(MemoryStorage::new()))
}

/// Registry for the memory storage implementation.
pub struct Registry;

impl ImplementationRegistry for Registry {
	const NAME: &'static str = "memory";
	type Factory = crate::StorageFactory;

	fn factory() -> Self::Factory {
		create_storage
	}
}

impl crate::StorageRegistry for Registry {}

#[cfg(test)]
mod tests {
	use super::*;

	#[tokio::test]
	async fn test_basic_operations() {
		let storage = MemoryStorage::new();

		let key = "orders:a";
		let value = b"test_value".to_vec();
		storage.set_bytes(key, value.clone(), None).await.unwrap();
		assert_eq!(storage.get_bytes(key).await.unwrap(), value);
		assert!(storage.exists(key).await.unwrap());

		storage.delete(key).await.unwrap();
		assert!(!storage.exists(key).await.unwrap());
		assert!(matches!(
			storage.get_bytes(key).await,
			Err(StorageError::NotFound)
		));
	}

	#[tokio::test]
	async fn test_scan_is_namespaced() {
		let storage = MemoryStorage::new();
		storage.set_bytes("orders:a", b"1".to_vec(), None).await.unwrap();
		storage.set_bytes("orders:b", b"2".to_vec(), None).await.unwrap();
		storage.set_bytes("batches:a", b"3".to_vec(), None).await.unwrap();
		storage.set_bytes("ordersx:a", b"4".to_vec(), None).await.unwrap();

		let mut values = storage.scan("orders").await.unwrap();
		values.sort();
		assert_eq!(values, vec![b"1".to_vec(), b"2".to_vec()]);
	}

	#[tokio::test(start_paused = true)]
	async fn test_ttl_expiry_and_cleanup() {
		let storage = MemoryStorage::new();
		storage
			.set_bytes("orders:short", b"x".to_vec(), Some(Duration::from_secs(10)))
			.await
			.unwrap();
		storage.set_bytes("orders:long", b"y".to_vec(), None).await.unwrap();

		tokio::time::advance(Duration::from_secs(11)).await;

		assert!(!storage.exists("orders:short").await.unwrap());
		assert_eq!(storage.scan("orders").await.unwrap(), vec![b"y".to_vec()]);
		assert_eq!(storage.cleanup_expired().await.unwrap(), 1);
		assert_eq!(storage.cleanup_expired().await.unwrap(), 0);
	}
}
