//! Storage module for the courier system.
//!
//! This module provides abstractions for durable storage of order records,
//! with interchangeable backends (in-memory or file-based). Backends expose a
//! small byte-oriented interface including a conditional write, which is what
//! makes read-decide-write cycles on a single record atomic.

use async_trait::async_trait;
use courier_types::{ImplementationRegistry, StorageKey};
use serde::{de::DeserializeOwned, Serialize};
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
	/// Error that occurs during configuration validation.
	#[error("Configuration error: {0}")]
	Configuration(String),
}

/// Low-level interface every storage backend implements.
///
/// Keys are `namespace:id` strings; values are opaque bytes.
#[async_trait]
pub trait StorageInterface: Send + Sync {
	/// Retrieves raw bytes for the given key.
	async fn get_bytes(&self, key: &str) -> Result<Vec<u8>, StorageError>;

	/// Writes `value` only if the current value equals `expected`.
	///
	/// `expected = None` means the key must be absent. Returns `false`
	/// without writing when the current value differs. The comparison and the
	/// write happen atomically with respect to other calls on this backend.
	async fn compare_and_swap(
		&self,
		key: &str,
		expected: Option<&[u8]>,
		value: Vec<u8>,
	) -> Result<bool, StorageError>;

	/// Returns every entry whose key starts with `prefix`, sorted by key.
	///
	/// The result is a consistent snapshot: no write is observed half-way.
	async fn scan_prefix(&self, prefix: &str) -> Result<Vec<(String, Vec<u8>)>, StorageError>;
}

/// Type alias for storage factory functions.
pub type StorageFactory = fn(&toml::Value) -> Result<Box<dyn StorageInterface>, StorageError>;

/// Registry trait for storage implementations.
pub trait StorageRegistry: ImplementationRegistry<Factory = StorageFactory> {}

/// Get all registered storage implementations as (name, factory) pairs.
pub fn get_all_implementations() -> Vec<(&'static str, StorageFactory)> {
	use implementations::{file, memory};

	vec![
		(file::Registry::NAME, file::Registry::factory()),
		(memory::Registry::NAME, memory::Registry::factory()),
	]
}

/// A value read from storage together with the exact bytes it came from.
///
/// Passing it back to [`StorageService::replace`] makes the write conditional
/// on nobody having changed the record in between.
#[derive(Debug, Clone)]
pub struct Versioned<T> {
	pub value: T,
	raw: Vec<u8>,
}

impl<T> Versioned<T> {
	pub fn into_inner(self) -> T {
		self.value
	}
}

/// High-level storage service that provides typed operations.
///
/// Wraps a backend and serializes values as JSON under
/// `namespace:id` keys.
pub struct StorageService {
	backend: Box<dyn StorageInterface>,
}

fn storage_key(namespace: StorageKey, id: &str) -> String {
	format!("{}{}", namespace.prefix(), id)
}

fn encode<T: Serialize>(data: &T) -> Result<Vec<u8>, StorageError> {
	serde_json::to_vec(data).map_err(|e| StorageError::Serialization(e.to_string()))
}

fn decode<T: DeserializeOwned>(bytes: &[u8]) -> Result<T, StorageError> {
	serde_json::from_slice(bytes).map_err(|e| StorageError::Serialization(e.to_string()))
}

impl StorageService {
	/// Creates a new StorageService with the specified backend.
	pub fn new(backend: Box<dyn StorageInterface>) -> Self {
		Self { backend }
	}

	/// Stores a value only if nothing is stored under the key yet.
	///
	/// Returns `false` if the key was already taken.
	pub async fn insert_new<T: Serialize>(
		&self,
		namespace: StorageKey,
		id: &str,
		data: &T,
	) -> Result<bool, StorageError> {
		let bytes = encode(data)?;
		self.backend
			.compare_and_swap(&storage_key(namespace, id), None, bytes)
			.await
	}

	/// Retrieves a value, mapping a missing key to `None`.
	pub async fn retrieve_versioned<T: DeserializeOwned>(
		&self,
		namespace: StorageKey,
		id: &str,
	) -> Result<Option<Versioned<T>>, StorageError> {
		match self.backend.get_bytes(&storage_key(namespace, id)).await {
			Ok(raw) => Ok(Some(Versioned {
				value: decode(&raw)?,
				raw,
			})),
			Err(StorageError::NotFound) => Ok(None),
			Err(e) => Err(e),
		}
	}

	/// Replaces a previously read value if it is still unchanged.
	///
	/// Returns `false` when another writer got there first; the caller is
	/// expected to re-read and decide again.
	pub async fn replace<T: Serialize>(
		&self,
		namespace: StorageKey,
		id: &str,
		current: &Versioned<T>,
		data: &T,
	) -> Result<bool, StorageError> {
		let bytes = encode(data)?;
		self.backend
			.compare_and_swap(&storage_key(namespace, id), Some(&current.raw), bytes)
			.await
	}

	/// Reads every record of a namespace as `(id, value)` pairs.
	///
	/// Ids are returned without the namespace prefix, in key order.
	pub async fn scan<T: DeserializeOwned>(
		&self,
		namespace: StorageKey,
	) -> Result<Vec<(String, T)>, StorageError> {
		let prefix = namespace.prefix();
		let entries = self.backend.scan_prefix(&prefix).await?;
		entries
			.into_iter()
			.map(|(key, bytes)| {
				let id = key[prefix.len()..].to_string();
				Ok((id, decode(&bytes)?))
			})
			.collect()
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use implementations::memory::MemoryStorage;
	use serde::Deserialize;

	#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
	struct Parcel {
		label: String,
		weight: u32,
	}

	fn service() -> StorageService {
		StorageService::new(Box::new(MemoryStorage::new()))
	}

	async fn read<T: DeserializeOwned>(storage: &StorageService, id: &str) -> Option<T> {
		storage
			.retrieve_versioned::<T>(StorageKey::Orders, id)
			.await
			.unwrap()
			.map(Versioned::into_inner)
	}

	#[tokio::test]
	async fn test_insert_and_retrieve() {
		let storage = service();
		let parcel = Parcel {
			label: "a".into(),
			weight: 3,
		};

		assert!(storage.insert_new(StorageKey::Orders, "1", &parcel).await.unwrap());
		assert_eq!(read::<Parcel>(&storage, "1").await, Some(parcel));
		assert_eq!(read::<Parcel>(&storage, "2").await, None);

		let other_namespace = storage
			.retrieve_versioned::<Parcel>(StorageKey::Sequences, "1")
			.await
			.unwrap();
		assert!(other_namespace.is_none());
	}

	#[tokio::test]
	async fn test_insert_new_refuses_taken_key() {
		let storage = service();
		assert!(storage.insert_new(StorageKey::Orders, "1", &1u32).await.unwrap());
		assert!(!storage.insert_new(StorageKey::Orders, "1", &2u32).await.unwrap());
		assert_eq!(read::<u32>(&storage, "1").await, Some(1));
	}

	#[tokio::test]
	async fn test_undecodable_record_is_an_error() {
		let storage = service();
		storage.insert_new(StorageKey::Orders, "1", &"text").await.unwrap();
		assert!(matches!(
			storage.retrieve_versioned::<u32>(StorageKey::Orders, "1").await,
			Err(StorageError::Serialization(_))
		));
	}

	#[tokio::test]
	async fn test_replace_detects_concurrent_change() {
		let storage = service();
		storage.insert_new(StorageKey::Orders, "1", &10u32).await.unwrap();

		let first = storage
			.retrieve_versioned::<u32>(StorageKey::Orders, "1")
			.await
			.unwrap()
			.unwrap();
		let second = first.clone();

		assert!(storage.replace(StorageKey::Orders, "1", &first, &11).await.unwrap());
		assert!(!storage.replace(StorageKey::Orders, "1", &second, &12).await.unwrap());
		assert_eq!(read::<u32>(&storage, "1").await, Some(11));
	}

	#[tokio::test]
	async fn test_retrieve_versioned_missing_is_none() {
		let storage = service();
		let missing = storage
			.retrieve_versioned::<u32>(StorageKey::Orders, "404")
			.await
			.unwrap();
		assert!(missing.is_none());
	}

	#[tokio::test]
	async fn test_scan_strips_prefix_and_skips_other_namespaces() {
		let storage = service();
		storage.insert_new(StorageKey::Orders, "2", &2u32).await.unwrap();
		storage.insert_new(StorageKey::Orders, "1", &1u32).await.unwrap();
		storage.insert_new(StorageKey::Sequences, "orders", &7u32).await.unwrap();

		let orders: Vec<(String, u32)> = storage.scan(StorageKey::Orders).await.unwrap();
		assert_eq!(orders, vec![("1".to_string(), 1), ("2".to_string(), 2)]);
	}

	#[test]
	fn test_all_implementations_registered() {
		let names: Vec<_> = get_all_implementations().into_iter().map(|(n, _)| n).collect();
		assert_eq!(names, vec!["file", "memory"]);
	}
}
