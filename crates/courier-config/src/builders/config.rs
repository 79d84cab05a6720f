//! Configuration builder for tests and local development.

use crate::{ApiConfig, Config, LifecycleConfig, ServiceConfig, StorageConfig};
use std::collections::HashMap;

/// Builds a valid `Config` without going through TOML.
///
/// Defaults to the in-memory storage backend and no API section.
#[derive(Debug, Clone)]
pub struct ConfigBuilder {
	service_id: String,
	storage_primary: String,
	storage_implementations: HashMap<String, toml::Value>,
	conflict_retries: u32,
	api: Option<ApiConfig>,
}

impl Default for ConfigBuilder {
	fn default() -> Self {
		Self::new()
	}
}

impl ConfigBuilder {
	pub fn new() -> Self {
		let mut storage_implementations = HashMap::new();
		storage_implementations.insert(
			"memory".to_string(),
			toml::Value::Table(toml::map::Map::new()),
		);

		Self {
			service_id: "courier-test".to_string(),
			storage_primary: "memory".to_string(),
			storage_implementations,
			conflict_retries: LifecycleConfig::default().conflict_retries,
			api: None,
		}
	}

	/// Sets the service ID.
	pub fn service_id(mut self, id: impl Into<String>) -> Self {
		self.service_id = id.into();
		self
	}

	/// Adds (or replaces) a storage implementation and makes it primary.
	pub fn storage(mut self, name: impl Into<String>, config: toml::Value) -> Self {
		let name = name.into();
		self.storage_implementations.insert(name.clone(), config);
		self.storage_primary = name;
		self
	}

	/// Sets the number of conflict retries for conditional writes.
	pub fn conflict_retries(mut self, retries: u32) -> Self {
		self.conflict_retries = retries;
		self
	}

	/// Sets the API configuration.
	pub fn api(mut self, api: Option<ApiConfig>) -> Self {
		self.api = api;
		self
	}

	pub fn build(self) -> Config {
		Config {
			service: ServiceConfig {
				id: self.service_id,
			},
			storage: StorageConfig {
				primary: self.storage_primary,
				implementations: self.storage_implementations,
			},
			lifecycle: LifecycleConfig {
				conflict_retries: self.conflict_retries,
			},
			api: self.api,
		}
	}
}
