//! Builder for the order engine.
//!
//! Resolves the configured storage backend through a factory map, wraps it
//! in a [`StorageService`] and wires the repository and engine on top.

use crate::engine::OrderEngine;
use crate::repository::StoredOrderRepository;
use courier_config::Config;
use courier_storage::{StorageError, StorageInterface, StorageService};
use std::collections::HashMap;
use std::sync::Arc;
use thiserror::Error;

/// Errors that can occur while building the engine.
#[derive(Debug, Error)]
pub enum BuilderError {
	#[error("Configuration error: {0}")]
	Config(String),
	#[error("Missing required component: {0}")]
	MissingComponent(String),
}

/// Builds an [`OrderEngine`] from configuration and backend factories.
pub struct CourierBuilder {
	config: Config,
}

impl CourierBuilder {
	pub fn new(config: Config) -> Self {
		Self { config }
	}

	/// Instantiates every configured storage backend that has a factory and
	/// builds the engine on the primary one.
	pub fn build<SF>(self, storage_factories: HashMap<String, SF>) -> Result<OrderEngine, BuilderError>
	where
		SF: Fn(&toml::Value) -> Result<Box<dyn StorageInterface>, StorageError>,
	{
		let primary = &self.config.storage.primary;
		if !storage_factories.contains_key(primary) {
			return Err(BuilderError::MissingComponent(format!(
				"No storage implementation named '{}' is available",
				primary
			)));
		}

		let mut storage_impls = HashMap::new();
		for (name, config) in &self.config.storage.implementations {
			let Some(factory) = storage_factories.get(name) else {
				tracing::warn!(component = "storage", implementation = %name, "Unknown implementation, skipping");
				continue;
			};
			match factory(config) {
				Ok(implementation) => {
					let is_primary = primary == name;
					tracing::info!(component = "storage", implementation = %name, enabled = %is_primary, "Loaded");
					storage_impls.insert(name.clone(), implementation);
				},
				Err(e) => {
					tracing::error!(
						component = "storage",
						implementation = %name,
						error = %e,
						"Failed to create storage implementation"
					);
					return Err(BuilderError::Config(format!(
						"Failed to create storage implementation '{}': {}",
						name, e
					)));
				},
			}
		}

		let backend = storage_impls.remove(primary).ok_or_else(|| {
			BuilderError::Config(format!(
				"Primary storage '{}' failed to load or has invalid configuration",
				primary
			))
		})?;

		let storage = Arc::new(StorageService::new(backend));
		let repository = Arc::new(StoredOrderRepository::new(storage));

		Ok(OrderEngine::new(
			repository,
			self.config.lifecycle.conflict_retries,
		))
	}
}
