//! Main entry point for the courier service.
//!
//! Loads configuration, builds the order engine on the configured storage
//! backend and serves the HTTP API.

use clap::Parser;
use courier_config::Config;
use courier_core::{CourierBuilder, OrderEngine};
use courier_service::server;
use courier_storage::implementations::file::create_storage as create_file_storage;
use courier_storage::implementations::memory::create_storage as create_memory_storage;
use std::path::PathBuf;

/// Command-line arguments for the courier service.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
	/// Path to configuration file
	#[arg(short, long, default_value = "config.toml")]
	config: PathBuf,

	/// Log level (trace, debug, info, warn, error)
	#[arg(short, long, default_value = "info")]
	log_level: String,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
	let args = Args::parse();

	use tracing_subscriber::{fmt, EnvFilter};

	let env_filter =
		EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&args.log_level));

	fmt()
		.with_env_filter(env_filter)
		.with_thread_ids(true)
		.with_target(true)
		.init();

	tracing::info!("Started courier");

	let config = Config::from_file(&args.config).await?;
	tracing::info!("Loaded configuration [{}]", config.service.id);

	let engine = build_engine(config.clone())?;

	match config.api {
		Some(api_config) if api_config.enabled => {
			server::start_server(api_config, engine).await?;
		},
		_ => {
			tracing::warn!("API server is disabled, nothing to serve");
		},
	}

	tracing::info!("Stopped courier");
	Ok(())
}

/// Macro to create a factory HashMap with the appropriate type aliases
macro_rules! create_factory_map {
    ($interface:path, $error:path, $( $name:literal => $factory:expr ),* $(,)?) => {{
        let mut factories = std::collections::HashMap::new();
        $(
            factories.insert(
                $name.to_string(),
                $factory as fn(&toml::Value) -> Result<Box<dyn $interface>, $error>
            );
        )*
        factories
    }};
}

/// Builds the order engine with the available storage backends.
fn build_engine(config: Config) -> Result<OrderEngine, Box<dyn std::error::Error>> {
	let storage_factories = create_factory_map!(
		courier_storage::StorageInterface,
		courier_storage::StorageError,
		"file" => create_file_storage,
		"memory" => create_memory_storage,
	);

	Ok(CourierBuilder::new(config).build(storage_factories)?)
}

#[cfg(test)]
mod tests {
	use super::*;
	use courier_config::ConfigBuilder;

	#[test]
	fn test_args_defaults() {
		let args = Args::parse_from(["courier"]);
		assert_eq!(args.config, PathBuf::from("config.toml"));
		assert_eq!(args.log_level, "info");
	}

	#[test]
	fn test_args_custom_values() {
		let args = Args::parse_from(["courier", "--config", "custom.toml", "-l", "debug"]);
		assert_eq!(args.config, PathBuf::from("custom.toml"));
		assert_eq!(args.log_level, "debug");
	}

	#[test]
	fn test_storage_factories_creation() {
		let factories = create_factory_map!(
			courier_storage::StorageInterface,
			courier_storage::StorageError,
			"file" => create_file_storage,
			"memory" => create_memory_storage,
		);

		assert_eq!(factories.len(), 2);
		assert!(factories.contains_key("file"));
		assert!(factories.contains_key("memory"));
	}

	#[tokio::test]
	async fn test_build_engine_with_minimal_config() {
		let engine = build_engine(ConfigBuilder::new().build()).unwrap();
		assert_eq!(engine.get_oldest_pending().await.unwrap(), None);
	}

	#[tokio::test]
	async fn test_build_engine_from_file() {
		let dir = tempfile::tempdir().unwrap();
		let path = dir.path().join("config.toml");
		std::fs::write(
			&path,
			format!(
				r#"
[service]
id = "courier-file-test"

[storage]
primary = "file"

[storage.implementations.file]
storage_path = "{}"

[api]
enabled = true
port = 0
"#,
				dir.path().join("data").display()
			),
		)
		.unwrap();

		let config = Config::from_file(&path).await.unwrap();
		assert_eq!(config.service.id, "courier-file-test");
		assert!(build_engine(config).is_ok());
	}
}
