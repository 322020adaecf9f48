//! Main entry point for the fulfillment service.
//!
//! Loads the configuration, wires the storage backend, notification sink and
//! batching strategies named in it, then runs the engine and, when enabled,
//! the HTTP API until interrupted.

use clap::Parser;
use fulfillment_config::Config;
use std::path::PathBuf;
use std::sync::Arc;

mod apis;
mod factory_registry;
mod server;

/// Command-line arguments for the fulfillment service.
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

	tracing::info!("Started fulfillment service");

	let config = Config::from_file(&args.config.to_string_lossy()).await?;
	tracing::info!("Loaded configuration [{}]", config.service.id);

	let api_config = config.api.clone().filter(|api| api.enabled);

	let engine = Arc::new(factory_registry::build_engine_from_config(config)?);

	match api_config {
		Some(api_config) => {
			let engine_task = engine.run();
			let api_task = server::start_server(api_config, Arc::clone(&engine));

			tokio::select! {
				result = engine_task => {
					tracing::info!("Engine finished");
					result?;
				}
				result = api_task => {
					tracing::info!("API server finished");
					result?;
				}
			}
		},
		None => {
			tracing::info!("Starting engine only");
			engine.run().await?;
		},
	}

	tracing::info!("Stopped fulfillment service");
	Ok(())
}

#[cfg(test)]
mod tests {
	use super::*;
	use tempfile::tempdir;

	#[test]
	fn test_args_default_values() {
		let args = Args::parse_from(["fulfillment"]);
		assert_eq!(args.config, PathBuf::from("config.toml"));
		assert_eq!(args.log_level, "info");
	}

	#[test]
	fn test_args_custom_values() {
		let args = Args::parse_from(["fulfillment", "-c", "custom.toml", "--log-level", "debug"]);
		assert_eq!(args.config, PathBuf::from("custom.toml"));
		assert_eq!(args.log_level, "debug");
	}

	#[tokio::test]
	async fn test_build_engine_from_file_config() {
		let temp_dir = tempdir().unwrap();
		let config_path = temp_dir.path().join("fulfillment.toml");

		let config_content = r#"
[service]
id = "file-fulfillment"

[storage]
primary = "file"
[storage.implementations.file]
storage_path = "STORAGE_DIR"

[notifications]
primary = "log"
notify_on = ["delivered"]
[notifications.implementations.log]

[batching]
strategies = ["region", "product"]
[batching.implementations.region]
min_orders = 2
"#
		.replace("STORAGE_DIR", &temp_dir.path().join("data").to_string_lossy());
		std::fs::write(&config_path, config_content).unwrap();

		let config = Config::from_file(&config_path.to_string_lossy())
			.await
			.unwrap();
		assert_eq!(config.service.id, "file-fulfillment");
		assert!(config.api.is_none());

		let engine = factory_registry::build_engine_from_config(config).unwrap();
		assert!(engine.suggest_batches().await.unwrap().is_empty());
		engine.shutdown().await.unwrap();
	}
}
