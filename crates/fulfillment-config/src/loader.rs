//! Configuration loader module for handling modular configuration files.
//!
//! Loads a root configuration file plus any files it names in `include`,
//! resolving environment variables in each and rejecting a top-level section
//! that appears in more than one file.

use crate::{resolve_env_vars, Config, ConfigError};
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};

/// Configuration loader that handles multi-file configurations with includes.
pub struct ConfigLoader {
	/// Base path for resolving relative includes.
	base_path: PathBuf,
	/// Canonical paths already read, to break include cycles.
	loaded_files: HashSet<PathBuf>,
	/// Which file each top-level section came from, for error messages.
	section_sources: HashMap<String, PathBuf>,
}

impl ConfigLoader {
	pub fn new(base_path: impl AsRef<Path>) -> Self {
		Self {
			base_path: base_path.as_ref().to_path_buf(),
			loaded_files: HashSet::new(),
			section_sources: HashMap::new(),
		}
	}

	/// Loads a configuration file and all of its includes, then validates
	/// the merged result.
	pub async fn load_config(
		&mut self,
		config_path: impl AsRef<Path>,
	) -> Result<Config, ConfigError> {
		let root_path = self.resolve_path(config_path)?;
		let mut root = self.read_toml(&root_path).await?;

		let includes = match root.as_table_mut() {
			Some(table) => Self::take_includes(table)?,
			None => Vec::new(),
		};
		self.record_sections(&root, &root_path)?;

		for include in includes {
			let include_path = self.resolve_path(&include)?;
			let included = self.read_toml(&include_path).await?;
			self.record_sections(&included, &include_path)?;

			if let (Some(target), toml::Value::Table(source)) = (root.as_table_mut(), included) {
				target.extend(source);
			}
		}

		let merged = toml::to_string(&root).map_err(|e| {
			ConfigError::Parse(format!("Failed to serialize combined config: {}", e))
		})?;
		merged.parse()
	}

	/// Reads a file, substitutes environment variables and parses it as TOML.
	async fn read_toml(&mut self, path: &Path) -> Result<toml::Value, ConfigError> {
		let canonical = tokio::fs::canonicalize(path).await.map_err(|e| {
			ConfigError::Io(std::io::Error::new(
				e.kind(),
				format!("Cannot resolve path {}: {}", path.display(), e),
			))
		})?;

		if !self.loaded_files.insert(canonical.clone()) {
			return Err(ConfigError::Validation(format!(
				"Circular include detected: {} was already loaded",
				canonical.display()
			)));
		}

		let content = tokio::fs::read_to_string(&canonical).await?;
		Ok(toml::from_str(&resolve_env_vars(&content)?)?)
	}

	/// Removes the `include` directive from a table and returns its paths.
	fn take_includes(table: &mut toml::Table) -> Result<Vec<PathBuf>, ConfigError> {
		match table.remove("include") {
			None => Ok(Vec::new()),
			Some(toml::Value::String(path)) => Ok(vec![PathBuf::from(path)]),
			Some(toml::Value::Array(items)) => items
				.into_iter()
				.map(|item| match item {
					toml::Value::String(path) => Ok(PathBuf::from(path)),
					_ => Err(ConfigError::Validation(
						"Include array must contain only strings".into(),
					)),
				})
				.collect(),
			Some(_) => Err(ConfigError::Validation(
				"Include must be a string or array of strings".into(),
			)),
		}
	}

	/// Registers every top-level section of `value` as coming from `source`,
	/// failing if another file already defined it.
	fn record_sections(&mut self, value: &toml::Value, source: &Path) -> Result<(), ConfigError> {
		let Some(table) = value.as_table() else {
			return Ok(());
		};
		for key in table.keys() {
			if let Some(existing) = self.section_sources.get(key) {
				return Err(ConfigError::Validation(format!(
					"Duplicate section '{}' found in {} and {}. \
					Each top-level section must be unique across all configuration files.",
					key,
					existing.display(),
					source.display()
				)));
			}
			self.section_sources
				.insert(key.clone(), source.to_path_buf());
		}
		Ok(())
	}

	/// Resolves a path relative to the base path and checks that it exists.
	fn resolve_path(&self, path: impl AsRef<Path>) -> Result<PathBuf, ConfigError> {
		let path = path.as_ref();
		let resolved = if path.is_absolute() {
			path.to_path_buf()
		} else {
			self.base_path.join(path)
		};

		if !resolved.exists() {
			return Err(ConfigError::Io(std::io::Error::new(
				std::io::ErrorKind::NotFound,
				format!("Configuration file not found: {}", resolved.display()),
			)));
		}

		Ok(resolved)
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use std::fs;
	use tempfile::TempDir;

	const SERVICE: &str = r#"
[service]
id = "fulfillment-test"
"#;

	const BACKENDS: &str = r#"
[storage]
primary = "file"
cleanup_interval_seconds = 600
[storage.implementations.file]
storage_path = "./data/storage"

[notifications]
primary = "log"
[notifications.implementations.log]
"#;

	#[tokio::test]
	async fn test_single_file_config() {
		let temp_dir = TempDir::new().unwrap();
		let config_path = temp_dir.path().join("config.toml");
		fs::write(&config_path, format!("{}{}", SERVICE, BACKENDS)).unwrap();

		let mut loader = ConfigLoader::new(temp_dir.path());
		let config = loader.load_config(&config_path).await.unwrap();

		assert_eq!(config.service.id, "fulfillment-test");
		assert_eq!(config.storage.cleanup_interval_seconds, 600);
	}

	#[tokio::test]
	async fn test_config_with_includes() {
		let temp_dir = TempDir::new().unwrap();

		let main_config = format!("include = [\"backends.toml\", \"batching.toml\"]\n{}", SERVICE);
		let batching_config = r#"
[batching]
working_set_limit = 50
strategies = ["product", "region"]
"#;

		fs::write(temp_dir.path().join("main.toml"), main_config).unwrap();
		fs::write(temp_dir.path().join("backends.toml"), BACKENDS).unwrap();
		fs::write(temp_dir.path().join("batching.toml"), batching_config).unwrap();

		let mut loader = ConfigLoader::new(temp_dir.path());
		let config = loader.load_config("main.toml").await.unwrap();

		assert_eq!(config.service.id, "fulfillment-test");
		assert_eq!(config.storage.primary, "file");
		assert_eq!(config.batching.working_set_limit, 50);
		assert_eq!(config.batching.strategies, vec!["product", "region"]);
	}

	#[tokio::test]
	async fn test_duplicate_section_error() {
		let temp_dir = TempDir::new().unwrap();

		let main_config = format!("include = [\"duplicate.toml\"]\n{}{}", SERVICE, BACKENDS);
		let duplicate_config = r#"
[service]
id = "another-service"
"#;

		fs::write(temp_dir.path().join("main.toml"), main_config).unwrap();
		fs::write(temp_dir.path().join("duplicate.toml"), duplicate_config).unwrap();

		let mut loader = ConfigLoader::new(temp_dir.path());
		let error_msg = loader.load_config("main.toml").await.unwrap_err().to_string();
		assert!(error_msg.contains("Duplicate section 'service'"));
	}

	#[tokio::test]
	async fn test_self_include_detection() {
		let temp_dir = TempDir::new().unwrap();
		let config = format!("include = [\"self.toml\"]\n{}", SERVICE);
		fs::write(temp_dir.path().join("self.toml"), config).unwrap();

		let mut loader = ConfigLoader::new(temp_dir.path());
		let error_msg = loader.load_config("self.toml").await.unwrap_err().to_string();
		assert!(error_msg.contains("already loaded"));
	}

	#[tokio::test]
	async fn test_missing_include_reported() {
		let temp_dir = TempDir::new().unwrap();
		let config = format!("include = \"nope.toml\"\n{}", SERVICE);
		fs::write(temp_dir.path().join("main.toml"), config).unwrap();

		let mut loader = ConfigLoader::new(temp_dir.path());
		let result = loader.load_config("main.toml").await;
		assert!(matches!(result, Err(ConfigError::Io(_))));
	}
}
