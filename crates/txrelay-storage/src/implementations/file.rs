//! File-based storage backend.
//!
//! Each key maps to a file below the configured reports directory. Values are
//! written to a sibling `.tmp` file first and renamed into place, so readers
//! see either the old or the new content.

use crate::{validate_key, StorageError, StorageFactory, StorageInterface, StorageRegistry};
use async_trait::async_trait;
use std::path::PathBuf;
use tokio::fs;
use txrelay_types::ImplementationRegistry;

const TEMP_SUFFIX: &str = ".tmp";
const DEFAULT_REPORTS_DIR: &str = "./temp/tx-reports";

/// Stores values as plain files under a base directory.
pub struct FileStorage {
	base_path: PathBuf,
}

impl FileStorage {
	pub fn new(base_path: PathBuf) -> Self {
		Self { base_path }
	}

	fn get_file_path(&self, key: &str) -> Result<PathBuf, StorageError> {
		validate_key(key)?;
		Ok(self.base_path.join(key))
	}
}

#[async_trait]
impl StorageInterface for FileStorage {
	async fn get_bytes(&self, key: &str) -> Result<Vec<u8>, StorageError> {
		let path = self.get_file_path(key)?;
		match fs::read(&path).await {
			Ok(data) => Ok(data),
			Err(e) if e.kind() == std::io::ErrorKind::NotFound => Err(StorageError::NotFound),
			Err(e) => Err(StorageError::Backend(e.to_string())),
		}
	}

	async fn set_bytes(&self, key: &str, value: Vec<u8>) -> Result<(), StorageError> {
		let path = self.get_file_path(key)?;

		if let Some(parent) = path.parent() {
			fs::create_dir_all(parent)
				.await
				.map_err(|e| StorageError::Backend(e.to_string()))?;
		}

		let mut temp_name = path.as_os_str().to_owned();
		temp_name.push(TEMP_SUFFIX);
		let temp_path = PathBuf::from(temp_name);

		fs::write(&temp_path, value)
			.await
			.map_err(|e| StorageError::Backend(e.to_string()))?;
		fs::rename(&temp_path, &path)
			.await
			.map_err(|e| StorageError::Backend(e.to_string()))?;

		Ok(())
	}

	async fn list(&self, dir: &str) -> Result<Vec<String>, StorageError> {
		let dir_path = if dir.is_empty() {
			self.base_path.clone()
		} else {
			self.get_file_path(dir)?
		};

		let mut entries = match fs::read_dir(&dir_path).await {
			Ok(entries) => entries,
			Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
			Err(e) => return Err(StorageError::Backend(e.to_string())),
		};

		let mut names = Vec::new();
		while let Some(entry) = entries
			.next_entry()
			.await
			.map_err(|e| StorageError::Backend(e.to_string()))?
		{
			let file_type = entry
				.file_type()
				.await
				.map_err(|e| StorageError::Backend(e.to_string()))?;
			if !file_type.is_file() {
				continue;
			}
			match entry.file_name().into_string() {
				Ok(name) if !name.ends_with(TEMP_SUFFIX) => names.push(name),
				Ok(_) => {},
				Err(name) => {
					tracing::debug!("Skipping non UTF-8 file name {:?}", name);
				},
			}
		}
		Ok(names)
	}

	fn locate(&self, key: &str) -> String {
		self.base_path.join(key).display().to_string()
	}
}

/// Factory function to create a file storage backend from configuration.
///
/// Configuration parameters:
/// - `reports_dir`: Base directory for report files (default: "./temp/tx-reports")
pub fn create_storage(config: &toml::Value) -> Result<Box<dyn StorageInterface>, StorageError> {
	let reports_dir = match config.get("reports_dir") {
		None => DEFAULT_REPORTS_DIR,
		Some(value) => value.as_str().ok_or_else(|| {
			StorageError::Configuration("reports_dir must be a string".into())
		})?,
	};
	if reports_dir.trim().is_empty() {
		return Err(StorageError::Configuration(
			"reports_dir cannot be empty".into(),
		));
	}

	Ok(Box::new(FileStorage::new(PathBuf::from(reports_dir))))
}

/// Registry for the file storage implementation.
pub struct Registry;

impl ImplementationRegistry for Registry {
	const NAME: &'static str = "file";
	type Factory = StorageFactory;

	fn factory() -> Self::Factory {
		create_storage
	}
}

impl StorageRegistry for Registry {}
