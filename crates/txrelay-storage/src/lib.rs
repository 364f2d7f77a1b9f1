//! Storage module for the transaction relay.
//!
//! Reports are persisted as plain, human readable files. Keys are relative
//! paths such as `chain-10.json` or `daily/chain-10-2024-05-01.json`; each
//! backend decides where such a key physically lives. Writes replace the whole
//! value atomically so a reader never observes a half written report.

use async_trait::async_trait;
use serde::{de::DeserializeOwned, Serialize};
use std::path::{Component, Path};
use thiserror::Error;
use txrelay_types::ImplementationRegistry;

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
	/// The key is not a plain relative path.
	#[error("Invalid key: {0}")]
	InvalidKey(String),
}

/// Low-level interface every storage backend implements.
#[async_trait]
pub trait StorageInterface: Send + Sync {
	/// Retrieves raw bytes for the given key.
	async fn get_bytes(&self, key: &str) -> Result<Vec<u8>, StorageError>;

	/// Replaces the value stored under `key`.
	async fn set_bytes(&self, key: &str, value: Vec<u8>) -> Result<(), StorageError>;

	/// Lists the names stored directly under `dir` (`""` for the root),
	/// excluding nested directories.
	async fn list(&self, dir: &str) -> Result<Vec<String>, StorageError>;

	/// Describes where `key` lives, e.g. a filesystem path.
	fn locate(&self, key: &str) -> String;
}

/// Type alias for storage factory functions.
pub type StorageFactory = fn(&toml::Value) -> Result<Box<dyn StorageInterface>, StorageError>;

/// Registry trait for storage implementations.
pub trait StorageRegistry: ImplementationRegistry<Factory = StorageFactory> {}

/// Get all registered storage implementations.
pub fn get_all_implementations() -> Vec<(&'static str, StorageFactory)> {
	use implementations::{file, memory};

	vec![
		(file::Registry::NAME, file::Registry::factory()),
		(memory::Registry::NAME, memory::Registry::factory()),
	]
}

/// Rejects absolute keys and keys that escape the storage root.
pub(crate) fn validate_key(key: &str) -> Result<(), StorageError> {
	if key.is_empty() {
		return Err(StorageError::InvalidKey("empty key".into()));
	}
	let all_normal = Path::new(key)
		.components()
		.all(|c| matches!(c, Component::Normal(_)));
	if !all_normal {
		return Err(StorageError::InvalidKey(key.to_string()));
	}
	Ok(())
}

/// Typed storage operations over a backend.
///
/// Values are stored as pretty printed JSON so files stay readable.
pub struct StorageService {
	backend: Box<dyn StorageInterface>,
}

impl StorageService {
	pub fn new(backend: Box<dyn StorageInterface>) -> Self {
		Self { backend }
	}

	/// Serializes `data` as JSON and stores it under `key`.
	pub async fn store<T: Serialize>(&self, key: &str, data: &T) -> Result<(), StorageError> {
		let bytes = serde_json::to_vec_pretty(data)
			.map_err(|e| StorageError::Serialization(e.to_string()))?;
		self.backend.set_bytes(key, bytes).await
	}

	/// Retrieves and deserializes the JSON value stored under `key`.
	pub async fn retrieve<T: DeserializeOwned>(&self, key: &str) -> Result<T, StorageError> {
		let bytes = self.backend.get_bytes(key).await?;
		serde_json::from_slice(&bytes).map_err(|e| StorageError::Serialization(e.to_string()))
	}

	/// Stores preformatted text (such as CSV) and returns its location.
	pub async fn store_text(&self, key: &str, text: String) -> Result<String, StorageError> {
		self.backend.set_bytes(key, text.into_bytes()).await?;
		Ok(self.backend.locate(key))
	}

	/// Retrieves text stored with [`StorageService::store_text`].
	pub async fn retrieve_text(&self, key: &str) -> Result<String, StorageError> {
		let bytes = self.backend.get_bytes(key).await?;
		String::from_utf8(bytes).map_err(|e| StorageError::Serialization(e.to_string()))
	}

	/// Lists names stored directly under `dir`, sorted.
	pub async fn list(&self, dir: &str) -> Result<Vec<String>, StorageError> {
		let mut names = self.backend.list(dir).await?;
		names.sort();
		Ok(names)
	}

	pub fn locate(&self, key: &str) -> String {
		self.backend.locate(key)
	}
}
