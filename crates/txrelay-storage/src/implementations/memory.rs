//! In-memory storage backend.
//!
//! Keeps values in a map for the lifetime of the process. Used by tests and
//! by deployments that do not need reports to survive a restart.

use crate::{validate_key, StorageError, StorageFactory, StorageInterface, StorageRegistry};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use txrelay_types::ImplementationRegistry;

/// In-memory storage implementation.
#[derive(Clone, Default)]
pub struct MemoryStorage {
	store: Arc<RwLock<HashMap<String, Vec<u8>>>>,
}

impl MemoryStorage {
	pub fn new() -> Self {
		Self::default()
	}
}

#[async_trait]
impl StorageInterface for MemoryStorage {
	async fn get_bytes(&self, key: &str) -> Result<Vec<u8>, StorageError> {
		let store = self.store.read().await;
		store.get(key).cloned().ok_or(StorageError::NotFound)
	}

	async fn set_bytes(&self, key: &str, value: Vec<u8>) -> Result<(), StorageError> {
		validate_key(key)?;
		let mut store = self.store.write().await;
		store.insert(key.to_string(), value);
		Ok(())
	}

	async fn list(&self, dir: &str) -> Result<Vec<String>, StorageError> {
		let prefix = if dir.is_empty() {
			String::new()
		} else {
			format!("{}/", dir.trim_end_matches('/'))
		};

		let store = self.store.read().await;
		Ok(store
			.keys()
			.filter_map(|key| key.strip_prefix(&prefix))
			.filter(|name| !name.contains('/'))
			.map(str::to_string)
			.collect())
	}

	fn locate(&self, key: &str) -> String {
		format!("memory://{}", key)
	}
}

/// Factory function to create a memory storage backend.
///
/// Takes no configuration parameters.
pub fn create_storage(_config: &toml::Value) -> Result<Box<dyn StorageInterface>, StorageError> {
	Ok(Box::new(MemoryStorage::new()))
}

/// Registry for the memory storage implementation.
pub struct Registry;

impl ImplementationRegistry for Registry {
	const NAME: &'static str = "memory";
	type Factory = StorageFactory;

	fn factory() -> Self::Factory {
		create_storage
	}
}

impl StorageRegistry for Registry {}
