//! Builder pattern for constructing relay engines.
//!
//! Storage and price feed backends are created from the factory registered
//! under the name configured as `primary`; chain clients are created for
//! every configured network.

use crate::engine::RelayEngine;
use crate::monitor::TransactionMonitor;
use crate::queue::TxQueue;
use crate::relay::TransactionRelay;
use std::collections::HashMap;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::Mutex;
use txrelay_config::Config;
use txrelay_price::{PriceFeedFactory, PriceFeedService};
use txrelay_rpc::{parse_signer, RpcService};
use txrelay_storage::{StorageFactory, StorageService};
use txrelay_types::ChainRegistry;

/// Errors that can occur during relay engine construction.
#[derive(Debug, Error)]
pub enum BuilderError {
	#[error("Configuration error: {0}")]
	Config(String),
	#[error("Missing required component: {0}")]
	MissingComponent(String),
}

/// Factory functions available to the builder, keyed by implementation name.
pub struct RelayFactories {
	pub storage_factories: HashMap<String, StorageFactory>,
	pub price_factories: HashMap<String, PriceFeedFactory>,
}

impl RelayFactories {
	/// Every implementation shipped with the relay crates.
	pub fn from_registries() -> Self {
		let storage_factories = txrelay_storage::get_all_implementations()
			.into_iter()
			.map(|(name, factory)| (name.to_string(), factory))
			.collect();
		let price_factories = txrelay_price::get_all_implementations()
			.into_iter()
			.map(|(name, factory)| (name.to_string(), factory))
			.collect();

		Self {
			storage_factories,
			price_factories,
		}
	}
}

/// Builder for constructing a [`RelayEngine`] from configuration.
pub struct RelayBuilder {
	config: Config,
}

impl RelayBuilder {
	pub fn new(config: Config) -> Self {
		Self { config }
	}

	/// Builds the engine with live chain clients.
	pub fn build(self, factories: RelayFactories) -> Result<RelayEngine, BuilderError> {
		let rpc = RpcService::from_networks(
			&self.config.networks,
			&self.config.account.private_key,
			self.config.relay.receipt_poll_interval(),
		)
		.map_err(|e| BuilderError::Config(e.to_string()))?;
		let rpc = Arc::new(rpc);
		tracing::info!(
			component = "rpc",
			account = %rpc.account_address(),
			chains = ?rpc.chain_ids(),
			"Loaded"
		);

		let chains = ChainRegistry::new(self.config.networks.clone());
		let prices = self.build_prices(&factories, chains.clone())?;
		let storage = self.build_storage(&factories)?;

		let monitor = Arc::new(TransactionMonitor::new(
			storage,
			rpc.clone(),
			prices.clone(),
			chains.clone(),
		));

		let queue = Arc::new(Mutex::new(TxQueue::new()));
		let relay = Arc::new(TransactionRelay::new(
			queue.clone(),
			rpc,
			monitor.clone(),
			chains,
			self.config.relay.receipt_timeout(),
		));

		Ok(RelayEngine::new(self.config, queue, relay, monitor, prices))
	}

	/// Builds a monitor over the persisted reports without any chain client.
	///
	/// Used by offline tooling; balances read as zero.
	pub fn build_report_reader(
		&self,
		factories: &RelayFactories,
	) -> Result<Arc<TransactionMonitor>, BuilderError> {
		let account = parse_signer(&self.config.account.private_key)
			.map_err(|e| BuilderError::Config(e.to_string()))?
			.address();
		let rpc = Arc::new(RpcService::new(HashMap::new(), account));

		let chains = ChainRegistry::new(self.config.networks.clone());
		let prices = self.build_prices(factories, chains.clone())?;
		let storage = self.build_storage(factories)?;

		Ok(Arc::new(TransactionMonitor::new(storage, rpc, prices, chains)))
	}

	fn build_storage(&self, factories: &RelayFactories) -> Result<StorageService, BuilderError> {
		let primary = &self.config.storage.primary;
		let config = self.config.storage.implementations.get(primary).ok_or_else(|| {
			BuilderError::MissingComponent(format!("storage implementation '{}'", primary))
		})?;
		let factory = factories.storage_factories.get(primary).ok_or_else(|| {
			BuilderError::Config(format!("Unknown storage implementation '{}'", primary))
		})?;

		match factory(config) {
			Ok(backend) => {
				tracing::info!(component = "storage", implementation = %primary, "Loaded");
				Ok(StorageService::new(backend))
			},
			Err(e) => {
				tracing::error!(
					component = "storage",
					implementation = %primary,
					error = %e,
					"Failed to create storage implementation"
				);
				Err(BuilderError::Config(format!(
					"Failed to create storage implementation '{}': {}",
					primary, e
				)))
			},
		}
	}

	fn build_prices(
		&self,
		factories: &RelayFactories,
		chains: ChainRegistry,
	) -> Result<Arc<PriceFeedService>, BuilderError> {
		let primary = &self.config.pricing.primary;
		let config = self.config.pricing.implementations.get(primary).ok_or_else(|| {
			BuilderError::MissingComponent(format!("pricing implementation '{}'", primary))
		})?;
		let factory = factories.price_factories.get(primary).ok_or_else(|| {
			BuilderError::Config(format!("Unknown pricing implementation '{}'", primary))
		})?;

		match factory(config) {
			Ok(feed) => {
				tracing::info!(component = "pricing", implementation = %primary, "Loaded");
				Ok(Arc::new(PriceFeedService::new(feed, chains)))
			},
			Err(e) => {
				tracing::error!(
					component = "pricing",
					implementation = %primary,
					error = %e,
					"Failed to create price feed implementation"
				);
				Err(BuilderError::Config(format!(
					"Failed to create pricing implementation '{}': {}",
					primary, e
				)))
			},
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use txrelay_config::builders::ConfigBuilder;

	fn config() -> Config {
		ConfigBuilder::new()
			.network(10, "optimism", "ETH")
			.price("ETH", "3000")
			.build()
	}

	#[test]
	fn test_registries_cover_shipped_implementations() {
		let factories = RelayFactories::from_registries();
		assert!(factories.storage_factories.contains_key("file"));
		assert!(factories.storage_factories.contains_key("memory"));
		assert!(factories.price_factories.contains_key("static"));
		assert!(factories.price_factories.contains_key("coingecko"));
	}

	#[tokio::test]
	async fn test_build_engine() {
		let engine = RelayBuilder::new(config())
			.build(RelayFactories::from_registries())
			.unwrap();
		assert_eq!(engine.config().relay.id, "test-relay");
		assert_eq!(engine.queue_len().await, 0);
	}

	#[tokio::test]
	async fn test_unknown_primary_is_rejected() {
		let mut factories = RelayFactories::from_registries();
		factories.storage_factories.remove("memory");

		let result = RelayBuilder::new(config()).build(factories);
		assert!(matches!(result, Err(BuilderError::Config(_))));
	}

	#[tokio::test]
	async fn test_report_reader_reads_persisted_reports() {
		let dir = tempfile::tempdir().unwrap();
		let config = ConfigBuilder::new()
			.network(10, "optimism", "ETH")
			.reports_dir(dir.path().to_string_lossy())
			.build();
		std::fs::write(
			dir.path().join("chain-10.json"),
			r#"{
				"chainId": 10,
				"totalTransactions": 1,
				"successfulTransactions": 1,
				"failedTransactions": 0,
				"totalGasSpent": "0.000021",
				"lastUpdated": "2024-01-05T10:00:00Z",
				"transactions": []
			}"#,
		)
		.unwrap();

		let reader = RelayBuilder::new(config)
			.build_report_reader(&RelayFactories::from_registries())
			.unwrap();
		reader.load().await.unwrap();

		let stats = reader.get_summary_stats().await;
		assert_eq!(stats.total_transactions, 1);
		assert_eq!(stats.total_gas_spent.to_string(), "0.000021000000000000");
	}
}
