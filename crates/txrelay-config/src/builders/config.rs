//! Configuration builder for tests and local tooling.
//!
//! Produces a [`Config`] backed by in-memory storage and static prices so a
//! relay can be assembled without any file or network access.

use crate::{AccountConfig, Config, MonitorConfig, PricingConfig, RelayConfig, StorageConfig};
use std::collections::HashMap;
use txrelay_types::{NetworkConfig, SecretString};

/// Well known development key (first anvil account).
const DEV_PRIVATE_KEY: &str = "0xac0974bec39a17e36ba4a6b4d238ff944bacb478cbed5efcae784d7bf4f2ff80";

/// Fluent builder for [`Config`].
#[derive(Debug, Clone)]
pub struct ConfigBuilder {
	relay_id: String,
	enabled: bool,
	tick_interval_seconds: u64,
	receipt_timeout_seconds: u64,
	networks: HashMap<u64, NetworkConfig>,
	prices: HashMap<String, String>,
	reports_dir: Option<String>,
}

impl Default for ConfigBuilder {
	fn default() -> Self {
		Self::new()
	}
}

impl ConfigBuilder {
	pub fn new() -> Self {
		Self {
			relay_id: "test-relay".to_string(),
			enabled: true,
			tick_interval_seconds: 60,
			receipt_timeout_seconds: 180,
			networks: HashMap::new(),
			prices: HashMap::new(),
			reports_dir: None,
		}
	}

	pub fn relay_id(mut self, id: impl Into<String>) -> Self {
		self.relay_id = id.into();
		self
	}

	pub fn enabled(mut self, enabled: bool) -> Self {
		self.enabled = enabled;
		self
	}

	pub fn tick_interval_seconds(mut self, seconds: u64) -> Self {
		self.tick_interval_seconds = seconds;
		self
	}

	pub fn receipt_timeout_seconds(mut self, seconds: u64) -> Self {
		self.receipt_timeout_seconds = seconds;
		self
	}

	/// Adds a network served from a local RPC endpoint.
	pub fn network(mut self, chain_id: u64, name: &str, native_symbol: &str) -> Self {
		self.networks.insert(
			chain_id,
			NetworkConfig {
				name: name.to_string(),
				rpc_url: format!("http://localhost:{}", 8545 + self.networks.len()),
				native_symbol: native_symbol.to_string(),
				native_decimals: 18,
			},
		);
		self
	}

	/// Sets a static USD price for a native symbol.
	pub fn price(mut self, symbol: &str, usd: &str) -> Self {
		self.prices.insert(symbol.to_string(), usd.to_string());
		self
	}

	/// Persists reports under `dir` instead of keeping them in memory.
	pub fn reports_dir(mut self, dir: impl Into<String>) -> Self {
		self.reports_dir = Some(dir.into());
		self
	}

	pub fn build(self) -> Config {
		let mut storage_implementations = HashMap::new();
		let storage_primary = match self.reports_dir {
			Some(dir) => {
				let mut table = toml::Table::new();
				table.insert("reports_dir".to_string(), toml::Value::String(dir));
				storage_implementations.insert("file".to_string(), toml::Value::Table(table));
				"file"
			},
			None => {
				storage_implementations.insert(
					"memory".to_string(),
					toml::Value::Table(toml::Table::new()),
				);
				"memory"
			},
		};

		let prices: toml::Table = self
			.prices
			.into_iter()
			.map(|(symbol, usd)| (symbol, toml::Value::String(usd)))
			.collect();
		let mut static_table = toml::Table::new();
		static_table.insert("prices".to_string(), toml::Value::Table(prices));
		let mut pricing_implementations = HashMap::new();
		pricing_implementations.insert("static".to_string(), toml::Value::Table(static_table));

		Config {
			relay: RelayConfig {
				id: self.relay_id,
				enabled: self.enabled,
				tick_interval_seconds: self.tick_interval_seconds,
				receipt_timeout_seconds: self.receipt_timeout_seconds,
				receipt_poll_interval_seconds: 1,
			},
			account: AccountConfig {
				private_key: SecretString::from(DEV_PRIVATE_KEY),
			},
			networks: self.networks,
			storage: StorageConfig {
				primary: storage_primary.to_string(),
				implementations: storage_implementations,
			},
			monitor: MonitorConfig::default(),
			pricing: PricingConfig {
				primary: "static".to_string(),
				refresh_interval_seconds: 300,
				implementations: pricing_implementations,
			},
		}
	}
}
