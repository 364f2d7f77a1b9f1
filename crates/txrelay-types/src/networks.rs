//! Network configuration and the chain registry.
//!
//! Every chain the relay may send to is declared under `[networks.<chain_id>]`
//! in the configuration file. The [`ChainRegistry`] is the read-only view over
//! those entries that the relay, the monitor and the price service consult.

use serde::{Deserialize, Deserializer, Serialize};
use std::collections::HashMap;

fn default_native_decimals() -> u8 {
	18
}

/// Configuration for a single blockchain network.
///
/// # Fields
///
/// * `name` - Human readable network name used in logs
/// * `rpc_url` - The HTTP(S) RPC endpoint for blockchain interaction
/// * `native_symbol` - Symbol of the native gas asset, used for pricing
/// * `native_decimals` - Decimals of the native gas asset
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct NetworkConfig {
	pub name: String,
	pub rpc_url: String,
	pub native_symbol: String,
	#[serde(default = "default_native_decimals")]
	pub native_decimals: u8,
}

/// Networks configuration mapping chain IDs to their configurations.
///
/// TOML table keys are strings, so [`deserialize_networks`] converts them to
/// numeric chain ids.
pub type NetworksConfig = HashMap<u64, NetworkConfig>;

/// Deserializes a `[networks]` table keyed by chain id strings.
///
/// # Errors
///
/// Returns a deserialization error if a key is not a valid `u64`.
pub fn deserialize_networks<'de, D>(deserializer: D) -> Result<NetworksConfig, D::Error>
where
	D: Deserializer<'de>,
{
	let string_map: HashMap<String, NetworkConfig> = HashMap::deserialize(deserializer)?;
	string_map
		.into_iter()
		.map(|(key, value)| {
			key.parse::<u64>()
				.map(|chain_id| (chain_id, value))
				.map_err(|e| serde::de::Error::custom(format!("Invalid chain_id '{}': {}", key, e)))
		})
		.collect()
}

/// Public description of a registered chain.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChainInfo {
	pub chain_id: u64,
	pub name: String,
	pub native_symbol: String,
}

/// Read-only lookup of the networks the relay is configured for.
#[derive(Debug, Clone, Default)]
pub struct ChainRegistry {
	networks: NetworksConfig,
}

impl ChainRegistry {
	pub fn new(networks: NetworksConfig) -> Self {
		Self { networks }
	}

	/// Lists registered chains ordered by chain id.
	pub fn list_chains(&self) -> Vec<ChainInfo> {
		let mut chains: Vec<ChainInfo> = self
			.networks
			.iter()
			.map(|(chain_id, network)| ChainInfo {
				chain_id: *chain_id,
				name: network.name.clone(),
				native_symbol: network.native_symbol.clone(),
			})
			.collect();
		chains.sort_by_key(|c| c.chain_id);
		chains
	}

	pub fn get(&self, chain_id: u64) -> Option<&NetworkConfig> {
		self.networks.get(&chain_id)
	}

	pub fn native_symbol(&self, chain_id: u64) -> Option<&str> {
		self.networks.get(&chain_id).map(|n| n.native_symbol.as_str())
	}

	/// Decimals of the chain's native asset, 18 when the chain is unknown.
	pub fn native_decimals(&self, chain_id: u64) -> u8 {
		self.networks
			.get(&chain_id)
			.map(|n| n.native_decimals)
			.unwrap_or_else(default_native_decimals)
	}

	pub fn chain_ids(&self) -> Vec<u64> {
		let mut ids: Vec<u64> = self.networks.keys().copied().collect();
		ids.sort_unstable();
		ids
	}

	pub fn networks(&self) -> &NetworksConfig {
		&self.networks
	}
}
