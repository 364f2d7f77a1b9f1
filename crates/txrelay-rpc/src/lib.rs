//! RPC gateway for the transaction relay.
//!
//! The relay talks to each chain through an [`RpcInterface`] client able to
//! dry-run a call, broadcast it from the relay account, wait for its receipt
//! and read balances. [`RpcService`] owns one client per configured chain and
//! the address of the account that signs for all of them.

use alloy_primitives::{Address, U256};
use alloy_signer_local::PrivateKeySigner;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use txrelay_types::{
	without_0x_prefix, CallSpec, NetworksConfig, SecretString, TransactionHash, TransactionReceipt,
};

pub mod implementations {
	pub mod evm {
		pub mod alloy;
	}
}

use implementations::evm::alloy::AlloyClient;

/// Errors that can occur while talking to a chain.
#[derive(Debug, Error)]
pub enum RpcError {
	/// Error that occurs during network communication.
	#[error("Network error: {0}")]
	Network(String),
	/// The dry-run of a call was rejected.
	#[error("Simulation failed: {0}")]
	Simulation(String),
	/// The receipt did not arrive in time.
	#[error("Timed out: {0}")]
	Timeout(String),
	/// Invalid account or endpoint configuration.
	#[error("Configuration error: {0}")]
	Configuration(String),
}

/// Per-chain client used by the relay.
#[cfg_attr(feature = "testing", mockall::automock)]
#[async_trait]
pub trait RpcInterface: Send + Sync {
	/// Dry-runs `call` as `from` against the latest state without broadcasting.
	async fn simulate(&self, call: &CallSpec, from: Address) -> Result<(), RpcError>;

	/// Signs and broadcasts `call` from the relay account.
	async fn submit(&self, call: &CallSpec) -> Result<TransactionHash, RpcError>;

	/// Waits until the transaction is included or `timeout` elapses.
	async fn wait_for_receipt(
		&self,
		hash: &TransactionHash,
		timeout: Duration,
	) -> Result<TransactionReceipt, RpcError>;

	/// Native balance of `address` in base units.
	async fn get_balance(&self, address: Address) -> Result<U256, RpcError>;
}

/// Parses the relay account key.
pub fn parse_signer(private_key: &SecretString) -> Result<PrivateKeySigner, RpcError> {
	private_key.with_exposed(|key| {
		without_0x_prefix(key.trim())
			.parse::<PrivateKeySigner>()
			.map_err(|e| RpcError::Configuration(format!("Invalid private key: {}", e)))
	})
}

/// Chain clients keyed by chain id, plus the relay account.
pub struct RpcService {
	clients: HashMap<u64, Arc<dyn RpcInterface>>,
	account: Address,
}

impl RpcService {
	pub fn new(clients: HashMap<u64, Arc<dyn RpcInterface>>, account: Address) -> Self {
		Self { clients, account }
	}

	/// Builds an alloy client for every configured network.
	///
	/// A network whose endpoint cannot be used is skipped with an error log;
	/// transactions for it stay queued until the configuration is fixed.
	pub fn from_networks(
		networks: &NetworksConfig,
		private_key: &SecretString,
		poll_interval: Duration,
	) -> Result<Self, RpcError> {
		let signer = parse_signer(private_key)?;
		let account = signer.address();

		let mut clients: HashMap<u64, Arc<dyn RpcInterface>> = HashMap::new();
		for (chain_id, network) in networks {
			match AlloyClient::new(*chain_id, &network.rpc_url, signer.clone(), poll_interval) {
				Ok(client) => {
					clients.insert(*chain_id, Arc::new(client));
				},
				Err(e) => {
					tracing::error!(chain_id = chain_id, error = %e, "Skipping network");
				},
			}
		}

		Ok(Self { clients, account })
	}

	/// Client for `chain_id`, if the chain is reachable.
	pub fn client(&self, chain_id: u64) -> Option<Arc<dyn RpcInterface>> {
		self.clients.get(&chain_id).cloned()
	}

	/// Address every transaction is sent from.
	pub fn account_address(&self) -> Address {
		self.account
	}

	pub fn chain_ids(&self) -> Vec<u64> {
		let mut ids: Vec<u64> = self.clients.keys().copied().collect();
		ids.sort_unstable();
		ids
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use txrelay_types::NetworkConfig;

	const DEV_KEY: &str = "0xac0974bec39a17e36ba4a6b4d238ff944bacb478cbed5efcae784d7bf4f2ff80";

	fn network(rpc_url: &str) -> NetworkConfig {
		NetworkConfig {
			name: "test".into(),
			rpc_url: rpc_url.into(),
			native_symbol: "ETH".into(),
			native_decimals: 18,
		}
	}

	#[test]
	fn test_parse_signer() {
		let signer = parse_signer(&SecretString::from(DEV_KEY)).unwrap();
		assert_eq!(
			signer.address(),
			"0xf39Fd6e51aad88F6F4ce6aB8827279cffFb92266"
				.parse::<Address>()
				.unwrap()
		);
		assert!(parse_signer(&SecretString::from("0x1234")).is_err());
	}

	#[tokio::test]
	async fn test_unusable_network_has_no_client() {
		let mut networks = NetworksConfig::new();
		networks.insert(10, network("http://localhost:8545"));
		networks.insert(137, network("not a url"));

		let service =
			RpcService::from_networks(&networks, &SecretString::from(DEV_KEY), Duration::from_secs(1))
				.unwrap();

		assert!(service.client(10).is_some());
		assert!(service.client(137).is_none());
		assert!(service.client(1).is_none());
		assert_eq!(service.chain_ids(), vec![10]);
	}
}
