//! Alloy-based EVM client.
//!
//! One [`AlloyClient`] serves one chain. The provider carries the relay
//! account's wallet, so nonce, gas and fee fields are filled in and the
//! transaction is signed when it is sent.

use crate::{RpcError, RpcInterface};
use alloy_network::EthereumWallet;
use alloy_primitives::{Address, FixedBytes, U256};
use alloy_provider::{Provider, ProviderBuilder};
use alloy_rpc_types::TransactionRequest;
use alloy_signer::Signer;
use alloy_signer_local::PrivateKeySigner;
use alloy_transport_http::Http;
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use txrelay_types::{CallSpec, TransactionHash, TransactionReceipt};

type HttpProvider = Arc<dyn Provider<Http<reqwest::Client>> + Send + Sync>;

/// EVM client for a single chain.
pub struct AlloyClient {
	chain_id: u64,
	provider: HttpProvider,
	poll_interval: Duration,
}

impl AlloyClient {
	/// Creates a client sending from `signer` through the RPC endpoint at `rpc_url`.
	pub fn new(
		chain_id: u64,
		rpc_url: &str,
		signer: PrivateKeySigner,
		poll_interval: Duration,
	) -> Result<Self, RpcError> {
		let url = rpc_url.parse().map_err(|e| {
			RpcError::Configuration(format!("Invalid RPC URL for network {}: {}", chain_id, e))
		})?;

		let wallet = EthereumWallet::from(signer.with_chain_id(Some(chain_id)));
		let provider = ProviderBuilder::new()
			.with_recommended_fillers()
			.wallet(wallet)
			.on_http(url);
		provider.client().set_poll_interval(poll_interval);

		Ok(Self {
			chain_id,
			provider: Arc::new(provider),
			poll_interval,
		})
	}
}

/// Converts a call into an alloy transaction request.
fn to_request(call: &CallSpec) -> TransactionRequest {
	let request = TransactionRequest::default()
		.to(call.to)
		.input(call.data.clone().into())
		.value(call.value);
	match call.gas_limit {
		Some(gas_limit) => request.gas_limit(gas_limit),
		None => request,
	}
}

#[async_trait]
impl RpcInterface for AlloyClient {
	async fn simulate(&self, call: &CallSpec, from: Address) -> Result<(), RpcError> {
		let request = to_request(call).from(from);
		self.provider
			.call(&request)
			.await
			.map(|_| ())
			.map_err(|e| RpcError::Simulation(e.to_string()))
	}

	async fn submit(&self, call: &CallSpec) -> Result<TransactionHash, RpcError> {
		let pending_tx = self
			.provider
			.send_transaction(to_request(call))
			.await
			.map_err(|e| RpcError::Network(format!("Failed to send transaction: {}", e)))?;

		let hash = TransactionHash(pending_tx.tx_hash().0.to_vec());
		tracing::info!(tx_hash = %hash, chain_id = self.chain_id, "Submitted transaction");
		Ok(hash)
	}

	async fn wait_for_receipt(
		&self,
		hash: &TransactionHash,
		timeout: Duration,
	) -> Result<TransactionReceipt, RpcError> {
		if hash.0.len() != 32 {
			return Err(RpcError::Network(format!("Malformed transaction hash {}", hash)));
		}
		let tx_hash = FixedBytes::<32>::from_slice(&hash.0);

		let poll = async {
			loop {
				match self.provider.get_transaction_receipt(tx_hash).await {
					Ok(Some(receipt)) => return receipt,
					Ok(None) => {},
					Err(e) => {
						tracing::debug!(tx_hash = %hash, error = %e, "Receipt poll failed");
					},
				}
				tokio::time::sleep(self.poll_interval).await;
			}
		};

		let receipt = match tokio::time::timeout(timeout, poll).await {
			Ok(receipt) => receipt,
			Err(_) => {
				return Err(RpcError::Timeout(format!(
					"No receipt for {} on chain {} after {}s",
					hash,
					self.chain_id,
					timeout.as_secs()
				)))
			},
		};

		let gas_used = u64::try_from(receipt.gas_used)
			.map_err(|e| RpcError::Network(format!("Invalid gas used: {}", e)))?;
		let effective_gas_price = u128::try_from(receipt.effective_gas_price)
			.map_err(|e| RpcError::Network(format!("Invalid gas price: {}", e)))?;

		Ok(TransactionReceipt {
			hash: TransactionHash(receipt.transaction_hash.0.to_vec()),
			block_number: receipt.block_number.unwrap_or(0),
			success: receipt.status(),
			gas_used,
			effective_gas_price,
		})
	}

	async fn get_balance(&self, address: Address) -> Result<U256, RpcError> {
		self.provider
			.get_balance(address)
			.await
			.map_err(|e| RpcError::Network(format!("Failed to get balance: {}", e)))
	}
}
