//! Shared fixtures for the relay tests.

use crate::monitor::TransactionMonitor;
use rust_decimal::Decimal;
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;
use txrelay_price::implementations::fixed::FixedPriceFeed;
use txrelay_price::PriceFeedService;
use txrelay_rpc::{RpcInterface, RpcService};
use txrelay_storage::implementations::file::FileStorage;
use txrelay_storage::implementations::memory::MemoryStorage;
use txrelay_storage::{StorageInterface, StorageService};
use txrelay_types::{
	Address, Bytes, CallSpec, ChainRegistry, NetworkConfig, NetworksConfig, Transaction,
	TransactionType,
};

pub(crate) const ETH_CHAIN: u64 = 10;
pub(crate) const POL_CHAIN: u64 = 137;

pub(crate) fn chains() -> ChainRegistry {
	let mut networks = NetworksConfig::new();
	for (chain_id, name, symbol) in [(ETH_CHAIN, "optimism", "ETH"), (POL_CHAIN, "polygon", "POL")] {
		networks.insert(
			chain_id,
			NetworkConfig {
				name: name.into(),
				rpc_url: "http://localhost:8545".into(),
				native_symbol: symbol.into(),
				native_decimals: 18,
			},
		);
	}
	ChainRegistry::new(networks)
}

/// Prices ETH at 3000 USD and POL at 0.5 USD.
pub(crate) async fn prices() -> Arc<PriceFeedService> {
	let mut table = HashMap::new();
	table.insert("ETH".to_string(), Decimal::from(3000));
	table.insert("POL".to_string(), Decimal::new(5, 1));

	let service = PriceFeedService::new(Box::new(FixedPriceFeed::new(table)), chains());
	service.refresh().await.unwrap();
	Arc::new(service)
}

pub(crate) fn tx(id: &str, chain_id: u64, retries: u32) -> Transaction {
	Transaction::new(
		id,
		TransactionType::UpdatePeriod,
		chain_id,
		CallSpec::new(Address::repeat_byte(0x11), Bytes::from_static(&[0x0a, 0x0b])),
	)
	.with_retries(retries)
}

async fn monitor(
	backend: Box<dyn StorageInterface>,
	clients: HashMap<u64, Arc<dyn RpcInterface>>,
) -> Arc<TransactionMonitor> {
	let rpc = Arc::new(RpcService::new(clients, Address::repeat_byte(0xaa)));
	Arc::new(TransactionMonitor::new(
		StorageService::new(backend),
		rpc,
		prices().await,
		chains(),
	))
}

pub(crate) async fn memory_monitor() -> Arc<TransactionMonitor> {
	monitor(Box::new(MemoryStorage::new()), HashMap::new()).await
}

pub(crate) async fn monitor_with_storage(
	backend: Box<dyn StorageInterface>,
) -> Arc<TransactionMonitor> {
	monitor(backend, HashMap::new()).await
}

pub(crate) async fn file_monitor(dir: &Path) -> Arc<TransactionMonitor> {
	monitor(Box::new(FileStorage::new(dir.to_path_buf())), HashMap::new()).await
}

pub(crate) async fn monitor_with_clients(
	clients: HashMap<u64, Arc<dyn RpcInterface>>,
) -> Arc<TransactionMonitor> {
	monitor(Box::new(MemoryStorage::new()), clients).await
}
