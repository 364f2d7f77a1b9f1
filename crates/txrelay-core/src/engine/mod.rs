//! Relay engine that owns the queue and drives every periodic job.
//!
//! The engine runs four timers until shutdown (Ctrl+C for [`RelayEngine::run`]):
//!
//! - relay tick: attempts the head of the queue (skipped when the relay is
//!   disabled)
//! - rotation: archives live chain reports into daily snapshots
//! - stats: refreshes balances and logs transaction statistics
//! - pricing: refreshes the cached native asset prices

use crate::monitor::TransactionMonitor;
use crate::queue::TxQueue;
use crate::relay::TransactionRelay;
use crate::RelayError;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::{interval, interval_at, Instant, Interval, MissedTickBehavior};
use txrelay_config::Config;
use txrelay_price::PriceFeedService;
use txrelay_types::Transaction;

/// Main relay engine.
pub struct RelayEngine {
	config: Config,
	queue: Arc<Mutex<TxQueue>>,
	relay: Arc<TransactionRelay>,
	monitor: Arc<TransactionMonitor>,
	prices: Arc<PriceFeedService>,
}

/// Interval whose first tick fires after one full period.
fn delayed_interval(period: Duration) -> Interval {
	let mut timer = interval_at(Instant::now() + period, period);
	timer.set_missed_tick_behavior(MissedTickBehavior::Skip);
	timer
}

impl RelayEngine {
	pub fn new(
		config: Config,
		queue: Arc<Mutex<TxQueue>>,
		relay: Arc<TransactionRelay>,
		monitor: Arc<TransactionMonitor>,
		prices: Arc<PriceFeedService>,
	) -> Self {
		Self {
			config,
			queue,
			relay,
			monitor,
			prices,
		}
	}

	/// Adds a transaction to the tail of the queue.
	pub async fn enqueue(&self, tx: Transaction) {
		tracing::info!(
			tx = %tx.label(),
			chain_id = tx.chain_id,
			"Queued transaction"
		);
		self.queue.lock().await.enqueue(tx);
	}

	/// Generates an identifier for a new transaction.
	pub fn new_transaction_id() -> String {
		txrelay_types::new_transaction_id()
	}

	pub async fn queue_len(&self) -> usize {
		self.queue.lock().await.len()
	}

	pub fn monitor(&self) -> &Arc<TransactionMonitor> {
		&self.monitor
	}

	pub fn config(&self) -> &Config {
		&self.config
	}

	/// Loads persisted reports, prices and balances.
	pub async fn initialize(&self) -> Result<(), RelayError> {
		if let Err(e) = self.prices.refresh().await {
			tracing::warn!(error = %e, "Failed to load prices, spend is valued at zero");
		}
		self.monitor.load().await?;
		self.monitor.initialize_spending_report().await;
		Ok(())
	}

	/// Main loop. Returns on Ctrl+C.
	pub async fn run(&self) -> Result<(), RelayError> {
		self.run_until(async {
			if let Err(e) = tokio::signal::ctrl_c().await {
				tracing::error!(error = %e, "Failed to listen for Ctrl+C");
			}
		})
		.await
	}

	/// Main loop. Returns once `shutdown` completes.
	pub async fn run_until(&self, shutdown: impl Future<Output = ()>) -> Result<(), RelayError> {
		self.initialize().await?;
		tokio::pin!(shutdown);

		let enabled = self.config.relay.enabled;
		if !enabled {
			tracing::warn!("Relay disabled, transactions will not be sent");
		}

		let mut relay_timer = interval(self.config.relay.tick_interval());
		relay_timer.set_missed_tick_behavior(MissedTickBehavior::Skip);
		let mut rotation_timer = delayed_interval(Duration::from_secs(
			self.config.monitor.rotation_interval_seconds,
		));
		let mut stats_timer =
			delayed_interval(Duration::from_secs(self.config.monitor.stats_interval_seconds));
		let mut price_timer =
			delayed_interval(Duration::from_secs(self.config.pricing.refresh_interval_seconds));

		loop {
			tokio::select! {
				_ = relay_timer.tick(), if enabled => {
					let relay = self.relay.clone();
					tokio::spawn(async move {
						relay.tick().await;
					});
				}

				_ = rotation_timer.tick() => {
					self.monitor.rotate().await;
				}

				_ = stats_timer.tick() => {
					let monitor = self.monitor.clone();
					tokio::spawn(async move {
						monitor.refresh_balances().await;
						monitor.log_stats().await;
					});
				}

				_ = price_timer.tick() => {
					let prices = self.prices.clone();
					tokio::spawn(async move {
						match prices.refresh().await {
							Ok(count) => tracing::debug!("Refreshed {} prices", count),
							Err(e) => tracing::warn!(error = %e, "Price refresh failed, keeping cached prices"),
						}
					});
				}

				// Shutdown signal
				_ = &mut shutdown => {
					break;
				}
			}
		}

		let pending = self.queue_len().await;
		if pending > 0 {
			tracing::warn!(pending = pending, "Stopping with transactions still queued");
		}

		Ok(())
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::builder::{RelayBuilder, RelayFactories};
	use crate::test_utils::{chains, monitor_with_clients, prices, tx, ETH_CHAIN};
	use std::collections::HashMap;
	use txrelay_config::builders::ConfigBuilder;
	use txrelay_rpc::{MockRpcInterface, RpcInterface, RpcService};
	use txrelay_types::{
		Address, Bytes, CallSpec, TransactionHash, TransactionReceipt, TransactionStatus,
		TransactionType, U256,
	};

	fn engine() -> RelayEngine {
		let config = ConfigBuilder::new()
			.network(10, "optimism", "ETH")
			.price("ETH", "3000")
			.build();
		RelayBuilder::new(config)
			.build(RelayFactories::from_registries())
			.unwrap()
	}

	/// Engine over a mocked chain client with one transaction queued.
	async fn engine_with(enabled: bool, mock: MockRpcInterface) -> RelayEngine {
		let config = ConfigBuilder::new()
			.network(ETH_CHAIN, "optimism", "ETH")
			.enabled(enabled)
			.tick_interval_seconds(1)
			.build();

		let mut clients: HashMap<u64, Arc<dyn RpcInterface>> = HashMap::new();
		clients.insert(ETH_CHAIN, Arc::new(mock));
		let rpc = Arc::new(RpcService::new(clients.clone(), Address::repeat_byte(0xaa)));
		let monitor = monitor_with_clients(clients).await;

		let queue = Arc::new(Mutex::new(TxQueue::new()));
		queue.lock().await.enqueue(tx("t1", ETH_CHAIN, 3));
		let relay = Arc::new(TransactionRelay::new(
			queue.clone(),
			rpc,
			monitor.clone(),
			chains(),
			Duration::from_secs(180),
		));

		RelayEngine::new(config, queue, relay, monitor, prices().await)
	}

	fn receipt() -> TransactionReceipt {
		TransactionReceipt {
			hash: TransactionHash(vec![0xab; 32]),
			block_number: 100,
			success: true,
			gas_used: 21_000,
			effective_gas_price: 1_000_000_000,
		}
	}

	#[tokio::test]
	async fn test_enqueue() {
		let engine = engine();
		let id = RelayEngine::new_transaction_id();
		engine
			.enqueue(Transaction::new(
				id.clone(),
				TransactionType::UpdatePeriod,
				10,
				CallSpec::new(Address::ZERO, Bytes::new()),
			))
			.await;

		assert_eq!(engine.queue_len().await, 1);
		assert_ne!(id, RelayEngine::new_transaction_id());
	}

	#[tokio::test]
	async fn test_initialize_builds_spending_report() {
		let engine = engine();
		engine.initialize().await.unwrap();

		let report = engine.monitor().get_spending_report().await;
		assert!(report.balance.contains_key(&10));
		assert!(report.spent.is_empty());
	}

	#[tokio::test(start_paused = true)]
	async fn test_enabled_engine_sends_queued_transactions() {
		let mut mock = MockRpcInterface::new();
		mock.expect_get_balance().returning(|_| Ok(U256::ZERO));
		mock.expect_simulate().times(1).returning(|_, _| Ok(()));
		mock.expect_submit()
			.times(1)
			.returning(|_| Ok(TransactionHash(vec![0xab; 32])));
		mock.expect_wait_for_receipt()
			.times(1)
			.returning(|_, _| Ok(receipt()));

		let engine = engine_with(true, mock).await;
		engine
			.run_until(tokio::time::sleep(Duration::from_secs(5)))
			.await
			.unwrap();

		assert_eq!(engine.queue_len().await, 0);
		let report = engine.monitor().get_chain_report(ETH_CHAIN).await.unwrap();
		assert_eq!(report.successful_transactions, 1);
		assert_eq!(report.transactions[0].status, TransactionStatus::Success);
	}

	#[tokio::test(start_paused = true)]
	async fn test_disabled_engine_never_sends() {
		let mut mock = MockRpcInterface::new();
		mock.expect_get_balance().returning(|_| Ok(U256::ZERO));
		mock.expect_simulate().never();
		mock.expect_submit().never();

		let engine = engine_with(false, mock).await;
		engine
			.run_until(tokio::time::sleep(Duration::from_secs(5)))
			.await
			.unwrap();

		assert_eq!(engine.queue_len().await, 1);
		assert!(engine.monitor().get_chain_report(ETH_CHAIN).await.is_none());
	}
}
