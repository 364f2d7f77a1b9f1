//! Transaction outcome monitor.
//!
//! Every attempt made by the relay ends up here as a [`TransactionReport`].
//! Reports are folded into a live [`ChainReport`] per chain, which is written
//! to `chain-{id}.json` after every change and archived into
//! `daily/chain-{id}-{date}.json` on rotation. The monitor also keeps the
//! account's [`SpendingReport`], valuing gas in USD through the price feed.
//!
//! All mutable state lives behind a single lock, so readers observe either
//! the state before or after a write, never a partial record. File writes
//! happen outside that lock but are serialized by a second one, taken first,
//! so files are written in the order the state changed.

mod csv;
mod persistence;
mod spending;

use chrono::{NaiveDate, Utc};
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::sync::{Mutex, RwLock};
use txrelay_price::PriceFeedService;
use txrelay_rpc::RpcService;
use txrelay_storage::StorageService;
use txrelay_types::{
	truncate_id, ChainId, ChainRegistry, ChainReport, NativeAmount, SpendingReport, SummaryStats,
	Transaction, TransactionHash, TransactionReport, TransactionStatus, NO_HASH,
};

/// Details of an attempt that did not succeed.
#[derive(Debug, Clone)]
pub struct TransactionFailure {
	pub status: TransactionStatus,
	/// Hash of the broadcast transaction, if it got that far.
	pub hash: Option<TransactionHash>,
	pub error: String,
	/// Native units consumed; zero unless the transaction was mined.
	pub gas_spent: NativeAmount,
}

impl TransactionFailure {
	pub fn simulation_failed(error: impl Into<String>) -> Self {
		Self {
			status: TransactionStatus::SimulationFailed,
			hash: None,
			error: error.into(),
			gas_spent: NativeAmount::zero(),
		}
	}

	pub fn sending_error(hash: Option<TransactionHash>, error: impl Into<String>) -> Self {
		Self {
			status: TransactionStatus::SendingError,
			hash,
			error: error.into(),
			gas_spent: NativeAmount::zero(),
		}
	}

	pub fn reverted(hash: TransactionHash, gas_spent: NativeAmount) -> Self {
		Self {
			status: TransactionStatus::Reverted,
			hash: Some(hash),
			error: "Transaction reverted".to_string(),
			gas_spent,
		}
	}
}

struct MonitorState {
	chain_reports: BTreeMap<ChainId, ChainReport>,
	daily_reports: BTreeMap<NaiveDate, BTreeMap<ChainId, ChainReport>>,
	spending: SpendingReport,
}

/// Records attempt outcomes and serves aggregates over them.
pub struct TransactionMonitor {
	storage: StorageService,
	rpc: Arc<RpcService>,
	prices: Arc<PriceFeedService>,
	chains: ChainRegistry,
	state: RwLock<MonitorState>,
	writes: Mutex<()>,
}

impl TransactionMonitor {
	pub fn new(
		storage: StorageService,
		rpc: Arc<RpcService>,
		prices: Arc<PriceFeedService>,
		chains: ChainRegistry,
	) -> Self {
		let account = rpc.account_address();
		Self {
			storage,
			rpc,
			prices,
			chains,
			state: RwLock::new(MonitorState {
				chain_reports: BTreeMap::new(),
				daily_reports: BTreeMap::new(),
				spending: SpendingReport::new(account),
			}),
			writes: Mutex::new(()),
		}
	}

	/// Records a successful attempt.
	pub async fn record_success(
		&self,
		tx: &Transaction,
		hash: &TransactionHash,
		gas_spent: NativeAmount,
	) {
		let report = TransactionReport {
			hash: hash.to_string(),
			chain_id: tx.chain_id,
			tx_type: tx.tx_type,
			id: tx.id.clone(),
			gas_spent,
			timestamp: Utc::now(),
			status: TransactionStatus::Success,
			error_message: None,
			retries: tx.retries,
		};
		self.record(report).await;
	}

	/// Records a failed attempt.
	pub async fn record_failure(&self, tx: &Transaction, failure: TransactionFailure) {
		let report = TransactionReport {
			hash: failure
				.hash
				.map(|hash| hash.to_string())
				.unwrap_or_else(|| NO_HASH.to_string()),
			chain_id: tx.chain_id,
			tx_type: tx.tx_type,
			id: tx.id.clone(),
			gas_spent: failure.gas_spent,
			timestamp: Utc::now(),
			status: failure.status,
			error_message: Some(failure.error),
			retries: tx.retries,
		};
		self.record(report).await;
	}

	async fn record(&self, report: TransactionReport) {
		let chain_id = report.chain_id;
		let date = report.timestamp.date_naive();
		let usd = report
			.gas_spent
			.to_usd(self.prices.native_price_usd(chain_id).await);

		tracing::debug!(
			chain_id = chain_id,
			tx_id = %truncate_id(&report.id),
			status = %report.status,
			gas_spent = %report.gas_spent,
			"Recording transaction outcome"
		);

		let _writes = self.writes.lock().await;
		let snapshot = {
			let mut state = self.state.write().await;
			let chain = state
				.chain_reports
				.entry(chain_id)
				.or_insert_with(|| ChainReport::new(chain_id, report.timestamp));
			chain.record(report);
			let snapshot = chain.clone();

			if !usd.is_zero() {
				state
					.spending
					.spent
					.entry(date)
					.or_default()
					.add(chain_id, 1, usd);
			}
			snapshot
		};

		self.persist_live(&snapshot).await;
	}

	/// Live report of one chain.
	pub async fn get_chain_report(&self, chain_id: ChainId) -> Option<ChainReport> {
		self.state.read().await.chain_reports.get(&chain_id).cloned()
	}

	/// Live reports of every chain, by chain id.
	pub async fn get_all_reports(&self) -> BTreeMap<ChainId, ChainReport> {
		self.state.read().await.chain_reports.clone()
	}

	pub async fn get_summary_stats(&self) -> SummaryStats {
		let state = self.state.read().await;
		SummaryStats::from_reports(state.chain_reports.values())
	}

	/// Archived report of one chain for one date.
	pub async fn get_daily_report(&self, chain_id: ChainId, date: NaiveDate) -> Option<ChainReport> {
		let state = self.state.read().await;
		state
			.daily_reports
			.get(&date)
			.and_then(|chains| chains.get(&chain_id))
			.cloned()
	}

	/// Archived reports of every chain for one date, ordered by chain id.
	pub async fn get_daily_reports_by_date(&self, date: NaiveDate) -> Vec<ChainReport> {
		let state = self.state.read().await;
		state
			.daily_reports
			.get(&date)
			.map(|chains| chains.values().cloned().collect())
			.unwrap_or_default()
	}

	/// Archived reports of one chain, by date.
	pub async fn get_daily_reports_by_chain(
		&self,
		chain_id: ChainId,
	) -> BTreeMap<NaiveDate, ChainReport> {
		let state = self.state.read().await;
		state
			.daily_reports
			.iter()
			.filter_map(|(date, chains)| chains.get(&chain_id).map(|report| (*date, report.clone())))
			.collect()
	}

	/// Dates that have at least one archived report, oldest first.
	pub async fn get_available_dates(&self) -> Vec<NaiveDate> {
		self.state.read().await.daily_reports.keys().copied().collect()
	}

	/// Writes the chain's transaction log as CSV and returns its location.
	///
	/// Returns `None` when the chain has no live report or the file could not
	/// be written.
	pub async fn export_to_csv(&self, chain_id: ChainId) -> Option<String> {
		let report = self.get_chain_report(chain_id).await?;
		let key = persistence::csv_key(chain_id);

		match self.storage.store_text(&key, csv::render(&report)).await {
			Ok(location) => {
				tracing::info!(chain_id = chain_id, location = %location, "Exported transactions");
				Some(location)
			},
			Err(e) => {
				tracing::error!(chain_id = chain_id, error = %e, "Failed to export transactions");
				None
			},
		}
	}

	/// Logs per-chain totals of the live reports.
	pub async fn log_stats(&self) {
		let stats = self.get_summary_stats().await;

		tracing::info!("=== Transaction Statistics ===");
		for chain in stats.chains.iter().filter(|chain| chain.transactions > 0) {
			let name = self
				.chains
				.get(chain.chain_id)
				.map(|network| network.name.as_str())
				.unwrap_or("unknown");
			tracing::info!(
				chain_id = chain.chain_id,
				chain = %name,
				transactions = chain.transactions,
				gas_spent = %chain.gas_spent,
				"Chain statistics"
			);
		}
		tracing::info!(
			chains = stats.total_chains,
			transactions = stats.total_transactions,
			successful = stats.successful_transactions,
			failed = stats.failed_transactions,
			gas_spent = %stats.total_gas_spent,
			"Totals"
		);
	}
}
