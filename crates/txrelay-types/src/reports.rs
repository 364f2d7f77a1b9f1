//! Report types produced and persisted by the transaction monitor.
//!
//! A [`TransactionReport`] is written for every attempt outcome. Reports are
//! appended to the live [`ChainReport`] of their chain, which rotation later
//! archives into a daily snapshot. The [`SpendingReport`] is the USD view over
//! the account's balances and spend. All of these are serialized as camelCase
//! JSON so that an operator can read the files directly.

use crate::amount::NativeAmount;
use crate::transaction::{ChainId, TransactionType};
use alloy_primitives::Address;
use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Hash recorded for attempts that never reached the network.
pub const NO_HASH: &str = "none";

/// Outcome of a single attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TransactionStatus {
	/// Included and executed successfully.
	Success,
	/// Included but execution reverted. Terminal.
	Reverted,
	/// Broadcast failed or the receipt did not arrive in time.
	SendingError,
	/// Dry-run rejected the call; no gas spent.
	SimulationFailed,
}

impl TransactionStatus {
	pub fn as_str(&self) -> &'static str {
		match self {
			TransactionStatus::Success => "success",
			TransactionStatus::Reverted => "reverted",
			TransactionStatus::SendingError => "sending-error",
			TransactionStatus::SimulationFailed => "simulation-failed",
		}
	}

	pub fn is_success(&self) -> bool {
		matches!(self, TransactionStatus::Success)
	}
}

impl fmt::Display for TransactionStatus {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(self.as_str())
	}
}

/// Record of one attempt outcome.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionReport {
	/// Transaction hash, or [`NO_HASH`] when nothing was broadcast.
	pub hash: String,
	pub chain_id: ChainId,
	#[serde(rename = "type")]
	pub tx_type: TransactionType,
	pub id: String,
	/// Native units consumed by this attempt.
	pub gas_spent: NativeAmount,
	pub timestamp: DateTime<Utc>,
	pub status: TransactionStatus,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub error_message: Option<String>,
	/// Retry budget left after this attempt.
	#[serde(default)]
	pub retries: u32,
}

impl TransactionReport {
	/// Same attempt: same transaction, time and outcome.
	pub fn same_attempt(&self, other: &TransactionReport) -> bool {
		self.id == other.id && self.timestamp == other.timestamp && self.status == other.status
	}
}

/// Live rolling aggregate of one chain's attempts since the last rotation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChainReport {
	pub chain_id: ChainId,
	pub total_transactions: u64,
	pub successful_transactions: u64,
	pub failed_transactions: u64,
	/// Gas spent by successful attempts only.
	pub total_gas_spent: NativeAmount,
	pub last_updated: DateTime<Utc>,
	pub transactions: Vec<TransactionReport>,
}

impl ChainReport {
	pub fn new(chain_id: ChainId, now: DateTime<Utc>) -> Self {
		Self {
			chain_id,
			total_transactions: 0,
			successful_transactions: 0,
			failed_transactions: 0,
			total_gas_spent: NativeAmount::zero(),
			last_updated: now,
			transactions: Vec::new(),
		}
	}

	/// Appends an attempt and updates the running totals.
	pub fn record(&mut self, report: TransactionReport) {
		self.total_transactions += 1;
		if report.status.is_success() {
			self.successful_transactions += 1;
			self.total_gas_spent = self.total_gas_spent + report.gas_spent;
		} else {
			self.failed_transactions += 1;
		}
		self.last_updated = report.timestamp;
		self.transactions.push(report);
	}

	/// Whether the log already holds this attempt.
	pub fn contains(&self, report: &TransactionReport) -> bool {
		self.transactions.iter().any(|existing| existing.same_attempt(report))
	}

	/// Folds another report for the same chain into this one.
	///
	/// Attempts already present in the log are skipped, so folding the same
	/// report twice leaves the totals unchanged. Returns the number of
	/// attempts appended.
	pub fn absorb(&mut self, other: &ChainReport) -> usize {
		let last_updated = self.last_updated.max(other.last_updated);
		let mut appended = 0;
		for report in &other.transactions {
			if self.contains(report) {
				continue;
			}
			self.record(report.clone());
			appended += 1;
		}
		self.last_updated = last_updated;
		appended
	}

	/// Drops the attempts matching `archived` and recomputes the totals.
	///
	/// Returns the number of attempts dropped.
	pub fn prune(&mut self, mut archived: impl FnMut(&TransactionReport) -> bool) -> usize {
		let (dropped, kept): (Vec<_>, Vec<_>) =
			self.transactions.drain(..).partition(|report| archived(report));
		if dropped.is_empty() {
			self.transactions = kept;
			return 0;
		}

		let last_updated = self.last_updated;
		self.reset();
		for report in kept {
			self.record(report);
		}
		self.last_updated = last_updated;
		dropped.len()
	}

	/// Clears counters and the log, keeping `last_updated`.
	pub fn reset(&mut self) {
		self.total_transactions = 0;
		self.successful_transactions = 0;
		self.failed_transactions = 0;
		self.total_gas_spent = NativeAmount::zero();
		self.transactions.clear();
	}

	pub fn is_empty(&self) -> bool {
		self.total_transactions == 0 && self.transactions.is_empty()
	}
}

/// Per-chain line of [`SummaryStats`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChainSummary {
	pub chain_id: ChainId,
	pub transactions: u64,
	pub gas_spent: NativeAmount,
}

/// Totals across every live chain report.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SummaryStats {
	pub total_chains: usize,
	pub total_transactions: u64,
	pub successful_transactions: u64,
	pub failed_transactions: u64,
	pub total_gas_spent: NativeAmount,
	pub chains: Vec<ChainSummary>,
}

impl SummaryStats {
	pub fn from_reports<'a>(reports: impl IntoIterator<Item = &'a ChainReport>) -> Self {
		let mut stats = SummaryStats::default();
		for report in reports {
			stats.total_chains += 1;
			stats.total_transactions += report.total_transactions;
			stats.successful_transactions += report.successful_transactions;
			stats.failed_transactions += report.failed_transactions;
			stats.total_gas_spent = stats.total_gas_spent + report.total_gas_spent;
			stats.chains.push(ChainSummary {
				chain_id: report.chain_id,
				transactions: report.total_transactions,
				gas_spent: report.total_gas_spent,
			});
		}
		stats
	}
}

/// Native balance of the relay account on one chain.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ChainBalance {
	pub coin: NativeAmount,
	pub usd: Decimal,
}

/// Transactions and USD cost for one calendar date.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct DailySpend {
	pub txs: u64,
	/// USD cost keyed by chain id.
	pub usd: BTreeMap<ChainId, Decimal>,
}

impl DailySpend {
	/// Adds `txs` transactions costing `usd` on `chain_id`.
	pub fn add(&mut self, chain_id: ChainId, txs: u64, usd: Decimal) {
		self.txs += txs;
		let entry = self.usd.entry(chain_id).or_insert(Decimal::ZERO);
		*entry = entry.saturating_add(usd);
	}
}

/// Account scoped USD view of balances and spend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpendingReport {
	pub account: Address,
	pub balance: BTreeMap<ChainId, ChainBalance>,
	pub spent: BTreeMap<NaiveDate, DailySpend>,
}

impl SpendingReport {
	pub fn new(account: Address) -> Self {
		Self {
			account,
			balance: BTreeMap::new(),
			spent: BTreeMap::new(),
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use chrono::TimeZone;

	fn report(status: TransactionStatus, gas: &str, ts: i64) -> TransactionReport {
		TransactionReport {
			hash: NO_HASH.to_string(),
			chain_id: 10,
			tx_type: TransactionType::UpdatePeriod,
			id: format!("tx-{}", ts),
			gas_spent: gas.parse().unwrap(),
			timestamp: Utc.timestamp_opt(ts, 0).unwrap(),
			status,
			error_message: None,
			retries: 0,
		}
	}

	#[test]
	fn test_only_successes_add_gas() {
		let mut chain = ChainReport::new(10, Utc.timestamp_opt(0, 0).unwrap());
		chain.record(report(TransactionStatus::Success, "0.1", 10));
		chain.record(report(TransactionStatus::Reverted, "0.5", 20));

		assert_eq!(chain.total_transactions, 2);
		assert_eq!(chain.successful_transactions, 1);
		assert_eq!(chain.failed_transactions, 1);
		assert_eq!(chain.total_gas_spent.to_string(), "0.100000000000000000");
		assert_eq!(chain.last_updated.timestamp(), 20);
	}

	#[test]
	fn test_reset_keeps_last_updated() {
		let mut chain = ChainReport::new(10, Utc.timestamp_opt(0, 0).unwrap());
		chain.record(report(TransactionStatus::Success, "0.1", 30));
		chain.reset();

		assert!(chain.is_empty());
		assert!(chain.total_gas_spent.is_zero());
		assert_eq!(chain.last_updated.timestamp(), 30);
	}

	#[test]
	fn test_absorb_sums_and_concatenates() {
		let mut archived = ChainReport::new(10, Utc.timestamp_opt(0, 0).unwrap());
		archived.record(report(TransactionStatus::Success, "0.1", 10));

		let mut live = ChainReport::new(10, Utc.timestamp_opt(0, 0).unwrap());
		live.record(report(TransactionStatus::Success, "0.2", 40));
		live.record(report(TransactionStatus::SimulationFailed, "0", 50));

		archived.absorb(&live);
		assert_eq!(archived.total_transactions, 3);
		assert_eq!(archived.failed_transactions, 1);
		assert_eq!(archived.total_gas_spent.to_string(), "0.300000000000000000");
		assert_eq!(archived.transactions.len(), 3);
		assert_eq!(archived.last_updated.timestamp(), 50);
	}

	#[test]
	fn test_absorb_skips_known_attempts() {
		let mut live = ChainReport::new(10, Utc.timestamp_opt(0, 0).unwrap());
		live.record(report(TransactionStatus::Success, "0.25", 10));
		live.record(report(TransactionStatus::Reverted, "0.5", 20));

		let mut archived = ChainReport::new(10, Utc.timestamp_opt(0, 0).unwrap());
		assert_eq!(archived.absorb(&live), 2);
		assert_eq!(archived.absorb(&live), 0);

		assert_eq!(archived.total_transactions, 2);
		assert_eq!(archived.failed_transactions, 1);
		assert_eq!(archived.total_gas_spent.to_string(), "0.250000000000000000");
		assert_eq!(archived.transactions.len(), 2);

		// a later attempt of the same transaction is a distinct entry
		let mut retry = live.clone();
		retry.reset();
		let mut again = report(TransactionStatus::Success, "0.25", 10);
		again.timestamp = Utc.timestamp_opt(30, 0).unwrap();
		retry.record(again);
		assert_eq!(archived.absorb(&retry), 1);
		assert_eq!(archived.total_transactions, 3);
	}

	#[test]
	fn test_prune_recomputes_totals() {
		let mut archived = ChainReport::new(10, Utc.timestamp_opt(0, 0).unwrap());
		archived.record(report(TransactionStatus::Success, "0.25", 10));

		let mut live = archived.clone();
		live.record(report(TransactionStatus::Success, "0.1", 20));
		live.record(report(TransactionStatus::SimulationFailed, "0", 30));

		assert_eq!(live.prune(|r| archived.contains(r)), 1);
		assert_eq!(live.total_transactions, 2);
		assert_eq!(live.successful_transactions, 1);
		assert_eq!(live.failed_transactions, 1);
		assert_eq!(live.total_gas_spent.to_string(), "0.100000000000000000");
		assert_eq!(live.last_updated.timestamp(), 30);

		assert_eq!(live.prune(|r| archived.contains(r)), 0);
		assert_eq!(live.total_transactions, 2);
	}

	#[test]
	fn test_chain_report_json_shape() {
		let mut chain = ChainReport::new(10, Utc.timestamp_opt(0, 0).unwrap());
		chain.record(report(TransactionStatus::SendingError, "0", 10));

		let json = serde_json::to_value(&chain).unwrap();
		assert_eq!(json["chainId"], 10);
		assert_eq!(json["failedTransactions"], 1);
		assert_eq!(json["totalGasSpent"], "0.000000000000000000");
		assert_eq!(json["transactions"][0]["status"], "sending-error");
		assert_eq!(json["transactions"][0]["type"], "update-period");
		assert!(json["transactions"][0].get("errorMessage").is_none());

		let back: ChainReport = serde_json::from_value(json).unwrap();
		assert_eq!(back, chain);
	}

	#[test]
	fn test_summary_stats() {
		let mut a = ChainReport::new(10, Utc::now());
		a.record(report(TransactionStatus::Success, "0.25", 10));
		let mut b = ChainReport::new(137, Utc::now());
		b.record(report(TransactionStatus::Success, "0.5", 10));
		b.record(report(TransactionStatus::Reverted, "0.1", 20));

		let stats = SummaryStats::from_reports([&a, &b]);
		assert_eq!(stats.total_chains, 2);
		assert_eq!(stats.total_transactions, 3);
		assert_eq!(stats.failed_transactions, 1);
		assert_eq!(stats.total_gas_spent.to_string(), "0.750000000000000000");
		assert_eq!(stats.chains[1].chain_id, 137);
	}

	#[test]
	fn test_daily_spend_add() {
		let mut spend = DailySpend::default();
		spend.add(10, 1, Decimal::new(5, 1));
		spend.add(10, 1, Decimal::new(25, 2));
		assert_eq!(spend.txs, 2);
		assert_eq!(spend.usd[&10], Decimal::new(75, 2));
	}
}
