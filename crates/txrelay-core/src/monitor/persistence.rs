//! On-disk layout of the monitor's reports, loading and rotation.
//!
//! ```text
//! chain-{id}.json                 live report
//! chain-{id}.csv                  export of the live log
//! daily/chain-{id}-{date}.json    rotated snapshot
//! ```
//!
//! Rotation writes the daily snapshot before the reset live report. If the
//! second write is lost, the live file still lists archived attempts; loading
//! drops them again and folding skips attempts already archived, so nothing is
//! counted twice.

use super::{MonitorState, TransactionMonitor};
use crate::RelayError;
use chrono::{NaiveDate, Utc};
use regex::Regex;
use std::collections::BTreeMap;
use txrelay_types::{ChainId, ChainReport};

const DAILY_DIR: &str = "daily";

pub(super) fn live_key(chain_id: ChainId) -> String {
	format!("chain-{}.json", chain_id)
}

pub(super) fn csv_key(chain_id: ChainId) -> String {
	format!("chain-{}.csv", chain_id)
}

pub(super) fn daily_key(chain_id: ChainId, date: NaiveDate) -> String {
	format!("{}/chain-{}-{}.json", DAILY_DIR, chain_id, date.format("%Y-%m-%d"))
}

/// Patterns of live and daily report file names.
struct FileNames {
	live: Regex,
	daily: Regex,
}

impl FileNames {
	fn new() -> Result<Self, RelayError> {
		let live = Regex::new(r"^chain-(\d+)\.json$")
			.map_err(|e| RelayError::Config(format!("Regex error: {}", e)))?;
		let daily = Regex::new(r"^chain-(.+)-(\d{4}-\d{2}-\d{2})\.json$")
			.map_err(|e| RelayError::Config(format!("Regex error: {}", e)))?;
		Ok(Self { live, daily })
	}

	/// Chain id of a live report file name.
	fn parse_live(&self, name: &str) -> Option<ChainId> {
		let captures = self.live.captures(name)?;
		captures.get(1)?.as_str().parse().ok()
	}

	/// Chain id and date of a daily report file name.
	fn parse_daily(&self, name: &str) -> Option<(ChainId, NaiveDate)> {
		let captures = self.daily.captures(name)?;
		let chain_id = captures.get(1)?.as_str().parse().ok()?;
		let date = NaiveDate::parse_from_str(captures.get(2)?.as_str(), "%Y-%m-%d").ok()?;
		Some((chain_id, date))
	}
}

impl TransactionMonitor {
	/// Loads every persisted live and daily report into memory.
	///
	/// Files that cannot be parsed are skipped with a warning. Live attempts
	/// that are already archived are dropped. Fails only when the storage
	/// itself cannot be listed.
	pub async fn load(&self) -> Result<(), RelayError> {
		let names = FileNames::new()?;
		let live_names = self
			.storage
			.list("")
			.await
			.map_err(|e| RelayError::Storage(e.to_string()))?;
		let daily_names = self
			.storage
			.list(DAILY_DIR)
			.await
			.map_err(|e| RelayError::Storage(e.to_string()))?;

		let mut chain_reports = BTreeMap::new();
		let mut daily_reports: BTreeMap<NaiveDate, BTreeMap<ChainId, ChainReport>> =
			BTreeMap::new();

		for name in live_names {
			let Some(chain_id) = names.parse_live(&name) else {
				continue;
			};
			match self.storage.retrieve::<ChainReport>(&name).await {
				Ok(report) => {
					chain_reports.insert(chain_id, report);
				},
				Err(e) => {
					tracing::warn!(file = %name, error = %e, "Skipping unreadable chain report");
				},
			}
		}

		for name in daily_names {
			let Some((chain_id, date)) = names.parse_daily(&name) else {
				tracing::debug!(file = %name, "Ignoring file in daily reports");
				continue;
			};
			let key = format!("{}/{}", DAILY_DIR, name);
			match self.storage.retrieve::<ChainReport>(&key).await {
				Ok(report) => {
					daily_reports
						.entry(date)
						.or_default()
						.insert(chain_id, report);
				},
				Err(e) => {
					tracing::warn!(file = %name, error = %e, "Skipping unreadable daily report");
				},
			}
		}

		for (chain_id, live) in chain_reports.iter_mut() {
			let dropped = live.prune(|report| {
				daily_reports
					.values()
					.filter_map(|chains| chains.get(chain_id))
					.any(|archived| archived.contains(report))
			});
			if dropped > 0 {
				tracing::warn!(
					chain_id = chain_id,
					dropped = dropped,
					"Dropped archived attempts from live report"
				);
			}
		}

		tracing::info!(
			chains = chain_reports.len(),
			dates = daily_reports.len(),
			"Loaded transaction reports"
		);

		let mut state = self.state.write().await;
		state.chain_reports = chain_reports;
		state.daily_reports = daily_reports;
		Ok(())
	}

	/// Archives every non-empty live report into today's daily report.
	///
	/// Returns the number of chains rotated.
	pub async fn rotate(&self) -> usize {
		self.rotate_into(Utc::now().date_naive()).await
	}

	pub(crate) async fn rotate_into(&self, date: NaiveDate) -> usize {
		let _writes = self.writes.lock().await;
		let rotated: Vec<(ChainReport, ChainReport)> = {
			let mut state = self.state.write().await;
			let MonitorState {
				chain_reports,
				daily_reports,
				..
			} = &mut *state;

			let mut rotated = Vec::new();
			for (chain_id, live) in chain_reports.iter_mut() {
				if live.is_empty() {
					continue;
				}

				let daily = daily_reports
					.entry(date)
					.or_default()
					.entry(*chain_id)
					.or_insert_with(|| ChainReport::new(*chain_id, live.last_updated));
				let appended = daily.absorb(live);
				if appended < live.transactions.len() {
					tracing::warn!(
						chain_id = chain_id,
						skipped = live.transactions.len() - appended,
						"Skipped attempts already archived"
					);
				}

				live.reset();
				rotated.push((daily.clone(), live.clone()));
			}
			rotated
		};

		for (daily, live) in &rotated {
			let key = daily_key(daily.chain_id, date);
			if let Err(e) = self.storage.store(&key, daily).await {
				tracing::error!(chain_id = daily.chain_id, file = %key, error = %e, "Failed to write daily report");
			}
			self.persist_live(live).await;
		}

		if !rotated.is_empty() {
			tracing::info!(chains = rotated.len(), date = %date, "Rotated chain reports");
		}
		rotated.len()
	}

	/// Writes a live report; failures are logged only.
	pub(super) async fn persist_live(&self, report: &ChainReport) {
		let key = live_key(report.chain_id);
		if let Err(e) = self.storage.store(&key, report).await {
			tracing::error!(chain_id = report.chain_id, file = %key, error = %e, "Failed to write chain report");
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::test_utils::{file_monitor, monitor_with_storage, tx, ETH_CHAIN, POL_CHAIN};
	use async_trait::async_trait;
	use std::sync::atomic::{AtomicBool, Ordering};
	use std::sync::Arc;
	use txrelay_storage::implementations::memory::MemoryStorage;
	use txrelay_storage::{StorageError, StorageInterface, StorageService};
	use txrelay_types::{NativeAmount, TransactionHash};

	fn date(value: &str) -> NaiveDate {
		NaiveDate::parse_from_str(value, "%Y-%m-%d").unwrap()
	}

	/// Memory storage whose live report writes can be made to fail.
	#[derive(Clone, Default)]
	struct FailingLiveWrites {
		inner: MemoryStorage,
		failing: Arc<AtomicBool>,
	}

	#[async_trait]
	impl StorageInterface for FailingLiveWrites {
		async fn get_bytes(&self, key: &str) -> Result<Vec<u8>, StorageError> {
			self.inner.get_bytes(key).await
		}

		async fn set_bytes(&self, key: &str, value: Vec<u8>) -> Result<(), StorageError> {
			if self.failing.load(Ordering::SeqCst) && !key.starts_with(DAILY_DIR) {
				return Err(StorageError::Backend("disk full".into()));
			}
			self.inner.set_bytes(key, value).await
		}

		async fn list(&self, dir: &str) -> Result<Vec<String>, StorageError> {
			self.inner.list(dir).await
		}

		fn locate(&self, key: &str) -> String {
			self.inner.locate(key)
		}
	}

	#[test]
	fn test_file_names() {
		let names = FileNames::new().unwrap();
		assert_eq!(live_key(10), "chain-10.json");
		assert_eq!(daily_key(10, date("2024-01-05")), "daily/chain-10-2024-01-05.json");

		assert_eq!(names.parse_live("chain-10.json"), Some(10));
		assert_eq!(names.parse_live("chain-10-2024-01-05.json"), None);
		assert_eq!(names.parse_live("chain-10.csv"), None);

		assert_eq!(
			names.parse_daily("chain-137-2024-01-05.json"),
			Some((137, date("2024-01-05")))
		);
		assert_eq!(names.parse_daily("chain-x-2024-01-05.json"), None);
		assert_eq!(names.parse_daily("chain-10-2024-13-40.json"), None);
	}

	#[tokio::test]
	async fn test_lost_live_write_is_not_archived_twice() {
		let storage = FailingLiveWrites::default();
		let day = date("2024-01-05");
		let gas: NativeAmount = "0.25".parse().unwrap();

		let monitor = monitor_with_storage(Box::new(storage.clone())).await;
		monitor
			.record_success(&tx("t1", ETH_CHAIN, 3), &TransactionHash(vec![1; 32]), gas)
			.await;

		storage.failing.store(true, Ordering::SeqCst);
		assert_eq!(monitor.rotate_into(day).await, 1);
		storage.failing.store(false, Ordering::SeqCst);

		// live file on disk still lists t1
		let stale: ChainReport = StorageService::new(Box::new(storage.inner.clone()))
			.retrieve(&live_key(ETH_CHAIN))
			.await
			.unwrap();
		assert_eq!(stale.total_transactions, 1);

		let restarted = monitor_with_storage(Box::new(storage.clone())).await;
		restarted.load().await.unwrap();
		let live = restarted.get_chain_report(ETH_CHAIN).await.unwrap();
		assert!(live.is_empty());
		assert!(live.total_gas_spent.is_zero());

		restarted.rotate_into(day).await;
		let archived = restarted.get_daily_report(ETH_CHAIN, day).await.unwrap();
		assert_eq!(archived.total_transactions, 1);
		assert_eq!(archived.total_gas_spent, gas);
		let ids: Vec<&str> = archived.transactions.iter().map(|r| r.id.as_str()).collect();
		assert_eq!(ids, vec!["t1"]);

		let spent = restarted.get_spent_data().await;
		assert_eq!(spent.values().map(|day| day.txs).sum::<u64>(), 1);
	}

	#[tokio::test]
	async fn test_stale_live_report_folds_once() {
		let day = date("2024-01-05");
		let gas: NativeAmount = "0.25".parse().unwrap();
		let monitor = monitor_with_storage(Box::new(MemoryStorage::new())).await;
		monitor
			.record_success(&tx("t1", ETH_CHAIN, 3), &TransactionHash(vec![1; 32]), gas)
			.await;
		let stale = monitor.get_chain_report(ETH_CHAIN).await.unwrap();
		monitor.rotate_into(day).await;

		// the same attempts come back without going through load
		monitor.state.write().await.chain_reports.insert(ETH_CHAIN, stale);
		assert_eq!(monitor.rotate_into(day).await, 1);

		let archived = monitor.get_daily_report(ETH_CHAIN, day).await.unwrap();
		assert_eq!(archived.total_transactions, 1);
		assert_eq!(archived.total_gas_spent, gas);
		assert!(monitor.get_chain_report(ETH_CHAIN).await.unwrap().is_empty());
	}

	#[tokio::test]
	async fn test_rotation_round_trip() {
		let dir = tempfile::tempdir().unwrap();
		let monitor = file_monitor(dir.path()).await;
		let day = date("2024-01-05");

		let t = tx("t1", ETH_CHAIN, 3);
		let hash = TransactionHash(vec![1; 32]);
		let gas: NativeAmount = "0.25".parse().unwrap();
		monitor.record_success(&t, &hash, gas).await;
		monitor.record_success(&t, &hash, gas).await;

		assert_eq!(monitor.rotate_into(day).await, 1);

		let live = monitor.get_chain_report(ETH_CHAIN).await.unwrap();
		assert!(live.is_empty());
		assert!(live.total_gas_spent.is_zero());
		let archived = monitor.get_daily_report(ETH_CHAIN, day).await.unwrap();
		assert_eq!(archived.total_transactions, 2);

		let reloaded = file_monitor(dir.path()).await;
		reloaded.load().await.unwrap();

		assert_eq!(reloaded.get_daily_report(ETH_CHAIN, day).await, Some(archived));
		assert_eq!(reloaded.get_chain_report(ETH_CHAIN).await, Some(live));
		assert_eq!(reloaded.get_available_dates().await, vec![day]);
	}

	#[tokio::test]
	async fn test_rotation_folds_into_same_day() {
		let dir = tempfile::tempdir().unwrap();
		let monitor = file_monitor(dir.path()).await;
		let day = date("2024-01-05");
		let gas: NativeAmount = "0.1".parse().unwrap();
		let hash = TransactionHash(vec![1; 32]);

		monitor.record_success(&tx("a", ETH_CHAIN, 3), &hash, gas).await;
		monitor.rotate_into(day).await;
		monitor.record_success(&tx("b", ETH_CHAIN, 3), &hash, gas).await;
		monitor.record_success(&tx("c", POL_CHAIN, 3), &hash, gas).await;
		assert_eq!(monitor.rotate_into(day).await, 2);

		// nothing left to rotate
		assert_eq!(monitor.rotate_into(day).await, 0);

		let eth = monitor.get_daily_report(ETH_CHAIN, day).await.unwrap();
		assert_eq!(eth.total_transactions, 2);
		assert_eq!(eth.total_gas_spent.to_string(), "0.200000000000000000");
		let ids: Vec<&str> = eth.transactions.iter().map(|r| r.id.as_str()).collect();
		assert_eq!(ids, vec!["a", "b"]);

		assert_eq!(monitor.get_daily_reports_by_date(day).await.len(), 2);
		assert_eq!(monitor.get_daily_reports_by_chain(POL_CHAIN).await.len(), 1);
		assert!(monitor
			.get_daily_reports_by_date(date("2024-01-06"))
			.await
			.is_empty());
	}

	#[tokio::test]
	async fn test_load_skips_unreadable_files() {
		let dir = tempfile::tempdir().unwrap();
		std::fs::write(dir.path().join("chain-10.json"), "not json").unwrap();
		std::fs::write(dir.path().join("notes.txt"), "hello").unwrap();
		std::fs::create_dir_all(dir.path().join("daily")).unwrap();
		std::fs::write(dir.path().join("daily").join("chain-10-bad.json"), "{}").unwrap();

		let monitor = file_monitor(dir.path()).await;
		monitor.load().await.unwrap();

		assert!(monitor.get_all_reports().await.is_empty());
		assert!(monitor.get_available_dates().await.is_empty());
	}
}
