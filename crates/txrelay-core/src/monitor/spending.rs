//! USD view of the relay account: balances and spend per date.

use super::TransactionMonitor;
use chrono::NaiveDate;
use std::collections::BTreeMap;
use txrelay_types::{ChainBalance, ChainId, DailySpend, NativeAmount, SpendingReport};

impl TransactionMonitor {
	/// Transactions and USD cost per date, over archived and live reports.
	///
	/// Gas is valued at the current native price, not the price at the time
	/// it was spent.
	pub async fn get_spent_data(&self) -> BTreeMap<NaiveDate, DailySpend> {
		let entries: Vec<(NaiveDate, ChainId, u64, NativeAmount)> = {
			let state = self.state.read().await;
			let archived = state.daily_reports.iter().flat_map(|(date, chains)| {
				chains.values().map(move |report| {
					(*date, report.chain_id, report.total_transactions, report.total_gas_spent)
				})
			});
			let live = state.chain_reports.values().map(|report| {
				(
					report.last_updated.date_naive(),
					report.chain_id,
					report.total_transactions,
					report.total_gas_spent,
				)
			});
			archived.chain(live).collect()
		};

		let mut spent: BTreeMap<NaiveDate, DailySpend> = BTreeMap::new();
		for (date, chain_id, txs, gas) in entries {
			let usd = gas.to_usd(self.prices.native_price_usd(chain_id).await);
			spent.entry(date).or_default().add(chain_id, txs, usd);
		}
		spent
	}

	/// Reads the account's native balance on every registered chain.
	///
	/// A chain that cannot be queried reports a zero balance.
	pub async fn refresh_balances(&self) {
		let account = self.rpc.account_address();
		let mut balances = BTreeMap::new();

		for chain_id in self.chains.chain_ids() {
			let raw = match self.rpc.client(chain_id) {
				Some(client) => match client.get_balance(account).await {
					Ok(raw) => Some(raw),
					Err(e) => {
						tracing::warn!(chain_id = chain_id, error = %e, "Failed to read balance");
						None
					},
				},
				None => None,
			};

			let coin = raw
				.and_then(|raw| {
					NativeAmount::from_base_units(raw, self.chains.native_decimals(chain_id))
						.map_err(|e| {
							tracing::warn!(chain_id = chain_id, error = %e, "Unusable balance");
						})
						.ok()
				})
				.unwrap_or_default();
			let usd = coin.to_usd(self.prices.native_price_usd(chain_id).await);

			balances.insert(chain_id, ChainBalance { coin, usd });
		}

		self.state.write().await.spending.balance = balances;
	}

	/// Rebuilds the spending report from the loaded reports and live balances.
	pub async fn initialize_spending_report(&self) {
		let spent = self.get_spent_data().await;
		self.state.write().await.spending.spent = spent;
		self.refresh_balances().await;
	}

	pub async fn get_spending_report(&self) -> SpendingReport {
		self.state.read().await.spending.clone()
	}
}
