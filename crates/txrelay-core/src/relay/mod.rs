//! Single-flight transaction sender.
//!
//! Each tick takes the head of the queue through simulation, submission and
//! confirmation, then reports the outcome to the monitor. Ticks that fire
//! while an attempt is still running return immediately, so at most one
//! transaction is in flight across all chains.
//!
//! Outcome handling:
//!
//! - no client for the chain: nothing is recorded, the head is retried on
//!   the next tick without spending its retry budget
//! - simulation failure: one retry is spent, the transaction moves to the
//!   tail or is dropped once the budget is exhausted
//! - broadcast failure or receipt timeout: the whole budget is forfeited
//! - revert: dropped, the gas it burned is recorded
//! - success: dropped, the gas it used is recorded

use crate::monitor::{TransactionFailure, TransactionMonitor};
use crate::queue::TxQueue;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::instrument;
use txrelay_rpc::RpcService;
use txrelay_types::{
	truncate_id, ChainRegistry, NativeAmount, Transaction, TransactionReceipt, TransactionStatus,
};

/// What a call to [`TransactionRelay::tick`] did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
	/// The queue was empty.
	Idle,
	/// Another attempt was still in flight.
	Busy,
	/// The head's chain has no client; the queue was left untouched.
	Deferred,
	/// The head was attempted with the given result.
	Attempted(TransactionStatus),
}

pub struct TransactionRelay {
	queue: Arc<Mutex<TxQueue>>,
	rpc: Arc<RpcService>,
	monitor: Arc<TransactionMonitor>,
	chains: ChainRegistry,
	receipt_timeout: Duration,
	in_flight: Mutex<()>,
}

impl TransactionRelay {
	pub fn new(
		queue: Arc<Mutex<TxQueue>>,
		rpc: Arc<RpcService>,
		monitor: Arc<TransactionMonitor>,
		chains: ChainRegistry,
		receipt_timeout: Duration,
	) -> Self {
		Self {
			queue,
			rpc,
			monitor,
			chains,
			receipt_timeout,
			in_flight: Mutex::new(()),
		}
	}

	/// Attempts the head of the queue, unless an attempt is already running.
	pub async fn tick(&self) -> TickOutcome {
		let Ok(_guard) = self.in_flight.try_lock() else {
			tracing::debug!("Previous attempt still in flight, skipping tick");
			return TickOutcome::Busy;
		};

		// the queue lock is released before any RPC call
		let head = self.queue.lock().await.peek_head().cloned();
		match head {
			Some(tx) => self.attempt(tx).await,
			None => TickOutcome::Idle,
		}
	}

	#[instrument(skip_all, fields(tx = %tx.label(), chain_id = tx.chain_id))]
	async fn attempt(&self, mut tx: Transaction) -> TickOutcome {
		let Some(client) = self.rpc.client(tx.chain_id) else {
			tracing::warn!("No RPC client for chain, keeping transaction queued");
			return TickOutcome::Deferred;
		};

		if let Err(e) = client
			.simulate(&tx.call, self.rpc.account_address())
			.await
		{
			tx.retries = tx.retries.saturating_sub(1);
			self.requeue_or_drop(&tx).await;
			tracing::warn!(retries = tx.retries, error = %e, "Simulation failed");
			self.monitor
				.record_failure(&tx, TransactionFailure::simulation_failed(e.to_string()))
				.await;
			return TickOutcome::Attempted(TransactionStatus::SimulationFailed);
		}

		let hash = match client.submit(&tx.call).await {
			Ok(hash) => hash,
			Err(e) => {
				tx.retries = 0;
				self.drop_head(&tx).await;
				tracing::error!(error = %e, "Failed to send transaction");
				self.monitor
					.record_failure(&tx, TransactionFailure::sending_error(None, e.to_string()))
					.await;
				return TickOutcome::Attempted(TransactionStatus::SendingError);
			},
		};
		tracing::info!(tx_hash = %truncate_id(&hash.to_string()), "Submitted");

		let receipt = match client.wait_for_receipt(&hash, self.receipt_timeout).await {
			Ok(receipt) => receipt,
			Err(e) => {
				tx.retries = 0;
				self.drop_head(&tx).await;
				tracing::error!(tx_hash = %hash, error = %e, "No receipt for transaction");
				self.monitor
					.record_failure(
						&tx,
						TransactionFailure::sending_error(Some(hash), e.to_string()),
					)
					.await;
				return TickOutcome::Attempted(TransactionStatus::SendingError);
			},
		};

		let gas_spent = self.gas_spent(tx.chain_id, &receipt);
		self.drop_head(&tx).await;

		if receipt.success {
			tracing::info!(
				tx_hash = %truncate_id(&hash.to_string()),
				block = receipt.block_number,
				gas_spent = %gas_spent,
				"Confirmed"
			);
			self.monitor.record_success(&tx, &hash, gas_spent).await;
			TickOutcome::Attempted(TransactionStatus::Success)
		} else {
			tracing::warn!(
				tx_hash = %hash,
				block = receipt.block_number,
				gas_spent = %gas_spent,
				"Transaction reverted"
			);
			self.monitor
				.record_failure(&tx, TransactionFailure::reverted(hash, gas_spent))
				.await;
			TickOutcome::Attempted(TransactionStatus::Reverted)
		}
	}

	fn gas_spent(&self, chain_id: u64, receipt: &TransactionReceipt) -> NativeAmount {
		receipt
			.fee(self.chains.native_decimals(chain_id))
			.unwrap_or_else(|e| {
				tracing::warn!(error = %e, "Could not convert gas cost");
				NativeAmount::zero()
			})
	}

	/// Keeps a transaction with budget left at the tail, drops it otherwise.
	async fn requeue_or_drop(&self, tx: &Transaction) {
		let mut queue = self.queue.lock().await;
		if tx.retries == 0 {
			Self::remove_if_head(&mut queue, &tx.id);
			return;
		}
		if let Some(queued) = queue.get_mut(&tx.id) {
			queued.retries = tx.retries;
		}
		queue.move_to_tail(&tx.id);
	}

	async fn drop_head(&self, tx: &Transaction) {
		let mut queue = self.queue.lock().await;
		Self::remove_if_head(&mut queue, &tx.id);
	}

	// producers only append, so the attempted transaction is still the head
	fn remove_if_head(queue: &mut TxQueue, id: &str) {
		if queue.peek_head().is_some_and(|head| head.id == id) {
			queue.remove_head();
		}
	}
}
