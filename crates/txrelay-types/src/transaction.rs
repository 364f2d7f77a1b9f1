//! Queued transaction types.
//!
//! A [`Transaction`] is created by a producer, owned by the relay queue until
//! it is removed, and carries everything the RPC gateway needs to simulate and
//! submit the call.

use alloy_primitives::{Address, Bytes, U256};
use alloy_sol_types::SolCall;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Numeric chain identifier.
pub type ChainId = u64;

/// Retry budget given to transactions that don't specify one.
pub const DEFAULT_RETRIES: u32 = 3;

/// Business purpose of a queued transaction.
///
/// Used only to group transactions in logs and reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TransactionType {
	/// Rolls the revenue router over to its next period.
	UpdatePeriod,
	/// Mirrors DAO voting power from other chains.
	UpdateOtherChainsPowers,
}

impl TransactionType {
	pub fn as_str(&self) -> &'static str {
		match self {
			TransactionType::UpdatePeriod => "update-period",
			TransactionType::UpdateOtherChainsPowers => "update-other-chains-powers",
		}
	}
}

impl fmt::Display for TransactionType {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(self.as_str())
	}
}

/// Contract call to be executed by the relay account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CallSpec {
	/// Contract being called.
	pub to: Address,
	/// ABI-encoded calldata.
	pub data: Bytes,
	/// Native value attached to the call.
	#[serde(default)]
	pub value: U256,
	/// Explicit gas limit; estimated by the provider when absent.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub gas_limit: Option<u64>,
}

impl CallSpec {
	pub fn new(to: Address, data: Bytes) -> Self {
		Self {
			to,
			data,
			value: U256::ZERO,
			gas_limit: None,
		}
	}

	/// Builds a call from a typed `sol!` function call.
	pub fn from_call<C: SolCall>(to: Address, call: &C) -> Self {
		Self::new(to, Bytes::from(call.abi_encode()))
	}

	pub fn with_value(mut self, value: U256) -> Self {
		self.value = value;
		self
	}

	pub fn with_gas_limit(mut self, gas_limit: u64) -> Self {
		self.gas_limit = Some(gas_limit);
		self
	}
}

/// A pending on-chain call awaiting submission.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transaction {
	/// Unique identifier, fixed for the lifetime of the transaction.
	pub id: String,
	/// Business purpose.
	#[serde(rename = "type")]
	pub tx_type: TransactionType,
	/// Target chain.
	pub chain_id: ChainId,
	/// Remaining retry budget.
	pub retries: u32,
	/// The call to execute.
	pub call: CallSpec,
}

impl Transaction {
	/// Creates a transaction with the default retry budget.
	pub fn new(
		id: impl Into<String>,
		tx_type: TransactionType,
		chain_id: ChainId,
		call: CallSpec,
	) -> Self {
		Self {
			id: id.into(),
			tx_type,
			chain_id,
			retries: DEFAULT_RETRIES,
			call,
		}
	}

	pub fn with_retries(mut self, retries: u32) -> Self {
		self.retries = retries;
		self
	}

	/// Short `type-id` label used in log lines.
	pub fn label(&self) -> String {
		format!("{}-{}", self.tx_type, self.id)
	}
}

/// Generates a fresh transaction identifier.
pub fn new_transaction_id() -> String {
	uuid::Uuid::new_v4().to_string()
}
