//! Transaction delivery types for the relay.
//!
//! This module defines what the RPC gateway hands back after a submission:
//! the transaction hash and the receipt with its execution outcome and gas
//! usage.

use crate::amount::{AmountError, NativeAmount};
use alloy_primitives::{hex, U256};
use std::fmt;

/// Blockchain transaction hash representation.
///
/// Stores transaction hashes as raw bytes to support different blockchain formats.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct TransactionHash(pub Vec<u8>);

impl fmt::Display for TransactionHash {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "0x{}", hex::encode(&self.0))
	}
}

/// Transaction receipt containing execution details.
///
/// Provides information about a transaction after it has been included in a block,
/// including its success status and the gas it consumed.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct TransactionReceipt {
	/// The hash of the transaction.
	pub hash: TransactionHash,
	/// The block number where the transaction was included.
	pub block_number: u64,
	/// Whether the transaction executed successfully.
	pub success: bool,
	/// Gas units consumed by execution.
	pub gas_used: u64,
	/// Price paid per gas unit, in wei.
	pub effective_gas_price: u128,
}

impl TransactionReceipt {
	/// Total fee paid in wei (`gas_used * effective_gas_price`).
	pub fn fee_wei(&self) -> U256 {
		U256::from(self.gas_used) * U256::from(self.effective_gas_price)
	}

	/// Total fee paid, in native units with the given decimals.
	pub fn fee(&self, native_decimals: u8) -> Result<NativeAmount, AmountError> {
		NativeAmount::from_base_units(self.fee_wei(), native_decimals)
	}
}
