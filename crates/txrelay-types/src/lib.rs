//! Common types module for the transaction relay.
//!
//! This module defines the data types shared by every relay component: the
//! queued transaction, the per-attempt and per-chain reports produced by the
//! monitor, the fixed-point native amount used for gas accounting, and the
//! network registry built from configuration.

/// Fixed-point native asset amounts.
pub mod amount;
/// Transaction receipts and hashes returned by the RPC gateway.
pub mod delivery;
/// Network configuration and the chain registry.
pub mod networks;
/// Base trait for self-registering implementations.
pub mod registry;
/// Report types persisted and served by the transaction monitor.
pub mod reports;
/// Redacting wrapper for private keys and API tokens.
pub mod secret_string;
/// Queued transaction types.
pub mod transaction;
/// Utility functions for display formatting.
pub mod utils;

pub use alloy_primitives::{Address, Bytes, U256};
pub use amount::{AmountError, NativeAmount, NATIVE_DECIMALS};
pub use delivery::*;
pub use networks::{ChainInfo, ChainRegistry, NetworkConfig, NetworksConfig};
pub use registry::ImplementationRegistry;
pub use reports::*;
pub use secret_string::SecretString;
pub use transaction::*;
pub use utils::{truncate_id, without_0x_prefix};
