//! Core of the transaction relay.
//!
//! Producers enqueue [`txrelay_types::Transaction`]s; the [`TransactionRelay`]
//! drains the queue one attempt at a time, simulating, sending and confirming
//! the head transaction on its chain; the [`TransactionMonitor`] records every
//! outcome, keeps per-chain and daily aggregates on disk and values gas spend
//! in USD. The [`RelayEngine`] owns the timers that drive all of it and is
//! assembled from configuration by the [`RelayBuilder`].

pub mod builder;
pub mod engine;
pub mod monitor;
pub mod queue;
pub mod relay;

#[cfg(test)]
pub(crate) mod test_utils;

pub use builder::{BuilderError, RelayBuilder, RelayFactories};
pub use engine::RelayEngine;
pub use monitor::{TransactionFailure, TransactionMonitor};
pub use queue::TxQueue;
pub use relay::{TickOutcome, TransactionRelay};

use thiserror::Error;

/// Errors that can occur while running the relay.
#[derive(Debug, Error)]
pub enum RelayError {
	/// Error related to configuration issues.
	#[error("Configuration error: {0}")]
	Config(String),
	/// Error reading or writing persisted reports.
	#[error("Storage error: {0}")]
	Storage(String),
}
