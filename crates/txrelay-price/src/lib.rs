//! Native asset pricing for the transaction relay.
//!
//! Gas is paid in each chain's native asset and the monitor reports spend in
//! USD. A [`PriceFeedInterface`] fetches USD prices by native symbol; the
//! [`PriceFeedService`] keeps the last known prices in a cache that is
//! refreshed on a timer, so lookups on the reporting path never touch the
//! network and never fail.

use async_trait::async_trait;
use rust_decimal::Decimal;
use std::collections::HashMap;
use thiserror::Error;
use tokio::sync::RwLock;
use txrelay_types::{ChainRegistry, ImplementationRegistry};

pub mod implementations {
	pub mod coingecko;
	pub mod fixed;
}

/// Errors that can occur during price feed operations.
#[derive(Debug, Error)]
pub enum PriceFeedError {
	/// Error that occurs during network communication with price data sources.
	#[error("Network error: {0}")]
	Network(String),
	/// The source answered with something that is not a price.
	#[error("Invalid price data: {0}")]
	InvalidData(String),
	/// Error that occurs when configuration is invalid.
	#[error("Configuration error: {0}")]
	Configuration(String),
}

/// Source of USD prices for native assets.
#[async_trait]
pub trait PriceFeedInterface: Send + Sync {
	/// Fetches USD prices for `symbols`.
	///
	/// Symbols the source does not know are left out of the result.
	async fn fetch_prices(
		&self,
		symbols: &[String],
	) -> Result<HashMap<String, Decimal>, PriceFeedError>;
}

/// Type alias for price feed factory functions.
pub type PriceFeedFactory =
	fn(&toml::Value) -> Result<Box<dyn PriceFeedInterface>, PriceFeedError>;

/// Registry trait for price feed implementations.
pub trait PriceFeedRegistry: ImplementationRegistry<Factory = PriceFeedFactory> {}

/// Get all registered price feed implementations.
pub fn get_all_implementations() -> Vec<(&'static str, PriceFeedFactory)> {
	use implementations::{coingecko, fixed};

	vec![
		(fixed::Registry::NAME, fixed::Registry::factory()),
		(coingecko::Registry::NAME, coingecko::Registry::factory()),
	]
}

/// Normalizes a native symbol for lookups.
pub(crate) fn normalize_symbol(symbol: &str) -> String {
	symbol.trim().to_uppercase()
}

/// Parses a decimal price, accepting scientific notation.
pub(crate) fn parse_price(raw: &str) -> Result<Decimal, PriceFeedError> {
	let raw = raw.trim();
	raw.parse::<Decimal>()
		.or_else(|_| Decimal::from_scientific(raw))
		.map_err(|e| PriceFeedError::InvalidData(format!("'{}': {}", raw, e)))
		.and_then(|price| {
			if price.is_sign_negative() {
				Err(PriceFeedError::InvalidData(format!("negative price '{}'", raw)))
			} else {
				Ok(price)
			}
		})
}

/// Cached USD prices for the native assets of every registered chain.
pub struct PriceFeedService {
	feed: Box<dyn PriceFeedInterface>,
	chains: ChainRegistry,
	cache: RwLock<HashMap<String, Decimal>>,
}

impl PriceFeedService {
	pub fn new(feed: Box<dyn PriceFeedInterface>, chains: ChainRegistry) -> Self {
		Self {
			feed,
			chains,
			cache: RwLock::new(HashMap::new()),
		}
	}

	/// Fetches prices for every registered native symbol.
	///
	/// Symbols missing from the answer keep their previous price. Returns the
	/// number of prices updated.
	pub async fn refresh(&self) -> Result<usize, PriceFeedError> {
		let mut symbols: Vec<String> = self
			.chains
			.list_chains()
			.iter()
			.map(|chain| normalize_symbol(&chain.native_symbol))
			.collect();
		symbols.sort();
		symbols.dedup();

		let prices = self.feed.fetch_prices(&symbols).await?;
		let updated = prices.len();

		let mut cache = self.cache.write().await;
		for (symbol, price) in prices {
			cache.insert(normalize_symbol(&symbol), price);
		}
		for symbol in symbols.iter().filter(|s| !cache.contains_key(*s)) {
			tracing::warn!(symbol = %symbol, "No USD price available");
		}

		Ok(updated)
	}

	/// Last known USD price of a native symbol.
	pub async fn symbol_price_usd(&self, symbol: &str) -> Option<Decimal> {
		self.cache.read().await.get(&normalize_symbol(symbol)).copied()
	}

	/// USD price of `chain_id`'s native asset, zero when unknown.
	pub async fn native_price_usd(&self, chain_id: u64) -> Decimal {
		let Some(symbol) = self.chains.native_symbol(chain_id) else {
			return Decimal::ZERO;
		};
		self.symbol_price_usd(symbol)
			.await
			.unwrap_or(Decimal::ZERO)
	}
}
