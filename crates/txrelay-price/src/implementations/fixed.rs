//! Price feed backed by a table in the configuration file.
//!
//! Useful for testnets, where native assets have no market price, and for
//! pinning prices in tests.
//!
//! ```toml
//! [pricing.implementations.static]
//! prices = { ETH = "3000", POL = "0.45" }
//! ```

use crate::{
	normalize_symbol, parse_price, PriceFeedError, PriceFeedFactory, PriceFeedInterface,
	PriceFeedRegistry,
};
use async_trait::async_trait;
use rust_decimal::Decimal;
use std::collections::HashMap;
use txrelay_types::ImplementationRegistry;

/// Serves prices from a fixed table.
pub struct FixedPriceFeed {
	prices: HashMap<String, Decimal>,
}

impl FixedPriceFeed {
	pub fn new(prices: HashMap<String, Decimal>) -> Self {
		Self {
			prices: prices
				.into_iter()
				.map(|(symbol, price)| (normalize_symbol(&symbol), price))
				.collect(),
		}
	}
}

#[async_trait]
impl PriceFeedInterface for FixedPriceFeed {
	async fn fetch_prices(
		&self,
		symbols: &[String],
	) -> Result<HashMap<String, Decimal>, PriceFeedError> {
		Ok(symbols
			.iter()
			.filter_map(|symbol| {
				self.prices
					.get(&normalize_symbol(symbol))
					.map(|price| (symbol.clone(), *price))
			})
			.collect())
	}
}

/// Factory function to create a fixed price feed from configuration.
///
/// Configuration parameters:
/// - `prices`: table of native symbol to USD price; values may be strings,
///   integers or floats
pub fn create_price_feed(
	config: &toml::Value,
) -> Result<Box<dyn PriceFeedInterface>, PriceFeedError> {
	let mut prices = HashMap::new();
	if let Some(value) = config.get("prices") {
		let table = value.as_table().ok_or_else(|| {
			PriceFeedError::Configuration("prices must be a table".into())
		})?;
		for (symbol, raw) in table {
			let price = match raw {
				toml::Value::String(s) => parse_price(s),
				toml::Value::Integer(i) => parse_price(&i.to_string()),
				toml::Value::Float(f) => parse_price(&f.to_string()),
				other => Err(PriceFeedError::Configuration(format!(
					"Invalid price for {}: {}",
					symbol, other
				))),
			}
			.map_err(|e| PriceFeedError::Configuration(format!("{}: {}", symbol, e)))?;
			prices.insert(symbol.clone(), price);
		}
	}

	Ok(Box::new(FixedPriceFeed::new(prices)))
}

/// Registry for the static price feed implementation.
pub struct Registry;

impl ImplementationRegistry for Registry {
	const NAME: &'static str = "static";
	type Factory = PriceFeedFactory;

	fn factory() -> Self::Factory {
		create_price_feed
	}
}

impl PriceFeedRegistry for Registry {}
