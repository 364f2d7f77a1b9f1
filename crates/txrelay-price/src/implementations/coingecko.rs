//! CoinGecko simple-price feed.
//!
//! Queries `GET {base_url}/simple/price?ids=...&vs_currencies=usd` and maps
//! the CoinGecko coin ids back to native symbols.
//!
//! ```toml
//! [pricing.implementations.coingecko]
//! base_url = "https://api.coingecko.com/api/v3"
//! api_key = "${COINGECKO_API_KEY:-}"
//! ids = { ETH = "ethereum", POL = "polygon-ecosystem-token" }
//! ```

use crate::{
	normalize_symbol, parse_price, PriceFeedError, PriceFeedFactory, PriceFeedInterface,
	PriceFeedRegistry,
};
use async_trait::async_trait;
use rust_decimal::Decimal;
use std::collections::HashMap;
use std::time::Duration;
use txrelay_types::{ImplementationRegistry, SecretString};

const DEFAULT_BASE_URL: &str = "https://api.coingecko.com/api/v3";
const DEFAULT_TIMEOUT_SECONDS: u64 = 10;
const API_KEY_HEADER: &str = "x-cg-demo-api-key";

/// Fetches native asset prices from CoinGecko.
pub struct CoinGeckoPriceFeed {
	client: reqwest::Client,
	base_url: String,
	api_key: Option<SecretString>,
	/// Native symbol to CoinGecko coin id.
	ids: HashMap<String, String>,
}

impl CoinGeckoPriceFeed {
	pub fn new(
		base_url: String,
		api_key: Option<SecretString>,
		ids: HashMap<String, String>,
		timeout: Duration,
	) -> Result<Self, PriceFeedError> {
		let client = reqwest::Client::builder()
			.timeout(timeout)
			.build()
			.map_err(|e| PriceFeedError::Configuration(e.to_string()))?;

		Ok(Self {
			client,
			base_url: base_url.trim_end_matches('/').to_string(),
			api_key,
			ids: ids
				.into_iter()
				.map(|(symbol, id)| (normalize_symbol(&symbol), id))
				.collect(),
		})
	}
}

/// Extracts `symbol -> usd` from a simple-price response body.
fn parse_simple_price(
	body: &serde_json::Value,
	wanted: &[(String, String)],
) -> Result<HashMap<String, Decimal>, PriceFeedError> {
	let mut prices = HashMap::new();
	for (symbol, id) in wanted {
		let Some(usd) = body.get(id).and_then(|coin| coin.get("usd")) else {
			continue;
		};
		let price = match usd {
			serde_json::Value::Number(n) => parse_price(&n.to_string())?,
			serde_json::Value::String(s) => parse_price(s)?,
			other => {
				return Err(PriceFeedError::InvalidData(format!(
					"usd price of {} is {}",
					id, other
				)))
			},
		};
		prices.insert(symbol.clone(), price);
	}
	Ok(prices)
}

#[async_trait]
impl PriceFeedInterface for CoinGeckoPriceFeed {
	async fn fetch_prices(
		&self,
		symbols: &[String],
	) -> Result<HashMap<String, Decimal>, PriceFeedError> {
		let wanted: Vec<(String, String)> = symbols
			.iter()
			.filter_map(|symbol| {
				self.ids
					.get(&normalize_symbol(symbol))
					.map(|id| (symbol.clone(), id.clone()))
			})
			.collect();
		if wanted.is_empty() {
			return Ok(HashMap::new());
		}

		let ids = wanted
			.iter()
			.map(|(_, id)| id.as_str())
			.collect::<Vec<_>>()
			.join(",");
		let url = format!("{}/simple/price", self.base_url);

		let mut request = self
			.client
			.get(&url)
			.query(&[("ids", ids.as_str()), ("vs_currencies", "usd")]);
		if let Some(api_key) = &self.api_key {
			request = request.header(API_KEY_HEADER, api_key.expose_secret());
		}

		let response = request
			.send()
			.await
			.map_err(|e| PriceFeedError::Network(e.to_string()))?
			.error_for_status()
			.map_err(|e| PriceFeedError::Network(e.to_string()))?;
		let body: serde_json::Value = response
			.json()
			.await
			.map_err(|e| PriceFeedError::InvalidData(e.to_string()))?;

		let prices = parse_simple_price(&body, &wanted)?;
		tracing::debug!(requested = wanted.len(), received = prices.len(), "Fetched prices");
		Ok(prices)
	}
}

/// Factory function to create a CoinGecko price feed from configuration.
///
/// Configuration parameters:
/// - `base_url`: API root (default: "https://api.coingecko.com/api/v3")
/// - `api_key`: optional demo API key, an empty string means none
/// - `timeout_seconds`: request timeout (default: 10)
/// - `ids`: table of native symbol to CoinGecko coin id (required)
pub fn create_price_feed(
	config: &toml::Value,
) -> Result<Box<dyn PriceFeedInterface>, PriceFeedError> {
	let base_url = config
		.get("base_url")
		.and_then(|v| v.as_str())
		.unwrap_or(DEFAULT_BASE_URL)
		.to_string();

	let api_key = config
		.get("api_key")
		.and_then(|v| v.as_str())
		.filter(|key| !key.trim().is_empty())
		.map(SecretString::from);

	let timeout_seconds = match config.get("timeout_seconds") {
		None => DEFAULT_TIMEOUT_SECONDS,
		Some(value) => value
			.as_integer()
			.filter(|secs| *secs > 0)
			.map(|secs| secs as u64)
			.ok_or_else(|| {
				PriceFeedError::Configuration("timeout_seconds must be a positive integer".into())
			})?,
	};

	let table = config
		.get("ids")
		.and_then(|v| v.as_table())
		.ok_or_else(|| PriceFeedError::Configuration("coingecko requires an ids table".into()))?;
	let mut ids = HashMap::new();
	for (symbol, id) in table {
		let id = id.as_str().ok_or_else(|| {
			PriceFeedError::Configuration(format!("CoinGecko id for {} must be a string", symbol))
		})?;
		ids.insert(symbol.clone(), id.to_string());
	}

	Ok(Box::new(CoinGeckoPriceFeed::new(
		base_url,
		api_key,
		ids,
		Duration::from_secs(timeout_seconds),
	)?))
}

/// Registry for the CoinGecko price feed implementation.
pub struct Registry;

impl ImplementationRegistry for Registry {
	const NAME: &'static str = "coingecko";
	type Factory = PriceFeedFactory;

	fn factory() -> Self::Factory {
		create_price_feed
	}
}

impl PriceFeedRegistry for Registry {}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_parse_simple_price() {
		let body = serde_json::json!({
			"ethereum": { "usd": 3012.45 },
			"polygon-ecosystem-token": { "usd": "0.41" }
		});
		let wanted = vec![
			("ETH".to_string(), "ethereum".to_string()),
			("POL".to_string(), "polygon-ecosystem-token".to_string()),
			("GNO".to_string(), "gnosis".to_string()),
		];

		let prices = parse_simple_price(&body, &wanted).unwrap();
		assert_eq!(prices["ETH"], Decimal::new(301245, 2));
		assert_eq!(prices["POL"], Decimal::new(41, 2));
		assert!(!prices.contains_key("GNO"));
	}

	#[test]
	fn test_parse_rejects_non_numeric() {
		let body = serde_json::json!({ "ethereum": { "usd": null } });
		let wanted = vec![("ETH".to_string(), "ethereum".to_string())];
		assert!(parse_simple_price(&body, &wanted).is_err());
	}

	#[test]
	fn test_factory_requires_ids() {
		let config: toml::Value = toml::from_str("base_url = \"http://localhost\"").unwrap();
		assert!(matches!(
			create_price_feed(&config),
			Err(PriceFeedError::Configuration(_))
		));

		let config: toml::Value =
			toml::from_str("api_key = \"\"\nids = { ETH = \"ethereum\" }").unwrap();
		assert!(create_price_feed(&config).is_ok());
	}

	#[tokio::test]
	async fn test_unmapped_symbols_skip_request() {
		let feed = CoinGeckoPriceFeed::new(
			"http://127.0.0.1:9".into(),
			None,
			HashMap::new(),
			Duration::from_secs(1),
		)
		.unwrap();

		let prices = feed.fetch_prices(&["ETH".to_string()]).await.unwrap();
		assert!(prices.is_empty());
	}
}
