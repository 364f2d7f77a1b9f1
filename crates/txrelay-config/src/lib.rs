//! Configuration module for the transaction relay.
//!
//! The relay is configured from a single TOML file, optionally split into
//! several files with `include = ["networks.toml", ...]`. Values may reference
//! environment variables as `${VAR}` or `${VAR:-default}`, which keeps the
//! account key out of the file itself.
//!
//! Each top-level section must be unique across all included files.

pub mod builders;
mod loader;

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;
use txrelay_types::{networks::deserialize_networks, NetworksConfig, SecretString};

/// Errors that can occur during configuration operations.
#[derive(Debug, Error)]
pub enum ConfigError {
	/// Error that occurs during file I/O operations.
	#[error("IO error: {0}")]
	Io(#[from] std::io::Error),
	/// Error that occurs when parsing TOML configuration.
	#[error("Configuration error: {0}")]
	Parse(String),
	/// Error that occurs when configuration validation fails.
	#[error("Validation error: {0}")]
	Validation(String),
}

impl From<toml::de::Error> for ConfigError {
	fn from(err: toml::de::Error) -> Self {
		// the full error embeds the whole input, keep only the message
		ConfigError::Parse(err.message().to_string())
	}
}

/// Main configuration structure for the relay service.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
	/// Relay identity and sender timing.
	pub relay: RelayConfig,
	/// The account every transaction is sent from.
	pub account: AccountConfig,
	/// Chains the relay may send to, keyed by chain id.
	#[serde(deserialize_with = "deserialize_networks")]
	pub networks: NetworksConfig,
	/// Where reports are persisted.
	pub storage: StorageConfig,
	/// Monitor cadences.
	#[serde(default)]
	pub monitor: MonitorConfig,
	/// Native asset price sources.
	pub pricing: PricingConfig,
}

/// Relay identity and sender timing.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RelayConfig {
	/// Identifier of this relay instance, used in logs.
	pub id: String,
	/// When false the monitor still runs but the queue is never drained.
	#[serde(default = "default_enabled")]
	pub enabled: bool,
	/// Interval between relay ticks.
	#[serde(default = "default_tick_interval_seconds")]
	pub tick_interval_seconds: u64,
	/// Maximum wait for a receipt after broadcast.
	#[serde(default = "default_receipt_timeout_seconds")]
	pub receipt_timeout_seconds: u64,
	/// Delay between receipt polls.
	#[serde(default = "default_receipt_poll_interval_seconds")]
	pub receipt_poll_interval_seconds: u64,
}

fn default_enabled() -> bool {
	true
}

fn default_tick_interval_seconds() -> u64 {
	60
}

fn default_receipt_timeout_seconds() -> u64 {
	180
}

fn default_receipt_poll_interval_seconds() -> u64 {
	4
}

impl RelayConfig {
	pub fn tick_interval(&self) -> Duration {
		Duration::from_secs(self.tick_interval_seconds)
	}

	pub fn receipt_timeout(&self) -> Duration {
		Duration::from_secs(self.receipt_timeout_seconds)
	}

	pub fn receipt_poll_interval(&self) -> Duration {
		Duration::from_secs(self.receipt_poll_interval_seconds)
	}
}

/// The relay account.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AccountConfig {
	/// Hex encoded private key of the sending account.
	pub private_key: SecretString,
}

/// Configuration for the storage backend.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StorageConfig {
	/// Which implementation to use as primary.
	pub primary: String,
	/// Map of storage implementation names to their configurations.
	pub implementations: HashMap<String, toml::Value>,
}

/// Cadences of the monitor's periodic jobs.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct MonitorConfig {
	/// Interval between rotations of live reports into daily snapshots.
	/// Defaults to 8 hours.
	#[serde(default = "default_rotation_interval_seconds")]
	pub rotation_interval_seconds: u64,
	/// Interval between statistics log lines and balance refreshes.
	#[serde(default = "default_stats_interval_seconds")]
	pub stats_interval_seconds: u64,
}

fn default_rotation_interval_seconds() -> u64 {
	8 * 60 * 60
}

fn default_stats_interval_seconds() -> u64 {
	60 * 60
}

impl Default for MonitorConfig {
	fn default() -> Self {
		Self {
			rotation_interval_seconds: default_rotation_interval_seconds(),
			stats_interval_seconds: default_stats_interval_seconds(),
		}
	}
}

/// Configuration for native asset pricing.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct PricingConfig {
	/// Which implementation to use as primary.
	pub primary: String,
	/// Interval between price cache refreshes.
	#[serde(default = "default_price_refresh_interval_seconds")]
	pub refresh_interval_seconds: u64,
	/// Map of price feed implementation names to their configurations.
	pub implementations: HashMap<String, toml::Value>,
}

fn default_price_refresh_interval_seconds() -> u64 {
	300
}

/// Resolves environment variables in a string.
///
/// Replaces `${VAR_NAME}` with the value of the environment variable and
/// supports defaults with `${VAR_NAME:-default_value}`.
///
/// Input strings are limited to 1MB.
pub(crate) fn resolve_env_vars(input: &str) -> Result<String, ConfigError> {
	const MAX_INPUT_SIZE: usize = 1024 * 1024;
	if input.len() > MAX_INPUT_SIZE {
		return Err(ConfigError::Validation(format!(
			"Configuration file too large: {} bytes (max: {} bytes)",
			input.len(),
			MAX_INPUT_SIZE
		)));
	}

	let re = Regex::new(r"\$\{([A-Z_][A-Z0-9_]{0,127})(?::-([^}]{0,256}))?\}")
		.map_err(|e| ConfigError::Parse(format!("Regex error: {}", e)))?;

	let mut result = String::with_capacity(input.len());
	let mut last_end = 0;

	for cap in re.captures_iter(input) {
		let (Some(full_match), Some(var_name)) = (cap.get(0), cap.get(1)) else {
			continue;
		};
		let value = match std::env::var(var_name.as_str()) {
			Ok(v) => v,
			Err(_) => match cap.get(2) {
				Some(default) => default.as_str().to_string(),
				None => {
					return Err(ConfigError::Validation(format!(
						"Environment variable '{}' not found",
						var_name.as_str()
					)))
				},
			},
		};

		result.push_str(&input[last_end..full_match.start()]);
		result.push_str(&value);
		last_end = full_match.end();
	}
	result.push_str(&input[last_end..]);

	Ok(result)
}

impl Config {
	/// Loads configuration from a file, following `include` directives.
	pub async fn from_file(path: &str) -> Result<Self, ConfigError> {
		let path_buf = Path::new(path);
		let base_dir = path_buf.parent().unwrap_or_else(|| Path::new("."));

		let mut loader = loader::ConfigLoader::new(base_dir);
		let file_name = path_buf
			.file_name()
			.ok_or_else(|| ConfigError::Validation(format!("Invalid path: {}", path)))?;
		loader.load_config(file_name).await
	}

	/// Validates cross-field constraints that serde cannot express.
	fn validate(&self) -> Result<(), ConfigError> {
		if self.relay.id.trim().is_empty() {
			return Err(ConfigError::Validation("Relay ID cannot be empty".into()));
		}
		if self.relay.tick_interval_seconds == 0 {
			return Err(ConfigError::Validation(
				"Relay tick_interval_seconds must be greater than 0".into(),
			));
		}
		if !(1..=3600).contains(&self.relay.receipt_timeout_seconds) {
			return Err(ConfigError::Validation(
				"Relay receipt_timeout_seconds must be between 1 and 3600".into(),
			));
		}
		if self.relay.receipt_poll_interval_seconds == 0 {
			return Err(ConfigError::Validation(
				"Relay receipt_poll_interval_seconds must be greater than 0".into(),
			));
		}

		if self.account.private_key.is_empty() {
			return Err(ConfigError::Validation(
				"Account private_key cannot be empty".into(),
			));
		}

		if self.networks.is_empty() {
			return Err(ConfigError::Validation(
				"Networks configuration cannot be empty".into(),
			));
		}
		for (chain_id, network) in &self.networks {
			if network.rpc_url.trim().is_empty() {
				return Err(ConfigError::Validation(format!(
					"Network {} must have rpc_url",
					chain_id
				)));
			}
			if network.native_symbol.trim().is_empty() {
				return Err(ConfigError::Validation(format!(
					"Network {} must have native_symbol",
					chain_id
				)));
			}
		}

		validate_primary("storage", &self.storage.primary, &self.storage.implementations)?;

		if self.monitor.rotation_interval_seconds == 0 {
			return Err(ConfigError::Validation(
				"Monitor rotation_interval_seconds must be greater than 0".into(),
			));
		}
		if self.monitor.stats_interval_seconds == 0 {
			return Err(ConfigError::Validation(
				"Monitor stats_interval_seconds must be greater than 0".into(),
			));
		}

		validate_primary("pricing", &self.pricing.primary, &self.pricing.implementations)?;
		if self.pricing.refresh_interval_seconds == 0 {
			return Err(ConfigError::Validation(
				"Pricing refresh_interval_seconds must be greater than 0".into(),
			));
		}

		Ok(())
	}
}

fn validate_primary(
	section: &str,
	primary: &str,
	implementations: &HashMap<String, toml::Value>,
) -> Result<(), ConfigError> {
	if implementations.is_empty() {
		return Err(ConfigError::Validation(format!(
			"At least one {} implementation must be configured",
			section
		)));
	}
	if primary.is_empty() {
		return Err(ConfigError::Validation(format!(
			"{} primary implementation cannot be empty",
			section
		)));
	}
	if !implementations.contains_key(primary) {
		return Err(ConfigError::Validation(format!(
			"Primary {} '{}' not found in implementations",
			section, primary
		)));
	}
	Ok(())
}

/// Parses a TOML string, resolving environment variables and validating the
/// result.
impl FromStr for Config {
	type Err = ConfigError;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		let resolved = resolve_env_vars(s)?;
		let config: Config = toml::from_str(&resolved)?;
		config.validate()?;
		Ok(config)
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	const CONFIG: &str = r#"
[relay]
id = "${TEST_RELAY_ID:-relay-test}"

[account]
private_key = "${TEST_RELAY_KEY:-0xac0974bec39a17e36ba4a6b4d238ff944bacb478cbed5efcae784d7bf4f2ff80}"

[networks.10]
name = "optimism"
rpc_url = "http://localhost:8545"
native_symbol = "ETH"

[networks.137]
name = "polygon"
rpc_url = "http://localhost:8546"
native_symbol = "POL"

[storage]
primary = "file"
[storage.implementations.file]
reports_dir = "./temp/tx-reports"

[pricing]
primary = "static"
[pricing.implementations.static]
prices = { ETH = "3000", POL = "0.5" }
"#;

	#[test]
	fn test_env_var_resolution() {
		std::env::set_var("TEST_RELAY_HOST", "localhost");
		std::env::set_var("TEST_RELAY_PORT", "8545");

		let input = "url = \"http://${TEST_RELAY_HOST}:${TEST_RELAY_PORT}\"";
		let result = resolve_env_vars(input).unwrap();
		assert_eq!(result, "url = \"http://localhost:8545\"");

		std::env::remove_var("TEST_RELAY_HOST");
		std::env::remove_var("TEST_RELAY_PORT");
	}

	#[test]
	fn test_env_var_with_default() {
		let input = "value = \"${MISSING_RELAY_VAR:-default_value}\"";
		let result = resolve_env_vars(input).unwrap();
		assert_eq!(result, "value = \"default_value\"");
	}

	#[test]
	fn test_missing_env_var_error() {
		let result = resolve_env_vars("value = \"${MISSING_RELAY_VAR}\"");
		assert!(result.unwrap_err().to_string().contains("MISSING_RELAY_VAR"));
	}

	#[test]
	fn test_defaults_applied() {
		let config: Config = CONFIG.parse().unwrap();

		assert_eq!(config.relay.id, "relay-test");
		assert!(config.relay.enabled);
		assert_eq!(config.relay.tick_interval(), Duration::from_secs(60));
		assert_eq!(config.relay.receipt_timeout(), Duration::from_secs(180));
		assert_eq!(config.monitor.rotation_interval_seconds, 28_800);
		assert_eq!(config.monitor.stats_interval_seconds, 3_600);
		assert_eq!(config.pricing.refresh_interval_seconds, 300);
		assert_eq!(config.networks[&137].native_decimals, 18);
		assert!(!format!("{:?}", config.account).contains("ac0974"));
	}

	#[test]
	fn test_rejects_unknown_storage_primary() {
		let input = CONFIG.replace("primary = \"file\"", "primary = \"redis\"");
		let err = input.parse::<Config>().unwrap_err();
		assert!(err.to_string().contains("Primary storage 'redis'"));
	}

	#[test]
	fn test_rejects_receipt_timeout_out_of_range() {
		let input = CONFIG.replace(
			"id = \"${TEST_RELAY_ID:-relay-test}\"",
			"id = \"relay\"\nreceipt_timeout_seconds = 0",
		);
		let err = input.parse::<Config>().unwrap_err();
		assert!(err.to_string().contains("receipt_timeout_seconds"));
	}

	#[test]
	fn test_rejects_missing_native_symbol() {
		let input = CONFIG.replace("native_symbol = \"POL\"", "native_symbol = \"\"");
		let err = input.parse::<Config>().unwrap_err();
		assert!(err.to_string().contains("Network 137 must have native_symbol"));
	}

	#[test]
	fn test_parse_error_keeps_message_short() {
		let err = "[relay\nid = 1".parse::<Config>().unwrap_err();
		assert!(matches!(err, ConfigError::Parse(_)));
	}
}
