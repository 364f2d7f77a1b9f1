//! Fixed-point amounts of a chain's native asset.
//!
//! Gas costs and balances are carried as decimals pinned to 18 fractional
//! digits so that repeated aggregation never drifts the way floating point
//! does. On the wire and on disk an amount is always a decimal string such as
//! `"0.000021000000000000"`.

use alloy_primitives::U256;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::iter::Sum;
use std::ops::Add;
use std::str::FromStr;
use thiserror::Error;

/// Number of fractional digits every [`NativeAmount`] carries.
pub const NATIVE_DECIMALS: u32 = 18;

/// Errors that can occur while building a native amount.
#[derive(Debug, Error)]
pub enum AmountError {
	/// The string is not a decimal number.
	#[error("Invalid amount '{0}': {1}")]
	Parse(String, String),
	/// The raw value does not fit the fixed-point representation.
	#[error("Amount out of range: {0}")]
	OutOfRange(String),
}

/// An amount of a chain's native asset with exactly 18 fractional digits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct NativeAmount(Decimal);

impl NativeAmount {
	/// The zero amount.
	pub fn zero() -> Self {
		Self::new(Decimal::ZERO)
	}

	/// Wraps a decimal, rounding or padding it to 18 fractional digits.
	pub fn new(value: Decimal) -> Self {
		let mut value = value;
		value.rescale(NATIVE_DECIMALS);
		Self(value)
	}

	/// Converts a raw integer amount (wei for EVM chains) into native units.
	///
	/// `decimals` is the number of decimals of the native asset, 18 on every
	/// EVM chain the relay targets.
	pub fn from_base_units(raw: U256, decimals: u8) -> Result<Self, AmountError> {
		let raw = i128::try_from(raw).map_err(|_| AmountError::OutOfRange(raw.to_string()))?;
		let value = Decimal::try_from_i128_with_scale(raw, decimals as u32)
			.map_err(|e| AmountError::OutOfRange(e.to_string()))?;
		Ok(Self::new(value))
	}

	pub fn is_zero(&self) -> bool {
		self.0.is_zero()
	}

	/// Values this amount in USD at the given unit price.
	pub fn to_usd(&self, price_usd: Decimal) -> Decimal {
		self.0.saturating_mul(price_usd)
	}
}

impl Default for NativeAmount {
	fn default() -> Self {
		Self::zero()
	}
}

impl Add for NativeAmount {
	type Output = NativeAmount;

	fn add(self, rhs: NativeAmount) -> NativeAmount {
		NativeAmount::new(self.0.saturating_add(rhs.0))
	}
}

impl Sum for NativeAmount {
	fn sum<I: Iterator<Item = NativeAmount>>(iter: I) -> Self {
		iter.fold(NativeAmount::zero(), |acc, value| acc + value)
	}
}

impl fmt::Display for NativeAmount {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "{}", self.0)
	}
}

impl FromStr for NativeAmount {
	type Err = AmountError;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		let value = Decimal::from_str(s.trim())
			.map_err(|e| AmountError::Parse(s.to_string(), e.to_string()))?;
		Ok(Self::new(value))
	}
}

impl TryFrom<String> for NativeAmount {
	type Error = AmountError;

	fn try_from(value: String) -> Result<Self, Self::Error> {
		value.parse()
	}
}

impl From<NativeAmount> for String {
	fn from(amount: NativeAmount) -> Self {
		amount.to_string()
	}
}

impl From<Decimal> for NativeAmount {
	fn from(value: Decimal) -> Self {
		Self::new(value)
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_from_base_units() {
		let wei = U256::from(21_000u64) * U256::from(1_000_000_000u64);
		let amount = NativeAmount::from_base_units(wei, 18).unwrap();
		assert_eq!(amount.to_string(), "0.000021000000000000");
	}

	#[test]
	fn test_zero_is_padded() {
		assert_eq!(NativeAmount::zero().to_string(), "0.000000000000000000");
		assert!(NativeAmount::zero().is_zero());
	}

	#[test]
	fn test_addition_is_commutative() {
		let a: NativeAmount = "0.000021".parse().unwrap();
		let b: NativeAmount = "1.5".parse().unwrap();
		assert_eq!(a + b, b + a);
		assert_eq!((a + b).to_string(), "1.500021000000000000");
		// inputs are values, adding never mutates them
		assert_eq!(a.to_string(), "0.000021000000000000");
	}

	#[test]
	fn test_sum_matches_repeated_addition() {
		let values: Vec<NativeAmount> = ["0.1", "0.2", "0.3"]
			.iter()
			.map(|v| v.parse().unwrap())
			.collect();
		let total: NativeAmount = values.iter().copied().sum();
		assert_eq!(total.to_string(), "0.600000000000000000");
	}

	#[test]
	fn test_serde_uses_strings() {
		let amount: NativeAmount = "0.25".parse().unwrap();
		let json = serde_json::to_string(&amount).unwrap();
		assert_eq!(json, "\"0.250000000000000000\"");

		let back: NativeAmount = serde_json::from_str(&json).unwrap();
		assert_eq!(back, amount);
		assert!(serde_json::from_str::<NativeAmount>("\"abc\"").is_err());
	}

	#[test]
	fn test_usd_valuation() {
		let amount: NativeAmount = "0.5".parse().unwrap();
		let usd = amount.to_usd(Decimal::from(3000));
		assert_eq!(usd.normalize(), Decimal::from(1500));
	}

	#[test]
	fn test_out_of_range() {
		assert!(NativeAmount::from_base_units(U256::MAX, 18).is_err());
	}
}
