//! Registry trait for pluggable relay backends.
//!
//! Storage, RPC and price feed backends are selected by name from the
//! configuration file. Each backend module exposes a `Registry` type that ties
//! that name to the factory building it.

/// Base trait for implementation registries.
///
/// The `NAME` constant is the key used under `implementations` in the TOML
/// configuration, for example `file` for `storage.implementations.file` or
/// `coingecko` for `pricing.implementations.coingecko`.
pub trait ImplementationRegistry {
	/// Configuration key of this implementation.
	const NAME: &'static str;

	/// Factory signature defined by the owning crate.
	type Factory;

	/// Returns the factory that builds this implementation from its config table.
	fn factory() -> Self::Factory;
}
