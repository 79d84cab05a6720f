//! Registry trait for self-registering implementations.
//!
//! Backends that can be selected by name from configuration (for example the
//! `memory` and `file` storage backends) expose a `Registry` type implementing
//! this trait so the binary can assemble its factory map without hard-coding
//! names in more than one place.

/// Base trait for implementation registries.
pub trait ImplementationRegistry {
	/// The name used in configuration files to reference this implementation,
	/// e.g. `"memory"` for `[storage.implementations.memory]`.
	const NAME: &'static str;

	/// The factory function type this implementation provides.
	type Factory;

	/// Returns the factory that builds this implementation from its config.
	fn factory() -> Self::Factory;
}
