//! Registry trait for self-registering implementations.
//!
//! Every pluggable implementation (storage backend, notification sink,
//! batching strategy) declares the name it is configured under and the
//! factory that builds it.

/// Base trait for implementation registries.
///
/// Each implementation module must provide a Registry struct that implements
/// this trait, for example:
/// - "memory" for `storage.implementations.memory`
/// - "webhook" for `notifications.implementations.webhook`
/// - "region" for `batching.implementations.region`
pub trait ImplementationRegistry {
	/// The name used in configuration files to reference this implementation.
	const NAME: &'static str;

	/// The factory function type this implementation provides.
	type Factory;

	/// Get the factory function for this implementation.
	fn factory() -> Self::Factory;
}
