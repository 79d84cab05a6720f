//! Storage namespaces used by the courier system.

/// Namespaces for the different record collections.
///
/// Replaces string literals at call sites so a typo in a namespace is a
/// compile error rather than a silently empty collection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StorageKey {
	/// Order records, keyed by order id.
	Orders,
	/// Monotonic id sequences, keyed by the collection they number.
	Sequences,
}

impl StorageKey {
	/// Returns the string representation of the storage key.
	pub fn as_str(&self) -> &'static str {
		match self {
			StorageKey::Orders => "orders",
			StorageKey::Sequences => "sequences",
		}
	}

	/// Returns the prefix shared by every key in this namespace.
	pub fn prefix(&self) -> String {
		format!("{}:", self.as_str())
	}
}
