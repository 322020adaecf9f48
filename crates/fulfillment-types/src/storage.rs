//! Storage-related types for the fulfillment system.

use std::str::FromStr;

/// Storage keys for different data collections.
///
/// This enum provides type safety for storage operations by replacing
/// string literals with strongly typed variants.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StorageKey {
	/// Key for storing order documents
	Orders,
	/// Key for storing batch documents
	Batches,
}

impl StorageKey {
	/// Returns the string representation of the storage key.
	pub fn as_str(&self) -> &'static str {
		match self {
			StorageKey::Orders => "orders",
			StorageKey::Batches => "batches",
		}
	}

	/// Returns an iterator over all StorageKey variants.
	pub fn all() -> impl Iterator<Item = Self> {
		[Self::Orders, Self::Batches].into_iter()
	}
}

impl FromStr for StorageKey {
	type Err = ();

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		match s {
			"orders" => Ok(Self::Orders),
			"batches" => Ok(Self::Batches),
			_ => Err(()),
		}
	}
}

impl From<StorageKey> for &'static str {
	fn from(key: StorageKey) -> Self {
		key.as_str()
	}
}

/// Sort direction for ordered queries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortOrder {
	Ascending,
	Descending,
}

/// A field-equality query over JSON documents in one namespace.
///
/// Field paths use dots for nesting, e.g. `address.state`.
#[derive(Debug, Clone, PartialEq)]
pub struct Query {
	pub field: String,
	pub value: serde_json::Value,
	pub order_by: Option<(String, SortOrder)>,
	pub limit: Option<usize>,
}

impl Query {
	/// Matches documents whose `field` equals `value`.
	pub fn field_equals(field: impl Into<String>, value: impl Into<serde_json::Value>) -> Self {
		Self {
			field: field.into(),
			value: value.into(),
			order_by: None,
			limit: None,
		}
	}

	pub fn order_by(mut self, field: impl Into<String>, order: SortOrder) -> Self {
		self.order_by = Some((field.into(), order));
		self
	}

	pub fn limit(mut self, limit: usize) -> Self {
		self.limit = Some(limit);
		self
	}
}

/// Resolves a dotted path inside a JSON document.
pub fn field_at<'a>(document: &'a serde_json::Value, path: &str) -> Option<&'a serde_json::Value> {
	path.split('.')
		.try_fold(document, |current, segment| current.get(segment))
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_storage_key_parse() {
		for key in StorageKey::all() {
			assert_eq!(key.as_str().parse::<StorageKey>(), Ok(key));
		}
		assert!("quotes".parse::<StorageKey>().is_err());
	}

	#[test]
	fn test_field_at_nested() {
		let doc = serde_json::json!({ "address": { "state": "CA" }, "status": "paid" });
		assert_eq!(field_at(&doc, "address.state"), Some(&serde_json::json!("CA")));
		assert_eq!(field_at(&doc, "status"), Some(&serde_json::json!("paid")));
		assert_eq!(field_at(&doc, "address.zip"), None);
	}
}
