//! String formatting utilities.

/// Truncates an identifier for display in log fields.
///
/// Shows only the first 12 characters followed by ".." for longer strings,
/// which keeps the `ORD-`/`BATCH-` prefix and the date part readable.
pub fn truncate_id(id: &str) -> String {
	match id.char_indices().nth(12) {
		Some((idx, _)) => format!("{}..", &id[..idx]),
		None => id.to_string(),
	}
}
