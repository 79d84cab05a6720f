//! Predicates over untrusted request values.
//!
//! Values arrive either as form fields (always strings) or as JSON, so the
//! checks accept a [`serde_json::Value`] of any shape and never fail: a value
//! that cannot be interpreted is simply rejected.

use serde_json::{Map, Value};

/// Parses `value` as a non-negative integer.
///
/// Accepts JSON integers and strings made only of ASCII digits. Signs,
/// whitespace and decimal points are rejected, even when the fractional part
/// is zero, as are floats, booleans, null and containers. Digit strings too
/// large for `u64` saturate to `u64::MAX`, so callers see them as out of
/// range rather than malformed. Zero is only accepted when `allow_zero` is
/// set.
pub fn parse_non_negative_integer(value: &Value, allow_zero: bool) -> Option<u64> {
	let parsed = match value {
		Value::Number(n) => {
			if n.is_f64() {
				return None;
			}
			n.as_u64()?
		},
		Value::String(s) => parse_digits(s)?,
		_ => return None,
	};

	if parsed == 0 && !allow_zero {
		return None;
	}
	Some(parsed)
}

fn parse_digits(s: &str) -> Option<u64> {
	if s.is_empty() || !s.bytes().all(|b| b.is_ascii_digit()) {
		return None;
	}
	Some(s.bytes().fold(0u64, |acc, b| {
		acc.saturating_mul(10).saturating_add(u64::from(b - b'0'))
	}))
}

/// Returns true if `value` is an integer `> 0`, or `>= 0` with `allow_zero`.
pub fn is_non_negative_integer(value: &Value, allow_zero: bool) -> bool {
	parse_non_negative_integer(value, allow_zero).is_some()
}

/// Returns true if every key in `required` is present in `record`.
///
/// Only presence is checked; the values may still be invalid.
pub fn has_required_keys<K: AsRef<str>>(required: &[K], record: &Map<String, Value>) -> bool {
	required.iter().all(|key| record.contains_key(key.as_ref()))
}
