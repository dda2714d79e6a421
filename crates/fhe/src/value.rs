// SPDX-License-Identifier: LGPL-3.0-only
//
// This file is provided WITHOUT ANY WARRANTY;
// without even the implied warranty of MERCHANTABILITY
// or FITNESS FOR A PARTICULAR PURPOSE.

use serde::{Deserialize, Serialize};
use tracing::warn;

/// Shapes the decryption gateways have been observed returning for a single
/// plaintext value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RawDecryptedValue {
    Uint(u128),
    Bool(bool),
    Text(String),
    Other(serde_json::Value),
}

/// Normalizes a raw gateway value to the canonical numeric representation.
///
/// Unrecognized shapes normalize to zero and are logged; they never surface
/// to the caller as a parse failure.
pub fn normalize(raw: &RawDecryptedValue) -> u128 {
    match raw {
        RawDecryptedValue::Uint(value) => *value,
        RawDecryptedValue::Bool(value) => *value as u128,
        RawDecryptedValue::Text(text) => {
            let parsed = match text.strip_prefix("0x") {
                Some(hex_digits) => u128::from_str_radix(hex_digits, 16),
                None => text.parse::<u128>(),
            };
            parsed.unwrap_or_else(|_| {
                warn!(value = %text, "unparseable decrypted value, defaulting to zero");
                0
            })
        }
        RawDecryptedValue::Other(value) => {
            warn!(value = %value, "unrecognized decrypted value shape, defaulting to zero");
            0
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn numeric_shapes_all_normalize_to_the_same_value() {
        assert_eq!(normalize(&RawDecryptedValue::Uint(42)), 42);
        assert_eq!(normalize(&RawDecryptedValue::Text("42".into())), 42);
        assert_eq!(normalize(&RawDecryptedValue::Text("0x2a".into())), 42);
    }

    #[test]
    fn booleans_map_to_zero_and_one() {
        assert_eq!(normalize(&RawDecryptedValue::Bool(false)), 0);
        assert_eq!(normalize(&RawDecryptedValue::Bool(true)), 1);
    }

    #[test]
    fn unrecognized_shape_defaults_to_zero_without_panicking() {
        let raw = RawDecryptedValue::Other(json!({ "unexpected": [1, 2, 3] }));
        assert_eq!(normalize(&raw), 0);
    }

    #[test]
    fn garbage_text_defaults_to_zero() {
        assert_eq!(normalize(&RawDecryptedValue::Text("not-a-number".into())), 0);
        assert_eq!(normalize(&RawDecryptedValue::Text("0xzz".into())), 0);
    }
}
