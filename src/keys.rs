//! Cache key derivation
//!
//! A cache key is a pure function of (instance prefix, logical query name,
//! normalized parameters). Two calls with semantically identical parameters
//! must land on the same key regardless of how the parameter object was
//! constructed: map key insertion order never matters, and a timestamp is
//! the same parameter whether it arrives as an RFC 3339 string in any offset
//! or in the upstream serializer's `Date.toISOString()` shape.
//!
//! Normalization goes through [`CanonicalValue`], a typed sum over the JSON
//! shapes we accept: maps sort their keys at every nesting level, lists keep
//! element order (order is part of the identity), and date-like strings are
//! rewritten to canonical UTC. The canonical JSON rendering is then hashed
//! to a fixed-length hex digest.

use chrono::{DateTime, SecondsFormat, Utc};
use serde_json::Value;
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;

/// Hex characters kept from the SHA-256 digest (128 bits)
const KEY_DIGEST_HEX_LEN: usize = 32;

/// Canonical form of a parameter value
///
/// `Map` is a `BTreeMap`, so key order is sorted by construction; `List`
/// preserves order. Every `Text` has already been date-normalized.
#[derive(Debug, Clone, PartialEq)]
pub enum CanonicalValue {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
    List(Vec<CanonicalValue>),
    Map(BTreeMap<String, CanonicalValue>),
}

impl CanonicalValue {
    /// Normalize a JSON parameter object into canonical form
    pub fn from_json(value: &Value) -> Self {
        match value {
            Value::Null => CanonicalValue::Null,
            Value::Bool(b) => CanonicalValue::Bool(*b),
            Value::Number(n) => {
                if let Some(i) = n.as_i64() {
                    CanonicalValue::Int(i)
                } else {
                    CanonicalValue::Float(n.as_f64().unwrap_or(f64::NAN))
                }
            }
            Value::String(s) => CanonicalValue::Text(normalize_date_like(s)),
            Value::Array(items) => {
                CanonicalValue::List(items.iter().map(CanonicalValue::from_json).collect())
            }
            Value::Object(map) => CanonicalValue::Map(
                map.iter()
                    .map(|(k, v)| (k.clone(), CanonicalValue::from_json(v)))
                    .collect(),
            ),
        }
    }

    /// Render the canonical JSON string
    ///
    /// Maps serialize in sorted key order because the backing map is ordered;
    /// no post-processing is needed.
    pub fn canonical_json(&self) -> String {
        let mut out = String::new();
        self.write_json(&mut out);
        out
    }

    fn write_json(&self, out: &mut String) {
        match self {
            CanonicalValue::Null => out.push_str("null"),
            CanonicalValue::Bool(b) => out.push_str(if *b { "true" } else { "false" }),
            CanonicalValue::Int(i) => out.push_str(&i.to_string()),
            CanonicalValue::Float(f) => {
                // serde_json's float formatting, for parity with values that
                // round-trip through Value
                out.push_str(
                    &serde_json::Number::from_f64(*f)
                        .map(|n| n.to_string())
                        .unwrap_or_else(|| "null".to_string()),
                );
            }
            CanonicalValue::Text(s) => {
                out.push_str(&Value::String(s.clone()).to_string());
            }
            CanonicalValue::List(items) => {
                out.push('[');
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        out.push(',');
                    }
                    item.write_json(out);
                }
                out.push(']');
            }
            CanonicalValue::Map(map) => {
                out.push('{');
                for (i, (k, v)) in map.iter().enumerate() {
                    if i > 0 {
                        out.push(',');
                    }
                    out.push_str(&Value::String(k.clone()).to_string());
                    out.push(':');
                    v.write_json(out);
                }
                out.push('}');
            }
        }
    }
}

/// Rewrite RFC 3339 strings to canonical UTC with millisecond precision
///
/// `2024-01-01T01:00:00+01:00` and `2024-01-01T00:00:00.000Z` both become
/// `2024-01-01T00:00:00.000Z`. Non-date strings pass through untouched.
/// Numbers are never treated as dates - epoch integers are indistinguishable
/// from ids.
fn normalize_date_like(s: &str) -> String {
    match DateTime::parse_from_rfc3339(s) {
        Ok(dt) => dt
            .with_timezone(&Utc)
            .to_rfc3339_opts(SecondsFormat::Millis, true),
        Err(_) => s.to_string(),
    }
}

/// Derive the cache key for a logical query under an instance prefix
///
/// `"{prefix}:{hash}"` where the hash is the first 128 bits of
/// SHA-256 over `"{query_name}:{canonical_params_json}"`, hex encoded.
pub fn derive_key(prefix: &str, query_name: &str, params: &Value) -> String {
    let canonical = CanonicalValue::from_json(params).canonical_json();

    let mut hasher = Sha256::new();
    hasher.update(query_name.as_bytes());
    hasher.update(b":");
    hasher.update(canonical.as_bytes());
    let digest = hex::encode(hasher.finalize());

    format!("{}:{}", prefix, &digest[..KEY_DIGEST_HEX_LEN])
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use serde_json::json;

    #[test]
    fn test_same_params_same_key() {
        let key1 = derive_key("dashboard", "summary", &json!({"a": 1, "b": 2}));
        let key2 = derive_key("dashboard", "summary", &json!({"b": 2, "a": 1}));
        assert_eq!(key1, key2);
    }

    #[test]
    fn test_nested_map_order_is_irrelevant() {
        let key1 = derive_key(
            "dashboard",
            "summary",
            &json!({"filters": {"status": "open", "company": "acme"}, "page": 1}),
        );
        let key2 = derive_key(
            "dashboard",
            "summary",
            &json!({"page": 1, "filters": {"company": "acme", "status": "open"}}),
        );
        assert_eq!(key1, key2);
    }

    #[test]
    fn test_different_query_names_differ() {
        let params = json!({"a": 1});
        assert_ne!(
            derive_key("dashboard", "summary", &params),
            derive_key("dashboard", "summary_v2", &params)
        );
    }

    #[test]
    fn test_different_param_values_differ() {
        assert_ne!(
            derive_key("dashboard", "summary", &json!({"a": 1})),
            derive_key("dashboard", "summary", &json!({"a": 2}))
        );
    }

    #[test]
    fn test_array_order_is_part_of_identity() {
        assert_ne!(
            derive_key("jobs", "list", &json!({"ids": [1, 2, 3]})),
            derive_key("jobs", "list", &json!({"ids": [3, 2, 1]}))
        );
    }

    #[test]
    fn test_date_offset_and_utc_collide() {
        let key1 = derive_key(
            "analytics",
            "range",
            &json!({"from": "2024-01-01T01:00:00+01:00"}),
        );
        let key2 = derive_key(
            "analytics",
            "range",
            &json!({"from": "2024-01-01T00:00:00.000Z"}),
        );
        assert_eq!(key1, key2);
    }

    #[test]
    fn test_date_second_and_millisecond_precision_collide() {
        let key1 = derive_key("analytics", "range", &json!({"from": "2024-06-15T12:30:00Z"}));
        let key2 = derive_key(
            "analytics",
            "range",
            &json!({"from": "2024-06-15T12:30:00.000Z"}),
        );
        assert_eq!(key1, key2);
    }

    #[test]
    fn test_non_date_strings_pass_through() {
        assert_eq!(normalize_date_like("not a date"), "not a date");
        assert_eq!(normalize_date_like("2024-13-99"), "2024-13-99");
        // Bare dates without a time component are ids/labels, not instants
        assert_eq!(normalize_date_like("2024-01-01"), "2024-01-01");
    }

    #[test]
    fn test_key_shape() {
        let key = derive_key("dashboard", "summary", &json!({}));
        let (prefix, digest) = key.split_once(':').unwrap();
        assert_eq!(prefix, "dashboard");
        assert_eq!(digest.len(), KEY_DIGEST_HEX_LEN);
        assert!(digest.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn test_canonical_json_sorts_keys() {
        let canonical = CanonicalValue::from_json(&json!({"b": 1, "a": {"z": 2, "y": 3}}));
        assert_eq!(canonical.canonical_json(), r#"{"a":{"y":3,"z":2},"b":1}"#);
    }

    #[test]
    fn test_canonical_json_scalar_shapes() {
        assert_eq!(
            CanonicalValue::from_json(&json!([null, true, 3, 2.5, "x"])).canonical_json(),
            r#"[null,true,3,2.5,"x"]"#
        );
    }

    proptest! {
        #[test]
        fn prop_derivation_is_stable(
            query in "[a-z_]{1,16}",
            text in ".*",
            number in any::<i64>(),
            flag in any::<bool>(),
        ) {
            let params = json!({"text": text, "number": number, "flag": flag});
            prop_assert_eq!(
                derive_key("p", &query, &params),
                derive_key("p", &query, &params.clone())
            );
        }

        #[test]
        fn prop_distinct_numbers_distinct_keys(a in any::<i64>(), b in any::<i64>()) {
            prop_assume!(a != b);
            prop_assert_ne!(
                derive_key("p", "q", &json!({"v": a})),
                derive_key("p", "q", &json!({"v": b}))
            );
        }
    }
}
