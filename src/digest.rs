//! Stable, non-cryptographic digest for replay-identity assertions.
//!
//! `digest(value)` canonicalizes `value` as JSON with object keys sorted
//! lexicographically, then runs FNV-1a over the UTF-8 bytes of that
//! canonical text and prints the hash as 8 lowercase hex digits. This is
//! never used for anything security-sensitive.

use serde_json::Value;

const FNV_OFFSET: u32 = 0x811C_9DC5;
const FNV_PRIME: u32 = 0x0100_0193;

/// Produce the 8-hex-character digest of any serializable value.
pub fn digest<T: serde::Serialize>(value: &T) -> String {
    let json = serde_json::to_value(value).unwrap_or(Value::Null);
    let mut out = String::new();
    canonicalize_into(&json, &mut out);
    format!("{:08x}", fnv1a(out.as_bytes()))
}

fn fnv1a(bytes: &[u8]) -> u32 {
    let mut h = FNV_OFFSET;
    for &b in bytes {
        h ^= u32::from(b);
        h = h.wrapping_mul(FNV_PRIME);
    }
    h
}

/// Serialize `value` with object keys sorted ascending; arrays keep order.
fn canonicalize_into(value: &Value, out: &mut String) {
    match value {
        Value::Null => out.push_str("null"),
        Value::Bool(b) => out.push_str(if *b { "true" } else { "false" }),
        Value::Number(n) => out.push_str(&n.to_string()),
        Value::String(s) => {
            out.push('"');
            escape_into(s, out);
            out.push('"');
        }
        Value::Array(items) => {
            out.push('[');
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                canonicalize_into(item, out);
            }
            out.push(']');
        }
        Value::Object(map) => {
            out.push('{');
            let mut keys: Vec<&String> = map.keys().collect();
            keys.sort();
            for (i, key) in keys.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                out.push('"');
                escape_into(key, out);
                out.push_str("\":");
                canonicalize_into(&map[*key], out);
            }
            out.push('}');
        }
    }
}

fn escape_into(s: &str, out: &mut String) {
    for c in s.chars() {
        match c {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            c if (c as u32) < 0x20 => out.push_str(&format!("\\u{:04x}", c as u32)),
            c => out.push(c),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn same_value_same_digest() {
        let a = digest(&json!({"a": 1}));
        let b = digest(&json!({"a": 1}));
        assert_eq!(a, b);
    }

    #[test]
    fn key_order_does_not_affect_digest() {
        let a = digest(&json!({"a": 1, "b": 2}));
        let b = digest(&json!({"b": 2, "a": 1}));
        assert_eq!(a, b);
    }

    #[test]
    fn digest_matches_hex_shape() {
        let d = digest(&json!({"a": 1}));
        assert_eq!(d.len(), 8);
        assert!(d.chars().all(|c| c.is_ascii_hexdigit() && !c.is_uppercase()));
    }

    #[test]
    fn different_values_differ() {
        let a = digest(&json!({"a": 1}));
        let b = digest(&json!({"a": 2}));
        assert_ne!(a, b);
    }

    #[test]
    fn array_order_matters() {
        let a = digest(&json!([1, 2, 3]));
        let b = digest(&json!([3, 2, 1]));
        assert_ne!(a, b);
    }
}
