//! Content hashing
//!
//! Deterministic identities for semi-structured records. Two mappings with
//! the same keys and values hash the same no matter how their keys were
//! ordered on the way in.
//!
//! The canonical text uses `", "` / `": "` separators, escapes every
//! non-ASCII character as `\uXXXX` and writes floats in shortest
//! round-trip form (`1.0`, `1e-05`, `1e+16`). That is the form author
//! identities in existing graphs were computed over; changing any of it
//! breaks author dedup against previously loaded data.

use serde_json::{Map, Value};
use sha2::{Digest, Sha256};
use std::fmt::Write;

/// Length of a database name derived by [`database_name_for`]
pub const DATABASE_NAME_LEN: usize = 64;

/// Hex SHA-256 digest of the canonical serialization of `value`
pub fn content_fingerprint(value: &Value) -> String {
    let mut hasher = Sha256::new();
    hasher.update(canonical_json(value).as_bytes());
    format!("{:x}", hasher.finalize())
}

/// Fingerprint a flat set of named fields. Fields with no value are left
/// out of the mapping entirely, so `{family: "Doe"}` and
/// `{family: "Doe", orcid: null}` are the same identity.
pub fn fingerprint_fields<'a, I>(fields: I) -> String
where
    I: IntoIterator<Item = (&'a str, Option<&'a Value>)>,
{
    let map: Map<String, Value> = fields
        .into_iter()
        .filter_map(|(name, value)| match value {
            None | Some(Value::Null) => None,
            Some(value) => Some((name.to_string(), value.clone())),
        })
        .collect();
    content_fingerprint(&Value::Object(map))
}

/// Database name for an archive: `"d"` followed by the first 63 hex chars of
/// SHA-256(file name). Never starts with a digit; stable across runs.
pub fn database_name_for(file_name: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(file_name.as_bytes());
    let digest = format!("{:x}", hasher.finalize());
    format!("d{}", &digest[..DATABASE_NAME_LEN - 1])
}

/// Canonical text form: object keys sorted at every depth
pub fn canonical_json(value: &Value) -> String {
    let mut out = String::new();
    write_value(value, &mut out);
    out
}

fn write_value(value: &Value, out: &mut String) {
    match value {
        Value::Null => out.push_str("null"),
        Value::Bool(b) => out.push_str(if *b { "true" } else { "false" }),
        Value::Number(n) => match n.as_f64().filter(|_| n.is_f64()) {
            Some(f) => write_float(f, out),
            None => {
                let _ = write!(out, "{}", n);
            }
        },
        Value::String(s) => write_string(s, out),
        Value::Array(items) => {
            out.push('[');
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    out.push_str(", ");
                }
                write_value(item, out);
            }
            out.push(']');
        }
        Value::Object(map) => {
            let mut keys: Vec<&String> = map.keys().collect();
            keys.sort();
            out.push('{');
            for (i, key) in keys.into_iter().enumerate() {
                if i > 0 {
                    out.push_str(", ");
                }
                write_string(key, out);
                out.push_str(": ");
                write_value(&map[key], out);
            }
            out.push('}');
        }
    }
}

/// Shortest round-trip digits; positional while the decimal point sits
/// within 16 digits of the first one, scientific with a signed two-digit
/// exponent otherwise. Always carries a `.` or an exponent.
fn write_float(f: f64, out: &mut String) {
    let sci = format!("{:e}", f);
    let (mantissa, exponent) = sci.split_once('e').unwrap_or((sci.as_str(), "0"));
    let exponent: i32 = exponent.parse().unwrap_or(0);
    let (sign, mantissa) = match mantissa.strip_prefix('-') {
        Some(rest) => ("-", rest),
        None => ("", mantissa),
    };
    let digits: String = mantissa.chars().filter(|c| *c != '.').collect();
    let point = exponent + 1;

    out.push_str(sign);
    if point <= -4 || point > 16 {
        let (first, rest) = digits.split_at(1);
        out.push_str(first);
        if !rest.is_empty() {
            out.push('.');
            out.push_str(rest);
        }
        let _ = write!(out, "e{}{:02}", if exponent < 0 { '-' } else { '+' }, exponent.abs());
    } else if point <= 0 {
        out.push_str("0.");
        out.extend(std::iter::repeat('0').take(point.unsigned_abs() as usize));
        out.push_str(&digits);
    } else {
        let point = point as usize;
        if point >= digits.len() {
            out.push_str(&digits);
            out.extend(std::iter::repeat('0').take(point - digits.len()));
            out.push_str(".0");
        } else {
            out.push_str(&digits[..point]);
            out.push('.');
            out.push_str(&digits[point..]);
        }
    }
}

fn write_string(s: &str, out: &mut String) {
    out.push('"');
    for c in s.chars() {
        match c {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            '\u{8}' => out.push_str("\\b"),
            '\u{c}' => out.push_str("\\f"),
            c if c.is_ascii() && c >= ' ' => out.push(c),
            c => {
                let mut units = [0u16; 2];
                for unit in c.encode_utf16(&mut units) {
                    let _ = write!(out, "\\u{:04x}", unit);
                }
            }
        }
    }
    out.push('"');
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_key_order_does_not_matter() {
        let a: Value = serde_json::from_str(r#"{"family":"Doe","given":"Jane"}"#).unwrap();
        let b: Value = serde_json::from_str(r#"{"given":"Jane","family":"Doe"}"#).unwrap();
        assert_eq!(content_fingerprint(&a), content_fingerprint(&b));

        let nested_a = json!({"outer": {"z": 1, "a": [1, {"y": 2, "b": 3}]}});
        let nested_b = json!({"outer": {"a": [1, {"b": 3, "y": 2}], "z": 1}});
        assert_eq!(content_fingerprint(&nested_a), content_fingerprint(&nested_b));
    }

    #[test]
    fn test_different_values_differ() {
        assert_ne!(
            content_fingerprint(&json!({"family": "Doe"})),
            content_fingerprint(&json!({"family": "Roe"}))
        );
        // Exact-field matching: case is significant
        assert_ne!(
            content_fingerprint(&json!({"family": "Doe"})),
            content_fingerprint(&json!({"family": "doe"}))
        );
    }

    #[test]
    fn test_canonical_form() {
        let value = json!({"given": "Jane", "family": "Doe", "n": [1, 2]});
        assert_eq!(
            canonical_json(&value),
            r#"{"family": "Doe", "given": "Jane", "n": [1, 2]}"#
        );
        assert_eq!(canonical_json(&json!("Gödel")), r#""G\u00f6del""#);
        assert_eq!(canonical_json(&json!("\u{1F600}")), r#""\ud83d\ude00""#);
        assert_eq!(canonical_json(&json!("a\"b\\c\n")), r#""a\"b\\c\n""#);
    }

    #[test]
    fn test_float_text() {
        let cases = [
            (json!(1.0), "1.0"),
            (json!(-0.0), "-0.0"),
            (json!(0.0), "0.0"),
            (json!(123.456), "123.456"),
            (json!(0.0001), "0.0001"),
            (json!(0.00001), "1e-05"),
            (json!(1.5e-7), "1.5e-07"),
            (json!(1e15), "1000000000000000.0"),
            (json!(1e16), "1e+16"),
            (json!(1.25e20), "1.25e+20"),
            (json!(1e100), "1e+100"),
            (json!(0.1), "0.1"),
        ];
        for (value, text) in cases {
            assert_eq!(canonical_json(&value), text, "{value:?}");
        }
        // Integers keep their integer form
        assert_eq!(canonical_json(&json!(100000)), "100000");
        assert_eq!(canonical_json(&json!(-7)), "-7");
        let parsed: Value = serde_json::from_str(r#"{"v": 1e2}"#).unwrap();
        assert_eq!(canonical_json(&parsed), r#"{"v": 100.0}"#);
    }

    #[test]
    fn test_known_digest() {
        // sha256 of "{}"
        assert_eq!(
            content_fingerprint(&json!({})),
            "44136fa355b3678a1146ad16f7e8649e94fb4fc21fe77e8310c060f61caaff8a"
        );
        assert_eq!(
            content_fingerprint(&json!({"given": "Jane", "family": "Doe"})),
            "d664b414e478dabb5884e1a680fc6219e13d24ca4a8dcc3916ac869d1073da64"
        );
        assert_eq!(
            content_fingerprint(&json!({"family": "Gödel"})),
            "eae6a7d5a8534588fda7cd9e1962884cd11a2a2d57b1530ff954463774631b38"
        );
    }

    #[test]
    fn test_fingerprint_fields_skips_absent() {
        let family = json!("Doe");
        let with_null = json!(null);
        let a = fingerprint_fields([("family", Some(&family)), ("orcid", None)]);
        let b = fingerprint_fields([("family", Some(&family)), ("orcid", Some(&with_null))]);
        assert_eq!(a, b);
        assert_eq!(a, content_fingerprint(&json!({"family": "Doe"})));
    }

    #[test]
    fn test_database_name_for() {
        let name = database_name_for("records_2024.zip");
        assert_eq!(name.len(), DATABASE_NAME_LEN);
        assert!(name.starts_with('d'));
        assert!(name[1..].chars().all(|c| c.is_ascii_hexdigit()));
        assert_eq!(name, database_name_for("records_2024.zip"));
        assert_ne!(name, database_name_for("records_2025.zip"));
    }
}
