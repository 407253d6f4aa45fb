//! Property-list helpers over `lexpr` values.
//!
//! Keys may arrive as `Value::Keyword("key")` (elisp parser) or
//! `Value::Symbol(":key")` (default parser); both are accepted.

use anyhow::bail;
use lexpr::Value;

/// Escape a string for s-expression output.
pub fn escape_string(s: &str) -> String {
    s.replace('\\', "\\\\").replace('"', "\\\"")
}

fn key_name(value: &Value) -> Option<&str> {
    match value {
        Value::Keyword(k) => Some(k.as_ref()),
        Value::Symbol(s) => s.as_ref().strip_prefix(':'),
        _ => None,
    }
}

/// Top-level items of a proper or improper list.
fn items(value: &Value) -> Vec<&Value> {
    let mut out = Vec::new();
    let mut current = value;
    while let Value::Cons(pair) = current {
        out.push(pair.car());
        current = pair.cdr();
    }
    out
}

/// Keys of a plist, in order of appearance.
pub fn plist_keys(value: &Value) -> Vec<String> {
    items(value)
        .into_iter()
        .step_by(2)
        .filter_map(|v| key_name(v).map(str::to_string))
        .collect()
}

/// Extract a keyword value from a plist as text.
pub fn get_keyword(value: &Value, key: &str) -> Option<String> {
    let items = items(value);
    let idx = items
        .iter()
        .step_by(2)
        .position(|v| key_name(v) == Some(key))?;
    let val = items.get(idx * 2 + 1)?;
    Some(match val {
        Value::Keyword(v) => v.to_string(),
        Value::Symbol(v) => {
            let s = v.to_string();
            s.strip_prefix(':').unwrap_or(&s).to_string()
        }
        Value::String(v) => v.to_string(),
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => if *b { "t" } else { "nil" }.to_string(),
        Value::Null | Value::Nil => "nil".to_string(),
        other => other.to_string(),
    })
}

/// Extract an integer; present-but-unparsable is an error.
pub fn get_int(value: &Value, key: &str) -> anyhow::Result<Option<i64>> {
    match get_keyword(value, key) {
        None => Ok(None),
        Some(s) => match s.parse() {
            Ok(n) => Ok(Some(n)),
            Err(_) => bail!(":{} expects an integer, got {}", key, s),
        },
    }
}

/// Extract a non-negative integer.
pub fn get_uint(value: &Value, key: &str) -> anyhow::Result<Option<u64>> {
    match get_int(value, key)? {
        Some(n) if n < 0 => bail!(":{} must not be negative, got {}", key, n),
        other => Ok(other.map(|n| n as u64)),
    }
}

/// Extract a non-negative integer that fits in 32 bits.
pub fn get_u32(value: &Value, key: &str) -> anyhow::Result<Option<u32>> {
    match get_uint(value, key)? {
        None => Ok(None),
        Some(n) => match u32::try_from(n) {
            Ok(n) => Ok(Some(n)),
            Err(_) => bail!(":{} out of range, got {}", key, n),
        },
    }
}

/// Extract a floating-point value; integers are accepted.
pub fn get_float(value: &Value, key: &str) -> anyhow::Result<Option<f64>> {
    match get_keyword(value, key) {
        None => Ok(None),
        Some(s) => match s.parse() {
            Ok(n) => Ok(Some(n)),
            Err(_) => bail!(":{} expects a number, got {}", key, s),
        },
    }
}

/// Extract a string value.
pub fn get_string(value: &Value, key: &str) -> Option<String> {
    get_keyword(value, key)
}
