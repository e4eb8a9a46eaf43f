//! Value comparison with the semantics legacy rule authors wrote against.
//!
//! Rule bodies store dynamically typed values into the context. Whether a value
//! counts as "set" and whether it differs from the snapshot follows the
//! truthiness and equality rules of that dynamic data model: `0`, `""`,
//! `false` and `null` are unset, and loose comparison coerces numbers,
//! numeric strings and booleans before comparing.
//!
//! Arrays and objects compare structurally. The snapshot is an owned copy, so
//! there is no identity to compare against.

use serde_json::{Number, Value};

/// Which equality a field is diffed with.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Equality {
    /// Same type and same value.
    Strict,
    /// Primitive coercion before comparing (`3600 == "3600"`, `true == 1`,
    /// `"0x10" == 16`). Arrays compared with a primitive are joined with `,`
    /// first. Numbers always become plain decimal text, never exponent
    /// notation, so `[1e21] == "1e+21"` does not hold.
    Loose,
}

impl Equality {
    /// Compares two values with this equality.
    pub fn eq(self, a: &Value, b: &Value) -> bool {
        match self {
            Equality::Strict => strict_eq(a, b),
            Equality::Loose => loose_eq(a, b),
        }
    }
}

/// Returns whether a value counts as set.
pub fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0 && !f.is_nan()),
        Value::String(s) => !s.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    }
}

/// Same-type equality. Numbers compare by numeric value, so `1` and `1.0` match.
pub fn strict_eq(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => x.as_f64() == y.as_f64(),
        _ => a == b,
    }
}

/// Equality with primitive coercion.
pub fn loose_eq(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Null, Value::Null) => true,
        (Value::Null, _) | (_, Value::Null) => false,
        (Value::Bool(_), Value::Bool(_)) => a == b,
        (Value::Bool(_), _)
        | (_, Value::Bool(_))
        | (Value::Number(_), Value::String(_))
        | (Value::String(_), Value::Number(_)) => {
            matches!((to_number(a), to_number(b)), (Some(x), Some(y)) if x == y)
        }
        (Value::Array(_) | Value::Object(_), Value::Array(_) | Value::Object(_)) => a == b,
        (Value::Array(_) | Value::Object(_), _) => loose_eq(&Value::String(to_primitive(a)), b),
        (_, Value::Array(_) | Value::Object(_)) => loose_eq(a, &Value::String(to_primitive(b))),
        _ => strict_eq(a, b),
    }
}

/// Returns whether `new` should be replayed: it is set and differs from `old`.
///
/// An absent old value differs from every set value.
pub fn is_changed(new: &Value, old: Option<&Value>, equality: Equality) -> bool {
    is_truthy(new) && old.map_or(true, |old| !equality.eq(new, old))
}

/// Compares two string sequences as multisets, ignoring order.
pub fn same_members(a: &[String], b: &[String]) -> bool {
    if a.len() != b.len() {
        return false;
    }

    let mut a: Vec<&str> = a.iter().map(String::as_str).collect();
    let mut b: Vec<&str> = b.iter().map(String::as_str).collect();
    a.sort_unstable();
    b.sort_unstable();
    a == b
}

// `None` stands for NaN, which equals nothing.
fn to_number(value: &Value) -> Option<f64> {
    match value {
        Value::Bool(b) => Some(if *b { 1.0 } else { 0.0 }),
        Value::Number(n) => n.as_f64(),
        Value::String(s) => string_to_number(s),
        Value::Array(_) | Value::Object(_) => string_to_number(&to_primitive(value)),
        Value::Null => Some(0.0),
    }
}

fn string_to_number(s: &str) -> Option<f64> {
    let s = s.trim();
    if s.is_empty() {
        return Some(0.0);
    }

    let radix = match s.get(..2) {
        Some("0x" | "0X") => Some(16),
        Some("0o" | "0O") => Some(8),
        Some("0b" | "0B") => Some(2),
        _ => None,
    };
    if let Some(radix) = radix {
        let digits = &s[2..];
        if digits.is_empty() {
            return None;
        }
        return digits.chars().try_fold(0.0_f64, |acc, c| {
            c.to_digit(radix).map(|d| acc * f64::from(radix) + f64::from(d))
        });
    }

    let unsigned = s.strip_prefix(|c: char| c == '+' || c == '-').unwrap_or(s);
    if unsigned == "Infinity" {
        return Some(if s.starts_with('-') { f64::NEG_INFINITY } else { f64::INFINITY });
    }
    // Rejects `inf`, `nan` and friends, which `f64::from_str` would accept.
    let decimal = unsigned
        .bytes()
        .all(|b| b.is_ascii_digit() || matches!(b, b'.' | b'e' | b'E' | b'+' | b'-'));
    if !decimal {
        return None;
    }
    s.parse::<f64>().ok()
}

fn to_primitive(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => number_to_string(n),
        Value::String(s) => s.clone(),
        Value::Array(items) => items.iter().map(to_primitive).collect::<Vec<_>>().join(","),
        Value::Object(_) => "[object Object]".to_string(),
    }
}

// Integral floats print without a fraction (`1.0` -> `1`), and `-0` as `0`.
fn number_to_string(n: &Number) -> String {
    match n.as_f64() {
        Some(f) if n.is_f64() && f == 0.0 => "0".to_string(),
        Some(f) if n.is_f64() => f.to_string(),
        _ => n.to_string(),
    }
}
