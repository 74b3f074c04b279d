//! Canonical forms of raw field values.
//!
//! Both functions are total: malformed input maps to `None` or an empty key,
//! never to an error.

use crate::types::{EntryData, FieldValue, Scalar};

/// Numeric reading of a scalar.
///
/// Numbers pass through when finite. Text accepts a comma as decimal
/// separator (the first comma becomes a point) and reads the longest leading
/// decimal literal, so `"12,5 °C"` yields `12.5`.
pub fn numeric_of(raw: &Scalar) -> Option<f64> {
    match raw {
        Scalar::Number(n) => n.as_f64().filter(|v| v.is_finite()),
        Scalar::Text(s) => {
            if s.is_empty() {
                return None;
            }
            let normalized = s.replacen(',', ".", 1);
            parse_float_prefix(&normalized).filter(|v| v.is_finite())
        }
        Scalar::Null | Scalar::Bool(_) => None,
    }
}

/// Numeric reading of a data field; only scalar fields qualify.
pub fn numeric_field(data: &EntryData, key: &str) -> Option<f64> {
    match data.get(key)? {
        FieldValue::Scalar(s) => numeric_of(s),
        _ => None,
    }
}

/// Comparison key of a scalar. Used for equality, never for display.
pub fn scalar_key(raw: &Scalar) -> String {
    match raw {
        Scalar::Null => String::new(),
        Scalar::Bool(true) => "true".to_string(),
        Scalar::Bool(false) => "false".to_string(),
        Scalar::Number(n) => match n.as_f64() {
            Some(v) if v.is_finite() => format_number_key(v),
            _ => String::new(),
        },
        Scalar::Text(s) => s.trim().to_string(),
    }
}

/// Shortest round-trip text of a float, in the form JavaScript's
/// `String(number)` produces: integral values print without a fraction,
/// negative zero prints as `0`, and magnitudes below `1e-6` or from `1e21`
/// up switch to exponent form with an explicit sign (`1e+21`, `1.5e-7`).
fn format_number_key(v: f64) -> String {
    if v == 0.0 {
        return "0".to_string();
    }
    if (1e-6..1e21).contains(&v.abs()) {
        return format!("{}", v);
    }
    let text = format!("{:e}", v);
    match text.split_once('e') {
        Some((mantissa, exponent)) if !exponent.starts_with('-') => {
            format!("{}e+{}", mantissa, exponent)
        }
        _ => text,
    }
}

/// Parse the longest leading decimal literal of `s`.
fn parse_float_prefix(s: &str) -> Option<f64> {
    let s = s.trim_start();
    let bytes = s.as_bytes();
    let mut end = 0;

    if matches!(bytes.first(), Some(b'+') | Some(b'-')) {
        end += 1;
    }

    let int_start = end;
    while end < bytes.len() && bytes[end].is_ascii_digit() {
        end += 1;
    }
    let mut digits = end - int_start;

    if end < bytes.len() && bytes[end] == b'.' {
        let frac_start = end + 1;
        let mut frac_end = frac_start;
        while frac_end < bytes.len() && bytes[frac_end].is_ascii_digit() {
            frac_end += 1;
        }
        digits += frac_end - frac_start;
        if digits > 0 {
            end = frac_end;
        }
    }

    if digits == 0 {
        return None;
    }

    if end < bytes.len() && (bytes[end] == b'e' || bytes[end] == b'E') {
        let mut exp_end = end + 1;
        if matches!(bytes.get(exp_end), Some(b'+') | Some(b'-')) {
            exp_end += 1;
        }
        let exp_digits_start = exp_end;
        while exp_end < bytes.len() && bytes[exp_end].is_ascii_digit() {
            exp_end += 1;
        }
        if exp_end > exp_digits_start {
            end = exp_end;
        }
    }

    s[..end].parse::<f64>().ok()
}
