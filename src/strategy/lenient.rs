//! Lenient coercion of operator-supplied values
//!
//! A value that is absent, empty, zero, or not numeric leaves the previous
//! setting in place. Nothing here ever rejects input.

use crate::venue::decimal_from_value;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde_json::Value;

/// Non-zero number from a JSON number or numeric string
pub fn decimal(raw: Option<&Value>, fallback: Decimal) -> Decimal {
    raw.and_then(decimal_from_value)
        .filter(|d| !d.is_zero())
        .unwrap_or(fallback)
}

/// Same rule for a raw string (environment variables)
pub fn decimal_str(raw: Option<&str>, fallback: Decimal) -> Decimal {
    decimal(raw.map(|s| Value::String(s.to_string())).as_ref(), fallback)
}

/// Positive whole number of duration units
pub fn duration(raw: Option<&Value>, fallback: u32) -> u32 {
    raw.and_then(decimal_from_value)
        .filter(|d| d.is_sign_positive() && d.fract().is_zero())
        .and_then(|d| d.to_u32())
        .filter(|d| *d > 0)
        .unwrap_or(fallback)
}

pub fn duration_str(raw: Option<&str>, fallback: u32) -> u32 {
    duration(raw.map(|s| Value::String(s.to_string())).as_ref(), fallback)
}

/// Non-empty text; numbers are taken verbatim
pub fn text(raw: Option<&Value>, fallback: &str) -> String {
    match raw {
        Some(Value::String(s)) if !s.is_empty() => s.clone(),
        Some(Value::Number(n)) if n.as_f64() != Some(0.0) => n.to_string(),
        _ => fallback.to_string(),
    }
}
