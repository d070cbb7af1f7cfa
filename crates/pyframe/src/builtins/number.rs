//! Implementation of the int() and float() builtin functions.

use crate::{
    args::ArgValues,
    exceptions::{ExcType, RunResult},
    types::str::string_repr,
    value::Value,
};

/// `int()`, `int(x)` and `int(s, base)`.
///
/// Floats truncate toward zero; strings accept surrounding whitespace, a sign,
/// `_` digit separators and, for base 0 or a matching base, a `0x`/`0o`/`0b` prefix.
pub fn builtin_int(args: ArgValues) -> RunResult<Value> {
    let (value, base) = match args {
        ArgValues::Empty => return Ok(Value::Int(0)),
        args => args.get_one_two_args("int")?,
    };
    if let Some(base) = base {
        let base = base
            .as_int()
            .ok_or_else(|| ExcType::type_error_not_integer(base.py_type()))?;
        return match &value {
            Value::Str(s) => parse_int(s, base).map(Value::Int),
            _ => Err(ExcType::type_error("int() can't convert non-string with explicit base")),
        };
    }
    match &value {
        Value::Int(i) => Ok(Value::Int(*i)),
        Value::Bool(b) => Ok(Value::Int(i64::from(*b))),
        Value::Float(f) => float_to_int(*f).map(Value::Int),
        Value::Str(s) => parse_int(s, 10).map(Value::Int),
        other => Err(ExcType::type_error(format!(
            "int() argument must be a string, a bytes-like object or a real number, not '{}'",
            other.py_type()
        ))),
    }
}

fn float_to_int(f: f64) -> RunResult<i64> {
    if f.is_nan() {
        return Err(ExcType::value_error("cannot convert float NaN to integer"));
    }
    if f.is_infinite() {
        return Err(ExcType::overflow_error("cannot convert float infinity to integer"));
    }
    let truncated = f.trunc();
    // i64::MAX as f64 rounds up to 2^63, which is already out of range
    if truncated < -9_223_372_036_854_775_808.0 || truncated >= 9_223_372_036_854_775_808.0 {
        return Err(ExcType::overflow_error("int too large to convert"));
    }
    Ok(truncated as i64)
}

fn parse_int(text: &str, base: i64) -> RunResult<i64> {
    let invalid = || {
        ExcType::value_error(format!(
            "invalid literal for int() with base {base}: {}",
            string_repr(text)
        ))
    };
    if base != 0 && !(2..=36).contains(&base) {
        return Err(ExcType::value_error("int() base must be >= 2 and <= 36, or 0"));
    }
    let trimmed = text.trim();
    let (negative, unsigned) = match trimmed.as_bytes().first() {
        Some(b'-') => (true, &trimmed[1..]),
        Some(b'+') => (false, &trimmed[1..]),
        _ => (false, trimmed),
    };
    let prefix = unsigned.get(..2).map(str::to_ascii_lowercase);
    let prefixed_radix = match prefix.as_deref() {
        Some("0x") => Some(16),
        Some("0o") => Some(8),
        Some("0b") => Some(2),
        _ => None,
    };
    let (radix, digits) = match (base, prefixed_radix) {
        (0, Some(radix)) => (radix, &unsigned[2..]),
        (0, None) => (10, unsigned),
        (base, Some(radix)) if base == radix => (radix, &unsigned[2..]),
        (base, _) => (base, unsigned),
    };
    // base 0 rejects leading zeros on a decimal literal, like Python source
    if base == 0 && prefixed_radix.is_none() && digits.len() > 1 && digits.starts_with('0') {
        if digits.chars().all(|c| c == '0' || c == '_') {
            return Ok(0);
        }
        return Err(invalid());
    }
    let digits = strip_separators(digits, prefixed_radix.is_some() && radix != 10).ok_or_else(invalid)?;
    let magnitude = u64::from_str_radix(&digits, radix as u32).map_err(|_| invalid())?;
    let value = if negative {
        0_i64.checked_sub_unsigned(magnitude)
    } else {
        i64::try_from(magnitude).ok()
    };
    value.ok_or_else(|| ExcType::overflow_error("int too large to convert"))
}

/// Removes single `_` separators between digits; `None` if they are misplaced.
///
/// After a base prefix one leading underscore is allowed (`0x_ff`).
fn strip_separators(digits: &str, allow_leading: bool) -> Option<String> {
    let digits = match digits.strip_prefix('_') {
        Some(rest) if allow_leading => rest,
        Some(_) => return None,
        None => digits,
    };
    if digits.is_empty() || digits.ends_with('_') || digits.contains("__") {
        return None;
    }
    if !digits.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
        return None;
    }
    Some(digits.replace('_', ""))
}

/// `float()` and `float(x)`.
pub fn builtin_float(args: ArgValues) -> RunResult<Value> {
    let Some(value) = args.get_zero_one_arg("float")? else {
        return Ok(Value::Float(0.0));
    };
    match &value {
        Value::Float(f) => Ok(Value::Float(*f)),
        Value::Int(i) => Ok(Value::Float(*i as f64)),
        Value::Bool(b) => Ok(Value::Float(f64::from(u8::from(*b)))),
        Value::Str(s) => parse_float(s).map(Value::Float),
        other => Err(ExcType::type_error(format!(
            "float() argument must be a string or a real number, not '{}'",
            other.py_type()
        ))),
    }
}

fn parse_float(text: &str) -> RunResult<f64> {
    let invalid = || {
        ExcType::value_error(format!(
            "could not convert string to float: {}",
            string_repr(text)
        ))
    };
    let trimmed = text.trim();
    let unsigned = trimmed.trim_start_matches(['+', '-']);
    match unsigned.to_ascii_lowercase().as_str() {
        "inf" | "infinity" | "nan" => {}
        lowered if lowered.contains("inf") || lowered.contains("nan") => return Err(invalid()),
        _ => {}
    }
    if trimmed.len() - unsigned.len() > 1 {
        return Err(invalid());
    }
    trimmed.parse::<f64>().map_err(|_| invalid())
}
