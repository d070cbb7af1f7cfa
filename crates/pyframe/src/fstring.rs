//! Runtime support for `FORMAT_VALUE`: conversions and the format mini-language.
//!
//! The supported spec subset is `[[fill]align][sign][0][width][,|_][.precision][type]`.
//! `#`, `z` and the locale-aware `n` type are rejected.

use std::str::FromStr;

use crate::{
    exceptions::{ExcType, RunResult},
    types::Type,
    value::{Value, float_repr},
};

// ============================================================================
// Conversions
// ============================================================================

/// Conversion selected by the low two bits of `FORMAT_VALUE`'s flags.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Conversion {
    /// No `!` suffix, `format()` sees the value itself.
    #[default]
    None,
    /// `!s`
    Str,
    /// `!r`
    Repr,
    /// `!a`
    Ascii,
}

impl Conversion {
    #[must_use]
    pub fn from_flags(flags: u32) -> Self {
        match flags & 0x03 {
            1 => Self::Str,
            2 => Self::Repr,
            3 => Self::Ascii,
            _ => Self::None,
        }
    }

    /// Applies the conversion; the three explicit conversions always produce a str.
    #[must_use]
    pub fn apply(self, value: Value) -> Value {
        match self {
            Self::None => value,
            Self::Str => Value::from(value.py_str()),
            Self::Repr => Value::from(value.py_repr()),
            Self::Ascii => Value::from(value.py_ascii()),
        }
    }
}

// ============================================================================
// Format specification
// ============================================================================

/// A parsed format specification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedFormatSpec {
    pub fill: char,
    /// `<`, `>`, `^` or `=`
    pub align: Option<char>,
    /// `+`, `-` or ` `
    pub sign: Option<char>,
    pub zero_pad: bool,
    pub width: usize,
    /// Thousands separator, `,` or `_`.
    pub grouping: Option<char>,
    pub precision: Option<usize>,
    pub type_char: Option<char>,
}

impl Default for ParsedFormatSpec {
    fn default() -> Self {
        Self {
            fill: ' ',
            align: None,
            sign: None,
            zero_pad: false,
            width: 0,
            grouping: None,
            precision: None,
            type_char: None,
        }
    }
}

const ALIGNS: [char; 4] = ['<', '>', '^', '='];
const TYPES: [char; 13] = ['s', 'd', 'b', 'o', 'x', 'X', 'f', 'F', 'e', 'E', 'g', 'G', '%'];

impl FromStr for ParsedFormatSpec {
    /// The rejected spec, for the caller's error message.
    type Err = String;

    fn from_str(spec: &str) -> Result<Self, Self::Err> {
        let mut result = Self::default();
        let chars: Vec<char> = spec.chars().collect();
        let mut pos = 0;

        match chars.as_slice() {
            [fill, align, ..] if ALIGNS.contains(align) => {
                result.fill = *fill;
                result.align = Some(*align);
                pos = 2;
            }
            [align, ..] if ALIGNS.contains(align) => {
                result.align = Some(*align);
                pos = 1;
            }
            _ => {}
        }
        if let Some(&sign @ ('+' | '-' | ' ')) = chars.get(pos) {
            result.sign = Some(sign);
            pos += 1;
        }
        if chars.get(pos) == Some(&'0') {
            result.zero_pad = true;
            pos += 1;
        }
        let (width, next) = digits(&chars, pos);
        result.width = width.unwrap_or(0);
        pos = next;
        if let Some(&sep @ (',' | '_')) = chars.get(pos) {
            result.grouping = Some(sep);
            pos += 1;
        }
        if chars.get(pos) == Some(&'.') {
            let (precision, next) = digits(&chars, pos + 1);
            // a bare '.' is not a precision
            result.precision = Some(precision.ok_or_else(|| spec.to_owned())?);
            pos = next;
        }
        if let Some(&c) = chars.get(pos)
            && TYPES.contains(&c)
        {
            result.type_char = Some(c);
            pos += 1;
        }
        if pos == chars.len() {
            Ok(result)
        } else {
            Err(spec.to_owned())
        }
    }
}

/// Reads a run of ASCII digits starting at `pos`, returning the number and the
/// position after it.
fn digits(chars: &[char], pos: usize) -> (Option<usize>, usize) {
    let end = chars[pos.min(chars.len())..]
        .iter()
        .position(|c| !c.is_ascii_digit())
        .map_or(chars.len(), |n| pos + n);
    if end <= pos {
        return (None, pos);
    }
    let text: String = chars[pos..end].iter().collect();
    (text.parse().ok(), end)
}

// ============================================================================
// Formatting
// ============================================================================

/// `format(value, spec)` for the builtin value types.
///
/// An empty spec is `str(value)`. Bools format as ints under any non-empty spec.
pub fn format_value(value: &Value, spec: &str) -> RunResult<String> {
    if spec.is_empty() {
        return Ok(value.py_str());
    }
    let value_type = value.py_type();
    let parsed: ParsedFormatSpec = spec.parse().map_err(|bad: String| {
        ExcType::value_error(format!(
            "Invalid format specifier '{bad}' for object of type '{value_type}'"
        ))
    })?;
    format_with_spec(value, &parsed)
}

/// Formats a value under an already-parsed spec.
pub fn format_with_spec(value: &Value, spec: &ParsedFormatSpec) -> RunResult<String> {
    let value_type = value.py_type();
    match (value, spec.type_char) {
        (Value::Int(_) | Value::Bool(_), None | Some('d' | 'b' | 'o' | 'x' | 'X')) => {
            let n = value.as_int().unwrap_or_default();
            let radix = match spec.type_char {
                Some('b') => 2,
                Some('o') => 8,
                Some('x' | 'X') => 16,
                _ => 10,
            };
            check_number_spec(spec, value_type)?;
            let out = format_int(n, radix, spec);
            Ok(if spec.type_char == Some('X') { out.to_uppercase() } else { out })
        }
        (Value::Int(_) | Value::Bool(_), Some('f' | 'F' | 'e' | 'E' | 'g' | 'G' | '%')) => {
            check_number_spec(spec, value_type)?;
            Ok(format_float(value.as_int().unwrap_or_default() as f64, spec))
        }
        (Value::Float(f), None | Some('f' | 'F' | 'e' | 'E' | 'g' | 'G' | '%')) => {
            check_number_spec(spec, value_type)?;
            Ok(format_float(*f, spec))
        }
        (Value::Str(s), None | Some('s')) => format_string(s, spec),
        (other, None) if spec.grouping.is_none() && spec.sign.is_none() => format_string(&other.py_str(), spec),
        (_, Some(c)) => Err(ExcType::value_error(format!(
            "Unknown format code '{c}' for object of type '{value_type}'"
        ))),
        (_, None) => Err(ExcType::value_error(format!(
            "Invalid format specifier for object of type '{value_type}'"
        ))),
    }
}

fn check_number_spec(spec: &ParsedFormatSpec, value_type: Type) -> RunResult<()> {
    let integer_type = matches!(spec.type_char, None | Some('d' | 'b' | 'o' | 'x' | 'X'));
    if spec.precision.is_some() && integer_type && value_type != Type::Float {
        return Err(ExcType::value_error("Precision not allowed in integer format specifier"));
    }
    if spec.grouping == Some(',')
        && let Some(c @ ('b' | 'o' | 'x' | 'X')) = spec.type_char
    {
        return Err(ExcType::value_error(format!("Cannot specify ',' with '{c}'.")));
    }
    Ok(())
}

/// Pads a string, left-aligned by default, truncated to `precision` characters.
pub fn format_string(value: &str, spec: &ParsedFormatSpec) -> RunResult<String> {
    if spec.align == Some('=') {
        return Err(ExcType::value_error("'=' alignment not allowed in string format specifier"));
    }
    if spec.sign.is_some() {
        return Err(ExcType::value_error("Sign not allowed in string format specifier"));
    }
    if let Some(sep) = spec.grouping {
        return Err(ExcType::value_error(format!("Cannot specify '{sep}' with 's'.")));
    }
    let truncated: String = match spec.precision {
        Some(precision) => value.chars().take(precision).collect(),
        None => value.to_owned(),
    };
    Ok(pad_string(&truncated, spec.width, spec.align.unwrap_or('<'), spec.fill))
}

/// Formats an integer in the given radix, with no `0x`-style prefix.
pub fn format_int(n: i64, radix: u32, spec: &ParsedFormatSpec) -> String {
    let magnitude = n.unsigned_abs();
    let digits = match radix {
        2 => format!("{magnitude:b}"),
        8 => format!("{magnitude:o}"),
        16 => format!("{magnitude:x}"),
        _ => magnitude.to_string(),
    };
    let digits = match spec.grouping {
        Some(sep) => group_digits(&digits, if radix == 10 { 3 } else { 4 }, sep),
        None => digits,
    };
    finish_number(n < 0, digits, spec)
}

/// Float formatting for the `f`, `e`, `g` and `%` families and for no type at all.
///
/// With neither a type nor a precision the digits are those of `repr()`.
pub fn format_float(f: f64, spec: &ParsedFormatSpec) -> String {
    let negative = f.is_sign_negative() && !f.is_nan();
    let magnitude = f.abs();
    let upper = matches!(spec.type_char, Some('F' | 'E' | 'G'));
    let body = if !magnitude.is_finite() {
        let word = if magnitude.is_nan() { "nan" } else { "inf" };
        let word = if upper { word.to_uppercase() } else { word.to_owned() };
        if spec.type_char == Some('%') { format!("{word}%") } else { word }
    } else {
        let body = match (spec.type_char, spec.precision) {
            (None, None) => float_repr(magnitude),
            (Some('f' | 'F'), precision) => format!("{magnitude:.*}", precision.unwrap_or(6)),
            (Some('e' | 'E'), precision) => exponent_form(magnitude, precision.unwrap_or(6)),
            (Some('%'), precision) => format!("{:.*}%", precision.unwrap_or(6), magnitude * 100.0),
            (_, precision) => general_form(magnitude, precision.unwrap_or(6)),
        };
        let body = match spec.grouping {
            Some(sep) => group_integer_part(&body, sep),
            None => body,
        };
        if upper { body.to_uppercase() } else { body }
    };
    finish_number(negative, body, spec)
}

/// `d.ddde+XX`, the exponent always signed and at least two digits.
fn exponent_form(magnitude: f64, precision: usize) -> String {
    let raw = format!("{magnitude:.precision$e}");
    fix_exponent(&raw)
}

/// The `g` presentation: exponent form when the decimal exponent is below -4 or
/// at least the precision, fixed otherwise, with insignificant zeros removed.
fn general_form(magnitude: f64, precision: usize) -> String {
    let precision = precision.max(1);
    if magnitude == 0.0 {
        return "0".to_owned();
    }
    // round first so 9.9999995 with precision 6 picks the exponent of 10.0
    let rounded = format!("{magnitude:.*e}", precision - 1);
    let exponent: i64 = rounded
        .split_once('e')
        .and_then(|(_, exp)| exp.parse().ok())
        .unwrap_or(0);
    let limit = i64::try_from(precision).unwrap_or(i64::MAX);
    if exponent < -4 || exponent >= limit {
        let (mantissa, exp) = rounded.split_once('e').unwrap_or((&rounded, "0"));
        fix_exponent(&format!("{}e{exp}", strip_trailing_zeros(mantissa)))
    } else {
        let decimals = usize::try_from(limit - 1 - exponent).unwrap_or(0);
        strip_trailing_zeros(&format!("{magnitude:.decimals$}"))
    }
}

/// Adds the sign and pads to the width; numbers are right-aligned by default.
///
/// Zero padding (or `=` alignment) goes between the sign and the digits.
fn finish_number(negative: bool, body: String, spec: &ParsedFormatSpec) -> String {
    let sign = match (negative, spec.sign) {
        (true, _) => "-",
        (false, Some('+')) => "+",
        (false, Some(' ')) => " ",
        _ => "",
    };
    let align = spec.align.unwrap_or(if spec.zero_pad { '=' } else { '>' });
    if align == '=' {
        let fill = if spec.zero_pad && spec.align.is_none() { '0' } else { spec.fill };
        let used = sign.len() + body.chars().count();
        let padding: String = std::iter::repeat_n(fill, spec.width.saturating_sub(used)).collect();
        format!("{sign}{padding}{body}")
    } else {
        pad_string(&format!("{sign}{body}"), spec.width, align, spec.fill)
    }
}

fn pad_string(value: &str, width: usize, align: char, fill: char) -> String {
    let padding = width.saturating_sub(value.chars().count());
    if padding == 0 {
        return value.to_owned();
    }
    let (left, right) = match align {
        '<' => (0, padding),
        '^' => (padding / 2, padding - padding / 2),
        _ => (padding, 0),
    };
    let mut out = String::with_capacity(value.len() + padding);
    out.extend(std::iter::repeat_n(fill, left));
    out.push_str(value);
    out.extend(std::iter::repeat_n(fill, right));
    out
}

/// Inserts `sep` every `size` digits counting from the right.
fn group_digits(digits: &str, size: usize, sep: char) -> String {
    let count = digits.chars().count();
    let mut out = String::with_capacity(digits.len() + count / size);
    for (index, c) in digits.chars().enumerate() {
        if index > 0 && (count - index) % size == 0 {
            out.push(sep);
        }
        out.push(c);
    }
    out
}

/// Groups the digits before the decimal point, leaving the fraction and any
/// exponent or `%` suffix untouched.
fn group_integer_part(body: &str, sep: char) -> String {
    let end = body.find(|c: char| !c.is_ascii_digit()).unwrap_or(body.len());
    let (int_part, rest) = body.split_at(end);
    format!("{}{rest}", group_digits(int_part, 3, sep))
}

fn strip_trailing_zeros(s: &str) -> String {
    if !s.contains('.') {
        return s.to_owned();
    }
    s.trim_end_matches('0').trim_end_matches('.').to_owned()
}

/// Rewrites Rust's `e3` / `e-3` exponents as `e+03` / `e-03`.
fn fix_exponent(s: &str) -> String {
    let Some((mantissa, exp)) = s.split_once(['e', 'E']) else {
        return s.to_owned();
    };
    let (sign, digits) = match exp.strip_prefix('-') {
        Some(digits) => ('-', digits),
        None => ('+', exp.strip_prefix('+').unwrap_or(exp)),
    };
    format!("{mantissa}e{sign}{digits:0>2}")
}
