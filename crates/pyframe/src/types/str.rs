use std::{fmt::Write, rc::Rc};

use strum::{Display, EnumString, IntoStaticStr};

use crate::{
    args::ArgValues,
    exceptions::{ExcType, RunResult},
    types::{
        Type,
        slice::{Subscript, normalize_index},
    },
    value::Value,
};

/// Methods available on `str` values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, IntoStaticStr)]
#[strum(serialize_all = "lowercase")]
pub enum StrMethod {
    Upper,
    Lower,
    Strip,
    Lstrip,
    Rstrip,
    Split,
    Join,
    Startswith,
    Endswith,
    Replace,
    Find,
    Count,
}

/// Returns the Python `repr()` of a string, choosing quotes the way CPython does.
#[must_use]
pub fn string_repr(s: &str) -> String {
    let quote = if s.contains('\'') && !s.contains('"') { '"' } else { '\'' };
    let mut out = String::with_capacity(s.len() + 2);
    out.push(quote);
    for c in s.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            c if c == quote => {
                out.push('\\');
                out.push(c);
            }
            c if c.is_control() => push_escape(&mut out, c),
            c => out.push(c),
        }
    }
    out.push(quote);
    out
}

/// Escapes every non-ASCII character, as `ascii()` does to a repr.
#[must_use]
pub fn ascii_escape(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        if c.is_ascii() {
            out.push(c);
        } else {
            push_escape(&mut out, c);
        }
    }
    out
}

fn push_escape(out: &mut String, c: char) {
    let code = u32::from(c);
    // writing to a String cannot fail
    let _ = if code < 0x100 {
        write!(out, "\\x{code:02x}")
    } else if code < 0x10000 {
        write!(out, "\\u{code:04x}")
    } else {
        write!(out, "\\U{code:08x}")
    };
}

/// Implements `s[key]` for an integer index or a slice.
pub(crate) fn getitem(s: &str, key: &Value) -> RunResult<Value> {
    match Subscript::from_key(key, Type::Str)? {
        Subscript::Index(index) => {
            let len = s.chars().count();
            normalize_index(index, len)
                .and_then(|position| s.chars().nth(position))
                .map(|c| Value::from(c.to_string()))
                .ok_or_else(|| ExcType::index_error("string index out of range"))
        }
        Subscript::Slice(slice) => {
            let chars: Vec<char> = s.chars().collect();
            let out: String = slice.positions(chars.len())?.into_iter().map(|i| chars[i]).collect();
            Ok(Value::from(out))
        }
    }
}

fn str_arg(value: &Value, method: &str) -> RunResult<Rc<str>> {
    match value {
        Value::Str(s) => Ok(Rc::clone(s)),
        other => Err(ExcType::type_error(format!(
            "{method}() argument must be str, not {}",
            other.py_type()
        ))),
    }
}

/// Calls a `str` method on `s`.
pub(crate) fn call_method(s: &Rc<str>, method: StrMethod, args: ArgValues) -> RunResult<Value> {
    let name: &'static str = method.into();
    match method {
        StrMethod::Upper => {
            args.check_zero_args("str.upper")?;
            Ok(Value::from(s.to_uppercase()))
        }
        StrMethod::Lower => {
            args.check_zero_args("str.lower")?;
            Ok(Value::from(s.to_lowercase()))
        }
        StrMethod::Strip | StrMethod::Lstrip | StrMethod::Rstrip => {
            let chars = match args.get_zero_one_arg(name)? {
                None | Some(Value::None) => None,
                Some(other) => Some(str_arg(&other, name)?),
            };
            let matches = |c: char| chars.as_ref().map_or(c.is_whitespace(), |set| set.contains(c));
            let out = match method {
                StrMethod::Lstrip => s.trim_start_matches(matches),
                StrMethod::Rstrip => s.trim_end_matches(matches),
                _ => s.trim_matches(matches),
            };
            Ok(Value::from(out))
        }
        StrMethod::Split => {
            let args = args.into_positional("split")?;
            if args.len() > 2 {
                return Err(ExcType::type_error_at_most("split", 2, args.len()));
            }
            let sep = match args.first() {
                None | Some(Value::None) => None,
                Some(other) => Some(str_arg(other, "split")?),
            };
            let maxsplit = match args.get(1) {
                None => -1,
                Some(value) => value
                    .as_int()
                    .ok_or_else(|| ExcType::type_error_not_integer(value.py_type()))?,
            };
            let parts = split(s, sep.as_deref(), maxsplit)?;
            Ok(Value::new_list(parts.into_iter().map(Value::from).collect()))
        }
        StrMethod::Join => {
            let iterable = args.get_one_arg("str.join")?;
            let items = iterable
                .collect_values()
                .map_err(|_| ExcType::type_error("can only join an iterable"))?;
            let mut out = String::new();
            for (index, item) in items.iter().enumerate() {
                let Value::Str(part) = item else {
                    return Err(ExcType::type_error(format!(
                        "sequence item {index}: expected str instance, {} found",
                        item.py_type()
                    )));
                };
                if index > 0 {
                    out.push_str(s);
                }
                out.push_str(part);
            }
            Ok(Value::from(out))
        }
        StrMethod::Startswith | StrMethod::Endswith => {
            let affix = args.get_one_arg(name)?;
            let candidates = match &affix {
                Value::Str(one) => vec![Rc::clone(one)],
                Value::Tuple(items) => items
                    .iter()
                    .map(|item| str_arg(item, name))
                    .collect::<RunResult<Vec<_>>>()?,
                other => {
                    return Err(ExcType::type_error(format!(
                        "{name} first arg must be str or a tuple of str, not {}",
                        other.py_type()
                    )));
                }
            };
            let found = candidates.iter().any(|c| {
                if method == StrMethod::Startswith {
                    s.starts_with(c.as_ref())
                } else {
                    s.ends_with(c.as_ref())
                }
            });
            Ok(Value::Bool(found))
        }
        StrMethod::Replace => {
            let args = args.into_positional("replace")?;
            let (old, new, count) = match args.as_slice() {
                [old, new] => (old, new, -1),
                [old, new, count] => (
                    old,
                    new,
                    count
                        .as_int()
                        .ok_or_else(|| ExcType::type_error_not_integer(count.py_type()))?,
                ),
                _ => return Err(ExcType::type_error_arg_count("replace", 2, args.len())),
            };
            let (old, new) = (str_arg(old, "replace")?, str_arg(new, "replace")?);
            let out = match usize::try_from(count) {
                Ok(count) => s.replacen(old.as_ref(), &new, count),
                Err(_) => s.replace(old.as_ref(), &new),
            };
            Ok(Value::from(out))
        }
        StrMethod::Find => {
            let sub = str_arg(&args.get_one_arg("find")?, "find")?;
            let position = s
                .find(sub.as_ref())
                .map_or(-1, |byte_index| s[..byte_index].chars().count() as i64);
            Ok(Value::Int(position))
        }
        StrMethod::Count => {
            let sub = str_arg(&args.get_one_arg("count")?, "count")?;
            Ok(Value::Int(s.matches(sub.as_ref()).count() as i64))
        }
    }
}

fn split(s: &str, sep: Option<&str>, maxsplit: i64) -> RunResult<Vec<String>> {
    let limit = usize::try_from(maxsplit).ok();
    match sep {
        Some("") => Err(ExcType::value_error("empty separator")),
        Some(sep) => Ok(match limit {
            Some(limit) => s.splitn(limit + 1, sep).map(str::to_owned).collect(),
            None => s.split(sep).map(str::to_owned).collect(),
        }),
        None => {
            let mut parts = Vec::new();
            let mut rest = s.trim_start();
            while !rest.is_empty() {
                if limit.is_some_and(|limit| parts.len() == limit) {
                    parts.push(rest.to_owned());
                    break;
                }
                let end = rest.find(char::is_whitespace).unwrap_or(rest.len());
                parts.push(rest[..end].to_owned());
                rest = rest[end..].trim_start();
            }
            Ok(parts)
        }
    }
}
