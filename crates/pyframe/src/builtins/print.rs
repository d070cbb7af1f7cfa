//! Implementation of the print() builtin function.

use crate::{
    args::{ArgValues, KwargsValues},
    exceptions::{ExcType, RunResult},
    io::PrintWriter,
    value::Value,
};

/// Implementation of the print() builtin function.
///
/// Supports the following keyword arguments:
/// - `sep`: separator between values (default: " ")
/// - `end`: string appended after the last value (default: "\n")
/// - `flush`: accepted and ignored
///
/// The `file` kwarg is not supported.
pub fn builtin_print(writer: &mut dyn PrintWriter, args: ArgValues) -> RunResult<Value> {
    let (positional, kwargs) = args.into_parts();
    let (sep, end) = extract_print_kwargs(kwargs)?;

    let mut iter = positional.iter();
    if let Some(value) = iter.next() {
        writer.stdout_write(value.py_str().into());
        for value in iter {
            match &sep {
                Some(sep) => writer.stdout_write(sep.as_str().into()),
                None => writer.stdout_push(' '),
            }
            writer.stdout_write(value.py_str().into());
        }
    }

    match end {
        Some(end) => writer.stdout_write(end.into()),
        None => writer.stdout_push('\n'),
    }
    Ok(Value::None)
}

/// Extracts `sep` and `end`; `None` means the default.
fn extract_print_kwargs(kwargs: KwargsValues) -> RunResult<(Option<String>, Option<String>)> {
    let mut sep = None;
    let mut end = None;
    for (key, value) in kwargs {
        match &*key {
            "sep" => sep = string_kwarg(&value, "sep")?,
            "end" => end = string_kwarg(&value, "end")?,
            "flush" => {}
            "file" => return Err(ExcType::type_error("print() 'file' argument is not supported")),
            other => return Err(ExcType::type_error_invalid_kwarg("print", other)),
        }
    }
    Ok((sep, end))
}

/// The kwarg can be None (the default) or a string.
fn string_kwarg(value: &Value, name: &str) -> RunResult<Option<String>> {
    match value {
        Value::None => Ok(None),
        Value::Str(s) => Ok(Some(s.to_string())),
        other => Err(ExcType::type_error(format!(
            "{name} must be None or a string, not {}",
            other.py_type()
        ))),
    }
}
