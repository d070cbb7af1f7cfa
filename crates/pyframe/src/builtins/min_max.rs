//! Implementation of the min() and max() builtin functions.

use std::cmp::Ordering;

use crate::{
    args::ArgValues,
    bytecode::{Context, call_value},
    exceptions::{ExcType, RunResult},
    value::Value,
};

/// `min(iterable, *, key=None, default=...)` or `min(a, b, *args, key=None)`, and the
/// same for `max()`.
///
/// Ties keep the first candidate, like CPython.
pub fn builtin_min_max(ctx: &mut Context<'_>, args: ArgValues, is_min: bool) -> RunResult<Value> {
    let name = if is_min { "min" } else { "max" };
    let (positional, kwargs) = args.into_parts();
    let mut key = None;
    let mut default = None;
    for (kwarg, value) in kwargs {
        match &*kwarg {
            "key" => key = Some(value).filter(|key| !matches!(key, Value::None)),
            "default" => default = Some(value),
            other => return Err(ExcType::type_error_invalid_kwarg(name, other)),
        }
    }

    let candidates = match positional.len() {
        0 => {
            return Err(ExcType::type_error(format!(
                "{name} expected at least 1 argument, got 0"
            )));
        }
        1 => positional[0].collect_values()?,
        _ if default.is_some() => {
            return Err(ExcType::type_error(format!(
                "Cannot specify a default for {name}() with multiple positional arguments"
            )));
        }
        _ => positional,
    };

    let mut best: Option<(Value, Value)> = None;
    for item in candidates {
        let item_key = match &key {
            Some(key) => call_value(ctx, key, ArgValues::One(item.clone()))?,
            None => item.clone(),
        };
        let replace = match &best {
            None => true,
            Some((_, best_key)) => beats(&item_key, best_key, is_min)?,
        };
        if replace {
            best = Some((item, item_key));
        }
    }

    match (best, default) {
        (Some((item, _)), _) => Ok(item),
        (None, Some(default)) => Ok(default),
        (None, None) => Err(ExcType::value_error(format!("{name}() arg is an empty sequence"))),
    }
}

/// Whether `candidate` strictly beats `current`.
fn beats(candidate: &Value, current: &Value, is_min: bool) -> RunResult<bool> {
    let (op, wanted) = if is_min { ("<", Ordering::Less) } else { (">", Ordering::Greater) };
    match candidate.py_cmp(current) {
        Some(ordering) => Ok(ordering == wanted),
        // NaN never wins a comparison
        None if is_number(candidate) && is_number(current) => Ok(false),
        None => Err(ExcType::compare_type_error(op, candidate.py_type(), current.py_type())),
    }
}

fn is_number(value: &Value) -> bool {
    matches!(value, Value::Bool(_) | Value::Int(_) | Value::Float(_))
}
