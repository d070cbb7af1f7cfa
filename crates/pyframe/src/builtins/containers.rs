//! Implementation of the list(), tuple(), dict() and set() constructors.

use crate::{
    args::ArgValues,
    exceptions::{ExcType, RunResult},
    types::{Dict, Set, dict::mapping_pairs},
    value::Value,
};

pub fn builtin_list(args: ArgValues) -> RunResult<Value> {
    let items = match args.get_zero_one_arg("list")? {
        Some(iterable) => iterable.collect_values()?,
        None => Vec::new(),
    };
    Ok(Value::new_list(items))
}

pub fn builtin_tuple(args: ArgValues) -> RunResult<Value> {
    match args.get_zero_one_arg("tuple")? {
        Some(tuple @ Value::Tuple(_)) => Ok(tuple),
        Some(iterable) => Ok(Value::new_tuple(iterable.collect_values()?)),
        None => Ok(Value::new_tuple(Vec::new())),
    }
}

pub fn builtin_set(args: ArgValues) -> RunResult<Value> {
    let set = match args.get_zero_one_arg("set")? {
        Some(iterable) => Set::from_values(iterable.collect_values()?)?,
        None => Set::new(),
    };
    Ok(Value::new_set(set))
}

/// `dict()`, `dict(mapping_or_pairs)` and `dict(**kwargs)`, keywords applied last.
pub fn builtin_dict(args: ArgValues) -> RunResult<Value> {
    let (positional, kwargs) = args.into_parts();
    let mut dict = match positional.as_slice() {
        [] => Dict::new(),
        [source] => Dict::from_pairs(mapping_pairs(source)?)?,
        _ => return Err(ExcType::type_error_at_most("dict", 1, positional.len())),
    };
    for (key, value) in kwargs {
        dict.set(Value::Str(key), value)?;
    }
    Ok(Value::new_dict(dict))
}
