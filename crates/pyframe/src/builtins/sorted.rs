//! Implementation of the sorted() builtin function.

use crate::{
    args::ArgValues,
    bytecode::{Context, call_value},
    exceptions::{ExcType, RunResult},
    types::list::{sort_order, sort_values},
    value::Value,
};

/// `sorted(iterable, /, *, key=None, reverse=False)`.
///
/// The sort is stable, and `reverse` keeps equal items in their original order.
pub fn builtin_sorted(ctx: &mut Context<'_>, args: ArgValues) -> RunResult<Value> {
    let (positional, kwargs) = args.into_parts();
    let mut key = None;
    let mut reverse = false;
    for (kwarg, value) in kwargs {
        match &*kwarg {
            "key" => key = Some(value).filter(|key| !matches!(key, Value::None)),
            "reverse" => reverse = value.py_bool(),
            other => return Err(ExcType::type_error_invalid_kwarg("sorted", other)),
        }
    }
    let [iterable]: [Value; 1] = positional
        .try_into()
        .map_err(|positional: Vec<Value>| ExcType::type_error_arg_count("sorted", 1, positional.len()))?;
    let mut items = iterable.collect_values()?;

    match key {
        None => sort_values(&mut items, reverse)?,
        Some(key) => {
            let mut keys = Vec::with_capacity(items.len());
            for item in &items {
                keys.push(call_value(ctx, &key, ArgValues::One(item.clone()))?);
            }
            let order = sort_order(&keys, reverse)?;
            let mut slots: Vec<Option<Value>> = items.into_iter().map(Some).collect();
            items = order.into_iter().filter_map(|position| slots[position].take()).collect();
        }
    }
    Ok(Value::new_list(items))
}
