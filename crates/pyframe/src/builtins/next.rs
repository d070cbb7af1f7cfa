//! Implementation of the next() builtin function.

use crate::{
    args::ArgValues,
    exceptions::{ExcType, RunResult, SimpleException},
    value::Value,
};

/// `next(iterator[, default])`: exhaustion returns `default` or raises `StopIteration`.
pub fn builtin_next(args: ArgValues) -> RunResult<Value> {
    let (iterator, default) = args.get_one_two_args("next")?;
    match (iterator.py_next()?, default) {
        (Some(item), _) => Ok(item),
        (None, Some(default)) => Ok(default),
        (None, None) => Err(SimpleException::new_none(ExcType::StopIteration).into()),
    }
}
