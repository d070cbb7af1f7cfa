//! Implementation of the sum() builtin function.

use crate::{
    args::ArgValues,
    exceptions::{ExcType, RunResult},
    value::{BinaryOp, Value},
};

/// `sum(iterable, /, start=0)`, adding left to right onto `start`.
///
/// A str `start` is rejected the way CPython rejects it.
pub fn builtin_sum(args: ArgValues) -> RunResult<Value> {
    let (mut positional, kwargs) = args.into_parts();
    let mut start = None;
    for (key, value) in kwargs {
        match &*key {
            "start" if positional.len() < 2 => start = Some(value),
            "start" => return Err(ExcType::type_error("sum() got multiple values for argument 'start'")),
            other => return Err(ExcType::type_error_invalid_kwarg("sum", other)),
        }
    }
    match positional.len() {
        0 => return Err(ExcType::type_error_at_least("sum", 1, 0)),
        1 | 2 => {}
        n => return Err(ExcType::type_error_at_most("sum", 2, n)),
    }
    if positional.len() == 2 {
        start = positional.pop();
    }
    let iterable = positional.swap_remove(0);

    let mut total = start.unwrap_or(Value::Int(0));
    if matches!(total, Value::Str(_)) {
        return Err(ExcType::type_error("sum() can't sum strings [use ''.join(seq) instead]"));
    }
    for item in iterable.collect_values()? {
        total = match total.py_binary(BinaryOp::Add, &item)? {
            Some(sum) => sum,
            None => return Err(ExcType::binary_type_error("+", total.py_type(), item.py_type())),
        };
    }
    Ok(total)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ints(values: &[i64]) -> Value {
        Value::new_list(values.iter().map(|v| Value::Int(*v)).collect())
    }

    #[test]
    fn sums_numbers() {
        assert_eq!(builtin_sum(ArgValues::One(ints(&[1, 2, 3]))).unwrap().py_repr(), "6");
        assert_eq!(builtin_sum(ArgValues::One(ints(&[]))).unwrap().py_repr(), "0");
        let floats = Value::new_tuple(vec![Value::Float(0.5), Value::Int(1)]);
        assert_eq!(builtin_sum(ArgValues::One(floats)).unwrap().py_repr(), "1.5");
        let args = ArgValues::Two(ints(&[1]), Value::Int(10));
        assert_eq!(builtin_sum(args).unwrap().py_repr(), "11");
        let args = ArgValues::new(vec![ints(&[1])], vec![("start".into(), Value::Int(5))]);
        assert_eq!(builtin_sum(args).unwrap().py_repr(), "6");
    }

    #[test]
    fn sums_lists_with_list_start() {
        let nested = Value::new_list(vec![ints(&[1]), ints(&[2, 3])]);
        let summed = builtin_sum(ArgValues::Two(nested, ints(&[]))).unwrap();
        assert_eq!(summed.py_repr(), "[1, 2, 3]");
    }

    #[test]
    fn rejects_bad_operands() {
        let err = builtin_sum(ArgValues::One(Value::new_list(vec![Value::from("a")]))).unwrap_err();
        assert_eq!(
            err.to_string(),
            "TypeError: unsupported operand type(s) for +: 'int' and 'str'"
        );
        let err = builtin_sum(ArgValues::Two(ints(&[]), Value::from(""))).unwrap_err();
        assert_eq!(
            err.to_string(),
            "TypeError: sum() can't sum strings [use ''.join(seq) instead]"
        );
    }
}
