//! Implementation of the abs() builtin function.

use crate::{
    args::ArgValues,
    exceptions::{ExcType, RunResult},
    value::Value,
};

pub fn builtin_abs(args: ArgValues) -> RunResult<Value> {
    match args.get_one_arg("abs")? {
        Value::Int(i) => i
            .checked_abs()
            .map(Value::Int)
            .ok_or_else(|| ExcType::overflow_error("integer overflow in abs()")),
        Value::Bool(b) => Ok(Value::Int(i64::from(b))),
        Value::Float(f) => Ok(Value::Float(f.abs())),
        other => Err(ExcType::type_error(format!(
            "bad operand type for abs(): '{}'",
            other.py_type()
        ))),
    }
}
