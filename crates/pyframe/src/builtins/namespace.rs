//! Implementation of the namespace() builtin function.

use crate::{
    args::ArgValues,
    exceptions::{ExcType, RunResult},
    types::SimpleNamespace,
    value::Value,
};

/// `namespace(**kwargs)`: an attribute bag initialised from the keyword arguments.
pub fn builtin_namespace(args: ArgValues) -> RunResult<Value> {
    let (positional, kwargs) = args.into_parts();
    if !positional.is_empty() {
        return Err(ExcType::type_error("namespace() takes no positional arguments"));
    }
    let mut namespace = SimpleNamespace::new();
    for (name, value) in kwargs {
        namespace.set(name, value);
    }
    Ok(Value::new_namespace(namespace))
}
