//! Function creation and call opcodes.

use std::rc::Rc;

use indexmap::IndexMap;
use tracing::debug;

use super::{Context, Frame};
use crate::{
    args::{ArgValues, KwargsValues},
    exceptions::{ExcType, RunResult},
    function::Function,
    value::Value,
};

/// `MAKE_FUNCTION` flag bits.
const HAS_DEFAULTS: u32 = 0x01;
const HAS_KWDEFAULTS: u32 = 0x02;
const HAS_ANNOTATIONS: u32 = 0x04;
const HAS_CLOSURE: u32 = 0x08;

/// Calls any callable value.
///
/// User functions run a nested frame to completion before this returns.
pub(crate) fn call_value(ctx: &mut Context<'_>, callee: &Value, args: ArgValues) -> RunResult<Value> {
    match callee {
        Value::Function(function) => function.call(ctx, args),
        Value::Builtin(builtin) => builtin.call(ctx, args),
        Value::BoundMethod(method) => method.call(args),
        other => Err(ExcType::type_error_not_callable(other.py_type())),
    }
}

impl Frame {
    /// `MAKE_FUNCTION(flags)`: qualified name on top, then the code object, then the
    /// optional parts selected by `flags`, highest bit nearest the top.
    ///
    /// The new function captures a snapshot of this frame's locals.
    pub(super) fn make_function(&mut self, flags: u32) -> RunResult<()> {
        let qualname = self.pop()?;
        let code = match self.pop()? {
            Value::Code(code) => code,
            other => {
                return Err(ExcType::malformed_operand(format!(
                    "MAKE_FUNCTION expects a code object, got {}",
                    other.py_type()
                )));
            }
        };
        if flags & HAS_CLOSURE != 0 {
            return Err(ExcType::not_implemented("MAKE_FUNCTION with closure cells"));
        }
        if flags & HAS_ANNOTATIONS != 0 {
            self.pop()?;
        }
        let kwdefaults = if flags & HAS_KWDEFAULTS != 0 {
            kwdefaults_from_value(&self.pop()?)?
        } else {
            code.kwdefaults
                .iter()
                .map(|(name, value)| (Rc::from(name.as_str()), value.to_value()))
                .collect()
        };
        let defaults = if flags & HAS_DEFAULTS != 0 {
            match self.pop()? {
                Value::Tuple(items) => items.to_vec(),
                other => {
                    return Err(ExcType::malformed_operand(format!(
                        "MAKE_FUNCTION defaults must be a tuple, got {}",
                        other.py_type()
                    )));
                }
            }
        } else {
            code.defaults.iter().map(|c| c.to_value()).collect()
        };
        let name: Rc<str> = match qualname {
            Value::Str(name) => name,
            _ => Rc::from(code.name.as_str()),
        };
        debug!(function = %name, flags, "make function");

        let function = Function::new(
            name,
            code,
            defaults,
            kwdefaults,
            self.locals.snapshot(),
            self.globals.downgrade(),
            self.builtins.clone(),
        )?;
        self.push(Value::Function(Rc::new(function)));
        Ok(())
    }

    /// `CALL_FUNCTION(argc)`: `argc` positional arguments above the callee.
    pub(super) fn call_function(&mut self, ctx: &mut Context<'_>, argc: usize) -> RunResult<()> {
        let args = self.popn(argc)?;
        let callee = self.pop()?;
        let result = call_value(ctx, &callee, ArgValues::new(args, Vec::new()))?;
        self.push(result);
        Ok(())
    }

    /// `CALL_FUNCTION_KW(argc)`: a tuple of keyword names on top of `argc` values,
    /// the last of which are the keyword values.
    pub(super) fn call_function_kw(&mut self, ctx: &mut Context<'_>, argc: usize) -> RunResult<()> {
        let names = match self.pop()? {
            Value::Tuple(names) => names,
            other => {
                return Err(ExcType::malformed_operand(format!(
                    "CALL_FUNCTION_KW expects a tuple of names, got {}",
                    other.py_type()
                )));
            }
        };
        let Some(positional) = argc.checked_sub(names.len()) else {
            return Err(ExcType::malformed_operand(format!(
                "CALL_FUNCTION_KW({argc}) with {} keyword names",
                names.len()
            )));
        };
        let mut args = self.popn(argc)?;
        let values = args.split_off(positional);
        let mut kwargs: KwargsValues = Vec::with_capacity(values.len());
        for (name, value) in names.iter().zip(values) {
            match name {
                Value::Str(name) => kwargs.push((Rc::clone(name), value)),
                _ => return Err(ExcType::type_error("keywords must be strings")),
            }
        }
        let callee = self.pop()?;
        let result = call_value(ctx, &callee, ArgValues::new(args, kwargs))?;
        self.push(result);
        Ok(())
    }

    /// `CALL_FUNCTION_EX(flags)`: `f(*args)` or, with bit 0 set, `f(*args, **kwargs)`.
    pub(super) fn call_function_ex(&mut self, ctx: &mut Context<'_>, flags: u32) -> RunResult<()> {
        let kwargs = if flags & 0x01 != 0 {
            kwargs_from_mapping(&self.pop()?)?
        } else {
            Vec::new()
        };
        let iterable = self.pop()?;
        let callee = self.pop()?;
        let args = match &iterable {
            Value::Tuple(items) => items.to_vec(),
            other => other.collect_values().map_err(|_| {
                ExcType::type_error(format!(
                    "argument after * must be an iterable, not {}",
                    other.py_type()
                ))
            })?,
        };
        let result = call_value(ctx, &callee, ArgValues::new(args, kwargs))?;
        self.push(result);
        Ok(())
    }

    /// `LOAD_METHOD(name)`: replaces the receiver with its bound attribute, or with
    /// [`Value::Undefined`] when it has no such attribute.
    pub(super) fn load_method(&mut self, name: &Rc<str>) -> RunResult<()> {
        let receiver = self.pop()?;
        let method = receiver.py_getattr(name)?.unwrap_or(Value::Undefined);
        self.push(method);
        Ok(())
    }

    /// `CALL_METHOD(argc)`: calls the result of `LOAD_METHOD`; a missing method
    /// yields `None` without calling anything.
    pub(super) fn call_method(&mut self, ctx: &mut Context<'_>, argc: usize) -> RunResult<()> {
        let args = self.popn(argc)?;
        let callee = self.pop()?;
        let result = match callee {
            Value::Undefined => Value::None,
            callee => call_value(ctx, &callee, ArgValues::new(args, Vec::new()))?,
        };
        self.push(result);
        Ok(())
    }
}

/// Reads a keyword-defaults dict whose keys must all be strings.
fn kwdefaults_from_value(value: &Value) -> RunResult<IndexMap<Rc<str>, Value>> {
    Ok(kwargs_from_mapping(value)?.into_iter().collect())
}

fn kwargs_from_mapping(value: &Value) -> RunResult<KwargsValues> {
    let Value::Dict(dict) = value else {
        return Err(ExcType::type_error(format!(
            "argument after ** must be a mapping, not {}",
            value.py_type()
        )));
    };
    dict.borrow()
        .iter()
        .map(|(key, value)| match key {
            Value::Str(name) => Ok((Rc::clone(name), value.clone())),
            _ => Err(ExcType::type_error("keywords must be strings")),
        })
        .collect()
}
