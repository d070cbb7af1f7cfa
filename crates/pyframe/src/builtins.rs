//! Built-in functions and exception types.
//!
//! This module contains the `Builtins` enum representing every callable that is
//! available without a definition (print, len, str, etc.), and [`default_scope`],
//! the builtin scope handed to frames when the embedder doesn't supply one.

mod abs;
mod containers;
mod min_max;
mod namespace;
mod next;
mod number;
mod print;
mod sorted;
mod sum;

use std::{rc::Rc, str::FromStr};

use strum::{Display, EnumIter, EnumString, IntoEnumIterator, IntoStaticStr};

use crate::{
    args::ArgValues,
    bytecode::Context,
    exceptions::{ExcType, RunResult, SimpleException},
    namespace::{Namespace, Scope},
    types::{Range, Type},
    value::Value,
};

/// A builtin callable: either a function or an exception type constructor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Builtins {
    Function(BuiltinsFunctions),
    /// An exception type constructor like `ValueError`, `TypeError`, etc.
    ExcType(ExcType),
}

impl Builtins {
    /// Calls this builtin with the given arguments.
    ///
    /// `ctx` supplies the print writer and, for builtins that take a `key`
    /// function, the means to call back into user code.
    pub fn call(self, ctx: &mut Context<'_>, args: ArgValues) -> RunResult<Value> {
        match self {
            Self::Function(function) => function.call(ctx, args),
            Self::ExcType(exc_type) => new_exception(exc_type, args),
        }
    }

    #[must_use]
    pub fn py_repr(self) -> String {
        match self {
            Self::Function(function) => format!("<built-in function {function}>"),
            Self::ExcType(exc_type) => format!("<class '{exc_type}'>"),
        }
    }

    #[must_use]
    pub fn py_type(self) -> Type {
        match self {
            Self::Function(_) => Type::BuiltinFunction,
            Self::ExcType(_) => Type::Type,
        }
    }
}

impl FromStr for Builtins {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if let Ok(function) = BuiltinsFunctions::from_str(s) {
            Ok(Self::Function(function))
        } else if let Ok(exc_type) = ExcType::from_str(s) {
            Ok(Self::ExcType(exc_type))
        } else {
            Err(())
        }
    }
}

/// Every interpreter-native builtin function.
///
/// All variants serialize to lowercase (e.g., `Print` -> "print").
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, EnumIter, IntoStaticStr)]
#[strum(serialize_all = "lowercase")]
pub enum BuiltinsFunctions {
    Print,
    Len,
    Range,
    Str,
    Repr,
    Ascii,
    Int,
    Float,
    Bool,
    List,
    Tuple,
    Dict,
    Set,
    Abs,
    Min,
    Max,
    Sum,
    Sorted,
    Iter,
    Next,
    Namespace,
}

impl BuiltinsFunctions {
    fn call(self, ctx: &mut Context<'_>, args: ArgValues) -> RunResult<Value> {
        match self {
            Self::Print => print::builtin_print(&mut *ctx.print_writer, args),
            Self::Len => {
                let value = args.get_one_arg("len")?;
                match value.py_len() {
                    Some(len) => Ok(Value::Int(len as i64)),
                    None => Err(ExcType::type_error(format!(
                        "object of type '{}' has no len()",
                        value.py_type()
                    ))),
                }
            }
            Self::Range => Range::init(args),
            Self::Str => Ok(match args.get_zero_one_arg("str")? {
                Some(value @ Value::Str(_)) => value,
                Some(value) => Value::from(value.py_str()),
                None => Value::from(""),
            }),
            Self::Repr => Ok(Value::from(args.get_one_arg("repr")?.py_repr())),
            Self::Ascii => Ok(Value::from(args.get_one_arg("ascii")?.py_ascii())),
            Self::Int => number::builtin_int(args),
            Self::Float => number::builtin_float(args),
            Self::Bool => Ok(Value::Bool(
                args.get_zero_one_arg("bool")?.is_some_and(|value| value.py_bool()),
            )),
            Self::List => containers::builtin_list(args),
            Self::Tuple => containers::builtin_tuple(args),
            Self::Dict => containers::builtin_dict(args),
            Self::Set => containers::builtin_set(args),
            Self::Abs => abs::builtin_abs(args),
            Self::Min => min_max::builtin_min_max(ctx, args, true),
            Self::Max => min_max::builtin_min_max(ctx, args, false),
            Self::Sum => sum::builtin_sum(args),
            Self::Sorted => sorted::builtin_sorted(ctx, args),
            Self::Iter => args.get_one_arg("iter")?.py_iter(),
            Self::Next => next::builtin_next(args),
            Self::Namespace => namespace::builtin_namespace(args),
        }
    }
}

/// `ValueError("msg")` and friends: at most one argument, kept as the message.
fn new_exception(exc_type: ExcType, args: ArgValues) -> RunResult<Value> {
    let name: &'static str = exc_type.into();
    let exc = match args.get_zero_one_arg(name)? {
        None => SimpleException::new_none(exc_type),
        Some(Value::Str(msg)) => SimpleException::new_msg(exc_type, msg),
        Some(other) => SimpleException::new(exc_type, Some(other.py_str())),
    };
    Ok(Value::new_exception(exc))
}

/// Builds a fresh builtin scope holding every builtin function and exception type.
#[must_use]
pub fn default_scope() -> Scope {
    let mut namespace = Namespace::new();
    for function in BuiltinsFunctions::iter() {
        let name: &'static str = function.into();
        namespace.set(Rc::from(name), Value::Builtin(Builtins::Function(function)));
    }
    for exc_type in ExcType::iter() {
        let name: &'static str = exc_type.into();
        namespace.set(Rc::from(name), Value::Builtin(Builtins::ExcType(exc_type)));
    }
    Scope::new(namespace)
}
