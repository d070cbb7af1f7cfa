use std::{borrow::Cow, fmt};

use serde::{Deserialize, Serialize};
use strum::{Display, EnumIter, EnumString, IntoStaticStr};

use crate::types::{Type, str::string_repr};

/// Result type alias for operations that can produce a runtime error.
pub type RunResult<T> = Result<T, RunError>;

/// Python exception types supported by the interpreter.
///
/// Uses strum derives for automatic `Display`, `FromStr`, and `Into<&'static str>` implementations.
/// The string representation matches the variant name exactly (e.g., `ValueError` -> "ValueError").
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, EnumIter, IntoStaticStr, Serialize, Deserialize,
)]
pub enum ExcType {
    /// Base class for all the other exception types.
    Exception,
    AssertionError,
    AttributeError,
    ImportError,
    IndexError,
    KeyError,
    ModuleNotFoundError,
    NameError,
    NotImplementedError,
    OverflowError,
    RecursionError,
    RuntimeError,
    StopIteration,
    TypeError,
    UnboundLocalError,
    ValueError,
    ZeroDivisionError,
}

/// Machine-readable reason attached to `TypeError`s raised by argument binding
/// and by `DICT_MERGE`.
///
/// The message carries the CPython wording; the reason lets callers match on the
/// failure without parsing text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, IntoStaticStr, Serialize, Deserialize)]
#[strum(serialize_all = "snake_case")]
pub enum ErrorReason {
    TooManyPositional,
    TooManyKeyword,
    MultipleValuesForArgument,
    MissingPositionalArgument,
    MissingKeywordOnlyArgument,
    PositionalOnlyPassedAsKeyword,
    MergeConflict,
}

/// Simple lightweight representation of an exception.
///
/// This is used for performance reasons for common exception patterns.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimpleException {
    exc_type: ExcType,
    arg: Option<String>,
    reason: Option<ErrorReason>,
}

impl fmt::Display for SimpleException {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.arg {
            Some(arg) => write!(f, "{}: {arg}", self.exc_type),
            None => write!(f, "{}", self.exc_type),
        }
    }
}

impl SimpleException {
    /// Creates a new exception with the given type and optional argument message.
    #[must_use]
    pub fn new(exc_type: ExcType, arg: Option<String>) -> Self {
        Self {
            exc_type,
            arg,
            reason: None,
        }
    }

    /// Creates a new exception with the given type and argument message.
    #[must_use]
    pub fn new_msg(exc_type: ExcType, arg: impl fmt::Display) -> Self {
        Self::new(exc_type, Some(arg.to_string()))
    }

    /// Creates a new exception with the given type and no argument message.
    #[must_use]
    pub fn new_none(exc_type: ExcType) -> Self {
        Self::new(exc_type, None)
    }

    /// Attaches a machine-readable reason to the exception.
    #[must_use]
    pub fn with_reason(mut self, reason: ErrorReason) -> Self {
        self.reason = Some(reason);
        self
    }

    #[must_use]
    pub fn exc_type(&self) -> ExcType {
        self.exc_type
    }

    #[must_use]
    pub fn arg(&self) -> Option<&str> {
        self.arg.as_deref()
    }

    #[must_use]
    pub fn reason(&self) -> Option<ErrorReason> {
        self.reason
    }

    /// `repr()` of the exception, e.g. `ValueError('bad value')`.
    #[must_use]
    pub fn py_repr(&self) -> String {
        match &self.arg {
            Some(arg) => format!("{}({})", self.exc_type, string_repr(arg)),
            None => format!("{}()", self.exc_type),
        }
    }

    /// `str()` of the exception: the message, or an empty string.
    #[must_use]
    pub fn py_str(&self) -> String {
        self.arg.clone().unwrap_or_default()
    }
}

/// Runtime error types that can occur during execution.
///
/// Either an interpreter-level failure (a bug, or a malformed instruction stream that
/// escaped decoding) or a Python exception raised by the running program.
#[derive(Debug, Clone, PartialEq)]
pub enum RunError {
    /// Internal interpreter error, e.g. operand stack underflow.
    Internal(Cow<'static, str>),
    /// Python exception propagating out of the running frame.
    Exc(SimpleException),
}

impl fmt::Display for RunError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Internal(msg) => write!(f, "internal error: {msg}"),
            Self::Exc(exc) => write!(f, "{exc}"),
        }
    }
}

impl std::error::Error for RunError {}

impl From<SimpleException> for RunError {
    fn from(exc: SimpleException) -> Self {
        Self::Exc(exc)
    }
}

impl RunError {
    /// Creates an internal error with the given message.
    #[must_use]
    pub fn internal(msg: impl Into<Cow<'static, str>>) -> Self {
        Self::Internal(msg.into())
    }

    /// The Python exception type, `None` for internal errors.
    #[must_use]
    pub fn exc_type(&self) -> Option<ExcType> {
        match self {
            Self::Exc(exc) => Some(exc.exc_type()),
            Self::Internal(_) => None,
        }
    }

    /// The machine-readable reason, if the error carries one.
    #[must_use]
    pub fn reason(&self) -> Option<ErrorReason> {
        match self {
            Self::Exc(exc) => exc.reason(),
            Self::Internal(_) => None,
        }
    }
}

impl ExcType {
    /// Creates a NameError for accessing an undefined variable.
    ///
    /// Matches CPython's format: `NameError: name 'x' is not defined`
    #[must_use]
    pub(crate) fn name_error(name: &str) -> RunError {
        SimpleException::new_msg(Self::NameError, format!("name '{name}' is not defined")).into()
    }

    /// Creates an UnboundLocalError for accessing a local variable before assignment.
    ///
    /// Matches CPython 3.10's format:
    /// `UnboundLocalError: local variable 'x' referenced before assignment`
    #[must_use]
    pub(crate) fn unbound_local_error(name: &str) -> RunError {
        SimpleException::new_msg(
            Self::UnboundLocalError,
            format!("local variable '{name}' referenced before assignment"),
        )
        .into()
    }

    /// Creates an AttributeError for a missing attribute.
    ///
    /// Matches CPython's format: `AttributeError: 'list' object has no attribute 'foo'`
    #[must_use]
    pub(crate) fn attribute_error(type_: Type, attr: &str) -> RunError {
        SimpleException::new_msg(
            Self::AttributeError,
            format!("'{type_}' object has no attribute '{attr}'"),
        )
        .into()
    }

    /// Creates a ModuleNotFoundError for a module missing from the module table.
    ///
    /// Matches CPython's format: `ModuleNotFoundError: No module named 'x'`
    #[must_use]
    pub(crate) fn module_not_found(name: &str) -> RunError {
        SimpleException::new_msg(Self::ModuleNotFoundError, format!("No module named '{name}'")).into()
    }

    #[must_use]
    pub(crate) fn import_error(msg: impl fmt::Display) -> RunError {
        SimpleException::new_msg(Self::ImportError, msg).into()
    }

    /// Creates a NotImplementedError for an opcode the interpreter recognises but does not run.
    #[must_use]
    pub(crate) fn not_implemented(feature: impl fmt::Display) -> RunError {
        SimpleException::new_msg(Self::NotImplementedError, format!("{feature} is not supported")).into()
    }

    /// Creates a ValueError for an operand that cannot be decoded or applied.
    #[must_use]
    pub(crate) fn malformed_operand(msg: impl fmt::Display) -> RunError {
        SimpleException::new_msg(Self::ValueError, msg).into()
    }

    /// Creates a KeyError carrying the repr of the missing key, as CPython does.
    #[must_use]
    pub(crate) fn key_error(key_repr: impl fmt::Display) -> RunError {
        SimpleException::new_msg(Self::KeyError, key_repr).into()
    }

    #[must_use]
    pub(crate) fn type_error(msg: impl fmt::Display) -> RunError {
        SimpleException::new_msg(Self::TypeError, msg).into()
    }

    #[must_use]
    pub(crate) fn value_error(msg: impl fmt::Display) -> RunError {
        SimpleException::new_msg(Self::ValueError, msg).into()
    }

    #[must_use]
    pub(crate) fn index_error(msg: impl fmt::Display) -> RunError {
        SimpleException::new_msg(Self::IndexError, msg).into()
    }

    #[must_use]
    pub(crate) fn overflow_error(msg: impl fmt::Display) -> RunError {
        SimpleException::new_msg(Self::OverflowError, msg).into()
    }

    #[must_use]
    pub(crate) fn zero_division(msg: &'static str) -> RunError {
        SimpleException::new_msg(Self::ZeroDivisionError, msg).into()
    }

    #[must_use]
    pub(crate) fn recursion_error() -> RunError {
        SimpleException::new_msg(Self::RecursionError, "maximum recursion depth exceeded").into()
    }

    #[must_use]
    pub(crate) fn type_error_not_sub(type_: Type) -> RunError {
        Self::type_error(format!("'{type_}' object is not subscriptable"))
    }

    /// Matches CPython's format: `TypeError: '{type}' object does not support item assignment`
    #[must_use]
    pub(crate) fn type_error_not_sub_assignment(type_: Type) -> RunError {
        Self::type_error(format!("'{type_}' object does not support item assignment"))
    }

    /// Matches CPython's format: `TypeError: '{type}' object doesn't support item deletion`
    #[must_use]
    pub(crate) fn type_error_not_sub_deletion(type_: Type) -> RunError {
        Self::type_error(format!("'{type_}' object doesn't support item deletion"))
    }

    /// Matches CPython's format: `TypeError: unhashable type: 'list'`
    #[must_use]
    pub(crate) fn type_error_unhashable(type_: Type) -> RunError {
        Self::type_error(format!("unhashable type: '{type_}'"))
    }

    #[must_use]
    pub(crate) fn type_error_not_iterable(type_: Type) -> RunError {
        Self::type_error(format!("'{type_}' object is not iterable"))
    }

    #[must_use]
    pub(crate) fn type_error_not_callable(type_: Type) -> RunError {
        Self::type_error(format!("'{type_}' object is not callable"))
    }

    /// Matches CPython's format: `TypeError: '{type}' object cannot be interpreted as an integer`
    #[must_use]
    pub(crate) fn type_error_not_integer(type_: Type) -> RunError {
        Self::type_error(format!("'{type_}' object cannot be interpreted as an integer"))
    }

    /// Matches CPython's format: `TypeError: list indices must be integers or slices, not str`
    #[must_use]
    pub(crate) fn type_error_indices(container: Type, index_type: Type) -> RunError {
        Self::type_error(format!("{container} indices must be integers or slices, not {index_type}"))
    }

    /// Creates a TypeError for when a function receives the wrong number of arguments.
    ///
    /// Matches CPython's error format exactly:
    /// - For 1 expected arg: `{name}() takes exactly one argument ({actual} given)`
    /// - For N expected args: `{name} expected {expected} arguments, got {actual}`
    #[must_use]
    pub(crate) fn type_error_arg_count(name: &str, expected: usize, actual: usize) -> RunError {
        if expected == 1 {
            Self::type_error(format!("{name}() takes exactly one argument ({actual} given)"))
        } else {
            Self::type_error(format!("{name} expected {expected} arguments, got {actual}"))
        }
    }

    /// Matches CPython's format: `{name}() takes no arguments ({actual} given)`
    #[must_use]
    pub(crate) fn type_error_no_args(name: &str, actual: usize) -> RunError {
        Self::type_error(format!("{name}() takes no arguments ({actual} given)"))
    }

    /// Matches CPython's format: `{name} expected at least {min} argument, got {actual}`
    #[must_use]
    pub(crate) fn type_error_at_least(name: &str, min: usize, actual: usize) -> RunError {
        Self::type_error(format!("{name} expected at least {min} argument, got {actual}"))
    }

    /// Matches CPython's format: `{name} expected at most {max} arguments, got {actual}`
    #[must_use]
    pub(crate) fn type_error_at_most(name: &str, max: usize, actual: usize) -> RunError {
        Self::type_error(format!("{name} expected at most {max} arguments, got {actual}"))
    }

    /// Matches CPython's format: `{name}() takes no keyword arguments`
    #[must_use]
    pub(crate) fn type_error_no_kwargs(name: &str) -> RunError {
        Self::type_error(format!("{name}() takes no keyword arguments"))
    }

    /// Matches CPython's format: `'{key}' is an invalid keyword argument for {name}()`
    #[must_use]
    pub(crate) fn type_error_invalid_kwarg(name: &str, key: &str) -> RunError {
        Self::type_error(format!("'{key}' is an invalid keyword argument for {name}()"))
    }

    /// Creates a TypeError for unsupported binary operations.
    ///
    /// For `+` or `+=` with str/list on the left side, uses CPython's special format:
    /// `can only concatenate {type} (not "{other}") to {type}`
    ///
    /// For other cases, uses the generic format:
    /// `unsupported operand type(s) for {op}: '{left}' and '{right}'`
    #[must_use]
    pub(crate) fn binary_type_error(op: &str, lhs_type: Type, rhs_type: Type) -> RunError {
        let message = if (op == "+" || op == "+=") && (lhs_type == Type::Str || lhs_type == Type::List) {
            format!("can only concatenate {lhs_type} (not \"{rhs_type}\") to {lhs_type}")
        } else {
            format!("unsupported operand type(s) for {op}: '{lhs_type}' and '{rhs_type}'")
        };
        Self::type_error(message)
    }

    /// Uses CPython's format: `bad operand type for unary {op}: '{type}'`
    #[must_use]
    pub(crate) fn unary_type_error(op: &str, value_type: Type) -> RunError {
        Self::type_error(format!("bad operand type for unary {op}: '{value_type}'"))
    }

    /// Uses CPython's format: `'<' not supported between instances of 'int' and 'str'`
    #[must_use]
    pub(crate) fn compare_type_error(op: &str, lhs_type: Type, rhs_type: Type) -> RunError {
        Self::type_error(format!(
            "'{op}' not supported between instances of '{lhs_type}' and '{rhs_type}'"
        ))
    }

    // ============================================================================
    // Argument binding
    // ============================================================================

    /// Creates a TypeError for too many positional arguments.
    ///
    /// Matches CPython's format:
    /// - `f() takes 2 positional arguments but 3 were given`
    /// - `f() takes from 1 to 2 positional arguments but 3 were given`
    /// - `f() takes 1 positional argument but 2 positional arguments (and 1 keyword-only argument) were given`
    #[must_use]
    pub(crate) fn type_error_too_many_positional(
        name: &str,
        min: usize,
        max: usize,
        actual: usize,
        kwonly_given: usize,
    ) -> RunError {
        let takes = if min == max {
            let plural = if max == 1 { "" } else { "s" };
            format!("{max} positional argument{plural}")
        } else {
            format!("from {min} to {max} positional arguments")
        };
        let given = if kwonly_given > 0 {
            let pos_plural = if actual == 1 { "" } else { "s" };
            let kw_plural = if kwonly_given == 1 { "" } else { "s" };
            format!(
                "{actual} positional argument{pos_plural} (and {kwonly_given} keyword-only argument{kw_plural}) were given"
            )
        } else {
            let verb = if actual == 1 { "was" } else { "were" };
            format!("{actual} {verb} given")
        };
        binding_error(
            ErrorReason::TooManyPositional,
            format!("{name}() takes {takes} but {given}"),
        )
    }

    /// Matches CPython's format: `f() got an unexpected keyword argument 'x'`
    #[must_use]
    pub(crate) fn type_error_unexpected_keyword(name: &str, key: &str) -> RunError {
        binding_error(
            ErrorReason::TooManyKeyword,
            format!("{name}() got an unexpected keyword argument '{key}'"),
        )
    }

    /// Matches CPython's format: `f() got multiple values for argument 'a'`
    #[must_use]
    pub(crate) fn type_error_duplicate_arg(name: &str, param: &str) -> RunError {
        binding_error(
            ErrorReason::MultipleValuesForArgument,
            format!("{name}() got multiple values for argument '{param}'"),
        )
    }

    /// Matches CPython's format:
    /// `f() got some positional-only arguments passed as keyword arguments: 'a, b'`
    #[must_use]
    pub(crate) fn type_error_positional_only(name: &str, params: &[&str]) -> RunError {
        binding_error(
            ErrorReason::PositionalOnlyPassedAsKeyword,
            format!(
                "{name}() got some positional-only arguments passed as keyword arguments: '{}'",
                params.join(", ")
            ),
        )
    }

    /// Matches CPython's format:
    /// - `f() missing 1 required positional argument: 'a'`
    /// - `f() missing 2 required positional arguments: 'a' and 'b'`
    #[must_use]
    pub(crate) fn type_error_missing_positional_with_names(name: &str, missing: &[&str]) -> RunError {
        binding_error(
            ErrorReason::MissingPositionalArgument,
            missing_message(name, "positional", missing),
        )
    }

    /// Matches CPython's format: `f() missing 1 required keyword-only argument: 'd'`
    #[must_use]
    pub(crate) fn type_error_missing_kwonly_with_names(name: &str, missing: &[&str]) -> RunError {
        binding_error(
            ErrorReason::MissingKeywordOnlyArgument,
            missing_message(name, "keyword-only", missing),
        )
    }

    /// Raised by `DICT_MERGE` when `**mapping` repeats a keyword.
    ///
    /// Matches CPython's format: `f() got multiple values for keyword argument 'a'`
    #[must_use]
    pub(crate) fn type_error_merge_conflict(key_repr: &str) -> RunError {
        binding_error(
            ErrorReason::MergeConflict,
            format!("got multiple values for keyword argument {key_repr}"),
        )
    }
}

fn binding_error(reason: ErrorReason, msg: String) -> RunError {
    SimpleException::new_msg(ExcType::TypeError, msg)
        .with_reason(reason)
        .into()
}

fn missing_message(name: &str, kind: &str, missing: &[&str]) -> String {
    let count = missing.len();
    let plural = if count == 1 { "" } else { "s" };
    format!(
        "{name}() missing {count} required {kind} argument{plural}: {}",
        format_param_names(missing)
    )
}

/// Formats a list of parameter names the way CPython does: `'a'`, `'a' and 'b'`,
/// `'a', 'b', and 'c'`.
fn format_param_names(names: &[&str]) -> String {
    match names {
        [] => String::new(),
        [one] => format!("'{one}'"),
        [first, second] => format!("'{first}' and '{second}'"),
        [init @ .., last] => {
            let head: Vec<String> = init.iter().map(|n| format!("'{n}'")).collect();
            format!("{}, and '{last}'", head.join(", "))
        }
    }
}
