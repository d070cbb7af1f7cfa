use std::fmt;

use crate::exceptions::ExcType;

/// Represents the Python type of a value.
///
/// Used for type checking and for the type names that appear in error messages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Type {
    NoneType,
    Bool,
    Int,
    Float,
    Str,
    List,
    Tuple,
    Dict,
    Set,
    Range,
    Slice,
    Iterator,
    Function,
    BuiltinFunction,
    Type,
    Namespace,
    Code,
    Exception(ExcType),
}

impl Type {
    /// Checks if a value of type `self` is an instance of `other`.
    ///
    /// `bool` is a subtype of `int` (so `isinstance(True, int)` holds).
    #[must_use]
    pub fn is_instance_of(self, other: Self) -> bool {
        self == other || (self == Self::Bool && other == Self::Int)
    }

    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            Self::NoneType => "NoneType",
            Self::Bool => "bool",
            Self::Int => "int",
            Self::Float => "float",
            Self::Str => "str",
            Self::List => "list",
            Self::Tuple => "tuple",
            Self::Dict => "dict",
            Self::Set => "set",
            Self::Range => "range",
            Self::Slice => "slice",
            Self::Iterator => "iterator",
            Self::Function => "function",
            Self::BuiltinFunction => "builtin_function_or_method",
            Self::Type => "type",
            Self::Namespace => "types.SimpleNamespace",
            Self::Code => "code",
            Self::Exception(exc_type) => exc_type.into(),
        }
    }
}

impl fmt::Display for Type {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
