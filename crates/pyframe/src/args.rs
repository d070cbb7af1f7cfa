use std::rc::Rc;

use crate::{
    exceptions::{ExcType, RunResult},
    value::Value,
};

/// Keyword arguments in call order, as `(name, value)` pairs.
pub type KwargsValues = Vec<(Rc<str>, Value)>;

/// Arguments passed to a callable.
///
/// Uses specific variants for common cases (0-2 positional arguments, no keywords).
/// Most builtin and method calls take at most 2 arguments, so this avoids
/// a Vec allocation for the vast majority of calls.
#[derive(Debug, Clone, Default)]
pub enum ArgValues {
    #[default]
    Empty,
    One(Value),
    Two(Value, Value),
    ArgsKargs { args: Vec<Value>, kwargs: KwargsValues },
}

impl ArgValues {
    /// Builds the argument structure from positional and keyword arguments.
    #[must_use]
    pub fn new(args: Vec<Value>, kwargs: KwargsValues) -> Self {
        if !kwargs.is_empty() || args.len() > 2 {
            return Self::ArgsKargs { args, kwargs };
        }
        let mut iter = args.into_iter();
        match (iter.next(), iter.next()) {
            (Some(first), Some(second)) => Self::Two(first, second),
            (Some(first), None) => Self::One(first),
            _ => Self::Empty,
        }
    }

    /// Splits the arguments into positional and keyword parts.
    #[must_use]
    pub fn into_parts(self) -> (Vec<Value>, KwargsValues) {
        match self {
            Self::Empty => (Vec::new(), Vec::new()),
            Self::One(a) => (vec![a], Vec::new()),
            Self::Two(a1, a2) => (vec![a1, a2], Vec::new()),
            Self::ArgsKargs { args, kwargs } => (args, kwargs),
        }
    }

    /// Returns the number of arguments, positional and keyword.
    #[must_use]
    pub fn count(&self) -> usize {
        match self {
            Self::Empty => 0,
            Self::One(_) => 1,
            Self::Two(_, _) => 2,
            Self::ArgsKargs { args, kwargs } => args.len() + kwargs.len(),
        }
    }

    fn has_kwargs(&self) -> bool {
        matches!(self, Self::ArgsKargs { kwargs, .. } if !kwargs.is_empty())
    }

    /// Checks that zero arguments were passed.
    pub fn check_zero_args(&self, name: &str) -> RunResult<()> {
        match self {
            Self::Empty => Ok(()),
            _ => Err(ExcType::type_error_no_args(name, self.count())),
        }
    }

    /// Checks that exactly one argument was passed, returning it.
    pub fn get_one_arg(self, name: &str) -> RunResult<Value> {
        if self.has_kwargs() {
            return Err(ExcType::type_error_no_kwargs(name));
        }
        match self {
            Self::One(a) => Ok(a),
            _ => Err(ExcType::type_error_arg_count(name, 1, self.count())),
        }
    }

    /// Checks that exactly two arguments were passed, returning them as a tuple.
    pub fn get_two_args(self, name: &str) -> RunResult<(Value, Value)> {
        if self.has_kwargs() {
            return Err(ExcType::type_error_no_kwargs(name));
        }
        match self {
            Self::Two(a1, a2) => Ok((a1, a2)),
            _ => Err(ExcType::type_error_arg_count(name, 2, self.count())),
        }
    }

    /// Checks that zero or one arguments were passed.
    pub fn get_zero_one_arg(self, name: &str) -> RunResult<Option<Value>> {
        if self.has_kwargs() {
            return Err(ExcType::type_error_no_kwargs(name));
        }
        match self {
            Self::Empty => Ok(None),
            Self::One(a) => Ok(Some(a)),
            _ => Err(ExcType::type_error_at_most(name, 1, self.count())),
        }
    }

    /// Checks that one or two arguments were passed, returning them as a tuple.
    pub fn get_one_two_args(self, name: &str) -> RunResult<(Value, Option<Value>)> {
        if self.has_kwargs() {
            return Err(ExcType::type_error_no_kwargs(name));
        }
        match self {
            Self::One(a) => Ok((a, None)),
            Self::Two(a1, a2) => Ok((a1, Some(a2))),
            Self::Empty => Err(ExcType::type_error_at_least(name, 1, 0)),
            Self::ArgsKargs { args, .. } => Err(ExcType::type_error_at_most(name, 2, args.len())),
        }
    }

    /// Returns the positional arguments, rejecting any keyword argument.
    pub fn into_positional(self, name: &str) -> RunResult<Vec<Value>> {
        if self.has_kwargs() {
            return Err(ExcType::type_error_no_kwargs(name));
        }
        Ok(self.into_parts().0)
    }
}
