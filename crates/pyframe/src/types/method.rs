use std::str::FromStr;

use crate::{
    args::ArgValues,
    exceptions::{RunError, RunResult},
    types::{
        dict::{self, DictMethod},
        list::{self, ListMethod},
        set::{self, SetMethod},
        str::{self as string, StrMethod},
    },
    value::Value,
};

/// A builtin method of one of the container or string types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Method {
    List(ListMethod),
    Dict(DictMethod),
    Set(SetMethod),
    Str(StrMethod),
}

impl Method {
    /// Looks up the method called `name` on `receiver`'s type.
    #[must_use]
    pub fn lookup(receiver: &Value, name: &str) -> Option<Self> {
        match receiver {
            Value::List(_) => ListMethod::from_str(name).ok().map(Self::List),
            Value::Dict(_) => DictMethod::from_str(name).ok().map(Self::Dict),
            Value::Set(_) => SetMethod::from_str(name).ok().map(Self::Set),
            Value::Str(_) => StrMethod::from_str(name).ok().map(Self::Str),
            _ => None,
        }
    }

    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            Self::List(m) => m.into(),
            Self::Dict(m) => m.into(),
            Self::Set(m) => m.into(),
            Self::Str(m) => m.into(),
        }
    }
}

/// A method bound to its receiver, the result of `obj.method` attribute access.
#[derive(Debug, Clone)]
pub struct BoundMethod {
    receiver: Value,
    method: Method,
}

impl BoundMethod {
    #[must_use]
    pub fn new(receiver: Value, method: Method) -> Self {
        Self { receiver, method }
    }

    #[must_use]
    pub fn receiver(&self) -> &Value {
        &self.receiver
    }

    pub fn call(&self, args: ArgValues) -> RunResult<Value> {
        match (&self.receiver, self.method) {
            (Value::List(l), Method::List(m)) => list::call_method(l, m, args),
            (Value::Dict(d), Method::Dict(m)) => dict::call_method(d, m, args),
            (Value::Set(s), Method::Set(m)) => set::call_method(s, m, args),
            (Value::Str(s), Method::Str(m)) => string::call_method(s, m, args),
            _ => Err(RunError::internal("method bound to a receiver of the wrong type")),
        }
    }

    #[must_use]
    pub fn py_repr(&self) -> String {
        format!(
            "<built-in method {} of {} object>",
            self.method.name(),
            self.receiver.py_type()
        )
    }
}
