//! Iterator support for `GET_ITER` / `FOR_ITER` and for constructors.
//!
//! `ForIterator` stores iteration state (an index plus the iterated container)
//! rather than a Rust iterator, so the container can be borrowed afresh on every
//! step and mutation during iteration is observed the way Python observes it.

use std::{cell::RefCell, rc::Rc};

use crate::{
    exceptions::{ExcType, RunResult, SimpleException},
    types::{Dict, List, Range, Set},
    value::Value,
};

/// Iterator state for Python for loops.
///
/// Contains the current iteration index and the type-specific iteration data.
#[derive(Debug)]
pub struct ForIterator {
    /// Current iteration index, shared across all iterator types.
    index: usize,
    /// Type-specific iteration data.
    iter_value: ForIterValue,
}

/// Type-specific iteration data for different Python iterable types.
#[derive(Debug)]
enum ForIterValue {
    /// Iterating over a Range, yields `Value::Int`.
    Range(Range),
    /// Unlike dict, list mutation during iteration is allowed in Python - the iterator
    /// checks the current list length on each iteration (not a captured snapshot).
    List(List),
    /// Tuples are immutable so no length check is needed.
    Tuple(Rc<[Value]>),
    /// Yields keys. Checks `len` against current dict size to detect mutation.
    DictKeys { dict: Rc<RefCell<Dict>>, len: usize },
    /// Yields single-char strings, walking the string by byte offset.
    Str { string: Rc<str>, byte_offset: usize },
    /// Checks `len` against current set size to detect mutation.
    Set { set: Rc<RefCell<Set>>, len: usize },
}

impl ForIterator {
    /// Creates a new ForIterator over `value`.
    ///
    /// Fails with `TypeError` if the value is not iterable.
    pub fn new(value: &Value) -> RunResult<Self> {
        let iter_value = match value {
            Value::Range(range) => ForIterValue::Range(*range),
            Value::List(list) => ForIterValue::List(Rc::clone(list)),
            Value::Tuple(items) => ForIterValue::Tuple(Rc::clone(items)),
            Value::Str(string) => ForIterValue::Str {
                string: Rc::clone(string),
                byte_offset: 0,
            },
            Value::Dict(dict) => ForIterValue::DictKeys {
                dict: Rc::clone(dict),
                len: dict.borrow().len(),
            },
            Value::Set(set) => ForIterValue::Set {
                set: Rc::clone(set),
                len: set.borrow().len(),
            },
            other => return Err(ExcType::type_error_not_iterable(other.py_type())),
        };
        Ok(Self { index: 0, iter_value })
    }

    /// Advances the iterator, returning `None` on exhaustion.
    ///
    /// Dict and set iteration fails with `RuntimeError` if the container changed size.
    pub fn for_next(&mut self) -> RunResult<Option<Value>> {
        let next = match &mut self.iter_value {
            ForIterValue::Range(range) => (self.index < range.len()).then(|| Value::Int(range.item(self.index))),
            ForIterValue::List(list) => list.borrow().get(self.index).cloned(),
            ForIterValue::Tuple(items) => items.get(self.index).cloned(),
            ForIterValue::Str { string, byte_offset } => {
                let next = string[*byte_offset..].chars().next();
                next.map(|c| {
                    *byte_offset += c.len_utf8();
                    Value::from(c.to_string())
                })
            }
            ForIterValue::DictKeys { dict, len } => {
                let dict = dict.borrow();
                if dict.len() != *len {
                    return Err(changed_size("dictionary"));
                }
                dict.key_at(self.index)
            }
            ForIterValue::Set { set, len } => {
                let set = set.borrow();
                if set.len() != *len {
                    return Err(changed_size("Set"));
                }
                set.item_at(self.index)
            }
        };
        if next.is_some() {
            self.index += 1;
        }
        Ok(next)
    }

    /// Drains the remaining items into a Vec.
    pub fn collect(&mut self) -> RunResult<Vec<Value>> {
        let mut items = Vec::new();
        while let Some(item) = self.for_next()? {
            items.push(item);
        }
        Ok(items)
    }

    /// Short type name used in the iterator's repr, e.g. `list_iterator`.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self.iter_value {
            ForIterValue::Range(_) => "range_iterator",
            ForIterValue::List(_) => "list_iterator",
            ForIterValue::Tuple(_) => "tuple_iterator",
            ForIterValue::DictKeys { .. } => "dict_keyiterator",
            ForIterValue::Str { .. } => "str_iterator",
            ForIterValue::Set { .. } => "set_iterator",
        }
    }
}

fn changed_size(container: &str) -> crate::exceptions::RunError {
    SimpleException::new_msg(
        ExcType::RuntimeError,
        format!("{container} changed size during iteration"),
    )
    .into()
}
