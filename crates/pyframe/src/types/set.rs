use std::{cell::RefCell, rc::Rc};

use indexmap::IndexSet;
use strum::{Display, EnumString, IntoStaticStr};

use crate::{
    args::ArgValues,
    exceptions::{ExcType, RunResult},
    types::dict::HashKey,
    value::Value,
};

/// Python set, iterated in insertion order.
#[derive(Debug, Clone, Default)]
pub struct Set {
    items: IndexSet<HashKey, ahash::RandomState>,
}

impl Set {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_values(values: impl IntoIterator<Item = Value>) -> RunResult<Self> {
        let mut set = Self::new();
        for value in values {
            set.add(value)?;
        }
        Ok(set)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.items.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn add(&mut self, value: Value) -> RunResult<()> {
        self.items.insert(HashKey::new(value)?);
        Ok(())
    }

    /// Removes `value`, returning whether it was present.
    pub fn discard(&mut self, value: &Value) -> RunResult<bool> {
        let key = HashKey::new(value.clone())?;
        Ok(self.items.shift_remove(&key))
    }

    pub fn contains(&self, value: &Value) -> RunResult<bool> {
        let key = HashKey::new(value.clone())?;
        Ok(self.items.contains(&key))
    }

    pub fn clear(&mut self) {
        self.items.clear();
    }

    #[must_use]
    pub fn item_at(&self, index: usize) -> Option<Value> {
        self.items.get_index(index).map(|key| key.value().clone())
    }

    pub fn iter(&self) -> impl Iterator<Item = &Value> {
        self.items.iter().map(HashKey::value)
    }

    #[must_use]
    pub fn values(&self) -> Vec<Value> {
        self.iter().cloned().collect()
    }

    #[must_use]
    pub fn union(&self, other: &Self) -> Self {
        Self {
            items: self.items.union(&other.items).cloned().collect(),
        }
    }

    #[must_use]
    pub fn intersection(&self, other: &Self) -> Self {
        Self {
            items: self.items.intersection(&other.items).cloned().collect(),
        }
    }

    #[must_use]
    pub fn difference(&self, other: &Self) -> Self {
        Self {
            items: self.items.difference(&other.items).cloned().collect(),
        }
    }

    #[must_use]
    pub fn symmetric_difference(&self, other: &Self) -> Self {
        Self {
            items: self.items.symmetric_difference(&other.items).cloned().collect(),
        }
    }

    #[must_use]
    pub fn is_subset(&self, other: &Self) -> bool {
        self.items.is_subset(&other.items)
    }

    #[must_use]
    pub fn py_eq(&self, other: &Self) -> bool {
        self.len() == other.len() && self.is_subset(other)
    }
}

/// Methods available on `set` values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, IntoStaticStr)]
#[strum(serialize_all = "lowercase")]
pub enum SetMethod {
    Add,
    Discard,
    Remove,
    Pop,
    Update,
    Copy,
    Clear,
}

/// Calls a `set` method on `set`.
pub(crate) fn call_method(set: &Rc<RefCell<Set>>, method: SetMethod, args: ArgValues) -> RunResult<Value> {
    match method {
        SetMethod::Add => {
            let item = args.get_one_arg("set.add")?;
            set.borrow_mut().add(item)?;
        }
        SetMethod::Discard => {
            let item = args.get_one_arg("set.discard")?;
            set.borrow_mut().discard(&item)?;
        }
        SetMethod::Remove => {
            let item = args.get_one_arg("set.remove")?;
            if !set.borrow_mut().discard(&item)? {
                return Err(ExcType::key_error(item.py_repr()));
            }
        }
        SetMethod::Pop => {
            args.check_zero_args("set.pop")?;
            let popped = set.borrow_mut().items.pop();
            return popped
                .map(HashKey::into_value)
                .ok_or_else(|| ExcType::key_error("'pop from an empty set'"));
        }
        SetMethod::Update => {
            let sources = args.into_positional("update")?;
            for source in sources {
                // collect first, `s.update(s)` is legal
                let values = source.collect_values()?;
                let mut target = set.borrow_mut();
                for value in values {
                    target.add(value)?;
                }
            }
        }
        SetMethod::Copy => {
            args.check_zero_args("set.copy")?;
            return Ok(Value::new_set(set.borrow().clone()));
        }
        SetMethod::Clear => {
            args.check_zero_args("set.clear")?;
            set.borrow_mut().clear();
        }
    }
    Ok(Value::None)
}
