use std::rc::Rc;

use indexmap::IndexMap;

use crate::value::Value;

/// A plain attribute bag, the value produced by the `namespace(**kwargs)` builtin.
#[derive(Debug, Clone, Default)]
pub struct SimpleNamespace {
    attrs: IndexMap<Rc<str>, Value>,
}

impl SimpleNamespace {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn get(&self, name: &str) -> Option<Value> {
        self.attrs.get(name).cloned()
    }

    pub fn set(&mut self, name: Rc<str>, value: Value) {
        self.attrs.insert(name, value);
    }

    pub fn remove(&mut self, name: &str) -> Option<Value> {
        self.attrs.shift_remove(name)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&Rc<str>, &Value)> {
        self.attrs.iter()
    }

    #[must_use]
    pub fn py_eq(&self, other: &Self) -> bool {
        self.attrs.len() == other.attrs.len()
            && self
                .attrs
                .iter()
                .all(|(name, value)| other.attrs.get(name).is_some_and(|v| value.py_eq(v)))
    }
}
