//! Name scopes: the local, global and builtin mappings a frame resolves names against.

use std::{
    cell::RefCell,
    fmt,
    rc::{Rc, Weak},
};

use ahash::AHashMap;

use crate::{
    exceptions::{RunError, RunResult},
    value::Value,
};

/// A mapping from unique names to values.
#[derive(Debug, Clone, Default)]
pub struct Namespace(AHashMap<Rc<str>, Value>);

impl Namespace {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.0.get(name)
    }

    pub fn set(&mut self, name: Rc<str>, value: Value) {
        self.0.insert(name, value);
    }

    pub fn remove(&mut self, name: &str) -> Option<Value> {
        self.0.remove(name)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&Rc<str>, &Value)> {
        self.0.iter()
    }
}

impl FromIterator<(Rc<str>, Value)> for Namespace {
    fn from_iter<I: IntoIterator<Item = (Rc<str>, Value)>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

/// A namespace shared by reference.
///
/// Global and builtin scopes are shared between every frame of a run, and the
/// module frame's local scope is the same `Scope` as its global one. Cloning a
/// `Scope` clones the reference.
#[derive(Clone, Default)]
pub struct Scope(Rc<RefCell<Namespace>>);

impl Scope {
    #[must_use]
    pub fn new(namespace: Namespace) -> Self {
        Self(Rc::new(RefCell::new(namespace)))
    }

    #[must_use]
    pub fn get(&self, name: &str) -> Option<Value> {
        self.0.borrow().get(name).cloned()
    }

    pub fn set(&self, name: Rc<str>, value: Value) {
        self.0.borrow_mut().set(name, value);
    }

    pub fn remove(&self, name: &str) -> Option<Value> {
        self.0.borrow_mut().remove(name)
    }

    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.0.borrow().get(name).is_some()
    }

    /// Copies the current bindings, used to capture a defining scope.
    #[must_use]
    pub fn snapshot(&self) -> Namespace {
        self.0.borrow().clone()
    }

    #[must_use]
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }

    #[must_use]
    pub fn downgrade(&self) -> WeakScope {
        WeakScope(Rc::downgrade(&self.0))
    }
}

impl fmt::Debug for Scope {
    // values may hold functions that refer back to this scope
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Scope({} names)", self.0.borrow().len())
    }
}

/// Non-owning handle to a global scope, held by function objects.
///
/// A module's functions live in its globals; a strong reference back would form a cycle.
#[derive(Clone)]
pub struct WeakScope(Weak<RefCell<Namespace>>);

impl WeakScope {
    pub fn upgrade(&self) -> RunResult<Scope> {
        self.0
            .upgrade()
            .map(Scope)
            .ok_or_else(|| RunError::internal("global scope of function no longer exists"))
    }
}

impl fmt::Debug for WeakScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("WeakScope")
    }
}
