use std::{
    cell::RefCell,
    hash::{Hash, Hasher},
    rc::Rc,
};

use indexmap::IndexMap;
use strum::{Display, EnumString, IntoStaticStr};

use crate::{
    args::ArgValues,
    exceptions::{ExcType, RunResult},
    value::Value,
};

/// A value that has been checked to be hashable, usable as a dict key or set element.
///
/// Hashing and equality follow Python: `1`, `1.0` and `True` are the same key.
#[derive(Debug, Clone)]
pub struct HashKey(Value);

impl HashKey {
    pub fn new(value: Value) -> RunResult<Self> {
        if value.is_hashable() {
            Ok(Self(value))
        } else {
            Err(ExcType::type_error_unhashable(value.py_type()))
        }
    }

    #[must_use]
    pub fn value(&self) -> &Value {
        &self.0
    }

    #[must_use]
    pub fn into_value(self) -> Value {
        self.0
    }
}

impl Hash for HashKey {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.0.hash_value(state);
    }
}

impl PartialEq for HashKey {
    fn eq(&self, other: &Self) -> bool {
        self.0.py_is(&other.0) || self.0.py_eq(&other.0)
    }
}

impl Eq for HashKey {}

/// Insertion-ordered Python dict.
#[derive(Debug, Clone, Default)]
pub struct Dict {
    map: IndexMap<HashKey, Value, ahash::RandomState>,
}

impl Dict {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a dict from key/value pairs; later duplicates overwrite earlier ones.
    pub fn from_pairs(pairs: impl IntoIterator<Item = (Value, Value)>) -> RunResult<Self> {
        let mut dict = Self::new();
        for (key, value) in pairs {
            dict.set(key, value)?;
        }
        Ok(dict)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.map.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    pub fn get(&self, key: &Value) -> RunResult<Option<Value>> {
        let key = HashKey::new(key.clone())?;
        Ok(self.map.get(&key).cloned())
    }

    pub fn contains_key(&self, key: &Value) -> RunResult<bool> {
        let key = HashKey::new(key.clone())?;
        Ok(self.map.contains_key(&key))
    }

    /// Inserts or overwrites; an existing key keeps its position and original key object.
    pub fn set(&mut self, key: Value, value: Value) -> RunResult<()> {
        self.map.insert(HashKey::new(key)?, value);
        Ok(())
    }

    /// Removes a key, preserving the order of the remaining entries.
    pub fn remove(&mut self, key: &Value) -> RunResult<Option<Value>> {
        let key = HashKey::new(key.clone())?;
        Ok(self.map.shift_remove(&key))
    }

    pub fn clear(&mut self) {
        self.map.clear();
    }

    /// Key at insertion position `index`, used by iterators.
    #[must_use]
    pub fn key_at(&self, index: usize) -> Option<Value> {
        self.map.get_index(index).map(|(key, _)| key.value().clone())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&Value, &Value)> {
        self.map.iter().map(|(key, value)| (key.value(), value))
    }

    #[must_use]
    pub fn keys(&self) -> Vec<Value> {
        self.map.keys().map(|key| key.value().clone()).collect()
    }

    #[must_use]
    pub fn values(&self) -> Vec<Value> {
        self.map.values().cloned().collect()
    }

    #[must_use]
    pub fn items(&self) -> Vec<(Value, Value)> {
        self.iter().map(|(k, v)| (k.clone(), v.clone())).collect()
    }

    /// Python dict equality: same keys mapping to equal values, order ignored.
    #[must_use]
    pub fn py_eq(&self, other: &Self) -> bool {
        self.len() == other.len()
            && self
                .map
                .iter()
                .all(|(key, value)| other.map.get(key).is_some_and(|v| value.py_eq(v)))
    }
}

/// Reads the key/value pairs out of a mapping, or out of an iterable of 2-item sequences.
///
/// This is what `dict(x)` and `dict.update(x)` accept.
pub fn mapping_pairs(source: &Value) -> RunResult<Vec<(Value, Value)>> {
    if let Value::Dict(dict) = source {
        return Ok(dict.borrow().items());
    }
    let items = source.collect_values()?;
    let mut pairs = Vec::with_capacity(items.len());
    for (index, item) in items.iter().enumerate() {
        let pair = item.collect_values().map_err(|_| {
            ExcType::type_error(format!(
                "cannot convert dictionary update sequence element #{index} to a sequence"
            ))
        })?;
        let [key, value]: [Value; 2] = pair.try_into().map_err(|pair: Vec<Value>| {
            ExcType::value_error(format!(
                "dictionary update sequence element #{index} has length {}; 2 is required",
                pair.len()
            ))
        })?;
        pairs.push((key, value));
    }
    Ok(pairs)
}

/// Methods available on `dict` values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, IntoStaticStr)]
#[strum(serialize_all = "lowercase")]
pub enum DictMethod {
    Get,
    Keys,
    Values,
    Items,
    Pop,
    Popitem,
    Update,
    Setdefault,
    Copy,
    Clear,
}

/// Calls a `dict` method on `dict`.
///
/// `keys()`, `values()` and `items()` return list snapshots rather than live views.
pub(crate) fn call_method(dict: &Rc<RefCell<Dict>>, method: DictMethod, args: ArgValues) -> RunResult<Value> {
    match method {
        DictMethod::Get => {
            let (key, default) = args.get_one_two_args("get")?;
            let found = dict.borrow().get(&key)?;
            Ok(found.or(default).unwrap_or(Value::None))
        }
        DictMethod::Keys => {
            args.check_zero_args("dict.keys")?;
            Ok(Value::new_list(dict.borrow().keys()))
        }
        DictMethod::Values => {
            args.check_zero_args("dict.values")?;
            Ok(Value::new_list(dict.borrow().values()))
        }
        DictMethod::Items => {
            args.check_zero_args("dict.items")?;
            let items = dict
                .borrow()
                .items()
                .into_iter()
                .map(|(k, v)| Value::new_tuple(vec![k, v]))
                .collect();
            Ok(Value::new_list(items))
        }
        DictMethod::Pop => {
            let (key, default) = args.get_one_two_args("pop")?;
            let removed = dict.borrow_mut().remove(&key)?;
            match (removed, default) {
                (Some(value), _) | (None, Some(value)) => Ok(value),
                (None, None) => Err(ExcType::key_error(key.py_repr())),
            }
        }
        DictMethod::Popitem => {
            args.check_zero_args("dict.popitem")?;
            let popped = dict.borrow_mut().map.pop();
            popped
                .map(|(key, value)| Value::new_tuple(vec![key.into_value(), value]))
                .ok_or_else(|| ExcType::key_error("'popitem(): dictionary is empty'"))
        }
        DictMethod::Update => {
            let (positional, kwargs) = args.into_parts();
            if positional.len() > 1 {
                return Err(ExcType::type_error_at_most("update", 1, positional.len()));
            }
            // read the source fully first, `d.update(d)` is legal
            let mut pairs = match positional.first() {
                Some(source) => mapping_pairs(source)?,
                None => Vec::new(),
            };
            pairs.extend(kwargs.into_iter().map(|(k, v)| (Value::Str(k), v)));
            let mut target = dict.borrow_mut();
            for (key, value) in pairs {
                target.set(key, value)?;
            }
            Ok(Value::None)
        }
        DictMethod::Setdefault => {
            let (key, default) = args.get_one_two_args("setdefault")?;
            if let Some(existing) = dict.borrow().get(&key)? {
                return Ok(existing);
            }
            let default = default.unwrap_or(Value::None);
            dict.borrow_mut().set(key, default.clone())?;
            Ok(default)
        }
        DictMethod::Copy => {
            args.check_zero_args("dict.copy")?;
            Ok(Value::new_dict(dict.borrow().clone()))
        }
        DictMethod::Clear => {
            args.check_zero_args("dict.clear")?;
            dict.borrow_mut().clear();
            Ok(Value::None)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn numeric_keys_collapse() {
        let mut dict = Dict::new();
        dict.set(Value::Int(1), Value::from("int")).unwrap();
        dict.set(Value::Float(1.0), Value::from("float")).unwrap();
        dict.set(Value::Bool(true), Value::from("bool")).unwrap();
        assert_eq!(dict.len(), 1);
        assert_eq!(dict.get(&Value::Int(1)).unwrap().unwrap().py_str(), "bool");
        // first key object is kept
        assert_eq!(dict.keys()[0].py_repr(), "1");
    }

    #[test]
    fn unhashable_key_is_a_type_error() {
        let mut dict = Dict::new();
        let err = dict.set(Value::new_list(vec![]), Value::None).unwrap_err();
        assert_eq!(err.to_string(), "TypeError: unhashable type: 'list'");
    }

    #[test]
    fn remove_preserves_order() {
        let mut dict = Dict::from_pairs((0..4).map(|i| (Value::Int(i), Value::Int(i * 10)))).unwrap();
        dict.remove(&Value::Int(1)).unwrap();
        let keys: Vec<String> = dict.keys().iter().map(Value::py_repr).collect();
        assert_eq!(keys, vec!["0", "2", "3"]);
    }

    #[test]
    fn mapping_pairs_checks_element_length() {
        let bad = Value::new_list(vec![Value::new_tuple(vec![Value::Int(1)])]);
        let err = mapping_pairs(&bad).unwrap_err();
        assert_eq!(
            err.to_string(),
            "ValueError: dictionary update sequence element #0 has length 1; 2 is required"
        );
    }

    #[test]
    fn pop_missing_key_raises_key_error() {
        let dict = Rc::new(RefCell::new(Dict::new()));
        let err = call_method(&dict, DictMethod::Pop, ArgValues::One(Value::from("k"))).unwrap_err();
        assert_eq!(err.to_string(), "KeyError: 'k'");
        let default = call_method(
            &dict,
            DictMethod::Pop,
            ArgValues::Two(Value::from("k"), Value::Int(0)),
        )
        .unwrap();
        assert_eq!(default.py_repr(), "0");
    }
}
