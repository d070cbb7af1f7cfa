//! Container construction, accumulator and unpacking opcodes.
//!
//! Accumulators pop their operand first, then address the target at depth `i`
//! from the top of what remains (1 being the new top) and mutate it in place.

use super::Frame;
use crate::{
    exceptions::{ExcType, RunError, RunResult},
    types::{Dict, Set},
    value::Value,
};

impl Frame {
    // ============================================================================
    // Builders
    // ============================================================================

    pub(super) fn build_tuple(&mut self, count: usize) -> RunResult<()> {
        let items = self.popn(count)?;
        self.push(Value::new_tuple(items));
        Ok(())
    }

    pub(super) fn build_list(&mut self, count: usize) -> RunResult<()> {
        let items = self.popn(count)?;
        self.push(Value::new_list(items));
        Ok(())
    }

    pub(super) fn build_set(&mut self, count: usize) -> RunResult<()> {
        let items = self.popn(count)?;
        self.push(Value::new_set(Set::from_values(items)?));
        Ok(())
    }

    /// `BUILD_MAP(n)`: `2n` values as key, value pairs; a repeated key keeps the last value.
    pub(super) fn build_map(&mut self, count: usize) -> RunResult<()> {
        let items = self.popn(count * 2)?;
        let mut dict = Dict::new();
        let mut items = items.into_iter();
        while let (Some(key), Some(value)) = (items.next(), items.next()) {
            dict.set(key, value)?;
        }
        self.push(Value::new_dict(dict));
        Ok(())
    }

    /// `BUILD_CONST_KEY_MAP(n)`: a tuple of `n` keys on top of `n` values.
    pub(super) fn build_const_key_map(&mut self, count: usize) -> RunResult<()> {
        let keys = match self.pop()? {
            Value::Tuple(keys) => keys,
            other => {
                return Err(ExcType::malformed_operand(format!(
                    "BUILD_CONST_KEY_MAP expects a tuple of keys, got {}",
                    other.py_type()
                )));
            }
        };
        if keys.len() != count {
            return Err(ExcType::malformed_operand(format!(
                "BUILD_CONST_KEY_MAP({count}) got {} keys",
                keys.len()
            )));
        }
        let values = self.popn(count)?;
        let dict = Dict::from_pairs(keys.iter().cloned().zip(values))?;
        self.push(Value::new_dict(dict));
        Ok(())
    }

    /// `BUILD_SLICE(argc)`: `start, stop` or `start, stop, step`.
    pub(super) fn build_slice(&mut self, argc: usize) -> RunResult<()> {
        let step = match argc {
            2 => Value::None,
            3 => self.pop()?,
            n => return Err(ExcType::malformed_operand(format!("bad BUILD_SLICE oparg {n}"))),
        };
        let stop = self.pop()?;
        let start = self.pop()?;
        self.push(Value::new_slice(start, stop, step));
        Ok(())
    }

    pub(super) fn list_to_tuple(&mut self) -> RunResult<()> {
        match self.pop()? {
            Value::List(list) => {
                let items = list.borrow().clone();
                self.push(Value::new_tuple(items));
                Ok(())
            }
            other => Err(ExcType::malformed_operand(format!(
                "LIST_TO_TUPLE expects a list, got {}",
                other.py_type()
            ))),
        }
    }

    // ============================================================================
    // Accumulators
    // ============================================================================

    pub(super) fn list_append(&mut self, depth: usize) -> RunResult<()> {
        let item = self.pop()?;
        match self.peek(depth)? {
            Value::List(list) => {
                list.borrow_mut().push(item);
                Ok(())
            }
            other => Err(accumulator_target("LIST_APPEND", other)),
        }
    }

    pub(super) fn list_extend(&mut self, depth: usize) -> RunResult<()> {
        let iterable = self.pop()?;
        let items = iterable.collect_values()?;
        match self.peek(depth)? {
            Value::List(list) => {
                list.borrow_mut().extend(items);
                Ok(())
            }
            other => Err(accumulator_target("LIST_EXTEND", other)),
        }
    }

    pub(super) fn set_add(&mut self, depth: usize) -> RunResult<()> {
        let item = self.pop()?;
        match self.peek(depth)? {
            Value::Set(set) => set.borrow_mut().add(item),
            other => Err(accumulator_target("SET_ADD", other)),
        }
    }

    pub(super) fn set_update(&mut self, depth: usize) -> RunResult<()> {
        let iterable = self.pop()?;
        let items = iterable.collect_values()?;
        match self.peek(depth)? {
            Value::Set(set) => {
                let mut set = set.borrow_mut();
                for item in items {
                    set.add(item)?;
                }
                Ok(())
            }
            other => Err(accumulator_target("SET_UPDATE", other)),
        }
    }

    /// `MAP_ADD(i)`: value on top, key beneath it.
    pub(super) fn map_add(&mut self, depth: usize) -> RunResult<()> {
        let value = self.pop()?;
        let key = self.pop()?;
        match self.peek(depth)? {
            Value::Dict(dict) => dict.borrow_mut().set(key, value),
            other => Err(accumulator_target("MAP_ADD", other)),
        }
    }

    /// `DICT_UPDATE(i)`: `{**a, **b}`, later keys overwrite.
    pub(super) fn dict_update(&mut self, depth: usize) -> RunResult<()> {
        let source = match self.pop()? {
            Value::Dict(source) => source,
            other => {
                return Err(ExcType::type_error(format!(
                    "'{}' object is not a mapping",
                    other.py_type()
                )));
            }
        };
        let pairs = source.borrow().items();
        match self.peek(depth)? {
            Value::Dict(dict) => {
                let mut dict = dict.borrow_mut();
                for (key, value) in pairs {
                    dict.set(key, value)?;
                }
                Ok(())
            }
            other => Err(accumulator_target("DICT_UPDATE", other)),
        }
    }

    /// `DICT_MERGE(i)`: `f(**a, **b)`, where a repeated keyword is an error.
    pub(super) fn dict_merge(&mut self, depth: usize) -> RunResult<()> {
        let source = match self.pop()? {
            Value::Dict(source) => source,
            other => {
                return Err(ExcType::type_error(format!(
                    "argument after ** must be a mapping, not {}",
                    other.py_type()
                )));
            }
        };
        let pairs = source.borrow().items();
        match self.peek(depth)? {
            Value::Dict(dict) => {
                let mut dict = dict.borrow_mut();
                for (key, value) in pairs {
                    if !matches!(key, Value::Str(_)) {
                        return Err(ExcType::type_error("keywords must be strings"));
                    }
                    if dict.contains_key(&key)? {
                        return Err(ExcType::type_error_merge_conflict(&key.py_repr()));
                    }
                    dict.set(key, value)?;
                }
                Ok(())
            }
            other => Err(accumulator_target("DICT_MERGE", other)),
        }
    }

    // ============================================================================
    // Unpacking
    // ============================================================================

    /// `UNPACK_SEQUENCE(n)`: pushes the items so that the first ends up on top.
    pub(super) fn unpack_sequence(&mut self, count: usize) -> RunResult<()> {
        let items = self.pop()?.collect_values()?;
        match items.len() {
            len if len > count => Err(ExcType::value_error(format!(
                "too many values to unpack (expected {count})"
            ))),
            len if len < count => Err(ExcType::value_error(format!(
                "not enough values to unpack (expected {count}, got {len})"
            ))),
            _ => {
                self.stack.extend(items.into_iter().rev());
                Ok(())
            }
        }
    }

    /// `UNPACK_EX(before | after << 8)`: `a, *rest, b = seq`.
    ///
    /// Pushes the trailing items, then a list of the middle, then the leading items,
    /// each group reversed so the first target is on top.
    pub(super) fn unpack_ex(&mut self, arg: usize) -> RunResult<()> {
        let before = arg & 0xFF;
        let after = arg >> 8;
        let mut items = self.pop()?.collect_values()?;
        if items.len() < before + after {
            return Err(ExcType::value_error(format!(
                "not enough values to unpack (expected at least {}, got {})",
                before + after,
                items.len()
            )));
        }
        let tail = items.split_off(items.len() - after);
        let middle = items.split_off(before);
        self.stack.extend(tail.into_iter().rev());
        self.push(Value::new_list(middle));
        self.stack.extend(items.into_iter().rev());
        Ok(())
    }
}

fn accumulator_target(opcode: &str, target: &Value) -> RunError {
    ExcType::malformed_operand(format!("{opcode} target is {}", target.py_type()))
}

#[cfg(test)]
mod tests {
    use std::rc::Rc;

    use super::*;
    use crate::{bytecode::CodeUnit, exceptions::ErrorReason, namespace::Scope};

    fn frame(values: Vec<Value>) -> Frame {
        let globals = Scope::default();
        let mut frame =
            Frame::new(Rc::new(CodeUnit::new("<test>")), Scope::default(), globals.clone(), globals).unwrap();
        for value in values {
            frame.push(value);
        }
        frame
    }

    fn reprs(frame: &Frame) -> Vec<String> {
        frame.stack().iter().map(Value::py_repr).collect()
    }

    #[test]
    fn builders_keep_popped_order() {
        let mut f = frame(vec![Value::Int(1), Value::Int(2), Value::Int(3)]);
        f.build_tuple(2).unwrap();
        assert_eq!(reprs(&f), vec!["1", "(2, 3)"]);
        f.build_list(2).unwrap();
        assert_eq!(reprs(&f), vec!["[1, (2, 3)]"]);
        f.build_set(0).unwrap();
        assert_eq!(reprs(&f), vec!["[1, (2, 3)]", "set()"]);
    }

    #[test]
    fn build_map_last_write_wins() {
        let mut f = frame(vec![
            Value::from("a"),
            Value::Int(1),
            Value::from("b"),
            Value::Int(2),
            Value::from("a"),
            Value::Int(3),
        ]);
        f.build_map(3).unwrap();
        assert_eq!(reprs(&f), vec!["{'a': 3, 'b': 2}"]);
    }

    #[test]
    fn build_map_rejects_unhashable_keys() {
        let mut f = frame(vec![Value::new_list(vec![]), Value::Int(1)]);
        let err = f.build_map(1).unwrap_err();
        assert_eq!(err.to_string(), "TypeError: unhashable type: 'list'");
    }

    #[test]
    fn const_key_map_zips_keys_and_values() {
        let keys = Value::new_tuple(vec![Value::from("x"), Value::from("y")]);
        let mut f = frame(vec![Value::Int(1), Value::Int(2), keys.clone()]);
        f.build_const_key_map(2).unwrap();
        assert_eq!(reprs(&f), vec!["{'x': 1, 'y': 2}"]);

        let mut f = frame(vec![Value::Int(1), keys]);
        let err = f.build_const_key_map(1).unwrap_err();
        assert_eq!(err.exc_type(), Some(ExcType::ValueError));
    }

    #[test]
    fn build_slice_arities() {
        let mut f = frame(vec![Value::Int(1), Value::None]);
        f.build_slice(2).unwrap();
        assert_eq!(reprs(&f), vec!["slice(1, None, None)"]);
        let mut f = frame(vec![Value::Int(1), Value::Int(5), Value::Int(2)]);
        f.build_slice(3).unwrap();
        assert_eq!(reprs(&f), vec!["slice(1, 5, 2)"]);
        let err = f.build_slice(4).unwrap_err();
        assert_eq!(err.to_string(), "ValueError: bad BUILD_SLICE oparg 4");
    }

    #[test]
    fn accumulators_address_depth_after_pop() {
        // list comprehension layout: target list, iterator, item
        let list = Value::new_list(vec![]);
        let mut f = frame(vec![list.clone(), Value::None, Value::Int(7)]);
        f.list_append(2).unwrap();
        assert_eq!(list.py_repr(), "[7]");
        assert_eq!(f.stack().len(), 2);

        let set = Value::new_set(Set::new());
        let mut f = frame(vec![set.clone(), Value::new_tuple(vec![Value::Int(1), Value::Int(1)])]);
        f.set_update(1).unwrap();
        f.push(Value::Int(2));
        f.set_add(1).unwrap();
        assert_eq!(set.py_repr(), "{1, 2}");

        let dict = Value::new_dict(Dict::new());
        let mut f = frame(vec![dict.clone(), Value::from("k"), Value::Int(9)]);
        f.map_add(1).unwrap();
        assert_eq!(dict.py_repr(), "{'k': 9}");

        let mut f = frame(vec![list.clone(), Value::from("ab")]);
        f.list_extend(1).unwrap();
        assert_eq!(list.py_repr(), "[7, 'a', 'b']");
    }

    #[test]
    fn dict_update_overwrites_but_merge_conflicts() {
        let target = Value::new_dict(Dict::from_pairs([(Value::from("a"), Value::Int(1))]).unwrap());
        let incoming = || Value::new_dict(Dict::from_pairs([(Value::from("a"), Value::Int(2))]).unwrap());

        let mut f = frame(vec![target.clone(), incoming()]);
        f.dict_update(1).unwrap();
        assert_eq!(target.py_repr(), "{'a': 2}");

        let mut f = frame(vec![target.clone(), incoming()]);
        let err = f.dict_merge(1).unwrap_err();
        assert_eq!(err.reason(), Some(ErrorReason::MergeConflict));
        assert_eq!(
            err.to_string(),
            "TypeError: got multiple values for keyword argument 'a'"
        );
        assert_eq!(target.py_repr(), "{'a': 2}");
    }

    #[test]
    fn dict_merge_requires_string_keys() {
        let incoming = Value::new_dict(Dict::from_pairs([(Value::Int(1), Value::Int(2))]).unwrap());
        let mut f = frame(vec![Value::new_dict(Dict::new()), incoming]);
        let err = f.dict_merge(1).unwrap_err();
        assert_eq!(err.to_string(), "TypeError: keywords must be strings");

        let mut f = frame(vec![Value::new_dict(Dict::new()), Value::Int(3)]);
        let err = f.dict_merge(1).unwrap_err();
        assert_eq!(err.to_string(), "TypeError: argument after ** must be a mapping, not int");
    }

    #[test]
    fn unpack_sequence_pushes_first_on_top() {
        let mut f = frame(vec![Value::new_tuple(vec![Value::Int(1), Value::Int(2), Value::Int(3)])]);
        f.unpack_sequence(3).unwrap();
        assert_eq!(reprs(&f), vec!["3", "2", "1"]);

        let mut f = frame(vec![Value::new_list(vec![Value::Int(1)])]);
        let err = f.unpack_sequence(2).unwrap_err();
        assert_eq!(
            err.to_string(),
            "ValueError: not enough values to unpack (expected 2, got 1)"
        );
        let mut f = frame(vec![Value::from("abc")]);
        let err = f.unpack_sequence(2).unwrap_err();
        assert_eq!(err.to_string(), "ValueError: too many values to unpack (expected 2)");
    }

    #[test]
    fn unpack_ex_splits_around_the_star() {
        let seq = Value::new_list((1..=5).map(Value::Int).collect());
        let mut f = frame(vec![seq]);
        // a, *rest, b, c = [1, 2, 3, 4, 5]
        f.unpack_ex(1 | (2 << 8)).unwrap();
        assert_eq!(reprs(&f), vec!["5", "4", "[2, 3]", "1"]);

        let mut f = frame(vec![Value::new_tuple(vec![Value::Int(1)])]);
        let err = f.unpack_ex(1 | (1 << 8)).unwrap_err();
        assert_eq!(
            err.to_string(),
            "ValueError: not enough values to unpack (expected at least 2, got 1)"
        );
    }

    #[test]
    fn list_to_tuple_converts() {
        let mut f = frame(vec![Value::new_list(vec![Value::Int(1)])]);
        f.list_to_tuple().unwrap();
        assert_eq!(reprs(&f), vec!["(1,)"]);
        let mut f = frame(vec![Value::Int(1)]);
        assert!(matches!(f.list_to_tuple(), Err(RunError::Exc(_))));
    }
}
