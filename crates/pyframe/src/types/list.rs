use std::{cell::RefCell, rc::Rc};

use strum::{Display, EnumString, IntoStaticStr};

use crate::{
    args::ArgValues,
    exceptions::{ExcType, RunResult},
    types::{
        Type,
        slice::{Slice, Subscript, normalize_index},
    },
    value::Value,
};

/// Shared, mutable list storage.
pub type List = Rc<RefCell<Vec<Value>>>;

/// Methods available on `list` values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, IntoStaticStr)]
#[strum(serialize_all = "lowercase")]
pub enum ListMethod {
    Append,
    Extend,
    Pop,
    Insert,
    Remove,
    Index,
    Count,
    Reverse,
    Sort,
    Copy,
    Clear,
}

/// What a sequence subscript selected.
pub(crate) enum Selected {
    One(Value),
    Many(Vec<Value>),
}

/// Reads `items[key]` for list and tuple subscripts.
pub(crate) fn getitem(items: &[Value], key: &Value, container: Type) -> RunResult<Selected> {
    match Subscript::from_key(key, container)? {
        Subscript::Index(index) => normalize_index(index, items.len())
            .map(|position| Selected::One(items[position].clone()))
            .ok_or_else(|| ExcType::index_error(format!("{container} index out of range"))),
        Subscript::Slice(slice) => {
            let positions = slice.positions(items.len())?;
            Ok(Selected::Many(positions.into_iter().map(|i| items[i].clone()).collect()))
        }
    }
}

/// Implements `list[key] = value`.
pub(crate) fn setitem(list: &List, key: &Value, value: Value) -> RunResult<()> {
    match Subscript::from_key(key, Type::List)? {
        Subscript::Index(index) => {
            let mut items = list.borrow_mut();
            let position = normalize_index(index, items.len())
                .ok_or_else(|| ExcType::index_error("list assignment index out of range"))?;
            items[position] = value;
            Ok(())
        }
        Subscript::Slice(slice) => {
            let replacement = value.collect_values()?;
            assign_slice(&mut list.borrow_mut(), slice, replacement)
        }
    }
}

fn assign_slice(items: &mut Vec<Value>, slice: &Slice, replacement: Vec<Value>) -> RunResult<()> {
    let (start, stop, step) = slice.indices(items.len())?;
    if step == 1 {
        // indices() clamps start and stop into 0..=len for a positive step
        let start = start as usize;
        let stop = (stop as usize).max(start);
        items.splice(start..stop, replacement);
        return Ok(());
    }
    let positions = slice.positions(items.len())?;
    if positions.len() != replacement.len() {
        return Err(ExcType::value_error(format!(
            "attempt to assign sequence of size {} to extended slice of size {}",
            replacement.len(),
            positions.len()
        )));
    }
    for (position, value) in positions.into_iter().zip(replacement) {
        items[position] = value;
    }
    Ok(())
}

/// Implements `del list[key]`.
pub(crate) fn delitem(list: &List, key: &Value) -> RunResult<()> {
    let mut items = list.borrow_mut();
    match Subscript::from_key(key, Type::List)? {
        Subscript::Index(index) => {
            let position = normalize_index(index, items.len())
                .ok_or_else(|| ExcType::index_error("list assignment index out of range"))?;
            items.remove(position);
        }
        Subscript::Slice(slice) => {
            let mut positions = slice.positions(items.len())?;
            positions.sort_unstable_by(|a, b| b.cmp(a));
            for position in positions {
                items.remove(position);
            }
        }
    }
    Ok(())
}

/// Stable sort by Python's `<`, leaving `items` untouched if a comparison raises.
pub(crate) fn sort_values(items: &mut Vec<Value>, reverse: bool) -> RunResult<()> {
    let order = sort_order(items, reverse)?;
    let mut slots: Vec<Option<Value>> = std::mem::take(items).into_iter().map(Some).collect();
    items.extend(order.into_iter().filter_map(|position| slots[position].take()));
    Ok(())
}

/// Positions of `keys` in stable sorted order.
///
/// A bottom-up merge sort that only asks "is the right item less than the left one",
/// so equal and unordered keys keep their input order and the first comparison error
/// aborts the sort.
pub(crate) fn sort_order(keys: &[Value], reverse: bool) -> RunResult<Vec<usize>> {
    let less = |a: usize, b: usize| {
        if reverse {
            keys[b].py_lt(&keys[a])
        } else {
            keys[a].py_lt(&keys[b])
        }
    };
    let len = keys.len();
    let mut order: Vec<usize> = (0..len).collect();
    let mut merged = Vec::with_capacity(len);
    let mut width = 1;
    while width < len {
        merged.clear();
        for start in (0..len).step_by(2 * width) {
            let mid = (start + width).min(len);
            let end = (start + 2 * width).min(len);
            let (mut left, mut right) = (start, mid);
            while left < mid && right < end {
                if less(order[right], order[left])? {
                    merged.push(order[right]);
                    right += 1;
                } else {
                    merged.push(order[left]);
                    left += 1;
                }
            }
            merged.extend_from_slice(&order[left..mid]);
            merged.extend_from_slice(&order[right..end]);
        }
        std::mem::swap(&mut order, &mut merged);
        width *= 2;
    }
    Ok(order)
}

fn index_arg(value: &Value) -> RunResult<i64> {
    value
        .as_int()
        .ok_or_else(|| ExcType::type_error_not_integer(value.py_type()))
}

/// Calls a `list` method on `list`.
pub(crate) fn call_method(list: &List, method: ListMethod, args: ArgValues) -> RunResult<Value> {
    match method {
        ListMethod::Append => {
            let item = args.get_one_arg("list.append")?;
            list.borrow_mut().push(item);
        }
        ListMethod::Extend => {
            // collect before borrowing mutably, `l.extend(l)` is legal
            let items = args.get_one_arg("list.extend")?.collect_values()?;
            list.borrow_mut().extend(items);
        }
        ListMethod::Pop => {
            let index = args.get_zero_one_arg("pop")?.map(|v| index_arg(&v)).transpose()?;
            let mut items = list.borrow_mut();
            if items.is_empty() {
                return Err(ExcType::index_error("pop from empty list"));
            }
            let position = normalize_index(index.unwrap_or(-1), items.len())
                .ok_or_else(|| ExcType::index_error("pop index out of range"))?;
            return Ok(items.remove(position));
        }
        ListMethod::Insert => {
            let (index, item) = args.get_two_args("insert")?;
            let index = index_arg(&index)?;
            let mut items = list.borrow_mut();
            let len = items.len() as i64;
            let position = if index < 0 { (index + len).max(0) } else { index.min(len) };
            items.insert(position as usize, item);
        }
        ListMethod::Remove => {
            let item = args.get_one_arg("list.remove")?;
            let position = list.borrow().iter().position(|v| v.py_eq(&item));
            match position {
                Some(position) => {
                    list.borrow_mut().remove(position);
                }
                None => return Err(ExcType::value_error("list.remove(x): x not in list")),
            }
        }
        ListMethod::Index => {
            let item = args.get_one_arg("list.index")?;
            let position = list.borrow().iter().position(|v| v.py_eq(&item));
            return position
                .map(|p| Value::Int(p as i64))
                .ok_or_else(|| ExcType::value_error(format!("{} is not in list", item.py_repr())));
        }
        ListMethod::Count => {
            let item = args.get_one_arg("list.count")?;
            let count = list.borrow().iter().filter(|v| v.py_eq(&item)).count();
            return Ok(Value::Int(count as i64));
        }
        ListMethod::Reverse => {
            args.check_zero_args("list.reverse")?;
            list.borrow_mut().reverse();
        }
        ListMethod::Sort => {
            let (positional, kwargs) = args.into_parts();
            if !positional.is_empty() {
                return Err(ExcType::type_error("sort() takes no positional arguments"));
            }
            let mut reverse = false;
            for (key, value) in kwargs {
                match key.as_ref() {
                    "reverse" => reverse = value.py_bool(),
                    other => return Err(ExcType::type_error_invalid_kwarg("sort", other)),
                }
            }
            // the list reads as empty while it is being sorted, as in CPython
            let mut items = std::mem::take(&mut *list.borrow_mut());
            let result = sort_values(&mut items, reverse);
            *list.borrow_mut() = items;
            result?;
        }
        ListMethod::Copy => {
            args.check_zero_args("list.copy")?;
            return Ok(Value::new_list(list.borrow().clone()));
        }
        ListMethod::Clear => {
            args.check_zero_args("list.clear")?;
            list.borrow_mut().clear();
        }
    }
    Ok(Value::None)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn new_list(values: &[i64]) -> List {
        Rc::new(RefCell::new(values.iter().copied().map(Value::Int).collect()))
    }

    fn reprs(list: &List) -> String {
        Value::List(Rc::clone(list)).py_repr()
    }

    #[test]
    fn pop_default_and_explicit_index() {
        let list = new_list(&[1, 2, 3]);
        let last = call_method(&list, ListMethod::Pop, ArgValues::Empty).unwrap();
        assert_eq!(last.py_repr(), "3");
        let first = call_method(&list, ListMethod::Pop, ArgValues::One(Value::Int(0))).unwrap();
        assert_eq!(first.py_repr(), "1");
        assert_eq!(reprs(&list), "[2]");
    }

    #[test]
    fn pop_from_empty_list() {
        let err = call_method(&new_list(&[]), ListMethod::Pop, ArgValues::Empty).unwrap_err();
        assert_eq!(err.to_string(), "IndexError: pop from empty list");
    }

    #[test]
    fn insert_clamps_index() {
        let list = new_list(&[1, 2]);
        call_method(&list, ListMethod::Insert, ArgValues::Two(Value::Int(-10), Value::Int(0))).unwrap();
        call_method(&list, ListMethod::Insert, ArgValues::Two(Value::Int(10), Value::Int(9))).unwrap();
        assert_eq!(reprs(&list), "[0, 1, 2, 9]");
    }

    #[test]
    fn extend_with_itself() {
        let list = new_list(&[1, 2]);
        call_method(&list, ListMethod::Extend, ArgValues::One(Value::List(Rc::clone(&list)))).unwrap();
        assert_eq!(reprs(&list), "[1, 2, 1, 2]");
    }

    #[test]
    fn sort_reports_incomparable_values() {
        let list: List = Rc::new(RefCell::new(vec![Value::Int(1), Value::from("a")]));
        let err = call_method(&list, ListMethod::Sort, ArgValues::Empty).unwrap_err();
        assert!(err.to_string().starts_with("TypeError: '<' not supported between instances of"));
        assert_eq!(list.borrow().len(), 2);
    }

    #[test]
    fn sort_is_stable_in_both_directions() {
        let items = vec![Value::Int(1), Value::Float(1.0), Value::Int(0), Value::Bool(true)];
        let list: List = Rc::new(RefCell::new(items.clone()));
        call_method(&list, ListMethod::Sort, ArgValues::Empty).unwrap();
        assert_eq!(reprs(&list), "[0, 1, 1.0, True]");

        let list: List = Rc::new(RefCell::new(items));
        let reverse = ArgValues::new(vec![], vec![("reverse".into(), Value::Bool(true))]);
        call_method(&list, ListMethod::Sort, reverse).unwrap();
        assert_eq!(reprs(&list), "[1, 1.0, True, 0]");
    }

    #[test]
    fn sort_orders_longer_lists() {
        let list = new_list(&(0..37).map(|i| (i * 11) % 37).collect::<Vec<_>>());
        call_method(&list, ListMethod::Sort, ArgValues::Empty).unwrap();
        let sorted: Vec<i64> = list.borrow().iter().filter_map(Value::as_int).collect();
        assert_eq!(sorted, (0..37).collect::<Vec<_>>());
    }

    #[test]
    fn sort_with_nan_keeps_every_item() {
        let list: List = Rc::new(RefCell::new(vec![
            Value::Float(2.0),
            Value::Float(f64::NAN),
            Value::Float(1.0),
        ]));
        call_method(&list, ListMethod::Sort, ArgValues::Empty).unwrap();
        assert_eq!(list.borrow().len(), 3);
        assert!(reprs(&list).contains("nan"));
    }

    #[test]
    fn slice_assignment_and_deletion() {
        let list = new_list(&[0, 1, 2, 3, 4]);
        let slice = Value::new_slice(Value::Int(1), Value::Int(3), Value::None);
        setitem(&list, &slice, Value::new_list(vec![Value::Int(9)])).unwrap();
        assert_eq!(reprs(&list), "[0, 9, 3, 4]");
        let every_other = Value::new_slice(Value::None, Value::None, Value::Int(2));
        delitem(&list, &every_other).unwrap();
        assert_eq!(reprs(&list), "[9, 4]");
    }
}
