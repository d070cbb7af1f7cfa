use crate::{
    exceptions::{ExcType, RunResult},
    types::Type,
    value::Value,
};

/// Python `slice` object as built by `BUILD_SLICE`.
///
/// Components are kept as values and validated on use, as CPython does.
#[derive(Debug, Clone)]
pub struct Slice {
    pub start: Value,
    pub stop: Value,
    pub step: Value,
}

impl Slice {
    #[must_use]
    pub fn new(start: Value, stop: Value, step: Value) -> Self {
        Self { start, stop, step }
    }

    fn component(value: &Value) -> RunResult<Option<i64>> {
        match value {
            Value::None => Ok(None),
            Value::Int(i) => Ok(Some(*i)),
            Value::Bool(b) => Ok(Some(i64::from(*b))),
            _ => Err(ExcType::type_error(
                "slice indices must be integers or None or have an __index__ method",
            )),
        }
    }

    /// Resolves the slice against a sequence length, returning `(start, stop, step)`
    /// clamped the way `slice.indices(len)` does.
    pub fn indices(&self, len: usize) -> RunResult<(i64, i64, i64)> {
        let step = Self::component(&self.step)?.unwrap_or(1);
        if step == 0 {
            return Err(ExcType::value_error("slice step cannot be zero"));
        }
        let len = i64::try_from(len).map_err(|_| ExcType::overflow_error("sequence too long"))?;
        let (lower, upper) = if step < 0 { (-1, len - 1) } else { (0, len) };
        let clamp = |bound: i64| {
            if bound < 0 {
                (bound + len).max(lower)
            } else {
                bound.min(upper)
            }
        };
        let start = match Self::component(&self.start)? {
            Some(start) => clamp(start),
            None if step < 0 => upper,
            None => lower,
        };
        let stop = match Self::component(&self.stop)? {
            Some(stop) => clamp(stop),
            None if step < 0 => lower,
            None => upper,
        };
        Ok((start, stop, step))
    }

    /// The element positions selected by this slice in a sequence of length `len`.
    pub fn positions(&self, len: usize) -> RunResult<Vec<usize>> {
        let (start, stop, step) = self.indices(len)?;
        let mut positions = Vec::new();
        let mut index = start;
        while (step > 0 && index < stop) || (step < 0 && index > stop) {
            // clamping keeps index within 0..len here
            positions.push(index as usize);
            match index.checked_add(step) {
                Some(next) => index = next,
                None => break,
            }
        }
        Ok(positions)
    }

    #[must_use]
    pub fn py_repr(&self) -> String {
        format!(
            "slice({}, {}, {})",
            self.start.py_repr(),
            self.stop.py_repr(),
            self.step.py_repr()
        )
    }
}

/// A decoded subscript key for sequence types.
pub(crate) enum Subscript<'a> {
    Index(i64),
    Slice(&'a Slice),
}

impl<'a> Subscript<'a> {
    pub(crate) fn from_key(key: &'a Value, container: Type) -> RunResult<Self> {
        match key {
            Value::Int(i) => Ok(Self::Index(*i)),
            Value::Bool(b) => Ok(Self::Index(i64::from(*b))),
            Value::Slice(slice) => Ok(Self::Slice(slice)),
            _ if container == Type::Str => Err(ExcType::type_error("string indices must be integers")),
            other => Err(ExcType::type_error_indices(container, other.py_type())),
        }
    }
}

/// Converts a possibly negative Python index into a position, `None` when out of range.
pub(crate) fn normalize_index(index: i64, len: usize) -> Option<usize> {
    let len = i64::try_from(len).ok()?;
    let index = if index < 0 { index + len } else { index };
    if (0..len).contains(&index) {
        usize::try_from(index).ok()
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn slice(start: Option<i64>, stop: Option<i64>, step: Option<i64>) -> Slice {
        let component = |v: Option<i64>| v.map_or(Value::None, Value::Int);
        Slice::new(component(start), component(stop), component(step))
    }

    #[test]
    fn indices_match_python() {
        assert_eq!(slice(None, None, None).indices(5).unwrap(), (0, 5, 1));
        assert_eq!(slice(Some(-2), None, None).indices(5).unwrap(), (3, 5, 1));
        assert_eq!(slice(None, None, Some(-1)).indices(5).unwrap(), (4, -1, -1));
        assert_eq!(slice(Some(10), Some(-10), Some(-2)).indices(5).unwrap(), (4, -1, -2));
    }

    #[test]
    fn positions_with_negative_step() {
        assert_eq!(slice(None, None, Some(-2)).positions(5).unwrap(), vec![4, 2, 0]);
        assert_eq!(slice(Some(1), Some(1), None).positions(5).unwrap(), Vec::<usize>::new());
    }

    #[test]
    fn huge_steps_stop_after_the_first_position() {
        assert_eq!(slice(Some(1), None, Some(i64::MAX)).positions(3).unwrap(), vec![1]);
        assert_eq!(slice(None, None, Some(i64::MIN)).positions(3).unwrap(), vec![2]);
        assert_eq!(slice(Some(-1), None, Some(i64::MIN + 1)).positions(3).unwrap(), vec![2]);
    }

    #[test]
    fn zero_step_is_a_value_error() {
        let err = slice(None, None, Some(0)).indices(3).unwrap_err();
        assert_eq!(err.exc_type(), Some(ExcType::ValueError));
    }

    #[test]
    fn normalize_negative_index() {
        assert_eq!(normalize_index(-1, 3), Some(2));
        assert_eq!(normalize_index(3, 3), None);
        assert_eq!(normalize_index(-4, 3), None);
    }
}
