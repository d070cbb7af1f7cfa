use crate::{
    args::ArgValues,
    exceptions::{ExcType, RunResult},
    types::{
        Type,
        slice::{Subscript, normalize_index},
    },
    value::Value,
};

/// Python `range` object: an immutable arithmetic progression.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Range {
    pub start: i64,
    pub stop: i64,
    pub step: i64,
}

impl Range {
    pub fn new(start: i64, stop: i64, step: i64) -> RunResult<Self> {
        if step == 0 {
            return Err(ExcType::value_error("range() arg 3 must not be zero"));
        }
        Ok(Self { start, stop, step })
    }

    /// Implements `range(stop)`, `range(start, stop)` and `range(start, stop, step)`.
    pub fn init(args: ArgValues) -> RunResult<Value> {
        let args = args.into_positional("range")?;
        let ints = args
            .iter()
            .map(|arg| arg.as_int().ok_or_else(|| ExcType::type_error_not_integer(arg.py_type())))
            .collect::<RunResult<Vec<i64>>>()?;
        let range = match ints.as_slice() {
            [stop] => Self::new(0, *stop, 1)?,
            [start, stop] => Self::new(*start, *stop, 1)?,
            [start, stop, step] => Self::new(*start, *stop, *step)?,
            [] => return Err(ExcType::type_error_at_least("range", 1, 0)),
            _ => return Err(ExcType::type_error_at_most("range", 3, ints.len())),
        };
        Ok(Value::Range(range))
    }

    #[must_use]
    pub fn len(&self) -> usize {
        let len = progression_len(i128::from(self.start), i128::from(self.stop), i128::from(self.step));
        usize::try_from(len).unwrap_or(usize::MAX)
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// The element at `position`, which must be below `len()`.
    #[must_use]
    pub fn item(&self, position: usize) -> i64 {
        // every element of the range fits in i64
        (i128::from(self.start) + position as i128 * i128::from(self.step)) as i64
    }

    #[must_use]
    pub fn contains(&self, value: i64) -> bool {
        let in_bounds = if self.step > 0 {
            self.start <= value && value < self.stop
        } else {
            self.stop < value && value <= self.start
        };
        in_bounds && (i128::from(value) - i128::from(self.start)) % i128::from(self.step) == 0
    }

    pub fn py_getitem(&self, key: &Value) -> RunResult<Value> {
        match Subscript::from_key(key, Type::Range)? {
            Subscript::Index(index) => normalize_index(index, self.len())
                .map(|position| Value::Int(self.item(position)))
                .ok_or_else(|| ExcType::index_error("range object index out of range")),
            Subscript::Slice(slice) => {
                let (start, stop, step) = slice.indices(self.len())?;
                self.sliced(start, stop, step).map(Value::Range)
            }
        }
    }

    /// The sub-range selected by clamped slice indices.
    ///
    /// Bounds are computed in `i128`. When the exact bounds do not fit in `i64`
    /// an equivalent range with the same elements is built instead.
    fn sliced(&self, start: i64, stop: i64, step: i64) -> RunResult<Self> {
        let (base, own_step) = (i128::from(self.start), i128::from(self.step));
        let first = base + i128::from(start) * own_step;
        let end = base + i128::from(stop) * own_step;
        let new_step = own_step * i128::from(step);
        let narrow = |value: i128| i64::try_from(value).ok();
        if let (Some(start), Some(stop), Some(step)) = (narrow(first), narrow(end), narrow(new_step)) {
            return Ok(Self { start, stop, step });
        }

        let count = progression_len(i128::from(start), i128::from(stop), i128::from(step));
        let overflow = || ExcType::overflow_error("range slice bounds do not fit in an int");
        match count {
            0 => Ok(Self {
                start: 0,
                stop: 0,
                step: 1,
            }),
            1 => {
                let only = narrow(first).ok_or_else(overflow)?;
                let (stop, step) = match only.checked_add(1) {
                    Some(stop) => (stop, 1),
                    None => (only - 1, -1),
                };
                Ok(Self { start: only, stop, step })
            }
            _ => {
                let step = narrow(new_step).ok_or_else(overflow)?;
                let last = first + (count - 1) * new_step;
                let stop = narrow(last + new_step.signum()).ok_or_else(overflow)?;
                Ok(Self {
                    start: narrow(first).ok_or_else(overflow)?,
                    stop,
                    step,
                })
            }
        }
    }

    /// Two ranges are equal when they describe the same sequence.
    #[must_use]
    pub fn py_eq(&self, other: &Self) -> bool {
        let len = self.len();
        len == other.len() && (len == 0 || (self.start == other.start && (len == 1 || self.step == other.step)))
    }

    #[must_use]
    pub fn py_repr(&self) -> String {
        if self.step == 1 {
            format!("range({}, {})", self.start, self.stop)
        } else {
            format!("range({}, {}, {})", self.start, self.stop, self.step)
        }
    }
}

/// Number of elements in `start, start + step, ...` below (or above, for a negative step) `stop`.
fn progression_len(start: i128, stop: i128, step: i128) -> i128 {
    if step > 0 && start < stop {
        (stop - start - 1) / step + 1
    } else if step < 0 && start > stop {
        (start - stop - 1) / -step + 1
    } else {
        0
    }
}
