//! Comparison, identity and membership opcodes.

use std::cmp::Ordering;

use super::Frame;
use crate::{
    bytecode::CompareOp,
    exceptions::{ExcType, RunResult},
    value::Value,
};

impl Frame {
    /// `COMPARE_OP`: pops `rhs` then `lhs` and pushes the boolean result.
    pub(super) fn compare_op(&mut self, op: CompareOp) -> RunResult<()> {
        let rhs = self.pop()?;
        let lhs = self.pop()?;
        let result = compare(op, &lhs, &rhs)?;
        self.push(Value::Bool(result));
        Ok(())
    }

    /// `IS_OP`, negated when `invert` is set.
    pub(super) fn is_op(&mut self, invert: bool) -> RunResult<()> {
        let rhs = self.pop()?;
        let lhs = self.pop()?;
        self.push(Value::Bool(lhs.py_is(&rhs) != invert));
        Ok(())
    }

    /// `CONTAINS_OP`: `TOS1 in TOS`, negated when `invert` is set.
    pub(super) fn contains_op(&mut self, invert: bool) -> RunResult<()> {
        let container = self.pop()?;
        let item = self.pop()?;
        let found = container.py_contains(&item)?;
        self.push(Value::Bool(found != invert));
        Ok(())
    }
}

fn compare(op: CompareOp, lhs: &Value, rhs: &Value) -> RunResult<bool> {
    let ordering = match op {
        CompareOp::Eq => return Ok(lhs.py_eq(rhs)),
        CompareOp::Ne => return Ok(!lhs.py_eq(rhs)),
        CompareOp::In => return rhs.py_contains(lhs),
        CompareOp::NotIn => return rhs.py_contains(lhs).map(|found| !found),
        CompareOp::Is => return Ok(lhs.py_is(rhs)),
        CompareOp::IsNot => return Ok(!lhs.py_is(rhs)),
        CompareOp::Lt | CompareOp::Le | CompareOp::Gt | CompareOp::Ge => lhs.py_cmp(rhs),
    };
    match ordering {
        Some(ordering) => Ok(match op {
            CompareOp::Lt => ordering == Ordering::Less,
            CompareOp::Le => ordering != Ordering::Greater,
            CompareOp::Gt => ordering == Ordering::Greater,
            _ => ordering != Ordering::Less,
        }),
        // NaN, or a sequence holding one
        None if lhs.is_orderable_with(rhs) => Ok(false),
        None => Err(ExcType::compare_type_error(<&'static str>::from(op), lhs.py_type(), rhs.py_type())),
    }
}
