//! Unary, binary, in-place and subscript operation helpers for the VM.

use super::Frame;
use crate::{
    exceptions::{ExcType, RunResult},
    value::BinaryOp,
};

impl Frame {
    /// Pops two operands and pushes `lhs op rhs`.
    ///
    /// Operand types with no implementation of `op` raise CPython's `TypeError`.
    pub(super) fn binary_op(&mut self, op: BinaryOp) -> RunResult<()> {
        let rhs = self.pop()?;
        let lhs = self.pop()?;
        match lhs.py_binary(op, &rhs)? {
            Some(value) => {
                self.push(value);
                Ok(())
            }
            None => Err(ExcType::binary_type_error(op.symbol(), lhs.py_type(), rhs.py_type())),
        }
    }

    /// In-place variant: tries the left operand's mutating form first, then falls back
    /// to the plain binary operator.
    ///
    /// A successful mutation pushes the (same) left operand back.
    pub(super) fn inplace_op(&mut self, op: BinaryOp) -> RunResult<()> {
        let rhs = self.pop()?;
        let lhs = self.pop()?;
        if lhs.py_inplace(op, &rhs)? {
            self.push(lhs);
            return Ok(());
        }
        match lhs.py_binary(op, &rhs)? {
            Some(value) => {
                self.push(value);
                Ok(())
            }
            None => Err(ExcType::binary_type_error(
                op.inplace_symbol(),
                lhs.py_type(),
                rhs.py_type(),
            )),
        }
    }

    pub(super) fn unary_negative(&mut self) -> RunResult<()> {
        let value = self.pop()?;
        let result = value
            .py_neg()?
            .ok_or_else(|| ExcType::unary_type_error("-", value.py_type()))?;
        self.push(result);
        Ok(())
    }

    pub(super) fn unary_positive(&mut self) -> RunResult<()> {
        let value = self.pop()?;
        let result = value
            .py_pos()
            .ok_or_else(|| ExcType::unary_type_error("+", value.py_type()))?;
        self.push(result);
        Ok(())
    }

    pub(super) fn unary_invert(&mut self) -> RunResult<()> {
        let value = self.pop()?;
        let result = value
            .py_invert()
            .ok_or_else(|| ExcType::unary_type_error("~", value.py_type()))?;
        self.push(result);
        Ok(())
    }

    /// `TOS1[TOS]`
    pub(super) fn binary_subscr(&mut self) -> RunResult<()> {
        let key = self.pop()?;
        let container = self.pop()?;
        let value = container.py_getitem(&key)?;
        self.push(value);
        Ok(())
    }

    /// `TOS1[TOS] = TOS2`
    pub(super) fn store_subscr(&mut self) -> RunResult<()> {
        let key = self.pop()?;
        let container = self.pop()?;
        let value = self.pop()?;
        container.py_setitem(key, value)
    }

    /// `del TOS1[TOS]`
    pub(super) fn delete_subscr(&mut self) -> RunResult<()> {
        let key = self.pop()?;
        let container = self.pop()?;
        container.py_delitem(&key)
    }
}
