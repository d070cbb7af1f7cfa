//! f-string opcodes.

use super::Frame;
use crate::{
    exceptions::{ExcType, RunResult},
    fstring::{self, Conversion},
    value::Value,
};

/// `FORMAT_VALUE` flag: a format spec string sits above the value.
const HAVE_SPEC: u32 = 0x04;

impl Frame {
    /// `FORMAT_VALUE(flags)`: converts then formats the value, pushing a str.
    pub(super) fn format_value(&mut self, flags: u32) -> RunResult<()> {
        let spec = if flags & HAVE_SPEC != 0 {
            match self.pop()? {
                Value::Str(spec) => Some(spec),
                other => {
                    return Err(ExcType::type_error(format!(
                        "format spec must be a str, not {}",
                        other.py_type()
                    )));
                }
            }
        } else {
            None
        };
        let value = Conversion::from_flags(flags).apply(self.pop()?);
        let formatted = match spec {
            None if matches!(value, Value::Str(_)) => value,
            spec => Value::from(fstring::format_value(&value, spec.as_deref().unwrap_or(""))?),
        };
        self.push(formatted);
        Ok(())
    }

    /// `BUILD_STRING(n)`: concatenates the top `n` strings.
    pub(super) fn build_string(&mut self, count: usize) -> RunResult<()> {
        let parts = self.popn(count)?;
        let mut out = String::new();
        for part in &parts {
            match part {
                Value::Str(s) => out.push_str(s),
                other => {
                    return Err(ExcType::malformed_operand(format!(
                        "BUILD_STRING expects str parts, got {}",
                        other.py_type()
                    )));
                }
            }
        }
        self.push(Value::from(out));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::rc::Rc;

    use super::*;
    use crate::{bytecode::CodeUnit, namespace::Scope};

    fn frame(values: Vec<Value>) -> Frame {
        let globals = Scope::default();
        let mut frame =
            Frame::new(Rc::new(CodeUnit::new("<test>")), Scope::default(), globals.clone(), globals).unwrap();
        for value in values {
            frame.push(value);
        }
        frame
    }

    #[test]
    fn format_value_without_spec_uses_str() {
        let mut f = frame(vec![Value::Int(42)]);
        f.format_value(0).unwrap();
        assert_eq!(f.pop().unwrap().py_repr(), "'42'");
    }

    #[test]
    fn format_value_pops_spec_first() {
        // f"{x!r:>6}"
        let mut f = frame(vec![Value::from("ab"), Value::from(">6")]);
        f.format_value(0x02 | HAVE_SPEC).unwrap();
        assert_eq!(f.stack().len(), 1);
        assert_eq!(f.pop().unwrap().py_str(), "  'ab'");

        let mut f = frame(vec![Value::Float(3.14159), Value::from(".2f")]);
        f.format_value(HAVE_SPEC).unwrap();
        assert_eq!(f.pop().unwrap().py_str(), "3.14");
    }

    #[test]
    fn build_string_concatenates_in_order() {
        let mut f = frame(vec![Value::from("a"), Value::from("b"), Value::from("c")]);
        f.build_string(3).unwrap();
        assert_eq!(f.pop().unwrap().py_str(), "abc");
        f.build_string(0).unwrap();
        assert_eq!(f.pop().unwrap().py_str(), "");

        let mut f = frame(vec![Value::Int(1)]);
        assert!(f.build_string(1).is_err());
    }
}
