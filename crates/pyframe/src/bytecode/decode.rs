//! Instruction decoder: resolves raw arguments into typed operands once per code unit.

use std::rc::Rc;

use crate::{
    bytecode::{
        code::CodeUnit,
        op::{CompareOp, Opcode},
    },
    exceptions::{ExcType, RunError, RunResult},
    value::Value,
};

/// Semantic form of an instruction argument.
#[derive(Debug, Clone)]
pub enum Operand {
    None,
    /// Constant pool entry, converted to a runtime value.
    Const(Value),
    /// Entry of `names` or, for the `*_FAST` family, of `varnames`.
    Name(Rc<str>),
    Count(usize),
    /// Absolute target offset.
    Jump(usize),
    /// Distance from the following instruction, used by `JUMP_FORWARD`.
    Delta(usize),
    Compare(CompareOp),
    Invert(bool),
    Flags(u32),
}

impl Operand {
    fn mismatch(&self, expected: &str) -> RunError {
        RunError::internal(format!("expected {expected} operand, found {self:?}"))
    }

    pub fn count(&self) -> RunResult<usize> {
        match self {
            Self::Count(n) => Ok(*n),
            other => Err(other.mismatch("count")),
        }
    }

    pub fn name(&self) -> RunResult<&Rc<str>> {
        match self {
            Self::Name(name) => Ok(name),
            other => Err(other.mismatch("name")),
        }
    }

    pub fn constant(&self) -> RunResult<&Value> {
        match self {
            Self::Const(value) => Ok(value),
            other => Err(other.mismatch("constant")),
        }
    }

    pub fn jump(&self) -> RunResult<usize> {
        match self {
            Self::Jump(target) => Ok(*target),
            other => Err(other.mismatch("jump")),
        }
    }

    pub fn delta(&self) -> RunResult<usize> {
        match self {
            Self::Delta(delta) => Ok(*delta),
            other => Err(other.mismatch("delta")),
        }
    }

    pub fn compare(&self) -> RunResult<CompareOp> {
        match self {
            Self::Compare(op) => Ok(*op),
            other => Err(other.mismatch("comparison")),
        }
    }

    pub fn invert(&self) -> RunResult<bool> {
        match self {
            Self::Invert(invert) => Ok(*invert),
            other => Err(other.mismatch("invert")),
        }
    }

    pub fn flags(&self) -> RunResult<u32> {
        match self {
            Self::Flags(flags) => Ok(*flags),
            other => Err(other.mismatch("flags")),
        }
    }
}

/// A decoded instruction.
#[derive(Debug, Clone)]
pub struct Instruction {
    pub offset: usize,
    pub opcode: Opcode,
    pub operand: Operand,
}

/// All instructions of a code unit, addressable by offset.
#[derive(Debug, Default)]
pub struct DecodedCode {
    instructions: Vec<Instruction>,
}

impl DecodedCode {
    /// Looks up the instruction at `offset`, `None` past the end or at an odd offset.
    #[must_use]
    pub fn get(&self, offset: usize) -> Option<&Instruction> {
        if offset % 2 != 0 {
            return None;
        }
        self.instructions.get(offset / 2)
    }

    /// Offset one past the last instruction, where execution terminates.
    #[must_use]
    pub fn end(&self) -> usize {
        self.instructions.len() * 2
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.instructions.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.instructions.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Instruction> {
        self.instructions.iter()
    }
}

/// Decodes and validates every instruction of `code`.
pub(crate) fn decode(code: &CodeUnit) -> RunResult<DecodedCode> {
    let end = code.instructions.len() * 2;
    let consts: Vec<Value> = code.consts.iter().map(|c| c.to_value()).collect();
    let names: Vec<Rc<str>> = code.names.iter().map(|n| Rc::from(n.as_str())).collect();
    let varnames: Vec<Rc<str>> = code.varnames.iter().map(|n| Rc::from(n.as_str())).collect();

    let mut instructions = Vec::with_capacity(code.instructions.len());
    for (index, raw) in code.instructions.iter().enumerate() {
        if raw.offset != index * 2 {
            return Err(ExcType::malformed_operand(format!(
                "instruction {index} has offset {}, expected {}",
                raw.offset,
                index * 2
            )));
        }
        if let Some(feature) = raw.opcode.unsupported_feature() {
            return Err(ExcType::not_implemented(format!("{} ({feature})", raw.opcode)));
        }
        let arg = raw.arg as usize;
        let lookup = |table: &[Rc<str>], kind: &str| {
            table.get(arg).cloned().map(Operand::Name).ok_or_else(|| {
                ExcType::malformed_operand(format!("{} {kind} index {arg} out of range", raw.opcode))
            })
        };
        let jump = |target: usize| {
            if target % 2 != 0 || target > end {
                Err(ExcType::malformed_operand(format!(
                    "{} at offset {} jumps to invalid offset {target}",
                    raw.opcode, raw.offset
                )))
            } else {
                Ok(target)
            }
        };

        let operand = match raw.opcode {
            Opcode::LoadConst => consts
                .get(arg)
                .cloned()
                .map(Operand::Const)
                .ok_or_else(|| ExcType::malformed_operand(format!("LOAD_CONST index {arg} out of range")))?,
            Opcode::LoadName
            | Opcode::StoreName
            | Opcode::DeleteName
            | Opcode::LoadGlobal
            | Opcode::StoreGlobal
            | Opcode::DeleteGlobal
            | Opcode::LoadAttr
            | Opcode::StoreAttr
            | Opcode::DeleteAttr
            | Opcode::LoadMethod
            | Opcode::ImportName
            | Opcode::ImportFrom => lookup(&names, "name")?,
            Opcode::LoadFast | Opcode::StoreFast | Opcode::DeleteFast => lookup(&varnames, "varname")?,
            Opcode::JumpAbsolute
            | Opcode::JumpIfFalseOrPop
            | Opcode::JumpIfTrueOrPop
            | Opcode::PopJumpIfFalse
            | Opcode::PopJumpIfTrue
            | Opcode::ForIter => Operand::Jump(jump(arg)?),
            Opcode::JumpForward => {
                jump(raw.offset + 2 + arg)?;
                Operand::Delta(arg)
            }
            Opcode::CompareOp => u8::try_from(arg)
                .ok()
                .and_then(CompareOp::from_repr)
                .map(Operand::Compare)
                .ok_or_else(|| ExcType::malformed_operand(format!("unknown comparison {arg}")))?,
            Opcode::IsOp | Opcode::ContainsOp => Operand::Invert(arg != 0),
            Opcode::FormatValue | Opcode::MakeFunction | Opcode::CallFunctionEx => Operand::Flags(raw.arg),
            Opcode::ExtendedArg => Operand::None,
            Opcode::RotN if arg == 0 => {
                return Err(ExcType::malformed_operand(format!(
                    "ROT_N at offset {} needs at least one item",
                    raw.offset
                )));
            }
            opcode if opcode.has_arg() => Operand::Count(arg),
            _ => Operand::None,
        };
        instructions.push(Instruction {
            offset: raw.offset,
            opcode: raw.opcode,
            operand,
        });
    }
    Ok(DecodedCode { instructions })
}
