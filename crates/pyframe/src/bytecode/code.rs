//! Compiled code units, the input format of the interpreter.

use std::{cell::OnceCell, rc::Rc};

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::{
    bytecode::{
        decode::{DecodedCode, decode},
        op::Opcode,
    },
    exceptions::{ExcType, RunResult},
    value::Value,
};

/// An immutable compiled routine: a module body or a function body.
///
/// `varnames` lists parameters first, in segment order (positional-only,
/// positional-or-keyword, keyword-only, `*args` name, `**kwargs` name), followed by
/// the other fast locals. The count fields partition that prefix.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct CodeUnit {
    pub name: String,
    /// Number of positional parameters, including positional-only ones.
    pub arg_count: usize,
    pub posonly_arg_count: usize,
    pub kwonly_arg_count: usize,
    /// Whether a catch-all positional parameter follows the keyword-only ones.
    pub varargs: bool,
    /// Whether a catch-all keyword parameter comes last.
    pub varkeywords: bool,
    pub varnames: Vec<String>,
    pub names: Vec<String>,
    pub consts: Vec<Constant>,
    /// Defaults of the trailing positional parameters.
    pub defaults: Vec<Constant>,
    pub kwdefaults: IndexMap<String, Constant>,
    pub instructions: Vec<RawInstruction>,
    #[serde(skip)]
    decoded: OnceCell<Rc<DecodedCode>>,
}

impl CodeUnit {
    /// Creates an empty code unit with no parameters and no instructions.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    /// Returns the decoded instruction table, decoding on first use.
    ///
    /// Decoding is pure, so a failure is reported again on every call.
    pub fn decoded(&self) -> RunResult<Rc<DecodedCode>> {
        if let Some(decoded) = self.decoded.get() {
            return Ok(Rc::clone(decoded));
        }
        let decoded = Rc::new(decode(self)?);
        let _ = self.decoded.set(Rc::clone(&decoded));
        Ok(decoded)
    }

    /// Number of entries in `varnames` that are parameters.
    #[must_use]
    pub fn param_count(&self) -> usize {
        self.arg_count + self.kwonly_arg_count + usize::from(self.varargs) + usize::from(self.varkeywords)
    }
}

/// A compile-time constant from the constant pool.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Constant {
    None,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
    Tuple(Vec<Constant>),
    Code(Rc<CodeUnit>),
}

impl PartialEq for CodeUnit {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name
            && self.arg_count == other.arg_count
            && self.posonly_arg_count == other.posonly_arg_count
            && self.kwonly_arg_count == other.kwonly_arg_count
            && self.varargs == other.varargs
            && self.varkeywords == other.varkeywords
            && self.varnames == other.varnames
            && self.names == other.names
            && self.consts == other.consts
            && self.defaults == other.defaults
            && self.kwdefaults == other.kwdefaults
            && self.instructions == other.instructions
    }
}

impl Constant {
    #[must_use]
    pub fn to_value(&self) -> Value {
        match self {
            Self::None => Value::None,
            Self::Bool(b) => Value::Bool(*b),
            Self::Int(i) => Value::Int(*i),
            Self::Float(f) => Value::Float(*f),
            Self::Str(s) => Value::from(s.as_str()),
            Self::Tuple(items) => Value::new_tuple(items.iter().map(Self::to_value).collect()),
            Self::Code(code) => Value::Code(Rc::clone(code)),
        }
    }
}

/// One undecoded instruction.
///
/// Offsets advance by 2 per instruction. Jump arguments are already in offset
/// units: absolute jumps and `FOR_ITER` carry the target offset, `JUMP_FORWARD`
/// carries the distance from the following instruction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawInstruction {
    pub offset: usize,
    pub opcode: Opcode,
    #[serde(default)]
    pub arg: u32,
}

impl RawInstruction {
    #[must_use]
    pub fn new(offset: usize, opcode: Opcode, arg: u32) -> Self {
        Self { offset, opcode, arg }
    }

    /// Converts CPython 3.10 wordcode (`co_code`) into raw instructions.
    ///
    /// `EXTENDED_ARG` prefixes are folded into the following argument and kept in
    /// the stream as no-ops so offsets stay contiguous. 3.10 encodes jump arguments
    /// in instruction units; they are rescaled to offsets here.
    pub fn parse_wordcode(bytes: &[u8]) -> RunResult<Vec<Self>> {
        if bytes.len() % 2 != 0 {
            return Err(ExcType::malformed_operand("wordcode has an odd number of bytes"));
        }
        let mut instructions = Vec::with_capacity(bytes.len() / 2);
        let mut extended: u32 = 0;
        for (index, unit) in bytes.chunks_exact(2).enumerate() {
            let offset = index * 2;
            let opcode = Opcode::try_from(unit[0]).map_err(ExcType::malformed_operand)?;
            let arg = (extended << 8) | u32::from(unit[1]);
            if opcode == Opcode::ExtendedArg {
                extended = arg;
                instructions.push(Self::new(offset, opcode, 0));
                continue;
            }
            extended = 0;
            let arg = if opcode.is_absolute_jump() || opcode == Opcode::JumpForward {
                arg * 2
            } else if opcode == Opcode::ForIter {
                let target = offset + 2 + arg as usize * 2;
                u32::try_from(target).map_err(|_| ExcType::malformed_operand("jump target out of range"))?
            } else {
                arg
            };
            instructions.push(Self::new(offset, opcode, arg));
        }
        Ok(instructions)
    }
}
