//! Bytecode representation and the virtual machine that executes it.
//!
//! # Module Structure
//!
//! - `op` - Opcode enum definitions with CPython 3.10 numbering
//! - `code` - Code units: the serialisable input of the interpreter
//! - `decode` - One-time conversion of raw instructions into typed operands
//! - `builder` - CodeBuilder for assembling code units programmatically
//! - `vm` - Evaluation frames and the dispatch loop

mod builder;
mod code;
mod decode;
mod op;
mod vm;

pub use builder::{CodeBuilder, Label};
pub use code::{CodeUnit, Constant, RawInstruction};
pub use decode::{DecodedCode, Instruction, Operand};
pub use op::{CompareOp, HAVE_ARGUMENT, InvalidOpcodeError, Opcode};
pub(crate) use vm::call_value;
pub use vm::{Context, Frame, FrameState};
