#![doc = include_str!("../../../README.md")]
mod args;
mod builtins;
mod bytecode;
mod exceptions;
mod for_iterator;
mod fstring;
mod function;
mod io;
mod namespace;
mod resource;
mod run;
mod signature;
mod types;
mod value;

pub use crate::{
    args::{ArgValues, KwargsValues},
    builtins::{Builtins, BuiltinsFunctions, default_scope},
    bytecode::{
        CodeBuilder, CodeUnit, CompareOp, Constant, Context, DecodedCode, Frame, FrameState, HAVE_ARGUMENT,
        Instruction, InvalidOpcodeError, Label, Opcode, Operand, RawInstruction,
    },
    exceptions::{ErrorReason, ExcType, RunError, RunResult, SimpleException},
    function::Function,
    io::{CollectStringPrint, NoPrint, PrintWriter, StdPrint},
    namespace::{Namespace, Scope},
    resource::{DEFAULT_MAX_RECURSION_DEPTH, ResourceLimits},
    run::{BindingMode, VirtualMachine, VmConfig},
    signature::Signature,
    types::{SimpleNamespace, Type},
    value::{BinaryOp, Value},
};
