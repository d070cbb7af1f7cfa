//! Programmatic assembler for code units.
//!
//! `CodeBuilder` assigns offsets, interns names, collects fast locals and patches
//! jump labels, so tests and front-ends can produce `CodeUnit`s without counting
//! offsets by hand.

use indexmap::{IndexMap, IndexSet};

use crate::{
    bytecode::{
        code::{CodeUnit, Constant, RawInstruction},
        op::Opcode,
    },
    exceptions::{ExcType, RunResult},
};

/// A forward or backward jump target, bound with [`CodeBuilder::bind`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Label(usize);

#[derive(Debug)]
enum PendingArg {
    Raw(u32),
    Fast(String),
    Label(Label),
}

#[derive(Debug)]
struct Pending {
    opcode: Opcode,
    arg: PendingArg,
}

/// Builds a [`CodeUnit`] one instruction at a time.
///
/// ```
/// use pyframe::{CodeBuilder, Constant, Opcode, VirtualMachine};
///
/// let mut builder = CodeBuilder::new("<module>");
/// builder.load_const(Constant::Int(40));
/// builder.load_const(Constant::Int(2));
/// builder.emit(Opcode::BinaryAdd);
/// builder.emit(Opcode::ReturnValue);
/// let code = builder.build().unwrap();
///
/// let result = VirtualMachine::default().run(&code).unwrap();
/// assert_eq!(result.py_repr(), "42");
/// ```
#[derive(Debug)]
pub struct CodeBuilder {
    name: String,
    posonly: Vec<String>,
    args: Vec<String>,
    kwonly: Vec<String>,
    varargs: Option<String>,
    varkeywords: Option<String>,
    defaults: Vec<Constant>,
    kwdefaults: IndexMap<String, Constant>,
    consts: Vec<Constant>,
    names: IndexSet<String>,
    locals: IndexSet<String>,
    code: Vec<Pending>,
    labels: Vec<Option<usize>>,
}

impl CodeBuilder {
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            posonly: Vec::new(),
            args: Vec::new(),
            kwonly: Vec::new(),
            varargs: None,
            varkeywords: None,
            defaults: Vec::new(),
            kwdefaults: IndexMap::new(),
            consts: Vec::new(),
            names: IndexSet::new(),
            locals: IndexSet::new(),
            code: Vec::new(),
            labels: Vec::new(),
        }
    }

    // ============================================================================
    // Signature
    // ============================================================================

    #[must_use]
    pub fn posonly(mut self, names: &[&str]) -> Self {
        self.posonly = names.iter().map(ToString::to_string).collect();
        self
    }

    /// Positional-or-keyword parameters.
    #[must_use]
    pub fn args(mut self, names: &[&str]) -> Self {
        self.args = names.iter().map(ToString::to_string).collect();
        self
    }

    #[must_use]
    pub fn kwonly(mut self, names: &[&str]) -> Self {
        self.kwonly = names.iter().map(ToString::to_string).collect();
        self
    }

    #[must_use]
    pub fn varargs(mut self, name: &str) -> Self {
        self.varargs = Some(name.to_owned());
        self
    }

    #[must_use]
    pub fn varkeywords(mut self, name: &str) -> Self {
        self.varkeywords = Some(name.to_owned());
        self
    }

    /// Defaults for the trailing positional parameters.
    #[must_use]
    pub fn defaults(mut self, defaults: Vec<Constant>) -> Self {
        self.defaults = defaults;
        self
    }

    #[must_use]
    pub fn kwdefault(mut self, name: &str, value: Constant) -> Self {
        self.kwdefaults.insert(name.to_owned(), value);
        self
    }

    // ============================================================================
    // Emission
    // ============================================================================

    /// Appends an instruction without an argument.
    pub fn emit(&mut self, opcode: Opcode) -> &mut Self {
        self.emit_arg(opcode, 0)
    }

    /// Appends an instruction with a raw argument.
    pub fn emit_arg(&mut self, opcode: Opcode, arg: u32) -> &mut Self {
        self.code.push(Pending {
            opcode,
            arg: PendingArg::Raw(arg),
        });
        self
    }

    /// Appends `LOAD_CONST`, adding `value` to the constant pool.
    pub fn load_const(&mut self, value: Constant) -> &mut Self {
        let index = self.add_const(value);
        self.emit_arg(Opcode::LoadConst, index)
    }

    /// Adds a constant to the pool, returning its index.
    pub fn add_const(&mut self, value: Constant) -> u32 {
        let index = match self.consts.iter().position(|c| same_constant(c, &value)) {
            Some(index) => index,
            None => {
                self.consts.push(value);
                self.consts.len() - 1
            }
        };
        index as u32
    }

    /// Appends an instruction whose argument names a variable or attribute.
    ///
    /// The `*_FAST` family resolves against `varnames`, everything else against `names`.
    pub fn emit_name(&mut self, opcode: Opcode, name: &str) -> &mut Self {
        if matches!(opcode, Opcode::LoadFast | Opcode::StoreFast | Opcode::DeleteFast) {
            self.locals.insert(name.to_owned());
            self.code.push(Pending {
                opcode,
                arg: PendingArg::Fast(name.to_owned()),
            });
            return self;
        }
        let (index, _) = self.names.insert_full(name.to_owned());
        self.emit_arg(opcode, index as u32)
    }

    #[must_use]
    pub fn new_label(&mut self) -> Label {
        self.labels.push(None);
        Label(self.labels.len() - 1)
    }

    /// Binds `label` to the offset of the next emitted instruction.
    pub fn bind(&mut self, label: Label) -> &mut Self {
        self.labels[label.0] = Some(self.code.len() * 2);
        self
    }

    /// Appends a jump to `label`; the argument is patched in [`build`](Self::build).
    pub fn emit_jump(&mut self, opcode: Opcode, label: Label) -> &mut Self {
        self.code.push(Pending {
            opcode,
            arg: PendingArg::Label(label),
        });
        self
    }

    /// Offset the next emitted instruction will have.
    #[must_use]
    pub fn next_offset(&self) -> usize {
        self.code.len() * 2
    }

    // ============================================================================
    // Finishing
    // ============================================================================

    /// Resolves labels and fast locals and produces the code unit.
    ///
    /// Fails with `ValueError` when a jump refers to a label that was never bound.
    pub fn build(self) -> RunResult<CodeUnit> {
        let mut varnames: IndexSet<String> = IndexSet::new();
        let params = self
            .posonly
            .iter()
            .chain(&self.args)
            .chain(&self.kwonly)
            .chain(&self.varargs)
            .chain(&self.varkeywords);
        for name in params {
            varnames.insert(name.clone());
        }
        for name in &self.locals {
            varnames.insert(name.clone());
        }

        let mut instructions = Vec::with_capacity(self.code.len());
        for (index, pending) in self.code.iter().enumerate() {
            let offset = index * 2;
            let arg = match &pending.arg {
                PendingArg::Raw(arg) => *arg,
                PendingArg::Fast(name) => varnames.get_index_of(name).unwrap_or_default() as u32,
                PendingArg::Label(label) => {
                    let target = self.labels[label.0]
                        .ok_or_else(|| ExcType::malformed_operand(format!("unbound label {}", label.0)))?;
                    let arg = if pending.opcode == Opcode::JumpForward {
                        target.checked_sub(offset + 2).ok_or_else(|| {
                            ExcType::malformed_operand(format!("JUMP_FORWARD at offset {offset} jumps backwards"))
                        })?
                    } else {
                        target
                    };
                    arg as u32
                }
            };
            instructions.push(RawInstruction::new(offset, pending.opcode, arg));
        }

        let mut code = CodeUnit::new(self.name);
        code.posonly_arg_count = self.posonly.len();
        code.arg_count = self.posonly.len() + self.args.len();
        code.kwonly_arg_count = self.kwonly.len();
        code.varargs = self.varargs.is_some();
        code.varkeywords = self.varkeywords.is_some();
        code.varnames = varnames.into_iter().collect();
        code.names = self.names.into_iter().collect();
        code.consts = self.consts;
        code.defaults = self.defaults;
        code.kwdefaults = self.kwdefaults;
        code.instructions = instructions;
        Ok(code)
    }
}

/// Constant-pool deduplication; bools and ints stay distinct like CPython's.
fn same_constant(a: &Constant, b: &Constant) -> bool {
    match (a, b) {
        (Constant::Float(x), Constant::Float(y)) => x.to_bits() == y.to_bits(),
        (Constant::Code(_), _) | (_, Constant::Code(_)) => false,
        _ => a == b,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn labels_resolve_to_offsets() {
        let mut builder = CodeBuilder::new("<module>");
        let end = builder.new_label();
        let top = builder.new_label();
        builder.bind(top);
        builder.emit_jump(Opcode::PopJumpIfFalse, end);
        builder.emit_jump(Opcode::JumpForward, end);
        builder.emit_jump(Opcode::JumpAbsolute, top);
        builder.bind(end);
        builder.emit(Opcode::ReturnValue);
        let code = builder.build().unwrap();
        let args: Vec<u32> = code.instructions.iter().map(|i| i.arg).collect();
        assert_eq!(args, vec![6, 2, 0, 0]);
    }

    #[test]
    fn params_come_first_in_varnames() {
        let mut builder = CodeBuilder::new("f").args(&["a", "b"]).varargs("rest");
        builder.emit_name(Opcode::LoadFast, "tmp");
        builder.emit_name(Opcode::LoadFast, "b");
        let code = builder.build().unwrap();
        assert_eq!(code.varnames, vec!["a", "b", "rest", "tmp"]);
        assert_eq!(code.instructions[0].arg, 3);
        assert_eq!(code.instructions[1].arg, 1);
        assert_eq!(code.arg_count, 2);
        assert!(code.varargs);
    }

    #[test]
    fn names_and_constants_are_interned() {
        let mut builder = CodeBuilder::new("<module>");
        builder.emit_name(Opcode::LoadName, "x");
        builder.emit_name(Opcode::StoreName, "x");
        builder.load_const(Constant::Int(1));
        builder.load_const(Constant::Bool(true));
        builder.load_const(Constant::Int(1));
        let code = builder.build().unwrap();
        assert_eq!(code.names, vec!["x"]);
        assert_eq!(code.consts, vec![Constant::Int(1), Constant::Bool(true)]);
        assert_eq!(code.instructions[4].arg, 0);
    }

    #[test]
    fn unbound_labels_fail() {
        let mut builder = CodeBuilder::new("<module>");
        let label = builder.new_label();
        builder.emit_jump(Opcode::JumpAbsolute, label);
        assert_eq!(builder.build().unwrap_err().to_string(), "ValueError: unbound label 0");
    }
}
