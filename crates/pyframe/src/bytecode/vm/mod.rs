//! Evaluation frames and the dispatch loop.
//!
//! A [`Frame`] is one activation of a code unit: an operand stack, a program counter
//! and three name scopes. The dispatch loop fetches the decoded instruction at the
//! program counter, runs its handler and advances by one instruction (2 offset units)
//! unless the handler jumped or returned. Calls run a fresh frame synchronously on
//! the host stack, so recursion depth is bounded by [`ResourceLimits`].
//!
//! Opcode handlers are grouped by family into the submodules, each adding
//! `impl Frame` blocks.

mod binary;
mod call;
mod collections;
mod compare;
mod format;
mod import;

use std::rc::Rc;

use tracing::{debug, trace};

pub(crate) use call::call_value;

use crate::{
    builtins::Builtins,
    bytecode::{
        code::CodeUnit,
        decode::{DecodedCode, Instruction},
        op::Opcode,
    },
    exceptions::{ExcType, RunError, RunResult, SimpleException},
    io::PrintWriter,
    namespace::Scope,
    resource::ResourceLimits,
    run::BindingMode,
    types::Dict,
    value::{BinaryOp, Value},
};

/// Execution state of a frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameState {
    Running,
    /// `RETURN_VALUE` executed or the program counter ran off the end.
    Returned,
}

/// What the dispatch loop does after a handler completes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Step {
    /// Advance to the following instruction.
    Next,
    /// Continue at an absolute offset.
    Jump(usize),
    Return,
}

/// State shared by every frame of one run.
pub struct Context<'a> {
    pub(crate) print_writer: &'a mut dyn PrintWriter,
    pub(crate) limits: ResourceLimits,
    pub(crate) binding: BindingMode,
    /// Modules `IMPORT_NAME` can load, keyed by dotted name.
    pub(crate) modules: Scope,
    depth: usize,
}

impl<'a> Context<'a> {
    /// Creates a context with an empty module table.
    #[must_use]
    pub fn new(print_writer: &'a mut dyn PrintWriter, limits: ResourceLimits, binding: BindingMode) -> Self {
        Self {
            print_writer,
            limits,
            binding,
            modules: Scope::default(),
            depth: 0,
        }
    }

    #[must_use]
    pub fn with_modules(mut self, modules: Scope) -> Self {
        self.modules = modules;
        self
    }

    /// Number of frames currently running.
    #[must_use]
    pub fn depth(&self) -> usize {
        self.depth
    }

    fn enter(&mut self) -> RunResult<()> {
        if self.depth >= self.limits.recursion_depth() {
            return Err(ExcType::recursion_error());
        }
        self.depth += 1;
        Ok(())
    }

    fn leave(&mut self) {
        self.depth = self.depth.saturating_sub(1);
    }
}

/// One activation of a code unit.
#[derive(Debug)]
pub struct Frame {
    code: Rc<CodeUnit>,
    decoded: Rc<DecodedCode>,
    /// Operand stack, the last element is the top.
    stack: Vec<Value>,
    /// Offset of the next instruction to execute.
    pc: usize,
    state: FrameState,
    return_value: Value,
    locals: Scope,
    globals: Scope,
    builtins: Scope,
}

impl Frame {
    /// Creates a frame positioned at offset 0, decoding `code` if it has not been decoded yet.
    ///
    /// For module code pass the same scope as `globals` and `locals`.
    pub fn new(code: Rc<CodeUnit>, builtins: Scope, globals: Scope, locals: Scope) -> RunResult<Self> {
        let decoded = code.decoded()?;
        Ok(Self {
            code,
            decoded,
            stack: Vec::with_capacity(16),
            pc: 0,
            state: FrameState::Running,
            return_value: Value::None,
            locals,
            globals,
            builtins,
        })
    }

    #[must_use]
    pub fn pc(&self) -> usize {
        self.pc
    }

    #[must_use]
    pub fn state(&self) -> FrameState {
        self.state
    }

    #[must_use]
    pub fn stack(&self) -> &[Value] {
        &self.stack
    }

    #[must_use]
    pub fn locals(&self) -> &Scope {
        &self.locals
    }

    #[must_use]
    pub fn globals(&self) -> &Scope {
        &self.globals
    }

    #[must_use]
    pub fn return_value(&self) -> &Value {
        &self.return_value
    }

    // ============================================================================
    // Stack operations
    // ============================================================================

    pub fn push(&mut self, value: Value) {
        self.stack.push(value);
    }

    /// Pops the top value; an empty stack is an interpreter error.
    pub fn pop(&mut self) -> RunResult<Value> {
        self.stack.pop().ok_or_else(stack_underflow)
    }

    /// Pops the top `n` values, returned deepest first.
    pub fn popn(&mut self, n: usize) -> RunResult<Vec<Value>> {
        let start = self.stack.len().checked_sub(n).ok_or_else(stack_underflow)?;
        Ok(self.stack.split_off(start))
    }

    pub fn top(&self) -> RunResult<&Value> {
        self.stack.last().ok_or_else(stack_underflow)
    }

    /// The top `n` values, deepest first, without popping them.
    pub fn topn(&self, n: usize) -> RunResult<&[Value]> {
        let start = self.stack.len().checked_sub(n).ok_or_else(stack_underflow)?;
        Ok(&self.stack[start..])
    }

    /// Moves the top value down to depth `n - 1`, shifting the values above it up by one.
    ///
    /// `[.., x, y, z]` becomes `[.., z, x, y]` for `n = 3`.
    pub fn rotate(&mut self, n: usize) -> RunResult<()> {
        if n == 0 {
            return Err(ExcType::malformed_operand("cannot rotate zero stack items"));
        }
        let start = self.stack.len().checked_sub(n).ok_or_else(stack_underflow)?;
        self.stack[start..].rotate_right(1);
        Ok(())
    }

    /// Pushes another reference to the top value.
    pub fn dup_top(&mut self) -> RunResult<()> {
        let value = self.top()?.clone();
        self.push(value);
        Ok(())
    }

    /// Pushes references to the top two values, keeping their order.
    pub fn dup_top_two(&mut self) -> RunResult<()> {
        let pair = self.topn(2)?.to_vec();
        self.stack.extend(pair);
        Ok(())
    }

    /// The value `depth` slots from the top, 1 being the top itself.
    fn peek(&self, depth: usize) -> RunResult<&Value> {
        depth
            .checked_sub(1)
            .and_then(|d| self.stack.len().checked_sub(d + 1))
            .map(|index| &self.stack[index])
            .ok_or_else(stack_underflow)
    }

    // ============================================================================
    // Dispatch loop
    // ============================================================================

    /// Runs the frame until it returns, counting it against the recursion limit.
    pub fn run(&mut self, ctx: &mut Context<'_>) -> RunResult<Value> {
        ctx.enter()?;
        debug!(code = %self.code.name, depth = ctx.depth(), "enter frame");
        let result = self.run_loop(ctx);
        debug!(code = %self.code.name, ok = result.is_ok(), "exit frame");
        ctx.leave();
        result
    }

    fn run_loop(&mut self, ctx: &mut Context<'_>) -> RunResult<Value> {
        while self.state == FrameState::Running {
            self.step(ctx)?;
        }
        Ok(self.return_value.clone())
    }

    /// Executes the instruction at the program counter.
    ///
    /// Once the frame has returned this is a no-op.
    pub fn step(&mut self, ctx: &mut Context<'_>) -> RunResult<FrameState> {
        if self.state == FrameState::Returned {
            return Ok(self.state);
        }
        let decoded = Rc::clone(&self.decoded);
        let Some(instruction) = decoded.get(self.pc) else {
            self.state = FrameState::Returned;
            return Ok(self.state);
        };
        trace!(
            offset = instruction.offset,
            opcode = %instruction.opcode,
            stack = self.stack.len(),
            "execute"
        );
        match self.execute(ctx, instruction)? {
            Step::Next => self.pc += 2,
            Step::Jump(target) => self.pc = target,
            Step::Return => self.state = FrameState::Returned,
        }
        if self.pc >= decoded.end() {
            self.state = FrameState::Returned;
        }
        Ok(self.state)
    }

    fn execute(&mut self, ctx: &mut Context<'_>, instruction: &Instruction) -> RunResult<Step> {
        let operand = &instruction.operand;
        match instruction.opcode {
            // ============================================================
            // Stack manipulation
            // ============================================================
            Opcode::PopTop => {
                self.pop()?;
            }
            Opcode::RotTwo => self.rotate(2)?,
            Opcode::RotThree => self.rotate(3)?,
            Opcode::RotFour => self.rotate(4)?,
            Opcode::RotN => self.rotate(operand.count()?)?,
            Opcode::DupTop => self.dup_top()?,
            Opcode::DupTopTwo => self.dup_top_two()?,
            Opcode::Nop | Opcode::ExtendedArg => {}

            // ============================================================
            // Constants and names
            // ============================================================
            Opcode::LoadConst => self.push(operand.constant()?.clone()),
            Opcode::LoadName => {
                let name = operand.name()?;
                let value = self
                    .locals
                    .get(name)
                    .or_else(|| self.globals.get(name))
                    .or_else(|| self.builtins.get(name))
                    .ok_or_else(|| ExcType::name_error(name))?;
                self.push(value);
            }
            Opcode::LoadGlobal => {
                let name = operand.name()?;
                let value = self
                    .globals
                    .get(name)
                    .or_else(|| self.builtins.get(name))
                    .ok_or_else(|| ExcType::name_error(name))?;
                self.push(value);
            }
            Opcode::LoadFast => {
                let name = operand.name()?;
                let value = self
                    .locals
                    .get(name)
                    .ok_or_else(|| ExcType::unbound_local_error(name))?;
                self.push(value);
            }
            Opcode::StoreName | Opcode::StoreFast => {
                let value = self.pop()?;
                self.locals.set(Rc::clone(operand.name()?), value);
            }
            Opcode::StoreGlobal => {
                let value = self.pop()?;
                self.globals.set(Rc::clone(operand.name()?), value);
            }
            Opcode::DeleteName => {
                let name = operand.name()?;
                self.locals.remove(name).ok_or_else(|| ExcType::name_error(name))?;
            }
            Opcode::DeleteGlobal => {
                let name = operand.name()?;
                self.globals.remove(name).ok_or_else(|| ExcType::name_error(name))?;
            }
            Opcode::DeleteFast => {
                let name = operand.name()?;
                self.locals
                    .remove(name)
                    .ok_or_else(|| ExcType::unbound_local_error(name))?;
            }
            Opcode::SetupAnnotations => {
                if !self.locals.contains("__annotations__") {
                    self.locals.set("__annotations__".into(), Value::new_dict(Dict::new()));
                }
            }
            Opcode::LoadAssertionError => self.push(Value::Builtin(Builtins::ExcType(ExcType::AssertionError))),

            // ============================================================
            // Attributes
            // ============================================================
            Opcode::LoadAttr => {
                let name = operand.name()?;
                let object = self.pop()?;
                let value = object
                    .py_getattr(name)?
                    .ok_or_else(|| ExcType::attribute_error(object.py_type(), name))?;
                self.push(value);
            }
            Opcode::StoreAttr => {
                let object = self.pop()?;
                let value = self.pop()?;
                object.py_setattr(operand.name()?, value)?;
            }
            Opcode::DeleteAttr => {
                let object = self.pop()?;
                object.py_delattr(operand.name()?)?;
            }

            // ============================================================
            // Operators
            // ============================================================
            Opcode::UnaryPositive => self.unary_positive()?,
            Opcode::UnaryNegative => self.unary_negative()?,
            Opcode::UnaryNot => {
                let value = self.pop()?;
                self.push(Value::Bool(!value.py_bool()));
            }
            Opcode::UnaryInvert => self.unary_invert()?,
            Opcode::BinaryAdd => self.binary_op(BinaryOp::Add)?,
            Opcode::BinarySubtract => self.binary_op(BinaryOp::Sub)?,
            Opcode::BinaryMultiply => self.binary_op(BinaryOp::Mult)?,
            Opcode::BinaryTrueDivide => self.binary_op(BinaryOp::Div)?,
            Opcode::BinaryFloorDivide => self.binary_op(BinaryOp::FloorDiv)?,
            Opcode::BinaryModulo => self.binary_op(BinaryOp::Mod)?,
            Opcode::BinaryPower => self.binary_op(BinaryOp::Pow)?,
            Opcode::BinaryMatrixMultiply => self.binary_op(BinaryOp::MatMul)?,
            Opcode::BinaryLshift => self.binary_op(BinaryOp::LShift)?,
            Opcode::BinaryRshift => self.binary_op(BinaryOp::RShift)?,
            Opcode::BinaryAnd => self.binary_op(BinaryOp::And)?,
            Opcode::BinaryOr => self.binary_op(BinaryOp::Or)?,
            Opcode::BinaryXor => self.binary_op(BinaryOp::Xor)?,
            Opcode::InplaceAdd => self.inplace_op(BinaryOp::Add)?,
            Opcode::InplaceSubtract => self.inplace_op(BinaryOp::Sub)?,
            Opcode::InplaceMultiply => self.inplace_op(BinaryOp::Mult)?,
            Opcode::InplaceTrueDivide => self.inplace_op(BinaryOp::Div)?,
            Opcode::InplaceFloorDivide => self.inplace_op(BinaryOp::FloorDiv)?,
            Opcode::InplaceModulo => self.inplace_op(BinaryOp::Mod)?,
            Opcode::InplacePower => self.inplace_op(BinaryOp::Pow)?,
            Opcode::InplaceMatrixMultiply => self.inplace_op(BinaryOp::MatMul)?,
            Opcode::InplaceLshift => self.inplace_op(BinaryOp::LShift)?,
            Opcode::InplaceRshift => self.inplace_op(BinaryOp::RShift)?,
            Opcode::InplaceAnd => self.inplace_op(BinaryOp::And)?,
            Opcode::InplaceOr => self.inplace_op(BinaryOp::Or)?,
            Opcode::InplaceXor => self.inplace_op(BinaryOp::Xor)?,
            Opcode::BinarySubscr => self.binary_subscr()?,
            Opcode::StoreSubscr => self.store_subscr()?,
            Opcode::DeleteSubscr => self.delete_subscr()?,
            Opcode::CompareOp => self.compare_op(operand.compare()?)?,
            Opcode::IsOp => self.is_op(operand.invert()?)?,
            Opcode::ContainsOp => self.contains_op(operand.invert()?)?,

            // ============================================================
            // Containers
            // ============================================================
            Opcode::BuildTuple => self.build_tuple(operand.count()?)?,
            Opcode::BuildList => self.build_list(operand.count()?)?,
            Opcode::BuildSet => self.build_set(operand.count()?)?,
            Opcode::BuildMap => self.build_map(operand.count()?)?,
            Opcode::BuildConstKeyMap => self.build_const_key_map(operand.count()?)?,
            Opcode::BuildSlice => self.build_slice(operand.count()?)?,
            Opcode::BuildString => self.build_string(operand.count()?)?,
            Opcode::ListToTuple => self.list_to_tuple()?,
            Opcode::ListAppend => self.list_append(operand.count()?)?,
            Opcode::ListExtend => self.list_extend(operand.count()?)?,
            Opcode::SetAdd => self.set_add(operand.count()?)?,
            Opcode::SetUpdate => self.set_update(operand.count()?)?,
            Opcode::MapAdd => self.map_add(operand.count()?)?,
            Opcode::DictUpdate => self.dict_update(operand.count()?)?,
            Opcode::DictMerge => self.dict_merge(operand.count()?)?,
            Opcode::UnpackSequence => self.unpack_sequence(operand.count()?)?,
            Opcode::UnpackEx => self.unpack_ex(operand.count()?)?,
            Opcode::FormatValue => self.format_value(operand.flags()?)?,

            // ============================================================
            // Control flow
            // ============================================================
            Opcode::JumpAbsolute => return Ok(Step::Jump(operand.jump()?)),
            Opcode::JumpForward => return Ok(Step::Jump(self.pc + 2 + operand.delta()?)),
            Opcode::PopJumpIfFalse => {
                if !self.pop()?.py_bool() {
                    return Ok(Step::Jump(operand.jump()?));
                }
            }
            Opcode::PopJumpIfTrue => {
                if self.pop()?.py_bool() {
                    return Ok(Step::Jump(operand.jump()?));
                }
            }
            Opcode::JumpIfFalseOrPop => {
                if !self.top()?.py_bool() {
                    return Ok(Step::Jump(operand.jump()?));
                }
                self.pop()?;
            }
            Opcode::JumpIfTrueOrPop => {
                if self.top()?.py_bool() {
                    return Ok(Step::Jump(operand.jump()?));
                }
                self.pop()?;
            }
            Opcode::GetIter => {
                let iterable = self.pop()?;
                self.push(iterable.py_iter()?);
            }
            Opcode::ForIter => match self.top()?.py_next()? {
                Some(item) => self.push(item),
                None => {
                    self.pop()?;
                    return Ok(Step::Jump(operand.jump()?));
                }
            },
            Opcode::ReturnValue => {
                self.return_value = self.pop()?;
                return Ok(Step::Return);
            }
            Opcode::RaiseVarargs => return Err(self.raise_varargs(operand.count()?)?),
            Opcode::PrintExpr => {
                let value = self.pop()?;
                if !matches!(value, Value::None) {
                    ctx.print_writer.stdout_write(value.py_repr().into());
                    ctx.print_writer.stdout_push('\n');
                }
            }

            // ============================================================
            // Functions and calls
            // ============================================================
            Opcode::MakeFunction => self.make_function(operand.flags()?)?,
            Opcode::CallFunction => self.call_function(ctx, operand.count()?)?,
            Opcode::CallFunctionKw => self.call_function_kw(ctx, operand.count()?)?,
            Opcode::CallFunctionEx => self.call_function_ex(ctx, operand.flags()?)?,
            Opcode::LoadMethod => self.load_method(operand.name()?)?,
            Opcode::CallMethod => self.call_method(ctx, operand.count()?)?,

            // ============================================================
            // Imports
            // ============================================================
            Opcode::ImportName => self.import_name(ctx, operand.name()?)?,
            Opcode::ImportFrom => self.import_from(operand.name()?)?,
            Opcode::ImportStar => self.import_star()?,

            opcode => {
                let feature = opcode.unsupported_feature().unwrap_or("this opcode");
                return Err(ExcType::not_implemented(format!("{opcode} ({feature})")));
            }
        }
        Ok(Step::Next)
    }

    /// Builds the error raised by `RAISE_VARARGS`.
    ///
    /// With two operands the cause is popped and discarded.
    fn raise_varargs(&mut self, argc: usize) -> RunResult<RunError> {
        let exc = match argc {
            0 => return Ok(SimpleException::new_msg(ExcType::RuntimeError, "No active exception to reraise").into()),
            1 => self.pop()?,
            2 => {
                self.pop()?;
                self.pop()?
            }
            n => return Err(ExcType::malformed_operand(format!("bad RAISE_VARARGS oparg {n}"))),
        };
        Ok(match exc {
            Value::Exception(exc) => RunError::Exc((*exc).clone()),
            Value::Builtin(Builtins::ExcType(exc_type)) => SimpleException::new_none(exc_type).into(),
            _ => ExcType::type_error("exceptions must derive from BaseException"),
        })
    }
}

fn stack_underflow() -> RunError {
    RunError::internal("stack underflow")
}
