//! User-defined functions created by `MAKE_FUNCTION`.

use std::{fmt, rc::Rc};

use indexmap::IndexMap;
use tracing::debug;

use crate::{
    args::ArgValues,
    bytecode::{CodeUnit, Context, Frame},
    exceptions::RunResult,
    namespace::{Namespace, Scope, WeakScope},
    run::BindingMode,
    signature::Signature,
    value::Value,
};

/// A callable built from a code unit and the scope it was defined in.
///
/// `captured` is a copy of the defining frame's local scope taken when the function
/// object was created. Every call starts from a fresh copy of it, with the bound
/// arguments written on top. The global scope is held weakly because the function
/// itself usually lives in it.
pub struct Function {
    name: Rc<str>,
    code: Rc<CodeUnit>,
    signature: Signature,
    defaults: Vec<Value>,
    kwdefaults: IndexMap<Rc<str>, Value>,
    captured: Namespace,
    globals: WeakScope,
    builtins: Scope,
}

impl fmt::Debug for Function {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Function")
            .field("name", &self.name)
            .field("signature", &self.signature)
            .field("defaults", &self.defaults.len())
            .field("captured", &self.captured.len())
            .finish_non_exhaustive()
    }
}

impl Function {
    /// Creates a function, deriving its signature from `code`.
    ///
    /// Fails with `ValueError` if the code unit's parameter counts are inconsistent.
    pub fn new(
        name: Rc<str>,
        code: Rc<CodeUnit>,
        defaults: Vec<Value>,
        kwdefaults: IndexMap<Rc<str>, Value>,
        captured: Namespace,
        globals: WeakScope,
        builtins: Scope,
    ) -> RunResult<Self> {
        let signature = Signature::from_code(&code)?;
        Ok(Self {
            name,
            code,
            signature,
            defaults,
            kwdefaults,
            captured,
            globals,
            builtins,
        })
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn code(&self) -> &Rc<CodeUnit> {
        &self.code
    }

    #[must_use]
    pub fn signature(&self) -> &Signature {
        &self.signature
    }

    /// Binds `args`, builds a new frame and runs it to completion.
    ///
    /// A function outlives the frame that defined it, but not its global scope.
    /// Once every [`Scope`] handle to the defining module's globals is dropped,
    /// calling it fails with an internal error. Hosts that keep functions after a
    /// run should pass their own globals to [`VirtualMachine::run_in_scope`] and
    /// hold on to them.
    ///
    /// [`VirtualMachine::run_in_scope`]: crate::VirtualMachine::run_in_scope
    pub fn call(&self, ctx: &mut Context<'_>, args: ArgValues) -> RunResult<Value> {
        let bound = match ctx.binding {
            BindingMode::Full => self.signature.bind(&self.name, args, &self.defaults, &self.kwdefaults)?,
            BindingMode::PositionalOnly => self.signature.bind_positional_only(&self.name, args)?,
        };
        debug!(function = %self.name, args = bound.len(), "call");

        let mut locals = self.captured.clone();
        for (name, value) in bound {
            locals.set(name, value);
        }
        let globals = self.globals.upgrade()?;
        let mut frame = Frame::new(Rc::clone(&self.code), self.builtins.clone(), globals, Scope::new(locals))?;
        frame.run(ctx)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        bytecode::{CodeBuilder, Constant, Opcode},
        exceptions::RunError,
        io::CollectStringPrint,
        resource::ResourceLimits,
        run::VirtualMachine,
    };

    /// `def f(): return g` at module level, followed by `g = 5` and `return f`.
    fn module() -> CodeUnit {
        let mut f = CodeBuilder::new("f");
        f.emit_name(Opcode::LoadGlobal, "g").emit(Opcode::ReturnValue);
        let f = f.build().unwrap();

        let mut builder = CodeBuilder::new("<module>");
        builder
            .load_const(Constant::Code(f.into()))
            .load_const(Constant::Str("f".to_owned()))
            .emit_arg(Opcode::MakeFunction, 0)
            .emit_name(Opcode::StoreName, "f")
            .load_const(Constant::Int(5))
            .emit_name(Opcode::StoreName, "g")
            .emit_name(Opcode::LoadName, "f")
            .emit(Opcode::ReturnValue);
        builder.build().unwrap()
    }

    fn call(function: &Value) -> RunResult<Value> {
        let Value::Function(function) = function else {
            panic!("expected a function, got {}", function.py_repr());
        };
        let mut out = CollectStringPrint::new();
        let mut ctx = Context::new(&mut out, ResourceLimits::default(), BindingMode::Full);
        function.call(&mut ctx, ArgValues::Empty)
    }

    #[test]
    fn host_held_globals_keep_functions_callable() {
        let globals = Scope::default();
        let vm = VirtualMachine::default();
        let f = vm
            .run_in_scope(&module(), globals.clone(), &mut CollectStringPrint::new())
            .unwrap();
        assert_eq!(call(&f).unwrap().py_repr(), "5");
    }

    #[test]
    fn dropped_globals_make_functions_uncallable() {
        let f = VirtualMachine::default()
            .run_with_writer(&module(), &mut CollectStringPrint::new())
            .unwrap();
        let err = call(&f).unwrap_err();
        assert_eq!(err, RunError::internal("global scope of function no longer exists"));
    }
}
