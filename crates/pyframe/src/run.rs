//! Public interface for running code units.

use std::rc::Rc;

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::{
    builtins::default_scope,
    bytecode::{CodeUnit, Context, Frame},
    exceptions::RunResult,
    io::{PrintWriter, StdPrint},
    namespace::Scope,
    resource::ResourceLimits,
    value::Value,
};

/// How call arguments are bound to a function's parameters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BindingMode {
    /// CPython's full algorithm: keywords, defaults, keyword-only parameters and
    /// the `*args` / `**kwargs` catch-alls.
    #[default]
    Full,
    /// Positional arguments only, assigned in order to the leading parameter names.
    ///
    /// Keyword arguments and defaults are discarded with a warning.
    PositionalOnly,
}

/// Configuration for a [`VirtualMachine`].
///
/// Every field has a default, so `{}` deserializes to `VmConfig::default()`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct VmConfig {
    pub limits: ResourceLimits,
    pub binding: BindingMode,
}

/// Primary interface for running code units.
///
/// Each run gets a fresh global scope that doubles as the module frame's local
/// scope. The builtin scope and the module table are shared by every run of the
/// same machine.
///
/// # Example
/// ```
/// use pyframe::{CodeBuilder, CollectStringPrint, Constant, Opcode, VirtualMachine};
///
/// let mut builder = CodeBuilder::new("<module>");
/// builder
///     .emit_name(Opcode::LoadName, "print")
///     .load_const(Constant::Str("hello".to_owned()))
///     .emit_arg(Opcode::CallFunction, 1)
///     .emit(Opcode::ReturnValue);
/// let code = builder.build().unwrap();
///
/// let mut output = CollectStringPrint::new();
/// let result = VirtualMachine::default().run_with_writer(&code, &mut output).unwrap();
/// assert_eq!(result.py_repr(), "None");
/// assert_eq!(output.output(), "hello\n");
/// ```
#[derive(Debug, Clone)]
pub struct VirtualMachine {
    config: VmConfig,
    builtins: Scope,
    modules: Scope,
}

impl Default for VirtualMachine {
    fn default() -> Self {
        Self::new(VmConfig::default())
    }
}

impl VirtualMachine {
    /// Creates a machine with the default builtin scope.
    #[must_use]
    pub fn new(config: VmConfig) -> Self {
        Self::with_builtins(config, default_scope())
    }

    /// Creates a machine resolving builtin names against `builtins` instead of the default table.
    #[must_use]
    pub fn with_builtins(config: VmConfig, builtins: Scope) -> Self {
        Self {
            config,
            builtins,
            modules: Scope::default(),
        }
    }

    /// Makes the values in `modules` importable under their keys.
    ///
    /// Nothing is imported from the host environment: `import x` succeeds only
    /// when `x` is in this table. Modules are usually [`SimpleNamespace`] values,
    /// and dotted keys such as `"pkg.sub"` name submodules.
    ///
    /// [`SimpleNamespace`]: crate::SimpleNamespace
    #[must_use]
    pub fn with_modules(mut self, modules: Scope) -> Self {
        self.modules = modules;
        self
    }

    #[must_use]
    pub fn config(&self) -> &VmConfig {
        &self.config
    }

    #[must_use]
    pub fn builtins(&self) -> &Scope {
        &self.builtins
    }

    #[must_use]
    pub fn modules(&self) -> &Scope {
        &self.modules
    }

    /// Runs `code` as a module to completion, printing to stdout.
    ///
    /// Returns the value of the final `RETURN_VALUE`, or `None` when the
    /// program counter runs off the end of the code.
    pub fn run(&self, code: &CodeUnit) -> RunResult<Value> {
        self.run_with_writer(code, &mut StdPrint)
    }

    /// Runs `code` as a module to completion, sending `print()` output to `writer`.
    pub fn run_with_writer(&self, code: &CodeUnit, writer: &mut dyn PrintWriter) -> RunResult<Value> {
        self.run_in_scope(code, Scope::default(), writer)
    }

    /// Runs `code` as a module with `globals` as both its global and local scope.
    ///
    /// The scope is left holding every name the module stored, which lets a caller
    /// inspect module state after the run.
    pub fn run_in_scope(&self, code: &CodeUnit, globals: Scope, writer: &mut dyn PrintWriter) -> RunResult<Value> {
        info!(code = %code.name, binding = ?self.config.binding, "run");
        let mut ctx =
            Context::new(writer, self.config.limits, self.config.binding).with_modules(self.modules.clone());
        let mut frame = Frame::new(Rc::new(code.clone()), self.builtins.clone(), globals.clone(), globals)?;
        let result = frame.run(&mut ctx);
        match &result {
            Ok(value) => info!(result = %value.py_repr(), "run finished"),
            Err(err) => info!(error = %err, "run failed"),
        }
        result
    }
}
