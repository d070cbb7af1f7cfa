//! Import opcodes, resolved against the module table of the run's [`Context`].

use std::rc::Rc;

use tracing::debug;

use super::{Context, Frame};
use crate::{
    exceptions::{ExcType, RunResult},
    value::Value,
};

impl Frame {
    /// `IMPORT_NAME(name)`: pops the fromlist and the level, pushes the module.
    ///
    /// With an empty fromlist a dotted import pushes the top-level package,
    /// so `import a.b` binds `a`.
    pub(super) fn import_name(&mut self, ctx: &Context<'_>, name: &Rc<str>) -> RunResult<()> {
        let fromlist = self.pop()?;
        let level = self.pop()?;
        if level.as_int().is_some_and(|level| level > 0) {
            return Err(ExcType::import_error(
                "attempted relative import with no known parent package",
            ));
        }
        let module = ctx.modules.get(name).ok_or_else(|| ExcType::module_not_found(name))?;
        let bound = match name.split_once('.') {
            Some((package, _)) if !fromlist.py_bool() => ctx
                .modules
                .get(package)
                .ok_or_else(|| ExcType::module_not_found(package))?,
            _ => module,
        };
        debug!(module = %name, "import");
        self.push(bound);
        Ok(())
    }

    /// `IMPORT_FROM(name)`: pushes `name` from the module on top, leaving the module in place.
    pub(super) fn import_from(&mut self, name: &Rc<str>) -> RunResult<()> {
        let module = self.top()?;
        let value = module.py_getattr(name)?.ok_or_else(|| {
            ExcType::import_error(format!(
                "cannot import name '{name}' from '{}' (unknown location)",
                module_name(module)
            ))
        })?;
        self.push(value);
        Ok(())
    }

    /// `IMPORT_STAR`: pops the module and copies its public names into the local scope.
    ///
    /// A module defining `__all__` exports exactly those names; otherwise every
    /// attribute not starting with an underscore is exported.
    pub(super) fn import_star(&mut self) -> RunResult<()> {
        let module = self.pop()?;
        let exported = match module.py_getattr("__all__")? {
            Some(all) => {
                let mut exported = Vec::new();
                for name in all.collect_values()? {
                    let Value::Str(name) = name else {
                        return Err(ExcType::type_error(format!(
                            "Item in {}.__all__ must be str, not {}",
                            module_name(&module),
                            name.py_type()
                        )));
                    };
                    let value = module
                        .py_getattr(&name)?
                        .ok_or_else(|| ExcType::attribute_error(module.py_type(), &name))?;
                    exported.push((name, value));
                }
                exported
            }
            None => match &module {
                Value::Namespace(namespace) => namespace
                    .borrow()
                    .iter()
                    .filter(|(name, _)| !name.starts_with('_'))
                    .map(|(name, value)| (Rc::clone(name), value.clone()))
                    .collect(),
                _ => {
                    return Err(ExcType::import_error(
                        "from-import-* object has no __dict__ and no __all__",
                    ));
                }
            },
        };
        debug!(module = %module_name(&module), names = exported.len(), "import *");
        for (name, value) in exported {
            self.locals.set(name, value);
        }
        Ok(())
    }
}

/// The module's `__name__`, as CPython reports it in import errors.
fn module_name(module: &Value) -> String {
    match module.py_getattr("__name__") {
        Ok(Some(Value::Str(name))) => name.to_string(),
        _ => "<unknown module name>".to_owned(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        bytecode::CodeUnit, io::CollectStringPrint, namespace::Scope, resource::ResourceLimits, run::BindingMode,
        types::SimpleNamespace,
    };

    fn module(pairs: &[(&str, Value)]) -> Value {
        let mut namespace = SimpleNamespace::new();
        for (name, value) in pairs {
            namespace.set(Rc::from(*name), value.clone());
        }
        Value::new_namespace(namespace)
    }

    fn modules() -> Scope {
        let modules = Scope::default();
        let math = module(&[
            ("__name__", Value::from("mathlib")),
            ("answer", Value::Int(42)),
            ("_private", Value::Int(1)),
        ]);
        modules.set("mathlib".into(), math);
        modules.set("pkg".into(), module(&[("__name__", Value::from("pkg"))]));
        modules.set("pkg.sub".into(), module(&[("__name__", Value::from("pkg.sub"))]));
        modules
    }

    fn frame(values: Vec<Value>) -> Frame {
        let globals = Scope::default();
        let mut frame =
            Frame::new(Rc::new(CodeUnit::new("<test>")), Scope::default(), globals.clone(), globals).unwrap();
        for value in values {
            frame.push(value);
        }
        frame
    }

    fn import(name: &str, fromlist: Value, level: i64) -> RunResult<Value> {
        let mut out = CollectStringPrint::new();
        let ctx = Context::new(&mut out, ResourceLimits::default(), BindingMode::Full).with_modules(modules());
        let mut f = frame(vec![Value::Int(level), fromlist]);
        f.import_name(&ctx, &Rc::from(name))?;
        assert_eq!(f.stack().len(), 1);
        f.pop()
    }

    #[test]
    fn dotted_import_binds_the_package() {
        let module = import("pkg.sub", Value::None, 0).unwrap();
        assert_eq!(module.py_getattr("__name__").unwrap().unwrap().py_str(), "pkg");
        let fromlist = Value::new_tuple(vec![Value::from("x")]);
        let module = import("pkg.sub", fromlist, 0).unwrap();
        assert_eq!(module.py_getattr("__name__").unwrap().unwrap().py_str(), "pkg.sub");
    }

    #[test]
    fn missing_and_relative_imports_fail() {
        let err = import("os", Value::None, 0).unwrap_err();
        assert_eq!(err.to_string(), "ModuleNotFoundError: No module named 'os'");
        let err = import("mathlib", Value::None, 1).unwrap_err();
        assert_eq!(
            err.to_string(),
            "ImportError: attempted relative import with no known parent package"
        );
    }

    #[test]
    fn import_from_keeps_the_module() {
        let math = modules().get("mathlib").unwrap();
        let mut f = frame(vec![math.clone()]);
        f.import_from(&Rc::from("answer")).unwrap();
        assert_eq!(f.stack().len(), 2);
        assert_eq!(f.pop().unwrap().py_repr(), "42");

        let err = f.import_from(&Rc::from("nope")).unwrap_err();
        assert_eq!(
            err.to_string(),
            "ImportError: cannot import name 'nope' from 'mathlib' (unknown location)"
        );
    }

    #[test]
    fn import_star_copies_public_names() {
        let math = modules().get("mathlib").unwrap();
        let mut f = frame(vec![math]);
        f.import_star().unwrap();
        assert!(f.stack().is_empty());
        assert_eq!(f.locals().get("answer").unwrap().py_repr(), "42");
        assert!(!f.locals().contains("_private"));
        assert!(!f.locals().contains("__name__"));
    }

    #[test]
    fn import_star_honours_all() {
        let exports = Value::new_list(vec![Value::from("_private")]);
        let math = module(&[("__all__", exports), ("answer", Value::Int(1)), ("_private", Value::Int(2))]);
        let mut f = frame(vec![math]);
        f.import_star().unwrap();
        assert_eq!(f.locals().get("_private").unwrap().py_repr(), "2");
        assert!(!f.locals().contains("answer"));

        let mut f = frame(vec![Value::Int(3)]);
        let err = f.import_star().unwrap_err();
        assert_eq!(err.exc_type(), Some(ExcType::ImportError));
    }
}
