//! Function signatures and argument binding.
//!
//! A [`Signature`] is derived once from a [`CodeUnit`]'s parameter table and count
//! fields. Binding maps a call's positional and keyword arguments onto parameter
//! names following Python's calling convention: positionals fill positional
//! parameters left to right, keywords fill by name, defaults fill the rest, and
//! leftovers go to the `*args` tuple and `**kwargs` dict.

use std::rc::Rc;

use ahash::AHashSet;
use indexmap::IndexMap;
use tracing::warn;

use crate::{
    args::ArgValues,
    bytecode::CodeUnit,
    exceptions::{ExcType, RunResult},
    types::Dict,
    value::Value,
};

/// Bound arguments in parameter order, used as a new frame's initial locals.
pub type BoundArgs = IndexMap<Rc<str>, Value>;

/// The parameter segments of a function, in declaration order.
///
/// Parameters are laid out in `varnames` as:
/// ```text
/// [pos_args][args][kwargs][*var_args?][**var_kwargs?]
/// ```
#[derive(Debug, Clone, Default)]
pub struct Signature {
    /// Positional-only parameters, e.g. `a, b` in `def f(a, b, /): ...`
    pub pos_args: Vec<Rc<str>>,
    /// Positional-or-keyword parameters.
    pub args: Vec<Rc<str>>,
    /// Keyword-only parameters, e.g. `c` in `def f(*, c): ...`
    pub kwargs: Vec<Rc<str>>,
    /// Collects excess positional arguments into a tuple.
    pub var_args: Option<Rc<str>>,
    /// Collects excess keyword arguments into a dict.
    pub var_kwargs: Option<Rc<str>>,
}

impl Signature {
    /// Splits the parameter prefix of `code.varnames` into segments.
    ///
    /// Fails with `ValueError` if the count fields do not describe a valid partition
    /// of `varnames` or if a parameter name repeats.
    pub fn from_code(code: &CodeUnit) -> RunResult<Self> {
        if code.posonly_arg_count > code.arg_count {
            return Err(ExcType::malformed_operand(format!(
                "{}: posonly_arg_count {} exceeds arg_count {}",
                code.name, code.posonly_arg_count, code.arg_count
            )));
        }
        let param_count = code.param_count();
        if code.varnames.len() < param_count {
            return Err(ExcType::malformed_operand(format!(
                "{}: {param_count} parameters declared but varnames has {} entries",
                code.name,
                code.varnames.len()
            )));
        }
        let names: Vec<Rc<str>> = code.varnames[..param_count].iter().map(|n| Rc::from(n.as_str())).collect();
        let mut seen = AHashSet::new();
        if let Some(dup) = names.iter().find(|n| !seen.insert(Rc::clone(n))) {
            return Err(ExcType::malformed_operand(format!(
                "{}: duplicate parameter '{dup}'",
                code.name
            )));
        }

        let mut rest = names.into_iter();
        let pos_args = rest.by_ref().take(code.posonly_arg_count).collect();
        let args = rest.by_ref().take(code.arg_count - code.posonly_arg_count).collect();
        let kwargs = rest.by_ref().take(code.kwonly_arg_count).collect();
        let var_args = if code.varargs { rest.next() } else { None };
        let var_kwargs = if code.varkeywords { rest.next() } else { None };
        Ok(Self {
            pos_args,
            args,
            kwargs,
            var_args,
            var_kwargs,
        })
    }

    /// Number of parameters that can be filled positionally.
    #[must_use]
    pub fn positional_count(&self) -> usize {
        self.pos_args.len() + self.args.len()
    }

    /// All parameter names in `varnames` order.
    pub fn param_names(&self) -> impl Iterator<Item = &Rc<str>> {
        self.pos_args
            .iter()
            .chain(&self.args)
            .chain(&self.kwargs)
            .chain(&self.var_args)
            .chain(&self.var_kwargs)
    }

    fn positional_names(&self) -> impl Iterator<Item = &Rc<str>> {
        self.pos_args.iter().chain(&self.args)
    }

    /// Binds arguments to parameters according to Python's calling conventions.
    ///
    /// `defaults` apply to the trailing positional parameters, `kwdefaults` to
    /// keyword-only parameters by name.
    ///
    /// # Errors
    /// `TypeError` carrying an [`ErrorReason`](crate::ErrorReason) when:
    /// - too many positional arguments are given and there is no `*args`
    /// - a keyword matches no parameter and there is no `**kwargs`
    /// - a positional-only parameter is passed by keyword and there is no `**kwargs`
    /// - a parameter receives both a positional and a keyword value
    /// - a required positional or keyword-only parameter is left unbound
    pub fn bind(
        &self,
        func_name: &str,
        args: ArgValues,
        defaults: &[Value],
        kwdefaults: &IndexMap<Rc<str>, Value>,
    ) -> RunResult<BoundArgs> {
        let (positional, keywords) = args.into_parts();
        let positional_count = self.positional_count();

        if positional.len() > positional_count && self.var_args.is_none() {
            let kwonly_given = keywords
                .iter()
                .filter(|(key, _)| self.kwargs.contains(key))
                .count();
            return Err(ExcType::type_error_too_many_positional(
                func_name,
                positional_count.saturating_sub(defaults.len()),
                positional_count,
                positional.len(),
                kwonly_given,
            ));
        }

        // slots for the named parameters: [pos_args][args][kwargs]
        let mut slots: Vec<Option<Value>> = vec![None; positional_count + self.kwargs.len()];
        let mut positional = positional.into_iter();
        for slot in slots.iter_mut().take(positional_count) {
            match positional.next() {
                Some(value) => *slot = Some(value),
                None => break,
            }
        }
        let excess_positional: Vec<Value> = positional.collect();

        let mut excess_keywords = Dict::new();
        let mut posonly_passed: Vec<&str> = Vec::new();
        for (key, value) in &keywords {
            let index = self
                .args
                .iter()
                .position(|name| name == key)
                .map(|i| self.pos_args.len() + i)
                .or_else(|| {
                    self.kwargs
                        .iter()
                        .position(|name| name == key)
                        .map(|i| positional_count + i)
                });
            match index {
                Some(index) => {
                    if slots[index].is_some() {
                        return Err(ExcType::type_error_duplicate_arg(func_name, key));
                    }
                    slots[index] = Some(value.clone());
                }
                None if self.var_kwargs.is_some() => {
                    excess_keywords.set(Value::Str(Rc::clone(key)), value.clone())?;
                }
                None if self.pos_args.contains(key) => posonly_passed.push(&**key),
                None => {
                    if posonly_passed.is_empty() {
                        posonly_passed = self.posonly_keywords(&keywords);
                    }
                    if !posonly_passed.is_empty() {
                        return Err(ExcType::type_error_positional_only(func_name, &posonly_passed));
                    }
                    return Err(ExcType::type_error_unexpected_keyword(func_name, key));
                }
            }
        }
        if !posonly_passed.is_empty() {
            return Err(ExcType::type_error_positional_only(func_name, &posonly_passed));
        }

        // positional defaults are aligned to the end of the positional parameters
        let first_default = positional_count.saturating_sub(defaults.len());
        let mut missing: Vec<&str> = Vec::new();
        for (index, name) in self.positional_names().enumerate() {
            if slots[index].is_none() {
                match index.checked_sub(first_default).and_then(|d| defaults.get(d)) {
                    Some(default) => slots[index] = Some(default.clone()),
                    None => missing.push(&**name),
                }
            }
        }
        if !missing.is_empty() {
            return Err(ExcType::type_error_missing_positional_with_names(func_name, &missing));
        }

        for (i, name) in self.kwargs.iter().enumerate() {
            let slot = &mut slots[positional_count + i];
            if slot.is_none() {
                match kwdefaults.get(name) {
                    Some(default) => *slot = Some(default.clone()),
                    None => missing.push(&**name),
                }
            }
        }
        if !missing.is_empty() {
            return Err(ExcType::type_error_missing_kwonly_with_names(func_name, &missing));
        }

        let mut bound: BoundArgs = self
            .positional_names()
            .chain(&self.kwargs)
            .cloned()
            .zip(slots.into_iter().flatten())
            .collect();
        if let Some(name) = &self.var_args {
            bound.insert(Rc::clone(name), Value::new_tuple(excess_positional));
        }
        if let Some(name) = &self.var_kwargs {
            bound.insert(Rc::clone(name), Value::new_dict(excess_keywords));
        }
        Ok(bound)
    }

    /// Binds only the first `positional_count()` positional arguments, ignoring
    /// keywords, defaults and the catch-all parameters.
    ///
    /// Anything discarded is reported with a warning.
    pub fn bind_positional_only(&self, func_name: &str, args: ArgValues) -> RunResult<BoundArgs> {
        let (positional, keywords) = args.into_parts();
        let positional_count = self.positional_count();
        if positional.len() < positional_count {
            let missing: Vec<&str> = self.positional_names().skip(positional.len()).map(|n| &**n).collect();
            return Err(ExcType::type_error_missing_positional_with_names(func_name, &missing));
        }
        if positional.len() > positional_count || !keywords.is_empty() {
            warn!(
                function = func_name,
                extra_positional = positional.len() - positional_count,
                keywords = keywords.len(),
                "positional-only binding discarded call arguments"
            );
        }
        if !self.kwargs.is_empty() || self.var_args.is_some() || self.var_kwargs.is_some() {
            warn!(
                function = func_name,
                "positional-only binding leaves keyword-only and catch-all parameters unbound"
            );
        }
        Ok(self.positional_names().cloned().zip(positional).collect())
    }

    fn posonly_keywords<'a>(&self, keywords: &'a [(Rc<str>, Value)]) -> Vec<&'a str> {
        keywords
            .iter()
            .filter(|(key, _)| self.pos_args.contains(key))
            .map(|(key, _)| &**key)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{bytecode::CodeBuilder, exceptions::ErrorReason};

    /// `def f(a, b=1, *c, d, **e)`
    fn signature() -> Signature {
        let code = CodeBuilder::new("f")
            .args(&["a", "b"])
            .varargs("c")
            .kwonly(&["d"])
            .varkeywords("e")
            .build()
            .unwrap();
        Signature::from_code(&code).unwrap()
    }

    fn call(positional: Vec<i64>, keywords: &[(&str, i64)]) -> RunResult<BoundArgs> {
        let args = ArgValues::new(
            positional.into_iter().map(Value::Int).collect(),
            keywords.iter().map(|(k, v)| (Rc::from(*k), Value::Int(*v))).collect(),
        );
        signature().bind("f", args, &[Value::Int(1)], &IndexMap::new())
    }

    fn render(bound: &BoundArgs) -> String {
        bound
            .iter()
            .map(|(k, v)| format!("{k}={}", v.py_repr()))
            .collect::<Vec<_>>()
            .join(", ")
    }

    #[test]
    fn segments_follow_varnames_order() {
        let sig = signature();
        let names: Vec<&str> = sig.param_names().map(|n| &**n).collect();
        assert_eq!(names, vec!["a", "b", "d", "c", "e"]);
    }

    #[test]
    fn binds_defaults_and_empty_catch_alls() {
        let bound = call(vec![1], &[("d", 2)]).unwrap();
        assert_eq!(render(&bound), "a=1, b=1, d=2, c=(), e={}");
    }

    #[test]
    fn binds_excess_into_catch_alls() {
        let bound = call(vec![1, 2, 3], &[("d", 4), ("z", 5)]).unwrap();
        assert_eq!(render(&bound), "a=1, b=2, d=4, c=(3,), e={'z': 5}");
    }

    #[test]
    fn unexpected_keyword_without_catch_all() {
        let code = CodeBuilder::new("g").args(&["a"]).build().unwrap();
        let sig = Signature::from_code(&code).unwrap();
        let args = ArgValues::new(vec![Value::Int(1)], vec![(Rc::from("z"), Value::Int(2))]);
        let err = sig.bind("g", args, &[], &IndexMap::new()).unwrap_err();
        assert_eq!(err.reason(), Some(ErrorReason::TooManyKeyword));
        assert_eq!(err.to_string(), "TypeError: g() got an unexpected keyword argument 'z'");
    }

    #[test]
    fn missing_keyword_only() {
        let err = call(vec![1], &[]).unwrap_err();
        assert_eq!(err.reason(), Some(ErrorReason::MissingKeywordOnlyArgument));
        assert_eq!(
            err.to_string(),
            "TypeError: f() missing 1 required keyword-only argument: 'd'"
        );
    }

    #[test]
    fn missing_positionals_are_all_named() {
        let code = CodeBuilder::new("h").args(&["a", "b", "c"]).build().unwrap();
        let sig = Signature::from_code(&code).unwrap();
        let err = sig.bind("h", ArgValues::Empty, &[], &IndexMap::new()).unwrap_err();
        assert_eq!(err.reason(), Some(ErrorReason::MissingPositionalArgument));
        assert_eq!(
            err.to_string(),
            "TypeError: h() missing 3 required positional arguments: 'a', 'b', and 'c'"
        );
    }

    #[test]
    fn duplicate_values() {
        let err = call(vec![1], &[("a", 2), ("d", 3)]).unwrap_err();
        assert_eq!(err.reason(), Some(ErrorReason::MultipleValuesForArgument));
        assert_eq!(err.to_string(), "TypeError: f() got multiple values for argument 'a'");
    }

    #[test]
    fn too_many_positional() {
        let code = CodeBuilder::new("k").args(&["a", "b"]).build().unwrap();
        let sig = Signature::from_code(&code).unwrap();
        let args = ArgValues::new(vec![Value::Int(1), Value::Int(2), Value::Int(3)], vec![]);
        let err = sig.bind("k", args, &[Value::Int(0)], &IndexMap::new()).unwrap_err();
        assert_eq!(err.reason(), Some(ErrorReason::TooManyPositional));
        assert_eq!(
            err.to_string(),
            "TypeError: k() takes from 1 to 2 positional arguments but 3 were given"
        );
    }

    #[test]
    fn positional_only_by_keyword() {
        let code = CodeBuilder::new("p").posonly(&["a"]).args(&["b"]).build().unwrap();
        let sig = Signature::from_code(&code).unwrap();
        let args = ArgValues::new(vec![], vec![(Rc::from("a"), Value::Int(1)), (Rc::from("b"), Value::Int(2))]);
        let err = sig.bind("p", args, &[], &IndexMap::new()).unwrap_err();
        assert_eq!(err.reason(), Some(ErrorReason::PositionalOnlyPassedAsKeyword));
        assert_eq!(
            err.to_string(),
            "TypeError: p() got some positional-only arguments passed as keyword arguments: 'a'"
        );
    }

    #[test]
    fn positional_only_name_lands_in_catch_all_keywords() {
        let code = CodeBuilder::new("p")
            .posonly(&["a"])
            .varkeywords("kw")
            .build()
            .unwrap();
        let sig = Signature::from_code(&code).unwrap();
        let args = ArgValues::new(vec![Value::Int(1)], vec![(Rc::from("a"), Value::Int(2))]);
        let bound = sig.bind("p", args, &[], &IndexMap::new()).unwrap();
        assert_eq!(render(&bound), "a=1, kw={'a': 2}");
    }

    #[test]
    fn keyword_only_defaults() {
        let code = CodeBuilder::new("q").kwonly(&["x"]).build().unwrap();
        let sig = Signature::from_code(&code).unwrap();
        let kwdefaults: IndexMap<Rc<str>, Value> = [(Rc::from("x"), Value::Int(9))].into_iter().collect();
        let bound = sig.bind("q", ArgValues::Empty, &[], &kwdefaults).unwrap();
        assert_eq!(render(&bound), "x=9");
    }

    #[test]
    fn positional_only_mode_ignores_keywords() {
        let bound = signature()
            .bind_positional_only(
                "f",
                ArgValues::new(
                    vec![Value::Int(1), Value::Int(2), Value::Int(3)],
                    vec![(Rc::from("d"), Value::Int(4))],
                ),
            )
            .unwrap();
        assert_eq!(render(&bound), "a=1, b=2");
        let err = signature()
            .bind_positional_only("f", ArgValues::One(Value::Int(1)))
            .unwrap_err();
        assert_eq!(err.reason(), Some(ErrorReason::MissingPositionalArgument));
    }

    #[test]
    fn invalid_partitions_are_rejected() {
        let mut code = CodeUnit::new("bad");
        code.arg_count = 2;
        code.varnames = vec!["a".to_owned()];
        assert_eq!(
            Signature::from_code(&code).unwrap_err().exc_type(),
            Some(ExcType::ValueError)
        );
        code.varnames = vec!["a".to_owned(), "a".to_owned()];
        assert_eq!(
            Signature::from_code(&code).unwrap_err().to_string(),
            "ValueError: bad: duplicate parameter 'a'"
        );
    }
}
