/// Tests for argument binding through `CALL_FUNCTION`, `CALL_FUNCTION_KW` and
/// `CALL_FUNCTION_EX`, in both binding modes.
use pyframe::{
    BindingMode, CodeBuilder, CodeUnit, CollectStringPrint, Constant, ErrorReason, ExcType, Opcode, RunResult, Value,
    VirtualMachine, VmConfig,
};

/// `def f(a, b=1, *c, d, **e): return (a, b, c, d, e)`
fn collect_params() -> CodeUnit {
    let mut builder = CodeBuilder::new("f")
        .args(&["a", "b"])
        .varargs("c")
        .kwonly(&["d"])
        .varkeywords("e")
        .defaults(vec![Constant::Int(1)]);
    for name in ["a", "b", "c", "d", "e"] {
        builder.emit_name(Opcode::LoadFast, name);
    }
    builder.emit_arg(Opcode::BuildTuple, 5).emit(Opcode::ReturnValue);
    builder.build().unwrap()
}

/// Module that defines `f` from `function` and returns `f(*positional, **keywords)`.
fn call_module(function: CodeUnit, positional: &[i64], keywords: &[(&str, i64)]) -> CodeUnit {
    let name = function.name.clone();
    let mut builder = CodeBuilder::new("<module>");
    builder
        .load_const(Constant::Code(function.into()))
        .load_const(Constant::Str(name.clone()))
        .emit_arg(Opcode::MakeFunction, 0)
        .emit_name(Opcode::StoreName, &name)
        .emit_name(Opcode::LoadName, &name);
    for value in positional {
        builder.load_const(Constant::Int(*value));
    }
    for (_, value) in keywords {
        builder.load_const(Constant::Int(*value));
    }
    let argc = (positional.len() + keywords.len()) as u32;
    if keywords.is_empty() {
        builder.emit_arg(Opcode::CallFunction, argc);
    } else {
        let names = keywords.iter().map(|(k, _)| Constant::Str((*k).to_owned())).collect();
        builder.load_const(Constant::Tuple(names));
        builder.emit_arg(Opcode::CallFunctionKw, argc);
    }
    builder.emit(Opcode::ReturnValue);
    builder.build().unwrap()
}

fn run(code: &CodeUnit, binding: BindingMode) -> RunResult<Value> {
    let vm = VirtualMachine::new(VmConfig {
        binding,
        ..VmConfig::default()
    });
    vm.run_with_writer(code, &mut CollectStringPrint::new())
}

#[test]
fn defaults_and_empty_catch_alls() {
    let code = call_module(collect_params(), &[1], &[("d", 2)]);
    let result = run(&code, BindingMode::Full).unwrap();
    assert_eq!(result.py_repr(), "(1, 1, (), 2, {})");
}

#[test]
fn excess_arguments_fill_catch_alls() {
    let code = call_module(collect_params(), &[1, 2, 3], &[("d", 4), ("z", 5)]);
    let result = run(&code, BindingMode::Full).unwrap();
    assert_eq!(result.py_repr(), "(1, 2, (3,), 4, {'z': 5})");
}

#[test]
fn unexpected_keyword_without_catch_all() {
    let mut builder = CodeBuilder::new("g").args(&["a"]);
    builder.emit_name(Opcode::LoadFast, "a").emit(Opcode::ReturnValue);
    let code = call_module(builder.build().unwrap(), &[1], &[("z", 2)]);

    let err = run(&code, BindingMode::Full).unwrap_err();
    assert_eq!(err.reason(), Some(ErrorReason::TooManyKeyword));
    assert_eq!(err.to_string(), "TypeError: g() got an unexpected keyword argument 'z'");
}

#[test]
fn missing_keyword_only_argument() {
    let code = call_module(collect_params(), &[1], &[]);
    let err = run(&code, BindingMode::Full).unwrap_err();
    assert_eq!(err.reason(), Some(ErrorReason::MissingKeywordOnlyArgument));
    assert_eq!(
        err.to_string(),
        "TypeError: f() missing 1 required keyword-only argument: 'd'"
    );
}

#[test]
fn positional_only_mode_drops_keywords_and_defaults() {
    // a and b are bound from the first two positionals; c is left unbound
    let code = call_module(collect_params(), &[1, 2, 3], &[("d", 4)]);
    let err = run(&code, BindingMode::PositionalOnly).unwrap_err();
    assert_eq!(err.exc_type(), Some(ExcType::UnboundLocalError));

    let mut builder = CodeBuilder::new("k").args(&["a", "b"]).defaults(vec![Constant::Int(5)]);
    builder.emit_name(Opcode::LoadFast, "b").emit(Opcode::ReturnValue);
    let function = builder.build().unwrap();

    let code = call_module(function.clone(), &[1], &[]);
    assert_eq!(run(&code, BindingMode::Full).unwrap().py_repr(), "5");
    let err = run(&code, BindingMode::PositionalOnly).unwrap_err();
    assert_eq!(err.reason(), Some(ErrorReason::MissingPositionalArgument));

    let code = call_module(function, &[1, 2, 3], &[]);
    assert_eq!(run(&code, BindingMode::PositionalOnly).unwrap().py_repr(), "2");
    let err = run(&code, BindingMode::Full).unwrap_err();
    assert_eq!(err.reason(), Some(ErrorReason::TooManyPositional));
}

#[test]
fn call_function_ex_with_star_args_and_kwargs() {
    let function = collect_params();
    let mut builder = CodeBuilder::new("<module>");
    builder
        .load_const(Constant::Code(function.into()))
        .load_const(Constant::Str("f".to_owned()))
        .emit_arg(Opcode::MakeFunction, 0)
        .emit_name(Opcode::StoreName, "f")
        .emit_name(Opcode::LoadName, "f")
        .load_const(Constant::Tuple(vec![Constant::Int(7), Constant::Int(8), Constant::Int(9)]))
        .load_const(Constant::Str("d".to_owned()))
        .load_const(Constant::Int(0))
        .emit_arg(Opcode::BuildMap, 1)
        .emit_arg(Opcode::CallFunctionEx, 1)
        .emit(Opcode::ReturnValue);
    let code = builder.build().unwrap();

    let result = run(&code, BindingMode::Full).unwrap();
    assert_eq!(result.py_repr(), "(7, 8, (9,), 0, {})");
}
