use pyframe::{CodeBuilder, CodeUnit, CollectStringPrint, Constant, Opcode, RunResult, Scope, Value, VirtualMachine};

fn run(code: &CodeUnit) -> RunResult<Value> {
    VirtualMachine::default().run_with_writer(code, &mut CollectStringPrint::new())
}

fn strings(items: &[&str]) -> Constant {
    Constant::Tuple(items.iter().map(|s| Constant::Str((*s).to_owned())).collect())
}

/// `def neg(x): return -x`
fn neg() -> CodeUnit {
    let mut builder = CodeBuilder::new("neg").args(&["x"]);
    builder
        .emit_name(Opcode::LoadFast, "x")
        .emit(Opcode::UnaryNegative)
        .emit(Opcode::ReturnValue);
    builder.build().unwrap()
}

fn define(builder: &mut CodeBuilder, function: CodeUnit) {
    let name = function.name.clone();
    builder
        .load_const(Constant::Code(function.into()))
        .load_const(Constant::Str(name.clone()))
        .emit_arg(Opcode::MakeFunction, 0)
        .emit_name(Opcode::StoreName, &name);
}

#[test]
fn sorted_with_builtin_key() {
    // sorted(('bb', 'a', 'ccc'), key=len, reverse=True)
    let mut builder = CodeBuilder::new("<module>");
    builder
        .emit_name(Opcode::LoadName, "sorted")
        .load_const(strings(&["bb", "a", "ccc"]))
        .emit_name(Opcode::LoadName, "len")
        .load_const(Constant::Bool(true))
        .load_const(strings(&["key", "reverse"]))
        .emit_arg(Opcode::CallFunctionKw, 3)
        .emit(Opcode::ReturnValue);
    let result = run(&builder.build().unwrap()).unwrap();
    assert_eq!(result.py_repr(), "['ccc', 'bb', 'a']");
}

#[test]
fn sorting_floats_with_nan_returns_a_list() {
    // len(sorted([2.0, float('nan'), 1.0]))
    let mut builder = CodeBuilder::new("<module>");
    builder
        .emit_name(Opcode::LoadName, "len")
        .emit_name(Opcode::LoadName, "sorted")
        .load_const(Constant::Float(2.0))
        .emit_name(Opcode::LoadName, "float")
        .load_const(Constant::Str("nan".to_owned()))
        .emit_arg(Opcode::CallFunction, 1)
        .load_const(Constant::Float(1.0))
        .emit_arg(Opcode::BuildList, 3)
        .emit_arg(Opcode::CallFunction, 1)
        .emit_arg(Opcode::CallFunction, 1)
        .emit(Opcode::ReturnValue);
    let result = run(&builder.build().unwrap()).unwrap();
    assert_eq!(result.py_repr(), "3");
}

#[test]
fn key_functions_call_back_into_user_code() {
    // sorted([1, 3, 2], key=neg), min([1, 3, 2], key=neg)
    let mut builder = CodeBuilder::new("<module>");
    define(&mut builder, neg());
    for builtin in ["sorted", "min"] {
        builder
            .emit_name(Opcode::LoadName, builtin)
            .load_const(Constant::Int(1))
            .load_const(Constant::Int(3))
            .load_const(Constant::Int(2))
            .emit_arg(Opcode::BuildList, 3)
            .emit_name(Opcode::LoadName, "neg")
            .load_const(strings(&["key"]))
            .emit_arg(Opcode::CallFunctionKw, 2);
    }
    builder.emit_arg(Opcode::BuildTuple, 2).emit(Opcode::ReturnValue);
    let result = run(&builder.build().unwrap()).unwrap();
    assert_eq!(result.py_repr(), "([3, 2, 1], 3)");
}

#[test]
fn errors_in_key_functions_propagate() {
    // max(['a'], key=neg)
    let mut builder = CodeBuilder::new("<module>");
    define(&mut builder, neg());
    builder
        .emit_name(Opcode::LoadName, "max")
        .load_const(strings(&["a"]))
        .emit_name(Opcode::LoadName, "neg")
        .load_const(strings(&["key"]))
        .emit_arg(Opcode::CallFunctionKw, 2)
        .emit(Opcode::ReturnValue);
    let err = run(&builder.build().unwrap()).unwrap_err();
    assert_eq!(err.to_string(), "TypeError: bad operand type for unary -: 'str'");
}

#[test]
fn locals_shadow_globals_shadow_builtins() {
    // len = 'global'
    // def inner(): return len
    // def shadowed(): len = 'local'; return len
    // (inner(), shadowed())
    let mut inner = CodeBuilder::new("inner");
    inner.emit_name(Opcode::LoadGlobal, "len").emit(Opcode::ReturnValue);
    let mut shadowed = CodeBuilder::new("shadowed");
    shadowed
        .load_const(Constant::Str("local".to_owned()))
        .emit_name(Opcode::StoreFast, "len")
        .emit_name(Opcode::LoadFast, "len")
        .emit(Opcode::ReturnValue);

    let mut builder = CodeBuilder::new("<module>");
    define(&mut builder, inner.build().unwrap());
    define(&mut builder, shadowed.build().unwrap());
    builder
        .emit_name(Opcode::LoadName, "inner")
        .emit_arg(Opcode::CallFunction, 0)
        .load_const(Constant::Str("global".to_owned()))
        .emit_name(Opcode::StoreName, "len")
        .emit_name(Opcode::LoadName, "inner")
        .emit_arg(Opcode::CallFunction, 0)
        .emit_name(Opcode::LoadName, "shadowed")
        .emit_arg(Opcode::CallFunction, 0)
        .emit_arg(Opcode::BuildTuple, 3)
        .emit(Opcode::ReturnValue);
    let result = run(&builder.build().unwrap()).unwrap();
    assert_eq!(result.py_repr(), "(<built-in function len>, 'global', 'local')");
}

#[test]
fn deleting_a_global_falls_back_to_the_builtin() {
    let mut builder = CodeBuilder::new("<module>");
    builder
        .load_const(Constant::Int(1))
        .emit_name(Opcode::StoreName, "abs")
        .emit_name(Opcode::DeleteName, "abs")
        .emit_name(Opcode::LoadName, "abs")
        .emit(Opcode::ReturnValue);
    let globals = Scope::default();
    let result = VirtualMachine::default()
        .run_in_scope(&builder.build().unwrap(), globals.clone(), &mut CollectStringPrint::new())
        .unwrap();
    assert_eq!(result.py_repr(), "<built-in function abs>");
    assert!(globals.get("abs").is_none());
}
