use pyframe::{CodeBuilder, CodeUnit, CollectStringPrint, Constant, NoPrint, Opcode, VirtualMachine};

/// Module that calls `print(*args, **kwargs)` once and returns `None`.
fn print_call(args: Vec<Constant>, kwargs: Vec<(&str, Constant)>) -> CodeUnit {
    let mut builder = CodeBuilder::new("<module>");
    builder.emit_name(Opcode::LoadName, "print");
    let argc = (args.len() + kwargs.len()) as u32;
    for arg in args {
        builder.load_const(arg);
    }
    let mut names = Vec::new();
    for (name, value) in kwargs {
        builder.load_const(value);
        names.push(Constant::Str(name.to_owned()));
    }
    if names.is_empty() {
        builder.emit_arg(Opcode::CallFunction, argc);
    } else {
        builder.load_const(Constant::Tuple(names));
        builder.emit_arg(Opcode::CallFunctionKw, argc);
    }
    builder.emit(Opcode::PopTop);
    builder.build().unwrap()
}

fn output_of(code: &CodeUnit) -> String {
    let mut writer = CollectStringPrint::new();
    VirtualMachine::default().run_with_writer(code, &mut writer).unwrap();
    writer.into_output()
}

#[test]
fn print_single_string() {
    let code = print_call(vec![Constant::Str("hello".to_owned())], vec![]);
    assert_eq!(output_of(&code), "hello\n");
}

#[test]
fn print_empty() {
    assert_eq!(output_of(&print_call(vec![], vec![])), "\n");
}

#[test]
fn print_mixed_types() {
    let code = print_call(
        vec![
            Constant::Str("count:".to_owned()),
            Constant::Int(42),
            Constant::Bool(true),
            Constant::None,
            Constant::Float(1.5),
        ],
        vec![],
    );
    assert_eq!(output_of(&code), "count: 42 True None 1.5\n");
}

#[test]
fn print_custom_sep_and_end() {
    let code = print_call(
        vec![Constant::Int(1), Constant::Int(2), Constant::Int(3)],
        vec![
            ("sep", Constant::Str("-".to_owned())),
            ("end", Constant::Str("!".to_owned())),
        ],
    );
    assert_eq!(output_of(&code), "1-2-3!");
}

#[test]
fn print_none_sep_uses_default() {
    let code = print_call(
        vec![Constant::Str("a".to_owned()), Constant::Str("b".to_owned())],
        vec![("sep", Constant::None)],
    );
    assert_eq!(output_of(&code), "a b\n");
}

#[test]
fn print_unknown_keyword_fails() {
    let code = print_call(vec![], vec![("color", Constant::Str("red".to_owned()))]);
    let err = VirtualMachine::default()
        .run_with_writer(&code, &mut CollectStringPrint::new())
        .unwrap_err();
    assert_eq!(
        err.to_string(),
        "TypeError: 'color' is an invalid keyword argument for print()"
    );
}

#[test]
fn print_in_function() {
    // def greet(name): print('Hello', name)
    let mut greet = CodeBuilder::new("greet").args(&["name"]);
    greet
        .emit_name(Opcode::LoadGlobal, "print")
        .load_const(Constant::Str("Hello".to_owned()))
        .emit_name(Opcode::LoadFast, "name")
        .emit_arg(Opcode::CallFunction, 2)
        .emit(Opcode::ReturnValue);
    let greet = greet.build().unwrap();

    let mut module = CodeBuilder::new("<module>");
    module
        .load_const(Constant::Code(greet.into()))
        .load_const(Constant::Str("greet".to_owned()))
        .emit_arg(Opcode::MakeFunction, 0)
        .emit_name(Opcode::StoreName, "greet");
    for name in ["Alice", "Bob"] {
        module
            .emit_name(Opcode::LoadName, "greet")
            .load_const(Constant::Str(name.to_owned()))
            .emit_arg(Opcode::CallFunction, 1)
            .emit(Opcode::PopTop);
    }
    assert_eq!(output_of(&module.build().unwrap()), "Hello Alice\nHello Bob\n");
}

#[test]
fn print_loop_over_list() {
    // for i in [10, 20]: print(i)
    let mut builder = CodeBuilder::new("<module>");
    let top = builder.new_label();
    let done = builder.new_label();
    builder
        .load_const(Constant::Int(10))
        .load_const(Constant::Int(20))
        .emit_arg(Opcode::BuildList, 2)
        .emit(Opcode::GetIter)
        .bind(top)
        .emit_jump(Opcode::ForIter, done)
        .emit_name(Opcode::StoreName, "i")
        .emit_name(Opcode::LoadName, "print")
        .emit_name(Opcode::LoadName, "i")
        .emit_arg(Opcode::CallFunction, 1)
        .emit(Opcode::PopTop)
        .emit_jump(Opcode::JumpAbsolute, top)
        .bind(done);
    assert_eq!(output_of(&builder.build().unwrap()), "10\n20\n");
}

#[test]
fn print_formatted_string() {
    // print(f"{n:>4}|{s!r}")
    let mut builder = CodeBuilder::new("<module>");
    builder
        .emit_name(Opcode::LoadName, "print")
        .load_const(Constant::Int(7))
        .load_const(Constant::Str(">4".to_owned()))
        .emit_arg(Opcode::FormatValue, 0x04)
        .load_const(Constant::Str("|".to_owned()))
        .load_const(Constant::Str("x".to_owned()))
        .emit_arg(Opcode::FormatValue, 0x02)
        .emit_arg(Opcode::BuildString, 3)
        .emit_arg(Opcode::CallFunction, 1)
        .emit(Opcode::PopTop);
    assert_eq!(output_of(&builder.build().unwrap()), "   7|'x'\n");
}

#[test]
fn no_print_discards_output() {
    let code = print_call(vec![Constant::Str("ignored".to_owned())], vec![]);
    let result = VirtualMachine::default().run_with_writer(&code, &mut NoPrint).unwrap();
    assert_eq!(result.py_repr(), "None");
}
