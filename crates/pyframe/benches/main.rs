use criterion::{Bencher, Criterion, black_box, criterion_group, criterion_main};
use pyframe::{CodeBuilder, CodeUnit, Constant, NoPrint, Opcode, VirtualMachine};

/// Runs a code unit once to check its result, then benchmarks repeated execution.
fn run_pyframe(bench: &mut Bencher, code: &CodeUnit, expected: i64) {
    let vm = VirtualMachine::default();
    let r = vm.run_with_writer(code, &mut NoPrint).unwrap();
    assert_eq!(r.as_int(), Some(expected));

    bench.iter(|| {
        let r = vm.run_with_writer(code, &mut NoPrint).unwrap();
        black_box(r);
    });
}

fn define(builder: &mut CodeBuilder, function: CodeUnit) {
    let name = function.name.clone();
    builder
        .load_const(Constant::Code(function.into()))
        .load_const(Constant::Str(name.clone()))
        .emit_arg(Opcode::MakeFunction, 0)
        .emit_name(Opcode::StoreName, &name);
}

/// `1 + 2`
fn add_two() -> CodeUnit {
    let mut builder = CodeBuilder::new("<module>");
    builder
        .load_const(Constant::Int(1))
        .load_const(Constant::Int(2))
        .emit(Opcode::BinaryAdd)
        .emit(Opcode::ReturnValue);
    builder.build().unwrap()
}

/// ```text
/// a = []
/// a.append(42)
/// a[0]
/// ```
fn list_append() -> CodeUnit {
    let mut builder = CodeBuilder::new("<module>");
    builder
        .emit_arg(Opcode::BuildList, 0)
        .emit_name(Opcode::StoreName, "a")
        .emit_name(Opcode::LoadName, "a")
        .emit_name(Opcode::LoadMethod, "append")
        .load_const(Constant::Int(42))
        .emit_arg(Opcode::CallMethod, 1)
        .emit(Opcode::PopTop)
        .emit_name(Opcode::LoadName, "a")
        .load_const(Constant::Int(0))
        .emit(Opcode::BinarySubscr)
        .emit(Opcode::ReturnValue);
    builder.build().unwrap()
}

/// ```text
/// v = ''
/// for i in range(1_000):
///     if i % 13 == 0:
///         v += 'x'
/// len(v)
/// ```
fn loop_mod_13() -> CodeUnit {
    let mut builder = CodeBuilder::new("<module>");
    let top = builder.new_label();
    let done = builder.new_label();
    builder
        .load_const(Constant::Str(String::new()))
        .emit_name(Opcode::StoreName, "v")
        .emit_name(Opcode::LoadName, "range")
        .load_const(Constant::Int(1_000))
        .emit_arg(Opcode::CallFunction, 1)
        .emit(Opcode::GetIter)
        .bind(top)
        .emit_jump(Opcode::ForIter, done)
        .emit_name(Opcode::StoreName, "i")
        .emit_name(Opcode::LoadName, "i")
        .load_const(Constant::Int(13))
        .emit(Opcode::BinaryModulo)
        .load_const(Constant::Int(0))
        .emit_arg(Opcode::CompareOp, 2)
        .emit_jump(Opcode::PopJumpIfFalse, top)
        .emit_name(Opcode::LoadName, "v")
        .load_const(Constant::Str("x".to_owned()))
        .emit(Opcode::InplaceAdd)
        .emit_name(Opcode::StoreName, "v")
        .emit_jump(Opcode::JumpAbsolute, top)
        .bind(done)
        .emit_name(Opcode::LoadName, "len")
        .emit_name(Opcode::LoadName, "v")
        .emit_arg(Opcode::CallFunction, 1)
        .emit(Opcode::ReturnValue);
    builder.build().unwrap()
}

/// ```text
/// def add(a, b=2):
///     return a + b
///
/// add(a=1)
/// ```
fn func_call_kwargs() -> CodeUnit {
    let mut add = CodeBuilder::new("add").args(&["a", "b"]).defaults(vec![Constant::Int(2)]);
    add.emit_name(Opcode::LoadFast, "a")
        .emit_name(Opcode::LoadFast, "b")
        .emit(Opcode::BinaryAdd)
        .emit(Opcode::ReturnValue);

    let mut builder = CodeBuilder::new("<module>");
    define(&mut builder, add.build().unwrap());
    builder
        .emit_name(Opcode::LoadName, "add")
        .load_const(Constant::Int(1))
        .load_const(Constant::Tuple(vec![Constant::Str("a".to_owned())]))
        .emit_arg(Opcode::CallFunctionKw, 1)
        .emit(Opcode::ReturnValue);
    builder.build().unwrap()
}

/// ```text
/// def fib(n):
///     if n <= 1:
///         return n
///     return fib(n - 1) + fib(n - 2)
///
/// fib(20)
/// ```
fn fib(n: i64) -> CodeUnit {
    let mut fib = CodeBuilder::new("fib").args(&["n"]);
    let recurse = fib.new_label();
    fib.emit_name(Opcode::LoadFast, "n")
        .load_const(Constant::Int(1))
        .emit_arg(Opcode::CompareOp, 1)
        .emit_jump(Opcode::PopJumpIfFalse, recurse)
        .emit_name(Opcode::LoadFast, "n")
        .emit(Opcode::ReturnValue)
        .bind(recurse);
    for step in [1, 2] {
        fib.emit_name(Opcode::LoadGlobal, "fib")
            .emit_name(Opcode::LoadFast, "n")
            .load_const(Constant::Int(step))
            .emit(Opcode::BinarySubtract)
            .emit_arg(Opcode::CallFunction, 1);
    }
    fib.emit(Opcode::BinaryAdd).emit(Opcode::ReturnValue);

    let mut builder = CodeBuilder::new("<module>");
    define(&mut builder, fib.build().unwrap());
    builder
        .emit_name(Opcode::LoadName, "fib")
        .load_const(Constant::Int(n))
        .emit_arg(Opcode::CallFunction, 1)
        .emit(Opcode::ReturnValue);
    builder.build().unwrap()
}

fn criterion_benchmark(c: &mut Criterion) {
    let code = add_two();
    c.bench_function("add_two", |b| run_pyframe(b, &code, 3));

    let code = list_append();
    c.bench_function("list_append", |b| run_pyframe(b, &code, 42));

    let code = loop_mod_13();
    c.bench_function("loop_mod_13", |b| run_pyframe(b, &code, 77));

    let code = func_call_kwargs();
    c.bench_function("func_call_kwargs", |b| run_pyframe(b, &code, 3));

    let code = fib(20);
    c.bench_function("fib__20", |b| run_pyframe(b, &code, 6765));
}

criterion_group!(benches, criterion_benchmark);
criterion_main!(benches);
