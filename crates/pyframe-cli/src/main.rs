//! Command line runner for JSON-encoded code units.

use std::{
    fs,
    path::{Path, PathBuf},
    process::ExitCode,
    time::Instant,
};

use clap::{Parser, Subcommand};
use indexmap::IndexMap;
use pyframe::{
    BindingMode, CodeUnit, Constant, Operand, Scope, SimpleNamespace, StdPrint, Value, VirtualMachine, VmConfig,
};
use tracing::{error, info};
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser, Debug)]
#[command(name = "pyframe")]
#[command(about = "Run CPython 3.10 wordcode serialized as JSON code units")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run a module code unit and print the repr of its return value
    Run {
        /// Path to the code unit JSON
        file: PathBuf,

        /// Machine configuration JSON; flags below override it
        #[arg(long)]
        config: Option<PathBuf>,

        #[arg(long)]
        max_recursion_depth: Option<usize>,

        /// Bind call arguments positionally only, ignoring keywords and defaults
        #[arg(long)]
        positional_binding: bool,

        /// Importable modules JSON: module name to an object of attribute constants
        #[arg(long)]
        modules: Option<PathBuf>,
    },
    /// Decode a code unit and list its instructions
    Dis {
        /// Path to the code unit JSON
        file: PathBuf,
    },
}

fn main() -> ExitCode {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| "warn".into()))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();
    let result = match cli.command {
        Command::Run {
            file,
            config,
            max_recursion_depth,
            positional_binding,
            modules,
        } => run(
            &file,
            config.as_deref(),
            max_recursion_depth,
            positional_binding,
            modules.as_deref(),
        ),
        Command::Dis { file } => dis(&file),
    };
    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("error: {err}");
            ExitCode::FAILURE
        }
    }
}

fn run(
    file: &Path,
    config: Option<&Path>,
    max_recursion_depth: Option<usize>,
    positional_binding: bool,
    modules: Option<&Path>,
) -> Result<(), String> {
    let code = load_code(file)?;
    let mut config = match config {
        Some(path) => {
            let text = read_file(path)?;
            serde_json::from_str::<VmConfig>(&text).map_err(|err| format!("invalid config {}: {err}", path.display()))?
        }
        None => VmConfig::default(),
    };
    if let Some(depth) = max_recursion_depth {
        config.limits = config.limits.max_recursion_depth(depth);
    }
    if positional_binding {
        config.binding = BindingMode::PositionalOnly;
    }

    let mut vm = VirtualMachine::new(config);
    if let Some(path) = modules {
        vm = vm.with_modules(load_modules(path)?);
    }
    let start = Instant::now();
    let result = vm.run_with_writer(&code, &mut StdPrint);
    let elapsed = start.elapsed();
    match result {
        Ok(value) => {
            info!(?elapsed, "finished");
            println!("{}", value.py_repr());
            Ok(())
        }
        Err(err) => {
            error!(?elapsed, "{err}");
            Err(err.to_string())
        }
    }
}

fn dis(file: &Path) -> Result<(), String> {
    let code = load_code(file)?;
    print_code(&code)
}

fn print_code(code: &CodeUnit) -> Result<(), String> {
    println!("Disassembly of {}:", code.name);
    let decoded = code.decoded().map_err(|err| err.to_string())?;
    for instruction in decoded.iter() {
        let operand = match &instruction.operand {
            Operand::None => String::new(),
            Operand::Const(value) => format!("({})", value.py_repr()),
            Operand::Name(name) => format!("({name})"),
            Operand::Count(count) => count.to_string(),
            Operand::Jump(target) => format!("(to {target})"),
            Operand::Delta(delta) => format!("(to {})", instruction.offset + 2 + delta),
            Operand::Compare(op) => format!("({op})"),
            Operand::Invert(invert) => u8::from(*invert).to_string(),
            Operand::Flags(flags) => format!("{flags:#x}"),
        };
        println!("{:>6} {:<24} {operand}", instruction.offset, instruction.opcode.to_string());
    }
    for nested in code.consts.iter().filter_map(|c| match c {
        Constant::Code(nested) => Some(nested),
        _ => None,
    }) {
        println!();
        print_code(nested)?;
    }
    Ok(())
}

fn load_code(path: &Path) -> Result<CodeUnit, String> {
    let text = read_file(path)?;
    let code: CodeUnit =
        serde_json::from_str(&text).map_err(|err| format!("invalid code unit {}: {err}", path.display()))?;
    info!(file = %path.display(), code = %code.name, instructions = code.instructions.len(), "loaded");
    Ok(code)
}

/// Builds the module table from `{"name": {"attr": <constant>, ...}, ...}`.
fn load_modules(path: &Path) -> Result<Scope, String> {
    let text = read_file(path)?;
    let table: IndexMap<String, IndexMap<String, Constant>> =
        serde_json::from_str(&text).map_err(|err| format!("invalid modules {}: {err}", path.display()))?;
    let modules = Scope::default();
    for (name, attrs) in table {
        let mut module = SimpleNamespace::new();
        for (attr, value) in attrs {
            module.set(attr.into(), value.to_value());
        }
        modules.set(name.into(), Value::new_namespace(module));
    }
    info!(file = %path.display(), "loaded modules");
    Ok(modules)
}

fn read_file(path: &Path) -> Result<String, String> {
    if !path.is_file() {
        return Err(format!("{} is not a file", path.display()));
    }
    fs::read_to_string(path).map_err(|err| format!("error reading {}: {err}", path.display()))
}
