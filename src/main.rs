use std::io::{self, BufRead, IsTerminal, Write};
use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use tracing_subscriber::filter::Directive;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

use loxvm::compiler;
use loxvm::diagnostic::{self, Diagnostic, ansi::AnsiRenderer, registry};
use loxvm::{InterpretError, Vm, VmOptions};

// sysexits.h
const EX_USAGE: u8 = 64;
const EX_DATAERR: u8 = 65;
const EX_IOERR: u8 = 74;

#[derive(Parser, Debug)]
#[command(name = "lox", version, about = "Run Lox scripts on a stack-based bytecode VM")]
struct Cli {
    /// Script to run. Without one, lox starts an interactive prompt.
    script: Option<PathBuf>,

    /// Print the compiled bytecode before running it
    #[arg(long)]
    disassemble: bool,

    /// Print the parsed program as JSON and exit
    #[arg(long, requires = "script")]
    ast: bool,

    /// Log every executed instruction with the operand stack (stderr)
    #[arg(long)]
    trace: bool,

    /// Report errors as JSON, one object per line
    #[arg(long, conflicts_with = "pretty")]
    json: bool,

    /// Report errors with source snippets
    #[arg(long)]
    pretty: bool,

    /// Explain an error code, e.g. LOX-R004
    #[arg(long, value_name = "CODE")]
    explain: Option<String>,
}

#[derive(Debug, Clone, Copy)]
enum Renderer {
    /// `[line N] Error at 'x': message`, as clox prints it.
    Plain,
    Pretty,
    Json,
}

fn main() -> ExitCode {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(e) => {
            let _ = e.print();
            return if e.use_stderr() { ExitCode::from(EX_USAGE) } else { ExitCode::SUCCESS };
        }
    };

    init_tracing(cli.trace);

    if let Some(code) = &cli.explain {
        return explain(code);
    }

    let renderer = if cli.json {
        Renderer::Json
    } else if cli.pretty {
        Renderer::Pretty
    } else {
        Renderer::Plain
    };
    let options = VmOptions { disassemble: cli.disassemble };

    match &cli.script {
        Some(path) => {
            let source = match std::fs::read_to_string(path) {
                Ok(s) => s,
                Err(e) => {
                    eprintln!("Could not open file \"{}\": {}", path.display(), e);
                    return ExitCode::from(EX_IOERR);
                }
            };
            if cli.ast {
                print_ast(&source, renderer)
            } else {
                run_file(&source, options, renderer)
            }
        }
        None => repl(options, renderer),
    }
}

/// Log filter comes from `LOX_LOG` (same syntax as `RUST_LOG`), default `warn`.
fn init_tracing(trace: bool) {
    let mut filter = EnvFilter::try_from_env("LOX_LOG").unwrap_or_else(|_| EnvFilter::new("warn"));
    if trace {
        if let Ok(directive) = "loxvm::vm=trace".parse::<Directive>() {
            filter = filter.add_directive(directive);
        }
    }
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(io::stderr).with_target(true))
        .with(filter)
        .init();
}

fn explain(code: &str) -> ExitCode {
    match registry::lookup(code) {
        Some(entry) => {
            print!("{}", entry.long);
            ExitCode::SUCCESS
        }
        None => {
            eprintln!("unknown error code '{}'", code);
            ExitCode::from(EX_USAGE)
        }
    }
}

fn print_ast(source: &str, renderer: Renderer) -> ExitCode {
    match compiler::parse_source(source) {
        Ok(program) => match serde_json::to_string_pretty(&program) {
            Ok(json) => {
                println!("{}", json);
                ExitCode::SUCCESS
            }
            Err(e) => {
                eprintln!("Serialization error: {}", e);
                ExitCode::from(EX_DATAERR)
            }
        },
        Err(errors) => {
            report(&InterpretError::Compile(errors), source, renderer);
            ExitCode::from(EX_DATAERR)
        }
    }
}

fn run_file(source: &str, options: VmOptions, renderer: Renderer) -> ExitCode {
    let mut vm = Vm::with_options(io::stdout(), options);
    match vm.interpret(source) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            report(&e, source, renderer);
            ExitCode::from(e.result().exit_code() as u8)
        }
    }
}

/// One line per `interpret` call; globals carry over between lines.
fn repl(options: VmOptions, renderer: Renderer) -> ExitCode {
    let mut vm = Vm::with_options(io::stdout(), options);
    let stdin = io::stdin();
    let mut line = String::new();

    loop {
        print!("> ");
        let _ = io::stdout().flush();

        line.clear();
        match stdin.lock().read_line(&mut line) {
            Ok(0) => {
                println!();
                return ExitCode::SUCCESS;
            }
            Ok(_) => {
                if let Err(e) = vm.interpret(&line) {
                    report(&e, &line, renderer);
                }
            }
            Err(e) => {
                eprintln!("{}", e);
                return ExitCode::from(EX_IOERR);
            }
        }
    }
}

fn report(err: &InterpretError, source: &str, renderer: Renderer) {
    let diagnostics = || -> Vec<Diagnostic> {
        match err {
            InterpretError::Compile(errors) => errors
                .iter()
                .map(|e| Diagnostic::from(e).with_source(source))
                .collect(),
            InterpretError::Runtime(e) => vec![Diagnostic::from(e).with_source(source)],
        }
    };

    match renderer {
        Renderer::Plain => eprintln!("{}", err),
        Renderer::Json => {
            for d in diagnostics() {
                eprintln!("{}", diagnostic::json::render(&d));
            }
        }
        Renderer::Pretty => {
            let r = AnsiRenderer { use_color: io::stderr().is_terminal() };
            for d in diagnostics() {
                eprint!("{}", r.render(&d));
            }
        }
    }
}
