mod builtins;
mod calc;
mod config;
mod engine;
mod error;
mod reader;
mod sandbox;
mod table;
mod workspace;

use builtins::register_builtins;
use clap::Parser;
use config::{FsConfig, MAX_INCLUDE_NEST, VERSION};
use engine::Engine;
use error::{EngineError, ARITY_EXACTLY_ONE, ARITY_ZERO_OR_ONE};
use reader::TrackedReader;
use rustyline::error::ReadlineError;
use rustyline::{Config, Editor};
use sandbox::Sandbox;
use std::cell::RefCell;
use std::io::{self, Write};
use std::path::PathBuf;
use std::process::ExitCode;

/// Streaming text macro processor
#[derive(Parser, Debug)]
#[command(name = "smac")]
#[command(version = VERSION)]
#[command(about = "A streaming text macro processor")]
#[command(long_about = "Expands $(...) macro invocations in a byte stream")]
struct CliArgs {
    /// Input file to expand ('-' or absent reads standard input)
    #[arg(value_name = "FILE")]
    input: Option<String>,

    /// Extra arguments visible as $(N) at the top level
    #[arg(value_name = "ARGS")]
    args: Vec<String>,

    /// Add an allowed root for include/output/append (can be repeated)
    #[arg(long = "fs-sandbox", value_name = "PATH", action = clap::ArgAction::Append)]
    fs_paths: Vec<PathBuf>,

    /// Start an interactive session instead of processing a file
    #[arg(short = 'i', long = "interactive")]
    interactive: bool,

    /// Dump the macro table to standard error after the run
    #[arg(long = "dump-macros")]
    dump_macros: bool,
}

// ============================================================================
// Host I/O state shared with the include/output/append built-ins
// ============================================================================

enum OutputTarget {
    Stdout,
    File(cap_std::fs::File),
    Discard,
}

struct HostIo {
    /// Stack of input readers; `include` pushes, end of file pops
    inputs: Vec<TrackedReader>,
    /// Readers at or below this index are never popped (the primary input)
    base: usize,
    output: OutputTarget,
    sandbox: Sandbox,
}

thread_local! {
    static HOST: RefCell<Option<HostIo>> = const { RefCell::new(None) };
}

fn set_host_storage(host: HostIo) {
    HOST.with(|h| {
        *h.borrow_mut() = Some(host);
    });
}

fn with_host<T>(f: impl FnOnce(&mut HostIo) -> Result<T, EngineError>) -> Result<T, EngineError> {
    HOST.with(|h| {
        let mut slot = h.borrow_mut();
        let host = slot
            .as_mut()
            .ok_or_else(|| EngineError::host("host I/O is not initialized"))?;
        f(host)
    })
}

// ============================================================================
// Host built-ins
// ============================================================================

/// Push a new input file; subsequent bytes come from it until end of file.
fn bi_include(_engine: &mut Engine, args: &[Vec<u8>]) -> Result<(), EngineError> {
    if args.len() != 2 {
        return Err(EngineError::arity("include", ARITY_EXACTLY_ONE));
    }

    let path = String::from_utf8_lossy(&args[1]).into_owned();
    with_host(|host| {
        if host.inputs.len() > MAX_INCLUDE_NEST {
            return Err(EngineError::IncludeTooDeep);
        }
        let file = host
            .sandbox
            .open_read(&path)
            .map_err(|e| EngineError::host(e.to_string()))?;
        host.inputs
            .push(TrackedReader::new(path, Box::new(io::BufReader::new(file))));
        Ok(())
    })
}

fn switch_output(host: &mut HostIo, path: Option<&str>, append: bool) -> Result<(), EngineError> {
    // the previous target closes when dropped
    host.output = match path {
        None => OutputTarget::Discard,
        Some("-") => OutputTarget::Stdout,
        Some(p) => OutputTarget::File(
            host.sandbox
                .open_write(p, append)
                .map_err(|e| EngineError::host(e.to_string()))?,
        ),
    };
    Ok(())
}

/// Redirect expansion output to a file (truncating); `-` is standard
/// output; with no argument the current file is closed and output dropped.
fn bi_output(_engine: &mut Engine, args: &[Vec<u8>]) -> Result<(), EngineError> {
    if args.len() > 2 {
        return Err(EngineError::arity("output", ARITY_ZERO_OR_ONE));
    }

    if args.len() == 1 {
        with_host(|host| switch_output(host, None, false))
    } else {
        let path = String::from_utf8_lossy(&args[1]).into_owned();
        with_host(|host| switch_output(host, Some(&path), false))
    }
}

/// Like `output` but appends to the named file.
fn bi_append(_engine: &mut Engine, args: &[Vec<u8>]) -> Result<(), EngineError> {
    if args.len() > 2 {
        return Err(EngineError::arity("append", ARITY_ZERO_OR_ONE));
    }

    if args.len() == 1 {
        with_host(|host| switch_output(host, None, false))
    } else {
        let path = String::from_utf8_lossy(&args[1]).into_owned();
        with_host(|host| switch_output(host, Some(&path), true))
    }
}

// ============================================================================
// Drive loop
// ============================================================================

/// Get the next input byte, unwinding finished include files. `Ok(None)`
/// means the primary input (or, interactively, the whole stack) ran dry.
fn next_input_byte() -> Result<Option<u8>, String> {
    HOST.with(|h| {
        let mut slot = h.borrow_mut();
        let host = match slot.as_mut() {
            Some(host) => host,
            None => return Ok(None),
        };
        loop {
            let depth = host.inputs.len();
            let reader = match host.inputs.last_mut() {
                Some(reader) => reader,
                None => return Ok(None),
            };
            match reader.next_byte() {
                Ok(Some(c)) => return Ok(Some(c)),
                Ok(None) => {
                    if depth > host.base {
                        host.inputs.pop();
                    } else {
                        return Ok(None);
                    }
                }
                Err(_) => return Err(reader.diagnostic("error reading input")),
            }
        }
    })
}

/// Render a diagnostic against the position of the innermost input.
fn diagnostic_here(message: &str) -> String {
    HOST.with(|h| {
        let slot = h.borrow();
        match slot.as_ref().and_then(|host| host.inputs.last()) {
            Some(reader) => reader.diagnostic(message),
            None => message.to_string(),
        }
    })
}

/// Hand a chunk of expansion output to the current target.
fn write_output(bytes: &[u8]) -> Result<(), String> {
    if bytes.is_empty() {
        return Ok(());
    }
    with_host(|host| {
        let result = match &mut host.output {
            OutputTarget::Stdout => io::stdout().write_all(bytes),
            OutputTarget::File(file) => file.write_all(bytes),
            OutputTarget::Discard => Ok(()),
        };
        result.map_err(|_| EngineError::host("error writing to output"))
    })
    .map_err(|e| e.to_string())
}

/// Feed every pending input byte through the engine, draining output as it
/// appears. Diagnostics come back already positioned.
fn pump(engine: &mut Engine) -> Result<(), String> {
    while let Some(c) = next_input_byte()? {
        engine
            .feed(c)
            .map_err(|e| diagnostic_here(&e.to_string()))?;
        write_output(&engine.take_output())?;
    }
    Ok(())
}

fn build_fs_config(args: &CliArgs) -> FsConfig {
    if args.fs_paths.is_empty() {
        FsConfig::default()
    } else {
        FsConfig {
            allowed_paths: args.fs_paths.clone(),
        }
    }
}

/// Top-level argument vector: program name, then the input file, then the
/// extra arguments, each visible to `$(N)` at the outermost level.
fn build_argv(args: &CliArgs) -> Vec<Vec<u8>> {
    let mut argv: Vec<Vec<u8>> = vec![b"smac".to_vec()];
    if let Some(input) = &args.input {
        argv.push(input.as_bytes().to_vec());
    }
    for extra in &args.args {
        argv.push(extra.as_bytes().to_vec());
    }
    argv
}

fn open_primary_input(name: &Option<String>) -> Result<TrackedReader, String> {
    match name.as_deref() {
        None | Some("-") => Ok(TrackedReader::new(
            "(stdin)",
            Box::new(io::BufReader::new(io::stdin())),
        )),
        Some(path) => {
            // the file named on the command line is trusted input
            let file = std::fs::File::open(path)
                .map_err(|e| format!("error opening file {}: {}", path, e))?;
            Ok(TrackedReader::new(
                path,
                Box::new(io::BufReader::new(file)),
            ))
        }
    }
}

fn run_file(engine: &mut Engine, args: &CliArgs, sandbox: Sandbox) -> Result<(), String> {
    let primary = open_primary_input(&args.input)?;
    set_host_storage(HostIo {
        inputs: vec![primary],
        base: 1,
        output: OutputTarget::Stdout,
        sandbox,
    });

    engine.start_expand(build_argv(args));
    pump(engine)?;

    if engine.expanding() {
        let message = EngineError::UnterminatedExpansion.to_string();
        return Err(diagnostic_here(&message));
    }

    io::stdout().flush().map_err(|_| "error writing to output".to_string())?;
    Ok(())
}

fn run_repl(engine: &mut Engine, args: &CliArgs, sandbox: Sandbox) -> Result<(), String> {
    set_host_storage(HostIo {
        inputs: Vec::new(),
        base: 0,
        output: OutputTarget::Stdout,
        sandbox,
    });

    let config = Config::builder().auto_add_history(true).build();
    let mut rl: rustyline::DefaultEditor =
        Editor::with_config(config).map_err(|e| format!("failed to initialize prompt: {}", e))?;

    let history_file = ".smac_history";
    let _ = rl.load_history(history_file);

    println!("smac {} interactive mode", VERSION);
    println!("Macro definitions persist across lines; Ctrl-D exits.");

    let argv = build_argv(args);
    engine.start_expand(argv.clone());

    loop {
        match rl.readline("smac> ") {
            Ok(line) => {
                let mut failed = false;
                for &c in line.as_bytes().iter().chain(b"\n") {
                    if let Err(e) = engine.feed(c) {
                        eprintln!("Error: {}", e);
                        failed = true;
                        break;
                    }
                    if let Err(e) = write_output(&engine.take_output()) {
                        eprintln!("Error: {}", e);
                        failed = true;
                        break;
                    }
                }
                // a line may have pulled in include files; drain them
                if !failed {
                    if let Err(e) = pump(engine) {
                        eprintln!("Error: {}", e);
                        failed = true;
                    }
                }
                if failed {
                    // definitions survive, the expansion state does not
                    engine.start_expand(argv.clone());
                }
                let _ = io::stdout().flush();
            }
            Err(ReadlineError::Interrupted) => {
                println!("^C");
                continue;
            }
            Err(ReadlineError::Eof) => {
                break;
            }
            Err(err) => {
                eprintln!("Error: {}", err);
                break;
            }
        }
    }

    if engine.expanding() {
        eprintln!("warning: session ended in middle of macro expansion");
    }

    let _ = rl.save_history(history_file);
    Ok(())
}

fn run(args: CliArgs) -> Result<(), String> {
    let fs_config = build_fs_config(&args);
    let sandbox = Sandbox::new(&fs_config).map_err(|e| e.to_string())?;

    let mut engine = Engine::new();
    register_builtins(&mut engine).map_err(|e| e.to_string())?;
    engine
        .define_builtin(b"include", bi_include)
        .map_err(|e| e.to_string())?;
    engine
        .define_builtin(b"output", bi_output)
        .map_err(|e| e.to_string())?;
    engine
        .define_builtin(b"append", bi_append)
        .map_err(|e| e.to_string())?;

    let result = if args.interactive {
        run_repl(&mut engine, &args, sandbox)
    } else {
        run_file(&mut engine, &args, sandbox)
    };

    if args.dump_macros {
        eprintln!("{}", engine.dump_table());
    }

    result
}

fn main() -> ExitCode {
    let args = CliArgs::parse();
    match run(args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(message) => {
            eprintln!("{}", message);
            ExitCode::FAILURE
        }
    }
}
