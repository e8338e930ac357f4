//! Franz compiler CLI
//!
//! `franzc [flags] <source> [args…]` — compile a .fz program, link it with
//! the runtime, run it, and propagate its exit status. Unknown flags are
//! accepted and ignored so wrapper scripts can pass extra options through.

use clap::Parser as ClapParser;
use franzc::config::{CompilerConfig, Scoping};
use std::io::Read;
use std::path::PathBuf;
use std::process;

#[derive(ClapParser)]
#[command(name = "franzc")]
#[command(disable_version_flag = true)]
#[command(about = "Franz compiler - compile and run .fz programs", long_about = None)]
struct Cli {
    /// Print version and exit
    #[arg(short = 'v', long = "version")]
    version: bool,

    /// Verbose diagnostics (tokens, AST, IR, link commands)
    #[arg(short = 'd')]
    debug: bool,

    /// Run the type-assertion pre-flight before lowering
    #[arg(long = "assert-types")]
    assert_types: bool,

    /// Disable tail-call optimization
    #[arg(long = "no-tco")]
    no_tco: bool,

    /// Closure activation scoping: lexical (default) or dynamic
    #[arg(long)]
    scoping: Option<String>,

    /// Source file (reads standard input when omitted)
    source: Option<PathBuf>,

    /// Arguments passed through to the compiled program
    #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
    args: Vec<String>,
}

/// Flags this interface understands; anything else flag-shaped before the
/// source argument is dropped.
fn known_flag(arg: &str) -> bool {
    matches!(
        arg,
        "-v" | "--version" | "-d" | "--assert-types" | "--no-tco" | "-h" | "--help"
    ) || arg.starts_with("--scoping")
}

/// Filter argv: unknown flags ahead of the source file are ignored.
fn filter_args() -> Vec<String> {
    let mut out = Vec::new();
    let mut seen_source = false;
    for (i, arg) in std::env::args().enumerate() {
        if i == 0 {
            out.push(arg);
            continue;
        }
        if seen_source || !arg.starts_with('-') {
            seen_source = seen_source || !arg.starts_with('-');
            out.push(arg);
            continue;
        }
        if known_flag(&arg) {
            out.push(arg);
        }
    }
    out
}

fn main() {
    let cli = Cli::parse_from(filter_args());

    if cli.version {
        println!("franzc {}", env!("CARGO_PKG_VERSION"));
        return;
    }

    let mut config = CompilerConfig {
        debug: cli.debug,
        assert_types: cli.assert_types,
        tco: !cli.no_tco,
        keep_ir: cli.debug,
        ..CompilerConfig::default()
    };

    // --scoping wins over the environment; the default is lexical.
    let scoping_text = cli
        .scoping
        .or_else(|| std::env::var("FRANZ_SCOPING").ok());
    if let Some(text) = scoping_text {
        match Scoping::parse(&text) {
            Some(s) => config.scoping = s,
            None => {
                eprintln!("Error: bad scoping {:?} (use lexical or dynamic)", text);
                process::exit(1);
            }
        }
    }
    if config.scoping == Scoping::Dynamic {
        eprintln!(
            "warning: dynamic scoping is deprecated; compiled closures capture lexically"
        );
    }

    // Source from the argument or standard input.
    let source_path = match cli.source {
        Some(path) => path,
        None => {
            let mut buffer = String::new();
            if std::io::stdin().read_to_string(&mut buffer).is_err() || buffer.is_empty() {
                eprintln!("Usage: franzc [flags] <source> [args...]");
                process::exit(1);
            }
            let path = std::env::temp_dir().join(format!("franz-stdin-{}.fz", process::id()));
            if let Err(e) = std::fs::write(&path, buffer) {
                eprintln!("Error: {}", e);
                process::exit(1);
            }
            path
        }
    };

    match franzc::compile_and_run(&source_path, &cli.args, &config) {
        Ok(code) => process::exit(code),
        Err(e) => {
            eprintln!("{}", e);
            process::exit(1);
        }
    }
}
