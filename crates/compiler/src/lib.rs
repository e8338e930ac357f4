//! Franz compiler library
//!
//! Pipeline: source → tokens → AST (with capture analysis) → LLVM IR text →
//! object/executable via clang, linked against the embedded runtime
//! archive. The driver then runs the produced executable and propagates its
//! exit status.

pub mod ast;
pub mod builtins;
pub mod capture_analysis;
pub mod codegen;
pub mod config;
pub mod lexer;
pub mod parser;
pub mod typecheck;

pub use ast::{Node, Opcode};
pub use codegen::{CodeGen, CodeGenError};
pub use config::{CompilerConfig, OptimizationLevel, Scoping};
pub use parser::parse;

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::Command;
use std::sync::OnceLock;

/// Embedded runtime library (located by build.rs).
static RUNTIME_LIB: &[u8] = include_bytes!(env!("FRANZ_RUNTIME_LIB_PATH"));

/// Minimum clang/LLVM version required.
/// The generated IR uses opaque pointers (`ptr`), which requires LLVM 15+.
const MIN_CLANG_VERSION: u32 = 15;

/// Cache for the clang version check; it only runs once per process.
static CLANG_VERSION_CHECKED: OnceLock<Result<u32, String>> = OnceLock::new();

fn check_clang_version() -> Result<u32, String> {
    CLANG_VERSION_CHECKED
        .get_or_init(|| {
            let output = Command::new("clang")
                .arg("--version")
                .output()
                .map_err(|e| {
                    format!(
                        "Failed to run clang: {}. Please install clang {} or later.",
                        e, MIN_CLANG_VERSION
                    )
                })?;

            if !output.status.success() {
                let stderr = String::from_utf8_lossy(&output.stderr);
                return Err(format!(
                    "clang --version failed with exit code {:?}: {}",
                    output.status.code(),
                    stderr
                ));
            }

            let version_str = String::from_utf8_lossy(&output.stdout);
            let version = parse_clang_version(&version_str).ok_or_else(|| {
                format!(
                    "Could not parse clang version from: {}\n\
                     franzc requires clang {} or later (for opaque pointer support).",
                    version_str.lines().next().unwrap_or(&version_str),
                    MIN_CLANG_VERSION
                )
            })?;

            // Apple clang numbers differ: Apple clang 14 is LLVM-15-based.
            let is_apple = version_str.contains("Apple clang");
            let effective_min = if is_apple { 14 } else { MIN_CLANG_VERSION };

            if version < effective_min {
                return Err(format!(
                    "clang version {} detected, but franzc requires {} {} or later.\n\
                     The generated LLVM IR uses opaque pointers (requires LLVM 15+).",
                    version,
                    if is_apple { "Apple clang" } else { "clang" },
                    effective_min
                ));
            }

            Ok(version)
        })
        .clone()
}

/// Parse the major version number from `clang --version` output.
fn parse_clang_version(output: &str) -> Option<u32> {
    for line in output.lines() {
        if line.contains("clang version")
            && let Some(idx) = line.find("version ")
        {
            let after_version = &line[idx + 8..];
            let major: String = after_version
                .chars()
                .take_while(|c| c.is_ascii_digit())
                .collect();
            if !major.is_empty() {
                return major.parse().ok();
            }
        }
    }
    None
}

/// Compile a source string to LLVM IR text.
pub fn compile_to_ir(source: &str, config: &CompilerConfig) -> Result<String, String> {
    let mut program = parser::parse(source).map_err(|e| e.to_string())?;
    capture_analysis::analyze(&mut program).map_err(|e| e.to_string())?;

    if config.assert_types
        && let Err(errors) = typecheck::assert_types(&program)
    {
        let lines: Vec<String> = errors.iter().map(|e| e.to_string()).collect();
        return Err(lines.join("\n"));
    }

    if config.debug {
        eprintln!("--- tokens ---");
        if let Ok(tokens) = lexer::tokenize(source) {
            eprintln!("{}", lexer::print_tokens(&tokens));
        }
        eprintln!("--- ast ---");
        eprint!("{}", program.dump());
    }

    let mut codegen = CodeGen::new(config.clone());
    codegen.codegen_program(&program).map_err(|e| e.to_string())
}

/// Compile a source file into an executable at `output_path`.
pub fn compile_file(
    source_path: &Path,
    output_path: &Path,
    config: &CompilerConfig,
) -> Result<(), String> {
    let source = fs::read_to_string(source_path)
        .map_err(|e| format!("Failed to read source file: {}", e))?;

    // Project configuration next to the source, when present.
    let mut config = config.clone();
    if let Some(dir) = source_path.parent() {
        let project_file = dir.join("franz.toml");
        if project_file.exists() {
            let content = fs::read_to_string(&project_file)
                .map_err(|e| format!("Failed to read franz.toml: {}", e))?;
            config.apply_project_file(&content)?;
        }
    }

    let ir = compile_to_ir(&source, &config)?;

    let ir_path = output_path.with_extension("ll");
    fs::write(&ir_path, ir).map_err(|e| format!("Failed to write IR file: {}", e))?;
    if config.debug {
        eprintln!("IR written to {}", ir_path.display());
    }

    check_clang_version()?;

    // Extract the embedded runtime archive next to the build products.
    let runtime_path = std::env::temp_dir().join("libfranz_runtime.a");
    {
        let mut file = fs::File::create(&runtime_path)
            .map_err(|e| format!("Failed to create runtime lib: {}", e))?;
        file.write_all(RUNTIME_LIB)
            .map_err(|e| format!("Failed to write runtime lib: {}", e))?;
    }

    let mut clang = Command::new("clang");
    clang
        .arg(config.optimization_level.clang_flag())
        .arg(&ir_path)
        .arg("-o")
        .arg(output_path)
        .arg("-L")
        .arg(runtime_path.parent().unwrap())
        .arg("-lfranz_runtime")
        .arg("-lm");
    #[cfg(target_os = "linux")]
    clang.arg("-lpthread").arg("-ldl");

    if config.debug {
        eprintln!("link: {:?}", clang);
    }

    let output = clang
        .output()
        .map_err(|e| format!("Failed to run clang: {}", e))?;

    fs::remove_file(&runtime_path).ok();

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(format!("Clang compilation failed:\n{}", stderr));
    }

    if !config.keep_ir && !config.debug {
        fs::remove_file(&ir_path).ok();
    }

    Ok(())
}

/// Compile a source file and run it with the given arguments. Returns the
/// program's exit code.
pub fn compile_and_run(
    source_path: &Path,
    args: &[String],
    config: &CompilerConfig,
) -> Result<i32, String> {
    let exe_path = temp_executable_path(source_path);
    compile_file(source_path, &exe_path, config)?;

    let status = Command::new(&exe_path)
        .args(args)
        .status()
        .map_err(|e| format!("Failed to run {}: {}", exe_path.display(), e))?;

    if !config.debug {
        fs::remove_file(&exe_path).ok();
    } else {
        eprintln!("executable kept at {}", exe_path.display());
    }

    Ok(status.code().unwrap_or(1))
}

fn temp_executable_path(source_path: &Path) -> PathBuf {
    let stem = source_path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "program".to_string());
    std::env::temp_dir().join(format!("franz-{}-{}", stem, std::process::id()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_clang_version_standard() {
        let output = "clang version 15.0.0 (https://github.com/llvm/llvm-project)\nTarget: x86_64";
        assert_eq!(parse_clang_version(output), Some(15));
    }

    #[test]
    fn test_parse_clang_version_apple() {
        let output =
            "Apple clang version 14.0.3 (clang-1403.0.22.14.1)\nTarget: arm64-apple-darwin";
        assert_eq!(parse_clang_version(output), Some(14));
    }

    #[test]
    fn test_parse_clang_version_invalid() {
        assert_eq!(parse_clang_version("no version here"), None);
        assert_eq!(parse_clang_version("version "), None);
    }

    #[test]
    fn test_compile_to_ir_smoke() {
        let ir = compile_to_ir(
            "(println \"hello\")",
            &CompilerConfig::default(),
        )
        .unwrap();
        assert!(ir.contains("define i32 @main"));
        assert!(ir.contains("franz_rt_print"));
    }
}
