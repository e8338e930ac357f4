//! Compiler configuration
//!
//! Built from CLI flags, environment, and an optional `franz.toml` next to
//! the source file.

use serde::Deserialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Scoping {
    #[default]
    Lexical,
    /// Deprecated: compiled closures always capture lexically; selecting
    /// dynamic scoping only produces a warning.
    Dynamic,
}

impl Scoping {
    pub fn parse(s: &str) -> Option<Scoping> {
        match s {
            "lexical" => Some(Scoping::Lexical),
            "dynamic" => Some(Scoping::Dynamic),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OptimizationLevel {
    O0,
    O1,
    #[default]
    O2,
    O3,
}

impl OptimizationLevel {
    pub fn clang_flag(self) -> &'static str {
        match self {
            OptimizationLevel::O0 => "-O0",
            OptimizationLevel::O1 => "-O1",
            OptimizationLevel::O2 => "-O2",
            OptimizationLevel::O3 => "-O3",
        }
    }

    fn parse(s: &str) -> Option<OptimizationLevel> {
        match s {
            "O0" | "0" => Some(OptimizationLevel::O0),
            "O1" | "1" => Some(OptimizationLevel::O1),
            "O2" | "2" => Some(OptimizationLevel::O2),
            "O3" | "3" => Some(OptimizationLevel::O3),
            _ => None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct CompilerConfig {
    /// Self-recursive tail calls become jumps to the entry block.
    pub tco: bool,
    /// Verbose diagnostics: tokens, AST, IR path, link command.
    pub debug: bool,
    /// Run the type-assertion pre-flight before lowering.
    pub assert_types: bool,
    pub scoping: Scoping,
    /// Keep the intermediate .ll next to the output.
    pub keep_ir: bool,
    pub optimization_level: OptimizationLevel,
}

impl Default for CompilerConfig {
    fn default() -> Self {
        CompilerConfig {
            tco: true,
            debug: false,
            assert_types: false,
            scoping: Scoping::Lexical,
            keep_ir: false,
            optimization_level: OptimizationLevel::default(),
        }
    }
}

impl CompilerConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Overlay settings from a `franz.toml` project file.
    pub fn apply_project_file(&mut self, content: &str) -> Result<(), String> {
        let file: ProjectFile =
            toml::from_str(content).map_err(|e| format!("franz.toml: {}", e))?;
        if let Some(build) = file.build {
            if let Some(tco) = build.tco {
                self.tco = tco;
            }
            if let Some(opt) = build.optimization {
                self.optimization_level = OptimizationLevel::parse(&opt)
                    .ok_or_else(|| format!("franz.toml: bad optimization level {:?}", opt))?;
            }
            if let Some(scoping) = build.scoping {
                self.scoping = Scoping::parse(&scoping)
                    .ok_or_else(|| format!("franz.toml: bad scoping {:?}", scoping))?;
            }
        }
        Ok(())
    }
}

#[derive(Debug, Deserialize)]
struct ProjectFile {
    build: Option<BuildSection>,
}

#[derive(Debug, Deserialize)]
struct BuildSection {
    tco: Option<bool>,
    optimization: Option<String>,
    scoping: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let c = CompilerConfig::default();
        assert!(c.tco);
        assert_eq!(c.scoping, Scoping::Lexical);
        assert_eq!(c.optimization_level, OptimizationLevel::O2);
    }

    #[test]
    fn test_project_file_overlay() {
        let mut c = CompilerConfig::default();
        c.apply_project_file("[build]\ntco = false\noptimization = \"O0\"\n")
            .unwrap();
        assert!(!c.tco);
        assert_eq!(c.optimization_level, OptimizationLevel::O0);
    }

    #[test]
    fn test_bad_project_file() {
        let mut c = CompilerConfig::default();
        assert!(c.apply_project_file("[build]\noptimization = \"O9\"").is_err());
    }
}
