//! Capture analysis
//!
//! Post-parse pass over the AST. For every Function node it records the
//! free-variable set (identifiers referenced in the body that are not bound
//! by its parameters or an inner assignment, and are not builtins); those
//! sets drive the by-value environment snapshots during lowering. The pass
//! also validates assignment shapes and rejects rebinding of names not
//! introduced with `mut`.
//!
//! A function assigned to a name (`f = {…}` or `(define f {…})`) may
//! reference that name inside its own body without capturing it: self
//! references resolve at lowering time through the known-function table,
//! never through the environment.

use crate::ast::{Node, Opcode};
use crate::builtins;
use std::collections::{BTreeSet, HashMap};
use std::fmt;

#[derive(Debug, Clone, PartialEq)]
pub struct AnalysisError {
    pub line: usize,
    pub message: String,
}

impl fmt::Display for AnalysisError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Type Error @ Line {}: {}", self.line, self.message)
    }
}

/// Analyze the whole program (a top-level Statement node).
pub fn analyze(program: &mut Node) -> Result<(), AnalysisError> {
    let mut scope = ScopeInfo::new();
    analyze_statements(program, &mut scope)?;
    Ok(())
}

/// Per-function binding info: name → mutable flag.
struct ScopeInfo {
    bindings: HashMap<String, bool>,
    /// Names referenced but not bound here (candidate captures).
    refs: BTreeSet<String>,
}

impl ScopeInfo {
    fn new() -> ScopeInfo {
        ScopeInfo {
            bindings: HashMap::new(),
            refs: BTreeSet::new(),
        }
    }

    fn bind(&mut self, name: &str, mutable: bool, line: usize) -> Result<(), AnalysisError> {
        if let Some(&was_mutable) = self.bindings.get(name) {
            if !was_mutable {
                return Err(AnalysisError {
                    line,
                    message: format!(
                        "cannot reassign {:?}; bind it with 'mut' to allow rebinding",
                        name
                    ),
                });
            }
        }
        self.bindings.insert(name.to_string(), mutable);
        Ok(())
    }

    fn reference(&mut self, name: &str) {
        if !self.bindings.contains_key(name) && !builtins::is_builtin(name) {
            self.refs.insert(name.to_string());
        }
    }
}

fn analyze_statements(stmt: &mut Node, scope: &mut ScopeInfo) -> Result<(), AnalysisError> {
    debug_assert_eq!(stmt.opcode, Opcode::Statement);
    for child in &mut stmt.children {
        analyze_node(child, scope)?;
    }
    Ok(())
}

fn analyze_node(node: &mut Node, scope: &mut ScopeInfo) -> Result<(), AnalysisError> {
    match node.opcode {
        Opcode::Int | Opcode::Float | Opcode::Str | Opcode::Qualified => Ok(()),
        Opcode::Identifier => {
            scope.reference(node.text());
            Ok(())
        }
        Opcode::Assignment => {
            let line = node.line;
            let mutable = node.is_mutable;
            let name = node.children[0].text().to_string();
            // The RHS sees the enclosing binding of the same name (if any),
            // except for a function, which may self-reference by name.
            analyze_value(&mut node.children[1], scope, Some(&name))?;
            scope.bind(&name, mutable, line)
        }
        Opcode::Return => {
            for child in &mut node.children {
                analyze_node(child, scope)?;
            }
            Ok(())
        }
        Opcode::Statement => analyze_statements(node, scope),
        Opcode::Signature => {
            // Signature declarations bind nothing; their expression is
            // consumed by the type-assertion pass.
            Ok(())
        }
        Opcode::List => {
            for child in &mut node.children {
                analyze_node(child, scope)?;
            }
            Ok(())
        }
        Opcode::Application => {
            // (define name expr) binds like an assignment.
            if node.children.len() == 3
                && node.children[0].opcode == Opcode::Identifier
                && node.children[0].text() == "define"
                && node.children[1].opcode == Opcode::Identifier
            {
                let line = node.line;
                let name = node.children[1].text().to_string();
                analyze_value(&mut node.children[2], scope, Some(&name))?;
                return scope.bind(&name, false, line);
            }
            for child in &mut node.children {
                analyze_node(child, scope)?;
            }
            Ok(())
        }
        Opcode::Function => analyze_function(node, scope, None),
    }
}

fn analyze_value(
    node: &mut Node,
    scope: &mut ScopeInfo,
    self_name: Option<&str>,
) -> Result<(), AnalysisError> {
    if node.opcode == Opcode::Function {
        analyze_function(node, scope, self_name)
    } else {
        analyze_node(node, scope)
    }
}

/// Analyze a function body in a fresh scope; record its free variables and
/// propagate the ones this scope cannot satisfy outward.
fn analyze_function(
    func: &mut Node,
    outer: &mut ScopeInfo,
    self_name: Option<&str>,
) -> Result<(), AnalysisError> {
    let mut inner = ScopeInfo::new();
    for param in func.fn_params() {
        inner.bindings.insert(param.text().to_string(), false);
    }
    if let Some(name) = self_name {
        inner.bindings.insert(name.to_string(), false);
    }

    let body_idx = func.children.len() - 1;
    analyze_statements(&mut func.children[body_idx], &mut inner)?;

    func.free_vars = inner.refs.clone();
    // Free names of the inner function that this enclosing scope does not
    // bind either become candidate captures one level further out.
    for name in inner.refs {
        outer.reference(&name);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse;

    fn analyzed(src: &str) -> Node {
        let mut ast = parse(src).unwrap();
        analyze(&mut ast).unwrap();
        ast
    }

    fn free_of(node: &Node) -> Vec<&str> {
        node.free_vars.iter().map(|s| s.as_str()).collect()
    }

    #[test]
    fn test_parameter_is_not_free() {
        let ast = analyzed("{x -> <- x}");
        assert!(free_of(&ast.children[0]).is_empty());
    }

    #[test]
    fn test_captured_name_is_free() {
        // The inner function captures n; the outer one binds it.
        let ast = analyzed("{n -> <- {x -> <- (add n x)}}");
        let outer = &ast.children[0];
        assert!(free_of(outer).is_empty());
        let inner = &outer.fn_body().children[0].children[0];
        assert_eq!(inner.opcode, Opcode::Function);
        assert_eq!(free_of(inner), vec!["n"]);
    }

    #[test]
    fn test_builtins_are_not_captured() {
        let ast = analyzed("{x -> (println (add x 1))}");
        assert!(free_of(&ast.children[0]).is_empty());
    }

    #[test]
    fn test_inner_assignment_binds() {
        let ast = analyzed("{-> y = 5 <- y}");
        assert!(free_of(&ast.children[0]).is_empty());
    }

    #[test]
    fn test_self_reference_is_not_captured() {
        let ast = analyzed("f = {i -> <- (f i)}");
        let func = &ast.children[0].children[1];
        assert!(free_of(func).is_empty());
    }

    #[test]
    fn test_define_self_reference() {
        let ast = analyzed("(define g {i -> <- (g i)})");
        let func = &ast.children[0].children[2];
        assert!(free_of(func).is_empty());
    }

    #[test]
    fn test_capture_propagates_through_levels() {
        // z is bound at top level; both nested functions see it.
        let ast = analyzed("z = 1\nf = {-> <- {-> <- z}}");
        let f = &ast.children[1].children[1];
        assert_eq!(free_of(f), vec!["z"]);
    }

    #[test]
    fn test_reassign_immutable_rejected() {
        let mut ast = parse("x = 1\nx = 2").unwrap();
        let err = analyze(&mut ast).unwrap_err();
        assert!(err.message.contains("mut"));
    }

    #[test]
    fn test_reassign_mutable_allowed() {
        analyzed("mut x = 1\nx = 2");
    }

    #[test]
    fn test_free_vars_deterministic_order() {
        let ast = analyzed("b = 1\na = 2\nf = {-> <- (add a b)}");
        let f = &ast.children[2].children[1];
        assert_eq!(free_of(f), vec!["a", "b"]);
    }
}
