//! Abstract syntax tree
//!
//! Array-child nodes: every node owns an ordered `Vec` of children plus an
//! optional lexeme. Functions additionally carry the free-variable set the
//! capture analysis computes (ordered, so environment layout is
//! deterministic), and assignments carry a mutability flag.

use std::collections::BTreeSet;
use std::fmt::Write as _;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Opcode {
    Int,
    Float,
    Str,
    Identifier,
    Assignment,
    Return,
    Statement,
    Application,
    Function,
    Signature,
    Qualified,
    List,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Node {
    pub opcode: Opcode,
    pub value: Option<String>,
    pub line: usize,
    pub children: Vec<Node>,
    /// Free variables of a Function node, in deterministic order.
    pub free_vars: BTreeSet<String>,
    /// Lookup hints; -1 when unset. They never change a value's identity,
    /// only lookup speed.
    pub var_offset: i32,
    pub var_depth: i32,
    /// Assignment nodes: whether the binding was introduced with `mut`.
    pub is_mutable: bool,
}

impl Node {
    pub fn new(opcode: Opcode, line: usize) -> Node {
        Node {
            opcode,
            value: None,
            line,
            children: Vec::new(),
            free_vars: BTreeSet::new(),
            var_offset: -1,
            var_depth: -1,
            is_mutable: false,
        }
    }

    pub fn with_value(opcode: Opcode, value: impl Into<String>, line: usize) -> Node {
        let mut node = Node::new(opcode, line);
        node.value = Some(value.into());
        node
    }

    pub fn text(&self) -> &str {
        self.value.as_deref().unwrap_or("")
    }

    /// A Function's last child is its body; preceding children are
    /// parameter identifiers.
    pub fn fn_params(&self) -> &[Node] {
        debug_assert_eq!(self.opcode, Opcode::Function);
        &self.children[..self.children.len() - 1]
    }

    pub fn fn_body(&self) -> &Node {
        debug_assert_eq!(self.opcode, Opcode::Function);
        self.children.last().expect("function without body")
    }

    /// Structural well-formedness: assignments have exactly two children,
    /// functions and applications at least one.
    pub fn validate(&self) -> Result<(), String> {
        match self.opcode {
            Opcode::Assignment if self.children.len() != 2 => {
                return Err(format!(
                    "line {}: assignment must have exactly two children, has {}",
                    self.line,
                    self.children.len()
                ));
            }
            Opcode::Function if self.children.is_empty() => {
                return Err(format!("line {}: function without body", self.line));
            }
            Opcode::Application if self.children.is_empty() => {
                return Err(format!("line {}: application without callee", self.line));
            }
            _ => {}
        }
        for child in &self.children {
            child.validate()?;
        }
        Ok(())
    }

    /// Multi-line dump for `-d` diagnostics.
    pub fn dump(&self) -> String {
        let mut out = String::new();
        self.dump_into(&mut out, 0);
        out
    }

    fn dump_into(&self, out: &mut String, depth: usize) {
        for _ in 0..depth {
            out.push_str("  ");
        }
        let _ = write!(out, "{:?}", self.opcode);
        if let Some(v) = &self.value {
            let _ = write!(out, " {:?}", v);
        }
        if self.is_mutable {
            out.push_str(" mut");
        }
        if !self.free_vars.is_empty() {
            let names: Vec<&str> = self.free_vars.iter().map(|s| s.as_str()).collect();
            let _ = write!(out, " captures[{}]", names.join(", "));
        }
        let _ = writeln!(out, " @{}", self.line);
        for child in &self.children {
            child.dump_into(out, depth + 1);
        }
    }
}
