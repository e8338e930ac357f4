//! Type assertions
//!
//! The `--assert-types` pre-flight. This is deliberately an assertion pass,
//! not an inference engine: it flags statically-obvious mistakes (literal
//! operands of the wrong kind, builtin arity, `sig` arity disagreements)
//! and stays silent about anything dynamic.

use crate::ast::{Node, Opcode};
use crate::builtins::{self, Builtin};
use std::collections::HashMap;
use std::fmt;

#[derive(Debug, Clone, PartialEq)]
pub struct TypeError {
    pub line: usize,
    pub message: String,
}

impl fmt::Display for TypeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Type Error @ Line {}: {}", self.line, self.message)
    }
}

pub fn assert_types(program: &Node) -> Result<(), Vec<TypeError>> {
    let mut checker = Checker {
        errors: Vec::new(),
        sigs: HashMap::new(),
    };
    checker.collect_sigs(program);
    checker.check(program);
    if checker.errors.is_empty() {
        Ok(())
    } else {
        Err(checker.errors)
    }
}

struct Checker {
    errors: Vec<TypeError>,
    /// name → declared parameter count, from `sig name = "a -> b -> c"`.
    sigs: HashMap<String, usize>,
}

impl Checker {
    fn error(&mut self, line: usize, message: impl Into<String>) {
        self.errors.push(TypeError {
            line,
            message: message.into(),
        });
    }

    fn collect_sigs(&mut self, node: &Node) {
        if node.opcode == Opcode::Signature
            && let [name, sig_expr] = node.children.as_slice()
            && sig_expr.opcode == Opcode::Str
        {
            let params = sig_expr.text().matches("->").count();
            self.sigs.insert(name.text().to_string(), params);
        }
        for child in &node.children {
            self.collect_sigs(child);
        }
    }

    fn check(&mut self, node: &Node) {
        if node.opcode == Opcode::Assignment
            && let [name, value] = node.children.as_slice()
            && value.opcode == Opcode::Function
            && let Some(&declared) = self.sigs.get(name.text())
        {
            let actual = value.fn_params().len();
            if actual != declared {
                self.error(
                    node.line,
                    format!(
                        "{:?} declares {} parameter(s) but its signature has {}",
                        name.text(),
                        actual,
                        declared
                    ),
                );
            }
        }

        if node.opcode == Opcode::Application {
            self.check_application(node);
        }

        for child in &node.children {
            self.check(child);
        }
    }

    fn check_application(&mut self, app: &Node) {
        let head = &app.children[0];
        if head.opcode != Opcode::Identifier {
            return;
        }
        let args = &app.children[1..];
        match builtins::lookup(head.text()) {
            Some(Builtin::Arith(op)) => {
                let expected = if op == builtins::ArithOp::Neg { 1 } else { 2 };
                if args.len() != expected {
                    self.error(
                        app.line,
                        format!(
                            "{} expects {} argument(s), got {}",
                            head.text(),
                            expected,
                            args.len()
                        ),
                    );
                }
                for arg in args {
                    if self.is_string_concat(op, args) {
                        continue;
                    }
                    if matches!(
                        arg.opcode,
                        Opcode::Str | Opcode::List | Opcode::Function
                    ) {
                        self.error(
                            arg.line,
                            format!("{} cannot take a {:?} literal", head.text(), arg.opcode),
                        );
                    }
                }
            }
            Some(Builtin::Cmp(_)) => {
                if args.len() != 2 {
                    self.error(
                        app.line,
                        format!("{} expects 2 arguments, got {}", head.text(), args.len()),
                    );
                }
            }
            Some(Builtin::Runtime { arity, .. }) => {
                if args.len() != arity {
                    self.error(
                        app.line,
                        format!(
                            "{} expects {} argument(s), got {}",
                            head.text(),
                            arity,
                            args.len()
                        ),
                    );
                }
            }
            _ => {}
        }
    }

    /// `add` on two string literals concatenates; don't flag it.
    fn is_string_concat(&self, op: builtins::ArithOp, args: &[Node]) -> bool {
        op == builtins::ArithOp::Add
            && args.len() == 2
            && args.iter().all(|a| a.opcode == Opcode::Str)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse;

    fn check(src: &str) -> Result<(), Vec<TypeError>> {
        assert_types(&parse(src).unwrap())
    }

    #[test]
    fn test_clean_program_passes() {
        check("x = 1\n(println (add x 2))").unwrap();
    }

    #[test]
    fn test_string_literal_in_arithmetic() {
        let errors = check("(mul \"two\" 3)").unwrap_err();
        assert!(errors[0].message.contains("mul"));
    }

    #[test]
    fn test_string_concat_allowed() {
        check("(add \"a\" \"b\")").unwrap();
    }

    #[test]
    fn test_builtin_arity() {
        let errors = check("(dict_get d)").unwrap_err();
        assert!(errors[0].message.contains("2 argument"));
    }

    #[test]
    fn test_sig_arity_agreement() {
        let errors = check("sig inc = \"int -> int\"\ninc = {a b -> <- a}").unwrap_err();
        assert!(errors[0].message.contains("signature"));
        check("sig inc = \"int -> int\"\ninc = {a -> <- (add a 1)}").unwrap();
    }
}
