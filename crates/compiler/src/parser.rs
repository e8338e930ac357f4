//! Parser
//!
//! Recursive descent over the token array, operating on half-open index
//! spans. Dispatch is driven by the head token of each span: a single
//! token is a literal or identifier, `id . id` is a qualified name, `(`
//! opens an application, `{` a function, `[` a list literal.

use crate::ast::{Node, Opcode};
use crate::lexer::{LexError, Token, TokenKind, tokenize};
use std::fmt;

#[derive(Debug, Clone, PartialEq)]
pub struct ParseError {
    pub line: usize,
    pub message: String,
}

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Syntax Error @ Line {}: {}", self.line, self.message)
    }
}

impl From<LexError> for ParseError {
    fn from(e: LexError) -> ParseError {
        ParseError {
            line: e.line,
            message: e.message,
        }
    }
}

pub struct Parser {
    tokens: Vec<Token>,
}

/// Parse a whole source buffer into the top-level statement sequence.
pub fn parse(source: &str) -> Result<Node, ParseError> {
    let tokens = tokenize(source)?;
    let parser = Parser { tokens };
    // Skip the Start/End sentinels.
    let end = parser.tokens.len() - 1;
    let program = parser.parse_statement_span(1, end)?;
    program.validate().map_err(|message| ParseError {
        line: program.line,
        message,
    })?;
    Ok(program)
}

impl Parser {
    fn token(&self, idx: usize) -> &Token {
        &self.tokens[idx]
    }

    fn err(&self, idx: usize, message: impl Into<String>) -> ParseError {
        ParseError {
            line: self.token(idx.min(self.tokens.len() - 1)).line,
            message: message.into(),
        }
    }

    /// Index of the closer matching the opener at `open_idx`, with balanced
    /// nesting of all three bracket kinds.
    fn skip_closure(&self, open_idx: usize, open: TokenKind, close: TokenKind) -> Result<usize, ParseError> {
        debug_assert_eq!(self.token(open_idx).kind, open);
        let mut depth = 0usize;
        let mut i = open_idx;
        loop {
            match self.token(i).kind {
                TokenKind::End => {
                    return Err(self.err(
                        open_idx,
                        format!("unmatched {} opened here", self.token(open_idx)),
                    ));
                }
                k if k == open => depth += 1,
                k if k == close => {
                    depth -= 1;
                    if depth == 0 {
                        return Ok(i);
                    }
                }
                _ => {}
            }
            i += 1;
        }
    }

    /// Parse one value form starting at `idx`; returns the node and the
    /// index just past it.
    fn parse_value(&self, idx: usize) -> Result<(Node, usize), ParseError> {
        let tok = self.token(idx);
        match tok.kind {
            TokenKind::Int => Ok((Node::with_value(Opcode::Int, tok.text(), tok.line), idx + 1)),
            TokenKind::Float => Ok((
                Node::with_value(Opcode::Float, tok.text(), tok.line),
                idx + 1,
            )),
            TokenKind::Str => Ok((Node::with_value(Opcode::Str, tok.text(), tok.line), idx + 1)),
            TokenKind::Identifier => {
                // Three-token qualified name: id . id
                if self.token(idx + 1).kind == TokenKind::Dot
                    && self.token(idx + 2).kind == TokenKind::Identifier
                {
                    let name = format!("{}.{}", tok.text(), self.token(idx + 2).text());
                    return Ok((
                        Node::with_value(Opcode::Qualified, name, tok.line),
                        idx + 3,
                    ));
                }
                Ok((
                    Node::with_value(Opcode::Identifier, tok.text(), tok.line),
                    idx + 1,
                ))
            }
            TokenKind::ApplyOpen => self.parse_application(idx),
            TokenKind::FuncOpen => self.parse_function(idx),
            TokenKind::ListOpen => self.parse_list_literal(idx),
            _ => Err(self.err(idx, format!("unexpected token {}", tok))),
        }
    }

    /// `(callee arg…)`: the callee and every argument parse as values.
    fn parse_application(&self, open_idx: usize) -> Result<(Node, usize), ParseError> {
        let close = self.skip_closure(open_idx, TokenKind::ApplyOpen, TokenKind::ApplyClose)?;
        let mut node = Node::new(Opcode::Application, self.token(open_idx).line);

        let mut i = open_idx + 1;
        if i == close {
            return Err(self.err(open_idx, "empty application"));
        }
        while i < close {
            let (child, next) = self.parse_value(i)?;
            node.children.push(child);
            i = next;
        }
        Ok((node, close + 1))
    }

    /// `{param… -> body…}` or `{body…}` (nullary): a top-level arrow at
    /// bracket depth zero splits parameters from the body.
    fn parse_function(&self, open_idx: usize) -> Result<(Node, usize), ParseError> {
        let close = self.skip_closure(open_idx, TokenKind::FuncOpen, TokenKind::FuncClose)?;
        let mut node = Node::new(Opcode::Function, self.token(open_idx).line);

        // Locate a top-level arrow.
        let mut arrow = None;
        let mut depth = 0i64;
        for i in open_idx + 1..close {
            match self.token(i).kind {
                TokenKind::ApplyOpen | TokenKind::FuncOpen | TokenKind::ListOpen => depth += 1,
                TokenKind::ApplyClose | TokenKind::FuncClose | TokenKind::ListClose => depth -= 1,
                TokenKind::Arrow if depth == 0 => {
                    arrow = Some(i);
                    break;
                }
                _ => {}
            }
        }

        let body_start = match arrow {
            Some(arrow_idx) => {
                for i in open_idx + 1..arrow_idx {
                    let tok = self.token(i);
                    if tok.kind != TokenKind::Identifier {
                        return Err(
                            self.err(i, format!("expected parameter name, got {}", tok))
                        );
                    }
                    node.children
                        .push(Node::with_value(Opcode::Identifier, tok.text(), tok.line));
                }
                arrow_idx + 1
            }
            None => open_idx + 1,
        };

        let body = self.parse_statement_span(body_start, close)?;
        node.children.push(body);
        Ok((node, close + 1))
    }

    /// `[e1, e2, …]` with comma-separated elements.
    fn parse_list_literal(&self, open_idx: usize) -> Result<(Node, usize), ParseError> {
        let close = self.skip_closure(open_idx, TokenKind::ListOpen, TokenKind::ListClose)?;
        let mut node = Node::new(Opcode::List, self.token(open_idx).line);

        let mut i = open_idx + 1;
        while i < close {
            let (child, next) = self.parse_value(i)?;
            node.children.push(child);
            i = next;
            if i < close {
                if self.token(i).kind != TokenKind::Comma {
                    return Err(self.err(
                        i,
                        format!("expected ',' between list elements, got {}", self.token(i)),
                    ));
                }
                i += 1;
                if i == close {
                    return Err(self.err(i, "trailing ',' in list literal"));
                }
            }
        }
        Ok((node, close + 1))
    }

    /// A statement sequence over `[start, end)`: returns, assignments,
    /// signature declarations and expression statements.
    fn parse_statement_span(&self, start: usize, end: usize) -> Result<Node, ParseError> {
        let line = if start < self.tokens.len() && start < end {
            self.token(start).line
        } else {
            self.token(start.saturating_sub(1)).line
        };
        let mut node = Node::new(Opcode::Statement, line);

        let mut i = start;
        while i < end {
            match self.token(i).kind {
                TokenKind::Return => {
                    if i + 1 >= end {
                        return Err(self.err(i, "expected expression after '<-'"));
                    }
                    let mut ret = Node::new(Opcode::Return, self.token(i).line);
                    let (value, next) = self.parse_value(i + 1)?;
                    ret.children.push(value);
                    node.children.push(ret);
                    i = next;
                }
                TokenKind::KwMut => {
                    if self.token(i + 1).kind != TokenKind::Identifier {
                        return Err(self.err(i, "expected name after 'mut'"));
                    }
                    if self.token(i + 2).kind != TokenKind::Assign {
                        return Err(self.err(i, "expected '=' after 'mut' name"));
                    }
                    let mut assign = self.parse_assignment(i + 1, end)?;
                    assign.0.is_mutable = true;
                    node.children.push(assign.0);
                    i = assign.1;
                }
                TokenKind::KwSig => {
                    if self.token(i + 1).kind != TokenKind::Identifier
                        || self.token(i + 2).kind != TokenKind::Assign
                    {
                        return Err(self.err(i, "expected 'sig name = expression'"));
                    }
                    let ident_tok = self.token(i + 1);
                    let mut sig = Node::new(Opcode::Signature, self.token(i).line);
                    sig.children.push(Node::with_value(
                        Opcode::Identifier,
                        ident_tok.text(),
                        ident_tok.line,
                    ));
                    let (value, next) = self.parse_value(i + 3)?;
                    sig.children.push(value);
                    node.children.push(sig);
                    i = next;
                }
                TokenKind::Identifier if self.token(i + 1).kind == TokenKind::Assign => {
                    let assign = self.parse_assignment(i, end)?;
                    node.children.push(assign.0);
                    i = assign.1;
                }
                _ => {
                    let (child, next) = self.parse_value(i)?;
                    node.children.push(child);
                    i = next;
                }
            }
        }
        Ok(node)
    }

    /// `name = expr` starting at the identifier.
    fn parse_assignment(&self, ident_idx: usize, end: usize) -> Result<(Node, usize), ParseError> {
        let ident_tok = self.token(ident_idx);
        let mut assign = Node::new(Opcode::Assignment, ident_tok.line);
        assign.children.push(Node::with_value(
            Opcode::Identifier,
            ident_tok.text(),
            ident_tok.line,
        ));
        if ident_idx + 2 >= end {
            return Err(self.err(ident_idx, "expected expression after '='"));
        }
        let (value, next) = self.parse_value(ident_idx + 2)?;
        assign.children.push(value);
        Ok((assign, next))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_assignment_shape() {
        let ast = parse("x = 42").unwrap();
        assert_eq!(ast.opcode, Opcode::Statement);
        let assign = &ast.children[0];
        assert_eq!(assign.opcode, Opcode::Assignment);
        assert_eq!(assign.children.len(), 2);
        assert_eq!(assign.children[0].text(), "x");
        assert_eq!(assign.children[1].opcode, Opcode::Int);
        assert!(!assign.is_mutable);
    }

    #[test]
    fn test_mut_assignment() {
        let ast = parse("mut counter = 0").unwrap();
        assert!(ast.children[0].is_mutable);
    }

    #[test]
    fn test_mut_without_name_fails() {
        assert!(parse("mut = 1").is_err());
        assert!(parse("mut x 1").is_err());
    }

    #[test]
    fn test_application_children() {
        let ast = parse("(add 1 2)").unwrap();
        let app = &ast.children[0];
        assert_eq!(app.opcode, Opcode::Application);
        assert_eq!(app.children.len(), 3);
        assert_eq!(app.children[0].text(), "add");
    }

    #[test]
    fn test_nested_application() {
        let ast = parse("(println (add 1 2) 3)").unwrap();
        let app = &ast.children[0];
        assert_eq!(app.children.len(), 3);
        assert_eq!(app.children[1].opcode, Opcode::Application);
    }

    #[test]
    fn test_function_with_params() {
        let ast = parse("{a b -> <- (add a b)}").unwrap();
        let f = &ast.children[0];
        assert_eq!(f.opcode, Opcode::Function);
        assert_eq!(f.fn_params().len(), 2);
        let body = f.fn_body();
        assert_eq!(body.opcode, Opcode::Statement);
        assert_eq!(body.children[0].opcode, Opcode::Return);
    }

    #[test]
    fn test_nullary_function() {
        let ast = parse("{(println 1)}").unwrap();
        let f = &ast.children[0];
        assert_eq!(f.fn_params().len(), 0);
    }

    #[test]
    fn test_arrow_inside_nested_function_is_not_split() {
        // The outer function has no parameters; the inner one has x.
        let ast = parse("{{x -> <- x}}").unwrap();
        let outer = &ast.children[0];
        assert_eq!(outer.fn_params().len(), 0);
        let inner = &outer.fn_body().children[0];
        assert_eq!(inner.opcode, Opcode::Function);
        assert_eq!(inner.fn_params().len(), 1);
    }

    #[test]
    fn test_qualified_name() {
        let ast = parse("(println math.pi)").unwrap();
        let arg = &ast.children[0].children[1];
        assert_eq!(arg.opcode, Opcode::Qualified);
        assert_eq!(arg.text(), "math.pi");
    }

    #[test]
    fn test_list_literal() {
        let ast = parse("[1, 2.5, \"three\", [4]]").unwrap();
        let list = &ast.children[0];
        assert_eq!(list.opcode, Opcode::List);
        assert_eq!(list.children.len(), 4);
        assert_eq!(list.children[3].opcode, Opcode::List);
    }

    #[test]
    fn test_list_missing_comma_fails() {
        assert!(parse("[1 2]").is_err());
        assert!(parse("[1,]").is_err());
    }

    #[test]
    fn test_unbalanced_brackets_fail() {
        assert!(parse("(add 1 2").is_err());
        assert!(parse("{x -> x").is_err());
        assert!(parse("[1, 2").is_err());
    }

    #[test]
    fn test_signature_statement() {
        let ast = parse("sig inc = \"int -> int\"").unwrap();
        let sig = &ast.children[0];
        assert_eq!(sig.opcode, Opcode::Signature);
        assert_eq!(sig.children[0].text(), "inc");
    }

    #[test]
    fn test_statement_sequence() {
        let ast = parse("x = 1\ny = 2\n(println x y)").unwrap();
        assert_eq!(ast.children.len(), 3);
    }

    #[test]
    fn test_error_carries_line() {
        let err = parse("x = 1\n(oops ]").unwrap_err();
        assert_eq!(err.line, 2);
    }
}
