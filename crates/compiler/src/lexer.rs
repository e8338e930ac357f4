//! Lexer
//!
//! Single-pass state machine over the source bytes, producing a
//! random-access token array bracketed by Start/End sentinels. Identifiers
//! are maximal runs of non-structural characters; a `-` starts a number
//! when a digit follows and is an identifier character otherwise.

use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenKind {
    Assign,
    ApplyOpen,
    ApplyClose,
    FuncOpen,
    FuncClose,
    ListOpen,
    ListClose,
    Comma,
    Arrow,
    Return,
    Dot,
    Identifier,
    Int,
    Float,
    Str,
    KwSig,
    KwAs,
    KwMut,
    Start,
    End,
}

/// A lexical token. Structural kinds carry no lexeme.
#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub kind: TokenKind,
    pub lexeme: Option<String>,
    pub line: usize,
}

impl Token {
    fn structural(kind: TokenKind, line: usize) -> Token {
        Token {
            kind,
            lexeme: None,
            line,
        }
    }

    fn with_lexeme(kind: TokenKind, lexeme: String, line: usize) -> Token {
        Token {
            kind,
            lexeme: Some(lexeme),
            line,
        }
    }

    pub fn text(&self) -> &str {
        self.lexeme.as_deref().unwrap_or("")
    }
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.kind {
            TokenKind::Assign => write!(f, "="),
            TokenKind::ApplyOpen => write!(f, "("),
            TokenKind::ApplyClose => write!(f, ")"),
            TokenKind::FuncOpen => write!(f, "{{"),
            TokenKind::FuncClose => write!(f, "}}"),
            TokenKind::ListOpen => write!(f, "["),
            TokenKind::ListClose => write!(f, "]"),
            TokenKind::Comma => write!(f, ","),
            TokenKind::Arrow => write!(f, "->"),
            TokenKind::Return => write!(f, "<-"),
            TokenKind::Dot => write!(f, "."),
            TokenKind::Str => write!(f, "\"{}\"", self.text()),
            TokenKind::KwSig => write!(f, "sig"),
            TokenKind::KwAs => write!(f, "as"),
            TokenKind::KwMut => write!(f, "mut"),
            TokenKind::Start => write!(f, "<start>"),
            TokenKind::End => write!(f, "<end>"),
            _ => write!(f, "{}", self.text()),
        }
    }
}

/// Lexing failure: offending line plus a message naming the character.
#[derive(Debug, Clone, PartialEq)]
pub struct LexError {
    pub line: usize,
    pub message: String,
}

impl fmt::Display for LexError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Syntax Error @ Line {}: {}", self.line, self.message)
    }
}

/// Characters that always end an identifier or number.
fn is_structural(c: u8) -> bool {
    matches!(
        c,
        b'(' | b')' | b'{' | b'}' | b'[' | b']' | b',' | b'=' | b'.' | b'"'
    ) || c.is_ascii_whitespace()
}

pub fn tokenize(source: &str) -> Result<Vec<Token>, LexError> {
    let bytes = source.as_bytes();
    let mut tokens = vec![Token::structural(TokenKind::Start, 0)];
    let mut line = 1usize;
    let mut i = 0usize;

    while i < bytes.len() {
        let c = bytes[i];

        if c == b'\n' {
            line += 1;
            i += 1;
            continue;
        }
        if c.is_ascii_whitespace() {
            i += 1;
            continue;
        }

        // Comment: // through end of line (ahead of any use of '/').
        if c == b'/' && bytes.get(i + 1) == Some(&b'/') {
            while i < bytes.len() && bytes[i] != b'\n' {
                i += 1;
            }
            continue;
        }

        // Two-character operators ahead of single characters.
        if c == b'-' && bytes.get(i + 1) == Some(&b'>') {
            tokens.push(Token::structural(TokenKind::Arrow, line));
            i += 2;
            continue;
        }
        if c == b'<' && bytes.get(i + 1) == Some(&b'-') {
            tokens.push(Token::structural(TokenKind::Return, line));
            i += 2;
            continue;
        }

        match c {
            b'=' => {
                tokens.push(Token::structural(TokenKind::Assign, line));
                i += 1;
            }
            b'(' => {
                tokens.push(Token::structural(TokenKind::ApplyOpen, line));
                i += 1;
            }
            b')' => {
                tokens.push(Token::structural(TokenKind::ApplyClose, line));
                i += 1;
            }
            b'{' => {
                tokens.push(Token::structural(TokenKind::FuncOpen, line));
                i += 1;
            }
            b'}' => {
                tokens.push(Token::structural(TokenKind::FuncClose, line));
                i += 1;
            }
            b'[' => {
                tokens.push(Token::structural(TokenKind::ListOpen, line));
                i += 1;
            }
            b']' => {
                tokens.push(Token::structural(TokenKind::ListClose, line));
                i += 1;
            }
            b',' => {
                tokens.push(Token::structural(TokenKind::Comma, line));
                i += 1;
            }
            b'"' => {
                let (token, next) = lex_string(bytes, i, line)?;
                tokens.push(token);
                i = next;
            }
            b'.' => {
                // Dot is only a decimal point when a digit follows inside a
                // number; a bare dot is member access.
                tokens.push(Token::structural(TokenKind::Dot, line));
                i += 1;
            }
            _ if c.is_ascii_digit()
                || (c == b'-' && bytes.get(i + 1).is_some_and(|d| d.is_ascii_digit())) =>
            {
                let (token, next) = lex_number(bytes, i, line)?;
                tokens.push(token);
                i = next;
            }
            _ if !is_structural(c) => {
                let start = i;
                while i < bytes.len() && !is_structural(bytes[i]) {
                    // `->` and `<-` end an identifier run.
                    if bytes[i] == b'-' && bytes.get(i + 1) == Some(&b'>') {
                        break;
                    }
                    if bytes[i] == b'<' && bytes.get(i + 1) == Some(&b'-') {
                        break;
                    }
                    if bytes[i] == b'/' && bytes.get(i + 1) == Some(&b'/') {
                        break;
                    }
                    i += 1;
                }
                let text = std::str::from_utf8(&bytes[start..i])
                    .map_err(|_| LexError {
                        line,
                        message: "invalid UTF-8 in identifier".to_string(),
                    })?
                    .to_string();
                let kind = match text.as_str() {
                    "sig" => TokenKind::KwSig,
                    "as" => TokenKind::KwAs,
                    "mut" => TokenKind::KwMut,
                    _ => TokenKind::Identifier,
                };
                tokens.push(Token::with_lexeme(kind, text, line));
            }
            _ => {
                return Err(LexError {
                    line,
                    message: format!("unexpected character {:?}", c as char),
                });
            }
        }
    }

    tokens.push(Token::structural(TokenKind::End, line));
    Ok(tokens)
}

/// String literal: `"` ... `"`. A backslash escapes the next byte, which
/// is kept verbatim (no escape decoding beyond skipping). Newline or EOF
/// before the closing quote fails.
fn lex_string(bytes: &[u8], start: usize, line: usize) -> Result<(Token, usize), LexError> {
    let mut i = start + 1;
    let mut text = String::new();
    while i < bytes.len() {
        match bytes[i] {
            b'"' => return Ok((Token::with_lexeme(TokenKind::Str, text, line), i + 1)),
            b'\n' => {
                return Err(LexError {
                    line,
                    message: "newline inside string literal".to_string(),
                });
            }
            b'\\' => {
                if i + 1 >= bytes.len() {
                    break;
                }
                // The backslash escapes the next byte, which is kept
                // verbatim; no further decoding.
                text.push(bytes[i + 1] as char);
                i += 2;
            }
            other => {
                text.push(other as char);
                i += 1;
            }
        }
    }
    Err(LexError {
        line,
        message: "unterminated string literal".to_string(),
    })
}

/// Numbers: decimal, 0x/0b/0o integers, decimal floats with one optional
/// dot (only when a digit follows) and optional e-exponent, hex floats of
/// the form 0x…p±…
fn lex_number(bytes: &[u8], start: usize, line: usize) -> Result<(Token, usize), LexError> {
    let mut i = start;
    let mut text = String::new();
    let mut is_float = false;

    if bytes[i] == b'-' {
        text.push('-');
        i += 1;
    }

    // Radix prefixes
    if bytes[i] == b'0' && i + 1 < bytes.len() {
        let radix = match bytes[i + 1] {
            b'x' | b'X' => Some(16),
            b'b' | b'B' => Some(2),
            b'o' | b'O' => Some(8),
            _ => None,
        };
        if let Some(radix) = radix {
            text.push('0');
            text.push(bytes[i + 1] as char);
            i += 2;
            let digits_start = i;
            while i < bytes.len() && (bytes[i] as char).is_digit(radix) {
                text.push(bytes[i] as char);
                i += 1;
            }
            if i == digits_start {
                return Err(LexError {
                    line,
                    message: format!("missing digits after {:?} prefix", &text),
                });
            }
            // Hex float: 0x1.8p+1 style
            if radix == 16 && i < bytes.len() && (bytes[i] == b'.' || bytes[i] == b'p' || bytes[i] == b'P')
            {
                if bytes[i] == b'.' {
                    text.push('.');
                    i += 1;
                    while i < bytes.len() && (bytes[i] as char).is_ascii_hexdigit() {
                        text.push(bytes[i] as char);
                        i += 1;
                    }
                }
                if i < bytes.len() && (bytes[i] == b'p' || bytes[i] == b'P') {
                    text.push('p');
                    i += 1;
                    if i < bytes.len() && (bytes[i] == b'+' || bytes[i] == b'-') {
                        text.push(bytes[i] as char);
                        i += 1;
                    }
                    let exp_start = i;
                    while i < bytes.len() && bytes[i].is_ascii_digit() {
                        text.push(bytes[i] as char);
                        i += 1;
                    }
                    if i == exp_start {
                        return Err(LexError {
                            line,
                            message: "missing exponent digits in hex float".to_string(),
                        });
                    }
                    return Ok((Token::with_lexeme(TokenKind::Float, text, line), i));
                }
            }
            return Ok((Token::with_lexeme(TokenKind::Int, text, line), i));
        }
    }

    // Decimal digits
    while i < bytes.len() && bytes[i].is_ascii_digit() {
        text.push(bytes[i] as char);
        i += 1;
    }

    // One decimal point, only when followed by a digit (otherwise the dot
    // is the member-access operator).
    if i + 1 < bytes.len() && bytes[i] == b'.' && bytes[i + 1].is_ascii_digit() {
        is_float = true;
        text.push('.');
        i += 1;
        while i < bytes.len() && bytes[i].is_ascii_digit() {
            text.push(bytes[i] as char);
            i += 1;
        }
    }

    // Exponent
    if i < bytes.len() && (bytes[i] == b'e' || bytes[i] == b'E') {
        let mut j = i + 1;
        if j < bytes.len() && (bytes[j] == b'+' || bytes[j] == b'-') {
            j += 1;
        }
        if j < bytes.len() && bytes[j].is_ascii_digit() {
            is_float = true;
            text.push('e');
            if bytes[i + 1] == b'+' || bytes[i + 1] == b'-' {
                text.push(bytes[i + 1] as char);
            }
            i = j;
            while i < bytes.len() && bytes[i].is_ascii_digit() {
                text.push(bytes[i] as char);
                i += 1;
            }
        }
    }

    let kind = if is_float {
        TokenKind::Float
    } else {
        TokenKind::Int
    };
    Ok((Token::with_lexeme(kind, text, line), i))
}

/// Render a token stream back to text, one token per space-separated form.
/// Re-lexing the output reproduces the stream modulo Start/End sentinels.
pub fn print_tokens(tokens: &[Token]) -> String {
    let mut out = String::new();
    for t in tokens {
        if matches!(t.kind, TokenKind::Start | TokenKind::End) {
            continue;
        }
        if !out.is_empty() {
            out.push(' ');
        }
        out.push_str(&t.to_string());
    }
    out
}
