//! Runtime error state
//!
//! One process-wide error cell: `{kind, line, message, try_depth}`. Raising
//! with `try_depth == 0` prints a line-tagged diagnostic and exits with
//! status 1. With a `try` scope active, raising records the error instead;
//! the `try`/`catch` drivers detect it, clear it, and route control to the
//! handler or fallback.
//!
//! The current source line is maintained by compiled code, which calls
//! `franz_rt_set_line` at statement boundaries.

use crate::closure::apply_value;
use franz_core::{Tag, Value, ValueRef, release};
use std::cell::RefCell;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Syntax,
    Type,
    Arity,
    Range,
    DivisionByZero,
    Io,
    Import,
    CircularImport,
    Custom,
}

impl ErrorKind {
    fn prefix(self) -> &'static str {
        match self {
            ErrorKind::Syntax => "Syntax Error",
            ErrorKind::Type => "Type Error",
            _ => "Runtime Error",
        }
    }
}

#[derive(Debug)]
struct ErrorState {
    pending: Option<(ErrorKind, String)>,
    line: i64,
    try_depth: u32,
}

thread_local! {
    static STATE: RefCell<ErrorState> = const {
        RefCell::new(ErrorState {
            pending: None,
            line: 0,
            try_depth: 0,
        })
    };
}

/// Raise an error. Outside any `try` this prints the diagnostic and exits
/// the process; inside, it records the error and returns so the caller can
/// unwind to the nearest `try` driver.
pub fn raise(kind: ErrorKind, msg: impl Into<String>) {
    let msg = msg.into();
    STATE.with(|s| {
        let mut state = s.borrow_mut();
        if state.try_depth == 0 {
            eprintln!("{} @ Line {}: {}", kind.prefix(), state.line, msg);
            std::process::exit(1);
        }
        // First error wins inside a try scope.
        if state.pending.is_none() {
            state.pending = Some((kind, msg));
        }
    });
}

pub fn has_pending() -> bool {
    STATE.with(|s| s.borrow().pending.is_some())
}

pub fn take_pending() -> Option<(ErrorKind, String)> {
    STATE.with(|s| s.borrow_mut().pending.take())
}

pub fn clear_pending() {
    STATE.with(|s| s.borrow_mut().pending = None);
}

pub fn current_line() -> i64 {
    STATE.with(|s| s.borrow().line)
}

fn enter_try() {
    STATE.with(|s| s.borrow_mut().try_depth += 1);
}

fn leave_try() {
    STATE.with(|s| {
        let mut state = s.borrow_mut();
        debug_assert!(state.try_depth > 0, "unbalanced try scope");
        state.try_depth -= 1;
    });
}

/// Record the current source line for diagnostics.
#[unsafe(no_mangle)]
pub extern "C" fn franz_rt_set_line(line: i64) {
    STATE.with(|s| s.borrow_mut().line = line);
}

/// Raise DIVISION_BY_ZERO (emitted by the inline arithmetic fast path).
#[unsafe(no_mangle)]
pub extern "C" fn franz_rt_raise_div_zero() {
    raise(ErrorKind::DivisionByZero, "division by zero");
}

/// The `error` builtin: raise a CUSTOM error with the given message value.
///
/// # Safety
/// `(bits, tag)` must be a valid value pair.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn franz_rt_error(bits: i64, tag: i32) {
    let msg = unsafe { crate::boxing::pair_to_string(bits, tag) };
    raise(ErrorKind::Custom, msg);
}

/// The `try` driver: invoke `body` (a nullary callable); on a recorded
/// error, clear it and invoke `handler` with the message as its argument.
/// Returns the surviving branch's result as an owned value.
///
/// # Safety
/// Both pairs must be valid value pairs; the callables must follow the
/// closure ABI.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn franz_rt_try(
    body_bits: i64,
    body_tag: i32,
    handler_bits: i64,
    handler_tag: i32,
) -> ValueRef {
    let body = unsafe { require_callable(body_bits, body_tag, "try") };
    let handler = unsafe { require_callable(handler_bits, handler_tag, "try") };
    if body.is_null() || handler.is_null() {
        return Value::new_void();
    }

    enter_try();
    let result = unsafe { apply_value(body, &[]) };
    leave_try();

    match take_pending() {
        None => result,
        Some((_kind, msg)) => {
            unsafe { release(result) };
            let msg_val = Value::new_str(msg);
            let out = unsafe { apply_value(handler, &[(msg_val as i64, Tag::Str as i64)]) };
            unsafe { release(msg_val) };
            out
        }
    }
}

/// The `catch` driver: like `try` but with a value-valued fallback instead
/// of a handler.
///
/// # Safety
/// Both pairs must be valid value pairs.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn franz_rt_catch(
    body_bits: i64,
    body_tag: i32,
    fallback_bits: i64,
    fallback_tag: i32,
) -> ValueRef {
    let body = unsafe { require_callable(body_bits, body_tag, "catch") };
    if body.is_null() {
        return Value::new_void();
    }

    enter_try();
    let result = unsafe { apply_value(body, &[]) };
    leave_try();

    match take_pending() {
        None => result,
        Some(_) => {
            unsafe { release(result) };
            unsafe { crate::boxing::pair_to_owned(fallback_bits, fallback_tag) }
        }
    }
}

/// Decode a callable value pair; raises TYPE and returns null on mismatch.
pub(crate) unsafe fn require_callable(bits: i64, tag: i32, who: &str) -> ValueRef {
    let Some(t) = Tag::from_i64(tag as i64) else {
        raise(ErrorKind::Type, format!("{}: bad value tag {}", who, tag));
        return std::ptr::null_mut();
    };
    if !matches!(t, Tag::Closure | Tag::Native) {
        raise(
            ErrorKind::Type,
            format!("{}: expected a function, got {:?}", who, t),
        );
        return std::ptr::null_mut();
    }
    bits as ValueRef
}

#[cfg(test)]
mod tests {
    use super::*;
    use franz_core::{retain, values_live};

    #[test]
    fn test_pending_error_inside_try_scope() {
        clear_pending();
        enter_try();
        raise(ErrorKind::Range, "index 5 out of range");
        assert!(has_pending());
        let (kind, msg) = take_pending().unwrap();
        assert_eq!(kind, ErrorKind::Range);
        assert!(msg.contains("index 5"));
        assert!(!has_pending());
        leave_try();
    }

    #[test]
    fn test_first_error_wins() {
        clear_pending();
        enter_try();
        raise(ErrorKind::Type, "first");
        raise(ErrorKind::Range, "second");
        let (kind, msg) = take_pending().unwrap();
        assert_eq!(kind, ErrorKind::Type);
        assert_eq!(msg, "first");
        leave_try();
    }

    #[test]
    fn test_catch_returns_fallback_and_clears() {
        // Body is a native function that raises CUSTOM.
        unsafe extern "C" fn boom(_args: *const ValueRef, _argc: i64) -> ValueRef {
            raise(ErrorKind::Custom, "boom");
            Value::new_void()
        }
        let before = values_live();
        unsafe {
            let body = Value::new_native(boom);
            let fallback = Value::new_str("fallback".to_string());
            let out = franz_rt_catch(
                body as i64,
                Tag::Native as i32,
                fallback as i64,
                Tag::Str as i32,
            );
            assert!(franz_core::value_eq(out, fallback));
            assert!(!has_pending());
            release(out);
            release(fallback);
            release(body);
        }
        assert_eq!(values_live(), before);
    }

    #[test]
    fn test_try_invokes_handler_with_message() {
        unsafe extern "C" fn boom(_args: *const ValueRef, _argc: i64) -> ValueRef {
            raise(ErrorKind::Custom, "kaput");
            Value::new_void()
        }
        // Handler returns its argument (the message).
        unsafe extern "C" fn ident(args: *const ValueRef, argc: i64) -> ValueRef {
            assert_eq!(argc, 1);
            unsafe { retain(*args) }
        }
        unsafe {
            let body = Value::new_native(boom);
            let handler = Value::new_native(ident);
            let out = franz_rt_try(
                body as i64,
                Tag::Native as i32,
                handler as i64,
                Tag::Native as i32,
            );
            let expected = Value::new_str("kaput".to_string());
            assert!(franz_core::value_eq(out, expected));
            release(expected);
            release(out);
            release(handler);
            release(body);
        }
    }
}
