//! String operations

use crate::boxing::{Num, pair_num, pair_to_string, tag_name};
use crate::error::{ErrorKind, raise};
use franz_core::{Tag, Value, ValueData, ValueRef};
use std::ffi::CStr;

/// Box a NUL-terminated string constant from the compiled image.
///
/// # Safety
/// `ptr` must point to a valid NUL-terminated UTF-8 string.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn franz_rt_string_from_cstr(ptr: *const libc::c_char) -> ValueRef {
    let s = unsafe { CStr::from_ptr(ptr) };
    Value::new_str(s.to_string_lossy().into_owned())
}

unsafe fn as_str<'a>(bits: i64, tag: i32, who: &str) -> Option<&'a str> {
    if tag != Tag::Str as i32 {
        raise(
            ErrorKind::Type,
            format!("{}: expected a string, got tag {}", who, tag),
        );
        return None;
    }
    match unsafe { &(*(bits as ValueRef)).data } {
        ValueData::Str(s) => Some(s.as_str()),
        other => {
            raise(
                ErrorKind::Type,
                format!("{}: expected a string, got {}", who, tag_name(other)),
            );
            None
        }
    }
}

/// Concatenate two strings into a fresh one.
///
/// # Safety
/// Pairs must be honest.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn franz_rt_concat(a_bits: i64, a_tag: i32, b_bits: i64, b_tag: i32) -> ValueRef {
    let (Some(a), Some(b)) = (unsafe { as_str(a_bits, a_tag, "concat") }, unsafe {
        as_str(b_bits, b_tag, "concat")
    }) else {
        return Value::new_void();
    };
    let mut out = String::with_capacity(a.len() + b.len());
    out.push_str(a);
    out.push_str(b);
    Value::new_str(out)
}

/// Byte-wise string equality; TYPE error when either side is not a
/// string (unlike `franz_rt_eq`, which treats tag mismatches as unequal).
///
/// # Safety
/// Pairs must be honest.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn franz_rt_str_eq(a_bits: i64, a_tag: i32, b_bits: i64, b_tag: i32) -> i64 {
    let (Some(a), Some(b)) = (unsafe { as_str(a_bits, a_tag, "str_eq") }, unsafe {
        as_str(b_bits, b_tag, "str_eq")
    }) else {
        return 0;
    };
    (a == b) as i64
}

/// Character count of a string.
///
/// # Safety
/// The pair must be honest.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn franz_rt_str_len(bits: i64, tag: i32) -> i64 {
    match unsafe { as_str(bits, tag, "str_len") } {
        Some(s) => s.chars().count() as i64,
        None => 0,
    }
}

/// Substring over the half-open character range `[start, end)`.
/// RANGE error when the bounds fall outside the string.
///
/// # Safety
/// Pairs must be honest.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn franz_rt_substr(
    bits: i64,
    tag: i32,
    start_bits: i64,
    start_tag: i32,
    end_bits: i64,
    end_tag: i32,
) -> ValueRef {
    let Some(s) = (unsafe { as_str(bits, tag, "substr") }) else {
        return Value::new_void();
    };
    let (Some(Num::Int(start)), Some(Num::Int(end))) = (
        pair_num(start_bits, start_tag),
        pair_num(end_bits, end_tag),
    ) else {
        raise(ErrorKind::Type, "substr: bounds must be integers");
        return Value::new_void();
    };
    let count = s.chars().count() as i64;
    if start < 0 || end < start || end > count {
        raise(
            ErrorKind::Range,
            format!("substr: index {} out of range for length {}", start, count),
        );
        return Value::new_void();
    }
    let out: String = s
        .chars()
        .skip(start as usize)
        .take((end - start) as usize)
        .collect();
    Value::new_str(out)
}

/// Render any value into its printed form as a string.
///
/// # Safety
/// The pair must be honest.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn franz_rt_to_string(bits: i64, tag: i32) -> ValueRef {
    Value::new_str(unsafe { pair_to_string(bits, tag) })
}

/// Parse a decimal integer out of a string; TYPE error on malformed input.
///
/// # Safety
/// The pair must be honest.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn franz_rt_parse_int(bits: i64, tag: i32) -> ValueRef {
    let Some(s) = (unsafe { as_str(bits, tag, "parse_int") }) else {
        return Value::new_void();
    };
    match s.trim().parse::<i64>() {
        Ok(n) => Value::new_int(n),
        Err(_) => {
            raise(ErrorKind::Type, format!("parse_int: not an integer: {:?}", s));
            Value::new_void()
        }
    }
}

/// Parse a float out of a string; TYPE error on malformed input.
///
/// # Safety
/// The pair must be honest.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn franz_rt_parse_float(bits: i64, tag: i32) -> ValueRef {
    let Some(s) = (unsafe { as_str(bits, tag, "parse_float") }) else {
        return Value::new_void();
    };
    match s.trim().parse::<f64>() {
        Ok(f) => Value::new_float(f),
        Err(_) => {
            raise(
                ErrorKind::Type,
                format!("parse_float: not a number: {:?}", s),
            );
            Value::new_void()
        }
    }
}

// Natives for the `str` namespace (seeded at startup; see ns.rs).

pub(crate) unsafe extern "C" fn native_str_upper(args: *const ValueRef, argc: i64) -> ValueRef {
    unsafe { str_transform(args, argc, "str.upper", |s| s.to_uppercase()) }
}

pub(crate) unsafe extern "C" fn native_str_lower(args: *const ValueRef, argc: i64) -> ValueRef {
    unsafe { str_transform(args, argc, "str.lower", |s| s.to_lowercase()) }
}

pub(crate) unsafe extern "C" fn native_str_trim(args: *const ValueRef, argc: i64) -> ValueRef {
    unsafe { str_transform(args, argc, "str.trim", |s| s.trim().to_string()) }
}

unsafe fn str_transform(
    args: *const ValueRef,
    argc: i64,
    who: &str,
    f: impl Fn(&str) -> String,
) -> ValueRef {
    if argc != 1 {
        raise(
            ErrorKind::Arity,
            format!("{}: expected 1 argument, got {}", who, argc),
        );
        return Value::new_void();
    }
    match unsafe { &(**args).data } {
        ValueData::Str(s) => Value::new_str(f(s)),
        other => {
            raise(
                ErrorKind::Type,
                format!("{}: expected a string, got {}", who, tag_name(other)),
            );
            Value::new_void()
        }
    }
}
