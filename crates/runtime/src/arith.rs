//! Arithmetic and comparison on dynamic operands
//!
//! The compiler inlines arithmetic when both operands are statically raw
//! i64/double; these functions are the dynamic path, taking honest
//! `(bits, tag)` pairs and applying Int→Float promotion. Integer arithmetic
//! uses wrapping semantics for defined overflow behavior.
//!
//! Comparisons return raw i64 flags (0/1) so conditions stay unboxed.

use crate::boxing::{Num, pair_num};
use crate::error::{ErrorKind, raise};
use franz_core::{Tag, Value, ValueRef, value_eq};

fn numeric_operands(op: &str, a_bits: i64, a_tag: i32, b_bits: i64, b_tag: i32) -> Option<(Num, Num)> {
    match (pair_num(a_bits, a_tag), pair_num(b_bits, b_tag)) {
        (Some(a), Some(b)) => Some((a, b)),
        _ => {
            raise(ErrorKind::Type, format!("{}: operands must be numeric", op));
            None
        }
    }
}

/// # Safety
/// Pairs must be honest.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn franz_rt_add(a_bits: i64, a_tag: i32, b_bits: i64, b_tag: i32) -> ValueRef {
    // String + string concatenates; everything else is numeric.
    if a_tag == Tag::Str as i32 && b_tag == Tag::Str as i32 {
        return unsafe { crate::strings::franz_rt_concat(a_bits, a_tag, b_bits, b_tag) };
    }
    match numeric_operands("add", a_bits, a_tag, b_bits, b_tag) {
        Some((Num::Int(a), Num::Int(b))) => Value::new_int(a.wrapping_add(b)),
        Some((a, b)) => Value::new_float(as_f64(a) + as_f64(b)),
        None => Value::new_void(),
    }
}

/// # Safety
/// Pairs must be honest.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn franz_rt_sub(a_bits: i64, a_tag: i32, b_bits: i64, b_tag: i32) -> ValueRef {
    match numeric_operands("sub", a_bits, a_tag, b_bits, b_tag) {
        Some((Num::Int(a), Num::Int(b))) => Value::new_int(a.wrapping_sub(b)),
        Some((a, b)) => Value::new_float(as_f64(a) - as_f64(b)),
        None => Value::new_void(),
    }
}

/// # Safety
/// Pairs must be honest.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn franz_rt_mul(a_bits: i64, a_tag: i32, b_bits: i64, b_tag: i32) -> ValueRef {
    match numeric_operands("mul", a_bits, a_tag, b_bits, b_tag) {
        Some((Num::Int(a), Num::Int(b))) => Value::new_int(a.wrapping_mul(b)),
        Some((a, b)) => Value::new_float(as_f64(a) * as_f64(b)),
        None => Value::new_void(),
    }
}

/// # Safety
/// Pairs must be honest.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn franz_rt_div(a_bits: i64, a_tag: i32, b_bits: i64, b_tag: i32) -> ValueRef {
    match numeric_operands("div", a_bits, a_tag, b_bits, b_tag) {
        Some((Num::Int(a), Num::Int(b))) => {
            if b == 0 {
                raise(
                    ErrorKind::DivisionByZero,
                    format!("division by zero (attempted {} / 0)", a),
                );
                return Value::new_void();
            }
            Value::new_int(a.wrapping_div(b))
        }
        Some((a, b)) => {
            let divisor = as_f64(b);
            if divisor == 0.0 {
                raise(
                    ErrorKind::DivisionByZero,
                    format!("division by zero (attempted {} / 0)", as_f64(a)),
                );
                return Value::new_void();
            }
            Value::new_float(as_f64(a) / divisor)
        }
        None => Value::new_void(),
    }
}

/// # Safety
/// Pairs must be honest.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn franz_rt_mod(a_bits: i64, a_tag: i32, b_bits: i64, b_tag: i32) -> ValueRef {
    match numeric_operands("mod", a_bits, a_tag, b_bits, b_tag) {
        Some((Num::Int(a), Num::Int(b))) => {
            if b == 0 {
                raise(
                    ErrorKind::DivisionByZero,
                    format!("division by zero (attempted {} % 0)", a),
                );
                return Value::new_void();
            }
            Value::new_int(a.wrapping_rem(b))
        }
        Some((a, b)) => Value::new_float(as_f64(a) % as_f64(b)),
        None => Value::new_void(),
    }
}

/// # Safety
/// The pair must be honest.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn franz_rt_neg(bits: i64, tag: i32) -> ValueRef {
    match pair_num(bits, tag) {
        Some(Num::Int(n)) => Value::new_int(n.wrapping_neg()),
        Some(Num::Float(f)) => Value::new_float(-f),
        None => {
            raise(ErrorKind::Type, "neg: operand must be numeric");
            Value::new_void()
        }
    }
}

/// Structural equality over pairs. Boxes temporaries only for pointer
/// payloads; numeric pairs compare as real numbers.
///
/// # Safety
/// Pairs must be honest.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn franz_rt_eq(a_bits: i64, a_tag: i32, b_bits: i64, b_tag: i32) -> i64 {
    match (pair_num(a_bits, a_tag), pair_num(b_bits, b_tag)) {
        (Some(a), Some(b)) => (as_f64(a) == as_f64(b)) as i64,
        (None, None) => {
            let (ta, tb) = (Tag::from_i64(a_tag as i64), Tag::from_i64(b_tag as i64));
            match (ta, tb) {
                (Some(Tag::Void), Some(Tag::Void)) => 1,
                (Some(Tag::Void), _) | (_, Some(Tag::Void)) => 0,
                (Some(_), Some(_)) => {
                    (unsafe { value_eq(a_bits as ValueRef, b_bits as ValueRef) }) as i64
                }
                _ => 0,
            }
        }
        // Numeric vs non-numeric: unequal by tag.
        _ => 0,
    }
}

/// # Safety
/// Pairs must be honest.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn franz_rt_neq(a_bits: i64, a_tag: i32, b_bits: i64, b_tag: i32) -> i64 {
    1 - unsafe { franz_rt_eq(a_bits, a_tag, b_bits, b_tag) }
}

fn compare(op: &str, a_bits: i64, a_tag: i32, b_bits: i64, b_tag: i32) -> Option<std::cmp::Ordering> {
    match numeric_operands(op, a_bits, a_tag, b_bits, b_tag) {
        Some((a, b)) => as_f64(a).partial_cmp(&as_f64(b)),
        None => None,
    }
}

/// # Safety
/// Pairs must be honest.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn franz_rt_lt(a_bits: i64, a_tag: i32, b_bits: i64, b_tag: i32) -> i64 {
    matches!(compare("lt", a_bits, a_tag, b_bits, b_tag), Some(std::cmp::Ordering::Less)) as i64
}

/// # Safety
/// Pairs must be honest.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn franz_rt_gt(a_bits: i64, a_tag: i32, b_bits: i64, b_tag: i32) -> i64 {
    matches!(compare("gt", a_bits, a_tag, b_bits, b_tag), Some(std::cmp::Ordering::Greater)) as i64
}

/// # Safety
/// Pairs must be honest.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn franz_rt_lte(a_bits: i64, a_tag: i32, b_bits: i64, b_tag: i32) -> i64 {
    use std::cmp::Ordering::{Equal, Less};
    matches!(compare("lte", a_bits, a_tag, b_bits, b_tag), Some(Less | Equal)) as i64
}

/// # Safety
/// Pairs must be honest.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn franz_rt_gte(a_bits: i64, a_tag: i32, b_bits: i64, b_tag: i32) -> i64 {
    use std::cmp::Ordering::{Equal, Greater};
    matches!(compare("gte", a_bits, a_tag, b_bits, b_tag), Some(Greater | Equal)) as i64
}

/// Logical negation of a condition pair.
///
/// # Safety
/// The pair must be honest.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn franz_rt_not(bits: i64, tag: i32) -> i64 {
    1 - unsafe { crate::boxing::franz_rt_cond(bits, tag) }
}

fn as_f64(n: Num) -> f64 {
    match n {
        Num::Int(i) => i as f64,
        Num::Float(f) => f,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::boxing::{franz_rt_unbox_float, franz_rt_unbox_int};
    use franz_core::release;

    const I: i32 = Tag::Int as i32;
    const F: i32 = Tag::Float as i32;

    fn fbits(f: f64) -> i64 {
        f.to_bits() as i64
    }

    #[test]
    fn test_int_add() {
        unsafe {
            let v = franz_rt_add(2, I, 3, I);
            assert_eq!(franz_rt_unbox_int(v), 5);
            release(v);
        }
    }

    #[test]
    fn test_mixed_add_promotes_to_float() {
        unsafe {
            let v = franz_rt_add(2, I, fbits(0.5), F);
            assert_eq!(franz_rt_unbox_float(v), 2.5);
            release(v);
        }
    }

    #[test]
    fn test_string_add_concatenates() {
        unsafe {
            let a = Value::new_str("foo".to_string());
            let b = Value::new_str("bar".to_string());
            let v = franz_rt_add(a as i64, Tag::Str as i32, b as i64, Tag::Str as i32);
            let expected = Value::new_str("foobar".to_string());
            assert!(value_eq(v, expected));
            release(expected);
            release(v);
            release(a);
            release(b);
        }
    }

    #[test]
    fn test_wrapping_semantics() {
        unsafe {
            let v = franz_rt_add(i64::MAX, I, 1, I);
            assert_eq!(franz_rt_unbox_int(v), i64::MIN);
            release(v);
        }
    }

    #[test]
    fn test_comparisons() {
        unsafe {
            assert_eq!(franz_rt_lt(1, I, 2, I), 1);
            assert_eq!(franz_rt_lt(2, I, 1, I), 0);
            assert_eq!(franz_rt_gte(2, I, 2, I), 1);
            assert_eq!(franz_rt_eq(3, I, fbits(3.0), F), 1);
            assert_eq!(franz_rt_neq(3, I, 4, I), 1);
        }
    }

    #[test]
    fn test_eq_across_pointer_values() {
        unsafe {
            let a = Value::new_str("x".to_string());
            let b = Value::new_str("x".to_string());
            assert_eq!(
                franz_rt_eq(a as i64, Tag::Str as i32, b as i64, Tag::Str as i32),
                1
            );
            // numeric vs string: tag inequality
            assert_eq!(franz_rt_eq(3, I, a as i64, Tag::Str as i32), 0);
            release(a);
            release(b);
        }
    }

    #[test]
    fn test_not() {
        unsafe {
            assert_eq!(franz_rt_not(0, I), 1);
            assert_eq!(franz_rt_not(7, I), 0);
        }
    }
}
