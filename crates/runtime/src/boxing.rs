//! Boxing and unboxing
//!
//! Compiled code works on raw i64/double wherever types are statically
//! known and crosses to universal value pointers at every polymorphic
//! boundary. The functions here are that crossing.
//!
//! # Ownership contract (shared by the whole `franz_rt_*` surface)
//!
//! Value arguments are **borrowed**: a runtime function retains whatever it
//! keeps. Returned `ValueRef`s are **owned** by the caller. A `(bits, tag)`
//! pair carries a raw primitive for tags Int/Float/Void and a borrowed
//! `ValueRef` otherwise.

use crate::error::{ErrorKind, raise};
use franz_core::{
    RET_CLOSURE, RET_FLOAT, RET_INT, RET_POINTER, RET_VOID, Tag, Value, ValueData, ValueRef,
    format_value, release, retain,
};

/// Numeric view of a value pair, after unboxing.
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) enum Num {
    Int(i64),
    Float(f64),
}

/// Decode a pair into a numeric view.
///
/// Pairs are honest: tags Int/Float always carry the raw payload (boxed
/// numerics are unboxed before crossing the boundary), so pointer tags are
/// never numeric. Returns None for non-numeric values.
pub(crate) fn pair_num(bits: i64, tag: i32) -> Option<Num> {
    match Tag::from_i64(tag as i64)? {
        Tag::Int => Some(Num::Int(bits)),
        Tag::Float => Some(Num::Float(f64::from_bits(bits as u64))),
        _ => None,
    }
}

/// Honest (bits, tag) pair for a boxed value: numerics unbox to raw bits,
/// everything else passes the pointer with its runtime tag. The pair
/// borrows `v`.
///
/// # Safety
/// `v` must be live.
pub(crate) unsafe fn value_to_pair(v: ValueRef) -> (i64, i64) {
    match unsafe { &(*v).data } {
        ValueData::Int(n) => (*n, Tag::Int as i64),
        ValueData::Float(f) => (f.to_bits() as i64, Tag::Float as i64),
        ValueData::Void => (0, Tag::Void as i64),
        _ => (v as i64, unsafe { (*v).tag() } as i64),
    }
}

/// Box a pair into an owned value (retains pointer payloads).
///
/// # Safety
/// Pointer-tagged pairs must carry a live `ValueRef`.
pub(crate) unsafe fn pair_to_owned(bits: i64, tag: i32) -> ValueRef {
    match Tag::from_i64(tag as i64) {
        Some(Tag::Int) => Value::new_int(bits),
        Some(Tag::Float) => Value::new_float(f64::from_bits(bits as u64)),
        Some(Tag::Void) | None => Value::new_void(),
        Some(_) => unsafe { retain(bits as ValueRef) },
    }
}

/// Render a pair for printing or message formatting.
///
/// # Safety
/// Pointer-tagged pairs must carry a live `ValueRef`.
pub(crate) unsafe fn pair_to_string(bits: i64, tag: i32) -> String {
    match Tag::from_i64(tag as i64) {
        Some(Tag::Int) => bits.to_string(),
        Some(Tag::Float) => {
            let v = Value::new_float(f64::from_bits(bits as u64));
            let s = unsafe { format_value(v) };
            unsafe { release(v) };
            s
        }
        Some(Tag::Void) | None => "void".to_string(),
        Some(_) => unsafe { format_value(bits as ValueRef) },
    }
}

/// Box a raw integer.
#[unsafe(no_mangle)]
pub extern "C" fn franz_rt_box_int(value: i64) -> ValueRef {
    Value::new_int(value)
}

/// Box a raw float.
#[unsafe(no_mangle)]
pub extern "C" fn franz_rt_box_float(value: f64) -> ValueRef {
    Value::new_float(value)
}

/// Interpret a returned 64-bit payload according to a closure record's
/// return tag, producing an owned value. Pointer results pass through
/// (the callee already returned an owned reference); primitives are boxed.
///
/// # Safety
/// Pointer-tagged results must carry a live owned `ValueRef`.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn franz_rt_box_result(bits: i64, return_tag: i64) -> ValueRef {
    match return_tag {
        RET_INT => Value::new_int(bits),
        RET_FLOAT => Value::new_float(f64::from_bits(bits as u64)),
        RET_POINTER | RET_CLOSURE => bits as ValueRef,
        RET_VOID => Value::new_void(),
        other => {
            raise(ErrorKind::Type, format!("bad return tag {}", other));
            Value::new_void()
        }
    }
}

/// Normalize a pair into an owned value pointer.
///
/// # Safety
/// Pointer-tagged pairs must carry a live `ValueRef`.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn franz_rt_to_value(bits: i64, tag: i32) -> ValueRef {
    unsafe { pair_to_owned(bits, tag) }
}

/// Honest-pair bits of a boxed value: raw payload for numerics, the
/// pointer itself otherwise. Paired with `franz_rt_tag` this turns an
/// arbitrary boxed value into an honest `(bits, tag)` pair at a call site.
///
/// # Safety
/// `v` must be live.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn franz_rt_pair_bits(v: ValueRef) -> i64 {
    unsafe { value_to_pair(v) }.0
}

/// Retain a value (compiled code passing a borrowed ref into an owning
/// position).
///
/// # Safety
/// `v` must be live.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn franz_rt_retain(v: ValueRef) -> ValueRef {
    unsafe { retain(v) }
}

/// Release an owned value (compiled code dropping a temporary).
///
/// # Safety
/// `v` must be a live owned reference.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn franz_rt_release(v: ValueRef) {
    unsafe { release(v) }
}

/// Release the payload of a pair if it is a pointer. Compiled code uses
/// this when overwriting a (bits, tag) slot that owned its previous value.
///
/// # Safety
/// Pointer-tagged pairs must carry a live owned `ValueRef`.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn franz_rt_slot_release(bits: i64, tag: i32) {
    if let Some(t) = Tag::from_i64(tag as i64)
        && t.is_pointer()
    {
        unsafe { release(bits as ValueRef) };
    }
}

/// Retain the payload of a pair if it is a pointer; hands back the bits.
/// Used when compiled code returns a borrowed parameter as its result.
///
/// # Safety
/// Pointer-tagged pairs must carry a live `ValueRef`.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn franz_rt_own(bits: i64, tag: i32) -> i64 {
    if let Some(t) = Tag::from_i64(tag as i64)
        && t.is_pointer()
    {
        unsafe { retain(bits as ValueRef) };
    }
    bits
}

/// Runtime tag of a boxed value.
///
/// # Safety
/// `v` must be live.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn franz_rt_tag(v: ValueRef) -> i32 {
    unsafe { (*v).tag() as i32 }
}

/// Unbox an integer; TYPE error (and 0) on any other tag.
///
/// # Safety
/// `v` must be live.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn franz_rt_unbox_int(v: ValueRef) -> i64 {
    match unsafe { &(*v).data } {
        ValueData::Int(n) => *n,
        other => {
            raise(
                ErrorKind::Type,
                format!("expected an integer, got {:?}", tag_name(other)),
            );
            0
        }
    }
}

/// Unbox a float; integers promote, anything else is a TYPE error.
///
/// # Safety
/// `v` must be live.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn franz_rt_unbox_float(v: ValueRef) -> f64 {
    match unsafe { &(*v).data } {
        ValueData::Float(f) => *f,
        ValueData::Int(n) => *n as f64,
        other => {
            raise(
                ErrorKind::Type,
                format!("expected a number, got {:?}", tag_name(other)),
            );
            0.0
        }
    }
}

/// Truthiness of a condition pair: nonzero numbers are true, void is false,
/// anything else is a TYPE error.
///
/// # Safety
/// Pointer-tagged pairs must carry a live `ValueRef`.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn franz_rt_cond(bits: i64, tag: i32) -> i64 {
    if Tag::from_i64(tag as i64) == Some(Tag::Void) {
        return 0;
    }
    match pair_num(bits, tag) {
        Some(Num::Int(n)) => (n != 0) as i64,
        Some(Num::Float(f)) => (f != 0.0) as i64,
        None => {
            raise(ErrorKind::Type, "condition must be numeric");
            0
        }
    }
}

pub(crate) fn tag_name(data: &ValueData) -> &'static str {
    match data {
        ValueData::Int(_) => "Int",
        ValueData::Float(_) => "Float",
        ValueData::Str(_) => "String",
        ValueData::Void => "Void",
        ValueData::Native(_) => "NativeFunction",
        ValueData::List(_) => "List",
        ValueData::Dict(_) => "Dict",
        ValueData::Namespace(_) => "Namespace",
        ValueData::Closure(_) => "Closure",
        ValueData::Ref(_) => "Ref",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use franz_core::values_live;

    #[test]
    fn test_box_and_unbox_preserve_value() {
        unsafe {
            let v = franz_rt_box_int(42);
            assert_eq!(franz_rt_unbox_int(v), 42);
            assert_eq!(franz_rt_tag(v), Tag::Int as i32);
            release(v);

            let f = franz_rt_box_float(2.5);
            assert_eq!(franz_rt_unbox_float(f), 2.5);
            release(f);
        }
    }

    #[test]
    fn test_unbox_float_promotes_int() {
        unsafe {
            let v = franz_rt_box_int(3);
            assert_eq!(franz_rt_unbox_float(v), 3.0);
            release(v);
        }
    }

    #[test]
    fn test_box_result_roundtrip() {
        unsafe {
            let i = franz_rt_box_result(7, RET_INT);
            assert_eq!(franz_rt_unbox_int(i), 7);
            release(i);

            let bits = 1.5f64.to_bits() as i64;
            let f = franz_rt_box_result(bits, RET_FLOAT);
            assert_eq!(franz_rt_unbox_float(f), 1.5);
            release(f);

            let inner = Value::new_str("s".to_string());
            let p = franz_rt_box_result(inner as i64, RET_POINTER);
            assert_eq!(p, inner);
            release(p);
        }
    }

    #[test]
    fn test_cond_truthiness() {
        unsafe {
            assert_eq!(franz_rt_cond(0, Tag::Int as i32), 0);
            assert_eq!(franz_rt_cond(5, Tag::Int as i32), 1);
            assert_eq!(franz_rt_cond(0.0f64.to_bits() as i64, Tag::Float as i32), 0);
            assert_eq!(franz_rt_cond(1.5f64.to_bits() as i64, Tag::Float as i32), 1);
            assert_eq!(franz_rt_cond(0, Tag::Void as i32), 0);
        }
    }

    #[test]
    fn test_value_to_pair_unboxes_numerics() {
        unsafe {
            let i = Value::new_int(5);
            assert_eq!(value_to_pair(i), (5, Tag::Int as i64));
            let s = Value::new_str("x".to_string());
            assert_eq!(value_to_pair(s), (s as i64, Tag::Str as i64));
            release(i);
            release(s);
        }
    }

    #[test]
    fn test_own_retains_pointers_only() {
        let before = values_live();
        unsafe {
            let v = Value::new_str("x".to_string());
            let bits = franz_rt_own(v as i64, Tag::Str as i32);
            assert_eq!(bits, v as i64);
            release(bits as ValueRef);
            release(v);
            assert_eq!(franz_rt_own(9, Tag::Int as i32), 9);
        }
        assert_eq!(values_live(), before);
    }
}
