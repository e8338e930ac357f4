//! Tagged variants
//!
//! A variant is a two-element list `[tag, values]`: the tag (a string) and a
//! list of field values. `match` lowers into a cascade of tag equality
//! tests; on a hit, the branch's callable is invoked with the variant's
//! fields as its arguments through the standard closure ABI.

use crate::boxing::{pair_to_owned, value_to_pair};
use crate::closure::{ArgPair, MAX_APPLY_ARGS, apply_value};
use crate::error::{ErrorKind, raise, require_callable};
use franz_core::{List, Tag, Value, ValueData, ValueRef, release, retain};
use std::ffi::CStr;

/// Construct a variant from a tag value and an argument block of fields.
///
/// # Safety
/// The tag pair must be honest; `args` must point to `argc` valid pairs.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn franz_rt_variant_new(
    tag_bits: i64,
    tag_tag: i32,
    args: *const ArgPair,
    argc: i64,
) -> ValueRef {
    let tag_val = unsafe { pair_to_owned(tag_bits, tag_tag) };
    if unsafe { (*tag_val).tag() } != Tag::Str {
        raise(ErrorKind::Type, "variant: tag must be a string");
        unsafe { release(tag_val) };
        return Value::new_void();
    }

    let mut values = List::with_capacity(argc as usize);
    for i in 0..argc as usize {
        let p = unsafe { *args.add(i) };
        unsafe { values.push_owned(pair_to_owned(p.bits, p.tag as i32)) };
    }

    let mut outer = List::with_capacity(2);
    unsafe {
        outer.push_owned(tag_val);
        outer.push_owned(Value::new_list(values));
    }
    Value::new_list(outer)
}

/// Decompose a variant value into its tag string and its values list.
unsafe fn variant_parts<'a>(bits: i64, tag: i32, who: &str) -> Option<(&'a str, &'a List)> {
    if let Some(t) = Tag::from_i64(tag as i64)
        && t.is_pointer()
        && let ValueData::List(outer) = unsafe { &(*(bits as ValueRef)).data }
        && outer.len() == 2
        && let Ok(tag_val) = outer.get(0)
        && let ValueData::Str(tag_str) = unsafe { &(*tag_val).data }
        && let Ok(values_val) = outer.get(1)
        && let ValueData::List(values) = unsafe { &(*values_val).data }
    {
        return Some((tag_str.as_str(), values));
    }
    raise(ErrorKind::Type, format!("{}: expected a variant", who));
    None
}

/// Tag equality test against a static string, for `match` cascades.
/// Returns 0 (no error) when the scrutinee is a variant with another tag.
///
/// # Safety
/// The pair must be honest; `expected` must be NUL-terminated.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn franz_rt_variant_is(bits: i64, tag: i32, expected: *const libc::c_char) -> i64 {
    let Some((tag_str, _)) = (unsafe { variant_parts(bits, tag, "match") }) else {
        return 0;
    };
    let expected = unsafe { CStr::from_ptr(expected) };
    (expected.to_bytes() == tag_str.as_bytes()) as i64
}

/// Retained tag string of a variant.
///
/// # Safety
/// The pair must be honest.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn franz_rt_variant_tag(bits: i64, tag: i32) -> ValueRef {
    if let Some(t) = Tag::from_i64(tag as i64)
        && t.is_pointer()
        && let ValueData::List(outer) = unsafe { &(*(bits as ValueRef)).data }
        && outer.len() == 2
        && let Ok(tag_val) = outer.get(0)
    {
        return unsafe { retain(tag_val) };
    }
    raise(ErrorKind::Type, "variant_tag: expected a variant");
    Value::new_void()
}

/// Invoke a match branch with the variant's fields as arguments, returning
/// the branch's owned result.
///
/// # Safety
/// Pairs must be honest; `f` must follow the closure ABI.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn franz_rt_variant_apply(
    v_bits: i64,
    v_tag: i32,
    f_bits: i64,
    f_tag: i32,
) -> ValueRef {
    let Some((_, values)) = (unsafe { variant_parts(v_bits, v_tag, "match") }) else {
        return Value::new_void();
    };
    let f = unsafe { require_callable(f_bits, f_tag, "match") };
    if f.is_null() {
        return Value::new_void();
    }
    if values.len() > MAX_APPLY_ARGS {
        raise(
            ErrorKind::Arity,
            format!("match: variant has too many fields ({})", values.len()),
        );
        return Value::new_void();
    }
    let pairs: Vec<(i64, i64)> = values
        .iter()
        .map(|&v| unsafe { value_to_pair(v) })
        .collect();
    unsafe { apply_value(f, &pairs) }
}

/// Raise a TYPE error for a match with no matching arm.
///
/// # Safety
/// The pair must be honest.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn franz_rt_match_fail(bits: i64, tag: i32) {
    let tag_desc = match unsafe { variant_parts(bits, tag, "match") } {
        Some((tag_str, _)) => tag_str.to_string(),
        None => return,
    };
    raise(
        ErrorKind::Type,
        format!("match: no arm matches variant tag {:?}", tag_desc),
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::boxing::franz_rt_unbox_int;
    use franz_core::{RET_INT, values_live};

    #[test]
    fn test_variant_construction_and_tag_test() {
        let before = values_live();
        unsafe {
            let tag = Value::new_str("Some".to_string());
            let fields = [ArgPair {
                bits: 42,
                tag: Tag::Int as i64,
            }];
            let v = franz_rt_variant_new(tag as i64, Tag::Str as i32, fields.as_ptr(), 1);

            let some = std::ffi::CString::new("Some").unwrap();
            let none = std::ffi::CString::new("None").unwrap();
            assert_eq!(
                franz_rt_variant_is(v as i64, Tag::List as i32, some.as_ptr()),
                1
            );
            assert_eq!(
                franz_rt_variant_is(v as i64, Tag::List as i32, none.as_ptr()),
                0
            );

            release(v);
            release(tag);
        }
        assert_eq!(values_live(), before);
    }

    // Branch callee returning its first field.
    extern "C" fn first_field(a0: i64, _t0: i32) -> i64 {
        a0
    }

    #[test]
    fn test_variant_apply_binds_fields() {
        unsafe {
            let tag = Value::new_str("Some".to_string());
            let fields = [ArgPair {
                bits: 42,
                tag: Tag::Int as i64,
            }];
            let v = franz_rt_variant_new(tag as i64, Tag::Str as i32, fields.as_ptr(), 1);
            let f = crate::closure::franz_rt_closure_new(
                first_field as usize as *const u8,
                std::ptr::null_mut(),
                RET_INT,
            );
            let out =
                franz_rt_variant_apply(v as i64, Tag::List as i32, f as i64, Tag::Closure as i32);
            assert_eq!(franz_rt_unbox_int(out), 42);
            release(out);
            release(f);
            release(v);
            release(tag);
        }
    }
}
