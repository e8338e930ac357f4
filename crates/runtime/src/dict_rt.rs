//! Dictionary primitives and drivers
//!
//! Literals build through `dict_from_array` (alternating key/value refs) or
//! the `set_inplace` loop the compiler emits for computed entries. Lookups
//! return retained copies; a missing key yields void. `map`/`filter` invoke
//! the supplied callable with `(key, value)` per entry.

use crate::boxing::{pair_to_owned, value_to_pair};
use crate::closure::apply_value;
use crate::error::{ErrorKind, has_pending, raise, require_callable};
use franz_core::{Dict, List, Tag, Value, ValueData, ValueRef, release, retain};

unsafe fn as_dict<'a>(bits: i64, tag: i32, who: &str) -> Option<&'a Dict> {
    if let Some(t) = Tag::from_i64(tag as i64)
        && t.is_pointer()
        && let ValueData::Dict(dict) = unsafe { &(*(bits as ValueRef)).data }
    {
        return Some(dict);
    }
    raise(ErrorKind::Type, format!("{}: expected a dict", who));
    None
}

/// Build a dict from an array of alternating key/value refs (borrowed).
///
/// # Safety
/// `kvs` must point to `2 * npairs` live `ValueRef`s.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn franz_rt_dict_from_array(kvs: *const ValueRef, npairs: i64) -> ValueRef {
    let mut dict = Dict::new();
    for i in 0..npairs as usize {
        let k = unsafe { *kvs.add(2 * i) };
        let v = unsafe { *kvs.add(2 * i + 1) };
        unsafe { dict.set_inplace(retain(k), retain(v)) };
    }
    Value::new_dict(dict)
}

/// Retained value for a key; void when absent.
///
/// # Safety
/// Pairs must be honest.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn franz_rt_dict_get(
    d_bits: i64,
    d_tag: i32,
    k_bits: i64,
    k_tag: i32,
) -> ValueRef {
    let Some(dict) = (unsafe { as_dict(d_bits, d_tag, "dict_get") }) else {
        return Value::new_void();
    };
    let key = unsafe { pair_to_owned(k_bits, k_tag) };
    let out = match unsafe { dict.get(key) } {
        Some(v) => unsafe { retain(v) },
        None => Value::new_void(),
    };
    unsafe { release(key) };
    out
}

/// Membership test.
///
/// # Safety
/// Pairs must be honest.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn franz_rt_dict_has(
    d_bits: i64,
    d_tag: i32,
    k_bits: i64,
    k_tag: i32,
) -> i64 {
    let Some(dict) = (unsafe { as_dict(d_bits, d_tag, "dict_has") }) else {
        return 0;
    };
    let key = unsafe { pair_to_owned(k_bits, k_tag) };
    let out = unsafe { dict.has(key) } as i64;
    unsafe { release(key) };
    out
}

/// New dict with one binding added or replaced.
///
/// # Safety
/// Pairs must be honest.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn franz_rt_dict_set(
    d_bits: i64,
    d_tag: i32,
    k_bits: i64,
    k_tag: i32,
    v_bits: i64,
    v_tag: i32,
) -> ValueRef {
    let Some(dict) = (unsafe { as_dict(d_bits, d_tag, "dict_set") }) else {
        return Value::new_void();
    };
    let key = unsafe { pair_to_owned(k_bits, k_tag) };
    let value = unsafe { pair_to_owned(v_bits, v_tag) };
    let out = unsafe { dict.set(key, value) };
    unsafe { release(key) };
    unsafe { release(value) };
    Value::new_dict(out)
}

/// In-place insert for dict construction; mutates the dict value directly.
///
/// # Safety
/// Pairs must be honest; `d` must be a dict the compiler is still building
/// (no other owners).
#[unsafe(no_mangle)]
pub unsafe extern "C" fn franz_rt_dict_set_inplace(
    d: ValueRef,
    k_bits: i64,
    k_tag: i32,
    v_bits: i64,
    v_tag: i32,
) {
    match unsafe { &mut (*d).data } {
        ValueData::Dict(dict) => {
            let key = unsafe { pair_to_owned(k_bits, k_tag) };
            let value = unsafe { pair_to_owned(v_bits, v_tag) };
            unsafe { dict.set_inplace(key, value) };
        }
        _ => raise(ErrorKind::Type, "dict_set_inplace: expected a dict"),
    }
}

/// New dict without a key.
///
/// # Safety
/// Pairs must be honest.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn franz_rt_dict_remove(
    d_bits: i64,
    d_tag: i32,
    k_bits: i64,
    k_tag: i32,
) -> ValueRef {
    let Some(dict) = (unsafe { as_dict(d_bits, d_tag, "dict_remove") }) else {
        return Value::new_void();
    };
    let key = unsafe { pair_to_owned(k_bits, k_tag) };
    let out = unsafe { dict.remove(key) };
    unsafe { release(key) };
    Value::new_dict(out)
}

/// New dict where the second dict's entries override the first's.
///
/// # Safety
/// Pairs must be honest.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn franz_rt_dict_merge(
    a_bits: i64,
    a_tag: i32,
    b_bits: i64,
    b_tag: i32,
) -> ValueRef {
    let (Some(a), Some(b)) = (unsafe { as_dict(a_bits, a_tag, "merge") }, unsafe {
        as_dict(b_bits, b_tag, "merge")
    }) else {
        return Value::new_void();
    };
    Value::new_dict(unsafe { a.merge(b) })
}

/// Keys as a fresh list (bucket-major order, not guaranteed stable).
///
/// # Safety
/// The pair must be honest.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn franz_rt_dict_keys(d_bits: i64, d_tag: i32) -> ValueRef {
    let Some(dict) = (unsafe { as_dict(d_bits, d_tag, "keys") }) else {
        return Value::new_void();
    };
    let mut list = List::with_capacity(dict.len());
    for k in dict.keys() {
        unsafe { list.push_owned(retain(k)) };
    }
    Value::new_list(list)
}

/// Values as a fresh list (bucket-major order, not guaranteed stable).
///
/// # Safety
/// The pair must be honest.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn franz_rt_dict_values(d_bits: i64, d_tag: i32) -> ValueRef {
    let Some(dict) = (unsafe { as_dict(d_bits, d_tag, "values") }) else {
        return Value::new_void();
    };
    let mut list = List::with_capacity(dict.len());
    for v in dict.values() {
        unsafe { list.push_owned(retain(v)) };
    }
    Value::new_list(list)
}

/// `dict map` driver: new dict with every value replaced by
/// `f(key, value)`.
///
/// # Safety
/// Pairs must be honest; `f` must follow the closure ABI.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn franz_rt_dict_map(
    d_bits: i64,
    d_tag: i32,
    f_bits: i64,
    f_tag: i32,
) -> ValueRef {
    let Some(dict) = (unsafe { as_dict(d_bits, d_tag, "dict_map") }) else {
        return Value::new_void();
    };
    let f = unsafe { require_callable(f_bits, f_tag, "dict_map") };
    if f.is_null() {
        return Value::new_void();
    }
    let out = unsafe {
        dict.map_values(|k, v| {
            // SAFETY: keys and values are live for the iteration; `f` was
            // validated as a callable above.
            unsafe {
                if has_pending() {
                    return retain(v);
                }
                let k_pair = value_to_pair(k);
                let v_pair = value_to_pair(v);
                apply_value(f, &[k_pair, v_pair])
            }
        })
    };
    if has_pending() {
        return Value::new_void();
    }
    Value::new_dict(out)
}

/// `dict filter` driver: new dict keeping entries where `f(key, value)` is
/// true.
///
/// # Safety
/// Pairs must be honest; `f` must follow the closure ABI.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn franz_rt_dict_filter(
    d_bits: i64,
    d_tag: i32,
    f_bits: i64,
    f_tag: i32,
) -> ValueRef {
    let Some(dict) = (unsafe { as_dict(d_bits, d_tag, "dict_filter") }) else {
        return Value::new_void();
    };
    let f = unsafe { require_callable(f_bits, f_tag, "dict_filter") };
    if f.is_null() {
        return Value::new_void();
    }
    let out = unsafe {
        dict.filter_entries(|k, v| {
            // SAFETY: keys and values are live for the iteration; `f` was
            // validated as a callable above.
            unsafe {
                if has_pending() {
                    return false;
                }
                let k_pair = value_to_pair(k);
                let v_pair = value_to_pair(v);
                let verdict = apply_value(f, &[k_pair, v_pair]);
                let (b, t) = value_to_pair(verdict);
                let keep = crate::boxing::franz_rt_cond(b, t as i32) != 0;
                release(verdict);
                keep
            }
        })
    };
    if has_pending() {
        return Value::new_void();
    }
    Value::new_dict(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use franz_core::{value_eq, values_live};

    unsafe fn sval(s: &str) -> ValueRef {
        Value::new_str(s.to_string())
    }

    #[test]
    fn test_dict_literal_and_get() {
        let before = values_live();
        unsafe {
            let k1 = sval("name");
            let v1 = sval("Ada");
            let k2 = sval("age");
            let v2 = Value::new_int(36);
            let kvs = [k1, v1, k2, v2];
            let d = franz_rt_dict_from_array(kvs.as_ptr(), 2);

            let got = franz_rt_dict_get(d as i64, Tag::Dict as i32, k1 as i64, Tag::Str as i32);
            assert!(value_eq(got, v1));
            release(got);

            assert_eq!(
                franz_rt_dict_has(d as i64, Tag::Dict as i32, k2 as i64, Tag::Str as i32),
                1
            );

            release(d);
            for v in kvs {
                release(v);
            }
        }
        assert_eq!(values_live(), before);
    }

    #[test]
    fn test_missing_key_yields_void() {
        unsafe {
            let d = franz_rt_dict_from_array(std::ptr::null(), 0);
            let k = sval("absent");
            let got = franz_rt_dict_get(d as i64, Tag::Dict as i32, k as i64, Tag::Str as i32);
            assert_eq!((*got).tag(), Tag::Void);
            release(got);
            release(k);
            release(d);
        }
    }

    #[test]
    fn test_set_then_get_law() {
        unsafe {
            let d = franz_rt_dict_from_array(std::ptr::null(), 0);
            let d2 = franz_rt_dict_set(
                d as i64,
                Tag::Dict as i32,
                1,
                Tag::Int as i32,
                99,
                Tag::Int as i32,
            );
            let got = franz_rt_dict_get(d2 as i64, Tag::Dict as i32, 1, Tag::Int as i32);
            assert_eq!(crate::boxing::franz_rt_unbox_int(got), 99);
            release(got);
            release(d2);
            release(d);
        }
    }

    // Doubles each dict value, ignoring the key.
    extern "C" fn double_value(_k: i64, _kt: i32, v: i64, _vt: i32) -> i64 {
        v * 2
    }

    #[test]
    fn test_dict_map_driver() {
        unsafe {
            let k = sval("n");
            let kvs = [k, Value::new_int(21)];
            let d = franz_rt_dict_from_array(kvs.as_ptr(), 1);
            let f = crate::closure::franz_rt_closure_new(
                double_value as usize as *const u8,
                std::ptr::null_mut(),
                franz_core::RET_INT,
            );
            let out = franz_rt_dict_map(d as i64, Tag::Dict as i32, f as i64, Tag::Closure as i32);
            let got = franz_rt_dict_get(out as i64, Tag::Dict as i32, k as i64, Tag::Str as i32);
            assert_eq!(crate::boxing::franz_rt_unbox_int(got), 42);
            release(got);
            release(out);
            release(f);
            release(d);
            for v in kvs {
                release(v);
            }
        }
    }
}
