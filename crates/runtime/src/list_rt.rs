//! List primitives and higher-order drivers
//!
//! Construction goes element-array → list in one call: the compiler boxes
//! each element into a stack array of value pointers and hands it over. The
//! drivers (`map`, `filter`, `reduce`) iterate the list and invoke the
//! supplied callable through the closure ABI for every element.
//!
//! Driver conventions: map/filter callables receive `(element, index)`,
//! reduce receives `(accumulator, element, index)`. Callables with fewer
//! parameters ignore the extras.

use crate::boxing::{Num, pair_num, pair_to_owned, value_to_pair};
use crate::closure::apply_value;
use crate::error::{ErrorKind, has_pending, raise, require_callable};
use franz_core::{List, Tag, Value, ValueData, ValueRef, release, retain};

unsafe fn as_list<'a>(bits: i64, tag: i32, who: &str) -> Option<&'a List> {
    if let Some(t) = Tag::from_i64(tag as i64)
        && t.is_pointer()
        && let ValueData::List(list) = unsafe { &(*(bits as ValueRef)).data }
    {
        return Some(list);
    }
    raise(ErrorKind::Type, format!("{}: expected a list", who));
    None
}

unsafe fn as_index(bits: i64, tag: i32, who: &str) -> Option<i64> {
    match pair_num(bits, tag) {
        Some(Num::Int(n)) => Some(n),
        _ => {
            raise(ErrorKind::Type, format!("{}: index must be an integer", who));
            None
        }
    }
}

fn range_error(who: &str, index: i64, len: usize) -> ValueRef {
    raise(
        ErrorKind::Range,
        format!("{}: index {} out of range for length {}", who, index, len),
    );
    Value::new_void()
}

/// Build a list from a caller-filled array of borrowed refs; every element
/// is retained.
///
/// # Safety
/// `elems` must point to `len` live `ValueRef`s.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn franz_rt_list_from_array(elems: *const ValueRef, len: i64) -> ValueRef {
    let mut list = List::with_capacity(len as usize);
    for i in 0..len as usize {
        let v = unsafe { *elems.add(i) };
        unsafe { list.push_owned(retain(v)) };
    }
    Value::new_list(list)
}

/// Length of a list, dict or string; TYPE error otherwise.
///
/// # Safety
/// The pair must be honest.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn franz_rt_len(bits: i64, tag: i32) -> i64 {
    if let Some(t) = Tag::from_i64(tag as i64)
        && t.is_pointer()
    {
        match unsafe { &(*(bits as ValueRef)).data } {
            ValueData::List(list) => return list.len() as i64,
            ValueData::Dict(dict) => return dict.len() as i64,
            ValueData::Str(s) => return s.chars().count() as i64,
            _ => {}
        }
    }
    raise(ErrorKind::Type, "len: expected a list, dict or string");
    0
}

/// Retained element at an index; RANGE error out of bounds.
///
/// # Safety
/// Pairs must be honest.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn franz_rt_list_get(
    l_bits: i64,
    l_tag: i32,
    i_bits: i64,
    i_tag: i32,
) -> ValueRef {
    let (Some(list), Some(index)) = (unsafe { as_list(l_bits, l_tag, "get") }, unsafe {
        as_index(i_bits, i_tag, "get")
    }) else {
        return Value::new_void();
    };
    match list.get(index) {
        Ok(v) => unsafe { retain(v) },
        Err(e) => range_error("get", e.index, e.len),
    }
}

/// New list with one element replaced.
///
/// # Safety
/// Pairs must be honest.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn franz_rt_list_set(
    l_bits: i64,
    l_tag: i32,
    i_bits: i64,
    i_tag: i32,
    v_bits: i64,
    v_tag: i32,
) -> ValueRef {
    let (Some(list), Some(index)) = (unsafe { as_list(l_bits, l_tag, "set") }, unsafe {
        as_index(i_bits, i_tag, "set")
    }) else {
        return Value::new_void();
    };
    let v = unsafe { pair_to_owned(v_bits, v_tag) };
    let result = unsafe { list.set(index, v) };
    unsafe { release(v) };
    match result {
        Ok(out) => Value::new_list(out),
        Err(e) => range_error("set", e.index, e.len),
    }
}

/// New list with an element inserted; index may equal the length.
///
/// # Safety
/// Pairs must be honest.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn franz_rt_list_insert(
    l_bits: i64,
    l_tag: i32,
    i_bits: i64,
    i_tag: i32,
    v_bits: i64,
    v_tag: i32,
) -> ValueRef {
    let (Some(list), Some(index)) = (unsafe { as_list(l_bits, l_tag, "insert") }, unsafe {
        as_index(i_bits, i_tag, "insert")
    }) else {
        return Value::new_void();
    };
    let v = unsafe { pair_to_owned(v_bits, v_tag) };
    let result = unsafe { list.insert(index, v) };
    unsafe { release(v) };
    match result {
        Ok(out) => Value::new_list(out),
        Err(e) => range_error("insert", e.index, e.len),
    }
}

/// New list without the element at an index.
///
/// # Safety
/// Pairs must be honest.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn franz_rt_list_delete(
    l_bits: i64,
    l_tag: i32,
    i_bits: i64,
    i_tag: i32,
) -> ValueRef {
    let (Some(list), Some(index)) = (unsafe { as_list(l_bits, l_tag, "delete") }, unsafe {
        as_index(i_bits, i_tag, "delete")
    }) else {
        return Value::new_void();
    };
    match unsafe { list.delete(index) } {
        Ok(out) => Value::new_list(out),
        Err(e) => range_error("delete", e.index, e.len),
    }
}

/// New list of the half-open range `[start, end)`.
///
/// # Safety
/// Pairs must be honest.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn franz_rt_list_slice(
    l_bits: i64,
    l_tag: i32,
    s_bits: i64,
    s_tag: i32,
    e_bits: i64,
    e_tag: i32,
) -> ValueRef {
    let (Some(list), Some(start), Some(end)) = (
        unsafe { as_list(l_bits, l_tag, "slice") },
        unsafe { as_index(s_bits, s_tag, "slice") },
        unsafe { as_index(e_bits, e_tag, "slice") },
    ) else {
        return Value::new_void();
    };
    match unsafe { list.slice(start, end) } {
        Ok(out) => Value::new_list(out),
        Err(e) => range_error("slice", e.index, e.len),
    }
}

/// Concatenation of two lists.
///
/// # Safety
/// Pairs must be honest.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn franz_rt_list_join(
    a_bits: i64,
    a_tag: i32,
    b_bits: i64,
    b_tag: i32,
) -> ValueRef {
    let (Some(a), Some(b)) = (unsafe { as_list(a_bits, a_tag, "join") }, unsafe {
        as_list(b_bits, b_tag, "join")
    }) else {
        return Value::new_void();
    };
    Value::new_list(unsafe { List::join(&[a, b]) })
}

/// `[start, end)` as a list of integers.
///
/// # Safety
/// Pairs must be honest.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn franz_rt_range(
    s_bits: i64,
    s_tag: i32,
    e_bits: i64,
    e_tag: i32,
) -> ValueRef {
    let (Some(start), Some(end)) = (unsafe { as_index(s_bits, s_tag, "range") }, unsafe {
        as_index(e_bits, e_tag, "range")
    }) else {
        return Value::new_void();
    };
    let mut list = List::with_capacity(end.saturating_sub(start).max(0) as usize);
    let mut i = start;
    while i < end {
        unsafe { list.push_owned(Value::new_int(i)) };
        i += 1;
    }
    Value::new_list(list)
}

/// Generic `map`: dispatches to the list or dict driver by the
/// collection's tag.
///
/// # Safety
/// Pairs must be honest; `f` must follow the closure ABI.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn franz_rt_map(
    c_bits: i64,
    c_tag: i32,
    f_bits: i64,
    f_tag: i32,
) -> ValueRef {
    if let Some(t) = Tag::from_i64(c_tag as i64)
        && t.is_pointer()
        && matches!(unsafe { &(*(c_bits as ValueRef)).data }, ValueData::Dict(_))
    {
        return unsafe { crate::dict_rt::franz_rt_dict_map(c_bits, c_tag, f_bits, f_tag) };
    }
    unsafe { franz_rt_list_map(c_bits, c_tag, f_bits, f_tag) }
}

/// Generic `filter`: dispatches to the list or dict driver by the
/// collection's tag.
///
/// # Safety
/// Pairs must be honest; `f` must follow the closure ABI.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn franz_rt_filter(
    c_bits: i64,
    c_tag: i32,
    f_bits: i64,
    f_tag: i32,
) -> ValueRef {
    if let Some(t) = Tag::from_i64(c_tag as i64)
        && t.is_pointer()
        && matches!(unsafe { &(*(c_bits as ValueRef)).data }, ValueData::Dict(_))
    {
        return unsafe { crate::dict_rt::franz_rt_dict_filter(c_bits, c_tag, f_bits, f_tag) };
    }
    unsafe { franz_rt_list_filter(c_bits, c_tag, f_bits, f_tag) }
}

/// `map` driver: new list of `f(element, index)` results.
///
/// # Safety
/// Pairs must be honest; `f` must follow the closure ABI.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn franz_rt_list_map(
    l_bits: i64,
    l_tag: i32,
    f_bits: i64,
    f_tag: i32,
) -> ValueRef {
    let Some(list) = (unsafe { as_list(l_bits, l_tag, "map") }) else {
        return Value::new_void();
    };
    let f = unsafe { require_callable(f_bits, f_tag, "map") };
    if f.is_null() {
        return Value::new_void();
    }
    let mut out = List::with_capacity(list.len());
    for (i, &elem) in list.iter().enumerate() {
        let pair = unsafe { value_to_pair(elem) };
        let result = unsafe { apply_value(f, &[pair, (i as i64, Tag::Int as i64)]) };
        if has_pending() {
            unsafe { release(result) };
            drop(out);
            return Value::new_void();
        }
        unsafe { out.push_owned(result) };
    }
    Value::new_list(out)
}

/// `filter` driver: new list of elements where `f(element, index)` is true.
///
/// # Safety
/// Pairs must be honest; `f` must follow the closure ABI.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn franz_rt_list_filter(
    l_bits: i64,
    l_tag: i32,
    f_bits: i64,
    f_tag: i32,
) -> ValueRef {
    let Some(list) = (unsafe { as_list(l_bits, l_tag, "filter") }) else {
        return Value::new_void();
    };
    let f = unsafe { require_callable(f_bits, f_tag, "filter") };
    if f.is_null() {
        return Value::new_void();
    }
    let mut out = List::new();
    for (i, &elem) in list.iter().enumerate() {
        let pair = unsafe { value_to_pair(elem) };
        let verdict = unsafe { apply_value(f, &[pair, (i as i64, Tag::Int as i64)]) };
        if has_pending() {
            unsafe { release(verdict) };
            drop(out);
            return Value::new_void();
        }
        let (v_bits, v_tag) = unsafe { value_to_pair(verdict) };
        let keep = unsafe { crate::boxing::franz_rt_cond(v_bits, v_tag as i32) } != 0;
        unsafe { release(verdict) };
        if keep {
            unsafe { out.push_owned(retain(elem)) };
        }
    }
    Value::new_list(out)
}

/// `reduce` driver: fold with `f(accumulator, element, index)`, starting
/// from the supplied initial accumulator.
///
/// # Safety
/// Pairs must be honest; `f` must follow the closure ABI.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn franz_rt_list_reduce(
    l_bits: i64,
    l_tag: i32,
    f_bits: i64,
    f_tag: i32,
    init_bits: i64,
    init_tag: i32,
) -> ValueRef {
    let Some(list) = (unsafe { as_list(l_bits, l_tag, "reduce") }) else {
        return Value::new_void();
    };
    let f = unsafe { require_callable(f_bits, f_tag, "reduce") };
    if f.is_null() {
        return Value::new_void();
    }
    let mut acc = unsafe { pair_to_owned(init_bits, init_tag) };
    for (i, &elem) in list.iter().enumerate() {
        let acc_pair = unsafe { value_to_pair(acc) };
        let elem_pair = unsafe { value_to_pair(elem) };
        let next = unsafe { apply_value(f, &[acc_pair, elem_pair, (i as i64, Tag::Int as i64)]) };
        unsafe { release(acc) };
        if has_pending() {
            unsafe { release(next) };
            return Value::new_void();
        }
        acc = next;
    }
    acc
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::boxing::franz_rt_unbox_int;
    use franz_core::{RET_INT, values_live};

    unsafe fn make_list(ns: &[i64]) -> ValueRef {
        let elems: Vec<ValueRef> = ns.iter().map(|&n| Value::new_int(n)).collect();
        let out = unsafe { franz_rt_list_from_array(elems.as_ptr(), elems.len() as i64) };
        for v in elems {
            unsafe { release(v) };
        }
        out
    }

    #[test]
    fn test_from_array_and_get() {
        unsafe {
            let l = make_list(&[10, 20, 30]);
            assert_eq!(franz_rt_len(l as i64, Tag::List as i32), 3);
            let v = franz_rt_list_get(l as i64, Tag::List as i32, 1, Tag::Int as i32);
            assert_eq!(franz_rt_unbox_int(v), 20);
            release(v);
            release(l);
        }
    }

    #[test]
    fn test_insert_law_via_ffi() {
        unsafe {
            let l = make_list(&[1, 2, 3]);
            let out = franz_rt_list_insert(
                l as i64,
                Tag::List as i32,
                1,
                Tag::Int as i32,
                99,
                Tag::Int as i32,
            );
            assert_eq!(franz_rt_len(out as i64, Tag::List as i32), 4);
            let v = franz_rt_list_get(out as i64, Tag::List as i32, 1, Tag::Int as i32);
            assert_eq!(franz_rt_unbox_int(v), 99);
            release(v);
            release(out);
            release(l);
        }
    }

    // Doubling callee used by the map test.
    extern "C" fn double_code(a0: i64, _t0: i32) -> i64 {
        a0 * 2
    }

    #[test]
    fn test_map_driver() {
        let before = values_live();
        unsafe {
            let l = make_list(&[1, 2, 3]);
            let f = crate::closure::franz_rt_closure_new(
                double_code as usize as *const u8,
                std::ptr::null_mut(),
                RET_INT,
            );
            let out = franz_rt_list_map(l as i64, Tag::List as i32, f as i64, Tag::Closure as i32);
            let v = franz_rt_list_get(out as i64, Tag::List as i32, 2, Tag::Int as i32);
            assert_eq!(franz_rt_unbox_int(v), 6);
            release(v);
            release(out);
            release(f);
            release(l);
        }
        assert_eq!(values_live(), before);
    }

    // Keep odd numbers.
    extern "C" fn odd_code(a0: i64, _t0: i32) -> i64 {
        a0 % 2
    }

    #[test]
    fn test_filter_driver() {
        unsafe {
            let l = make_list(&[1, 2, 3, 4, 5]);
            let f = crate::closure::franz_rt_closure_new(
                odd_code as usize as *const u8,
                std::ptr::null_mut(),
                RET_INT,
            );
            let out =
                franz_rt_list_filter(l as i64, Tag::List as i32, f as i64, Tag::Closure as i32);
            assert_eq!(franz_rt_len(out as i64, Tag::List as i32), 3);
            release(out);
            release(f);
            release(l);
        }
    }

    // acc + elem, ignoring the index.
    extern "C" fn sum_code(a0: i64, _t0: i32, a1: i64, _t1: i32) -> i64 {
        a0 + a1
    }

    #[test]
    fn test_reduce_driver() {
        unsafe {
            let l = make_list(&[1, 2, 3, 4]);
            let f = crate::closure::franz_rt_closure_new(
                sum_code as usize as *const u8,
                std::ptr::null_mut(),
                RET_INT,
            );
            let out = franz_rt_list_reduce(
                l as i64,
                Tag::List as i32,
                f as i64,
                Tag::Closure as i32,
                0,
                Tag::Int as i32,
            );
            assert_eq!(franz_rt_unbox_int(out), 10);
            release(out);
            release(f);
            release(l);
        }
    }

    #[test]
    fn test_range() {
        unsafe {
            let l = franz_rt_range(2, Tag::Int as i32, 5, Tag::Int as i32);
            assert_eq!(franz_rt_len(l as i64, Tag::List as i32), 3);
            let v = franz_rt_list_get(l as i64, Tag::List as i32, 0, Tag::Int as i32);
            assert_eq!(franz_rt_unbox_int(v), 2);
            release(v);
            release(l);
        }
    }
}
