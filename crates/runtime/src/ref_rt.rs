//! Reference cell primitives

use crate::boxing::pair_to_owned;
use crate::error::{ErrorKind, raise};
use franz_core::{Tag, Value, ValueData, ValueRef};

unsafe fn as_ref_value<'a>(bits: i64, tag: i32, who: &str) -> Option<&'a ValueData> {
    if tag == Tag::Ref as i32 {
        return Some(unsafe { &(*(bits as ValueRef)).data });
    }
    raise(ErrorKind::Type, format!("{}: expected a ref", who));
    None
}

/// Allocate a cell holding the given value.
///
/// # Safety
/// The pair must be honest.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn franz_rt_ref_new(bits: i64, tag: i32) -> ValueRef {
    Value::new_ref(unsafe { pair_to_owned(bits, tag) })
}

/// Retained copy of the held value.
///
/// # Safety
/// The pair must be honest.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn franz_rt_ref_get(bits: i64, tag: i32) -> ValueRef {
    match unsafe { as_ref_value(bits, tag, "ref_get") } {
        Some(ValueData::Ref(cell)) => unsafe { cell.get() },
        _ => Value::new_void(),
    }
}

/// Replace the held value, releasing the old one. Returns void.
///
/// # Safety
/// Pairs must be honest.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn franz_rt_ref_set(
    r_bits: i64,
    r_tag: i32,
    v_bits: i64,
    v_tag: i32,
) -> ValueRef {
    match unsafe { as_ref_value(r_bits, r_tag, "ref_set") } {
        Some(ValueData::Ref(cell)) => {
            let owner = r_bits as ValueRef;
            unsafe { cell.set(owner, pair_to_owned(v_bits, v_tag)) };
        }
        _ => {}
    }
    Value::new_void()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::boxing::franz_rt_unbox_int;
    use franz_core::{release, values_live};

    #[test]
    fn test_ref_get_set_roundtrip() {
        let before = values_live();
        unsafe {
            let r = franz_rt_ref_new(1, Tag::Int as i32);
            let v0 = franz_rt_ref_get(r as i64, Tag::Ref as i32);
            assert_eq!(franz_rt_unbox_int(v0), 1);
            release(v0);

            let void = franz_rt_ref_set(r as i64, Tag::Ref as i32, 2, Tag::Int as i32);
            release(void);

            let v1 = franz_rt_ref_get(r as i64, Tag::Ref as i32);
            assert_eq!(franz_rt_unbox_int(v1), 2);
            release(v1);
            release(r);
        }
        assert_eq!(values_live(), before);
    }
}
