//! Closure support
//!
//! A compiled function value is a CLOSURE-tagged universal value whose
//! payload is the fixed-layout record `{ func, env, return_tag }`. The code
//! pointer's signature is
//!
//! ```text
//! i64 fn([env: ptr,] a0: i64, t0: i32, a1: i64, t1: i32, ...)
//! ```
//!
//! with the environment parameter present iff `env` is non-null, one
//! (payload, tag) operand pair per language argument, and the 64-bit result
//! interpreted through the record's return tag. Callees with fewer declared
//! parameters than supplied arguments simply ignore the extras (positional C
//! convention), which is what lets `map`-style drivers pass (element, index)
//! to a one-parameter function.
//!
//! These functions are called from generated LLVM IR, not from actual C;
//! the transmutes below mirror the call sites the compiler emits.

use crate::boxing::{pair_to_owned, tag_name};
use crate::error::{ErrorKind, raise};
use franz_core::{
    ClosureRecord, EnvHeader, Tag, Value, ValueData, ValueRef, env_alloc, env_len, env_slot_set,
    release, retain,
};

/// Maximum number of captured values in one environment.
pub const MAX_CAPTURES: usize = 1024;

/// Maximum argument count the invoke path supports.
pub const MAX_APPLY_ARGS: usize = 6;

/// One call-site argument as stored in the argument block passed to
/// [`franz_rt_apply`]. Layout `{ i64, i64 }`, matching the alloca the
/// compiler emits.
#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct ArgPair {
    pub bits: i64,
    pub tag: i64,
}

/// Allocate a closure environment of `len` slots.
#[unsafe(no_mangle)]
pub extern "C" fn franz_rt_env_alloc(len: i64) -> *mut EnvHeader {
    if len < 0 || len as usize > MAX_CAPTURES {
        panic!("env_alloc: bad capture count {}", len);
    }
    env_alloc(len as usize)
}

/// Store a captured value into an environment slot. Pointer payloads are
/// retained; the environment owns them until the closure dies.
///
/// # Safety
/// `env` must come from `franz_rt_env_alloc`, `index` in bounds, and the
/// pair must be honest (pointer tags carry live refs).
#[unsafe(no_mangle)]
pub unsafe extern "C" fn franz_rt_env_set(env: *mut EnvHeader, index: i64, bits: i64, tag: i64) {
    if env.is_null() {
        panic!("env_set: null environment");
    }
    let len = unsafe { env_len(env) };
    if index < 0 || index as usize >= len {
        panic!("env_set: index {} out of bounds for environment of {}", index, len);
    }
    if let Some(t) = Tag::from_i64(tag)
        && t.is_pointer()
    {
        unsafe { retain(bits as ValueRef) };
    }
    unsafe { env_slot_set(env, index as usize, bits as u64, tag as u64) };
}

/// Build a closure value from a code pointer, an environment (null for
/// non-capturing functions) and a return tag. Takes ownership of `env`.
///
/// # Safety
/// `func` must be a valid code pointer following the closure ABI.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn franz_rt_closure_new(
    func: *const u8,
    env: *mut EnvHeader,
    return_tag: i64,
) -> ValueRef {
    if func.is_null() {
        panic!("closure_new: null code pointer");
    }
    Value::new_closure(ClosureRecord {
        func,
        env,
        return_tag,
    })
}

/// Pointer to a closure value's record, for call sites that statically know
/// the callee is a closure. TYPE error and null otherwise.
///
/// # Safety
/// `v` must be live.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn franz_rt_closure_record(v: ValueRef) -> *const ClosureRecord {
    match unsafe { &(*v).data } {
        ValueData::Closure(record) => record as *const ClosureRecord,
        other => {
            raise(
                ErrorKind::Type,
                format!("value is not callable: {}", tag_name(other)),
            );
            std::ptr::null()
        }
    }
}

/// Invoke a code pointer with the tagged-parameter convention.
///
/// # Safety
/// `func` must follow the closure ABI; pointer-tagged args must be live.
unsafe fn invoke_code(func: *const u8, env: *mut EnvHeader, args: &[(i64, i64)]) -> i64 {
    type A = i64;
    type T = i32;
    macro_rules! arg {
        ($i:expr) => {
            (args[$i].0, args[$i].1 as i32)
        };
    }
    unsafe {
        if env.is_null() {
            match args.len() {
                0 => std::mem::transmute::<_, extern "C" fn() -> i64>(func)(),
                1 => {
                    let (a0, t0) = arg!(0);
                    std::mem::transmute::<_, extern "C" fn(A, T) -> i64>(func)(a0, t0)
                }
                2 => {
                    let (a0, t0) = arg!(0);
                    let (a1, t1) = arg!(1);
                    std::mem::transmute::<_, extern "C" fn(A, T, A, T) -> i64>(func)(a0, t0, a1, t1)
                }
                3 => {
                    let (a0, t0) = arg!(0);
                    let (a1, t1) = arg!(1);
                    let (a2, t2) = arg!(2);
                    std::mem::transmute::<_, extern "C" fn(A, T, A, T, A, T) -> i64>(func)(
                        a0, t0, a1, t1, a2, t2,
                    )
                }
                4 => {
                    let (a0, t0) = arg!(0);
                    let (a1, t1) = arg!(1);
                    let (a2, t2) = arg!(2);
                    let (a3, t3) = arg!(3);
                    std::mem::transmute::<_, extern "C" fn(A, T, A, T, A, T, A, T) -> i64>(func)(
                        a0, t0, a1, t1, a2, t2, a3, t3,
                    )
                }
                5 => {
                    let (a0, t0) = arg!(0);
                    let (a1, t1) = arg!(1);
                    let (a2, t2) = arg!(2);
                    let (a3, t3) = arg!(3);
                    let (a4, t4) = arg!(4);
                    std::mem::transmute::<_, extern "C" fn(A, T, A, T, A, T, A, T, A, T) -> i64>(
                        func,
                    )(a0, t0, a1, t1, a2, t2, a3, t3, a4, t4)
                }
                6 => {
                    let (a0, t0) = arg!(0);
                    let (a1, t1) = arg!(1);
                    let (a2, t2) = arg!(2);
                    let (a3, t3) = arg!(3);
                    let (a4, t4) = arg!(4);
                    let (a5, t5) = arg!(5);
                    std::mem::transmute::<_, extern "C" fn(A, T, A, T, A, T, A, T, A, T, A, T) -> i64>(
                        func,
                    )(a0, t0, a1, t1, a2, t2, a3, t3, a4, t4, a5, t5)
                }
                n => {
                    raise(ErrorKind::Arity, format!("too many arguments: {}", n));
                    0
                }
            }
        } else {
            type E = *mut EnvHeader;
            match args.len() {
                0 => std::mem::transmute::<_, extern "C" fn(E) -> i64>(func)(env),
                1 => {
                    let (a0, t0) = arg!(0);
                    std::mem::transmute::<_, extern "C" fn(E, A, T) -> i64>(func)(env, a0, t0)
                }
                2 => {
                    let (a0, t0) = arg!(0);
                    let (a1, t1) = arg!(1);
                    std::mem::transmute::<_, extern "C" fn(E, A, T, A, T) -> i64>(func)(
                        env, a0, t0, a1, t1,
                    )
                }
                3 => {
                    let (a0, t0) = arg!(0);
                    let (a1, t1) = arg!(1);
                    let (a2, t2) = arg!(2);
                    std::mem::transmute::<_, extern "C" fn(E, A, T, A, T, A, T) -> i64>(func)(
                        env, a0, t0, a1, t1, a2, t2,
                    )
                }
                4 => {
                    let (a0, t0) = arg!(0);
                    let (a1, t1) = arg!(1);
                    let (a2, t2) = arg!(2);
                    let (a3, t3) = arg!(3);
                    std::mem::transmute::<_, extern "C" fn(E, A, T, A, T, A, T, A, T) -> i64>(func)(
                        env, a0, t0, a1, t1, a2, t2, a3, t3,
                    )
                }
                5 => {
                    let (a0, t0) = arg!(0);
                    let (a1, t1) = arg!(1);
                    let (a2, t2) = arg!(2);
                    let (a3, t3) = arg!(3);
                    let (a4, t4) = arg!(4);
                    std::mem::transmute::<_, extern "C" fn(E, A, T, A, T, A, T, A, T, A, T) -> i64>(
                        func,
                    )(env, a0, t0, a1, t1, a2, t2, a3, t3, a4, t4)
                }
                6 => {
                    let (a0, t0) = arg!(0);
                    let (a1, t1) = arg!(1);
                    let (a2, t2) = arg!(2);
                    let (a3, t3) = arg!(3);
                    let (a4, t4) = arg!(4);
                    let (a5, t5) = arg!(5);
                    std::mem::transmute::<
                        _,
                        extern "C" fn(E, A, T, A, T, A, T, A, T, A, T, A, T) -> i64,
                    >(func)(env, a0, t0, a1, t1, a2, t2, a3, t3, a4, t4, a5, t5)
                }
                n => {
                    raise(ErrorKind::Arity, format!("too many arguments: {}", n));
                    0
                }
            }
        }
    }
}

/// Invoke any callable value (closure or native) with honest argument
/// pairs, returning an owned result value. This is the path drivers and
/// dynamically-typed call sites share.
///
/// # Safety
/// `callee` must be live; pointer-tagged args must be live.
pub(crate) unsafe fn apply_value(callee: ValueRef, args: &[(i64, i64)]) -> ValueRef {
    match unsafe { &(*callee).data } {
        ValueData::Closure(record) => {
            let bits = unsafe { invoke_code(record.func, record.env, args) };
            unsafe { crate::boxing::franz_rt_box_result(bits, record.return_tag) }
        }
        ValueData::Native(f) => {
            let owned: Vec<ValueRef> = args
                .iter()
                .map(|&(bits, tag)| unsafe { pair_to_owned(bits, tag as i32) })
                .collect();
            let result = unsafe { f(owned.as_ptr(), owned.len() as i64) };
            for v in owned {
                unsafe { release(v) };
            }
            result
        }
        other => {
            raise(
                ErrorKind::Type,
                format!("value is not callable: {}", tag_name(other)),
            );
            Value::new_void()
        }
    }
}

/// Dynamic application: invoke the callee in `(bits, tag)` with an argument
/// block of `argc` pairs. Returns an owned boxed result.
///
/// # Safety
/// The pair must be honest and `args` must point to `argc` valid pairs.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn franz_rt_apply(
    bits: i64,
    tag: i32,
    args: *const ArgPair,
    argc: i64,
) -> ValueRef {
    let Some(t) = Tag::from_i64(tag as i64) else {
        raise(ErrorKind::Type, format!("bad value tag {}", tag));
        return Value::new_void();
    };
    if !matches!(t, Tag::Closure | Tag::Native) {
        raise(
            ErrorKind::Type,
            format!("value is not callable: {:?}", t),
        );
        return Value::new_void();
    }
    let mut pairs = Vec::with_capacity(argc as usize);
    for i in 0..argc as usize {
        let p = unsafe { *args.add(i) };
        pairs.push((p.bits, p.tag));
    }
    unsafe { apply_value(bits as ValueRef, &pairs) }
}

#[cfg(test)]
mod tests {
    use super::*;
    use franz_core::{RET_INT, RET_VOID, env_slot, value_eq, values_live};

    #[test]
    fn test_env_alloc_and_set() {
        unsafe {
            let env = franz_rt_env_alloc(2);
            franz_rt_env_set(env, 0, 42, Tag::Int as i64);
            franz_rt_env_set(env, 1, 2.5f64.to_bits() as i64, Tag::Float as i64);
            assert_eq!((*env_slot(env, 0)).bits, 42);
            assert_eq!((*env_slot(env, 1)).tag, Tag::Float as u64);
            franz_core::env_release(env);
        }
    }

    #[test]
    fn test_env_set_retains_pointer_slots() {
        let before = values_live();
        unsafe {
            let s = Value::new_str("captured".to_string());
            let env = franz_rt_env_alloc(1);
            franz_rt_env_set(env, 0, s as i64, Tag::Str as i64);
            assert_eq!((*s).refcount(), 2);
            release(s);
            franz_core::env_release(env);
        }
        assert_eq!(values_live(), before);
    }

    // A non-capturing callee: adds its two int arguments.
    extern "C" fn add_code(a0: i64, _t0: i32, a1: i64, _t1: i32) -> i64 {
        a0 + a1
    }

    #[test]
    fn test_closure_invoke_without_env() {
        let before = values_live();
        unsafe {
            let closure = franz_rt_closure_new(add_code as usize as *const u8, std::ptr::null_mut(), RET_INT);
            let out = apply_value(
                closure,
                &[(5, Tag::Int as i64), (7, Tag::Int as i64)],
            );
            let expected = Value::new_int(12);
            assert!(value_eq(out, expected));
            release(expected);
            release(out);
            release(closure);
        }
        assert_eq!(values_live(), before);
    }

    // A capturing callee: adds its argument to env slot 0.
    extern "C" fn add_env_code(env: *mut EnvHeader, a0: i64, _t0: i32) -> i64 {
        unsafe { (*env_slot(env, 0)).bits as i64 + a0 }
    }

    #[test]
    fn test_closure_invoke_with_env_snapshot() {
        unsafe {
            let env = franz_rt_env_alloc(1);
            franz_rt_env_set(env, 0, 5, Tag::Int as i64);
            let closure = franz_rt_closure_new(add_env_code as usize as *const u8, env, RET_INT);

            // Idempotent: the snapshot does not change between calls.
            for _ in 0..2 {
                let out = apply_value(closure, &[(7, Tag::Int as i64)]);
                assert_eq!(crate::boxing::franz_rt_unbox_int(out), 12);
                release(out);
            }
            release(closure);
        }
    }

    #[test]
    fn test_extra_arguments_are_ignored() {
        // One-parameter callee invoked with (element, index) — the driver
        // convention. The callee reads only its first pair.
        extern "C" fn first_arg(a0: i64, _t0: i32) -> i64 {
            a0
        }
        unsafe {
            let closure =
                franz_rt_closure_new(first_arg as usize as *const u8, std::ptr::null_mut(), RET_INT);
            let out = apply_value(
                closure,
                &[(99, Tag::Int as i64), (0, Tag::Int as i64)],
            );
            assert_eq!(crate::boxing::franz_rt_unbox_int(out), 99);
            release(out);
            release(closure);
        }
    }

    #[test]
    fn test_apply_native() {
        unsafe extern "C" fn sum(args: *const ValueRef, argc: i64) -> ValueRef {
            let mut total = 0;
            for i in 0..argc as usize {
                total += unsafe { crate::boxing::franz_rt_unbox_int(*args.add(i)) };
            }
            Value::new_int(total)
        }
        unsafe {
            let native = Value::new_native(sum);
            let args = [
                ArgPair {
                    bits: 1,
                    tag: Tag::Int as i64,
                },
                ArgPair {
                    bits: 2,
                    tag: Tag::Int as i64,
                },
            ];
            let out = franz_rt_apply(native as i64, Tag::Native as i32, args.as_ptr(), 2);
            assert_eq!(crate::boxing::franz_rt_unbox_int(out), 3);
            release(out);
            release(native);
        }
    }

    #[test]
    fn test_void_closure_result() {
        extern "C" fn noop() -> i64 {
            0
        }
        unsafe {
            let closure = franz_rt_closure_new(noop as usize as *const u8, std::ptr::null_mut(), RET_VOID);
            let out = apply_value(closure, &[]);
            assert_eq!((*out).tag(), Tag::Void);
            release(out);
            release(closure);
        }
    }
}
