//! Integration tests for the closure ABI
//!
//! These exercise the full contract between generated code and the runtime:
//! environment snapshots, the tagged-parameter calling convention, and the
//! drivers that invoke user callables, using real `extern "C"` callees
//! written the way the compiler emits them.

use franz_runtime::{
    ArgPair, EnvHeader, Tag, Value, ValueRef, apply, catch_op, closure_new, env_alloc, env_set,
    release, try_op, unbox_int, values_live,
};

const INT: i64 = Tag::Int as i64;

fn fnp(f: usize) -> *const u8 {
    f as *const u8
}

// `{x -> <- x}` compiled: returns its argument's payload. Returning a
// borrowed pointer argument would retain it first; for raw ints the bits
// pass straight through.
extern "C" fn identity_code(a0: i64, _t0: i32) -> i64 {
    a0
}

// `{a b -> <- (add a b)}` compiled, monomorphic int fast path.
extern "C" fn adder_code(a0: i64, _t0: i32, a1: i64, _t1: i32) -> i64 {
    a0 + a1
}

// The inner function of `{n -> {x -> (add n x)}}`: one capture, one
// parameter. Reads the captured `n` from env slot 0 the way compiled
// prologues do (fixed offsets).
extern "C" fn add_captured_code(env: *mut EnvHeader, a0: i64, _t0: i32) -> i64 {
    let bits = unsafe { *((env as *const u8).add(8) as *const i64) };
    bits + a0
}

#[test]
fn test_identity_closure_roundtrip() {
    let before = values_live();
    unsafe {
        let f = closure_new(fnp(identity_code as usize), std::ptr::null_mut(), franz_core::RET_INT);
        let args = [ArgPair { bits: 42, tag: INT }];
        let out = apply(f as i64, Tag::Closure as i32, args.as_ptr(), 1);
        assert_eq!(unbox_int(out), 42);
        release(out);
        release(f);
    }
    assert_eq!(values_live(), before);
}

#[test]
fn test_two_argument_closure() {
    unsafe {
        let f = closure_new(fnp(adder_code as usize), std::ptr::null_mut(), franz_core::RET_INT);
        let args = [ArgPair { bits: 2, tag: INT }, ArgPair { bits: 3, tag: INT }];
        let out = apply(f as i64, Tag::Closure as i32, args.as_ptr(), 2);
        assert_eq!(unbox_int(out), 5);
        release(out);
        release(f);
    }
}

#[test]
fn test_capture_snapshot_and_idempotent_calls() {
    // ((f 5) 7) == 12, twice: the environment snapshot is stable.
    let before = values_live();
    unsafe {
        let env = env_alloc(1);
        env_set(env, 0, 5, INT);
        let inner = closure_new(fnp(add_captured_code as usize), env, franz_core::RET_INT);

        for _ in 0..2 {
            let args = [ArgPair { bits: 7, tag: INT }];
            let out = apply(inner as i64, Tag::Closure as i32, args.as_ptr(), 1);
            assert_eq!(unbox_int(out), 12);
            release(out);
        }
        release(inner);
    }
    assert_eq!(values_live(), before);
}

#[test]
fn test_snapshot_is_independent_of_later_rebinding() {
    // Capturing by value: changing the slot source after capture cannot be
    // observed. Two closures built from different snapshots stay distinct.
    unsafe {
        let env_a = env_alloc(1);
        env_set(env_a, 0, 10, INT);
        let f_a = closure_new(fnp(add_captured_code as usize), env_a, franz_core::RET_INT);

        let env_b = env_alloc(1);
        env_set(env_b, 0, 20, INT);
        let f_b = closure_new(fnp(add_captured_code as usize), env_b, franz_core::RET_INT);

        let args = [ArgPair { bits: 1, tag: INT }];
        let out_a = apply(f_a as i64, Tag::Closure as i32, args.as_ptr(), 1);
        let out_b = apply(f_b as i64, Tag::Closure as i32, args.as_ptr(), 1);
        assert_eq!(unbox_int(out_a), 11);
        assert_eq!(unbox_int(out_b), 21);
        release(out_a);
        release(out_b);
        release(f_a);
        release(f_b);
    }
}

#[test]
fn test_catch_with_closure_body() {
    // (catch {-> (error "boom")} "fallback") evaluates to "fallback" and
    // leaves no pending error.
    extern "C" fn boom_code() -> i64 {
        unsafe {
            let msg = Value::new_str("boom".to_string());
            franz_runtime::error_op(msg as i64, Tag::Str as i32);
            release(msg);
        }
        0
    }
    unsafe {
        let body = closure_new(fnp(boom_code as usize), std::ptr::null_mut(), franz_core::RET_VOID);
        let fallback = Value::new_str("fallback".to_string());
        let out = catch_op(
            body as i64,
            Tag::Closure as i32,
            fallback as i64,
            Tag::Str as i32,
        );
        assert!(franz_runtime::value_eq(out, fallback));
        assert!(!franz_runtime::has_pending());
        release(out);
        release(fallback);
        release(body);
    }
}

#[test]
fn test_try_handler_receives_message() {
    extern "C" fn boom_code() -> i64 {
        unsafe {
            let msg = Value::new_str("kaput".to_string());
            franz_runtime::error_op(msg as i64, Tag::Str as i32);
            release(msg);
        }
        0
    }
    // `{msg -> <- msg}` compiled: a string argument arrives as a borrowed
    // pointer, so returning it retains first (the `own` step).
    extern "C" fn echo_code(a0: i64, t0: i32) -> i64 {
        unsafe { franz_runtime::own(a0, t0) }
    }
    unsafe {
        let body = closure_new(fnp(boom_code as usize), std::ptr::null_mut(), franz_core::RET_VOID);
        let handler = closure_new(
            fnp(echo_code as usize),
            std::ptr::null_mut(),
            franz_core::RET_POINTER,
        );
        let out = try_op(
            body as i64,
            Tag::Closure as i32,
            handler as i64,
            Tag::Closure as i32,
        );
        let expected = Value::new_str("kaput".to_string());
        assert!(franz_runtime::value_eq(out, expected));
        release(expected);
        release(out);
        release(handler);
        release(body);
    }
}

#[test]
fn test_boxed_argument_flows_through_pointer_tag() {
    // A list argument crosses as (pointer, List); the callee hands it back
    // retained (the compiled `own` + return sequence for pointer results).
    extern "C" fn echo_code(a0: i64, t0: i32) -> i64 {
        unsafe { franz_runtime::own(a0, t0) }
    }
    let before = values_live();
    unsafe {
        let elems = [Value::new_int(1), Value::new_int(2)];
        let list = franz_runtime::list_from_array(elems.as_ptr(), 2);
        for v in elems {
            release(v);
        }

        let f = closure_new(
            fnp(echo_code as usize),
            std::ptr::null_mut(),
            franz_core::RET_POINTER,
        );
        let args = [ArgPair {
            bits: list as i64,
            tag: Tag::List as i64,
        }];
        let out = apply(f as i64, Tag::Closure as i32, args.as_ptr(), 1);
        assert_eq!(out, list);
        assert!(franz_runtime::value_eq(out, list));
        release(out);
        release(f);
        release(list);
    }
    assert_eq!(values_live(), before);
}

#[test]
fn test_reduce_scenario() {
    // (reduce [1,2,3,4] {acc x i -> <- (add acc x)} 0) evaluates to 10.
    extern "C" fn acc_add_code(a0: i64, _t0: i32, a1: i64, _t1: i32, _a2: i64, _t2: i32) -> i64 {
        a0 + a1
    }
    unsafe {
        let elems: Vec<ValueRef> = (1..=4).map(Value::new_int).collect();
        let list = franz_runtime::list_from_array(elems.as_ptr(), 4);
        for v in elems {
            release(v);
        }
        let f = closure_new(
            fnp(acc_add_code as usize),
            std::ptr::null_mut(),
            franz_core::RET_INT,
        );
        let out = franz_runtime::list_reduce(
            list as i64,
            Tag::List as i32,
            f as i64,
            Tag::Closure as i32,
            0,
            Tag::Int as i32,
        );
        assert_eq!(unbox_int(out), 10);
        release(out);
        release(f);
        release(list);
    }
}

#[test]
fn test_match_scenario() {
    // (match (variant "Some" 42) "Some" {v -> <- v} "None" {-> <- 0})
    extern "C" fn first_field_code(a0: i64, _t0: i32) -> i64 {
        a0
    }
    unsafe {
        let tag = Value::new_str("Some".to_string());
        let fields = [ArgPair { bits: 42, tag: INT }];
        let v = franz_runtime::variant_new(tag as i64, Tag::Str as i32, fields.as_ptr(), 1);
        release(tag);

        let some = std::ffi::CString::new("Some").unwrap();
        assert_eq!(
            franz_runtime::variant_is(v as i64, Tag::List as i32, some.as_ptr()),
            1
        );

        let branch = closure_new(
            fnp(first_field_code as usize),
            std::ptr::null_mut(),
            franz_core::RET_INT,
        );
        let out = franz_runtime::variant_apply(
            v as i64,
            Tag::List as i32,
            branch as i64,
            Tag::Closure as i32,
        );
        assert_eq!(unbox_int(out), 42);
        release(out);
        release(branch);
        release(v);
    }
}
