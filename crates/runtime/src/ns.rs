//! Namespace registry
//!
//! Qualified names (`ns.member`) resolve against a process-wide registry of
//! NAMESPACE values seeded at startup with the standard namespaces. Each
//! namespace owns a scope of NATIVE bindings; the same registration call is
//! the seam a capability sandbox uses to grant an isolated scope only the
//! primitives it names.

use crate::error::{ErrorKind, raise};
use franz_core::{Scope, Value, ValueData, ValueRef, release, retain};
use std::cell::RefCell;
use std::collections::HashMap;
use std::ffi::CStr;

thread_local! {
    static REGISTRY: RefCell<HashMap<String, ValueRef>> = RefCell::new(HashMap::new());
}

/// Register a namespace value under a name, taking ownership of one scope
/// reference. Replaces any previous namespace of that name.
pub fn register_namespace(name: &str, scope: *mut Scope) {
    let ns = Value::new_namespace(scope);
    REGISTRY.with(|r| {
        if let Some(old) = r.borrow_mut().insert(name.to_string(), ns) {
            unsafe { release(old) };
        }
    });
}

/// Drop every registered namespace (driver teardown).
pub fn clear_namespaces() {
    REGISTRY.with(|r| {
        for (_, ns) in r.borrow_mut().drain() {
            unsafe { release(ns) };
        }
    });
}

/// Resolve a dotted `ns.member` name to a retained value.
///
/// Unknown namespace raises IMPORT; unknown member raises TYPE.
///
/// # Safety
/// `qualified` must be a NUL-terminated string of the form `ns.member`.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn franz_rt_qualified_get(qualified: *const libc::c_char) -> ValueRef {
    let full = unsafe { CStr::from_ptr(qualified) }.to_string_lossy();
    let Some((ns_name, member)) = full.split_once('.') else {
        raise(ErrorKind::Type, format!("bad qualified name {:?}", full));
        return Value::new_void();
    };

    REGISTRY.with(|r| {
        let registry = r.borrow();
        let Some(&ns) = registry.get(ns_name) else {
            raise(
                ErrorKind::Import,
                format!("unknown namespace {:?}", ns_name),
            );
            return Value::new_void();
        };
        let ValueData::Namespace(scope) = (unsafe { &(*ns).data }) else {
            raise(ErrorKind::Import, format!("{:?} is not a namespace", ns_name));
            return Value::new_void();
        };
        match unsafe { (**scope).lookup(member) } {
            Some(v) => unsafe { retain(v) },
            None => {
                raise(
                    ErrorKind::Type,
                    format!("namespace {:?} has no member {:?}", ns_name, member),
                );
                Value::new_void()
            }
        }
    })
}

// Standard namespaces

fn num_arg(args: *const ValueRef, argc: i64, index: usize, who: &str) -> Option<f64> {
    if index >= argc as usize {
        raise(
            ErrorKind::Arity,
            format!("{}: expected {} arguments, got {}", who, index + 1, argc),
        );
        return None;
    }
    match unsafe { &(**args.add(index)).data } {
        ValueData::Int(n) => Some(*n as f64),
        ValueData::Float(f) => Some(*f),
        _ => {
            raise(ErrorKind::Type, format!("{}: expected a number", who));
            None
        }
    }
}

/// Preserve integer results for integer-preserving operations.
fn num_result(f: f64, int_in: bool) -> ValueRef {
    if int_in && f.fract() == 0.0 && f.abs() <= i64::MAX as f64 {
        Value::new_int(f as i64)
    } else {
        Value::new_float(f)
    }
}

fn is_int(args: *const ValueRef, index: usize) -> bool {
    matches!(unsafe { &(**args.add(index)).data }, ValueData::Int(_))
}

unsafe extern "C" fn native_abs(args: *const ValueRef, argc: i64) -> ValueRef {
    match num_arg(args, argc, 0, "math.abs") {
        Some(f) => num_result(f.abs(), is_int(args, 0)),
        None => Value::new_void(),
    }
}

unsafe extern "C" fn native_floor(args: *const ValueRef, argc: i64) -> ValueRef {
    match num_arg(args, argc, 0, "math.floor") {
        Some(f) => Value::new_int(f.floor() as i64),
        None => Value::new_void(),
    }
}

unsafe extern "C" fn native_ceil(args: *const ValueRef, argc: i64) -> ValueRef {
    match num_arg(args, argc, 0, "math.ceil") {
        Some(f) => Value::new_int(f.ceil() as i64),
        None => Value::new_void(),
    }
}

unsafe extern "C" fn native_sqrt(args: *const ValueRef, argc: i64) -> ValueRef {
    match num_arg(args, argc, 0, "math.sqrt") {
        Some(f) => Value::new_float(f.sqrt()),
        None => Value::new_void(),
    }
}

unsafe extern "C" fn native_pow(args: *const ValueRef, argc: i64) -> ValueRef {
    match (
        num_arg(args, argc, 0, "math.pow"),
        num_arg(args, argc, 1, "math.pow"),
    ) {
        (Some(base), Some(exp)) => {
            num_result(base.powf(exp), is_int(args, 0) && is_int(args, 1) && exp >= 0.0)
        }
        _ => Value::new_void(),
    }
}

unsafe extern "C" fn native_min(args: *const ValueRef, argc: i64) -> ValueRef {
    match (
        num_arg(args, argc, 0, "math.min"),
        num_arg(args, argc, 1, "math.min"),
    ) {
        (Some(a), Some(b)) => num_result(a.min(b), is_int(args, 0) && is_int(args, 1)),
        _ => Value::new_void(),
    }
}

unsafe extern "C" fn native_max(args: *const ValueRef, argc: i64) -> ValueRef {
    match (
        num_arg(args, argc, 0, "math.max"),
        num_arg(args, argc, 1, "math.max"),
    ) {
        (Some(a), Some(b)) => num_result(a.max(b), is_int(args, 0) && is_int(args, 1)),
        _ => Value::new_void(),
    }
}

/// Seed the standard namespaces. Called once from `franz_rt_init`.
pub fn seed_namespaces() {
    let math = Scope::alloc(std::ptr::null_mut());
    unsafe {
        (*math).define("pi".to_string(), Value::new_float(std::f64::consts::PI), false);
        (*math).define("abs".to_string(), Value::new_native(native_abs), false);
        (*math).define("floor".to_string(), Value::new_native(native_floor), false);
        (*math).define("ceil".to_string(), Value::new_native(native_ceil), false);
        (*math).define("sqrt".to_string(), Value::new_native(native_sqrt), false);
        (*math).define("pow".to_string(), Value::new_native(native_pow), false);
        (*math).define("min".to_string(), Value::new_native(native_min), false);
        (*math).define("max".to_string(), Value::new_native(native_max), false);
    }
    register_namespace("math", math);

    let str_ns = Scope::alloc(std::ptr::null_mut());
    unsafe {
        (*str_ns).define(
            "upper".to_string(),
            Value::new_native(crate::strings::native_str_upper),
            false,
        );
        (*str_ns).define(
            "lower".to_string(),
            Value::new_native(crate::strings::native_str_lower),
            false,
        );
        (*str_ns).define(
            "trim".to_string(),
            Value::new_native(crate::strings::native_str_trim),
            false,
        );
    }
    register_namespace("str", str_ns);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::boxing::franz_rt_unbox_int;
    use std::ffi::CString;

    #[test]
    fn test_qualified_lookup_and_native_call() {
        seed_namespaces();
        unsafe {
            let name = CString::new("math.abs").unwrap();
            let f = franz_rt_qualified_get(name.as_ptr());
            assert_eq!((*f).tag(), franz_core::Tag::Native);

            let arg = Value::new_int(-5);
            let args = [arg];
            let out = match &(*f).data {
                ValueData::Native(native) => native(args.as_ptr(), 1),
                _ => unreachable!(),
            };
            assert_eq!(franz_rt_unbox_int(out), 5);
            release(out);
            release(arg);
            release(f);
        }
        clear_namespaces();
    }

    #[test]
    fn test_namespace_constant() {
        seed_namespaces();
        unsafe {
            let name = CString::new("math.pi").unwrap();
            let v = franz_rt_qualified_get(name.as_ptr());
            assert_eq!((*v).tag(), franz_core::Tag::Float);
            release(v);
        }
        clear_namespaces();
    }
}
