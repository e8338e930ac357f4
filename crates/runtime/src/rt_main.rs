//! Process lifecycle
//!
//! Generated main functions open with `franz_rt_init` (argv capture,
//! namespace seeding) and close with `franz_rt_shutdown` (registry
//! teardown, optional leak report). Program arguments are exposed through
//! `arg_count`/`arg_at`.

use crate::error::{ErrorKind, raise};
use franz_core::{Value, ValueRef, values_live};
use std::cell::RefCell;
use std::ffi::CStr;

thread_local! {
    static ARGS: RefCell<Vec<String>> = const { RefCell::new(Vec::new()) };
}

/// Initialize the runtime: capture program arguments (skipping argv[0]) and
/// seed the standard namespaces.
///
/// # Safety
/// `argv` must point to `argc` NUL-terminated strings.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn franz_rt_init(argc: i32, argv: *const *const libc::c_char) {
    let mut args = Vec::new();
    for i in 1..argc as usize {
        let ptr = unsafe { *argv.add(i) };
        if ptr.is_null() {
            break;
        }
        args.push(unsafe { CStr::from_ptr(ptr) }.to_string_lossy().into_owned());
    }
    ARGS.with(|a| *a.borrow_mut() = args);
    crate::ns::seed_namespaces();
}

/// Tear down process-wide state. With `FRANZ_RT_LEAK_CHECK` set, report any
/// value allocations still live after teardown.
#[unsafe(no_mangle)]
pub extern "C" fn franz_rt_shutdown() {
    crate::ns::clear_namespaces();
    ARGS.with(|a| a.borrow_mut().clear());
    if std::env::var_os("FRANZ_RT_LEAK_CHECK").is_some() {
        let live = values_live();
        if live > 0 {
            eprintln!("franz-runtime: {} value(s) still allocated at exit", live);
        }
    }
}

/// Number of program arguments.
#[unsafe(no_mangle)]
pub extern "C" fn franz_rt_arg_count() -> i64 {
    ARGS.with(|a| a.borrow().len() as i64)
}

/// Program argument at an index, as a string value; RANGE error out of
/// bounds.
#[unsafe(no_mangle)]
pub extern "C" fn franz_rt_arg_at(index: i64) -> ValueRef {
    ARGS.with(|a| {
        let args = a.borrow();
        if index < 0 || index as usize >= args.len() {
            raise(
                ErrorKind::Range,
                format!("arg: index {} out of range for length {}", index, args.len()),
            );
            return Value::new_void();
        }
        Value::new_str(args[index as usize].clone())
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use franz_core::release;

    #[test]
    fn test_args_capture_skips_argv0() {
        unsafe {
            let prog = std::ffi::CString::new("franz-program").unwrap();
            let a1 = std::ffi::CString::new("alpha").unwrap();
            let a2 = std::ffi::CString::new("beta").unwrap();
            let argv = [prog.as_ptr(), a1.as_ptr(), a2.as_ptr()];
            franz_rt_init(3, argv.as_ptr());

            assert_eq!(franz_rt_arg_count(), 2);
            let v = franz_rt_arg_at(0);
            let expected = Value::new_str("alpha".to_string());
            assert!(franz_core::value_eq(v, expected));
            release(expected);
            release(v);

            franz_rt_shutdown();
            assert_eq!(franz_rt_arg_count(), 0);
        }
    }
}
