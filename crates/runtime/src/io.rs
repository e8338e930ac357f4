//! File and console I/O collaborators
//!
//! Thin wrappers: the language core treats these as opaque blocking
//! operations. Failures raise IO errors through the shared error state.

use crate::boxing::pair_to_string;
use crate::error::{ErrorKind, raise};
use franz_core::{Tag, Value, ValueData, ValueRef};
use std::io::BufRead;

unsafe fn path_arg<'a>(bits: i64, tag: i32, who: &str) -> Option<&'a str> {
    if tag == Tag::Str as i32
        && let ValueData::Str(s) = unsafe { &(*(bits as ValueRef)).data }
    {
        return Some(s.as_str());
    }
    raise(ErrorKind::Type, format!("{}: path must be a string", who));
    None
}

/// Read a whole file into a string value; IO error on failure.
///
/// # Safety
/// The pair must be honest.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn franz_rt_read_file(bits: i64, tag: i32) -> ValueRef {
    let Some(path) = (unsafe { path_arg(bits, tag, "read_file") }) else {
        return Value::new_void();
    };
    match std::fs::read_to_string(path) {
        Ok(content) => Value::new_str(content),
        Err(e) => {
            raise(ErrorKind::Io, format!("read_file: {}: {}", path, e));
            Value::new_void()
        }
    }
}

/// Write a value's printed form to a file; IO error on failure. Returns
/// void.
///
/// # Safety
/// Pairs must be honest.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn franz_rt_write_file(
    p_bits: i64,
    p_tag: i32,
    c_bits: i64,
    c_tag: i32,
) -> ValueRef {
    let Some(path) = (unsafe { path_arg(p_bits, p_tag, "write_file") }) else {
        return Value::new_void();
    };
    let content = unsafe { pair_to_string(c_bits, c_tag) };
    if let Err(e) = std::fs::write(path, content) {
        raise(ErrorKind::Io, format!("write_file: {}: {}", path, e));
    }
    Value::new_void()
}

/// Read one line from standard input (without the newline). EOF yields an
/// empty string.
#[unsafe(no_mangle)]
pub extern "C" fn franz_rt_input() -> ValueRef {
    let mut line = String::new();
    match std::io::stdin().lock().read_line(&mut line) {
        Ok(_) => {
            while line.ends_with('\n') || line.ends_with('\r') {
                line.pop();
            }
            Value::new_str(line)
        }
        Err(e) => {
            raise(ErrorKind::Io, format!("input: {}", e));
            Value::new_void()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use franz_core::{release, value_eq};
    use std::io::Write;

    #[test]
    fn test_read_file_roundtrip() {
        unsafe {
            let mut tmp = tempfile::NamedTempFile::new().unwrap();
            write!(tmp, "hello franz").unwrap();
            let path = Value::new_str(tmp.path().to_string_lossy().into_owned());
            let out = franz_rt_read_file(path as i64, Tag::Str as i32);
            let expected = Value::new_str("hello franz".to_string());
            assert!(value_eq(out, expected));
            release(expected);
            release(out);
            release(path);
        }
    }

    #[test]
    fn test_write_file() {
        unsafe {
            let dir = tempfile::tempdir().unwrap();
            let file = dir.path().join("out.txt");
            let path = Value::new_str(file.to_string_lossy().into_owned());
            let content = Value::new_str("data".to_string());
            let void = franz_rt_write_file(
                path as i64,
                Tag::Str as i32,
                content as i64,
                Tag::Str as i32,
            );
            release(void);
            assert_eq!(std::fs::read_to_string(&file).unwrap(), "data");
            release(content);
            release(path);
        }
    }
}
