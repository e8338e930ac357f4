//! Printing
//!
//! `print`/`println` lower to one call per argument plus separator calls, so
//! raw operands never need boxing just to be printed. Strings print bare at
//! the top level and quoted inside collections (see `franz_core::format_value`).

use crate::boxing::pair_to_string;
use std::io::Write;

fn write_str(s: &str) {
    let mut out = std::io::stdout().lock();
    let _ = out.write_all(s.as_bytes());
}

/// Print one value pair without a trailing newline.
///
/// # Safety
/// The pair must be honest.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn franz_rt_print(bits: i64, tag: i32) {
    let s = unsafe { pair_to_string(bits, tag) };
    write_str(&s);
}

/// Argument separator.
#[unsafe(no_mangle)]
pub extern "C" fn franz_rt_print_space() {
    write_str(" ");
}

/// Statement terminator for `println`.
#[unsafe(no_mangle)]
pub extern "C" fn franz_rt_print_newline() {
    write_str("\n");
    let _ = std::io::stdout().lock().flush();
}
