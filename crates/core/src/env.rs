//! Closure environment blocks
//!
//! A closure environment is a by-value snapshot of the function's free
//! variables, laid out as a raw heap block that generated code reads with
//! fixed offsets:
//!
//! ```text
//! offset 0:          len (u64)
//! offset 8 + 16*i:   slot i bits (u64)
//! offset 16 + 16*i:  slot i tag  (u64)
//! ```
//!
//! A slot holds either a raw primitive (tags Int/Float/Void) or a `ValueRef`
//! in its bits. Slot writes through the runtime retain pointer payloads;
//! `env_release` releases them when the owning closure dies.

use crate::value::{Tag, ValueRef, release};
use std::alloc::{Layout, alloc_zeroed, dealloc};

#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct EnvSlot {
    pub bits: u64,
    pub tag: u64,
}

#[repr(C)]
#[derive(Debug)]
pub struct EnvHeader {
    pub len: u64,
    // slots follow inline
}

fn env_layout(len: usize) -> Layout {
    Layout::from_size_align(8 + 16 * len, 8).expect("env layout")
}

/// Allocate a zeroed environment of `len` slots. Zero bits with tag 0 (Int)
/// are harmless placeholders; every slot is overwritten at the capture site.
pub fn env_alloc(len: usize) -> *mut EnvHeader {
    unsafe {
        let ptr = alloc_zeroed(env_layout(len)) as *mut EnvHeader;
        (*ptr).len = len as u64;
        ptr
    }
}

/// # Safety
/// `env` must come from `env_alloc` and `index` must be in bounds.
pub unsafe fn env_slot(env: *mut EnvHeader, index: usize) -> *mut EnvSlot {
    debug_assert!(index < unsafe { (*env).len } as usize);
    unsafe { (env as *mut u8).add(8 + 16 * index) as *mut EnvSlot }
}

/// Mechanical slot store; refcounting is the caller's contract.
///
/// # Safety
/// `env` must come from `env_alloc` and `index` must be in bounds.
pub unsafe fn env_slot_set(env: *mut EnvHeader, index: usize, bits: u64, tag: u64) {
    unsafe {
        *env_slot(env, index) = EnvSlot { bits, tag };
    }
}

/// # Safety
/// `env` must come from `env_alloc`.
pub unsafe fn env_len(env: *const EnvHeader) -> usize {
    unsafe { (*env).len as usize }
}

/// Release every pointer-tagged slot, then free the block.
///
/// # Safety
/// `env` must come from `env_alloc` and must not be used afterwards.
pub unsafe fn env_release(env: *mut EnvHeader) {
    unsafe {
        let len = (*env).len as usize;
        for i in 0..len {
            let slot = *env_slot(env, i);
            if let Some(tag) = Tag::from_i64(slot.tag as i64)
                && tag.is_pointer()
            {
                release(slot.bits as ValueRef);
            }
        }
        dealloc(env as *mut u8, env_layout(len));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::{Value, retain, values_live};

    #[test]
    fn test_alloc_and_len() {
        let env = env_alloc(3);
        unsafe {
            assert_eq!(env_len(env), 3);
            env_release(env);
        }
    }

    #[test]
    fn test_slot_offsets_match_codegen() {
        // Generated IR loads bits at 8 + 16*i and tags at 16 + 16*i.
        let env = env_alloc(2);
        unsafe {
            env_slot_set(env, 0, 42, Tag::Int as u64);
            env_slot_set(env, 1, 7, Tag::Int as u64);
            let base = env as *const u8;
            assert_eq!(*(base.add(8) as *const u64), 42);
            assert_eq!(*(base.add(16) as *const u64), Tag::Int as u64);
            assert_eq!(*(base.add(24) as *const u64), 7);
            env_release(env);
        }
    }

    #[test]
    fn test_release_frees_pointer_slots() {
        let before = values_live();
        unsafe {
            let v = Value::new_str("captured".to_string());
            let env = env_alloc(1);
            env_slot_set(env, 0, retain(v) as u64, Tag::Str as u64);
            crate::value::release(v);
            env_release(env);
        }
        assert_eq!(values_live(), before);
    }
}
