//! Reference cells
//!
//! The only user-visible mutable runtime state. A cell owns its inner value;
//! `get` hands out a retained copy, `set` replaces the held value and
//! releases the old one.
//!
//! Environments snapshot by value, so the capture graph is acyclic — except
//! for one shape: a closure stored into a cell whose pointer the closure's
//! own environment (transitively) holds. Such a store is kept weak: the cell
//! records the pointer without owning a reference, so the cycle cannot keep
//! both allocations alive forever. A weakly held value must stay alive
//! through its other owner (the binding or environment that closed over the
//! cell); reading it after that owner dies is a caller error.

use crate::env::{env_len, env_slot};
use crate::value::{Tag, Value, ValueData, ValueRef, release, retain};
use std::cell::Cell;

#[derive(Debug)]
pub struct RefCellData {
    value: Cell<ValueRef>,
    weak: Cell<bool>,
}

impl RefCellData {
    /// Takes ownership of `inner`.
    pub fn new(inner: ValueRef) -> RefCellData {
        RefCellData {
            value: Cell::new(inner),
            weak: Cell::new(false),
        }
    }

    /// Borrowed peek at the held value.
    pub fn value(&self) -> ValueRef {
        self.value.get()
    }

    pub fn is_weak(&self) -> bool {
        self.weak.get()
    }

    /// Retained copy of the held value.
    ///
    /// # Safety
    /// The held value must be live (weak-held values must still have an
    /// outside owner).
    pub unsafe fn get(&self) -> ValueRef {
        unsafe { retain(self.value.get()) }
    }

    /// Replace the held value, taking ownership of `new`.
    ///
    /// `owner` is the value that contains this cell; if `new` can reach it,
    /// the store is made weak and the incoming reference is released.
    ///
    /// # Safety
    /// `owner` and `new` must be live; `new` must be owned by the caller.
    pub unsafe fn set(&self, owner: ValueRef, new: ValueRef) {
        let old = self.value.get();
        let old_weak = self.weak.get();
        let cyclic = unsafe { reaches(new, owner, &mut Vec::new()) };
        if cyclic {
            self.weak.set(true);
            unsafe { release(new) };
        } else {
            self.weak.set(false);
        }
        self.value.set(new);
        if !old_weak {
            unsafe { release(old) };
        }
    }
}

impl Drop for RefCellData {
    fn drop(&mut self) {
        if !self.weak.get() {
            unsafe { release(self.value.get()) };
        }
    }
}

/// Whether `target` is reachable from `start` through the value graph.
///
/// Walks lists, dicts, refs, namespaces and closure environments. `visited`
/// guards against ref-chain loops.
///
/// # Safety
/// All reachable values must be live.
unsafe fn reaches(start: ValueRef, target: ValueRef, visited: &mut Vec<*const Value>) -> bool {
    if std::ptr::eq(start, target) {
        return true;
    }
    if visited.contains(&(start as *const Value)) {
        return false;
    }
    visited.push(start);
    let val = unsafe { &*start };
    match &val.data {
        ValueData::List(list) => list
            .iter()
            .any(|&e| unsafe { reaches(e, target, visited) }),
        ValueData::Dict(dict) => dict.iter().any(|(k, v)| unsafe {
            reaches(k, target, visited) || reaches(v, target, visited)
        }),
        ValueData::Ref(cell) => unsafe { reaches(cell.value(), target, visited) },
        ValueData::Namespace(scope) => {
            let scope = unsafe { &**scope };
            scope
                .bindings()
                .iter()
                .any(|b| unsafe { reaches(b.value, target, visited) })
        }
        ValueData::Closure(record) => {
            if record.env.is_null() {
                return false;
            }
            let len = unsafe { env_len(record.env) };
            for i in 0..len {
                let slot = unsafe { *env_slot(record.env, i) };
                if let Some(tag) = Tag::from_i64(slot.tag as i64)
                    && tag.is_pointer()
                    && unsafe { reaches(slot.bits as ValueRef, target, visited) }
                {
                    return true;
                }
            }
            false
        }
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::env::{env_alloc, env_slot_set};
    use crate::value::{ClosureRecord, values_live};

    #[test]
    fn test_get_returns_retained_copy() {
        unsafe {
            let inner = Value::new_int(5);
            let cell = Value::new_ref(retain(inner));
            let ValueData::Ref(ref data) = (*cell).data else {
                panic!("expected ref");
            };
            let copy = data.get();
            assert_eq!((*copy).refcount(), 3);
            release(copy);
            release(cell);
            release(inner);
        }
    }

    #[test]
    fn test_set_releases_old_value() {
        let before = values_live();
        unsafe {
            let cell = Value::new_ref(Value::new_int(1));
            let ValueData::Ref(ref data) = (*cell).data else {
                panic!("expected ref");
            };
            data.set(cell, Value::new_int(2));
            release(cell);
        }
        assert_eq!(values_live(), before);
    }

    #[test]
    fn test_self_referential_closure_stored_weakly() {
        let before = values_live();
        unsafe {
            let cell = Value::new_ref(Value::new_void());
            // Closure whose environment captured the cell itself.
            let env = env_alloc(1);
            env_slot_set(env, 0, retain(cell) as u64, Tag::Ref as u64);
            let closure = Value::new_closure(ClosureRecord {
                func: 0x1000 as *const u8,
                env,
                return_tag: crate::value::RET_VOID,
            });
            let ValueData::Ref(ref data) = (*cell).data else {
                panic!("expected ref");
            };
            data.set(cell, retain(closure));
            assert!(data.is_weak());
            release(closure);
            release(cell);
        }
        assert_eq!(values_live(), before);
    }

    #[test]
    fn test_acyclic_store_stays_strong() {
        unsafe {
            let cell = Value::new_ref(Value::new_void());
            let ValueData::Ref(ref data) = (*cell).data else {
                panic!("expected ref");
            };
            data.set(cell, Value::new_int(9));
            assert!(!data.is_weak());
            release(cell);
        }
    }
}
