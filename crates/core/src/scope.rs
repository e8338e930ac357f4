//! Scopes
//!
//! An ordered array of bindings plus a parent pointer, refcounted so a scope
//! can outlive the activation that created it. Lookup walks the parent chain;
//! update mutates the nearest enclosing binding and fails on non-mutable
//! names. NAMESPACE values own a scope, and the capability-seeding interface
//! pre-populates scopes with NATIVE bindings.

use crate::value::{ValueRef, release};
use std::cell::Cell;

#[derive(Debug)]
pub struct Binding {
    pub name: String,
    pub value: ValueRef,
    pub mutable: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdateError {
    NotFound,
    Immutable,
}

#[derive(Debug)]
pub struct Scope {
    bindings: Vec<Binding>,
    parent: *mut Scope,
    refcount: Cell<u32>,
}

impl Scope {
    /// Allocate a scope holding one reference to `parent` (null for roots).
    pub fn alloc(parent: *mut Scope) -> *mut Scope {
        if !parent.is_null() {
            unsafe { scope_retain(parent) };
        }
        Box::into_raw(Box::new(Scope {
            bindings: Vec::new(),
            parent,
            refcount: Cell::new(1),
        }))
    }

    pub fn bindings(&self) -> &[Binding] {
        &self.bindings
    }

    /// Add a binding, taking ownership of `value`. Shadows any earlier
    /// binding of the same name in this scope.
    pub fn define(&mut self, name: String, value: ValueRef, mutable: bool) {
        self.bindings.push(Binding {
            name,
            value,
            mutable,
        });
    }

    /// Borrowed lookup, walking the parent chain. Later bindings shadow
    /// earlier ones.
    ///
    /// # Safety
    /// The parent chain must be live.
    pub unsafe fn lookup(&self, name: &str) -> Option<ValueRef> {
        if let Some(b) = self.bindings.iter().rev().find(|b| b.name == name) {
            return Some(b.value);
        }
        if self.parent.is_null() {
            return None;
        }
        unsafe { (*self.parent).lookup(name) }
    }

    /// Replace the nearest enclosing binding, taking ownership of `value`.
    /// The old value is released. Fails without consuming `value` when the
    /// name is unbound or the binding is not mutable.
    ///
    /// # Safety
    /// The parent chain must be live; `value` must be owned by the caller.
    pub unsafe fn update(&mut self, name: &str, value: ValueRef) -> Result<(), UpdateError> {
        if let Some(b) = self.bindings.iter_mut().rev().find(|b| b.name == name) {
            if !b.mutable {
                return Err(UpdateError::Immutable);
            }
            unsafe { release(b.value) };
            b.value = value;
            return Ok(());
        }
        if self.parent.is_null() {
            return Err(UpdateError::NotFound);
        }
        unsafe { (*self.parent).update(name, value) }
    }

    /// Downgrade a binding in this scope to immutable.
    pub fn freeze(&mut self, name: &str) -> bool {
        if let Some(b) = self.bindings.iter_mut().rev().find(|b| b.name == name) {
            b.mutable = false;
            return true;
        }
        false
    }
}

/// # Safety
/// `s` must be a live scope.
pub unsafe fn scope_retain(s: *mut Scope) {
    let scope = unsafe { &*s };
    scope.refcount.set(scope.refcount.get() + 1);
}

/// Decrement; at zero, release all binding values and the parent reference.
///
/// # Safety
/// `s` must be a live scope owned by the caller.
pub unsafe fn scope_release(s: *mut Scope) {
    let scope = unsafe { &*s };
    let rc = scope.refcount.get();
    debug_assert!(rc > 0, "release on dead scope");
    if rc > 1 {
        scope.refcount.set(rc - 1);
        return;
    }
    let boxed = unsafe { Box::from_raw(s) };
    for b in &boxed.bindings {
        unsafe { release(b.value) };
    }
    if !boxed.parent.is_null() {
        unsafe { scope_release(boxed.parent) };
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::{Value, retain, value_eq, values_live};

    #[test]
    fn test_lookup_walks_parent_chain() {
        unsafe {
            let root = Scope::alloc(std::ptr::null_mut());
            (*root).define("x".to_string(), Value::new_int(1), false);
            let child = Scope::alloc(root);
            (*child).define("y".to_string(), Value::new_int(2), false);

            assert!((*child).lookup("x").is_some());
            assert!((*child).lookup("y").is_some());
            assert!((*root).lookup("y").is_none());
            assert!((*child).lookup("z").is_none());

            scope_release(child);
            scope_release(root);
        }
    }

    #[test]
    fn test_update_respects_mutability() {
        unsafe {
            let s = Scope::alloc(std::ptr::null_mut());
            (*s).define("a".to_string(), Value::new_int(1), true);
            (*s).define("b".to_string(), Value::new_int(2), false);

            assert_eq!((*s).update("a", Value::new_int(10)), Ok(()));
            let ten = Value::new_int(10);
            assert!(value_eq((*s).lookup("a").unwrap(), ten));
            release(ten);

            let v = Value::new_int(20);
            assert_eq!((*s).update("b", retain(v)), Err(UpdateError::Immutable));
            // a failed update does not consume its argument
            release(v);
            release(v);

            scope_release(s);
        }
    }

    #[test]
    fn test_freeze_downgrades() {
        unsafe {
            let s = Scope::alloc(std::ptr::null_mut());
            (*s).define("m".to_string(), Value::new_int(1), true);
            assert!((*s).freeze("m"));
            assert_eq!(
                (*s).update("m", Value::new_int(2)),
                Err(UpdateError::Immutable)
            );
            assert!(!(*s).freeze("missing"));
            scope_release(s);
        }
    }

    #[test]
    fn test_release_frees_bindings() {
        let before = values_live();
        unsafe {
            let root = Scope::alloc(std::ptr::null_mut());
            (*root).define("x".to_string(), Value::new_int(1), false);
            let child = Scope::alloc(root);
            (*child).define("y".to_string(), Value::new_str("s".to_string()), false);
            scope_release(root);
            // child still holds the parent alive
            assert!((*child).lookup("x").is_some());
            scope_release(child);
        }
        assert_eq!(values_live(), before);
    }
}
