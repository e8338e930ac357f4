//! The universal value
//!
//! Every Franz value is a heap-allocated, refcounted tagged record. Compiled
//! code and the runtime library pass values as raw `*mut Value` pointers; all
//! structural access goes through accessors, never through layout assumptions.
//! The only layout-coupled types are [`ClosureRecord`] and the environment
//! block (see `env.rs`), which generated IR reads with fixed offsets.

use crate::dict::Dict;
use crate::env::env_release;
use crate::list::List;
use crate::refcell::RefCellData;
use crate::scope::{Scope, scope_release};
use std::cell::Cell;
use std::sync::atomic::{AtomicUsize, Ordering};

/// Shared pointer to a universal value.
pub type ValueRef = *mut Value;

/// Native function: receives an argument array and its length, returns an
/// owned value reference.
pub type NativeFn = unsafe extern "C" fn(args: *const ValueRef, argc: i64) -> ValueRef;

/// Value type tags.
///
/// The discriminants are shared verbatim with the lowering engine (it emits
/// them as the i32 type tags accompanying every call-site argument) and with
/// the environment slot tags. Do not renumber.
#[repr(i64)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tag {
    Int = 0,
    Float = 1,
    Str = 2,
    Void = 3,
    Native = 4,
    List = 5,
    Dict = 6,
    Namespace = 7,
    Closure = 8,
    Ref = 9,
}

impl Tag {
    /// Decode a raw tag number. Unknown numbers are a caller bug.
    pub fn from_i64(n: i64) -> Option<Tag> {
        Some(match n {
            0 => Tag::Int,
            1 => Tag::Float,
            2 => Tag::Str,
            3 => Tag::Void,
            4 => Tag::Native,
            5 => Tag::List,
            6 => Tag::Dict,
            7 => Tag::Namespace,
            8 => Tag::Closure,
            9 => Tag::Ref,
            _ => return None,
        })
    }

    /// Whether a (bits, tag) pair at the ABI boundary carries a `ValueRef`
    /// in its bits rather than a raw primitive.
    pub fn is_pointer(self) -> bool {
        !matches!(self, Tag::Int | Tag::Float | Tag::Void)
    }
}

/// Return tags stored in the third field of a [`ClosureRecord`].
///
/// Every compiled function returns 64 bits; the return tag tells the caller
/// how to interpret them. Fixed numbering, shared with the lowering engine.
pub const RET_INT: i64 = 0;
pub const RET_FLOAT: i64 = 1;
pub const RET_POINTER: i64 = 2;
pub const RET_CLOSURE: i64 = 3;
pub const RET_VOID: i64 = 4;

/// The on-heap closure handle produced for every compiled function value.
///
/// Layout is fixed (`{ ptr, ptr, i64 }` in IR terms) and read directly by
/// generated call sites: `func` at offset 0, `env` at 8, `return_tag` at 16.
/// `env` is null for non-capturing functions.
#[repr(C)]
#[derive(Debug)]
pub struct ClosureRecord {
    pub func: *const u8,
    pub env: *mut crate::env::EnvHeader,
    pub return_tag: i64,
}

impl Drop for ClosureRecord {
    fn drop(&mut self) {
        if !self.env.is_null() {
            unsafe { env_release(self.env) };
        }
    }
}

/// Tag-specific payload of a value.
#[derive(Debug)]
pub enum ValueData {
    Int(i64),
    Float(f64),
    Str(String),
    Void,
    Native(NativeFn),
    List(List),
    Dict(Dict),
    Namespace(*mut Scope),
    Closure(ClosureRecord),
    Ref(RefCellData),
}

/// Count of currently live value allocations.
///
/// Supports the conservation check: after driver teardown this must be zero.
static LIVE_VALUES: AtomicUsize = AtomicUsize::new(0);

/// Number of values currently allocated and not yet released to zero.
pub fn values_live() -> usize {
    LIVE_VALUES.load(Ordering::Relaxed)
}

/// A universal value: refcount + mutability + tagged payload.
///
/// Single-threaded by design; the refcount is a plain `Cell`.
#[derive(Debug)]
pub struct Value {
    refcount: Cell<u32>,
    pub mutable: bool,
    pub data: ValueData,
}

impl Value {
    fn alloc(data: ValueData) -> ValueRef {
        LIVE_VALUES.fetch_add(1, Ordering::Relaxed);
        Box::into_raw(Box::new(Value {
            refcount: Cell::new(1),
            mutable: false,
            data,
        }))
    }

    pub fn new_int(n: i64) -> ValueRef {
        Self::alloc(ValueData::Int(n))
    }

    pub fn new_float(f: f64) -> ValueRef {
        Self::alloc(ValueData::Float(f))
    }

    pub fn new_str(s: String) -> ValueRef {
        Self::alloc(ValueData::Str(s))
    }

    pub fn new_void() -> ValueRef {
        Self::alloc(ValueData::Void)
    }

    pub fn new_native(f: NativeFn) -> ValueRef {
        Self::alloc(ValueData::Native(f))
    }

    pub fn new_list(list: List) -> ValueRef {
        Self::alloc(ValueData::List(list))
    }

    pub fn new_dict(dict: Dict) -> ValueRef {
        Self::alloc(ValueData::Dict(dict))
    }

    /// Takes ownership of one scope reference.
    pub fn new_namespace(scope: *mut Scope) -> ValueRef {
        Self::alloc(ValueData::Namespace(scope))
    }

    pub fn new_closure(record: ClosureRecord) -> ValueRef {
        Self::alloc(ValueData::Closure(record))
    }

    /// Takes ownership of the inner reference.
    pub fn new_ref(inner: ValueRef) -> ValueRef {
        Self::alloc(ValueData::Ref(RefCellData::new(inner)))
    }

    pub fn tag(&self) -> Tag {
        match self.data {
            ValueData::Int(_) => Tag::Int,
            ValueData::Float(_) => Tag::Float,
            ValueData::Str(_) => Tag::Str,
            ValueData::Void => Tag::Void,
            ValueData::Native(_) => Tag::Native,
            ValueData::List(_) => Tag::List,
            ValueData::Dict(_) => Tag::Dict,
            ValueData::Namespace(_) => Tag::Namespace,
            ValueData::Closure(_) => Tag::Closure,
            ValueData::Ref(_) => Tag::Ref,
        }
    }

    pub fn refcount(&self) -> u32 {
        self.refcount.get()
    }
}

impl Drop for Value {
    fn drop(&mut self) {
        // List, Dict, RefCellData and ClosureRecord release their children in
        // their own Drop impls; namespaces hold a counted scope reference.
        if let ValueData::Namespace(scope) = &self.data {
            unsafe { scope_release(*scope) };
        }
    }
}

/// Increment the refcount and hand the pointer back.
///
/// # Safety
/// `v` must point to a live value.
pub unsafe fn retain(v: ValueRef) -> ValueRef {
    let val = unsafe { &*v };
    val.refcount.set(val.refcount.get() + 1);
    v
}

/// Decrement the refcount; at zero, run the tag-specific destructor and free.
///
/// # Safety
/// `v` must point to a live value owned by the caller.
pub unsafe fn release(v: ValueRef) {
    let val = unsafe { &*v };
    let rc = val.refcount.get();
    debug_assert!(rc > 0, "release on dead value");
    if rc > 1 {
        val.refcount.set(rc - 1);
        return;
    }
    LIVE_VALUES.fetch_sub(1, Ordering::Relaxed);
    drop(unsafe { Box::from_raw(v) });
}

/// Structural equality.
///
/// Int and Float compare as real numbers; strings compare byte-wise; lists
/// and dicts compare recursively; callables, namespaces and refs compare by
/// identity.
///
/// # Safety
/// Both pointers must be live values.
pub unsafe fn value_eq(a: ValueRef, b: ValueRef) -> bool {
    if std::ptr::eq(a, b) {
        return true;
    }
    let (va, vb) = unsafe { (&*a, &*b) };
    match (&va.data, &vb.data) {
        (ValueData::Int(x), ValueData::Int(y)) => x == y,
        (ValueData::Float(x), ValueData::Float(y)) => x == y,
        (ValueData::Int(x), ValueData::Float(y)) | (ValueData::Float(y), ValueData::Int(x)) => {
            (*x as f64) == *y
        }
        (ValueData::Str(x), ValueData::Str(y)) => x == y,
        (ValueData::Void, ValueData::Void) => true,
        (ValueData::List(x), ValueData::List(y)) => {
            x.len() == y.len()
                && x.iter()
                    .zip(y.iter())
                    .all(|(ea, eb)| unsafe { value_eq(*ea, *eb) })
        }
        (ValueData::Dict(x), ValueData::Dict(y)) => {
            x.len() == y.len()
                && x.iter().all(|(k, v)| match unsafe { y.get(k) } {
                    Some(other) => unsafe { value_eq(v, other) },
                    None => false,
                })
        }
        // Different tags (outside numeric promotion) or identity-compared
        // kinds that were not pointer-equal.
        _ => false,
    }
}

/// Render a value for printing.
///
/// Top-level strings print bare; strings nested inside collections are
/// quoted so list/dict dumps stay readable.
///
/// # Safety
/// `v` must be a live value.
pub unsafe fn format_value(v: ValueRef) -> String {
    unsafe { format_inner(v, false) }
}

unsafe fn format_inner(v: ValueRef, nested: bool) -> String {
    let val = unsafe { &*v };
    match &val.data {
        ValueData::Int(n) => n.to_string(),
        ValueData::Float(f) => {
            if f.fract() == 0.0 && f.is_finite() {
                format!("{:.1}", f)
            } else {
                format!("{}", f)
            }
        }
        ValueData::Str(s) => {
            if nested {
                format!("\"{}\"", s)
            } else {
                s.clone()
            }
        }
        ValueData::Void => "void".to_string(),
        ValueData::Native(_) => "[NativeFunction]".to_string(),
        ValueData::List(list) => {
            let parts: Vec<String> = list
                .iter()
                .map(|e| unsafe { format_inner(*e, true) })
                .collect();
            format!("[{}]", parts.join(", "))
        }
        ValueData::Dict(dict) => {
            let parts: Vec<String> = dict
                .iter()
                .map(|(k, v)| {
                    format!("{}: {}", unsafe { format_inner(k, true) }, unsafe {
                        format_inner(v, true)
                    })
                })
                .collect();
            format!("{{{}}}", parts.join(", "))
        }
        ValueData::Namespace(_) => "[Namespace]".to_string(),
        ValueData::Closure(_) => "[Closure]".to_string(),
        ValueData::Ref(cell) => {
            format!("[Ref: {}]", unsafe { format_inner(cell.value(), true) })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tag_numbering_is_stable() {
        // The lowering engine hard-codes these numbers.
        assert_eq!(Tag::Int as i64, 0);
        assert_eq!(Tag::Float as i64, 1);
        assert_eq!(Tag::Str as i64, 2);
        assert_eq!(Tag::Void as i64, 3);
        assert_eq!(Tag::Native as i64, 4);
        assert_eq!(Tag::List as i64, 5);
        assert_eq!(Tag::Dict as i64, 6);
        assert_eq!(Tag::Namespace as i64, 7);
        assert_eq!(Tag::Closure as i64, 8);
        assert_eq!(Tag::Ref as i64, 9);
    }

    #[test]
    fn test_closure_record_layout() {
        use std::mem::{align_of, size_of};
        // Generated IR reads { ptr, ptr, i64 } with fixed offsets.
        assert_eq!(size_of::<ClosureRecord>(), 24);
        assert_eq!(align_of::<ClosureRecord>(), 8);
        assert_eq!(std::mem::offset_of!(ClosureRecord, func), 0);
        assert_eq!(std::mem::offset_of!(ClosureRecord, env), 8);
        assert_eq!(std::mem::offset_of!(ClosureRecord, return_tag), 16);
    }

    #[test]
    fn test_retain_release_conservation() {
        let before = values_live();
        unsafe {
            let v = Value::new_int(42);
            assert_eq!((*v).refcount(), 1);
            retain(v);
            assert_eq!((*v).refcount(), 2);
            release(v);
            assert_eq!((*v).refcount(), 1);
            release(v);
        }
        assert_eq!(values_live(), before);
    }

    #[test]
    fn test_numeric_promotion_equality() {
        unsafe {
            let i = Value::new_int(3);
            let f = Value::new_float(3.0);
            let g = Value::new_float(3.5);
            // reflexive, symmetric across promotion
            assert!(value_eq(i, i));
            assert!(value_eq(i, f));
            assert!(value_eq(f, i));
            assert!(!value_eq(i, g));
            release(i);
            release(f);
            release(g);
        }
    }

    #[test]
    fn test_cross_tag_inequality() {
        unsafe {
            let i = Value::new_int(3);
            let s = Value::new_str("3".to_string());
            assert!(!value_eq(i, s));
            release(i);
            release(s);
        }
    }

    #[test]
    fn test_format_values() {
        unsafe {
            let i = Value::new_int(12);
            assert_eq!(format_value(i), "12");
            let s = Value::new_str("Ada".to_string());
            assert_eq!(format_value(s), "Ada");
            let f = Value::new_float(2.5);
            assert_eq!(format_value(f), "2.5");
            let v = Value::new_void();
            assert_eq!(format_value(v), "void");
            let r = Value::new_ref(retain(i));
            assert_eq!(format_value(r), "[Ref: 12]");
            release(r);
            release(i);
            release(s);
            release(f);
            release(v);
        }
    }

    #[test]
    fn test_equality_transitive_over_promotion() {
        unsafe {
            let a = Value::new_int(7);
            let b = Value::new_float(7.0);
            let c = Value::new_int(7);
            assert!(value_eq(a, b));
            assert!(value_eq(b, c));
            assert!(value_eq(a, c));
            release(a);
            release(b);
            release(c);
        }
    }
}
