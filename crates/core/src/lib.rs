//! Franz core: the universal value model
//!
//! Key design principles:
//! - Value: the single refcounted tagged representation of every language value
//! - Collections hold shared `ValueRef` pointers, never inline copies
//! - Closure environments are by-value snapshots, released by the closure

pub mod dict;
pub mod env;
pub mod list;
pub mod refcell;
pub mod scope;
pub mod value;

pub use dict::Dict;
pub use env::{EnvHeader, EnvSlot, env_alloc, env_len, env_release, env_slot, env_slot_set};
pub use list::{List, RangeError};
pub use refcell::RefCellData;
pub use scope::{Binding, Scope, UpdateError, scope_release, scope_retain};
pub use value::{
    ClosureRecord, NativeFn, RET_CLOSURE, RET_FLOAT, RET_INT, RET_POINTER, RET_VOID, Tag, Value,
    ValueData, ValueRef, format_value, release, retain, value_eq, values_live,
};
