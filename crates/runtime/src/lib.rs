//! Franz runtime: the library compiled programs link against
//!
//! Key design principles:
//! - Universal values cross the FFI boundary as raw pointers; honest
//!   `(bits, tag)` pairs carry raw primitives for Int/Float/Void and
//!   borrowed pointers otherwise
//! - Runtime functions borrow their value arguments and return owned refs
//! - User-level failures go through the process-wide error state, never
//!   through panics across the boundary

pub mod arith;
pub mod boxing;
pub mod closure;
pub mod dict_rt;
pub mod error;
pub mod io;
pub mod list_rt;
pub mod ns;
pub mod print;
pub mod ref_rt;
pub mod rt_main;
pub mod strings;
pub mod variant;

// Re-export the core value model
pub use franz_core::{
    ClosureRecord, Dict, EnvHeader, List, RET_CLOSURE, RET_FLOAT, RET_INT, RET_POINTER, RET_VOID,
    Scope, Tag, Value, ValueData, ValueRef, release, retain, value_eq, values_live,
};

// Boxing and unboxing (exported for LLVM linking)
pub use boxing::{
    franz_rt_box_float as box_float, franz_rt_box_int as box_int,
    franz_rt_box_result as box_result, franz_rt_cond as cond, franz_rt_own as own,
    franz_rt_pair_bits as pair_bits, franz_rt_release as release_op,
    franz_rt_retain as retain_op, franz_rt_slot_release as slot_release,
    franz_rt_tag as tag_of,
    franz_rt_to_value as to_value, franz_rt_unbox_float as unbox_float,
    franz_rt_unbox_int as unbox_int,
};

// Arithmetic and comparison (exported for LLVM linking)
pub use arith::{
    franz_rt_add as add, franz_rt_div as div, franz_rt_eq as eq, franz_rt_gt as gt,
    franz_rt_gte as gte, franz_rt_lt as lt, franz_rt_lte as lte, franz_rt_mod as mod_op,
    franz_rt_mul as mul, franz_rt_neg as neg, franz_rt_neq as neq, franz_rt_not as not_op,
    franz_rt_sub as sub,
};

// Closure operations (exported for LLVM linking)
pub use closure::{
    ArgPair, MAX_APPLY_ARGS, MAX_CAPTURES, franz_rt_apply as apply,
    franz_rt_closure_new as closure_new, franz_rt_closure_record as closure_record,
    franz_rt_env_alloc as env_alloc, franz_rt_env_set as env_set,
};

// Error handling (exported for LLVM linking)
pub use error::{
    ErrorKind, franz_rt_catch as catch_op, franz_rt_error as error_op,
    franz_rt_raise_div_zero as raise_div_zero, franz_rt_set_line as set_line,
    franz_rt_try as try_op, has_pending, take_pending,
};

// Collections (exported for LLVM linking)
pub use dict_rt::{
    franz_rt_dict_filter as dict_filter, franz_rt_dict_from_array as dict_from_array,
    franz_rt_dict_get as dict_get, franz_rt_dict_has as dict_has,
    franz_rt_dict_keys as dict_keys, franz_rt_dict_merge as dict_merge,
    franz_rt_dict_remove as dict_remove, franz_rt_dict_set as dict_set,
    franz_rt_dict_set_inplace as dict_set_inplace, franz_rt_dict_values as dict_values,
    franz_rt_dict_map as dict_map,
};
pub use list_rt::{
    franz_rt_filter as filter, franz_rt_len as len, franz_rt_list_delete as list_delete,
    franz_rt_map as map,
    franz_rt_list_filter as list_filter, franz_rt_list_from_array as list_from_array,
    franz_rt_list_get as list_get, franz_rt_list_insert as list_insert,
    franz_rt_list_join as list_join, franz_rt_list_map as list_map,
    franz_rt_list_reduce as list_reduce, franz_rt_list_set as list_set,
    franz_rt_list_slice as list_slice, franz_rt_range as range,
};

// Reference cells (exported for LLVM linking)
pub use ref_rt::{
    franz_rt_ref_get as ref_get, franz_rt_ref_new as ref_new, franz_rt_ref_set as ref_set,
};

// Variants (exported for LLVM linking)
pub use variant::{
    franz_rt_match_fail as match_fail, franz_rt_variant_apply as variant_apply,
    franz_rt_variant_is as variant_is, franz_rt_variant_new as variant_new,
    franz_rt_variant_tag as variant_tag,
};

// Strings (exported for LLVM linking)
pub use strings::{
    franz_rt_concat as concat, franz_rt_parse_float as parse_float,
    franz_rt_parse_int as parse_int, franz_rt_str_eq as str_eq,
    franz_rt_str_len as str_len, franz_rt_string_from_cstr as string_from_cstr,
    franz_rt_substr as substr, franz_rt_to_string as to_string_op,
};

// I/O collaborators (exported for LLVM linking)
pub use io::{
    franz_rt_input as input, franz_rt_read_file as read_file, franz_rt_write_file as write_file,
};

// Namespaces (exported for LLVM linking)
pub use ns::{clear_namespaces, franz_rt_qualified_get as qualified_get, register_namespace};

// Process lifecycle (exported for LLVM linking)
pub use rt_main::{
    franz_rt_arg_at as arg_at, franz_rt_arg_count as arg_count, franz_rt_init as rt_init,
    franz_rt_shutdown as rt_shutdown,
};
