//! Runtime function declarations
//!
//! Every `franz_rt_*` symbol the lowering engine can emit a call to.
//! Value-typed parameters are honest (i64 payload, i32 tag) pairs; `ptr`
//! results are owned universal-value references.

use std::fmt::Write as _;

pub(crate) fn emit_declarations(ir: &mut String) -> std::fmt::Result {
    writeln!(ir, "; Runtime function declarations")?;
    writeln!(ir, "; Process lifecycle")?;
    writeln!(ir, "declare void @franz_rt_init(i32, ptr)")?;
    writeln!(ir, "declare void @franz_rt_shutdown()")?;
    writeln!(ir, "declare i64 @franz_rt_arg_count()")?;
    writeln!(ir, "declare ptr @franz_rt_arg_at(i64)")?;
    writeln!(ir, "; Boxing")?;
    writeln!(ir, "declare ptr @franz_rt_box_int(i64)")?;
    writeln!(ir, "declare ptr @franz_rt_box_float(double)")?;
    writeln!(ir, "declare ptr @franz_rt_box_result(i64, i64)")?;
    writeln!(ir, "declare ptr @franz_rt_to_value(i64, i32)")?;
    writeln!(ir, "declare i64 @franz_rt_unbox_int(ptr)")?;
    writeln!(ir, "declare double @franz_rt_unbox_float(ptr)")?;
    writeln!(ir, "declare i64 @franz_rt_cond(i64, i32)")?;
    writeln!(ir, "declare i32 @franz_rt_tag(ptr)")?;
    writeln!(ir, "declare i64 @franz_rt_pair_bits(ptr)")?;
    writeln!(ir, "declare ptr @franz_rt_retain(ptr)")?;
    writeln!(ir, "declare void @franz_rt_release(ptr)")?;
    writeln!(ir, "declare i64 @franz_rt_own(i64, i32)")?;
    writeln!(ir, "declare void @franz_rt_slot_release(i64, i32)")?;
    writeln!(ir, "; Arithmetic and comparison (dynamic path)")?;
    writeln!(ir, "declare ptr @franz_rt_add(i64, i32, i64, i32)")?;
    writeln!(ir, "declare ptr @franz_rt_sub(i64, i32, i64, i32)")?;
    writeln!(ir, "declare ptr @franz_rt_mul(i64, i32, i64, i32)")?;
    writeln!(ir, "declare ptr @franz_rt_div(i64, i32, i64, i32)")?;
    writeln!(ir, "declare ptr @franz_rt_mod(i64, i32, i64, i32)")?;
    writeln!(ir, "declare ptr @franz_rt_neg(i64, i32)")?;
    writeln!(ir, "declare i64 @franz_rt_eq(i64, i32, i64, i32)")?;
    writeln!(ir, "declare i64 @franz_rt_neq(i64, i32, i64, i32)")?;
    writeln!(ir, "declare i64 @franz_rt_lt(i64, i32, i64, i32)")?;
    writeln!(ir, "declare i64 @franz_rt_gt(i64, i32, i64, i32)")?;
    writeln!(ir, "declare i64 @franz_rt_lte(i64, i32, i64, i32)")?;
    writeln!(ir, "declare i64 @franz_rt_gte(i64, i32, i64, i32)")?;
    writeln!(ir, "declare i64 @franz_rt_not(i64, i32)")?;
    writeln!(ir, "; Printing")?;
    writeln!(ir, "declare void @franz_rt_print(i64, i32)")?;
    writeln!(ir, "declare void @franz_rt_print_space()")?;
    writeln!(ir, "declare void @franz_rt_print_newline()")?;
    writeln!(ir, "; Strings")?;
    writeln!(ir, "declare ptr @franz_rt_string_from_cstr(ptr)")?;
    writeln!(ir, "declare ptr @franz_rt_concat(i64, i32, i64, i32)")?;
    writeln!(ir, "declare i64 @franz_rt_str_eq(i64, i32, i64, i32)")?;
    writeln!(ir, "declare i64 @franz_rt_str_len(i64, i32)")?;
    writeln!(ir, "declare ptr @franz_rt_substr(i64, i32, i64, i32, i64, i32)")?;
    writeln!(ir, "declare ptr @franz_rt_to_string(i64, i32)")?;
    writeln!(ir, "declare ptr @franz_rt_parse_int(i64, i32)")?;
    writeln!(ir, "declare ptr @franz_rt_parse_float(i64, i32)")?;
    writeln!(ir, "; Lists")?;
    writeln!(ir, "declare ptr @franz_rt_list_from_array(ptr, i64)")?;
    writeln!(ir, "declare i64 @franz_rt_len(i64, i32)")?;
    writeln!(ir, "declare ptr @franz_rt_list_get(i64, i32, i64, i32)")?;
    writeln!(
        ir,
        "declare ptr @franz_rt_list_set(i64, i32, i64, i32, i64, i32)"
    )?;
    writeln!(
        ir,
        "declare ptr @franz_rt_list_insert(i64, i32, i64, i32, i64, i32)"
    )?;
    writeln!(ir, "declare ptr @franz_rt_list_delete(i64, i32, i64, i32)")?;
    writeln!(
        ir,
        "declare ptr @franz_rt_list_slice(i64, i32, i64, i32, i64, i32)"
    )?;
    writeln!(ir, "declare ptr @franz_rt_list_join(i64, i32, i64, i32)")?;
    writeln!(ir, "declare ptr @franz_rt_range(i64, i32, i64, i32)")?;
    writeln!(ir, "; Higher-order drivers")?;
    writeln!(ir, "declare ptr @franz_rt_map(i64, i32, i64, i32)")?;
    writeln!(ir, "declare ptr @franz_rt_filter(i64, i32, i64, i32)")?;
    writeln!(ir, "declare ptr @franz_rt_list_map(i64, i32, i64, i32)")?;
    writeln!(ir, "declare ptr @franz_rt_list_filter(i64, i32, i64, i32)")?;
    writeln!(
        ir,
        "declare ptr @franz_rt_list_reduce(i64, i32, i64, i32, i64, i32)"
    )?;
    writeln!(ir, "; Dicts")?;
    writeln!(ir, "declare ptr @franz_rt_dict_from_array(ptr, i64)")?;
    writeln!(ir, "declare ptr @franz_rt_dict_get(i64, i32, i64, i32)")?;
    writeln!(ir, "declare i64 @franz_rt_dict_has(i64, i32, i64, i32)")?;
    writeln!(
        ir,
        "declare ptr @franz_rt_dict_set(i64, i32, i64, i32, i64, i32)"
    )?;
    writeln!(
        ir,
        "declare void @franz_rt_dict_set_inplace(ptr, i64, i32, i64, i32)"
    )?;
    writeln!(ir, "declare ptr @franz_rt_dict_remove(i64, i32, i64, i32)")?;
    writeln!(ir, "declare ptr @franz_rt_dict_merge(i64, i32, i64, i32)")?;
    writeln!(ir, "declare ptr @franz_rt_dict_keys(i64, i32)")?;
    writeln!(ir, "declare ptr @franz_rt_dict_values(i64, i32)")?;
    writeln!(ir, "declare ptr @franz_rt_dict_map(i64, i32, i64, i32)")?;
    writeln!(ir, "declare ptr @franz_rt_dict_filter(i64, i32, i64, i32)")?;
    writeln!(ir, "; Reference cells")?;
    writeln!(ir, "declare ptr @franz_rt_ref_new(i64, i32)")?;
    writeln!(ir, "declare ptr @franz_rt_ref_get(i64, i32)")?;
    writeln!(ir, "declare ptr @franz_rt_ref_set(i64, i32, i64, i32)")?;
    writeln!(ir, "; Variants")?;
    writeln!(ir, "declare ptr @franz_rt_variant_new(i64, i32, ptr, i64)")?;
    writeln!(ir, "declare i64 @franz_rt_variant_is(i64, i32, ptr)")?;
    writeln!(ir, "declare ptr @franz_rt_variant_tag(i64, i32)")?;
    writeln!(
        ir,
        "declare ptr @franz_rt_variant_apply(i64, i32, i64, i32)"
    )?;
    writeln!(ir, "declare void @franz_rt_match_fail(i64, i32)")?;
    writeln!(ir, "; Closures")?;
    writeln!(ir, "declare ptr @franz_rt_env_alloc(i64)")?;
    writeln!(ir, "declare void @franz_rt_env_set(ptr, i64, i64, i64)")?;
    writeln!(ir, "declare ptr @franz_rt_closure_new(ptr, ptr, i64)")?;
    writeln!(ir, "declare ptr @franz_rt_closure_record(ptr)")?;
    writeln!(ir, "declare ptr @franz_rt_apply(i64, i32, ptr, i64)")?;
    writeln!(ir, "; Errors")?;
    writeln!(ir, "declare void @franz_rt_set_line(i64)")?;
    writeln!(ir, "declare void @franz_rt_raise_div_zero()")?;
    writeln!(ir, "declare void @franz_rt_error(i64, i32)")?;
    writeln!(ir, "declare ptr @franz_rt_try(i64, i32, i64, i32)")?;
    writeln!(ir, "declare ptr @franz_rt_catch(i64, i32, i64, i32)")?;
    writeln!(ir, "; Namespaces")?;
    writeln!(ir, "declare ptr @franz_rt_qualified_get(ptr)")?;
    writeln!(ir, "; I/O collaborators")?;
    writeln!(ir, "declare ptr @franz_rt_read_file(i64, i32)")?;
    writeln!(ir, "declare ptr @franz_rt_write_file(i64, i32, i64, i32)")?;
    writeln!(ir, "declare ptr @franz_rt_input()")?;
    Ok(())
}
