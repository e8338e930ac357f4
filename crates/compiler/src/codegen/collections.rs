//! Literals, arithmetic and runtime-call lowering
//!
//! Arithmetic and comparison inline when both operands are statically raw;
//! anything dynamic goes through the runtime with honest pairs. Collection
//! literals box their elements into a stack array and hand it to the
//! runtime constructor in one call.

use super::{CodeGen, CodeGenError, IrValue, TAG_DICT, TAG_LIST, TAG_STR, type_error};
use crate::ast::Node;
use crate::builtins::{ArithOp, CmpOp, RtResult};

// ----------------------------------------------------------------------
// Arithmetic

pub(crate) fn lower_arith(
    cg: &mut CodeGen,
    op: ArithOp,
    node: &Node,
    args: &[Node],
) -> Result<IrValue, CodeGenError> {
    let expected = if op == ArithOp::Neg { 1 } else { 2 };
    if args.len() != expected {
        return Err(type_error(
            node.line,
            format!("expected {} argument(s), got {}", expected, args.len()),
        ));
    }

    if op == ArithOp::Neg {
        let v = cg.lower_expr(&args[0])?;
        return Ok(match v {
            IrValue::Int(x) => {
                let reg = cg.fresh_temp();
                cg.emit(format!("{} = sub i64 0, {}", reg, x));
                IrValue::Int(reg)
            }
            IrValue::Float(x) => {
                let reg = cg.fresh_temp();
                cg.emit(format!("{} = fneg double {}", reg, x));
                IrValue::Float(reg)
            }
            other => {
                let (bits, tag) = cg.to_pair(&other);
                let reg = cg.fresh_temp();
                cg.emit(format!(
                    "{} = call ptr @franz_rt_neg(i64 {}, i32 {})",
                    reg, bits, tag
                ));
                cg.fresh_owned_boxed(reg, None)
            }
        });
    }

    let lhs = cg.lower_expr(&args[0])?;
    let rhs = cg.lower_expr(&args[1])?;

    match (&lhs, &rhs) {
        (IrValue::Int(a), IrValue::Int(b)) => {
            let (a, b) = (a.clone(), b.clone());
            let b = if op.needs_zero_check() {
                guard_zero_int(cg, &b)
            } else {
                b
            };
            let reg = cg.fresh_temp();
            cg.emit(format!("{} = {} i64 {}, {}", reg, op.int_instr(), a, b));
            Ok(IrValue::Int(reg))
        }
        (IrValue::Int(_) | IrValue::Float(_), IrValue::Int(_) | IrValue::Float(_)) => {
            let a = promote_to_double(cg, &lhs);
            let b = promote_to_double(cg, &rhs);
            let b = if op.needs_zero_check() {
                guard_zero_float(cg, &b)
            } else {
                b
            };
            let reg = cg.fresh_temp();
            cg.emit(format!("{} = {} double {}, {}", reg, op.float_instr(), a, b));
            Ok(IrValue::Float(reg))
        }
        _ => {
            let (a_bits, a_tag) = cg.to_pair(&lhs);
            let (b_bits, b_tag) = cg.to_pair(&rhs);
            let reg = cg.fresh_temp();
            cg.emit(format!(
                "{} = call ptr @{}(i64 {}, i32 {}, i64 {}, i32 {})",
                reg,
                op.symbol(),
                a_bits,
                a_tag,
                b_bits,
                b_tag
            ));
            Ok(cg.fresh_owned_boxed(reg, None))
        }
    }
}

fn promote_to_double(cg: &mut CodeGen, v: &IrValue) -> String {
    match v {
        IrValue::Float(x) => x.clone(),
        IrValue::Int(x) => {
            let reg = cg.fresh_temp();
            cg.emit(format!("{} = sitofp i64 {} to double", reg, x));
            reg
        }
        _ => unreachable!("promote_to_double on non-raw value"),
    }
}

/// Division-by-zero guard for the raw integer path: raise on a zero
/// divisor and substitute 1 so the instruction stays defined (inside a
/// `try` the raise records and execution continues to the handler check;
/// outside, it never returns).
fn guard_zero_int(cg: &mut CodeGen, divisor: &str) -> String {
    let pred = cg.current_block.clone();
    let zero_l = cg.fresh_block("divzero");
    let ok_l = cg.fresh_block("divok");
    let isz = cg.fresh_temp();
    cg.emit(format!("{} = icmp eq i64 {}, 0", isz, divisor));
    cg.emit(format!("br i1 {}, label %{}, label %{}", isz, zero_l, ok_l));
    cg.emit_label(&zero_l);
    cg.emit("call void @franz_rt_raise_div_zero()");
    cg.emit(format!("br label %{}", ok_l));
    cg.emit_label(&ok_l);
    let safe = cg.fresh_temp();
    cg.emit(format!(
        "{} = phi i64 [ 1, %{} ], [ {}, %{} ]",
        safe, zero_l, divisor, pred
    ));
    safe
}

fn guard_zero_float(cg: &mut CodeGen, divisor: &str) -> String {
    let pred = cg.current_block.clone();
    let zero_l = cg.fresh_block("fdivzero");
    let ok_l = cg.fresh_block("fdivok");
    let isz = cg.fresh_temp();
    cg.emit(format!("{} = fcmp oeq double {}, 0.0", isz, divisor));
    cg.emit(format!("br i1 {}, label %{}, label %{}", isz, zero_l, ok_l));
    cg.emit_label(&zero_l);
    cg.emit("call void @franz_rt_raise_div_zero()");
    cg.emit(format!("br label %{}", ok_l));
    cg.emit_label(&ok_l);
    let safe = cg.fresh_temp();
    cg.emit(format!(
        "{} = phi double [ 1.0, %{} ], [ {}, %{} ]",
        safe, zero_l, divisor, pred
    ));
    safe
}

// ----------------------------------------------------------------------
// Comparison

pub(crate) fn lower_cmp(
    cg: &mut CodeGen,
    op: CmpOp,
    node: &Node,
    args: &[Node],
) -> Result<IrValue, CodeGenError> {
    if args.len() != 2 {
        return Err(type_error(
            node.line,
            format!("expected 2 arguments, got {}", args.len()),
        ));
    }
    let lhs = cg.lower_expr(&args[0])?;
    let rhs = cg.lower_expr(&args[1])?;

    match (&lhs, &rhs) {
        (IrValue::Int(a), IrValue::Int(b)) => {
            let flag = cg.fresh_temp();
            cg.emit(format!("{} = icmp {} i64 {}, {}", flag, op.int_cond(), a, b));
            let reg = cg.fresh_temp();
            cg.emit(format!("{} = zext i1 {} to i64", reg, flag));
            Ok(IrValue::Int(reg))
        }
        (IrValue::Int(_) | IrValue::Float(_), IrValue::Int(_) | IrValue::Float(_)) => {
            let a = promote_to_double(cg, &lhs);
            let b = promote_to_double(cg, &rhs);
            let flag = cg.fresh_temp();
            cg.emit(format!(
                "{} = fcmp {} double {}, {}",
                flag,
                op.float_cond(),
                a,
                b
            ));
            let reg = cg.fresh_temp();
            cg.emit(format!("{} = zext i1 {} to i64", reg, flag));
            Ok(IrValue::Int(reg))
        }
        _ => {
            let (a_bits, a_tag) = cg.to_pair(&lhs);
            let (b_bits, b_tag) = cg.to_pair(&rhs);
            let reg = cg.fresh_temp();
            cg.emit(format!(
                "{} = call i64 @{}(i64 {}, i32 {}, i64 {}, i32 {})",
                reg,
                op.symbol(),
                a_bits,
                a_tag,
                b_bits,
                b_tag
            ));
            Ok(IrValue::Int(reg))
        }
    }
}

// ----------------------------------------------------------------------
// Printing

pub(crate) fn lower_print(
    cg: &mut CodeGen,
    newline: bool,
    args: &[Node],
) -> Result<IrValue, CodeGenError> {
    for (i, arg) in args.iter().enumerate() {
        if i > 0 {
            cg.emit("call void @franz_rt_print_space()");
        }
        let v = cg.lower_expr(arg)?;
        let (bits, tag) = cg.to_pair(&v);
        cg.emit(format!(
            "call void @franz_rt_print(i64 {}, i32 {})",
            bits, tag
        ));
    }
    if newline {
        cg.emit("call void @franz_rt_print_newline()");
    }
    Ok(IrValue::Void)
}

// ----------------------------------------------------------------------
// Plain runtime calls

pub(crate) fn lower_runtime_call(
    cg: &mut CodeGen,
    symbol: &str,
    arity: usize,
    result: RtResult,
    node: &Node,
    args: &[Node],
) -> Result<IrValue, CodeGenError> {
    if args.len() != arity {
        return Err(type_error(
            node.line,
            format!(
                "{} expects {} argument(s), got {}",
                node.children[0].text(),
                arity,
                args.len()
            ),
        ));
    }
    let mut operands = String::new();
    for arg in args {
        let v = cg.lower_expr(arg)?;
        let (bits, tag) = cg.to_pair(&v);
        if !operands.is_empty() {
            operands.push_str(", ");
        }
        operands.push_str(&format!("i64 {}, i32 {}", bits, tag));
    }
    match result {
        RtResult::Ptr => {
            let reg = cg.fresh_temp();
            cg.emit(format!("{} = call ptr @{}({})", reg, symbol, operands));
            Ok(cg.fresh_owned_boxed(reg, None))
        }
        RtResult::Int => {
            let reg = cg.fresh_temp();
            cg.emit(format!("{} = call i64 @{}({})", reg, symbol, operands));
            Ok(IrValue::Int(reg))
        }
        RtResult::Void => {
            cg.emit(format!("call void @{}({})", symbol, operands));
            Ok(IrValue::Void)
        }
    }
}

/// `(arg i)`: program argument by raw index.
pub(crate) fn lower_arg_at(
    cg: &mut CodeGen,
    node: &Node,
    args: &[Node],
) -> Result<IrValue, CodeGenError> {
    let [index] = args else {
        return Err(type_error(node.line, "arg expects one index".to_string()));
    };
    let v = cg.lower_expr(index)?;
    let raw = cg.to_raw_int(&v);
    let reg = cg.fresh_temp();
    cg.emit(format!("{} = call ptr @franz_rt_arg_at(i64 {})", reg, raw));
    Ok(cg.fresh_owned_boxed(reg, Some(TAG_STR)))
}

// ----------------------------------------------------------------------
// Collection literals

/// Box an element and hand back its pointer register plus whether the
/// reference is a fresh temp we should drop after the constructor call.
fn boxed_element(cg: &mut CodeGen, node: &Node) -> Result<(String, bool), CodeGenError> {
    let v = cg.lower_expr(node)?;
    let boxed = cg.to_boxed(&v);
    let IrValue::Boxed { reg, owned, .. } = boxed else {
        unreachable!()
    };
    Ok((reg, owned))
}

fn release_fresh(cg: &mut CodeGen, elements: &[(String, bool)]) {
    for (reg, owned) in elements {
        if *owned {
            cg.claim(reg);
            cg.emit(format!("call void @franz_rt_release(ptr {})", reg));
        }
    }
}

/// `[e1, e2, …]`: box elements into a stack array, then one constructor
/// call.
pub(crate) fn lower_list_literal(cg: &mut CodeGen, node: &Node) -> Result<IrValue, CodeGenError> {
    let mut elements = Vec::with_capacity(node.children.len());
    for child in &node.children {
        elements.push(boxed_element(cg, child)?);
    }

    let arr = cg.fresh_temp();
    cg.emit(format!(
        "{} = alloca ptr, i64 {}",
        arr,
        elements.len().max(1)
    ));
    for (i, (reg, _)) in elements.iter().enumerate() {
        let slot = cg.fresh_temp();
        cg.emit(format!("{} = getelementptr ptr, ptr {}, i64 {}", slot, arr, i));
        cg.emit(format!("store ptr {}, ptr {}", reg, slot));
    }
    let list = cg.fresh_temp();
    cg.emit(format!(
        "{} = call ptr @franz_rt_list_from_array(ptr {}, i64 {})",
        list,
        arr,
        elements.len()
    ));
    release_fresh(cg, &elements);
    Ok(cg.fresh_owned_boxed(list, Some(TAG_LIST)))
}

/// `(dict k v k v …)`: alternating key/value array, one constructor call.
pub(crate) fn lower_dict_ctor(
    cg: &mut CodeGen,
    node: &Node,
    args: &[Node],
) -> Result<IrValue, CodeGenError> {
    if args.len() % 2 != 0 {
        return Err(type_error(
            node.line,
            "dict expects key/value pairs".to_string(),
        ));
    }
    let mut elements = Vec::with_capacity(args.len());
    for child in args {
        elements.push(boxed_element(cg, child)?);
    }

    let arr = cg.fresh_temp();
    cg.emit(format!(
        "{} = alloca ptr, i64 {}",
        arr,
        elements.len().max(1)
    ));
    for (i, (reg, _)) in elements.iter().enumerate() {
        let slot = cg.fresh_temp();
        cg.emit(format!("{} = getelementptr ptr, ptr {}, i64 {}", slot, arr, i));
        cg.emit(format!("store ptr {}, ptr {}", reg, slot));
    }
    let dict = cg.fresh_temp();
    cg.emit(format!(
        "{} = call ptr @franz_rt_dict_from_array(ptr {}, i64 {})",
        dict,
        arr,
        elements.len() / 2
    ));
    release_fresh(cg, &elements);
    Ok(cg.fresh_owned_boxed(dict, Some(TAG_DICT)))
}

/// `(variant tag field…)`: tag pair plus an argument block of fields.
pub(crate) fn lower_variant_ctor(
    cg: &mut CodeGen,
    node: &Node,
    args: &[Node],
) -> Result<IrValue, CodeGenError> {
    if args.is_empty() {
        return Err(type_error(
            node.line,
            "variant expects a tag and optional fields".to_string(),
        ));
    }
    let tag_v = cg.lower_expr(&args[0])?;
    let (tag_bits, tag_tag) = cg.to_pair(&tag_v);

    let fields = &args[1..];
    let block = cg.fresh_temp();
    cg.emit(format!(
        "{} = alloca {{ i64, i64 }}, i64 {}",
        block,
        fields.len().max(1)
    ));
    for (i, field) in fields.iter().enumerate() {
        let v = cg.lower_expr(field)?;
        let (bits, tag) = cg.to_pair(&v);
        let bits_addr = cg.fresh_temp();
        cg.emit(format!(
            "{} = getelementptr {{ i64, i64 }}, ptr {}, i64 {}, i32 0",
            bits_addr, block, i
        ));
        cg.emit(format!("store i64 {}, ptr {}", bits, bits_addr));
        let tag_addr = cg.fresh_temp();
        cg.emit(format!(
            "{} = getelementptr {{ i64, i64 }}, ptr {}, i64 {}, i32 1",
            tag_addr, block, i
        ));
        let tag64 = if tag.starts_with('%') {
            let wide = cg.fresh_temp();
            cg.emit(format!("{} = zext i32 {} to i64", wide, tag));
            wide
        } else {
            tag
        };
        cg.emit(format!("store i64 {}, ptr {}", tag64, tag_addr));
    }

    let reg = cg.fresh_temp();
    cg.emit(format!(
        "{} = call ptr @franz_rt_variant_new(i64 {}, i32 {}, ptr {}, i64 {})",
        reg,
        tag_bits,
        tag_tag,
        block,
        fields.len()
    ));
    Ok(cg.fresh_owned_boxed(reg, Some(TAG_LIST)))
}
