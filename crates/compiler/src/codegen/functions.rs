//! Function and closure lowering
//!
//! Every Function node compiles to a standalone IR function with the
//! tagged-parameter convention. Captures are resolved at the creation site:
//! the engine snapshots each free variable's current value into a heap
//! environment block (`franz_rt_env_alloc` + `franz_rt_env_set`), and the
//! emitted prologue reads the block back with fixed-offset loads typed by
//! the capture's kind at the snapshot.
//!
//! Call sites come in three flavors, strongest knowledge first: direct
//! calls to known functions (including self recursion, which the tail-call
//! path turns into a jump), the record path for values statically known to
//! be closures (load {func, env, return_tag}, branch on a null env), and
//! the `franz_rt_apply` driver for fully dynamic callees.

use super::{
    CodeGen, CodeGenError, FnCtx, IrValue, KnownFn, RET_CLOSURE, RET_FLOAT, RET_INT, RET_POINTER,
    RetKind, TAG_CLOSURE, TAG_FLOAT, TAG_INT, mangle_name, type_error,
};
use crate::ast::{Node, Opcode};
use crate::builtins::{self, Builtin};
use std::fmt::Write as _;

/// How one captured variable is stored in the environment block.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CaptureKind {
    RawInt,
    RawFloat,
    /// Pointer with a statically known tag
    Ptr(i64),
    /// (bits, tag) snapshot of unknown kind
    Dyn,
}

/// Lower a Function node into its IR function plus a closure value at the
/// current point. `self_name` is set when the function is being bound to a
/// name (enabling self calls).
pub(crate) fn lower_function_value(
    cg: &mut CodeGen,
    node: &Node,
    self_name: Option<&str>,
) -> Result<IrValue, CodeGenError> {
    let (known, env_reg) = lower_function(cg, node, self_name)?;

    let env_arg = env_reg.unwrap_or_else(|| "null".to_string());
    let reg = cg.fresh_temp();
    cg.emit(format!(
        "{} = call ptr @franz_rt_closure_new(ptr @{}, ptr {}, i64 {})",
        reg, known.ir_name, env_arg, known.return_tag
    ));
    let value = cg.fresh_owned_boxed(reg, Some(TAG_CLOSURE));

    if self_name.is_some() && !known.has_env {
        // Non-capturing named functions become directly callable.
        if let Some(name) = self_name {
            cg.known_fns.insert(name.to_string(), known);
        }
    }
    Ok(value)
}

/// Emit the IR function for a Function node. Returns its description and,
/// when it captures, the populated environment register at the creation
/// site.
fn lower_function(
    cg: &mut CodeGen,
    node: &Node,
    self_name: Option<&str>,
) -> Result<(KnownFn, Option<String>), CodeGenError> {
    let params = node.fn_params();
    let arity = params.len();

    // Resolve captures in the enclosing context, snapshotting values as
    // honest pairs before the inner function is entered.
    let mut captures: Vec<(String, CaptureKind, String, String)> = Vec::new();
    for name in &node.free_vars {
        let Some(value) = lookup_capturable(cg, name) else {
            return Err(type_error(
                node.line,
                format!("undefined variable {:?}", name),
            ));
        };
        let kind = match &value {
            IrValue::Int(_) => CaptureKind::RawInt,
            IrValue::Float(_) => CaptureKind::RawFloat,
            IrValue::Boxed { tag: Some(t), .. } if *t != TAG_INT && *t != TAG_FLOAT => {
                CaptureKind::Ptr(*t)
            }
            _ => CaptureKind::Dyn,
        };
        let (bits, tag) = cg.to_pair(&value);
        captures.push((name.clone(), kind, bits, tag));
    }
    let has_env = !captures.is_empty();

    let ret_kind = infer_return_kind(node);
    cg.fn_counter += 1;
    let ir_name = match self_name {
        Some(name) => format!("fz_{}_{}", mangle_name(name), cg.fn_counter),
        None => format!("fz_lambda_{}", cg.fn_counter),
    };
    let known = KnownFn {
        ir_name: ir_name.clone(),
        arity,
        has_env,
        return_tag: ret_kind.ret_tag(),
    };

    // Emit the function body into its own frame. The enclosing function's
    // block position is restored afterwards; nested emission must not
    // disturb its phi predecessor tracking.
    let saved_block = cg.current_block.clone();
    let mut ctx = FnCtx::new(ret_kind);
    ctx.self_fn = self_name.map(|n| (n.to_string(), known.clone()));
    cg.fns.push(ctx);
    cg.push_frame();
    cg.emit_label("entry");

    // Parameters live in (bits, tag) alloca pairs so tail calls can rebind
    // them in place.
    let mut param_slots = Vec::new();
    for (i, param) in params.iter().enumerate() {
        let bits_ptr = format!("%p{}.bits", i);
        let tag_ptr = format!("%p{}.tag", i);
        cg.emit(format!("{} = alloca i64", bits_ptr));
        cg.emit(format!("{} = alloca i32", tag_ptr));
        cg.emit(format!("store i64 %a{}, ptr {}", i, bits_ptr));
        cg.emit(format!("store i32 %t{}, ptr {}", i, tag_ptr));
        cg.ctx_mut().vars.insert(
            param.text().to_string(),
            super::Binding {
                binding: super::VarBinding::Slot {
                    bits_ptr: bits_ptr.clone(),
                    tag_ptr: tag_ptr.clone(),
                },
                mutable: false,
            },
        );
        param_slots.push((bits_ptr, tag_ptr));
    }
    cg.ctx_mut().param_slots = param_slots;

    // Captured names bind to loads from the environment block:
    // slot i bits at byte 8 + 16*i, tag at 16 + 16*i.
    for (i, (name, kind, _, _)) in captures.iter().enumerate() {
        let bits_addr = format!("%c{}.addr", i);
        let bits_reg = format!("%c{}.bits", i);
        cg.emit(format!(
            "{} = getelementptr i8, ptr %env, i64 {}",
            bits_addr,
            8 + 16 * i
        ));
        cg.emit(format!("{} = load i64, ptr {}", bits_reg, bits_addr));
        let bound = match kind {
            CaptureKind::RawInt => IrValue::Int(bits_reg),
            CaptureKind::RawFloat => {
                let f = format!("%c{}.f", i);
                cg.emit(format!("{} = bitcast i64 {} to double", f, bits_reg));
                IrValue::Float(f)
            }
            CaptureKind::Ptr(t) => {
                let p = format!("%c{}.ptr", i);
                cg.emit(format!("{} = inttoptr i64 {} to ptr", p, bits_reg));
                IrValue::Boxed {
                    reg: p,
                    tag: Some(*t),
                    owned: false,
                }
            }
            CaptureKind::Dyn => {
                let tag_addr = format!("%c{}.taddr", i);
                let tag64 = format!("%c{}.t64", i);
                let tag = format!("%c{}.tag", i);
                cg.emit(format!(
                    "{} = getelementptr i8, ptr %env, i64 {}",
                    tag_addr,
                    16 + 16 * i
                ));
                cg.emit(format!("{} = load i64, ptr {}", tag64, tag_addr));
                cg.emit(format!("{} = trunc i64 {} to i32", tag, tag64));
                IrValue::Pair {
                    bits: bits_reg,
                    tag,
                }
            }
        };
        cg.ctx_mut().vars.insert(
            name.clone(),
            super::Binding {
                binding: super::VarBinding::Direct(bound),
                mutable: false,
            },
        );
    }

    // Body head: the tail-call jump target.
    let body_label = cg.fresh_block("body");
    cg.emit(format!("br label %{}", body_label));
    cg.emit_label(&body_label);
    cg.ctx_mut().body_label = body_label;

    let last = cg.lower_statements(node.fn_body())?;
    if !cg.ctx().terminated {
        emit_ret(cg, last)?;
    }

    let (body, _owned) = cg.pop_frame();
    cg.fns.pop();
    cg.current_block = saved_block;

    // Assemble the definition.
    let mut sig = String::new();
    if has_env {
        sig.push_str("ptr %env");
    }
    for i in 0..arity {
        if !sig.is_empty() {
            sig.push_str(", ");
        }
        let _ = write!(&mut sig, "i64 %a{}, i32 %t{}", i, i);
    }
    let _ = writeln!(&mut cg.functions, "define i64 @{}({}) {{", ir_name, sig);
    cg.functions.push_str(&body);
    let _ = writeln!(&mut cg.functions, "}}");
    let _ = writeln!(&mut cg.functions);

    // Creation site: build and fill the environment block.
    let env_reg = if has_env {
        let env = cg.fresh_temp();
        cg.emit(format!(
            "{} = call ptr @franz_rt_env_alloc(i64 {})",
            env,
            captures.len()
        ));
        for (i, (_, _, bits, tag)) in captures.iter().enumerate() {
            let tag64 = tag_operand_i64(cg, tag);
            cg.emit(format!(
                "call void @franz_rt_env_set(ptr {}, i64 {}, i64 {}, i64 {})",
                env, i, bits, tag64
            ));
        }
        Some(env)
    } else {
        None
    };

    Ok((known, env_reg))
}

/// Resolve a name for capturing: local binding or a known function
/// (materialized as a closure value so it can live in an environment).
fn lookup_capturable(cg: &mut CodeGen, name: &str) -> Option<IrValue> {
    if let Some(v) = cg.lookup_var(name) {
        return Some(v);
    }
    let known = cg.known_fns.get(name).cloned()?;
    Some(materialize_known(cg, &known))
}

/// Build a closure value for a known function at the current point.
pub(crate) fn materialize_known(cg: &mut CodeGen, known: &KnownFn) -> IrValue {
    let reg = cg.fresh_temp();
    cg.emit(format!(
        "{} = call ptr @franz_rt_closure_new(ptr @{}, ptr null, i64 {})",
        reg, known.ir_name, known.return_tag
    ));
    cg.fresh_owned_boxed(reg, Some(TAG_CLOSURE))
}

/// Widen a tag operand (i32 register or literal) to i64 text.
fn tag_operand_i64(cg: &mut CodeGen, tag: &str) -> String {
    if tag.starts_with('%') {
        let wide = cg.fresh_temp();
        cg.emit(format!("{} = zext i32 {} to i64", wide, tag));
        wide
    } else {
        tag.to_string()
    }
}

/// Emit the function return for a value, coerced to the function's
/// declared return kind. All functions return i64; floats bitcast, void
/// returns zero, pointer results are owned references.
pub(crate) fn emit_ret(cg: &mut CodeGen, value: IrValue) -> Result<(), CodeGenError> {
    match cg.ctx().ret_kind {
        RetKind::Int => {
            let raw = cg.to_raw_int(&value);
            cg.emit(format!("ret i64 {}", raw));
        }
        RetKind::Float => {
            let raw = to_raw_float(cg, &value);
            let bits = cg.fresh_temp();
            cg.emit(format!("{} = bitcast double {} to i64", bits, raw));
            cg.emit(format!("ret i64 {}", bits));
        }
        RetKind::Pointer | RetKind::Closure => {
            let boxed = cg.to_boxed(&value);
            let IrValue::Boxed { reg, owned, .. } = boxed else {
                unreachable!()
            };
            let reg = if owned {
                cg.claim(&reg);
                reg
            } else {
                // A borrowed reference (parameter, capture, binding) must
                // be handed back owned.
                let retained = cg.fresh_temp();
                cg.emit(format!("{} = call ptr @franz_rt_retain(ptr {})", retained, reg));
                retained
            };
            let bits = cg.fresh_temp();
            cg.emit(format!("{} = ptrtoint ptr {} to i64", bits, reg));
            cg.emit(format!("ret i64 {}", bits));
        }
        RetKind::Void => {
            cg.emit("ret i64 0");
        }
    }
    cg.ctx_mut().terminated = true;
    Ok(())
}

fn to_raw_float(cg: &mut CodeGen, v: &IrValue) -> String {
    match v {
        IrValue::Float(x) => x.clone(),
        IrValue::Int(x) => {
            let reg = cg.fresh_temp();
            cg.emit(format!("{} = sitofp i64 {} to double", reg, x));
            reg
        }
        _ => {
            let boxed = cg.to_boxed(v);
            let IrValue::Boxed { reg, .. } = &boxed else {
                unreachable!()
            };
            let out = cg.fresh_temp();
            cg.emit(format!(
                "{} = call double @franz_rt_unbox_float(ptr {})",
                out, reg
            ));
            out
        }
    }
}

// ----------------------------------------------------------------------
// Call sites

/// Lower the argument list into honest operand pairs.
fn lower_arg_pairs(
    cg: &mut CodeGen,
    args: &[Node],
) -> Result<Vec<(String, String)>, CodeGenError> {
    let mut pairs = Vec::with_capacity(args.len());
    for arg in args {
        let v = cg.lower_expr(arg)?;
        pairs.push(cg.to_pair(&v));
    }
    Ok(pairs)
}

fn call_operands(pairs: &[(String, String)]) -> String {
    let mut out = String::new();
    for (bits, tag) in pairs {
        if !out.is_empty() {
            out.push_str(", ");
        }
        let _ = write!(&mut out, "i64 {}, i32 {}", bits, tag);
    }
    out
}

/// Interpret the i64 result of a direct call through a static return tag.
fn interpret_result(cg: &mut CodeGen, reg: String, return_tag: i64) -> IrValue {
    match return_tag {
        RET_INT => IrValue::Int(reg),
        RET_FLOAT => {
            let f = cg.fresh_temp();
            cg.emit(format!("{} = bitcast i64 {} to double", f, reg));
            IrValue::Float(f)
        }
        RET_POINTER => {
            let p = cg.fresh_temp();
            cg.emit(format!("{} = inttoptr i64 {} to ptr", p, reg));
            cg.fresh_owned_boxed(p, None)
        }
        RET_CLOSURE => {
            let p = cg.fresh_temp();
            cg.emit(format!("{} = inttoptr i64 {} to ptr", p, reg));
            cg.fresh_owned_boxed(p, Some(TAG_CLOSURE))
        }
        _ => IrValue::Void,
    }
}

/// Direct call to a known non-capturing function.
pub(crate) fn lower_known_call(
    cg: &mut CodeGen,
    known: &KnownFn,
    node: &Node,
    args: &[Node],
) -> Result<IrValue, CodeGenError> {
    if args.len() != known.arity {
        return Err(type_error(
            node.line,
            format!(
                "function expects {} argument(s), got {}",
                known.arity,
                args.len()
            ),
        ));
    }
    let pairs = lower_arg_pairs(cg, args)?;
    let reg = cg.fresh_temp();
    cg.emit(format!(
        "{} = call i64 @{}({})",
        reg,
        known.ir_name,
        call_operands(&pairs)
    ));
    Ok(interpret_result(cg, reg, known.return_tag))
}

/// Self call: direct, passing our own environment through when we have one.
pub(crate) fn lower_self_call(
    cg: &mut CodeGen,
    self_fn: &KnownFn,
    node: &Node,
    args: &[Node],
) -> Result<IrValue, CodeGenError> {
    if args.len() != self_fn.arity {
        return Err(type_error(
            node.line,
            format!(
                "function expects {} argument(s), got {}",
                self_fn.arity,
                args.len()
            ),
        ));
    }
    let pairs = lower_arg_pairs(cg, args)?;
    let operands = call_operands(&pairs);
    let reg = cg.fresh_temp();
    if self_fn.has_env {
        let operands = if operands.is_empty() {
            "ptr %env".to_string()
        } else {
            format!("ptr %env, {}", operands)
        };
        cg.emit(format!("{} = call i64 @{}({})", reg, self_fn.ir_name, operands));
    } else {
        cg.emit(format!("{} = call i64 @{}({})", reg, self_fn.ir_name, operands));
    }
    Ok(interpret_result(cg, reg, self_fn.return_tag))
}

/// Self tail call: store the new arguments into the parameter slots and
/// jump back to the body head instead of calling.
pub(crate) fn lower_self_tail_call(
    cg: &mut CodeGen,
    args: &[Node],
) -> Result<(), CodeGenError> {
    let pairs = lower_arg_pairs(cg, args)?;
    let slots = cg.ctx().param_slots.clone();
    // Rebind the slots only after every argument is computed.
    for ((bits, tag), (bits_ptr, tag_ptr)) in pairs.iter().zip(&slots) {
        let owned = cg.fresh_temp();
        cg.emit(format!(
            "{} = call i64 @franz_rt_own(i64 {}, i32 {})",
            owned, bits, tag
        ));
        let old_bits = cg.fresh_temp();
        cg.emit(format!("{} = load i64, ptr {}", old_bits, bits_ptr));
        let old_tag = cg.fresh_temp();
        cg.emit(format!("{} = load i32, ptr {}", old_tag, tag_ptr));
        cg.emit(format!(
            "call void @franz_rt_slot_release(i64 {}, i32 {})",
            old_bits, old_tag
        ));
        cg.emit(format!("store i64 {}, ptr {}", owned, bits_ptr));
        cg.emit(format!("store i32 {}, ptr {}", tag, tag_ptr));
    }
    let body_label = cg.ctx().body_label.clone();
    cg.emit(format!("br label %{}", body_label));
    cg.ctx_mut().terminated = true;
    Ok(())
}

/// Dynamic call: record path when the callee is statically a closure,
/// otherwise the apply driver.
pub(crate) fn lower_dynamic_call(
    cg: &mut CodeGen,
    callee: IrValue,
    node: &Node,
    args: &[Node],
) -> Result<IrValue, CodeGenError> {
    match &callee {
        IrValue::Int(_) | IrValue::Float(_) | IrValue::Void => Err(type_error(
            node.line,
            "value is not callable".to_string(),
        )),
        IrValue::Boxed {
            reg,
            tag: Some(TAG_CLOSURE),
            ..
        } => {
            let reg = reg.clone();
            lower_record_call(cg, &reg, args)
        }
        _ => lower_apply_call(cg, callee, args),
    }
}

/// The closure-record call path: load {func, env, return_tag}, branch on
/// the environment being null, merge the two call forms, interpret the
/// result bits through the runtime.
fn lower_record_call(
    cg: &mut CodeGen,
    closure_reg: &str,
    args: &[Node],
) -> Result<IrValue, CodeGenError> {
    let pairs = lower_arg_pairs(cg, args)?;
    let operands = call_operands(&pairs);

    let rec = cg.fresh_temp();
    cg.emit(format!(
        "{} = call ptr @franz_rt_closure_record(ptr {})",
        rec, closure_reg
    ));
    let func = cg.fresh_temp();
    cg.emit(format!("{} = load ptr, ptr {}", func, rec));
    let env_addr = cg.fresh_temp();
    cg.emit(format!("{} = getelementptr i8, ptr {}, i64 8", env_addr, rec));
    let env = cg.fresh_temp();
    cg.emit(format!("{} = load ptr, ptr {}", env, env_addr));
    let rtag_addr = cg.fresh_temp();
    cg.emit(format!(
        "{} = getelementptr i8, ptr {}, i64 16",
        rtag_addr, rec
    ));
    let rtag = cg.fresh_temp();
    cg.emit(format!("{} = load i64, ptr {}", rtag, rtag_addr));

    let direct = cg.fresh_block("call.direct");
    let withenv = cg.fresh_block("call.env");
    let done = cg.fresh_block("call.done");

    let isnull = cg.fresh_temp();
    cg.emit(format!("{} = icmp eq ptr {}, null", isnull, env));
    cg.emit(format!(
        "br i1 {}, label %{}, label %{}",
        isnull, direct, withenv
    ));

    cg.emit_label(&direct);
    let r1 = cg.fresh_temp();
    cg.emit(format!("{} = call i64 {}({})", r1, func, operands));
    cg.emit(format!("br label %{}", done));

    cg.emit_label(&withenv);
    let env_operands = if operands.is_empty() {
        format!("ptr {}", env)
    } else {
        format!("ptr {}, {}", env, operands)
    };
    let r2 = cg.fresh_temp();
    cg.emit(format!("{} = call i64 {}({})", r2, func, env_operands));
    cg.emit(format!("br label %{}", done));

    cg.emit_label(&done);
    let bits = cg.fresh_temp();
    cg.emit(format!(
        "{} = phi i64 [ {}, %{} ], [ {}, %{} ]",
        bits, r1, direct, r2, withenv
    ));
    let res = cg.fresh_temp();
    cg.emit(format!(
        "{} = call ptr @franz_rt_box_result(i64 {}, i64 {})",
        res, bits, rtag
    ));
    Ok(cg.fresh_owned_boxed(res, None))
}

/// The fully dynamic path: pack the arguments into an on-stack pair block
/// and let the runtime dispatch (closure or native).
fn lower_apply_call(
    cg: &mut CodeGen,
    callee: IrValue,
    args: &[Node],
) -> Result<IrValue, CodeGenError> {
    let (callee_bits, callee_tag) = cg.to_pair(&callee);
    let pairs = lower_arg_pairs(cg, args)?;

    let block = cg.fresh_temp();
    cg.emit(format!(
        "{} = alloca {{ i64, i64 }}, i64 {}",
        block,
        pairs.len().max(1)
    ));
    for (i, (bits, tag)) in pairs.iter().enumerate() {
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
        let tag64 = tag_operand_i64(cg, tag);
        cg.emit(format!("store i64 {}, ptr {}", tag64, tag_addr));
    }

    let res = cg.fresh_temp();
    cg.emit(format!(
        "{} = call ptr @franz_rt_apply(i64 {}, i32 {}, ptr {}, i64 {})",
        res,
        callee_bits,
        callee_tag,
        block,
        args.len()
    ));
    Ok(cg.fresh_owned_boxed(res, None))
}

// ----------------------------------------------------------------------
// Return-kind inference

/// Statically predict a function's return kind, conservatively falling
/// back to Pointer. Drives the closure record's return tag.
pub(crate) fn infer_return_kind(func: &Node) -> RetKind {
    let mut kinds = Vec::new();
    collect_result_kinds(func.fn_body(), false, true, &mut kinds);
    join_kinds(&kinds)
}

fn collect_result_kinds(stmt: &Node, in_loop: bool, fallthrough: bool, out: &mut Vec<RetKind>) {
    for (i, child) in stmt.children.iter().enumerate() {
        let is_last = i + 1 == stmt.children.len();
        match child.opcode {
            Opcode::Return => {
                // Returns inside a loop body feed the loop slot, not the
                // function result.
                if !in_loop {
                    out.push(expr_kind(&child.children[0]));
                }
            }
            Opcode::Application => {
                collect_from_application(child, in_loop, fallthrough && is_last, out);
            }
            _ if is_last && fallthrough => out.push(expr_kind(child)),
            _ => {}
        }
    }
    if stmt.children.is_empty() && fallthrough {
        out.push(RetKind::Void);
    }
}

fn collect_from_application(app: &Node, in_loop: bool, in_result: bool, out: &mut Vec<RetKind>) {
    let head = &app.children[0];
    if head.opcode == Opcode::Identifier {
        match head.text() {
            "if" => {
                // Branch blocks are transparent: their returns are ours;
                // their fall-through counts only in result position.
                for branch in &app.children[2..] {
                    if branch.opcode == Opcode::Function {
                        collect_result_kinds(branch.fn_body(), in_loop, in_result, out);
                    } else if in_result {
                        out.push(expr_kind(branch));
                    }
                }
                return;
            }
            "loop" | "while" => {
                // The body's returns target the loop; the loop's own value
                // is dynamic.
                if in_result {
                    out.push(RetKind::Pointer);
                }
                return;
            }
            _ => {}
        }
    }
    if in_result {
        out.push(expr_kind(app));
    }
}

fn expr_kind(node: &Node) -> RetKind {
    match node.opcode {
        Opcode::Int => RetKind::Int,
        Opcode::Float => RetKind::Float,
        Opcode::Str | Opcode::List | Opcode::Qualified => RetKind::Pointer,
        Opcode::Function => RetKind::Closure,
        Opcode::Statement => RetKind::Pointer,
        Opcode::Application => application_kind(node),
        _ => RetKind::Pointer,
    }
}

fn application_kind(app: &Node) -> RetKind {
    let head = &app.children[0];
    if head.opcode != Opcode::Identifier {
        return RetKind::Pointer;
    }
    match builtins::lookup(head.text()) {
        Some(Builtin::Arith(_)) => {
            let arg_kinds: Vec<RetKind> =
                app.children[1..].iter().map(expr_kind).collect();
            if arg_kinds.iter().all(|k| *k == RetKind::Int) {
                RetKind::Int
            } else if arg_kinds
                .iter()
                .all(|k| matches!(k, RetKind::Int | RetKind::Float))
            {
                RetKind::Float
            } else {
                RetKind::Pointer
            }
        }
        Some(Builtin::Cmp(_)) => RetKind::Int,
        Some(Builtin::Print { .. }) => RetKind::Void,
        Some(Builtin::Special(builtins::Special::If)) => {
            let kinds: Vec<RetKind> = app.children[2..]
                .iter()
                .map(|b| {
                    if b.opcode == Opcode::Function {
                        let mut inner = Vec::new();
                        collect_result_kinds(b.fn_body(), true, true, &mut inner);
                        join_kinds(&inner)
                    } else {
                        expr_kind(b)
                    }
                })
                .collect();
            join_kinds(&kinds)
        }
        Some(Builtin::Special(builtins::Special::And | builtins::Special::Or | builtins::Special::Not)) => {
            RetKind::Int
        }
        Some(Builtin::Runtime { result, .. }) => match result {
            builtins::RtResult::Int => RetKind::Int,
            builtins::RtResult::Ptr => RetKind::Pointer,
            builtins::RtResult::Void => RetKind::Void,
        },
        _ => RetKind::Pointer,
    }
}

fn join_kinds(kinds: &[RetKind]) -> RetKind {
    let mut result: Option<RetKind> = None;
    for &k in kinds {
        result = Some(match (result, k) {
            (None, k) => k,
            (Some(a), b) if a == b => a,
            (Some(RetKind::Int), RetKind::Float) | (Some(RetKind::Float), RetKind::Int) => {
                RetKind::Float
            }
            _ => RetKind::Pointer,
        });
    }
    result.unwrap_or(RetKind::Void)
}
