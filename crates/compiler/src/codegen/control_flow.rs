//! Control-flow lowering
//!
//! `if` inlines its branch blocks and merges their values with a phi after
//! reconciling branch types (int with float promotes; anything mixed with a
//! pointer boxes both sides; a branch that returned or exited a loop simply
//! drops out of the merge). Loops carry an early-exit value in a
//! (bits, tag) slot pair: a return inside the body stores the slot and
//! jumps to the check block, which leaves the loop while the slot is
//! non-zero. `match`, `try` and `catch` hand their callables to the
//! runtime drivers.

use super::functions::{self, lower_self_tail_call};
use super::{
    CodeGen, CodeGenError, IrValue, LoopCtx, TAG_VOID, type_error,
};
use crate::ast::{Node, Opcode};
use crate::builtins::Special;

pub(crate) fn lower_special(
    cg: &mut CodeGen,
    form: Special,
    node: &Node,
    args: &[Node],
) -> Result<IrValue, CodeGenError> {
    match form {
        Special::If => lower_if(cg, node, args),
        Special::Loop => lower_loop(cg, node, args),
        Special::While => lower_while(cg, node, args),
        Special::Match => lower_match(cg, node, args),
        Special::Try => lower_try_catch(cg, node, args, "franz_rt_try"),
        Special::Catch => lower_try_catch(cg, node, args, "franz_rt_catch"),
        Special::Freeze => lower_freeze(cg, node, args),
        Special::Define => lower_define(cg, node, args),
        Special::And => lower_and_or(cg, node, args, true),
        Special::Or => lower_and_or(cg, node, args, false),
        Special::Not => lower_not(cg, node, args),
    }
}

// ----------------------------------------------------------------------
// Return

/// `<- expr`: early exit of the innermost loop when one is active,
/// otherwise a function return. At the program's top level the value is
/// evaluated and dropped.
pub(crate) fn lower_return(cg: &mut CodeGen, node: &Node) -> Result<(), CodeGenError> {
    let value_node = &node.children[0];

    if let Some(loop_ctx) = cg.ctx().loops.last().cloned() {
        let value = cg.lower_expr(value_node)?;
        let (bits, tag) = cg.to_pair(&value);
        let owned = cg.fresh_temp();
        cg.emit(format!(
            "{} = call i64 @franz_rt_own(i64 {}, i32 {})",
            owned, bits, tag
        ));
        cg.emit(format!("store i64 {}, ptr {}", owned, loop_ctx.bits_slot));
        cg.emit(format!("store i32 {}, ptr {}", tag, loop_ctx.tag_slot));
        cg.emit(format!("br label %{}", loop_ctx.check_label));
        cg.ctx_mut().terminated = true;
        return Ok(());
    }

    if cg.fns.len() == 1 {
        // Top level of the program: nothing to return from.
        cg.lower_expr(value_node)?;
        return Ok(());
    }

    // Tail position: a same-arity self application becomes a jump back to
    // the body head instead of a call.
    if cg.config.tco
        && value_node.opcode == Opcode::Application
        && value_node.children[0].opcode == Opcode::Identifier
        && let Some((self_name, self_fn)) = cg.ctx().self_fn.clone()
        && value_node.children[0].text() == self_name
        && value_node.children.len() - 1 == self_fn.arity
        && !cg.ctx().vars.contains_key(self_name.as_str())
    {
        return lower_self_tail_call(cg, &value_node.children[1..]);
    }

    let value = cg.lower_expr(value_node)?;
    functions::emit_ret(cg, value)
}

// ----------------------------------------------------------------------
// if

/// Phi unification target for branch values.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PhiTy {
    I64,
    Double,
    Ptr,
    None,
}

fn value_phi_kind(v: &IrValue) -> PhiTy {
    match v {
        IrValue::Int(_) => PhiTy::I64,
        IrValue::Float(_) => PhiTy::Double,
        IrValue::Void => PhiTy::None,
        _ => PhiTy::Ptr,
    }
}

fn unify_phi(a: PhiTy, b: PhiTy) -> PhiTy {
    match (a, b) {
        (x, y) if x == y => x,
        (PhiTy::None, x) | (x, PhiTy::None) => x,
        (PhiTy::I64, PhiTy::Double) | (PhiTy::Double, PhiTy::I64) => PhiTy::Double,
        _ => PhiTy::Ptr,
    }
}

/// Coerce a branch value to the unified phi type; returns the operand.
fn coerce_to_phi(cg: &mut CodeGen, v: &IrValue, ty: PhiTy) -> String {
    match ty {
        PhiTy::I64 => match v {
            IrValue::Void => "0".to_string(),
            other => cg.to_raw_int(other),
        },
        PhiTy::Double => match v {
            IrValue::Void => "0.0".to_string(),
            IrValue::Float(x) => x.clone(),
            IrValue::Int(x) => {
                let reg = cg.fresh_temp();
                cg.emit(format!("{} = sitofp i64 {} to double", reg, x));
                reg
            }
            other => {
                let boxed = cg.to_boxed(other);
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
        },
        PhiTy::Ptr => {
            let boxed = cg.to_boxed(v);
            let IrValue::Boxed { reg, owned, .. } = boxed else {
                unreachable!()
            };
            if owned {
                cg.claim(&reg);
                reg
            } else {
                let retained = cg.fresh_temp();
                cg.emit(format!(
                    "{} = call ptr @franz_rt_retain(ptr {})",
                    retained, reg
                ));
                retained
            }
        }
        PhiTy::None => "0".to_string(),
    }
}

struct BranchOut {
    buf: String,
    value: IrValue,
    terminated: bool,
    last_block: String,
}

/// Lower one branch (an inlined block or a plain expression) into its own
/// buffer, releasing its temporaries and keeping its result alive.
fn lower_branch(cg: &mut CodeGen, label: &str, node: &Node) -> Result<BranchOut, CodeGenError> {
    cg.push_frame();
    cg.emit_label(label);
    let value = if node.opcode == Opcode::Function && node.fn_params().is_empty() {
        cg.lower_statements(node.fn_body())?
    } else {
        cg.lower_expr(node)?
    };
    let terminated = cg.ctx().terminated;
    if !terminated {
        let keep = match &value {
            IrValue::Boxed { reg, owned, .. } if *owned => Some(reg.clone()),
            _ => None,
        };
        cg.release_owned_since(0, keep.as_deref());
        if let Some(reg) = keep {
            // Ownership transfers to the enclosing frame through the phi.
            cg.claim(&reg);
        }
    }
    let last_block = cg.current_block.clone();
    let (buf, _rem) = cg.pop_frame();
    Ok(BranchOut {
        buf,
        value,
        terminated,
        last_block,
    })
}

/// Splice a lowered branch into the current buffer, appending the phi
/// coercion and the jump to the merge block. Returns the phi operand and
/// predecessor when the branch reaches the merge.
fn finish_branch(
    cg: &mut CodeGen,
    branch: BranchOut,
    ty: PhiTy,
    merge_label: &str,
) -> Option<(String, String)> {
    cg.splice(&branch.buf);
    if branch.terminated {
        return None;
    }
    cg.current_block = branch.last_block.clone();
    let operand = coerce_to_phi(cg, &branch.value, ty);
    let pred = cg.current_block.clone();
    cg.emit(format!("br label %{}", merge_label));
    Some((operand, pred))
}

fn lower_if(cg: &mut CodeGen, node: &Node, args: &[Node]) -> Result<IrValue, CodeGenError> {
    if args.len() < 2 || args.len() > 3 {
        return Err(type_error(
            node.line,
            format!("if expects 2 or 3 arguments, got {}", args.len()),
        ));
    }
    let cond_v = cg.lower_expr(&args[0])?;
    let cond = cg.to_cond(&cond_v);

    let then_l = cg.fresh_block("then");
    let else_l = cg.fresh_block("else");
    let merge_l = cg.fresh_block("ifend");
    cg.emit(format!(
        "br i1 {}, label %{}, label %{}",
        cond, then_l, else_l
    ));

    let then_branch = lower_branch(cg, &then_l, &args[1])?;
    let else_branch = match args.get(2) {
        Some(else_node) => lower_branch(cg, &else_l, else_node)?,
        None => {
            // Synthesized zero matching the then branch.
            cg.push_frame();
            cg.emit_label(&else_l);
            let last_block = cg.current_block.clone();
            let (buf, _rem) = cg.pop_frame();
            BranchOut {
                buf,
                value: IrValue::Void,
                terminated: false,
                last_block,
            }
        }
    };

    let mut ty = PhiTy::None;
    if !then_branch.terminated {
        ty = unify_phi(ty, value_phi_kind(&then_branch.value));
    }
    if !else_branch.terminated {
        ty = unify_phi(ty, value_phi_kind(&else_branch.value));
    }

    let op1 = finish_branch(cg, then_branch, ty, &merge_l);
    let op2 = finish_branch(cg, else_branch, ty, &merge_l);

    cg.emit_label(&merge_l);
    let incoming: Vec<(String, String)> = [op1, op2].into_iter().flatten().collect();
    if incoming.is_empty() {
        // Both branches left the block; the merge is unreachable and its
        // value is a dead zero.
        cg.emit("unreachable");
        cg.ctx_mut().terminated = true;
        return Ok(IrValue::Int("0".to_string()));
    }

    match ty {
        PhiTy::None => Ok(IrValue::Void),
        PhiTy::I64 | PhiTy::Double | PhiTy::Ptr => {
            let (ir_ty, wrap): (&str, fn(String) -> IrValue) = match ty {
                PhiTy::I64 => ("i64", IrValue::Int),
                PhiTy::Double => ("double", IrValue::Float),
                _ => ("ptr", |reg| IrValue::Boxed {
                    reg,
                    tag: None,
                    owned: true,
                }),
            };
            if incoming.len() == 1 {
                // Only one branch reaches the merge: use its value directly.
                let (operand, _) = incoming.into_iter().next().unwrap();
                let v = wrap(operand);
                if let IrValue::Boxed { reg, .. } = &v {
                    cg.note_owned(reg);
                }
                return Ok(v);
            }
            let reg = cg.fresh_temp();
            let operands: Vec<String> = incoming
                .iter()
                .map(|(op, pred)| format!("[ {}, %{} ]", op, pred))
                .collect();
            cg.emit(format!(
                "{} = phi {} {}",
                reg,
                ir_ty,
                operands.join(", ")
            ));
            let v = wrap(reg);
            if let IrValue::Boxed { reg, .. } = &v {
                cg.note_owned(reg);
            }
            Ok(v)
        }
    }
}

// ----------------------------------------------------------------------
// Loops

/// `(loop n body)`: counted loop with the early-exit slot. The body's
/// parameter receives the counter; a return inside the body stores the
/// slot and jumps to the check, which exits while the slot holds a
/// non-zero value.
fn lower_loop(cg: &mut CodeGen, node: &Node, args: &[Node]) -> Result<IrValue, CodeGenError> {
    if args.len() != 2 || args[1].opcode != Opcode::Function {
        return Err(type_error(
            node.line,
            "loop expects a count and a body block".to_string(),
        ));
    }
    let body = &args[1];
    if body.fn_params().len() > 1 {
        return Err(type_error(
            node.line,
            "loop body takes at most one parameter (the counter)".to_string(),
        ));
    }

    let count_v = cg.lower_expr(&args[0])?;
    let count = cg.to_raw_int(&count_v);

    let counter_ptr = cg.fresh_temp();
    cg.emit(format!("{} = alloca i64", counter_ptr));
    cg.emit(format!("store i64 0, ptr {}", counter_ptr));
    let (bits_slot, tag_slot) = alloc_loop_slot(cg);

    let cond_l = cg.fresh_block("loopcond");
    let body_l = cg.fresh_block("loopbody");
    let check_l = cg.fresh_block("loopcheck");
    let incr_l = cg.fresh_block("loopincr");
    let exit_l = cg.fresh_block("loopexit");

    cg.emit(format!("br label %{}", cond_l));
    cg.emit_label(&cond_l);
    let i = cg.fresh_temp();
    cg.emit(format!("{} = load i64, ptr {}", i, counter_ptr));
    let cmp = cg.fresh_temp();
    cg.emit(format!("{} = icmp slt i64 {}, {}", cmp, i, count));
    cg.emit(format!(
        "br i1 {}, label %{}, label %{}",
        cmp, body_l, exit_l
    ));

    cg.emit_label(&body_l);
    if let Some(param) = body.fn_params().first() {
        cg.ctx_mut().vars.insert(
            param.text().to_string(),
            super::Binding {
                binding: super::VarBinding::Direct(IrValue::Int(i.clone())),
                mutable: false,
            },
        );
    }
    cg.ctx_mut().loops.push(LoopCtx {
        bits_slot: bits_slot.clone(),
        tag_slot: tag_slot.clone(),
        check_label: check_l.clone(),
    });
    cg.lower_statements(body.fn_body())?;
    cg.ctx_mut().loops.pop();
    if !cg.ctx().terminated {
        cg.emit(format!("br label %{}", check_l));
    }

    emit_loop_check(cg, &check_l, &bits_slot, &exit_l, &incr_l);

    cg.emit_label(&incr_l);
    let i2 = cg.fresh_temp();
    cg.emit(format!("{} = load i64, ptr {}", i2, counter_ptr));
    let inc = cg.fresh_temp();
    cg.emit(format!("{} = add i64 {}, 1", inc, i2));
    cg.emit(format!("store i64 {}, ptr {}", inc, counter_ptr));
    cg.emit(format!("br label %{}", cond_l));

    Ok(load_loop_result(cg, &exit_l, &bits_slot, &tag_slot))
}

/// `(while cond body)`: the condition re-evaluates at the head; the body
/// shares the counted loop's slot-and-check shape.
fn lower_while(cg: &mut CodeGen, node: &Node, args: &[Node]) -> Result<IrValue, CodeGenError> {
    if args.len() != 2 || args[1].opcode != Opcode::Function {
        return Err(type_error(
            node.line,
            "while expects a condition and a body block".to_string(),
        ));
    }
    let body = &args[1];
    let (bits_slot, tag_slot) = alloc_loop_slot(cg);

    let cond_l = cg.fresh_block("whilecond");
    let body_l = cg.fresh_block("whilebody");
    let check_l = cg.fresh_block("whilecheck");
    let exit_l = cg.fresh_block("whileexit");

    cg.emit(format!("br label %{}", cond_l));
    cg.emit_label(&cond_l);
    let cond_v = cg.lower_expr(&args[0])?;
    let cond = cg.to_cond(&cond_v);
    cg.emit(format!(
        "br i1 {}, label %{}, label %{}",
        cond, body_l, exit_l
    ));

    cg.emit_label(&body_l);
    cg.ctx_mut().loops.push(LoopCtx {
        bits_slot: bits_slot.clone(),
        tag_slot: tag_slot.clone(),
        check_label: check_l.clone(),
    });
    cg.lower_statements(body.fn_body())?;
    cg.ctx_mut().loops.pop();
    if !cg.ctx().terminated {
        cg.emit(format!("br label %{}", check_l));
    }

    emit_loop_check(cg, &check_l, &bits_slot, &exit_l, &cond_l);

    Ok(load_loop_result(cg, &exit_l, &bits_slot, &tag_slot))
}

fn alloc_loop_slot(cg: &mut CodeGen) -> (String, String) {
    let bits_slot = cg.fresh_temp();
    cg.emit(format!("{} = alloca i64", bits_slot));
    cg.emit(format!("store i64 0, ptr {}", bits_slot));
    let tag_slot = cg.fresh_temp();
    cg.emit(format!("{} = alloca i32", tag_slot));
    cg.emit(format!("store i32 0, ptr {}", tag_slot));
    (bits_slot, tag_slot)
}

/// The check block: leave the loop while the slot carries a non-zero
/// early-exit value, otherwise continue.
fn emit_loop_check(
    cg: &mut CodeGen,
    check_l: &str,
    bits_slot: &str,
    exit_l: &str,
    continue_l: &str,
) {
    cg.emit_label(check_l);
    let stored = cg.fresh_temp();
    cg.emit(format!("{} = load i64, ptr {}", stored, bits_slot));
    let nonzero = cg.fresh_temp();
    cg.emit(format!("{} = icmp ne i64 {}, 0", nonzero, stored));
    cg.emit(format!(
        "br i1 {}, label %{}, label %{}",
        nonzero, exit_l, continue_l
    ));
}

fn load_loop_result(
    cg: &mut CodeGen,
    exit_l: &str,
    bits_slot: &str,
    tag_slot: &str,
) -> IrValue {
    cg.emit_label(exit_l);
    let bits = cg.fresh_temp();
    cg.emit(format!("{} = load i64, ptr {}", bits, bits_slot));
    let tag = cg.fresh_temp();
    cg.emit(format!("{} = load i32, ptr {}", tag, tag_slot));
    IrValue::Pair { bits, tag }
}

// ----------------------------------------------------------------------
// match

/// `(match v tag1 branch1 tag2 branch2 …)`: a cascade of tag tests; the
/// matched branch's callable is invoked with the variant's fields.
fn lower_match(cg: &mut CodeGen, node: &Node, args: &[Node]) -> Result<IrValue, CodeGenError> {
    if args.len() < 3 || args.len() % 2 == 0 {
        return Err(type_error(
            node.line,
            "match expects a value followed by tag/branch pairs".to_string(),
        ));
    }
    let scrutinee = cg.lower_expr(&args[0])?;
    let (v_bits, v_tag) = cg.to_pair(&scrutinee);

    let done_l = cg.fresh_block("matchend");
    let mut incoming: Vec<(String, String)> = Vec::new();

    for pair in args[1..].chunks(2) {
        let tag_node = &pair[0];
        let branch_node = &pair[1];
        if tag_node.opcode != Opcode::Str {
            return Err(type_error(
                tag_node.line,
                "match arm tag must be a string literal".to_string(),
            ));
        }
        let tag_global = cg.get_string_global(tag_node.text())?;
        let arm_l = cg.fresh_block("arm");
        let next_l = cg.fresh_block("armnext");

        let is = cg.fresh_temp();
        cg.emit(format!(
            "{} = call i64 @franz_rt_variant_is(i64 {}, i32 {}, ptr {})",
            is, v_bits, v_tag, tag_global
        ));
        let hit = cg.fresh_temp();
        cg.emit(format!("{} = icmp ne i64 {}, 0", hit, is));
        cg.emit(format!("br i1 {}, label %{}, label %{}", hit, arm_l, next_l));

        cg.emit_label(&arm_l);
        let branch = cg.lower_expr(branch_node)?;
        let (f_bits, f_tag) = cg.to_pair(&branch);
        let result = cg.fresh_temp();
        cg.emit(format!(
            "{} = call ptr @franz_rt_variant_apply(i64 {}, i32 {}, i64 {}, i32 {})",
            result, v_bits, v_tag, f_bits, f_tag
        ));
        if let IrValue::Boxed {
            reg, owned: true, ..
        } = &branch
        {
            let reg = reg.clone();
            cg.claim(&reg);
            cg.emit(format!("call void @franz_rt_release(ptr {})", reg));
        }
        incoming.push((result, cg.current_block.clone()));
        cg.emit(format!("br label %{}", done_l));

        cg.emit_label(&next_l);
    }

    // No arm matched.
    cg.emit(format!(
        "call void @franz_rt_match_fail(i64 {}, i32 {})",
        v_bits, v_tag
    ));
    let fallback = cg.fresh_temp();
    cg.emit(format!(
        "{} = call ptr @franz_rt_to_value(i64 0, i32 {})",
        fallback, TAG_VOID
    ));
    incoming.push((fallback, cg.current_block.clone()));
    cg.emit(format!("br label %{}", done_l));

    cg.emit_label(&done_l);
    let reg = cg.fresh_temp();
    let operands: Vec<String> = incoming
        .iter()
        .map(|(op, pred)| format!("[ {}, %{} ]", op, pred))
        .collect();
    cg.emit(format!("{} = phi ptr {}", reg, operands.join(", ")));
    Ok(cg.fresh_owned_boxed(reg, None))
}

// ----------------------------------------------------------------------
// try / catch

fn lower_try_catch(
    cg: &mut CodeGen,
    node: &Node,
    args: &[Node],
    symbol: &str,
) -> Result<IrValue, CodeGenError> {
    if args.len() != 2 {
        return Err(type_error(
            node.line,
            format!("expected 2 arguments, got {}", args.len()),
        ));
    }
    let body = cg.lower_expr(&args[0])?;
    let (b_bits, b_tag) = cg.to_pair(&body);
    let second = cg.lower_expr(&args[1])?;
    let (s_bits, s_tag) = cg.to_pair(&second);
    let reg = cg.fresh_temp();
    cg.emit(format!(
        "{} = call ptr @{}(i64 {}, i32 {}, i64 {}, i32 {})",
        reg, symbol, b_bits, b_tag, s_bits, s_tag
    ));
    Ok(cg.fresh_owned_boxed(reg, None))
}

// ----------------------------------------------------------------------
// freeze / define

/// `(freeze "name")`: compile-time downgrade of a mutable binding. Copies
/// already captured in closure environments are by-value snapshots and are
/// unaffected.
fn lower_freeze(cg: &mut CodeGen, node: &Node, args: &[Node]) -> Result<IrValue, CodeGenError> {
    let [name_node] = args else {
        return Err(type_error(node.line, "freeze expects one name".to_string()));
    };
    if name_node.opcode != Opcode::Str {
        return Err(type_error(
            name_node.line,
            "freeze expects a string literal name".to_string(),
        ));
    }
    let name = name_node.text();
    match cg.ctx_mut().vars.get_mut(name) {
        Some(binding) => {
            binding.mutable = false;
            Ok(IrValue::Void)
        }
        None => Err(type_error(
            node.line,
            format!("freeze: unknown name {:?}", name),
        )),
    }
}

/// `(define name expr)`: application-form binding; the form recursive
/// definitions use.
fn lower_define(cg: &mut CodeGen, node: &Node, args: &[Node]) -> Result<IrValue, CodeGenError> {
    let [name_node, value_node] = args else {
        return Err(type_error(
            node.line,
            "define expects a name and a value".to_string(),
        ));
    };
    if name_node.opcode != Opcode::Identifier {
        return Err(type_error(
            name_node.line,
            "define expects an identifier".to_string(),
        ));
    }
    let name = name_node.text().to_string();
    let value = if value_node.opcode == Opcode::Function {
        functions::lower_function_value(cg, value_node, Some(&name))?
    } else {
        cg.lower_expr(value_node)?
    };
    cg.bind_var(&name, value, false, node.line)?;
    Ok(IrValue::Void)
}

// ----------------------------------------------------------------------
// Boolean forms

/// Short-circuiting `and`/`or` over numeric conditions; yields 0/1.
fn lower_and_or(
    cg: &mut CodeGen,
    node: &Node,
    args: &[Node],
    is_and: bool,
) -> Result<IrValue, CodeGenError> {
    if args.len() != 2 {
        return Err(type_error(
            node.line,
            format!("expected 2 arguments, got {}", args.len()),
        ));
    }
    let lhs_v = cg.lower_expr(&args[0])?;
    let lhs = cg.to_cond(&lhs_v);
    let lhs_pred = cg.current_block.clone();

    let rhs_l = cg.fresh_block(if is_and { "andrhs" } else { "orrhs" });
    let done_l = cg.fresh_block(if is_and { "anddone" } else { "ordone" });
    if is_and {
        cg.emit(format!("br i1 {}, label %{}, label %{}", lhs, rhs_l, done_l));
    } else {
        cg.emit(format!("br i1 {}, label %{}, label %{}", lhs, done_l, rhs_l));
    }

    cg.emit_label(&rhs_l);
    let rhs_v = cg.lower_expr(&args[1])?;
    let rhs = cg.to_cond(&rhs_v);
    let rhs64 = cg.fresh_temp();
    cg.emit(format!("{} = zext i1 {} to i64", rhs64, rhs));
    let rhs_pred = cg.current_block.clone();
    cg.emit(format!("br label %{}", done_l));

    cg.emit_label(&done_l);
    let short_value = if is_and { "0" } else { "1" };
    let reg = cg.fresh_temp();
    cg.emit(format!(
        "{} = phi i64 [ {}, %{} ], [ {}, %{} ]",
        reg, short_value, lhs_pred, rhs64, rhs_pred
    ));
    Ok(IrValue::Int(reg))
}

fn lower_not(cg: &mut CodeGen, node: &Node, args: &[Node]) -> Result<IrValue, CodeGenError> {
    let [arg] = args else {
        return Err(type_error(node.line, "not expects one argument".to_string()));
    };
    let v = cg.lower_expr(arg)?;
    let cond = cg.to_cond(&v);
    let flipped = cg.fresh_temp();
    cg.emit(format!("{} = xor i1 {}, true", flipped, cond));
    let reg = cg.fresh_temp();
    cg.emit(format!("{} = zext i1 {} to i64", reg, flipped));
    Ok(IrValue::Int(reg))
}
