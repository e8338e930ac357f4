//! LLVM IR lowering via text
//!
//! Generates LLVM IR as text (.ll) and leaves assembling/linking to the
//! driver. This is simpler and more portable than binding the LLVM API.
//!
//! # Lowering strategy
//!
//! Every IR value the engine tracks is either *raw* (i64/double) or *boxed*
//! (a universal-value pointer); [`IrValue`] encodes the distinction in the
//! type system so a missing boxing step is unrepresentable. Primitives stay
//! raw through arithmetic and control flow; polymorphic boundaries
//! (collections, closure results of unknown tag, dynamic calls) go through
//! the `franz_rt_*` boxing helpers.
//!
//! Functions compile to `i64 @fz_fn_N([ptr %env,] i64 %a0, i32 %t0, …)`:
//! one (payload, type-tag) operand pair per parameter, the environment
//! pointer present iff the function captures, float results bitcast into
//! the i64 return, and the closure record's return tag telling call sites
//! how to interpret the bits.

pub mod collections;
pub mod control_flow;
pub mod functions;
pub mod runtime;

use crate::ast::{Node, Opcode};
use crate::builtins::{self, Builtin};
use crate::config::CompilerConfig;
use std::collections::HashMap;
use std::fmt;
use std::fmt::Write as _;

/// Value tags, mirrored from the runtime's numbering. Do not renumber.
pub const TAG_INT: i64 = 0;
pub const TAG_FLOAT: i64 = 1;
pub const TAG_STR: i64 = 2;
pub const TAG_VOID: i64 = 3;
pub const TAG_LIST: i64 = 5;
pub const TAG_DICT: i64 = 6;
pub const TAG_CLOSURE: i64 = 8;
pub const TAG_REF: i64 = 9;

/// Closure record return tags.
pub const RET_INT: i64 = 0;
pub const RET_FLOAT: i64 = 1;
pub const RET_POINTER: i64 = 2;
pub const RET_CLOSURE: i64 = 3;
pub const RET_VOID: i64 = 4;

#[derive(Debug)]
pub enum CodeGenError {
    /// A compiler bug or unsupported construct
    Logic(String),
    /// A user-level type error detected statically
    Type { line: usize, message: String },
    Format(std::fmt::Error),
}

impl fmt::Display for CodeGenError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CodeGenError::Logic(s) => write!(f, "{}", s),
            CodeGenError::Type { line, message } => {
                write!(f, "Type Error @ Line {}: {}", line, message)
            }
            CodeGenError::Format(e) => write!(f, "IR generation error: {}", e),
        }
    }
}

impl std::error::Error for CodeGenError {}

impl From<std::fmt::Error> for CodeGenError {
    fn from(e: std::fmt::Error) -> Self {
        CodeGenError::Format(e)
    }
}

pub(crate) fn type_error(line: usize, message: impl Into<String>) -> CodeGenError {
    CodeGenError::Type {
        line,
        message: message.into(),
    }
}

/// A lowered value: raw primitives, boxed universal pointers, or a dynamic
/// (payload, tag) pair whose kind is only known at run time.
#[derive(Debug, Clone, PartialEq)]
pub enum IrValue {
    /// Raw i64 operand (register or literal text)
    Int(String),
    /// Raw double operand
    Float(String),
    /// Universal value pointer; `tag` when statically known, `owned` when
    /// this is a fresh reference the current frame must release
    Boxed {
        reg: String,
        tag: Option<i64>,
        owned: bool,
    },
    /// Honest (bits, tag) pair in registers
    Pair { bits: String, tag: String },
    Void,
}

/// How a name is bound inside the current function.
#[derive(Debug, Clone)]
pub(crate) enum VarBinding {
    /// Immutable SSA-style binding
    Direct(IrValue),
    /// Parameter or `mut` local living in a (bits, tag) alloca pair;
    /// every use loads fresh
    Slot { bits_ptr: String, tag_ptr: String },
}

#[derive(Debug, Clone)]
pub(crate) struct Binding {
    pub binding: VarBinding,
    pub mutable: bool,
}

/// A function with a known code symbol, callable directly.
#[derive(Debug, Clone)]
pub struct KnownFn {
    pub ir_name: String,
    pub arity: usize,
    pub has_env: bool,
    pub return_tag: i64,
}

/// Early-exit slot of the innermost loop.
#[derive(Debug, Clone)]
pub(crate) struct LoopCtx {
    pub bits_slot: String,
    pub tag_slot: String,
    pub check_label: String,
}

/// Per-function lowering state.
pub(crate) struct FnCtx {
    pub vars: HashMap<String, Binding>,
    pub loops: Vec<LoopCtx>,
    /// Set when this function was bound to a name (enables self calls and
    /// tail-call jumps): the surface name plus the callable description.
    pub self_fn: Option<(String, KnownFn)>,
    /// Param slots in declaration order, for tail-call rebinding.
    pub param_slots: Vec<(String, String)>,
    /// Label of the body head block (tail-call jump target).
    pub body_label: String,
    pub ret_kind: RetKind,
    /// Current block already ended with a terminator.
    pub terminated: bool,
}

impl FnCtx {
    pub(crate) fn new(ret_kind: RetKind) -> FnCtx {
        FnCtx {
            vars: HashMap::new(),
            loops: Vec::new(),
            self_fn: None,
            param_slots: Vec::new(),
            body_label: String::new(),
            ret_kind,
            terminated: false,
        }
    }
}

/// Statically inferred return kind of a function.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetKind {
    Int,
    Float,
    Pointer,
    Closure,
    Void,
}

impl RetKind {
    pub fn ret_tag(self) -> i64 {
        match self {
            RetKind::Int => RET_INT,
            RetKind::Float => RET_FLOAT,
            RetKind::Pointer => RET_POINTER,
            RetKind::Closure => RET_CLOSURE,
            RetKind::Void => RET_VOID,
        }
    }
}

pub struct CodeGen {
    pub(crate) config: CompilerConfig,
    /// Emission buffer stack; the innermost buffer receives instructions.
    bufs: Vec<String>,
    /// Owned-temporary frames, parallel to `bufs`.
    owned: Vec<Vec<String>>,
    /// Finished function definitions.
    pub(crate) functions: String,
    string_globals: String,
    string_constants: HashMap<String, String>,
    temp_counter: usize,
    block_counter: usize,
    pub(crate) fn_counter: usize,
    /// Function context stack; the program body is at the bottom.
    pub(crate) fns: Vec<FnCtx>,
    /// Name → directly-callable function (non-capturing definitions).
    pub(crate) known_fns: HashMap<String, KnownFn>,
    /// Label of the basic block currently receiving instructions; phi
    /// emission uses it for predecessor operands.
    pub(crate) current_block: String,
}

impl CodeGen {
    pub fn new(config: CompilerConfig) -> CodeGen {
        CodeGen {
            config,
            bufs: Vec::new(),
            owned: Vec::new(),
            functions: String::new(),
            string_globals: String::new(),
            string_constants: HashMap::new(),
            temp_counter: 0,
            block_counter: 0,
            fn_counter: 0,
            fns: Vec::new(),
            known_fns: HashMap::new(),
            current_block: "entry".to_string(),
        }
    }

    // ------------------------------------------------------------------
    // Emission plumbing

    pub(crate) fn emit(&mut self, line: impl AsRef<str>) {
        let buf = self.bufs.last_mut().expect("no emission buffer");
        buf.push_str("  ");
        buf.push_str(line.as_ref());
        buf.push('\n');
    }

    pub(crate) fn emit_label(&mut self, label: &str) {
        let buf = self.bufs.last_mut().expect("no emission buffer");
        buf.push_str(label);
        buf.push_str(":\n");
        self.current_block = label.to_string();
        self.ctx_mut().terminated = false;
    }

    pub(crate) fn fresh_temp(&mut self) -> String {
        let name = format!("%t{}", self.temp_counter);
        self.temp_counter += 1;
        name
    }

    pub(crate) fn fresh_block(&mut self, prefix: &str) -> String {
        let name = format!("{}{}", prefix, self.block_counter);
        self.block_counter += 1;
        name
    }

    pub(crate) fn push_frame(&mut self) {
        self.bufs.push(String::new());
        self.owned.push(Vec::new());
    }

    /// Pop the innermost buffer; leftover owned temps are the caller's to
    /// release or splice.
    pub(crate) fn pop_frame(&mut self) -> (String, Vec<String>) {
        (
            self.bufs.pop().expect("frame underflow"),
            self.owned.pop().expect("owned underflow"),
        )
    }

    pub(crate) fn splice(&mut self, text: &str) {
        self.bufs
            .last_mut()
            .expect("no emission buffer")
            .push_str(text);
    }

    pub(crate) fn ctx(&self) -> &FnCtx {
        self.fns.last().expect("no function context")
    }

    pub(crate) fn ctx_mut(&mut self) -> &mut FnCtx {
        self.fns.last_mut().expect("no function context")
    }

    // ------------------------------------------------------------------
    // Ownership bookkeeping

    pub(crate) fn note_owned(&mut self, reg: &str) {
        self.owned
            .last_mut()
            .expect("no owned frame")
            .push(reg.to_string());
    }

    /// Remove a register from the cleanup lists (its ownership moved).
    pub(crate) fn claim(&mut self, reg: &str) {
        for frame in self.owned.iter_mut().rev() {
            if let Some(pos) = frame.iter().position(|r| r == reg) {
                frame.remove(pos);
                return;
            }
        }
    }

    pub(crate) fn owned_marker(&self) -> usize {
        self.owned.last().map(|f| f.len()).unwrap_or(0)
    }

    /// Release temps noted since `marker`, keeping `keep` alive.
    pub(crate) fn release_owned_since(&mut self, marker: usize, keep: Option<&str>) {
        let frame = self.owned.last_mut().expect("no owned frame");
        let released: Vec<String> = frame.split_off(marker.min(frame.len()));
        for reg in released {
            if keep == Some(reg.as_str()) {
                // keep stays noted so an enclosing cleanup can see it
                self.owned.last_mut().unwrap().push(reg);
            } else {
                self.emit(format!("call void @franz_rt_release(ptr {})", reg));
            }
        }
    }

    /// Register a fresh owned Boxed result.
    pub(crate) fn fresh_owned_boxed(&mut self, reg: String, tag: Option<i64>) -> IrValue {
        self.note_owned(&reg);
        IrValue::Boxed {
            reg,
            tag,
            owned: true,
        }
    }

    // ------------------------------------------------------------------
    // String globals

    /// Escape a string for an LLVM IR constant.
    pub(crate) fn escape_llvm_string(s: &str) -> Result<String, std::fmt::Error> {
        let mut result = String::new();
        for ch in s.chars() {
            match ch {
                ' '..='!' | '#'..='[' | ']'..='~' => result.push(ch),
                '\\' => result.push_str(r"\\"),
                '"' => result.push_str(r"\22"),
                '\n' => result.push_str(r"\0A"),
                '\r' => result.push_str(r"\0D"),
                '\t' => result.push_str(r"\09"),
                _ => {
                    for byte in ch.to_string().as_bytes() {
                        write!(&mut result, r"\{:02X}", byte)?;
                    }
                }
            }
        }
        Ok(result)
    }

    /// Get or create an interned global string constant; returns `@.str.N`.
    pub(crate) fn get_string_global(&mut self, s: &str) -> Result<String, CodeGenError> {
        if let Some(name) = self.string_constants.get(s) {
            return Ok(name.clone());
        }
        let name = format!("@.str.{}", self.string_constants.len());
        let escaped = Self::escape_llvm_string(s)?;
        let len = s.len() + 1;
        writeln!(
            &mut self.string_globals,
            "{} = private unnamed_addr constant [{} x i8] c\"{}\\00\"",
            name, len, escaped
        )?;
        self.string_constants.insert(s.to_string(), name.clone());
        Ok(name)
    }

    // ------------------------------------------------------------------
    // Coercions between the value shapes

    /// Honest (bits, tag) operand pair for a call site. Borrows; never
    /// transfers ownership.
    pub(crate) fn to_pair(&mut self, v: &IrValue) -> (String, String) {
        match v {
            IrValue::Int(x) => (x.clone(), TAG_INT.to_string()),
            IrValue::Float(x) => {
                let reg = self.fresh_temp();
                self.emit(format!("{} = bitcast double {} to i64", reg, x));
                (reg, TAG_FLOAT.to_string())
            }
            IrValue::Boxed { reg, tag, .. } => match tag {
                Some(TAG_INT) => {
                    let r = self.fresh_temp();
                    self.emit(format!("{} = call i64 @franz_rt_unbox_int(ptr {})", r, reg));
                    (r, TAG_INT.to_string())
                }
                Some(TAG_FLOAT) => {
                    let f = self.fresh_temp();
                    self.emit(format!(
                        "{} = call double @franz_rt_unbox_float(ptr {})",
                        f, reg
                    ));
                    let r = self.fresh_temp();
                    self.emit(format!("{} = bitcast double {} to i64", r, f));
                    (r, TAG_FLOAT.to_string())
                }
                Some(t) => {
                    let r = self.fresh_temp();
                    self.emit(format!("{} = ptrtoint ptr {} to i64", r, reg));
                    (r, t.to_string())
                }
                None => {
                    let bits = self.fresh_temp();
                    self.emit(format!(
                        "{} = call i64 @franz_rt_pair_bits(ptr {})",
                        bits, reg
                    ));
                    let tag = self.fresh_temp();
                    self.emit(format!("{} = call i32 @franz_rt_tag(ptr {})", tag, reg));
                    (bits, tag)
                }
            },
            IrValue::Pair { bits, tag } => (bits.clone(), tag.clone()),
            IrValue::Void => ("0".to_string(), TAG_VOID.to_string()),
        }
    }

    /// Universal value pointer for a boxing boundary. Fresh results are
    /// noted as owned temps.
    pub(crate) fn to_boxed(&mut self, v: &IrValue) -> IrValue {
        match v {
            IrValue::Int(x) => {
                let reg = self.fresh_temp();
                self.emit(format!("{} = call ptr @franz_rt_box_int(i64 {})", reg, x));
                self.fresh_owned_boxed(reg, Some(TAG_INT))
            }
            IrValue::Float(x) => {
                let reg = self.fresh_temp();
                self.emit(format!(
                    "{} = call ptr @franz_rt_box_float(double {})",
                    reg, x
                ));
                self.fresh_owned_boxed(reg, Some(TAG_FLOAT))
            }
            IrValue::Boxed { .. } => v.clone(),
            IrValue::Pair { bits, tag } => {
                let reg = self.fresh_temp();
                self.emit(format!(
                    "{} = call ptr @franz_rt_to_value(i64 {}, i32 {})",
                    reg, bits, tag
                ));
                self.fresh_owned_boxed(reg, None)
            }
            IrValue::Void => {
                let reg = self.fresh_temp();
                self.emit(format!(
                    "{} = call ptr @franz_rt_to_value(i64 0, i32 {})",
                    reg, TAG_VOID
                ));
                self.fresh_owned_boxed(reg, Some(TAG_VOID))
            }
        }
    }

    /// i1 register for a condition.
    pub(crate) fn to_cond(&mut self, v: &IrValue) -> String {
        match v {
            IrValue::Int(x) => {
                let reg = self.fresh_temp();
                self.emit(format!("{} = icmp ne i64 {}, 0", reg, x));
                reg
            }
            IrValue::Float(x) => {
                let reg = self.fresh_temp();
                self.emit(format!("{} = fcmp one double {}, 0.0", reg, x));
                reg
            }
            _ => {
                let (bits, tag) = self.to_pair(v);
                let flag = self.fresh_temp();
                self.emit(format!(
                    "{} = call i64 @franz_rt_cond(i64 {}, i32 {})",
                    flag, bits, tag
                ));
                let reg = self.fresh_temp();
                self.emit(format!("{} = icmp ne i64 {}, 0", reg, flag));
                reg
            }
        }
    }

    /// Raw i64 (loop counts and the like). Floats truncate, dynamic values
    /// unbox with a runtime TYPE check.
    pub(crate) fn to_raw_int(&mut self, v: &IrValue) -> String {
        match v {
            IrValue::Int(x) => x.clone(),
            IrValue::Float(x) => {
                let reg = self.fresh_temp();
                self.emit(format!("{} = fptosi double {} to i64", reg, x));
                reg
            }
            _ => {
                let boxed = self.to_boxed(v);
                let IrValue::Boxed { reg, .. } = &boxed else {
                    unreachable!()
                };
                let out = self.fresh_temp();
                self.emit(format!("{} = call i64 @franz_rt_unbox_int(ptr {})", out, reg));
                out
            }
        }
    }

    // ------------------------------------------------------------------
    // Variables

    pub(crate) fn lookup_var(&mut self, name: &str) -> Option<IrValue> {
        let binding = self.ctx().vars.get(name)?.clone();
        Some(match binding.binding {
            VarBinding::Direct(v) => {
                // Lookups hand out borrowed references.
                match v {
                    IrValue::Boxed { reg, tag, .. } => IrValue::Boxed {
                        reg,
                        tag,
                        owned: false,
                    },
                    other => other,
                }
            }
            VarBinding::Slot { bits_ptr, tag_ptr } => {
                let bits = self.fresh_temp();
                self.emit(format!("{} = load i64, ptr {}", bits, bits_ptr));
                let tag = self.fresh_temp();
                self.emit(format!("{} = load i32, ptr {}", tag, tag_ptr));
                IrValue::Pair { bits, tag }
            }
        })
    }

    // ------------------------------------------------------------------
    // Statement and expression dispatch

    /// Lower a statement sequence; yields the fall-through value (the last
    /// statement's value).
    pub(crate) fn lower_statements(&mut self, stmt: &Node) -> Result<IrValue, CodeGenError> {
        debug_assert_eq!(stmt.opcode, Opcode::Statement);
        let mut last = IrValue::Void;
        let count = stmt.children.len();
        for (i, child) in stmt.children.iter().enumerate() {
            if self.ctx().terminated {
                break;
            }
            self.emit(format!("call void @franz_rt_set_line(i64 {})", child.line));
            let marker = self.owned_marker();
            let value = self.lower_statement(child)?;
            if self.ctx().terminated {
                // The statement ended the block (return or loop exit); no
                // cleanup can follow a terminator.
                break;
            }
            let is_last = i + 1 == count;
            if is_last {
                let keep = match &value {
                    IrValue::Boxed { reg, owned, .. } if *owned => Some(reg.clone()),
                    _ => None,
                };
                self.release_owned_since(marker, keep.as_deref());
                last = value;
            } else {
                self.release_owned_since(marker, None);
                last = IrValue::Void;
            }
        }
        Ok(last)
    }

    fn lower_statement(&mut self, node: &Node) -> Result<IrValue, CodeGenError> {
        match node.opcode {
            Opcode::Assignment => self.lower_assignment(node),
            Opcode::Return => {
                control_flow::lower_return(self, node)?;
                Ok(IrValue::Void)
            }
            Opcode::Signature => Ok(IrValue::Void),
            _ => self.lower_expr(node),
        }
    }

    pub(crate) fn lower_expr(&mut self, node: &Node) -> Result<IrValue, CodeGenError> {
        match node.opcode {
            Opcode::Int => Ok(IrValue::Int(parse_int_literal(node)?)),
            Opcode::Float => Ok(IrValue::Float(parse_float_literal(node)?)),
            Opcode::Str => {
                let global = self.get_string_global(node.text())?;
                let reg = self.fresh_temp();
                self.emit(format!(
                    "{} = call ptr @franz_rt_string_from_cstr(ptr {})",
                    reg, global
                ));
                Ok(self.fresh_owned_boxed(reg, Some(TAG_STR)))
            }
            Opcode::Identifier => self.lower_identifier(node),
            Opcode::Qualified => {
                let global = self.get_string_global(node.text())?;
                let reg = self.fresh_temp();
                self.emit(format!(
                    "{} = call ptr @franz_rt_qualified_get(ptr {})",
                    reg, global
                ));
                Ok(self.fresh_owned_boxed(reg, None))
            }
            Opcode::List => collections::lower_list_literal(self, node),
            Opcode::Function => functions::lower_function_value(self, node, None),
            Opcode::Application => self.lower_application(node),
            Opcode::Statement => self.lower_statements(node),
            Opcode::Return => {
                control_flow::lower_return(self, node)?;
                Ok(IrValue::Void)
            }
            Opcode::Assignment => self.lower_assignment(node),
            Opcode::Signature => Ok(IrValue::Void),
        }
    }

    fn lower_identifier(&mut self, node: &Node) -> Result<IrValue, CodeGenError> {
        let name = node.text();
        if let Some(v) = self.lookup_var(name) {
            return Ok(v);
        }
        if let Some(known) = self.known_fns.get(name).cloned() {
            return Ok(functions::materialize_known(self, &known));
        }
        if builtins::is_builtin(name) {
            return Err(type_error(
                node.line,
                format!("builtin {:?} cannot be used as a value", name),
            ));
        }
        Err(type_error(
            node.line,
            format!("undefined variable {:?}", name),
        ))
    }

    fn lower_assignment(&mut self, node: &Node) -> Result<IrValue, CodeGenError> {
        let name = node.children[0].text().to_string();
        let value_node = &node.children[1];
        let mutable = node.is_mutable;

        let value = if value_node.opcode == Opcode::Function {
            functions::lower_function_value(self, value_node, Some(&name))?
        } else {
            self.lower_expr(value_node)?
        };
        self.bind_var(&name, value, mutable, node.line)?;
        Ok(IrValue::Void)
    }

    /// Bind a name, taking ownership of the value.
    pub(crate) fn bind_var(
        &mut self,
        name: &str,
        value: IrValue,
        mutable: bool,
        line: usize,
    ) -> Result<(), CodeGenError> {
        if let Some(existing) = self.ctx().vars.get(name) {
            if !existing.mutable {
                return Err(type_error(
                    line,
                    format!("cannot reassign {:?}; it was not bound with 'mut'", name),
                ));
            }
            // Rebinding through a slot keeps captured snapshots and earlier
            // loads intact.
            let existing = existing.clone();
            if let VarBinding::Slot { bits_ptr, tag_ptr } = existing.binding {
                let (bits, tag) = self.to_pair(&value);
                // The slot owns pointer payloads.
                let owned_bits = self.fresh_temp();
                self.emit(format!(
                    "{} = call i64 @franz_rt_own(i64 {}, i32 {})",
                    owned_bits, bits, tag
                ));
                let old_bits = self.fresh_temp();
                self.emit(format!("{} = load i64, ptr {}", old_bits, bits_ptr));
                let old_tag = self.fresh_temp();
                self.emit(format!("{} = load i32, ptr {}", old_tag, tag_ptr));
                self.emit(format!(
                    "call void @franz_rt_slot_release(i64 {}, i32 {})",
                    old_bits, old_tag
                ));
                self.emit(format!("store i64 {}, ptr {}", owned_bits, bits_ptr));
                self.emit(format!("store i32 {}, ptr {}", tag, tag_ptr));
                return Ok(());
            }
        }

        // Fresh binding. Mutable names live in slots so rebinding (and
        // tail-call parameter updates) can store through them; immutable
        // names bind directly.
        if mutable {
            let (bits, tag) = self.to_pair(&value);
            let owned_bits = self.fresh_temp();
            self.emit(format!(
                "{} = call i64 @franz_rt_own(i64 {}, i32 {})",
                owned_bits, bits, tag
            ));
            let bits_ptr = self.fresh_temp();
            self.emit(format!("{} = alloca i64", bits_ptr));
            let tag_ptr = self.fresh_temp();
            self.emit(format!("{} = alloca i32", tag_ptr));
            self.emit(format!("store i64 {}, ptr {}", owned_bits, bits_ptr));
            self.emit(format!("store i32 {}, ptr {}", tag, tag_ptr));
            self.ctx_mut().vars.insert(
                name.to_string(),
                Binding {
                    binding: VarBinding::Slot { bits_ptr, tag_ptr },
                    mutable: true,
                },
            );
        } else {
            // The binding takes over the temp's ownership.
            if let IrValue::Boxed { reg, owned: true, .. } = &value {
                let reg = reg.clone();
                self.claim(&reg);
            }
            self.ctx_mut().vars.insert(
                name.to_string(),
                Binding {
                    binding: VarBinding::Direct(value),
                    mutable: false,
                },
            );
        }
        Ok(())
    }

    // ------------------------------------------------------------------
    // Application dispatch

    fn lower_application(&mut self, node: &Node) -> Result<IrValue, CodeGenError> {
        let head = &node.children[0];
        let args = &node.children[1..];

        if head.opcode == Opcode::Identifier {
            let name = head.text();

            // Local bindings shadow builtins and known functions.
            if !self.ctx().vars.contains_key(name) {
                if let Some(builtin) = builtins::lookup(name) {
                    return self.lower_builtin(node, builtin, args);
                }
                // Self call (recursive reference to the function being
                // lowered resolves by name, never through the environment).
                if let Some((self_name, self_fn)) = self.ctx().self_fn.clone()
                    && self_name == name
                {
                    return functions::lower_self_call(self, &self_fn, node, args);
                }
                if let Some(known) = self.known_fns.get(name).cloned() {
                    return functions::lower_known_call(self, &known, node, args);
                }
            }
        }

        // General case: evaluate the callee, then dispatch on what we know
        // about it statically.
        let callee = self.lower_expr(head)?;
        functions::lower_dynamic_call(self, callee, node, args)
    }

    fn lower_builtin(
        &mut self,
        node: &Node,
        builtin: Builtin,
        args: &[Node],
    ) -> Result<IrValue, CodeGenError> {
        match builtin {
            Builtin::Special(form) => control_flow::lower_special(self, form, node, args),
            Builtin::Arith(op) => collections::lower_arith(self, op, node, args),
            Builtin::Cmp(op) => collections::lower_cmp(self, op, node, args),
            Builtin::Print { newline } => collections::lower_print(self, newline, args),
            Builtin::DictCtor => collections::lower_dict_ctor(self, node, args),
            Builtin::VariantCtor => collections::lower_variant_ctor(self, node, args),
            Builtin::ArgAt => collections::lower_arg_at(self, node, args),
            Builtin::Runtime {
                symbol,
                arity,
                result,
            } => collections::lower_runtime_call(self, symbol, arity, result, node, args),
        }
    }

    // ------------------------------------------------------------------
    // Program emission

    /// Lower a whole program to an LLVM IR module.
    pub fn codegen_program(&mut self, program: &Node) -> Result<String, CodeGenError> {
        // Program body: behaves like a VOID function with no parameters.
        self.fns.push(FnCtx::new(RetKind::Void));
        self.push_frame();
        self.emit_label("entry");
        self.emit("call void @franz_rt_init(i32 %argc, ptr %argv)");
        self.lower_statements(program)?;
        self.release_owned_since(0, None);
        self.emit("call void @franz_rt_shutdown()");
        self.emit("ret i32 0");
        let (body, _owned) = self.pop_frame();
        self.fns.pop();

        let mut ir = String::new();
        writeln!(&mut ir, "; ModuleID = 'franz'")?;
        writeln!(&mut ir, "target triple = \"{}\"", get_target_triple())?;
        writeln!(&mut ir)?;
        writeln!(&mut ir, "; Closure record: {{ func, env, return_tag }}")?;
        writeln!(&mut ir, "%FranzClosure = type {{ ptr, ptr, i64 }}")?;
        writeln!(&mut ir)?;
        if !self.string_globals.is_empty() {
            ir.push_str(&self.string_globals);
            writeln!(&mut ir)?;
        }
        runtime::emit_declarations(&mut ir)?;
        writeln!(&mut ir)?;
        if !self.functions.is_empty() {
            ir.push_str(&self.functions);
        }
        writeln!(&mut ir, "define i32 @main(i32 %argc, ptr %argv) {{")?;
        ir.push_str(&body);
        writeln!(&mut ir, "}}")?;
        Ok(ir)
    }
}

/// Mangle a Franz name into a valid LLVM IR identifier fragment.
pub(crate) fn mangle_name(name: &str) -> String {
    let mut result = String::new();
    for c in name.chars() {
        match c {
            '?' => result.push_str("_Q_"),
            '!' => result.push_str("_BANG_"),
            '-' => result.push('_'),
            '_' | '$' => result.push(c),
            c if c.is_ascii_alphanumeric() => result.push(c),
            _ => result.push_str(&format!("_x{:02X}_", c as u32)),
        }
    }
    result
}

/// Parse an integer literal lexeme (all radixes) to decimal text.
fn parse_int_literal(node: &Node) -> Result<String, CodeGenError> {
    let text = node.text();
    let (negative, body) = match text.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, text),
    };
    let value = if let Some(hex) = body.strip_prefix("0x").or_else(|| body.strip_prefix("0X")) {
        i64::from_str_radix(hex, 16)
    } else if let Some(bin) = body.strip_prefix("0b").or_else(|| body.strip_prefix("0B")) {
        i64::from_str_radix(bin, 2)
    } else if let Some(oct) = body.strip_prefix("0o").or_else(|| body.strip_prefix("0O")) {
        i64::from_str_radix(oct, 8)
    } else {
        body.parse::<i64>()
    }
    .map_err(|_| type_error(node.line, format!("bad integer literal {:?}", text)))?;
    Ok(if negative { -value } else { value }.to_string())
}

/// Parse a float literal lexeme into LLVM's expected constant syntax.
fn parse_float_literal(node: &Node) -> Result<String, CodeGenError> {
    let text = node.text().to_string();
    let value: f64 = if text.contains('x') || text.contains('X') {
        parse_hex_float(&text)
            .ok_or_else(|| type_error(node.line, format!("bad float literal {:?}", text)))?
    } else {
        text.parse()
            .map_err(|_| type_error(node.line, format!("bad float literal {:?}", text)))?
    };
    // Bit-exact constant form accepted by LLVM for doubles.
    Ok(format!("0x{:016X}", value.to_bits()))
}

/// Parse `0x1.8p+1`-style hex floats.
fn parse_hex_float(text: &str) -> Option<f64> {
    let (negative, body) = match text.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, text),
    };
    let body = body
        .strip_prefix("0x")
        .or_else(|| body.strip_prefix("0X"))?;
    let (mantissa_text, exp_text) = match body.split_once(['p', 'P']) {
        Some((m, e)) => (m, e),
        None => (body, "0"),
    };
    let exponent: i32 = exp_text.parse().ok()?;
    let (int_text, frac_text) = match mantissa_text.split_once('.') {
        Some((i, f)) => (i, f),
        None => (mantissa_text, ""),
    };
    let mut value = u64::from_str_radix(int_text, 16).ok()? as f64;
    for (i, d) in frac_text.chars().enumerate() {
        let digit = d.to_digit(16)? as f64;
        value += digit / 16f64.powi(i as i32 + 1);
    }
    let result = value * 2f64.powi(exponent);
    Some(if negative { -result } else { result })
}

/// Target triple for the host platform.
pub(crate) fn get_target_triple() -> &'static str {
    if cfg!(all(target_os = "macos", target_arch = "aarch64")) {
        "arm64-apple-macosx11.0.0"
    } else if cfg!(all(target_os = "macos", target_arch = "x86_64")) {
        "x86_64-apple-macosx10.15.0"
    } else if cfg!(all(target_os = "linux", target_arch = "aarch64")) {
        "aarch64-unknown-linux-gnu"
    } else {
        "x86_64-unknown-linux-gnu"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn int_node(text: &str) -> Node {
        Node::with_value(Opcode::Int, text, 1)
    }

    #[test]
    fn test_int_literal_radixes() {
        assert_eq!(parse_int_literal(&int_node("42")).unwrap(), "42");
        assert_eq!(parse_int_literal(&int_node("0xff")).unwrap(), "255");
        assert_eq!(parse_int_literal(&int_node("0b1010")).unwrap(), "10");
        assert_eq!(parse_int_literal(&int_node("0o77")).unwrap(), "63");
        assert_eq!(parse_int_literal(&int_node("-5")).unwrap(), "-5");
    }

    #[test]
    fn test_hex_float_parsing() {
        assert_eq!(parse_hex_float("0x1.8p+1"), Some(3.0));
        assert_eq!(parse_hex_float("0x2p0"), Some(2.0));
    }

    #[test]
    fn test_float_literal_bit_exact() {
        let node = Node::with_value(Opcode::Float, "2.5", 1);
        let text = parse_float_literal(&node).unwrap();
        assert_eq!(text, format!("0x{:016X}", 2.5f64.to_bits()));
    }

    #[test]
    fn test_mangle() {
        assert_eq!(mangle_name("loop_n"), "loop_n");
        assert_eq!(mangle_name("a-b"), "a_b");
        assert_eq!(mangle_name("x?"), "x_Q_");
    }
}
