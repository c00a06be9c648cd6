//! MIR to SIR lowering
//!
//! Each function body is lowered by walking its MIR tree with an explicit
//! value stack: every expression leaves exactly one [`MirValue`] on the
//! stack, statements leave none. Structured control flow is flattened into
//! labelled basic blocks, with forward jumps back-patched once their
//! destination is known.
//!
//! Problems found while lowering are collected rather than aborting, so a
//! single run reports every internal error of a module.

mod builder;
mod call;
mod control_flow;
mod debug;
mod expr;
mod layout;
mod scope;
mod stmt;
mod type_map;
mod value;

use std::collections::HashMap;

use tracing::{debug, info};

use crate::config::CodegenConfig;
use crate::error::{CompileError, Result};
use crate::mir::{Mir, MirContext, MirFunc, MirNode};
use crate::sir::pass::PassManager;
use crate::sir::verify::{prune_unreachable_blocks, verify_module};
use crate::sir::{
    BasicBlock, SirAlloca, SirFunction, SirInst, SirModule, SirStruct, SirTaggedUnion, SirValue,
    Terminator,
};
use crate::span::Span;
use crate::types::{SymbolKind, SymbolTable, Type};
use crate::util::mangle;

use builder::{FunctionBuilder, PatchHandle};
use debug::DwarfScopes;
use scope::{LocalScope, NameGen};

pub use layout::{Layout, LayoutTable, UnionLayout};
pub use type_map::TypeMapper;
pub use value::{MirValue, ValueKind};

/// Remaining stack below which deep MIR trees get a fresh segment
const STACK_RED_ZONE: usize = 128 * 1024;
/// Size of each newly allocated stack segment
const STACK_GROW_SIZE: usize = 4 * 1024 * 1024;

/// How a call chain result is wanted
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EvalMode {
    /// Load the final location into a value
    Value,
    /// Leave the location itself on the stack
    Address,
}

/// Lower a resolved MIR context into a SIR module
pub fn lower_program(
    ctx: &MirContext,
    symbols: &SymbolTable,
    config: &CodegenConfig,
) -> Result<SirModule> {
    let target_triple = config.resolved_target_triple();
    info!(
        target = %target_triple,
        structs = ctx.structs.len(),
        functions = ctx.impls.len(),
        "lowering module"
    );

    let mut module = SirModule::new(target_triple.clone());
    // records are always built; `debug_info` only decides whether they print
    let scopes = debug::generate(&mut module.debug_info, ctx, symbols, config, &target_triple);
    let env = ModuleEnv::new(ctx, symbols);
    let mut errors = Vec::new();

    emit_tagged_unions(&env, ctx, &mut module, &mut errors);
    emit_structs(&env, ctx, &mut module);
    debug!(
        tagged_unions = module.tagged_unions.len(),
        structs = module.structs.len(),
        "emitted type declarations"
    );
    for func in &ctx.decls {
        module.func_decls.push(declaration(&env, func));
    }
    debug!(count = module.func_decls.len(), "emitted function declarations");
    for func in &ctx.impls {
        errors.extend(emit_func_impl(&env, func, &mut module, &scopes));
    }
    if errors.is_empty() {
        errors.extend(PassManager::standard().run(&mut module));
    }

    if config.verify {
        for error in verify_module(&module) {
            errors.push(CompileError::internal(error.to_string(), Span::default()));
        }
    }
    if !errors.is_empty() {
        return Err(CompileError::Lowering { errors });
    }
    Ok(module)
}

/// Read-only lookup state shared by every function body
struct ModuleEnv<'a> {
    symbols: &'a SymbolTable,
    types: TypeMapper,
    layouts: LayoutTable,
    /// Full function type per variadic callee, `(i8*, ...)`
    variadic: HashMap<String, String>,
}

impl<'a> ModuleEnv<'a> {
    fn new(ctx: &MirContext, symbols: &'a SymbolTable) -> Self {
        let types = TypeMapper::new(symbols);
        let variadic = ctx
            .decls
            .iter()
            .chain(&ctx.impls)
            .filter(|f| f.with_va_args)
            .map(|f| {
                let mut params: Vec<String> = f.params.iter().map(|(_, ty)| types.map(ty)).collect();
                params.push("...".to_string());
                (f.name.clone(), format!("({})", params.join(", ")))
            })
            .collect();
        Self {
            symbols,
            layouts: LayoutTable::compute(ctx, symbols),
            types,
            variadic,
        }
    }
}

fn emit_tagged_unions(
    env: &ModuleEnv<'_>,
    ctx: &MirContext,
    module: &mut SirModule,
    errors: &mut Vec<CompileError>,
) {
    for tu in &ctx.tagged_unions {
        let ty = tu.ty();
        let Some(layout) = env.layouts.union_layout(&ty) else {
            errors.push(CompileError::internal_in(
                format!("no layout for tagged union {}", ty.full_path_name()),
                tu.span,
                tu.file.clone(),
            ));
            continue;
        };
        let mut member_types = Vec::new();
        if let Some(max_align) = &layout.max_align_type {
            member_types.push(if max_align.is_array {
                env.types.map_array(max_align)
            } else {
                env.types.map(max_align)
            });
            if layout.union_size > layout.max_align_size {
                member_types.push(format!(
                    "[{} x i8]",
                    layout.union_size - layout.max_align_size
                ));
            }
        }
        module.tagged_unions.push(SirTaggedUnion {
            name: mangle(&ty.full_path_name()),
            member_types,
            size: layout.layout.size,
            align: layout.layout.align,
        });
    }
}

fn emit_structs(env: &ModuleEnv<'_>, ctx: &MirContext, module: &mut SirModule) {
    for s in &ctx.structs {
        let ty = s.ty();
        let layout = env.layouts.struct_layout(&ty).unwrap_or(Layout { size: 1, align: 1 });
        module.structs.push(SirStruct {
            name: mangle(&ty.full_path_name()),
            field_types: s
                .field_types
                .iter()
                .map(|f| {
                    if f.is_array {
                        env.types.map_array(f)
                    } else {
                        env.types.map(f)
                    }
                })
                .collect(),
            size: layout.size,
            align: layout.align,
        });
    }
}

/// Signature-only function record
fn declaration(env: &ModuleEnv<'_>, func: &MirFunc) -> SirFunction {
    SirFunction {
        name: func.name.clone(),
        params: func
            .params
            .iter()
            .map(|(name, ty)| (format!("{name}.param"), env.types.map(ty)))
            .collect(),
        return_type: env.types.map(&func.return_type),
        attributes: func.attributes.clone(),
        with_va_args: func.with_va_args,
        span: func.span,
        file: func.file.clone(),
        ..SirFunction::default()
    }
}

fn emit_func_impl(
    env: &ModuleEnv<'_>,
    func: &MirFunc,
    module: &mut SirModule,
    scopes: &DwarfScopes,
) -> Vec<CompileError> {
    let debug_scope = scopes.impl_scopes.get(&func.name).copied();
    let mut sir = declaration(env, func);
    sir.debug_index = debug_scope;

    let mut lowering = FunctionLowering::new(env, module, &func.file, debug_scope);
    lowering.lower_params(&func.params);
    match &func.block {
        Some(body) => lowering.lower_node(body),
        None => lowering.internal(func.span, format!("function {} has no body", func.name)),
    }
    let fallback = if func.return_type.is_void() {
        Terminator::Return {
            ty: "void".to_string(),
            value: None,
        }
    } else {
        Terminator::Unreachable
    };
    let (allocas, blocks, errors) = lowering.finish(fallback);
    sir.allocas = allocas;
    sir.blocks = blocks;

    let pruned = prune_unreachable_blocks(&mut sir);
    debug!(
        function = %func.name,
        blocks = sir.blocks.len(),
        pruned,
        "lowered function"
    );
    module.func_impls.push(sir);
    errors
}

/// Lowering state of one function body
struct FunctionLowering<'a> {
    env: &'a ModuleEnv<'a>,
    module: &'a mut SirModule,
    file: String,
    debug_scope: Option<u64>,
    builder: FunctionBuilder,
    locals: LocalScope,
    ssa: NameGen,
    vars: NameGen,
    arrays: NameGen,
    stack: Vec<MirValue>,
    /// Pending exits of the enclosing branches
    branch_jump_out: Vec<Vec<PatchHandle>>,
    /// Pending `break` jumps per enclosing loop
    break_jumps: Vec<Vec<PatchHandle>>,
    /// Pending `continue` jumps per enclosing loop
    continue_jumps: Vec<Vec<PatchHandle>>,
    errors: Vec<CompileError>,
}

impl<'a> FunctionLowering<'a> {
    fn new(
        env: &'a ModuleEnv<'a>,
        module: &'a mut SirModule,
        file: &str,
        debug_scope: Option<u64>,
    ) -> Self {
        Self {
            env,
            module,
            file: file.to_string(),
            debug_scope,
            builder: FunctionBuilder::new(),
            locals: LocalScope::new(),
            ssa: NameGen::new(),
            vars: NameGen::new(),
            arrays: NameGen::new(),
            stack: Vec::new(),
            branch_jump_out: Vec::new(),
            break_jumps: Vec::new(),
            continue_jumps: Vec::new(),
            errors: Vec::new(),
        }
    }

    /// Spill every parameter into a stack slot named after it
    fn lower_params(&mut self, params: &[(String, Type)]) {
        self.locals.push();
        for (name, ty) in params {
            let mapped = self.map(ty);
            // `.slot` keeps the copy apart from locals and `.param` values
            let slot = format!("{name}.slot");
            self.builder.add_alloca(slot.clone(), mapped.clone());
            self.emit(SirInst::Store {
                ty: mapped,
                source: SirValue::variable(format!("{name}.param")),
                dest: SirValue::variable(slot.clone()),
            });
            self.locals.insert(name.clone(), slot);
        }
    }

    fn finish(
        self,
        fallback: Terminator,
    ) -> (Vec<SirAlloca>, Vec<BasicBlock>, Vec<CompileError>) {
        let (allocas, blocks) = self.builder.finish(fallback);
        (allocas, blocks, self.errors)
    }

    fn internal(&mut self, span: Span, message: impl Into<String>) {
        self.errors
            .push(CompileError::internal_in(message, span, self.file.clone()));
    }

    fn push(&mut self, value: MirValue) {
        self.stack.push(value);
    }

    fn pop(&mut self, span: Span) -> MirValue {
        match self.stack.pop() {
            Some(value) => value,
            None => {
                self.internal(span, "value stack is empty");
                MirValue::nil(Type::void())
            }
        }
    }

    fn emit(&mut self, inst: SirInst) {
        self.builder.push_inst(inst);
    }

    fn map(&self, ty: &Type) -> String {
        self.env.types.map(ty)
    }

    /// Fresh SSA temporary name
    fn temp(&mut self) -> String {
        format!("_{}", self.ssa.next())
    }

    /// Hidden stack slot of IR type `ty`; returns the pointer temporary
    fn hidden_slot(&mut self, ty: &str) -> String {
        let target = self.temp();
        let source = format!("{target}.r");
        self.builder.add_alloca(source.clone(), ty);
        self.emit(SirInst::TempPtr {
            target: target.clone(),
            source,
            ty: ty.to_string(),
        });
        target
    }

    /// Load through a location value, one level of indirection
    fn load(&mut self, location: &MirValue) -> MirValue {
        let ty = location.ty.ref_copy();
        let dest = self.temp();
        self.emit(SirInst::Load {
            ty: self.map(&ty),
            source: location.to_sir(),
            dest: SirValue::variable(dest.clone()),
        });
        MirValue::variable(dest, ty)
    }

    fn symbol_kind(&self, ty: &Type) -> SymbolKind {
        self.env.symbols.search_symbol_kind(ty)
    }

    /// Lower one node, keeping the value stack balanced
    fn lower_node(&mut self, node: &MirNode) {
        stacker::maybe_grow(STACK_RED_ZONE, STACK_GROW_SIZE, || {
            let depth = self.stack.len();
            self.lower_node_inner(node);
            let expected = depth + usize::from(node.node.is_expression());
            if self.stack.len() != expected {
                self.internal(
                    node.span,
                    format!(
                        "unbalanced value stack after {}: expected {expected}, found {}",
                        node.node.kind_name(),
                        self.stack.len()
                    ),
                );
                self.stack.truncate(expected);
                while self.stack.len() < expected {
                    self.stack.push(MirValue::nil(Type::void()));
                }
            }
        });
    }

    fn lower_node_inner(&mut self, node: &MirNode) {
        let span = node.span;
        match &node.node {
            Mir::Block { content } => self.lower_block(content),
            Mir::Unary { op, ty, value } => self.lower_unary(*op, ty, value),
            Mir::Binary {
                op,
                ty,
                left,
                right,
            } => {
                if op.is_short_circuit() {
                    self.lower_short_circuit(*op, ty, left, right);
                } else {
                    self.lower_binary(*op, ty, left, right, span);
                }
            }
            Mir::TypeConvert { source, target } => self.lower_type_convert(source, target),
            Mir::Nil { ty } => self.push(MirValue::nil(ty.clone())),
            Mir::Number { literal, ty } => self.lower_number(literal, ty),
            Mir::Str { literal, ty } => self.lower_string(literal, ty),
            Mir::Char { literal, ty } => {
                self.push(MirValue::literal(literal.to_string(), ty.clone()))
            }
            Mir::Bool { literal, ty } => {
                let text = if *literal { "1" } else { "0" };
                self.push(MirValue::literal(text, ty.clone()));
            }
            Mir::Array { size, ty, values } => self.lower_array(*size, ty, values),
            Mir::StructInit { ty, fields } => self.lower_struct_init(ty, fields, span),
            Mir::Call { .. } => self.lower_call(node, EvalMode::Value),
            Mir::CallId { name, ty } => self.lower_call_id(name, ty, span),
            Mir::CallIndex { .. }
            | Mir::CallFunc { .. }
            | Mir::GetField { .. }
            | Mir::GetPath { .. }
            | Mir::PtrGetField { .. } => self.internal(
                span,
                format!("{} outside of a call chain", node.node.kind_name()),
            ),
            Mir::Define { name, ty, init } => self.lower_define(name, ty, init),
            Mir::Assign { op, left, right } => self.lower_assign(*op, left, right, span),
            Mir::Branch { arms } => self.lower_branch(arms),
            Mir::Switch {
                condition,
                cases,
                default,
            } => self.lower_switch(condition, cases, default.as_deref(), span),
            Mir::Break => self.lower_break(span),
            Mir::Continue => self.lower_continue(span),
            Mir::Loop {
                condition,
                body,
                update,
            } => self.lower_loop(condition, body, update.as_deref()),
            Mir::Return { value, return_ref } => {
                self.lower_return(value.as_deref(), *return_ref, span)
            }
        }
    }
}

