//! Structured control flow to basic blocks
//!
//! Forward jumps are emitted with an empty target and collected in patch
//! lists: one exit list per branch, a break list and a continue list per
//! loop. Lists are pushed when a construct is entered and patched when its
//! join label is opened, so `break` and `continue` always bind to the
//! innermost loop.

use crate::mir::{BinaryOp, Mir, MirIf, MirNode, MirSwitchCase};
use crate::sir::{SirInst, SirValue, Terminator};
use crate::span::{Span, Spanned};
use crate::types::{SymbolKind, Type};

use super::builder::PatchHandle;
use super::{EvalMode, FunctionLowering, MirValue, ValueKind};

impl FunctionLowering<'_> {
    pub(super) fn lower_branch(&mut self, arms: &[Spanned<MirIf>]) {
        if arms.is_empty() {
            return;
        }
        self.branch_jump_out.push(Vec::new());
        let last = arms.len() - 1;
        for (i, arm) in arms.iter().enumerate() {
            if arm.node.condition.is_none() && i != last {
                self.internal(arm.span, "else arm must be the last arm of a branch");
            }
            self.lower_if_arm(&arm.node, i == last);
        }
        let jumps = self.branch_jump_out.pop().unwrap_or_default();
        let end = self.builder.fresh_label();
        self.builder.patch_all(jumps, end);
        self.builder.start_block(end, "branch.end");
    }

    fn lower_if_arm(&mut self, arm: &MirIf, is_last: bool) {
        let not_taken = match &arm.condition {
            Some(condition) => {
                self.lower_node(condition);
                let cond = self.pop(condition.span);
                let taken = self.builder.fresh_label();
                let branch = self.builder.finish_block(Terminator::Branch {
                    cond: cond.to_sir(),
                    on_true: Some(taken),
                    on_false: None,
                });
                self.builder.start_block(taken, "cond.true");
                Some(PatchHandle::branch_false(branch))
            }
            None => None,
        };

        self.lower_node(&arm.body);
        if self.builder.is_terminated() {
            self.builder.open_fresh("block.end.ret");
        }
        let exit = self.builder.finish_block(Terminator::Goto(None));
        self.push_branch_exit(PatchHandle::goto(exit));

        if let Some(not_taken) = not_taken {
            if is_last {
                self.push_branch_exit(not_taken);
            } else {
                let next = self.builder.fresh_label();
                self.builder.patch(not_taken, next);
                self.builder.start_block(next, "cond.false");
            }
        }
    }

    fn push_branch_exit(&mut self, handle: PatchHandle) {
        if let Some(exits) = self.branch_jump_out.last_mut() {
            exits.push(handle);
        }
    }

    pub(super) fn lower_loop(
        &mut self,
        condition: &MirNode,
        body: &MirNode,
        update: Option<&MirNode>,
    ) {
        let entry = self.builder.fresh_label();
        self.builder.start_block(entry, "loop.entry");
        self.break_jumps.push(Vec::new());
        self.continue_jumps.push(Vec::new());

        self.lower_node(condition);
        let cond = self.pop(condition.span);
        let body_label = self.builder.fresh_label();
        let check = self.builder.finish_block(Terminator::Branch {
            cond: cond.to_sir(),
            on_true: Some(body_label),
            on_false: None,
        });
        self.builder.start_block(body_label, "loop.body");
        self.lower_node(body);
        if self.builder.is_terminated() {
            self.builder.open_fresh("loop.ret.end");
        }

        let next = self.builder.fresh_label();
        self.builder.start_block(next, "loop.continue");
        if let Some(update) = update {
            let depth = self.stack.len();
            self.lower_node(update);
            self.stack.truncate(depth);
        }
        self.builder.finish_block(Terminator::Goto(Some(entry)));

        let exit = self.builder.fresh_label();
        let continues = self.continue_jumps.pop().unwrap_or_default();
        let breaks = self.break_jumps.pop().unwrap_or_default();
        self.builder.patch_all(continues, next);
        self.builder.patch(PatchHandle::branch_false(check), exit);
        self.builder.patch_all(breaks, exit);
        self.builder.start_block(exit, "loop.exit");
    }

    pub(super) fn lower_break(&mut self, span: Span) {
        if self.break_jumps.is_empty() {
            self.internal(span, "break outside of a loop");
            return;
        }
        let jump = self.builder.finish_block(Terminator::Goto(None));
        if let Some(breaks) = self.break_jumps.last_mut() {
            breaks.push(PatchHandle::goto(jump));
        }
        self.builder.open_fresh("break.end");
    }

    pub(super) fn lower_continue(&mut self, span: Span) {
        if self.continue_jumps.is_empty() {
            self.internal(span, "continue outside of a loop");
            return;
        }
        let jump = self.builder.finish_block(Terminator::Goto(None));
        if let Some(continues) = self.continue_jumps.last_mut() {
            continues.push(PatchHandle::goto(jump));
        }
        self.builder.open_fresh("continue.end");
    }

    pub(super) fn lower_switch(
        &mut self,
        condition: &MirNode,
        cases: &[Spanned<MirSwitchCase>],
        default: Option<&MirNode>,
        span: Span,
    ) {
        let (value, value_ty) = self.switch_value(condition, span);
        let switch = self.builder.finish_block(Terminator::Switch {
            value,
            ty: value_ty,
            cases: Vec::new(),
            default: None,
        });

        let mut exits = Vec::new();
        for case in cases {
            let label = self.builder.fresh_label();
            self.builder.add_switch_case(switch, case.node.value, label);
            self.builder
                .start_block(label, format!("switch.case {}", case.node.value));
            self.lower_node(&case.node.body);
            if !self.builder.is_terminated() {
                exits.push(PatchHandle::goto(
                    self.builder.finish_block(Terminator::Goto(None)),
                ));
            }
        }

        let default_label = self.builder.fresh_label();
        self.builder
            .patch(PatchHandle::switch_default(switch), default_label);
        self.builder.start_block(default_label, "switch.default");
        match default {
            Some(body) => {
                self.lower_node(body);
                if !self.builder.is_terminated() {
                    exits.push(PatchHandle::goto(
                        self.builder.finish_block(Terminator::Goto(None)),
                    ));
                }
                let end = self.builder.fresh_label();
                self.builder.patch_all(exits, end);
                self.builder.start_block(end, "switch.end");
            }
            // falls through into the empty default block
            None => self.builder.patch_all(exits, default_label),
        }
    }

    /// Switch operand and its IR type; tagged unions switch on their tag
    fn switch_value(&mut self, condition: &MirNode, span: Span) -> (SirValue, String) {
        let is_union = condition
            .node
            .ty()
            .is_some_and(|ty| self.symbol_kind(ty) == SymbolKind::TaggedUnion);
        if !is_union {
            self.lower_node(condition);
            let value = self.pop(condition.span);
            return (value.to_sir(), self.map(&value.ty));
        }

        if matches!(condition.node, Mir::Call { .. }) {
            self.lower_call(condition, EvalMode::Address);
        } else {
            self.lower_node(condition);
        }
        let mut location = self.pop(condition.span);
        if !location.ty.is_pointer() {
            self.internal(span, "switch over a tagged union value without an address");
            return (location.to_sir(), "i64".to_string());
        }
        while location.ty.pointer_depth > 1 {
            location = self.load(&location);
        }
        let union_ty = location.ty.ref_copy();
        let tag_slot = SirValue::variable(self.temp());
        self.emit(SirInst::GetField {
            dest: tag_slot.clone(),
            source: location.to_sir(),
            struct_ty: self.map(&union_ty),
            index: 0,
        });
        let tag = self.temp();
        self.emit(SirInst::Load {
            ty: "i64".to_string(),
            source: tag_slot,
            dest: SirValue::variable(tag.clone()),
        });
        (SirValue::variable(tag), "i64".to_string())
    }

    /// `and`/`or` with the right operand evaluated only when needed
    pub(super) fn lower_short_circuit(
        &mut self,
        op: BinaryOp,
        ty: &Type,
        left: &MirNode,
        right: &MirNode,
    ) {
        let is_and = op == BinaryOp::CmpAnd;
        self.lower_node(left);
        let lhs = self.pop(left.span);

        // a constant left operand that decides the result skips the right
        let decided = if is_and { "0" } else { "1" };
        if lhs.kind == ValueKind::Literal && lhs.content == decided {
            self.push(MirValue::literal(decided, ty.clone()));
            return;
        }

        let result = self.hidden_slot("i1");
        self.emit(SirInst::Store {
            ty: "i1".to_string(),
            source: lhs.to_sir(),
            dest: SirValue::variable(result.clone()),
        });
        let rhs_label = self.builder.fresh_label();
        let (on_true, on_false) = if is_and {
            (Some(rhs_label), None)
        } else {
            (None, Some(rhs_label))
        };
        let check = self.builder.finish_block(Terminator::Branch {
            cond: lhs.to_sir(),
            on_true,
            on_false,
        });
        self.builder
            .start_block(rhs_label, if is_and { "and.true" } else { "or.false" });

        self.lower_node(right);
        let rhs = self.pop(right.span);
        self.emit(SirInst::Store {
            ty: "i1".to_string(),
            source: rhs.to_sir(),
            dest: SirValue::variable(result.clone()),
        });
        let merge = self.builder.fresh_label();
        self.builder.finish_block(Terminator::Goto(Some(merge)));
        let pending = if is_and {
            PatchHandle::branch_false(check)
        } else {
            PatchHandle::branch_true(check)
        };
        self.builder.patch(pending, merge);
        self.builder
            .start_block(merge, if is_and { "and.end" } else { "or.end" });

        let dest = self.temp();
        self.emit(SirInst::Load {
            ty: "i1".to_string(),
            source: SirValue::variable(result),
            dest: SirValue::variable(dest.clone()),
        });
        self.push(MirValue::variable(dest, ty.clone()));
    }
}
