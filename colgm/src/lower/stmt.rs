//! Blocks, local definitions, assignments and returns

use crate::mir::{AssignOp, Mir, MirNode};
use crate::sir::{SirBinOp, SirInst, SirValue, Terminator};
use crate::span::Span;
use crate::types::Type;

use super::{EvalMode, FunctionLowering};

fn compound_op(op: AssignOp) -> Option<SirBinOp> {
    match op {
        AssignOp::Eq => None,
        AssignOp::AddEq => Some(SirBinOp::Add),
        AssignOp::SubEq => Some(SirBinOp::Sub),
        AssignOp::MultEq => Some(SirBinOp::Mul),
        AssignOp::DivEq => Some(SirBinOp::Div),
        AssignOp::RemEq => Some(SirBinOp::Rem),
        AssignOp::AndEq => Some(SirBinOp::And),
        AssignOp::XorEq => Some(SirBinOp::Xor),
        AssignOp::OrEq => Some(SirBinOp::Or),
    }
}

impl FunctionLowering<'_> {
    /// Statements in a new local scope; expression statements are dropped
    pub(super) fn lower_block(&mut self, content: &[MirNode]) {
        self.locals.push();
        for stmt in content {
            let depth = self.stack.len();
            self.lower_node(stmt);
            self.stack.truncate(depth);
        }
        self.locals.pop();
    }

    /// Lower a call chain for `mode`, any other expression as a value
    fn lower_operand(&mut self, node: &MirNode, mode: EvalMode) {
        if matches!(node.node, Mir::Call { .. }) {
            self.lower_call(node, mode);
        } else {
            self.lower_node(node);
        }
    }

    pub(super) fn lower_define(&mut self, name: &str, ty: &Type, init: &MirNode) {
        let mut slot_ty = ty.clone();
        slot_ty.is_array = false;
        let slot_ty = self.map(&slot_ty);
        let generated = format!("{name}.{}", self.vars.next());
        self.builder.add_alloca(generated.clone(), slot_ty.clone());

        let mode = if ty.is_reference {
            EvalMode::Address
        } else {
            EvalMode::Value
        };
        self.lower_operand(init, mode);
        let value = self.pop(init.span);
        // bound after the initializer so it still sees outer names
        self.locals.insert(name, generated.clone());
        self.emit(SirInst::Store {
            ty: slot_ty,
            source: value.to_sir(),
            dest: SirValue::variable(generated),
        });
    }

    pub(super) fn lower_assign(
        &mut self,
        op: AssignOp,
        left: &MirNode,
        right: &MirNode,
        span: Span,
    ) {
        if !matches!(left.node, Mir::Call { .. }) {
            self.internal(
                span,
                format!("cannot assign to {}", left.node.kind_name()),
            );
            return;
        }
        self.lower_call(left, EvalMode::Address);
        let target = self.pop(left.span);
        self.lower_node(right);
        let value = self.pop(right.span);
        if !target.is_variable() {
            self.internal(span, "assignment target is not addressable");
            return;
        }

        let value_ty = self.map(&value.ty);
        let Some(op) = compound_op(op) else {
            self.emit(SirInst::Store {
                ty: value_ty,
                source: value.to_sir(),
                dest: target.to_sir(),
            });
            return;
        };

        let stored = target.ty.ref_copy();
        let old = SirValue::variable(self.temp());
        self.emit(SirInst::Load {
            ty: value_ty.clone(),
            source: target.to_sir(),
            dest: old.clone(),
        });
        let result = SirValue::variable(self.temp());
        self.emit(SirInst::Binary {
            op,
            dest: result.clone(),
            left: old,
            right: value.to_sir(),
            is_integer: !stored.is_float(),
            is_signed: !stored.is_unsigned(),
            ty: value_ty.clone(),
        });
        self.emit(SirInst::Store {
            ty: value_ty,
            source: result,
            dest: target.to_sir(),
        });
    }

    pub(super) fn lower_return(&mut self, value: Option<&MirNode>, return_ref: bool, span: Span) {
        let Some(value) = value else {
            self.builder.finish_block(Terminator::Return {
                ty: "void".to_string(),
                value: None,
            });
            return;
        };
        let mode = if return_ref {
            EvalMode::Address
        } else {
            EvalMode::Value
        };
        self.lower_operand(value, mode);
        let result = self.pop(span);
        let terminator = if result.ty.is_void() {
            Terminator::Return {
                ty: "void".to_string(),
                value: None,
            }
        } else {
            Terminator::Return {
                ty: self.map(&result.ty),
                value: Some(result.to_sir()),
            }
        };
        self.builder.finish_block(terminator);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_compound_ops() {
        assert_eq!(compound_op(AssignOp::Eq), None);
        assert_eq!(compound_op(AssignOp::AddEq), Some(SirBinOp::Add));
        assert_eq!(compound_op(AssignOp::XorEq), Some(SirBinOp::Xor));
    }
}
