//! Operators, literals and conversions

use crate::mir::{BinaryOp, MirNode, UnaryOp};
use crate::sir::{CmpKind, ConvertOp, SirBinOp, SirInst, SirValue};
use crate::span::Span;
use crate::types::Type;

use super::{FunctionLowering, MirValue};

/// Arithmetic and bitwise operator of a binary node
pub(super) fn arithmetic_op(op: BinaryOp) -> Option<SirBinOp> {
    match op {
        BinaryOp::Add => Some(SirBinOp::Add),
        BinaryOp::Sub => Some(SirBinOp::Sub),
        BinaryOp::Mult => Some(SirBinOp::Mul),
        BinaryOp::Div => Some(SirBinOp::Div),
        BinaryOp::Rem => Some(SirBinOp::Rem),
        BinaryOp::Band => Some(SirBinOp::And),
        BinaryOp::Bxor => Some(SirBinOp::Xor),
        BinaryOp::Bor => Some(SirBinOp::Or),
        _ => None,
    }
}

fn comparison(op: BinaryOp) -> Option<CmpKind> {
    match op {
        BinaryOp::CmpEq => Some(CmpKind::Eq),
        BinaryOp::CmpNeq => Some(CmpKind::Ne),
        BinaryOp::Less => Some(CmpKind::Lt),
        BinaryOp::Leq => Some(CmpKind::Le),
        BinaryOp::Grt => Some(CmpKind::Gt),
        BinaryOp::Geq => Some(CmpKind::Ge),
        _ => None,
    }
}

/// Decimal spelling of a numeric literal; float literals always carry a
/// fractional part
fn number_text(literal: &str, ty: &Type) -> String {
    if ty.is_float() {
        if literal.contains('.') {
            return literal.to_string();
        }
        // LLVM wants a fraction before the exponent: `1e3` is `1.0e3`
        return match literal.find(['e', 'E']) {
            Some(pos) => format!("{}.0{}", &literal[..pos], &literal[pos..]),
            None => format!("{literal}.0"),
        };
    }
    let radix = if literal.starts_with("0x") {
        16
    } else if literal.starts_with("0o") {
        8
    } else {
        return literal.to_string();
    };
    match u64::from_str_radix(&literal[2..], radix) {
        Ok(value) => value.to_string(),
        Err(_) => literal.to_string(),
    }
}

impl FunctionLowering<'_> {
    pub(super) fn lower_unary(&mut self, op: UnaryOp, ty: &Type, value: &MirNode) {
        self.lower_node(value);
        let source = self.pop(value.span);
        let dest = SirValue::variable(self.temp());
        let operand_ty = self.map(&source.ty);
        let inst = match op {
            UnaryOp::Neg => SirInst::Neg {
                dest: dest.clone(),
                source: source.to_sir(),
                is_integer: !source.ty.is_float(),
                ty: operand_ty,
            },
            UnaryOp::Bnot => SirInst::Bnot {
                dest: dest.clone(),
                source: source.to_sir(),
                ty: operand_ty,
            },
            UnaryOp::Lnot => SirInst::Lnot {
                dest: dest.clone(),
                source: source.to_sir(),
                ty: operand_ty,
            },
        };
        self.emit(inst);
        self.push_result(dest, ty);
    }

    pub(super) fn lower_binary(
        &mut self,
        op: BinaryOp,
        ty: &Type,
        left: &MirNode,
        right: &MirNode,
        span: Span,
    ) {
        self.lower_node(left);
        self.lower_node(right);
        let rhs = self.pop(right.span);
        let lhs = self.pop(left.span);

        let dest = SirValue::variable(self.temp());
        let operand_ty = self.map(&lhs.ty);
        let is_signed = !lhs.ty.is_unsigned();
        // pointers, bools and enums compare as integers
        let is_integer = !lhs.ty.is_float();

        let inst = if let Some(kind) = comparison(op) {
            SirInst::Cmp {
                kind,
                dest: dest.clone(),
                left: lhs.to_sir(),
                right: rhs.to_sir(),
                is_integer,
                is_signed,
                ty: operand_ty,
            }
        } else if let Some(op) = arithmetic_op(op) {
            SirInst::Binary {
                op,
                dest: dest.clone(),
                left: lhs.to_sir(),
                right: rhs.to_sir(),
                is_integer,
                is_signed,
                ty: operand_ty,
            }
        } else {
            self.internal(span, format!("unexpected binary operator {op:?}"));
            self.push(MirValue::nil(ty.clone()));
            return;
        };
        self.emit(inst);
        self.push_result(dest, ty);
    }

    pub(super) fn lower_type_convert(&mut self, source: &MirNode, target: &Type) {
        self.lower_node(source);
        let value = self.pop(source.span);
        let from = self.map(&value.ty);
        let to = self.map(target);
        let op = ConvertOp::select(&from, &to, value.ty.is_unsigned(), target.is_unsigned());
        let dest = SirValue::variable(self.temp());
        self.emit(SirInst::Convert {
            op,
            dest: dest.clone(),
            source: value.to_sir(),
            from,
            to,
        });
        self.push_result(dest, target);
    }

    pub(super) fn lower_number(&mut self, literal: &str, ty: &Type) {
        self.push(MirValue::literal(number_text(literal, ty), ty.clone()));
    }

    pub(super) fn lower_string(&mut self, literal: &str, ty: &Type) {
        let index = self.module.intern_string(literal);
        let dest = SirValue::variable(self.temp());
        self.emit(SirInst::Str {
            target: dest.clone(),
            index,
            length: literal.len() + 1,
        });
        self.push_result(dest, ty);
    }

    /// Stack array; the value is a pointer to its first element
    pub(super) fn lower_array(&mut self, size: u64, ty: &Type, values: &[MirNode]) {
        let id = self.arrays.next();
        let mut element = ty.ref_copy();
        element.is_array = false;
        let element = self.map(&element);
        let storage = format!("arr.{id}.ptr");
        let first = format!("arr.{id}.cast_ptr");

        self.builder
            .add_alloca(storage.clone(), format!("[{size} x {element}]"));
        self.emit(SirInst::ArrayCast {
            dest: SirValue::variable(first.clone()),
            source: SirValue::variable(storage),
            ty: element.clone(),
            size,
        });
        for (i, value) in values.iter().enumerate() {
            let slot = SirValue::variable(self.temp());
            self.emit(SirInst::GetIndex {
                dest: slot.clone(),
                source: SirValue::variable(first.clone()),
                index: SirValue::literal(i.to_string()),
                ty: element.clone(),
                index_ty: "i64".to_string(),
            });
            self.lower_node(value);
            let value = self.pop(value.span);
            self.emit(SirInst::Store {
                ty: element.clone(),
                source: value.to_sir(),
                dest: slot,
            });
        }

        let mut result = ty.clone();
        result.is_array = false;
        self.push(MirValue::variable(first, result));
    }

    fn push_result(&mut self, dest: SirValue, ty: &Type) {
        let name = dest.as_variable().unwrap_or_default().to_string();
        self.push(MirValue::variable(name, ty.clone()));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_number_text() {
        assert_eq!(number_text("3", &Type::f64()), "3.0");
        assert_eq!(number_text("2.5", &Type::f64()), "2.5");
        assert_eq!(number_text("1e3", &Type::f64()), "1.0e3");
        assert_eq!(number_text("2E-4", &Type::f64()), "2.0E-4");
        assert_eq!(number_text("1.5e3", &Type::f64()), "1.5e3");
        assert_eq!(number_text("42", &Type::i64()), "42");
        assert_eq!(number_text("0xff", &Type::u64()), "255");
        assert_eq!(number_text("0o17", &Type::i32()), "15");
    }

    #[test]
    fn test_operator_tables() {
        assert_eq!(arithmetic_op(BinaryOp::Mult), Some(SirBinOp::Mul));
        assert_eq!(arithmetic_op(BinaryOp::CmpAnd), None);
        assert_eq!(comparison(BinaryOp::Geq), Some(CmpKind::Ge));
        assert_eq!(comparison(BinaryOp::Add), None);
    }
}
