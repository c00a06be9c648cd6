//! Values on the lowering stack

use crate::sir::SirValue;
use crate::types::Type;

/// What a stack entry stands for
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueKind {
    /// No runtime value (void call result, `nil`)
    Nil,
    /// SSA temporary or stack slot
    Variable,
    /// Constant text
    Literal,
    /// Primitive type name, head of a static method path
    Primitive,
    /// Callable function name, not yet mangled
    FuncSymbol,
    /// Method name; the receiver sits just below on the stack
    Method,
    StructSymbol,
    TaggedUnionSymbol,
    EnumSymbol,
}

/// One entry of the value stack
#[derive(Debug, Clone, PartialEq)]
pub struct MirValue {
    pub kind: ValueKind,
    pub content: String,
    pub ty: Type,
}

impl MirValue {
    fn new(kind: ValueKind, content: impl Into<String>, ty: Type) -> Self {
        Self {
            kind,
            content: content.into(),
            ty,
        }
    }

    pub fn nil(ty: Type) -> Self {
        Self::new(ValueKind::Nil, "", ty)
    }

    pub fn variable(name: impl Into<String>, ty: Type) -> Self {
        Self::new(ValueKind::Variable, name, ty)
    }

    pub fn literal(text: impl Into<String>, ty: Type) -> Self {
        Self::new(ValueKind::Literal, text, ty)
    }

    pub fn primitive(name: impl Into<String>, ty: Type) -> Self {
        Self::new(ValueKind::Primitive, name, ty)
    }

    pub fn func(name: impl Into<String>, ty: Type) -> Self {
        Self::new(ValueKind::FuncSymbol, name, ty)
    }

    pub fn method(name: impl Into<String>, ty: Type) -> Self {
        Self::new(ValueKind::Method, name, ty)
    }

    pub fn struct_symbol(name: impl Into<String>, ty: Type) -> Self {
        Self::new(ValueKind::StructSymbol, name, ty)
    }

    pub fn tagged_union_symbol(name: impl Into<String>, ty: Type) -> Self {
        Self::new(ValueKind::TaggedUnionSymbol, name, ty)
    }

    pub fn enum_symbol(name: impl Into<String>, ty: Type) -> Self {
        Self::new(ValueKind::EnumSymbol, name, ty)
    }

    pub fn is_variable(&self) -> bool {
        self.kind == ValueKind::Variable
    }

    /// Operand form of this value
    pub fn to_sir(&self) -> SirValue {
        match self.kind {
            ValueKind::Nil => SirValue::literal("null"),
            ValueKind::Variable => SirValue::variable(self.content.clone()),
            ValueKind::Literal => SirValue::literal(self.content.clone()),
            ValueKind::Primitive
            | ValueKind::FuncSymbol
            | ValueKind::Method
            | ValueKind::StructSymbol
            | ValueKind::TaggedUnionSymbol
            | ValueKind::EnumSymbol => SirValue::Null(format!("{:?} {}", self.kind, self.content)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_operand_forms() {
        assert_eq!(
            MirValue::variable("x.0", Type::i64()).to_sir(),
            SirValue::variable("x.0")
        );
        assert_eq!(
            MirValue::literal("42", Type::i64()).to_sir(),
            SirValue::literal("42")
        );
        assert_eq!(
            MirValue::nil(Type::i64().with_pointer_depth(1)).to_sir(),
            SirValue::literal("null")
        );
        assert!(matches!(
            MirValue::func("main::foo", Type::void()).to_sir(),
            SirValue::Null(_)
        ));
    }
}
