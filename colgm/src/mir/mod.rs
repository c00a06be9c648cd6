//! Mid-level Intermediate Representation (MIR)
//!
//! MIR is the typed, still tree-shaped input of the lowering engine.
//! Control flow is structured (branches, loops, switches, short-circuit
//! operators) and every node carries a source span and its resolved type.
//!
//! The whole context derives serde so the resolve pass can hand it over
//! as JSON.

use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::span::{Span, Spanned};
use crate::types::{SymbolTable, Type};

/// A MIR node with its source location
pub type MirNode = Spanned<Mir>;

/// Unary operators
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UnaryOp {
    /// Arithmetic negation
    Neg,
    /// Bitwise not
    Bnot,
    /// Logical not
    Lnot,
}

/// Binary operators
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BinaryOp {
    Add,
    Sub,
    Mult,
    Div,
    Rem,
    CmpEq,
    CmpNeq,
    Less,
    Leq,
    Grt,
    Geq,
    /// Short-circuit `and`
    CmpAnd,
    /// Short-circuit `or`
    CmpOr,
    Band,
    Bxor,
    Bor,
}

impl BinaryOp {
    pub fn is_short_circuit(self) -> bool {
        matches!(self, Self::CmpAnd | Self::CmpOr)
    }

    pub fn is_comparison(self) -> bool {
        matches!(
            self,
            Self::CmpEq | Self::CmpNeq | Self::Less | Self::Leq | Self::Grt | Self::Geq
        )
    }
}

/// Assignment operators
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AssignOp {
    Eq,
    AddEq,
    SubEq,
    MultEq,
    DivEq,
    RemEq,
    AndEq,
    XorEq,
    OrEq,
}

/// One `field: value` pair of a struct initializer
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MirStructField {
    pub name: String,
    pub content: Box<MirNode>,
    #[serde(rename = "type")]
    pub ty: Type,
}

/// One arm of a branch, `condition` is `None` for `else`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MirIf {
    #[serde(default)]
    pub condition: Option<Box<MirNode>>,
    pub body: Box<MirNode>,
}

/// One case of a switch
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MirSwitchCase {
    pub value: i64,
    pub body: Box<MirNode>,
}

/// MIR node kinds
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Mir {
    /// Statement list with its own local scope
    Block { content: Vec<MirNode> },

    Unary {
        op: UnaryOp,
        #[serde(rename = "type")]
        ty: Type,
        value: Box<MirNode>,
    },

    Binary {
        op: BinaryOp,
        #[serde(rename = "type")]
        ty: Type,
        left: Box<MirNode>,
        right: Box<MirNode>,
    },

    TypeConvert { source: Box<MirNode>, target: Type },

    Nil {
        #[serde(rename = "type")]
        ty: Type,
    },

    Number {
        literal: String,
        #[serde(rename = "type")]
        ty: Type,
    },

    #[serde(rename = "string")]
    Str {
        literal: String,
        #[serde(rename = "type")]
        ty: Type,
    },

    Char {
        literal: u8,
        #[serde(rename = "type")]
        ty: Type,
    },

    Bool {
        literal: bool,
        #[serde(rename = "type")]
        ty: Type,
    },

    /// Array literal, `values` may be empty for an uninitialized array
    Array {
        size: u64,
        #[serde(rename = "type")]
        ty: Type,
        #[serde(default)]
        values: Vec<MirNode>,
    },

    StructInit {
        #[serde(rename = "type")]
        ty: Type,
        fields: Vec<MirStructField>,
    },

    /// Call-link chain, `chain[0]` is the head
    Call {
        #[serde(rename = "type")]
        ty: Type,
        chain: Vec<MirNode>,
    },

    CallId {
        name: String,
        #[serde(rename = "type")]
        ty: Type,
    },

    CallIndex {
        #[serde(rename = "type")]
        ty: Type,
        index: Box<MirNode>,
    },

    CallFunc {
        #[serde(rename = "type")]
        ty: Type,
        args: Vec<MirNode>,
        /// Per argument, whether it is passed by reference
        #[serde(default)]
        args_is_ref: Vec<bool>,
    },

    GetField {
        name: String,
        #[serde(rename = "type")]
        ty: Type,
    },

    GetPath {
        name: String,
        #[serde(rename = "type")]
        ty: Type,
    },

    PtrGetField {
        name: String,
        #[serde(rename = "type")]
        ty: Type,
    },

    Define {
        name: String,
        #[serde(rename = "type")]
        ty: Type,
        init: Box<MirNode>,
    },

    Assign {
        op: AssignOp,
        left: Box<MirNode>,
        right: Box<MirNode>,
    },

    /// Ordered `if`/`elsif`/`else` arms, only the last may be unconditional
    Branch { arms: Vec<Spanned<MirIf>> },

    Switch {
        condition: Box<MirNode>,
        cases: Vec<Spanned<MirSwitchCase>>,
        #[serde(default)]
        default: Option<Box<MirNode>>,
    },

    Break,

    Continue,

    Loop {
        condition: Box<MirNode>,
        body: Box<MirNode>,
        #[serde(default)]
        update: Option<Box<MirNode>>,
    },

    Return {
        #[serde(default)]
        value: Option<Box<MirNode>>,
        /// Function returns a reference, evaluate the value for its address
        #[serde(default)]
        return_ref: bool,
    },
}

impl Mir {
    /// Whether lowering this node produces a value
    pub fn is_expression(&self) -> bool {
        matches!(
            self,
            Self::Unary { .. }
                | Self::Binary { .. }
                | Self::TypeConvert { .. }
                | Self::Nil { .. }
                | Self::Number { .. }
                | Self::Str { .. }
                | Self::Char { .. }
                | Self::Bool { .. }
                | Self::Array { .. }
                | Self::StructInit { .. }
                | Self::Call { .. }
                | Self::CallId { .. }
        )
    }

    /// Whether this node only makes sense inside a call chain
    pub fn is_call_link(&self) -> bool {
        matches!(
            self,
            Self::CallIndex { .. }
                | Self::CallFunc { .. }
                | Self::GetField { .. }
                | Self::GetPath { .. }
                | Self::PtrGetField { .. }
        )
    }

    /// Resolved type of the value this node produces
    pub fn ty(&self) -> Option<&Type> {
        match self {
            Self::Unary { ty, .. }
            | Self::Binary { ty, .. }
            | Self::Nil { ty }
            | Self::Number { ty, .. }
            | Self::Str { ty, .. }
            | Self::Char { ty, .. }
            | Self::Bool { ty, .. }
            | Self::Array { ty, .. }
            | Self::StructInit { ty, .. }
            | Self::Call { ty, .. }
            | Self::CallId { ty, .. }
            | Self::CallIndex { ty, .. }
            | Self::CallFunc { ty, .. }
            | Self::GetField { ty, .. }
            | Self::GetPath { ty, .. }
            | Self::PtrGetField { ty, .. }
            | Self::Define { ty, .. } => Some(ty),
            Self::TypeConvert { target, .. } => Some(target),
            Self::Block { .. }
            | Self::Assign { .. }
            | Self::Branch { .. }
            | Self::Switch { .. }
            | Self::Break
            | Self::Continue
            | Self::Loop { .. }
            | Self::Return { .. } => None,
        }
    }

    /// Short name used in internal error messages
    pub fn kind_name(&self) -> &'static str {
        match self {
            Self::Block { .. } => "block",
            Self::Unary { .. } => "unary",
            Self::Binary { .. } => "binary",
            Self::TypeConvert { .. } => "type-convert",
            Self::Nil { .. } => "nil",
            Self::Number { .. } => "number",
            Self::Str { .. } => "string",
            Self::Char { .. } => "char",
            Self::Bool { .. } => "bool",
            Self::Array { .. } => "array",
            Self::StructInit { .. } => "struct-init",
            Self::Call { .. } => "call",
            Self::CallId { .. } => "call-id",
            Self::CallIndex { .. } => "call-index",
            Self::CallFunc { .. } => "call-func-args",
            Self::GetField { .. } => "get-field",
            Self::GetPath { .. } => "get-path",
            Self::PtrGetField { .. } => "ptr-get-field",
            Self::Define { .. } => "define",
            Self::Assign { .. } => "assign",
            Self::Branch { .. } => "branch",
            Self::Switch { .. } => "switch",
            Self::Break => "break",
            Self::Continue => "continue",
            Self::Loop { .. } => "loop",
            Self::Return { .. } => "return",
        }
    }
}

/// Struct layout to emit
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MirStruct {
    pub name: String,
    #[serde(default)]
    pub module: String,
    #[serde(default)]
    pub file: String,
    #[serde(default)]
    pub span: Span,
    /// Field types in declaration order
    #[serde(default)]
    pub field_types: Vec<Type>,
}

impl MirStruct {
    pub fn ty(&self) -> Type {
        Type::named(self.name.clone(), self.module.clone())
    }
}

/// Tagged union layout to emit
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MirTaggedUnion {
    pub name: String,
    #[serde(default)]
    pub module: String,
    #[serde(default)]
    pub file: String,
    #[serde(default)]
    pub span: Span,
    /// Member types in declaration order
    #[serde(default)]
    pub member_types: Vec<Type>,
}

impl MirTaggedUnion {
    pub fn ty(&self) -> Type {
        Type::named(self.name.clone(), self.module.clone())
    }
}

/// A function declaration or implementation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MirFunc {
    /// Symbol name, already mangled for non-extern functions
    pub name: String,
    #[serde(default)]
    pub file: String,
    #[serde(default)]
    pub span: Span,
    #[serde(default)]
    pub params: Vec<(String, Type)>,
    pub return_type: Type,
    #[serde(default)]
    pub attributes: Vec<String>,
    #[serde(default)]
    pub with_va_args: bool,
    /// Body, `None` for declarations
    #[serde(default)]
    pub block: Option<MirNode>,
}

/// Everything the lowering engine consumes
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MirContext {
    #[serde(default)]
    pub structs: Vec<MirStruct>,
    #[serde(default)]
    pub tagged_unions: Vec<MirTaggedUnion>,
    #[serde(default)]
    pub decls: Vec<MirFunc>,
    #[serde(default)]
    pub impls: Vec<MirFunc>,
}

/// Lowering input as handed over by the resolve pass
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MirInput {
    #[serde(default)]
    pub symbols: SymbolTable,
    pub context: MirContext,
}

impl MirInput {
    pub fn from_json(text: &str) -> Result<Self> {
        Ok(serde_json::from_str(text)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_expression_classification() {
        let number = Mir::Number {
            literal: "1".to_string(),
            ty: Type::i64(),
        };
        assert!(number.is_expression());
        assert!(!Mir::Break.is_expression());
        assert!(
            Mir::GetField {
                name: "x".to_string(),
                ty: Type::i64()
            }
            .is_call_link()
        );
    }

    #[test]
    fn test_deserialize_tagged_node() {
        let json = r#"{
            "node": {
                "kind": "loop",
                "condition": {"node": {"kind": "bool", "literal": true, "type": {"name": "bool"}}},
                "body": {"node": {"kind": "block", "content": [{"node": {"kind": "break"}}]}}
            },
            "span": {"start": 0, "end": 10, "line": 3, "column": 5}
        }"#;
        let node: MirNode = serde_json::from_str(json).unwrap();
        assert_eq!(node.span.line, 3);
        let Mir::Loop { body, update, .. } = &node.node else {
            panic!("expected loop, got {}", node.node.kind_name());
        };
        assert!(update.is_none());
        assert!(matches!(&body.node, Mir::Block { content } if content.len() == 1));
    }

    #[test]
    fn test_input_from_json() {
        let input = MirInput::from_json(
            r#"{
                "symbols": {"input_file": "main.colgm"},
                "context": {
                    "impls": [{
                        "name": "main",
                        "return_type": {"name": "i32"},
                        "block": {"node": {"kind": "block", "content": []}}
                    }]
                }
            }"#,
        )
        .unwrap();
        assert_eq!(input.symbols.input_file, "main.colgm");
        assert_eq!(input.context.impls.len(), 1);
        assert!(input.context.impls[0].block.is_some());

        let err = MirInput::from_json("{").unwrap_err();
        assert!(matches!(err, crate::error::CompileError::Input { .. }));
    }

    #[test]
    fn test_binary_op_classes() {
        assert!(BinaryOp::CmpAnd.is_short_circuit());
        assert!(!BinaryOp::Add.is_short_circuit());
        assert!(BinaryOp::Leq.is_comparison());
    }
}
