//! Static-single-assignment Intermediate Representation (SIR)
//!
//! SIR is the flat output of lowering: numbered basic blocks holding
//! typed instructions, each block closed by exactly one [`Terminator`].
//! Types are carried as already-mapped IR type strings.
//!
//! Branch targets start out as `None` while the destination label is not
//! known yet; lowering back-patches them through block indices.

pub mod debug_info;
pub mod pass;
mod print;
pub mod verify;

pub use debug_info::{DebugInfo, DiNode};
pub use print::{label_name, print_function, print_module};

use crate::span::Span;

/// Basic-block label, unique per function
pub type Label = usize;

/// Label of the function entry block
pub const ENTRY_LABEL: Label = 0;

/// Operand of an instruction
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SirValue {
    /// No runtime value, the payload says what was there instead
    Null(String),
    /// Local temporary or stack slot
    Variable(String),
    /// Literal text such as `42`, `1.0` or `null`
    Literal(String),
}

impl SirValue {
    pub fn variable(name: impl Into<String>) -> Self {
        Self::Variable(name.into())
    }

    pub fn literal(text: impl Into<String>) -> Self {
        Self::Literal(text.into())
    }

    pub fn as_variable(&self) -> Option<&str> {
        match self {
            Self::Variable(name) => Some(name),
            _ => None,
        }
    }
}

/// Integer/float binary operations
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SirBinOp {
    Add,
    Sub,
    Mul,
    Div,
    Rem,
    And,
    Xor,
    Or,
}

/// Comparison predicates
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CmpKind {
    Eq,
    Ne,
    Ge,
    Gt,
    Le,
    Lt,
}

/// Cast instruction selected for a type conversion
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConvertOp {
    Zext,
    Sext,
    Trunc,
    /// Same-width integers, emitted as `add T x, 0`
    Copy,
    Sitofp,
    Uitofp,
    Fptosi,
    Fptoui,
    Fpext,
    Fptrunc,
    Bitcast,
    Inttoptr,
    Ptrtoint,
}

impl ConvertOp {
    /// Pick the cast between two mapped IR types
    pub fn select(from: &str, to: &str, from_unsigned: bool, to_unsigned: bool) -> Self {
        let from_ptr = from.ends_with('*');
        let to_ptr = to.ends_with('*');
        match (from_ptr, to_ptr) {
            (true, true) => return Self::Bitcast,
            (true, false) => return Self::Ptrtoint,
            (false, true) => return Self::Inttoptr,
            (false, false) => {}
        }
        match (float_width(from), float_width(to)) {
            (Some(a), Some(b)) => {
                if a < b {
                    Self::Fpext
                } else if a > b {
                    Self::Fptrunc
                } else {
                    Self::Bitcast
                }
            }
            (Some(_), None) => {
                if to_unsigned {
                    Self::Fptoui
                } else {
                    Self::Fptosi
                }
            }
            (None, Some(_)) => {
                if from_unsigned {
                    Self::Uitofp
                } else {
                    Self::Sitofp
                }
            }
            (None, None) => match (int_width(from), int_width(to)) {
                (Some(a), Some(b)) if a < b => {
                    if from_unsigned || a == 1 {
                        Self::Zext
                    } else {
                        Self::Sext
                    }
                }
                (Some(a), Some(b)) if a > b => Self::Trunc,
                (Some(_), Some(_)) => Self::Copy,
                _ => Self::Bitcast,
            },
        }
    }

    pub fn mnemonic(self) -> &'static str {
        match self {
            Self::Zext => "zext",
            Self::Sext => "sext",
            Self::Trunc => "trunc",
            Self::Copy => "add",
            Self::Sitofp => "sitofp",
            Self::Uitofp => "uitofp",
            Self::Fptosi => "fptosi",
            Self::Fptoui => "fptoui",
            Self::Fpext => "fpext",
            Self::Fptrunc => "fptrunc",
            Self::Bitcast => "bitcast",
            Self::Inttoptr => "inttoptr",
            Self::Ptrtoint => "ptrtoint",
        }
    }
}

fn int_width(ty: &str) -> Option<u32> {
    ty.strip_prefix('i')?.parse().ok()
}

fn float_width(ty: &str) -> Option<u32> {
    match ty {
        "float" => Some(32),
        "double" => Some(64),
        _ => None,
    }
}

/// Non-terminating instructions
#[derive(Debug, Clone, PartialEq)]
pub enum SirInst {
    /// Pointer to a hidden slot, `%target = getelementptr T, T* %source, i32 0`
    TempPtr {
        target: String,
        source: String,
        ty: String,
    },
    /// Address of an interned string constant
    Str {
        target: SirValue,
        index: usize,
        /// Byte length including the NUL terminator
        length: usize,
    },
    ZeroInit {
        dest: SirValue,
        ty: String,
    },
    GetIndex {
        dest: SirValue,
        source: SirValue,
        index: SirValue,
        ty: String,
        index_ty: String,
    },
    GetField {
        dest: SirValue,
        source: SirValue,
        struct_ty: String,
        index: usize,
    },
    Call {
        name: String,
        return_ty: String,
        dest: SirValue,
        args: Vec<(String, SirValue)>,
        /// Full function type for variadic callees, `(i8*, ...)`
        signature: Option<String>,
        debug_loc: Option<u64>,
    },
    Neg {
        dest: SirValue,
        source: SirValue,
        is_integer: bool,
        ty: String,
    },
    Bnot {
        dest: SirValue,
        source: SirValue,
        ty: String,
    },
    Lnot {
        dest: SirValue,
        source: SirValue,
        ty: String,
    },
    Binary {
        op: SirBinOp,
        dest: SirValue,
        left: SirValue,
        right: SirValue,
        is_integer: bool,
        is_signed: bool,
        ty: String,
    },
    Cmp {
        kind: CmpKind,
        dest: SirValue,
        left: SirValue,
        right: SirValue,
        is_integer: bool,
        is_signed: bool,
        ty: String,
    },
    Store {
        ty: String,
        source: SirValue,
        dest: SirValue,
    },
    Load {
        ty: String,
        source: SirValue,
        dest: SirValue,
    },
    Convert {
        op: ConvertOp,
        dest: SirValue,
        source: SirValue,
        from: String,
        to: String,
    },
    /// Decay `[N x T]*` to `T*`
    ArrayCast {
        dest: SirValue,
        source: SirValue,
        ty: String,
        size: u64,
    },
}

/// Block terminators
#[derive(Debug, Clone, PartialEq)]
pub enum Terminator {
    Goto(Option<Label>),
    Branch {
        cond: SirValue,
        on_true: Option<Label>,
        on_false: Option<Label>,
    },
    Switch {
        value: SirValue,
        ty: String,
        cases: Vec<(i64, Label)>,
        default: Option<Label>,
    },
    Return {
        ty: String,
        value: Option<SirValue>,
    },
    Unreachable,
}

impl Terminator {
    /// Every label this terminator may jump to, `None` for unpatched slots
    pub fn targets(&self) -> Vec<Option<Label>> {
        match self {
            Self::Goto(target) => vec![*target],
            Self::Branch {
                on_true, on_false, ..
            } => vec![*on_true, *on_false],
            Self::Switch { cases, default, .. } => {
                let mut targets: Vec<Option<Label>> =
                    cases.iter().map(|(_, label)| Some(*label)).collect();
                targets.push(*default);
                targets
            }
            Self::Return { .. } | Self::Unreachable => Vec::new(),
        }
    }

    pub fn is_return(&self) -> bool {
        matches!(self, Self::Return { .. })
    }
}

/// A labelled straight-line instruction sequence
#[derive(Debug, Clone, PartialEq)]
pub struct BasicBlock {
    pub label: Label,
    /// Short note printed next to the label
    pub comment: String,
    pub instructions: Vec<SirInst>,
    pub terminator: Terminator,
}

/// Stack slot declared at the top of the entry block
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SirAlloca {
    pub variable: String,
    pub ty: String,
}

/// A function declaration or definition
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SirFunction {
    pub name: String,
    /// `(name, type)` in declaration order
    pub params: Vec<(String, String)>,
    pub return_type: String,
    pub attributes: Vec<String>,
    pub with_va_args: bool,
    pub allocas: Vec<SirAlloca>,
    pub blocks: Vec<BasicBlock>,
    pub debug_index: Option<u64>,
    /// Source location of the MIR function, for diagnostics
    pub span: Span,
    pub file: String,
}

impl SirFunction {
    pub fn is_declaration(&self) -> bool {
        self.blocks.is_empty()
    }

    pub fn block(&self, label: Label) -> Option<&BasicBlock> {
        self.blocks.iter().find(|b| b.label == label)
    }

    /// All instructions in block order
    pub fn instructions(&self) -> impl Iterator<Item = &SirInst> {
        self.blocks.iter().flat_map(|b| b.instructions.iter())
    }
}

/// Struct type declaration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SirStruct {
    /// Mangled name without the `struct.` prefix
    pub name: String,
    pub field_types: Vec<String>,
    pub size: u64,
    pub align: u64,
}

/// Tagged union type declaration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SirTaggedUnion {
    /// Mangled name without the `tagged_union.` prefix
    pub name: String,
    pub member_types: Vec<String>,
    pub size: u64,
    pub align: u64,
}

/// Output module, append-only while lowering
#[derive(Debug, Clone, Default)]
pub struct SirModule {
    pub target_triple: String,
    pub tagged_unions: Vec<SirTaggedUnion>,
    pub structs: Vec<SirStruct>,
    /// Interned string constants in first-use order
    pub const_strings: Vec<String>,
    pub func_decls: Vec<SirFunction>,
    pub func_impls: Vec<SirFunction>,
    pub debug_info: DebugInfo,
}

impl SirModule {
    pub fn new(target_triple: impl Into<String>) -> Self {
        Self {
            target_triple: target_triple.into(),
            ..Self::default()
        }
    }

    /// Index of a string constant, interning it on first use
    pub fn intern_string(&mut self, literal: &str) -> usize {
        if let Some(index) = self.const_strings.iter().position(|s| s == literal) {
            return index;
        }
        self.const_strings.push(literal.to_string());
        self.const_strings.len() - 1
    }

    pub fn find_impl(&self, name: &str) -> Option<&SirFunction> {
        self.func_impls.iter().find(|f| f.name == name)
    }

    pub fn declares(&self, name: &str) -> bool {
        self.func_decls.iter().any(|f| f.name == name)
            || self.func_impls.iter().any(|f| f.name == name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_convert_select_integers() {
        assert_eq!(ConvertOp::select("i8", "i64", false, false), ConvertOp::Sext);
        assert_eq!(ConvertOp::select("i8", "i64", true, false), ConvertOp::Zext);
        assert_eq!(ConvertOp::select("i1", "i32", false, false), ConvertOp::Zext);
        assert_eq!(ConvertOp::select("i64", "i32", false, false), ConvertOp::Trunc);
        assert_eq!(ConvertOp::select("i64", "i64", false, true), ConvertOp::Copy);
    }

    #[test]
    fn test_convert_select_floats_and_pointers() {
        assert_eq!(ConvertOp::select("float", "double", false, false), ConvertOp::Fpext);
        assert_eq!(ConvertOp::select("double", "float", false, false), ConvertOp::Fptrunc);
        assert_eq!(ConvertOp::select("i32", "double", true, false), ConvertOp::Uitofp);
        assert_eq!(ConvertOp::select("double", "i32", false, false), ConvertOp::Fptosi);
        assert_eq!(ConvertOp::select("i8*", "i64*", false, false), ConvertOp::Bitcast);
        assert_eq!(ConvertOp::select("i64", "i8*", false, false), ConvertOp::Inttoptr);
        assert_eq!(ConvertOp::select("i8*", "i64", false, false), ConvertOp::Ptrtoint);
    }

    #[test]
    fn test_intern_string_reuses_index() {
        let mut module = SirModule::new("x86_64-pc-linux-gnu");
        assert_eq!(module.intern_string("hello"), 0);
        assert_eq!(module.intern_string("world"), 1);
        assert_eq!(module.intern_string("hello"), 0);
        assert_eq!(module.const_strings.len(), 2);
    }

    #[test]
    fn test_switch_targets_include_default() {
        let term = Terminator::Switch {
            value: SirValue::variable("_0"),
            ty: "i64".to_string(),
            cases: vec![(0, 2), (1, 3)],
            default: None,
        };
        assert_eq!(term.targets(), vec![Some(2), Some(3), None]);
    }
}
