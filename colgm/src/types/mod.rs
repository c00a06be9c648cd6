//! Resolved source types
//!
//! Types reaching the lowering engine are fully resolved: generics are
//! already expanded and every named type points at the module that
//! declares it.

mod symbol;

pub use symbol::{
    EnumSymbol, FieldSymbol, FunctionSymbol, ModuleSymbols, PrimitiveSymbol, StructSymbol,
    SymbolKind, SymbolTable, TaggedUnionMember, TaggedUnionSymbol,
};

use serde::{Deserialize, Serialize};

/// Names of the built-in primitive types
pub const PRIMITIVE_NAMES: [&str; 12] = [
    "i64", "i32", "i16", "i8", "u64", "u32", "u16", "u8", "f64", "f32", "bool", "void",
];

/// A resolved source type
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Type {
    pub name: String,
    /// Declaring module path, empty for primitives
    #[serde(default)]
    pub module: String,
    #[serde(default)]
    pub pointer_depth: i64,
    #[serde(default)]
    pub generics: Vec<Type>,
    /// Identifier refers to a global symbol rather than a local
    #[serde(default)]
    pub is_global: bool,
    #[serde(default)]
    pub is_enum: bool,
    #[serde(default)]
    pub is_array: bool,
    #[serde(default)]
    pub array_length: u64,
    /// `ref T`, mapped with one extra `*`
    #[serde(default)]
    pub is_reference: bool,
}

impl Type {
    pub fn primitive(name: &str, pointer_depth: i64) -> Self {
        Self {
            name: name.to_string(),
            pointer_depth,
            ..Self::default()
        }
    }

    /// Named type declared in `module`
    pub fn named(name: impl Into<String>, module: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            module: module.into(),
            ..Self::default()
        }
    }

    pub fn i64() -> Self {
        Self::primitive("i64", 0)
    }

    pub fn i32() -> Self {
        Self::primitive("i32", 0)
    }

    pub fn u64() -> Self {
        Self::primitive("u64", 0)
    }

    pub fn u8() -> Self {
        Self::primitive("u8", 0)
    }

    pub fn f64() -> Self {
        Self::primitive("f64", 0)
    }

    pub fn bool() -> Self {
        Self::primitive("bool", 0)
    }

    pub fn void() -> Self {
        Self::primitive("void", 0)
    }

    /// `i8*`, the type of string literals
    pub fn const_str() -> Self {
        Self::primitive("i8", 1)
    }

    pub fn with_pointer_depth(mut self, depth: i64) -> Self {
        self.pointer_depth = depth;
        self
    }

    pub fn with_generics(mut self, generics: Vec<Type>) -> Self {
        self.generics = generics;
        self
    }

    /// Name with generic arguments, `vec<i64>`
    pub fn generic_name(&self) -> String {
        if self.generics.is_empty() {
            return self.name.clone();
        }
        let args = self
            .generics
            .iter()
            .map(Type::full_path_name_with_pointer)
            .collect::<Vec<_>>()
            .join(",");
        format!("{}<{}>", self.name, args)
    }

    /// Module-qualified name, `std::vec::vec<i64>`
    pub fn full_path_name(&self) -> String {
        if self.module.is_empty() {
            self.generic_name()
        } else {
            format!("{}::{}", self.module, self.generic_name())
        }
    }

    pub fn full_path_name_with_pointer(&self) -> String {
        let depth = usize::try_from(self.pointer_depth).unwrap_or(0);
        format!("{}{}", self.full_path_name(), "*".repeat(depth))
    }

    /// One more level of indirection
    pub fn pointer_copy(&self) -> Self {
        let mut copy = self.clone();
        copy.pointer_depth += 1;
        copy
    }

    /// One less level of indirection
    pub fn ref_copy(&self) -> Self {
        let mut copy = self.clone();
        copy.pointer_depth -= 1;
        copy
    }

    pub fn is_pointer(&self) -> bool {
        self.pointer_depth > 0
    }

    pub fn is_void(&self) -> bool {
        self.name == "void" && self.module.is_empty() && self.pointer_depth == 0
    }

    pub fn is_primitive(&self) -> bool {
        self.module.is_empty() && PRIMITIVE_NAMES.contains(&self.name.as_str())
    }

    /// Integers and plain enum values
    pub fn is_integer(&self) -> bool {
        if self.pointer_depth != 0 {
            return false;
        }
        self.is_enum
            || (self.module.is_empty()
                && matches!(
                    self.name.as_str(),
                    "i64" | "i32" | "i16" | "i8" | "u64" | "u32" | "u16" | "u8"
                ))
    }

    pub fn is_unsigned(&self) -> bool {
        self.pointer_depth == 0
            && self.module.is_empty()
            && matches!(self.name.as_str(), "u64" | "u32" | "u16" | "u8")
    }

    pub fn is_float(&self) -> bool {
        self.pointer_depth == 0
            && self.module.is_empty()
            && matches!(self.name.as_str(), "f64" | "f32")
    }

    pub fn is_boolean(&self) -> bool {
        self.pointer_depth == 0 && self.module.is_empty() && self.name == "bool"
    }

    /// Bit width of integer, float and bool types
    pub fn bit_width(&self) -> Option<u64> {
        if self.pointer_depth != 0 {
            return None;
        }
        if self.is_enum {
            return Some(64);
        }
        match self.name.as_str() {
            "i64" | "u64" | "f64" => Some(64),
            "i32" | "u32" | "f32" => Some(32),
            "i16" | "u16" => Some(16),
            "i8" | "u8" => Some(8),
            "bool" => Some(1),
            _ => None,
        }
    }
}

impl std::fmt::Display for Type {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.is_reference {
            write!(f, "ref ")?;
        }
        write!(f, "{}", self.full_path_name_with_pointer())?;
        if self.is_array {
            write!(f, "[{}]", self.array_length)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generic_name() {
        let inner = Type::named("foo", "data").with_pointer_depth(1);
        let vec = Type::named("vec", "std::vec").with_generics(vec![Type::i64(), inner]);
        assert_eq!(vec.generic_name(), "vec<i64,data::foo*>");
        assert_eq!(vec.full_path_name(), "std::vec::vec<i64,data::foo*>");
    }

    #[test]
    fn test_pointer_and_ref_copy() {
        let ty = Type::i64();
        let ptr = ty.pointer_copy();
        assert_eq!(ptr.pointer_depth, 1);
        assert!(ptr.is_pointer());
        assert!(!ptr.is_integer());
        assert_eq!(ptr.ref_copy(), ty);
    }

    #[test]
    fn test_type_classification() {
        assert!(Type::u8().is_unsigned());
        assert!(Type::u8().is_integer());
        assert!(!Type::i64().is_unsigned());
        assert!(Type::f64().is_float());
        assert!(Type::bool().is_boolean());
        assert!(Type::void().is_void());
        assert!(!Type::void().pointer_copy().is_void());

        let mut color = Type::named("color", "main");
        color.is_enum = true;
        assert!(color.is_integer());
        assert_eq!(color.bit_width(), Some(64));
    }

    #[test]
    fn test_display() {
        let mut ty = Type::i32().pointer_copy();
        ty.is_reference = true;
        assert_eq!(ty.to_string(), "ref i32*");
    }
}
