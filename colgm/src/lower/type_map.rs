//! Source types to IR type strings

use std::collections::HashMap;

use tracing::warn;

use crate::types::{SymbolKind, SymbolTable, Type};
use crate::util::mangle;

/// IR spelling of a primitive, `None` for non-primitives
fn basic_type(name: &str) -> Option<&'static str> {
    match name {
        "i64" | "u64" => Some("i64"),
        "i32" | "u32" => Some("i32"),
        "i16" | "u16" => Some("i16"),
        "i8" | "u8" => Some("i8"),
        "f64" => Some("double"),
        "f32" => Some("float"),
        "void" => Some("void"),
        "bool" => Some("i1"),
        _ => None,
    }
}

/// Maps source types to IR type strings
#[derive(Debug, Default)]
pub struct TypeMapper {
    /// Kind of every named aggregate and enum, keyed by full path
    kinds: HashMap<String, SymbolKind>,
}

impl TypeMapper {
    pub fn new(symbols: &SymbolTable) -> Self {
        let mut kinds = HashMap::new();
        for (path, module) in &symbols.modules {
            let key = |name: &str| Type::named(name, path.as_str()).full_path_name();
            for name in module.structs.keys() {
                kinds.insert(key(name), SymbolKind::Struct);
            }
            for name in module.tagged_unions.keys() {
                kinds.insert(key(name), SymbolKind::TaggedUnion);
            }
            for name in module.enums.keys() {
                kinds.insert(key(name), SymbolKind::Enum);
            }
        }
        Self { kinds }
    }

    fn kind_of(&self, ty: &Type) -> Option<SymbolKind> {
        self.kinds.get(&ty.full_path_name()).copied()
    }

    /// IR spelling of `ty`: base name, one `*` per pointer level and one
    /// more for references
    pub fn map(&self, ty: &Type) -> String {
        let base = self.base_name(ty);
        let mut depth = usize::try_from(ty.pointer_depth).unwrap_or(0);
        if ty.is_reference {
            depth += 1;
        }
        // `void*` is not a valid IR type
        let base = if base == "void" && depth > 0 {
            "i8".to_string()
        } else {
            base
        };
        format!("{base}{}", "*".repeat(depth))
    }

    /// `[N x T]` for array-typed fields, element type one level shallower
    pub fn map_array(&self, ty: &Type) -> String {
        let mut element = ty.ref_copy();
        element.is_array = false;
        element.is_reference = false;
        format!("[{} x {}]", ty.array_length, self.map(&element))
    }

    fn base_name(&self, ty: &Type) -> String {
        if ty.module.is_empty() {
            if let Some(basic) = basic_type(&ty.name) {
                return basic.to_string();
            }
        }
        if ty.is_enum {
            return "i64".to_string();
        }
        match self.kind_of(ty) {
            Some(SymbolKind::Struct) => format!("%struct.{}", mangle(&ty.full_path_name())),
            Some(SymbolKind::TaggedUnion) => {
                format!("%tagged_union.{}", mangle(&ty.full_path_name()))
            }
            Some(SymbolKind::Enum) => "i64".to_string(),
            _ => {
                warn!(ty = %ty.full_path_name(), "type has no IR mapping");
                format!("undef.{}", ty.full_path_name())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{EnumSymbol, StructSymbol, TaggedUnionSymbol};

    fn mapper() -> TypeMapper {
        let mut table = SymbolTable::new();
        table.add_struct(
            "std::vec",
            StructSymbol {
                name: "vec<i64>".to_string(),
                ..StructSymbol::default()
            },
        );
        table.add_tagged_union(
            "main",
            TaggedUnionSymbol {
                name: "shape".to_string(),
                ..TaggedUnionSymbol::default()
            },
        );
        table.add_enum(
            "main",
            EnumSymbol {
                name: "color".to_string(),
                ..EnumSymbol::default()
            },
        );
        TypeMapper::new(&table)
    }

    #[test]
    fn test_primitives() {
        let types = mapper();
        assert_eq!(types.map(&Type::i64()), "i64");
        assert_eq!(types.map(&Type::u64()), "i64");
        assert_eq!(types.map(&Type::f64()), "double");
        assert_eq!(types.map(&Type::bool()), "i1");
        assert_eq!(types.map(&Type::const_str()), "i8*");
        assert_eq!(types.map(&Type::void().with_pointer_depth(1)), "i8*");
    }

    #[test]
    fn test_named_types() {
        let types = mapper();
        let vec = Type::named("vec", "std::vec")
            .with_generics(vec![Type::i64()])
            .with_pointer_depth(2);
        assert_eq!(types.map(&vec), "%struct.std.vec.vec<i64>**");
        assert_eq!(
            types.map(&Type::named("shape", "main")),
            "%tagged_union.main.shape"
        );
        assert_eq!(types.map(&Type::named("color", "main")), "i64");
        assert_eq!(types.map(&Type::named("ghost", "main")), "undef.main::ghost");
    }

    #[test]
    fn test_reference_adds_indirection() {
        let types = mapper();
        let mut ty = Type::i64();
        ty.is_reference = true;
        assert_eq!(types.map(&ty), "i64*");
    }

    #[test]
    fn test_array_field() {
        let types = mapper();
        let mut ty = Type::i32().with_pointer_depth(1);
        ty.is_array = true;
        ty.array_length = 16;
        assert_eq!(types.map_array(&ty), "[16 x i32]");
    }
}
