//! Global symbol table
//!
//! Produced by the resolve/monomorphize pass and consumed read-only by
//! lowering. Generic instantiations are stored under their generic name
//! (`vec<i64>`), so lookups go through [`Type::generic_name`].

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use super::{PRIMITIVE_NAMES, Type};

/// Classification of a global name
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SymbolKind {
    Basic,
    Enum,
    Struct,
    TaggedUnion,
    Func,
    Error,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FieldSymbol {
    pub name: String,
    #[serde(rename = "type")]
    pub ty: Type,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StructSymbol {
    pub name: String,
    /// Fields in declaration order
    #[serde(default)]
    pub fields: Vec<FieldSymbol>,
    #[serde(default)]
    pub methods: BTreeSet<String>,
    #[serde(default)]
    pub line: u64,
}

impl StructSymbol {
    /// Declared index of a field
    pub fn field_index(&self, name: &str) -> Option<usize> {
        self.fields.iter().position(|f| f.name == name)
    }

    pub fn field(&self, name: &str) -> Option<&FieldSymbol> {
        self.fields.iter().find(|f| f.name == name)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaggedUnionMember {
    pub name: String,
    #[serde(rename = "type")]
    pub ty: Type,
    pub tag: i64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TaggedUnionSymbol {
    pub name: String,
    /// Members in declaration order
    #[serde(default)]
    pub members: Vec<TaggedUnionMember>,
    #[serde(default)]
    pub methods: BTreeSet<String>,
    #[serde(default)]
    pub line: u64,
}

impl TaggedUnionSymbol {
    pub fn member(&self, name: &str) -> Option<&TaggedUnionMember> {
        self.members.iter().find(|m| m.name == name)
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EnumSymbol {
    pub name: String,
    /// `(member, value)` in declaration order
    #[serde(default)]
    pub members: Vec<(String, i64)>,
    #[serde(default)]
    pub line: u64,
}

impl EnumSymbol {
    pub fn member_value(&self, name: &str) -> Option<i64> {
        self.members
            .iter()
            .find(|(member, _)| member == name)
            .map(|(_, value)| *value)
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FunctionSymbol {
    pub name: String,
    #[serde(default)]
    pub is_extern: bool,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PrimitiveSymbol {
    pub name: String,
    #[serde(default)]
    pub methods: BTreeSet<String>,
}

/// Symbols declared by one module
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ModuleSymbols {
    /// Source file of the module
    #[serde(default)]
    pub file: String,
    #[serde(default)]
    pub structs: BTreeMap<String, StructSymbol>,
    #[serde(default)]
    pub tagged_unions: BTreeMap<String, TaggedUnionSymbol>,
    #[serde(default)]
    pub enums: BTreeMap<String, EnumSymbol>,
    #[serde(default)]
    pub functions: BTreeMap<String, FunctionSymbol>,
}

/// Global symbols keyed by module path
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SymbolTable {
    /// Main input file of the compilation
    #[serde(default)]
    pub input_file: String,
    #[serde(default)]
    pub primitives: BTreeMap<String, PrimitiveSymbol>,
    #[serde(default)]
    pub modules: BTreeMap<String, ModuleSymbols>,
}

impl SymbolTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Mutable access to a module, created on first use
    pub fn module_mut(&mut self, path: &str) -> &mut ModuleSymbols {
        self.modules.entry(path.to_string()).or_default()
    }

    pub fn add_struct(&mut self, module: &str, symbol: StructSymbol) {
        self.module_mut(module)
            .structs
            .insert(symbol.name.clone(), symbol);
    }

    pub fn add_tagged_union(&mut self, module: &str, symbol: TaggedUnionSymbol) {
        self.module_mut(module)
            .tagged_unions
            .insert(symbol.name.clone(), symbol);
    }

    pub fn add_enum(&mut self, module: &str, symbol: EnumSymbol) {
        self.module_mut(module).enums.insert(symbol.name.clone(), symbol);
    }

    pub fn add_function(&mut self, module: &str, symbol: FunctionSymbol) {
        self.module_mut(module)
            .functions
            .insert(symbol.name.clone(), symbol);
    }

    pub fn find_primitive(&self, name: &str) -> Option<&PrimitiveSymbol> {
        self.primitives.get(name)
    }

    pub fn find_struct(&self, ty: &Type) -> Option<&StructSymbol> {
        self.modules.get(&ty.module)?.structs.get(&ty.generic_name())
    }

    pub fn find_tagged_union(&self, ty: &Type) -> Option<&TaggedUnionSymbol> {
        self.modules
            .get(&ty.module)?
            .tagged_unions
            .get(&ty.generic_name())
    }

    pub fn find_enum(&self, ty: &Type) -> Option<&EnumSymbol> {
        self.modules.get(&ty.module)?.enums.get(&ty.generic_name())
    }

    pub fn find_function(&self, ty: &Type) -> Option<&FunctionSymbol> {
        self.modules.get(&ty.module)?.functions.get(&ty.generic_name())
    }

    /// Classify the global name a type refers to
    pub fn search_symbol_kind(&self, ty: &Type) -> SymbolKind {
        if ty.module.is_empty()
            && (PRIMITIVE_NAMES.contains(&ty.name.as_str()) || self.primitives.contains_key(&ty.name))
        {
            return SymbolKind::Basic;
        }
        let Some(module) = self.modules.get(&ty.module) else {
            return SymbolKind::Error;
        };
        let name = ty.generic_name();
        if module.structs.contains_key(&name) {
            SymbolKind::Struct
        } else if module.tagged_unions.contains_key(&name) {
            SymbolKind::TaggedUnion
        } else if module.enums.contains_key(&name) {
            SymbolKind::Enum
        } else if module.functions.contains_key(&name) {
            SymbolKind::Func
        } else {
            SymbolKind::Error
        }
    }

    /// Source file declaring a module, empty when unknown
    pub fn module_file(&self, module: &str) -> &str {
        self.modules
            .get(module)
            .map(|m| m.file.as_str())
            .unwrap_or("")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_table() -> SymbolTable {
        let mut table = SymbolTable::new();
        table.add_struct(
            "main",
            StructSymbol {
                name: "point".to_string(),
                fields: vec![
                    FieldSymbol {
                        name: "x".to_string(),
                        ty: Type::i64(),
                    },
                    FieldSymbol {
                        name: "y".to_string(),
                        ty: Type::i64(),
                    },
                ],
                methods: ["len".to_string()].into_iter().collect(),
                line: 1,
            },
        );
        table.add_enum(
            "main",
            EnumSymbol {
                name: "color".to_string(),
                members: vec![("red".to_string(), 0), ("blue".to_string(), 4)],
                line: 5,
            },
        );
        table.add_function(
            "main",
            FunctionSymbol {
                name: "puts".to_string(),
                is_extern: true,
            },
        );
        table
    }

    #[test]
    fn test_search_symbol_kind() {
        let table = sample_table();
        assert_eq!(table.search_symbol_kind(&Type::i64()), SymbolKind::Basic);
        assert_eq!(
            table.search_symbol_kind(&Type::named("point", "main")),
            SymbolKind::Struct
        );
        assert_eq!(
            table.search_symbol_kind(&Type::named("color", "main")),
            SymbolKind::Enum
        );
        assert_eq!(
            table.search_symbol_kind(&Type::named("puts", "main")),
            SymbolKind::Func
        );
        assert_eq!(
            table.search_symbol_kind(&Type::named("missing", "main")),
            SymbolKind::Error
        );
        assert_eq!(
            table.search_symbol_kind(&Type::named("point", "other")),
            SymbolKind::Error
        );
    }

    #[test]
    fn test_field_index_uses_declaration_order() {
        let table = sample_table();
        let point = table.find_struct(&Type::named("point", "main")).unwrap();
        assert_eq!(point.field_index("x"), Some(0));
        assert_eq!(point.field_index("y"), Some(1));
        assert_eq!(point.field_index("z"), None);
    }

    #[test]
    fn test_enum_member_value() {
        let table = sample_table();
        let color = table.find_enum(&Type::named("color", "main")).unwrap();
        assert_eq!(color.member_value("blue"), Some(4));
        assert_eq!(color.member_value("green"), None);
    }

    #[test]
    fn test_symbol_table_from_json() {
        let json = r#"{
            "input_file": "main.colgm",
            "modules": {
                "main": {
                    "file": "main.colgm",
                    "structs": {
                        "pair": {
                            "name": "pair",
                            "fields": [{"name": "a", "type": {"name": "i32"}}]
                        }
                    }
                }
            }
        }"#;
        let table: SymbolTable = serde_json::from_str(json).unwrap();
        assert_eq!(table.module_file("main"), "main.colgm");
        let pair = table.find_struct(&Type::named("pair", "main")).unwrap();
        assert_eq!(pair.fields[0].ty, Type::i32());
    }
}
