//! DWARF metadata for a lowered module
//!
//! Emits, in index order: the producer ident, module flags, one file
//! record per source file, the compile unit, basic types, enum and struct
//! types, and a subprogram per function definition. Call-site locations
//! are appended later while function bodies are lowered.

use std::collections::{BTreeSet, HashMap};

use tracing::debug;

use crate::config::CodegenConfig;
use crate::mir::MirContext;
use crate::sir::DebugInfo;
use crate::sir::debug_info::{DiItem, DiNode};
use crate::types::{SymbolTable, Type};
use crate::util::mangle;

const BASIC_TYPES: &[(&str, u64, &str)] = &[
    ("i8", 8, "DW_ATE_signed"),
    ("i16", 16, "DW_ATE_signed"),
    ("i32", 32, "DW_ATE_signed"),
    ("i64", 64, "DW_ATE_signed"),
    ("u8", 8, "DW_ATE_unsigned"),
    ("u16", 16, "DW_ATE_unsigned"),
    ("u32", 32, "DW_ATE_unsigned"),
    ("u64", 64, "DW_ATE_unsigned"),
    ("f32", 32, "DW_ATE_float"),
    ("f64", 64, "DW_ATE_float"),
    ("bool", 1, "DW_ATE_boolean"),
];

/// Scopes function bodies attach their call locations to
#[derive(Debug, Default)]
pub struct DwarfScopes {
    pub compile_unit: u64,
    /// Subprogram index per function name
    pub impl_scopes: HashMap<String, u64>,
}

/// Fill `info` with module-level debug records
pub fn generate(
    info: &mut DebugInfo,
    ctx: &MirContext,
    symbols: &SymbolTable,
    config: &CodegenConfig,
    target_triple: &str,
) -> DwarfScopes {
    let ident = info.next_index();
    info.push(DiNode::List {
        index: ident,
        items: vec![DiItem::Str(config.producer.clone())],
    });
    info.add_named("llvm.ident", vec![ident]);

    let flags = module_flags(info, target_triple);
    info.add_named("llvm.module.flags", flags);

    let files = file_records(info, ctx, symbols);
    let empty_file = files.get("").copied().unwrap_or_default();

    let compile_unit = info.next_index();
    info.push(DiNode::CompileUnit {
        index: compile_unit,
        producer: config.producer.clone(),
        file: files
            .get(symbols.input_file.as_str())
            .copied()
            .unwrap_or(empty_file),
    });
    info.add_named("llvm.dbg.cu", vec![compile_unit]);

    let mut basic = HashMap::new();
    for &(name, size_in_bits, encoding) in BASIC_TYPES {
        let index = info.next_index();
        info.push(DiNode::BasicType {
            index,
            name: name.to_string(),
            size_in_bits,
            encoding,
        });
        basic.insert(name, index);
    }
    let base_type = basic.get("i64").copied().unwrap_or_default();

    for (path, module) in &symbols.modules {
        let file = files.get(module.file.as_str()).copied().unwrap_or(empty_file);
        for symbol in module.enums.values() {
            let index = info.next_index();
            let elements = if symbol.members.is_empty() {
                None
            } else {
                let mut refs = Vec::new();
                for (name, value) in &symbol.members {
                    let enumerator = info.next_index();
                    info.push(DiNode::Enumerator {
                        index: enumerator,
                        name: name.clone(),
                        value: *value,
                    });
                    refs.push(DiItem::Ref(enumerator));
                }
                let list = info.next_index();
                info.push(DiNode::List {
                    index: list,
                    items: refs,
                });
                Some(list)
            };
            info.push(DiNode::EnumType {
                index,
                name: symbol.name.clone(),
                identifier: mangle(&Type::named(symbol.name.as_str(), path.as_str()).full_path_name()),
                file,
                line: symbol.line,
                base_type,
                elements,
            });
        }
    }

    for s in &ctx.structs {
        let index = info.next_index();
        info.push(DiNode::StructureType {
            index,
            name: s.name.clone(),
            identifier: format!("struct.{}", mangle(&s.ty().full_path_name())),
            file: files.get(s.file.as_str()).copied().unwrap_or(empty_file),
            line: s.span.line,
        });
    }

    let mut impl_scopes = HashMap::new();
    for func in &ctx.impls {
        let Some(&file) = files.get(func.file.as_str()) else {
            continue;
        };
        let types = info.next_index();
        info.push(DiNode::List {
            index: types,
            items: vec![DiItem::Null],
        });
        let type_index = info.next_index();
        info.push(DiNode::SubroutineType {
            index: type_index,
            types,
        });
        let index = info.next_index();
        info.push(DiNode::Subprogram {
            index,
            name: func.name.clone(),
            file,
            line: func.span.line,
            type_index,
            unit: compile_unit,
        });
        impl_scopes.insert(func.name.clone(), index);
    }

    debug!(
        records = info.peek_index(),
        subprograms = impl_scopes.len(),
        "generated debug records"
    );
    DwarfScopes {
        compile_unit,
        impl_scopes,
    }
}

fn module_flags(info: &mut DebugInfo, target_triple: &str) -> Vec<u64> {
    let mut flags: Vec<(i32, &str, i32)> = vec![
        (7, "Dwarf Version", 4),
        (2, "Debug Info Version", 3),
        (1, "wchar_size", 4),
    ];
    if target_triple.contains("apple") {
        flags.push((8, "PIC Level", 2));
    }
    flags.push((7, "uwtable", 1));
    flags.push((7, "frame-pointer", 1));

    flags
        .into_iter()
        .map(|(behavior, name, value)| {
            let index = info.next_index();
            info.push(DiNode::List {
                index,
                items: vec![
                    DiItem::I32(behavior),
                    DiItem::Str(name.to_string()),
                    DiItem::I32(value),
                ],
            });
            index
        })
        .collect()
}

/// One file record per distinct source path, plus an empty one for
/// compiler-generated code
fn file_records(
    info: &mut DebugInfo,
    ctx: &MirContext,
    symbols: &SymbolTable,
) -> HashMap<String, u64> {
    let directory = std::env::current_dir()
        .map(|dir| dir.display().to_string())
        .unwrap_or_default();

    let mut paths = BTreeSet::new();
    paths.insert(symbols.input_file.clone());
    paths.extend(symbols.modules.values().map(|m| m.file.clone()));
    paths.extend(ctx.structs.iter().map(|s| s.file.clone()));
    paths.extend(ctx.tagged_unions.iter().map(|u| u.file.clone()));
    paths.extend(ctx.impls.iter().map(|f| f.file.clone()));
    paths.remove("");

    let mut files = HashMap::new();
    for filename in std::iter::once(String::new()).chain(paths) {
        let index = info.next_index();
        info.push(DiNode::File {
            index,
            filename: filename.clone(),
            directory: directory.clone(),
        });
        files.insert(filename, index);
    }
    files
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mir::MirFunc;
    use crate::span::Span;
    use crate::types::EnumSymbol;

    fn context() -> (MirContext, SymbolTable) {
        let mut symbols = SymbolTable::new();
        symbols.input_file = "main.colgm".to_string();
        symbols.module_mut("main").file = "main.colgm".to_string();
        symbols.add_enum(
            "main",
            EnumSymbol {
                name: "color".to_string(),
                members: vec![("red".to_string(), 0), ("blue".to_string(), 1)],
                line: 2,
            },
        );
        let ctx = MirContext {
            impls: vec![MirFunc {
                name: "main".to_string(),
                file: "main.colgm".to_string(),
                span: Span::at(0, 0, 5, 1),
                params: Vec::new(),
                return_type: Type::i32(),
                attributes: Vec::new(),
                with_va_args: false,
                block: None,
            }],
            ..MirContext::default()
        };
        (ctx, symbols)
    }

    #[test]
    fn test_named_metadata() {
        let (ctx, symbols) = context();
        let mut info = DebugInfo::new();
        let scopes = generate(
            &mut info,
            &ctx,
            &symbols,
            &CodegenConfig::default(),
            "x86_64-pc-linux-gnu",
        );
        let names: Vec<&str> = info.named.iter().map(|n| n.name.as_str()).collect();
        assert_eq!(names, vec!["llvm.ident", "llvm.module.flags", "llvm.dbg.cu"]);
        assert_eq!(info.named[1].refs.len(), 5);
        assert!(matches!(
            info.find(scopes.compile_unit),
            Some(DiNode::CompileUnit { .. })
        ));
    }

    #[test]
    fn test_apple_targets_get_pic_level() {
        let (ctx, symbols) = context();
        let mut info = DebugInfo::new();
        generate(
            &mut info,
            &ctx,
            &symbols,
            &CodegenConfig::default(),
            "arm64-apple-macosx12.0.0",
        );
        assert_eq!(info.named[1].refs.len(), 6);
    }

    #[test]
    fn test_subprogram_and_enum_records() {
        let (ctx, symbols) = context();
        let mut info = DebugInfo::new();
        let scopes = generate(
            &mut info,
            &ctx,
            &symbols,
            &CodegenConfig::default(),
            "x86_64-pc-linux-gnu",
        );
        let scope = scopes.impl_scopes["main"];
        assert!(matches!(
            info.find(scope),
            Some(DiNode::Subprogram { line: 5, .. })
        ));
        let enumerators = info
            .nodes
            .iter()
            .filter(|n| matches!(n, DiNode::Enumerator { .. }))
            .count();
        assert_eq!(enumerators, 2);
        assert!(info.nodes.iter().any(|n| matches!(
            n,
            DiNode::EnumType { identifier, elements: Some(_), .. } if identifier == "main.color"
        )));
    }
}
