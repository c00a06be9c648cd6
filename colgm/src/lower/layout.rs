//! Size and alignment of lowered types
//!
//! Pointers and references are 8 bytes. Struct fields are padded to their
//! alignment and the struct size is rounded up to the largest field
//! alignment; an empty struct occupies one byte. A tagged union is an
//! 8-byte tag followed by storage for its largest member, aligned to the
//! most-aligned member.

use std::collections::{HashMap, HashSet};

use crate::mir::{MirContext, MirStruct, MirTaggedUnion};
use crate::types::{SymbolTable, Type};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Layout {
    pub size: u64,
    pub align: u64,
}

impl Layout {
    const fn new(size: u64, align: u64) -> Self {
        Self { size, align }
    }
}

/// Layout of a tagged union plus what its payload is declared as
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnionLayout {
    pub layout: Layout,
    /// Payload size rounded up to the payload alignment
    pub union_size: u64,
    /// Member whose type represents the payload in the declaration
    pub max_align_type: Option<Type>,
    pub max_align_size: u64,
}

fn align_up(offset: u64, align: u64) -> u64 {
    let align = align.max(1);
    offset.div_ceil(align) * align
}

fn primitive_layout(name: &str) -> Option<Layout> {
    match name {
        "bool" | "i8" | "u8" => Some(Layout::new(1, 1)),
        "i16" | "u16" => Some(Layout::new(2, 2)),
        "i32" | "u32" | "f32" => Some(Layout::new(4, 4)),
        "i64" | "u64" | "f64" => Some(Layout::new(8, 8)),
        "void" => Some(Layout::new(1, 1)),
        _ => None,
    }
}

/// Layouts of every struct and tagged union in a context
#[derive(Debug, Default)]
pub struct LayoutTable {
    structs: HashMap<String, Layout>,
    unions: HashMap<String, UnionLayout>,
}

impl LayoutTable {
    pub fn compute(ctx: &MirContext, symbols: &SymbolTable) -> Self {
        let mut builder = LayoutBuilder {
            symbols,
            struct_defs: ctx
                .structs
                .iter()
                .map(|s| (s.ty().full_path_name(), s))
                .collect(),
            union_defs: ctx
                .tagged_unions
                .iter()
                .map(|u| (u.ty().full_path_name(), u))
                .collect(),
            table: LayoutTable::default(),
            visiting: HashSet::new(),
        };
        for s in &ctx.structs {
            builder.struct_layout(&s.ty().full_path_name());
        }
        for u in &ctx.tagged_unions {
            builder.union_layout(&u.ty().full_path_name());
        }
        builder.table
    }

    pub fn struct_layout(&self, ty: &Type) -> Option<Layout> {
        self.structs.get(&ty.full_path_name()).copied()
    }

    pub fn union_layout(&self, ty: &Type) -> Option<&UnionLayout> {
        self.unions.get(&ty.full_path_name())
    }
}

struct LayoutBuilder<'a> {
    symbols: &'a SymbolTable,
    struct_defs: HashMap<String, &'a MirStruct>,
    union_defs: HashMap<String, &'a MirTaggedUnion>,
    table: LayoutTable,
    /// Aggregates currently being measured, breaks by-value cycles
    visiting: HashSet<String>,
}

impl LayoutBuilder<'_> {
    fn type_layout(&mut self, ty: &Type) -> Layout {
        if ty.is_array {
            let mut element = ty.ref_copy();
            element.is_array = false;
            let element = self.type_layout(&element);
            return Layout::new(element.size * ty.array_length, element.align);
        }
        if ty.is_pointer() || ty.is_reference {
            return Layout::new(8, 8);
        }
        if ty.module.is_empty() {
            if let Some(layout) = primitive_layout(&ty.name) {
                return layout;
            }
        }
        if ty.is_enum || self.symbols.find_enum(ty).is_some() {
            return Layout::new(8, 8);
        }
        let key = ty.full_path_name();
        if self.struct_defs.contains_key(&key) {
            return self.struct_layout(&key);
        }
        if self.union_defs.contains_key(&key) {
            return self.union_layout(&key).layout;
        }
        Layout::new(0, 1)
    }

    fn struct_layout(&mut self, key: &str) -> Layout {
        if let Some(layout) = self.table.structs.get(key) {
            return *layout;
        }
        let Some(def) = self.struct_defs.get(key).copied() else {
            return Layout::new(1, 1);
        };
        if !self.visiting.insert(key.to_string()) {
            return Layout::new(0, 1);
        }

        let mut size = 0;
        let mut align = 1;
        for field in &def.field_types {
            let field = self.type_layout(field);
            align = align.max(field.align);
            size = align_up(size, field.align) + field.size;
        }
        let layout = if size == 0 {
            Layout::new(1, 1)
        } else {
            Layout::new(align_up(size, align), align)
        };

        self.visiting.remove(key);
        self.table.structs.insert(key.to_string(), layout);
        layout
    }

    fn union_layout(&mut self, key: &str) -> UnionLayout {
        if let Some(layout) = self.table.unions.get(key) {
            return layout.clone();
        }
        let Some(def) = self.union_defs.get(key).copied() else {
            return UnionLayout {
                layout: Layout::new(8, 8),
                union_size: 0,
                max_align_type: None,
                max_align_size: 0,
            };
        };
        if !self.visiting.insert(key.to_string()) {
            return UnionLayout {
                layout: Layout::new(8, 8),
                union_size: 0,
                max_align_type: None,
                max_align_size: 0,
            };
        }

        let mut union_size = 0;
        let mut union_align = 0;
        let mut max_align_type = None;
        let mut max_align_size = 0;
        for member in &def.member_types {
            let layout = self.type_layout(member);
            if layout.align > union_align {
                union_align = layout.align;
                max_align_type = Some(member.clone());
                max_align_size = layout.size;
            }
            union_size = union_size.max(layout.size);
        }
        let union_size = align_up(union_size, union_align);
        let align = union_align.max(8);
        let size = align_up(align_up(8, union_align) + union_size, align);

        let layout = UnionLayout {
            layout: Layout::new(size, align),
            union_size,
            max_align_type,
            max_align_size,
        };
        self.visiting.remove(key);
        self.table.unions.insert(key.to_string(), layout.clone());
        layout
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::span::Span;

    fn mir_struct(name: &str, fields: Vec<Type>) -> MirStruct {
        MirStruct {
            name: name.to_string(),
            module: "main".to_string(),
            file: String::new(),
            span: Span::default(),
            field_types: fields,
        }
    }

    #[test]
    fn test_struct_padding() {
        let ctx = MirContext {
            structs: vec![
                mir_struct("a", vec![Type::bool(), Type::i64(), Type::i32()]),
                mir_struct("empty", vec![]),
                mir_struct("outer", vec![Type::u8(), Type::named("a", "main")]),
            ],
            ..MirContext::default()
        };
        let table = LayoutTable::compute(&ctx, &SymbolTable::new());
        assert_eq!(
            table.struct_layout(&Type::named("a", "main")),
            Some(Layout::new(24, 8))
        );
        assert_eq!(
            table.struct_layout(&Type::named("empty", "main")),
            Some(Layout::new(1, 1))
        );
        assert_eq!(
            table.struct_layout(&Type::named("outer", "main")),
            Some(Layout::new(32, 8))
        );
    }

    #[test]
    fn test_array_field() {
        let mut buffer = Type::u8().with_pointer_depth(1);
        buffer.is_array = true;
        buffer.array_length = 13;
        let ctx = MirContext {
            structs: vec![mir_struct("buf", vec![Type::i32(), buffer])],
            ..MirContext::default()
        };
        let table = LayoutTable::compute(&ctx, &SymbolTable::new());
        assert_eq!(
            table.struct_layout(&Type::named("buf", "main")),
            Some(Layout::new(20, 4))
        );
    }

    #[test]
    fn test_tagged_union() {
        let ctx = MirContext {
            tagged_unions: vec![MirTaggedUnion {
                name: "value".to_string(),
                module: "main".to_string(),
                file: String::new(),
                span: Span::default(),
                member_types: vec![Type::u8(), Type::f64(), Type::named("pair", "main")],
            }],
            structs: vec![mir_struct("pair", vec![Type::i64(), Type::i64()])],
            ..MirContext::default()
        };
        let table = LayoutTable::compute(&ctx, &SymbolTable::new());
        let layout = table.union_layout(&Type::named("value", "main")).unwrap();
        assert_eq!(layout.layout, Layout::new(24, 8));
        assert_eq!(layout.union_size, 16);
        assert_eq!(layout.max_align_type, Some(Type::f64()));
        assert_eq!(layout.max_align_size, 8);
    }
}
