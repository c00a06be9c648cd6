//! Debug metadata records
//!
//! Records are numbered by a module-wide counter in creation order and
//! printed as `!N = ...` after the function definitions.

use std::fmt;

/// Element of an anonymous metadata tuple
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DiItem {
    Ref(u64),
    I32(i32),
    Str(String),
    Null,
}

/// A numbered metadata record
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DiNode {
    List {
        index: u64,
        items: Vec<DiItem>,
    },
    File {
        index: u64,
        filename: String,
        directory: String,
    },
    CompileUnit {
        index: u64,
        producer: String,
        file: u64,
    },
    BasicType {
        index: u64,
        name: String,
        size_in_bits: u64,
        encoding: &'static str,
    },
    EnumType {
        index: u64,
        name: String,
        identifier: String,
        file: u64,
        line: u64,
        base_type: u64,
        elements: Option<u64>,
    },
    Enumerator {
        index: u64,
        name: String,
        value: i64,
    },
    StructureType {
        index: u64,
        name: String,
        identifier: String,
        file: u64,
        line: u64,
    },
    Subprogram {
        index: u64,
        name: String,
        file: u64,
        line: u64,
        type_index: u64,
        unit: u64,
    },
    SubroutineType {
        index: u64,
        types: u64,
    },
    Location {
        index: u64,
        line: u64,
        column: u64,
        scope: u64,
    },
}

impl DiNode {
    pub fn index(&self) -> u64 {
        match self {
            Self::List { index, .. }
            | Self::File { index, .. }
            | Self::CompileUnit { index, .. }
            | Self::BasicType { index, .. }
            | Self::EnumType { index, .. }
            | Self::Enumerator { index, .. }
            | Self::StructureType { index, .. }
            | Self::Subprogram { index, .. }
            | Self::SubroutineType { index, .. }
            | Self::Location { index, .. } => *index,
        }
    }
}

/// `!name = !{!a, !b}`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NamedMetadata {
    pub name: String,
    pub refs: Vec<u64>,
}

/// All debug records of a module
#[derive(Debug, Clone, Default)]
pub struct DebugInfo {
    pub named: Vec<NamedMetadata>,
    pub nodes: Vec<DiNode>,
    counter: u64,
}

impl DebugInfo {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reserve the next record index
    pub fn next_index(&mut self) -> u64 {
        let index = self.counter;
        self.counter += 1;
        index
    }

    /// Index the next reserved record will get
    pub fn peek_index(&self) -> u64 {
        self.counter
    }

    pub fn push(&mut self, node: DiNode) {
        self.nodes.push(node);
    }

    pub fn add_named(&mut self, name: impl Into<String>, refs: Vec<u64>) {
        self.named.push(NamedMetadata {
            name: name.into(),
            refs,
        });
    }

    /// Append a call-site location and return its index
    pub fn add_location(&mut self, line: u64, column: u64, scope: u64) -> u64 {
        let index = self.next_index();
        self.push(DiNode::Location {
            index,
            line,
            column,
            scope,
        });
        index
    }

    pub fn is_empty(&self) -> bool {
        self.named.is_empty() && self.nodes.is_empty()
    }

    pub fn find(&self, index: u64) -> Option<&DiNode> {
        self.nodes.iter().find(|n| n.index() == index)
    }
}

impl fmt::Display for DiItem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Ref(index) => write!(f, "!{index}"),
            Self::I32(value) => write!(f, "i32 {value}"),
            Self::Str(value) => write!(f, "!\"{value}\""),
            Self::Null => write!(f, "null"),
        }
    }
}

impl fmt::Display for NamedMetadata {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let refs = self
            .refs
            .iter()
            .map(|r| format!("!{r}"))
            .collect::<Vec<_>>()
            .join(", ");
        write!(f, "!{} = !{{{}}}", self.name, refs)
    }
}

impl fmt::Display for DiNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "!{} = ", self.index())?;
        match self {
            Self::List { items, .. } => {
                let items = items
                    .iter()
                    .map(DiItem::to_string)
                    .collect::<Vec<_>>()
                    .join(", ");
                write!(f, "!{{{items}}}")
            }
            Self::File {
                filename,
                directory,
                ..
            } => write!(
                f,
                "!DIFile(filename: \"{filename}\", directory: \"{directory}\")"
            ),
            Self::CompileUnit { producer, file, .. } => write!(
                f,
                "distinct !DICompileUnit(language: DW_LANG_C99, file: !{file}, \
                 producer: \"{producer}\", isOptimized: false, emissionKind: FullDebug)"
            ),
            Self::BasicType {
                name,
                size_in_bits,
                encoding,
                ..
            } => write!(
                f,
                "!DIBasicType(name: \"{name}\", size: {size_in_bits}, encoding: {encoding})"
            ),
            Self::EnumType {
                name,
                identifier,
                file,
                line,
                base_type,
                elements,
                ..
            } => {
                write!(
                    f,
                    "!DICompositeType(tag: DW_TAG_enumeration_type, name: \"{name}\", \
                     file: !{file}, line: {line}, baseType: !{base_type}, \
                     size: 64, flags: DIFlagEnumClass, "
                )?;
                if let Some(elements) = elements {
                    write!(f, "elements: !{elements}, ")?;
                }
                write!(f, "identifier: \"{identifier}\")")
            }
            Self::Enumerator { name, value, .. } => {
                write!(f, "!DIEnumerator(name: \"{name}\", value: {value})")
            }
            Self::StructureType {
                name,
                identifier,
                file,
                line,
                ..
            } => write!(
                f,
                "!DICompositeType(tag: DW_TAG_structure_type, name: \"{name}\", \
                 file: !{file}, line: {line}, identifier: \"{identifier}\")"
            ),
            Self::Subprogram {
                name,
                file,
                line,
                type_index,
                unit,
                ..
            } => write!(
                f,
                "distinct !DISubprogram(name: \"{name}\", scope: !{file}, file: !{file}, \
                 line: {line}, type: !{type_index}, scopeLine: {line}, \
                 spFlags: DISPFlagDefinition, unit: !{unit})"
            ),
            Self::SubroutineType { types, .. } => {
                write!(f, "!DISubroutineType(types: !{types})")
            }
            Self::Location {
                line,
                column,
                scope,
                ..
            } => write!(
                f,
                "!DILocation(line: {line}, column: {column}, scope: !{scope})"
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counter_is_shared() {
        let mut info = DebugInfo::new();
        assert_eq!(info.next_index(), 0);
        assert_eq!(info.add_location(3, 7, 0), 1);
        assert_eq!(info.peek_index(), 2);
        assert!(matches!(info.find(1), Some(DiNode::Location { line: 3, .. })));
    }

    #[test]
    fn test_display_records() {
        let list = DiNode::List {
            index: 0,
            items: vec![DiItem::I32(7), DiItem::Str("Dwarf Version".to_string()), DiItem::I32(4)],
        };
        assert_eq!(list.to_string(), "!0 = !{i32 7, !\"Dwarf Version\", i32 4}");

        let loc = DiNode::Location {
            index: 9,
            line: 12,
            column: 5,
            scope: 4,
        };
        assert_eq!(loc.to_string(), "!9 = !DILocation(line: 12, column: 5, scope: !4)");

        let named = NamedMetadata {
            name: "llvm.module.flags".to_string(),
            refs: vec![1, 2],
        };
        assert_eq!(named.to_string(), "!llvm.module.flags = !{!1, !2}");
    }

    #[test]
    fn test_display_enum_without_elements() {
        let node = DiNode::EnumType {
            index: 3,
            name: "color".to_string(),
            identifier: "main.color".to_string(),
            file: 1,
            line: 2,
            base_type: 0,
            elements: None,
        };
        let text = node.to_string();
        assert!(text.starts_with("!3 = !DICompositeType(tag: DW_TAG_enumeration_type"));
        assert!(!text.contains("elements"));
        assert!(text.ends_with("identifier: \"main.color\")"));
    }
}
