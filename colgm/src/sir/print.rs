//! Textual IR emission
//!
//! Prints a [`SirModule`] as an LLVM-style assembly module with typed
//! pointers. Output is deterministic: sections appear in a fixed order and
//! every list keeps its submission order.

use std::fmt::{self, Write};

use super::{
    BasicBlock, CmpKind, ConvertOp, ENTRY_LABEL, Label, SirBinOp, SirFunction, SirInst, SirModule,
    SirValue, Terminator,
};
use crate::error::Result;
use crate::util::{llvm_raw_string, quoted_name};

/// Printed name of a block label
pub fn label_name(label: Label) -> String {
    if label == ENTRY_LABEL {
        "label.entry".to_string()
    } else {
        format!("label.{label:x}")
    }
}

fn target_name(target: Option<Label>) -> String {
    match target {
        Some(label) => format!("%{}", label_name(label)),
        None => "%label.pending".to_string(),
    }
}

impl fmt::Display for SirValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Variable(name) => write!(f, "%{}", quoted_name(name)),
            Self::Literal(text) => write!(f, "{text}"),
            Self::Null(_) => write!(f, "undef"),
        }
    }
}

impl SirBinOp {
    fn mnemonic(self, is_integer: bool, is_signed: bool) -> &'static str {
        match (self, is_integer) {
            (Self::Add, true) => "add",
            (Self::Add, false) => "fadd",
            (Self::Sub, true) => "sub",
            (Self::Sub, false) => "fsub",
            (Self::Mul, true) => "mul",
            (Self::Mul, false) => "fmul",
            (Self::Div, true) if is_signed => "sdiv",
            (Self::Div, true) => "udiv",
            (Self::Div, false) => "fdiv",
            (Self::Rem, true) if is_signed => "srem",
            (Self::Rem, true) => "urem",
            (Self::Rem, false) => "frem",
            (Self::And, _) => "and",
            (Self::Xor, _) => "xor",
            (Self::Or, _) => "or",
        }
    }
}

impl CmpKind {
    fn predicate(self, is_integer: bool, is_signed: bool) -> &'static str {
        match (self, is_integer, is_signed) {
            (Self::Eq, true, _) => "icmp eq",
            (Self::Ne, true, _) => "icmp ne",
            (Self::Ge, true, true) => "icmp sge",
            (Self::Ge, true, false) => "icmp uge",
            (Self::Gt, true, true) => "icmp sgt",
            (Self::Gt, true, false) => "icmp ugt",
            (Self::Le, true, true) => "icmp sle",
            (Self::Le, true, false) => "icmp ule",
            (Self::Lt, true, true) => "icmp slt",
            (Self::Lt, true, false) => "icmp ult",
            (Self::Eq, false, _) => "fcmp ueq",
            (Self::Ne, false, _) => "fcmp une",
            (Self::Ge, false, _) => "fcmp uge",
            (Self::Gt, false, _) => "fcmp ugt",
            (Self::Le, false, _) => "fcmp ule",
            (Self::Lt, false, _) => "fcmp ult",
        }
    }
}

/// Instruction text without indentation; `debug` controls `!dbg` suffixes
fn write_inst(out: &mut String, inst: &SirInst, debug: bool) -> fmt::Result {
    match inst {
        SirInst::TempPtr { target, source, ty } => {
            let ty = quoted_name(ty);
            write!(
                out,
                "%{} = getelementptr {ty}, {ty}* %{}, i32 0",
                quoted_name(target),
                quoted_name(source)
            )
        }
        SirInst::Str {
            target,
            index,
            length,
        } => write!(
            out,
            "{target} = getelementptr [{length} x i8], [{length} x i8]* @.str.{index}, i64 0, i64 0"
        ),
        SirInst::ZeroInit { dest, ty } => {
            let ty = quoted_name(ty);
            write!(out, "store {ty} zeroinitializer, {ty}* {dest}")
        }
        SirInst::GetIndex {
            dest,
            source,
            index,
            ty,
            index_ty,
        } => {
            let ty = quoted_name(ty);
            write!(
                out,
                "{dest} = getelementptr {ty}, {ty}* {source}, {} {index}",
                quoted_name(index_ty)
            )
        }
        SirInst::GetField {
            dest,
            source,
            struct_ty,
            index,
        } => {
            let ty = quoted_name(struct_ty);
            write!(
                out,
                "{dest} = getelementptr inbounds {ty}, {ty}* {source}, i32 0, i32 {index}"
            )
        }
        SirInst::Call {
            name,
            return_ty,
            dest,
            args,
            signature,
            debug_loc,
        } => {
            if matches!(dest, SirValue::Variable(_)) {
                write!(out, "{dest} = ")?;
            }
            write!(out, "call {}", quoted_name(return_ty))?;
            if let Some(signature) = signature {
                write!(out, " {signature}")?;
            }
            let args = args
                .iter()
                .map(|(ty, value)| format!("{} {value}", quoted_name(ty)))
                .collect::<Vec<_>>()
                .join(", ");
            write!(out, " @{}({args})", quoted_name(name))?;
            if let (true, Some(loc)) = (debug, debug_loc) {
                write!(out, ", !dbg !{loc}")?;
            }
            Ok(())
        }
        SirInst::Neg {
            dest,
            source,
            is_integer,
            ty,
        } => {
            if *is_integer {
                write!(out, "{dest} = sub {} 0, {source}", quoted_name(ty))
            } else {
                write!(out, "{dest} = fsub {} 0.0, {source}", quoted_name(ty))
            }
        }
        SirInst::Bnot { dest, source, ty } => {
            write!(out, "{dest} = xor {} {source}, -1", quoted_name(ty))
        }
        SirInst::Lnot { dest, source, ty } => {
            write!(out, "{dest} = xor {} {source}, true", quoted_name(ty))
        }
        SirInst::Binary {
            op,
            dest,
            left,
            right,
            is_integer,
            is_signed,
            ty,
        } => write!(
            out,
            "{dest} = {} {} {left}, {right}",
            op.mnemonic(*is_integer, *is_signed),
            quoted_name(ty)
        ),
        SirInst::Cmp {
            kind,
            dest,
            left,
            right,
            is_integer,
            is_signed,
            ty,
        } => write!(
            out,
            "{dest} = {} {} {left}, {right}",
            kind.predicate(*is_integer, *is_signed),
            quoted_name(ty)
        ),
        SirInst::Store { ty, source, dest } => {
            let ty = quoted_name(ty);
            write!(out, "store {ty} {source}, {ty}* {dest}")
        }
        SirInst::Load { ty, source, dest } => {
            let ty = quoted_name(ty);
            write!(out, "{dest} = load {ty}, {ty}* {source}")
        }
        SirInst::Convert {
            op,
            dest,
            source,
            from,
            to,
        } => match op {
            ConvertOp::Copy => write!(out, "{dest} = add {} {source}, 0", quoted_name(from)),
            _ => write!(
                out,
                "{dest} = {} {} {source} to {}",
                op.mnemonic(),
                quoted_name(from),
                quoted_name(to)
            ),
        },
        SirInst::ArrayCast {
            dest,
            source,
            ty,
            size,
        } => {
            let array = format!("[{size} x {}]", quoted_name(ty));
            write!(
                out,
                "{dest} = getelementptr {array}, {array}* {source}, i64 0, i64 0"
            )
        }
    }
}

fn write_terminator(out: &mut String, term: &Terminator) -> fmt::Result {
    match term {
        Terminator::Goto(target) => write!(out, "br label {}", target_name(*target)),
        Terminator::Branch {
            cond,
            on_true,
            on_false,
        } => write!(
            out,
            "br i1 {cond}, label {}, label {}",
            target_name(*on_true),
            target_name(*on_false)
        ),
        Terminator::Switch {
            value,
            ty,
            cases,
            default,
        } => {
            let ty = quoted_name(ty);
            write!(out, "switch {ty} {value}, label {} [", target_name(*default))?;
            for (case, label) in cases {
                write!(out, " {ty} {case}, label {}", target_name(Some(*label)))?;
            }
            write!(out, " ]")
        }
        Terminator::Return { ty, value } => match value {
            Some(value) => write!(out, "ret {} {value}", quoted_name(ty)),
            None => write!(out, "ret void"),
        },
        Terminator::Unreachable => write!(out, "unreachable"),
    }
}

fn write_block(out: &mut String, block: &BasicBlock, debug: bool) -> fmt::Result {
    for inst in &block.instructions {
        out.push_str("  ");
        write_inst(out, inst, debug)?;
        out.push('\n');
    }
    out.push_str("  ");
    write_terminator(out, &block.terminator)?;
    out.push('\n');
    Ok(())
}

fn write_signature(out: &mut String, func: &SirFunction, debug: bool) -> fmt::Result {
    let keyword = if func.is_declaration() {
        "declare"
    } else {
        "define"
    };
    write!(
        out,
        "{keyword} {} @{}(",
        quoted_name(&func.return_type),
        quoted_name(&func.name)
    )?;
    let mut params = func
        .params
        .iter()
        .map(|(name, ty)| format!("{} %{}", quoted_name(ty), quoted_name(name)))
        .collect::<Vec<_>>();
    if func.with_va_args {
        params.push("...".to_string());
    }
    write!(out, "{})", params.join(", "))?;
    for attr in &func.attributes {
        write!(out, " {attr}")?;
    }
    if let (true, Some(index)) = (debug, func.debug_index) {
        write!(out, " !dbg !{index}")?;
    }
    Ok(())
}

fn write_function(out: &mut String, func: &SirFunction, debug: bool) -> fmt::Result {
    write_signature(out, func, debug)?;
    if func.is_declaration() {
        return writeln!(out);
    }
    writeln!(out, " {{")?;
    for (i, block) in func.blocks.iter().enumerate() {
        if i == 0 {
            writeln!(out, "{}:", label_name(block.label))?;
            for alloca in &func.allocas {
                writeln!(
                    out,
                    "  %{} = alloca {}",
                    quoted_name(&alloca.variable),
                    quoted_name(&alloca.ty)
                )?;
            }
        } else {
            writeln!(out)?;
            writeln!(out, "{}: ; {}", label_name(block.label), block.comment)?;
        }
        write_block(out, block, debug)?;
    }
    writeln!(out, "}}")
}

/// Print one function definition or declaration
pub fn print_function(func: &SirFunction, debug: bool) -> Result<String> {
    let mut out = String::new();
    write_function(&mut out, func, debug)?;
    Ok(out)
}

fn write_struct_helpers(out: &mut String, module: &SirModule) -> fmt::Result {
    for st in &module.structs {
        let real = quoted_name(&format!("%struct.{}", st.name));
        let size_fn = quoted_name(&format!("{}.__size__", st.name));
        writeln!(out, "define i64 @{size_fn}() alwaysinline {{")?;
        writeln!(out, "label.entry:")?;
        writeln!(
            out,
            "  ret i64 ptrtoint ({real}* getelementptr ({real}, {real}* null, i64 1) to i64)"
        )?;
        writeln!(out, "}}")?;
    }
    for st in &module.structs {
        let real = quoted_name(&format!("%struct.{}", st.name));
        let size_fn = quoted_name(&format!("{}.__size__", st.name));
        let alloc_fn = quoted_name(&format!("{}.__alloc__", st.name));
        writeln!(out, "define {real}* @{alloc_fn}() alwaysinline {{")?;
        writeln!(out, "label.entry:")?;
        writeln!(out, "  %0 = call i64 @{size_fn}()")?;
        writeln!(out, "  %1 = call i8* @malloc(i64 %0)")?;
        writeln!(out, "  %2 = bitcast i8* %1 to {real}*")?;
        writeln!(out, "  ret {real}* %2")?;
        writeln!(out, "}}")?;
    }
    Ok(())
}

/// Print the whole module; `debug` adds `!dbg` references and records
pub fn print_module(module: &SirModule, debug: bool) -> Result<String> {
    let mut out = String::new();

    writeln!(out, "; ModuleID = 'colgm'")?;
    if !module.target_triple.is_empty() {
        writeln!(out, "target triple = \"{}\"", module.target_triple)?;
    }
    writeln!(out)?;

    for tu in &module.tagged_unions {
        let members = std::iter::once("i64".to_string())
            .chain(tu.member_types.iter().map(|t| quoted_name(t)))
            .collect::<Vec<_>>()
            .join(", ");
        writeln!(
            out,
            "{} = type {{ {members} }}",
            quoted_name(&format!("%tagged_union.{}", tu.name))
        )?;
    }
    for st in &module.structs {
        let name = quoted_name(&format!("%struct.{}", st.name));
        if st.field_types.is_empty() {
            writeln!(out, "{name} = type {{}}")?;
        } else {
            let fields = st
                .field_types
                .iter()
                .map(|t| quoted_name(t))
                .collect::<Vec<_>>()
                .join(", ");
            writeln!(out, "{name} = type {{ {fields} }}")?;
        }
    }
    if !module.structs.is_empty() || !module.tagged_unions.is_empty() {
        writeln!(out)?;
    }

    for (index, literal) in module.const_strings.iter().enumerate() {
        writeln!(
            out,
            "@.str.{index} = private unnamed_addr constant [{} x i8] c\"{}\"",
            literal.len() + 1,
            llvm_raw_string(literal)
        )?;
    }
    if !module.const_strings.is_empty() {
        writeln!(out)?;
    }

    if !module.structs.is_empty() {
        write_struct_helpers(&mut out, module)?;
        writeln!(out)?;
    }

    let needs_malloc = !module.structs.is_empty() && !module.declares("malloc");
    if needs_malloc {
        writeln!(out, "declare i8* @malloc(i64)")?;
    }
    for decl in &module.func_decls {
        write_function(&mut out, decl, debug)?;
    }
    if needs_malloc || !module.func_decls.is_empty() {
        writeln!(out)?;
    }

    for func in &module.func_impls {
        write_function(&mut out, func, debug)?;
        writeln!(out)?;
    }

    if debug {
        for named in &module.debug_info.named {
            writeln!(out, "{named}")?;
        }
        if !module.debug_info.named.is_empty() && !module.debug_info.nodes.is_empty() {
            writeln!(out)?;
        }
        for node in &module.debug_info.nodes {
            writeln!(out, "{node}")?;
        }
    }

    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sir::{SirAlloca, SirStruct};

    fn answer_function() -> SirFunction {
        SirFunction {
            name: "answer".to_string(),
            return_type: "i64".to_string(),
            allocas: vec![SirAlloca {
                variable: "x.0".to_string(),
                ty: "i64".to_string(),
            }],
            blocks: vec![BasicBlock {
                label: ENTRY_LABEL,
                comment: "entry".to_string(),
                instructions: vec![
                    SirInst::Store {
                        ty: "i64".to_string(),
                        source: SirValue::literal("42"),
                        dest: SirValue::variable("x.0"),
                    },
                    SirInst::Load {
                        ty: "i64".to_string(),
                        source: SirValue::variable("x.0"),
                        dest: SirValue::variable("_0"),
                    },
                ],
                terminator: Terminator::Return {
                    ty: "i64".to_string(),
                    value: Some(SirValue::variable("_0")),
                },
            }],
            debug_index: Some(7),
            ..SirFunction::default()
        }
    }

    #[test]
    fn test_print_function() {
        let text = print_function(&answer_function(), false).unwrap();
        insta::assert_snapshot!(text, @r"
        define i64 @answer() {
        label.entry:
          %x.0 = alloca i64
          store i64 42, i64* %x.0
          %_0 = load i64, i64* %x.0
          ret i64 %_0
        }
        ");
    }

    #[test]
    fn test_print_function_with_debug_index() {
        let text = print_function(&answer_function(), true).unwrap();
        assert!(text.starts_with("define i64 @answer() !dbg !7 {"));
    }

    #[test]
    fn test_label_names_are_hex() {
        assert_eq!(label_name(ENTRY_LABEL), "label.entry");
        assert_eq!(label_name(10), "label.a");
        assert_eq!(target_name(None), "%label.pending");
    }

    #[test]
    fn test_print_terminators() {
        let mut out = String::new();
        write_terminator(
            &mut out,
            &Terminator::Switch {
                value: SirValue::variable("_1"),
                ty: "i64".to_string(),
                cases: vec![(0, 1), (2, 2)],
                default: Some(3),
            },
        )
        .unwrap();
        assert_eq!(
            out,
            "switch i64 %_1, label %label.3 [ i64 0, label %label.1 i64 2, label %label.2 ]"
        );

        out.clear();
        write_terminator(
            &mut out,
            &Terminator::Branch {
                cond: SirValue::variable("_2"),
                on_true: Some(4),
                on_false: Some(5),
            },
        )
        .unwrap();
        assert_eq!(out, "br i1 %_2, label %label.4, label %label.5");
    }

    #[test]
    fn test_print_generic_struct_field_access() {
        let mut out = String::new();
        write_inst(
            &mut out,
            &SirInst::GetField {
                dest: SirValue::variable("_3"),
                source: SirValue::variable("_2"),
                struct_ty: "%struct.std.vec<i64>".to_string(),
                index: 1,
            },
            false,
        )
        .unwrap();
        assert_eq!(
            out,
            "%_3 = getelementptr inbounds %\"struct.std.vec<i64>\", %\"struct.std.vec<i64>\"* %_2, i32 0, i32 1"
        );
    }

    #[test]
    fn test_print_call_with_debug_location() {
        let call = SirInst::Call {
            name: "puts".to_string(),
            return_ty: "i32".to_string(),
            dest: SirValue::variable("_4"),
            args: vec![("i8*".to_string(), SirValue::variable("_3"))],
            signature: None,
            debug_loc: Some(11),
        };
        let mut out = String::new();
        write_inst(&mut out, &call, true).unwrap();
        assert_eq!(out, "%_4 = call i32 @puts(i8* %_3), !dbg !11");

        out.clear();
        write_inst(&mut out, &call, false).unwrap();
        assert_eq!(out, "%_4 = call i32 @puts(i8* %_3)");
    }

    #[test]
    fn test_print_module_sections_in_order() {
        let mut module = SirModule::new("x86_64-pc-linux-gnu");
        module.structs.push(SirStruct {
            name: "main.point".to_string(),
            field_types: vec!["i64".to_string(), "i64".to_string()],
            size: 16,
            align: 8,
        });
        module.intern_string("hi");
        module.func_decls.push(SirFunction {
            name: "puts".to_string(),
            return_type: "i32".to_string(),
            params: vec![("s.param".to_string(), "i8*".to_string())],
            ..SirFunction::default()
        });
        module.func_impls.push(answer_function());

        let text = print_module(&module, false).unwrap();
        let pos = |needle: &str| text.find(needle).unwrap();
        assert!(pos("target triple") < pos("%struct.main.point = type { i64, i64 }"));
        assert!(pos("%struct.main.point = type") < pos("@.str.0 = private unnamed_addr constant [3 x i8] c\"hi\\00\""));
        assert!(pos("@.str.0") < pos("define i64 @main.point.__size__()"));
        assert!(pos("@main.point.__alloc__") < pos("declare i8* @malloc(i64)"));
        assert!(pos("declare i32 @puts(i8* %s.param)") < pos("define i64 @answer()"));
        assert!(!text.contains("!dbg"));
    }
}
