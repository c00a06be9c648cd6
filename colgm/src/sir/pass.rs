//! Module-level SIR passes
//!
//! Passes run in order over the lowered module. A pass that reports errors
//! stops the pipeline.

use std::collections::HashSet;

use tracing::debug;

use crate::error::CompileError;

use super::{SirBinOp, SirFunction, SirInst, SirModule, SirValue};

/// A transformation or check over the whole module
pub trait SirPass {
    /// Name of the pass
    fn name(&self) -> &'static str;

    /// One-line summary of the last run
    fn info(&self) -> String;

    /// Run the pass; errors found are appended to `errors`
    fn run(&mut self, module: &mut SirModule, errors: &mut Vec<CompileError>);
}

/// Ordered list of passes
pub struct PassManager {
    passes: Vec<Box<dyn SirPass>>,
}

impl Default for PassManager {
    fn default() -> Self {
        Self::standard()
    }
}

impl PassManager {
    pub fn new() -> Self {
        Self { passes: Vec::new() }
    }

    /// The passes every lowered module goes through
    pub fn standard() -> Self {
        let mut manager = Self::new();
        manager.add_pass(Box::new(DetectRedefExtern));
        manager.add_pass(Box::new(PrimitiveSizeOpt::default()));
        manager.add_pass(Box::new(ReplaceStructPtrCall::default()));
        manager
    }

    pub fn add_pass(&mut self, pass: Box<dyn SirPass>) {
        self.passes.push(pass);
    }

    /// Run every pass, stopping after the first one that reports errors
    pub fn run(&mut self, module: &mut SirModule) -> Vec<CompileError> {
        let mut errors = Vec::new();
        for pass in &mut self.passes {
            pass.run(module, &mut errors);
            debug!(pass = pass.name(), info = %pass.info(), "ran SIR pass");
            if !errors.is_empty() {
                break;
            }
        }
        errors
    }
}

/// Rejects a function declared more than once
pub struct DetectRedefExtern;

impl SirPass for DetectRedefExtern {
    fn name(&self) -> &'static str {
        "detect redef extern"
    }

    fn info(&self) -> String {
        "checked declarations".to_string()
    }

    fn run(&mut self, module: &mut SirModule, errors: &mut Vec<CompileError>) {
        let mut seen = HashSet::new();
        for decl in &module.func_decls {
            if !seen.insert(decl.name.as_str()) {
                errors.push(CompileError::internal_in(
                    format!("redefinition of extern function \"{}\"", decl.name),
                    decl.span,
                    decl.file.clone(),
                ));
            }
        }
    }
}

/// Byte size behind a primitive `__size__` method
fn primitive_size(callee: &str) -> Option<&'static str> {
    let size = match callee.strip_suffix(".__size__")? {
        "i8" | "u8" | "bool" => "1",
        "i16" | "u16" => "2",
        "i32" | "u32" | "f32" => "4",
        "i64" | "u64" | "f64" => "8",
        _ => return None,
    };
    Some(size)
}

/// Replace every instruction `rewrite` maps to something; returns the count
fn rewrite_calls(
    func: &mut SirFunction,
    mut rewrite: impl FnMut(&SirInst) -> Option<SirInst>,
) -> usize {
    let mut count = 0;
    for block in &mut func.blocks {
        for inst in &mut block.instructions {
            if let Some(replacement) = rewrite(inst) {
                *inst = replacement;
                count += 1;
            }
        }
    }
    count
}

/// Folds `i64.__size__()` and friends into constants; primitives have no
/// helper function to call
#[derive(Default)]
pub struct PrimitiveSizeOpt {
    replaced: usize,
}

impl SirPass for PrimitiveSizeOpt {
    fn name(&self) -> &'static str {
        "primitive size opt"
    }

    fn info(&self) -> String {
        format!("replaced {} primitive size call(s)", self.replaced)
    }

    fn run(&mut self, module: &mut SirModule, _errors: &mut Vec<CompileError>) {
        for func in &mut module.func_impls {
            self.replaced += rewrite_calls(func, |inst| {
                let SirInst::Call { name, dest, .. } = inst else {
                    return None;
                };
                let size = primitive_size(name)?;
                Some(SirInst::Binary {
                    op: SirBinOp::Add,
                    dest: dest.clone(),
                    left: SirValue::literal(size),
                    right: SirValue::literal("0"),
                    is_integer: true,
                    is_signed: true,
                    ty: "i64".to_string(),
                })
            });
        }
    }
}

/// Turns `S.__ptr__(self)` into the address of the receiver itself
#[derive(Default)]
pub struct ReplaceStructPtrCall {
    replaced: usize,
}

impl SirPass for ReplaceStructPtrCall {
    fn name(&self) -> &'static str {
        "replace struct __ptr__ call"
    }

    fn info(&self) -> String {
        format!("replaced {} __ptr__ call(s)", self.replaced)
    }

    fn run(&mut self, module: &mut SirModule, _errors: &mut Vec<CompileError>) {
        for func in &mut module.func_impls {
            self.replaced += rewrite_calls(func, |inst| {
                let SirInst::Call {
                    name,
                    return_ty,
                    dest,
                    args,
                    ..
                } = inst
                else {
                    return None;
                };
                if !name.contains(".__ptr__") || args.len() != 1 {
                    return None;
                }
                let pointee = return_ty.strip_suffix('*')?;
                Some(SirInst::TempPtr {
                    target: dest.as_variable()?.to_string(),
                    source: args[0].1.as_variable()?.to_string(),
                    ty: pointee.to_string(),
                })
            });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sir::{BasicBlock, ENTRY_LABEL, Terminator};
    use crate::span::Span;

    fn call(name: &str, return_ty: &str, args: Vec<(String, SirValue)>) -> SirInst {
        SirInst::Call {
            name: name.to_string(),
            return_ty: return_ty.to_string(),
            dest: SirValue::variable("_0"),
            args,
            signature: None,
            debug_loc: None,
        }
    }

    fn module_with(inst: SirInst) -> SirModule {
        let mut module = SirModule::new("x86_64-pc-linux-gnu");
        module.func_impls.push(SirFunction {
            name: "f".to_string(),
            return_type: "void".to_string(),
            blocks: vec![BasicBlock {
                label: ENTRY_LABEL,
                comment: String::new(),
                instructions: vec![inst],
                terminator: Terminator::Return {
                    ty: "void".to_string(),
                    value: None,
                },
            }],
            ..SirFunction::default()
        });
        module
    }

    fn first_inst(module: &SirModule) -> &SirInst {
        &module.func_impls[0].blocks[0].instructions[0]
    }

    #[test]
    fn test_primitive_size_folded() {
        let mut module = module_with(call("u16.__size__", "i64", Vec::new()));
        let mut pass = PrimitiveSizeOpt::default();
        let mut errors = Vec::new();
        pass.run(&mut module, &mut errors);
        assert!(errors.is_empty());
        assert_eq!(pass.replaced, 1);
        assert!(matches!(
            first_inst(&module),
            SirInst::Binary { op: SirBinOp::Add, left, dest, .. }
                if *left == SirValue::literal("2") && *dest == SirValue::variable("_0")
        ));
    }

    #[test]
    fn test_struct_size_call_kept() {
        let original = call("main.point.__size__", "i64", Vec::new());
        let mut module = module_with(original.clone());
        PrimitiveSizeOpt::default().run(&mut module, &mut Vec::new());
        assert_eq!(first_inst(&module), &original);
    }

    #[test]
    fn test_ptr_call_becomes_temp_ptr() {
        let receiver = ("%struct.main.point*".to_string(), SirValue::variable("p.slot"));
        let mut module = module_with(call(
            "main.point.__ptr__",
            "%struct.main.point*",
            vec![receiver],
        ));
        let mut pass = ReplaceStructPtrCall::default();
        pass.run(&mut module, &mut Vec::new());
        assert_eq!(pass.replaced, 1);
        assert_eq!(
            first_inst(&module),
            &SirInst::TempPtr {
                target: "_0".to_string(),
                source: "p.slot".to_string(),
                ty: "%struct.main.point".to_string(),
            }
        );
    }

    #[test]
    fn test_redefined_extern_reported() {
        let mut module = SirModule::new("x86_64-pc-linux-gnu");
        for line in [3, 9] {
            module.func_decls.push(SirFunction {
                name: "puts".to_string(),
                return_type: "i32".to_string(),
                span: Span::at(0, 4, line, 1),
                file: "main.colgm".to_string(),
                ..SirFunction::default()
            });
        }
        let errors = PassManager::standard().run(&mut module);
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].span().map(|s| s.line), Some(9));
        assert!(errors[0].message().contains("puts"));
    }
}
