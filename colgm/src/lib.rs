//! colgm code generator
//!
//! Lowers the typed, tree-shaped MIR of a resolved colgm program into SIR,
//! a flat SSA-style form of labelled basic blocks, and prints it as
//! textual LLVM-style IR.

pub mod config;
pub mod error;
pub mod lower;
pub mod mir;
pub mod sir;
pub mod span;
pub mod types;
pub mod util;

pub use config::CodegenConfig;
pub use error::{CompileError, Result};
pub use lower::{EvalMode, lower_program};
pub use mir::{MirContext, MirInput};
pub use sir::SirModule;
pub use span::Span;
pub use types::{SymbolTable, Type};

/// Lower `input` and print the module text
pub fn emit_ir(input: &MirInput, config: &CodegenConfig) -> Result<String> {
    let module = lower_program(&input.context, &input.symbols, config)?;
    sir::print_module(&module, config.debug_info)
}
