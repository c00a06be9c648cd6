//! Basic-block construction with forward-reference patching
//!
//! Blocks are built one at a time. Jumps to labels that do not exist yet
//! are emitted with an empty target and remembered as a [`PatchHandle`];
//! once the destination is opened the handle is patched in place.

use crate::sir::{BasicBlock, ENTRY_LABEL, Label, SirAlloca, SirInst, Terminator};

use super::scope::NameGen;

/// Which target of a terminator a patch handle refers to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PatchSlot {
    Goto,
    BranchTrue,
    BranchFalse,
    SwitchDefault,
}

/// A not-yet-known jump target, by finished block index
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PatchHandle {
    pub block: usize,
    pub slot: PatchSlot,
}

impl PatchHandle {
    pub fn goto(block: usize) -> Self {
        Self {
            block,
            slot: PatchSlot::Goto,
        }
    }

    pub fn branch_true(block: usize) -> Self {
        Self {
            block,
            slot: PatchSlot::BranchTrue,
        }
    }

    pub fn branch_false(block: usize) -> Self {
        Self {
            block,
            slot: PatchSlot::BranchFalse,
        }
    }

    pub fn switch_default(block: usize) -> Self {
        Self {
            block,
            slot: PatchSlot::SwitchDefault,
        }
    }
}

#[derive(Debug)]
struct OpenBlock {
    label: Label,
    comment: String,
    instructions: Vec<SirInst>,
}

/// Block list of the function being lowered
#[derive(Debug)]
pub struct FunctionBuilder {
    blocks: Vec<BasicBlock>,
    allocas: Vec<SirAlloca>,
    current: Option<OpenBlock>,
    labels: NameGen,
}

impl Default for FunctionBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl FunctionBuilder {
    /// A builder with the entry block open
    pub fn new() -> Self {
        let mut labels = NameGen::new();
        let entry = labels.next();
        debug_assert_eq!(entry, ENTRY_LABEL);
        Self {
            blocks: Vec::new(),
            allocas: Vec::new(),
            current: Some(OpenBlock {
                label: entry,
                comment: String::new(),
                instructions: Vec::new(),
            }),
            labels,
        }
    }

    pub fn fresh_label(&mut self) -> Label {
        self.labels.next()
    }

    /// Whether the last block was closed and no new one opened yet
    pub fn is_terminated(&self) -> bool {
        self.current.is_none()
    }

    pub fn add_alloca(&mut self, variable: impl Into<String>, ty: impl Into<String>) {
        self.allocas.push(SirAlloca {
            variable: variable.into(),
            ty: ty.into(),
        });
    }

    /// Append to the open block; code after a terminator lands in a fresh
    /// block nothing jumps to
    pub fn push_inst(&mut self, inst: SirInst) {
        if self.current.is_none() {
            self.open_fresh("unreachable");
        }
        if let Some(block) = self.current.as_mut() {
            block.instructions.push(inst);
        }
    }

    /// Open `label`, falling through from the open block if there is one
    pub fn start_block(&mut self, label: Label, comment: impl Into<String>) {
        if self.current.is_some() {
            self.finish_block(Terminator::Goto(Some(label)));
        }
        self.current = Some(OpenBlock {
            label,
            comment: comment.into(),
            instructions: Vec::new(),
        });
    }

    /// Open a block under a new label
    pub fn open_fresh(&mut self, comment: impl Into<String>) -> Label {
        let label = self.fresh_label();
        self.start_block(label, comment);
        label
    }

    /// Close the open block and return its index for patching
    pub fn finish_block(&mut self, terminator: Terminator) -> usize {
        let block = match self.current.take() {
            Some(block) => block,
            None => OpenBlock {
                label: self.labels.next(),
                comment: "unreachable".to_string(),
                instructions: Vec::new(),
            },
        };
        self.blocks.push(BasicBlock {
            label: block.label,
            comment: block.comment,
            instructions: block.instructions,
            terminator,
        });
        self.blocks.len() - 1
    }

    /// Fill the target a handle points at
    pub fn patch(&mut self, handle: PatchHandle, label: Label) {
        let Some(block) = self.blocks.get_mut(handle.block) else {
            return;
        };
        match (&mut block.terminator, handle.slot) {
            (Terminator::Goto(target), PatchSlot::Goto) => *target = Some(label),
            (Terminator::Branch { on_true, .. }, PatchSlot::BranchTrue) => *on_true = Some(label),
            (Terminator::Branch { on_false, .. }, PatchSlot::BranchFalse) => {
                *on_false = Some(label)
            }
            (Terminator::Switch { default, .. }, PatchSlot::SwitchDefault) => {
                *default = Some(label)
            }
            _ => {}
        }
    }

    pub fn patch_all(&mut self, handles: impl IntoIterator<Item = PatchHandle>, label: Label) {
        for handle in handles {
            self.patch(handle, label);
        }
    }

    /// Register a case on a finished switch block
    pub fn add_switch_case(&mut self, block: usize, value: i64, label: Label) {
        if let Some(BasicBlock {
            terminator: Terminator::Switch { cases, .. },
            ..
        }) = self.blocks.get_mut(block)
        {
            cases.push((value, label));
        }
    }

    /// Close the last block with `fallback` if still open and hand out the
    /// allocas and blocks
    pub fn finish(mut self, fallback: Terminator) -> (Vec<SirAlloca>, Vec<BasicBlock>) {
        if self.current.is_some() {
            self.finish_block(fallback);
        }
        (self.allocas, self.blocks)
    }
}
