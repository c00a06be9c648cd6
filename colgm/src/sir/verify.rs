//! SIR well-formedness checks and CFG cleanup
//!
//! Lowered functions must satisfy:
//! - every branch target is patched and names a label defined exactly once
//! - every block is reachable from the entry block
//!
//! The single-terminator rule holds by construction since a block stores
//! its terminator apart from its instructions.

use std::collections::{HashMap, HashSet, VecDeque};

use super::{ENTRY_LABEL, Label, SirFunction, SirModule};

/// A broken invariant in one function
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VerifyError {
    MissingEntry {
        function: String,
    },
    DuplicateLabel {
        function: String,
        label: Label,
    },
    UnpatchedTarget {
        function: String,
        block: Label,
    },
    UndefinedTarget {
        function: String,
        block: Label,
        target: Label,
    },
    UnreachableBlock {
        function: String,
        label: Label,
    },
}

impl std::fmt::Display for VerifyError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::MissingEntry { function } => {
                write!(f, "{function}: first block is not the entry block")
            }
            Self::DuplicateLabel { function, label } => {
                write!(f, "{function}: label {label} defined more than once")
            }
            Self::UnpatchedTarget { function, block } => {
                write!(f, "{function}: block {block} has an unpatched branch target")
            }
            Self::UndefinedTarget {
                function,
                block,
                target,
            } => write!(
                f,
                "{function}: block {block} jumps to undefined label {target}"
            ),
            Self::UnreachableBlock { function, label } => {
                write!(f, "{function}: block {label} is unreachable")
            }
        }
    }
}

/// Labels reachable from the entry block, by breadth-first walk
fn reachable_labels(func: &SirFunction) -> HashSet<Label> {
    let by_label: HashMap<Label, usize> = func
        .blocks
        .iter()
        .enumerate()
        .map(|(i, b)| (b.label, i))
        .collect();
    let mut seen = HashSet::new();
    let mut queue = VecDeque::new();
    if func.blocks.first().map(|b| b.label) == Some(ENTRY_LABEL) {
        seen.insert(ENTRY_LABEL);
        queue.push_back(ENTRY_LABEL);
    }
    while let Some(label) = queue.pop_front() {
        let Some(&index) = by_label.get(&label) else {
            continue;
        };
        for target in func.blocks[index].terminator.targets().into_iter().flatten() {
            if seen.insert(target) {
                queue.push_back(target);
            }
        }
    }
    seen
}

/// Check one function definition; declarations always pass
pub fn verify_function(func: &SirFunction) -> Vec<VerifyError> {
    let mut errors = Vec::new();
    if func.is_declaration() {
        return errors;
    }
    if func.blocks[0].label != ENTRY_LABEL {
        errors.push(VerifyError::MissingEntry {
            function: func.name.clone(),
        });
    }

    let mut defined = HashSet::new();
    for block in &func.blocks {
        if !defined.insert(block.label) {
            errors.push(VerifyError::DuplicateLabel {
                function: func.name.clone(),
                label: block.label,
            });
        }
    }

    for block in &func.blocks {
        for target in block.terminator.targets() {
            match target {
                None => errors.push(VerifyError::UnpatchedTarget {
                    function: func.name.clone(),
                    block: block.label,
                }),
                Some(target) if !defined.contains(&target) => {
                    errors.push(VerifyError::UndefinedTarget {
                        function: func.name.clone(),
                        block: block.label,
                        target,
                    })
                }
                Some(_) => {}
            }
        }
    }

    let reachable = reachable_labels(func);
    for block in &func.blocks {
        if !reachable.contains(&block.label) {
            errors.push(VerifyError::UnreachableBlock {
                function: func.name.clone(),
                label: block.label,
            });
        }
    }
    errors
}

/// Check every function definition of a module
pub fn verify_module(module: &SirModule) -> Vec<VerifyError> {
    module.func_impls.iter().flat_map(verify_function).collect()
}

/// Drop blocks no path from the entry reaches. Labels are not renumbered.
///
/// Returns the number of removed blocks.
pub fn prune_unreachable_blocks(func: &mut SirFunction) -> usize {
    let reachable = reachable_labels(func);
    let before = func.blocks.len();
    func.blocks.retain(|b| reachable.contains(&b.label));
    before - func.blocks.len()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sir::{BasicBlock, SirValue, Terminator};

    fn block(label: Label, terminator: Terminator) -> BasicBlock {
        BasicBlock {
            label,
            comment: String::new(),
            instructions: Vec::new(),
            terminator,
        }
    }

    fn function(blocks: Vec<BasicBlock>) -> SirFunction {
        SirFunction {
            name: "f".to_string(),
            return_type: "void".to_string(),
            blocks,
            ..SirFunction::default()
        }
    }

    fn ret_void() -> Terminator {
        Terminator::Return {
            ty: "void".to_string(),
            value: None,
        }
    }

    #[test]
    fn test_well_formed_function_passes() {
        let func = function(vec![
            block(
                ENTRY_LABEL,
                Terminator::Branch {
                    cond: SirValue::literal("1"),
                    on_true: Some(1),
                    on_false: Some(2),
                },
            ),
            block(1, Terminator::Goto(Some(2))),
            block(2, ret_void()),
        ]);
        assert!(verify_function(&func).is_empty());
    }

    #[test]
    fn test_unpatched_and_undefined_targets() {
        let func = function(vec![
            block(
                ENTRY_LABEL,
                Terminator::Branch {
                    cond: SirValue::literal("1"),
                    on_true: Some(9),
                    on_false: None,
                },
            ),
        ]);
        let errors = verify_function(&func);
        assert!(errors.contains(&VerifyError::UnpatchedTarget {
            function: "f".to_string(),
            block: ENTRY_LABEL,
        }));
        assert!(errors.contains(&VerifyError::UndefinedTarget {
            function: "f".to_string(),
            block: ENTRY_LABEL,
            target: 9,
        }));
    }

    #[test]
    fn test_duplicate_and_unreachable_labels() {
        let func = function(vec![
            block(ENTRY_LABEL, ret_void()),
            block(1, ret_void()),
            block(1, ret_void()),
        ]);
        let errors = verify_function(&func);
        assert!(errors.contains(&VerifyError::DuplicateLabel {
            function: "f".to_string(),
            label: 1,
        }));
        assert!(errors.iter().any(|e| matches!(e, VerifyError::UnreachableBlock { label: 1, .. })));
    }

    #[test]
    fn test_prune_unreachable_blocks() {
        let mut func = function(vec![
            block(ENTRY_LABEL, Terminator::Goto(Some(2))),
            block(1, Terminator::Goto(Some(2))),
            block(2, ret_void()),
        ]);
        assert_eq!(prune_unreachable_blocks(&mut func), 1);
        let labels: Vec<Label> = func.blocks.iter().map(|b| b.label).collect();
        assert_eq!(labels, vec![ENTRY_LABEL, 2]);
        assert!(verify_function(&func).is_empty());
    }
}
