//! Structural verifier.
//!
//! Checks the invariants the mutation API maintains by construction, so a
//! failure points at a bug in a transformation rather than in its input.
//! Every violation found is reported, not just the first.

use rustc_hash::FxHashSet;

use crate::{ArgId, ArgKind, BlockId, Function, InstId, Ty, Use, Value};

/// One broken invariant.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum VerifyError {
    #[error("{block:?} does not end in a terminator")]
    MissingTerminator { block: BlockId },

    #[error("terminator {inst:?} is not the last instruction of {block:?}")]
    TerminatorNotLast { block: BlockId, inst: InstId },

    #[error("instruction list of {block:?} is inconsistent at {inst:?}")]
    BrokenLink { block: BlockId, inst: InstId },

    #[error("{block:?} records {recorded} instructions but holds {actual}")]
    LengthMismatch {
        block: BlockId,
        recorded: usize,
        actual: usize,
    },

    #[error("function argument {arg:?} is not in the entry block")]
    FunctionArgOutsideEntry { arg: ArgId },

    #[error("phi argument {arg:?} is in the entry block")]
    PhiInEntry { arg: ArgId },

    #[error("argument {arg:?} has stale block or index bookkeeping")]
    ArgBookkeeping { arg: ArgId },

    #[error("entry block has {found} arguments but the signature has {expected} parameters")]
    ParamCount { expected: usize, found: usize },

    #[error("parameter {index} has type {found} but the signature says {expected}")]
    ParamType { index: usize, expected: Ty, found: Ty },

    #[error("{mnemonic} {inst:?} has {found} operands")]
    OperandCount {
        inst: InstId,
        mnemonic: &'static str,
        found: usize,
    },

    #[error("{inst:?} branches to {dest:?}, which is not in the function")]
    UnknownSuccessor { inst: InstId, dest: BlockId },

    #[error("{pred:?} passes {found} values to {block:?}, which takes {expected}")]
    BranchArity {
        pred: BlockId,
        block: BlockId,
        expected: usize,
        found: usize,
    },

    #[error("operand {operand} of {inst:?} is a dead value")]
    DeadOperand { inst: InstId, operand: usize },

    #[error("operand {operand} of {inst:?} is defined by an unlinked instruction")]
    UnlinkedDefinition { inst: InstId, operand: usize },

    #[error("operand {operand} of {inst:?} is missing from the use list of {value:?}")]
    MissingUse {
        inst: InstId,
        operand: usize,
        value: Value,
    },

    #[error("use list of {value:?} has an entry {user:?}#{operand} that does not read it")]
    DanglingUse {
        value: Value,
        user: InstId,
        operand: u32,
    },

    #[error("{inst:?} uses {value:?} before its definition in {block:?}")]
    UseBeforeDef {
        block: BlockId,
        inst: InstId,
        value: Value,
    },
}

/// Check every structural invariant of `func`.
///
/// Declarations trivially pass.
pub fn verify_function(func: &Function) -> Result<(), Vec<VerifyError>> {
    if !func.is_definition() {
        return Ok(());
    }
    let mut v = Verifier {
        func,
        errors: Vec::new(),
    };
    v.check_signature();
    for &block in func.blocks() {
        v.check_links(block);
        v.check_args(block);
        v.check_insts(block);
        v.check_incoming_edges(block);
    }
    v.check_use_lists();

    if v.errors.is_empty() {
        Ok(())
    } else {
        Err(v.errors)
    }
}

struct Verifier<'f> {
    func: &'f Function,
    errors: Vec<VerifyError>,
}

impl Verifier<'_> {
    fn check_signature(&mut self) {
        let func = self.func;
        let args = func.block_args(func.entry_block());
        let params = &func.signature().params;
        if args.len() != params.len() {
            self.errors.push(VerifyError::ParamCount {
                expected: params.len(),
                found: args.len(),
            });
            return;
        }
        for (index, (&arg, &expected)) in args.iter().zip(params).enumerate() {
            let found = func.arg(arg).ty();
            if found != expected {
                self.errors.push(VerifyError::ParamType {
                    index,
                    expected,
                    found,
                });
            }
        }
    }

    fn check_links(&mut self, block: BlockId) {
        let func = self.func;
        let mut prev = None;
        let mut actual = 0;
        let mut cursor = func.block(block).first_inst();
        while let Some(inst) = cursor {
            let Some(node) = func.try_inst(inst) else {
                self.errors.push(VerifyError::BrokenLink { block, inst });
                return;
            };
            if node.block() != Some(block) || node.prev() != prev {
                self.errors.push(VerifyError::BrokenLink { block, inst });
            }
            actual += 1;
            prev = Some(inst);
            cursor = node.next();
        }
        if func.block(block).last_inst() != prev {
            if let Some(inst) = prev {
                self.errors.push(VerifyError::BrokenLink { block, inst });
            }
        }
        let recorded = func.block_len(block);
        if recorded != actual {
            self.errors.push(VerifyError::LengthMismatch {
                block,
                recorded,
                actual,
            });
        }
    }

    fn check_args(&mut self, block: BlockId) {
        let func = self.func;
        let is_entry = func.is_entry(block);
        for (index, &arg) in func.block_args(block).iter().enumerate() {
            let a = func.arg(arg);
            if a.block() != block || a.index() != index {
                self.errors.push(VerifyError::ArgBookkeeping { arg });
            }
            match (a.kind(), is_entry) {
                (ArgKind::Function, false) => {
                    self.errors.push(VerifyError::FunctionArgOutsideEntry { arg });
                }
                (ArgKind::Phi, true) => self.errors.push(VerifyError::PhiInEntry { arg }),
                _ => {}
            }
        }
    }

    fn check_insts(&mut self, block: BlockId) {
        let func = self.func;
        let mut defined: FxHashSet<InstId> = FxHashSet::default();
        let last = func.block(block).last_inst();

        for inst in func.block_insts(block) {
            let node = func.inst(inst);
            let kind = node.kind();

            if !kind.arity().accepts(node.operands().len()) {
                self.errors.push(VerifyError::OperandCount {
                    inst,
                    mnemonic: kind.mnemonic(),
                    found: node.operands().len(),
                });
            }
            if kind.is_terminator() && Some(inst) != last {
                self.errors.push(VerifyError::TerminatorNotLast { block, inst });
            }
            for dest in kind.successors() {
                if !func.contains_block(dest) || !func.blocks().contains(&dest) {
                    self.errors.push(VerifyError::UnknownSuccessor { inst, dest });
                }
            }

            for (operand, &value) in node.operands().iter().enumerate() {
                let Some(data) = func.try_value_data(value) else {
                    self.errors.push(VerifyError::DeadOperand { inst, operand });
                    continue;
                };
                let expected = Use {
                    user: inst,
                    operand: u32::try_from(operand).unwrap_or(u32::MAX),
                };
                if !data.uses().contains(&expected) {
                    self.errors.push(VerifyError::MissingUse {
                        inst,
                        operand,
                        value,
                    });
                }
                if let Some(def) = value.defining_inst() {
                    match func.inst(def).block() {
                        None => self
                            .errors
                            .push(VerifyError::UnlinkedDefinition { inst, operand }),
                        Some(b) if b == block && !defined.contains(&def) => {
                            self.errors.push(VerifyError::UseBeforeDef { block, inst, value });
                        }
                        Some(_) => {}
                    }
                }
            }
            defined.insert(inst);
        }

        match last {
            Some(inst) if func.inst(inst).is_terminator() => {}
            _ => self.errors.push(VerifyError::MissingTerminator { block }),
        }
    }

    fn check_incoming_edges(&mut self, block: BlockId) {
        let func = self.func;
        let expected = func.block_args(block).len();
        for pred in func.predecessors(block) {
            let Some(term) = func.terminator(pred) else {
                continue;
            };
            // Terminators that bind arguments implicitly (switch, try_apply)
            // have no operand list to check.
            if let Some(passed) = func.inst(term).successor_operands(block) {
                if passed.len() != expected {
                    self.errors.push(VerifyError::BranchArity {
                        pred,
                        block,
                        expected,
                        found: passed.len(),
                    });
                }
            }
        }
    }

    fn check_use_lists(&mut self) {
        let func = self.func;
        for &block in func.blocks() {
            let values = func
                .block_args(block)
                .iter()
                .map(|&a| Value::Arg(a))
                .chain(func.block_insts(block).flat_map(|i| func.results(i)));
            for value in values {
                for &Use { user, operand } in func.uses(value) {
                    let reads = func
                        .try_inst(user)
                        .and_then(|u| u.operands().get(operand as usize))
                        == Some(&value);
                    if !reads {
                        self.errors.push(VerifyError::DanglingUse {
                            value,
                            user,
                            operand,
                        });
                    }
                }
            }
        }
    }
}
