//! Argument resolution.
//!
//! Block arguments do not store their incoming values. The value flowing
//! into argument `i` of block `B` from predecessor `P` is found on demand
//! by reading the operand `P`'s terminator passes for `B` at position `i`.
//!
//! Classification of an argument by the shape of its block's incoming
//! edges:
//!
//! | Predecessors | Kind |
//! |--------------|------|
//! | none | [`PhiKind::Unreachable`] |
//! | one, ending in an unconditional `br` | [`PhiKind::TrivialCopy`] |
//! | two or more, or one that branches elsewhere too | [`PhiKind::Phi`] |

use crate::{ArgId, BlockId, Function, InstKind, Value};

/// Shape of the incoming edges of a block argument.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PhiKind {
    /// No predecessors; nothing flows in.
    Unreachable,
    /// Exactly one predecessor that always branches here.
    TrivialCopy,
    /// A genuine merge point.
    Phi,
}

/// Why an incoming value could not be resolved.
///
/// Both outcomes describe legitimate IR shapes; callers branch on them.
#[derive(Clone, Copy, Debug, PartialEq, Eq, thiserror::Error)]
pub enum ResolveError {
    /// The predecessor's terminator does not pass block arguments along
    /// this edge.
    #[error("terminator of {pred:?} does not pass arguments to {block:?}")]
    NotAPhi { pred: BlockId, block: BlockId },
    /// `pred` is not a predecessor, or passes too few operands.
    #[error("{pred:?} supplies no incoming value for argument {index} of {block:?}")]
    NoIncomingValue {
        pred: BlockId,
        block: BlockId,
        index: usize,
    },
}

impl Function {
    /// Classify `arg` by the incoming edges of its block.
    pub fn phi_kind(&self, arg: ArgId) -> PhiKind {
        let block = self.args[arg].block;
        let preds = self.predecessors(block);
        match preds.as_slice() {
            [] => PhiKind::Unreachable,
            [pred] => {
                let unconditional = self
                    .terminator(*pred)
                    .is_some_and(|term| matches!(self.insts[term].kind, InstKind::Branch { .. }));
                if unconditional {
                    PhiKind::TrivialCopy
                } else {
                    PhiKind::Phi
                }
            }
            _ => PhiKind::Phi,
        }
    }

    /// Whether `arg` merges values from several edges.
    pub fn is_phi(&self, arg: ArgId) -> bool {
        self.phi_kind(arg) == PhiKind::Phi
    }

    /// The value `pred` passes to `arg`.
    pub fn resolve_incoming(&self, arg: ArgId, pred: BlockId) -> Result<Value, ResolveError> {
        let a = &self.args[arg];
        let (block, index) = (a.block, a.index());
        let missing = ResolveError::NoIncomingValue { pred, block, index };

        let term = self.terminator(pred).ok_or(missing)?;
        let term = &self.insts[term];
        if !term.kind.successors().contains(&block) {
            return Err(missing);
        }
        let operands = term
            .successor_operands(block)
            .ok_or(ResolveError::NotAPhi { pred, block })?;
        operands.get(index).copied().ok_or(missing)
    }

    /// The value `pred` passes to `arg`, if any.
    pub fn incoming_value(&self, arg: ArgId, pred: BlockId) -> Option<Value> {
        self.resolve_incoming(arg, pred).ok()
    }

    /// One `(predecessor, value)` pair per predecessor.
    ///
    /// Returns `None` unless `arg` is a true phi and every predecessor
    /// supplies a value.
    pub fn all_incoming_values(&self, arg: ArgId) -> Option<Vec<(BlockId, Value)>> {
        if !self.is_phi(arg) {
            return None;
        }
        let block = self.args[arg].block;
        self.predecessors(block)
            .into_iter()
            .map(|pred| Some((pred, self.incoming_value(arg, pred)?)))
            .collect()
    }

    /// The value flowing into `arg` when its block has exactly one
    /// predecessor, whatever that predecessor's terminator is.
    pub fn single_terminator_operand(&self, arg: ArgId) -> Option<Value> {
        let block = self.args[arg].block;
        match self.predecessors(block).as_slice() {
            [pred] => self.incoming_value(arg, *pred),
            _ => None,
        }
    }
}
