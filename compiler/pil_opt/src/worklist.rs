//! Instruction worklist with a queued bit per entry.

use rustc_hash::FxHashSet;

use pil_ir::InstId;

/// LIFO worklist that holds each instruction at most once.
///
/// Erased instructions are not removed eagerly; their stale handles are
/// popped and skipped by the driver.
#[derive(Default)]
pub(crate) struct Worklist {
    stack: Vec<InstId>,
    queued: FxHashSet<InstId>,
}

impl Worklist {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Queue `inst` unless it is already queued. Returns whether it was
    /// added.
    pub(crate) fn push(&mut self, inst: InstId) -> bool {
        let added = self.queued.insert(inst);
        if added {
            self.stack.push(inst);
        }
        added
    }

    /// Queue `insts` so that they pop in the order given.
    pub(crate) fn push_in_order(&mut self, insts: &[InstId]) {
        for &inst in insts.iter().rev() {
            self.push(inst);
        }
    }

    pub(crate) fn pop(&mut self) -> Option<InstId> {
        let inst = self.stack.pop()?;
        self.queued.remove(&inst);
        Some(inst)
    }

    pub(crate) fn len(&self) -> usize {
        self.stack.len()
    }
}
