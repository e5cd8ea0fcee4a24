//! Worklist-driven peephole combiner.
//!
//! One [`Combiner`] optimizes one function. A run is a sequence of rounds;
//! each round seeds the worklist with every instruction of every block
//! reachable from the entry and drains it. Unreachable code is left alone:
//! requeued instructions outside the seeded blocks are skipped as well.
//! Draining pops an instruction, skips it if it has been erased since it
//! was queued, erases it if it is pure and unused, and otherwise asks the
//! rule for its opcode for a [`Rewrite`]. Rounds repeat until one makes no
//! change or the configured cap is reached.
//!
//! # Replacement safety
//!
//! Every replacement a rule proposes is checked before it is applied:
//!
//! - the replacement has the same type as the replaced value;
//! - its ownership kind [can replace](pil_ir::OwnershipKind::can_replace)
//!   the replaced kind;
//! - it is defined before the visited instruction in the same block, or in
//!   a block that dominates every user of the replaced value.
//!
//! A failed check drops the rewrite. Values synthesized by a rule are built
//! through [`Builder`], so their ownership is recomputed from the new
//! instruction rather than copied from the one it replaces.
//!
//! # Requeueing
//!
//! Erasing an instruction requeues the definers of its operands (they may
//! have become dead). Replacing a value requeues every user of the
//! replacement. Newly inserted instructions are queued themselves.

use rustc_hash::FxHashSet;
use smallvec::SmallVec;

use pil_ir::{verify_function, BlockId, Builder, Function, InstId, InstKind, Name, Ty, Value};

use crate::facts::{DominanceFacts, Facts};
use crate::rules;
use crate::worklist::Worklist;
use crate::CombinerConfig;

/// Outcome of visiting one instruction.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Rewrite {
    /// No rule applied, or the rule could not prove its rewrite safe.
    Unchanged,
    /// Redirect every use of the primary result to this value and erase the
    /// instruction.
    ReplaceWith(Value),
    /// Erase the instruction. Only legal when its results are unused.
    Erase,
    /// Build this instruction before the visited one and queue it. The
    /// visited instruction stays; a rule returning this must not propose
    /// the same insertion again on its next visit.
    InsertBefore(NewInst),
    /// Build this instruction before the visited one; its results take the
    /// place of the visited instruction's results and the visited
    /// instruction is erased.
    ReplaceWithNew(NewInst),
}

/// An instruction a rule wants built.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct NewInst {
    pub kind: InstKind,
    pub operands: SmallVec<[Value; 4]>,
    pub result_tys: SmallVec<[Ty; 1]>,
}

impl NewInst {
    /// An instruction with one result of type `ty`.
    pub fn new(kind: InstKind, operands: &[Value], ty: Ty) -> Self {
        Self {
            kind,
            operands: SmallVec::from_slice(operands),
            result_tys: SmallVec::from_slice(&[ty]),
        }
    }

    /// An instruction with no results.
    pub fn without_result(kind: InstKind, operands: &[Value]) -> Self {
        Self {
            kind,
            operands: SmallVec::from_slice(operands),
            result_tys: SmallVec::new(),
        }
    }

    pub fn literal(ty: Ty, value: i64) -> Self {
        Self::new(InstKind::IntegerLiteral { value }, &[], ty)
    }

    pub fn function_ref(ty: Ty, func: Name) -> Self {
        Self::new(InstKind::FunctionRef { func }, &[], ty)
    }
}

/// Counters reported by a Combiner run.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct CombineStats {
    /// Rounds run, including the final one that found nothing.
    pub iterations: u32,
    /// Instructions popped and still alive.
    pub visited: usize,
    /// Values whose uses were redirected.
    pub replaced: usize,
    /// Instructions erased.
    pub erased: usize,
    /// Instructions built by rules.
    pub inserted: usize,
    /// Whether the function was mutated at all.
    pub made_change: bool,
}

impl CombineStats {
    fn mutations(&self) -> usize {
        self.replaced + self.erased + self.inserted
    }
}

/// Peephole optimizer state for one function.
pub struct Combiner<'f, 'a> {
    func: &'f mut Function,
    facts: Facts<'a>,
    dominance: &'a dyn DominanceFacts,
    config: &'a CombinerConfig,
    worklist: Worklist,
    /// Blocks seeded this round.
    reachable: FxHashSet<BlockId>,
    /// Instructions a rule asked to erase after the visited one.
    deferred: SmallVec<[InstId; 2]>,
    stats: CombineStats,
}

impl<'f, 'a> Combiner<'f, 'a> {
    pub fn new(
        func: &'f mut Function,
        facts: Facts<'a>,
        dominance: &'a dyn DominanceFacts,
        config: &'a CombinerConfig,
    ) -> Self {
        Self {
            func,
            facts,
            dominance,
            config,
            worklist: Worklist::new(),
            reachable: FxHashSet::default(),
            deferred: SmallVec::new(),
            stats: CombineStats::default(),
        }
    }

    /// Run rounds until a fixed point or the iteration cap.
    ///
    /// # Panics
    ///
    /// With [`CombinerConfig::verify_each_iteration`] set, panics if the
    /// function fails verification after a round.
    pub fn run(mut self) -> CombineStats {
        let name = self.func.name();
        let span = tracing::debug_span!("combine", function = ?name);
        let _guard = span.enter();

        if !self.func.is_definition() {
            return self.stats;
        }

        for iteration in 0..self.config.max_iterations {
            self.stats.iterations += 1;
            let before = self.stats.mutations();
            self.seed();
            tracing::trace!(iteration, queued = self.worklist.len(), "seeded combine round");
            while let Some(inst) = self.worklist.pop() {
                let live = self.func.try_inst(inst).and_then(|i| i.block());
                if !live.is_some_and(|block| self.reachable.contains(&block)) {
                    continue;
                }
                self.visit(inst);
            }
            if self.config.verify_each_iteration {
                self.verify(iteration);
            }
            if self.stats.mutations() == before {
                break;
            }
            self.stats.made_change = true;
        }

        tracing::debug!(
            function = ?name,
            iterations = self.stats.iterations,
            visited = self.stats.visited,
            replaced = self.stats.replaced,
            erased = self.stats.erased,
            inserted = self.stats.inserted,
            "combined function"
        );
        self.stats
    }

    /// Queue every instruction of the reachable blocks in program order.
    fn seed(&mut self) {
        let mut order = Vec::with_capacity(self.func.num_insts());
        self.reachable.clear();
        for block in crate::graph::reachable_preorder(&*self.func) {
            self.reachable.insert(block);
            order.extend(self.func.block_insts(block));
        }
        self.worklist.push_in_order(&order);
    }

    fn visit(&mut self, inst: InstId) {
        self.stats.visited += 1;
        let node = self.func.inst(inst);
        let mnemonic = node.kind().mnemonic();
        if node.kind().is_trivially_dead_when_unused() && !node.has_used_results() {
            tracing::trace!(inst = ?inst, mnemonic, "erased dead instruction");
            self.erase_inst(inst);
            return;
        }

        let rewrite = rules::visit(self, inst);
        if rewrite == Rewrite::Unchanged {
            debug_assert!(
                self.deferred.is_empty(),
                "rule for {mnemonic} deferred erasures without rewriting"
            );
            return;
        }
        let outcome = self.apply(inst, rewrite);

        let deferred = std::mem::take(&mut self.deferred);
        if outcome {
            for extra in deferred {
                if self.func.contains_inst(extra) {
                    self.erase_inst(extra);
                }
            }
            tracing::trace!(inst = ?inst, mnemonic, "applied rewrite");
        } else {
            tracing::trace!(inst = ?inst, mnemonic, "dropped unsafe rewrite");
        }
    }

    /// Apply a rule's rewrite of `inst`. Returns whether anything changed.
    fn apply(&mut self, inst: InstId, rewrite: Rewrite) -> bool {
        match rewrite {
            Rewrite::Unchanged => false,
            Rewrite::ReplaceWith(value) => self.replace_with(inst, value),
            Rewrite::Erase => {
                self.erase_inst(inst);
                true
            }
            Rewrite::InsertBefore(new) => self.insert_before(inst, new).is_some(),
            Rewrite::ReplaceWithNew(new) => self.insert_and_replace(inst, new),
        }
    }

    fn replace_with(&mut self, inst: InstId, value: Value) -> bool {
        let old = Value::result(inst);
        if self.func.inst(inst).num_results() != 1 || !self.can_replace(inst, old, value) {
            return false;
        }
        self.func.replace_all_uses_with(old, value);
        self.stats.replaced += 1;
        self.enqueue_users(value);
        self.erase_inst(inst);
        true
    }

    fn insert_and_replace(&mut self, inst: InstId, new: NewInst) -> bool {
        let Some(new_inst) = self.build_before(inst, new) else {
            return false;
        };
        let olds = self.func.results(inst);
        let news = self.func.results(new_inst);
        let compatible = olds.len() == news.len()
            && olds
                .iter()
                .zip(&news)
                .all(|(&old, &new)| self.can_replace(inst, old, new));
        if !compatible {
            self.func.erase(new_inst);
            return false;
        }

        self.stats.inserted += 1;
        self.worklist.push(new_inst);
        for (old, new) in olds.into_iter().zip(news) {
            if self.func.has_uses(old) {
                self.func.replace_all_uses_with(old, new);
                self.stats.replaced += 1;
                self.enqueue_users(new);
            }
        }
        self.erase_inst(inst);
        true
    }

    /// Whether `new` may take the place of `old`, a result of `inst`.
    fn can_replace(&self, inst: InstId, old: Value, new: Value) -> bool {
        if !self.func.is_live(new) || self.func.value_type(old) != self.func.value_type(new) {
            return false;
        }
        if !self
            .func
            .value_ownership(new)
            .can_replace(self.func.value_ownership(old))
        {
            return false;
        }
        let (Some(def_block), Some(inst_block)) =
            (self.func.defining_block(new), self.func.inst(inst).block())
        else {
            return false;
        };
        if def_block == inst_block {
            return match new {
                Value::Arg(_) => true,
                Value::Result(def, _) => self.precedes(def, inst),
            };
        }
        self.func.uses(old).iter().all(|u| {
            self.func
                .inst(u.user)
                .block()
                .is_some_and(|user_block| self.dominance.dominates(def_block, user_block))
        })
    }

    /// Whether `def` comes before `inst` in their shared block.
    fn precedes(&self, def: InstId, inst: InstId) -> bool {
        let mut cursor = self.func.inst(inst).prev();
        while let Some(current) = cursor {
            if current == def {
                return true;
            }
            cursor = self.func.inst(current).prev();
        }
        false
    }

    fn build_before(&mut self, anchor: InstId, new: NewInst) -> Option<InstId> {
        let mnemonic = new.kind.mnemonic();
        match Builder::before(&mut *self.func, self.facts.types, anchor).try_build(
            new.kind,
            &new.operands,
            &new.result_tys,
        ) {
            Ok(inst) => Some(inst),
            Err(err) => {
                tracing::trace!(mnemonic, error = %err, "could not build replacement");
                None
            }
        }
    }

    fn enqueue_users(&mut self, value: Value) {
        for u in self.func.uses(value) {
            self.worklist.push(u.user);
        }
    }

    fn verify(&self, iteration: u32) {
        if let Err(errors) = verify_function(&*self.func) {
            for error in &errors {
                tracing::error!(
                    function = ?self.func.name(),
                    iteration,
                    %error,
                    "verification failed after combine round"
                );
            }
            panic!(
                "{} verification error(s) in {:?} after combine round {iteration}:\n{}",
                errors.len(),
                self.func.name(),
                self.func.dump()
            );
        }
    }

    // ── Rule interface ──────────────────────────────────────────

    pub(crate) fn func(&self) -> &Function {
        &*self.func
    }

    pub(crate) fn facts(&self) -> Facts<'a> {
        self.facts
    }

    pub(crate) fn config(&self) -> &CombinerConfig {
        self.config
    }

    /// Erase `inst` now and requeue the definers of its operands.
    pub(crate) fn erase_inst(&mut self, inst: InstId) {
        let definers: SmallVec<[InstId; 4]> = self
            .func
            .inst(inst)
            .operands()
            .iter()
            .filter_map(|v| v.defining_inst())
            .collect();
        self.func.erase(inst);
        self.stats.erased += 1;
        for def in definers {
            if self.func.contains_inst(def) {
                self.worklist.push(def);
            }
        }
    }

    /// Erase `inst` once the visited instruction's rewrite has been
    /// applied. Dropped if the rewrite is rejected.
    pub(crate) fn erase_after(&mut self, inst: InstId) {
        self.deferred.push(inst);
    }

    /// Build `new` before `anchor` and queue it.
    pub(crate) fn insert_before(&mut self, anchor: InstId, new: NewInst) -> Option<InstId> {
        let inst = self.build_before(anchor, new)?;
        self.stats.inserted += 1;
        self.worklist.push(inst);
        Some(inst)
    }
}

#[cfg(test)]
mod tests;
