//! CFG traversal and dominance for PIL functions.
//!
//! Blocks are addressed by generational [`BlockId`]s. The analyses here map
//! them to dense layout indices once, at construction, and work on plain
//! index vectors from then on. Blocks created after an analysis was built
//! are unknown to it and get the conservative answer.

use rustc_hash::FxHashMap;
use smallvec::SmallVec;

use pil_ir::{BlockId, Function};

use crate::facts::DominanceFacts;

/// Dense numbering of a function's blocks in layout order.
struct BlockIndex {
    blocks: Vec<BlockId>,
    index: FxHashMap<BlockId, usize>,
}

impl BlockIndex {
    fn new(func: &Function) -> Self {
        let blocks = func.blocks().to_vec();
        let index = blocks.iter().enumerate().map(|(i, &b)| (b, i)).collect();
        Self { blocks, index }
    }

    fn successors(&self, func: &Function, idx: usize) -> SmallVec<[usize; 2]> {
        func.successors(self.blocks[idx])
            .into_iter()
            .filter_map(|b| self.index.get(&b).copied())
            .collect()
    }
}

/// Blocks reachable from the entry, in depth-first preorder.
///
/// Successors are visited in terminator order. A declaration yields an
/// empty list.
pub fn reachable_preorder(func: &Function) -> Vec<BlockId> {
    if !func.is_definition() {
        return Vec::new();
    }
    let index = BlockIndex::new(func);
    let mut visited = vec![false; index.blocks.len()];
    let mut order = Vec::with_capacity(index.blocks.len());
    let mut stack = vec![index.index[&func.entry_block()]];

    while let Some(idx) = stack.pop() {
        if visited[idx] {
            continue;
        }
        visited[idx] = true;
        order.push(index.blocks[idx]);
        // Reverse so the first successor is visited first.
        for succ in index.successors(func, idx).into_iter().rev() {
            if !visited[succ] {
                stack.push(succ);
            }
        }
    }
    order
}

/// Postorder over reachable blocks, as dense indices.
///
/// Iterative DFS with an explicit `(block, children_done)` stack.
fn compute_postorder(func: &Function, index: &BlockIndex) -> Vec<usize> {
    let n = index.blocks.len();
    let mut visited = vec![false; n];
    let mut postorder = Vec::with_capacity(n);
    let mut stack: Vec<(usize, bool)> = vec![(index.index[&func.entry_block()], false)];

    while let Some(&mut (idx, ref mut children_done)) = stack.last_mut() {
        if *children_done {
            postorder.push(idx);
            stack.pop();
            continue;
        }
        *children_done = true;

        if visited[idx] {
            stack.pop();
            continue;
        }
        visited[idx] = true;

        for succ in index.successors(func, idx) {
            if !visited[succ] {
                stack.push((succ, false));
            }
        }
    }
    postorder
}

/// Dominator tree over the reachable blocks of a function.
///
/// Built with the Cooper-Harvey-Kennedy iterative algorithm on reverse
/// postorder. Unreachable blocks have no immediate dominator; they are
/// dominated only by themselves.
///
/// Reference: Cooper, Harvey, Kennedy, "A Simple, Fast Dominance Algorithm" (2001)
pub struct DominatorTree {
    index: BlockIndex,
    /// Immediate dominator per dense index. The entry maps to itself.
    idom: Vec<Option<usize>>,
}

impl DominatorTree {
    /// Build the dominator tree for `func`.
    pub fn build(func: &Function) -> Self {
        let index = BlockIndex::new(func);
        let n = index.blocks.len();
        if n == 0 {
            return Self {
                index,
                idom: Vec::new(),
            };
        }

        let mut preds: Vec<SmallVec<[usize; 4]>> = vec![SmallVec::new(); n];
        for idx in 0..n {
            for succ in index.successors(func, idx) {
                if !preds[succ].contains(&idx) {
                    preds[succ].push(idx);
                }
            }
        }

        let mut rpo = compute_postorder(func, &index);
        rpo.reverse();
        let mut rpo_pos = vec![usize::MAX; n];
        for (pos, &idx) in rpo.iter().enumerate() {
            rpo_pos[idx] = pos;
        }

        let entry = rpo[0];
        let mut idom: Vec<Option<usize>> = vec![None; n];
        idom[entry] = Some(entry);

        let mut changed = true;
        while changed {
            changed = false;
            for &idx in &rpo[1..] {
                let Some(mut new_idom) = preds[idx].iter().copied().find(|&p| idom[p].is_some())
                else {
                    continue;
                };
                for &pred in &preds[idx] {
                    if pred != new_idom && idom[pred].is_some() {
                        new_idom = Self::intersect(pred, new_idom, &idom, &rpo_pos);
                    }
                }
                if idom[idx] != Some(new_idom) {
                    idom[idx] = Some(new_idom);
                    changed = true;
                }
            }
        }

        Self { index, idom }
    }

    /// Does block `a` dominate block `b`?
    ///
    /// A block dominates itself. Blocks unknown to the tree or unreachable
    /// from the entry dominate and are dominated by nothing else.
    pub fn dominates(&self, a: BlockId, b: BlockId) -> bool {
        if a == b {
            return true;
        }
        let (Some(&a_idx), Some(&b_idx)) = (self.index.index.get(&a), self.index.index.get(&b))
        else {
            return false;
        };
        let mut current = b_idx;
        loop {
            if current == a_idx {
                return true;
            }
            match self.idom[current] {
                Some(dom) if dom != current => current = dom,
                _ => return false,
            }
        }
    }

    /// The immediate dominator of `block`, `None` for the entry and for
    /// unreachable or unknown blocks.
    pub fn immediate_dominator(&self, block: BlockId) -> Option<BlockId> {
        let idx = *self.index.index.get(&block)?;
        match self.idom[idx] {
            Some(dom) if dom != idx => Some(self.index.blocks[dom]),
            _ => None,
        }
    }

    /// Whether `block` was reachable when the tree was built.
    pub fn is_reachable(&self, block: BlockId) -> bool {
        self.index
            .index
            .get(&block)
            .is_some_and(|&idx| self.idom[idx].is_some())
    }

    /// CHK intersect: walk two fingers upward until they meet.
    fn intersect(mut a: usize, mut b: usize, idom: &[Option<usize>], rpo_pos: &[usize]) -> usize {
        while a != b {
            while rpo_pos[a] > rpo_pos[b] {
                let Some(next) = idom[a] else {
                    debug_assert!(false, "intersect: broken idom chain at {a}");
                    return a;
                };
                a = next;
            }
            while rpo_pos[b] > rpo_pos[a] {
                let Some(next) = idom[b] else {
                    debug_assert!(false, "intersect: broken idom chain at {b}");
                    return b;
                };
                b = next;
            }
        }
        a
    }
}

impl DominanceFacts for DominatorTree {
    fn dominates(&self, def_block: BlockId, use_block: BlockId) -> bool {
        DominatorTree::dominates(self, def_block, use_block)
    }
}
