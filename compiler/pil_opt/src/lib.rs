//! Worklist peephole optimizer for PIL.
//!
//! This crate provides:
//!
//! - **The Combiner** ([`Combiner`], [`Rewrite`]): a per-function worklist
//!   driver that visits instructions, asks the rule for each opcode for a
//!   rewrite, checks the rewrite for type, ownership and dominance safety,
//!   and applies it. Rounds repeat until a fixed point or
//!   [`CombinerConfig::max_iterations`].
//!
//! - **Rules**: reference-count pairing, aggregate and cast forwarding,
//!   integer folding and strength reduction, dead call removal,
//!   devirtualization, existential forwarding and trivial memory
//!   forwarding. Each rule is a function of the visited instruction and the
//!   oracles; none of them changes control flow.
//!
//! - **Oracles** ([`facts`]): traits for class hierarchy, conformances,
//!   aliasing, dominance and callee effects, with a conservative
//!   implementation and a `Sync` [`ModuleFacts`] snapshot.
//!
//! - **Dominance** ([`DominatorTree`]): Cooper-Harvey-Kennedy dominators
//!   over the reachable part of a function's CFG.
//!
//! Whole modules are combined with [`combine_module`], which optimizes
//! independent functions in parallel against one shared snapshot.
//!
//! # Crate Dependencies
//!
//! `pil_opt` depends on `pil_ir` for the IR, the [`Builder`](pil_ir::Builder)
//! and the verifier.

mod arc_users;
pub mod combiner;
pub mod config;
pub mod facts;
pub mod graph;
mod rules;
mod worklist;

#[cfg(test)]
mod test_helpers;

use std::sync::Once;

use pil_ir::{FuncId, Function, Module};
use rayon::prelude::*;

pub use combiner::{CombineStats, Combiner, NewInst, Rewrite};
pub use config::CombinerConfig;
pub use facts::{
    AliasFacts, BasicAlias, CalleeFacts, ClassHierarchy, ConformanceFacts, Conservative,
    DominanceFacts, Facts, ModuleFacts,
};
pub use graph::{reachable_preorder, DominatorTree};

static TRACING_INIT: Once = Once::new();

/// Initialize tracing for debug output.
///
/// Call this once at startup. Safe to call multiple times.
/// Enable with `RUST_LOG=pil_opt=debug` or `RUST_LOG=pil_opt=trace`.
pub fn init_tracing() {
    TRACING_INIT.call_once(|| {
        use tracing_subscriber::{fmt, prelude::*, EnvFilter};

        // Only initialize if RUST_LOG is set
        if std::env::var("RUST_LOG").is_ok() {
            let filter = EnvFilter::from_default_env();
            tracing_subscriber::registry()
                .with(fmt::layer().with_target(true).with_level(true))
                .with(filter)
                .init();
        }
    });
}

/// Combine one function to a fixed point.
///
/// Dominators are computed once up front; the Combiner never changes the
/// CFG, so they stay valid for the whole run.
pub fn combine_function(
    func: &mut Function,
    facts: Facts<'_>,
    config: &CombinerConfig,
) -> CombineStats {
    let dominators = DominatorTree::build(func);
    Combiner::new(func, facts, &dominators, config).run()
}

/// Combine every live definition of `module`, in parallel.
///
/// Facts are snapshotted before any function changes, so every function
/// sees the module as it was on entry. Results are ordered by function id.
pub fn combine_module(module: &mut Module, config: &CombinerConfig) -> Vec<(FuncId, CombineStats)> {
    let snapshot = ModuleFacts::new(module);
    let facts = Facts::from_module(&snapshot);

    let functions: Vec<&mut Function> = module
        .live_functions_mut()
        .filter(|f| f.is_definition())
        .collect();
    let mut results: Vec<(FuncId, CombineStats)> = functions
        .into_par_iter()
        .map(|func| {
            let id = func.id();
            (id, combine_function(func, facts, config))
        })
        .collect();
    results.sort_by_key(|(id, _)| id.raw());

    tracing::debug!(
        functions = results.len(),
        changed = results.iter().filter(|(_, s)| s.made_change).count(),
        "combined module"
    );
    results
}
