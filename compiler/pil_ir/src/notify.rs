//! Deletion notifications.
//!
//! External caches keyed by PIL handles (numbering tables, syntax maps,
//! analysis results) register a [`DeleteNotificationHandler`] on a
//! function. The function calls it right before an instruction, argument
//! or block is destroyed, while the handle is still valid, so the cache can
//! evict its entry.

use crate::{ArgId, BlockId, InstId};

/// Receives a callback before a handle of a function becomes stale.
///
/// Handlers must be `Send` so that a function can move to a worker thread
/// with its handlers attached.
pub trait DeleteNotificationHandler: Send {
    /// `inst` is about to be destroyed.
    fn will_delete_inst(&mut self, inst: InstId) {
        let _ = inst;
    }

    /// `arg` is about to be destroyed.
    fn will_delete_arg(&mut self, arg: ArgId) {
        let _ = arg;
    }

    /// `block` is about to be destroyed.
    fn will_delete_block(&mut self, block: BlockId) {
        let _ = block;
    }
}
