//! The undo ledger.
//!
//! A LIFO list of reversible transitions. Undo is single-step and strictly
//! sequential; entries cannot be skipped or reordered. Application of the
//! compensating transition lives in `handlers::handle_undo`, which needs
//! the state and the store.

use hammer_types::UndoEntry;

/// LIFO ledger of reversible transitions for one operator session.
#[derive(Debug, Default)]
pub struct UndoLedger {
    entries: Vec<UndoEntry>,
}

impl UndoLedger {
    /// Record a completed reversible transition.
    pub fn push(&mut self, entry: UndoEntry) {
        self.entries.push(entry);
    }

    /// Take the most recent entry. `None` on an empty ledger (undo is then a
    /// no-op, not an error).
    pub fn pop(&mut self) -> Option<UndoEntry> {
        self.entries.pop()
    }

    /// Entries currently recorded.
    pub fn depth(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Drop the whole session history. Used by tournament reset, which is
    /// itself not undoable.
    pub fn clear(&mut self) {
        self.entries.clear();
    }
}
