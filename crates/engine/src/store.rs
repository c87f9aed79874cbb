//! Replace-semantics persistence boundary.
//!
//! The engine keeps canonical state in memory; a [`StateStore`] mirrors each
//! mutation to whatever persistence the deployment uses. Every write is a
//! full replacement of one record, never a field patch, so retrying a failed
//! transition is idempotent. Handlers order writes so the canonical-record
//! replacement happens last.

use thiserror::Error;

use hammer_types::{CurrentAuctionState, Player, PlayerId, Team, TeamId};
use std::collections::BTreeMap;

/// Failure reported by a store backend.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    #[error("store write failed: {0}")]
    WriteFailed(String),
}

/// Write boundary toward external persistence.
///
/// All three writes are atomic single-record replacements. The engine never
/// issues partial field updates through this trait.
pub trait StateStore {
    /// Overwrite the single canonical auction-state record.
    fn replace_current(&mut self, state: &CurrentAuctionState) -> Result<(), StoreError>;

    /// Overwrite one player record (status, team, price, pool tag).
    fn update_player(&mut self, player: &Player) -> Result<(), StoreError>;

    /// Overwrite one team record (budget, bought, pool counters).
    fn update_team(&mut self, team: &Team) -> Result<(), StoreError>;
}

/// In-memory store; the default backend for the console and for tests.
#[derive(Debug, Default)]
pub struct InMemoryStore {
    pub current: Option<CurrentAuctionState>,
    pub players: BTreeMap<PlayerId, Player>,
    pub teams: BTreeMap<TeamId, Team>,
}

impl StateStore for InMemoryStore {
    fn replace_current(&mut self, state: &CurrentAuctionState) -> Result<(), StoreError> {
        self.current = Some(state.clone());
        Ok(())
    }

    fn update_player(&mut self, player: &Player) -> Result<(), StoreError> {
        self.players.insert(player.id, player.clone());
        Ok(())
    }

    fn update_team(&mut self, team: &Team) -> Result<(), StoreError> {
        self.teams.insert(team.id, team.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hammer_types::LotPhase;

    #[test]
    fn replace_is_a_full_overwrite() {
        let mut store = InMemoryStore::default();
        let mut record = CurrentAuctionState::idle();
        store.replace_current(&record).unwrap();

        record.phase = LotPhase::InAuction;
        record.lot = Some(9);
        record.version = 1;
        store.replace_current(&record).unwrap();

        let stored = store.current.unwrap();
        assert_eq!(stored.version, 1);
        assert_eq!(stored.lot, Some(9));
    }
}
