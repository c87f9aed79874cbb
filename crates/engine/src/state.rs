//! Canonical tournament state.
//!
//! Exactly one `TournamentState` exists per tournament, owned by the single
//! operator console. All mutation goes through the handlers; reads fan out
//! to any number of observers via snapshots.

use std::collections::BTreeMap;

use crate::config::TournamentConfig;
use crate::error::AuctionError;
use crate::secret::SecretBidBook;
use crate::undo::UndoLedger;
use hammer_types::{
    CurrentAuctionState, Player, PlayerId, StateSnapshot, Team, TeamId, TeamView,
};

/// The canonical record of a running tournament.
#[derive(Debug)]
pub struct TournamentState {
    /// Fixed tournament rules.
    pub config: TournamentConfig,

    /// All registered players, by id.
    pub players: BTreeMap<PlayerId, Player>,

    /// All registered teams, by id.
    pub teams: BTreeMap<TeamId, Team>,

    /// The single current-lot/current-bid record. Replaced as a whole on
    /// every transition, never patched.
    pub current: CurrentAuctionState,

    /// LIFO ledger of reversible transitions.
    pub undo: UndoLedger,

    /// Sealed-bid submissions for the current lot.
    pub secret_bids: SecretBidBook,

    /// Operator ticker message shown to viewers. Set and cleared explicitly;
    /// a tournament reset clears it.
    pub message: Option<String>,
}

impl TournamentState {
    /// An empty tournament with no rosters loaded.
    pub fn new(config: TournamentConfig) -> Self {
        Self {
            config,
            players: BTreeMap::new(),
            teams: BTreeMap::new(),
            current: CurrentAuctionState::idle(),
            undo: UndoLedger::default(),
            secret_bids: SecretBidBook::default(),
            message: None,
        }
    }

    /// A tournament with players and teams registered up front.
    pub fn with_rosters(
        config: TournamentConfig,
        players: Vec<Player>,
        teams: Vec<Team>,
    ) -> Self {
        let mut state = Self::new(config);
        state.players = players.into_iter().map(|p| (p.id, p)).collect();
        state.teams = teams.into_iter().map(|t| (t.id, t)).collect();
        state
    }

    pub fn player(&self, id: PlayerId) -> Result<&Player, AuctionError> {
        self.players.get(&id).ok_or(AuctionError::PlayerNotFound(id))
    }

    pub fn player_mut(&mut self, id: PlayerId) -> Result<&mut Player, AuctionError> {
        self.players
            .get_mut(&id)
            .ok_or(AuctionError::PlayerNotFound(id))
    }

    pub fn team(&self, id: TeamId) -> Result<&Team, AuctionError> {
        self.teams.get(&id).ok_or(AuctionError::TeamNotFound(id))
    }

    pub fn team_mut(&mut self, id: TeamId) -> Result<&mut Team, AuctionError> {
        self.teams.get_mut(&id).ok_or(AuctionError::TeamNotFound(id))
    }

    /// The player currently on the block, if any.
    pub fn current_lot(&self) -> Option<&Player> {
        self.current.lot.and_then(|id| self.players.get(&id))
    }

    /// Replace the canonical record as a whole, bumping its version.
    ///
    /// This is the only way `current` changes: there are no partial field
    /// updates, so a lot-selection race can never leave two lots in auction.
    pub fn replace_current(&mut self, mut next: CurrentAuctionState) -> &CurrentAuctionState {
        next.version = self.current.version + 1;
        self.current = next;
        &self.current
    }

    /// Cut the full-state snapshot observers reconcile against.
    pub fn snapshot(&self) -> StateSnapshot {
        StateSnapshot {
            current: self.current.clone(),
            lot: self.current_lot().cloned(),
            teams: self.teams.values().map(TeamView::from).collect(),
            message: self.message.clone(),
        }
    }
}
