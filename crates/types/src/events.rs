//! Broadcast events and full-state snapshots.
//!
//! Every successful canonical-state replacement emits one event carrying the
//! *full* new state, never a diff. Delivery is best-effort and at-least-once;
//! observers deduplicate on `StateSnapshot::version` and self-heal by polling.

use serde::{Deserialize, Serialize};

use crate::{CurrentAuctionState, Player, PlayerId, SecretBid, Team, TeamId};

/// Read-only projection of a team for observers.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TeamView {
    pub id: TeamId,
    pub name: String,
    pub budget: u64,
    pub bought: u32,
    pub purse_remaining: u64,
}

impl From<&Team> for TeamView {
    fn from(team: &Team) -> Self {
        Self {
            id: team.id,
            name: team.name.clone(),
            budget: team.budget,
            bought: team.bought,
            purse_remaining: team.purse_remaining(),
        }
    }
}

/// The full state all observers reconcile against.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct StateSnapshot {
    pub current: CurrentAuctionState,
    /// The lot on the block, if any.
    pub lot: Option<Player>,
    pub teams: Vec<TeamView>,
    /// Operator ticker message, if set.
    pub message: Option<String>,
}

impl StateSnapshot {
    /// Version of the canonical record this snapshot was cut at.
    pub fn version(&self) -> u64 {
        self.current.version
    }
}

/// Fanout event, one per successful state transition.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum AuctionEvent {
    /// A new lot was put on the block (or the block was cleared).
    LotChanged { snapshot: StateSnapshot },
    /// The current bid or leading team changed.
    BidChanged { snapshot: StateSnapshot },
    /// The current lot was hammered down.
    LotSold {
        player: PlayerId,
        team: TeamId,
        price: u64,
        snapshot: StateSnapshot,
    },
    /// The current lot was passed in.
    LotUnsold {
        player: PlayerId,
        snapshot: StateSnapshot,
    },
    /// Team purses or rosters changed outside a sale (reopen, undo, reset).
    TeamViewChanged { snapshot: StateSnapshot },
    /// Sealed bids were opened for the current lot.
    SecretBidsRevealed {
        bids: Vec<SecretBid>,
        snapshot: StateSnapshot,
    },
    /// The sealed-bid winner was assigned and the lot sold.
    SecretBidWinnerAssigned {
        team: TeamId,
        price: u64,
        snapshot: StateSnapshot,
    },
}

impl AuctionEvent {
    /// The full-state snapshot carried by every event.
    pub fn snapshot(&self) -> &StateSnapshot {
        match self {
            AuctionEvent::LotChanged { snapshot }
            | AuctionEvent::BidChanged { snapshot }
            | AuctionEvent::LotSold { snapshot, .. }
            | AuctionEvent::LotUnsold { snapshot, .. }
            | AuctionEvent::TeamViewChanged { snapshot }
            | AuctionEvent::SecretBidsRevealed { snapshot, .. }
            | AuctionEvent::SecretBidWinnerAssigned { snapshot, .. } => snapshot,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn event_exposes_snapshot_version() {
        let mut current = CurrentAuctionState::idle();
        current.version = 42;
        let event = AuctionEvent::LotChanged {
            snapshot: StateSnapshot {
                current,
                lot: None,
                teams: vec![],
                message: None,
            },
        };
        assert_eq!(event.snapshot().version(), 42);
    }

    #[test]
    fn events_serialize_with_kind_tag() {
        let event = AuctionEvent::TeamViewChanged {
            snapshot: StateSnapshot {
                current: CurrentAuctionState::idle(),
                lot: None,
                teams: vec![],
                message: None,
            },
        };
        let json = serde_json::to_string(&event).unwrap();
        assert!(json.contains("\"kind\":\"team_view_changed\""));
    }
}
