//! Core type definitions for the hammer live-auction engine.
//!
//! This crate provides the shared data structures used across the auction
//! system: players (lots), teams, category pools, bid increment tables, the
//! canonical auction state record, sealed bids, and broadcast events.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

pub mod events;

pub use events::{AuctionEvent, StateSnapshot, TeamView};

/// Team identifier.
pub type TeamId = u64;

/// Player identifier.
pub type PlayerId = u64;

// =========================
// PLAYERS (LOTS)
// =========================

/// Lifecycle status of a player in the auction.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum PlayerStatus {
    /// Not yet offered, or returned to the block by a reset/reopen.
    Unauctioned,
    /// Sold to a team at `sold_price`.
    Sold,
    /// Offered and passed in without a winning bid.
    Unsold,
}

/// A player registered for the tournament; the unit that goes under the
/// hammer ("lot").
///
/// Invariants: `team` and `sold_price` are `Some` iff `status == Sold`, and
/// `sold_price >= base_price` whenever set.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Player {
    pub id: PlayerId,
    pub name: String,
    /// Display/auction order. Also the staleness check for sealed bids.
    pub serial: u32,
    /// Opening price when the player comes up for bidding.
    pub base_price: u64,
    pub status: PlayerStatus,
    pub team: Option<TeamId>,
    pub sold_price: Option<u64>,
    /// Pool the player was sold (or last offered) under, in tiered mode.
    pub pool: Option<String>,
}

impl Player {
    /// A fresh, unauctioned player.
    pub fn new(id: PlayerId, name: impl Into<String>, serial: u32, base_price: u64) -> Self {
        Self {
            id,
            name: name.into(),
            serial,
            base_price,
            status: PlayerStatus::Unauctioned,
            team: None,
            sold_price: None,
            pool: None,
        }
    }

    /// Strip sale data and return the player to the block.
    pub fn clear_sale(&mut self) {
        self.status = PlayerStatus::Unauctioned;
        self.team = None;
        self.sold_price = None;
        self.pool = None;
    }
}

// =========================
// TEAMS
// =========================

/// A bidding team with a fixed purse and per-pool spend counters.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Team {
    pub id: TeamId,
    pub name: String,
    /// Total purse for the tournament.
    pub budget: u64,
    /// Players bought so far, across all pools.
    pub bought: u32,
    /// Total spent so far, across all pools.
    pub spent: u64,
    /// Precomputed ceiling for non-tiered tournaments.
    pub max_bid_allowed: u64,
    /// Spend per category pool (tiered mode).
    pub pool_spent: BTreeMap<String, u64>,
    /// Purchases per category pool (tiered mode).
    pub pool_bought: BTreeMap<String, u32>,
}

impl Team {
    pub fn new(id: TeamId, name: impl Into<String>, budget: u64) -> Self {
        Self {
            id,
            name: name.into(),
            budget,
            bought: 0,
            spent: 0,
            max_bid_allowed: budget,
            pool_spent: BTreeMap::new(),
            pool_bought: BTreeMap::new(),
        }
    }

    /// Remaining spendable purse. Saturating: the engine never lets spend
    /// exceed budget, but a corrupt snapshot must not panic an observer.
    pub fn purse_remaining(&self) -> u64 {
        self.budget.saturating_sub(self.spent)
    }

    /// Record a completed purchase under `pool` (if tiered).
    pub fn record_purchase(&mut self, price: u64, pool: Option<&str>) {
        self.bought += 1;
        self.spent += price;
        if let Some(pool) = pool {
            *self.pool_spent.entry(pool.to_string()).or_insert(0) += price;
            *self.pool_bought.entry(pool.to_string()).or_insert(0) += 1;
        }
    }

    /// Reverse a completed purchase (reopen / undo of a sale).
    pub fn refund_purchase(&mut self, price: u64, pool: Option<&str>) {
        self.bought = self.bought.saturating_sub(1);
        self.spent = self.spent.saturating_sub(price);
        if let Some(pool) = pool {
            if let Some(spent) = self.pool_spent.get_mut(pool) {
                *spent = spent.saturating_sub(price);
            }
            if let Some(bought) = self.pool_bought.get_mut(pool) {
                *bought = bought.saturating_sub(1);
            }
        }
    }

    /// Spend recorded against one pool.
    pub fn spent_in(&self, pool: &str) -> u64 {
        self.pool_spent.get(pool).copied().unwrap_or(0)
    }

    /// Purchases recorded against one pool.
    pub fn bought_in(&self, pool: &str) -> u32 {
        self.pool_bought.get(pool).copied().unwrap_or(0)
    }
}

// =========================
// CATEGORY POOLS
// =========================

/// A category tier with its own per-team cap and purchase-count bounds.
///
/// Pools are evaluated in the order they appear in the tournament config;
/// that order is the reservation priority for the allocator.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pool {
    pub name: String,
    /// Per-team spend cap for this pool.
    pub cap: u64,
    /// Minimum purchases each team must make in this pool.
    pub min_count: u32,
    /// Maximum purchases per team; `None` is unbounded.
    pub max_count: Option<u32>,
    /// Tier base price, used to reserve purse for unmet minimums.
    pub base_price: u64,
}

// =========================
// BID INCREMENTS
// =========================

/// One stepped range of the increment table: `[min, max)` with a fixed step.
/// `max = None` means unbounded above.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct IncrementRange {
    pub min: u64,
    pub max: Option<u64>,
    pub step: u64,
}

/// Ordered table of stepped bid increments covering `[0, inf)`.
///
/// A malformed table (gap, overlap, zero step) is a configuration error; at
/// runtime the resolver falls back to `fallback` rather than refusing bids.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct IncrementTable {
    pub ranges: Vec<IncrementRange>,
    /// Step used when no range matches the amount.
    pub fallback: u64,
}

impl IncrementTable {
    /// A single unbounded range with a flat step.
    pub fn flat(step: u64) -> Self {
        Self {
            ranges: vec![IncrementRange {
                min: 0,
                max: None,
                step,
            }],
            fallback: step,
        }
    }
}

// =========================
// CANONICAL AUCTION STATE
// =========================

/// Lot lifecycle phase of the canonical record.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum LotPhase {
    /// No lot selected.
    Idle,
    /// A lot is on the block and the bid may rise.
    InAuction,
    /// Terminal: hammered down to the leading team.
    Sold,
    /// Terminal: passed in.
    Unsold,
}

/// The single canonical current-lot/current-bid record for a tournament.
///
/// Never partially updated: every operator command that touches it produces
/// a full replacement with a bumped `version`, which is what lets observers
/// treat duplicate deliveries as no-ops.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CurrentAuctionState {
    pub lot: Option<PlayerId>,
    pub lot_serial: Option<u32>,
    pub phase: LotPhase,
    pub current_bid: u64,
    pub leading_team: Option<TeamId>,
    /// Active category pool when the tournament is tiered.
    pub active_pool: Option<String>,
    /// Sealed-bid mode flag for the current lot.
    pub secret_bidding: bool,
    /// Monotonic replacement counter; the observer idempotence key.
    pub version: u64,
}

impl CurrentAuctionState {
    /// The idle record a tournament starts from.
    pub fn idle() -> Self {
        Self {
            lot: None,
            lot_serial: None,
            phase: LotPhase::Idle,
            current_bid: 0,
            leading_team: None,
            active_pool: None,
            secret_bidding: false,
            version: 0,
        }
    }
}

// =========================
// SEALED BIDS
// =========================

/// A blind submission for a lot flagged for sealed bidding.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SecretBid {
    pub team: TeamId,
    /// Serial of the lot the bid targets; a changed lot invalidates it.
    pub lot_serial: u32,
    pub amount: u64,
    /// Submission time (unix seconds); the reveal tie-breaker.
    pub submitted_at: u64,
}

// =========================
// UNDO LEDGER ENTRIES
// =========================

/// One reversible transition, holding exactly the snapshots needed to apply
/// the compensating transition.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum UndoEntry {
    /// A sale: restores the player, refunds the team, restores the record.
    Sold {
        player_before: Player,
        team_before: Team,
        state_before: CurrentAuctionState,
    },
    /// A pass-in: clears the unsold tag and restores the record.
    Unsold {
        player_before: Player,
        state_before: CurrentAuctionState,
    },
    /// A bid raise: restores the prior bid and leader.
    BidRaise { state_before: CurrentAuctionState },
    /// A lot advance: restores the previously displayed lot.
    NextLot { state_before: CurrentAuctionState },
    /// A reopen: reinstates the terminal outcome it reversed.
    Reopen {
        player_before: Player,
        /// Present only when the reopened lot had been sold.
        team_before: Option<Team>,
        state_before: CurrentAuctionState,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn purse_remaining_saturates() {
        let mut team = Team::new(1, "Strikers", 100);
        team.spent = 250;
        assert_eq!(team.purse_remaining(), 0);
    }

    #[test]
    fn record_and_refund_purchase_round_trip() {
        let mut team = Team::new(1, "Strikers", 1_000_000);
        team.record_purchase(200_000, Some("A"));
        assert_eq!(team.bought, 1);
        assert_eq!(team.spent_in("A"), 200_000);
        assert_eq!(team.purse_remaining(), 800_000);

        team.refund_purchase(200_000, Some("A"));
        assert_eq!(team.bought, 0);
        assert_eq!(team.spent_in("A"), 0);
        assert_eq!(team.purse_remaining(), 1_000_000);
    }

    #[test]
    fn clear_sale_strips_everything() {
        let mut player = Player::new(7, "R. Sharma", 7, 50_000);
        player.status = PlayerStatus::Sold;
        player.team = Some(3);
        player.sold_price = Some(120_000);
        player.pool = Some("A".into());

        player.clear_sale();
        assert_eq!(player.status, PlayerStatus::Unauctioned);
        assert!(player.team.is_none() && player.sold_price.is_none() && player.pool.is_none());
    }
}
