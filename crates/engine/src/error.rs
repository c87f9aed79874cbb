//! Engine error types.
//!
//! Three families matter to callers: validation failures (rejected before any
//! mutation), conflicts (command does not apply in the current phase), and
//! partial failures (a multi-write transition stopped part way through the
//! store). `ErrorKind` classifies every variant.

use thiserror::Error;

use crate::store::StoreError;
use hammer_types::{LotPhase, PlayerId, TeamId};

/// Errors that can occur while processing operator commands.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AuctionError {
    // === Validation ===
    #[error("Player not found: {0}")]
    PlayerNotFound(PlayerId),

    #[error("Team not found: {0}")]
    TeamNotFound(TeamId),

    #[error("No lot with serial {0} is available for auction")]
    LotNotAvailable(u32),

    #[error("No players left to auction")]
    NoEligibleLot,

    #[error("No team selected")]
    NoTeamSelected,

    #[error("Cannot mark as sold without a valid bid")]
    NoValidBid,

    #[error("Bid {bid} is below the base price {base_price}")]
    BidBelowBasePrice { bid: u64, base_price: u64 },

    #[error("Bid {bid} does not raise the current bid {current}")]
    BidNotAboveCurrent { bid: u64, current: u64 },

    #[error("Bid {bid} exceeds team {team}'s remaining purse {purse}")]
    InsufficientPurse { team: TeamId, bid: u64, purse: u64 },

    #[error("Team {team} cannot bid: {reason}")]
    Ineligible { team: TeamId, reason: String },

    #[error("No secret bids submitted for the current lot")]
    NoSecretBids,

    #[error("Secret bid targets serial {submitted}, but the current lot is {current}")]
    StaleLotSerial { submitted: u32, current: u32 },

    // === Conflict ===
    #[error("Invalid phase for this command: expected {expected:?}, got {got:?}")]
    InvalidPhase { expected: LotPhase, got: LotPhase },

    #[error("Lot is not in a terminal state and cannot be reopened")]
    NotTerminal,

    #[error("Secret bidding is active; open bid raises are disabled")]
    SecretBiddingActive,

    #[error("Secret bidding is not enabled for the current lot")]
    SecretBiddingDisabled,

    #[error("A {0} command is already in flight")]
    CommandInFlight(&'static str),

    // === Partial failure ===
    #[error("Partial failure during {op}: '{failed_write}' write failed after earlier writes succeeded: {source}")]
    PartialFailure {
        op: &'static str,
        failed_write: &'static str,
        source: StoreError,
    },

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Coarse classification of an [`AuctionError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Rejected before any state mutation; retry with corrected input.
    Validation,
    /// The command does not apply in the current lot phase.
    Conflict,
    /// Some writes landed, others did not; the command is safe to retry.
    PartialFailure,
}

impl AuctionError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            AuctionError::PlayerNotFound(_)
            | AuctionError::TeamNotFound(_)
            | AuctionError::LotNotAvailable(_)
            | AuctionError::NoEligibleLot
            | AuctionError::NoTeamSelected
            | AuctionError::NoValidBid
            | AuctionError::BidBelowBasePrice { .. }
            | AuctionError::BidNotAboveCurrent { .. }
            | AuctionError::InsufficientPurse { .. }
            | AuctionError::Ineligible { .. }
            | AuctionError::NoSecretBids
            | AuctionError::StaleLotSerial { .. } => ErrorKind::Validation,

            AuctionError::InvalidPhase { .. }
            | AuctionError::NotTerminal
            | AuctionError::SecretBiddingActive
            | AuctionError::SecretBiddingDisabled
            | AuctionError::CommandInFlight(_) => ErrorKind::Conflict,

            AuctionError::PartialFailure { .. } | AuctionError::Store(_) => {
                ErrorKind::PartialFailure
            }
        }
    }
}
