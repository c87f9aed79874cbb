//! Operator command messages.

use serde::{Deserialize, Serialize};

use hammer_types::{PlayerId, TeamId};

/// How the next lot is chosen.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum LotSelector {
    /// The lot with this auction serial, if still unauctioned.
    BySerial(u32),
    /// A random unauctioned lot.
    Random,
    /// A random lot carried over unsold from an earlier pool.
    CarryOver,
}

/// Commands the operator console can issue.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum AuctionCall {
    /// Put a lot on the block; optionally switch the active pool.
    SelectLot {
        selector: LotSelector,
        pool: Option<String>,
    },

    /// Take the lot off the block without an outcome.
    ClearLot,

    /// Raise the current bid for a team. `amount` overrides increment
    /// stepping (budget checks still apply); `None` steps the table.
    RaiseBid {
        team: TeamId,
        amount: Option<u64>,
    },

    /// Hammer the current lot down to the leading team.
    MarkSold,

    /// Pass the current lot in.
    MarkUnsold,

    /// Return a terminal (sold/unsold) lot to the block, with compensating
    /// refunds if it had been sold.
    Reopen { player: PlayerId },

    /// Reverse the most recent reversible transition.
    Undo,

    /// Tournament-wide wipe: every lot unauctioned, every counter zero.
    /// Destructive and not undoable.
    Reset,

    /// Toggle sealed bidding for the current lot.
    SetSecretBidding { enabled: bool },

    /// Blind submission for the current lot (non-broadcast channel).
    SubmitSecretBid {
        team: TeamId,
        lot_serial: u32,
        amount: u64,
    },

    /// Open the sealed bids and sell to the best-ranked eligible bidder.
    RevealSecretBids,

    /// Set the viewer ticker message.
    SetMessage { text: String },

    /// Clear the viewer ticker message.
    ClearMessage,
}
