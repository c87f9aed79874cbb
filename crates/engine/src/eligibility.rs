//! Bid legality checks.
//!
//! Composes the increment resolver and the pool allocator to decide whether
//! a team may raise the bid on the current lot. Rejection reasons are
//! user-facing strings; the console surfaces them to drive which teams are
//! shown as selectable during live bidding.

use serde::{Deserialize, Serialize};

use crate::allocator::pool_state;
use crate::error::AuctionError;
use crate::increments::next_bid;
use crate::state::TournamentState;
use hammer_types::{LotPhase, TeamId};

pub const REASON_SQUAD_FULL: &str = "Squad is full";
pub const REASON_NO_POOL_SLOTS: &str = "No slots left in the active pool";
pub const REASON_EXCEEDS_MAX_BID: &str = "Bid exceeds the team's maximum allowed bid";
pub const REASON_INSUFFICIENT_PURSE: &str = "Insufficient purse remaining";

/// Verdict for one team on the current lot.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Eligibility {
    pub team: TeamId,
    pub eligible: bool,
    /// The bid being judged: the resolver's next step, or the override.
    pub candidate_bid: u64,
    /// Violated constraint, when ineligible.
    pub reason: Option<String>,
}

impl Eligibility {
    fn ok(team: TeamId, candidate_bid: u64) -> Self {
        Self {
            team,
            eligible: true,
            candidate_bid,
            reason: None,
        }
    }

    fn rejected(team: TeamId, candidate_bid: u64, reason: &str) -> Self {
        Self {
            team,
            eligible: false,
            candidate_bid,
            reason: Some(reason.to_string()),
        }
    }
}

/// May `team_id` raise the bid on the current lot?
///
/// `manual_override` is an operator-entered amount that bypasses increment
/// stepping but never bypasses budget checks. Errors are reserved for
/// missing teams or no lot in auction; a budget rejection is a normal
/// `Eligibility { eligible: false, .. }` verdict.
pub fn check_bid(
    state: &TournamentState,
    team_id: TeamId,
    manual_override: Option<u64>,
) -> Result<Eligibility, AuctionError> {
    let team = state.team(team_id)?;
    if state.current.phase != LotPhase::InAuction {
        return Err(AuctionError::InvalidPhase {
            expected: LotPhase::InAuction,
            got: state.current.phase,
        });
    }
    let lot = state
        .current_lot()
        .ok_or(AuctionError::PlayerNotFound(state.current.lot.unwrap_or(0)))?;

    let candidate = manual_override.unwrap_or_else(|| {
        next_bid(
            &state.config.increments,
            state.current.current_bid,
            lot.base_price,
        )
    });

    if team.bought >= state.config.squad_size {
        return Ok(Eligibility::rejected(team_id, candidate, REASON_SQUAD_FULL));
    }

    match state.current.active_pool.as_deref() {
        Some(pool_name) if state.config.tiered() => {
            let pool = pool_state(&state.config, team, pool_name)
                .ok_or_else(|| AuctionError::Ineligible {
                    team: team_id,
                    reason: format!("unknown pool {pool_name}"),
                })?;
            if pool.max_players == 0 {
                return Ok(Eligibility::rejected(
                    team_id,
                    candidate,
                    REASON_NO_POOL_SLOTS,
                ));
            }
            if candidate > pool.max_bid {
                return Ok(Eligibility::rejected(
                    team_id,
                    candidate,
                    REASON_EXCEEDS_MAX_BID,
                ));
            }
        }
        _ => {
            // Non-tiered: precomputed ceiling, then the plain purse check.
            if candidate > team.max_bid_allowed {
                return Ok(Eligibility::rejected(
                    team_id,
                    candidate,
                    REASON_EXCEEDS_MAX_BID,
                ));
            }
            if candidate > team.purse_remaining() {
                return Ok(Eligibility::rejected(
                    team_id,
                    candidate,
                    REASON_INSUFFICIENT_PURSE,
                ));
            }
        }
    }

    Ok(Eligibility::ok(team_id, candidate))
}

/// Verdicts for every registered team, for the live selectable-team view.
pub fn eligible_teams(state: &TournamentState) -> Vec<Eligibility> {
    state
        .teams
        .keys()
        .filter_map(|&id| check_bid(state, id, None).ok())
        .collect()
}
