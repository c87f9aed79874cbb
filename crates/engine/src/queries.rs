//! Read-only state access for polling observers.
//!
//! Observers reconcile against these reads on a fixed interval, independent
//! of the broadcast channel. None of them mutate anything.

use serde::{Deserialize, Serialize};

use crate::allocator::{pool_state, PoolState};
use crate::eligibility::{eligible_teams, Eligibility};
use crate::state::TournamentState;
use hammer_types::{CurrentAuctionState, Player, StateSnapshot, Team, TeamId};

/// Query request types.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub enum AuctionQuery {
    /// The single canonical current-lot/current-bid record.
    GetCurrentState,

    /// Full state for observer reconciliation.
    GetSnapshot,

    /// All registered players.
    ListPlayers,

    /// All registered teams.
    ListTeams,

    /// One team.
    GetTeam { team: TeamId },

    /// A team's standing in every configured pool, in tier order.
    GetTeamPools { team: TeamId },

    /// Bid-eligibility verdicts for every team on the current lot.
    GetEligibleTeams,

    /// Sealed submissions pending for the current lot. Only the count is
    /// ever exposed; the bids themselves stay blind until reveal.
    GetSecretBidCount,

    /// Entries on the undo ledger.
    GetUndoDepth,

    /// The viewer ticker message.
    GetMessage,
}

/// Query response types.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub enum AuctionQueryResponse {
    CurrentState(CurrentAuctionState),
    Snapshot(StateSnapshot),
    Players(Vec<Player>),
    Teams(Vec<Team>),
    Team(Option<Team>),
    TeamPools(Vec<(String, PoolState)>),
    EligibleTeams(Vec<Eligibility>),
    SecretBidCount(usize),
    UndoDepth(usize),
    Message(Option<String>),
}

/// Handle a query.
pub fn handle_query(state: &TournamentState, query: AuctionQuery) -> AuctionQueryResponse {
    match query {
        AuctionQuery::GetCurrentState => {
            AuctionQueryResponse::CurrentState(state.current.clone())
        }

        AuctionQuery::GetSnapshot => AuctionQueryResponse::Snapshot(state.snapshot()),

        AuctionQuery::ListPlayers => {
            AuctionQueryResponse::Players(state.players.values().cloned().collect())
        }

        AuctionQuery::ListTeams => {
            AuctionQueryResponse::Teams(state.teams.values().cloned().collect())
        }

        AuctionQuery::GetTeam { team } => {
            AuctionQueryResponse::Team(state.teams.get(&team).cloned())
        }

        AuctionQuery::GetTeamPools { team } => {
            let pools = match state.teams.get(&team) {
                Some(team) => state
                    .config
                    .pools
                    .iter()
                    .filter_map(|pool| {
                        pool_state(&state.config, team, &pool.name)
                            .map(|ps| (pool.name.clone(), ps))
                    })
                    .collect(),
                None => Vec::new(),
            };
            AuctionQueryResponse::TeamPools(pools)
        }

        AuctionQuery::GetEligibleTeams => {
            AuctionQueryResponse::EligibleTeams(eligible_teams(state))
        }

        AuctionQuery::GetSecretBidCount => {
            let count = state
                .current
                .lot_serial
                .map(|serial| state.secret_bids.count_for(serial))
                .unwrap_or(0);
            AuctionQueryResponse::SecretBidCount(count)
        }

        AuctionQuery::GetUndoDepth => AuctionQueryResponse::UndoDepth(state.undo.depth()),

        AuctionQuery::GetMessage => AuctionQueryResponse::Message(state.message.clone()),
    }
}
