//! Command handlers for the auction engine.
//!
//! Each handler validates, mutates the in-memory canonical state, mirrors
//! the mutation to the store (canonical-record replacement last), and only
//! then appends to the undo ledger and emits the fanout event. A failed
//! transition is rolled back in memory, never reaches the ledger, and
//! reports distinctly whether nothing or only part of it landed.

use rand::seq::SliceRandom;
use rand::Rng;

use crate::call::{AuctionCall, LotSelector};
use crate::eligibility::check_bid;
use crate::error::AuctionError;
use crate::state::TournamentState;
use crate::store::StateStore;
use hammer_types::{
    AuctionEvent, CurrentAuctionState, LotPhase, Player, PlayerId, PlayerStatus, SecretBid, Team,
    TeamId, UndoEntry,
};

/// Context provided by the console for each command.
pub struct CallContext {
    /// Wall-clock time of the command (unix seconds). Sealed-bid
    /// submissions record it as their tie-break timestamp.
    pub timestamp: u64,
}

/// Result type for handlers.
pub type HandlerResult<T> = Result<T, AuctionError>;

/// Dispatch one operator command.
pub fn apply<R: Rng>(
    state: &mut TournamentState,
    store: &mut dyn StateStore,
    ctx: &CallContext,
    rng: &mut R,
    call: AuctionCall,
) -> HandlerResult<Vec<AuctionEvent>> {
    match call {
        AuctionCall::SelectLot { selector, pool } => {
            handle_select_lot(state, store, selector, pool, rng).map(|e| vec![e])
        }
        AuctionCall::ClearLot => handle_clear_lot(state, store).map(|e| vec![e]),
        AuctionCall::RaiseBid { team, amount } => {
            handle_raise_bid(state, store, team, amount).map(|e| vec![e])
        }
        AuctionCall::MarkSold => handle_mark_sold(state, store).map(|e| vec![e]),
        AuctionCall::MarkUnsold => handle_mark_unsold(state, store).map(|e| vec![e]),
        AuctionCall::Reopen { player } => handle_reopen(state, store, player).map(|e| vec![e]),
        AuctionCall::Undo => Ok(handle_undo(state, store)?.into_iter().collect()),
        AuctionCall::Reset => handle_reset(state, store).map(|e| vec![e]),
        AuctionCall::SetSecretBidding { enabled } => {
            handle_set_secret_bidding(state, store, enabled).map(|e| vec![e])
        }
        AuctionCall::SubmitSecretBid {
            team,
            lot_serial,
            amount,
        } => {
            handle_submit_secret_bid(state, ctx, team, lot_serial, amount)?;
            // Sealed submissions are deliberately not broadcast.
            Ok(vec![])
        }
        AuctionCall::RevealSecretBids => handle_reveal_secret_bids(state, store),
        AuctionCall::SetMessage { text } => {
            handle_set_message(state, store, Some(text)).map(|e| vec![e])
        }
        AuctionCall::ClearMessage => handle_set_message(state, store, None).map(|e| vec![e]),
    }
}

/// Put a lot on the block.
///
/// The canonical record is replaced as a whole: bid reset to zero, leading
/// team cleared, sealed-bid flag off. `pool` switches the active pool;
/// `None` keeps the current one.
pub fn handle_select_lot<R: Rng>(
    state: &mut TournamentState,
    store: &mut dyn StateStore,
    selector: LotSelector,
    pool: Option<String>,
    rng: &mut R,
) -> HandlerResult<AuctionEvent> {
    let active_pool = pool.or_else(|| state.current.active_pool.clone());

    let lot_id = match selector {
        LotSelector::BySerial(serial) => state
            .players
            .values()
            .find(|p| p.serial == serial && p.status == PlayerStatus::Unauctioned)
            .map(|p| p.id)
            .ok_or(AuctionError::LotNotAvailable(serial))?,
        LotSelector::Random => {
            let candidates: Vec<PlayerId> = state
                .players
                .values()
                .filter(|p| p.status == PlayerStatus::Unauctioned)
                .map(|p| p.id)
                .collect();
            *candidates.choose(rng).ok_or(AuctionError::NoEligibleLot)?
        }
        LotSelector::CarryOver => {
            // Lots passed in under an earlier pool than the active one.
            let active_idx = active_pool
                .as_deref()
                .and_then(|name| state.config.pool_index(name));
            let candidates: Vec<PlayerId> = state
                .players
                .values()
                .filter(|p| p.status == PlayerStatus::Unsold)
                .filter(|p| match (active_idx, p.pool.as_deref()) {
                    (Some(active), Some(tagged)) => {
                        state.config.pool_index(tagged).is_some_and(|i| i < active)
                    }
                    _ => true,
                })
                .map(|p| p.id)
                .collect();
            *candidates.choose(rng).ok_or(AuctionError::NoEligibleLot)?
        }
    };

    let state_before = state.current.clone();
    let serial = state.player(lot_id)?.serial;

    let next = CurrentAuctionState {
        lot: Some(lot_id),
        lot_serial: Some(serial),
        phase: LotPhase::InAuction,
        current_bid: 0,
        leading_team: None,
        active_pool,
        secret_bidding: false,
        version: 0,
    };
    state.replace_current(next);
    state.secret_bids.clear();

    if let Err(source) = store.replace_current(&state.current) {
        state.current = state_before;
        return Err(AuctionError::Store(source));
    }

    state.undo.push(UndoEntry::NextLot { state_before });
    Ok(AuctionEvent::LotChanged {
        snapshot: state.snapshot(),
    })
}

/// Take the current lot off the block without recording an outcome.
pub fn handle_clear_lot(
    state: &mut TournamentState,
    store: &mut dyn StateStore,
) -> HandlerResult<AuctionEvent> {
    let state_before = state.current.clone();

    let mut next = CurrentAuctionState::idle();
    next.active_pool = state_before.active_pool.clone();
    state.replace_current(next);
    state.secret_bids.clear();

    if let Err(source) = store.replace_current(&state.current) {
        state.current = state_before;
        return Err(AuctionError::Store(source));
    }

    state.undo.push(UndoEntry::NextLot { state_before });
    Ok(AuctionEvent::LotChanged {
        snapshot: state.snapshot(),
    })
}

/// Raise the current bid for a team.
///
/// Updates only the canonical record; player and team records change on
/// sold/unsold, never here.
pub fn handle_raise_bid(
    state: &mut TournamentState,
    store: &mut dyn StateStore,
    team: TeamId,
    amount: Option<u64>,
) -> HandlerResult<AuctionEvent> {
    if state.current.secret_bidding {
        return Err(AuctionError::SecretBiddingActive);
    }

    let verdict = check_bid(state, team, amount)?;
    if !verdict.eligible {
        return Err(AuctionError::Ineligible {
            team,
            reason: verdict.reason.unwrap_or_default(),
        });
    }

    let candidate = verdict.candidate_bid;
    let current_bid = state.current.current_bid;
    if current_bid > 0 && candidate <= current_bid {
        return Err(AuctionError::BidNotAboveCurrent {
            bid: candidate,
            current: current_bid,
        });
    }
    if current_bid == 0 {
        // check_bid guarantees a lot is on the block here.
        let base_price = state.current_lot().map(|p| p.base_price).unwrap_or(0);
        if candidate < base_price {
            return Err(AuctionError::BidBelowBasePrice {
                bid: candidate,
                base_price,
            });
        }
    }

    let state_before = state.current.clone();
    let mut next = state_before.clone();
    next.current_bid = candidate;
    next.leading_team = Some(team);
    state.replace_current(next);

    if let Err(source) = store.replace_current(&state.current) {
        state.current = state_before;
        return Err(AuctionError::Store(source));
    }

    state.undo.push(UndoEntry::BidRaise { state_before });
    Ok(AuctionEvent::BidChanged {
        snapshot: state.snapshot(),
    })
}

/// Hammer the current lot down to the leading team.
pub fn handle_mark_sold(
    state: &mut TournamentState,
    store: &mut dyn StateStore,
) -> HandlerResult<AuctionEvent> {
    if state.current.phase != LotPhase::InAuction {
        return Err(AuctionError::InvalidPhase {
            expected: LotPhase::InAuction,
            got: state.current.phase,
        });
    }
    let lot_id = state.current.lot.ok_or(AuctionError::NoValidBid)?;
    let team_id = state.current.leading_team.ok_or(AuctionError::NoTeamSelected)?;
    let bid = state.current.current_bid;
    if bid == 0 {
        return Err(AuctionError::NoValidBid);
    }

    let player_before = state.player(lot_id)?.clone();
    if bid < player_before.base_price {
        return Err(AuctionError::BidBelowBasePrice {
            bid,
            base_price: player_before.base_price,
        });
    }
    let team_before = state.team(team_id)?.clone();
    if bid > team_before.purse_remaining() {
        return Err(AuctionError::InsufficientPurse {
            team: team_id,
            bid,
            purse: team_before.purse_remaining(),
        });
    }

    let state_before = state.current.clone();
    let pool = state_before.active_pool.clone();

    state.team_mut(team_id)?.record_purchase(bid, pool.as_deref());
    {
        let player = state.player_mut(lot_id)?;
        player.status = PlayerStatus::Sold;
        player.team = Some(team_id);
        player.sold_price = Some(bid);
        player.pool = pool.clone();
    }
    let mut next = state_before.clone();
    next.phase = LotPhase::Sold;
    next.current_bid = 0;
    next.leading_team = Some(team_id);
    next.secret_bidding = false;
    state.replace_current(next);

    // Mirror to the store, canonical record last.
    if let Err(source) = store.update_team(state.team(team_id)?) {
        restore(state, Some(&player_before), Some(&team_before), &state_before);
        return Err(AuctionError::Store(source));
    }
    if let Err(source) = store.update_player(state.player(lot_id)?) {
        restore(state, Some(&player_before), Some(&team_before), &state_before);
        return Err(AuctionError::PartialFailure {
            op: "mark_sold",
            failed_write: "player",
            source,
        });
    }
    if let Err(source) = store.replace_current(&state.current) {
        restore(state, Some(&player_before), Some(&team_before), &state_before);
        return Err(AuctionError::PartialFailure {
            op: "mark_sold",
            failed_write: "current",
            source,
        });
    }

    state.undo.push(UndoEntry::Sold {
        player_before,
        team_before,
        state_before,
    });
    state.secret_bids.clear();

    Ok(AuctionEvent::LotSold {
        player: lot_id,
        team: team_id,
        price: bid,
        snapshot: state.snapshot(),
    })
}

/// Pass the current lot in.
///
/// No team budget is touched. The lot is tagged with the pool it was
/// attempted in so tiered carry-over can re-offer it later.
pub fn handle_mark_unsold(
    state: &mut TournamentState,
    store: &mut dyn StateStore,
) -> HandlerResult<AuctionEvent> {
    if state.current.phase != LotPhase::InAuction {
        return Err(AuctionError::InvalidPhase {
            expected: LotPhase::InAuction,
            got: state.current.phase,
        });
    }
    let lot_id = state.current.lot.ok_or(AuctionError::NoEligibleLot)?;

    let player_before = state.player(lot_id)?.clone();
    let state_before = state.current.clone();
    let pool = state_before.active_pool.clone();

    {
        let player = state.player_mut(lot_id)?;
        player.status = PlayerStatus::Unsold;
        player.team = None;
        player.sold_price = None;
        player.pool = pool;
    }
    let mut next = state_before.clone();
    next.phase = LotPhase::Unsold;
    next.current_bid = 0;
    next.leading_team = None;
    next.secret_bidding = false;
    state.replace_current(next);

    if let Err(source) = store.update_player(state.player(lot_id)?) {
        restore(state, Some(&player_before), None, &state_before);
        return Err(AuctionError::Store(source));
    }
    if let Err(source) = store.replace_current(&state.current) {
        restore(state, Some(&player_before), None, &state_before);
        return Err(AuctionError::PartialFailure {
            op: "mark_unsold",
            failed_write: "current",
            source,
        });
    }

    state.undo.push(UndoEntry::Unsold {
        player_before,
        state_before,
    });
    state.secret_bids.clear();

    Ok(AuctionEvent::LotUnsold {
        player: lot_id,
        snapshot: state.snapshot(),
    })
}

/// Return a terminal lot to the block.
///
/// Reopening a sold lot refunds the buyer's purse and rolls its bought and
/// pool counters back; the lot comes back up with price and team stripped.
pub fn handle_reopen(
    state: &mut TournamentState,
    store: &mut dyn StateStore,
    player_id: PlayerId,
) -> HandlerResult<AuctionEvent> {
    let player_before = state.player(player_id)?.clone();
    if player_before.status == PlayerStatus::Unauctioned {
        return Err(AuctionError::NotTerminal);
    }

    let state_before = state.current.clone();
    let refunded_team = match (player_before.status, player_before.team) {
        (PlayerStatus::Sold, Some(team_id)) => {
            let team_before = state.team(team_id)?.clone();
            let price = player_before.sold_price.unwrap_or(0);
            state
                .team_mut(team_id)?
                .refund_purchase(price, player_before.pool.as_deref());
            Some(team_before)
        }
        _ => None,
    };

    state.player_mut(player_id)?.clear_sale();

    let next = CurrentAuctionState {
        lot: Some(player_id),
        lot_serial: Some(player_before.serial),
        phase: LotPhase::InAuction,
        current_bid: 0,
        leading_team: None,
        active_pool: state_before.active_pool.clone(),
        secret_bidding: false,
        version: 0,
    };
    state.replace_current(next);
    state.secret_bids.clear();

    if let Some(team_before) = &refunded_team {
        if let Err(source) = store.update_team(state.team(team_before.id)?) {
            restore(state, Some(&player_before), Some(team_before), &state_before);
            return Err(AuctionError::Store(source));
        }
    }
    if let Err(source) = store.update_player(state.player(player_id)?) {
        let landed_already = refunded_team.is_some();
        restore(state, Some(&player_before), refunded_team.as_ref(), &state_before);
        return Err(if landed_already {
            AuctionError::PartialFailure {
                op: "reopen",
                failed_write: "player",
                source,
            }
        } else {
            AuctionError::Store(source)
        });
    }
    if let Err(source) = store.replace_current(&state.current) {
        restore(state, Some(&player_before), refunded_team.as_ref(), &state_before);
        return Err(AuctionError::PartialFailure {
            op: "reopen",
            failed_write: "current",
            source,
        });
    }

    let event = if refunded_team.is_some() {
        AuctionEvent::TeamViewChanged {
            snapshot: state.snapshot(),
        }
    } else {
        AuctionEvent::LotChanged {
            snapshot: state.snapshot(),
        }
    };

    state.undo.push(UndoEntry::Reopen {
        player_before,
        team_before: refunded_team,
        state_before,
    });

    Ok(event)
}

/// Reverse the most recent reversible transition. No-op on an empty ledger.
pub fn handle_undo(
    state: &mut TournamentState,
    store: &mut dyn StateStore,
) -> HandlerResult<Option<AuctionEvent>> {
    let Some(entry) = state.undo.pop() else {
        return Ok(None);
    };

    // Snapshots of the post-transition state, for rollback if the store
    // rejects the compensating writes.
    let current_after = state.current.clone();

    let event = match entry.clone() {
        UndoEntry::Sold {
            player_before,
            team_before,
            state_before,
        } => {
            let player_after = state.player(player_before.id)?.clone();
            let team_after = state.team(team_before.id)?.clone();

            state.players.insert(player_before.id, player_before.clone());
            state.teams.insert(team_before.id, team_before.clone());
            state.replace_current(state_before);

            if let Err(source) = sync_undo(store, state, Some(player_before.id), Some(team_before.id))
            {
                state.players.insert(player_after.id, player_after);
                state.teams.insert(team_after.id, team_after);
                state.current = current_after;
                state.undo.push(entry);
                return Err(AuctionError::PartialFailure {
                    op: "undo",
                    failed_write: "store",
                    source,
                });
            }
            AuctionEvent::TeamViewChanged {
                snapshot: state.snapshot(),
            }
        }
        UndoEntry::Unsold {
            player_before,
            state_before,
        } => {
            let player_after = state.player(player_before.id)?.clone();

            state.players.insert(player_before.id, player_before.clone());
            state.replace_current(state_before);

            if let Err(source) = sync_undo(store, state, Some(player_before.id), None) {
                state.players.insert(player_after.id, player_after);
                state.current = current_after;
                state.undo.push(entry);
                return Err(AuctionError::PartialFailure {
                    op: "undo",
                    failed_write: "store",
                    source,
                });
            }
            AuctionEvent::LotChanged {
                snapshot: state.snapshot(),
            }
        }
        UndoEntry::BidRaise { state_before } => {
            state.replace_current(state_before);
            if let Err(source) = sync_undo(store, state, None, None) {
                state.current = current_after;
                state.undo.push(entry);
                return Err(AuctionError::Store(source));
            }
            AuctionEvent::BidChanged {
                snapshot: state.snapshot(),
            }
        }
        UndoEntry::NextLot { state_before } => {
            state.replace_current(state_before);
            if let Err(source) = sync_undo(store, state, None, None) {
                state.current = current_after;
                state.undo.push(entry);
                return Err(AuctionError::Store(source));
            }
            AuctionEvent::LotChanged {
                snapshot: state.snapshot(),
            }
        }
        UndoEntry::Reopen {
            player_before,
            team_before,
            state_before,
        } => {
            let player_after = state.player(player_before.id)?.clone();
            let team_after = match &team_before {
                Some(team) => Some(state.team(team.id)?.clone()),
                None => None,
            };

            state.players.insert(player_before.id, player_before.clone());
            if let Some(team) = &team_before {
                state.teams.insert(team.id, team.clone());
            }
            state.replace_current(state_before);

            let team_id = team_before.as_ref().map(|t| t.id);
            if let Err(source) = sync_undo(store, state, Some(player_before.id), team_id) {
                state.players.insert(player_after.id, player_after);
                if let Some(team) = team_after {
                    state.teams.insert(team.id, team);
                }
                state.current = current_after;
                state.undo.push(entry);
                return Err(AuctionError::PartialFailure {
                    op: "undo",
                    failed_write: "store",
                    source,
                });
            }
            AuctionEvent::TeamViewChanged {
                snapshot: state.snapshot(),
            }
        }
    };

    Ok(Some(event))
}

/// Tournament-wide wipe. Destructive and deliberately not undoable: the
/// ledger itself is cleared.
pub fn handle_reset(
    state: &mut TournamentState,
    store: &mut dyn StateStore,
) -> HandlerResult<AuctionEvent> {
    let players_before = state.players.clone();
    let teams_before = state.teams.clone();
    let state_before = state.current.clone();

    for player in state.players.values_mut() {
        player.clear_sale();
    }
    for team in state.teams.values_mut() {
        team.bought = 0;
        team.spent = 0;
        team.pool_spent.clear();
        team.pool_bought.clear();
    }
    state.replace_current(CurrentAuctionState::idle());
    state.undo.clear();
    state.secret_bids.clear();
    state.message = None;

    let mut synced_any = false;
    let result: Result<(), crate::store::StoreError> = (|| {
        for team in state.teams.values() {
            store.update_team(team)?;
            synced_any = true;
        }
        for player in state.players.values() {
            store.update_player(player)?;
            synced_any = true;
        }
        store.replace_current(&state.current)
    })();

    if let Err(source) = result {
        state.players = players_before;
        state.teams = teams_before;
        state.current = state_before;
        return Err(if synced_any {
            AuctionError::PartialFailure {
                op: "reset",
                failed_write: "store",
                source,
            }
        } else {
            AuctionError::Store(source)
        });
    }

    Ok(AuctionEvent::TeamViewChanged {
        snapshot: state.snapshot(),
    })
}

/// Toggle sealed bidding for the current lot.
pub fn handle_set_secret_bidding(
    state: &mut TournamentState,
    store: &mut dyn StateStore,
    enabled: bool,
) -> HandlerResult<AuctionEvent> {
    if state.current.phase != LotPhase::InAuction {
        return Err(AuctionError::InvalidPhase {
            expected: LotPhase::InAuction,
            got: state.current.phase,
        });
    }

    let state_before = state.current.clone();
    let mut next = state_before.clone();
    next.secret_bidding = enabled;
    state.replace_current(next);
    if !enabled {
        state.secret_bids.clear();
    }

    if let Err(source) = store.replace_current(&state.current) {
        state.current = state_before;
        return Err(AuctionError::Store(source));
    }

    Ok(AuctionEvent::LotChanged {
        snapshot: state.snapshot(),
    })
}

/// Accept a blind submission for the current lot.
///
/// Not broadcast, and other teams' submissions stay invisible. Budget checks
/// apply exactly as for an open manual bid; a lot change between submission
/// and arrival is detected by the serial and rejected.
pub fn handle_submit_secret_bid(
    state: &mut TournamentState,
    ctx: &CallContext,
    team: TeamId,
    lot_serial: u32,
    amount: u64,
) -> HandlerResult<()> {
    if state.current.phase != LotPhase::InAuction {
        return Err(AuctionError::InvalidPhase {
            expected: LotPhase::InAuction,
            got: state.current.phase,
        });
    }
    if !state.current.secret_bidding {
        return Err(AuctionError::SecretBiddingDisabled);
    }
    let current_serial = state.current.lot_serial.unwrap_or(0);
    if lot_serial != current_serial {
        return Err(AuctionError::StaleLotSerial {
            submitted: lot_serial,
            current: current_serial,
        });
    }

    let base_price = state.current_lot().map(|p| p.base_price).unwrap_or(0);
    if amount < base_price {
        return Err(AuctionError::BidBelowBasePrice {
            bid: amount,
            base_price,
        });
    }

    let verdict = check_bid(state, team, Some(amount))?;
    if !verdict.eligible {
        return Err(AuctionError::Ineligible {
            team,
            reason: verdict.reason.unwrap_or_default(),
        });
    }

    state.secret_bids.submit(SecretBid {
        team,
        lot_serial,
        amount,
        submitted_at: ctx.timestamp,
    });
    Ok(())
}

/// Open the sealed bids and sell to the best-ranked eligible bidder.
///
/// Ranking is highest amount first; ties break to the earliest submission,
/// then the lowest team id. A bidder whose budget position worsened since
/// submission is skipped in favor of the next in rank. The winner is fed
/// through the ordinary sold transition.
pub fn handle_reveal_secret_bids(
    state: &mut TournamentState,
    store: &mut dyn StateStore,
) -> HandlerResult<Vec<AuctionEvent>> {
    if state.current.phase != LotPhase::InAuction {
        return Err(AuctionError::InvalidPhase {
            expected: LotPhase::InAuction,
            got: state.current.phase,
        });
    }
    if !state.current.secret_bidding {
        return Err(AuctionError::SecretBiddingDisabled);
    }

    let serial = state.current.lot_serial.unwrap_or(0);
    let ranked = state.secret_bids.ranked(serial);
    if ranked.is_empty() {
        return Err(AuctionError::NoSecretBids);
    }

    let winner = ranked
        .iter()
        .find(|bid| {
            check_bid(state, bid.team, Some(bid.amount))
                .map(|v| v.eligible)
                .unwrap_or(false)
        })
        .cloned();
    let Some(winner) = winner else {
        let top = &ranked[0];
        let reason = check_bid(state, top.team, Some(top.amount))
            .ok()
            .and_then(|v| v.reason)
            .unwrap_or_else(|| "no eligible sealed bid".to_string());
        return Err(AuctionError::Ineligible {
            team: top.team,
            reason,
        });
    };

    // Assign the winning bid on the canonical record, then run the ordinary
    // sold transition at that amount.
    let state_before = state.current.clone();
    let mut next = state_before.clone();
    next.current_bid = winner.amount;
    next.leading_team = Some(winner.team);
    state.replace_current(next);
    if let Err(source) = store.replace_current(&state.current) {
        state.current = state_before;
        return Err(AuctionError::Store(source));
    }

    let revealed = AuctionEvent::SecretBidsRevealed {
        bids: ranked,
        snapshot: state.snapshot(),
    };

    let sold = handle_mark_sold(state, store)?;
    let assigned = match sold {
        AuctionEvent::LotSold {
            team,
            price,
            snapshot,
            ..
        } => AuctionEvent::SecretBidWinnerAssigned {
            team,
            price,
            snapshot,
        },
        other => other,
    };

    Ok(vec![revealed, assigned])
}

/// Set or clear the viewer ticker message.
///
/// Session-scoped configuration state with an explicit lifecycle: set here,
/// cleared here or by a tournament reset. The canonical version is bumped so
/// polling observers pick the change up.
pub fn handle_set_message(
    state: &mut TournamentState,
    store: &mut dyn StateStore,
    text: Option<String>,
) -> HandlerResult<AuctionEvent> {
    let state_before = state.current.clone();
    let message_before = state.message.take();
    state.message = text;

    state.replace_current(state_before.clone());
    if let Err(source) = store.replace_current(&state.current) {
        state.current = state_before;
        state.message = message_before;
        return Err(AuctionError::Store(source));
    }

    Ok(AuctionEvent::TeamViewChanged {
        snapshot: state.snapshot(),
    })
}

/// Restore in-memory snapshots after a rejected store write. The canonical
/// record goes back verbatim, original version included.
fn restore(
    state: &mut TournamentState,
    player_before: Option<&Player>,
    team_before: Option<&Team>,
    state_before: &CurrentAuctionState,
) {
    if let Some(player) = player_before {
        state.players.insert(player.id, player.clone());
    }
    if let Some(team) = team_before {
        state.teams.insert(team.id, team.clone());
    }
    state.current = state_before.clone();
}

/// Mirror an undo's restored records to the store, canonical record last.
fn sync_undo(
    store: &mut dyn StateStore,
    state: &TournamentState,
    player: Option<PlayerId>,
    team: Option<TeamId>,
) -> Result<(), crate::store::StoreError> {
    if let Some(team_id) = team {
        if let Ok(team) = state.team(team_id) {
            store.update_team(team)?;
        }
    }
    if let Some(player_id) = player {
        if let Ok(player) = state.player(player_id) {
            store.update_player(player)?;
        }
    }
    store.replace_current(&state.current)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::TournamentConfig;
    use crate::store::{InMemoryStore, StoreError};
    use hammer_types::{IncrementRange, IncrementTable, Pool};

    /// Store that can be told to reject specific writes.
    #[derive(Default)]
    struct FailingStore {
        inner: InMemoryStore,
        fail_player: bool,
        fail_team: bool,
        fail_current: bool,
    }

    impl StateStore for FailingStore {
        fn replace_current(&mut self, s: &CurrentAuctionState) -> Result<(), StoreError> {
            if self.fail_current {
                return Err(StoreError::WriteFailed("current".into()));
            }
            self.inner.replace_current(s)
        }

        fn update_player(&mut self, p: &Player) -> Result<(), StoreError> {
            if self.fail_player {
                return Err(StoreError::WriteFailed("player".into()));
            }
            self.inner.update_player(p)
        }

        fn update_team(&mut self, t: &Team) -> Result<(), StoreError> {
            if self.fail_team {
                return Err(StoreError::WriteFailed("team".into()));
            }
            self.inner.update_team(t)
        }
    }

    fn stepped_table() -> IncrementTable {
        IncrementTable {
            ranges: vec![
                IncrementRange { min: 0, max: Some(3_000), step: 100 },
                IncrementRange { min: 3_000, max: Some(5_000), step: 500 },
                IncrementRange { min: 5_000, max: None, step: 1_000 },
            ],
            fallback: 100,
        }
    }

    fn tiered_config() -> TournamentConfig {
        TournamentConfig {
            squad_size: 6,
            pools: vec![
                Pool {
                    name: "A".into(),
                    cap: 4_000_000,
                    min_count: 1,
                    max_count: None,
                    base_price: 100_000,
                },
                Pool {
                    name: "B".into(),
                    cap: 3_000_000,
                    min_count: 1,
                    max_count: None,
                    base_price: 100_000,
                },
            ],
            increments: IncrementTable::flat(10_000),
            ..Default::default()
        }
    }

    fn fixture(config: TournamentConfig) -> (TournamentState, InMemoryStore) {
        let players = vec![
            Player::new(1, "A. Kumar", 1, 50_000),
            Player::new(2, "B. Singh", 2, 100_000),
            Player::new(3, "C. Reddy", 3, 200_000),
        ];
        let teams = vec![
            Team::new(1, "Strikers", 5_000_000),
            Team::new(2, "Titans", 5_000_000),
        ];
        (
            TournamentState::with_rosters(config, players, teams),
            InMemoryStore::default(),
        )
    }

    fn ctx() -> CallContext {
        CallContext { timestamp: 1_000 }
    }

    fn select(state: &mut TournamentState, store: &mut InMemoryStore, serial: u32) {
        handle_select_lot(
            state,
            store,
            LotSelector::BySerial(serial),
            None,
            &mut rand::thread_rng(),
        )
        .unwrap();
    }

    #[test]
    fn select_raise_sold_happy_path() {
        let (mut state, mut store) = fixture(TournamentConfig::default());
        select(&mut state, &mut store, 1);
        assert_eq!(state.current.phase, LotPhase::InAuction);

        handle_raise_bid(&mut state, &mut store, 1, None).unwrap();
        assert_eq!(state.current.current_bid, 50_000);
        assert_eq!(state.current.leading_team, Some(1));

        handle_raise_bid(&mut state, &mut store, 2, None).unwrap();
        assert_eq!(state.current.current_bid, 60_000);

        let event = handle_mark_sold(&mut state, &mut store).unwrap();
        assert!(matches!(
            event,
            AuctionEvent::LotSold { team: 2, price: 60_000, .. }
        ));
        assert_eq!(state.current.phase, LotPhase::Sold);
        assert_eq!(state.current.current_bid, 0);

        let player = state.player(1).unwrap();
        assert_eq!(player.status, PlayerStatus::Sold);
        assert_eq!(player.sold_price, Some(60_000));
        let team = state.team(2).unwrap();
        assert_eq!(team.purse_remaining(), 4_940_000);
        assert_eq!(team.bought, 1);
    }

    #[test]
    fn raise_follows_the_increment_table() {
        let config = TournamentConfig {
            increments: stepped_table(),
            ..Default::default()
        };
        let (mut state, mut store) = fixture(config);
        state.players.insert(9, Player::new(9, "D. Nair", 9, 2_800));
        select(&mut state, &mut store, 9);

        handle_raise_bid(&mut state, &mut store, 1, Some(2_800)).unwrap();
        handle_raise_bid(&mut state, &mut store, 2, None).unwrap();
        assert_eq!(state.current.current_bid, 2_900);
    }

    #[test]
    fn sold_without_a_bid_is_rejected() {
        let (mut state, mut store) = fixture(TournamentConfig::default());
        select(&mut state, &mut store, 1);

        let err = handle_mark_sold(&mut state, &mut store).unwrap_err();
        assert_eq!(err.to_string(), "Cannot mark as sold without a valid bid");
        assert_eq!(state.current.phase, LotPhase::InAuction);
    }

    #[test]
    fn sold_twice_without_reopen_is_rejected() {
        let (mut state, mut store) = fixture(TournamentConfig::default());
        select(&mut state, &mut store, 1);
        handle_raise_bid(&mut state, &mut store, 1, None).unwrap();
        handle_mark_sold(&mut state, &mut store).unwrap();

        let err = handle_mark_sold(&mut state, &mut store).unwrap_err();
        assert!(matches!(err, AuctionError::InvalidPhase { .. }));
        assert_eq!(err.kind(), crate::error::ErrorKind::Conflict);
        // The buyer was charged exactly once.
        assert_eq!(state.team(1).unwrap().bought, 1);
    }

    #[test]
    fn manual_raise_below_base_price_is_rejected() {
        let (mut state, mut store) = fixture(TournamentConfig::default());
        select(&mut state, &mut store, 1);
        let err = handle_raise_bid(&mut state, &mut store, 1, Some(40_000)).unwrap_err();
        assert!(matches!(err, AuctionError::BidBelowBasePrice { .. }));
    }

    #[test]
    fn manual_raise_must_beat_the_current_bid() {
        let (mut state, mut store) = fixture(TournamentConfig::default());
        select(&mut state, &mut store, 1);
        handle_raise_bid(&mut state, &mut store, 1, Some(80_000)).unwrap();
        let err = handle_raise_bid(&mut state, &mut store, 2, Some(80_000)).unwrap_err();
        assert!(matches!(err, AuctionError::BidNotAboveCurrent { .. }));
    }

    #[test]
    fn raise_never_touches_rosters() {
        let (mut state, mut store) = fixture(TournamentConfig::default());
        select(&mut state, &mut store, 1);
        handle_raise_bid(&mut state, &mut store, 1, None).unwrap();

        assert_eq!(state.team(1).unwrap().spent, 0);
        assert_eq!(state.player(1).unwrap().status, PlayerStatus::Unauctioned);
    }

    #[test]
    fn purse_stays_non_negative_across_sales() {
        let (mut state, mut store) = fixture(TournamentConfig::default());
        state.teams.get_mut(&1).unwrap().budget = 120_000;

        select(&mut state, &mut store, 1);
        handle_raise_bid(&mut state, &mut store, 1, Some(100_000)).unwrap();
        handle_mark_sold(&mut state, &mut store).unwrap();
        assert_eq!(state.team(1).unwrap().purse_remaining(), 20_000);

        select(&mut state, &mut store, 2);
        // 100_000 base price exceeds the remaining 20_000 purse.
        let err = handle_raise_bid(&mut state, &mut store, 1, None).unwrap_err();
        assert!(matches!(err, AuctionError::Ineligible { .. }));
    }

    #[test]
    fn unsold_tags_the_pool_for_carry_over() {
        let (mut state, mut store) = fixture(tiered_config());
        handle_select_lot(
            &mut state,
            &mut store,
            LotSelector::BySerial(1),
            Some("A".into()),
            &mut rand::thread_rng(),
        )
        .unwrap();
        handle_mark_unsold(&mut state, &mut store).unwrap();
        assert_eq!(state.player(1).unwrap().pool.as_deref(), Some("A"));

        // Move to pool B; carry-over must find the pool-A leftover.
        handle_select_lot(
            &mut state,
            &mut store,
            LotSelector::CarryOver,
            Some("B".into()),
            &mut rand::thread_rng(),
        )
        .unwrap();
        assert_eq!(state.current.lot, Some(1));
        assert_eq!(state.current.active_pool.as_deref(), Some("B"));
    }

    #[test]
    fn reopen_refunds_the_exact_sale() {
        let (mut state, mut store) = fixture(TournamentConfig::default());
        select(&mut state, &mut store, 1);
        handle_raise_bid(&mut state, &mut store, 1, Some(200_000)).unwrap();
        handle_mark_sold(&mut state, &mut store).unwrap();
        assert_eq!(state.team(1).unwrap().purse_remaining(), 4_800_000);

        handle_reopen(&mut state, &mut store, 1).unwrap();
        let team = state.team(1).unwrap();
        assert_eq!(team.purse_remaining(), 5_000_000);
        assert_eq!(team.bought, 0);
        let player = state.player(1).unwrap();
        assert_eq!(player.status, PlayerStatus::Unauctioned);
        assert!(player.team.is_none() && player.sold_price.is_none());
        assert_eq!(state.current.phase, LotPhase::InAuction);
        assert_eq!(state.current.lot, Some(1));
    }

    #[test]
    fn reopen_of_an_unauctioned_lot_is_a_conflict() {
        let (mut state, mut store) = fixture(TournamentConfig::default());
        let err = handle_reopen(&mut state, &mut store, 1).unwrap_err();
        assert!(matches!(err, AuctionError::NotTerminal));
    }

    #[test]
    fn undo_after_sold_restores_the_exact_snapshot() {
        let (mut state, mut store) = fixture(TournamentConfig::default());
        select(&mut state, &mut store, 1);
        handle_raise_bid(&mut state, &mut store, 1, Some(150_000)).unwrap();

        let team_before = state.team(1).unwrap().clone();
        let player_before = state.player(1).unwrap().clone();
        handle_mark_sold(&mut state, &mut store).unwrap();

        let event = handle_undo(&mut state, &mut store).unwrap();
        assert!(event.is_some());
        assert_eq!(state.team(1).unwrap(), &team_before);
        assert_eq!(state.player(1).unwrap(), &player_before);
        assert_eq!(state.current.phase, LotPhase::InAuction);
        assert_eq!(state.current.current_bid, 150_000);
    }

    #[test]
    fn undo_is_strictly_sequential() {
        let (mut state, mut store) = fixture(TournamentConfig::default());
        select(&mut state, &mut store, 1);
        handle_raise_bid(&mut state, &mut store, 1, None).unwrap();
        handle_raise_bid(&mut state, &mut store, 2, None).unwrap();

        handle_undo(&mut state, &mut store).unwrap();
        assert_eq!(state.current.leading_team, Some(1));
        handle_undo(&mut state, &mut store).unwrap();
        assert_eq!(state.current.leading_team, None);
        assert_eq!(state.current.current_bid, 0);
    }

    #[test]
    fn undo_on_empty_ledger_is_a_no_op() {
        let (mut state, mut store) = fixture(TournamentConfig::default());
        assert!(handle_undo(&mut state, &mut store).unwrap().is_none());
    }

    #[test]
    fn undo_reverses_a_reopen() {
        let (mut state, mut store) = fixture(TournamentConfig::default());
        select(&mut state, &mut store, 1);
        handle_raise_bid(&mut state, &mut store, 1, Some(200_000)).unwrap();
        handle_mark_sold(&mut state, &mut store).unwrap();
        handle_reopen(&mut state, &mut store, 1).unwrap();

        handle_undo(&mut state, &mut store).unwrap();
        let player = state.player(1).unwrap();
        assert_eq!(player.status, PlayerStatus::Sold);
        assert_eq!(player.sold_price, Some(200_000));
        assert_eq!(state.team(1).unwrap().purse_remaining(), 4_800_000);
    }

    #[test]
    fn partial_failure_rolls_back_and_skips_the_ledger() {
        let (mut state, _) = fixture(TournamentConfig::default());
        let mut store = FailingStore::default();
        handle_select_lot(
            &mut state,
            &mut store,
            LotSelector::BySerial(1),
            None,
            &mut rand::thread_rng(),
        )
        .unwrap();
        handle_raise_bid(&mut state, &mut store, 1, Some(100_000)).unwrap();
        let depth_before = state.undo.depth();

        store.fail_player = true;
        let err = handle_mark_sold(&mut state, &mut store).unwrap_err();
        assert!(matches!(
            err,
            AuctionError::PartialFailure { op: "mark_sold", failed_write: "player", .. }
        ));

        // In-memory state rolled back; nothing was pushed to the ledger.
        assert_eq!(state.current.phase, LotPhase::InAuction);
        assert_eq!(state.current.current_bid, 100_000);
        assert_eq!(state.team(1).unwrap().spent, 0);
        assert_eq!(state.player(1).unwrap().status, PlayerStatus::Unauctioned);
        assert_eq!(state.undo.depth(), depth_before);

        // Retry after the backend recovers succeeds cleanly.
        store.fail_player = false;
        handle_mark_sold(&mut state, &mut store).unwrap();
        assert_eq!(state.player(1).unwrap().status, PlayerStatus::Sold);
        assert_eq!(state.undo.depth(), depth_before + 1);
    }

    #[test]
    fn first_write_failure_is_a_plain_store_error() {
        let (mut state, _) = fixture(TournamentConfig::default());
        let mut store = FailingStore::default();
        handle_select_lot(
            &mut state,
            &mut store,
            LotSelector::BySerial(1),
            None,
            &mut rand::thread_rng(),
        )
        .unwrap();
        handle_raise_bid(&mut state, &mut store, 1, Some(100_000)).unwrap();

        store.fail_team = true;
        let err = handle_mark_sold(&mut state, &mut store).unwrap_err();
        assert!(matches!(err, AuctionError::Store(_)));
        assert_eq!(state.team(1).unwrap().spent, 0);
    }

    #[test]
    fn reset_wipes_everything_including_the_ledger() {
        let (mut state, mut store) = fixture(TournamentConfig::default());
        select(&mut state, &mut store, 1);
        handle_raise_bid(&mut state, &mut store, 1, None).unwrap();
        handle_mark_sold(&mut state, &mut store).unwrap();
        state.message = Some("welcome".into());

        handle_reset(&mut state, &mut store).unwrap();
        assert_eq!(state.current.phase, LotPhase::Idle);
        assert!(state.undo.is_empty());
        assert!(state.message.is_none());
        assert_eq!(state.player(1).unwrap().status, PlayerStatus::Unauctioned);
        assert_eq!(state.team(1).unwrap().spent, 0);

        // Not undoable.
        assert!(handle_undo(&mut state, &mut store).unwrap().is_none());
    }

    #[test]
    fn selecting_a_new_lot_replaces_the_record_wholesale() {
        let (mut state, mut store) = fixture(TournamentConfig::default());
        select(&mut state, &mut store, 1);
        handle_raise_bid(&mut state, &mut store, 1, None).unwrap();
        let version_before = state.current.version;

        select(&mut state, &mut store, 2);
        assert_eq!(state.current.lot, Some(2));
        assert_eq!(state.current.current_bid, 0);
        assert_eq!(state.current.leading_team, None);
        assert!(state.current.version > version_before);
    }

    #[test]
    fn open_raises_are_rejected_while_sealed() {
        let (mut state, mut store) = fixture(TournamentConfig::default());
        select(&mut state, &mut store, 1);
        handle_set_secret_bidding(&mut state, &mut store, true).unwrap();

        let err = handle_raise_bid(&mut state, &mut store, 1, None).unwrap_err();
        assert!(matches!(err, AuctionError::SecretBiddingActive));
    }

    #[test]
    fn stale_serial_secret_bid_is_rejected() {
        let (mut state, mut store) = fixture(TournamentConfig::default());
        select(&mut state, &mut store, 1);
        handle_set_secret_bidding(&mut state, &mut store, true).unwrap();

        let err =
            handle_submit_secret_bid(&mut state, &ctx(), 1, 2, 100_000).unwrap_err();
        assert!(matches!(
            err,
            AuctionError::StaleLotSerial { submitted: 2, current: 1 }
        ));
    }

    #[test]
    fn secret_bid_over_budget_is_rejected() {
        let (mut state, mut store) = fixture(TournamentConfig::default());
        select(&mut state, &mut store, 1);
        handle_set_secret_bidding(&mut state, &mut store, true).unwrap();

        let err =
            handle_submit_secret_bid(&mut state, &ctx(), 1, 1, 6_000_000).unwrap_err();
        assert!(matches!(err, AuctionError::Ineligible { .. }));
    }

    #[test]
    fn reveal_sells_to_the_highest_with_earliest_tie_break() {
        let (mut state, mut store) = fixture(TournamentConfig::default());
        select(&mut state, &mut store, 1);
        handle_set_secret_bidding(&mut state, &mut store, true).unwrap();

        let early = CallContext { timestamp: 100 };
        let late = CallContext { timestamp: 200 };
        handle_submit_secret_bid(&mut state, &late, 1, 1, 300_000).unwrap();
        handle_submit_secret_bid(&mut state, &early, 2, 1, 300_000).unwrap();

        let events = handle_reveal_secret_bids(&mut state, &mut store).unwrap();
        assert_eq!(events.len(), 2);
        assert!(matches!(events[0], AuctionEvent::SecretBidsRevealed { .. }));
        assert!(matches!(
            events[1],
            AuctionEvent::SecretBidWinnerAssigned { team: 2, price: 300_000, .. }
        ));

        let player = state.player(1).unwrap();
        assert_eq!(player.team, Some(2));
        assert_eq!(player.sold_price, Some(300_000));
        assert_eq!(state.team(2).unwrap().purse_remaining(), 4_700_000);
    }

    #[test]
    fn reveal_with_no_bids_is_rejected() {
        let (mut state, mut store) = fixture(TournamentConfig::default());
        select(&mut state, &mut store, 1);
        handle_set_secret_bidding(&mut state, &mut store, true).unwrap();

        let err = handle_reveal_secret_bids(&mut state, &mut store).unwrap_err();
        assert!(matches!(err, AuctionError::NoSecretBids));
    }

    #[test]
    fn reveal_skips_a_bidder_whose_purse_worsened() {
        let (mut state, mut store) = fixture(TournamentConfig::default());
        select(&mut state, &mut store, 1);
        handle_set_secret_bidding(&mut state, &mut store, true).unwrap();

        handle_submit_secret_bid(&mut state, &ctx(), 1, 1, 400_000).unwrap();
        handle_submit_secret_bid(&mut state, &ctx(), 2, 1, 300_000).unwrap();

        // Team 1's purse shrinks between submission and reveal; its
        // top-ranked bid no longer clears the budget check.
        state.teams.get_mut(&1).unwrap().budget = 350_000;

        let events = handle_reveal_secret_bids(&mut state, &mut store).unwrap();
        assert!(matches!(
            events[1],
            AuctionEvent::SecretBidWinnerAssigned { team: 2, price: 300_000, .. }
        ));

        let player = state.player(1).unwrap();
        assert_eq!(player.team, Some(2));
        assert_eq!(player.sold_price, Some(300_000));
        assert_eq!(state.team(1).unwrap().bought, 0);
    }

    #[test]
    fn reveal_with_no_eligible_bidders_keeps_the_lot_sealed() {
        let (mut state, mut store) = fixture(TournamentConfig::default());
        select(&mut state, &mut store, 1);
        handle_set_secret_bidding(&mut state, &mut store, true).unwrap();

        handle_submit_secret_bid(&mut state, &ctx(), 1, 1, 400_000).unwrap();
        handle_submit_secret_bid(&mut state, &ctx(), 2, 1, 300_000).unwrap();

        state.teams.get_mut(&1).unwrap().budget = 100_000;
        state.teams.get_mut(&2).unwrap().budget = 100_000;

        let err = handle_reveal_secret_bids(&mut state, &mut store).unwrap_err();
        // The error names the top-ranked bidder and its reason.
        match err {
            AuctionError::Ineligible { team, reason } => {
                assert_eq!(team, 1);
                assert_eq!(reason, crate::eligibility::REASON_INSUFFICIENT_PURSE);
            }
            other => panic!("unexpected error: {other:?}"),
        }

        // Nothing sold; the round stays sealed and open.
        assert_eq!(state.current.phase, LotPhase::InAuction);
        assert!(state.current.secret_bidding);
        assert_eq!(state.secret_bids.count_for(1), 2);
        assert_eq!(
            state.player(1).unwrap().status,
            PlayerStatus::Unauctioned
        );
    }

    #[test]
    fn apply_dispatches_calls() {
        let (mut state, mut store) = fixture(TournamentConfig::default());
        let mut rng = rand::thread_rng();

        let events = apply(
            &mut state,
            &mut store,
            &ctx(),
            &mut rng,
            AuctionCall::SelectLot {
                selector: LotSelector::BySerial(1),
                pool: None,
            },
        )
        .unwrap();
        assert!(matches!(events[0], AuctionEvent::LotChanged { .. }));

        apply(
            &mut state,
            &mut store,
            &ctx(),
            &mut rng,
            AuctionCall::RaiseBid { team: 1, amount: None },
        )
        .unwrap();
        let events = apply(
            &mut state,
            &mut store,
            &ctx(),
            &mut rng,
            AuctionCall::MarkSold,
        )
        .unwrap();
        assert!(matches!(events[0], AuctionEvent::LotSold { .. }));
    }

    #[test]
    fn message_lifecycle_bumps_the_version() {
        let (mut state, mut store) = fixture(TournamentConfig::default());
        let v0 = state.current.version;

        handle_set_message(&mut state, &mut store, Some("half-time break".into())).unwrap();
        assert_eq!(state.message.as_deref(), Some("half-time break"));
        assert!(state.current.version > v0);

        handle_set_message(&mut state, &mut store, None).unwrap();
        assert!(state.message.is_none());
    }
}
