//! Operator console server for a live player auction.
//!
//! Exposes the bidding engine over JSON-RPC: operator commands, the
//! sealed-bid submission endpoint, polling reads for observer
//! reconciliation, and a full-state event subscription for the broadcast
//! fanout. Exactly one console runs per tournament; it is the single
//! writer, and every read fans out from the state it owns.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use anyhow::Result;
use clap::Parser;
use jsonrpsee::core::{async_trait, SubscriptionResult};
use jsonrpsee::proc_macros::rpc;
use jsonrpsee::server::Server;
use jsonrpsee::types::ErrorObjectOwned;
use jsonrpsee::{PendingSubscriptionSink, SubscriptionMessage};
use parking_lot::RwLock;
use tokio::sync::broadcast;
use tracing::{info, warn};

use hammer_engine::allocator::{pool_state, PoolState};
use hammer_engine::call::AuctionCall;
use hammer_engine::eligibility::{eligible_teams, Eligibility};
use hammer_engine::handlers::{self, CallContext};
use hammer_engine::{AuctionError, ErrorKind, InMemoryStore, TournamentState};
use hammer_types::{AuctionEvent, CurrentAuctionState, Player, StateSnapshot, Team, TeamId};

mod guard;
mod types;

use guard::CommandGate;
use types::*;

/// How many fanout events are buffered per slow subscriber before it is
/// considered lagged and must self-heal by polling.
const EVENT_BUFFER: usize = 256;

/// RPC API of the operator console.
#[rpc(server)]
pub trait AuctionConsoleApi {
    // ============ Admin ============

    /// Load tournament rules and rosters. Replaces any existing state.
    #[method(name = "admin_init")]
    async fn admin_init(&self, setup: TournamentSetup) -> Result<bool, ErrorObjectOwned>;

    // ============ Operator commands ============

    /// Put a lot on the block.
    #[method(name = "operator_selectLot")]
    async fn operator_select_lot(
        &self,
        params: SelectLotParams,
    ) -> Result<StateSnapshot, ErrorObjectOwned>;

    /// Take the current lot off the block without an outcome.
    #[method(name = "operator_clearLot")]
    async fn operator_clear_lot(&self) -> Result<StateSnapshot, ErrorObjectOwned>;

    /// Raise the current bid for a team.
    #[method(name = "operator_raiseBid")]
    async fn operator_raise_bid(
        &self,
        params: RaiseBidParams,
    ) -> Result<StateSnapshot, ErrorObjectOwned>;

    /// Hammer the current lot down to the leading team.
    #[method(name = "operator_markSold")]
    async fn operator_mark_sold(&self) -> Result<StateSnapshot, ErrorObjectOwned>;

    /// Pass the current lot in.
    #[method(name = "operator_markUnsold")]
    async fn operator_mark_unsold(&self) -> Result<StateSnapshot, ErrorObjectOwned>;

    /// Return a terminal lot to the block, refunding if it was sold.
    #[method(name = "operator_reopen")]
    async fn operator_reopen(
        &self,
        params: ReopenParams,
    ) -> Result<StateSnapshot, ErrorObjectOwned>;

    /// Reverse the most recent reversible transition.
    #[method(name = "operator_undo")]
    async fn operator_undo(&self) -> Result<StateSnapshot, ErrorObjectOwned>;

    /// Tournament-wide wipe. Destructive and not undoable.
    #[method(name = "operator_reset")]
    async fn operator_reset(&self) -> Result<StateSnapshot, ErrorObjectOwned>;

    /// Toggle sealed bidding for the current lot.
    #[method(name = "operator_setSecretBidding")]
    async fn operator_set_secret_bidding(
        &self,
        enabled: bool,
    ) -> Result<StateSnapshot, ErrorObjectOwned>;

    /// Open the sealed bids and sell to the best-ranked eligible bidder.
    #[method(name = "operator_revealSecretBids")]
    async fn operator_reveal_secret_bids(&self) -> Result<StateSnapshot, ErrorObjectOwned>;

    /// Set the viewer ticker message.
    #[method(name = "operator_setMessage")]
    async fn operator_set_message(&self, text: String) -> Result<bool, ErrorObjectOwned>;

    /// Clear the viewer ticker message.
    #[method(name = "operator_clearMessage")]
    async fn operator_clear_message(&self) -> Result<bool, ErrorObjectOwned>;

    // ============ Sealed-bid channel ============

    /// Blind submission for the current lot. Never broadcast.
    #[method(name = "secret_submitBid")]
    async fn secret_submit_bid(
        &self,
        params: SecretBidParams,
    ) -> Result<SecretBidReceipt, ErrorObjectOwned>;

    // ============ Reconciliation reads ============

    /// Full state for observer reconciliation.
    #[method(name = "query_getState")]
    async fn query_get_state(&self) -> Result<StateSnapshot, ErrorObjectOwned>;

    /// The canonical current-lot/current-bid record only.
    #[method(name = "query_getCurrent")]
    async fn query_get_current(&self) -> Result<CurrentAuctionState, ErrorObjectOwned>;

    /// All registered players.
    #[method(name = "query_listPlayers")]
    async fn query_list_players(&self) -> Result<Vec<Player>, ErrorObjectOwned>;

    /// All registered teams.
    #[method(name = "query_listTeams")]
    async fn query_list_teams(&self) -> Result<Vec<Team>, ErrorObjectOwned>;

    /// A team's standing in every pool, in tier order.
    #[method(name = "query_getTeamPools")]
    async fn query_get_team_pools(
        &self,
        team: TeamId,
    ) -> Result<Vec<(String, PoolState)>, ErrorObjectOwned>;

    /// Which teams may legally raise the bid right now, with reasons.
    #[method(name = "query_getEligibleTeams")]
    async fn query_get_eligible_teams(&self) -> Result<Vec<Eligibility>, ErrorObjectOwned>;

    /// Sealed submissions pending for the current lot (count only).
    #[method(name = "query_getSecretBidCount")]
    async fn query_get_secret_bid_count(&self) -> Result<usize, ErrorObjectOwned>;

    /// Entries on the undo ledger.
    #[method(name = "query_getUndoDepth")]
    async fn query_get_undo_depth(&self) -> Result<usize, ErrorObjectOwned>;

    // ============ Broadcast fanout ============

    /// Stream every state transition as a full-state event. Delivery is
    /// best-effort; lagged subscribers must reconcile by polling.
    #[subscription(name = "state_subscribeEvents", unsubscribe = "state_unsubscribeEvents", item = AuctionEvent)]
    async fn subscribe_events(&self) -> SubscriptionResult;
}

/// Canonical state plus its store mirror, behind one writer lock.
struct ConsoleState {
    engine: TournamentState,
    store: InMemoryStore,
}

/// The console server.
struct AuctionConsole {
    state: Arc<RwLock<ConsoleState>>,
    gate: CommandGate,
    events: broadcast::Sender<AuctionEvent>,
}

impl AuctionConsole {
    fn new(engine: TournamentState) -> Self {
        let (events, _) = broadcast::channel(EVENT_BUFFER);
        Self {
            state: Arc::new(RwLock::new(ConsoleState {
                engine,
                store: InMemoryStore::default(),
            })),
            gate: CommandGate::default(),
            events,
        }
    }

    fn now() -> u64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or(0)
    }

    /// Run one operator command: claim the in-flight gate, apply it under
    /// the write lock, then fan the resulting events out.
    fn execute(
        &self,
        name: &'static str,
        call: AuctionCall,
    ) -> Result<StateSnapshot, ErrorObjectOwned> {
        let _pass = self.gate.enter(name).map_err(rpc_error)?;
        let ctx = CallContext {
            timestamp: Self::now(),
        };

        let events = {
            let mut state = self.state.write();
            let ConsoleState { engine, store } = &mut *state;
            handlers::apply(engine, store, &ctx, &mut rand::thread_rng(), call)
                .map_err(rpc_error)?
        };

        for event in &events {
            // Fire-and-forget: no subscribers is not an error.
            let _ = self.events.send(event.clone());
        }

        Ok(self.state.read().engine.snapshot())
    }
}

/// Map engine errors onto JSON-RPC error objects, keeping the taxonomy
/// visible in the code so operator UIs can distinguish retry semantics.
fn rpc_error(err: AuctionError) -> ErrorObjectOwned {
    let code = match err.kind() {
        ErrorKind::Validation => -32001,
        ErrorKind::Conflict => -32002,
        ErrorKind::PartialFailure => -32003,
    };
    ErrorObjectOwned::owned(code, err.to_string(), None::<()>)
}

#[async_trait]
impl AuctionConsoleApiServer for AuctionConsole {
    async fn admin_init(&self, setup: TournamentSetup) -> Result<bool, ErrorObjectOwned> {
        setup
            .validate()
            .map_err(|e| ErrorObjectOwned::owned(-32000, e.to_string(), None::<()>))?;

        let mut state = self.state.write();
        state.engine =
            TournamentState::with_rosters(setup.config, setup.players, setup.teams);
        state.store = InMemoryStore::default();
        info!(
            players = state.engine.players.len(),
            teams = state.engine.teams.len(),
            "Tournament initialized"
        );
        Ok(true)
    }

    async fn operator_select_lot(
        &self,
        params: SelectLotParams,
    ) -> Result<StateSnapshot, ErrorObjectOwned> {
        let snapshot = self.execute(
            "select_lot",
            AuctionCall::SelectLot {
                selector: params.selector(),
                pool: params.pool,
            },
        )?;
        info!(lot = ?snapshot.current.lot, "Lot selected");
        Ok(snapshot)
    }

    async fn operator_clear_lot(&self) -> Result<StateSnapshot, ErrorObjectOwned> {
        self.execute("clear_lot", AuctionCall::ClearLot)
    }

    async fn operator_raise_bid(
        &self,
        params: RaiseBidParams,
    ) -> Result<StateSnapshot, ErrorObjectOwned> {
        let snapshot = self.execute(
            "raise_bid",
            AuctionCall::RaiseBid {
                team: params.team,
                amount: params.amount,
            },
        )?;
        info!(
            team = params.team,
            bid = snapshot.current.current_bid,
            "Bid raised"
        );
        Ok(snapshot)
    }

    async fn operator_mark_sold(&self) -> Result<StateSnapshot, ErrorObjectOwned> {
        let snapshot = self.execute("mark_sold", AuctionCall::MarkSold)?;
        info!(
            lot = ?snapshot.current.lot,
            team = ?snapshot.current.leading_team,
            "Lot sold"
        );
        Ok(snapshot)
    }

    async fn operator_mark_unsold(&self) -> Result<StateSnapshot, ErrorObjectOwned> {
        let snapshot = self.execute("mark_unsold", AuctionCall::MarkUnsold)?;
        info!(lot = ?snapshot.current.lot, "Lot unsold");
        Ok(snapshot)
    }

    async fn operator_reopen(
        &self,
        params: ReopenParams,
    ) -> Result<StateSnapshot, ErrorObjectOwned> {
        let snapshot = self.execute(
            "reopen",
            AuctionCall::Reopen {
                player: params.player,
            },
        )?;
        info!(player = params.player, "Lot reopened");
        Ok(snapshot)
    }

    async fn operator_undo(&self) -> Result<StateSnapshot, ErrorObjectOwned> {
        self.execute("undo", AuctionCall::Undo)
    }

    async fn operator_reset(&self) -> Result<StateSnapshot, ErrorObjectOwned> {
        let snapshot = self.execute("reset", AuctionCall::Reset)?;
        warn!("Tournament reset");
        Ok(snapshot)
    }

    async fn operator_set_secret_bidding(
        &self,
        enabled: bool,
    ) -> Result<StateSnapshot, ErrorObjectOwned> {
        self.execute(
            "set_secret_bidding",
            AuctionCall::SetSecretBidding { enabled },
        )
    }

    async fn operator_reveal_secret_bids(&self) -> Result<StateSnapshot, ErrorObjectOwned> {
        let snapshot = self.execute("reveal_secret_bids", AuctionCall::RevealSecretBids)?;
        info!(team = ?snapshot.current.leading_team, "Secret bids revealed");
        Ok(snapshot)
    }

    async fn operator_set_message(&self, text: String) -> Result<bool, ErrorObjectOwned> {
        self.execute("set_message", AuctionCall::SetMessage { text })?;
        Ok(true)
    }

    async fn operator_clear_message(&self) -> Result<bool, ErrorObjectOwned> {
        self.execute("set_message", AuctionCall::ClearMessage)?;
        Ok(true)
    }

    async fn secret_submit_bid(
        &self,
        params: SecretBidParams,
    ) -> Result<SecretBidReceipt, ErrorObjectOwned> {
        let ctx = CallContext {
            timestamp: Self::now(),
        };
        let mut state = self.state.write();
        match handlers::handle_submit_secret_bid(
            &mut state.engine,
            &ctx,
            params.team,
            params.lot_serial,
            params.amount,
        ) {
            Ok(()) => Ok(SecretBidReceipt::accepted()),
            // Rejections are part of the submission contract, not RPC faults.
            Err(err) if err.kind() != ErrorKind::PartialFailure => {
                Ok(SecretBidReceipt::rejected(err.to_string()))
            }
            Err(err) => Err(rpc_error(err)),
        }
    }

    async fn query_get_state(&self) -> Result<StateSnapshot, ErrorObjectOwned> {
        Ok(self.state.read().engine.snapshot())
    }

    async fn query_get_current(&self) -> Result<CurrentAuctionState, ErrorObjectOwned> {
        Ok(self.state.read().engine.current.clone())
    }

    async fn query_list_players(&self) -> Result<Vec<Player>, ErrorObjectOwned> {
        Ok(self.state.read().engine.players.values().cloned().collect())
    }

    async fn query_list_teams(&self) -> Result<Vec<Team>, ErrorObjectOwned> {
        Ok(self.state.read().engine.teams.values().cloned().collect())
    }

    async fn query_get_team_pools(
        &self,
        team: TeamId,
    ) -> Result<Vec<(String, PoolState)>, ErrorObjectOwned> {
        let state = self.state.read();
        let Some(team) = state.engine.teams.get(&team) else {
            return Ok(Vec::new());
        };
        Ok(state
            .engine
            .config
            .pools
            .iter()
            .filter_map(|pool| {
                pool_state(&state.engine.config, team, &pool.name)
                    .map(|ps| (pool.name.clone(), ps))
            })
            .collect())
    }

    async fn query_get_eligible_teams(&self) -> Result<Vec<Eligibility>, ErrorObjectOwned> {
        Ok(eligible_teams(&self.state.read().engine))
    }

    async fn query_get_secret_bid_count(&self) -> Result<usize, ErrorObjectOwned> {
        let state = self.state.read();
        Ok(state
            .engine
            .current
            .lot_serial
            .map(|serial| state.engine.secret_bids.count_for(serial))
            .unwrap_or(0))
    }

    async fn query_get_undo_depth(&self) -> Result<usize, ErrorObjectOwned> {
        Ok(self.state.read().engine.undo.depth())
    }

    async fn subscribe_events(&self, pending: PendingSubscriptionSink) -> SubscriptionResult {
        let sink = pending.accept().await?;
        let mut rx = self.events.subscribe();

        tokio::spawn(async move {
            loop {
                match rx.recv().await {
                    Ok(event) => {
                        let msg = match SubscriptionMessage::from_json(&event) {
                            Ok(msg) => msg,
                            Err(err) => {
                                warn!(%err, "Failed to encode fanout event");
                                continue;
                            }
                        };
                        if sink.send(msg).await.is_err() {
                            // Subscriber went away.
                            break;
                        }
                    }
                    Err(broadcast::error::RecvError::Lagged(missed)) => {
                        // No retry on our side: the subscriber reconciles by
                        // polling query_getState.
                        warn!(missed, "Subscriber lagged behind the fanout");
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
        });

        Ok(())
    }
}

#[derive(Parser)]
#[command(name = "hammer-console")]
#[command(about = "Operator console server for a live player auction")]
struct Cli {
    /// Listen address for the JSON-RPC server.
    #[arg(long, default_value = "127.0.0.1:9210")]
    listen: SocketAddr,

    /// Tournament setup file (JSON: config, players, teams).
    #[arg(long)]
    setup: Option<std::path::PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("hammer_console=info".parse()?)
                .add_directive("jsonrpsee=warn".parse()?),
        )
        .init();

    let cli = Cli::parse();

    let engine = match &cli.setup {
        Some(path) => {
            let raw = std::fs::read_to_string(path)?;
            let setup: TournamentSetup = serde_json::from_str(&raw)?;
            setup.validate()?;
            info!(
                players = setup.players.len(),
                teams = setup.teams.len(),
                "Loaded tournament setup from {}",
                path.display()
            );
            TournamentState::with_rosters(setup.config, setup.players, setup.teams)
        }
        None => TournamentState::new(Default::default()),
    };

    info!("Starting auction console on {}", cli.listen);

    let server = Server::builder().build(cli.listen).await?;
    let handle = server.start(AuctionConsole::new(engine).into_rpc());

    info!("Auction console running. Press Ctrl+C to stop.");

    tokio::signal::ctrl_c().await?;

    info!("Shutting down...");
    handle.stop()?;
    handle.stopped().await;

    Ok(())
}
