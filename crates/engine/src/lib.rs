//! Live auction bidding engine.
//!
//! This crate owns the canonical record of a running player auction: the
//! current lot, the current bid and leading team, sold/unsold outcomes, and
//! every team's purse and pool counters. It enforces bid legality under a
//! multi-tier pool allocation scheme and emits full-state events for fanout.
//!
//! # Architecture
//!
//! - `call`: message types for operator commands
//! - `handlers`: business logic for each command
//! - `queries`: read-only state access for polling observers
//! - `state`: the tournament state owned by exactly one operator console
//! - `config`: tournament configuration and validation
//! - `increments`: stepped bid increment resolution
//! - `allocator`: per-team, per-pool budget and slot accounting
//! - `eligibility`: bid legality checks composing the two above
//! - `undo`: the single-step LIFO undo ledger
//! - `secret`: the sealed-bid collector
//! - `store`: the replace-semantics persistence boundary
//! - `error`: error taxonomy
//!
//! # Example
//!
//! ```
//! use hammer_engine::{config::TournamentConfig, handlers, state::TournamentState};
//! use hammer_engine::{call::LotSelector, store::InMemoryStore};
//! use hammer_types::{Player, Team};
//!
//! let config = TournamentConfig::default();
//! let mut state = TournamentState::with_rosters(
//!     config,
//!     vec![Player::new(1, "A. Kumar", 1, 50_000)],
//!     vec![Team::new(1, "Strikers", 5_000_000)],
//! );
//! let mut store = InMemoryStore::default();
//!
//! handlers::handle_select_lot(
//!     &mut state,
//!     &mut store,
//!     LotSelector::BySerial(1),
//!     None,
//!     &mut rand::thread_rng(),
//! )
//! .unwrap();
//! handlers::handle_raise_bid(&mut state, &mut store, 1, None).unwrap();
//! handlers::handle_mark_sold(&mut state, &mut store).unwrap();
//! ```

pub mod allocator;
pub mod call;
pub mod config;
pub mod eligibility;
pub mod error;
pub mod handlers;
pub mod increments;
pub mod queries;
pub mod secret;
pub mod state;
pub mod store;
pub mod undo;

pub use call::{AuctionCall, LotSelector};
pub use config::{ConfigValidationError, TournamentConfig};
pub use error::{AuctionError, ErrorKind};
pub use handlers::{CallContext, HandlerResult};
pub use queries::{AuctionQuery, AuctionQueryResponse};
pub use state::TournamentState;
pub use store::{InMemoryStore, StateStore, StoreError};
