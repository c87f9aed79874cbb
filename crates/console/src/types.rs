//! RPC parameter and response types for the operator console.
//!
//! Thin JSON shapes over the engine types; everything the engine exposes is
//! already serde-serializable, so only command parameters and the sealed-bid
//! receipt need dedicated structs.

use serde::{Deserialize, Serialize};

use hammer_engine::call::LotSelector;
use hammer_engine::{ConfigValidationError, TournamentConfig};
use hammer_types::{Player, PlayerId, Team, TeamId};

/// Tournament setup: rules plus rosters, loaded once at init.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TournamentSetup {
    pub config: TournamentConfig,
    pub players: Vec<Player>,
    pub teams: Vec<Team>,
}

impl TournamentSetup {
    pub fn validate(&self) -> Result<(), ConfigValidationError> {
        self.config.validate()
    }
}

/// Parameters for putting a lot on the block.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SelectLotParams {
    /// Pick this serial; `None` picks randomly.
    pub serial: Option<u32>,
    /// Pick among lots carried over unsold from earlier pools.
    #[serde(default)]
    pub carry_over: bool,
    /// Switch the active pool; `None` keeps the current one.
    pub pool: Option<String>,
}

impl SelectLotParams {
    pub fn selector(&self) -> LotSelector {
        match (self.serial, self.carry_over) {
            (Some(serial), _) => LotSelector::BySerial(serial),
            (None, true) => LotSelector::CarryOver,
            (None, false) => LotSelector::Random,
        }
    }
}

/// Parameters for raising the bid.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RaiseBidParams {
    pub team: TeamId,
    /// Manual amount overriding increment stepping; budget checks still run.
    pub amount: Option<u64>,
}

/// Parameters for reopening a terminal lot.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReopenParams {
    pub player: PlayerId,
}

/// Parameters for a sealed-bid submission.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SecretBidParams {
    pub team: TeamId,
    pub lot_serial: u32,
    pub amount: u64,
}

/// Accept/reject outcome of a sealed-bid submission.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SecretBidReceipt {
    pub accepted: bool,
    pub reason: Option<String>,
}

impl SecretBidReceipt {
    pub fn accepted() -> Self {
        Self {
            accepted: true,
            reason: None,
        }
    }

    pub fn rejected(reason: impl Into<String>) -> Self {
        Self {
            accepted: false,
            reason: Some(reason.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn selector_prefers_an_explicit_serial() {
        let params = SelectLotParams {
            serial: Some(4),
            carry_over: true,
            pool: None,
        };
        assert_eq!(params.selector(), LotSelector::BySerial(4));
    }

    #[test]
    fn selector_without_serial_honors_carry_over() {
        let params = SelectLotParams {
            serial: None,
            carry_over: true,
            pool: Some("B".into()),
        };
        assert_eq!(params.selector(), LotSelector::CarryOver);
    }
}
