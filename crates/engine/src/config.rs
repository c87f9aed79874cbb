//! Tournament configuration.
//!
//! This module defines the fixed rules a tournament runs under: total squad
//! size, the ordered category pools, and the bid increment table. The config
//! is loaded once at console startup and validated before any command runs.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use hammer_types::{IncrementTable, Pool};

/// Fixed rules for one tournament.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct TournamentConfig {
    /// Display name of the tournament.
    pub name: String,

    /// Total squad size per team; bought-count never exceeds this.
    pub squad_size: u32,

    /// Ordered category pools. Empty means non-tiered mode, where each team's
    /// precomputed `max_bid_allowed` and purse are the only budget checks.
    pub pools: Vec<Pool>,

    /// Stepped bid increment table.
    pub increments: IncrementTable,
}

impl Default for TournamentConfig {
    fn default() -> Self {
        Self {
            name: "tournament".to_string(),
            squad_size: 18,
            pools: Vec::new(),
            increments: IncrementTable::flat(10_000),
        }
    }
}

impl TournamentConfig {
    /// Whether pool-tier accounting applies.
    pub fn tiered(&self) -> bool {
        !self.pools.is_empty()
    }

    /// Look up a pool by name.
    pub fn pool(&self, name: &str) -> Option<&Pool> {
        self.pools.iter().find(|p| p.name == name)
    }

    /// Position of a pool in the tier priority order.
    pub fn pool_index(&self, name: &str) -> Option<usize> {
        self.pools.iter().position(|p| p.name == name)
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), ConfigValidationError> {
        if self.squad_size == 0 {
            return Err(ConfigValidationError::InvalidSquadSize);
        }

        self.validate_increments()?;
        self.validate_pools()?;

        Ok(())
    }

    fn validate_increments(&self) -> Result<(), ConfigValidationError> {
        let table = &self.increments;
        if table.fallback == 0 {
            return Err(ConfigValidationError::InvalidIncrements(
                "fallback increment cannot be zero".into(),
            ));
        }
        if table.ranges.is_empty() {
            return Err(ConfigValidationError::InvalidIncrements(
                "increment table has no ranges".into(),
            ));
        }

        let mut expected_min = 0u64;
        for (i, range) in table.ranges.iter().enumerate() {
            if range.step == 0 {
                return Err(ConfigValidationError::InvalidIncrements(format!(
                    "range {i} has a zero step"
                )));
            }
            if range.min != expected_min {
                return Err(ConfigValidationError::InvalidIncrements(format!(
                    "range {i} starts at {} but {} was expected (gap or overlap)",
                    range.min, expected_min
                )));
            }
            match range.max {
                Some(max) if max <= range.min => {
                    return Err(ConfigValidationError::InvalidIncrements(format!(
                        "range {i} is empty ({} >= {max})",
                        range.min
                    )));
                }
                Some(max) => expected_min = max,
                None => {
                    if i + 1 != table.ranges.len() {
                        return Err(ConfigValidationError::InvalidIncrements(format!(
                            "unbounded range {i} is not last"
                        )));
                    }
                    return Ok(());
                }
            }
        }

        // Every range was bounded, so the table does not cover [0, inf).
        Err(ConfigValidationError::InvalidIncrements(
            "last range must be unbounded".into(),
        ))
    }

    fn validate_pools(&self) -> Result<(), ConfigValidationError> {
        for (i, pool) in self.pools.iter().enumerate() {
            if self.pools[..i].iter().any(|p| p.name == pool.name) {
                return Err(ConfigValidationError::DuplicatePool(pool.name.clone()));
            }
            if pool.cap == 0 {
                return Err(ConfigValidationError::InvalidPool {
                    pool: pool.name.clone(),
                    reason: "cap cannot be zero".into(),
                });
            }
            if let Some(max) = pool.max_count {
                if max < pool.min_count {
                    return Err(ConfigValidationError::InvalidPool {
                        pool: pool.name.clone(),
                        reason: format!("max_count {max} below min_count {}", pool.min_count),
                    });
                }
            }
            if pool.min_count > 0 && pool.base_price == 0 {
                return Err(ConfigValidationError::InvalidPool {
                    pool: pool.name.clone(),
                    reason: "mandatory pool needs a base price to reserve against".into(),
                });
            }
        }

        let total_min: u32 = self.pools.iter().map(|p| p.min_count).sum();
        if total_min > self.squad_size {
            return Err(ConfigValidationError::MinimumsExceedSquad {
                total_min,
                squad_size: self.squad_size,
            });
        }

        Ok(())
    }
}

/// Errors that can occur during configuration validation.
#[derive(Debug, Clone, Error)]
pub enum ConfigValidationError {
    #[error("Squad size cannot be zero")]
    InvalidSquadSize,

    #[error("Invalid increment table: {0}")]
    InvalidIncrements(String),

    #[error("Duplicate pool name: {0}")]
    DuplicatePool(String),

    #[error("Invalid pool {pool}: {reason}")]
    InvalidPool { pool: String, reason: String },

    #[error("Pool minimums ({total_min}) exceed the squad size ({squad_size})")]
    MinimumsExceedSquad { total_min: u32, squad_size: u32 },
}
