//! Per-team, per-pool budget and slot accounting.
//!
//! The allocator answers one question: how much may this team still spend in
//! this pool right now? The answer reserves enough purse to satisfy the
//! minimum required purchases of every pool ordered after the current one,
//! so a team can never bid itself out of a later mandatory tier.

use serde::{Deserialize, Serialize};

use crate::config::TournamentConfig;
use hammer_types::Team;

/// Snapshot of a team's standing in one category pool.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PoolState {
    /// The team's spend cap for this pool.
    pub limit: u64,
    /// Spend accumulated from completed purchases tagged with this pool.
    pub spent: u64,
    /// Purchases completed in this pool.
    pub bought: u32,
    /// Cap headroom: `max(0, limit - spent)`.
    pub remaining: u64,
    /// The most the team may legally bid in this pool right now.
    pub max_bid: u64,
    /// Purchases the team may still make in this pool.
    pub max_players: u32,
}

/// Compute a team's standing in `pool_name`. `None` if the pool is unknown.
pub fn pool_state(config: &TournamentConfig, team: &Team, pool_name: &str) -> Option<PoolState> {
    let idx = config.pool_index(pool_name)?;
    let pool = &config.pools[idx];

    let spent = team.spent_in(pool_name);
    let bought = team.bought_in(pool_name);
    let remaining = pool.cap.saturating_sub(spent);

    // Purse that must stay untouched: unmet minimums of every later pool,
    // priced at that pool's tier base price.
    let reserve: u64 = config.pools[idx + 1..]
        .iter()
        .map(|later| {
            let unmet = later.min_count.saturating_sub(team.bought_in(&later.name)) as u64;
            unmet * later.base_price
        })
        .sum();

    let headroom = remaining.min(team.purse_remaining());
    let max_bid = headroom.saturating_sub(reserve);

    let squad_slots = config.squad_size.saturating_sub(team.bought);
    let pool_slots = pool
        .max_count
        .map_or(squad_slots, |max| max.saturating_sub(bought));
    let max_players = pool_slots.min(squad_slots);

    Some(PoolState {
        limit: pool.cap,
        spent,
        bought,
        remaining,
        max_bid,
        max_players,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use hammer_types::Pool;

    fn two_tier_config() -> TournamentConfig {
        TournamentConfig {
            squad_size: 10,
            pools: vec![
                Pool {
                    name: "A".into(),
                    cap: 4_000_000,
                    min_count: 3,
                    max_count: None,
                    base_price: 100_000,
                },
                Pool {
                    name: "B".into(),
                    cap: 3_000_000,
                    min_count: 3,
                    max_count: Some(5),
                    base_price: 100_000,
                },
            ],
            ..Default::default()
        }
    }

    #[test]
    fn satisfied_earlier_minimum_frees_the_purse() {
        let config = two_tier_config();
        let mut team = Team::new(1, "Strikers", 5_000_000);
        for _ in 0..3 {
            team.record_purchase(1_266_666, Some("A"));
        }
        // Round to exactly 3_800_000 spent.
        team.spent = 3_800_000;
        *team.pool_spent.get_mut("A").unwrap() = 3_800_000;

        let state = pool_state(&config, &team, "B").unwrap();
        // No pools after B, and pool A's minimum is met, so the whole
        // remaining purse of 1_200_000 is biddable.
        assert_eq!(state.max_bid, 1_200_000);
        assert_eq!(state.max_players, 5);
    }

    #[test]
    fn unmet_later_minimums_are_reserved() {
        let config = two_tier_config();
        let team = Team::new(1, "Strikers", 5_000_000);

        let state = pool_state(&config, &team, "A").unwrap();
        // Pool B still needs 3 purchases at 100_000 each.
        assert_eq!(state.remaining, 4_000_000);
        assert_eq!(state.max_bid, 4_000_000 - 300_000);
    }

    #[test]
    fn reserve_exceeding_headroom_means_ineligible() {
        let mut config = two_tier_config();
        config.pools[1].base_price = 2_000_000; // 3 x 2M reserve for B
        let team = Team::new(1, "Strikers", 5_000_000);

        let state = pool_state(&config, &team, "A").unwrap();
        assert_eq!(state.max_bid, 0);
    }

    #[test]
    fn purse_bounds_the_pool_cap() {
        let config = two_tier_config();
        let mut team = Team::new(1, "Strikers", 5_000_000);
        team.record_purchase(4_500_000, Some("A"));
        for _ in 0..2 {
            team.record_purchase(0, Some("A"));
        }

        let state = pool_state(&config, &team, "B").unwrap();
        // Pool B's cap has 3M headroom but only 500_000 purse is left.
        assert_eq!(state.max_bid, 500_000);
    }

    #[test]
    fn pool_max_count_and_squad_slots_both_bound_max_players() {
        let config = two_tier_config();
        let mut team = Team::new(1, "Strikers", 5_000_000);
        team.bought = 9;

        let state = pool_state(&config, &team, "B").unwrap();
        assert_eq!(state.max_players, 1);

        team.bought = 10;
        let state = pool_state(&config, &team, "B").unwrap();
        assert_eq!(state.max_players, 0);
    }

    #[test]
    fn unknown_pool_is_none() {
        let config = two_tier_config();
        let team = Team::new(1, "Strikers", 5_000_000);
        assert!(pool_state(&config, &team, "Z").is_none());
    }
}
