//! Stepped bid increment resolution.
//!
//! Pure functions over the configured increment table. A malformed table
//! never blocks bid entry: when no range matches, the table's fallback step
//! applies.

use hammer_types::IncrementTable;

/// Increment for the first range containing `amount`, half-open on the top
/// end with the last range's `max` treated as infinity.
pub fn next_increment(table: &IncrementTable, amount: u64) -> u64 {
    for range in &table.ranges {
        let below_max = range.max.map_or(true, |max| amount < max);
        if amount >= range.min && below_max {
            return range.step;
        }
    }
    table.fallback
}

/// The next legal bid after `current_bid`.
///
/// An opening bid (current bid of zero) is the lot's base price, not base
/// plus increment.
pub fn next_bid(table: &IncrementTable, current_bid: u64, base_price: u64) -> u64 {
    if current_bid == 0 {
        base_price
    } else {
        current_bid + next_increment(table, current_bid)
    }
}
