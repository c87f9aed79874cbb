//! Sealed-bid collection.
//!
//! While a lot is flagged for secret bidding, teams submit blind amounts
//! through a non-broadcast channel. Submissions are held here until the
//! operator reveals them; a changed lot serial invalidates anything still
//! in flight.
//!
//! Tie-break on reveal is deterministic and documented: highest amount
//! first, then earliest submission, then lowest team id.

use std::cmp::Ordering;

use hammer_types::SecretBid;

/// Holds sealed submissions for the current lot.
#[derive(Debug, Default)]
pub struct SecretBidBook {
    bids: Vec<SecretBid>,
}

impl SecretBidBook {
    /// Record a submission. A team resubmitting for the same lot replaces
    /// its earlier bid, and the replacement's timestamp is what counts for
    /// the tie-break.
    pub fn submit(&mut self, bid: SecretBid) {
        self.bids
            .retain(|b| !(b.team == bid.team && b.lot_serial == bid.lot_serial));
        self.bids.push(bid);
    }

    /// Submissions targeting `serial`, best first.
    pub fn ranked(&self, serial: u32) -> Vec<SecretBid> {
        let mut bids: Vec<SecretBid> = self
            .bids
            .iter()
            .filter(|b| b.lot_serial == serial)
            .cloned()
            .collect();
        bids.sort_by(|a, b| match b.amount.cmp(&a.amount) {
            Ordering::Equal => match a.submitted_at.cmp(&b.submitted_at) {
                Ordering::Equal => a.team.cmp(&b.team),
                other => other,
            },
            other => other,
        });
        bids
    }

    /// Number of submissions targeting `serial`.
    pub fn count_for(&self, serial: u32) -> usize {
        self.bids.iter().filter(|b| b.lot_serial == serial).count()
    }

    /// Discard everything (reveal finished, lot changed, or reset).
    pub fn clear(&mut self) {
        self.bids.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bid(team: u64, amount: u64, at: u64) -> SecretBid {
        SecretBid {
            team,
            lot_serial: 7,
            amount,
            submitted_at: at,
        }
    }

    #[test]
    fn ranked_sorts_by_amount_then_time_then_team() {
        let mut book = SecretBidBook::default();
        book.submit(bid(3, 500, 10));
        book.submit(bid(1, 700, 30));
        book.submit(bid(2, 700, 20));

        let ranked = book.ranked(7);
        assert_eq!(
            ranked.iter().map(|b| b.team).collect::<Vec<_>>(),
            vec![2, 1, 3]
        );
    }

    #[test]
    fn equal_amount_and_time_breaks_on_team_id() {
        let mut book = SecretBidBook::default();
        book.submit(bid(9, 700, 20));
        book.submit(bid(4, 700, 20));

        let ranked = book.ranked(7);
        assert_eq!(ranked[0].team, 4);
    }

    #[test]
    fn resubmission_replaces_the_earlier_bid() {
        let mut book = SecretBidBook::default();
        book.submit(bid(1, 500, 10));
        book.submit(bid(1, 800, 40));

        assert_eq!(book.count_for(7), 1);
        assert_eq!(book.ranked(7)[0].amount, 800);
        assert_eq!(book.ranked(7)[0].submitted_at, 40);
    }

    #[test]
    fn ranked_ignores_other_serials() {
        let mut book = SecretBidBook::default();
        book.submit(bid(1, 500, 10));
        book.submit(SecretBid {
            team: 2,
            lot_serial: 8,
            amount: 900,
            submitted_at: 5,
        });

        assert_eq!(book.ranked(7).len(), 1);
        assert_eq!(book.count_for(8), 1);
    }
}
