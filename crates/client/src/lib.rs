//! Observer-side state handling for the auction console.
//!
//! The console broadcasts full-state events and also answers polling reads.
//! Either way an observer may see the same state twice (an event followed by
//! a poll of the state it described, or overlapping reconnect reads), so
//! applying a snapshot must be idempotent. [`StateObserver`] keys every
//! snapshot on the canonical version counter and applies it only when the
//! version moved.

use hammer_types::StateSnapshot;

/// Deduplicating holder of the last applied snapshot.
#[derive(Debug, Default)]
pub struct StateObserver {
    last_version: Option<u64>,
    snapshot: Option<StateSnapshot>,
}

impl StateObserver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Apply `snapshot` if its version differs from the last applied one.
    /// Returns the applied snapshot, or `None` when it was a duplicate.
    pub fn observe(&mut self, snapshot: StateSnapshot) -> Option<&StateSnapshot> {
        let version = snapshot.version();
        if self.last_version == Some(version) {
            return None;
        }
        self.last_version = Some(version);
        self.snapshot = Some(snapshot);
        self.snapshot.as_ref()
    }

    /// The most recently applied snapshot, if any.
    pub fn current(&self) -> Option<&StateSnapshot> {
        self.snapshot.as_ref()
    }
}

/// One-line summary of a snapshot for terminal display.
pub fn render_summary(snapshot: &StateSnapshot) -> String {
    let mut line = format!(
        "v{} {:?}",
        snapshot.version(),
        snapshot.current.phase
    );
    if let Some(lot) = &snapshot.lot {
        line.push_str(&format!(" lot={} ({})", lot.name, lot.serial));
    }
    if snapshot.current.current_bid > 0 {
        line.push_str(&format!(" bid={}", snapshot.current.current_bid));
    }
    if let Some(team) = snapshot.current.leading_team {
        line.push_str(&format!(" leader={team}"));
    }
    if snapshot.current.secret_bidding {
        line.push_str(" [sealed]");
    }
    if let Some(message) = &snapshot.message {
        line.push_str(&format!(" msg={message:?}"));
    }
    line
}

#[cfg(test)]
mod tests {
    use super::*;
    use hammer_types::{CurrentAuctionState, LotPhase};

    fn snapshot_at(version: u64) -> StateSnapshot {
        let mut current = CurrentAuctionState::idle();
        current.version = version;
        StateSnapshot {
            current,
            lot: None,
            teams: vec![],
            message: None,
        }
    }

    #[test]
    fn duplicate_versions_are_not_reapplied() {
        let mut observer = StateObserver::new();
        assert!(observer.observe(snapshot_at(3)).is_some());
        assert!(observer.observe(snapshot_at(3)).is_none());
        assert!(observer.observe(snapshot_at(4)).is_some());
        assert_eq!(observer.current().map(StateSnapshot::version), Some(4));
    }

    #[test]
    fn version_moving_backwards_still_applies() {
        // A console restart can legitimately rewind the counter; the
        // observer follows whatever the console says is current.
        let mut observer = StateObserver::new();
        observer.observe(snapshot_at(10));
        assert!(observer.observe(snapshot_at(2)).is_some());
    }

    #[test]
    fn summary_renders_the_idle_phase() {
        let snapshot = snapshot_at(0);
        let line = render_summary(&snapshot);
        assert!(line.contains("v0"));
        assert!(line.contains(&format!("{:?}", LotPhase::Idle)));
    }
}
