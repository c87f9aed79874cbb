//! Per-command in-flight guard.
//!
//! The engine already processes commands serially under the state lock; this
//! guard additionally rejects a *duplicate* command of the same type that
//! arrives while one is still being processed, instead of queueing it behind
//! the lock. A double-clicked "mark sold" must fail, not run twice.

use std::collections::HashSet;

use parking_lot::Mutex;

use hammer_engine::AuctionError;

/// Tracks which command types are currently in flight.
#[derive(Debug, Default)]
pub struct CommandGate {
    in_flight: Mutex<HashSet<&'static str>>,
}

impl CommandGate {
    /// Claim `name`. Fails if a command of the same type is in flight; the
    /// returned pass releases the claim on drop.
    pub fn enter(&self, name: &'static str) -> Result<GatePass<'_>, AuctionError> {
        let mut in_flight = self.in_flight.lock();
        if !in_flight.insert(name) {
            return Err(AuctionError::CommandInFlight(name));
        }
        Ok(GatePass { gate: self, name })
    }
}

/// RAII claim on one command type.
pub struct GatePass<'a> {
    gate: &'a CommandGate,
    name: &'static str,
}

impl Drop for GatePass<'_> {
    fn drop(&mut self) {
        self.gate.in_flight.lock().remove(self.name);
    }
}
