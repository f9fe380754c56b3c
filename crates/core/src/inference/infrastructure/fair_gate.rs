use std::sync::{Condvar, Mutex, PoisonError};

/// First-come-first-served admission to a shared model.
///
/// Callers take a ticket and wait until it is served, so a steady stream
/// of camera frames cannot starve a request-path image analysis.
#[derive(Debug, Default)]
pub struct FairGate {
    tickets: Mutex<Tickets>,
    turn: Condvar,
}

#[derive(Debug, Default)]
struct Tickets {
    next: u64,
    serving: u64,
}

/// Held while the caller owns the model. Dropping it admits the next ticket.
pub struct GateTurn<'a> {
    gate: &'a FairGate,
}

impl FairGate {
    pub fn new() -> Self {
        Self::default()
    }

    /// Blocks until every earlier caller has finished.
    pub fn enter(&self) -> GateTurn<'_> {
        let mut tickets = self.tickets.lock().unwrap_or_else(PoisonError::into_inner);
        let ticket = tickets.next;
        tickets.next += 1;
        while tickets.serving != ticket {
            tickets = self
                .turn
                .wait(tickets)
                .unwrap_or_else(PoisonError::into_inner);
        }
        GateTurn { gate: self }
    }

    /// Callers currently queued or running.
    pub fn pending(&self) -> u64 {
        let tickets = self.tickets.lock().unwrap_or_else(PoisonError::into_inner);
        tickets.next - tickets.serving
    }
}

impl Drop for GateTurn<'_> {
    fn drop(&mut self) {
        let mut tickets = self
            .gate
            .tickets
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        tickets.serving += 1;
        drop(tickets);
        self.gate.turn.notify_all();
    }
}
