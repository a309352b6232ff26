use std::sync::{Condvar, Mutex, MutexGuard, PoisonError};

#[derive(Debug, Default)]
struct Tickets {
    next: u64,
    serving: u64,
}

/// Mutual exclusion that admits waiters strictly in arrival order.
#[derive(Debug, Default)]
pub(crate) struct TicketGate {
    tickets: Mutex<Tickets>,
    turn: Condvar,
}

/// Held while it is the owner's turn; dropping it admits the next waiter.
#[derive(Debug)]
pub(crate) struct Turn<'a> {
    gate: &'a TicketGate,
}

impl TicketGate {
    fn lock(&self) -> MutexGuard<'_, Tickets> {
        self.tickets.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Block until every earlier caller has finished.
    pub(crate) fn enter(&self) -> Turn<'_> {
        let mut tickets = self.lock();
        let ticket = tickets.next;
        tickets.next += 1;
        while tickets.serving != ticket {
            tickets = self
                .turn
                .wait(tickets)
                .unwrap_or_else(PoisonError::into_inner);
        }
        Turn { gate: self }
    }

    /// Callers holding or waiting for a turn.
    pub(crate) fn occupancy(&self) -> u64 {
        let tickets = self.lock();
        tickets.next - tickets.serving
    }
}

impl Drop for Turn<'_> {
    fn drop(&mut self) {
        let mut tickets = self.gate.lock();
        tickets.serving += 1;
        drop(tickets);
        self.gate.turn.notify_all();
    }
}
