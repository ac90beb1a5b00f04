//! Arrival-order gating for concurrent dispatch workers.
//!
//! Dispatch runs as a pipeline of stages: stage `0` is entry into the
//! dispatcher and stage `1 + i` is the call into handler `i`. A worker may
//! enter a stage only after every earlier message has entered or skipped it,
//! so each handler observes messages in the order they were read while a
//! slow handler never blocks earlier stages of later messages.

use std::collections::BTreeSet;
use std::sync::{Arc, Condvar, Mutex, PoisonError};

#[derive(Debug, Default)]
struct Stage {
    next: u64,
    skipped: BTreeSet<u64>,
}

impl Stage {
    fn advance(&mut self) {
        self.next += 1;
        while self.skipped.remove(&self.next) {
            self.next += 1;
        }
    }
}

/// Shared per-stage counters naming the next sequence allowed in.
#[derive(Debug)]
pub(crate) struct Turnstile {
    stages: Mutex<Vec<Stage>>,
    advanced: Condvar,
}

impl Turnstile {
    /// Creates a turnstile with `stages` stages, all expecting sequence `0`.
    pub(crate) fn new(stages: usize) -> Arc<Self> {
        Arc::new(Self {
            stages: Mutex::new((0..stages.max(1)).map(|_| Stage::default()).collect()),
            advanced: Condvar::new(),
        })
    }

    /// Issues the ticket for the message with arrival number `sequence`.
    ///
    /// Sequences must be issued densely from `0`; a number that never gets a
    /// ticket stalls every later one.
    pub(crate) fn ticket(self: &Arc<Self>, sequence: u64) -> Ticket {
        Ticket {
            turnstile: Arc::clone(self),
            sequence,
            next_stage: 0,
        }
    }

    fn stage_count(&self) -> usize {
        self.stages.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    fn pass(&self, stage: usize, sequence: u64) {
        let mut stages = self.stages.lock().unwrap_or_else(PoisonError::into_inner);
        loop {
            match stages.get_mut(stage) {
                Some(slot) if slot.next == sequence => {
                    slot.advance();
                    break;
                }
                Some(_) => {
                    stages = self
                        .advanced
                        .wait(stages)
                        .unwrap_or_else(PoisonError::into_inner);
                }
                None => return,
            }
        }
        drop(stages);
        self.advanced.notify_all();
    }

    fn skip(&self, stage: usize, sequence: u64) {
        let mut stages = self.stages.lock().unwrap_or_else(PoisonError::into_inner);
        let Some(slot) = stages.get_mut(stage) else {
            return;
        };
        if slot.next == sequence {
            slot.advance();
        } else {
            slot.skipped.insert(sequence);
        }
        drop(stages);
        self.advanced.notify_all();
    }
}

/// One message's passage through the turnstile.
///
/// Dropping the ticket skips every stage it has not entered yet, so a
/// message that stops early or panics never stalls the ones behind it.
#[derive(Debug)]
pub(crate) struct Ticket {
    turnstile: Arc<Turnstile>,
    sequence: u64,
    next_stage: usize,
}

impl Ticket {
    /// Blocks until every earlier message has entered or skipped `stage`,
    /// then enters it.
    ///
    /// Stages this ticket jumps over are passed in order.
    pub(crate) fn enter(&mut self, stage: usize) {
        while self.next_stage <= stage {
            self.turnstile.pass(self.next_stage, self.sequence);
            self.next_stage += 1;
        }
    }

    /// Skips every stage not yet entered without waiting.
    pub(crate) fn release(&mut self) {
        let count = self.turnstile.stage_count();
        while self.next_stage < count {
            self.turnstile.skip(self.next_stage, self.sequence);
            self.next_stage += 1;
        }
    }
}

impl Drop for Ticket {
    fn drop(&mut self) {
        self.release();
    }
}

#[cfg(test)]
mod tests {
    use std::thread;
    use std::time::Duration;

    use super::*;

    #[test]
    fn later_tickets_wait_for_earlier_ones() {
        let turnstile = Turnstile::new(2);
        let order = Arc::new(Mutex::new(Vec::new()));

        let mut late = turnstile.ticket(1);
        let late_order = Arc::clone(&order);
        let waiter = thread::spawn(move || {
            late.enter(0);
            late_order.lock().expect("order lock").push(1);
        });

        thread::sleep(Duration::from_millis(50));
        assert!(order.lock().expect("order lock").is_empty());
        let mut early = turnstile.ticket(0);
        order.lock().expect("order lock").push(0);
        early.enter(0);

        waiter.join().expect("waiter thread");
        assert_eq!(*order.lock().expect("order lock"), vec![0, 1]);
    }

    #[test]
    fn released_tickets_do_not_wait_for_their_predecessors() {
        let turnstile = Turnstile::new(3);
        let mut first = turnstile.ticket(0);
        first.enter(1);

        let mut second = turnstile.ticket(1);
        second.enter(0);
        second.release();

        let mut third = turnstile.ticket(2);
        third.enter(0);
        drop(first);
        third.enter(2);
    }

    #[test]
    fn dropping_a_ticket_releases_its_successors() {
        let turnstile = Turnstile::new(3);
        drop(turnstile.ticket(0));
        let mut next = turnstile.ticket(1);
        next.enter(2);
    }

    #[test]
    fn stages_beyond_the_last_are_ignored() {
        let turnstile = Turnstile::new(1);
        let mut ticket = turnstile.ticket(0);
        ticket.enter(5);
        drop(ticket);
        turnstile.ticket(1).enter(0);
    }
}
