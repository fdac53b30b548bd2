use std::time::Instant;

use super::TimerId;

/// Pending expiries, kept sorted by deadline.
#[derive(Debug, Default)]
pub(super) struct Queue {
    events: Vec<Event>,
}

#[derive(Debug, Clone, Copy)]
pub(super) struct Event {
    pub at: Instant,
    pub id: TimerId,
}

impl Queue {
    pub fn new() -> Self {
        Self { events: Vec::new() }
    }

    /// Schedules `id` at `at`, replacing an earlier schedule of the same
    /// timer. Returns the earliest deadline afterwards.
    pub fn add_and_next(&mut self, id: TimerId, at: Instant) -> Instant {
        self.remove(id);
        self.events.push(Event { at, id });
        self.events.sort_by(|a, b| a.at.cmp(&b.at));
        self.events[0].at
    }

    pub fn remove(&mut self, id: TimerId) -> bool {
        let before = self.events.len();
        self.events.retain(|e| e.id != id);
        before != self.events.len()
    }

    pub fn contains(&self, id: TimerId) -> bool {
        self.events.iter().any(|e| e.id == id)
    }

    pub fn next_deadline(&self) -> Option<Instant> {
        self.events.first().map(|e| e.at)
    }

    pub fn pop(&mut self, now: Instant) -> Option<TimerId> {
        match self.events.first() {
            Some(e) if e.at <= now => Some(self.events.remove(0).id),
            _ => None,
        }
    }
}
