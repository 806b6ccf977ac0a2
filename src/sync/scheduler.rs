// Scheduler - Deferred work for the session loop
//
// Delayed actions (the pause before asking a newcomer for a snapshot, the
// victory reveal) are queued here instead of sleeping on the loop. The
// runtime sleeps until `next_deadline` and then calls `pop_due`.

use crate::sync::handler::SessionEvent;
use crate::sync::peer::PeerAddress;
use crate::sync::protocol::Envelope;
use chrono::{DateTime, Utc};
use std::collections::{BTreeMap, HashMap};

/// Handle for a scheduled task, used to cancel it
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TaskId(u64);

/// Work that runs when a task comes due
#[derive(Clone, Debug, PartialEq)]
pub enum Deferred {
    /// Queue an envelope for a peer
    Send { to: PeerAddress, envelope: Envelope },
    /// Raise a local event
    Emit(SessionEvent),
}

/// Time-ordered queue of cancellable tasks
#[derive(Debug, Default)]
pub struct Scheduler {
    next_id: u64,
    queue: BTreeMap<(DateTime<Utc>, TaskId), Deferred>,
    due_at: HashMap<TaskId, DateTime<Utc>>,
}

impl Scheduler {
    /// Create an empty scheduler
    pub fn new() -> Self {
        Self::default()
    }

    /// Schedule `work` to run at `due`
    pub fn schedule(&mut self, due: DateTime<Utc>, work: Deferred) -> TaskId {
        let id = TaskId(self.next_id);
        self.next_id += 1;
        self.queue.insert((due, id), work);
        self.due_at.insert(id, due);
        id
    }

    /// Cancel a task; returns false if it already ran or never existed
    pub fn cancel(&mut self, id: TaskId) -> bool {
        match self.due_at.remove(&id) {
            Some(due) => self.queue.remove(&(due, id)).is_some(),
            None => false,
        }
    }

    /// Drop every pending task
    pub fn cancel_all(&mut self) -> usize {
        let count = self.queue.len();
        self.queue.clear();
        self.due_at.clear();
        count
    }

    /// Earliest pending due time
    pub fn next_deadline(&self) -> Option<DateTime<Utc>> {
        self.queue.first_key_value().map(|((due, _), _)| *due)
    }

    /// Remove and return every task due at or before `now`, in due order
    pub fn pop_due(&mut self, now: DateTime<Utc>) -> Vec<Deferred> {
        let mut ready = Vec::new();
        while let Some(entry) = self.queue.first_entry() {
            let (due, id) = *entry.key();
            if due > now {
                break;
            }
            ready.push(entry.remove());
            self.due_at.remove(&id);
        }
        ready
    }

    /// Number of pending tasks
    pub fn len(&self) -> usize {
        self.queue.len()
    }

    /// Check if nothing is pending
    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    /// Check if a task has neither run nor been cancelled
    pub fn is_pending(&self, id: TaskId) -> bool {
        self.due_at.contains_key(&id)
    }
}
