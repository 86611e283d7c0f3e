//! Per-user queue store and lock registry.
//!
//! Each user id owns a FIFO of pending items and a busy flag. A queue entry
//! exists only while the user has work pending or in flight, and the lock
//! entry lives exactly as long as a drain runs.
//!
//! Both maps sit behind one mutex so that the drain decision is a single
//! critical section: [`UserQueues::enqueue_and_claim`] appends and tests the
//! lock together, and [`UserQueues::next_or_release`] pops or tears down
//! together. The guard is never held across an `.await`.

use std::collections::{HashMap, VecDeque};
use std::sync::{Mutex, MutexGuard, PoisonError};

use serde::Serialize;

use crate::error::Error;

/// Identifier of a conversation participant. Sole routing and isolation key.
pub type UserId = String;

/// What an enqueue decided about the user's drain.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Trigger {
    /// The queue was idle; the caller now holds the lock and must drain.
    Started,
    /// A drain is already running and will pick the item up.
    Deferred,
}

/// Drain state of a single user.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DrainState {
    Idle,
    Draining,
}

/// Point-in-time view of one active user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct QueueSnapshot {
    pub user: UserId,
    pub pending: usize,
    pub state: DrainState,
}

#[derive(Debug)]
struct Inner<T> {
    queues: HashMap<UserId, VecDeque<T>>,
    locks: HashMap<UserId, bool>,
}

/// Queue store plus lock registry, keyed by user id.
#[derive(Debug)]
pub struct UserQueues<T> {
    inner: Mutex<Inner<T>>,
}

impl<T> Default for UserQueues<T> {
    fn default() -> Self {
        Self {
            inner: Mutex::new(Inner {
                queues: HashMap::new(),
                locks: HashMap::new(),
            }),
        }
    }
}

impl<T> UserQueues<T> {
    pub fn new() -> Self {
        Self::default()
    }

    fn guard(&self) -> MutexGuard<'_, Inner<T>> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Append an item to the user's queue, creating the queue if absent.
    pub fn enqueue(&self, user: &str, item: T) {
        self.guard()
            .queues
            .entry(user.to_string())
            .or_default()
            .push_back(item);
    }

    pub fn is_locked(&self, user: &str) -> bool {
        self.guard().locks.get(user).copied().unwrap_or(false)
    }

    pub fn set_locked(&self, user: &str, locked: bool) {
        self.guard().locks.insert(user.to_string(), locked);
    }

    /// Remove and return the oldest pending item.
    pub fn dequeue_front(&self, user: &str) -> Option<T> {
        self.guard().queues.get_mut(user)?.pop_front()
    }

    pub fn delete_queue(&self, user: &str) {
        self.guard().queues.remove(user);
    }

    pub fn delete_lock(&self, user: &str) {
        self.guard().locks.remove(user);
    }

    /// Number of items waiting (not counting one being processed).
    pub fn len(&self, user: &str) -> usize {
        self.guard().queues.get(user).map_or(0, VecDeque::len)
    }

    /// True when no user has a queue or lock entry.
    pub fn is_empty(&self) -> bool {
        let inner = self.guard();
        inner.queues.is_empty() && inner.locks.is_empty()
    }

    pub fn drain_state(&self, user: &str) -> DrainState {
        if self.is_locked(user) {
            DrainState::Draining
        } else {
            DrainState::Idle
        }
    }

    /// Append and decide, in one critical section, whether the caller must start the drain.
    pub fn enqueue_and_claim(&self, user: &str, item: T) -> Trigger {
        let mut inner = self.guard();
        inner
            .queues
            .entry(user.to_string())
            .or_default()
            .push_back(item);

        let locked = inner.locks.entry(user.to_string()).or_insert(false);
        if *locked {
            Trigger::Deferred
        } else {
            *locked = true;
            Trigger::Started
        }
    }

    /// Pop the next item for a running drain, or release the user when nothing is left.
    ///
    /// Returns `Ok(None)` once the lock is released and both entries are
    /// deleted. Calling this without holding the user's lock is a
    /// [`Error::QueueState`] violation.
    pub fn next_or_release(&self, user: &str) -> Result<Option<T>, Error> {
        let mut inner = self.guard();

        if !inner.locks.get(user).copied().unwrap_or(false) {
            return Err(Error::QueueState(format!(
                "drain for user {} running without holding its lock",
                user
            )));
        }

        if let Some(item) = inner.queues.get_mut(user).and_then(VecDeque::pop_front) {
            return Ok(Some(item));
        }

        inner.locks.remove(user);
        inner.queues.remove(user);
        Ok(None)
    }

    /// Release a drain that stopped before emptying the queue.
    ///
    /// Returns how many items are still waiting; when none are, the queue
    /// entry is deleted along with the lock.
    pub fn abandon(&self, user: &str) -> usize {
        let mut inner = self.guard();
        inner.locks.remove(user);

        let remaining = inner.queues.get(user).map_or(0, VecDeque::len);
        if remaining == 0 {
            inner.queues.remove(user);
        }
        remaining
    }

    /// Claim an unlocked user that still has items waiting.
    ///
    /// Returns true when the caller now holds the lock and must drain.
    pub fn claim_pending(&self, user: &str) -> bool {
        let mut inner = self.guard();
        let has_items = inner.queues.get(user).is_some_and(|q| !q.is_empty());
        let locked = inner.locks.get(user).copied().unwrap_or(false);
        if !has_items || locked {
            return false;
        }
        inner.locks.insert(user.to_string(), true);
        true
    }

    /// Active users and their pending counts, sorted by user id.
    pub fn snapshot(&self) -> Vec<QueueSnapshot> {
        let inner = self.guard();
        let mut users: Vec<&UserId> = inner.queues.keys().chain(inner.locks.keys()).collect();
        users.sort();
        users.dedup();

        users
            .into_iter()
            .map(|user| QueueSnapshot {
                user: user.clone(),
                pending: inner.queues.get(user).map_or(0, VecDeque::len),
                state: if inner.locks.get(user).copied().unwrap_or(false) {
                    DrainState::Draining
                } else {
                    DrainState::Idle
                },
            })
            .collect()
    }
}
