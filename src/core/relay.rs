//! Enqueue entry point.
//!
//! Every inbound item goes through [`Relay::submit`]. The call that finds a
//! user idle claims the user's lock and spawns a task that drains the user's
//! queue; calls that find a drain running just append. The task ends when the
//! queue is empty, so there is at most one live task per active user and
//! none for idle users. A drain cut short hands its leftovers to a new task.

use std::future::Future;
use std::sync::Arc;

use tokio::task::JoinHandle;

use crate::error::Result;

use super::processor::Processor;
use super::queue::{QueueSnapshot, Trigger, UserId, UserQueues};
use super::worker::{drain, DrainReport};

/// Outcome of a submission.
#[derive(Debug)]
pub enum Submission<O> {
    /// This call started the user's drain.
    Started(JoinHandle<Result<DrainReport<O>>>),
    /// A drain was already running and will process the item.
    Deferred,
}

impl<O> Submission<O> {
    pub fn trigger(&self) -> Trigger {
        match self {
            Submission::Started(_) => Trigger::Started,
            Submission::Deferred => Trigger::Deferred,
        }
    }
}

/// Per-user serializing relay in front of a processor.
pub struct Relay<T, P: ?Sized> {
    queues: Arc<UserQueues<T>>,
    processor: Arc<P>,
}

impl<T, P: ?Sized> Clone for Relay<T, P> {
    fn clone(&self) -> Self {
        Self {
            queues: Arc::clone(&self.queues),
            processor: Arc::clone(&self.processor),
        }
    }
}

impl<T, P> Relay<T, P>
where
    T: Send + 'static,
    P: Processor<T> + ?Sized + 'static,
    P::Output: 'static,
{
    pub fn new(processor: Arc<P>) -> Self {
        Self {
            queues: Arc::new(UserQueues::new()),
            processor,
        }
    }

    pub fn queues(&self) -> &Arc<UserQueues<T>> {
        &self.queues
    }

    /// Queue an item and make sure a drain is running for its user.
    ///
    /// Must be called from within a tokio runtime.
    pub fn submit(&self, user: &str, item: T) -> Submission<P::Output> {
        match self.queues.enqueue_and_claim(user, item) {
            Trigger::Deferred => {
                tracing::debug!(user = %user, pending = self.queues.len(user), "drain already running");
                Submission::Deferred
            }
            Trigger::Started => Submission::Started(tokio::spawn(self.drain_task(user, false))),
        }
    }

    /// Queue an item; if this call claims the user, drain in place before returning.
    ///
    /// Returns `None` when the item was handed to an already running drain.
    /// Dropping the returned future mid-drain hands the rest of the queue to
    /// a spawned drain.
    pub async fn submit_inline(&self, user: &str, item: T) -> Option<Result<DrainReport<P::Output>>> {
        match self.queues.enqueue_and_claim(user, item) {
            Trigger::Deferred => None,
            Trigger::Started => {
                let mut owner = DrainOwner::new(self.clone(), user, false);
                let report = owner.run().await;
                Some(report)
            }
        }
    }

    /// Users with queued or in-flight work.
    pub fn snapshot(&self) -> Vec<QueueSnapshot> {
        self.queues.snapshot()
    }

    /// Drain future for a user whose lock the caller already holds.
    fn drain_task(
        &self,
        user: &str,
        resumed: bool,
    ) -> impl Future<Output = Result<DrainReport<P::Output>>> + Send + 'static {
        let owner = DrainOwner::new(self.clone(), user, resumed);
        async move {
            let mut owner = owner;
            let report = owner.run().await;
            report
        }
    }
}

/// Holds a claimed user for one drain run.
///
/// If the run is dropped before it finishes (an aborted task, a cancelled
/// `submit_inline`, or a task never polled) the lock is released and any
/// remaining items are claimed again for a freshly spawned drain.
struct DrainOwner<T, P>
where
    T: Send + 'static,
    P: Processor<T> + ?Sized + 'static,
    P::Output: 'static,
{
    relay: Relay<T, P>,
    user: UserId,
    started: bool,
    finished: bool,
    resumed: bool,
}

impl<T, P> DrainOwner<T, P>
where
    T: Send + 'static,
    P: Processor<T> + ?Sized + 'static,
    P::Output: 'static,
{
    fn new(relay: Relay<T, P>, user: &str, resumed: bool) -> Self {
        Self {
            relay,
            user: user.to_string(),
            started: false,
            finished: false,
            resumed,
        }
    }

    async fn run(&mut self) -> Result<DrainReport<P::Output>> {
        self.started = true;
        let report = drain(&*self.relay.queues, &*self.relay.processor, &self.user).await;
        self.finished = true;
        report
    }
}

impl<T, P> Drop for DrainOwner<T, P>
where
    T: Send + 'static,
    P: Processor<T> + ?Sized + 'static,
    P::Output: 'static,
{
    fn drop(&mut self) {
        if self.finished {
            return;
        }

        let queues = &self.relay.queues;
        if !self.started {
            // Claimed but never polled, so the lock is still ours.
            let remaining = queues.abandon(&self.user);
            if self.resumed {
                tracing::warn!(user = %self.user, remaining, "resumed drain dropped before starting");
                return;
            }
        }

        if !queues.claim_pending(&self.user) {
            return;
        }

        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                tracing::info!(user = %self.user, pending = queues.len(&self.user), "restarting drain for remaining items");
                handle.spawn(self.relay.drain_task(&self.user, true));
            }
            Err(_) => {
                let remaining = queues.abandon(&self.user);
                tracing::warn!(user = %self.user, remaining, "no runtime to restart drain");
            }
        }
    }
}
