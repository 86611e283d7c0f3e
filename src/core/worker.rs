//! Queue drain worker.
//!
//! A drain owns a user's lock from the moment it is claimed until
//! [`UserQueues::next_or_release`] finds the queue empty. Each item is
//! handed to the processor by value and its outcome recorded; a failed or
//! panicking item never stops the loop.

use std::any::Any;
use std::panic::AssertUnwindSafe;

use futures_util::FutureExt;

use crate::error::{Error, Result};

use super::processor::Processor;
use super::queue::{UserId, UserQueues};

/// Result of processing one item.
#[derive(Debug)]
pub struct ItemOutcome<O> {
    /// Zero-based position within this drain.
    pub position: usize,
    pub result: Result<O>,
}

/// Everything one drain run did.
#[derive(Debug)]
pub struct DrainReport<O> {
    pub user: UserId,
    pub outcomes: Vec<ItemOutcome<O>>,
}

impl<O> DrainReport<O> {
    fn new(user: &str) -> Self {
        Self {
            user: user.to_string(),
            outcomes: Vec::new(),
        }
    }

    pub fn processed(&self) -> usize {
        self.outcomes.len()
    }

    pub fn failed(&self) -> usize {
        self.outcomes.iter().filter(|o| o.result.is_err()).count()
    }

    pub fn succeeded(&self) -> usize {
        self.processed() - self.failed()
    }
}

/// Releases the user's lock when a drain is dropped before it finishes,
/// e.g. a cancelled caller or an aborted task.
struct DrainGuard<'a, T> {
    queues: &'a UserQueues<T>,
    user: &'a str,
    finished: bool,
}

impl<T> Drop for DrainGuard<'_, T> {
    fn drop(&mut self) {
        if self.finished {
            return;
        }
        let remaining = self.queues.abandon(self.user);
        tracing::warn!(user = %self.user, remaining, "drain dropped before finishing, lock released");
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    payload
        .downcast_ref::<&str>()
        .map(|s| s.to_string())
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "unknown panic".to_string())
}

/// Process the user's queue until it is empty, then release the user.
///
/// The caller must already hold the lock, normally by receiving
/// [`Trigger::Started`](super::queue::Trigger::Started) from
/// [`UserQueues::enqueue_and_claim`]. A panicking item is recorded as a
/// failed outcome. If the returned future is dropped early the lock is
/// released and any remaining items wait for [`UserQueues::claim_pending`].
pub async fn drain<T, P>(queues: &UserQueues<T>, processor: &P, user: &str) -> Result<DrainReport<P::Output>>
where
    T: Send,
    P: Processor<T> + ?Sized,
{
    tracing::debug!(user = %user, "drain started");

    let mut guard = DrainGuard {
        queues,
        user,
        finished: false,
    };
    let mut report = DrainReport::new(user);

    loop {
        let item = match queues.next_or_release(user) {
            Ok(Some(item)) => item,
            Ok(None) => break,
            Err(e) => {
                tracing::error!(user = %user, error = %e, "drain aborted");
                guard.finished = true;
                return Err(e);
            }
        };

        let position = report.outcomes.len();
        let result = match AssertUnwindSafe(processor.process(user, item)).catch_unwind().await {
            Ok(result) => result,
            Err(payload) => Err(Error::Other(format!(
                "message processing panicked: {}",
                panic_message(payload.as_ref())
            ))),
        };
        if let Err(e) = &result {
            tracing::warn!(user = %user, position, error = %e, "message processing failed");
        }
        report.outcomes.push(ItemOutcome { position, result });
    }

    guard.finished = true;
    tracing::debug!(
        user = %user,
        processed = report.processed(),
        failed = report.failed(),
        "drain finished"
    );
    Ok(report)
}
