//! Per-user conversation state for RelayBot.
//!
//! The relay passes a [`ConversationHandle`] through to the responder
//! untouched. Only the responder reads or writes the history inside it.
//! Nothing here is persisted.

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use crate::providers::ChatMessage;

use super::queue::UserId;

/// Conversation history for one user.
#[derive(Debug)]
struct Conversation {
    history: VecDeque<ChatMessage>,
    updated_at: i64,
}

impl Conversation {
    fn new() -> Self {
        Self {
            history: VecDeque::new(),
            updated_at: now_timestamp(),
        }
    }
}

/// Get current timestamp in milliseconds.
fn now_timestamp() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Shared handle to one user's conversation.
#[derive(Clone, Debug)]
pub struct ConversationHandle {
    user: UserId,
    inner: Arc<Mutex<Conversation>>,
}

impl ConversationHandle {
    /// A handle not registered in any store.
    pub fn detached(user: impl Into<UserId>) -> Self {
        Self {
            user: user.into(),
            inner: Arc::new(Mutex::new(Conversation::new())),
        }
    }

    pub fn user(&self) -> &str {
        &self.user
    }

    /// Snapshot of the history, oldest first.
    pub fn history(&self) -> Vec<ChatMessage> {
        lock(&self.inner).history.iter().cloned().collect()
    }

    /// Number of stored messages.
    pub fn len(&self) -> usize {
        lock(&self.inner).history.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Append a prompt and its answer, keeping at most `max_history` messages.
    pub fn record_exchange(&self, prompt: &str, answer: &str, max_history: usize) {
        let mut conv = lock(&self.inner);
        conv.history.push_back(ChatMessage::user(prompt));
        conv.history.push_back(ChatMessage::assistant(answer));
        while conv.history.len() > max_history {
            conv.history.pop_front();
        }
        conv.updated_at = now_timestamp();
    }

    /// Forget the history.
    pub fn clear(&self) {
        let mut conv = lock(&self.inner);
        conv.history.clear();
        conv.updated_at = now_timestamp();
    }

    fn idle_ms(&self) -> i64 {
        now_timestamp() - lock(&self.inner).updated_at
    }

    fn in_use(&self) -> bool {
        Arc::strong_count(&self.inner) > 1
    }
}

/// All conversations known to this process.
#[derive(Debug, Default)]
pub struct ConversationStore {
    conversations: Mutex<HashMap<UserId, ConversationHandle>>,
}

impl ConversationStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Get the user's conversation, creating it on first contact.
    pub fn handle_for(&self, user: &str) -> ConversationHandle {
        lock(&self.conversations)
            .entry(user.to_string())
            .or_insert_with(|| ConversationHandle::detached(user))
            .clone()
    }

    /// Clear a user's history. Returns false if the user had none.
    pub fn reset(&self, user: &str) -> bool {
        match lock(&self.conversations).get(user) {
            Some(handle) => {
                handle.clear();
                true
            }
            None => false,
        }
    }

    /// Evict conversations idle for longer than `max_age` that no queued item holds.
    pub fn cleanup_idle(&self, max_age: Duration) -> usize {
        let max_age_ms = max_age.as_millis() as i64;
        let mut conversations = lock(&self.conversations);
        let before = conversations.len();

        conversations.retain(|_user, handle| handle.in_use() || handle.idle_ms() <= max_age_ms);

        before - conversations.len()
    }

    pub fn len(&self) -> usize {
        lock(&self.conversations).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
