//! Inbound messages and the work items built from them.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::transport::{ReplySink, Transport};

use super::conversation::ConversationHandle;
use super::queue::UserId;

/// A message received from a channel.
#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct InboundMessage {
    /// Unique ID (ULID)
    pub id: String,

    /// Channel (e.g., "telegram", "console")
    pub channel: String,

    /// Sender, used as the queueing key
    pub user: UserId,

    /// Display name of the sender
    pub sender_name: Option<String>,

    /// Message content
    pub text: String,

    /// Message ID from channel (optional)
    pub message_id: Option<i64>,

    /// Unix timestamp in milliseconds
    pub received_at: i64,
}

impl InboundMessage {
    /// Create a new message with current timestamp.
    pub fn new(channel: &str, user: &str, text: &str) -> Self {
        Self {
            id: ulid::Ulid::new().to_string(),
            channel: channel.to_string(),
            user: user.to_string(),
            sender_name: None,
            text: text.to_string(),
            message_id: None,
            received_at: chrono::Utc::now().timestamp_millis(),
        }
    }
}

/// One queued unit of work: the message plus everything needed to answer it.
pub struct PendingItem {
    pub message: InboundMessage,
    pub reply: ReplySink,
    pub state: ConversationHandle,
    pub transport: Arc<dyn Transport>,
}

impl PendingItem {
    pub fn new(
        message: InboundMessage,
        transport: Arc<dyn Transport>,
        state: ConversationHandle,
    ) -> Self {
        let reply = ReplySink::new(Arc::clone(&transport), message.user.clone());
        Self {
            message,
            reply,
            state,
            transport,
        }
    }

    pub fn user(&self) -> &str {
        &self.message.user
    }
}

impl std::fmt::Debug for PendingItem {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PendingItem")
            .field("message", &self.message)
            .field("transport", &self.transport.name())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::ConsoleTransport;

    #[test]
    fn test_inbound_message() {
        let msg = InboundMessage::new("telegram", "12345", "Hello world");

        assert_eq!(msg.channel, "telegram");
        assert_eq!(msg.user, "12345");
        assert_eq!(msg.text, "Hello world");
        assert!(msg.received_at > 0);
        assert_eq!(msg.id.len(), 26);
    }

    #[test]
    fn test_pending_item_reply_bound_to_sender() {
        let msg = InboundMessage::new("console", "alice", "hi");
        let item = PendingItem::new(
            msg,
            Arc::new(ConsoleTransport::new()),
            ConversationHandle::detached("alice"),
        );

        assert_eq!(item.user(), "alice");
        assert_eq!(item.reply.user(), "alice");
        assert_eq!(item.state.user(), "alice");
    }
}
