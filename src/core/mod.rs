//! Core module - per-user queueing, draining and message processing.
//!
//! This module contains the heart of RelayBot's message handling:
//! - Per-user queue store and lock registry
//! - Drain worker and enqueue entry point
//! - Message processor (payment detection, AI answers)
//! - Conversation state

pub mod conversation;
pub mod message;
pub mod processor;
pub mod queue;
pub mod relay;
pub mod worker;

pub use conversation::{ConversationHandle, ConversationStore};
pub use message::{InboundMessage, PendingItem};
pub use processor::{format_reply, MessageProcessor, PaymentReply, Processor, Reply};
pub use queue::{DrainState, QueueSnapshot, Trigger, UserId, UserQueues};
pub use relay::{Relay, Submission};
pub use worker::{drain, DrainReport, ItemOutcome};

/// The relay as wired for real traffic.
pub type MessageRelay = Relay<PendingItem, MessageProcessor>;
