//! Runtime wiring: settings → responder, classifier, processor, relay.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tokio::task::JoinHandle;

use crate::assistant::{AssistantResponder, PaymentClassifier, Responder};
use crate::config::Settings;
use crate::core::{
    ConversationStore, DrainReport, InboundMessage, MessageProcessor, MessageRelay, PendingItem,
    QueueSnapshot, Relay, Reply, Submission,
};
use crate::error::Result;
use crate::transport::Transport;

/// How often idle conversations are swept.
const SWEEP_INTERVAL: Duration = Duration::from_secs(60);

/// The running relay plus the per-user state it hands to the processor.
#[derive(Clone)]
pub struct Runtime {
    relay: MessageRelay,
    conversations: Arc<ConversationStore>,
}

impl Runtime {
    pub fn new(processor: MessageProcessor) -> Self {
        Self {
            relay: Relay::new(Arc::new(processor)),
            conversations: Arc::new(ConversationStore::new()),
        }
    }

    /// Build everything from settings. Fails if the payment QR asset is missing.
    pub fn from_settings(settings: &Settings) -> Result<Self> {
        let qr_path = settings.resolve_payment_asset()?;
        tracing::info!(qr = %qr_path.display(), "payment asset resolved");

        let responder: Arc<dyn Responder> = Arc::new(AssistantResponder::from_settings(settings));
        let classifier = Arc::new(PaymentClassifier::new(Arc::clone(&responder)));
        let processor = MessageProcessor::from_settings(settings, classifier, responder, qr_path);

        Ok(Self::new(processor))
    }

    pub fn conversations(&self) -> &Arc<ConversationStore> {
        &self.conversations
    }

    fn pending_item(&self, transport: Arc<dyn Transport>, message: InboundMessage) -> PendingItem {
        let state = self.conversations.handle_for(&message.user);
        PendingItem::new(message, transport, state)
    }

    /// Inbound callback: queue the message and start the user's drain if idle.
    pub fn on_inbound_message(
        &self,
        transport: Arc<dyn Transport>,
        message: InboundMessage,
    ) -> Submission<Reply> {
        let user = message.user.clone();
        let id = message.id.clone();
        let submission = self.relay.submit(&user, self.pending_item(transport, message));
        tracing::info!(user = %user, item = %id, trigger = ?submission.trigger(), "message queued");
        submission
    }

    /// Like [`Runtime::on_inbound_message`], but the caller drives the drain it started.
    pub async fn on_inbound_message_inline(
        &self,
        transport: Arc<dyn Transport>,
        message: InboundMessage,
    ) -> Option<Result<DrainReport<Reply>>> {
        let user = message.user.clone();
        let item = self.pending_item(transport, message);
        self.relay.submit_inline(&user, item).await
    }

    pub fn status(&self) -> QueueStatus {
        let queues = self.relay.snapshot();
        QueueStatus {
            active_users: queues.len(),
            conversations: self.conversations.len(),
            queues,
        }
    }

    /// Periodically evict conversations idle for longer than `idle_ttl`.
    pub fn spawn_conversation_sweeper(&self, idle_ttl: Duration) -> JoinHandle<()> {
        let conversations = Arc::clone(&self.conversations);
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(SWEEP_INTERVAL);
            loop {
                interval.tick().await;
                let removed = conversations.cleanup_idle(idle_ttl);
                if removed > 0 {
                    tracing::info!(removed, remaining = conversations.len(), "evicted idle conversations");
                }
            }
        })
    }
}

/// Relay status for `/status` and the web API.
#[derive(Debug, Clone, Serialize)]
pub struct QueueStatus {
    pub active_users: usize,
    pub conversations: usize,
    pub queues: Vec<QueueSnapshot>,
}

impl fmt::Display for QueueStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Relay Status:")?;
        writeln!(f, "  Active users:  {}", self.active_users)?;
        write!(f, "  Conversations: {}", self.conversations)?;
        for q in &self.queues {
            write!(f, "\n  • {} ({:?}, {} pending)", q.user, q.state, q.pending)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::DrainState;

    #[test]
    fn test_status_display() {
        let status = QueueStatus {
            active_users: 1,
            conversations: 3,
            queues: vec![QueueSnapshot {
                user: "42".to_string(),
                pending: 2,
                state: DrainState::Draining,
            }],
        };

        let text = status.to_string();
        assert!(text.contains("Active users:  1"));
        assert!(text.contains("Conversations: 3"));
        assert!(text.contains("42 (Draining, 2 pending)"));
    }

    #[test]
    fn test_from_settings_requires_qr_asset() {
        let mut settings = Settings::default();
        settings.payment.qr_path = Some(std::path::PathBuf::from("/definitely/missing/qr.png"));
        assert!(Runtime::from_settings(&settings).is_err());
    }
}
