//! Message processing: payment detection, then an AI answer.

use std::borrow::Cow;
use std::path::PathBuf;
use std::sync::{Arc, OnceLock};

use async_trait::async_trait;
use regex::{Captures, Regex};

use crate::assistant::{Classifier, Responder};
use crate::config::Settings;
use crate::error::Result;
use crate::transport::OutboundPart;

use super::message::PendingItem;

/// Handles one queued item at a time for a drain.
#[async_trait]
pub trait Processor<T>: Send + Sync {
    type Output: Send;

    async fn process(&self, user: &str, item: T) -> Result<Self::Output>;
}

/// What the processor did with a message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reply {
    /// Payment instructions and QR code were sent.
    Payment,
    /// The assistant answered in this many segments.
    Answer { segments: usize },
    /// The message had no text.
    Ignored,
}

/// Fixed reply for payment intent.
#[derive(Debug, Clone)]
pub struct PaymentReply {
    pub instructions: String,
    pub qr_path: PathBuf,
}

/// The relay's processor: classify, then answer.
pub struct MessageProcessor {
    classifier: Arc<dyn Classifier>,
    responder: Arc<dyn Responder>,
    classifier_id: String,
    responder_id: String,
    payment: PaymentReply,
}

impl MessageProcessor {
    pub fn new(
        classifier: Arc<dyn Classifier>,
        responder: Arc<dyn Responder>,
        classifier_id: impl Into<String>,
        responder_id: impl Into<String>,
        payment: PaymentReply,
    ) -> Self {
        Self {
            classifier,
            responder,
            classifier_id: classifier_id.into(),
            responder_id: responder_id.into(),
            payment,
        }
    }

    /// Wire the processor from settings; `qr_path` must already be resolved.
    pub fn from_settings(
        settings: &Settings,
        classifier: Arc<dyn Classifier>,
        responder: Arc<dyn Responder>,
        qr_path: PathBuf,
    ) -> Self {
        Self::new(
            classifier,
            responder,
            settings.routing.classifier_id(),
            settings.routing.responder_id(),
            PaymentReply {
                instructions: settings.payment.instructions.clone(),
                qr_path,
            },
        )
    }
}

#[async_trait]
impl Processor<PendingItem> for MessageProcessor {
    type Output = Reply;

    async fn process(&self, user: &str, item: PendingItem) -> Result<Reply> {
        let text = item.message.text.trim();
        if text.is_empty() {
            return Ok(Reply::Ignored);
        }

        if self.classifier.classify(&self.classifier_id, text).await? {
            tracing::info!(user = %user, item = %item.message.id, "payment intent detected");
            item.reply
                .send(vec![
                    OutboundPart::Text(self.payment.instructions.clone()),
                    OutboundPart::Media(self.payment.qr_path.clone()),
                ])
                .await?;
            return Ok(Reply::Payment);
        }

        if let Err(e) = item.transport.show_composing(user).await {
            tracing::debug!(user = %user, error = %e, "composing indicator failed");
        }

        let answer = self
            .responder
            .ask(&self.responder_id, &item.message.text, Some(&item.state))
            .await?;

        let segments = format_reply(&answer);
        for segment in &segments {
            item.reply.send_text(segment.as_str()).await?;
        }

        tracing::debug!(user = %user, item = %item.message.id, segments = segments.len(), "answered");
        Ok(Reply::Answer {
            segments: segments.len(),
        })
    }
}

fn citation_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"(\s?)【[^】\n]*】(\s?)").expect("citation pattern"))
}

fn paragraph_break() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"\n[ \t]*\n").expect("paragraph pattern"))
}

/// Remove `【…】` citation markers together with the space that follows them.
///
/// When the marker is surrounded by spaces one of them survives, so words
/// on either side stay apart.
pub fn strip_citations(text: &str) -> Cow<'_, str> {
    citation_pattern().replace_all(text, |caps: &Captures| {
        if caps[1].is_empty() {
            caps[2].to_string()
        } else {
            caps[1].to_string()
        }
    })
}

/// Split an answer into paragraph segments, cleaned and trimmed, in order.
pub fn format_reply(answer: &str) -> Vec<String> {
    paragraph_break()
        .split(answer)
        .map(|paragraph| strip_citations(paragraph).trim().to_string())
        .filter(|segment| !segment.is_empty())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{ConversationHandle, InboundMessage};
    use crate::error::Error;
    use crate::transport::Transport;
    use std::sync::Mutex;

    #[derive(Default)]
    struct RecordingTransport {
        sent: Mutex<Vec<Vec<OutboundPart>>>,
        composing: Mutex<usize>,
    }

    #[async_trait]
    impl Transport for RecordingTransport {
        fn name(&self) -> &str {
            "recording"
        }

        async fn send(&self, _user: &str, parts: Vec<OutboundPart>) -> Result<()> {
            self.sent.lock().unwrap().push(parts);
            Ok(())
        }

        async fn show_composing(&self, _user: &str) -> Result<()> {
            *self.composing.lock().unwrap() += 1;
            Ok(())
        }
    }

    struct FixedClassifier(bool);

    #[async_trait]
    impl Classifier for FixedClassifier {
        async fn classify(&self, _assistant_id: &str, _message: &str) -> Result<bool> {
            Ok(self.0)
        }
    }

    #[derive(Default)]
    struct ScriptedResponder {
        answer: Option<&'static str>,
        asked: Mutex<usize>,
    }

    #[async_trait]
    impl Responder for ScriptedResponder {
        async fn ask(
            &self,
            _assistant_id: &str,
            _prompt: &str,
            _state: Option<&ConversationHandle>,
        ) -> Result<String> {
            *self.asked.lock().unwrap() += 1;
            self.answer
                .map(str::to_string)
                .ok_or_else(|| Error::Other("responder down".to_string()))
        }
    }

    fn processor(payment: bool, responder: Arc<ScriptedResponder>) -> MessageProcessor {
        MessageProcessor::new(
            Arc::new(FixedClassifier(payment)),
            responder,
            "payment-detector",
            "concierge",
            PaymentReply {
                instructions: "Scan to pay.".to_string(),
                qr_path: PathBuf::from("/assets/qr.png"),
            },
        )
    }

    fn item(transport: &Arc<RecordingTransport>, text: &str) -> PendingItem {
        PendingItem::new(
            InboundMessage::new("test", "alice", text),
            transport.clone(),
            ConversationHandle::detached("alice"),
        )
    }

    #[test]
    fn test_format_reply_splits_and_strips() {
        let segments = format_reply("Part one.\n\nPart two.【cite123】 with trailing text");
        assert_eq!(segments, vec!["Part one.", "Part two. with trailing text"]);
    }

    #[test]
    fn test_format_reply_edge_cases() {
        assert!(format_reply("   \n\n  ").is_empty());
        assert_eq!(format_reply("one\n \n\n\ntwo\n"), vec!["one", "two"]);
        assert_eq!(format_reply("line a\nline b"), vec!["line a\nline b"]);
        assert_eq!(format_reply("see 【4:0†source】 here"), vec!["see here"]);
        assert_eq!(format_reply("end.【1†doc】"), vec!["end."]);
        // A marker never spans lines.
        assert_eq!(format_reply("a 【open\nclose】 b"), vec!["a 【open\nclose】 b"]);
    }

    #[tokio::test]
    async fn test_payment_branch_skips_responder() {
        let transport = Arc::new(RecordingTransport::default());
        let responder = Arc::new(ScriptedResponder::default());
        let processor = processor(true, responder.clone());

        let reply = processor
            .process("alice", item(&transport, "can I pay 50 now?"))
            .await
            .unwrap();

        assert_eq!(reply, Reply::Payment);
        assert_eq!(
            *transport.sent.lock().unwrap(),
            vec![vec![
                OutboundPart::Text("Scan to pay.".to_string()),
                OutboundPart::Media(PathBuf::from("/assets/qr.png")),
            ]]
        );
        assert_eq!(*responder.asked.lock().unwrap(), 0);
        assert_eq!(*transport.composing.lock().unwrap(), 0);
    }

    #[tokio::test]
    async fn test_general_branch_emits_segments() {
        let transport = Arc::new(RecordingTransport::default());
        let responder = Arc::new(ScriptedResponder {
            answer: Some("Part one.\n\nPart two.【cite123】 with trailing text"),
            ..ScriptedResponder::default()
        });

        let reply = processor(false, responder)
            .process("alice", item(&transport, "hi"))
            .await
            .unwrap();

        assert_eq!(reply, Reply::Answer { segments: 2 });
        assert_eq!(*transport.composing.lock().unwrap(), 1);
        assert_eq!(
            *transport.sent.lock().unwrap(),
            vec![
                vec![OutboundPart::Text("Part one.".to_string())],
                vec![OutboundPart::Text("Part two. with trailing text".to_string())],
            ]
        );
    }

    #[tokio::test]
    async fn test_responder_failure_emits_nothing() {
        let transport = Arc::new(RecordingTransport::default());
        let responder = Arc::new(ScriptedResponder::default());

        let result = processor(false, responder)
            .process("bob", item(&transport, "hello?"))
            .await;

        assert!(result.is_err());
        assert!(transport.sent.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_blank_message_ignored() {
        let transport = Arc::new(RecordingTransport::default());
        let responder = Arc::new(ScriptedResponder::default());

        let reply = processor(true, responder.clone())
            .process("alice", item(&transport, "   "))
            .await
            .unwrap();

        assert_eq!(reply, Reply::Ignored);
        assert!(transport.sent.lock().unwrap().is_empty());
    }
}
