//! Payment intent classification.

use std::sync::Arc;

use async_trait::async_trait;

use crate::error::Result;

use super::responder::Responder;

/// Decides whether a message expresses the wish to pay.
#[async_trait]
pub trait Classifier: Send + Sync {
    async fn classify(&self, assistant_id: &str, message: &str) -> Result<bool>;
}

/// Classifier that asks a yes/no assistant through a [`Responder`].
pub struct PaymentClassifier {
    responder: Arc<dyn Responder>,
}

impl PaymentClassifier {
    pub fn new(responder: Arc<dyn Responder>) -> Self {
        Self { responder }
    }
}

fn classification_prompt(message: &str) -> String {
    format!(
        "Customer message:\n\"\"\"\n{}\n\"\"\"\n\nDoes this message express the intention to pay? Answer YES or NO.",
        message.trim()
    )
}

/// Interpret a constrained yes/no answer. Anything unrecognized is "no".
pub fn is_affirmative(answer: &str) -> bool {
    let first = answer
        .split_whitespace()
        .next()
        .unwrap_or("")
        .trim_matches(|c: char| !c.is_alphanumeric())
        .to_lowercase();

    matches!(first.as_str(), "yes" | "y" | "true" | "si" | "sí")
}

#[async_trait]
impl Classifier for PaymentClassifier {
    async fn classify(&self, assistant_id: &str, message: &str) -> Result<bool> {
        // No conversation state: classifier turns must not leak into the chat history.
        let answer = self
            .responder
            .ask(assistant_id, &classification_prompt(message), None)
            .await?;

        let verdict = is_affirmative(&answer);
        tracing::debug!(assistant = %assistant_id, answer = %answer.trim(), verdict, "classified message");
        Ok(verdict)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::ConversationHandle;
    use crate::error::Error;

    struct Canned(&'static str);

    #[async_trait]
    impl Responder for Canned {
        async fn ask(
            &self,
            _assistant_id: &str,
            prompt: &str,
            state: Option<&ConversationHandle>,
        ) -> Result<String> {
            assert!(state.is_none());
            assert!(prompt.contains("I want to pay"));
            if self.0 == "!" {
                return Err(Error::Other("offline".to_string()));
            }
            Ok(self.0.to_string())
        }
    }

    #[test]
    fn test_is_affirmative() {
        assert!(is_affirmative("YES"));
        assert!(is_affirmative("  yes."));
        assert!(is_affirmative("Sí"));
        assert!(is_affirmative("true"));
        assert!(!is_affirmative("NO"));
        assert!(!is_affirmative("maybe yes"));
        assert!(!is_affirmative(""));
    }

    #[tokio::test]
    async fn test_classify() {
        let yes = PaymentClassifier::new(Arc::new(Canned("Yes")));
        assert!(yes.classify("payment-detector", "I want to pay").await.unwrap());

        let no = PaymentClassifier::new(Arc::new(Canned("No")));
        assert!(!no.classify("payment-detector", "I want to pay").await.unwrap());

        let broken = PaymentClassifier::new(Arc::new(Canned("!")));
        assert!(broken.classify("payment-detector", "I want to pay").await.is_err());
    }
}
