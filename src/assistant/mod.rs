//! AI responder and payment classifier.

pub mod classifier;
pub mod responder;

pub use classifier::{is_affirmative, Classifier, PaymentClassifier};
pub use responder::{AssistantResponder, Responder};
