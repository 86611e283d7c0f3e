//! Outbound side of a messaging channel.
//!
//! The relay only needs three things from a channel: send replies to a
//! user, show a composing indicator, and a name for logs.

use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;

use crate::error::Result;

pub mod console;

pub use console::ConsoleTransport;

/// One piece of an outbound reply.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OutboundPart {
    Text(String),
    Media(PathBuf),
}

/// Transport provider contract.
#[async_trait]
pub trait Transport: Send + Sync {
    fn name(&self) -> &str;

    /// Deliver the parts to the user, in order.
    async fn send(&self, user: &str, parts: Vec<OutboundPart>) -> Result<()>;

    /// Show a typing/composing indicator.
    async fn show_composing(&self, user: &str) -> Result<()>;
}

/// Reply capability bound to a single user.
#[derive(Clone)]
pub struct ReplySink {
    transport: Arc<dyn Transport>,
    user: String,
}

impl ReplySink {
    pub fn new(transport: Arc<dyn Transport>, user: impl Into<String>) -> Self {
        Self {
            transport,
            user: user.into(),
        }
    }

    pub fn user(&self) -> &str {
        &self.user
    }

    pub async fn send(&self, parts: Vec<OutboundPart>) -> Result<()> {
        self.transport.send(&self.user, parts).await
    }

    pub async fn send_text(&self, text: impl Into<String>) -> Result<()> {
        self.send(vec![OutboundPart::Text(text.into())]).await
    }
}

impl std::fmt::Debug for ReplySink {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReplySink")
            .field("transport", &self.transport.name())
            .field("user", &self.user)
            .finish()
    }
}
