//! Transport that prints replies to stdout. Used by `relaybot ask`.

use async_trait::async_trait;

use crate::error::Result;

use super::{OutboundPart, Transport};

#[derive(Debug, Default)]
pub struct ConsoleTransport;

impl ConsoleTransport {
    pub fn new() -> Self {
        Self
    }
}

fn render(user: &str, part: &OutboundPart) -> String {
    match part {
        OutboundPart::Text(text) => format!("[{}] {}", user, text),
        OutboundPart::Media(path) => format!("[{}] <media: {}>", user, path.display()),
    }
}

#[async_trait]
impl Transport for ConsoleTransport {
    fn name(&self) -> &str {
        "console"
    }

    async fn send(&self, user: &str, parts: Vec<OutboundPart>) -> Result<()> {
        for part in &parts {
            println!("{}\n", render(user, part));
        }
        Ok(())
    }

    async fn show_composing(&self, user: &str) -> Result<()> {
        tracing::debug!(user = %user, "composing");
        Ok(())
    }
}
