//! Telegram implementation of the transport contract.

use async_trait::async_trait;
use teloxide::prelude::*;
use teloxide::types::{ChatAction, InputFile};

use crate::error::{Error, Result};
use crate::transport::{OutboundPart, Transport};

/// Telegram rejects messages above 4096 characters; leave headroom.
const MAX_MESSAGE_CHARS: usize = 4000;

pub struct TelegramTransport {
    bot: Bot,
}

impl TelegramTransport {
    pub fn new(bot: Bot) -> Self {
        Self { bot }
    }
}

/// User ids on this channel are chat ids.
pub fn chat_id(user: &str) -> Result<ChatId> {
    user.parse::<i64>()
        .map(ChatId)
        .map_err(|_| Error::Transport(format!("not a Telegram chat id: {}", user)))
}

/// Split text into chunks Telegram accepts, preferring line breaks.
pub fn split_message(text: &str, limit: usize) -> Vec<String> {
    let mut chunks = Vec::new();
    let mut current = String::new();
    let mut current_len = 0;

    for line in text.split_inclusive('\n') {
        let line_len = line.chars().count();
        if current_len + line_len > limit && !current.is_empty() {
            chunks.push(std::mem::take(&mut current));
            current_len = 0;
        }
        if line_len > limit {
            // A single overlong line is cut on char boundaries.
            let chars: Vec<char> = line.chars().collect();
            for piece in chars.chunks(limit) {
                chunks.push(piece.iter().collect());
            }
            continue;
        }
        current.push_str(line);
        current_len += line_len;
    }
    if !current.is_empty() {
        chunks.push(current);
    }
    chunks
}

#[async_trait]
impl Transport for TelegramTransport {
    fn name(&self) -> &str {
        "telegram"
    }

    async fn send(&self, user: &str, parts: Vec<OutboundPart>) -> Result<()> {
        let chat = chat_id(user)?;
        for part in parts {
            match part {
                OutboundPart::Text(text) => {
                    for chunk in split_message(&text, MAX_MESSAGE_CHARS) {
                        self.bot.send_message(chat, chunk).await?;
                    }
                }
                OutboundPart::Media(path) => {
                    self.bot.send_photo(chat, InputFile::file(path)).await?;
                }
            }
        }
        Ok(())
    }

    async fn show_composing(&self, user: &str) -> Result<()> {
        self.bot
            .send_chat_action(chat_id(user)?, ChatAction::Typing)
            .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_chat_id() {
        assert_eq!(chat_id("12345").unwrap(), ChatId(12345));
        assert_eq!(chat_id("-100200").unwrap(), ChatId(-100200));
        assert!(matches!(chat_id("alice"), Err(Error::Transport(_))));
    }

    #[test]
    fn test_split_message_short() {
        assert_eq!(split_message("hello", 10), vec!["hello"]);
    }

    #[test]
    fn test_split_message_on_lines() {
        let chunks = split_message("aaaa\nbbbb\ncccc", 10);
        assert_eq!(chunks, vec!["aaaa\nbbbb\n", "cccc"]);
    }

    #[test]
    fn test_split_message_long_line() {
        let chunks = split_message(&"é".repeat(25), 10);
        assert_eq!(chunks.len(), 3);
        assert_eq!(chunks[2].chars().count(), 5);
    }
}
