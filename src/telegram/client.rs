//! Telegram bot client: turns updates into relay submissions.

use std::sync::Arc;

use teloxide::prelude::*;

use crate::config::Settings;
use crate::core::{InboundMessage, Submission};
use crate::error::Error;
use crate::runtime::Runtime;
use crate::transport::Transport;

use super::commands;
use super::transport::TelegramTransport;

/// Run the telegram bot until interrupted.
pub async fn run_telegram_daemon(settings: &Settings, runtime: Runtime) -> Result<(), Error> {
    tracing::info!("Starting Telegram bot...");

    let token = settings
        .channels
        .telegram
        .bot_token
        .clone()
        .ok_or_else(|| Error::Telegram("No bot token configured".to_string()))?;

    let bot = Bot::new(token);

    if let Err(e) = bot.set_my_commands(commands::bot_commands()).await {
        tracing::warn!("Failed to set commands: {}", e);
    }

    let transport: Arc<dyn Transport> = Arc::new(TelegramTransport::new(bot.clone()));

    Dispatcher::builder(bot, Update::filter_message().endpoint(handle_message))
        .dependencies(dptree::deps![runtime, transport])
        .enable_ctrlc_handler()
        .build()
        .dispatch()
        .await;

    tracing::info!("Telegram bot stopped");
    Ok(())
}

/// Handle an incoming message.
async fn handle_message(
    bot: Bot,
    msg: Message,
    runtime: Runtime,
    transport: Arc<dyn Transport>,
) -> ResponseResult<()> {
    let Some(text) = msg.text().or_else(|| msg.caption()) else {
        return Ok(());
    };
    if text.trim().is_empty() {
        return Ok(());
    }

    let user = msg.chat.id.0.to_string();

    if text.starts_with('/') && commands::dispatch(&bot, msg.chat.id, &user, text, &runtime).await? {
        return Ok(());
    }

    let mut message = InboundMessage::new("telegram", &user, text);
    message.message_id = Some(i64::from(msg.id.0));
    message.sender_name = msg.from.as_ref().map(|u| u.full_name());

    if let Submission::Started(handle) = runtime.on_inbound_message(transport, message) {
        // Detached: the drain logs its own outcome.
        drop(handle);
    }

    Ok(())
}
