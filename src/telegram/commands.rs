//! Telegram bot commands.

use teloxide::prelude::*;
use teloxide::types::BotCommand;

use crate::runtime::Runtime;

const HELP_TEXT: &str = r#"RelayBot Commands:

/help - Show this help
/reset - Forget our conversation so far
/status - Show relay status

Just send a message to chat with the assistant.
Messages are answered one at a time, in the order you send them."#;

/// Commands advertised in the Telegram menu.
pub fn bot_commands() -> Vec<BotCommand> {
    vec![
        BotCommand::new("help", "Show help"),
        BotCommand::new("reset", "Reset conversation"),
        BotCommand::new("status", "Show relay status"),
    ]
}

/// Handle a slash command. Returns false if the text is not a known command.
pub async fn dispatch(
    bot: &Bot,
    chat_id: ChatId,
    user: &str,
    text: &str,
    runtime: &Runtime,
) -> ResponseResult<bool> {
    let cmd = text.split_whitespace().next().unwrap_or("");
    // "/status@my_bot" in groups
    let cmd = cmd.split('@').next().unwrap_or(cmd);

    match cmd {
        "/start" | "/help" => {
            bot.send_message(chat_id, HELP_TEXT).await?;
        }
        "/reset" => {
            runtime.conversations().reset(user);
            tracing::info!(user = %user, "conversation reset");
            bot.send_message(chat_id, "Conversation reset. Start fresh!").await?;
        }
        "/status" => {
            bot.send_message(chat_id, runtime.status().to_string()).await?;
        }
        _ => return Ok(false),
    }
    Ok(true)
}
