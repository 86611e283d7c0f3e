//! Telegram bot integration.

pub mod client;
pub mod commands;
pub mod transport;

pub use client::run_telegram_daemon;
pub use transport::TelegramTransport;
