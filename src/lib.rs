//! RelayBot library root.

pub mod assistant;
pub mod cli;
pub mod config;
pub mod core;
pub mod error;
pub mod logging;
pub mod providers;
pub mod runtime;
pub mod telegram;
pub mod transport;
pub mod web;

pub use cli::Commands;
pub use config::{load_settings, Settings};
pub use core::{InboundMessage, MessageRelay, PendingItem, Relay, UserQueues};
pub use error::{Error, Result};
pub use providers::Provider;
pub use runtime::Runtime;
pub use telegram::run_telegram_daemon;
pub use transport::{OutboundPart, Transport};
