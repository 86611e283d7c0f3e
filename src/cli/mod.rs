//! CLI commands for RelayBot using clap.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use clap::{Parser, Subcommand};

use crate::config::{get_settings_path, load_settings, write_default_settings, Settings};
use crate::core::InboundMessage;
use crate::providers::create_provider;
use crate::runtime::Runtime;
use crate::transport::ConsoleTransport;

/// RelayBot - Telegram AI relay with per-user ordered processing.
#[derive(Parser)]
#[command(name = "relaybot")]
#[command(version)]
#[command(about = "RelayBot - one conversation at a time, per user", long_about = None)]
pub struct Commands {
    /// More detailed logs (overridden by RUST_LOG)
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Run the Telegram relay
    Run {
        /// Also serve /health and /api/queues, regardless of settings.web.enabled
        #[arg(long)]
        web: bool,
    },

    /// Send one message through the relay and print the replies
    Ask {
        /// Message to send
        message: String,

        /// User id to send as
        #[arg(long, default_value = "console")]
        user: String,
    },

    /// Check settings, providers and the payment asset
    Doctor,

    /// Write a default settings file
    Init,

    /// Print effective settings (secrets masked)
    Config,
}

impl Commands {
    /// Run the command.
    pub async fn run(&self) -> Result<()> {
        match &self.command {
            Command::Run { web } => cmd_run(*web).await,
            Command::Ask { message, user } => cmd_ask(user, message).await,
            Command::Doctor => cmd_doctor().await,
            Command::Init => cmd_init(),
            Command::Config => cmd_config(),
        }
    }
}

async fn cmd_run(force_web: bool) -> Result<()> {
    let settings = load_settings()?;
    let runtime = Runtime::from_settings(&settings)?;

    runtime.spawn_conversation_sweeper(Duration::from_secs(settings.conversation.idle_ttl_secs));

    if settings.web.enabled || force_web {
        let web = settings.web.clone();
        let rt = runtime.clone();
        tokio::spawn(async move {
            if let Err(e) = crate::web::run_web_server(&web, rt).await {
                tracing::error!("Web server stopped: {}", e);
            }
        });
    }

    crate::telegram::run_telegram_daemon(&settings, runtime).await?;
    Ok(())
}

async fn cmd_ask(user: &str, message: &str) -> Result<()> {
    let settings = load_settings()?;
    let runtime = Runtime::from_settings(&settings)?;

    let inbound = InboundMessage::new("console", user, message);
    let report = runtime
        .on_inbound_message_inline(Arc::new(ConsoleTransport::new()), inbound)
        .await
        .ok_or_else(|| anyhow::anyhow!("a drain for {} is already running", user))??;

    for outcome in report.outcomes {
        if let Err(e) = outcome.result {
            anyhow::bail!("Message failed: {}", e);
        }
    }
    Ok(())
}

async fn cmd_doctor() -> Result<()> {
    println!("Running RelayBot diagnostics...\n");

    let mut issues = Vec::new();

    print!("📋 Settings... ");
    let settings = match load_settings() {
        Ok(s) => {
            println!("✓");
            s
        }
        Err(e) => {
            println!("✗");
            return Err(anyhow::anyhow!("Settings error: {}", e));
        }
    };

    print!("📡 Telegram token... ");
    if settings.channels.telegram.bot_token.is_some() {
        println!("✓");
    } else {
        println!("✗");
        issues.push("channels.telegram.bot_token is not set (or TELEGRAM_BOT_TOKEN)".to_string());
    }

    for name in providers_in_use(&settings) {
        print!("🔧 Provider {}... ", name);
        if create_provider(&name, &settings).is_available().await {
            println!("✓");
        } else {
            println!("✗");
            issues.push(format!("Provider '{}' is not reachable or not configured", name));
        }
    }

    match crate::logging::log_dir() {
        Ok(dir) => println!("📝 Logs: {}", dir.display()),
        Err(e) => issues.push(format!("Log directory: {}", e)),
    }

    print!("🖼  Payment QR asset... ");
    match settings.resolve_payment_asset() {
        Ok(path) => println!("✓ ({})", path.display()),
        Err(e) => {
            println!("✗");
            issues.push(e.to_string());
        }
    }

    println!();
    if issues.is_empty() {
        println!("✅ All checks passed");
        Ok(())
    } else {
        for issue in &issues {
            println!("❌ {}", issue);
        }
        Err(anyhow::anyhow!("{} issue(s) found", issues.len()))
    }
}

fn providers_in_use(settings: &Settings) -> Vec<String> {
    let mut names: Vec<String> = [
        settings.routing.responder_id(),
        settings.routing.classifier_id(),
    ]
    .iter()
    .filter_map(|id| settings.assistants.get(*id))
    .map(|a| {
        a.provider
            .clone()
            .unwrap_or_else(|| settings.models.provider.clone())
    })
    .collect();
    names.sort();
    names.dedup();
    names
}

fn cmd_init() -> Result<()> {
    let path = get_settings_path()?;
    write_default_settings(&path)?;
    println!("Wrote {}", path.display());
    println!("Set channels.telegram.bot_token and payment.qr_path, then run 'relaybot doctor'.");
    Ok(())
}

fn cmd_config() -> Result<()> {
    let settings = load_settings()?;
    println!("{}", serde_json::to_string_pretty(&settings.masked())?);
    Ok(())
}
