//! RelayBot - Telegram AI relay with per-user ordered processing.

use clap::Parser;
use std::process::ExitCode;

use relaybot::cli::Commands;
use relaybot::logging::{self, LogOptions};

#[tokio::main]
async fn main() -> ExitCode {
    let args = Commands::parse();

    let _guard = match LogOptions::from_env(args.verbose).and_then(|options| logging::init(&options)) {
        Ok(guard) => guard,
        Err(e) => {
            eprintln!("Failed to initialize logging: {}", e);
            return ExitCode::FAILURE;
        }
    };

    match args.run().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!("{}", e);
            eprintln!("Error: {}", e);
            ExitCode::FAILURE
        }
    }
}
