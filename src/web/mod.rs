//! Web server module (health and relay status).

pub mod router;
pub mod server;

pub use server::run_web_server;
