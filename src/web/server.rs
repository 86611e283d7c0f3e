//! Web server using Axum.

use std::net::SocketAddr;

use tower::ServiceBuilder;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::config::Web;
use crate::error::Error;
use crate::runtime::Runtime;

use super::router::create_app_router;

/// Run the status web server.
pub async fn run_web_server(config: &Web, runtime: Runtime) -> Result<(), Error> {
    let app = create_app_router(runtime).layer(
        ServiceBuilder::new().layer(TraceLayer::new_for_http()).layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        ),
    );

    let addr: SocketAddr = format!("{}:{}", config.host, config.port)
        .parse()
        .map_err(|e| Error::Web(format!("Invalid address: {}", e)))?;

    tracing::info!("Starting web server on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;

    axum::serve(listener, app)
        .await
        .map_err(|e| Error::Web(e.to_string()))?;

    Ok(())
}
