//! Route definitions for web server.

use axum::{extract::State, routing::get, Json, Router};

use crate::runtime::{QueueStatus, Runtime};

/// Create the full app router.
pub fn create_app_router(runtime: Runtime) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .route("/api/queues", get(queue_status))
        .with_state(runtime)
}

/// Health check endpoint.
async fn health_check() -> &'static str {
    "OK"
}

/// Active users and pending counts.
async fn queue_status(State(runtime): State<Runtime>) -> Json<QueueStatus> {
    Json(runtime.status())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assistant::{Classifier, Responder};
    use crate::core::{ConversationHandle, MessageProcessor, PaymentReply};
    use crate::error::Result;
    use async_trait::async_trait;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use std::sync::Arc;
    use tower::ServiceExt;

    struct Never;

    #[async_trait]
    impl Classifier for Never {
        async fn classify(&self, _assistant_id: &str, _message: &str) -> Result<bool> {
            Ok(false)
        }
    }

    #[async_trait]
    impl Responder for Never {
        async fn ask(
            &self,
            _assistant_id: &str,
            _prompt: &str,
            _state: Option<&ConversationHandle>,
        ) -> Result<String> {
            Ok(String::new())
        }
    }

    fn runtime() -> Runtime {
        Runtime::new(MessageProcessor::new(
            Arc::new(Never),
            Arc::new(Never),
            "c",
            "r",
            PaymentReply {
                instructions: String::new(),
                qr_path: "qr.png".into(),
            },
        ))
    }

    #[tokio::test]
    async fn test_health() {
        let response = create_app_router(runtime())
            .oneshot(Request::get("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_queue_status_empty() {
        let rt = runtime();
        rt.conversations().handle_for("42");

        let response = create_app_router(rt)
            .oneshot(Request::get("/api/queues").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let value: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(value["active_users"], 0);
        assert_eq!(value["conversations"], 1);
        assert_eq!(value["queues"], serde_json::json!([]));
    }
}
