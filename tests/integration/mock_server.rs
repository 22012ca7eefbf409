//! Mock HTTP backend for integration tests

use agent_session::{AgentSessions, AgentSessionsBuilder, NotificationSink, SessionConfig};
use mockito::{Matcher, Mock, Server, ServerGuard};
use serde_json::Value;
use std::sync::Arc;
use tokio::sync::Mutex;

/// Test fixture that manages a mock agent backend
pub struct MockServerFixture {
    pub server: Arc<Mutex<ServerGuard>>,
    pub base_url: String,
}

impl MockServerFixture {
    pub async fn new() -> Self {
        let server = Server::new_async().await;
        let base_url = server.url();
        Self {
            server: Arc::new(Mutex::new(server)),
            base_url,
        }
    }

    /// Config pointed at the mock server, without debounce or pre-warm.
    pub fn test_config(&self) -> SessionConfig {
        SessionConfig {
            base_url: self.base_url.clone(),
            min_send_interval_ms: 0,
            prewarm_on_switch: false,
            ..SessionConfig::default()
        }
    }

    pub fn create_sessions(&self, sink: Arc<dyn NotificationSink>) -> AgentSessions {
        AgentSessionsBuilder::new()
            .config(self.test_config())
            .notification_sink(sink)
            .build()
            .expect("failed to build sessions")
    }

    /// `POST /{mode}/start` expecting `resource_ref`.
    pub async fn mock_session_start(
        &self,
        mode: &str,
        resource_ref: Option<&str>,
        status: usize,
        body: Value,
    ) -> Mock {
        let mut server = self.server.lock().await;
        server
            .mock("POST", format!("/{}/start", mode).as_str())
            .match_body(Matcher::Json(serde_json::json!({ "resourceRef": resource_ref })))
            .with_status(status)
            .with_header("content-type", "application/json")
            .with_body(body.to_string())
            .create_async()
            .await
    }

    /// `POST /{mode}/chat` expecting `{sessionId, message}`.
    pub async fn mock_chat(
        &self,
        mode: &str,
        session_id: &str,
        message: &str,
        status: usize,
        body: Value,
    ) -> Mock {
        let mut server = self.server.lock().await;
        server
            .mock("POST", format!("/{}/chat", mode).as_str())
            .match_body(Matcher::Json(serde_json::json!({
                "sessionId": session_id,
                "message": message,
            })))
            .with_status(status)
            .with_header("content-type", "application/json")
            .with_body(body.to_string())
            .create_async()
            .await
    }

    /// `GET /{mode}/chat/stream?sessionId=..&message=..` answering with SSE frames.
    pub async fn mock_sse_stream(
        &self,
        mode: &str,
        session_id: &str,
        message: &str,
        events: Vec<Value>,
    ) -> Mock {
        let body = events
            .iter()
            .map(|event| format!("data: {}\n\n", event))
            .collect::<Vec<_>>()
            .join("");

        let mut server = self.server.lock().await;
        server
            .mock(
                "GET",
                Matcher::Regex(format!(r"^/{}/chat/stream", mode)),
            )
            .match_query(Matcher::AllOf(vec![
                Matcher::UrlEncoded("sessionId".into(), session_id.into()),
                Matcher::UrlEncoded("message".into(), message.into()),
            ]))
            .with_status(200)
            .with_header("content-type", "text/event-stream")
            .with_body(body)
            .create_async()
            .await
    }
}
