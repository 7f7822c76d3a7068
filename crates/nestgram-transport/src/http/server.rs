//! Webhook listener.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::{
    Router,
    body::Bytes,
    extract::State,
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
    routing::post,
};
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, trace, warn};

use crate::error::{TransportError, TransportResult};
use nestgram_core::{BoxedUpdateHandler, parse_update};

/// Header carrying the secret configured with `setWebhook`.
pub const SECRET_TOKEN_HEADER: &str = "x-telegram-bot-api-secret-token";

/// HTTP listener accepting pushed updates.
///
/// Every `POST`, on any path, is parsed as one update and handed to the
/// handler. The response is `200 "ok"` once the handler returns, also when
/// the body could not be parsed. Dispatch runs in its own task, so a sender
/// that hangs up early does not cancel it.
#[derive(Debug, Clone, Default)]
pub struct WebhookServer {
    secret_token: Option<String>,
}

/// Shared state for the webhook routes.
struct ServerState {
    handler: BoxedUpdateHandler,
    secret_token: Option<String>,
}

impl WebhookServer {
    /// Creates a listener that accepts every request.
    pub fn new() -> Self {
        Self::default()
    }

    /// Rejects requests whose secret header differs from `secret` with
    /// `401 Unauthorized`.
    pub fn secret_token(mut self, secret: Option<String>) -> Self {
        self.secret_token = secret.filter(|s| !s.is_empty());
        self
    }

    /// Binds `addr` and serves in a background task.
    pub async fn listen(
        &self,
        addr: &str,
        handler: BoxedUpdateHandler,
    ) -> TransportResult<WebhookHandle> {
        let state = Arc::new(ServerState {
            handler,
            secret_token: self.secret_token.clone(),
        });

        let router = Router::new()
            .route("/", post(webhook_handler))
            .route("/{*path}", post(webhook_handler))
            .with_state(state);

        let listener =
            tokio::net::TcpListener::bind(addr)
                .await
                .map_err(|e| TransportError::Bind {
                    addr: addr.to_string(),
                    reason: e.to_string(),
                })?;
        let local_addr = listener.local_addr()?;

        info!(addr = %local_addr, "Webhook listener started");

        let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();
        let task = tokio::spawn(async move {
            let server = axum::serve(listener, router).with_graceful_shutdown(async {
                let _ = shutdown_rx.await;
            });
            if let Err(e) = server.await {
                error!(error = %e, "Webhook listener error");
            }
            info!(addr = %local_addr, "Webhook listener stopped");
        });

        Ok(WebhookHandle {
            local_addr,
            shutdown: Some(shutdown_tx),
            task,
        })
    }
}

/// A running webhook listener.
///
/// Dropping the handle stops the listener without waiting for it.
#[derive(Debug)]
pub struct WebhookHandle {
    local_addr: SocketAddr,
    shutdown: Option<oneshot::Sender<()>>,
    task: JoinHandle<()>,
}

impl WebhookHandle {
    /// The bound address, with the real port when bound to port 0.
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Stops accepting connections and waits for in-flight requests.
    pub async fn shutdown(mut self) {
        if let Some(tx) = self.shutdown.take() {
            let _ = tx.send(());
        }
        if let Err(e) = (&mut self.task).await {
            warn!(error = %e, "Webhook listener task failed");
        }
    }
}

impl Drop for WebhookHandle {
    fn drop(&mut self) {
        if let Some(tx) = self.shutdown.take() {
            let _ = tx.send(());
        }
    }
}

/// Webhook POST handler.
async fn webhook_handler(
    State(state): State<Arc<ServerState>>,
    headers: HeaderMap,
    body: Bytes,
) -> impl IntoResponse {
    if let Some(expected) = &state.secret_token {
        let given = headers
            .get(SECRET_TOKEN_HEADER)
            .and_then(|v| v.to_str().ok());
        if given != Some(expected.as_str()) {
            warn!("Rejected webhook request with a wrong secret token");
            return (StatusCode::UNAUTHORIZED, "unauthorized");
        }
    }

    trace!(len = body.len(), "Received webhook POST");

    match parse_update(&body) {
        Ok(update) => {
            let update_id = update.update_id;
            debug!(update_id, kind = %update.update_type(), "Parsed webhook update");
            let handler = Arc::clone(&state.handler);
            let dispatch = tokio::spawn(async move { handler.handle_update(update).await });
            if let Err(e) = dispatch.await {
                error!(update_id, error = %e, "Webhook dispatch task failed");
            }
        }
        Err(e) => warn!(error = %e, len = body.len(), "Failed to parse webhook payload"),
    }

    (StatusCode::OK, "ok")
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use nestgram_core::{Update, UpdateHandler};
    use std::time::Duration;
    use tokio::sync::mpsc;

    struct Forward(mpsc::UnboundedSender<i64>);

    #[async_trait]
    impl UpdateHandler for Forward {
        async fn handle_update(&self, update: Update) {
            let _ = self.0.send(update.update_id);
        }
    }

    async fn start(secret: Option<&str>) -> (WebhookHandle, mpsc::UnboundedReceiver<i64>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let handle = WebhookServer::new()
            .secret_token(secret.map(str::to_string))
            .listen("127.0.0.1:0", Arc::new(Forward(tx)))
            .await
            .unwrap();
        (handle, rx)
    }

    async fn post(
        handle: &WebhookHandle,
        path: &str,
        body: &'static str,
        secret: Option<&str>,
    ) -> (u16, String) {
        let mut req = reqwest::Client::new()
            .post(format!("http://{}{}", handle.local_addr(), path))
            .header("content-type", "application/json")
            .body(body);
        if let Some(secret) = secret {
            req = req.header(SECRET_TOKEN_HEADER, secret);
        }
        let resp = req.send().await.unwrap();
        (resp.status().as_u16(), resp.text().await.unwrap())
    }

    const UPDATE: &str = r#"{"update_id":10,"message":{"message_id":1,"date":0,"chat":{"id":42,"type":"private"},"text":"/start"}}"#;

    #[tokio::test]
    async fn test_update_is_dispatched_on_any_path() {
        let (handle, mut rx) = start(None).await;

        assert_eq!(post(&handle, "/", UPDATE, None).await, (200, "ok".into()));
        assert_eq!(rx.recv().await, Some(10));

        assert_eq!(post(&handle, "/hook/abc", UPDATE, None).await.0, 200);
        assert_eq!(rx.recv().await, Some(10));

        handle.shutdown().await;
    }

    #[tokio::test]
    async fn test_malformed_body_is_acknowledged() {
        let (handle, mut rx) = start(None).await;

        assert_eq!(post(&handle, "/", "not json", None).await, (200, "ok".into()));
        assert_eq!(post(&handle, "/", UPDATE, None).await.0, 200);
        assert_eq!(rx.recv().await, Some(10));
        assert!(rx.try_recv().is_err());

        handle.shutdown().await;
    }

    #[tokio::test]
    async fn test_secret_token_is_checked() {
        let (handle, mut rx) = start(Some("s3cret")).await;

        assert_eq!(post(&handle, "/", UPDATE, None).await.0, 401);
        assert_eq!(post(&handle, "/", UPDATE, Some("wrong")).await.0, 401);
        assert_eq!(post(&handle, "/", UPDATE, Some("s3cret")).await.0, 200);
        assert_eq!(rx.recv().await, Some(10));
        assert!(rx.try_recv().is_err());

        handle.shutdown().await;
    }

    /// Reports each update only after a delay.
    struct Slow(mpsc::UnboundedSender<i64>);

    #[async_trait]
    impl UpdateHandler for Slow {
        async fn handle_update(&self, update: Update) {
            tokio::time::sleep(Duration::from_millis(300)).await;
            let _ = self.0.send(update.update_id);
        }
    }

    #[tokio::test]
    async fn test_dispatch_survives_client_disconnect() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let handle = WebhookServer::new()
            .listen("127.0.0.1:0", Arc::new(Slow(tx)))
            .await
            .unwrap();

        let result = reqwest::Client::new()
            .post(format!("http://{}/", handle.local_addr()))
            .timeout(Duration::from_millis(50))
            .body(UPDATE)
            .send()
            .await;
        assert!(result.is_err());

        let dispatched = tokio::time::timeout(Duration::from_secs(2), rx.recv())
            .await
            .unwrap();
        assert_eq!(dispatched, Some(10));

        handle.shutdown().await;
    }

    #[tokio::test]
    async fn test_bind_failure_is_reported() {
        let (handle, _rx) = start(None).await;
        let (tx, _rx2) = mpsc::unbounded_channel();
        let err = WebhookServer::new()
            .listen(&handle.local_addr().to_string(), Arc::new(Forward(tx)))
            .await
            .unwrap_err();
        assert!(matches!(err, TransportError::Bind { .. }));
    }
}
