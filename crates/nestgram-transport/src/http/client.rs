//! HTTP API client.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures::StreamExt;
use reqwest::{Client, ClientBuilder};
use serde::Deserialize;
use serde_json::Value;
use tokio::io::AsyncWriteExt;
use tracing::{debug, trace};

use crate::error::{TransportError, TransportResult};
use nestgram_core::{ApiError, ApiResult, BotApi};

/// Default endpoint of the remote Bot API.
pub const DEFAULT_BASE_URL: &str = "https://api.telegram.org";

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(60);

/// Response envelope wrapped around every API result.
#[derive(Debug, Deserialize)]
struct Envelope {
    ok: bool,
    #[serde(default)]
    result: Option<Value>,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    error_code: Option<i64>,
}

/// [`BotApi`] over HTTPS.
///
/// Methods are posted as JSON to `<base>/bot<token>/<method>`; files are
/// fetched from `<base>/file/bot<token>/<path>`.
#[derive(Clone)]
pub struct HttpApi {
    client: Client,
    base_url: Arc<str>,
    token: Arc<str>,
}

impl HttpApi {
    /// Creates a client for the default endpoint with a 60 second timeout.
    pub fn new(token: impl Into<String>) -> TransportResult<Self> {
        Self::with_config(token, DEFAULT_BASE_URL, DEFAULT_TIMEOUT)
    }

    /// Creates a client with a custom endpoint and request timeout.
    ///
    /// The timeout must exceed the long-poll timeout used with `getUpdates`,
    /// or every idle poll fails.
    pub fn with_config(
        token: impl Into<String>,
        base_url: impl Into<String>,
        timeout: Duration,
    ) -> TransportResult<Self> {
        let token = token.into();
        if token.is_empty() {
            return Err(TransportError::InvalidConfig("token is empty".into()));
        }

        let client = ClientBuilder::new()
            .timeout(timeout)
            .build()
            .map_err(|e| TransportError::ClientBuild(e.to_string()))?;

        let base_url = base_url.into();
        debug!(base_url = %base_url, timeout = ?timeout, "Created HTTP API client");

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').into(),
            token: token.into(),
        })
    }

    /// Returns a client for another bot sharing this one's connection pool.
    pub fn with_token(&self, token: impl Into<String>) -> Self {
        Self {
            client: self.client.clone(),
            base_url: Arc::clone(&self.base_url),
            token: token.into().into(),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn method_url(&self, method: &str) -> String {
        format!("{}/bot{}/{}", self.base_url, self.token, method)
    }

    fn file_url(&self, file_path: &str) -> String {
        format!("{}/file/bot{}/{}", self.base_url, self.token, file_path)
    }
}

impl std::fmt::Debug for HttpApi {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpApi")
            .field("base_url", &self.base_url)
            .finish_non_exhaustive()
    }
}

/// Drops the URL from a reqwest error: it contains the token.
fn transport_error(err: reqwest::Error) -> ApiError {
    ApiError::Transport(err.without_url().to_string())
}

#[async_trait]
impl BotApi for HttpApi {
    async fn call(&self, method: &str, params: Value) -> ApiResult<Value> {
        let resp = self
            .client
            .post(self.method_url(method))
            .json(&params)
            .send()
            .await
            .map_err(transport_error)?;

        let status = resp.status();
        let body = resp.bytes().await.map_err(transport_error)?;
        trace!(method = %method, status = status.as_u16(), len = body.len(), "API response");

        let envelope: Envelope = match serde_json::from_slice(&body) {
            Ok(envelope) => envelope,
            Err(_) if !status.is_success() => {
                return Err(ApiError::remote(
                    i64::from(status.as_u16()),
                    String::from_utf8_lossy(&body),
                ));
            }
            Err(e) => return Err(e.into()),
        };

        if envelope.ok && status.is_success() {
            return Ok(envelope.result.unwrap_or(Value::Null));
        }
        Err(ApiError::remote(
            envelope
                .error_code
                .unwrap_or_else(|| i64::from(status.as_u16())),
            envelope.description.unwrap_or_default(),
        ))
    }

    async fn download(&self, file_path: &str, dest: &Path) -> ApiResult<u64> {
        let resp = self
            .client
            .get(self.file_url(file_path))
            .send()
            .await
            .map_err(|e| ApiError::download(e.without_url().to_string()))?;

        let status = resp.status();
        if !status.is_success() {
            return Err(ApiError::download(format!(
                "HTTP {} for {}",
                status.as_u16(),
                file_path
            )));
        }

        if let Some(parent) = dest.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| ApiError::download(e.to_string()))?;
        }

        // `dest` is only replaced once the whole body has been written.
        let part = part_path(dest);
        let written = match write_body(resp, &part).await {
            Ok(written) => written,
            Err(e) => {
                let _ = tokio::fs::remove_file(&part).await;
                return Err(e);
            }
        };
        if let Err(e) = tokio::fs::rename(&part, dest).await {
            let _ = tokio::fs::remove_file(&part).await;
            return Err(ApiError::download(e.to_string()));
        }

        debug!(file_path = %file_path, dest = %dest.display(), bytes = written, "Downloaded file");
        Ok(written)
    }
}

/// Sibling of `dest` receiving the body while it downloads.
fn part_path(dest: &Path) -> PathBuf {
    let mut part = dest.as_os_str().to_owned();
    part.push(".part");
    PathBuf::from(part)
}

async fn write_body(resp: reqwest::Response, path: &Path) -> ApiResult<u64> {
    let mut file = tokio::fs::File::create(path)
        .await
        .map_err(|e| ApiError::download(e.to_string()))?;

    let mut written = 0u64;
    let mut stream = resp.bytes_stream();
    while let Some(chunk) = stream.next().await {
        let chunk = chunk.map_err(|e| ApiError::download(e.without_url().to_string()))?;
        file.write_all(&chunk)
            .await
            .map_err(|e| ApiError::download(e.to_string()))?;
        written += chunk.len() as u64;
    }
    file.flush()
        .await
        .map_err(|e| ApiError::download(e.to_string()))?;
    Ok(written)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::Router;
    use axum::body::Bytes;
    use axum::extract::Path as UrlPath;
    use axum::http::StatusCode;
    use axum::response::{IntoResponse, Response};
    use axum::routing::any;
    use nestgram_core::Api;
    use serde_json::json;

    const TOKEN: &str = "123:abc";

    /// Answers like the remote API for a handful of paths.
    async fn fake_api(UrlPath(path): UrlPath<String>, body: Bytes) -> Response {
        let path = path.trim_start_matches('/');
        let method = path.strip_prefix("bot123:abc/");
        match (method, path) {
            (Some("getMe"), _) => axum::Json(json!({
                "ok": true,
                "result": { "id": 1, "is_bot": true, "first_name": "Bot", "username": "test_bot" },
            }))
            .into_response(),
            (Some("echo"), _) => {
                let params: Value = serde_json::from_slice(&body).unwrap();
                axum::Json(json!({ "ok": true, "result": params })).into_response()
            }
            (Some("banChatMember"), _) => (
                StatusCode::BAD_REQUEST,
                axum::Json(json!({
                    "ok": false,
                    "error_code": 400,
                    "description": "Bad Request: chat not found",
                })),
            )
                .into_response(),
            (Some("broken"), _) => (StatusCode::BAD_GATEWAY, "upstream down").into_response(),
            (None, "file/bot123:abc/photos/a.jpg") => "jpeg-bytes".into_response(),
            // The connection drops after the first chunk.
            (None, "file/bot123:abc/photos/cut.jpg") => {
                let chunks = futures::stream::iter([
                    Ok(Bytes::from_static(b"jpeg")),
                    Err(std::io::Error::other("connection lost")),
                ]);
                axum::body::Body::from_stream(chunks).into_response()
            }
            _ => StatusCode::NOT_FOUND.into_response(),
        }
    }

    async fn spawn_fake_api() -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let router = Router::new().route("/{*path}", any(fake_api));
        tokio::spawn(async move { axum::serve(listener, router).await.unwrap() });
        format!("http://{addr}/")
    }

    async fn client() -> HttpApi {
        HttpApi::with_config(TOKEN, spawn_fake_api().await, Duration::from_secs(5)).unwrap()
    }

    #[test]
    fn test_empty_token_is_rejected() {
        assert!(matches!(
            HttpApi::new(""),
            Err(TransportError::InvalidConfig(_))
        ));
    }

    #[tokio::test]
    async fn test_result_is_unwrapped() {
        let api = client().await;
        let params = json!({ "chat_id": 42, "text": "hi" });
        assert_eq!(api.call("echo", params.clone()).await.unwrap(), params);

        let me = Api::new(api).get_me().await.unwrap();
        assert_eq!(me.username.as_deref(), Some("test_bot"));
    }

    #[tokio::test]
    async fn test_remote_error_carries_code_and_description() {
        let api = client().await;

        let err = api.call("banChatMember", json!({})).await.unwrap_err();
        assert!(matches!(
            err,
            ApiError::Remote { code: 400, ref description } if description == "Bad Request: chat not found"
        ));

        let err = api.call("broken", json!({})).await.unwrap_err();
        assert!(matches!(err, ApiError::Remote { code: 502, .. }));
    }

    #[tokio::test]
    async fn test_download_streams_to_disk() {
        let api = client().await;
        let dir = tempfile::tempdir().unwrap();
        let dest = dir.path().join("nested/a.jpg");

        let written = api.download("photos/a.jpg", &dest).await.unwrap();
        assert_eq!(written, 10);
        assert_eq!(std::fs::read(&dest).unwrap(), b"jpeg-bytes");

        let err = api.download("photos/missing.jpg", &dest).await.unwrap_err();
        assert!(matches!(err, ApiError::Download(_)));
    }

    #[tokio::test]
    async fn test_interrupted_download_keeps_existing_file() {
        let api = client().await;
        let dir = tempfile::tempdir().unwrap();
        let dest = dir.path().join("a.jpg");
        std::fs::write(&dest, b"previous").unwrap();

        let err = api.download("photos/cut.jpg", &dest).await.unwrap_err();
        assert!(matches!(err, ApiError::Download(_)));
        assert_eq!(std::fs::read(&dest).unwrap(), b"previous");
        assert!(!part_path(&dest).exists());

        api.download("photos/a.jpg", &dest).await.unwrap();
        assert_eq!(std::fs::read(&dest).unwrap(), b"jpeg-bytes");
    }

    #[tokio::test]
    async fn test_with_token_targets_other_bot() {
        let api = client().await;
        let other = api.with_token("999:zzz");
        assert_eq!(other.base_url(), api.base_url());
        assert!(other.method_url("getMe").contains("/bot999:zzz/getMe"));
    }
}
