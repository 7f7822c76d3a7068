//! Long-polling update source.
//!
//! A single sequential driver: fetch one batch, dispatch its updates in the
//! order received, advance the offset, repeat. Failed fetches are retried
//! with exponential backoff; the loop only ends when its
//! [`CancellationToken`] fires.
//!
//! ```text
//! getUpdates(offset) ──▶ [u5, u6] ──▶ dispatch u5, dispatch u6 ──▶ offset = 7
//!        ▲                                                            │
//!        └────────────────────────────────────────────────────────────┘
//! ```

use serde_json::Value;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace, warn};

use crate::config::PollingConfig;
use nestgram_core::{Api, ApiResult, BoxedUpdateHandler, parse_update_value, raw_update_id};

/// The polling loop.
pub struct Polling {
    api: Api,
    handler: BoxedUpdateHandler,
    config: PollingConfig,
    offset: Option<i64>,
}

impl Polling {
    pub fn new(api: Api, handler: BoxedUpdateHandler, config: PollingConfig) -> Self {
        Self {
            api,
            handler,
            config,
            offset: None,
        }
    }

    /// Id of the next update to request; `None` before the first update.
    pub fn offset(&self) -> Option<i64> {
        self.offset
    }

    async fn fetch(&self) -> ApiResult<Vec<Value>> {
        let request = self.config.get_updates(self.offset);
        self.api.get_updates(&request).await
    }

    /// Dispatches a batch in order, advancing the offset past each update.
    ///
    /// Updates that fail to parse are logged and skipped; the offset still
    /// moves past them so they are not delivered again.
    async fn dispatch_batch(&mut self, updates: Vec<Value>) {
        for raw in updates {
            let update_id = raw_update_id(&raw);
            match parse_update_value(raw) {
                Ok(update) => self.handler.handle_update(update).await,
                Err(e) => warn!(update_id = ?update_id, error = %e, "Skipping malformed update"),
            }
            if let Some(id) = update_id {
                let next = id + 1;
                self.offset = Some(self.offset.map_or(next, |offset| offset.max(next)));
            }
        }
        trace!(offset = ?self.offset, "Batch dispatched");
    }

    /// Runs one fetch-and-dispatch cycle and returns the batch size.
    pub async fn poll_once(&mut self) -> ApiResult<usize> {
        let updates = self.fetch().await?;
        let count = updates.len();
        self.dispatch_batch(updates).await;
        Ok(count)
    }

    /// Polls until `cancel` fires.
    ///
    /// Cancellation interrupts a pending fetch or backoff sleep but never a
    /// batch that is being dispatched.
    pub async fn run(mut self, cancel: CancellationToken) {
        let retry = self.config.retry.clone();
        let mut delay = retry.initial_delay();

        info!(
            timeout_secs = self.config.timeout_secs,
            limit = self.config.limit,
            "Polling started"
        );

        loop {
            let batch = tokio::select! {
                biased;
                _ = cancel.cancelled() => break,
                batch = self.fetch() => batch,
            };

            match batch {
                Ok(updates) => {
                    delay = retry.initial_delay();
                    if !updates.is_empty() {
                        debug!(count = updates.len(), offset = ?self.offset, "Received updates");
                        self.dispatch_batch(updates).await;
                    }
                }
                Err(e) => {
                    warn!(error = %e, retry_in = ?delay, "Failed to fetch updates");
                    tokio::select! {
                        biased;
                        _ = cancel.cancelled() => break,
                        _ = tokio::time::sleep(delay) => {}
                    }
                    delay = retry.next_delay(delay);
                }
            }
        }

        info!(offset = ?self.offset, "Polling stopped");
    }
}
