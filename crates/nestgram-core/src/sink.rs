//! The consumer side of update sources.

use std::sync::Arc;

use async_trait::async_trait;

use crate::update::Update;

/// Receives updates from an update source (polling loop or webhook listener).
///
/// Implementations must not fail: whatever goes wrong while processing an
/// update is handled and logged inside `handle_update`, so that the source
/// can move on to the next update.
#[async_trait]
pub trait UpdateHandler: Send + Sync {
    /// Processes one update to completion.
    async fn handle_update(&self, update: Update);
}

/// Type-erased [`UpdateHandler`].
pub type BoxedUpdateHandler = Arc<dyn UpdateHandler>;

#[async_trait]
impl<T: UpdateHandler + ?Sized> UpdateHandler for Arc<T> {
    async fn handle_update(&self, update: Update) {
        (**self).handle_update(update).await
    }
}
