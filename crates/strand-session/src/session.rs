//! The session contract an orchestrator drives.

use async_trait::async_trait;
use strand_core::SessionId;

use crate::errors::Result;
use crate::items::ResponseItem;

/// Ordered conversation history with delete-like and reset-like operations.
///
/// An orchestrator calls [`get_items`](Session::get_items) before generating
/// a reply and [`add_items`](Session::add_items) after it. Calls on one
/// session are expected to be sequential.
#[async_trait]
pub trait Session: Send + Sync {
    /// Conversation this session views.
    fn session_id(&self) -> &SessionId;

    /// Visible items, oldest first. With a limit, only the most recent
    /// `limit` items.
    async fn get_items(&self, limit: Option<usize>) -> Result<Vec<ResponseItem>>;

    /// Append items in order. Items without text are skipped.
    async fn add_items(&self, items: Vec<ResponseItem>) -> Result<()>;

    /// Remove the most recent item from the view and return it, or `None`
    /// when there is nothing to pop.
    async fn pop_item(&self) -> Result<Option<ResponseItem>>;

    /// Hide all history from the view until the next write.
    async fn clear_session(&self) -> Result<()>;
}
