//! Remote IP-list gateways.

pub mod cloudflare;

use crate::decision::{ItemCreateRequest, ItemDeleteRequest, ListItem};
use crate::error::RemoteError;
use async_trait::async_trait;

/// Batch operations on a remote IP list.
#[async_trait]
pub trait ListGateway: Send + Sync {
    /// Create items on the list and return their remote IDs.
    ///
    /// The result may include items that were already on the list.
    async fn create_items(
        &self,
        list_id: &str,
        items: &[ItemCreateRequest],
    ) -> Result<Vec<ListItem>, RemoteError>;

    /// Delete items from the list by remote ID.
    async fn delete_items(
        &self,
        list_id: &str,
        items: &[ItemDeleteRequest],
    ) -> Result<(), RemoteError>;

    /// Every item currently on the list.
    async fn list_items(&self, list_id: &str) -> Result<Vec<ListItem>, RemoteError>;

    /// Gateway name for logging.
    fn name(&self) -> &str;
}
