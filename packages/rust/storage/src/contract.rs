//! The content store contract consumed by the provisioning and tool layers.

use async_trait::async_trait;
use serde_json::Value;

use pageforge_shared::{
    ContentItem, ItemFilter, ItemId, ItemPatch, MediaRef, NewContentItem, Result, Taxonomy,
};

/// Create/read/update access to content items, taxonomy, and media.
///
/// Each call is individually atomic. There is no cross-call transaction, so
/// multi-step callers must not rely on earlier steps being undone.
#[async_trait]
pub trait ContentStore: Send + Sync {
    /// Insert a new item and return its id.
    async fn create(&self, item: NewContentItem) -> Result<ItemId>;

    /// Insert `item` unless an item matching `filter` exists.
    ///
    /// Returns the stored item and whether this call created it.
    async fn create_if_absent(
        &self,
        filter: &ItemFilter,
        item: NewContentItem,
    ) -> Result<(ContentItem, bool)>;

    async fn get_by_id(&self, id: ItemId) -> Result<Option<ContentItem>>;

    async fn get_by_slug(&self, slug: &str) -> Result<Option<ContentItem>>;

    /// Apply a partial update. Fails with `NotFound` for unknown ids.
    async fn update(&self, id: ItemId, patch: ItemPatch) -> Result<()>;

    async fn find(&self, filter: &ItemFilter) -> Result<Vec<ContentItem>>;

    async fn count(&self, filter: &ItemFilter) -> Result<usize>;

    /// Replace the item's terms under `taxonomy`, creating missing terms.
    async fn set_taxonomy(&self, id: ItemId, taxonomy: Taxonomy, terms: &[String]) -> Result<()>;

    /// Attach a stored media file and mark it as the item's featured image.
    async fn attach_media(&self, id: ItemId, media: &MediaRef) -> Result<i64>;

    async fn set_metadata(&self, id: ItemId, key: &str, value: Value) -> Result<()>;
}
