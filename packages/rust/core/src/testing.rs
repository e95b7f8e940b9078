//! In-memory recording store used by unit tests.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::Utc;
use serde_json::Value;

use pageforge_shared::{
    ContentItem, ContentType, ItemFilter, ItemId, ItemPatch, MediaRef, NewContentItem,
    PageForgeError, Result, Taxonomy,
};
use pageforge_storage::{ContentStore, THUMBNAIL_META_KEY};

#[derive(Default)]
struct Inner {
    items: Vec<ContentItem>,
    terms: HashMap<(ItemId, Taxonomy), Vec<String>>,
    media: Vec<(ItemId, MediaRef)>,
    creates: usize,
    updates: usize,
    meta_writes: usize,
    fail_creates: Option<String>,
}

/// Vec-backed [`ContentStore`] that counts writes.
#[derive(Default)]
pub(crate) struct MemoryStore {
    inner: Mutex<Inner>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every subsequent `create` fail with a storage error.
    pub fn fail_creates(&self, message: &str) {
        self.lock().fail_creates = Some(message.to_string());
    }

    pub fn creates(&self) -> usize {
        self.lock().creates
    }

    pub fn updates(&self) -> usize {
        self.lock().updates
    }

    /// Total create, update, taxonomy, media and metadata writes.
    pub fn writes(&self) -> usize {
        let inner = self.lock();
        inner.creates + inner.updates + inner.meta_writes + inner.media.len() + inner.terms.len()
    }

    pub fn items(&self) -> Vec<ContentItem> {
        self.lock().items.clone()
    }

    pub fn terms(&self, id: ItemId, taxonomy: Taxonomy) -> Vec<String> {
        self.lock()
            .terms
            .get(&(id, taxonomy))
            .cloned()
            .unwrap_or_default()
    }

    pub fn media(&self) -> Vec<(ItemId, MediaRef)> {
        self.lock().media.clone()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }
}

fn insert(inner: &mut Inner, item: NewContentItem) -> Result<ItemId> {
    if let Some(message) = &inner.fail_creates {
        return Err(PageForgeError::Storage(message.clone()));
    }
    let id = ItemId(inner.items.len() as i64 + 1);
    let base = item
        .slug
        .clone()
        .unwrap_or_else(|| pageforge_sanitize::sanitize_title(&item.title));
    let mut slug = base.clone();
    let mut suffix = 2;
    while inner.items.iter().any(|i| i.slug.as_deref() == Some(slug.as_str())) {
        slug = format!("{base}-{suffix}");
        suffix += 1;
    }
    let now = Utc::now();
    inner.items.push(ContentItem {
        id,
        content_type: item.kind(),
        title: item.title,
        body: item.body,
        slug: Some(slug),
        excerpt: item.excerpt,
        status: item.status,
        author: item.author,
        parent_id: item.parent_id,
        keyword: item.keyword,
        location: item.location,
        metadata: item.metadata,
        auto_generated: item.auto_generated,
        created_at: now,
        updated_at: now,
    });
    inner.creates += 1;
    Ok(id)
}

#[async_trait]
impl ContentStore for MemoryStore {
    async fn create(&self, item: NewContentItem) -> Result<ItemId> {
        insert(&mut self.lock(), item)
    }

    async fn create_if_absent(
        &self,
        filter: &ItemFilter,
        item: NewContentItem,
    ) -> Result<(ContentItem, bool)> {
        let mut inner = self.lock();
        if let Some(existing) = inner.items.iter().find(|i| filter.matches(i)) {
            return Ok((existing.clone(), false));
        }
        let id = insert(&mut inner, item)?;
        let created = inner.items[(id.0 - 1) as usize].clone();
        Ok((created, true))
    }

    async fn get_by_id(&self, id: ItemId) -> Result<Option<ContentItem>> {
        Ok(self.lock().items.iter().find(|i| i.id == id).cloned())
    }

    async fn get_by_slug(&self, slug: &str) -> Result<Option<ContentItem>> {
        Ok(self
            .lock()
            .items
            .iter()
            .find(|i| {
                i.slug.as_deref() == Some(slug)
                    && matches!(i.content_type, ContentType::Post | ContentType::Page)
            })
            .cloned())
    }

    async fn update(&self, id: ItemId, patch: ItemPatch) -> Result<()> {
        let mut inner = self.lock();
        let item = inner
            .items
            .iter_mut()
            .find(|i| i.id == id)
            .ok_or_else(|| PageForgeError::not_found(format!("content item {id} not found")))?;
        if let Some(title) = patch.title {
            item.title = title;
        }
        if let Some(body) = patch.body {
            item.body = body;
        }
        if let Some(status) = patch.status {
            item.status = status;
        }
        item.updated_at = Utc::now();
        inner.updates += 1;
        Ok(())
    }

    async fn find(&self, filter: &ItemFilter) -> Result<Vec<ContentItem>> {
        Ok(self
            .lock()
            .items
            .iter()
            .filter(|i| filter.matches(i))
            .cloned()
            .collect())
    }

    async fn count(&self, filter: &ItemFilter) -> Result<usize> {
        Ok(self.lock().items.iter().filter(|i| filter.matches(i)).count())
    }

    async fn set_taxonomy(&self, id: ItemId, taxonomy: Taxonomy, terms: &[String]) -> Result<()> {
        self.lock().terms.insert((id, taxonomy), terms.to_vec());
        Ok(())
    }

    async fn attach_media(&self, id: ItemId, media: &MediaRef) -> Result<i64> {
        let mut inner = self.lock();
        let media_id = inner.media.len() as i64 + 1;
        let item = inner
            .items
            .iter_mut()
            .find(|i| i.id == id)
            .ok_or_else(|| PageForgeError::not_found(format!("content item {id} not found")))?;
        item.metadata
            .insert(THUMBNAIL_META_KEY.to_string(), Value::from(media_id));
        inner.media.push((id, media.clone()));
        Ok(media_id)
    }

    async fn set_metadata(&self, id: ItemId, key: &str, value: Value) -> Result<()> {
        let mut inner = self.lock();
        let item = inner
            .items
            .iter_mut()
            .find(|i| i.id == id)
            .ok_or_else(|| PageForgeError::not_found(format!("content item {id} not found")))?;
        item.metadata.insert(key.to_string(), value);
        inner.meta_writes += 1;
        Ok(())
    }
}
