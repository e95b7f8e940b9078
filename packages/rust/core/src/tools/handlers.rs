//! Handlers behind the built-in content tools.

use std::str::FromStr;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use tracing::{debug, instrument, warn};

use pageforge_media::MediaFetcher;
use pageforge_shared::{
    AutomationConfig, ContentItem, ContentStatus, ContentType, ItemId, ItemPatch, NewContentItem,
    PageForgeError, Result, Taxonomy,
};
use pageforge_storage::ContentStore;

use super::dispatch::{ToolArgs, ToolHandler, ToolTable};
use super::registry::{
    DEFAULT_SEPARATOR, append_section_spec, generate_page_spec, generate_seo_post_spec,
};
use crate::structured_data::{JSON_LD_META_KEY, encode_json_ld};

pub const PAGE_TEMPLATE_META_KEY: &str = "_page_template";
pub const FOCUS_KEYWORD_META_KEY: &str = "focus_keyword";
pub const META_DESCRIPTION_META_KEY: &str = "meta_description";

/// Table holding the three content tools, wired to `store` and `media`.
pub fn default_tool_table(
    store: Arc<dyn ContentStore>,
    media: Option<Arc<dyn MediaFetcher>>,
) -> ToolTable {
    let mut table = ToolTable::new();
    table.insert(
        generate_seo_post_spec(),
        Arc::new(GenerateSeoPost::new(store.clone(), media.clone())),
    );
    table.insert(
        generate_page_spec(),
        Arc::new(GeneratePage::new(store.clone(), media)),
    );
    table.insert(append_section_spec(), Arc::new(AppendSection::new(store)));
    table
}

// ---------------------------------------------------------------------------
// Argument access
// ---------------------------------------------------------------------------

fn str_arg<'a>(args: &'a ToolArgs, name: &str) -> Option<&'a str> {
    args.get(name).and_then(Value::as_str)
}

fn required_str<'a>(args: &'a ToolArgs, name: &str) -> Result<&'a str> {
    str_arg(args, name)
        .ok_or_else(|| PageForgeError::validation(format!("Missing required fields: {name}")))
}

fn list_arg(args: &ToolArgs, name: &str) -> Vec<String> {
    args.get(name)
        .and_then(Value::as_array)
        .map(|entries| {
            entries
                .iter()
                .filter_map(Value::as_str)
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default()
}

fn id_arg(args: &ToolArgs, name: &str) -> Option<ItemId> {
    let value = args.get(name)?;
    let id = value
        .as_i64()
        .or_else(|| value.as_f64().map(|f| f as i64))?;
    (id > 0).then_some(ItemId(id))
}

/// Publication status from `status`; unknown values fall back to draft.
fn status_arg(args: &ToolArgs) -> Option<ContentStatus> {
    str_arg(args, "status").and_then(|s| ContentStatus::from_str(s).ok())
}

// ---------------------------------------------------------------------------
// Shared create flow
// ---------------------------------------------------------------------------

/// Create flow shared by the post and page tools.
///
/// Steps run in a fixed order: insert, taxonomy, featured image, SEO
/// metadata. Only the image step is allowed to fail without failing the call.
struct ItemCreator {
    store: Arc<dyn ContentStore>,
    media: Option<Arc<dyn MediaFetcher>>,
}

impl ItemCreator {
    fn base_item(args: &ToolArgs, content_type: ContentType) -> Result<NewContentItem> {
        let title = required_str(args, "title")?;
        let content = required_str(args, "content")?;

        let mut item = NewContentItem::new(content_type, title, content)
            .with_status(status_arg(args).unwrap_or_default());
        item.slug = str_arg(args, "slug").map(str::to_string);
        item.excerpt = str_arg(args, "excerpt").map(str::to_string);
        item.author = str_arg(args, "author_email").map(str::to_string);
        Ok(item)
    }

    async fn create(
        &self,
        args: &ToolArgs,
        item: NewContentItem,
        config: &AutomationConfig,
    ) -> Result<ContentItem> {
        let content_type = item.kind();
        let id = self.store.create(item).await?;
        debug!(%id, %content_type, "item created");

        let categories = list_arg(args, "categories");
        if !categories.is_empty() && content_type == ContentType::Post {
            self.store
                .set_taxonomy(id, Taxonomy::Category, &categories)
                .await?;
        }
        let tags = list_arg(args, "tags");
        if !tags.is_empty() {
            self.store.set_taxonomy(id, Taxonomy::PostTag, &tags).await?;
        }

        if let Some(url) = str_arg(args, "featured_image_url") {
            self.attach_featured_image(id, url).await;
        }

        self.write_seo_meta(id, args, config).await?;

        self.store
            .get_by_id(id)
            .await?
            .ok_or_else(|| PageForgeError::not_found(format!("content item {id} not found")))
    }

    async fn attach_featured_image(&self, id: ItemId, url: &str) {
        let Some(media) = &self.media else {
            warn!(%id, url, "no media fetcher configured, featured image skipped");
            return;
        };
        let attached = match media.fetch(url).await {
            Ok(media_ref) => self.store.attach_media(id, &media_ref).await,
            Err(e) => Err(e),
        };
        match attached {
            Ok(media_id) => debug!(%id, media_id, "featured image attached"),
            Err(e) => warn!(%id, url, error = %e, "featured image failed"),
        }
    }

    async fn write_seo_meta(
        &self,
        id: ItemId,
        args: &ToolArgs,
        config: &AutomationConfig,
    ) -> Result<()> {
        if config.write_focus_meta {
            for key in [FOCUS_KEYWORD_META_KEY, META_DESCRIPTION_META_KEY] {
                if let Some(value) = str_arg(args, key) {
                    self.store
                        .set_metadata(id, key, Value::String(value.to_string()))
                        .await?;
                }
            }
        }
        if let Some(doc) = args.get(JSON_LD_META_KEY) {
            let encoded = encode_json_ld(doc)?;
            self.store
                .set_metadata(id, JSON_LD_META_KEY, Value::String(encoded))
                .await?;
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// generate_seo_post
// ---------------------------------------------------------------------------

pub struct GenerateSeoPost {
    creator: ItemCreator,
}

impl GenerateSeoPost {
    pub fn new(store: Arc<dyn ContentStore>, media: Option<Arc<dyn MediaFetcher>>) -> Self {
        Self {
            creator: ItemCreator { store, media },
        }
    }
}

#[async_trait]
impl ToolHandler for GenerateSeoPost {
    #[instrument(skip_all, fields(tool = "generate_seo_post"))]
    async fn call(&self, args: &ToolArgs, config: &AutomationConfig) -> Result<ContentItem> {
        let content_type = match str_arg(args, "post_type") {
            Some(raw) => ContentType::from_str(raw)?,
            None => ContentType::Post,
        };
        let item = ItemCreator::base_item(args, content_type)?;
        self.creator.create(args, item, config).await
    }
}

// ---------------------------------------------------------------------------
// generate_page
// ---------------------------------------------------------------------------

pub struct GeneratePage {
    creator: ItemCreator,
}

impl GeneratePage {
    pub fn new(store: Arc<dyn ContentStore>, media: Option<Arc<dyn MediaFetcher>>) -> Self {
        Self {
            creator: ItemCreator { store, media },
        }
    }
}

#[async_trait]
impl ToolHandler for GeneratePage {
    #[instrument(skip_all, fields(tool = "generate_page"))]
    async fn call(&self, args: &ToolArgs, config: &AutomationConfig) -> Result<ContentItem> {
        let mut item = ItemCreator::base_item(args, ContentType::Page)?;
        item.parent_id = id_arg(args, "parent_id");
        if let Some(template) = str_arg(args, "template") {
            item = item.with_meta(PAGE_TEMPLATE_META_KEY, template);
        }
        self.creator.create(args, item, config).await
    }
}

// ---------------------------------------------------------------------------
// append_section_to_post
// ---------------------------------------------------------------------------

/// Appends `separator + section_html` to an item body. Each call appends
/// again; there is no duplicate detection.
pub struct AppendSection {
    store: Arc<dyn ContentStore>,
}

impl AppendSection {
    pub fn new(store: Arc<dyn ContentStore>) -> Self {
        Self { store }
    }

    async fn resolve(&self, args: &ToolArgs) -> Result<ContentItem> {
        if let Some(id) = id_arg(args, "post_id") {
            if let Some(item) = self.store.get_by_id(id).await? {
                return Ok(item);
            }
            debug!(%id, "post_id did not resolve, trying slug");
        }
        if let Some(slug) = str_arg(args, "slug") {
            if let Some(item) = self.store.get_by_slug(slug).await? {
                return Ok(item);
            }
        }
        Err(PageForgeError::not_found(
            "Target post not found (need post_id or slug)",
        ))
    }
}

#[async_trait]
impl ToolHandler for AppendSection {
    #[instrument(skip_all, fields(tool = "append_section_to_post"))]
    async fn call(&self, args: &ToolArgs, _config: &AutomationConfig) -> Result<ContentItem> {
        let section = required_str(args, "section_html")?;
        let separator = str_arg(args, "separator").unwrap_or(DEFAULT_SEPARATOR);
        let target = self.resolve(args).await?;

        let body = format!("{}{separator}{section}", target.body);
        let patch = ItemPatch {
            body: Some(body),
            status: status_arg(args),
            ..Default::default()
        };
        self.store.update(target.id, patch).await?;

        self.store.get_by_id(target.id).await?.ok_or_else(|| {
            PageForgeError::not_found(format!("content item {} not found", target.id))
        })
    }
}
