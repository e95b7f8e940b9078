//! Public and admin URLs for stored items.

use url::Url;

use pageforge_shared::{ContentItem, PageForgeError, Result};

/// Derives `view_link` and `edit_link` from the configured site base URL.
#[derive(Debug, Clone)]
pub struct SiteLinks {
    base: Url,
}

impl SiteLinks {
    pub fn new(base_url: &str) -> Result<Self> {
        let mut base = Url::parse(base_url)
            .map_err(|e| PageForgeError::config(format!("invalid site base_url '{base_url}': {e}")))?;
        if !base.path().ends_with('/') {
            let path = format!("{}/", base.path());
            base.set_path(&path);
        }
        Ok(Self { base })
    }

    /// Public permalink: `{base}{slug}/`, or `{base}?p={id}` without a slug.
    pub fn view_link(&self, item: &ContentItem) -> String {
        match item.slug.as_deref().filter(|s| !s.is_empty()) {
            Some(slug) => self
                .base
                .join(&format!("{slug}/"))
                .map(String::from)
                .unwrap_or_else(|_| format!("{}{slug}/", self.base)),
            None => format!("{}?p={}", self.base, item.id),
        }
    }

    pub fn edit_link(&self, item: &ContentItem) -> String {
        format!("{}admin/items/{}/edit", self.base, item.id)
    }
}
