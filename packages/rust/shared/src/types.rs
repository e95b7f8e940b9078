//! Core domain types for provisioned content.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::PageForgeError;

// ---------------------------------------------------------------------------
// ItemId
// ---------------------------------------------------------------------------

/// Store-assigned identifier of a content item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ItemId(pub i64);

impl std::fmt::Display for ItemId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::str::FromStr for ItemId {
    type Err = std::num::ParseIntError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Ok(Self(s.trim().parse()?))
    }
}

// ---------------------------------------------------------------------------
// Matrix inputs
// ---------------------------------------------------------------------------

/// A target search term with its cost-per-click weight.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Keyword {
    pub term: String,
    pub value: f64,
}

impl Keyword {
    pub fn new(term: impl Into<String>, value: f64) -> Self {
        Self {
            term: term.into(),
            value,
        }
    }
}

/// A target market.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Location {
    pub name: String,
}

impl Location {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }
}

// ---------------------------------------------------------------------------
// Enums
// ---------------------------------------------------------------------------

/// Kind of content item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContentType {
    Landing,
    Calculator,
    Post,
    Page,
}

impl ContentType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Landing => "landing",
            Self::Calculator => "calculator",
            Self::Post => "post",
            Self::Page => "page",
        }
    }
}

impl std::fmt::Display for ContentType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for ContentType {
    type Err = PageForgeError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "landing" | "landing_page" => Ok(Self::Landing),
            "calculator" => Ok(Self::Calculator),
            "post" => Ok(Self::Post),
            "page" => Ok(Self::Page),
            other => Err(PageForgeError::validation(format!(
                "unknown content type '{other}'"
            ))),
        }
    }
}

/// Publication status of a content item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContentStatus {
    #[default]
    Draft,
    Publish,
    Private,
}

impl ContentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Draft => "draft",
            Self::Publish => "publish",
            Self::Private => "private",
        }
    }
}

impl std::fmt::Display for ContentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for ContentStatus {
    type Err = PageForgeError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "draft" => Ok(Self::Draft),
            "publish" => Ok(Self::Publish),
            "private" => Ok(Self::Private),
            other => Err(PageForgeError::validation(format!(
                "unknown status '{other}'"
            ))),
        }
    }
}

/// Taxonomy a term list is assigned under.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Taxonomy {
    Category,
    PostTag,
}

impl Taxonomy {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Category => "category",
            Self::PostTag => "post_tag",
        }
    }
}

/// Recurring period a scheduled job fires on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Cadence {
    Hourly,
    Daily,
}

impl Cadence {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Hourly => "hourly",
            Self::Daily => "daily",
        }
    }

    /// Length of one cadence period.
    pub fn period(&self) -> chrono::Duration {
        match self {
            Self::Hourly => chrono::Duration::hours(1),
            Self::Daily => chrono::Duration::days(1),
        }
    }
}

impl std::fmt::Display for Cadence {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Cadence {
    type Err = PageForgeError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "hourly" => Ok(Self::Hourly),
            "daily" => Ok(Self::Daily),
            other => Err(PageForgeError::validation(format!(
                "unknown cadence '{other}': expected 'hourly' or 'daily'"
            ))),
        }
    }
}

// ---------------------------------------------------------------------------
// ContentItem
// ---------------------------------------------------------------------------

/// Free-form per-item metadata. Values are strings or JSON objects.
pub type Metadata = BTreeMap<String, Value>;

/// A provisioned unit of content as held by the content store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContentItem {
    pub id: ItemId,
    #[serde(rename = "type")]
    pub content_type: ContentType,
    pub title: String,
    pub body: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub slug: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub excerpt: Option<String>,
    pub status: ContentStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub author: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_id: Option<ItemId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub keyword: Option<Keyword>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<Location>,
    #[serde(default)]
    pub metadata: Metadata,
    pub auto_generated: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Field set for an item that has not been stored yet.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct NewContentItem {
    pub content_type: Option<ContentType>,
    pub title: String,
    pub body: String,
    pub slug: Option<String>,
    pub excerpt: Option<String>,
    pub status: ContentStatus,
    pub author: Option<String>,
    pub parent_id: Option<ItemId>,
    pub keyword: Option<Keyword>,
    pub location: Option<Location>,
    pub metadata: Metadata,
    pub auto_generated: bool,
}

impl NewContentItem {
    pub fn new(content_type: ContentType, title: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            content_type: Some(content_type),
            title: title.into(),
            body: body.into(),
            ..Default::default()
        }
    }

    /// Type of the item; posts when unset.
    pub fn kind(&self) -> ContentType {
        self.content_type.unwrap_or(ContentType::Post)
    }

    pub fn with_status(mut self, status: ContentStatus) -> Self {
        self.status = status;
        self
    }

    pub fn with_keyword(mut self, keyword: Keyword) -> Self {
        self.keyword = Some(keyword);
        self
    }

    pub fn with_location(mut self, location: Location) -> Self {
        self.location = Some(location);
        self
    }

    pub fn with_meta(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }

    pub fn auto_generated(mut self) -> Self {
        self.auto_generated = true;
        self
    }
}

/// Partial update applied by [`ContentItem`] mutations.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ItemPatch {
    pub title: Option<String>,
    pub body: Option<String>,
    pub status: Option<ContentStatus>,
}

impl ItemPatch {
    pub fn is_empty(&self) -> bool {
        self.title.is_none() && self.body.is_none() && self.status.is_none()
    }
}

/// Conjunctive filter for store lookups. Unset fields match anything.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ItemFilter {
    pub content_type: Option<ContentType>,
    pub status: Option<ContentStatus>,
    pub auto_generated: Option<bool>,
    pub keyword_term: Option<String>,
    pub location_name: Option<String>,
    pub created_since: Option<DateTime<Utc>>,
}

impl ItemFilter {
    /// Filter selecting the auto-generated landing item for a dedup key.
    pub fn landing_key(keyword: &Keyword, location: &Location) -> Self {
        Self {
            content_type: Some(ContentType::Landing),
            auto_generated: Some(true),
            keyword_term: Some(keyword.term.clone()),
            location_name: Some(location.name.clone()),
            ..Default::default()
        }
    }

    pub fn of_type(content_type: ContentType) -> Self {
        Self {
            content_type: Some(content_type),
            ..Default::default()
        }
    }

    pub fn with_status(mut self, status: ContentStatus) -> Self {
        self.status = Some(status);
        self
    }

    pub fn auto_generated(mut self) -> Self {
        self.auto_generated = Some(true);
        self
    }

    pub fn created_since(mut self, since: DateTime<Utc>) -> Self {
        self.created_since = Some(since);
        self
    }

    /// Whether an item satisfies every set field of the filter.
    pub fn matches(&self, item: &ContentItem) -> bool {
        self.content_type.is_none_or(|t| item.content_type == t)
            && self.status.is_none_or(|s| item.status == s)
            && self.auto_generated.is_none_or(|a| item.auto_generated == a)
            && self.keyword_term.as_ref().is_none_or(|term| {
                item.keyword.as_ref().is_some_and(|k| &k.term == term)
            })
            && self.location_name.as_ref().is_none_or(|name| {
                item.location.as_ref().is_some_and(|l| &l.name == name)
            })
            && self.created_since.is_none_or(|since| item.created_at >= since)
    }
}

// ---------------------------------------------------------------------------
// MediaRef
// ---------------------------------------------------------------------------

/// A media file already written to local storage, ready to attach.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MediaRef {
    /// Absolute path of the stored file.
    pub file_path: String,
    /// Original file name from the source URL.
    pub file_name: String,
    /// MIME type reported by the source.
    pub mime_type: String,
    /// SHA-256 hex digest of the file bytes.
    pub sha256: String,
    /// URL the file was fetched from.
    pub source_url: String,
    pub byte_len: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn landing(term: &str, location: &str) -> ContentItem {
        ContentItem {
            id: ItemId(1),
            content_type: ContentType::Landing,
            title: "t".into(),
            body: "b".into(),
            slug: None,
            excerpt: None,
            status: ContentStatus::Publish,
            author: None,
            parent_id: None,
            keyword: Some(Keyword::new(term, 10.0)),
            location: Some(Location::new(location)),
            metadata: Metadata::new(),
            auto_generated: true,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn item_id_parses() {
        let id: ItemId = " 42 ".parse().expect("parse ItemId");
        assert_eq!(id, ItemId(42));
        assert_eq!(id.to_string(), "42");
    }

    #[test]
    fn content_type_accepts_legacy_landing_name() {
        assert_eq!("landing_page".parse::<ContentType>().unwrap(), ContentType::Landing);
        assert!("attachment".parse::<ContentType>().is_err());
    }

    #[test]
    fn status_rejects_unknown() {
        assert_eq!("publish".parse::<ContentStatus>().unwrap(), ContentStatus::Publish);
        assert!("trash".parse::<ContentStatus>().is_err());
    }

    #[test]
    fn cadence_periods() {
        assert_eq!(Cadence::Hourly.period(), chrono::Duration::hours(1));
        assert_eq!(Cadence::Daily.period(), chrono::Duration::hours(24));
    }

    #[test]
    fn landing_key_filter_matches_exact_pair() {
        let item = landing("hard money lenders", "Aspen CO");
        let hit = ItemFilter::landing_key(&Keyword::new("hard money lenders", 98.0), &Location::new("Aspen CO"));
        let miss = ItemFilter::landing_key(&Keyword::new("hard money lenders", 98.0), &Location::new("Malibu CA"));
        assert!(hit.matches(&item));
        assert!(!miss.matches(&item));
    }

    #[test]
    fn item_serializes_type_field() {
        let item = landing("roi", "Naples FL");
        let json = serde_json::to_value(&item).expect("serialize");
        assert_eq!(json["type"], "landing");
        assert_eq!(json["location"], "Naples FL");
    }
}
