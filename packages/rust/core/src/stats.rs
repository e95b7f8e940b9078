//! Content counters for the admin overview.

use chrono::{DateTime, Datelike, TimeZone, Utc};
use serde::Serialize;
use tracing::instrument;

use pageforge_shared::{ContentStatus, ContentType, ItemFilter, PageForgeError, Result};
use pageforge_storage::ContentStore;

/// Snapshot of how much content exists, by kind.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ContentStats {
    pub landing_pages: usize,
    pub calculators: usize,
    pub posts: usize,
    pub pages: usize,
    pub auto_generated: usize,
    /// Auto-generated posts published since the start of the current month.
    pub monthly_auto_posts: usize,
}

/// First instant of `now`'s calendar month, UTC.
pub fn month_start(now: DateTime<Utc>) -> Result<DateTime<Utc>> {
    Utc.with_ymd_and_hms(now.year(), now.month(), 1, 0, 0, 0)
        .single()
        .ok_or_else(|| PageForgeError::validation(format!("no month start for {now}")))
}

/// Published auto-generated posts created this month.
pub async fn monthly_auto_posts(store: &dyn ContentStore, now: DateTime<Utc>) -> Result<usize> {
    let filter = ItemFilter::of_type(ContentType::Post)
        .with_status(ContentStatus::Publish)
        .auto_generated()
        .created_since(month_start(now)?);
    store.count(&filter).await
}

#[instrument(skip(store))]
pub async fn collect_stats(store: &dyn ContentStore, now: DateTime<Utc>) -> Result<ContentStats> {
    Ok(ContentStats {
        landing_pages: store.count(&ItemFilter::of_type(ContentType::Landing)).await?,
        calculators: store.count(&ItemFilter::of_type(ContentType::Calculator)).await?,
        posts: store.count(&ItemFilter::of_type(ContentType::Post)).await?,
        pages: store.count(&ItemFilter::of_type(ContentType::Page)).await?,
        auto_generated: store.count(&ItemFilter::default().auto_generated()).await?,
        monthly_auto_posts: monthly_auto_posts(store, now).await?,
    })
}

#[cfg(test)]
mod tests {
    use pageforge_shared::NewContentItem;

    use super::*;
    use crate::testing::MemoryStore;

    #[test]
    fn month_start_truncates() {
        let now = Utc.with_ymd_and_hms(2026, 10, 16, 13, 45, 2).unwrap();
        assert_eq!(
            month_start(now).unwrap(),
            Utc.with_ymd_and_hms(2026, 10, 1, 0, 0, 0).unwrap()
        );
    }

    #[tokio::test]
    async fn counts_only_published_auto_posts() {
        let store = MemoryStore::new();
        let post = |title: &str| NewContentItem::new(ContentType::Post, title, "body");

        store
            .create(post("a").with_status(ContentStatus::Publish).auto_generated())
            .await
            .unwrap();
        store
            .create(post("b").with_status(ContentStatus::Publish).auto_generated())
            .await
            .unwrap();
        store.create(post("draft").auto_generated()).await.unwrap();
        store
            .create(post("manual").with_status(ContentStatus::Publish))
            .await
            .unwrap();
        store
            .create(
                NewContentItem::new(ContentType::Landing, "l", "b")
                    .with_status(ContentStatus::Publish)
                    .auto_generated(),
            )
            .await
            .unwrap();

        let now = Utc::now();
        assert_eq!(monthly_auto_posts(&store, now).await.unwrap(), 2);

        let stats = collect_stats(&store, now).await.unwrap();
        assert_eq!(stats.posts, 4);
        assert_eq!(stats.landing_pages, 1);
        assert_eq!(stats.auto_generated, 4);
        assert_eq!(stats.monthly_auto_posts, 2);
    }

    #[tokio::test]
    async fn earlier_months_are_excluded() {
        let store = MemoryStore::new();
        store
            .create(
                NewContentItem::new(ContentType::Post, "a", "b")
                    .with_status(ContentStatus::Publish)
                    .auto_generated(),
            )
            .await
            .unwrap();
        let next_month = Utc::now() + chrono::Duration::days(40);
        assert_eq!(monthly_auto_posts(&store, next_month).await.unwrap(), 0);
    }
}
