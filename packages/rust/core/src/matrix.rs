//! Keyword x location matrix provisioning.
//!
//! Landing items are deduplicated on `(keyword, location)` through the
//! store's `create_if_absent`; blog posts and calculators are not.

use std::sync::{Arc, Mutex};

use chrono::{Datelike, Utc};
use rand::Rng;
use rand::rngs::StdRng;
use serde_json::Value;
use tracing::{debug, info, instrument};

use pageforge_sanitize::titlecase;
use pageforge_shared::{
    ContentItem, ContentStatus, ContentType, ItemFilter, ItemId, Keyword, Location, MatrixConfig,
    NewContentItem, PageForgeError, Result,
};
use pageforge_storage::ContentStore;

use crate::renderer::{ContentRenderer, RenderRequest};

/// Result of provisioning one landing item.
#[derive(Debug, Clone, PartialEq)]
pub enum LandingOutcome {
    /// A new item was written.
    Created(ContentItem),
    /// An auto-generated landing item for the pair already existed.
    Skipped { existing: ItemId },
}

impl LandingOutcome {
    pub fn is_created(&self) -> bool {
        matches!(self, Self::Created(_))
    }
}

/// Generates landing pages, blog posts and calculators from the matrix
/// configuration.
pub struct MatrixProvisioner {
    store: Arc<dyn ContentStore>,
    renderer: Arc<dyn ContentRenderer>,
    matrix: MatrixConfig,
    rng: Mutex<StdRng>,
}

impl MatrixProvisioner {
    pub fn new(
        store: Arc<dyn ContentStore>,
        renderer: Arc<dyn ContentRenderer>,
        matrix: MatrixConfig,
        rng: StdRng,
    ) -> Self {
        Self {
            store,
            renderer,
            matrix,
            rng: Mutex::new(rng),
        }
    }

    pub fn matrix(&self) -> &MatrixConfig {
        &self.matrix
    }

    /// Create the landing item for `(keyword, location)` unless one exists.
    #[instrument(skip_all, fields(keyword = %keyword.term, location = %location.name))]
    pub async fn provision_landing(
        &self,
        keyword: &Keyword,
        location: &Location,
    ) -> Result<LandingOutcome> {
        let title = format!("{} in {}", titlecase(&keyword.term), location.name);
        let body = self.renderer.render(&RenderRequest::Landing { keyword, location });

        let item = NewContentItem::new(ContentType::Landing, title, body)
            .with_status(ContentStatus::Publish)
            .with_keyword(keyword.clone())
            .with_location(location.clone())
            .with_meta("target_keyword", keyword.term.as_str())
            .with_meta("target_location", location.name.as_str())
            .with_meta("cpc_value", keyword.value)
            .auto_generated();

        let filter = ItemFilter::landing_key(keyword, location);
        let (stored, created) = self.store.create_if_absent(&filter, item).await?;

        if created {
            info!(id = %stored.id, title = %stored.title, "landing page created");
            Ok(LandingOutcome::Created(stored))
        } else {
            debug!(existing = %stored.id, "landing page already exists");
            Ok(LandingOutcome::Skipped {
                existing: stored.id,
            })
        }
    }

    /// Landing item for a random keyword and location.
    pub async fn provision_random_landing(&self) -> Result<LandingOutcome> {
        let keyword = self.pick(&self.matrix.keywords, "keywords")?.clone();
        let location = self.pick(&self.matrix.locations, "locations")?.clone();
        self.provision_landing(&keyword, &location).await
    }

    /// Publish a blog post for a random keyword and title pattern.
    #[instrument(skip_all)]
    pub async fn provision_blog_post(&self) -> Result<ContentItem> {
        let keyword = self.pick(&self.matrix.keywords, "keywords")?.clone();
        let pattern = self.pick(&self.matrix.title_patterns, "title patterns")?.clone();

        let title = pattern
            .replace("{keyword}", &titlecase(&keyword.term))
            .replace("{year}", &Utc::now().year().to_string());
        let body = self.renderer.render(&RenderRequest::BlogPost {
            title: &title,
            keyword: &keyword,
        });

        let item = NewContentItem::new(ContentType::Post, title, body)
            .with_status(ContentStatus::Publish)
            .with_keyword(keyword.clone())
            .with_meta("target_keyword", keyword.term.as_str())
            .with_meta("cpc_value", keyword.value)
            .auto_generated();

        let stored = self.create_and_load(item).await?;
        info!(id = %stored.id, title = %stored.title, "blog post created");
        Ok(stored)
    }

    /// Publish a calculator page named `name`.
    #[instrument(skip(self))]
    pub async fn provision_calculator(&self, name: &str) -> Result<ContentItem> {
        let name = name.trim();
        if name.is_empty() {
            return Err(PageForgeError::validation("calculator name is empty"));
        }
        let calculator_type = name.to_lowercase().replace(' ', "_");
        let body = self.renderer.render(&RenderRequest::Calculator {
            name,
            calculator_type: &calculator_type,
        });

        let item = NewContentItem::new(ContentType::Calculator, name, body)
            .with_status(ContentStatus::Publish)
            .with_meta("calculator_type", Value::from(calculator_type))
            .auto_generated();

        let stored = self.create_and_load(item).await?;
        info!(id = %stored.id, title = %stored.title, "calculator created");
        Ok(stored)
    }

    /// Calculator for a random configured name.
    pub async fn provision_random_calculator(&self) -> Result<ContentItem> {
        let name = self.pick(&self.matrix.calculators, "calculators")?.clone();
        self.provision_calculator(&name).await
    }

    /// Provision every `(keyword, location)` pair, keyword-major.
    #[instrument(skip_all, fields(keywords = keywords.len(), locations = locations.len()))]
    pub async fn bootstrap(
        &self,
        keywords: &[Keyword],
        locations: &[Location],
    ) -> Result<Vec<LandingOutcome>> {
        let mut outcomes = Vec::with_capacity(keywords.len() * locations.len());
        for keyword in keywords {
            for location in locations {
                outcomes.push(self.provision_landing(keyword, location).await?);
            }
        }

        let created = outcomes.iter().filter(|o| o.is_created()).count();
        info!(created, skipped = outcomes.len() - created, "bootstrap complete");
        Ok(outcomes)
    }

    /// Bootstrap the leading slice of the configured keywords and locations.
    pub async fn bootstrap_default(&self) -> Result<Vec<LandingOutcome>> {
        let keywords = &self.matrix.keywords
            [..self.matrix.bootstrap_keywords.min(self.matrix.keywords.len())];
        let locations = &self.matrix.locations
            [..self.matrix.bootstrap_locations.min(self.matrix.locations.len())];
        self.bootstrap(keywords, locations).await
    }

    // -----------------------------------------------------------------------
    // Helpers
    // -----------------------------------------------------------------------

    async fn create_and_load(&self, item: NewContentItem) -> Result<ContentItem> {
        let id = self.store.create(item).await?;
        self.store
            .get_by_id(id)
            .await?
            .ok_or_else(|| PageForgeError::Storage(format!("item {id} missing after create")))
    }

    fn pick<'a, T>(&self, choices: &'a [T], what: &str) -> Result<&'a T> {
        if choices.is_empty() {
            return Err(PageForgeError::config(format!("no {what} configured")));
        }
        let index = self
            .rng
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .random_range(0..choices.len());
        Ok(&choices[index])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::renderer::TemplateRenderer;
    use crate::testing::MemoryStore;
    use rand::SeedableRng;

    fn provisioner(store: Arc<MemoryStore>) -> MatrixProvisioner {
        MatrixProvisioner::new(
            store,
            Arc::new(TemplateRenderer),
            MatrixConfig::default(),
            StdRng::seed_from_u64(7),
        )
    }

    #[tokio::test]
    async fn landing_title_and_flags() {
        let store = Arc::new(MemoryStore::new());
        let p = provisioner(store.clone());

        let outcome = p
            .provision_landing(
                &Keyword::new("hard money lenders", 98.0),
                &Location::new("Aspen CO"),
            )
            .await
            .unwrap();

        let LandingOutcome::Created(item) = outcome else {
            panic!("expected Created, got {outcome:?}");
        };
        assert_eq!(item.title, "Hard Money Lenders in Aspen CO");
        assert_eq!(item.content_type, ContentType::Landing);
        assert_eq!(item.status, ContentStatus::Publish);
        assert!(item.auto_generated);
        assert_eq!(item.metadata["target_keyword"], "hard money lenders");
        assert_eq!(item.metadata["target_location"], "Aspen CO");
        assert_eq!(item.metadata["cpc_value"], 98.0);
    }

    #[tokio::test]
    async fn bootstrap_twice_creates_once() {
        let store = Arc::new(MemoryStore::new());
        let p = provisioner(store.clone());
        let keywords = [Keyword::new("roi", 10.0)];
        let locations = [Location::new("Naples FL")];

        let first = p.bootstrap(&keywords, &locations).await.unwrap();
        let second = p.bootstrap(&keywords, &locations).await.unwrap();

        assert!(first[0].is_created());
        assert!(matches!(second[0], LandingOutcome::Skipped { .. }));
        assert_eq!(store.count(&ItemFilter::of_type(ContentType::Landing)).await.unwrap(), 1);
        assert_eq!(store.creates(), 1);
    }

    #[tokio::test]
    async fn bootstrap_is_keyword_major() {
        let store = Arc::new(MemoryStore::new());
        let p = provisioner(store.clone());
        let keywords = [Keyword::new("a", 1.0), Keyword::new("b", 2.0)];
        let locations = [Location::new("X"), Location::new("Y")];

        p.bootstrap(&keywords, &locations).await.unwrap();
        let titles: Vec<String> = store.items().into_iter().map(|i| i.title).collect();
        assert_eq!(titles, ["A in X", "A in Y", "B in X", "B in Y"]);
    }

    #[tokio::test]
    async fn bootstrap_default_uses_three_by_three() {
        let store = Arc::new(MemoryStore::new());
        let p = provisioner(store.clone());

        let outcomes = p.bootstrap_default().await.unwrap();
        assert_eq!(outcomes.len(), 9);
        assert!(outcomes.iter().all(LandingOutcome::is_created));
    }

    #[tokio::test]
    async fn blog_post_uses_pattern_and_keyword() {
        let store = Arc::new(MemoryStore::new());
        let p = provisioner(store.clone());

        let post = p.provision_blog_post().await.unwrap();
        let keyword = post.keyword.clone().expect("keyword recorded");

        assert_eq!(post.content_type, ContentType::Post);
        assert_eq!(post.status, ContentStatus::Publish);
        assert!(post.auto_generated);
        assert!(post.title.contains(&titlecase(&keyword.term)));
        assert!(!post.title.contains('{'));
        assert_eq!(post.metadata["target_keyword"], keyword.term.as_str());
    }

    #[tokio::test]
    async fn blog_posts_are_not_deduplicated() {
        let store = Arc::new(MemoryStore::new());
        let mut matrix = MatrixConfig::default();
        matrix.keywords = vec![Keyword::new("cap rate", 5.0)];
        matrix.title_patterns = vec!["All About {keyword}".into()];
        let p = MatrixProvisioner::new(
            store.clone(),
            Arc::new(TemplateRenderer),
            matrix,
            StdRng::seed_from_u64(1),
        );

        let a = p.provision_blog_post().await.unwrap();
        let b = p.provision_blog_post().await.unwrap();
        assert_eq!(a.title, "All About Cap Rate");
        assert_ne!(a.id, b.id);
        assert_ne!(a.slug, b.slug);
    }

    #[tokio::test]
    async fn same_seed_same_choices() {
        let a = provisioner(Arc::new(MemoryStore::new()));
        let b = provisioner(Arc::new(MemoryStore::new()));
        for _ in 0..5 {
            let x = a.provision_blog_post().await.unwrap();
            let y = b.provision_blog_post().await.unwrap();
            assert_eq!(x.title, y.title);
        }
    }

    #[tokio::test]
    async fn calculator_type_metadata() {
        let store = Arc::new(MemoryStore::new());
        let p = provisioner(store.clone());

        let item = p.provision_calculator("Cap Rate Calculator").await.unwrap();
        assert_eq!(item.content_type, ContentType::Calculator);
        assert_eq!(item.metadata["calculator_type"], "cap_rate_calculator");
        assert_eq!(item.title, "Cap Rate Calculator");
    }

    #[tokio::test]
    async fn empty_matrix_is_config_error() {
        let store = Arc::new(MemoryStore::new());
        let mut matrix = MatrixConfig::default();
        matrix.keywords.clear();
        let p = MatrixProvisioner::new(
            store.clone(),
            Arc::new(TemplateRenderer),
            matrix,
            StdRng::seed_from_u64(1),
        );

        let err = p.provision_blog_post().await.unwrap_err();
        assert!(err.to_string().contains("no keywords configured"));
        assert_eq!(store.creates(), 0);
    }

    #[tokio::test]
    async fn dedup_holds_on_libsql_store() {
        let path = std::env::temp_dir().join(format!("pf_matrix_{}.db", uuid::Uuid::now_v7()));
        let store = Arc::new(pageforge_storage::Storage::open(&path).await.unwrap());
        let p = MatrixProvisioner::new(
            store.clone(),
            Arc::new(TemplateRenderer),
            MatrixConfig::default(),
            StdRng::seed_from_u64(3),
        );

        let first = p.bootstrap_default().await.unwrap();
        let second = p.bootstrap_default().await.unwrap();
        assert!(first.iter().all(LandingOutcome::is_created));
        assert!(second.iter().all(|o| !o.is_created()));
        assert_eq!(store.count(&ItemFilter::of_type(ContentType::Landing)).await.unwrap(), 9);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_landing_requests_create_once() {
        let path = std::env::temp_dir().join(format!("pf_race_{}.db", uuid::Uuid::now_v7()));
        let store = Arc::new(pageforge_storage::Storage::open(&path).await.unwrap());
        let p = Arc::new(MatrixProvisioner::new(
            store.clone(),
            Arc::new(TemplateRenderer),
            MatrixConfig::default(),
            StdRng::seed_from_u64(5),
        ));
        let keyword = Keyword::new("hard money lenders", 98.0);
        let location = Location::new("Aspen CO");

        let mut handles = Vec::new();
        for _ in 0..16 {
            let p = p.clone();
            let keyword = keyword.clone();
            let location = location.clone();
            handles.push(tokio::spawn(async move {
                p.provision_landing(&keyword, &location).await
            }));
        }

        let mut created = Vec::new();
        let mut skipped = Vec::new();
        for handle in handles {
            match handle.await.unwrap().unwrap() {
                LandingOutcome::Created(item) => created.push(item.id),
                LandingOutcome::Skipped { existing } => skipped.push(existing),
            }
        }
        assert_eq!(created.len(), 1);
        assert_eq!(skipped.len(), 15);
        assert!(skipped.iter().all(|id| *id == created[0]));
        assert_eq!(store.count(&ItemFilter::of_type(ContentType::Landing)).await.unwrap(), 1);

        // A second handle on the same file sees the stored pair.
        let reopened = Arc::new(pageforge_storage::Storage::open(&path).await.unwrap());
        let other = MatrixProvisioner::new(
            reopened,
            Arc::new(TemplateRenderer),
            MatrixConfig::default(),
            StdRng::seed_from_u64(6),
        );
        let outcome = other.provision_landing(&keyword, &location).await.unwrap();
        assert_eq!(outcome, LandingOutcome::Skipped { existing: created[0] });
    }
}
