//! Shared types, error model, and configuration for PageForge.
//!
//! This crate is the foundation depended on by all other PageForge crates.
//! It provides:
//! - [`PageForgeError`]: the unified error type
//! - Domain types ([`ContentItem`], [`Keyword`], [`Location`], [`ItemFilter`], ...)
//! - Configuration ([`AppConfig`], [`AutomationConfig`], config loading)

pub mod config;
pub mod error;
pub mod types;

// Re-export public API at crate root for ergonomic imports.
pub use config::{
    AppConfig, AutomationConfig, AutomationSection, Feature, MatrixConfig, MediaConfig,
    SeoConfig, SiteConfig, StorageConfig, config_dir, config_file_path, init_config, load_config,
    load_config_from, resolve_path, validate_config,
};
pub use error::{PageForgeError, Result};
pub use types::{
    Cadence, ContentItem, ContentStatus, ContentType, ItemFilter, ItemId, ItemPatch, Keyword,
    Location, MediaRef, Metadata, NewContentItem, Taxonomy,
};
