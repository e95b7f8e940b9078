//! Application configuration for PageForge.
//!
//! User config lives at `~/.pageforge/pageforge.toml`.
//! The file is re-read by long-running hosts on every scheduler tick, so
//! toggling a flag takes effect within one cadence period.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{PageForgeError, Result};
use crate::types::{Keyword, Location};

/// Default configuration file name.
const CONFIG_FILE_NAME: &str = "pageforge.toml";

/// Default config directory name under the user's home.
const CONFIG_DIR_NAME: &str = ".pageforge";

// ---------------------------------------------------------------------------
// Config structs (matching pageforge.toml schema)
// ---------------------------------------------------------------------------

/// Top-level application config, deserialized from TOML.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Automation enable flags.
    #[serde(default)]
    pub automation: AutomationSection,

    /// Keyword/location matrix and title catalog.
    #[serde(default)]
    pub matrix: MatrixConfig,

    /// Database and media locations.
    #[serde(default)]
    pub storage: StorageConfig,

    /// Public site settings used for links.
    #[serde(default)]
    pub site: SiteConfig,

    /// Remote media fetching.
    #[serde(default)]
    pub media: MediaConfig,

    /// SEO metadata behavior.
    #[serde(default)]
    pub seo: SeoConfig,
}

/// `[automation]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AutomationSection {
    /// Global switch for every scheduled job.
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Daily blog post generation.
    #[serde(default = "default_true")]
    pub auto_blog: bool,

    /// Daily landing page generation.
    #[serde(default = "default_true")]
    pub auto_pages: bool,

    /// Daily revenue optimization hook.
    #[serde(default = "default_true")]
    pub revenue_optimization: bool,
}

impl Default for AutomationSection {
    fn default() -> Self {
        Self {
            enabled: true,
            auto_blog: true,
            auto_pages: true,
            revenue_optimization: true,
        }
    }
}

fn default_true() -> bool {
    true
}

/// `[matrix]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MatrixConfig {
    /// Target keywords with CPC weights.
    #[serde(default = "default_keywords")]
    pub keywords: Vec<Keyword>,

    /// Target markets.
    #[serde(default = "default_locations")]
    pub locations: Vec<Location>,

    /// Calculator page names.
    #[serde(default = "default_calculators")]
    pub calculators: Vec<String>,

    /// Blog title patterns; `{keyword}` and `{year}` are substituted.
    #[serde(default = "default_title_patterns")]
    pub title_patterns: Vec<String>,

    /// How many leading keywords the bootstrap pass seeds.
    #[serde(default = "default_bootstrap_count")]
    pub bootstrap_keywords: usize,

    /// How many leading locations the bootstrap pass seeds.
    #[serde(default = "default_bootstrap_count")]
    pub bootstrap_locations: usize,
}

impl Default for MatrixConfig {
    fn default() -> Self {
        Self {
            keywords: default_keywords(),
            locations: default_locations(),
            calculators: default_calculators(),
            title_patterns: default_title_patterns(),
            bootstrap_keywords: default_bootstrap_count(),
            bootstrap_locations: default_bootstrap_count(),
        }
    }
}

fn default_keywords() -> Vec<Keyword> {
    [
        ("real estate investment analysis", 89.0),
        ("investment property mortgage", 112.0),
        ("commercial real estate financing", 127.0),
        ("property investment calculator", 76.0),
        ("real estate investment software", 65.0),
        ("hard money lenders", 98.0),
        ("real estate investment loans", 134.0),
        ("investment property financing", 87.0),
        ("commercial property loans", 95.0),
        ("real estate investment advisor", 73.0),
    ]
    .into_iter()
    .map(|(term, value)| Keyword::new(term, value))
    .collect()
}

fn default_locations() -> Vec<Location> {
    [
        "Beverly Hills CA",
        "Manhattan NY",
        "Palo Alto CA",
        "Aspen CO",
        "Hamptons NY",
        "Malibu CA",
        "Greenwich CT",
        "Scottsdale AZ",
        "Naples FL",
        "Jackson Hole WY",
    ]
    .into_iter()
    .map(Location::new)
    .collect()
}

fn default_calculators() -> Vec<String> {
    [
        "Cash Flow Calculator",
        "ROI Calculator",
        "Cap Rate Calculator",
        "BRRRR Calculator",
        "Rental Yield Calculator",
    ]
    .into_iter()
    .map(String::from)
    .collect()
}

fn default_title_patterns() -> Vec<String> {
    [
        "Ultimate Guide to {keyword} in {year}",
        "How to Master {keyword}: Expert Tips",
        "The Complete {keyword} Strategy",
        "5 Mistakes to Avoid with {keyword}",
        "Why {keyword} is Crucial for Success",
    ]
    .into_iter()
    .map(String::from)
    .collect()
}

fn default_bootstrap_count() -> usize {
    3
}

/// `[storage]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// libSQL database file.
    #[serde(default = "default_database_path")]
    pub database_path: String,

    /// Directory sideloaded media is written to.
    #[serde(default = "default_media_dir")]
    pub media_dir: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            database_path: default_database_path(),
            media_dir: default_media_dir(),
        }
    }
}

fn default_database_path() -> String {
    "~/.pageforge/content.db".into()
}
fn default_media_dir() -> String {
    "~/.pageforge/media".into()
}

/// `[site]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SiteConfig {
    /// Public base URL; view and edit links are derived from it.
    #[serde(default = "default_base_url")]
    pub base_url: String,
}

impl Default for SiteConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
        }
    }
}

fn default_base_url() -> String {
    "http://localhost:8080/".into()
}

/// `[media]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MediaConfig {
    /// Upper bound on a single image download.
    #[serde(default = "default_media_timeout")]
    pub timeout_secs: u64,

    /// Largest accepted image body.
    #[serde(default = "default_max_bytes")]
    pub max_bytes: u64,

    /// Permit fetching from loopback/private addresses.
    #[serde(default)]
    pub allow_private_hosts: bool,
}

impl Default for MediaConfig {
    fn default() -> Self {
        Self {
            timeout_secs: default_media_timeout(),
            max_bytes: default_max_bytes(),
            allow_private_hosts: false,
        }
    }
}

fn default_media_timeout() -> u64 {
    30
}
fn default_max_bytes() -> u64 {
    10 * 1024 * 1024
}

/// `[seo]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SeoConfig {
    /// Store `focus_keyword` and `meta_description` when supplied.
    #[serde(default = "default_true")]
    pub write_focus_meta: bool,
}

impl Default for SeoConfig {
    fn default() -> Self {
        Self {
            write_focus_meta: true,
        }
    }
}

// ---------------------------------------------------------------------------
// Automation config (runtime, sampled once per invocation)
// ---------------------------------------------------------------------------

/// Feature gate consulted by scheduled jobs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Feature {
    Blog,
    Pages,
    Revenue,
}

/// Snapshot of the enable flags, passed into every tick and tool call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AutomationConfig {
    pub enabled: bool,
    pub auto_blog: bool,
    pub auto_pages: bool,
    pub revenue_optimization: bool,
    /// Whether SEO focus metadata is written by tool handlers.
    pub write_focus_meta: bool,
}

impl AutomationConfig {
    /// Everything on.
    pub fn all_enabled() -> Self {
        Self {
            enabled: true,
            auto_blog: true,
            auto_pages: true,
            revenue_optimization: true,
            write_focus_meta: true,
        }
    }

    pub fn feature_enabled(&self, feature: Feature) -> bool {
        match feature {
            Feature::Blog => self.auto_blog,
            Feature::Pages => self.auto_pages,
            Feature::Revenue => self.revenue_optimization,
        }
    }
}

impl Default for AutomationConfig {
    fn default() -> Self {
        Self::all_enabled()
    }
}

impl From<&AppConfig> for AutomationConfig {
    fn from(config: &AppConfig) -> Self {
        Self {
            enabled: config.automation.enabled,
            auto_blog: config.automation.auto_blog,
            auto_pages: config.automation.auto_pages,
            revenue_optimization: config.automation.revenue_optimization,
            write_focus_meta: config.seo.write_focus_meta,
        }
    }
}

// ---------------------------------------------------------------------------
// Config loading
// ---------------------------------------------------------------------------

/// Get the path to the config directory (`~/.pageforge/`).
pub fn config_dir() -> Result<PathBuf> {
    let home =
        dirs::home_dir().ok_or_else(|| PageForgeError::config("could not determine home directory"))?;
    Ok(home.join(CONFIG_DIR_NAME))
}

/// Get the path to the config file (`~/.pageforge/pageforge.toml`).
pub fn config_file_path() -> Result<PathBuf> {
    Ok(config_dir()?.join(CONFIG_FILE_NAME))
}

/// Load the application config from disk. Returns defaults if the file does not exist.
pub fn load_config() -> Result<AppConfig> {
    let path = config_file_path()?;

    if !path.exists() {
        tracing::debug!(?path, "config file not found, using defaults");
        return Ok(AppConfig::default());
    }

    load_config_from(&path)
}

/// Load the application config from a specific file path.
pub fn load_config_from(path: &Path) -> Result<AppConfig> {
    let content = std::fs::read_to_string(path).map_err(|e| PageForgeError::io(path, e))?;

    toml::from_str(&content)
        .map_err(|e| PageForgeError::config(format!("failed to parse {}: {e}", path.display())))
}

/// Create the config directory and write a default config file.
/// Returns the path to the created file.
pub fn init_config() -> Result<PathBuf> {
    let dir = config_dir()?;
    std::fs::create_dir_all(&dir).map_err(|e| PageForgeError::io(&dir, e))?;

    let path = dir.join(CONFIG_FILE_NAME);
    let config = AppConfig::default();
    let content =
        toml::to_string_pretty(&config).map_err(|e| PageForgeError::config(e.to_string()))?;

    std::fs::write(&path, content).map_err(|e| PageForgeError::io(&path, e))?;
    tracing::info!(?path, "created default config file");

    Ok(path)
}

/// Expand a leading `~/` against the user's home directory.
pub fn resolve_path(raw: &str) -> Result<PathBuf> {
    match raw.strip_prefix("~/") {
        Some(rest) => {
            let home = dirs::home_dir()
                .ok_or_else(|| PageForgeError::config("could not determine home directory"))?;
            Ok(home.join(rest))
        }
        None => Ok(PathBuf::from(raw)),
    }
}

/// Check that the configured matrix and site settings are usable.
pub fn validate_config(config: &AppConfig) -> Result<()> {
    if config.matrix.keywords.is_empty() {
        return Err(PageForgeError::config("[matrix] keywords must not be empty"));
    }
    if config.matrix.locations.is_empty() {
        return Err(PageForgeError::config("[matrix] locations must not be empty"));
    }
    if config.matrix.title_patterns.is_empty() {
        return Err(PageForgeError::config(
            "[matrix] title_patterns must not be empty",
        ));
    }
    url::Url::parse(&config.site.base_url).map_err(|e| {
        PageForgeError::config(format!("[site] base_url '{}' is invalid: {e}", config.site.base_url))
    })?;
    Ok(())
}
