//! Application configuration for sitemapgen.
//!
//! User config lives at `~/.sitemapgen/sitemapgen.toml`.
//! CLI flags override config file values, which override defaults.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use chrono::{FixedOffset, NaiveTime};
use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::{Result, SitemapError};
use crate::types::{PROTOCOL_MAX_BYTES, PROTOCOL_MAX_URLS};

/// Default configuration file name.
const CONFIG_FILE_NAME: &str = "sitemapgen.toml";

/// Default config directory name under the user's home.
const CONFIG_DIR_NAME: &str = ".sitemapgen";

// ---------------------------------------------------------------------------
// Config structs (matching sitemapgen.toml schema)
// ---------------------------------------------------------------------------

/// Top-level application config, deserialized from TOML.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub site: SiteConfig,

    #[serde(default)]
    pub discovery: DiscoveryConfig,

    #[serde(default)]
    pub sitemap: SitemapConfig,

    #[serde(default)]
    pub schedule: ScheduleConfig,

    #[serde(default)]
    pub server: ServerConfig,

    #[serde(default)]
    pub storage: StorageConfig,
}

/// `[site]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SiteConfig {
    /// Public origin every `<loc>` is built from.
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Root of the route source tree (the app directory).
    #[serde(default = "default_route_root")]
    pub route_root: String,

    /// Directory the sitemap files are written to.
    #[serde(default = "default_output_dir")]
    pub output_dir: String,
}

impl Default for SiteConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            route_root: default_route_root(),
            output_dir: default_output_dir(),
        }
    }
}

fn default_base_url() -> String {
    "https://www.example.com".into()
}
fn default_route_root() -> String {
    "src/app".into()
}
fn default_output_dir() -> String {
    "public".into()
}

/// `[discovery]` section: the contract with the route tree's naming conventions.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiscoveryConfig {
    /// File names that make their directory a page leaf.
    #[serde(default = "default_page_files")]
    pub page_files: Vec<String>,

    /// Substrings of the URL path that mark a route as non-public.
    #[serde(default = "default_exclude_patterns")]
    pub exclude_patterns: Vec<String>,

    /// Spanish slug → English slug, used to pair localized URLs.
    #[serde(default = "default_segment_aliases")]
    pub segment_aliases: BTreeMap<String, String>,

    /// Segment keywords for each structural bucket.
    #[serde(default)]
    pub patterns: PatternTable,
}

impl Default for DiscoveryConfig {
    fn default() -> Self {
        Self {
            page_files: default_page_files(),
            exclude_patterns: default_exclude_patterns(),
            segment_aliases: default_segment_aliases(),
            patterns: PatternTable::default(),
        }
    }
}

fn default_page_files() -> Vec<String> {
    ["page.tsx", "page.ts", "page.jsx", "page.js", "page.mdx"]
        .map(String::from)
        .to_vec()
}

fn default_exclude_patterns() -> Vec<String> {
    [
        "/api/",
        "/admin",
        "/test",
        "/socket",
        "/webhook",
        "/.well-known",
        "/sitemap",
        "/robots",
        "/manifest",
        "/portal",
        "/404",
        "/500",
        "/animations-demo",
    ]
    .map(String::from)
    .to_vec()
}

fn default_segment_aliases() -> BTreeMap<String, String> {
    [
        ("abogados", "attorneys"),
        ("ubicaciones", "locations"),
        ("areas-de-practica", "practice-areas"),
        ("cerca-de-mi", "near-me"),
        ("contacto", "contact"),
        ("acerca-de", "about"),
        ("consulta-gratuita", "free-consultation"),
        ("testimonios", "testimonials"),
        ("resultados-casos", "case-results"),
        ("recursos", "resources"),
        ("preguntas", "faq"),
    ]
    .into_iter()
    .map(|(es, en)| (es.to_string(), en.to_string()))
    .collect()
}

/// `[discovery.patterns]`: first-segment keywords per bucket (both locales).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PatternTable {
    #[serde(default = "default_attorneys")]
    pub attorneys: Vec<String>,
    #[serde(default = "default_blog")]
    pub blog: Vec<String>,
    /// Second segment under a blog root that introduces a category listing.
    #[serde(default = "default_blog_category")]
    pub blog_category: Vec<String>,
    #[serde(default = "default_locations")]
    pub locations: Vec<String>,
    #[serde(default = "default_practice_areas")]
    pub practice_areas: Vec<String>,
    /// Matched anywhere inside a segment (`car-accident-lawyer-near-me`).
    #[serde(default = "default_near_me")]
    pub near_me: Vec<String>,
    /// Single-segment static pages treated like the home page for priority.
    #[serde(default = "default_key_pages")]
    pub key_pages: Vec<String>,
}

impl Default for PatternTable {
    fn default() -> Self {
        Self {
            attorneys: default_attorneys(),
            blog: default_blog(),
            blog_category: default_blog_category(),
            locations: default_locations(),
            practice_areas: default_practice_areas(),
            near_me: default_near_me(),
            key_pages: default_key_pages(),
        }
    }
}

fn default_attorneys() -> Vec<String> {
    vec!["attorneys".into(), "abogados".into()]
}
fn default_blog() -> Vec<String> {
    vec!["blog".into()]
}
fn default_blog_category() -> Vec<String> {
    vec!["category".into(), "categoria".into()]
}
fn default_locations() -> Vec<String> {
    vec!["locations".into(), "ubicaciones".into()]
}
fn default_practice_areas() -> Vec<String> {
    vec!["practice-areas".into(), "areas-de-practica".into()]
}
fn default_near_me() -> Vec<String> {
    vec!["near-me".into(), "cerca-de-mi".into()]
}
fn default_key_pages() -> Vec<String> {
    ["contact", "contacto", "free-consultation", "consulta-gratuita"]
        .map(String::from)
        .to_vec()
}

/// `[sitemap]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SitemapConfig {
    /// Per-file URL cap (clamped to the protocol limit).
    #[serde(default = "default_max_urls")]
    pub max_urls: usize,

    /// Per-file uncompressed byte cap (clamped to the protocol limit).
    #[serde(default = "default_max_bytes")]
    pub max_bytes: usize,

    /// Emit `xhtml:link` hreflang alternates for paired pages.
    #[serde(default = "default_true")]
    pub hreflang: bool,
}

impl Default for SitemapConfig {
    fn default() -> Self {
        Self {
            max_urls: default_max_urls(),
            max_bytes: default_max_bytes(),
            hreflang: true,
        }
    }
}

fn default_max_urls() -> usize {
    PROTOCOL_MAX_URLS
}
fn default_max_bytes() -> usize {
    PROTOCOL_MAX_BYTES
}
fn default_true() -> bool {
    true
}

/// `[schedule]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScheduleConfig {
    /// Arm the daily schedule when the server starts.
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Local time of day, `HH:MM`.
    #[serde(default = "default_time")]
    pub time: String,

    /// Fixed UTC offset of the schedule's timezone, `±HH:MM`.
    #[serde(default = "default_utc_offset")]
    pub utc_offset: String,
}

impl Default for ScheduleConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            time: default_time(),
            utc_offset: default_utc_offset(),
        }
    }
}

fn default_time() -> String {
    "03:00".into()
}
fn default_utc_offset() -> String {
    "-05:00".into()
}

impl ScheduleConfig {
    /// Parse the configured time of day.
    pub fn parse_time(&self) -> Result<NaiveTime> {
        NaiveTime::parse_from_str(self.time.trim(), "%H:%M").map_err(|e| {
            SitemapError::config(format!("invalid schedule time '{}': {e}", self.time))
        })
    }

    /// Parse the configured UTC offset.
    pub fn parse_offset(&self) -> Result<FixedOffset> {
        parse_utc_offset(&self.utc_offset)
    }
}

/// Parse `+HH:MM`, `-HH:MM` or `Z` into a fixed offset.
pub fn parse_utc_offset(raw: &str) -> Result<FixedOffset> {
    let raw = raw.trim();
    if raw.eq_ignore_ascii_case("z") || raw == "UTC" {
        return FixedOffset::east_opt(0)
            .ok_or_else(|| SitemapError::config("invalid UTC offset"));
    }

    let invalid = || SitemapError::config(format!("invalid UTC offset '{raw}', expected ±HH:MM"));

    let (sign, rest) = match raw.as_bytes().first() {
        Some(b'+') => (1, &raw[1..]),
        Some(b'-') => (-1, &raw[1..]),
        _ => return Err(invalid()),
    };
    let (hours, minutes) = rest.split_once(':').ok_or_else(invalid)?;
    let hours: i32 = hours.parse().map_err(|_| invalid())?;
    let minutes: i32 = minutes.parse().map_err(|_| invalid())?;
    if hours > 14 || minutes > 59 {
        return Err(invalid());
    }

    FixedOffset::east_opt(sign * (hours * 3600 + minutes * 60)).ok_or_else(invalid)
}

/// `[server]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

fn default_host() -> String {
    "127.0.0.1".into()
}
fn default_port() -> u16 {
    3000
}

/// `[storage]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// libSQL database holding run history. `~` expands to the home directory.
    #[serde(default = "default_db_path")]
    pub db_path: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            db_path: default_db_path(),
        }
    }
}

fn default_db_path() -> String {
    "~/.sitemapgen/runs.db".into()
}

// ---------------------------------------------------------------------------
// Generation config (runtime, validated)
// ---------------------------------------------------------------------------

/// Runtime generation settings, validated from [`AppConfig`].
#[derive(Debug, Clone)]
pub struct GenerationConfig {
    pub base_url: Url,
    pub route_root: PathBuf,
    pub output_dir: PathBuf,
    pub discovery: DiscoveryConfig,
    /// Effective per-file URL cap.
    pub max_urls: usize,
    /// Effective per-file byte cap.
    pub max_bytes: usize,
    pub hreflang: bool,
}

impl TryFrom<&AppConfig> for GenerationConfig {
    type Error = SitemapError;

    fn try_from(config: &AppConfig) -> Result<Self> {
        Ok(Self {
            base_url: parse_base_url(&config.site.base_url)?,
            route_root: expand_home(&config.site.route_root),
            output_dir: expand_home(&config.site.output_dir),
            discovery: config.discovery.clone(),
            max_urls: config.sitemap.max_urls.clamp(1, PROTOCOL_MAX_URLS),
            max_bytes: config.sitemap.max_bytes.clamp(1, PROTOCOL_MAX_BYTES),
            hreflang: config.sitemap.hreflang,
        })
    }
}

/// Parse and check a site origin: absolute `http`/`https`, no query or fragment.
pub fn parse_base_url(raw: &str) -> Result<Url> {
    let url = Url::parse(raw.trim())
        .map_err(|e| SitemapError::validation(format!("invalid base_url '{raw}': {e}")))?;

    if !matches!(url.scheme(), "http" | "https") {
        return Err(SitemapError::validation(format!(
            "base_url must use http or https: {raw}"
        )));
    }
    if url.host_str().is_none() {
        return Err(SitemapError::validation(format!("base_url has no host: {raw}")));
    }
    if url.query().is_some() || url.fragment().is_some() {
        return Err(SitemapError::validation(format!(
            "base_url must not carry a query or fragment: {raw}"
        )));
    }
    Ok(url)
}

/// Expand a leading `~` to the user's home directory.
pub fn expand_home(raw: &str) -> PathBuf {
    if let Some(rest) = raw.strip_prefix("~/") {
        if let Some(home) = dirs::home_dir() {
            return home.join(rest);
        }
    }
    PathBuf::from(raw)
}

impl AppConfig {
    /// Check every value that is parsed lazily at runtime.
    pub fn validate(&self) -> Result<()> {
        parse_base_url(&self.site.base_url)?;
        self.schedule.parse_time()?;
        self.schedule.parse_offset()?;
        if self.discovery.page_files.is_empty() {
            return Err(SitemapError::config("discovery.page_files must not be empty"));
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Config loading
// ---------------------------------------------------------------------------

/// Get the path to the config directory (`~/.sitemapgen/`).
pub fn config_dir() -> Result<PathBuf> {
    let home = dirs::home_dir()
        .ok_or_else(|| SitemapError::config("could not determine home directory"))?;
    Ok(home.join(CONFIG_DIR_NAME))
}

/// Get the path to the config file (`~/.sitemapgen/sitemapgen.toml`).
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
    let content = std::fs::read_to_string(path).map_err(|e| SitemapError::io(path, e))?;

    toml::from_str(&content)
        .map_err(|e| SitemapError::config(format!("failed to parse {}: {e}", path.display())))
}

/// Create the config directory and write a default config file.
/// Returns the path to the created file.
pub fn init_config() -> Result<PathBuf> {
    let dir = config_dir()?;
    std::fs::create_dir_all(&dir).map_err(|e| SitemapError::io(&dir, e))?;

    let path = dir.join(CONFIG_FILE_NAME);
    let config = AppConfig::default();
    let content =
        toml::to_string_pretty(&config).map_err(|e| SitemapError::config(e.to_string()))?;

    std::fs::write(&path, content).map_err(|e| SitemapError::io(&path, e))?;
    tracing::info!(?path, "created default config file");

    Ok(path)
}
