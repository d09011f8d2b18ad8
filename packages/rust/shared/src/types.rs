//! Core domain types: discovered pages, locale pairs, and run statistics.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Sitemap protocol limit on `<url>` entries per file.
pub const PROTOCOL_MAX_URLS: usize = 50_000;

/// Sitemap protocol limit on uncompressed file size (50 MiB).
pub const PROTOCOL_MAX_BYTES: usize = 50 * 1024 * 1024;

// ---------------------------------------------------------------------------
// Locale
// ---------------------------------------------------------------------------

/// Site locale. English is served unprefixed, Spanish under `/es`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Locale {
    En,
    Es,
}

impl Locale {
    /// The two-letter code, also used as the hreflang value.
    pub fn code(self) -> &'static str {
        match self {
            Self::En => "en",
            Self::Es => "es",
        }
    }

    /// The leading path segment that marks this locale, if any.
    pub fn segment(self) -> Option<&'static str> {
        match self {
            Self::En => None,
            Self::Es => Some("es"),
        }
    }

    /// Re-apply the locale prefix to a logical path.
    pub fn public_path(self, logical_path: &str) -> String {
        match self.segment() {
            None => logical_path.to_string(),
            Some(seg) if logical_path == "/" => format!("/{seg}"),
            Some(seg) => format!("/{seg}{logical_path}"),
        }
    }
}

impl std::fmt::Display for Locale {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.code())
    }
}

// ---------------------------------------------------------------------------
// PageType / ChangeFrequency
// ---------------------------------------------------------------------------

/// Structural bucket a page belongs to, inferred from its route path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PageType {
    Static,
    DynamicParam,
    BlogPost,
    AttorneyProfile,
    Location,
    PracticeArea,
    NearMe,
}

impl PageType {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Static => "static",
            Self::DynamicParam => "dynamic-param",
            Self::BlogPost => "blog-post",
            Self::AttorneyProfile => "attorney-profile",
            Self::Location => "location",
            Self::PracticeArea => "practice-area",
            Self::NearMe => "near-me",
        }
    }

    /// Whether pages of this type have a statically enumerable URL.
    pub fn is_enumerable(self) -> bool {
        !matches!(self, Self::DynamicParam)
    }
}

/// `<changefreq>` values from the sitemap protocol.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChangeFrequency {
    Always,
    Hourly,
    Daily,
    Weekly,
    Monthly,
    Yearly,
    Never,
}

impl ChangeFrequency {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Always => "always",
            Self::Hourly => "hourly",
            Self::Daily => "daily",
            Self::Weekly => "weekly",
            Self::Monthly => "monthly",
            Self::Yearly => "yearly",
            Self::Never => "never",
        }
    }
}

impl std::str::FromStr for ChangeFrequency {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "always" => Ok(Self::Always),
            "hourly" => Ok(Self::Hourly),
            "daily" => Ok(Self::Daily),
            "weekly" => Ok(Self::Weekly),
            "monthly" => Ok(Self::Monthly),
            "yearly" => Ok(Self::Yearly),
            "never" => Ok(Self::Never),
            other => Err(format!("unknown change frequency: {other}")),
        }
    }
}

// ---------------------------------------------------------------------------
// DiscoveredPage / LocalizedPagePair
// ---------------------------------------------------------------------------

/// One publicly reachable page found in the route tree.
///
/// Identity is `(logical_path, locale)`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DiscoveredPage {
    /// Public URL path with the locale prefix stripped (e.g. `/blog/x`).
    pub logical_path: String,
    pub locale: Locale,
    pub page_type: PageType,
    /// Modification time of the page source (or a metadata override).
    pub last_modified: DateTime<Utc>,
    pub change_frequency: ChangeFrequency,
    /// Crawl priority hint in `0.0..=1.0`.
    pub priority: f64,
    /// Public path of the other-locale counterpart, when paired.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub alternate_path: Option<String>,
}

impl DiscoveredPage {
    /// The public URL path, locale prefix included.
    pub fn public_path(&self) -> String {
        self.locale.public_path(&self.logical_path)
    }
}

/// English and Spanish versions of the same logical page.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LocalizedPagePair {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub en: Option<DiscoveredPage>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub es: Option<DiscoveredPage>,
}

impl LocalizedPagePair {
    /// Place a page in the slot for its locale, returning whatever it replaced.
    pub fn upsert(&mut self, page: DiscoveredPage) -> Option<DiscoveredPage> {
        let slot = match page.locale {
            Locale::En => &mut self.en,
            Locale::Es => &mut self.es,
        };
        slot.replace(page)
    }

    pub fn get(&self, locale: Locale) -> Option<&DiscoveredPage> {
        match locale {
            Locale::En => self.en.as_ref(),
            Locale::Es => self.es.as_ref(),
        }
    }

    pub fn is_complete(&self) -> bool {
        self.en.is_some() && self.es.is_some()
    }

    /// Number of populated slots (0..=2).
    pub fn len(&self) -> usize {
        usize::from(self.en.is_some()) + usize::from(self.es.is_some())
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

// ---------------------------------------------------------------------------
// RunId / RunStats
// ---------------------------------------------------------------------------

/// A UUID v7 wrapper for regeneration run identifiers (time-sortable).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RunId(pub Uuid);

impl RunId {
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }
}

impl Default for RunId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for RunId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::str::FromStr for RunId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Ok(Self(Uuid::parse_str(s)?))
    }
}

/// What started a regeneration run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunTrigger {
    Scheduled,
    Manual,
}

impl RunTrigger {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Scheduled => "scheduled",
            Self::Manual => "manual",
        }
    }
}

impl std::str::FromStr for RunTrigger {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "scheduled" => Ok(Self::Scheduled),
            "manual" => Ok(Self::Manual),
            other => Err(format!("unknown run trigger: {other}")),
        }
    }
}

/// Statistics for one regeneration run.
///
/// Created when a run starts and finalized with [`RunStats::succeed`] or
/// [`RunStats::fail`] when it ends.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunStats {
    pub run_id: RunId,
    pub trigger: RunTrigger,
    /// When the run started.
    pub timestamp: DateTime<Utc>,
    /// URL count per written sitemap file (shards listed individually).
    pub per_partition_counts: BTreeMap<String, usize>,
    pub total_pages: usize,
    /// Total from the latest successful run before this one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub previous_total_pages: Option<usize>,
    pub duration_ms: u64,
    pub failed: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
    /// Partitions omitted because they failed to serialize.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub failed_partitions: Vec<String>,
}

impl RunStats {
    /// Open a new record at the start of a run.
    pub fn started(trigger: RunTrigger, previous_total_pages: Option<usize>) -> Self {
        Self {
            run_id: RunId::new(),
            trigger,
            timestamp: Utc::now(),
            per_partition_counts: BTreeMap::new(),
            total_pages: 0,
            previous_total_pages,
            duration_ms: 0,
            failed: false,
            error_message: None,
            failed_partitions: Vec::new(),
        }
    }

    /// Finalize as a successful run.
    pub fn succeed(
        mut self,
        per_partition_counts: BTreeMap<String, usize>,
        total_pages: usize,
        failed_partitions: Vec<String>,
        duration_ms: u64,
    ) -> Self {
        self.per_partition_counts = per_partition_counts;
        self.total_pages = total_pages;
        self.failed_partitions = failed_partitions;
        self.duration_ms = duration_ms;
        self.failed = false;
        self.error_message = None;
        self
    }

    /// Finalize as a failed run.
    pub fn fail(mut self, error_message: impl Into<String>, duration_ms: u64) -> Self {
        self.failed = true;
        self.error_message = Some(error_message.into());
        self.duration_ms = duration_ms;
        self
    }

    /// Change in page count against the previous successful run.
    pub fn delta(&self) -> Option<i64> {
        if self.failed {
            return None;
        }
        self.previous_total_pages
            .map(|prev| self.total_pages as i64 - prev as i64)
    }
}
