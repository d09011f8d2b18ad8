//! Page classifier: one route leaf in, one page record (or a skip) out.
//!
//! Route conventions (Next.js app directory):
//! - `(group)` segments are dropped from the URL
//! - `_private`, `@slot` and `(.)intercepted` segments are never public
//! - `[param]`, `[...rest]`, `[[...optional]]` segments are not enumerable
//! - a leading `es` segment marks a Spanish page

use std::path::{Component, Path, PathBuf};
use std::sync::LazyLock;

use chrono::{DateTime, NaiveDate, Utc};
use regex::Regex;
use serde::Deserialize;

use sitemapgen_shared::{ChangeFrequency, DiscoveredPage, DiscoveryConfig, Locale, PageType};

/// Name of the optional per-route metadata file, next to the page source.
pub const META_FILE_NAME: &str = "sitemap.meta.toml";

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

/// Overrides read from a route's `sitemap.meta.toml`.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct RouteMeta {
    /// Keep the route out of every sitemap.
    #[serde(default)]
    pub exclude: bool,
    #[serde(default)]
    pub priority: Option<f64>,
    #[serde(default)]
    pub changefreq: Option<ChangeFrequency>,
    /// RFC 3339 timestamp or `YYYY-MM-DD`.
    #[serde(default)]
    pub lastmod: Option<String>,
}

impl RouteMeta {
    fn lastmod(&self) -> Option<DateTime<Utc>> {
        let raw = self.lastmod.as_deref()?.trim();
        if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
            return Some(dt.with_timezone(&Utc));
        }
        NaiveDate::parse_from_str(raw, "%Y-%m-%d")
            .ok()
            .and_then(|d| d.and_hms_opt(0, 0, 0))
            .map(|dt| dt.and_utc())
    }
}

/// One page leaf as seen by the classifier.
#[derive(Debug, Clone)]
pub struct RouteLeaf {
    /// Directory of the page source, relative to the route root.
    pub route_dir: PathBuf,
    /// Modification time of the page source file.
    pub modified: DateTime<Utc>,
    pub meta: Option<RouteMeta>,
}

/// Why a leaf produced no page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SkipReason {
    /// A path component is not valid UTF-8.
    NonUtf8,
    /// Empty, absolute, or `..` components; stray brackets.
    Malformed,
    /// Private folder, parallel-route slot, or intercepting route.
    NotPublic,
    /// Matched one of the configured exclusion patterns.
    Excluded(String),
    /// `exclude = true` in the route's metadata file.
    MetadataExcluded,
}

/// Classifier outcome.
#[derive(Debug, Clone, PartialEq)]
pub enum Classification {
    Page(DiscoveredPage),
    Skip(SkipReason),
}

/// Finer-grained shape used only to pick priority and change frequency.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RouteKind {
    Home,
    KeyPage,
    OtherStatic,
    /// Root listing of a section (`/attorneys`, `/locations`, ...).
    SectionIndex(PageType),
    BlogIndex,
    BlogCategory,
    BlogPost,
    AttorneyProfile,
    LocationRegion,
    LocationCity,
    LocationService,
    PracticeArea,
    PracticeSubArea,
    NearMe,
    Dynamic,
}

// ---------------------------------------------------------------------------
// Regex patterns (compiled once)
// ---------------------------------------------------------------------------

/// `[slug]`, `[...slug]`, `[[...slug]]`.
static DYNAMIC_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(\[\[\.\.\.[^\[\]/]+\]\]|\[(\.\.\.)?[^\[\]/]+\])$").expect("dynamic segment regex")
});

/// `(marketing)` but not `(.)photo` / `(..)photo`.
static ROUTE_GROUP_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\([^.)][^)]*\)$").expect("route group regex"));

/// `(.)x`, `(..)x`, `(..)(..)x`, `(...)x`.
static INTERCEPT_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\(\.{1,3}\)").expect("intercepting route regex"));

// ---------------------------------------------------------------------------
// Classifier
// ---------------------------------------------------------------------------

/// Maps route leaves to page records using the configured pattern table.
///
/// Pure: the result depends only on the leaf and the config.
pub struct Classifier<'a> {
    config: &'a DiscoveryConfig,
}

impl<'a> Classifier<'a> {
    pub fn new(config: &'a DiscoveryConfig) -> Self {
        Self { config }
    }

    /// Classify one leaf.
    pub fn classify(&self, leaf: &RouteLeaf) -> Classification {
        let segments = match url_segments(&leaf.route_dir) {
            Ok(segments) => segments,
            Err(reason) => return Classification::Skip(reason),
        };

        let url_path = join_path(&segments);
        if let Some(pattern) = self
            .config
            .exclude_patterns
            .iter()
            .find(|p| matches_at_boundary(&url_path, p))
        {
            return Classification::Skip(SkipReason::Excluded(pattern.clone()));
        }

        if leaf.meta.as_ref().is_some_and(|m| m.exclude) {
            return Classification::Skip(SkipReason::MetadataExcluded);
        }

        let (locale, logical) = split_locale(&segments);

        let is_dynamic = logical.iter().any(|s| DYNAMIC_RE.is_match(s));
        if !is_dynamic && logical.iter().any(|s| s.contains('[') || s.contains(']')) {
            return Classification::Skip(SkipReason::Malformed);
        }

        let kind = if is_dynamic {
            RouteKind::Dynamic
        } else {
            self.route_kind(logical)
        };

        let (mut priority, mut change_frequency) = defaults_for(kind);
        let mut last_modified = leaf.modified;

        if let Some(meta) = &leaf.meta {
            if let Some(p) = meta.priority.filter(|p| p.is_finite()) {
                priority = p.clamp(0.0, 1.0);
            }
            if let Some(freq) = meta.changefreq {
                change_frequency = freq;
            }
            if let Some(lastmod) = meta.lastmod() {
                last_modified = lastmod;
            }
        }

        Classification::Page(DiscoveredPage {
            logical_path: join_path(logical),
            locale,
            page_type: page_type_for(kind),
            last_modified,
            change_frequency,
            priority,
            alternate_path: None,
        })
    }

    /// Pattern-match the locale-stripped segments, in bucket priority order.
    fn route_kind(&self, segments: &[&str]) -> RouteKind {
        let patterns = &self.config.patterns;
        let Some(first) = segments.first() else {
            return RouteKind::Home;
        };
        let depth = segments.len();

        if contains_keyword(&patterns.attorneys, first) {
            return if depth == 1 {
                RouteKind::SectionIndex(PageType::AttorneyProfile)
            } else {
                RouteKind::AttorneyProfile
            };
        }

        if contains_keyword(&patterns.blog, first) {
            return match segments.get(1) {
                None => RouteKind::BlogIndex,
                Some(second) if contains_keyword(&patterns.blog_category, second) => {
                    RouteKind::BlogCategory
                }
                Some(_) => RouteKind::BlogPost,
            };
        }

        if contains_keyword(&patterns.locations, first) {
            return match depth {
                1 => RouteKind::SectionIndex(PageType::Location),
                2 => RouteKind::LocationRegion,
                3 => RouteKind::LocationCity,
                _ => RouteKind::LocationService,
            };
        }

        if contains_keyword(&patterns.practice_areas, first) {
            return match depth {
                1 => RouteKind::SectionIndex(PageType::PracticeArea),
                2 => RouteKind::PracticeArea,
                _ => RouteKind::PracticeSubArea,
            };
        }

        let near_me = segments.iter().any(|segment| {
            let segment = segment.to_ascii_lowercase();
            patterns
                .near_me
                .iter()
                .any(|k| !k.is_empty() && segment.contains(&k.to_ascii_lowercase()))
        });
        if near_me {
            return RouteKind::NearMe;
        }

        if depth == 1 && contains_keyword(&patterns.key_pages, first) {
            return RouteKind::KeyPage;
        }

        RouteKind::OtherStatic
    }
}

// ---------------------------------------------------------------------------
// Lookup tables
// ---------------------------------------------------------------------------

fn defaults_for(kind: RouteKind) -> (f64, ChangeFrequency) {
    use ChangeFrequency::{Daily, Monthly, Weekly};

    match kind {
        RouteKind::Home => (1.0, Daily),
        RouteKind::KeyPage => (0.9, Weekly),
        RouteKind::OtherStatic => (0.5, Monthly),
        RouteKind::SectionIndex(_) => (0.8, Weekly),
        RouteKind::BlogIndex => (0.8, Daily),
        RouteKind::BlogCategory => (0.7, Weekly),
        RouteKind::BlogPost => (0.6, Monthly),
        RouteKind::AttorneyProfile => (0.8, Monthly),
        RouteKind::LocationRegion => (0.8, Monthly),
        RouteKind::LocationCity => (0.7, Monthly),
        RouteKind::LocationService => (0.6, Monthly),
        RouteKind::PracticeArea => (0.8, Monthly),
        RouteKind::PracticeSubArea => (0.7, Monthly),
        RouteKind::NearMe => (0.7, Monthly),
        RouteKind::Dynamic => (0.5, Monthly),
    }
}

fn page_type_for(kind: RouteKind) -> PageType {
    match kind {
        RouteKind::Home | RouteKind::KeyPage | RouteKind::OtherStatic => PageType::Static,
        RouteKind::BlogIndex | RouteKind::BlogCategory | RouteKind::BlogPost => PageType::BlogPost,
        RouteKind::AttorneyProfile => PageType::AttorneyProfile,
        RouteKind::LocationRegion | RouteKind::LocationCity | RouteKind::LocationService => {
            PageType::Location
        }
        RouteKind::PracticeArea | RouteKind::PracticeSubArea => PageType::PracticeArea,
        RouteKind::NearMe => PageType::NearMe,
        RouteKind::Dynamic => PageType::DynamicParam,
        RouteKind::SectionIndex(page_type) => page_type,
    }
}

// ---------------------------------------------------------------------------
// Path helpers
// ---------------------------------------------------------------------------

/// Turn a route directory into URL segments, dropping route groups.
fn url_segments(route_dir: &Path) -> Result<Vec<&str>, SkipReason> {
    let mut segments = Vec::new();

    for component in route_dir.components() {
        let segment = match component {
            Component::Normal(os) => os.to_str().ok_or(SkipReason::NonUtf8)?,
            Component::CurDir => continue,
            _ => return Err(SkipReason::Malformed),
        };

        if segment.is_empty() || segment.contains('/') {
            return Err(SkipReason::Malformed);
        }
        if INTERCEPT_RE.is_match(segment) || segment.starts_with('_') || segment.starts_with('@') {
            return Err(SkipReason::NotPublic);
        }
        if ROUTE_GROUP_RE.is_match(segment) {
            continue;
        }
        if segment.starts_with('(') || segment.ends_with(')') {
            return Err(SkipReason::Malformed);
        }
        segments.push(segment);
    }

    Ok(segments)
}

/// Split off a leading locale segment.
fn split_locale<'s, 'p>(segments: &'s [&'p str]) -> (Locale, &'s [&'p str]) {
    match segments.split_first() {
        Some((first, rest)) if Some(*first) == Locale::Es.segment() => (Locale::Es, rest),
        _ => (Locale::En, segments),
    }
}

/// `["blog", "x"]` → `/blog/x`; no segments → `/`.
pub(crate) fn join_path(segments: &[&str]) -> String {
    if segments.is_empty() {
        return "/".to_string();
    }
    let mut path = String::new();
    for segment in segments {
        path.push('/');
        path.push_str(segment);
    }
    path
}

/// Substring match that must end at a segment boundary, so `/test` does not
/// swallow `/testimonials`.
fn matches_at_boundary(path: &str, pattern: &str) -> bool {
    if pattern.is_empty() {
        return false;
    }
    if pattern.ends_with('/') {
        // `/api/` should also catch the bare `/api` route.
        let with_slash = format!("{path}/");
        return with_slash.contains(pattern);
    }
    path.match_indices(pattern).any(|(start, matched)| {
        matches!(path[start + matched.len()..].chars().next(), None | Some('/'))
    })
}

fn contains_keyword(keywords: &[String], segment: &str) -> bool {
    keywords.iter().any(|k| k.eq_ignore_ascii_case(segment))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn leaf(path: &str) -> RouteLeaf {
        RouteLeaf {
            route_dir: PathBuf::from(path),
            modified: DateTime::parse_from_rfc3339("2025-06-01T12:00:00Z")
                .unwrap()
                .with_timezone(&Utc),
            meta: None,
        }
    }

    fn classify(path: &str) -> Classification {
        let config = DiscoveryConfig::default();
        Classifier::new(&config).classify(&leaf(path))
    }

    fn page(path: &str) -> DiscoveredPage {
        match classify(path) {
            Classification::Page(page) => page,
            Classification::Skip(reason) => panic!("expected page for {path}, got {reason:?}"),
        }
    }

    #[test]
    fn home_pages() {
        let en = page("");
        assert_eq!(en.logical_path, "/");
        assert_eq!(en.locale, Locale::En);
        assert_eq!(en.page_type, PageType::Static);
        assert_eq!(en.priority, 1.0);
        assert_eq!(en.change_frequency, ChangeFrequency::Daily);

        let es = page("es");
        assert_eq!(es.logical_path, "/");
        assert_eq!(es.locale, Locale::Es);
        assert_eq!(es.public_path(), "/es");
    }

    #[test]
    fn locale_is_a_prefix_check() {
        let es = page("es/blog/visa-tips");
        assert_eq!(es.locale, Locale::Es);
        assert_eq!(es.logical_path, "/blog/visa-tips");

        // `es` deeper in the path is just a slug.
        let en = page("blog/es");
        assert_eq!(en.locale, Locale::En);
        assert_eq!(en.logical_path, "/blog/es");

        let en = page("estate-planning");
        assert_eq!(en.locale, Locale::En);
    }

    #[test]
    fn route_groups_are_dropped() {
        let p = page("(marketing)/contact");
        assert_eq!(p.logical_path, "/contact");
        assert_eq!(p.priority, 0.9);
        assert_eq!(p.change_frequency, ChangeFrequency::Weekly);

        let p = page("(site)/es/(legal)/contacto");
        assert_eq!(p.locale, Locale::Es);
        assert_eq!(p.logical_path, "/contacto");
        assert_eq!(p.priority, 0.9);
    }

    #[test]
    fn non_public_segments_skip() {
        assert_eq!(classify("_components/hero"), Classification::Skip(SkipReason::NotPublic));
        assert_eq!(classify("@modal/login"), Classification::Skip(SkipReason::NotPublic));
        assert_eq!(classify("(.)photo"), Classification::Skip(SkipReason::NotPublic));
        assert_eq!(classify("feed/(..)photo"), Classification::Skip(SkipReason::NotPublic));
    }

    #[test]
    fn exclusion_patterns_respect_boundaries() {
        assert_eq!(
            classify("api/health"),
            Classification::Skip(SkipReason::Excluded("/api/".into()))
        );
        assert!(matches!(classify("admin"), Classification::Skip(SkipReason::Excluded(_))));
        assert!(matches!(
            classify("es/admin/users"),
            Classification::Skip(SkipReason::Excluded(_))
        ));
        assert!(matches!(classify("test"), Classification::Skip(SkipReason::Excluded(_))));

        let testimonials = page("testimonials");
        assert_eq!(testimonials.page_type, PageType::Static);
        let portal_guide = page("blog/portal-guide");
        assert_eq!(portal_guide.page_type, PageType::BlogPost);
    }

    #[test]
    fn dynamic_segments_are_not_enumerable() {
        for path in ["blog/[slug]", "docs/[...rest]", "shop/[[...filters]]", "es/[city]/contact"] {
            assert_eq!(page(path).page_type, PageType::DynamicParam, "{path}");
        }
        assert_eq!(classify("blog/[broken"), Classification::Skip(SkipReason::Malformed));
    }

    #[test]
    fn attorney_paths() {
        let profile = page("attorneys/william-vasquez");
        assert_eq!(profile.page_type, PageType::AttorneyProfile);
        assert_eq!(profile.priority, 0.8);

        let es_profile = page("es/abogados/william-vasquez");
        assert_eq!(es_profile.page_type, PageType::AttorneyProfile);
        assert_eq!(es_profile.logical_path, "/abogados/william-vasquez");

        let index = page("attorneys");
        assert_eq!(index.page_type, PageType::AttorneyProfile);
        assert_eq!(index.change_frequency, ChangeFrequency::Weekly);
    }

    #[test]
    fn blog_paths() {
        let index = page("blog");
        assert_eq!(index.page_type, PageType::BlogPost);
        assert_eq!(index.change_frequency, ChangeFrequency::Daily);

        let category = page("blog/category/immigration");
        assert_eq!(category.page_type, PageType::BlogPost);
        assert_eq!(category.priority, 0.7);

        let post = page("blog/green-card-process-explained");
        assert_eq!(post.page_type, PageType::BlogPost);
        assert_eq!(post.priority, 0.6);
        assert_eq!(post.change_frequency, ChangeFrequency::Monthly);
    }

    #[test]
    fn location_hierarchy() {
        let index = page("locations");
        assert_eq!(index.page_type, PageType::Location);
        assert_eq!(index.change_frequency, ChangeFrequency::Weekly);
        let state = page("locations/nc");
        assert_eq!(state.page_type, PageType::Location);
        assert_eq!(state.priority, 0.8);
        let city = page("locations/nc/raleigh");
        assert_eq!(city.priority, 0.7);
        let service = page("locations/nc/raleigh/car-accident-lawyer");
        assert_eq!(service.page_type, PageType::Location);
        assert_eq!(service.priority, 0.6);

        // Locations win over near-me in bucket order.
        let nested = page("ubicaciones/nc/raleigh/abogado-cerca-de-mi");
        assert_eq!(nested.page_type, PageType::Location);
    }

    #[test]
    fn practice_area_nesting() {
        let area = page("practice-areas/immigration");
        assert_eq!(area.page_type, PageType::PracticeArea);
        assert_eq!(area.priority, 0.8);

        let sub = page("es/areas-de-practica/inmigracion/asilo");
        assert_eq!(sub.page_type, PageType::PracticeArea);
        assert_eq!(sub.priority, 0.7);
    }

    #[test]
    fn near_me_landing_pages() {
        let p = page("car-accident-lawyer-near-me");
        assert_eq!(p.page_type, PageType::NearMe);
        let p = page("es/abogado-de-accidentes-cerca-de-mi");
        assert_eq!(p.page_type, PageType::NearMe);
        let p = page("near-me/charlotte");
        assert_eq!(p.page_type, PageType::NearMe);
    }

    #[test]
    fn other_static_pages() {
        let about = page("about");
        assert_eq!(about.page_type, PageType::Static);
        assert_eq!(about.priority, 0.5);
        assert_eq!(about.change_frequency, ChangeFrequency::Monthly);
    }

    #[test]
    fn metadata_overrides() {
        let config = DiscoveryConfig::default();
        let classifier = Classifier::new(&config);

        let mut l = leaf("blog/big-news");
        l.meta = Some(RouteMeta {
            exclude: false,
            priority: Some(1.7),
            changefreq: Some(ChangeFrequency::Hourly),
            lastmod: Some("2024-02-03".into()),
        });
        let Classification::Page(p) = classifier.classify(&l) else {
            panic!("expected page");
        };
        assert_eq!(p.priority, 1.0);
        assert_eq!(p.change_frequency, ChangeFrequency::Hourly);
        assert_eq!(p.last_modified.to_rfc3339(), "2024-02-03T00:00:00+00:00");

        l.meta = Some(RouteMeta {
            exclude: true,
            ..RouteMeta::default()
        });
        assert_eq!(classifier.classify(&l), Classification::Skip(SkipReason::MetadataExcluded));
    }

    #[test]
    fn meta_file_parses() {
        let meta: RouteMeta =
            toml::from_str("priority = 0.4\nchangefreq = \"yearly\"\n").expect("parse meta");
        assert_eq!(meta.priority, Some(0.4));
        assert_eq!(meta.changefreq, Some(ChangeFrequency::Yearly));
        assert!(!meta.exclude);
    }

    #[test]
    fn malformed_paths_skip() {
        assert_eq!(classify("../outside"), Classification::Skip(SkipReason::Malformed));
        assert_eq!(classify("/abs/olute"), Classification::Skip(SkipReason::Malformed));
        assert_eq!(classify("(unclosed/x"), Classification::Skip(SkipReason::Malformed));
    }

    #[test]
    fn classification_is_deterministic() {
        assert_eq!(classify("es/blog/x"), classify("es/blog/x"));
    }
}
