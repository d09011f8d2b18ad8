//! Route discovery: walk the app directory and build localized page pairs.
//!
//! Every page leaf under the route root is handed to the [`Classifier`]. Pages
//! that survive are keyed by their English logical path, so `/blog/x` and
//! `/es/blog/x` (or `/abogados/ana` and `/attorneys/ana`) land in the same
//! [`LocalizedPagePair`].

mod classifier;

use std::collections::{BTreeMap, HashSet};
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{debug, info, instrument, warn};
use walkdir::{DirEntry, WalkDir};

use sitemapgen_shared::{
    DiscoveredPage, DiscoveryConfig, Locale, LocalizedPagePair, PageType, Result, SitemapError,
};

pub use classifier::{
    Classification, Classifier, META_FILE_NAME, RouteLeaf, RouteMeta, SkipReason,
};

/// Directories never descended into.
const IGNORED_DIRS: &[&str] = &["node_modules"];

// ---------------------------------------------------------------------------
// DiscoveryReport
// ---------------------------------------------------------------------------

/// Two leaves resolved to the same `(pair key, locale)` slot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Collision {
    pub pair_key: String,
    pub locale: Locale,
    /// Route directory whose page was kept (the later one in walk order).
    pub kept: String,
    /// Route directory whose page was replaced.
    pub replaced: String,
}

/// Everything one walk of the route tree found.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DiscoveryReport {
    /// Pair key (English logical path) → localized pages, ordered by key.
    pub pairs: BTreeMap<String, LocalizedPagePair>,
    /// Public paths of routes with dynamic segments; never in `pairs`.
    pub dynamic_routes: Vec<String>,
    pub collisions: Vec<Collision>,
    /// Page leaves seen, including skipped ones.
    pub leaves: usize,
    /// Leaves the classifier skipped (excluded, private, malformed).
    pub skipped: usize,
    /// Entries the walker could not read.
    pub unreadable: usize,
}

impl DiscoveryReport {
    /// Number of pages across all pairs.
    pub fn page_count(&self) -> usize {
        self.pairs.values().map(LocalizedPagePair::len).sum()
    }

    /// Number of pairs that have both an English and a Spanish page.
    pub fn complete_pairs(&self) -> usize {
        self.pairs.values().filter(|p| p.is_complete()).count()
    }

    /// Pair keys that exist in only one locale, with the locale that is present.
    pub fn missing_translations(&self) -> Vec<(&str, Locale)> {
        self.pairs
            .iter()
            .filter(|(_, pair)| !pair.is_complete())
            .filter_map(|(key, pair)| {
                let present = if pair.en.is_some() { Locale::En } else { Locale::Es };
                (!pair.is_empty()).then_some((key.as_str(), present))
            })
            .collect()
    }
}

// ---------------------------------------------------------------------------
// Main entry point
// ---------------------------------------------------------------------------

/// Walk `root` and collect every public page into localized pairs.
///
/// Only a missing or non-directory root is an error; unreadable subtrees and
/// unclassifiable leaves are counted in the report and skipped.
#[instrument(skip_all, fields(root = %root.display()))]
pub fn discover_all_pages(root: &Path, config: &DiscoveryConfig) -> Result<DiscoveryReport> {
    let metadata = std::fs::metadata(root).map_err(|e| SitemapError::io(root, e))?;
    if !metadata.is_dir() {
        return Err(SitemapError::discovery(format!(
            "route root is not a directory: {}",
            root.display()
        )));
    }

    let classifier = Classifier::new(config);
    let page_files: HashSet<&str> = config.page_files.iter().map(String::as_str).collect();

    let mut report = DiscoveryReport::default();
    let mut sources: BTreeMap<(String, Locale), String> = BTreeMap::new();
    let mut seen_dirs: HashSet<PathBuf> = HashSet::new();

    let walker = WalkDir::new(root)
        .follow_links(true)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|e| e.depth() == 0 || !is_ignored_dir(e));

    for entry in walker {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                warn!(path = ?e.path(), error = %e, "skipping unreadable route entry");
                report.unreadable += 1;
                continue;
            }
        };

        if !entry.file_type().is_file() {
            continue;
        }
        let is_page = entry
            .file_name()
            .to_str()
            .is_some_and(|name| page_files.contains(name));
        if !is_page {
            continue;
        }

        let Some(dir) = entry.path().parent() else {
            continue;
        };
        // `page.tsx` and `page.mdx` in one folder are the same route.
        if !seen_dirs.insert(dir.to_path_buf()) {
            debug!(dir = %dir.display(), "duplicate page file in route folder");
            continue;
        }

        report.leaves += 1;
        let Ok(route_dir) = dir.strip_prefix(root) else {
            report.skipped += 1;
            continue;
        };

        let leaf = RouteLeaf {
            route_dir: route_dir.to_path_buf(),
            modified: modified_time(&entry),
            meta: read_meta(dir),
        };

        let page = match classifier.classify(&leaf) {
            Classification::Page(page) => page,
            Classification::Skip(reason) => {
                debug!(route = %route_dir.display(), ?reason, "skipped route");
                report.skipped += 1;
                continue;
            }
        };

        if page.page_type == PageType::DynamicParam {
            debug!(route = %route_dir.display(), "dynamic route not enumerable");
            report.dynamic_routes.push(page.public_path());
            continue;
        }

        let key = pair_key(&page, &config.segment_aliases);
        let source = route_dir.display().to_string();
        let locale = page.locale;

        let displaced = report.pairs.entry(key.clone()).or_default().upsert(page);
        let previous = sources.insert((key.clone(), locale), source.clone());

        if displaced.is_some() {
            let replaced = previous.unwrap_or_default();
            warn!(
                pair_key = %key,
                locale = %locale,
                kept = %source,
                replaced = %replaced,
                "two routes resolve to the same page, keeping the later one"
            );
            report.collisions.push(Collision {
                pair_key: key,
                locale,
                kept: source,
                replaced,
            });
        }
    }

    info!(
        pages = report.page_count(),
        pairs = report.pairs.len(),
        complete = report.complete_pairs(),
        dynamic = report.dynamic_routes.len(),
        skipped = report.skipped,
        unreadable = report.unreadable,
        "route discovery complete"
    );

    Ok(report)
}

/// Flatten pairs into one page list, English before Spanish within a pair,
/// filling `alternate_path` for complete pairs.
pub fn flatten_pairs(pairs: &BTreeMap<String, LocalizedPagePair>) -> Vec<DiscoveredPage> {
    let mut pages = Vec::with_capacity(pairs.len() * 2);

    for pair in pairs.values() {
        let en_path = pair.en.as_ref().map(DiscoveredPage::public_path);
        let es_path = pair.es.as_ref().map(DiscoveredPage::public_path);

        if let Some(en) = &pair.en {
            let mut en = en.clone();
            en.alternate_path = es_path.clone();
            pages.push(en);
        }
        if let Some(es) = &pair.es {
            let mut es = es.clone();
            es.alternate_path = en_path;
            pages.push(es);
        }
    }

    pages
}

/// English logical path used to join the two locales of a page.
///
/// Spanish segments are translated through `aliases`; English paths are used
/// as-is.
pub fn pair_key(page: &DiscoveredPage, aliases: &BTreeMap<String, String>) -> String {
    if page.locale == Locale::En {
        return page.logical_path.clone();
    }

    let segments: Vec<&str> = page
        .logical_path
        .split('/')
        .filter(|s| !s.is_empty())
        .map(|segment| {
            aliases
                .get(segment)
                .or_else(|| aliases.get(&segment.to_ascii_lowercase()))
                .map_or(segment, String::as_str)
        })
        .collect();

    classifier::join_path(&segments)
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn is_ignored_dir(entry: &DirEntry) -> bool {
    entry.file_type().is_dir()
        && entry
            .file_name()
            .to_str()
            .is_some_and(|name| name.starts_with('.') || IGNORED_DIRS.contains(&name))
}

fn modified_time(entry: &DirEntry) -> DateTime<Utc> {
    entry
        .metadata()
        .ok()
        .and_then(|m| m.modified().ok())
        .map(DateTime::<Utc>::from)
        .unwrap_or_else(|| DateTime::<Utc>::from(std::time::UNIX_EPOCH))
}

/// Read `sitemap.meta.toml` next to a page, if present and well-formed.
fn read_meta(dir: &Path) -> Option<RouteMeta> {
    let path = dir.join(META_FILE_NAME);
    let content = std::fs::read_to_string(&path).ok()?;
    match toml::from_str(&content) {
        Ok(meta) => Some(meta),
        Err(e) => {
            warn!(path = %path.display(), error = %e, "ignoring malformed route metadata");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn temp_root(label: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!(
            "sitemapgen-discovery-{label}-{}",
            uuid::Uuid::now_v7()
        ));
        fs::create_dir_all(&dir).unwrap();
        dir
    }

    fn add_page(root: &Path, route: &str) {
        let dir = root.join(route);
        fs::create_dir_all(&dir).unwrap();
        fs::write(dir.join("page.tsx"), "export default function Page() {}").unwrap();
    }

    fn discover(root: &Path) -> DiscoveryReport {
        discover_all_pages(root, &DiscoveryConfig::default()).unwrap()
    }

    #[test]
    fn pairs_english_and_spanish_blog_post() {
        let root = temp_root("pair");
        add_page(&root, "blog/x");
        add_page(&root, "es/blog/x");

        let report = discover(&root);
        assert_eq!(report.pairs.len(), 1);
        let pair = &report.pairs["/blog/x"];
        assert!(pair.is_complete());
        assert_eq!(pair.en.as_ref().unwrap().page_type, PageType::BlogPost);
        assert_eq!(pair.es.as_ref().unwrap().public_path(), "/es/blog/x");

        let _ = fs::remove_dir_all(&root);
    }

    #[test]
    fn three_english_two_spanish_static_pages() {
        let root = temp_root("static");
        add_page(&root, "");
        add_page(&root, "about");
        add_page(&root, "faq");
        add_page(&root, "es");
        add_page(&root, "es/acerca-de");

        let report = discover(&root);
        assert_eq!(report.pairs.len(), 3);
        assert_eq!(report.page_count(), 5);
        assert_eq!(report.complete_pairs(), 2);
        assert!(report.pairs["/about"].is_complete());
        assert_eq!(report.missing_translations(), vec![("/faq", Locale::En)]);

        let _ = fs::remove_dir_all(&root);
    }

    #[test]
    fn spanish_aliases_pair_with_english_slugs() {
        let root = temp_root("alias");
        add_page(&root, "attorneys/ana-ruiz");
        add_page(&root, "es/abogados/ana-ruiz");

        let report = discover(&root);
        let pair = &report.pairs["/attorneys/ana-ruiz"];
        assert!(pair.is_complete());
        assert_eq!(
            pair.es.as_ref().unwrap().public_path(),
            "/es/abogados/ana-ruiz"
        );

        let _ = fs::remove_dir_all(&root);
    }

    #[test]
    fn discovery_is_idempotent() {
        let root = temp_root("idempotent");
        add_page(&root, "");
        add_page(&root, "(marketing)/contact");
        add_page(&root, "es/blog/y");
        add_page(&root, "locations/nc/raleigh");

        let first = discover(&root);
        let second = discover(&root);
        assert_eq!(first.pairs, second.pairs);
        assert_eq!(flatten_pairs(&first.pairs), flatten_pairs(&second.pairs));

        let _ = fs::remove_dir_all(&root);
    }

    #[test]
    fn dynamic_and_excluded_routes_are_left_out() {
        let root = temp_root("dynamic");
        add_page(&root, "blog/[slug]");
        add_page(&root, "es/blog/[slug]");
        add_page(&root, "api/health");
        add_page(&root, "admin");
        add_page(&root, "_drafts/post");
        add_page(&root, "blog/real");

        let report = discover(&root);
        assert_eq!(report.pairs.len(), 1);
        assert!(report.pairs.contains_key("/blog/real"));
        assert_eq!(
            report.dynamic_routes,
            vec!["/blog/[slug]".to_string(), "/es/blog/[slug]".to_string()]
        );
        assert_eq!(report.skipped, 3);
        assert_eq!(report.leaves, 6);

        let _ = fs::remove_dir_all(&root);
    }

    #[test]
    fn route_groups_collide_and_later_wins() {
        let root = temp_root("collide");
        add_page(&root, "(a)/pricing");
        add_page(&root, "(b)/pricing");

        let report = discover(&root);
        assert_eq!(report.pairs.len(), 1);
        assert_eq!(report.collisions.len(), 1);
        let collision = &report.collisions[0];
        assert_eq!(collision.pair_key, "/pricing");
        assert_eq!(collision.kept, Path::new("(b)/pricing").display().to_string());
        assert_eq!(collision.replaced, Path::new("(a)/pricing").display().to_string());

        let _ = fs::remove_dir_all(&root);
    }

    #[test]
    fn one_route_per_folder() {
        let root = temp_root("dup");
        add_page(&root, "about");
        fs::write(root.join("about/page.mdx"), "# About").unwrap();

        let report = discover(&root);
        assert_eq!(report.leaves, 1);
        assert!(report.collisions.is_empty());

        let _ = fs::remove_dir_all(&root);
    }

    #[test]
    fn route_meta_file_is_applied() {
        let root = temp_root("meta");
        add_page(&root, "about");
        add_page(&root, "hidden");
        fs::write(root.join("about").join(META_FILE_NAME), "priority = 0.3\n").unwrap();
        fs::write(root.join("hidden").join(META_FILE_NAME), "exclude = true\n").unwrap();

        let report = discover(&root);
        assert_eq!(report.pairs["/about"].en.as_ref().unwrap().priority, 0.3);
        assert!(!report.pairs.contains_key("/hidden"));

        let _ = fs::remove_dir_all(&root);
    }

    #[cfg(unix)]
    #[test]
    fn unreadable_entries_are_skipped() {
        let root = temp_root("unreadable");
        add_page(&root, "about");
        fs::create_dir_all(root.join("broken")).unwrap();
        std::os::unix::fs::symlink(
            root.join("does-not-exist"),
            root.join("broken").join("dangling"),
        )
        .unwrap();

        let report = discover(&root);
        assert!(report.unreadable >= 1);
        assert!(report.pairs.contains_key("/about"));

        let _ = fs::remove_dir_all(&root);
    }

    #[test]
    fn missing_root_is_an_error() {
        let root = std::env::temp_dir().join(format!("sitemapgen-missing-{}", uuid::Uuid::now_v7()));
        let err = discover_all_pages(&root, &DiscoveryConfig::default()).unwrap_err();
        assert!(matches!(err, SitemapError::Io { .. }));
    }

    #[test]
    fn flatten_orders_english_first_with_alternates() {
        let root = temp_root("flatten");
        add_page(&root, "blog/x");
        add_page(&root, "es/blog/x");
        add_page(&root, "about");

        let report = discover(&root);
        let pages = flatten_pairs(&report.pairs);
        let paths: Vec<String> = pages.iter().map(DiscoveredPage::public_path).collect();
        assert_eq!(paths, vec!["/about", "/blog/x", "/es/blog/x"]);
        assert_eq!(pages[0].alternate_path, None);
        assert_eq!(pages[1].alternate_path.as_deref(), Some("/es/blog/x"));
        assert_eq!(pages[2].alternate_path.as_deref(), Some("/blog/x"));

        let _ = fs::remove_dir_all(&root);
    }
}
