//! Sitemap assembler.
//!
//! Takes the flattened page list, splits it into named partitions under the
//! per-file caps, and serializes each partition (or shard) as a sitemap
//! `<urlset>` plus one `<sitemapindex>` listing them all.

use std::collections::BTreeMap;

use chrono::{DateTime, SecondsFormat, Utc};
use quick_xml::Writer;
use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event};
use tracing::{debug, info, instrument, warn};
use url::Url;

use sitemapgen_shared::{
    DiscoveredPage, GenerationConfig, Locale, PageType, Result, SitemapError,
};

/// Sitemap protocol 0.9 namespace.
pub const SITEMAP_NS: &str = "http://www.sitemaps.org/schemas/sitemap/0.9";

/// Namespace of `xhtml:link` hreflang alternates.
pub const XHTML_NS: &str = "http://www.w3.org/1999/xhtml";

/// File name of the sitemap index.
pub const INDEX_FILE_NAME: &str = "sitemap-index.xml";

/// File name for a partition or shard: `sitemap-{name}.xml`.
pub fn partition_file_name(name: &str) -> String {
    format!("sitemap-{name}.xml")
}

// ---------------------------------------------------------------------------
// Partitions
// ---------------------------------------------------------------------------

/// Named groups of URLs, each written as one or more sitemap files.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Partition {
    Pages,
    Locations,
    PracticeAreas,
    Blog,
    Attorneys,
    NearMe,
    /// Every Spanish page again, across all page types.
    Spanish,
}

impl Partition {
    /// Partitions keyed by page type. Each page lands in exactly one of these.
    pub const PRIMARY: [Partition; 6] = [
        Self::Pages,
        Self::Locations,
        Self::PracticeAreas,
        Self::Blog,
        Self::Attorneys,
        Self::NearMe,
    ];

    /// All partitions, in index order.
    pub const ALL: [Partition; 7] = [
        Self::Pages,
        Self::Locations,
        Self::PracticeAreas,
        Self::Blog,
        Self::Attorneys,
        Self::NearMe,
        Self::Spanish,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Self::Pages => "pages",
            Self::Locations => "locations",
            Self::PracticeAreas => "practice-areas",
            Self::Blog => "blog",
            Self::Attorneys => "attorneys",
            Self::NearMe => "near-me",
            Self::Spanish => "es",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|p| p.name() == name)
    }

    /// Primary partition for a page type; `None` for non-enumerable pages.
    pub fn primary_for(page_type: PageType) -> Option<Self> {
        match page_type {
            PageType::Static => Some(Self::Pages),
            PageType::Location => Some(Self::Locations),
            PageType::PracticeArea => Some(Self::PracticeAreas),
            PageType::BlogPost => Some(Self::Blog),
            PageType::AttorneyProfile => Some(Self::Attorneys),
            PageType::NearMe => Some(Self::NearMe),
            PageType::DynamicParam => None,
        }
    }
}

// ---------------------------------------------------------------------------
// Options and output
// ---------------------------------------------------------------------------

/// Settings for one assembly.
#[derive(Debug, Clone)]
pub struct AssembleOptions {
    pub base_url: Url,
    /// Per-file URL cap.
    pub max_urls: usize,
    /// Per-file byte cap over the serialized document.
    pub max_bytes: usize,
    /// Emit `xhtml:link` alternates for paired pages.
    pub hreflang: bool,
}

impl From<&GenerationConfig> for AssembleOptions {
    fn from(config: &GenerationConfig) -> Self {
        Self {
            base_url: config.base_url.clone(),
            max_urls: config.max_urls,
            max_bytes: config.max_bytes,
            hreflang: config.hreflang,
        }
    }
}

/// One serialized sitemap file.
#[derive(Debug, Clone, PartialEq)]
pub struct SitemapDocument {
    /// `blog`, or `blog-2` when the partition was sharded.
    pub name: String,
    pub partition: Partition,
    pub url_count: usize,
    pub xml: String,
}

impl SitemapDocument {
    pub fn file_name(&self) -> String {
        partition_file_name(&self.name)
    }
}

/// Output of [`generate_partitioned_sitemaps`].
#[derive(Debug, Clone)]
pub struct PartitionedSitemaps {
    pub index: String,
    /// Documents in index order.
    pub documents: Vec<SitemapDocument>,
    /// Partitions omitted because one of their entries could not be serialized.
    pub failed_partitions: Vec<String>,
    /// Pages in the primary partitions that were written.
    pub total_pages: usize,
    /// `dynamic-param` pages dropped on the way in.
    pub excluded_dynamic: usize,
}

impl PartitionedSitemaps {
    /// Look up a document by name (`blog`, `pages-2`, ...).
    pub fn document(&self, name: &str) -> Option<&SitemapDocument> {
        self.documents.iter().find(|d| d.name == name)
    }

    /// URL count per document name.
    pub fn per_partition_counts(&self) -> BTreeMap<String, usize> {
        self.documents
            .iter()
            .map(|d| (d.name.clone(), d.url_count))
            .collect()
    }

    /// The partial-result error, if any partition was omitted.
    pub fn partial_error(&self) -> Option<SitemapError> {
        (!self.failed_partitions.is_empty()).then(|| SitemapError::PartialResult {
            failed: self.failed_partitions.clone(),
        })
    }
}

// ---------------------------------------------------------------------------
// Entry points
// ---------------------------------------------------------------------------

/// Serialize `pages` as a single `<urlset>` with no caps applied.
pub fn generate_sitemap_xml(
    pages: &[DiscoveredPage],
    base_url: &Url,
    hreflang: bool,
) -> Result<String> {
    let mut body = Vec::new();
    for page in pages.iter().filter(|p| p.page_type.is_enumerable()) {
        let entry = render_url(page, base_url, hreflang)
            .map_err(|msg| SitemapError::serialization("sitemap", msg))?;
        body.extend_from_slice(&entry);
        body.push(b'\n');
    }

    let header =
        urlset_header(hreflang).map_err(|msg| SitemapError::serialization("sitemap", msg))?;
    let footer = urlset_footer().map_err(|msg| SitemapError::serialization("sitemap", msg))?;
    assemble_document(&header, &body, &footer)
        .map_err(|msg| SitemapError::serialization("sitemap", msg))
}

/// Partition, shard and serialize every page, then build the index.
///
/// A partition with an unserializable entry is left out entirely and listed
/// in [`PartitionedSitemaps::failed_partitions`]; the rest are still produced.
#[instrument(skip_all, fields(pages = pages.len(), base_url = %options.base_url))]
pub fn generate_partitioned_sitemaps(
    pages: &[DiscoveredPage],
    options: &AssembleOptions,
) -> Result<PartitionedSitemaps> {
    let mut groups: BTreeMap<Partition, Vec<&DiscoveredPage>> = BTreeMap::new();
    let mut excluded_dynamic = 0;

    for page in pages {
        let Some(primary) = Partition::primary_for(page.page_type) else {
            excluded_dynamic += 1;
            continue;
        };
        groups.entry(primary).or_default().push(page);
        if page.locale == Locale::Es {
            groups.entry(Partition::Spanish).or_default().push(page);
        }
    }

    let mut documents = Vec::new();
    let mut failed_partitions = Vec::new();
    let mut total_pages = 0;

    for partition in Partition::ALL {
        let Some(group) = groups.get(&partition) else {
            continue;
        };

        match render_partition(partition, group, options) {
            Ok(shards) => {
                debug!(
                    partition = partition.name(),
                    urls = group.len(),
                    shards = shards.len(),
                    "partition serialized"
                );
                if Partition::PRIMARY.contains(&partition) {
                    total_pages += group.len();
                }
                documents.extend(shards);
            }
            Err(e) => {
                warn!(partition = partition.name(), error = %e, "omitting partition");
                failed_partitions.push(partition.name().to_string());
            }
        }
    }

    let names: Vec<&str> = documents.iter().map(|d| d.name.as_str()).collect();
    let index = generate_sitemap_index(&names, &options.base_url, Utc::now())?;

    info!(
        documents = documents.len(),
        total_pages,
        failed = failed_partitions.len(),
        excluded_dynamic,
        "sitemaps assembled"
    );

    Ok(PartitionedSitemaps {
        index,
        documents,
        failed_partitions,
        total_pages,
        excluded_dynamic,
    })
}

/// Serialize a `<sitemapindex>` pointing at `sitemap-{name}.xml` for each name.
pub fn generate_sitemap_index(
    names: &[&str],
    base_url: &Url,
    lastmod: DateTime<Utc>,
) -> Result<String> {
    let origin = base_url.as_str().trim_end_matches('/');
    let lastmod = lastmod.to_rfc3339_opts(SecondsFormat::Secs, true);

    let render = || -> std::result::Result<Vec<u8>, String> {
        let mut writer = Writer::new_with_indent(Vec::new(), b' ', 2);
        writer
            .write_event(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), None)))
            .map_err(xml_err)?;

        let mut root = BytesStart::new("sitemapindex");
        root.push_attribute(("xmlns", SITEMAP_NS));
        writer.write_event(Event::Start(root)).map_err(xml_err)?;

        for name in names {
            let loc = format!("{origin}/{}", partition_file_name(name));
            writer
                .write_event(Event::Start(BytesStart::new("sitemap")))
                .map_err(xml_err)?;
            write_text_element(&mut writer, "loc", &loc)?;
            write_text_element(&mut writer, "lastmod", &lastmod)?;
            writer
                .write_event(Event::End(BytesEnd::new("sitemap")))
                .map_err(xml_err)?;
        }

        writer
            .write_event(Event::End(BytesEnd::new("sitemapindex")))
            .map_err(xml_err)?;
        let mut bytes = writer.into_inner();
        bytes.push(b'\n');
        Ok(bytes)
    };

    let bytes = render().map_err(|msg| SitemapError::serialization("index", msg))?;
    String::from_utf8(bytes).map_err(|e| SitemapError::serialization("index", e.to_string()))
}

// ---------------------------------------------------------------------------
// Partition rendering
// ---------------------------------------------------------------------------

/// Serialize one partition, splitting into `name-1`, `name-2`, ... when a
/// single file would exceed either cap.
fn render_partition(
    partition: Partition,
    pages: &[&DiscoveredPage],
    options: &AssembleOptions,
) -> Result<Vec<SitemapDocument>> {
    let name = partition.name();
    let fail = |msg: String| SitemapError::serialization(name, msg);

    let header = urlset_header(options.hreflang).map_err(fail)?;
    let footer = urlset_footer().map_err(fail)?;
    let fixed = header.len() + footer.len();
    let max_urls = options.max_urls.max(1);

    // (body, url count) per shard
    let mut shards: Vec<(Vec<u8>, usize)> = Vec::new();
    let mut body = Vec::new();
    let mut count = 0;

    for page in pages {
        let mut entry = render_url(page, &options.base_url, options.hreflang)
            .map_err(|msg| fail(format!("{}: {msg}", page.public_path())))?;
        entry.push(b'\n');

        if fixed + entry.len() > options.max_bytes {
            return Err(fail(format!(
                "entry for {} is {} bytes, over the {}-byte file cap",
                page.public_path(),
                entry.len(),
                options.max_bytes
            )));
        }

        if count == max_urls || fixed + body.len() + entry.len() > options.max_bytes {
            shards.push((std::mem::take(&mut body), count));
            count = 0;
        }
        body.extend_from_slice(&entry);
        count += 1;
    }
    if count > 0 {
        shards.push((body, count));
    }

    let sharded = shards.len() > 1;
    shards
        .into_iter()
        .enumerate()
        .map(|(i, (body, url_count))| {
            let xml = assemble_document(&header, &body, &footer).map_err(fail)?;
            Ok(SitemapDocument {
                name: if sharded {
                    format!("{name}-{}", i + 1)
                } else {
                    name.to_string()
                },
                partition,
                url_count,
                xml,
            })
        })
        .collect()
}

fn urlset_header(hreflang: bool) -> std::result::Result<Vec<u8>, String> {
    let mut writer = Writer::new(Vec::new());
    writer
        .write_event(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), None)))
        .map_err(xml_err)?;
    writer.get_mut().push(b'\n');

    let mut root = BytesStart::new("urlset");
    root.push_attribute(("xmlns", SITEMAP_NS));
    if hreflang {
        root.push_attribute(("xmlns:xhtml", XHTML_NS));
    }
    writer.write_event(Event::Start(root)).map_err(xml_err)?;

    let mut bytes = writer.into_inner();
    bytes.push(b'\n');
    Ok(bytes)
}

fn urlset_footer() -> std::result::Result<Vec<u8>, String> {
    let mut writer = Writer::new(Vec::new());
    writer
        .write_event(Event::End(BytesEnd::new("urlset")))
        .map_err(xml_err)?;
    let mut bytes = writer.into_inner();
    bytes.push(b'\n');
    Ok(bytes)
}

fn assemble_document(
    header: &[u8],
    body: &[u8],
    footer: &[u8],
) -> std::result::Result<String, String> {
    let mut bytes = Vec::with_capacity(header.len() + body.len() + footer.len());
    bytes.extend_from_slice(header);
    bytes.extend_from_slice(body);
    bytes.extend_from_slice(footer);
    String::from_utf8(bytes).map_err(|e| e.to_string())
}

/// Serialize one `<url>` entry.
fn render_url(
    page: &DiscoveredPage,
    base_url: &Url,
    hreflang: bool,
) -> std::result::Result<Vec<u8>, String> {
    if !page.priority.is_finite() || !(0.0..=1.0).contains(&page.priority) {
        return Err(format!("priority {} is outside 0.0..=1.0", page.priority));
    }

    let public_path = page.public_path();
    let loc = absolute_url(base_url, &public_path)?;

    let mut writer = Writer::new_with_indent(Vec::new(), b' ', 2);
    writer
        .write_event(Event::Start(BytesStart::new("url")))
        .map_err(xml_err)?;
    write_text_element(&mut writer, "loc", &loc)?;
    write_text_element(
        &mut writer,
        "lastmod",
        &page.last_modified.to_rfc3339_opts(SecondsFormat::Secs, true),
    )?;
    write_text_element(&mut writer, "changefreq", page.change_frequency.as_str())?;
    write_text_element(&mut writer, "priority", &format!("{:.1}", page.priority))?;

    let alternate = match &page.alternate_path {
        Some(path) if hreflang => Some(absolute_url(base_url, path)?),
        _ => None,
    };
    if let Some(alternate) = alternate {
        let (en, es) = match page.locale {
            Locale::En => (loc.as_str(), alternate.as_str()),
            Locale::Es => (alternate.as_str(), loc.as_str()),
        };
        for (lang, href) in [("en", en), ("es", es), ("x-default", en)] {
            let mut link = BytesStart::new("xhtml:link");
            link.push_attribute(("rel", "alternate"));
            link.push_attribute(("hreflang", lang));
            link.push_attribute(("href", href));
            writer.write_event(Event::Empty(link)).map_err(xml_err)?;
        }
    }

    writer
        .write_event(Event::End(BytesEnd::new("url")))
        .map_err(xml_err)?;
    Ok(writer.into_inner())
}

/// `base_url` origin + public path, validated as a URL.
fn absolute_url(base_url: &Url, public_path: &str) -> std::result::Result<String, String> {
    if let Some(c) = public_path.chars().find(|&c| !is_xml_char(c)) {
        return Err(format!("character U+{:04X} is not allowed in XML", c as u32));
    }
    let raw = format!("{}{public_path}", base_url.as_str().trim_end_matches('/'));
    Url::parse(&raw)
        .map(String::from)
        .map_err(|e| format!("invalid URL '{raw}': {e}"))
}

/// XML 1.0 `Char` production.
fn is_xml_char(c: char) -> bool {
    matches!(c, '\t' | '\n' | '\r' | '\u{20}'..='\u{D7FF}' | '\u{E000}'..='\u{FFFD}' | '\u{10000}'..='\u{10FFFF}')
}

fn write_text_element(
    writer: &mut Writer<Vec<u8>>,
    name: &str,
    text: &str,
) -> std::result::Result<(), String> {
    writer
        .write_event(Event::Start(BytesStart::new(name)))
        .map_err(xml_err)?;
    writer
        .write_event(Event::Text(BytesText::new(text)))
        .map_err(xml_err)?;
    writer
        .write_event(Event::End(BytesEnd::new(name)))
        .map_err(xml_err)?;
    Ok(())
}

fn xml_err(e: impl std::fmt::Display) -> String {
    e.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use quick_xml::Reader;
    use sitemapgen_shared::ChangeFrequency;

    fn base() -> Url {
        Url::parse("https://www.example.com").unwrap()
    }

    fn options() -> AssembleOptions {
        AssembleOptions {
            base_url: base(),
            max_urls: 50_000,
            max_bytes: 50 * 1024 * 1024,
            hreflang: true,
        }
    }

    fn page(path: &str, locale: Locale, page_type: PageType) -> DiscoveredPage {
        DiscoveredPage {
            logical_path: path.into(),
            locale,
            page_type,
            last_modified: DateTime::parse_from_rfc3339("2025-03-04T05:06:07Z")
                .unwrap()
                .with_timezone(&Utc),
            change_frequency: ChangeFrequency::Monthly,
            priority: 0.6,
            alternate_path: None,
        }
    }

    /// Text of every element named `tag`.
    fn texts(xml: &str, tag: &[u8]) -> Vec<String> {
        let mut reader = Reader::from_str(xml);
        let mut inside = false;
        let mut out = Vec::new();
        loop {
            match reader.read_event() {
                Ok(Event::Start(e)) => inside = e.name().as_ref() == tag,
                Ok(Event::Text(t)) if inside => out.push(t.unescape().unwrap().into_owned()),
                Ok(Event::End(_)) => inside = false,
                Ok(Event::Eof) => break,
                Err(e) => panic!("invalid XML: {e}"),
                _ => {}
            }
        }
        out
    }

    #[test]
    fn single_document_fields() {
        let mut es = page("/blog/x", Locale::Es, PageType::BlogPost);
        es.priority = 0.66;
        let xml = generate_sitemap_xml(&[es], &base(), false).unwrap();

        assert!(xml.starts_with("<?xml version=\"1.0\" encoding=\"UTF-8\"?>"));
        assert_eq!(texts(&xml, b"loc"), vec!["https://www.example.com/es/blog/x"]);
        assert_eq!(texts(&xml, b"lastmod"), vec!["2025-03-04T05:06:07Z"]);
        assert_eq!(texts(&xml, b"changefreq"), vec!["monthly"]);
        assert_eq!(texts(&xml, b"priority"), vec!["0.7"]);
        assert!(!xml.contains("xmlns:xhtml"));
    }

    #[test]
    fn home_pages_get_origin_urls() {
        let pages = [
            page("/", Locale::En, PageType::Static),
            page("/", Locale::Es, PageType::Static),
        ];
        let xml = generate_sitemap_xml(&pages, &base(), false).unwrap();
        assert_eq!(
            texts(&xml, b"loc"),
            vec!["https://www.example.com/", "https://www.example.com/es"]
        );
    }

    #[test]
    fn markup_characters_are_escaped() {
        let xml = generate_sitemap_xml(
            &[page("/guides/q&a", Locale::En, PageType::Static)],
            &base(),
            false,
        )
        .unwrap();
        assert!(xml.contains("q&amp;a"));
        assert_eq!(texts(&xml, b"loc"), vec!["https://www.example.com/guides/q&a"]);
    }

    #[test]
    fn static_partition_holds_both_locales() {
        let pages = [
            page("/", Locale::En, PageType::Static),
            page("/", Locale::Es, PageType::Static),
            page("/about", Locale::En, PageType::Static),
            page("/acerca-de", Locale::Es, PageType::Static),
            page("/faq", Locale::En, PageType::Static),
        ];
        let out = generate_partitioned_sitemaps(&pages, &options()).unwrap();

        let static_doc = out.document("pages").unwrap();
        assert_eq!(static_doc.url_count, 5);
        assert_eq!(texts(&static_doc.xml, b"loc").len(), 5);
        assert_eq!(out.document("es").unwrap().url_count, 2);
        assert_eq!(out.total_pages, 5);
        assert!(out.partial_error().is_none());
    }

    #[test]
    fn every_page_in_exactly_one_primary_partition() {
        let pages = [
            page("/", Locale::En, PageType::Static),
            page("/blog/x", Locale::En, PageType::BlogPost),
            page("/blog/x", Locale::Es, PageType::BlogPost),
            page("/locations/nc", Locale::En, PageType::Location),
            page("/practice-areas/immigration", Locale::En, PageType::PracticeArea),
            page("/abogados/ana", Locale::Es, PageType::AttorneyProfile),
            page("/lawyer-near-me", Locale::En, PageType::NearMe),
        ];
        let out = generate_partitioned_sitemaps(&pages, &options()).unwrap();

        let mut locs: Vec<String> = out
            .documents
            .iter()
            .filter(|d| d.partition != Partition::Spanish)
            .flat_map(|d| texts(&d.xml, b"loc"))
            .collect();
        let total = locs.len();
        locs.sort();
        locs.dedup();
        assert_eq!(total, pages.len());
        assert_eq!(locs.len(), pages.len());

        let names: Vec<&str> = out.documents.iter().map(|d| d.name.as_str()).collect();
        assert_eq!(
            names,
            vec!["pages", "locations", "practice-areas", "blog", "attorneys", "near-me", "es"]
        );
    }

    #[test]
    fn url_cap_shards_in_order() {
        let pages: Vec<DiscoveredPage> = (0..5)
            .map(|i| page(&format!("/p{i}"), Locale::En, PageType::Static))
            .collect();
        let opts = AssembleOptions {
            max_urls: 2,
            ..options()
        };
        let out = generate_partitioned_sitemaps(&pages, &opts).unwrap();

        let names: Vec<&str> = out.documents.iter().map(|d| d.name.as_str()).collect();
        assert_eq!(names, vec!["pages-1", "pages-2", "pages-3"]);
        assert_eq!(
            texts(&out.documents[1].xml, b"loc"),
            vec!["https://www.example.com/p2", "https://www.example.com/p3"]
        );
        assert_eq!(
            texts(&out.index, b"loc"),
            vec![
                "https://www.example.com/sitemap-pages-1.xml",
                "https://www.example.com/sitemap-pages-2.xml",
                "https://www.example.com/sitemap-pages-3.xml",
            ]
        );
        assert_eq!(out.per_partition_counts().get("pages-3"), Some(&1));
    }

    #[test]
    fn byte_cap_is_exact() {
        let pages: Vec<DiscoveredPage> = (0..20)
            .map(|i| page(&format!("/blog/post-{i:02}"), Locale::En, PageType::BlogPost))
            .collect();
        let single = generate_sitemap_xml(&pages[..1], &base(), true).unwrap();
        let cap = single.len() * 3;
        let opts = AssembleOptions {
            max_bytes: cap,
            ..options()
        };
        let out = generate_partitioned_sitemaps(&pages, &opts).unwrap();

        assert!(out.documents.len() > 1);
        let mut count = 0;
        for doc in &out.documents {
            assert!(doc.xml.len() <= cap, "{} is {} bytes", doc.name, doc.xml.len());
            count += doc.url_count;
        }
        assert_eq!(count, 20);
    }

    #[test]
    fn failing_partition_is_omitted() {
        let mut bad = page("/blog/broken", Locale::En, PageType::BlogPost);
        bad.priority = f64::NAN;
        let pages = [
            page("/about", Locale::En, PageType::Static),
            bad,
            page("/blog/fine", Locale::En, PageType::BlogPost),
        ];
        let out = generate_partitioned_sitemaps(&pages, &options()).unwrap();

        assert!(out.document("pages").is_some());
        assert!(out.document("blog").is_none());
        assert_eq!(out.failed_partitions, vec!["blog"]);
        assert_eq!(texts(&out.index, b"loc").len(), 1);
        assert!(matches!(
            out.partial_error(),
            Some(SitemapError::PartialResult { .. })
        ));
    }

    #[test]
    fn control_characters_fail_serialization() {
        let err = generate_sitemap_xml(
            &[page("/bad\u{1}path", Locale::En, PageType::Static)],
            &base(),
            false,
        )
        .unwrap_err();
        assert!(err.to_string().contains("U+0001"));
    }

    #[test]
    fn dynamic_pages_are_dropped() {
        let pages = [
            page("/blog/[slug]", Locale::En, PageType::DynamicParam),
            page("/blog/x", Locale::En, PageType::BlogPost),
        ];
        let out = generate_partitioned_sitemaps(&pages, &options()).unwrap();
        assert_eq!(out.excluded_dynamic, 1);
        assert_eq!(out.total_pages, 1);
    }

    #[test]
    fn hreflang_alternates() {
        let mut en = page("/blog/x", Locale::En, PageType::BlogPost);
        en.alternate_path = Some("/es/blog/x".into());
        let xml = generate_sitemap_xml(&[en], &base(), true).unwrap();

        assert!(xml.contains(&format!("xmlns:xhtml=\"{XHTML_NS}\"")));
        assert!(xml.contains(
            "<xhtml:link rel=\"alternate\" hreflang=\"es\" href=\"https://www.example.com/es/blog/x\"/>"
        ));
        assert!(xml.contains(
            "<xhtml:link rel=\"alternate\" hreflang=\"x-default\" href=\"https://www.example.com/blog/x\"/>"
        ));
    }

    #[test]
    fn documents_are_deterministic() {
        let pages = [
            page("/", Locale::En, PageType::Static),
            page("/blog/x", Locale::Es, PageType::BlogPost),
        ];
        let a = generate_partitioned_sitemaps(&pages, &options()).unwrap();
        let b = generate_partitioned_sitemaps(&pages, &options()).unwrap();
        assert_eq!(a.documents, b.documents);
    }

    #[test]
    fn partition_names_roundtrip() {
        for partition in Partition::ALL {
            assert_eq!(Partition::from_name(partition.name()), Some(partition));
        }
        assert_eq!(Partition::from_name("index"), None);
        assert_eq!(partition_file_name("blog-2"), "sitemap-blog-2.xml");
    }
}
