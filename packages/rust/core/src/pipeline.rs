//! End-to-end generation: route tree → discovery → assemble → sitemap files.

use std::collections::{BTreeMap, HashSet};
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tracing::{debug, info, instrument, warn};

use sitemapgen_discovery::{DiscoveryReport, discover_all_pages, flatten_pairs};
use sitemapgen_shared::{GenerationConfig, Result, SitemapError};

use crate::assembler::{
    AssembleOptions, INDEX_FILE_NAME, PartitionedSitemaps, generate_partitioned_sitemaps,
};

/// Name of the checksum manifest written next to the sitemaps.
pub const MANIFEST_FILE_NAME: &str = "manifest.json";

/// Metadata for a single written sitemap file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WrittenFile {
    pub filename: String,
    pub url_count: usize,
    pub size_bytes: usize,
    pub sha256: String,
}

/// Contents of `manifest.json`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SitemapManifest {
    pub generated_at: DateTime<Utc>,
    pub base_url: String,
    pub total_pages: usize,
    /// Index first, then partitions in index order.
    pub files: Vec<WrittenFile>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub failed_partitions: Vec<String>,
}

/// Result of [`generate`].
#[derive(Debug)]
pub struct GenerateResult {
    pub output_dir: PathBuf,
    pub manifest: SitemapManifest,
    /// URL count per written document (shards listed individually).
    pub per_partition_counts: BTreeMap<String, usize>,
    pub total_pages: usize,
    pub failed_partitions: Vec<String>,
    pub collisions: usize,
    pub dynamic_routes: usize,
    pub elapsed: Duration,
}

impl GenerateResult {
    /// The partial-result error, if any partition was omitted from this run.
    pub fn partial_error(&self) -> Option<SitemapError> {
        (!self.failed_partitions.is_empty()).then(|| SitemapError::PartialResult {
            failed: self.failed_partitions.clone(),
        })
    }
}

/// Progress callback for reporting pipeline status.
pub trait ProgressReporter: Send + Sync {
    /// Called when entering a new phase.
    fn phase(&self, name: &str);
    /// Called after a sitemap file is moved into place.
    fn file_written(&self, filename: &str, url_count: usize);
    /// Called when the pipeline completes.
    fn done(&self, result: &GenerateResult);
}

/// No-op progress reporter for headless/test usage.
pub struct SilentProgress;

impl ProgressReporter for SilentProgress {
    fn phase(&self, _name: &str) {}
    fn file_written(&self, _filename: &str, _url_count: usize) {}
    fn done(&self, _result: &GenerateResult) {}
}

/// Discover and assemble without touching the output directory.
#[instrument(skip_all, fields(root = %config.route_root.display()))]
pub fn render_sitemaps(config: &GenerationConfig) -> Result<(DiscoveryReport, PartitionedSitemaps)> {
    let report = discover_all_pages(&config.route_root, &config.discovery)?;
    let pages = flatten_pairs(&report.pairs);
    let sitemaps = generate_partitioned_sitemaps(&pages, &AssembleOptions::from(config))?;
    Ok((report, sitemaps))
}

/// Run the full generation pipeline.
///
/// 1. Discover the route tree and pair locales
/// 2. Assemble partitions, shards and the index
/// 3. Write every file under a temp name, then rename all into place
/// 4. Write `manifest.json` and drop sitemap files no longer referenced
///
/// Any error before step 3 finishes leaves the previous files untouched.
#[instrument(skip_all, fields(root = %config.route_root.display(), output = %config.output_dir.display()))]
pub fn generate(
    config: &GenerationConfig,
    progress: &dyn ProgressReporter,
) -> Result<GenerateResult> {
    let start = Instant::now();

    progress.phase("Discovering routes");
    let report = discover_all_pages(&config.route_root, &config.discovery)?;
    let pages = flatten_pairs(&report.pairs);

    progress.phase("Assembling sitemaps");
    let sitemaps = generate_partitioned_sitemaps(&pages, &AssembleOptions::from(config))?;

    progress.phase("Writing files");
    let mut outputs: Vec<(String, usize, &str)> = Vec::with_capacity(sitemaps.documents.len() + 1);
    outputs.push((
        INDEX_FILE_NAME.to_string(),
        sitemaps.documents.len(),
        sitemaps.index.as_str(),
    ));
    for doc in &sitemaps.documents {
        outputs.push((doc.file_name(), doc.url_count, doc.xml.as_str()));
    }

    let files = write_all_atomic(&config.output_dir, &outputs)?;
    for file in &files {
        progress.file_written(&file.filename, file.url_count);
    }

    let manifest = SitemapManifest {
        generated_at: Utc::now(),
        base_url: config.base_url.to_string(),
        total_pages: sitemaps.total_pages,
        files,
        failed_partitions: sitemaps.failed_partitions.clone(),
    };
    write_json_atomic(&config.output_dir.join(MANIFEST_FILE_NAME), &manifest)?;

    remove_stale(&config.output_dir, &manifest, &sitemaps.failed_partitions);
    if let Some(err) = sitemaps.partial_error() {
        warn!(error = %err, "sitemaps written with partitions omitted");
    }

    let result = GenerateResult {
        output_dir: config.output_dir.clone(),
        per_partition_counts: sitemaps.per_partition_counts(),
        total_pages: sitemaps.total_pages,
        failed_partitions: sitemaps.failed_partitions.clone(),
        collisions: report.collisions.len(),
        dynamic_routes: report.dynamic_routes.len(),
        manifest,
        elapsed: start.elapsed(),
    };

    info!(
        total_pages = result.total_pages,
        files = result.manifest.files.len(),
        failed = result.failed_partitions.len(),
        elapsed_ms = result.elapsed.as_millis() as u64,
        "sitemap generation complete"
    );
    progress.done(&result);

    Ok(result)
}

/// Read a previously written `manifest.json`.
pub fn read_manifest(output_dir: &Path) -> Result<SitemapManifest> {
    let path = output_dir.join(MANIFEST_FILE_NAME);
    let content = std::fs::read_to_string(&path).map_err(|e| SitemapError::io(&path, e))?;
    serde_json::from_str(&content)
        .map_err(|e| SitemapError::validation(format!("invalid {MANIFEST_FILE_NAME}: {e}")))
}

// ---------------------------------------------------------------------------
// File helpers
// ---------------------------------------------------------------------------

/// Write every `(filename, url_count, content)` to a temp file, then rename
/// them all. If any temp write fails, the temps are removed and nothing is
/// renamed. If a rename fails, the files already moved are rolled back.
fn write_all_atomic(dir: &Path, outputs: &[(String, usize, &str)]) -> Result<Vec<WrittenFile>> {
    std::fs::create_dir_all(dir).map_err(|e| SitemapError::io(dir, e))?;

    let mut staged: Vec<Staged> = Vec::with_capacity(outputs.len());
    for (filename, _, content) in outputs {
        let temp = dir.join(format!(".{filename}.tmp"));
        if let Err(e) = std::fs::write(&temp, content) {
            for written in &staged {
                let _ = std::fs::remove_file(&written.temp);
            }
            let _ = std::fs::remove_file(&temp);
            return Err(SitemapError::io(&temp, e));
        }
        staged.push(Staged {
            temp,
            target: dir.join(filename),
            backup: dir.join(format!(".{filename}.bak")),
        });
    }

    commit(&staged)?;

    let mut files = Vec::with_capacity(outputs.len());
    for (filename, url_count, content) in outputs {
        files.push(WrittenFile {
            filename: filename.clone(),
            url_count: *url_count,
            size_bytes: content.len(),
            sha256: sha256_hex(content.as_bytes()),
        });
        debug!(file = %filename, bytes = content.len(), "wrote sitemap file");
    }

    Ok(files)
}

/// A temp file waiting to replace `target`.
struct Staged {
    temp: PathBuf,
    target: PathBuf,
    /// Where the previous `target` is parked until every rename succeeds.
    backup: PathBuf,
}

/// Move every temp onto its target. Previous files are set aside first so a
/// failed rename can put the whole previous set back.
fn commit(staged: &[Staged]) -> Result<()> {
    // (entry, had a previous file)
    let mut replaced: Vec<(&Staged, bool)> = Vec::with_capacity(staged.len());

    for (i, entry) in staged.iter().enumerate() {
        match swap_in(entry) {
            Ok(had_previous) => replaced.push((entry, had_previous)),
            Err(e) => {
                let already: Vec<String> = replaced
                    .iter()
                    .map(|(s, _)| s.target.display().to_string())
                    .collect();
                warn!(
                    target = %entry.target.display(),
                    error = %e,
                    replaced = ?already,
                    "rename failed, restoring previous sitemaps"
                );
                rollback(&replaced);
                for pending in &staged[i..] {
                    let _ = std::fs::remove_file(&pending.temp);
                }
                return Err(e);
            }
        }
    }

    for (entry, had_previous) in replaced {
        if had_previous {
            if let Err(e) = std::fs::remove_file(&entry.backup) {
                warn!(file = %entry.backup.display(), error = %e, "could not remove backup");
            }
        }
    }
    Ok(())
}

/// Park the current target (if it is a file) and rename the temp over it.
/// Returns whether a previous file was parked.
fn swap_in(entry: &Staged) -> Result<bool> {
    let had_previous = entry.target.is_file();
    if had_previous {
        std::fs::rename(&entry.target, &entry.backup)
            .map_err(|e| SitemapError::io(&entry.target, e))?;
    }

    if let Err(e) = std::fs::rename(&entry.temp, &entry.target) {
        if had_previous {
            let _ = std::fs::rename(&entry.backup, &entry.target);
        }
        return Err(SitemapError::io(&entry.target, e));
    }
    Ok(had_previous)
}

fn rollback(replaced: &[(&Staged, bool)]) {
    for (entry, had_previous) in replaced.iter().rev() {
        let restored = if *had_previous {
            std::fs::rename(&entry.backup, &entry.target)
        } else {
            std::fs::remove_file(&entry.target)
        };
        match restored {
            Ok(()) => debug!(file = %entry.target.display(), "restored previous sitemap"),
            Err(e) => warn!(file = %entry.target.display(), error = %e, "could not restore sitemap"),
        }
    }
}

fn write_json_atomic<T: Serialize>(path: &Path, data: &T) -> Result<()> {
    let json = serde_json::to_string_pretty(data)
        .map_err(|e| SitemapError::validation(format!("JSON serialization failed: {e}")))?;
    let temp = path.with_extension("json.tmp");
    std::fs::write(&temp, json).map_err(|e| SitemapError::io(&temp, e))?;
    std::fs::rename(&temp, path).map_err(|e| SitemapError::io(path, e))?;
    Ok(())
}

/// Remove `sitemap-*.xml` files the new manifest does not list. Files of
/// partitions that failed this run are left alone.
fn remove_stale(dir: &Path, manifest: &SitemapManifest, failed_partitions: &[String]) {
    let current: HashSet<&str> = manifest.files.iter().map(|f| f.filename.as_str()).collect();

    let entries = match std::fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) => {
            warn!(dir = %dir.display(), error = %e, "could not scan for stale sitemaps");
            return;
        }
    };

    for entry in entries.flatten() {
        let name = entry.file_name();
        let Some(name) = name.to_str() else {
            continue;
        };
        let Some(stem) = name
            .strip_prefix("sitemap-")
            .and_then(|rest| rest.strip_suffix(".xml"))
        else {
            continue;
        };
        if current.contains(name) || belongs_to(stem, failed_partitions) {
            continue;
        }

        match std::fs::remove_file(entry.path()) {
            Ok(()) => info!(file = %name, "removed stale sitemap"),
            Err(e) => warn!(file = %name, error = %e, "could not remove stale sitemap"),
        }
    }
}

/// `blog` and `blog-3` belong to partition `blog`.
fn belongs_to(stem: &str, partitions: &[String]) -> bool {
    partitions.iter().any(|p| {
        stem == p
            || stem
                .strip_prefix(p.as_str())
                .and_then(|rest| rest.strip_prefix('-'))
                .is_some_and(|n| !n.is_empty() && n.bytes().all(|b| b.is_ascii_digit()))
    })
}

fn sha256_hex(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    format!("{:x}", hasher.finalize())
}
