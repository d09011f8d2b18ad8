//! Route handlers: public sitemap documents and operator endpoints.

use axum::Json;
use axum::extract::{Path, State};
use axum::http::{StatusCode, header};
use axum::response::{IntoResponse, Response};
use serde_json::json;

use sitemapgen_core::{
    Partition, PartitionedSitemaps, RunOutcome, generate_sitemap_xml, render_sitemaps,
};

use crate::AppState;
use crate::error::ApiError;

/// Sent with every sitemap document.
pub const CACHE_CONTROL: &str = "public, max-age=3600, s-maxage=86400";

fn xml_response(xml: String) -> Response {
    (
        [
            (header::CONTENT_TYPE, "application/xml"),
            (header::CACHE_CONTROL, CACHE_CONTROL),
        ],
        xml,
    )
        .into_response()
}

/// Discover and assemble on a blocking thread. No caching: every request
/// sees the route tree as it is now.
async fn fresh_sitemaps(state: &AppState) -> Result<PartitionedSitemaps, ApiError> {
    let config = state.config.clone();
    let (_, sitemaps) = tokio::task::spawn_blocking(move || render_sitemaps(&config)).await??;
    Ok(sitemaps)
}

// ---------------------------------------------------------------------------
// Sitemap documents
// ---------------------------------------------------------------------------

// GET /sitemap-index.xml, GET /sitemap.xml
pub async fn get_index(State(state): State<AppState>) -> Result<Response, ApiError> {
    let sitemaps = fresh_sitemaps(&state).await?;
    Ok(xml_response(sitemaps.index))
}

// GET /sitemap-{name}.xml
pub async fn get_partition(
    State(state): State<AppState>,
    Path(file): Path<String>,
) -> Result<Response, ApiError> {
    let Some(name) = file
        .strip_prefix("sitemap-")
        .and_then(|rest| rest.strip_suffix(".xml"))
        .filter(|name| !name.is_empty())
    else {
        return Err(ApiError::NotFound(format!("no such document: {file}")));
    };

    let sitemaps = fresh_sitemaps(&state).await?;

    if let Some(doc) = sitemaps.document(name) {
        return Ok(xml_response(doc.xml.clone()));
    }

    let partition = partition_of(name);
    let failed = partition
        .filter(|p| sitemaps.failed_partitions.iter().any(|f| f == p.name()));
    if let Some(partition) = failed {
        return Err(ApiError::Internal(format!(
            "partition {} could not be serialized",
            partition.name()
        )));
    }

    // A known partition with no pages is a valid, empty urlset. Once it is
    // sharded only the numbered names exist.
    match partition {
        Some(partition)
            if partition.name() == name
                && !sitemaps.documents.iter().any(|d| d.partition == partition) =>
        {
            let xml = generate_sitemap_xml(&[], &state.config.base_url, state.config.hreflang)?;
            Ok(xml_response(xml))
        }
        _ => Err(ApiError::NotFound(format!("no such sitemap: {name}"))),
    }
}

/// `blog` → Blog, `blog-2` → Blog.
fn partition_of(name: &str) -> Option<Partition> {
    Partition::from_name(name).or_else(|| {
        let (base, shard) = name.rsplit_once('-')?;
        shard
            .bytes()
            .all(|b| b.is_ascii_digit())
            .then(|| Partition::from_name(base))
            .flatten()
    })
}

// ---------------------------------------------------------------------------
// Operator endpoints
// ---------------------------------------------------------------------------

// GET /health
pub async fn health() -> impl IntoResponse {
    Json(json!({ "status": "ok" }))
}

// GET /api/sitemap/status
pub async fn get_status(State(state): State<AppState>) -> Response {
    match state.scheduler.get_stats() {
        Some(stats) => (StatusCode::OK, Json(stats)).into_response(),
        None => StatusCode::NO_CONTENT.into_response(),
    }
}

// POST /api/sitemap/run
pub async fn post_run(State(state): State<AppState>) -> Result<Response, ApiError> {
    match state.scheduler.run_now().await {
        RunOutcome::Completed(stats) => Ok((StatusCode::OK, Json(stats)).into_response()),
        RunOutcome::Skipped => Err(ApiError::Conflict(
            "a sitemap run is already in progress".into(),
        )),
    }
}

// POST /api/sitemap/schedule/start
pub async fn post_schedule_start(State(state): State<AppState>) -> impl IntoResponse {
    let changed = state.scheduler.start().await;
    Json(json!({ "scheduled": true, "changed": changed }))
}

// POST /api/sitemap/schedule/stop
pub async fn post_schedule_stop(State(state): State<AppState>) -> impl IntoResponse {
    let changed = state.scheduler.stop().await;
    Json(json!({ "scheduled": false, "changed": changed }))
}
