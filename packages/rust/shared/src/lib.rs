//! Shared types, error model, and configuration for sitemapgen.
//!
//! This crate is the foundation depended on by all other sitemapgen crates.
//! It provides:
//! - [`SitemapError`], the unified error type
//! - Domain types ([`DiscoveredPage`], [`LocalizedPagePair`], [`RunStats`])
//! - Configuration ([`AppConfig`], [`GenerationConfig`], config loading)

pub mod config;
pub mod error;
pub mod types;

// Re-export public API at crate root for ergonomic imports.
pub use config::{
    AppConfig, DiscoveryConfig, GenerationConfig, PatternTable, ScheduleConfig, ServerConfig,
    SiteConfig, SitemapConfig, StorageConfig, config_dir, config_file_path, expand_home,
    init_config, load_config, load_config_from, parse_base_url, parse_utc_offset,
};
pub use error::{Result, SitemapError};
pub use types::{
    ChangeFrequency, DiscoveredPage, Locale, LocalizedPagePair, PROTOCOL_MAX_BYTES,
    PROTOCOL_MAX_URLS, PageType, RunId, RunStats, RunTrigger,
};
