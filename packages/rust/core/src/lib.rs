//! Core domain logic for sitemapgen.
//!
//! This crate turns a discovered route tree into sitemap files and keeps them
//! fresh: the [`assembler`] serializes partitions and the index, the
//! [`pipeline`] writes them atomically, and the [`scheduler`] runs the
//! pipeline daily or on demand while recording run statistics.

pub mod assembler;
pub mod pipeline;
pub mod scheduler;

pub use assembler::{
    AssembleOptions, INDEX_FILE_NAME, Partition, PartitionedSitemaps, SitemapDocument,
    generate_partitioned_sitemaps, generate_sitemap_index, generate_sitemap_xml,
    partition_file_name,
};
pub use pipeline::{
    GenerateResult, ProgressReporter, SilentProgress, SitemapManifest, WrittenFile, generate,
    read_manifest, render_sitemaps,
};
pub use scheduler::{
    JobOutput, MemoryStatsStore, PipelineJob, RunOutcome, Schedule, Scheduler, SitemapJob,
    StatsStore,
};
