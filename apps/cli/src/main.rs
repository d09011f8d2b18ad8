//! sitemapgen CLI: discover, generate and serve bilingual sitemaps.
//!
//! Walks a file-based route tree, pairs English and Spanish pages, and
//! writes partitioned sitemap XML with hreflang alternates.

mod commands;

use clap::Parser;
use color_eyre::eyre::Result;

use commands::Cli;

#[tokio::main]
async fn main() -> Result<()> {
    color_eyre::install()?;
    let cli = Cli::parse();
    commands::init_tracing(&cli);
    commands::run(cli).await
}
