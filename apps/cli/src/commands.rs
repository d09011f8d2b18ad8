//! CLI command definitions, routing, and tracing setup.

use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use clap::{Args, Parser, Subcommand};
use color_eyre::eyre::{Result, WrapErr, eyre};
use indicatif::{ProgressBar, ProgressStyle};
use tracing::info;

use sitemapgen_core::{
    GenerateResult, PipelineJob, ProgressReporter, Schedule, Scheduler, generate,
};
use sitemapgen_discovery::discover_all_pages;
use sitemapgen_server::AppState;
use sitemapgen_shared::{
    AppConfig, GenerationConfig, Locale, RunStats, expand_home, init_config, load_config,
    load_config_from,
};
use sitemapgen_storage::Storage;

// ---------------------------------------------------------------------------
// CLI structure
// ---------------------------------------------------------------------------

/// sitemapgen: bilingual sitemaps from a file-based route tree.
#[derive(Parser)]
#[command(
    name = "sitemapgen",
    version,
    about = "Generate partitioned EN/ES sitemaps with hreflang alternates from a route tree.",
    long_about = None,
)]
pub(crate) struct Cli {
    /// Log format: text (default) or json.
    #[arg(long, default_value = "text", global = true)]
    pub log_format: LogFormat,

    /// Verbosity level (-v, -vv).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Config file (defaults to ~/.sitemapgen/sitemapgen.toml).
    #[arg(long, global = true, env = "SITEMAPGEN_CONFIG")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

/// Log output format.
#[derive(Clone, Debug, clap::ValueEnum)]
pub(crate) enum LogFormat {
    Text,
    Json,
}

/// `[site]` overrides shared by the commands that touch the route tree.
#[derive(Args, Debug, Default)]
pub(crate) struct SiteArgs {
    /// Public origin for every <loc>.
    #[arg(long)]
    pub base_url: Option<String>,

    /// Route tree root.
    #[arg(long)]
    pub route_root: Option<String>,

    /// Output directory for sitemap files.
    #[arg(short, long)]
    pub out: Option<String>,
}

impl SiteArgs {
    fn apply(&self, config: &mut AppConfig) {
        if let Some(base_url) = &self.base_url {
            config.site.base_url.clone_from(base_url);
        }
        if let Some(route_root) = &self.route_root {
            config.site.route_root.clone_from(route_root);
        }
        if let Some(out) = &self.out {
            config.site.output_dir.clone_from(out);
        }
    }
}

/// Top-level CLI subcommands.
#[derive(Subcommand)]
pub(crate) enum Command {
    /// Walk the route tree and report pages, pairs and skipped routes.
    Discover {
        #[command(flatten)]
        site: SiteArgs,

        /// Print the full discovery report as JSON.
        #[arg(long)]
        json: bool,
    },

    /// Write the sitemap index, partitions and manifest once.
    Generate {
        #[command(flatten)]
        site: SiteArgs,
    },

    /// Serve sitemaps over HTTP and run the daily schedule.
    Serve {
        #[command(flatten)]
        site: SiteArgs,

        /// Bind host.
        #[arg(long)]
        host: Option<String>,

        /// Bind port.
        #[arg(short, long)]
        port: Option<u16>,

        /// Do not arm the daily schedule, even if enabled in config.
        #[arg(long)]
        no_schedule: bool,
    },

    /// Show recorded run statistics.
    Stats {
        /// Show the last N runs instead of only the latest.
        #[arg(long)]
        history: Option<u32>,

        /// Print as JSON.
        #[arg(long)]
        json: bool,
    },

    /// Configuration management.
    Config {
        /// Config subcommand.
        #[command(subcommand)]
        action: ConfigAction,
    },
}

/// Config subcommands.
#[derive(Subcommand)]
pub(crate) enum ConfigAction {
    /// Initialize config file with defaults.
    Init,
    /// Show resolved configuration.
    Show,
}

// ---------------------------------------------------------------------------
// Tracing setup
// ---------------------------------------------------------------------------

/// Initialize tracing based on CLI flags.
pub(crate) fn init_tracing(cli: &Cli) {
    use tracing_subscriber::{EnvFilter, fmt};

    let filter = match cli.verbose {
        0 => "sitemapgen=info",
        1 => "sitemapgen=debug,tower_http=debug",
        _ => "sitemapgen=trace,tower_http=trace",
    };

    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter));

    match cli.log_format {
        LogFormat::Text => {
            fmt().with_env_filter(env_filter).with_target(false).init();
        }
        LogFormat::Json => {
            fmt().json().with_env_filter(env_filter).init();
        }
    }
}

// ---------------------------------------------------------------------------
// Command dispatch
// ---------------------------------------------------------------------------

/// Run the CLI command.
pub(crate) async fn run(cli: Cli) -> Result<()> {
    let config_path = cli.config.as_deref();
    match cli.command {
        Command::Discover { site, json } => cmd_discover(config_path, &site, json).await,
        Command::Generate { site } => cmd_generate(config_path, &site).await,
        Command::Serve {
            site,
            host,
            port,
            no_schedule,
        } => cmd_serve(config_path, &site, host, port, no_schedule).await,
        Command::Stats { history, json } => cmd_stats(config_path, history, json).await,
        Command::Config { action } => match action {
            ConfigAction::Init => cmd_config_init().await,
            ConfigAction::Show => cmd_config_show(config_path).await,
        },
    }
}

/// Load the config file (explicit path or default location) and apply overrides.
fn resolve_config(path: Option<&Path>, site: &SiteArgs) -> Result<AppConfig> {
    let mut config = match path {
        Some(path) => load_config_from(path)?,
        None => load_config()?,
    };
    site.apply(&mut config);
    config.validate()?;
    Ok(config)
}

// ---------------------------------------------------------------------------
// Command handlers
// ---------------------------------------------------------------------------

async fn cmd_discover(config_path: Option<&Path>, site: &SiteArgs, json: bool) -> Result<()> {
    let config = resolve_config(config_path, site)?;
    let root = expand_home(&config.site.route_root);
    info!(root = %root.display(), "discovering routes");

    let discovery = config.discovery.clone();
    let report = tokio::task::spawn_blocking(move || discover_all_pages(&root, &discovery))
        .await
        .wrap_err("discovery task failed")??;

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    println!();
    for (key, pair) in &report.pairs {
        let page_type = pair
            .get(Locale::En)
            .or_else(|| pair.get(Locale::Es))
            .map(|p| p.page_type.as_str())
            .unwrap_or("-");
        let en = if pair.get(Locale::En).is_some() { "en" } else { "  " };
        let es = if pair.get(Locale::Es).is_some() { "es" } else { "  " };
        println!("  {en} {es}  {page_type:<14} {key}");
    }
    println!();
    println!("  Pages:        {}", report.page_count());
    println!("  Pairs:        {}", report.pairs.len());
    println!("  Complete:     {}", report.complete_pairs());
    println!("  Untranslated: {}", report.missing_translations().len());
    println!("  Dynamic:      {}", report.dynamic_routes.len());
    println!("  Skipped:      {}", report.skipped);
    println!("  Unreadable:   {}", report.unreadable);
    for collision in &report.collisions {
        println!(
            "  Collision:    {} ({}) kept {} over {}",
            collision.pair_key,
            collision.locale.code(),
            collision.kept,
            collision.replaced
        );
    }
    println!();

    Ok(())
}

async fn cmd_generate(config_path: Option<&Path>, site: &SiteArgs) -> Result<()> {
    let config = resolve_config(config_path, site)?;
    let generation = GenerationConfig::try_from(&config)?;

    info!(
        base_url = %generation.base_url,
        root = %generation.route_root.display(),
        out = %generation.output_dir.display(),
        "generating sitemaps"
    );

    let result = tokio::task::spawn_blocking(move || {
        let reporter = CliProgress::new();
        generate(&generation, &reporter)
    })
    .await
    .wrap_err("generation task failed")??;

    println!();
    println!("  Sitemaps written to {}", result.output_dir.display());
    for file in &result.manifest.files {
        println!(
            "  {:<28} {:>6} urls  {:>9} bytes",
            file.filename, file.url_count, file.size_bytes
        );
    }
    println!("  Total pages: {}", result.total_pages);
    println!("  Dynamic:     {} (excluded)", result.dynamic_routes);
    if result.collisions > 0 {
        println!("  Collisions:  {}", result.collisions);
    }
    println!("  Time:        {:.1}s", result.elapsed.as_secs_f64());
    println!();

    if let Some(err) = result.partial_error() {
        return Err(err.into());
    }

    Ok(())
}

async fn cmd_serve(
    config_path: Option<&Path>,
    site: &SiteArgs,
    host: Option<String>,
    port: Option<u16>,
    no_schedule: bool,
) -> Result<()> {
    let mut config = resolve_config(config_path, site)?;
    if let Some(host) = host {
        config.server.host = host;
    }
    if let Some(port) = port {
        config.server.port = port;
    }

    let generation = GenerationConfig::try_from(&config)?;
    let schedule = Schedule::from_config(&config.schedule)?;
    let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port)
        .parse()
        .map_err(|e| eyre!("invalid bind address {}:{}: {e}", config.server.host, config.server.port))?;

    let db_path = expand_home(&config.storage.db_path);
    let storage = Storage::open(&db_path).await?;
    info!(db = %db_path.display(), "run history opened");

    let scheduler = Arc::new(Scheduler::new(
        Arc::new(PipelineJob::new(generation.clone())),
        Arc::new(storage),
        schedule,
    ));
    scheduler.load_latest().await?;

    if config.schedule.enabled && !no_schedule {
        scheduler.start().await;
    }

    let state = AppState::new(generation, Arc::clone(&scheduler));
    let served = sitemapgen_server::serve(state, addr).await;

    scheduler.stop().await;
    served?;
    Ok(())
}

async fn cmd_stats(config_path: Option<&Path>, history: Option<u32>, json: bool) -> Result<()> {
    let config = resolve_config(config_path, &SiteArgs::default())?;
    let db_path = expand_home(&config.storage.db_path);
    let storage = Storage::open_readonly(&db_path).await?;

    let runs = match history {
        Some(limit) => storage.list_run_stats(limit).await?,
        None => storage.latest_run_stats().await?.into_iter().collect(),
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&runs)?);
        return Ok(());
    }

    if runs.is_empty() {
        println!("No runs recorded yet.");
        return Ok(());
    }

    println!();
    for run in &runs {
        print_run(run);
    }

    Ok(())
}

fn print_run(run: &RunStats) {
    let status = if run.failed { "FAILED" } else { "ok" };
    let delta = match run.delta() {
        Some(d) => format!(" ({d:+})"),
        None => String::new(),
    };
    println!(
        "  {}  {:<9}  {:<6}  {} pages{delta}  {} ms",
        run.timestamp.format("%Y-%m-%d %H:%M:%S"),
        run.trigger.as_str(),
        status,
        run.total_pages,
        run.duration_ms
    );
    if let Some(message) = &run.error_message {
        println!("      error: {message}");
    }
    if !run.failed_partitions.is_empty() {
        println!("      omitted: {}", run.failed_partitions.join(", "));
    }
    for (name, count) in &run.per_partition_counts {
        println!("      {name:<20} {count}");
    }
    println!();
}

async fn cmd_config_init() -> Result<()> {
    let path = init_config()?;
    println!("Config initialized at: {}", path.display());
    Ok(())
}

async fn cmd_config_show(config_path: Option<&Path>) -> Result<()> {
    let config = match config_path {
        Some(path) => load_config_from(path)?,
        None => load_config()?,
    };
    let toml_str = toml::to_string_pretty(&config)?;
    println!("{toml_str}");
    Ok(())
}

// ---------------------------------------------------------------------------
// CLI progress reporter
// ---------------------------------------------------------------------------

/// CLI progress reporter using an indicatif spinner.
struct CliProgress {
    spinner: ProgressBar,
}

impl CliProgress {
    fn new() -> Self {
        let spinner = ProgressBar::new_spinner();
        spinner.set_style(
            ProgressStyle::with_template("{spinner:.cyan} {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_spinner())
                .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"]),
        );
        spinner.enable_steady_tick(std::time::Duration::from_millis(80));
        Self { spinner }
    }
}

impl ProgressReporter for CliProgress {
    fn phase(&self, name: &str) {
        self.spinner.set_message(name.to_string());
    }

    fn file_written(&self, filename: &str, url_count: usize) {
        self.spinner
            .set_message(format!("Wrote {filename} ({url_count} urls)"));
    }

    fn done(&self, _result: &GenerateResult) {
        self.spinner.finish_and_clear();
    }
}

impl Drop for CliProgress {
    fn drop(&mut self) {
        if !self.spinner.is_finished() {
            self.spinner.finish_and_clear();
        }
    }
}
