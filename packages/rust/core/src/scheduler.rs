//! Scheduler & monitor: daily regeneration plus manual triggers, one run at a
//! time, with every outcome recorded as [`RunStats`].
//!
//! The job itself is injected through [`SitemapJob`] and persistence through
//! [`StatsStore`], so tests can drive the scheduler with stand-ins.

use std::any::Any;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Instant;

use async_trait::async_trait;
use chrono::{DateTime, FixedOffset, NaiveDate, NaiveTime, Utc};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{error, info, instrument, warn};

use sitemapgen_shared::{
    GenerationConfig, Result, RunStats, RunTrigger, ScheduleConfig, SitemapError,
};
use sitemapgen_storage::Storage;

use crate::pipeline::{self, SilentProgress};

// ---------------------------------------------------------------------------
// Job
// ---------------------------------------------------------------------------

/// What a successful job reports back.
#[derive(Debug, Clone, Default)]
pub struct JobOutput {
    pub per_partition_counts: std::collections::BTreeMap<String, usize>,
    pub total_pages: usize,
    pub failed_partitions: Vec<String>,
}

/// The unit of work a run executes. Runs on a blocking worker thread.
pub trait SitemapJob: Send + Sync + 'static {
    fn run(&self) -> Result<JobOutput>;
}

/// Production job: the full generation pipeline.
pub struct PipelineJob {
    config: GenerationConfig,
}

impl PipelineJob {
    pub fn new(config: GenerationConfig) -> Self {
        Self { config }
    }
}

impl SitemapJob for PipelineJob {
    fn run(&self) -> Result<JobOutput> {
        let result = pipeline::generate(&self.config, &SilentProgress)?;
        Ok(JobOutput {
            per_partition_counts: result.per_partition_counts,
            total_pages: result.total_pages,
            failed_partitions: result.failed_partitions,
        })
    }
}

// ---------------------------------------------------------------------------
// Stats persistence
// ---------------------------------------------------------------------------

/// Where finished runs are recorded.
#[async_trait]
pub trait StatsStore: Send + Sync {
    async fn record(&self, stats: &RunStats) -> Result<()>;
    async fn latest(&self) -> Result<Option<RunStats>>;
    /// Page total of the latest successful run.
    async fn latest_successful_total(&self) -> Result<Option<usize>>;
}

#[async_trait]
impl StatsStore for Storage {
    async fn record(&self, stats: &RunStats) -> Result<()> {
        self.insert_run_stats(stats).await
    }

    async fn latest(&self) -> Result<Option<RunStats>> {
        self.latest_run_stats().await
    }

    async fn latest_successful_total(&self) -> Result<Option<usize>> {
        Storage::latest_successful_total(self).await
    }
}

/// In-process store, for tests and for running without a database.
#[derive(Default)]
pub struct MemoryStatsStore {
    runs: Mutex<Vec<RunStats>>,
}

impl MemoryStatsStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every recorded run, oldest first.
    pub fn runs(&self) -> Vec<RunStats> {
        self.runs.lock().map(|r| r.clone()).unwrap_or_default()
    }
}

#[async_trait]
impl StatsStore for MemoryStatsStore {
    async fn record(&self, stats: &RunStats) -> Result<()> {
        self.runs
            .lock()
            .map_err(|e| SitemapError::Storage(e.to_string()))?
            .push(stats.clone());
        Ok(())
    }

    async fn latest(&self) -> Result<Option<RunStats>> {
        let runs = self
            .runs
            .lock()
            .map_err(|e| SitemapError::Storage(e.to_string()))?;
        Ok(runs.last().cloned())
    }

    async fn latest_successful_total(&self) -> Result<Option<usize>> {
        let runs = self
            .runs
            .lock()
            .map_err(|e| SitemapError::Storage(e.to_string()))?;
        Ok(runs.iter().rev().find(|r| !r.failed).map(|r| r.total_pages))
    }
}

// ---------------------------------------------------------------------------
// Schedule
// ---------------------------------------------------------------------------

/// A fixed local time of day in a fixed UTC offset.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Schedule {
    pub time: NaiveTime,
    pub offset: FixedOffset,
}

impl Schedule {
    pub fn from_config(config: &ScheduleConfig) -> Result<Self> {
        Ok(Self {
            time: config.parse_time()?,
            offset: config.parse_offset()?,
        })
    }

    /// The first firing strictly after `now`.
    pub fn next_after(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        let today = now.with_timezone(&self.offset).date_naive();
        let at = |date: NaiveDate| {
            date.and_time(self.time)
                .and_local_timezone(self.offset)
                .single()
                .map(|dt| dt.with_timezone(&Utc))
        };

        at(today)
            .filter(|t| *t > now)
            .or_else(|| today.succ_opt().and_then(at))
            .unwrap_or_else(|| now + chrono::Duration::days(1))
    }
}

// ---------------------------------------------------------------------------
// Scheduler
// ---------------------------------------------------------------------------

/// Result of a trigger.
#[derive(Debug, Clone, PartialEq)]
pub enum RunOutcome {
    /// The run finished (successfully or not) and was recorded.
    Completed(RunStats),
    /// Another run was already in flight; nothing happened.
    Skipped,
}

struct Inner {
    job: Arc<dyn SitemapJob>,
    store: Arc<dyn StatsStore>,
    schedule: Schedule,
    running: AtomicBool,
    latest: watch::Sender<Option<RunStats>>,
}

struct ArmedSchedule {
    stop: watch::Sender<bool>,
    handle: JoinHandle<()>,
}

/// Runs the sitemap job on a daily schedule or on demand.
pub struct Scheduler {
    inner: Arc<Inner>,
    armed: tokio::sync::Mutex<Option<ArmedSchedule>>,
}

/// Clears the running flag when a run ends, however it ends.
struct RunningGuard<'a>(&'a AtomicBool);

impl Drop for RunningGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

impl Scheduler {
    pub fn new(job: Arc<dyn SitemapJob>, store: Arc<dyn StatsStore>, schedule: Schedule) -> Self {
        let (latest, _) = watch::channel(None);
        Self {
            inner: Arc::new(Inner {
                job,
                store,
                schedule,
                running: AtomicBool::new(false),
                latest,
            }),
            armed: tokio::sync::Mutex::new(None),
        }
    }

    /// Seed the in-memory latest stats from the store.
    pub async fn load_latest(&self) -> Result<()> {
        let latest = self.inner.store.latest().await?;
        self.inner.latest.send_replace(latest);
        Ok(())
    }

    /// Run once now and wait for it. Returns [`RunOutcome::Skipped`] if a run
    /// is already in flight.
    pub async fn run_now(&self) -> RunOutcome {
        self.inner.execute(RunTrigger::Manual).await
    }

    /// Arm the daily schedule. Returns `false` if it was already armed.
    pub async fn start(&self) -> bool {
        let mut armed = self.armed.lock().await;
        if armed.is_some() {
            return false;
        }

        let (stop, stop_rx) = watch::channel(false);
        let handle = tokio::spawn(schedule_loop(Arc::clone(&self.inner), stop_rx));
        *armed = Some(ArmedSchedule { stop, handle });
        info!(
            time = %self.inner.schedule.time,
            offset = %self.inner.schedule.offset,
            "sitemap schedule armed"
        );
        true
    }

    /// Disarm the schedule, waiting for an in-flight scheduled run to finish.
    /// Returns `false` if it was not armed.
    pub async fn stop(&self) -> bool {
        let Some(armed) = self.armed.lock().await.take() else {
            return false;
        };
        let _ = armed.stop.send(true);
        if let Err(e) = armed.handle.await {
            warn!(error = %e, "schedule task ended abnormally");
        }
        info!("sitemap schedule disarmed");
        true
    }

    /// Latest recorded run, if any.
    pub fn get_stats(&self) -> Option<RunStats> {
        self.inner.latest.borrow().clone()
    }

    pub fn is_running(&self) -> bool {
        self.inner.running.load(Ordering::Acquire)
    }

    pub async fn is_scheduled(&self) -> bool {
        self.armed.lock().await.is_some()
    }
}

impl Inner {
    #[instrument(skip_all, fields(trigger = trigger.as_str()))]
    async fn execute(&self, trigger: RunTrigger) -> RunOutcome {
        if self
            .running
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            info!("sitemap run already in progress, skipping trigger");
            return RunOutcome::Skipped;
        }
        let _guard = RunningGuard(&self.running);

        let previous = match self.store.latest_successful_total().await {
            Ok(total) => total,
            Err(e) => {
                warn!(error = %e, "could not read previous run total");
                None
            }
        };

        let stats = RunStats::started(trigger, previous);
        info!(run_id = %stats.run_id, "sitemap run started");
        let start = Instant::now();

        let job = Arc::clone(&self.job);
        let result = tokio::task::spawn_blocking(move || job.run()).await;
        let duration_ms = start.elapsed().as_millis() as u64;

        let stats = match result {
            Ok(Ok(output)) => {
                for partition in &output.failed_partitions {
                    warn!(partition = %partition, "partition omitted from this run");
                }
                stats.succeed(
                    output.per_partition_counts,
                    output.total_pages,
                    output.failed_partitions,
                    duration_ms,
                )
            }
            Ok(Err(e)) => {
                error!(error = %e, "sitemap run failed");
                stats.fail(e.to_string(), duration_ms)
            }
            Err(join_err) => {
                let message = if join_err.is_panic() {
                    format!("job panicked: {}", panic_message(join_err.into_panic()))
                } else {
                    "job was cancelled".to_string()
                };
                error!(error = %message, "sitemap run failed");
                stats.fail(message, duration_ms)
            }
        };

        if let Err(e) = self.store.record(&stats).await {
            error!(error = %e, run_id = %stats.run_id, "could not persist run stats");
        }
        self.latest.send_replace(Some(stats.clone()));

        info!(
            run_id = %stats.run_id,
            failed = stats.failed,
            total_pages = stats.total_pages,
            delta = ?stats.delta(),
            duration_ms,
            "sitemap run finished"
        );

        RunOutcome::Completed(stats)
    }
}

async fn schedule_loop(inner: Arc<Inner>, mut stop: watch::Receiver<bool>) {
    loop {
        let now = Utc::now();
        let next = inner.schedule.next_after(now);
        let wait = (next - now).to_std().unwrap_or_default();
        info!(next_run = %next, "next scheduled sitemap run");

        tokio::select! {
            _ = tokio::time::sleep(wait) => {}
            _ = stop.changed() => break,
        }
        if *stop.borrow() {
            break;
        }

        inner.execute(RunTrigger::Scheduled).await;
    }
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;
    use std::sync::atomic::AtomicUsize;
    use std::time::Duration;

    struct CountingJob {
        calls: AtomicUsize,
        pause: Duration,
        total: usize,
    }

    impl SitemapJob for CountingJob {
        fn run(&self) -> Result<JobOutput> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            std::thread::sleep(self.pause);
            let mut counts = BTreeMap::new();
            counts.insert("pages".to_string(), self.total);
            Ok(JobOutput {
                per_partition_counts: counts,
                total_pages: self.total,
                failed_partitions: Vec::new(),
            })
        }
    }

    struct FailingJob;

    impl SitemapJob for FailingJob {
        fn run(&self) -> Result<JobOutput> {
            Err(SitemapError::discovery("route root is not a directory"))
        }
    }

    struct PanickingJob;

    impl SitemapJob for PanickingJob {
        fn run(&self) -> Result<JobOutput> {
            panic!("boom");
        }
    }

    fn schedule() -> Schedule {
        Schedule {
            time: NaiveTime::from_hms_opt(3, 0, 0).unwrap(),
            offset: FixedOffset::west_opt(5 * 3600).unwrap(),
        }
    }

    fn counting(total: usize, pause_ms: u64) -> Arc<CountingJob> {
        Arc::new(CountingJob {
            calls: AtomicUsize::new(0),
            pause: Duration::from_millis(pause_ms),
            total,
        })
    }

    #[tokio::test]
    async fn run_now_records_success() {
        let store = Arc::new(MemoryStatsStore::new());
        let scheduler = Scheduler::new(counting(12, 0), store.clone(), schedule());

        assert!(scheduler.get_stats().is_none());
        let RunOutcome::Completed(stats) = scheduler.run_now().await else {
            panic!("expected a completed run");
        };
        assert!(!stats.failed);
        assert_eq!(stats.total_pages, 12);
        assert_eq!(stats.trigger, RunTrigger::Manual);
        assert_eq!(scheduler.get_stats(), Some(stats));
        assert_eq!(store.runs().len(), 1);
        assert!(!scheduler.is_running());
    }

    #[tokio::test]
    async fn concurrent_triggers_run_once() {
        let store = Arc::new(MemoryStatsStore::new());
        let job = counting(3, 200);
        let scheduler = Scheduler::new(job.clone(), store.clone(), schedule());

        let (a, b) = tokio::join!(scheduler.run_now(), scheduler.run_now());
        let completed = [&a, &b]
            .iter()
            .filter(|o| matches!(o, RunOutcome::Completed(_)))
            .count();
        assert_eq!(completed, 1);
        assert!(a == RunOutcome::Skipped || b == RunOutcome::Skipped);
        assert_eq!(job.calls.load(Ordering::SeqCst), 1);
        assert_eq!(store.runs().len(), 1);
    }

    #[tokio::test]
    async fn errors_become_failed_stats() {
        let store = Arc::new(MemoryStatsStore::new());
        let scheduler = Scheduler::new(Arc::new(FailingJob), store.clone(), schedule());

        let RunOutcome::Completed(stats) = scheduler.run_now().await else {
            panic!("expected a completed run");
        };
        assert!(stats.failed);
        assert!(stats.error_message.unwrap().contains("route root"));
        assert!(!scheduler.is_running());
    }

    #[tokio::test]
    async fn panics_are_contained() {
        let store = Arc::new(MemoryStatsStore::new());
        let scheduler = Scheduler::new(Arc::new(PanickingJob), store.clone(), schedule());

        let RunOutcome::Completed(stats) = scheduler.run_now().await else {
            panic!("expected a completed run");
        };
        assert!(stats.failed);
        assert!(stats.error_message.as_deref().unwrap().contains("boom"));

        // The guard was released, so the next trigger runs.
        assert!(matches!(scheduler.run_now().await, RunOutcome::Completed(_)));
        assert_eq!(store.runs().len(), 2);
    }

    #[tokio::test]
    async fn previous_total_comes_from_last_success() {
        let store = Arc::new(MemoryStatsStore::new());
        let first = Scheduler::new(counting(10, 0), store.clone(), schedule());
        first.run_now().await;

        let failing = Scheduler::new(Arc::new(FailingJob), store.clone(), schedule());
        failing.run_now().await;

        let second = Scheduler::new(counting(14, 0), store.clone(), schedule());
        let RunOutcome::Completed(stats) = second.run_now().await else {
            panic!("expected a completed run");
        };
        assert_eq!(stats.previous_total_pages, Some(10));
        assert_eq!(stats.delta(), Some(4));
    }

    #[tokio::test]
    async fn load_latest_seeds_stats() {
        let store = Arc::new(MemoryStatsStore::new());
        let earlier = Scheduler::new(counting(7, 0), store.clone(), schedule());
        earlier.run_now().await;

        let fresh = Scheduler::new(counting(7, 0), store.clone(), schedule());
        assert!(fresh.get_stats().is_none());
        fresh.load_latest().await.unwrap();
        assert_eq!(fresh.get_stats().map(|s| s.total_pages), Some(7));
    }

    #[tokio::test]
    async fn start_and_stop_schedule() {
        let store = Arc::new(MemoryStatsStore::new());
        let scheduler = Scheduler::new(counting(1, 0), store, schedule());

        assert!(scheduler.start().await);
        assert!(!scheduler.start().await);
        assert!(scheduler.is_scheduled().await);

        assert!(scheduler.stop().await);
        assert!(!scheduler.stop().await);
        assert!(!scheduler.is_scheduled().await);
    }

    #[test]
    fn next_after_same_day_and_rollover() {
        let s = schedule();
        // 07:00Z is 02:00 at -05:00, so the 03:00 firing is an hour away.
        let now = DateTime::parse_from_rfc3339("2025-01-10T07:00:00Z")
            .unwrap()
            .with_timezone(&Utc);
        assert_eq!(s.next_after(now).to_rfc3339(), "2025-01-10T08:00:00+00:00");

        // Exactly at the firing time rolls to the next day.
        let now = DateTime::parse_from_rfc3339("2025-01-10T08:00:00Z")
            .unwrap()
            .with_timezone(&Utc);
        assert_eq!(s.next_after(now).to_rfc3339(), "2025-01-11T08:00:00+00:00");
    }

    #[tokio::test]
    async fn pipeline_job_against_missing_root_fails() {
        let tmp = std::env::temp_dir().join(format!("sitemapgen-sched-{}", uuid::Uuid::now_v7()));
        let config = GenerationConfig {
            base_url: url::Url::parse("https://www.example.com").unwrap(),
            route_root: tmp.join("missing"),
            output_dir: tmp.join("public"),
            discovery: Default::default(),
            max_urls: 10,
            max_bytes: 1_000_000,
            hreflang: false,
        };
        let store = Arc::new(MemoryStatsStore::new());
        let scheduler = Scheduler::new(Arc::new(PipelineJob::new(config)), store, schedule());

        let RunOutcome::Completed(stats) = scheduler.run_now().await else {
            panic!("expected a completed run");
        };
        assert!(stats.failed);
        assert!(!tmp.join("public").exists());
    }
}
