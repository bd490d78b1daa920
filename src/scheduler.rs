//! Scheduler (C5): drives comparison jobs through their lifecycle under a
//! bounded concurrency budget, with periodic stall recovery.
//!
//! The tick/stall-sweep shape follows `riptide-workers`' `scheduler.rs`
//! (a periodic check loop gated by a `running` flag); the worker pool is a
//! `rayon::ThreadPool`, the same pool-of-workers primitive the teacher
//! already uses in `ComparisonEngine::run` to fan out comparison work,
//! here reused to bound concurrent jobs instead of concurrent pairs.

use crate::collaborators::{ComparisonRepository, FileStore, Parser, RendererFactory, SsimKernel};
use crate::config::{GovernorConfig, MatcherConfig, SchedulerConfig};
use crate::document_matcher::match_documents;
use crate::fingerprint::build_page_fingerprints;
use crate::governor::ResourceGovernor;
use crate::page_matcher::match_pages;
use crate::types::{
    Comparison, ComparisonStatus, ComparisonSummary, DifferenceCounts, DocumentPair, SourceType,
};
use log::{error, info, warn};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Instant;

struct ActiveEntry {
    started_at: Instant,
    last_heartbeat: Instant,
}

/// Drives PENDING comparisons to completion under `max_concurrent_comparisons`,
/// and resets stalled jobs back to PENDING on a slower cadence.
pub struct Scheduler {
    scheduler_config: SchedulerConfig,
    matcher_config: MatcherConfig,
    governor: Arc<ResourceGovernor>,
    repository: Arc<dyn ComparisonRepository>,
    parser: Arc<dyn Parser>,
    renderer_factory: Arc<dyn RendererFactory>,
    file_store: Arc<dyn FileStore>,
    ssim: Arc<dyn SsimKernel>,
    active: Arc<Mutex<HashMap<String, ActiveEntry>>>,
    pool: rayon::ThreadPool,
    running: Arc<AtomicBool>,
}

impl Scheduler {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        scheduler_config: SchedulerConfig,
        matcher_config: MatcherConfig,
        governor_config: GovernorConfig,
        repository: Arc<dyn ComparisonRepository>,
        parser: Arc<dyn Parser>,
        renderer_factory: Arc<dyn RendererFactory>,
        file_store: Arc<dyn FileStore>,
        ssim: Arc<dyn SsimKernel>,
    ) -> Self {
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(scheduler_config.worker_count)
            .build()
            .expect("failed to build scheduler worker pool");

        Self {
            governor: Arc::new(ResourceGovernor::new(governor_config)),
            scheduler_config,
            matcher_config,
            repository,
            parser,
            renderer_factory,
            file_store,
            ssim,
            active: Arc::new(Mutex::new(HashMap::new())),
            pool,
            running: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Current size of the active set. Exposed for tests and monitoring;
    /// always `<= max_concurrent_comparisons`.
    pub fn active_count(&self) -> usize {
        self.active.lock().unwrap().len()
    }

    /// Spawns the tick and stall-sweep loops on dedicated OS threads.
    pub fn start(self: &Arc<Self>) {
        self.running.store(true, Ordering::SeqCst);

        let tick_self = Arc::clone(self);
        std::thread::spawn(move || {
            while tick_self.running.load(Ordering::SeqCst) {
                if let Err(e) = tick_self.tick() {
                    error!("scheduler tick aborted: {e}");
                }
                std::thread::sleep(tick_self.scheduler_config.tick_interval);
            }
        });

        let sweep_self = Arc::clone(self);
        std::thread::spawn(move || {
            while sweep_self.running.load(Ordering::SeqCst) {
                std::thread::sleep(sweep_self.scheduler_config.stall_sweep_interval);
                if let Err(e) = sweep_self.stall_sweep() {
                    error!("stall sweep aborted: {e}");
                }
            }
        });
    }

    pub fn stop(&self) {
        self.running.store(false, Ordering::SeqCst);
    }

    /// One scheduler tick: admits PENDING jobs up to capacity and submits
    /// each to the worker pool. The active-set lock is held only for the
    /// O(1) inserts; workers run after it is released.
    pub fn tick(self: &Arc<Self>) -> anyhow::Result<()> {
        let to_admit = {
            let mut active = self.active.lock().unwrap();
            if active.len() >= self.scheduler_config.max_concurrent_comparisons {
                return Ok(());
            }

            let pending = self
                .repository
                .find_by_status(ComparisonStatus::Pending)
                .map_err(anyhow::Error::from)?;

            let mut admitted = Vec::new();
            for job in pending {
                if active.len() >= self.scheduler_config.max_concurrent_comparisons {
                    break;
                }
                if active.contains_key(&job.id) {
                    continue;
                }
                let now = Instant::now();
                active.insert(
                    job.id.clone(),
                    ActiveEntry {
                        started_at: now,
                        last_heartbeat: now,
                    },
                );
                admitted.push(job);
            }
            admitted
        };

        for job in to_admit {
            let worker = Arc::clone(self);
            self.pool.spawn(move || worker.run_job(job));
        }

        Ok(())
    }

    /// Refreshes a job's heartbeat in the active set. Called by
    /// `run_job` after each unit of progress so operators can tell a slow
    /// worker from a dead one, without weakening the "active set entries
    /// are never touched by the sweep" rule.
    fn heartbeat(&self, job_id: &str) {
        if let Some(entry) = self.active.lock().unwrap().get_mut(job_id) {
            entry.last_heartbeat = Instant::now();
        }
    }

    fn run_job(&self, mut job: Comparison) {
        job.start_time = Some(now_unix());
        job.status = ComparisonStatus::DocumentMatching;
        if let Err(e) = self.repository.save(&job) {
            warn!("failed to persist DOCUMENT_MATCHING transition for {}: {e}", job.id);
        }

        let outcome = self.execute_job(&mut job);

        match outcome {
            Ok(()) => {
                job.status = ComparisonStatus::Completed;
                job.end_time = Some(now_unix());
                job.status_message = None;
            }
            Err(e) => {
                job.status = ComparisonStatus::Failed;
                job.end_time = Some(now_unix());
                job.status_message = Some(e.to_string());
            }
        }

        if let Err(e) = self.repository.save(&job) {
            error!("failed to persist final state for job {}: {e}", job.id);
        }

        self.active.lock().unwrap().remove(&job.id);
    }

    /// Read-only access to the governor, e.g. for embedders that want to
    /// surface pressure levels alongside scheduler metrics.
    pub fn governor(&self) -> &ResourceGovernor {
        &self.governor
    }

    fn execute_job(&self, job: &mut Comparison) -> anyhow::Result<()> {
        // C2 is consulted before any memory-heavy step; purely advisory,
        // so the rest of this function's behaviour never depends on it.
        self.governor.respond_to_pressure();

        let (base_bytes, compare_bytes) = self
            .file_store
            .load_pair(&job.id)
            .map_err(anyhow::Error::from)?;

        let base_doc = self
            .parser
            .process_document(&base_bytes)
            .map_err(anyhow::Error::from)?;
        let compare_doc = self
            .parser
            .process_document(&compare_bytes)
            .map_err(anyhow::Error::from)?;
        self.heartbeat(&job.id);

        let base_renderer = self
            .renderer_factory
            .create(&base_bytes)
            .map_err(anyhow::Error::from)?;
        let compare_renderer = self
            .renderer_factory
            .create(&compare_bytes)
            .map_err(anyhow::Error::from)?;

        let base_fingerprints = build_page_fingerprints(&base_doc, SourceType::Base);
        let compare_fingerprints = build_page_fingerprints(&compare_doc, SourceType::Compare);
        let base_texts: Vec<String> = base_fingerprints.iter().map(|f| f.text.clone()).collect();
        let compare_texts: Vec<String> =
            compare_fingerprints.iter().map(|f| f.text.clone()).collect();

        self.governor.respond_to_pressure();
        let matches = match_documents(
            &base_doc.boundaries,
            &compare_doc.boundaries,
            &base_texts,
            &compare_texts,
            base_renderer.as_ref(),
            compare_renderer.as_ref(),
            self.ssim.as_ref(),
            &self.matcher_config,
        )
        .map_err(anyhow::Error::from)?;

        job.status = ComparisonStatus::Comparing;
        self.heartbeat(&job.id);

        let mut document_pairs = Vec::with_capacity(matches.len());
        for m in &matches {
            // Consulted once per document pair, ahead of that pair's page
            // matrix: the memory-heaviest step in the per-pair loop.
            self.governor.respond_to_pressure();

            let base_boundary = &base_doc.boundaries[m.base_doc_index];
            let compare_boundary = &compare_doc.boundaries[m.compare_doc_index];

            let mappings = match_pages(
                base_boundary,
                compare_boundary,
                &base_texts,
                &compare_texts,
                base_renderer.as_ref(),
                compare_renderer.as_ref(),
                self.ssim.as_ref(),
                &self.matcher_config,
            );
            self.heartbeat(&job.id);

            document_pairs.push(DocumentPair {
                base_range: (base_boundary.start_page, base_boundary.end_page),
                compare_range: (compare_boundary.start_page, compare_boundary.end_page),
                score: m.score,
                mappings,
                counts: DifferenceCounts::default(),
            });
        }

        job.status = ComparisonStatus::Processing;
        self.heartbeat(&job.id);

        job.summary = summarize(&document_pairs);
        job.document_pairs = document_pairs;

        Ok(())
    }

    /// Resets any job in a non-terminal comparing state whose `startTime`
    /// is older than the stall threshold, and which is not currently owned
    /// by a worker. A job in the active set is never touched, by design,
    /// even if its heartbeat looks stale — that only gets logged.
    pub fn stall_sweep(&self) -> anyhow::Result<()> {
        let mut stuck = Vec::new();
        for status in [
            ComparisonStatus::Processing,
            ComparisonStatus::DocumentMatching,
            ComparisonStatus::Comparing,
        ] {
            stuck.extend(
                self.repository
                    .find_by_status(status)
                    .map_err(anyhow::Error::from)?,
            );
        }

        let now = now_unix();
        let threshold_secs = self.scheduler_config.stall_threshold.as_secs() as i64;
        let active = self.active.lock().unwrap();

        for mut job in stuck {
            if active.contains_key(&job.id) {
                if let Some(entry) = active.get(&job.id) {
                    if entry.last_heartbeat.elapsed() > self.scheduler_config.stall_threshold {
                        warn!(
                            "job {} has a stale heartbeat (running {:?}) but is still in the active set; leaving it alone",
                            job.id,
                            entry.started_at.elapsed()
                        );
                    }
                }
                continue;
            }

            let stalled = match job.start_time {
                Some(start) => now - start >= threshold_secs,
                None => false,
            };

            if stalled {
                job.status = ComparisonStatus::Pending;
                job.status_message = Some("Comparison was reset after being stalled".to_string());
                if let Err(e) = self.repository.save(&job) {
                    error!("failed to persist stall reset for {}: {e}", job.id);
                } else {
                    info!("reset stalled job {} to PENDING", job.id);
                }
            }
        }

        Ok(())
    }
}

fn summarize(pairs: &[DocumentPair]) -> ComparisonSummary {
    let mut summary = ComparisonSummary::default();
    for pair in pairs {
        for mapping in &pair.mappings {
            if mapping.is_matched() {
                summary.matched_page_count += 1;
                if mapping.difference_count == 0 {
                    summary.identical += 1;
                } else {
                    summary.with_differences += 1;
                }
            } else if mapping.base_page_number == crate::types::NO_COUNTERPART {
                summary.unmatched_compare += 1;
            } else {
                summary.unmatched_base += 1;
            }
        }
        summary.total_differences += pair.counts.total as u64;
    }

    let total_pages = summary.matched_page_count + summary.unmatched_base + summary.unmatched_compare;
    summary.overall_similarity = if total_pages == 0 {
        0.0
    } else {
        summary.identical as f64 / total_pages as f64
    };

    summary
}

fn now_unix() -> i64 {
    chrono::Utc::now().timestamp()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collaborators::Renderer;
    use crate::error::CoreError;
    use crate::types::{ColorModel, DocumentBoundary, ParsedDocument, ParsedPage, RasterImage};
    use std::sync::Mutex as StdMutex;

    struct NullRenderer;
    impl Renderer for NullRenderer {
        fn render(&self, _i: usize, _dpi: u32, _cm: ColorModel) -> Result<RasterImage, CoreError> {
            Err(CoreError::Render("no renderer in tests".into()))
        }
    }

    struct NullRendererFactory;
    impl RendererFactory for NullRendererFactory {
        fn create(&self, _file: &[u8]) -> Result<Box<dyn Renderer>, CoreError> {
            Ok(Box::new(NullRenderer))
        }
    }

    struct ZeroKernel;
    impl SsimKernel for ZeroKernel {
        fn score(&self, _a: &RasterImage, _b: &RasterImage) -> f64 {
            0.0
        }
    }

    struct FixedParser;
    impl Parser for FixedParser {
        fn process_document(&self, file: &[u8]) -> Result<ParsedDocument, CoreError> {
            let text = String::from_utf8_lossy(file).to_string();
            Ok(ParsedDocument {
                pages: vec![ParsedPage {
                    index: 0,
                    text,
                    fonts: Default::default(),
                    images: vec![],
                    element_count: 0,
                }],
                size: file.len() as u64,
                page_count: 1,
                boundaries: vec![DocumentBoundary::new(0, 0)],
            })
        }
    }

    struct NullFileStore;
    impl FileStore for NullFileStore {
        fn load_pair(&self, _id: &str) -> Result<(Vec<u8>, Vec<u8>), CoreError> {
            Ok((b"hello world".to_vec(), b"hello world".to_vec()))
        }
    }

    struct InMemoryRepository {
        jobs: StdMutex<HashMap<String, Comparison>>,
    }

    impl InMemoryRepository {
        fn with_pending(ids: &[&str]) -> Self {
            let mut jobs = HashMap::new();
            for id in ids {
                jobs.insert(id.to_string(), Comparison::new_pending(*id));
            }
            Self {
                jobs: StdMutex::new(jobs),
            }
        }
    }

    impl ComparisonRepository for InMemoryRepository {
        fn find_by_status(&self, status: ComparisonStatus) -> Result<Vec<Comparison>, CoreError> {
            Ok(self
                .jobs
                .lock()
                .unwrap()
                .values()
                .filter(|j| j.status == status)
                .cloned()
                .collect())
        }

        fn save(&self, comparison: &Comparison) -> Result<(), CoreError> {
            self.jobs
                .lock()
                .unwrap()
                .insert(comparison.id.clone(), comparison.clone());
            Ok(())
        }

        fn find_by_id(&self, id: &str) -> Result<Option<Comparison>, CoreError> {
            Ok(self.jobs.lock().unwrap().get(id).cloned())
        }
    }

    fn build_scheduler(repo: Arc<InMemoryRepository>, max_concurrent: usize) -> Arc<Scheduler> {
        Arc::new(Scheduler::new(
            SchedulerConfig {
                max_concurrent_comparisons: max_concurrent,
                ..SchedulerConfig::default()
            },
            MatcherConfig::default(),
            GovernorConfig::default(),
            repo,
            Arc::new(FixedParser),
            Arc::new(NullRendererFactory),
            Arc::new(NullFileStore),
            Arc::new(ZeroKernel),
        ))
    }

    #[test]
    fn tick_admits_at_most_capacity() {
        let repo = Arc::new(InMemoryRepository::with_pending(&["a", "b", "c", "d", "e"]));
        let scheduler = build_scheduler(Arc::clone(&repo), 2);

        scheduler.tick().unwrap();
        assert!(scheduler.active_count() <= 2);
    }

    #[test]
    fn stall_sweep_ignores_active_jobs() {
        let repo = Arc::new(InMemoryRepository::with_pending(&["a"]));
        {
            let mut jobs = repo.jobs.lock().unwrap();
            let job = jobs.get_mut("a").unwrap();
            job.status = ComparisonStatus::Processing;
            job.start_time = Some(now_unix() - 45 * 60);
        }
        let scheduler = build_scheduler(Arc::clone(&repo), 2);

        scheduler
            .active
            .lock()
            .unwrap()
            .insert(
                "a".to_string(),
                ActiveEntry {
                    started_at: Instant::now(),
                    last_heartbeat: Instant::now(),
                },
            );

        scheduler.stall_sweep().unwrap();

        let job = repo.find_by_id("a").unwrap().unwrap();
        assert_eq!(job.status, ComparisonStatus::Processing);
    }

    #[test]
    fn stall_sweep_resets_inactive_stalled_job() {
        let repo = Arc::new(InMemoryRepository::with_pending(&["a"]));
        {
            let mut jobs = repo.jobs.lock().unwrap();
            let job = jobs.get_mut("a").unwrap();
            job.status = ComparisonStatus::Processing;
            job.start_time = Some(now_unix() - 45 * 60);
        }
        let scheduler = build_scheduler(Arc::clone(&repo), 2);

        scheduler.stall_sweep().unwrap();

        let job = repo.find_by_id("a").unwrap().unwrap();
        assert_eq!(job.status, ComparisonStatus::Pending);
        assert_eq!(
            job.status_message.as_deref(),
            Some("Comparison was reset after being stalled")
        );
    }

    #[test]
    fn stall_sweep_on_job_with_no_start_time_does_not_panic() {
        let repo = Arc::new(InMemoryRepository::with_pending(&["a"]));
        {
            let mut jobs = repo.jobs.lock().unwrap();
            jobs.get_mut("a").unwrap().status = ComparisonStatus::Comparing;
        }
        let scheduler = build_scheduler(Arc::clone(&repo), 2);
        scheduler.stall_sweep().unwrap();
        let job = repo.find_by_id("a").unwrap().unwrap();
        assert_eq!(job.status, ComparisonStatus::Comparing);
    }
}
