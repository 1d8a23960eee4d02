/*!
 * Concurrent batch dispatch.
 *
 * Independent texts are translated by spawned tasks gated by a semaphore.
 * Each job reports on its own: a failing, slow or cancelled job never holds
 * back or alters the others. Reports come back in input order whatever the
 * completion order was.
 */

use log::{debug, error, info};
use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::{Duration, Instant};
use tokio::sync::Semaphore;
use tokio::task::{AbortHandle, JoinHandle};

use crate::errors::TranslationError;

use super::core::Translator;

/// Progress callback: `(completed, total)`
pub type ProgressCallback = Arc<dyn Fn(usize, usize) + Send + Sync>;

/// How one job ended
#[derive(Debug, Clone)]
pub enum JobOutcome {
    /// Translated text
    Translated(String),
    /// The translation failed
    Failed(TranslationError),
    /// The job was cancelled before it finished
    Cancelled,
}

/// Result of one job, tied to its input position
#[derive(Debug, Clone)]
pub struct JobReport {
    /// Position in the input
    pub index: usize,
    /// Source text
    pub source: String,
    /// Outcome
    pub outcome: JobOutcome,
    /// Time from acquiring a worker slot to completion; zero when cancelled
    pub elapsed: Duration,
}

impl JobReport {
    /// Translated text, if any
    pub fn translation(&self) -> Option<&str> {
        match &self.outcome {
            JobOutcome::Translated(text) => Some(text),
            _ => None,
        }
    }

    /// Whether the job produced a translation
    pub fn is_success(&self) -> bool {
        matches!(self.outcome, JobOutcome::Translated(_))
    }
}

/// Cancels jobs of a running batch; cheap to clone
#[derive(Debug, Clone)]
pub struct Canceller {
    handles: Arc<Vec<AbortHandle>>,
}

impl Canceller {
    /// Cancel the job at `index`; false when there is no such job
    pub fn cancel(&self, index: usize) -> bool {
        match self.handles.get(index) {
            Some(handle) => {
                debug!("Cancelling job {}", index);
                handle.abort();
                true
            }
            None => false,
        }
    }

    /// Cancel every job still running
    pub fn cancel_all(&self) {
        for handle in self.handles.iter() {
            handle.abort();
        }
    }
}

/// A started batch
#[derive(Debug)]
pub struct BatchRun {
    sources: Vec<String>,
    handles: Vec<JoinHandle<(Result<String, TranslationError>, Duration)>>,
    canceller: Canceller,
    started: Instant,
}

impl BatchRun {
    /// Handle for cancelling jobs while the batch runs
    pub fn canceller(&self) -> Canceller {
        self.canceller.clone()
    }

    /// Number of jobs
    pub fn len(&self) -> usize {
        self.sources.len()
    }

    /// Whether the batch has no jobs
    pub fn is_empty(&self) -> bool {
        self.sources.is_empty()
    }

    /// Wait for every job and collect reports in input order
    pub async fn wait(self) -> (Vec<JobReport>, BatchSummary) {
        let results = futures::future::join_all(self.handles).await;

        let reports: Vec<JobReport> = self
            .sources
            .into_iter()
            .zip(results)
            .enumerate()
            .map(|(index, (source, joined))| {
                let (outcome, elapsed) = match joined {
                    Ok((Ok(text), elapsed)) => (JobOutcome::Translated(text), elapsed),
                    Ok((Err(e), elapsed)) => (JobOutcome::Failed(e), elapsed),
                    Err(e) if e.is_cancelled() => (JobOutcome::Cancelled, Duration::ZERO),
                    Err(e) => {
                        error!("Job {} worker failed: {}", index, e);
                        (JobOutcome::Failed(TranslationError::Worker(e.to_string())), Duration::ZERO)
                    }
                };
                JobReport {
                    index,
                    source,
                    outcome,
                    elapsed,
                }
            })
            .collect();

        let summary = BatchSummary::from_reports(&reports, self.started.elapsed());
        info!("{}", summary);
        (reports, summary)
    }
}

/// Fans translations out over a bounded worker pool
#[derive(Clone)]
pub struct Dispatcher {
    /// The translator shared by every job
    translator: Arc<Translator>,

    /// Maximum number of concurrent jobs
    max_concurrent: usize,

    /// Bypass the cache for every job
    ignore_cache: bool,

    /// Called after each finished job
    progress: Option<ProgressCallback>,
}

impl fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Dispatcher")
            .field("provider", &self.translator.profile().name)
            .field("max_concurrent", &self.max_concurrent)
            .field("ignore_cache", &self.ignore_cache)
            .finish()
    }
}

impl Dispatcher {
    /// Create a dispatcher; a zero bound is raised to one
    pub fn new(translator: Arc<Translator>, max_concurrent: usize) -> Self {
        Self {
            translator,
            max_concurrent: max_concurrent.max(1),
            ignore_cache: false,
            progress: None,
        }
    }

    /// Bypass the cache for every job
    pub fn with_ignore_cache(mut self, ignore_cache: bool) -> Self {
        self.ignore_cache = ignore_cache;
        self
    }

    /// Report progress after each job
    pub fn with_progress(mut self, callback: impl Fn(usize, usize) + Send + Sync + 'static) -> Self {
        self.progress = Some(Arc::new(callback));
        self
    }

    /// Worker bound
    pub fn max_concurrent(&self) -> usize {
        self.max_concurrent
    }

    /// Worst-case wall-clock time for `jobs` jobs: every wave of
    /// `max_concurrent` jobs may take the translator's full retry bound
    pub fn worst_case(&self, jobs: usize) -> Duration {
        let waves = jobs.div_ceil(self.max_concurrent) as u32;
        self.translator
            .retry_policy()
            .worst_case(self.translator.candidates().len())
            .saturating_mul(waves)
    }

    /// Start translating `texts`; must be called inside a Tokio runtime
    pub fn spawn(&self, texts: Vec<String>) -> BatchRun {
        let total = texts.len();
        let semaphore = Arc::new(Semaphore::new(self.max_concurrent));
        let completed = Arc::new(AtomicUsize::new(0));

        debug!(
            "Dispatching {} jobs over {} workers (worst case {:?})",
            total,
            self.max_concurrent,
            self.worst_case(total)
        );

        let handles: Vec<_> = texts
            .iter()
            .map(|text| {
                let translator = self.translator.clone();
                let semaphore = semaphore.clone();
                let completed = completed.clone();
                let progress = self.progress.clone();
                let ignore_cache = self.ignore_cache;
                let text = text.clone();

                tokio::spawn(async move {
                    let _permit = match semaphore.acquire_owned().await {
                        Ok(permit) => permit,
                        Err(e) => return (Err(TranslationError::Worker(e.to_string())), Duration::ZERO),
                    };

                    let start = Instant::now();
                    let result = translator.translate(&text, ignore_cache).await;
                    let elapsed = start.elapsed();

                    let done = completed.fetch_add(1, Ordering::SeqCst) + 1;
                    if let Some(progress) = &progress {
                        progress(done, total);
                    }
                    (result, elapsed)
                })
            })
            .collect();

        let canceller = Canceller {
            handles: Arc::new(handles.iter().map(JoinHandle::abort_handle).collect()),
        };

        BatchRun {
            sources: texts,
            handles,
            canceller,
            started: Instant::now(),
        }
    }

    /// Translate `texts` and wait for every report
    pub async fn run(&self, texts: Vec<String>) -> (Vec<JobReport>, BatchSummary) {
        self.spawn(texts).wait().await
    }
}

/// Aggregate figures for a finished batch
#[derive(Debug, Clone, PartialEq)]
pub struct BatchSummary {
    /// Jobs in the batch
    pub total: usize,
    /// Jobs that produced a translation
    pub translated: usize,
    /// Jobs that failed
    pub failed: usize,
    /// Jobs that were cancelled
    pub cancelled: usize,
    /// Wall-clock time of the batch
    pub wall_time: Duration,
    /// Mean latency of finished jobs
    pub mean_latency: Duration,
    /// Slowest finished job
    pub max_latency: Duration,
}

impl BatchSummary {
    /// Summarise reports
    pub fn from_reports(reports: &[JobReport], wall_time: Duration) -> Self {
        let mut translated = 0;
        let mut failed = 0;
        let mut cancelled = 0;
        let mut latencies = Vec::with_capacity(reports.len());

        for report in reports {
            match report.outcome {
                JobOutcome::Translated(_) => translated += 1,
                JobOutcome::Failed(_) => failed += 1,
                JobOutcome::Cancelled => cancelled += 1,
            }
            if !matches!(report.outcome, JobOutcome::Cancelled) {
                latencies.push(report.elapsed);
            }
        }

        let mean_latency = if latencies.is_empty() {
            Duration::ZERO
        } else {
            latencies.iter().sum::<Duration>() / latencies.len() as u32
        };

        Self {
            total: reports.len(),
            translated,
            failed,
            cancelled,
            wall_time,
            mean_latency,
            max_latency: latencies.into_iter().max().unwrap_or_default(),
        }
    }

    /// Finished jobs per second of wall time
    pub fn throughput(&self) -> f64 {
        let secs = self.wall_time.as_secs_f64();
        if secs > 0.0 {
            (self.translated + self.failed) as f64 / secs
        } else {
            0.0
        }
    }
}

impl fmt::Display for BatchSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Batch: {} jobs, {} translated, {} failed, {} cancelled in {:.2}s \
             (mean {:.0}ms, max {:.0}ms, {:.1} jobs/s)",
            self.total,
            self.translated,
            self.failed,
            self.cancelled,
            self.wall_time.as_secs_f64(),
            self.mean_latency.as_secs_f64() * 1000.0,
            self.max_latency.as_secs_f64() * 1000.0,
            self.throughput()
        )
    }
}
