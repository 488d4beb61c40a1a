/*!
 * Priority job queue for composition requests.
 *
 * A fixed pool of tokio workers pulls jobs by priority (FIFO within a
 * level). Each attempt runs under a time budget and a cancellation token.
 * Failures of retryable kinds are requeued with exponential backoff until
 * `max_retries` is exhausted.
 */

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use log::{debug, error, info, warn};
use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tokio::sync::{Notify, watch};
use tokio::task::JoinHandle;
use uuid::Uuid;

use crate::app_config::QueueConfig;
use crate::cancellation::CancellationToken;
use crate::errors::{CaptionError, ErrorKind, QueueError};
use crate::request::ComposeRequest;

/// Base delay before a failed job is retried
const RETRY_BACKOFF_BASE: Duration = Duration::from_millis(500);

/// How often idle workers re-check the shutdown flag
const IDLE_POLL: Duration = Duration::from_millis(250);

/// Work executed for every job
#[async_trait]
pub trait JobHandler: Send + Sync + 'static {
    type Output: Clone + Send + Sync + 'static;

    async fn handle(&self, request: ComposeRequest, token: CancellationToken) -> Result<Self::Output, CaptionError>;
}

/// Scheduling priority, FIFO within a level
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum JobPriority {
    High,
    #[default]
    Normal,
    Low,
}

impl JobPriority {
    fn index(self) -> usize {
        match self {
            Self::High => 0,
            Self::Normal => 1,
            Self::Low => 2,
        }
    }
}

/// Lifecycle of a job
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    Pending,
    Processing,
    Completed,
    Failed,
    /// Waiting for a retry after a retryable failure
    Retry,
    Cancelled,
}

impl JobStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Failed | Self::Cancelled)
    }
}

/// Snapshot of a job
#[derive(Debug, Clone)]
pub struct JobInfo<O> {
    pub id: Uuid,
    pub label: String,
    pub priority: JobPriority,
    pub status: JobStatus,
    pub attempts: u32,
    pub submitted_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub finished_at: Option<DateTime<Utc>>,
    pub error: Option<String>,
    pub error_kind: Option<ErrorKind>,
    pub output: Option<O>,
}

/// Counts of jobs per status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct QueueStats {
    pub pending: usize,
    pub processing: usize,
    pub retrying: usize,
    pub completed: usize,
    pub failed: usize,
    pub cancelled: usize,
    /// Attempts beyond the first, over all jobs
    pub retries: u32,
    pub workers: usize,
}

struct JobEntry<O> {
    info: JobInfo<O>,
    request: ComposeRequest,
    token: CancellationToken,
}

struct Shared<H: JobHandler> {
    handler: Arc<H>,
    config: QueueConfig,
    queues: Mutex<[VecDeque<Uuid>; 3]>,
    jobs: RwLock<HashMap<Uuid, JobEntry<H::Output>>>,
    wakeup: Notify,
    finished: watch::Sender<u64>,
    shutdown: AtomicBool,
}

/// Bounded priority queue served by a worker pool
pub struct JobQueue<H: JobHandler> {
    shared: Arc<Shared<H>>,
    workers: Mutex<Vec<JoinHandle<()>>>,
}

impl<H: JobHandler> JobQueue<H> {
    /// Start `config.workers` workers on the current tokio runtime
    pub fn start(handler: H, config: QueueConfig) -> Self {
        let (finished, _) = watch::channel(0u64);
        let shared = Arc::new(Shared {
            handler: Arc::new(handler),
            config,
            queues: Mutex::new([VecDeque::new(), VecDeque::new(), VecDeque::new()]),
            jobs: RwLock::new(HashMap::new()),
            wakeup: Notify::new(),
            finished,
            shutdown: AtomicBool::new(false),
        });

        let workers = (0..shared.config.workers.max(1))
            .map(|n| {
                let shared = Arc::clone(&shared);
                tokio::spawn(async move { worker_loop(n, shared).await })
            })
            .collect();
        info!("Job queue started with {} workers", shared.config.workers.max(1));

        Self {
            shared,
            workers: Mutex::new(workers),
        }
    }

    /// Validate and enqueue a request
    pub fn submit(&self, request: ComposeRequest, priority: JobPriority) -> Result<Uuid, QueueError> {
        if self.shared.shutdown.load(Ordering::SeqCst) {
            return Err(QueueError::ShutDown);
        }
        request.validate()?;

        let mut queues = self.shared.queues.lock();
        let pending: usize = queues.iter().map(VecDeque::len).sum();
        if pending >= self.shared.config.max_queue_size {
            warn!("Rejecting job, queue is full ({} pending)", pending);
            return Err(QueueError::Full(pending));
        }

        let id = Uuid::new_v4();
        let label = request.label().to_string();
        self.shared.jobs.write().insert(
            id,
            JobEntry {
                info: JobInfo {
                    id,
                    label: label.clone(),
                    priority,
                    status: JobStatus::Pending,
                    attempts: 0,
                    submitted_at: Utc::now(),
                    started_at: None,
                    finished_at: None,
                    error: None,
                    error_kind: None,
                    output: None,
                },
                request,
                token: CancellationToken::new(),
            },
        );
        queues[priority.index()].push_back(id);
        drop(queues);

        self.shared.wakeup.notify_one();
        debug!("Queued job {} ({}) with {:?} priority", id, label, priority);
        Ok(id)
    }

    pub fn status(&self, id: Uuid) -> Option<JobInfo<H::Output>> {
        self.shared.jobs.read().get(&id).map(|e| e.info.clone())
    }

    /// Wait until the job reaches a terminal status
    pub async fn wait(&self, id: Uuid) -> Result<JobInfo<H::Output>, QueueError> {
        let mut finished = self.shared.finished.subscribe();
        loop {
            let info = self.status(id).ok_or_else(|| QueueError::UnknownJob(id.to_string()))?;
            if info.status.is_terminal() {
                return Ok(info);
            }
            if finished.changed().await.is_err() {
                return self.status(id).ok_or_else(|| QueueError::UnknownJob(id.to_string()));
            }
        }
    }

    /// Cancel a job; pending jobs never start, running jobs are told to stop
    pub fn cancel(&self, id: Uuid) -> Result<JobStatus, QueueError> {
        let mut jobs = self.shared.jobs.write();
        let entry = jobs.get_mut(&id).ok_or_else(|| QueueError::UnknownJob(id.to_string()))?;

        match entry.info.status {
            JobStatus::Pending | JobStatus::Retry => {
                for queue in self.shared.queues.lock().iter_mut() {
                    queue.retain(|queued| *queued != id);
                }
                entry.token.cancel();
                entry.info.status = JobStatus::Cancelled;
                entry.info.finished_at = Some(Utc::now());
                drop(jobs);
                self.shared.notify_finished();
                info!("Cancelled pending job {}", id);
                Ok(JobStatus::Cancelled)
            }
            JobStatus::Processing => {
                entry.token.cancel();
                info!("Cancellation requested for running job {}", id);
                Ok(JobStatus::Processing)
            }
            status => Ok(status),
        }
    }

    pub fn stats(&self) -> QueueStats {
        let jobs = self.shared.jobs.read();
        let mut stats = QueueStats {
            workers: self.shared.config.workers.max(1),
            ..Default::default()
        };
        for entry in jobs.values() {
            stats.retries += entry.info.attempts.saturating_sub(1);
            match entry.info.status {
                JobStatus::Pending => stats.pending += 1,
                JobStatus::Processing => stats.processing += 1,
                JobStatus::Retry => stats.retrying += 1,
                JobStatus::Completed => stats.completed += 1,
                JobStatus::Failed => stats.failed += 1,
                JobStatus::Cancelled => stats.cancelled += 1,
            }
        }
        stats
    }

    /// Forget finished jobs, returning how many were removed
    pub fn clear_finished(&self) -> usize {
        let mut jobs = self.shared.jobs.write();
        let before = jobs.len();
        jobs.retain(|_, e| !e.info.status.is_terminal());
        before - jobs.len()
    }

    /// Stop accepting jobs, cancel queued ones and wait for running ones
    pub async fn shutdown(&self) {
        if self.shared.shutdown.swap(true, Ordering::SeqCst) {
            return;
        }
        info!("Shutting down job queue");

        let queued: Vec<Uuid> = {
            let mut queues = self.shared.queues.lock();
            queues.iter_mut().flat_map(|q| q.drain(..)).collect()
        };
        {
            let mut jobs = self.shared.jobs.write();
            for entry in jobs.values_mut() {
                if matches!(entry.info.status, JobStatus::Pending | JobStatus::Retry) {
                    entry.token.cancel();
                    entry.info.status = JobStatus::Cancelled;
                    entry.info.finished_at = Some(Utc::now());
                }
            }
        }
        if !queued.is_empty() {
            warn!("Cancelled {} queued jobs at shutdown", queued.len());
        }
        self.shared.notify_finished();
        self.shared.wakeup.notify_waiters();

        let workers: Vec<JoinHandle<()>> = self.workers.lock().drain(..).collect();
        for worker in workers {
            if let Err(e) = worker.await {
                error!("Worker terminated abnormally: {}", e);
            }
        }
        info!("Job queue stopped");
    }
}

impl<H: JobHandler> Shared<H> {
    fn notify_finished(&self) {
        self.finished.send_modify(|generation| *generation += 1);
    }

    fn pop_next(&self) -> Option<Uuid> {
        self.queues.lock().iter_mut().find_map(VecDeque::pop_front)
    }

    /// Mark a job as started and hand out what the attempt needs
    fn begin(&self, id: Uuid) -> Option<(ComposeRequest, CancellationToken, u32)> {
        let mut jobs = self.jobs.write();
        let entry = jobs.get_mut(&id)?;
        if entry.info.status.is_terminal() {
            return None;
        }
        entry.info.status = JobStatus::Processing;
        entry.info.attempts += 1;
        entry.info.started_at.get_or_insert_with(Utc::now);
        Some((entry.request.clone(), entry.token.clone(), entry.info.attempts))
    }

    fn finish(&self, id: Uuid, status: JobStatus, output: Option<H::Output>, error: Option<&CaptionError>) {
        if let Some(entry) = self.jobs.write().get_mut(&id) {
            entry.info.status = status;
            entry.info.output = output;
            entry.info.error = error.map(ToString::to_string);
            entry.info.error_kind = error.map(CaptionError::kind);
            if status.is_terminal() {
                entry.info.finished_at = Some(Utc::now());
            }
        }
        self.notify_finished();
    }
}

async fn worker_loop<H: JobHandler>(worker: usize, shared: Arc<Shared<H>>) {
    debug!("Worker {} started", worker);
    loop {
        match shared.pop_next() {
            Some(id) => run_job(&shared, id).await,
            None => {
                if shared.shutdown.load(Ordering::SeqCst) {
                    break;
                }
                let _ = tokio::time::timeout(IDLE_POLL, shared.wakeup.notified()).await;
            }
        }
    }
    debug!("Worker {} stopped", worker);
}

async fn run_job<H: JobHandler>(shared: &Arc<Shared<H>>, id: Uuid) {
    let Some((request, token, attempt)) = shared.begin(id) else {
        return;
    };
    let budget = Duration::from_secs(shared.config.job_timeout_secs.max(1));
    debug!("Running job {} (attempt {})", id, attempt);

    let attempt_token = token.child_with_timeout(budget);
    let result = match tokio::time::timeout(budget, shared.handler.handle(request, attempt_token)).await {
        Ok(result) => result,
        Err(_) => Err(CaptionError::Cancelled(format!("job timed out after {:?}", budget))),
    };

    let error = match result {
        Ok(output) => {
            info!("Job {} completed", id);
            shared.finish(id, JobStatus::Completed, Some(output), None);
            return;
        }
        Err(e) => e,
    };

    if token.is_cancelled() {
        info!("Job {} cancelled", id);
        shared.finish(id, JobStatus::Cancelled, None, Some(&error));
        return;
    }

    // a deadline expiry surfaces as Cancelled while the job token itself is live
    let retryable = error.kind().is_retryable() || error.kind() == ErrorKind::Cancelled;
    if retryable && attempt <= shared.config.max_retries && !shared.shutdown.load(Ordering::SeqCst) {
        let delay = RETRY_BACKOFF_BASE * 2u32.saturating_pow(attempt - 1);
        warn!("Job {} failed ({}), retrying in {:?}", id, error, delay);
        shared.finish(id, JobStatus::Retry, None, Some(&error));

        let shared = Arc::clone(shared);
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            let still_waiting = shared
                .jobs
                .read()
                .get(&id)
                .is_some_and(|e| e.info.status == JobStatus::Retry);
            if still_waiting && !shared.shutdown.load(Ordering::SeqCst) {
                let priority = shared.jobs.read().get(&id).map(|e| e.info.priority).unwrap_or_default();
                shared.queues.lock()[priority.index()].push_back(id);
                shared.wakeup.notify_one();
            }
        });
        return;
    }

    error!("Job {} failed: {}", id, error);
    shared.finish(id, JobStatus::Failed, None, Some(&error));
}
