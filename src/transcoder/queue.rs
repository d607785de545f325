//! # Job Queue
//!
//! Dispatcher concorrente: distribuisce i job in attesa su un pool fisso di worker.
//!
//! ## Responsabilità:
//! - Arena di job con indici stabili + coda FIFO degli indici in attesa
//! - Al massimo `workers` job in esecuzione contemporaneamente
//! - Ogni job viene preso da un solo worker, una sola volta
//! - I worker attendono su `Notify` quando non c'è lavoro (nessun busy-poll)
//! - Progresso live: il `ProgressTracker` di ogni worker aggiorna il job nell'arena
//!
//! ## Arresto:
//! - `stop()`: i worker non prendono nuovi job; quelli in corso terminano normalmente
//! - `abort()`: come `stop()`, e in più cancella le esecuzioni in corso
//! - `shutdown()`: `stop()` + attesa della terminazione di tutti i worker
//!
//! Un secondo `start()` non ha effetto. I job aggiunti dopo `stop()` restano
//! `Pending` nello snapshot e non vengono mai eseguiti.

use crate::error::Result;
use crate::job::{Job, JobId, JobStatus, TranscodeConfig};
use crate::transcoder::{ProgressTracker, Transcoder};
use futures::future::join_all;
use parking_lot::{Mutex, RwLock};
use std::collections::VecDeque;
use std::sync::Arc;
use tokio::sync::Notify;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

#[derive(Default)]
struct QueueState {
    jobs: Vec<Job>,
    pending: VecDeque<usize>,
    running: usize,
}

/// A job taken off the pending queue by a worker
struct Claim {
    index: usize,
    id: JobId,
    config: TranscodeConfig,
}

struct Shared {
    transcoder: Arc<Transcoder>,
    state: RwLock<QueueState>,
    /// Signalled when a job is added
    work: Notify,
    /// Signalled when the queue may have become idle
    idle: Notify,
    /// Stops dispatching new jobs
    dispatch: CancellationToken,
    /// Cancels in-flight executions
    abort: CancellationToken,
}

impl Shared {
    fn try_claim(&self) -> Option<Claim> {
        let mut guard = self.state.write();
        if self.dispatch.is_cancelled() {
            return None;
        }
        let state = &mut *guard;

        while let Some(index) = state.pending.pop_front() {
            let job = &mut state.jobs[index];
            if job.start() {
                state.running += 1;
                return Some(Claim {
                    index,
                    id: job.id(),
                    config: job.config().clone(),
                });
            }
        }
        None
    }

    /// Wait until a pending job can be claimed
    async fn claim_next(&self) -> Claim {
        loop {
            let notified = self.work.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            if let Some(claim) = self.try_claim() {
                return claim;
            }
            notified.await;
        }
    }

    fn is_idle(&self) -> bool {
        let state = self.state.read();
        state.running == 0 && (state.pending.is_empty() || self.dispatch.is_cancelled())
    }

    async fn run_claimed(self: &Arc<Self>, worker_id: usize, claim: Claim) {
        info!("▶️  Worker {} running job {}", worker_id, claim.id);

        let shared = Arc::clone(self);
        let index = claim.index;
        let tracker = ProgressTracker::new(move |update| {
            if let Some(percent) = update.percent {
                shared.state.write().jobs[index].update_progress(percent);
            }
        });

        let result = self.transcoder.run(&claim.config, &self.abort, Some(&tracker)).await;

        let became_idle = {
            let mut state = self.state.write();
            self.transcoder.finish(&mut state.jobs[index], &result);
            state.running -= 1;
            state.running == 0 && (state.pending.is_empty() || self.dispatch.is_cancelled())
        };

        if became_idle {
            self.idle.notify_waiters();
        }
    }
}

async fn worker_loop(shared: Arc<Shared>, worker_id: usize) {
    debug!("Worker {} started", worker_id);

    loop {
        let claim = tokio::select! {
            biased;
            _ = shared.dispatch.cancelled() => break,
            claim = shared.claim_next() => claim,
        };
        shared.run_claimed(worker_id, claim).await;
    }

    debug!("Worker {} stopped", worker_id);
}

/// Fixed-size worker pool draining pending jobs in FIFO order
pub struct Queue {
    shared: Arc<Shared>,
    workers: usize,
    handles: Mutex<Vec<JoinHandle<()>>>,
}

impl Queue {
    pub fn new(transcoder: Arc<Transcoder>, workers: usize) -> Self {
        if workers == 0 {
            warn!("Queue created with 0 workers, using 1");
        }

        Self {
            shared: Arc::new(Shared {
                transcoder,
                state: RwLock::new(QueueState::default()),
                work: Notify::new(),
                idle: Notify::new(),
                dispatch: CancellationToken::new(),
                abort: CancellationToken::new(),
            }),
            workers: workers.max(1),
            handles: Mutex::new(Vec::new()),
        }
    }

    pub fn workers(&self) -> usize {
        self.workers
    }

    /// Track a job. Pending jobs are queued for dispatch.
    pub fn add_job(&self, job: Job) -> JobId {
        let id = job.id();
        let pending = job.status() == JobStatus::Pending;

        {
            let mut state = self.shared.state.write();
            state.jobs.push(job);
            if pending {
                let index = state.jobs.len() - 1;
                state.pending.push_back(index);
            }
        }

        if self.shared.dispatch.is_cancelled() {
            debug!("Job {} added to a stopped queue, it will not run", id);
        } else if pending {
            self.shared.work.notify_one();
        }
        id
    }

    /// Validate `config` and queue it
    pub fn submit(&self, config: TranscodeConfig) -> Result<JobId> {
        let job = self.shared.transcoder.create_job(config)?;
        Ok(self.add_job(job))
    }

    /// Launch the worker pool. Later calls do nothing.
    pub fn start(&self) {
        let mut handles = self.handles.lock();
        if !handles.is_empty() {
            warn!("Queue already started, ignoring start()");
            return;
        }
        if self.shared.dispatch.is_cancelled() {
            warn!("Queue was stopped and cannot be restarted");
            return;
        }

        info!("🚀 Starting queue with {} workers", self.workers);
        for worker_id in 0..self.workers {
            handles.push(tokio::spawn(worker_loop(Arc::clone(&self.shared), worker_id)));
        }
    }

    pub fn is_started(&self) -> bool {
        !self.handles.lock().is_empty()
    }

    /// Stop dispatching. In-flight jobs run to completion.
    pub fn stop(&self) {
        if !self.shared.dispatch.is_cancelled() {
            info!("⏹️  Stopping queue");
        }
        self.shared.dispatch.cancel();
        self.shared.idle.notify_waiters();
    }

    /// Stop dispatching and cancel in-flight executions
    pub fn abort(&self) {
        self.stop();
        self.shared.abort.cancel();
    }

    /// Point-in-time copy of every tracked job, in insertion order
    pub fn jobs(&self) -> Vec<Job> {
        self.shared.state.read().jobs.clone()
    }

    pub fn job(&self, id: JobId) -> Option<Job> {
        self.shared.state.read().jobs.iter().find(|j| j.id() == id).cloned()
    }

    /// Resolves once nothing is running and nothing more will be dispatched
    pub async fn wait_idle(&self) {
        loop {
            let notified = self.shared.idle.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            if self.shared.is_idle() {
                return;
            }
            notified.await;
        }
    }

    /// Stop and wait for all workers to exit
    pub async fn shutdown(&self) {
        self.stop();
        let handles = std::mem::take(&mut *self.handles.lock());
        for result in join_all(handles).await {
            if let Err(e) = result {
                warn!("Worker task failed: {}", e);
            }
        }
    }
}

impl Drop for Queue {
    fn drop(&mut self) {
        self.shared.dispatch.cancel();
    }
}
