//! Background retention sweeps.
//!
//! Pruning runs after the primary write has committed, on a detached worker.
//! Failures are logged and reported on a separate channel; they never reach
//! the result of the edit that queued them.

use keyloom_history::{BackupStore, HistoryError, RetentionPolicy};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};
use tokio::task::{JoinHandle, JoinSet};
use tracing::{debug, warn};

const FAILURE_BUFFER: usize = 64;

/// One queued sweep of a backup directory.
#[derive(Debug, Clone)]
pub struct PruneRequest {
    pub dir: PathBuf,
    pub policy: RetentionPolicy,
    /// Wait this long before sweeping.
    pub delay: Duration,
}

/// A sweep that failed.
#[derive(Debug)]
pub struct PruneFailure {
    pub dir: PathBuf,
    pub error: HistoryError,
}

enum Job {
    Prune(PruneRequest),
    Flush(oneshot::Sender<()>),
}

/// Handle to the retention worker.
pub struct PruneQueue {
    sender: mpsc::UnboundedSender<Job>,
    handle: JoinHandle<()>,
}

impl PruneQueue {
    /// Spawn the worker. Must be called from within a tokio runtime.
    ///
    /// The receiver gets failed sweeps; if nobody drains it, reports beyond a
    /// small buffer are dropped.
    pub fn start(store: Arc<BackupStore>) -> (Self, mpsc::Receiver<PruneFailure>) {
        let (sender, receiver) = mpsc::unbounded_channel();
        let (failures_tx, failures_rx) = mpsc::channel(FAILURE_BUFFER);
        let handle = tokio::spawn(run(store, receiver, failures_tx));
        (Self { sender, handle }, failures_rx)
    }

    /// Queue a sweep. Returns false if the worker has stopped.
    pub fn enqueue(&self, request: PruneRequest) -> bool {
        self.sender.send(Job::Prune(request)).is_ok()
    }

    /// Wait until every sweep queued so far has finished.
    pub async fn flush(&self) {
        let (done_tx, done_rx) = oneshot::channel();
        if self.sender.send(Job::Flush(done_tx)).is_ok() {
            let _ = done_rx.await;
        }
    }

    /// Stop the worker without waiting for pending sweeps.
    pub fn abort(&self) {
        self.handle.abort();
    }
}

async fn run(
    store: Arc<BackupStore>,
    mut jobs: mpsc::UnboundedReceiver<Job>,
    failures: mpsc::Sender<PruneFailure>,
) {
    let mut tasks = JoinSet::new();
    loop {
        tokio::select! {
            job = jobs.recv() => match job {
                Some(Job::Prune(request)) => {
                    tasks.spawn(sweep(Arc::clone(&store), request, failures.clone()));
                }
                Some(Job::Flush(done)) => {
                    while tasks.join_next().await.is_some() {}
                    let _ = done.send(());
                }
                None => break,
            },
            Some(_) = tasks.join_next(), if !tasks.is_empty() => {}
        }
    }
    while tasks.join_next().await.is_some() {}
    debug!("Prune queue stopped");
}

async fn sweep(store: Arc<BackupStore>, request: PruneRequest, failures: mpsc::Sender<PruneFailure>) {
    if !request.delay.is_zero() {
        tokio::time::sleep(request.delay).await;
    }
    if let Err(error) = store.prune(&request.dir, &request.policy).await {
        warn!(dir = %request.dir.display(), error = %error, "Backup prune failed");
        let _ = failures.try_send(PruneFailure {
            dir: request.dir,
            error,
        });
    }
}
