//! Background worker for deferred attachment file removal.
//!
//! # Responsibility
//! - Remove files after a caller-supplied delay on one dedicated thread.
//! - Retry transient failures with linear backoff and count every outcome.
//!
//! # Invariants
//! - Due jobs run in `not_before` order.
//! - A job is attempted at most `max_attempts` times.
//! - Shutdown drains every pending job before the worker exits.
//! - The queue lives in memory only.

use crate::config::CoreConfig;
use crossbeam_channel::{unbounded, Receiver, RecvTimeoutError, Sender};
use log::{error, info, warn};
use std::cmp::Ordering;
use std::collections::BinaryHeap;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering as AtomicOrdering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

const WORKER_THREAD_NAME: &str = "attachment-deleter";

/// Retry policy for the deletion worker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeletionConfig {
    pub max_attempts: u32,
    /// Delay before retry `n` is `retry_backoff * n`.
    pub retry_backoff: Duration,
}

impl Default for DeletionConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            retry_backoff: Duration::from_millis(500),
        }
    }
}

impl From<&CoreConfig> for DeletionConfig {
    fn from(config: &CoreConfig) -> Self {
        Self {
            max_attempts: config.delete_max_attempts.max(1),
            retry_backoff: config.delete_retry_backoff(),
        }
    }
}

/// Point-in-time view of the worker counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DeletionSnapshot {
    pub scheduled: u64,
    pub removed: u64,
    /// File was already gone when its job ran.
    pub missing: u64,
    pub retried: u64,
    /// Jobs that exhausted their attempts.
    pub failed: u64,
}

#[derive(Debug, Default)]
struct Counters {
    scheduled: AtomicU64,
    removed: AtomicU64,
    missing: AtomicU64,
    retried: AtomicU64,
    failed: AtomicU64,
}

impl Counters {
    fn bump(counter: &AtomicU64) {
        counter.fetch_add(1, AtomicOrdering::Relaxed);
    }

    fn snapshot(&self) -> DeletionSnapshot {
        DeletionSnapshot {
            scheduled: self.scheduled.load(AtomicOrdering::Relaxed),
            removed: self.removed.load(AtomicOrdering::Relaxed),
            missing: self.missing.load(AtomicOrdering::Relaxed),
            retried: self.retried.load(AtomicOrdering::Relaxed),
            failed: self.failed.load(AtomicOrdering::Relaxed),
        }
    }
}

#[derive(Debug)]
struct DeletionJob {
    path: PathBuf,
    not_before: Instant,
    attempts: u32,
    seq: u64,
}

// Min-heap on (not_before, seq).
impl Ord for DeletionJob {
    fn cmp(&self, other: &Self) -> Ordering {
        other
            .not_before
            .cmp(&self.not_before)
            .then_with(|| other.seq.cmp(&self.seq))
    }
}

impl PartialOrd for DeletionJob {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for DeletionJob {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for DeletionJob {}

enum Command {
    Schedule { path: PathBuf, not_before: Instant },
    Shutdown,
}

/// Cloneable producer side of the deletion queue.
#[derive(Debug, Clone)]
pub struct DeletionHandle {
    sender: Sender<Command>,
    counters: Arc<Counters>,
}

impl DeletionHandle {
    /// Enqueues `path` for removal once `delay` has elapsed.
    ///
    /// Returns `false` when the worker has already stopped.
    pub fn schedule(&self, path: PathBuf, delay: Duration) -> bool {
        let not_before = Instant::now() + delay;
        let display = path.display().to_string();
        match self.sender.send(Command::Schedule { path, not_before }) {
            Ok(()) => {
                Counters::bump(&self.counters.scheduled);
                info!(
                    "event=attachment_delete_scheduled module=storage status=ok path={display} delay_ms={}",
                    delay.as_millis()
                );
                true
            }
            Err(_) => {
                warn!(
                    "event=attachment_delete_scheduled module=storage status=error path={display} error_code=worker_stopped"
                );
                false
            }
        }
    }

    pub fn stats(&self) -> DeletionSnapshot {
        self.counters.snapshot()
    }
}

/// Owner of the deletion worker thread.
///
/// Dropping the queue behaves like [`DeletionQueue::shutdown`].
pub struct DeletionQueue {
    handle: DeletionHandle,
    worker: Option<JoinHandle<()>>,
}

impl DeletionQueue {
    /// Spawns the worker thread.
    pub fn start(config: DeletionConfig) -> io::Result<Self> {
        let (sender, receiver) = unbounded();
        let counters = Arc::new(Counters::default());
        let worker_counters = Arc::clone(&counters);
        let worker = thread::Builder::new()
            .name(WORKER_THREAD_NAME.to_string())
            .spawn(move || Worker::new(config, receiver, worker_counters).run())?;

        info!(
            "event=deletion_worker module=storage status=start max_attempts={} retry_backoff_ms={}",
            config.max_attempts,
            config.retry_backoff.as_millis()
        );
        Ok(Self {
            handle: DeletionHandle { sender, counters },
            worker: Some(worker),
        })
    }

    pub fn handle(&self) -> DeletionHandle {
        self.handle.clone()
    }

    pub fn stats(&self) -> DeletionSnapshot {
        self.handle.stats()
    }

    /// Stops intake and blocks until every pending job has run.
    pub fn shutdown(mut self) -> DeletionSnapshot {
        self.stop();
        self.handle.stats()
    }

    fn stop(&mut self) {
        let Some(worker) = self.worker.take() else {
            return;
        };
        if self.handle.sender.send(Command::Shutdown).is_err() {
            warn!("event=deletion_worker module=storage status=error error_code=worker_gone");
        }
        if worker.join().is_err() {
            error!("event=deletion_worker module=storage status=error error_code=worker_panicked");
            return;
        }
        let stats = self.handle.stats();
        info!(
            "event=deletion_worker module=storage status=ok removed={} missing={} failed={}",
            stats.removed, stats.missing, stats.failed
        );
    }
}

impl Drop for DeletionQueue {
    fn drop(&mut self) {
        self.stop();
    }
}

struct Worker {
    config: DeletionConfig,
    receiver: Receiver<Command>,
    counters: Arc<Counters>,
    pending: BinaryHeap<DeletionJob>,
    next_seq: u64,
    draining: bool,
}

impl Worker {
    fn new(config: DeletionConfig, receiver: Receiver<Command>, counters: Arc<Counters>) -> Self {
        Self {
            config,
            receiver,
            counters,
            pending: BinaryHeap::new(),
            next_seq: 0,
            draining: false,
        }
    }

    fn run(mut self) {
        loop {
            if self.draining {
                self.absorb_backlog();
                match self.next_due() {
                    Some(due) => thread::sleep(due.saturating_duration_since(Instant::now())),
                    None => break,
                }
            } else {
                let next_due = self.next_due();
                let received = match next_due {
                    Some(due) => self
                        .receiver
                        .recv_timeout(due.saturating_duration_since(Instant::now())),
                    None => self
                        .receiver
                        .recv()
                        .map_err(|_| RecvTimeoutError::Disconnected),
                };
                match received {
                    Ok(command) => self.accept(command),
                    Err(RecvTimeoutError::Timeout) => {}
                    Err(RecvTimeoutError::Disconnected) => self.draining = true,
                }
            }
            self.run_due_jobs();
        }
    }

    fn next_due(&self) -> Option<Instant> {
        self.pending.peek().map(|job| job.not_before)
    }

    fn accept(&mut self, command: Command) {
        match command {
            Command::Schedule { path, not_before } => self.push(path, not_before, 0),
            Command::Shutdown => self.draining = true,
        }
    }

    fn absorb_backlog(&mut self) {
        while let Ok(command) = self.receiver.try_recv() {
            self.accept(command);
        }
    }

    fn push(&mut self, path: PathBuf, not_before: Instant, attempts: u32) {
        self.next_seq += 1;
        self.pending.push(DeletionJob {
            path,
            not_before,
            attempts,
            seq: self.next_seq,
        });
    }

    fn run_due_jobs(&mut self) {
        let now = Instant::now();
        while self
            .pending
            .peek()
            .is_some_and(|job| job.not_before <= now)
        {
            if let Some(job) = self.pending.pop() {
                self.attempt(job);
            }
        }
    }

    fn attempt(&mut self, job: DeletionJob) {
        let attempt = job.attempts + 1;
        match std::fs::remove_file(&job.path) {
            Ok(()) => {
                Counters::bump(&self.counters.removed);
                info!(
                    "event=attachment_delete module=storage status=ok path={} attempt={attempt}",
                    job.path.display()
                );
            }
            Err(err) if err.kind() == io::ErrorKind::NotFound => {
                Counters::bump(&self.counters.missing);
                warn!(
                    "event=attachment_delete module=storage status=missing path={}",
                    job.path.display()
                );
            }
            Err(err) if attempt < self.config.max_attempts => {
                Counters::bump(&self.counters.retried);
                let backoff = self.config.retry_backoff * attempt;
                warn!(
                    "event=attachment_delete module=storage status=retry path={} attempt={attempt} backoff_ms={} error={err}",
                    job.path.display(),
                    backoff.as_millis()
                );
                self.push(job.path, Instant::now() + backoff, attempt);
            }
            Err(err) => {
                Counters::bump(&self.counters.failed);
                log_permanent_failure(&job.path, attempt, &err);
            }
        }
    }
}

fn log_permanent_failure(path: &Path, attempts: u32, err: &io::Error) {
    error!(
        "event=attachment_delete module=storage status=error path={} attempts={attempts} error_code=retries_exhausted error={err}",
        path.display()
    );
}

#[cfg(test)]
mod tests {
    use super::{DeletionConfig, DeletionQueue};
    use crate::config::CoreConfig;
    use std::fs;
    use std::time::Duration;

    fn fast_config(max_attempts: u32) -> DeletionConfig {
        DeletionConfig {
            max_attempts,
            retry_backoff: Duration::from_millis(5),
        }
    }

    #[test]
    fn shutdown_drains_delayed_jobs() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("a.pdf");
        fs::write(&path, b"%PDF").unwrap();

        let queue = DeletionQueue::start(fast_config(3)).unwrap();
        assert!(queue.handle().schedule(path.clone(), Duration::from_millis(50)));
        assert!(path.exists());

        let stats = queue.shutdown();
        assert!(!path.exists());
        assert_eq!(stats.scheduled, 1);
        assert_eq!(stats.removed, 1);
        assert_eq!(stats.failed, 0);
    }

    #[test]
    fn missing_file_is_counted_not_retried() {
        let dir = tempfile::tempdir().unwrap();
        let queue = DeletionQueue::start(fast_config(3)).unwrap();
        queue
            .handle()
            .schedule(dir.path().join("never-written.pdf"), Duration::ZERO);

        let stats = queue.shutdown();
        assert_eq!(stats.missing, 1);
        assert_eq!(stats.retried, 0);
        assert_eq!(stats.removed, 0);
    }

    #[test]
    fn persistent_failure_is_retried_then_given_up() {
        let dir = tempfile::tempdir().unwrap();
        // Removing a directory with remove_file always fails.
        let stubborn = dir.path().join("stubborn.pdf");
        fs::create_dir(&stubborn).unwrap();

        let queue = DeletionQueue::start(fast_config(3)).unwrap();
        queue.handle().schedule(stubborn.clone(), Duration::ZERO);

        let stats = queue.shutdown();
        assert_eq!(stats.retried, 2);
        assert_eq!(stats.failed, 1);
        assert!(stubborn.exists());
    }

    #[test]
    fn schedule_after_shutdown_reports_stopped_worker() {
        let queue = DeletionQueue::start(DeletionConfig::default()).unwrap();
        let handle = queue.handle();
        queue.shutdown();
        assert!(!handle.schedule("gone.pdf".into(), Duration::ZERO));
        assert_eq!(handle.stats().scheduled, 0);
    }

    #[test]
    fn config_maps_retry_policy() {
        let core = CoreConfig {
            delete_max_attempts: 5,
            delete_retry_backoff_ms: 250,
            ..CoreConfig::default()
        };
        let config = DeletionConfig::from(&core);
        assert_eq!(config.max_attempts, 5);
        assert_eq!(config.retry_backoff, Duration::from_millis(250));
    }
}
