//! Concurrent screen snapshot fetch with a bounded wait.
//!
//! # Responsibility
//! - Run independent fetch jobs on worker threads and join them.
//! - Stop waiting after a fixed deadline so a screen can render best-effort.
//!
//! # Invariants
//! - Settled results are returned in job order.
//! - Every job is reported exactly once: settled or pending.
//! - Jobs still running at the deadline are detached, never joined.

use crate::repo::RepoError;
use crate::tree::{TreeError, TreeSnapshot};
use log::{info, warn};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::sync::mpsc;
use std::thread;
use std::time::{Duration, Instant};

type Job<T> = Box<dyn FnOnce() -> T + Send + 'static>;

/// One named fetch.
pub struct FetchJob<T> {
    name: &'static str,
    run: Job<T>,
}

impl<T> FetchJob<T> {
    pub fn new(name: &'static str, run: impl FnOnce() -> T + Send + 'static) -> Self {
        Self {
            name,
            run: Box::new(run),
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }
}

/// What arrived before the deadline.
#[derive(Debug)]
pub struct SnapshotOutcome<T> {
    pub settled: Vec<(&'static str, T)>,
    /// Jobs that had not answered when waiting stopped.
    pub pending: Vec<&'static str>,
    pub elapsed: Duration,
}

impl<T> SnapshotOutcome<T> {
    pub fn is_complete(&self) -> bool {
        self.pending.is_empty()
    }

    /// Removes and returns the result of job `name`, if it settled.
    pub fn take(&mut self, name: &str) -> Option<T> {
        let position = self.settled.iter().position(|(job, _)| *job == name)?;
        Some(self.settled.remove(position).1)
    }
}

/// Tree built from whatever arrived before the deadline.
#[derive(Debug, Clone)]
pub struct PartialTree {
    pub tree: TreeSnapshot,
    /// Fetches that were still running; their records are missing.
    pub pending: Vec<&'static str>,
}

impl PartialTree {
    pub fn is_complete(&self) -> bool {
        self.pending.is_empty()
    }
}

/// Failures while assembling a screen snapshot.
#[derive(Debug)]
pub enum SnapshotError {
    Repo(RepoError),
    Tree(TreeError),
}

impl Display for SnapshotError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Repo(err) => write!(f, "{err}"),
            Self::Tree(err) => write!(f, "{err}"),
        }
    }
}

impl Error for SnapshotError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Repo(err) => Some(err),
            Self::Tree(err) => Some(err),
        }
    }
}

impl From<RepoError> for SnapshotError {
    fn from(value: RepoError) -> Self {
        Self::Repo(value)
    }
}

impl From<TreeError> for SnapshotError {
    fn from(value: TreeError) -> Self {
        Self::Tree(value)
    }
}

/// Runs `jobs` concurrently and waits at most `wait` for them.
pub fn fetch_concurrently<T: Send + 'static>(
    jobs: Vec<FetchJob<T>>,
    wait: Duration,
) -> SnapshotOutcome<T> {
    let started = Instant::now();
    let deadline = started + wait;
    let names: Vec<&'static str> = jobs.iter().map(FetchJob::name).collect();
    let mut results: Vec<Option<T>> = names.iter().map(|_| None).collect();

    let (sender, receiver) = mpsc::channel::<(usize, T)>();
    let mut spawned = 0usize;
    for (index, job) in jobs.into_iter().enumerate() {
        let sender = sender.clone();
        let FetchJob { name, run } = job;
        let spawn_result = thread::Builder::new()
            .name(format!("fetch-{name}"))
            .spawn(move || {
                let _ = sender.send((index, run()));
            });
        match spawn_result {
            Ok(_) => spawned += 1,
            Err(err) => warn!(
                "event=snapshot_spawn module=service status=error job={name} error={err}"
            ),
        }
    }
    drop(sender);

    let mut received = 0usize;
    while received < spawned {
        let remaining = deadline.saturating_duration_since(Instant::now());
        if remaining.is_zero() {
            break;
        }
        match receiver.recv_timeout(remaining) {
            Ok((index, value)) => {
                results[index] = Some(value);
                received += 1;
            }
            Err(mpsc::RecvTimeoutError::Timeout) => break,
            // Remaining workers panicked before answering.
            Err(mpsc::RecvTimeoutError::Disconnected) => break,
        }
    }

    let mut settled = Vec::with_capacity(received);
    let mut pending = Vec::new();
    for (name, result) in names.into_iter().zip(results) {
        match result {
            Some(value) => settled.push((name, value)),
            None => pending.push(name),
        }
    }

    let elapsed = started.elapsed();
    if pending.is_empty() {
        info!(
            "event=snapshot_fetch module=service status=ok jobs={} elapsed_ms={}",
            settled.len(),
            elapsed.as_millis()
        );
    } else {
        warn!(
            "event=snapshot_fetch module=service status=partial settled={} pending={} elapsed_ms={}",
            settled.len(),
            pending.len(),
            elapsed.as_millis()
        );
    }
    SnapshotOutcome {
        settled,
        pending,
        elapsed,
    }
}

#[cfg(test)]
mod tests {
    use super::{fetch_concurrently, FetchJob};
    use std::time::Duration;

    #[test]
    fn settled_results_keep_job_order() {
        let jobs = vec![
            FetchJob::new("slow", || {
                std::thread::sleep(Duration::from_millis(30));
                1
            }),
            FetchJob::new("fast", || 2),
        ];
        let mut outcome = fetch_concurrently(jobs, Duration::from_secs(5));
        assert!(outcome.is_complete());
        assert_eq!(
            outcome.settled.iter().map(|(name, _)| *name).collect::<Vec<_>>(),
            vec!["slow", "fast"]
        );
        assert_eq!(outcome.take("fast"), Some(2));
        assert_eq!(outcome.take("fast"), None);
    }

    #[test]
    fn deadline_reports_unfinished_jobs_as_pending() {
        let jobs = vec![
            FetchJob::new("groups", || 1),
            FetchJob::new("yachts", || {
                std::thread::sleep(Duration::from_secs(2));
                2
            }),
        ];
        let outcome = fetch_concurrently(jobs, Duration::from_millis(200));
        assert_eq!(outcome.pending, vec!["yachts"]);
        assert_eq!(outcome.settled.len(), 1);
        assert!(outcome.elapsed < Duration::from_secs(2));
    }

    #[test]
    fn panicking_job_stays_pending_without_waiting_for_deadline() {
        let jobs: Vec<FetchJob<u8>> = vec![
            FetchJob::new("ok", || 1),
            FetchJob::new("boom", || -> u8 { panic!("fetch failed") }),
        ];
        let outcome = fetch_concurrently(jobs, Duration::from_secs(30));
        assert_eq!(outcome.pending, vec!["boom"]);
        assert!(outcome.elapsed < Duration::from_secs(30));
    }

    #[test]
    fn empty_job_list_is_complete() {
        let outcome = fetch_concurrently(Vec::<FetchJob<()>>::new(), Duration::from_millis(1));
        assert!(outcome.is_complete());
        assert!(outcome.settled.is_empty());
    }
}
