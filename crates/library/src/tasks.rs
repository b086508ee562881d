// FILE: crates/library/src/tasks.rs

//! Background build queue
//!
//! Format builds are spawned on the runtime and limited by a semaphore. In
//! eager mode they run in-line instead, which keeps imports deterministic.

use crate::error::LibraryResult;
use log::{debug, info, warn};
use std::future::Future;
use std::sync::Arc;
use tokio::sync::{Mutex, Semaphore};
use tokio::task::JoinSet;

/// Outcome of the builds finished since the last report
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BuildReport {
    pub succeeded: usize,
    /// Job label and error message of each failed build
    pub failed: Vec<(String, String)>,
}

impl BuildReport {
    pub fn total(&self) -> usize {
        self.succeeded + self.failed.len()
    }

    fn record(&mut self, label: String, result: LibraryResult<()>) {
        match result {
            Ok(()) => {
                debug!("Build {} finished", label);
                self.succeeded += 1;
            }
            Err(e) => {
                warn!("Build {} failed: {}", label, e);
                self.failed.push((label, e.to_string()));
            }
        }
    }
}

pub struct BuildQueue {
    eager: bool,
    semaphore: Arc<Semaphore>,
    running: Mutex<JoinSet<(String, LibraryResult<()>)>>,
    // results of eager builds, reported by the next `wait_idle`
    finished: Mutex<BuildReport>,
}

impl BuildQueue {
    pub fn new(max_concurrent: usize, eager: bool) -> Self {
        Self {
            eager,
            semaphore: Arc::new(Semaphore::new(max_concurrent.max(1))),
            running: Mutex::new(JoinSet::new()),
            finished: Mutex::new(BuildReport::default()),
        }
    }

    pub fn is_eager(&self) -> bool {
        self.eager
    }

    /// Runs `job` now (eager) or in the background
    pub async fn submit<F>(&self, label: impl Into<String>, job: F)
    where
        F: Future<Output = LibraryResult<()>> + Send + 'static,
    {
        let label = label.into();
        if self.eager {
            debug!("Building {} in-line", label);
            let result = job.await;
            self.finished.lock().await.record(label, result);
            return;
        }

        debug!("Queued build {}", label);
        let semaphore = Arc::clone(&self.semaphore);
        self.running.lock().await.spawn(async move {
            let result = match semaphore.acquire_owned().await {
                Ok(_permit) => job.await,
                Err(e) => Err(crate::LibraryError::BuildFailed(e.to_string())),
            };
            (label, result)
        });
    }

    /// Number of background builds not yet collected
    pub async fn pending(&self) -> usize {
        self.running.lock().await.len()
    }

    /// Waits for every queued build and reports the outcomes
    pub async fn wait_idle(&self) -> BuildReport {
        let mut report = std::mem::take(&mut *self.finished.lock().await);
        // builds submitted while joining land in a fresh set and are picked up next round
        loop {
            let mut running = std::mem::take(&mut *self.running.lock().await);
            if running.is_empty() {
                break;
            }
            while let Some(joined) = running.join_next().await {
                match joined {
                    Ok((label, result)) => report.record(label, result),
                    Err(e) => {
                        warn!("Build task panicked or was cancelled: {}", e);
                        report.failed.push(("unknown".to_string(), e.to_string()));
                    }
                }
            }
        }
        if report.total() > 0 {
            info!(
                "Builds finished: {} succeeded, {} failed",
                report.succeeded,
                report.failed.len()
            );
        }
        report
    }
}

impl std::fmt::Debug for BuildQueue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BuildQueue")
            .field("eager", &self.eager)
            .field("available", &self.semaphore.available_permits())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::LibraryError;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[tokio::test]
    async fn test_eager_builds_run_in_line() {
        let queue = BuildQueue::new(2, true);
        let counter = Arc::new(AtomicUsize::new(0));

        let c = Arc::clone(&counter);
        queue
            .submit("pdf", async move {
                c.fetch_add(1, Ordering::SeqCst);
                Ok(())
            })
            .await;
        assert_eq!(counter.load(Ordering::SeqCst), 1);
        assert_eq!(queue.pending().await, 0);

        let report = queue.wait_idle().await;
        assert_eq!(report.succeeded, 1);
    }

    #[tokio::test]
    async fn test_background_builds_are_collected() {
        let queue = BuildQueue::new(1, false);
        let counter = Arc::new(AtomicUsize::new(0));

        for i in 0..3 {
            let c = Arc::clone(&counter);
            queue
                .submit(format!("job-{}", i), async move {
                    tokio::time::sleep(std::time::Duration::from_millis(5)).await;
                    c.fetch_add(1, Ordering::SeqCst);
                    Ok(())
                })
                .await;
        }
        queue
            .submit("broken", async { Err(LibraryError::BuildFailed("no converter".into())) })
            .await;

        let report = queue.wait_idle().await;
        assert_eq!(counter.load(Ordering::SeqCst), 3);
        assert_eq!(report.succeeded, 3);
        assert_eq!(report.failed.len(), 1);
        assert_eq!(report.failed[0].0, "broken");
        assert_eq!(queue.pending().await, 0);
    }

    #[tokio::test]
    async fn test_concurrency_is_bounded() {
        let queue = BuildQueue::new(2, false);
        let active = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));

        for i in 0..6 {
            let active = Arc::clone(&active);
            let peak = Arc::clone(&peak);
            queue
                .submit(format!("job-{}", i), async move {
                    let now = active.fetch_add(1, Ordering::SeqCst) + 1;
                    peak.fetch_max(now, Ordering::SeqCst);
                    tokio::time::sleep(std::time::Duration::from_millis(10)).await;
                    active.fetch_sub(1, Ordering::SeqCst);
                    Ok(())
                })
                .await;
        }

        queue.wait_idle().await;
        assert!(peak.load(Ordering::SeqCst) <= 2);
    }

    #[tokio::test]
    async fn test_submit_while_waiting_does_not_block() {
        let queue = Arc::new(BuildQueue::new(2, false));
        let (release, gate) = tokio::sync::oneshot::channel::<()>();
        queue
            .submit("slow", async move {
                gate.await
                    .map_err(|e| LibraryError::BuildFailed(e.to_string()))
            })
            .await;

        let waiter = tokio::spawn({
            let queue = Arc::clone(&queue);
            async move { queue.wait_idle().await }
        });
        tokio::time::sleep(std::time::Duration::from_millis(20)).await;

        let submitted = tokio::time::timeout(
            std::time::Duration::from_millis(200),
            queue.submit("late", async { Ok(()) }),
        )
        .await;
        assert!(submitted.is_ok());

        release.send(()).unwrap();
        let report = waiter.await.unwrap();
        assert_eq!(report.succeeded, 2);
        assert_eq!(queue.pending().await, 0);
    }
}
