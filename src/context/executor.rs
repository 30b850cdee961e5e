//! Bounded worker pool for deferred units of work.

use crate::error::AppError;
use std::future::Future;
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio::task::JoinHandle;

/// Runs at most `limit` submitted futures at a time; the rest wait for a permit.
#[derive(Clone, Debug)]
pub struct TaskPool {
    permits: Arc<Semaphore>,
    limit: usize,
}

impl TaskPool {
    pub fn new(limit: usize) -> Self {
        let limit = limit.max(1);
        TaskPool {
            permits: Arc::new(Semaphore::new(limit)),
            limit,
        }
    }

    pub fn limit(&self) -> usize {
        self.limit
    }

    /// Free permits right now.
    pub fn available(&self) -> usize {
        self.permits.available_permits()
    }

    /// Spawn `work` once a permit is free. The caller awaits the handle to join.
    pub fn submit<F, T>(&self, work: F) -> JoinHandle<T>
    where
        F: Future<Output = T> + Send + 'static,
        T: Send + 'static,
    {
        let permits = self.permits.clone();
        tokio::spawn(async move {
            // the semaphore is never closed, so a failed acquire only drops the bound
            let _permit = permits.acquire_owned().await.ok();
            work.await
        })
    }
}

/// Await every handle, in order. The first failed body or panicked task fails the join,
/// after all handles have finished.
pub async fn join_all<T>(handles: Vec<JoinHandle<Result<T, AppError>>>) -> Result<Vec<T>, AppError> {
    let mut out = Vec::with_capacity(handles.len());
    let mut first_err = None;
    for joined in futures::future::join_all(handles).await {
        match joined {
            Ok(Ok(v)) => out.push(v),
            Ok(Err(e)) => {
                first_err.get_or_insert(e);
            }
            Err(e) => {
                first_err.get_or_insert(AppError::Task(e.to_string()));
            }
        }
    }
    match first_err {
        Some(e) => Err(e),
        None => Ok(out),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    #[tokio::test]
    async fn bounds_concurrency() {
        let pool = TaskPool::new(2);
        let running = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));
        let handles: Vec<_> = (0..6)
            .map(|i| {
                let running = running.clone();
                let peak = peak.clone();
                pool.submit(async move {
                    let now = running.fetch_add(1, Ordering::SeqCst) + 1;
                    peak.fetch_max(now, Ordering::SeqCst);
                    tokio::time::sleep(Duration::from_millis(20)).await;
                    running.fetch_sub(1, Ordering::SeqCst);
                    Ok::<_, AppError>(i)
                })
            })
            .collect();
        let results = join_all(handles).await.unwrap();
        assert_eq!(results, vec![0, 1, 2, 3, 4, 5]);
        assert!(peak.load(Ordering::SeqCst) <= 2);
        assert_eq!(pool.available(), 2);
    }

    #[tokio::test]
    async fn join_reports_failure() {
        let pool = TaskPool::new(3);
        let handles = vec![
            pool.submit(async { Ok(1) }),
            pool.submit(async { Err(AppError::Validation("bad row".into())) }),
        ];
        let err = join_all(handles).await.unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
    }
}
