//! Bounded-concurrency fan-out over a batch of items
//!
//! At most `limit` tasks are in flight at once; every item runs exactly
//! once and failures are captured per item so one bad candidate cannot
//! abort the rest of the batch.

use std::future::Future;
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;

/// Run `task` once per item with at most `limit` concurrent invocations
///
/// Results come back in input order. A panicking task is reported as an
/// error for its item only.
pub async fn run_bounded<T, R, F, Fut>(
    limit: usize,
    items: Vec<T>,
    task: F,
) -> Vec<anyhow::Result<R>>
where
    T: Send + 'static,
    R: Send + 'static,
    F: Fn(T) -> Fut,
    Fut: Future<Output = anyhow::Result<R>> + Send + 'static,
{
    let semaphore = Arc::new(Semaphore::new(limit.max(1)));
    let total = items.len();
    let mut join_set = JoinSet::new();

    for (index, item) in items.into_iter().enumerate() {
        let semaphore = Arc::clone(&semaphore);
        let fut = task(item);
        join_set.spawn(async move {
            let _permit = match semaphore.acquire_owned().await {
                Ok(permit) => permit,
                Err(_) => return (index, Err(anyhow::anyhow!("limiter closed"))),
            };
            (index, fut.await)
        });
    }

    let mut results: Vec<Option<anyhow::Result<R>>> = (0..total).map(|_| None).collect();
    while let Some(joined) = join_set.join_next().await {
        match joined {
            Ok((index, result)) => results[index] = Some(result),
            Err(join_error) => {
                tracing::error!(error = %join_error, "Fan-out task panicked");
            }
        }
    }

    results
        .into_iter()
        .map(|slot| slot.unwrap_or_else(|| Err(anyhow::anyhow!("task panicked"))))
        .collect()
}
