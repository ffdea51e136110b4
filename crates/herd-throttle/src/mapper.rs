//! Worker pool over a shared index cursor.

use crate::options::ThrottleOptions;
use futures::future::try_join_all;
use herd_core::{CancelToken, Error, Result};
use rand::Rng;
use std::future::Future;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::debug;

/// Map `items` through `worker` with bounded concurrency and jittered pacing.
///
/// Results keep input order and length. A fixed pool of
/// `options.concurrency` workers pulls the next index from a shared cursor,
/// sleeping a uniformly random `[min_delay, max_delay]` before each item.
///
/// The call is all-or-nothing: if `cancel` fires, workers stop pulling new
/// items and the call fails with [`Error::Cancelled`]; if `worker` fails on
/// any item, that error is returned. Partial results are discarded either
/// way.
pub async fn throttle_map<I, T, F, Fut>(
    items: Vec<I>,
    worker: F,
    options: ThrottleOptions,
    cancel: &CancelToken,
) -> Result<Vec<T>>
where
    F: Fn(I, usize) -> Fut,
    Fut: Future<Output = Result<T>>,
{
    cancel.check()?;

    let total = items.len();
    if total == 0 {
        return Ok(Vec::new());
    }

    let workers = options.effective_concurrency().min(total);
    debug!(total, workers, "Starting throttled batch");

    let pool = Pool {
        pending: Mutex::new(items.into_iter().map(Some).collect()),
        results: Mutex::new((0..total).map(|_| None).collect()),
        cursor: AtomicUsize::new(0),
        worker: &worker,
        options,
        cancel,
    };

    try_join_all((0..workers).map(|_| pool.work())).await?;

    pool.results
        .into_inner()
        .into_iter()
        .enumerate()
        .map(|(index, slot)| {
            slot.ok_or_else(|| Error::Internal(format!("batch item {} produced no result", index)))
        })
        .collect()
}

struct Pool<'a, I, T, F> {
    pending: Mutex<Vec<Option<I>>>,
    results: Mutex<Vec<Option<T>>>,
    cursor: AtomicUsize,
    worker: &'a F,
    options: ThrottleOptions,
    cancel: &'a CancelToken,
}

impl<I, T, F, Fut> Pool<'_, I, T, F>
where
    F: Fn(I, usize) -> Fut,
    Fut: Future<Output = Result<T>>,
{
    async fn work(&self) -> Result<()> {
        let total = self.results.lock().await.len();
        loop {
            if self.cancel.is_cancelled() {
                debug!("Batch cancelled, worker stopping");
                return Err(Error::Cancelled);
            }

            let index = self.cursor.fetch_add(1, Ordering::SeqCst);
            if index >= total {
                return Ok(());
            }

            let delay = pacing_delay(&self.options);
            if !delay.is_zero() {
                self.cancel.sleep(delay).await?;
            }
            self.cancel.check()?;

            let item = self.pending.lock().await[index]
                .take()
                .ok_or_else(|| Error::Internal(format!("batch item {} taken twice", index)))?;

            let out = self.cancel.run((self.worker)(item, index)).await?;
            self.results.lock().await[index] = Some(out);
        }
    }
}

fn pacing_delay(options: &ThrottleOptions) -> Duration {
    let (min, max) = options.delay_bounds();
    if max == 0 {
        return Duration::ZERO;
    }
    Duration::from_millis(rand::thread_rng().gen_range(min..=max))
}

#[cfg(test)]
mod tests {
    use super::*;
    use herd_core::CancelSource;
    use std::sync::Arc;
    use std::time::Instant;

    #[tokio::test]
    async fn test_preserves_order_regardless_of_completion() {
        let calls = Arc::new(AtomicUsize::new(0));
        let items: Vec<u64> = (1..=10).collect();

        let counter = calls.clone();
        let results = throttle_map(
            items,
            move |item, _index| {
                let counter = counter.clone();
                async move {
                    counter.fetch_add(1, Ordering::SeqCst);
                    // Early items finish last.
                    tokio::time::sleep(Duration::from_millis(5 * (11 - item))).await;
                    Ok(item * 10)
                }
            },
            ThrottleOptions::unpaced(3),
            &CancelToken::never(),
        )
        .await
        .unwrap();

        assert_eq!(results, (1..=10).map(|i| i * 10).collect::<Vec<_>>());
        assert_eq!(calls.load(Ordering::SeqCst), 10);
    }

    #[tokio::test]
    async fn test_concurrency_is_bounded() {
        let active = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));

        let (a, p) = (active.clone(), peak.clone());
        throttle_map(
            (0..12).collect::<Vec<_>>(),
            move |item, _| {
                let (active, peak) = (a.clone(), p.clone());
                async move {
                    let now = active.fetch_add(1, Ordering::SeqCst) + 1;
                    peak.fetch_max(now, Ordering::SeqCst);
                    tokio::time::sleep(Duration::from_millis(10)).await;
                    active.fetch_sub(1, Ordering::SeqCst);
                    Ok(item)
                }
            },
            ThrottleOptions::unpaced(3),
            &CancelToken::never(),
        )
        .await
        .unwrap();

        assert!(peak.load(Ordering::SeqCst) <= 3);
        assert!(peak.load(Ordering::SeqCst) >= 2);
    }

    #[tokio::test]
    async fn test_pacing_delays_each_item() {
        let options = ThrottleOptions::new(1).with_delay(Duration::from_millis(20), Duration::from_millis(30));
        let started = Instant::now();
        let results = throttle_map(
            vec![1, 2, 3],
            |item, _| async move { Ok(item) },
            options,
            &CancelToken::never(),
        )
        .await
        .unwrap();

        assert_eq!(results, vec![1, 2, 3]);
        assert!(started.elapsed() >= Duration::from_millis(60));
    }

    #[tokio::test]
    async fn test_empty_input() {
        let results: Vec<u8> = throttle_map(
            Vec::<u8>::new(),
            |item, _| async move { Ok(item) },
            ThrottleOptions::default(),
            &CancelToken::never(),
        )
        .await
        .unwrap();
        assert!(results.is_empty());
    }

    #[tokio::test]
    async fn test_worker_error_fails_batch() {
        let result = throttle_map(
            vec![1, 2, 3, 4],
            |item, _| async move {
                if item == 3 {
                    Err(Error::upstream("boom", "UPSTREAM", 502))
                } else {
                    Ok(item)
                }
            },
            ThrottleOptions::unpaced(2),
            &CancelToken::never(),
        )
        .await;
        assert!(matches!(result, Err(Error::Upstream(_))));
    }

    #[tokio::test]
    async fn test_abort_stops_further_invocations() {
        let source = CancelSource::new();
        let token = source.token();
        let calls = Arc::new(AtomicUsize::new(0));

        let counter = calls.clone();
        let batch = tokio::spawn(async move {
            throttle_map(
                (0..100).collect::<Vec<u32>>(),
                move |item, _| {
                    let counter = counter.clone();
                    async move {
                        counter.fetch_add(1, Ordering::SeqCst);
                        Ok(item)
                    }
                },
                ThrottleOptions::new(2).with_delay(Duration::from_millis(10), Duration::from_millis(15)),
                &token,
            )
            .await
        });

        tokio::time::sleep(Duration::from_millis(60)).await;
        source.cancel();
        let result = tokio::time::timeout(Duration::from_secs(2), batch)
            .await
            .expect("batch aborts promptly")
            .unwrap();
        assert!(matches!(result, Err(Error::Cancelled)));

        let seen = calls.load(Ordering::SeqCst);
        assert!(seen < 100);
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(calls.load(Ordering::SeqCst), seen);
    }

    #[tokio::test]
    async fn test_already_cancelled() {
        let source = CancelSource::new();
        source.cancel();
        let calls = AtomicUsize::new(0);
        let result = throttle_map(
            vec![1, 2, 3],
            |item, _| {
                calls.fetch_add(1, Ordering::SeqCst);
                async move { Ok(item) }
            },
            ThrottleOptions::unpaced(2),
            &source.token(),
        )
        .await;
        assert!(matches!(result, Err(Error::Cancelled)));
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }
}
