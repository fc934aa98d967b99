use std::future::Future;
use std::time::Duration;

use thiserror::Error;
use tokio::time::Instant;

tokio::task_local! {
    static WAIT_LOOP: ();
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum WaitError {
    #[error("condition not met within {0:?}")]
    Timeout(Duration),
}

/// True while running inside [`scope`] or [`poll_until`].
pub fn in_wait_scope() -> bool {
    WAIT_LOOP.try_with(|_| ()).is_ok()
}

/// Runs `future` as a wait loop: commands it issues are stashed instead of
/// reported, and only the last one is sent once a regular command follows.
pub async fn scope<F: Future>(future: F) -> F::Output {
    WAIT_LOOP.scope((), future).await
}

/// Polls `probe` every `interval` until it yields a value or `timeout` elapses.
pub async fn poll_until<F, Fut, T>(
    timeout: Duration,
    interval: Duration,
    mut probe: F,
) -> Result<T, WaitError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Option<T>>,
{
    let deadline = Instant::now() + timeout;
    scope(async move {
        loop {
            if let Some(value) = probe().await {
                return Ok(value);
            }
            if Instant::now() >= deadline {
                return Err(WaitError::Timeout(timeout));
            }
            tokio::time::sleep(interval).await;
        }
    })
    .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[tokio::test]
    async fn marker_is_scoped() {
        assert!(!in_wait_scope());
        assert!(scope(async { in_wait_scope() }).await);
        assert!(!in_wait_scope());
    }

    #[tokio::test(start_paused = true)]
    async fn polls_until_probe_succeeds() {
        let attempts = AtomicUsize::new(0);
        let value = poll_until(Duration::from_secs(5), Duration::from_millis(100), || {
            let attempt = attempts.fetch_add(1, Ordering::SeqCst) + 1;
            async move {
                assert!(in_wait_scope());
                (attempt == 3).then_some(attempt)
            }
        })
        .await
        .unwrap();
        assert_eq!(value, 3);
    }

    #[tokio::test(start_paused = true)]
    async fn times_out() {
        let result: Result<(), _> =
            poll_until(Duration::from_millis(300), Duration::from_millis(100), || async {
                None
            })
            .await;
        assert_eq!(result, Err(WaitError::Timeout(Duration::from_millis(300))));
    }
}
