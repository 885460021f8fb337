//! Delayed execution.

use std::{future::Future, time::Duration};


/// Wait for `delay` on the tokio clock, then run `task`
///
/// `task`'s result, including its failure, is returned unchanged.
pub async fn schedule<F, Fut, T>(delay: Duration, task: F) -> anyhow::Result<T>
where
    F: FnOnce() -> Fut,
    Fut: Future<Output = anyhow::Result<T>>,
{
    trace!(?delay, "scheduled task sleeping");
    tokio::time::sleep(delay).await;
    task().await
}


#[cfg(test)]
mod tests {
    use super::*;
    use crate::Future as LaterFuture;
    use tokio::time::Instant;

    #[tokio::test]
    async fn runs_after_delay() {
        let start = Instant::now();
        let value = schedule(Duration::from_millis(20), || async { anyhow::Ok(5) }).await.unwrap();
        assert_eq!(value, 5);
        assert!(start.elapsed() >= Duration::from_millis(20));
    }

    #[tokio::test]
    async fn propagates_failure() {
        let result = schedule(Duration::ZERO, || async { anyhow::Result::<()>::Err(anyhow::anyhow!("late")) }).await;
        assert_eq!(result.unwrap_err().to_string(), "late");
    }

    #[tokio::test]
    async fn cancellable_inside_future() {
        let future = LaterFuture::new(|| schedule(Duration::from_secs(60), || async { anyhow::Ok(()) }));
        future.cancel();
        assert!(future.value().await.unwrap_err().is_cancelled());
    }
}
