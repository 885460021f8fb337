//! Cooperative cancellation for spawned tokio tasks.

use crate::error::Error;
use std::future::Future;
use tokio::task::spawn;
use tokio_util::sync::CancellationToken;


/// Race `fut` against `token`.
///
/// Cancellation is checked first on every poll, so a cancelled token wins at the next suspension
/// point of `fut`. Work that never suspends runs to completion regardless.
pub(crate) async fn cancellable<F, T>(token: &CancellationToken, fut: F) -> Result<T, Error>
where
    F: Future<Output = Result<T, Error>>,
{
    tokio::select! {
        biased;
        _ = token.cancelled() => Err(Error::Cancelled),
        result = fut => result,
    }
}


/// Wrapper around a tokio task that cancels it if dropped.
///
/// Cancellation goes through the task's [`CancellationToken`] rather than aborting it outright,
/// so the task still gets to run its own failure path with [`Error::Cancelled`].
#[derive(Debug)]
pub struct CancelOnDrop(CancellationToken);

impl CancelOnDrop {
    /// Spawn a tokio task and wrap with self.
    ///
    /// `f` receives the token the task is expected to honor.
    pub fn spawn<F, Fut>(f: F) -> Self
    where
        F: FnOnce(CancellationToken) -> Fut,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let token = CancellationToken::new();
        // detached: the task reports through whatever `f` wired it to
        drop(spawn(f(token.clone())));
        CancelOnDrop(token)
    }
}

impl Drop for CancelOnDrop {
    fn drop(&mut self) {
        self.0.cancel();
    }
}


#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use tokio::sync::oneshot;

    #[tokio::test]
    async fn cancelled_before_poll_never_runs() {
        let token = CancellationToken::new();
        token.cancel();
        let result = cancellable(&token, async { Ok(1) }).await;
        assert!(result.unwrap_err().is_cancelled());
    }

    #[tokio::test]
    async fn work_without_suspension_wins_if_not_cancelled() {
        let token = CancellationToken::new();
        assert_eq!(cancellable(&token, async { Ok(7) }).await.unwrap(), 7);
    }

    #[tokio::test]
    async fn held_guard_lets_work_finish() {
        let (send, recv) = oneshot::channel();
        let guard = CancelOnDrop::spawn(|token| async move {
            let result = cancellable(&token, async {
                tokio::time::sleep(Duration::from_millis(5)).await;
                Ok(3)
            }).await;
            let _ = send.send(result);
        });
        let result = tokio::time::timeout(Duration::from_secs(5), recv).await.unwrap().unwrap();
        assert_eq!(result.unwrap(), 3);
        drop(guard);
    }

    #[tokio::test]
    async fn drop_cancels_at_suspension_point() {
        let (send, recv) = oneshot::channel();
        let guard = CancelOnDrop::spawn(|token| async move {
            let result = cancellable(&token, async {
                tokio::time::sleep(Duration::from_secs(60)).await;
                Ok(())
            }).await;
            let _ = send.send(result);
        });
        tokio::task::yield_now().await;
        drop(guard);
        let result = tokio::time::timeout(Duration::from_secs(5), recv).await.unwrap().unwrap();
        assert!(result.unwrap_err().is_cancelled());
    }
}
