//! Per-call context carrying cancellation and an optional deadline.

use std::future::Future;
use std::time::Duration;

use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::error::{Error, Result};

/// Cancellation scope for one reconcile.
///
/// Every remote call is awaited through [`Context::run`], so a cancelled
/// token or an elapsed deadline ends the operation with [`Error::Cancelled`].
#[derive(Debug, Clone, Default)]
pub struct Context {
    token: CancellationToken,
    deadline: Option<Instant>,
}

impl Context {
    pub fn new() -> Self {
        Self::default()
    }

    /// Context that is cancelled together with `token`.
    pub fn with_token(token: CancellationToken) -> Self {
        Self {
            token,
            deadline: None,
        }
    }

    /// Derive a child context that additionally expires after `timeout`.
    ///
    /// The earlier of the parent's and the new deadline wins.
    pub fn with_timeout(&self, timeout: Duration) -> Self {
        let deadline = Instant::now() + timeout;
        Self {
            token: self.token.child_token(),
            deadline: Some(match self.deadline {
                Some(d) if d < deadline => d,
                _ => deadline,
            }),
        }
    }

    pub fn cancel(&self) {
        self.token.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled() || self.deadline.is_some_and(|d| Instant::now() >= d)
    }

    /// Time left before the deadline, if one is set.
    pub fn remaining(&self) -> Option<Duration> {
        self.deadline.map(|d| d.saturating_duration_since(Instant::now()))
    }

    /// Await `fut` unless the context ends first.
    pub async fn run<F, T>(&self, fut: F) -> Result<T>
    where
        F: Future<Output = T>,
    {
        if self.is_cancelled() {
            return Err(Error::Cancelled(None));
        }

        match self.deadline {
            Some(deadline) => tokio::select! {
                _ = self.token.cancelled() => Err(Error::Cancelled(None)),
                res = tokio::time::timeout_at(deadline, fut) => {
                    res.map_err(|_| Error::Cancelled(None))
                }
            },
            None => tokio::select! {
                _ = self.token.cancelled() => Err(Error::Cancelled(None)),
                out = fut => Ok(out),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_run_completes() {
        let ctx = Context::new();
        let v = ctx.run(async { 42 }).await.unwrap();
        assert_eq!(v, 42);
    }

    #[tokio::test]
    async fn test_cancelled_before_start() {
        let ctx = Context::new();
        ctx.cancel();
        let res = ctx.run(async { 1 }).await;
        assert!(matches!(res, Err(Error::Cancelled(None))));
    }

    #[tokio::test(start_paused = true)]
    async fn test_deadline_elapses() {
        let ctx = Context::new().with_timeout(Duration::from_millis(10));
        let res = ctx.run(tokio::time::sleep(Duration::from_secs(5))).await;
        assert!(matches!(res, Err(Error::Cancelled(None))));
    }

    #[tokio::test]
    async fn test_cancel_while_pending() {
        let ctx = Context::new();
        let mut fut = tokio_test::task::spawn(ctx.run(std::future::pending::<()>()));
        tokio_test::assert_pending!(fut.poll());

        ctx.cancel();
        assert!(fut.is_woken());
        let res = tokio_test::assert_ready!(fut.poll());
        assert!(matches!(res, Err(Error::Cancelled(None))));
    }

    #[tokio::test]
    async fn test_child_cancelled_with_parent() {
        let parent = Context::new();
        let child = parent.with_timeout(Duration::from_secs(60));
        parent.cancel();
        assert!(child.is_cancelled());
    }
}
