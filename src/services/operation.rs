//! Abortable handle around a spawned call.

use std::future::Future;
use std::time::Duration;

use tokio::task::{AbortHandle, JoinHandle};
use tracing::debug;

use crate::error::ChitrakarError;

/// A call running on its own task. Await it with [`Operation::wait`] or stop
/// it with [`Operation::abort`].
#[derive(Debug)]
pub struct Operation<T> {
    handle: JoinHandle<T>,
}

impl<T: Send + 'static> Operation<T> {
    /// Spawns `future` onto the runtime.
    pub fn spawn<F>(future: F) -> Self
    where
        F: Future<Output = T> + Send + 'static,
    {
        Self {
            handle: tokio::spawn(future),
        }
    }

    /// Handle that can abort the call from elsewhere.
    pub fn abort_handle(&self) -> AbortHandle {
        self.handle.abort_handle()
    }

    /// Guard that aborts the call when dropped. Dropping it after the call
    /// finished does nothing.
    pub fn abort_on_drop(&self) -> AbortOnDrop {
        AbortOnDrop(self.handle.abort_handle())
    }

    /// Stops the call. A pending [`Operation::wait`] returns
    /// [`ChitrakarError::Aborted`].
    pub fn abort(&self) {
        self.handle.abort();
    }

    /// True once the call has finished, been aborted or panicked.
    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }

    /// Waits for the call to finish.
    pub async fn wait(self) -> Result<T, ChitrakarError> {
        self.handle.await.map_err(|err| {
            if err.is_cancelled() {
                ChitrakarError::Aborted
            } else {
                ChitrakarError::InternalServerError(format!("operation panicked: {err}"))
            }
        })
    }

    /// Waits for the call, aborting it once `limit` elapses. `None` waits
    /// forever.
    pub async fn wait_for(self, limit: Option<Duration>) -> Result<T, ChitrakarError> {
        let Some(limit) = limit else {
            return self.wait().await;
        };
        let abort = self.abort_handle();
        match tokio::time::timeout(limit, self.wait()).await {
            Ok(result) => result,
            Err(_) => {
                debug!("Aborting operation after {}ms", limit.as_millis());
                abort.abort();
                Err(ChitrakarError::TimedOut(limit))
            }
        }
    }
}

/// Aborts the call it was taken from when dropped.
#[derive(Debug)]
pub struct AbortOnDrop(AbortHandle);

impl Drop for AbortOnDrop {
    fn drop(&mut self) {
        self.0.abort();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn wait_returns_the_output() {
        let op = Operation::spawn(async { 42 });
        assert_eq!(op.wait().await.unwrap(), 42);
    }

    #[tokio::test]
    async fn aborted_operation_reports_aborted() {
        let op = Operation::spawn(std::future::pending::<()>());
        op.abort();
        assert!(matches!(op.wait().await, Err(ChitrakarError::Aborted)));
    }

    #[tokio::test]
    async fn abort_handle_stops_the_task() {
        let op = Operation::spawn(std::future::pending::<()>());
        let handle = op.abort_handle();
        handle.abort();
        assert!(matches!(op.wait().await, Err(ChitrakarError::Aborted)));
    }

    #[tokio::test]
    async fn time_limit_aborts_slow_calls() {
        let op = Operation::spawn(std::future::pending::<()>());
        let result = op.wait_for(Some(Duration::from_millis(20))).await;
        assert!(matches!(result, Err(ChitrakarError::TimedOut(_))));
    }

    #[tokio::test]
    async fn no_limit_waits_for_completion() {
        let op = Operation::spawn(async {
            tokio::time::sleep(Duration::from_millis(10)).await;
            "done"
        });
        assert_eq!(op.wait_for(None).await.unwrap(), "done");
    }

    #[tokio::test]
    async fn dropping_the_guard_aborts_the_call() {
        let op = Operation::spawn(std::future::pending::<()>());
        drop(op.abort_on_drop());
        assert!(matches!(op.wait().await, Err(ChitrakarError::Aborted)));
    }

    #[tokio::test]
    async fn guard_dropped_after_completion_keeps_the_output() {
        let op = Operation::spawn(async { 7 });
        let guard = op.abort_on_drop();
        assert_eq!(op.wait().await.unwrap(), 7);
        drop(guard);
    }

    #[tokio::test]
    async fn finished_flag_flips_after_completion() {
        let op = Operation::spawn(async {});
        let handle = op.abort_handle();
        op.wait().await.unwrap();
        assert!(handle.is_finished());
    }
}
