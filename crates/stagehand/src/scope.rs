//! Cancellation plus deadline bounding one unit of test execution.

use std::{
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    },
    time::Duration,
};

use tokio::{task::JoinHandle, time};
use tokio_util::sync::CancellationToken;

/// A cancellation signal optionally paired with a deadline.
///
/// The suite owns one root scope; every case gets a child. Cancelling a parent
/// cancels all live children; cancelling a child leaves the parent and its
/// siblings untouched. Dropping a scope disarms its deadline.
pub struct ExecutionScope {
    /// Signal observed by every suspension point inside the scope.
    token: CancellationToken,
    /// Deadline length, when armed.
    timeout: Option<Duration>,
    /// Set when the deadline (not an explicit cancel) fired.
    expired: Arc<AtomicBool>,
    /// Deadline task.
    timer: Option<JoinHandle<()>>,
}

impl Default for ExecutionScope {
    fn default() -> Self {
        Self::root()
    }
}

impl ExecutionScope {
    /// A root scope without a deadline.
    pub fn root() -> Self {
        Self {
            token: CancellationToken::new(),
            timeout: None,
            expired: Arc::new(AtomicBool::new(false)),
            timer: None,
        }
    }

    /// A child scope that cancels itself after `timeout`.
    ///
    /// Must be called inside a tokio runtime.
    pub fn child(&self, timeout: Duration) -> Self {
        let token = self.token.child_token();
        let expired = Arc::new(AtomicBool::new(false));
        let timer = {
            let token = token.clone();
            let expired = expired.clone();
            tokio::spawn(async move {
                tokio::select! {
                    _ = token.cancelled() => {}
                    _ = time::sleep(timeout) => {
                        expired.store(true, Ordering::SeqCst);
                        token.cancel();
                    }
                }
            })
        };
        Self {
            token,
            timeout: Some(timeout),
            expired,
            timer: Some(timer),
        }
    }

    /// The scope's cancellation token.
    pub fn token(&self) -> &CancellationToken {
        &self.token
    }

    /// Deadline length, `None` for root scopes.
    pub fn timeout(&self) -> Option<Duration> {
        self.timeout
    }

    /// Request cancellation.
    pub fn cancel(&self) {
        self.token.cancel();
    }

    /// Whether the scope was cancelled, by request, parent or deadline.
    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Whether the deadline fired.
    pub fn is_expired(&self) -> bool {
        self.expired.load(Ordering::SeqCst)
    }
}

impl Drop for ExecutionScope {
    fn drop(&mut self) {
        if let Some(timer) = self.timer.take() {
            timer.abort();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn parent_cancels_children_not_vice_versa() {
        let root = ExecutionScope::root();
        let a = root.child(Duration::from_secs(120));
        let b = root.child(Duration::from_secs(120));
        a.cancel();
        assert!(a.is_cancelled());
        assert!(!b.is_cancelled());
        assert!(!root.is_cancelled());
        root.cancel();
        assert!(b.is_cancelled());
        assert!(!b.is_expired());
    }

    #[tokio::test(start_paused = true)]
    async fn deadline_expires_child() {
        let root = ExecutionScope::root();
        let child = root.child(Duration::from_secs(2));
        child.token().cancelled().await;
        assert!(child.is_expired());
        assert!(!root.is_cancelled());
        assert_eq!(child.timeout(), Some(Duration::from_secs(2)));
    }
}
