//! # Cancellation Token
//!
//! Cooperative cancellation for start workers. Cancelling the token is a
//! latch: every clone observes it, including clones that start waiting after
//! the fact. Middle and terminal workers never see the token; they observe
//! cancellation indirectly when their input channel drains and closes.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::Notify;

/// Clonable cancellation handle passed to every start worker.
///
/// # Example
///
/// ```
/// use pipegraph::CancelToken;
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() {
/// let token = CancelToken::new();
/// let worker = token.clone();
/// assert!(!worker.is_cancelled());
/// token.cancel();
/// worker.cancelled().await; // resolves immediately once cancelled
/// # }
/// ```
#[derive(Clone, Debug, Default)]
pub struct CancelToken {
  inner: Arc<Inner>,
}

#[derive(Debug, Default)]
struct Inner {
  cancelled: AtomicBool,
  notify: Notify,
}

impl CancelToken {
  /// Creates a token in the not-cancelled state.
  #[must_use]
  pub fn new() -> Self {
    Self::default()
  }

  /// Cancels the token, waking every pending and future `cancelled()` call.
  pub fn cancel(&self) {
    self.inner.cancelled.store(true, Ordering::SeqCst);
    self.inner.notify.notify_waiters();
  }

  /// Returns whether the token has been cancelled.
  pub fn is_cancelled(&self) -> bool {
    self.inner.cancelled.load(Ordering::SeqCst)
  }

  /// Resolves once the token is cancelled.
  ///
  /// Safe to use repeatedly inside `tokio::select!` loops.
  pub async fn cancelled(&self) {
    loop {
      if self.is_cancelled() {
        return;
      }
      let notified = self.inner.notify.notified();
      tokio::pin!(notified);
      // Register before the recheck so a cancel between the two cannot be lost.
      notified.as_mut().enable();
      if self.is_cancelled() {
        return;
      }
      notified.await;
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use std::time::Duration;
  use tokio::time::timeout;

  #[tokio::test]
  async fn cancelled_resolves_for_late_waiters() {
    let token = CancelToken::new();
    token.cancel();
    timeout(Duration::from_secs(1), token.cancelled())
      .await
      .expect("already-cancelled token must resolve immediately");
  }

  #[tokio::test]
  async fn cancel_wakes_pending_waiter() {
    let token = CancelToken::new();
    let waiter = token.clone();
    let handle = tokio::spawn(async move { waiter.cancelled().await });
    tokio::task::yield_now().await;
    token.cancel();
    timeout(Duration::from_secs(1), handle)
      .await
      .expect("waiter must wake after cancel")
      .unwrap();
  }

  #[tokio::test]
  async fn clones_share_state() {
    let token = CancelToken::new();
    let clone = token.clone();
    clone.cancel();
    assert!(token.is_cancelled());
  }
}
