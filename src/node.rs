//! # Node Primitives
//!
//! The three worker shapes a graph is made of. Each wraps a user-supplied
//! async closure over its channel endpoints and erases it to a boxed future
//! so the builder can handle all nodes uniformly:
//!
//! - [`StartFn`]: no input; receives a [`CancelToken`] and the outbound
//!   sender.
//! - [`MiddleFn`]: inbound receiver and outbound sender.
//! - [`TerminalFn`]: inbound receiver only.
//!
//! The runtime closes a worker's outbound channel by dropping the sender when
//! the worker future resolves; middle and terminal workers therefore finish
//! naturally when their input closes and drains.

use crate::cancel::CancelToken;
use futures::future::BoxFuture;
use std::future::Future;
use tokio::sync::mpsc;

/// Worker for a start node: emits elements until done or cancelled.
///
/// # Example
///
/// ```
/// use pipegraph::StartFn;
/// use tokio::sync::mpsc;
///
/// let worker = StartFn::new(|_ctx, out: mpsc::Sender<i32>| async move {
///   for i in 1..=5 {
///     if out.send(i).await.is_err() {
///       break;
///     }
///   }
/// });
/// # let _ = worker;
/// ```
pub struct StartFn<O> {
  f: Box<dyn FnOnce(CancelToken, mpsc::Sender<O>) -> BoxFuture<'static, ()> + Send>,
}

impl<O> StartFn<O> {
  /// Wraps an async closure as a start worker.
  pub fn new<F, Fut>(f: F) -> Self
  where
    F: FnOnce(CancelToken, mpsc::Sender<O>) -> Fut + Send + 'static,
    Fut: Future<Output = ()> + Send + 'static,
  {
    Self {
      f: Box::new(move |ctx, out| Box::pin(f(ctx, out))),
    }
  }

  pub(crate) fn into_future(self, ctx: CancelToken, out: mpsc::Sender<O>) -> BoxFuture<'static, ()> {
    (self.f)(ctx, out)
  }
}

/// Worker for a middle node: transforms elements from input to output.
pub struct MiddleFn<I, O> {
  f: Box<dyn FnOnce(mpsc::Receiver<I>, mpsc::Sender<O>) -> BoxFuture<'static, ()> + Send>,
}

impl<I, O> MiddleFn<I, O> {
  /// Wraps an async closure as a middle worker.
  pub fn new<F, Fut>(f: F) -> Self
  where
    F: FnOnce(mpsc::Receiver<I>, mpsc::Sender<O>) -> Fut + Send + 'static,
    Fut: Future<Output = ()> + Send + 'static,
  {
    Self {
      f: Box::new(move |rx, out| Box::pin(f(rx, out))),
    }
  }

  pub(crate) fn into_future(
    self,
    rx: mpsc::Receiver<I>,
    out: mpsc::Sender<O>,
  ) -> BoxFuture<'static, ()> {
    (self.f)(rx, out)
  }
}

/// Worker for a terminal node: consumes elements until the input closes.
pub struct TerminalFn<I> {
  f: Box<dyn FnOnce(mpsc::Receiver<I>) -> BoxFuture<'static, ()> + Send>,
}

impl<I> TerminalFn<I> {
  /// Wraps an async closure as a terminal worker.
  pub fn new<F, Fut>(f: F) -> Self
  where
    F: FnOnce(mpsc::Receiver<I>) -> Fut + Send + 'static,
    Fut: Future<Output = ()> + Send + 'static,
  {
    Self {
      f: Box::new(move |rx| Box::pin(f(rx))),
    }
  }

  pub(crate) fn into_future(self, rx: mpsc::Receiver<I>) -> BoxFuture<'static, ()> {
    (self.f)(rx)
  }
}
