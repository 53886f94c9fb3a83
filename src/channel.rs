//! # Channel Runtime
//!
//! Every edge of a graph is a bounded `tokio::sync::mpsc` channel. A worker's
//! outbound channel closes when the worker future resolves and drops its
//! sender; consumers iterate with `recv()` until the close drains through.
//! Fan-in needs no extra machinery: each upstream holds a clone of the
//! destination's inbound sender, and the channel closes only after the last
//! clone drops. Fan-out is a dedicated forwarder task per node, implemented
//! here.

use tokio::sync::mpsc;
use tracing::trace;

/// Default capacity of every edge queue.
///
/// tokio has no zero-capacity rendezvous channel, so the tightest available
/// bound is one element: a producer may run at most one item ahead of each
/// consumer. Raise it per build with `Builder::with_channel_capacity`.
pub const DEFAULT_CHANNEL_CAPACITY: usize = 1;

/// Replicates every item from `rx` to all `outputs` in declaration order.
///
/// Sends are sequential, so one slow destination backpressures the producer
/// and all sibling destinations. A destination whose receiver is gone is
/// dropped from the rotation; the forwarder exits when the source closes or
/// no destinations remain.
pub(crate) async fn fan_out<T: Clone>(mut rx: mpsc::Receiver<T>, mut outputs: Vec<mpsc::Sender<T>>) {
  while let Some(item) = rx.recv().await {
    let mut i = 0;
    while i < outputs.len() {
      if outputs[i].send(item.clone()).await.is_ok() {
        i += 1;
      } else {
        trace!("downstream queue closed, removing destination from fan-out");
        outputs.remove(i);
      }
    }
    if outputs.is_empty() {
      return;
    }
  }
}
