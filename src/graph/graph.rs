//! # Run Controller
//!
//! A built [`Graph`] holds one prepared task per worker, codec stage, and
//! fan-out forwarder. `run` spawns them leaves-first so every consumer is
//! ready before its producer emits, then waits for every terminal to finish.
//!
//! Cancellation is graceful: the token reaches start workers, their outbound
//! channels close as the workers return, and the closure cascades through
//! middles and terminals while in-flight items drain. Nothing is aborted.

use crate::cancel::CancelToken;
use crate::graph::registry::PreparedTask;
use tracing::{debug, warn};

/// Spawn-order class of a prepared task. Terminals start first, sources last.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum TaskKind {
  Start,
  /// Middle workers, codec stages, and fan-out forwarders.
  Relay,
  Terminal,
}

impl TaskKind {
  fn start_rank(self) -> u8 {
    match self {
      TaskKind::Terminal => 0,
      TaskKind::Relay => 1,
      TaskKind::Start => 2,
    }
  }
}

pub(crate) struct NodeTask {
  label: String,
  kind: TaskKind,
  prepare: PreparedTask,
}

impl NodeTask {
  pub(crate) fn new(label: String, kind: TaskKind, prepare: PreparedTask) -> Self {
    Self {
      label,
      kind,
      prepare,
    }
  }
}

/// The immutable result of a successful build, ready to run.
pub struct Graph {
  tasks: Vec<NodeTask>,
}

impl std::fmt::Debug for Graph {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("Graph")
      .field("tasks", &self.tasks.iter().map(|t| &t.label).collect::<Vec<_>>())
      .finish()
  }
}

impl Graph {
  pub(crate) fn from_tasks(tasks: Vec<NodeTask>) -> Self {
    Self { tasks }
  }

  /// Runs the graph until every terminal worker has returned.
  ///
  /// Cancelling `ctx` makes start workers exit; their closed outbound
  /// channels cascade through the graph and `run` returns once the remaining
  /// items have drained through every terminal. A worker panic ends only its
  /// own task; the closure cascade still completes the graph.
  pub async fn run(mut self, ctx: CancelToken) {
    self.tasks.sort_by_key(|task| task.kind.start_rank());

    let mut terminals = Vec::new();
    for task in self.tasks {
      debug!(node = %task.label, kind = ?task.kind, "starting node task");
      let handle = tokio::spawn((task.prepare)(ctx.clone()));
      if task.kind == TaskKind::Terminal {
        terminals.push((task.label, handle));
      }
    }

    for (label, handle) in terminals {
      if let Err(join_error) = handle.await {
        if join_error.is_panic() {
          warn!(node = %label, "terminal worker panicked");
        }
      }
      debug!(node = %label, "terminal finished");
    }
  }
}
