//! # Graph Builder
//!
//! The builder owns the factory registries and turns a configuration value
//! into a runnable [`Graph`]: schema walk, node discovery, topology
//! validation, then assembly of channels, codec stages, and fan-out
//! forwarders around the node workers.

use crate::channel::DEFAULT_CHANNEL_CAPACITY;
use crate::error::BuildError;
use crate::graph::graph::{Graph, NodeTask, TaskKind};
use crate::graph::registry::{AnyBox, Outbound, Registries};
use crate::graph::schema::{GraphConfig, Schema};
use crate::graph::topology::{self, NodeSpec, Role};
use crate::node::{MiddleFn, StartFn, TerminalFn};
use crate::stage::StageConfig;
use std::collections::HashMap;
use std::future::Future;
use tokio::sync::mpsc;
use tracing::debug;

/// Builds typed dataflow graphs from registered stage factories and a
/// configuration value.
///
/// Registries are instance-scoped: independent builders can register the
/// same configuration types differently. See the crate-level documentation
/// for a complete example.
pub struct Builder {
  registries: Registries,
  channel_capacity: usize,
}

impl Default for Builder {
  fn default() -> Self {
    Self::new()
  }
}

impl Builder {
  /// Creates a builder with empty registries and the default channel
  /// capacity.
  #[must_use]
  pub fn new() -> Self {
    Self {
      registries: Registries::default(),
      channel_capacity: DEFAULT_CHANNEL_CAPACITY,
    }
  }

  /// Sets the capacity of every edge queue in graphs built by this builder.
  ///
  /// Applies uniformly to node inbound channels, codec inlets, and fan-out
  /// inlets. The minimum (and default) capacity is one element.
  #[must_use]
  pub fn with_channel_capacity(mut self, capacity: usize) -> Self {
    self.channel_capacity = capacity.max(1);
    self
  }

  /// Registers a factory producing start workers for config type `C`.
  ///
  /// Fails if a start factory for `C` is already registered.
  pub fn register_start<C, O, F>(&mut self, factory: F) -> Result<(), BuildError>
  where
    C: StageConfig,
    O: Clone + Send + 'static,
    F: Fn(C) -> StartFn<O> + Send + Sync + 'static,
  {
    self.registries.register_start(factory)
  }

  /// Registers a factory producing middle workers for config type `C`.
  ///
  /// Fails if a middle factory for `C` is already registered.
  pub fn register_middle<C, I, O, F>(&mut self, factory: F) -> Result<(), BuildError>
  where
    C: StageConfig,
    I: Send + 'static,
    O: Clone + Send + 'static,
    F: Fn(C) -> MiddleFn<I, O> + Send + Sync + 'static,
  {
    self.registries.register_middle(factory)
  }

  /// Registers a factory producing terminal workers for config type `C`.
  ///
  /// Fails if a terminal factory for `C` is already registered.
  pub fn register_terminal<C, I, F>(&mut self, factory: F) -> Result<(), BuildError>
  where
    C: StageConfig,
    I: Send + 'static,
    F: Fn(C) -> TerminalFn<I> + Send + Sync + 'static,
  {
    self.registries.register_terminal(factory)
  }

  /// Registers a codec bridging element type `I` to `O` on mismatched edges.
  ///
  /// The closure is invoked once per edge that needs the conversion, running
  /// as a hidden middle stage. `I` and `O` must differ; at most one codec per
  /// pair may be registered.
  pub fn register_codec<I, O, F, Fut>(&mut self, codec: F) -> Result<(), BuildError>
  where
    I: Send + 'static,
    O: Send + 'static,
    F: Fn(mpsc::Receiver<I>, mpsc::Sender<O>) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = ()> + Send + 'static,
  {
    self.registries.register_codec(codec)
  }

  /// Validates the configuration value and assembles a runnable graph.
  ///
  /// Discovery, validation, and assembly report the first failure as a
  /// [`BuildError`]. Factories are invoked here, once per node, with a clone
  /// of the node's configuration value.
  pub fn build<C: GraphConfig>(&self, config: &C) -> Result<Graph, BuildError> {
    let mut schema = Schema::new();
    config.visit(&mut schema);
    let specs = topology::discover(&schema, &self.registries)?;
    validate(&specs)?;
    self.assemble(&specs)
  }

  fn assemble(&self, specs: &[NodeSpec<'_>]) -> Result<Graph, BuildError> {
    let index: HashMap<&str, usize> = specs
      .iter()
      .enumerate()
      .map(|(i, spec)| (spec.id.as_str(), i))
      .collect();

    // One inbound channel per middle/terminal; every upstream gets a clone of
    // the sender, so the channel closes once the last upstream finishes.
    let mut inbound_tx: HashMap<usize, AnyBox> = HashMap::new();
    let mut inbound_rx: HashMap<usize, AnyBox> = HashMap::new();
    for (i, spec) in specs.iter().enumerate() {
      if let Some(support) = self.registries.inbound_of(spec.config_type, spec.role) {
        let (tx, rx) = (support.make)(self.channel_capacity);
        inbound_tx.insert(i, tx);
        inbound_rx.insert(i, rx);
      }
    }

    let mut tasks = Vec::new();
    for (i, spec) in specs.iter().enumerate() {
      match spec.role {
        Role::Start => {
          let entry = self
            .registries
            .starts
            .get(&spec.config_type)
            .expect("role resolved from start registry");
          let out = self.bind_outbound(spec, &entry.outbound, specs, &index, &inbound_tx, &mut tasks)?;
          tasks.push(NodeTask::new(
            spec.id.clone(),
            TaskKind::Start,
            (entry.prepare)(spec.config, out),
          ));
        }
        Role::Middle => {
          let entry = self
            .registries
            .middles
            .get(&spec.config_type)
            .expect("role resolved from middle registry");
          let out = self.bind_outbound(spec, &entry.outbound, specs, &index, &inbound_tx, &mut tasks)?;
          let rx = inbound_rx
            .remove(&i)
            .expect("inbound channel allocated for middle");
          tasks.push(NodeTask::new(
            spec.id.clone(),
            TaskKind::Relay,
            (entry.prepare)(spec.config, rx, out),
          ));
        }
        Role::Terminal => {
          let entry = self
            .registries
            .terminals
            .get(&spec.config_type)
            .expect("role resolved from terminal registry");
          let rx = inbound_rx
            .remove(&i)
            .expect("inbound channel allocated for terminal");
          tasks.push(NodeTask::new(
            spec.id.clone(),
            TaskKind::Terminal,
            (entry.prepare)(spec.config, rx),
          ));
        }
      }
    }

    Ok(Graph::from_tasks(tasks))
  }

  /// Resolves a node's destinations into the single sender its worker writes
  /// to, inserting codec stages on type-mismatched edges and a fan-out
  /// forwarder when there is more than one destination.
  fn bind_outbound(
    &self,
    spec: &NodeSpec<'_>,
    outbound: &Outbound,
    specs: &[NodeSpec<'_>],
    index: &HashMap<&str, usize>,
    inbound_tx: &HashMap<usize, AnyBox>,
    tasks: &mut Vec<NodeTask>,
  ) -> Result<AnyBox, BuildError> {
    let mut dest_txs: Vec<AnyBox> = Vec::with_capacity(spec.sends_to.len());
    for dest_id in &spec.sends_to {
      let j = index[dest_id.as_str()];
      let dest = &specs[j];
      let support = self
        .registries
        .inbound_of(dest.config_type, dest.role)
        .expect("destination role validated");
      let dest_tx = (support.clone_sender)(
        inbound_tx
          .get(&j)
          .expect("inbound channel allocated for destination"),
      );
      if support.element == outbound.support.element {
        dest_txs.push(dest_tx);
      } else {
        let codec = self
          .registries
          .codecs
          .get(&(outbound.support.element.id, support.element.id))
          .ok_or_else(|| BuildError::NoCodec {
            from_type: outbound.support.element.name,
            to_type: support.element.name,
            from: spec.id.clone(),
            to: dest.id.clone(),
          })?;
        debug!(from = %spec.id, to = %dest.id, "inserting codec stage on type-mismatched edge");
        let (codec_tx, codec_rx) = (codec.inbound.make)(self.channel_capacity);
        tasks.push(NodeTask::new(
          format!("codec:{}->{}", spec.id, dest.id),
          TaskKind::Relay,
          (codec.prepare)(codec_rx, dest_tx),
        ));
        dest_txs.push(codec_tx);
      }
    }

    if dest_txs.len() == 1 {
      Ok(dest_txs.pop().expect("single destination sender"))
    } else {
      let (tx, rx) = (outbound.support.make)(self.channel_capacity);
      tasks.push(NodeTask::new(
        format!("{}/fan-out", spec.id),
        TaskKind::Relay,
        (outbound.fan_out)(rx, dest_txs),
      ));
      Ok(tx)
    }
  }
}

/// Topology rules, first failure wins: role/edge-count constraints, known
/// destinations, no self-loops, no edges into starts or out of terminals,
/// and incoming coverage for middles and terminals.
fn validate(specs: &[NodeSpec<'_>]) -> Result<(), BuildError> {
  let index: HashMap<&str, &NodeSpec<'_>> =
    specs.iter().map(|spec| (spec.id.as_str(), spec)).collect();
  let mut incoming: HashMap<&str, usize> = specs.iter().map(|spec| (spec.id.as_str(), 0)).collect();

  for spec in specs {
    match spec.role {
      Role::Terminal => {
        if let Some(dest) = spec.sends_to.first() {
          return Err(BuildError::IllegalRoleEdge {
            from: spec.id.clone(),
            to: dest.clone(),
            reason: "terminal nodes cannot have outgoing edges",
          });
        }
      }
      Role::Start | Role::Middle => {
        if spec.sends_to.is_empty() {
          return Err(BuildError::MissingOutgoing {
            node_id: spec.id.clone(),
            role: spec.role.name(),
          });
        }
      }
    }

    for dest_id in &spec.sends_to {
      if dest_id == &spec.id {
        return Err(BuildError::SelfLoop {
          node_id: spec.id.clone(),
        });
      }
      let Some(dest) = index.get(dest_id.as_str()) else {
        return Err(BuildError::UnknownDestination {
          node_id: spec.id.clone(),
          dest: dest_id.clone(),
        });
      };
      if dest.role == Role::Start {
        return Err(BuildError::IllegalRoleEdge {
          from: spec.id.clone(),
          to: dest_id.clone(),
          reason: "start nodes cannot have incoming edges",
        });
      }
      *incoming
        .get_mut(dest_id.as_str())
        .expect("destination present in index") += 1;
    }
  }

  for spec in specs {
    if matches!(spec.role, Role::Middle | Role::Terminal) && incoming[spec.id.as_str()] == 0 {
      return Err(BuildError::MissingIncoming {
        node_id: spec.id.clone(),
        role: spec.role.name(),
      });
    }
  }

  Ok(())
}
