//! # Configuration Schema
//!
//! A graph is described by a plain configuration struct. Rust has no runtime
//! field reflection, so the struct declares its own schema by implementing
//! [`GraphConfig`]: one `visit` call per field, annotated with the node id
//! and destinations where the config value itself does not carry them.
//!
//! ```
//! use pipegraph::{Connector, GraphConfig, Schema, StageConfig};
//!
//! #[derive(Clone)]
//! struct CounterCfg {
//!   from: i32,
//!   to: i32,
//! }
//! impl StageConfig for CounterCfg {}
//!
//! #[derive(Clone)]
//! struct SinkCfg;
//! impl StageConfig for SinkCfg {}
//!
//! struct Config {
//!   counter: CounterCfg,
//!   sink: SinkCfg,
//!   connector: Connector,
//! }
//!
//! impl GraphConfig for Config {
//!   fn visit<'a>(&'a self, schema: &mut Schema<'a>) {
//!     schema.node("counter", &self.counter).id("c");
//!     schema.node("sink", &self.sink).id("s");
//!     schema.connector(&self.connector);
//!   }
//! }
//! ```
//!
//! Fields that are not declared do not participate in the graph; declaring a
//! field with `.id("-")` excludes it explicitly even if it carries a
//! `sends_to` annotation.

use crate::stage::StageConfig;
use std::any::{Any, TypeId};
use std::collections::HashMap;

/// External edge source: maps a source node id to its destination ids.
///
/// Deserializable from plain JSON/YAML maps, so a pipeline's wiring can live
/// in a config file.
pub type Connector = HashMap<String, Vec<String>>;

/// Implemented by graph configuration types to declare their schema.
pub trait GraphConfig {
  /// Declares every node field, list field, and connector of this config.
  fn visit<'a>(&'a self, schema: &mut Schema<'a>);
}

/// Collects the field declarations of one configuration value.
pub struct Schema<'a> {
  fields: Vec<FieldDecl<'a>>,
  connector: Option<&'a Connector>,
}

impl<'a> Schema<'a> {
  pub(crate) fn new() -> Self {
    Self {
      fields: Vec::new(),
      connector: None,
    }
  }

  /// Declares a field holding a single node configuration.
  ///
  /// The node id defaults to the declared `field` name; a non-empty
  /// [`StageConfig::instance`] on the value or an [`id`](NodeOpts::id)
  /// annotation takes priority (in that order).
  pub fn node<C: StageConfig>(&mut self, field: &'static str, config: &'a C) -> NodeOpts<'_, 'a> {
    self.push(field, FieldKind::Single(ConfigRef::of(config)))
  }

  /// Declares a field holding a sequence of sibling node configurations.
  ///
  /// Every element becomes its own node; ids come from each element's
  /// [`StageConfig::instance`]. A [`sends_to`](NodeOpts::sends_to) annotation
  /// applies to every element.
  pub fn node_list<C: StageConfig>(
    &mut self,
    field: &'static str,
    configs: &'a [C],
  ) -> NodeOpts<'_, 'a> {
    self.push(field, FieldKind::List(configs.iter().map(ConfigRef::of).collect()))
  }

  /// Declares the connector field contributing edges by node id.
  pub fn connector(&mut self, connector: &'a Connector) {
    self.connector = Some(connector);
  }

  fn push(&mut self, field: &'static str, kind: FieldKind<'a>) -> NodeOpts<'_, 'a> {
    self.fields.push(FieldDecl {
      field,
      node_id: None,
      sends_to: None,
      kind,
    });
    NodeOpts {
      decl: self.fields.last_mut().expect("field just pushed"),
    }
  }

  pub(crate) fn fields(&self) -> &[FieldDecl<'a>] {
    &self.fields
  }

  pub(crate) fn connector_map(&self) -> Option<&'a Connector> {
    self.connector
  }
}

/// Annotations on one declared field, the equivalent of struct tags.
pub struct NodeOpts<'s, 'a> {
  decl: &'s mut FieldDecl<'a>,
}

impl NodeOpts<'_, '_> {
  /// Sets the node id for this field. `"-"` excludes the field entirely.
  pub fn id(self, id: impl Into<String>) -> Self {
    self.decl.node_id = Some(id.into());
    self
  }

  /// Declares destinations as a comma-separated list of node ids.
  pub fn sends_to(self, targets: impl Into<String>) -> Self {
    self.decl.sends_to = Some(targets.into());
    self
  }
}

pub(crate) struct FieldDecl<'a> {
  pub field: &'static str,
  pub node_id: Option<String>,
  pub sends_to: Option<String>,
  pub kind: FieldKind<'a>,
}

pub(crate) enum FieldKind<'a> {
  Single(ConfigRef<'a>),
  List(Vec<ConfigRef<'a>>),
}

/// A type-erased borrow of one node configuration value, captured together
/// with everything the inspector needs from its static type.
pub(crate) struct ConfigRef<'a> {
  pub config: &'a dyn Any,
  pub type_id: TypeId,
  pub type_name: &'static str,
  pub instance: Option<&'a str>,
}

impl<'a> ConfigRef<'a> {
  fn of<C: StageConfig>(config: &'a C) -> Self {
    Self {
      config,
      type_id: TypeId::of::<C>(),
      type_name: std::any::type_name::<C>(),
      instance: config.instance().filter(|id| !id.is_empty()),
    }
  }
}
