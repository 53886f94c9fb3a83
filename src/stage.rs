//! # Stage Configuration
//!
//! Every node configuration type registered with a builder implements
//! [`StageConfig`]. The trait carries the optional per-value node id: a
//! non-empty `instance()` takes priority over any id annotation in the
//! config schema, which in turn takes priority over the declared field name.
//! Configs without an explicit id need only the empty impl.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Implemented by node configuration types.
///
/// Configuration values are cloned into their factory at build time, so the
/// type must be `Clone`; shared state (sink maps, user channels) is typically
/// held behind `Arc` or a clonable sender.
pub trait StageConfig: Clone + Send + 'static {
  /// Explicit node id carried by this configuration value, if any.
  ///
  /// Returning `None` (the default) falls back to the schema annotation and
  /// then to the declared field name. Embedding an [`Instance`] field makes
  /// the override a one-liner.
  fn instance(&self) -> Option<&str> {
    None
  }
}

/// A node id embedded in a configuration struct.
///
/// Serializes transparently as a plain string, so configs deserialized from
/// JSON/YAML carry their ids without extra nesting.
///
/// ```
/// use pipegraph::{Instance, StageConfig};
///
/// #[derive(Clone)]
/// struct CounterCfg {
///   instance: Instance,
///   from: i32,
///   to: i32,
/// }
///
/// impl StageConfig for CounterCfg {
///   fn instance(&self) -> Option<&str> {
///     self.instance.get()
///   }
/// }
/// ```
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Instance(pub String);

impl Instance {
  /// Creates an instance id.
  pub fn new(id: impl Into<String>) -> Self {
    Self(id.into())
  }

  /// The id, or `None` when empty.
  pub fn get(&self) -> Option<&str> {
    if self.0.is_empty() { None } else { Some(&self.0) }
  }
}

impl From<&str> for Instance {
  fn from(id: &str) -> Self {
    Self(id.to_string())
  }
}

impl fmt::Display for Instance {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(&self.0)
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn empty_instance_reports_none() {
    assert_eq!(Instance::default().get(), None);
    assert_eq!(Instance::new("c1").get(), Some("c1"));
  }

  #[test]
  fn serializes_as_plain_string() {
    let id: Instance = serde_json::from_str("\"c1\"").unwrap();
    assert_eq!(id, Instance::new("c1"));
    assert_eq!(serde_json::to_string(&id).unwrap(), "\"c1\"");
  }
}
