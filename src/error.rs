use thiserror::Error;

/// Error type for builder registration and graph construction.
///
/// `build` reports the first failure it encounters; registration methods
/// report duplicate keys immediately.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum BuildError {
  /// A factory is already registered for this configuration type in this role.
  #[error("duplicate factory registration for config type {config_type}")]
  DuplicateRegistration {
    /// Configuration type of the rejected factory.
    config_type: &'static str,
  },

  /// A codec is already registered for this (input, output) element pair.
  #[error("duplicate codec registration from {from} to {to}")]
  DuplicateCodec {
    /// Input element type of the rejected codec.
    from: &'static str,
    /// Output element type of the rejected codec.
    to: &'static str,
  },

  /// A codec's input and output element types must differ.
  #[error("codec input and output element types must differ: {element}")]
  CodecSameType {
    /// The offending element type.
    element: &'static str,
  },

  /// No factory is registered for a discovered node's configuration type.
  #[error("unregistered config type {config_type} for node {node_id}")]
  UnregisteredConfig {
    /// Id of the node whose factory lookup failed.
    node_id: String,
    /// The configuration type with no registered factory.
    config_type: &'static str,
  },

  /// The same configuration type is registered in more than one role.
  #[error("config type {config_type} is registered in multiple roles")]
  AmbiguousRole {
    /// The ambiguous configuration type.
    config_type: &'static str,
  },

  /// A destination id does not refer to any declared node.
  #[error("node {node_id} sends to undeclared node {dest}")]
  UnknownDestination {
    /// Id of the node declaring the edge.
    node_id: String,
    /// The unknown destination id.
    dest: String,
  },

  /// A node lists itself as a destination.
  #[error("node {node_id} lists itself as a destination")]
  SelfLoop {
    /// Id of the self-referencing node.
    node_id: String,
  },

  /// A start or middle node has no outgoing edges.
  #[error("{role} node {node_id} has no outgoing edges")]
  MissingOutgoing {
    /// Id of the node with no destinations.
    node_id: String,
    /// Role of the node ("start" or "middle").
    role: &'static str,
  },

  /// A middle or terminal node has no incoming edges.
  #[error("{role} node {node_id} has no incoming edges")]
  MissingIncoming {
    /// Id of the node with no sources.
    node_id: String,
    /// Role of the node ("middle" or "terminal").
    role: &'static str,
  },

  /// An edge terminates at a start node or originates at a terminal node.
  #[error("illegal edge from {from} to {to}: {reason}")]
  IllegalRoleEdge {
    /// Source node id.
    from: String,
    /// Destination node id.
    to: String,
    /// Which role rule the edge violates.
    reason: &'static str,
  },

  /// Element types differ on an edge and no codec bridges them.
  #[error("no codec from {from_type} to {to_type} (edge {from} -> {to})")]
  NoCodec {
    /// Output element type of the source node.
    from_type: &'static str,
    /// Input element type of the destination node.
    to_type: &'static str,
    /// Source node id.
    from: String,
    /// Destination node id.
    to: String,
  },

  /// A node id resolved to the empty string.
  #[error("empty node id for config field {field}")]
  EmptyNodeId {
    /// Declared name of the offending schema field.
    field: &'static str,
  },

  /// Two nodes resolved to the same id.
  #[error("duplicate node id {node_id}")]
  DuplicateNodeId {
    /// The id declared more than once.
    node_id: String,
  },
}
