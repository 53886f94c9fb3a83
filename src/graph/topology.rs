//! # Topology Inspector
//!
//! Turns the field declarations collected by a [`Schema`] walk into the
//! candidate node list: resolves node ids, expands list fields into sibling
//! nodes, resolves each node's role against the registries, and computes the
//! destination set as the union of the `sends_to` annotation and the
//! connector entry for the node's id.

use crate::error::BuildError;
use crate::graph::registry::Registries;
use crate::graph::schema::{ConfigRef, Connector, FieldDecl, FieldKind, Schema};
use std::any::{Any, TypeId};
use std::collections::HashSet;
use tracing::debug;

/// The shape of a node, determined by which registry holds its config type.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum Role {
  Start,
  Middle,
  Terminal,
}

impl Role {
  pub(crate) fn name(self) -> &'static str {
    match self {
      Role::Start => "start",
      Role::Middle => "middle",
      Role::Terminal => "terminal",
    }
  }
}

/// One discovered node: identity, role, config value, and destinations.
pub(crate) struct NodeSpec<'a> {
  pub id: String,
  pub role: Role,
  pub config: &'a dyn Any,
  pub config_type: TypeId,
  pub sends_to: Vec<String>,
}

/// Enumerates the nodes declared by a configuration value.
///
/// Id priority per node: non-empty `instance()` on the config value, then
/// the `.id(..)` annotation, then the declared field name. List elements take
/// ids from their `instance()` only. Fields annotated `.id("-")` are
/// excluded.
pub(crate) fn discover<'a>(
  schema: &Schema<'a>,
  registries: &Registries,
) -> Result<Vec<NodeSpec<'a>>, BuildError> {
  let mut specs = Vec::new();
  let mut seen = HashSet::new();

  for decl in schema.fields() {
    if decl.node_id.as_deref() == Some("-") {
      continue;
    }
    match &decl.kind {
      FieldKind::Single(config) => {
        let id = config
          .instance
          .map(str::to_string)
          .or_else(|| decl.node_id.clone())
          .unwrap_or_else(|| decl.field.to_string());
        push_node(&mut specs, &mut seen, decl, config, id, schema.connector_map(), registries)?;
      }
      FieldKind::List(configs) => {
        for config in configs {
          let Some(instance) = config.instance else {
            return Err(BuildError::EmptyNodeId { field: decl.field });
          };
          push_node(
            &mut specs,
            &mut seen,
            decl,
            config,
            instance.to_string(),
            schema.connector_map(),
            registries,
          )?;
        }
      }
    }
  }

  Ok(specs)
}

fn push_node<'a>(
  specs: &mut Vec<NodeSpec<'a>>,
  seen: &mut HashSet<String>,
  decl: &FieldDecl<'a>,
  config: &ConfigRef<'a>,
  id: String,
  connector: Option<&Connector>,
  registries: &Registries,
) -> Result<(), BuildError> {
  if id.is_empty() {
    return Err(BuildError::EmptyNodeId { field: decl.field });
  }
  if !seen.insert(id.clone()) {
    return Err(BuildError::DuplicateNodeId { node_id: id });
  }

  let role = registries.role_of(config.type_id, config.type_name, &id)?;
  let sends_to = destinations(decl.sends_to.as_deref(), &id, connector);
  debug!(node = %id, role = role.name(), destinations = sends_to.len(), "discovered node");

  specs.push(NodeSpec {
    id,
    role,
    config: config.config,
    config_type: config.type_id,
    sends_to,
  });
  Ok(())
}

/// Union of the comma-separated annotation and the connector entry, first
/// occurrence wins, annotation order first.
fn destinations(annotation: Option<&str>, id: &str, connector: Option<&Connector>) -> Vec<String> {
  let mut sends_to: Vec<String> = Vec::new();
  if let Some(annotation) = annotation {
    for target in annotation.split(',') {
      let target = target.trim();
      if !target.is_empty() && !sends_to.iter().any(|t| t == target) {
        sends_to.push(target.to_string());
      }
    }
  }
  if let Some(targets) = connector.and_then(|connector| connector.get(id)) {
    for target in targets {
      if !sends_to.contains(target) {
        sends_to.push(target.clone());
      }
    }
  }
  sends_to
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn unions_annotation_and_connector_edges() {
    let mut connector = Connector::new();
    connector.insert("n".to_string(), vec!["b".to_string(), "c".to_string()]);
    assert_eq!(
      destinations(Some("a,b"), "n", Some(&connector)),
      vec!["a".to_string(), "b".to_string(), "c".to_string()]
    );
  }

  #[test]
  fn annotation_parsing_trims_and_dedups() {
    assert_eq!(
      destinations(Some(" a , b ,a,"), "n", None),
      vec!["a".to_string(), "b".to_string()]
    );
    assert!(destinations(Some(""), "n", None).is_empty());
    assert!(destinations(None, "n", None).is_empty());
  }
}
