//! # Graph Construction
//!
//! The builder subsystem: configuration schema, type-indexed factory
//! registries, topology discovery and validation, and the run controller.
//!
//! Construction pipeline: a configuration value declares its schema
//! ([`GraphConfig`]), the inspector enumerates nodes and edges from it, the
//! validator enforces the role and connectivity rules, and the assembler
//! binds workers to bounded channels, inserting codec stages wherever the
//! element types on an edge differ.

mod builder;
#[allow(clippy::module_inception)]
mod graph;
mod registry;
mod schema;
mod topology;

pub use builder::Builder;
pub use graph::Graph;
pub use schema::{Connector, GraphConfig, NodeOpts, Schema};
