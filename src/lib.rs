#![doc = include_str!("../README.md")]

#[cfg(test)]
mod builder_test;

pub mod cancel;
pub mod channel;
pub mod error;
pub mod graph;
pub mod node;
pub mod stage;

pub use cancel::*;
pub use channel::*;
pub use error::*;
pub use graph::*;
pub use node::*;
pub use stage::*;
