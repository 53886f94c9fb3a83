//! # Factory Registries
//!
//! Type-indexed maps from a configuration type to the factory that builds the
//! node's worker, one map per role, plus the codec map keyed by the (input,
//! output) element pair.
//!
//! The graph assembler works on nodes whose element types are known only at
//! runtime, so each registration captures a set of monomorphized helpers and
//! erases them behind boxed closures: a channel constructor and sender cloner
//! for the element type, a fan-out forwarder spawner, and the worker spawner
//! itself. Endpoints cross the erased boundary as `Box<dyn Any + Send>` and
//! are downcast back on the other side; element-type equality is verified
//! during assembly before any endpoint is handed over.

use crate::cancel::CancelToken;
use crate::channel;
use crate::error::BuildError;
use crate::graph::topology::Role;
use crate::node::{MiddleFn, StartFn, TerminalFn};
use crate::stage::StageConfig;
use futures::future::BoxFuture;
use std::any::{Any, TypeId, type_name};
use std::collections::HashMap;
use std::future::Future;
use tokio::sync::mpsc;

/// A type-erased channel endpoint or prepared value.
pub(crate) type AnyBox = Box<dyn Any + Send>;

/// A node task waiting for the run controller: give it the cancellation
/// token and it yields the future to spawn.
pub(crate) type PreparedTask = Box<dyn FnOnce(CancelToken) -> BoxFuture<'static, ()> + Send>;

/// Runtime handle for an element type flowing on an edge.
#[derive(Clone, Copy, Debug)]
pub(crate) struct ElementType {
  pub id: TypeId,
  pub name: &'static str,
}

impl ElementType {
  fn of<T: 'static>() -> Self {
    Self {
      id: TypeId::of::<T>(),
      name: type_name::<T>(),
    }
  }
}

impl PartialEq for ElementType {
  fn eq(&self, other: &Self) -> bool {
    self.id == other.id
  }
}

impl Eq for ElementType {}

/// Monomorphized channel plumbing for one element type.
pub(crate) struct ChannelSupport {
  pub element: ElementType,
  /// Builds a `tokio::sync::mpsc` channel of this element type with the
  /// given capacity, both endpoints erased.
  pub make: Box<dyn Fn(usize) -> (AnyBox, AnyBox) + Send + Sync>,
  /// Clones an erased sender of this element type.
  pub clone_sender: Box<dyn Fn(&AnyBox) -> AnyBox + Send + Sync>,
}

impl ChannelSupport {
  fn of<T: Send + 'static>() -> Self {
    Self {
      element: ElementType::of::<T>(),
      make: Box::new(|capacity| {
        let (tx, rx) = mpsc::channel::<T>(capacity);
        (Box::new(tx) as AnyBox, Box::new(rx) as AnyBox)
      }),
      clone_sender: Box::new(|sender| {
        let tx = sender
          .downcast_ref::<mpsc::Sender<T>>()
          .expect("sender element type verified during assembly");
        Box::new(tx.clone()) as AnyBox
      }),
    }
  }
}

/// Outbound plumbing for a start or middle node: channel support for the
/// output element plus the erased fan-out forwarder.
pub(crate) struct Outbound {
  pub support: ChannelSupport,
  pub fan_out: Box<dyn Fn(AnyBox, Vec<AnyBox>) -> PreparedTask + Send + Sync>,
}

impl Outbound {
  fn of<T: Clone + Send + 'static>() -> Self {
    Self {
      support: ChannelSupport::of::<T>(),
      fan_out: Box::new(|rx, senders| {
        let rx = *rx
          .downcast::<mpsc::Receiver<T>>()
          .expect("fan-out source element type fixed at registration");
        let senders: Vec<mpsc::Sender<T>> = senders
          .into_iter()
          .map(|tx| {
            *tx.downcast::<mpsc::Sender<T>>()
              .expect("fan-out destination element types verified during assembly")
          })
          .collect();
        let fut: BoxFuture<'static, ()> = Box::pin(channel::fan_out(rx, senders));
        Box::new(move |_ctx: CancelToken| fut)
      }),
    }
  }
}

pub(crate) struct StartEntry {
  pub outbound: Outbound,
  pub prepare: Box<dyn Fn(&dyn Any, AnyBox) -> PreparedTask + Send + Sync>,
}

pub(crate) struct MiddleEntry {
  pub inbound: ChannelSupport,
  pub outbound: Outbound,
  pub prepare: Box<dyn Fn(&dyn Any, AnyBox, AnyBox) -> PreparedTask + Send + Sync>,
}

pub(crate) struct TerminalEntry {
  pub inbound: ChannelSupport,
  pub prepare: Box<dyn Fn(&dyn Any, AnyBox) -> PreparedTask + Send + Sync>,
}

pub(crate) struct CodecEntry {
  pub inbound: ChannelSupport,
  pub prepare: Box<dyn Fn(AnyBox, AnyBox) -> PreparedTask + Send + Sync>,
}

/// The three role registries plus the codec registry of one builder.
#[derive(Default)]
pub(crate) struct Registries {
  pub starts: HashMap<TypeId, StartEntry>,
  pub middles: HashMap<TypeId, MiddleEntry>,
  pub terminals: HashMap<TypeId, TerminalEntry>,
  pub codecs: HashMap<(TypeId, TypeId), CodecEntry>,
}

impl Registries {
  pub(crate) fn register_start<C, O, F>(&mut self, factory: F) -> Result<(), BuildError>
  where
    C: StageConfig,
    O: Clone + Send + 'static,
    F: Fn(C) -> StartFn<O> + Send + Sync + 'static,
  {
    let key = TypeId::of::<C>();
    if self.starts.contains_key(&key) {
      return Err(BuildError::DuplicateRegistration {
        config_type: type_name::<C>(),
      });
    }
    self.starts.insert(
      key,
      StartEntry {
        outbound: Outbound::of::<O>(),
        prepare: Box::new(move |config, out| {
          let config = config
            .downcast_ref::<C>()
            .expect("config type resolved during discovery")
            .clone();
          let worker = factory(config);
          let out = *out
            .downcast::<mpsc::Sender<O>>()
            .expect("outbound element type verified during assembly");
          Box::new(move |ctx: CancelToken| worker.into_future(ctx, out))
        }),
      },
    );
    Ok(())
  }

  pub(crate) fn register_middle<C, I, O, F>(&mut self, factory: F) -> Result<(), BuildError>
  where
    C: StageConfig,
    I: Send + 'static,
    O: Clone + Send + 'static,
    F: Fn(C) -> MiddleFn<I, O> + Send + Sync + 'static,
  {
    let key = TypeId::of::<C>();
    if self.middles.contains_key(&key) {
      return Err(BuildError::DuplicateRegistration {
        config_type: type_name::<C>(),
      });
    }
    self.middles.insert(
      key,
      MiddleEntry {
        inbound: ChannelSupport::of::<I>(),
        outbound: Outbound::of::<O>(),
        prepare: Box::new(move |config, rx, out| {
          let config = config
            .downcast_ref::<C>()
            .expect("config type resolved during discovery")
            .clone();
          let worker = factory(config);
          let rx = *rx
            .downcast::<mpsc::Receiver<I>>()
            .expect("inbound element type verified during assembly");
          let out = *out
            .downcast::<mpsc::Sender<O>>()
            .expect("outbound element type verified during assembly");
          let fut = worker.into_future(rx, out);
          Box::new(move |_ctx: CancelToken| fut)
        }),
      },
    );
    Ok(())
  }

  pub(crate) fn register_terminal<C, I, F>(&mut self, factory: F) -> Result<(), BuildError>
  where
    C: StageConfig,
    I: Send + 'static,
    F: Fn(C) -> TerminalFn<I> + Send + Sync + 'static,
  {
    let key = TypeId::of::<C>();
    if self.terminals.contains_key(&key) {
      return Err(BuildError::DuplicateRegistration {
        config_type: type_name::<C>(),
      });
    }
    self.terminals.insert(
      key,
      TerminalEntry {
        inbound: ChannelSupport::of::<I>(),
        prepare: Box::new(move |config, rx| {
          let config = config
            .downcast_ref::<C>()
            .expect("config type resolved during discovery")
            .clone();
          let worker = factory(config);
          let rx = *rx
            .downcast::<mpsc::Receiver<I>>()
            .expect("inbound element type verified during assembly");
          let fut = worker.into_future(rx);
          Box::new(move |_ctx: CancelToken| fut)
        }),
      },
    );
    Ok(())
  }

  pub(crate) fn register_codec<I, O, F, Fut>(&mut self, codec: F) -> Result<(), BuildError>
  where
    I: Send + 'static,
    O: Send + 'static,
    F: Fn(mpsc::Receiver<I>, mpsc::Sender<O>) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = ()> + Send + 'static,
  {
    if TypeId::of::<I>() == TypeId::of::<O>() {
      return Err(BuildError::CodecSameType {
        element: type_name::<I>(),
      });
    }
    let key = (TypeId::of::<I>(), TypeId::of::<O>());
    if self.codecs.contains_key(&key) {
      return Err(BuildError::DuplicateCodec {
        from: type_name::<I>(),
        to: type_name::<O>(),
      });
    }
    self.codecs.insert(
      key,
      CodecEntry {
        inbound: ChannelSupport::of::<I>(),
        prepare: Box::new(move |rx, tx| {
          let rx = *rx
            .downcast::<mpsc::Receiver<I>>()
            .expect("codec input type keyed by registration");
          let tx = *tx
            .downcast::<mpsc::Sender<O>>()
            .expect("codec output type keyed by registration");
          let fut: BoxFuture<'static, ()> = Box::pin(codec(rx, tx));
          Box::new(move |_ctx: CancelToken| fut)
        }),
      },
    );
    Ok(())
  }

  /// Resolves the role of a configuration type; exactly one registry must
  /// contain it.
  pub(crate) fn role_of(
    &self,
    config_type: TypeId,
    config_type_name: &'static str,
    node_id: &str,
  ) -> Result<Role, BuildError> {
    let roles = [
      self.starts.contains_key(&config_type).then_some(Role::Start),
      self.middles.contains_key(&config_type).then_some(Role::Middle),
      self
        .terminals
        .contains_key(&config_type)
        .then_some(Role::Terminal),
    ];
    let mut matched = roles.into_iter().flatten();
    match (matched.next(), matched.next()) {
      (Some(role), None) => Ok(role),
      (None, _) => Err(BuildError::UnregisteredConfig {
        node_id: node_id.to_string(),
        config_type: config_type_name,
      }),
      (Some(_), Some(_)) => Err(BuildError::AmbiguousRole {
        config_type: config_type_name,
      }),
    }
  }

  /// Inbound channel plumbing of a node, by role. Start nodes have none.
  pub(crate) fn inbound_of(&self, config_type: TypeId, role: Role) -> Option<&ChannelSupport> {
    match role {
      Role::Start => None,
      Role::Middle => self.middles.get(&config_type).map(|entry| &entry.inbound),
      Role::Terminal => self.terminals.get(&config_type).map(|entry| &entry.inbound),
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[derive(Clone)]
  struct Cfg;
  impl StageConfig for Cfg {}

  #[test]
  fn duplicate_start_registration_fails() {
    let mut registries = Registries::default();
    registries
      .register_start(|_: Cfg| StartFn::new(|_ctx, _out: mpsc::Sender<i32>| async {}))
      .unwrap();
    let err = registries
      .register_start(|_: Cfg| StartFn::new(|_ctx, _out: mpsc::Sender<i32>| async {}))
      .unwrap_err();
    assert!(matches!(err, BuildError::DuplicateRegistration { .. }));
  }

  #[test]
  fn codec_with_equal_types_fails() {
    let mut registries = Registries::default();
    let err = registries
      .register_codec(|_rx: mpsc::Receiver<i32>, _tx: mpsc::Sender<i32>| async {})
      .unwrap_err();
    assert!(matches!(err, BuildError::CodecSameType { .. }));
  }

  #[test]
  fn duplicate_codec_registration_fails() {
    let mut registries = Registries::default();
    registries
      .register_codec(|mut rx: mpsc::Receiver<i32>, tx: mpsc::Sender<String>| async move {
        while let Some(n) = rx.recv().await {
          if tx.send(n.to_string()).await.is_err() {
            break;
          }
        }
      })
      .unwrap();
    let err = registries
      .register_codec(|_rx: mpsc::Receiver<i32>, _tx: mpsc::Sender<String>| async {})
      .unwrap_err();
    assert!(matches!(err, BuildError::DuplicateCodec { .. }));
  }

  #[test]
  fn role_resolution_requires_exactly_one_match() {
    let mut registries = Registries::default();
    let err = registries
      .role_of(TypeId::of::<Cfg>(), type_name::<Cfg>(), "n")
      .unwrap_err();
    assert!(matches!(err, BuildError::UnregisteredConfig { .. }));

    registries
      .register_start(|_: Cfg| StartFn::new(|_ctx, _out: mpsc::Sender<i32>| async {}))
      .unwrap();
    assert_eq!(
      registries
        .role_of(TypeId::of::<Cfg>(), type_name::<Cfg>(), "n")
        .unwrap(),
      Role::Start
    );

    registries
      .register_terminal(|_: Cfg| TerminalFn::new(|_rx: mpsc::Receiver<i32>| async {}))
      .unwrap();
    let err = registries
      .role_of(TypeId::of::<Cfg>(), type_name::<Cfg>(), "n")
      .unwrap_err();
    assert!(matches!(err, BuildError::AmbiguousRole { .. }));
  }
}
