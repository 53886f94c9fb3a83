//! Builder option and assembly tests: channel capacity, automatic codec
//! insertion, excluded fields, and schema-level id failures.

use crate::{
  BuildError, Builder, CancelToken, Connector, GraphConfig, Instance, MiddleFn, Schema,
  StageConfig, StartFn, TerminalFn,
};
use std::collections::HashSet;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::timeout;

const TIMEOUT: Duration = Duration::from_secs(1);

#[tokio::test]
async fn channel_capacity_detaches_start_from_slow_terminal() {
  #[derive(Clone)]
  struct EmitterCfg {
    instance: Instance,
    done: mpsc::Sender<()>,
  }

  impl StageConfig for EmitterCfg {
    fn instance(&self) -> Option<&str> {
      self.instance.get()
    }
  }

  #[derive(Clone)]
  struct BlackHoleCfg {
    instance: Instance,
  }

  impl StageConfig for BlackHoleCfg {
    fn instance(&self) -> Option<&str> {
      self.instance.get()
    }
  }

  struct Config {
    start: EmitterCfg,
    end: BlackHoleCfg,
    connector: Connector,
  }

  impl GraphConfig for Config {
    fn visit<'a>(&'a self, schema: &mut Schema<'a>) {
      schema.node("start", &self.start);
      schema.node("end", &self.end);
      schema.connector(&self.connector);
    }
  }

  let mut b = Builder::new().with_channel_capacity(2);
  b.register_start(|cfg: EmitterCfg| {
    StartFn::new(move |_ctx, out: mpsc::Sender<i32>| async move {
      out.send(1).await.unwrap();
      out.send(2).await.unwrap();
      let _ = cfg.done.send(()).await;
    })
  })
  .unwrap();
  // Never reads; the emitter must still finish thanks to the buffer.
  b.register_terminal(|_cfg: BlackHoleCfg| {
    TerminalFn::new(|rx: mpsc::Receiver<i32>| async move {
      let _rx = rx;
      std::future::pending::<()>().await
    })
  })
  .unwrap();

  let (done_tx, mut done_rx) = mpsc::channel(1);
  let graph = b
    .build(&Config {
      start: EmitterCfg {
        instance: Instance::new("1"),
        done: done_tx,
      },
      end: BlackHoleCfg {
        instance: Instance::new("2"),
      },
      connector: Connector::from([("1".to_string(), vec!["2".to_string()])]),
    })
    .unwrap();

  let _run = tokio::spawn(graph.run(CancelToken::new()));

  timeout(TIMEOUT, done_rx.recv())
    .await
    .expect("the start must complete without the terminal reading")
    .unwrap();
}

#[tokio::test]
async fn codecs_bridge_type_mismatched_edges() {
  #[derive(Clone)]
  struct StCfg;
  impl StageConfig for StCfg {}

  #[derive(Clone)]
  struct MidCfg;
  impl StageConfig for MidCfg {}

  #[derive(Clone)]
  struct TermCfg {
    dst: Arc<Mutex<Vec<String>>>,
  }
  impl StageConfig for TermCfg {}

  struct Config {
    st: StCfg,
    mid: MidCfg,
    term: TermCfg,
    connector: Connector,
  }

  impl GraphConfig for Config {
    fn visit<'a>(&'a self, schema: &mut Schema<'a>) {
      schema.node("st", &self.st).id("st");
      schema.node("mid", &self.mid).id("mid");
      schema.node("term", &self.term).id("term");
      schema.connector(&self.connector);
    }
  }

  let mut b = Builder::new();
  b.register_codec(|mut rx: mpsc::Receiver<String>, out: mpsc::Sender<i32>| async move {
    while let Some(s) = rx.recv().await {
      let n = s.parse::<i32>().expect("codec input must be numeric");
      if out.send(n).await.is_err() {
        return;
      }
    }
  })
  .unwrap();
  b.register_codec(|mut rx: mpsc::Receiver<i32>, out: mpsc::Sender<String>| async move {
    while let Some(n) = rx.recv().await {
      if out.send(n.to_string()).await.is_err() {
        return;
      }
    }
  })
  .unwrap();
  b.register_start(|_: StCfg| {
    StartFn::new(|_ctx, out: mpsc::Sender<String>| async move {
      for s in ["1", "2", "3"] {
        if out.send(s.to_string()).await.is_err() {
          return;
        }
      }
    })
  })
  .unwrap();
  b.register_middle(|_: MidCfg| {
    MiddleFn::new(|mut rx: mpsc::Receiver<i32>, out: mpsc::Sender<i32>| async move {
      while let Some(n) = rx.recv().await {
        if out.send(n * 2).await.is_err() {
          return;
        }
      }
    })
  })
  .unwrap();
  b.register_terminal(|cfg: TermCfg| {
    TerminalFn::new(move |mut rx: mpsc::Receiver<String>| async move {
      while let Some(s) = rx.recv().await {
        cfg.dst.lock().unwrap().push(s);
      }
    })
  })
  .unwrap();

  let collected = Arc::new(Mutex::new(Vec::new()));
  let graph = b
    .build(&Config {
      st: StCfg,
      mid: MidCfg,
      term: TermCfg {
        dst: collected.clone(),
      },
      connector: Connector::from([
        ("st".to_string(), vec!["mid".to_string()]),
        ("mid".to_string(), vec!["term".to_string()]),
      ]),
    })
    .unwrap();

  timeout(Duration::from_secs(5), graph.run(CancelToken::new()))
    .await
    .expect("graph should complete");

  assert_eq!(*collected.lock().unwrap(), vec!["2", "4", "6"]);
}

#[tokio::test]
async fn excluded_fields_are_invisible() {
  #[derive(Clone)]
  struct ExtraCfg(#[allow(dead_code)] u32);
  impl StageConfig for ExtraCfg {}

  #[derive(Clone)]
  struct CounterCfg {
    from: i32,
    to: i32,
  }
  impl StageConfig for CounterCfg {}

  #[derive(Clone)]
  struct DoublerCfg;
  impl StageConfig for DoublerCfg {}

  #[derive(Clone)]
  struct MapperCfg {
    dst: Arc<Mutex<HashSet<i32>>>,
  }
  impl StageConfig for MapperCfg {}

  struct Config {
    some_extra: ExtraCfg,
    start: CounterCfg,
    middle: DoublerCfg,
    term: MapperCfg,
  }

  impl GraphConfig for Config {
    fn visit<'a>(&'a self, schema: &mut Schema<'a>) {
      // Excluded even though it carries an edge annotation; its config type
      // is not registered anywhere, so discovery would fail otherwise.
      schema.node("some_extra", &self.some_extra).id("-").sends_to("n2");
      schema.node("start", &self.start).id("n1").sends_to("n2");
      schema.node("middle", &self.middle).id("n2").sends_to("n3");
      schema.node("term", &self.term).id("n3");
    }
  }

  let mut b = Builder::new();
  b.register_start(|cfg: CounterCfg| {
    StartFn::new(move |_ctx, out: mpsc::Sender<i32>| async move {
      for i in cfg.from..=cfg.to {
        if out.send(i).await.is_err() {
          return;
        }
      }
    })
  })
  .unwrap();
  b.register_middle(|_: DoublerCfg| {
    MiddleFn::new(|mut rx: mpsc::Receiver<i32>, out: mpsc::Sender<i32>| async move {
      while let Some(n) = rx.recv().await {
        if out.send(n * 2).await.is_err() {
          return;
        }
      }
    })
  })
  .unwrap();
  b.register_terminal(|cfg: MapperCfg| {
    TerminalFn::new(move |mut rx: mpsc::Receiver<i32>| async move {
      while let Some(n) = rx.recv().await {
        cfg.dst.lock().unwrap().insert(n);
      }
    })
  })
  .unwrap();

  let map = Arc::new(Mutex::new(HashSet::new()));
  let graph = b
    .build(&Config {
      some_extra: ExtraCfg(7),
      start: CounterCfg { from: 1, to: 5 },
      middle: DoublerCfg,
      term: MapperCfg { dst: map.clone() },
    })
    .unwrap();

  timeout(Duration::from_secs(5), graph.run(CancelToken::new()))
    .await
    .expect("graph should complete");

  let expected: HashSet<i32> = [2, 4, 6, 8, 10].into_iter().collect();
  assert_eq!(*map.lock().unwrap(), expected);
}

#[tokio::test]
async fn empty_node_id_fails() {
  #[derive(Clone)]
  struct Cfg {
    instance: Instance,
  }
  impl StageConfig for Cfg {
    fn instance(&self) -> Option<&str> {
      self.instance.get()
    }
  }

  struct Config {
    items: Vec<Cfg>,
  }

  impl GraphConfig for Config {
    fn visit<'a>(&'a self, schema: &mut Schema<'a>) {
      schema.node_list("items", &self.items);
    }
  }

  let mut b = Builder::new();
  b.register_start(|_: Cfg| StartFn::new(|_ctx, _out: mpsc::Sender<i32>| async {}))
    .unwrap();

  // List elements take ids from their instance; an empty one is an error.
  let err = b
    .build(&Config {
      items: vec![Cfg {
        instance: Instance::default(),
      }],
    })
    .unwrap_err();
  assert!(matches!(err, BuildError::EmptyNodeId { field: "items" }), "{err}");
}

#[tokio::test]
async fn duplicate_node_id_fails() {
  #[derive(Clone)]
  struct StartCfg;
  impl StageConfig for StartCfg {}

  #[derive(Clone)]
  struct EndCfg;
  impl StageConfig for EndCfg {}

  struct Config {
    start: StartCfg,
    end: EndCfg,
  }

  impl GraphConfig for Config {
    fn visit<'a>(&'a self, schema: &mut Schema<'a>) {
      schema.node("start", &self.start).id("x").sends_to("x");
      schema.node("end", &self.end).id("x");
    }
  }

  let mut b = Builder::new();
  b.register_start(|_: StartCfg| StartFn::new(|_ctx, _out: mpsc::Sender<i32>| async {}))
    .unwrap();
  b.register_terminal(|_: EndCfg| TerminalFn::new(|_rx: mpsc::Receiver<i32>| async {}))
    .unwrap();

  let err = b
    .build(&Config {
      start: StartCfg,
      end: EndCfg,
    })
    .unwrap_err();
  assert!(matches!(err, BuildError::DuplicateNodeId { .. }), "{err}");
}
