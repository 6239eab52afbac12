//! End-to-end scenarios driving a live bundle space.
//!
//! Fiber bodies observe back to the test thread through captured
//! `std::sync::mpsc` senders; host-side kicks go through callbacks.

use std::collections::HashSet;
use std::sync::mpsc;
use std::sync::mpsc::Receiver;
use std::sync::mpsc::Sender;
use std::time::Duration;

use tracing_subscriber::EnvFilter;

use weft::BundleId;
use weft::Envelope;
use weft::FiberContext;
use weft::Receive;
use weft::Term;
use weft::Universe;

const WAIT: Duration = Duration::from_secs(5);
const SETTLE: Duration = Duration::from_millis(300);

fn init_tracing() {
  let _ = tracing_subscriber::fmt()
    .with_env_filter(EnvFilter::from_default_env())
    .try_init();
}

// -----------------------------------------------------------------------------
// S1 - Single-Bundle Ping-Pong
// -----------------------------------------------------------------------------

#[test]
fn test_single_bundle_ping_pong() {
  init_tracing();

  let universe: Universe = Universe::new().expect("coordinator spawned");
  let (tx, rx): (Sender<Envelope>, Receiver<Envelope>) = mpsc::channel();

  universe.spawn_bundles(1);

  universe.spawn_fiber(
    "a",
    move |ctx: FiberContext, _args: Term| async move {
      ctx.receive(Receive::new().kind("callback")).await;
      ctx.send("b", "ping", "1");

      for envelope in ctx.receive(Receive::new().kind("pong")).await {
        tx.send(envelope).ok();
      }
    },
    Term::Nil,
  );

  universe.spawn_fiber(
    "b",
    |ctx: FiberContext, _args: Term| async move {
      ctx
        .receive_forever(Receive::new().kind("ping"), async |envelope: Envelope| {
          ctx.send(&envelope.sender, "pong", envelope.content);
        })
        .await;
    },
    Term::Nil,
  );

  universe.callback("host", "a").call(Term::Nil);

  let observed: Envelope = rx.recv_timeout(WAIT).expect("pong observed");

  assert_eq!(&*observed.sender, "b");
  assert_eq!(&*observed.kind, "pong");
  assert_eq!(observed.content, Term::from("1"));
}

// -----------------------------------------------------------------------------
// S2 - Cross-Bundle Routing
// -----------------------------------------------------------------------------

#[test]
fn test_cross_bundle_routing() {
  init_tracing();

  let universe: Universe = Universe::new().expect("coordinator spawned");
  let (tx, rx): (Sender<Envelope>, Receiver<Envelope>) = mpsc::channel();

  universe.spawn_bundles(2);

  universe.spawn_fiber_in(
    "q",
    move |ctx: FiberContext, _args: Term| async move {
      for envelope in ctx.receive(Receive::new().kind("x")).await {
        tx.send(envelope).ok();
      }

      ctx.wait_forever().await;
    },
    BundleId::new(1),
    Term::Nil,
  );

  universe.spawn_fiber_in(
    "p",
    |ctx: FiberContext, _args: Term| async move {
      ctx.receive(Receive::new().kind("callback")).await;
      ctx.send("q", "x", "hello");
    },
    BundleId::new(0),
    Term::Nil,
  );

  universe.callback("host", "p").call(Term::Nil);

  let observed: Envelope = rx.recv_timeout(WAIT).expect("relayed message observed");

  assert_eq!(&*observed.sender, "p");
  assert!(observed.is("x"));
  assert_eq!(observed.content, Term::from("hello"));

  // exactly one message crossed
  assert!(rx.recv_timeout(SETTLE).is_err());
}

// -----------------------------------------------------------------------------
// S3 - Selective Receive With Nesting
// -----------------------------------------------------------------------------

#[test]
fn test_selective_receive_preserves_unmatched_order() {
  init_tracing();

  let universe: Universe = Universe::new().expect("coordinator spawned");
  let (tx, rx): (Sender<(String, i64)>, Receiver<(String, i64)>) = mpsc::channel();

  universe.spawn_bundles(1);

  universe.spawn_fiber(
    "selective",
    move |ctx: FiberContext, _args: Term| async move {
      ctx.receive(Receive::new().kind("callback")).await;

      ctx.send("selective", "log", 1);
      ctx.send("selective", "reply", 2);
      ctx.send("selective", "log", 3);
      ctx.send("selective", "reply", 4);

      // the inner receive consumes replies only
      for envelope in ctx.receive(Receive::new().kind("reply").batch(2)).await {
        tx.send((envelope.kind.to_string(), envelope.content.as_int().unwrap_or(-1))).ok();
      }

      // the enclosing receive sees the skipped logs in arrival order
      for envelope in ctx.receive(Receive::new().batch(2)).await {
        tx.send((envelope.kind.to_string(), envelope.content.as_int().unwrap_or(-1))).ok();
      }
    },
    Term::Nil,
  );

  universe.callback("host", "selective").call(Term::Nil);

  let mut observed: Vec<(String, i64)> = Vec::new();

  for _ in 0..4 {
    observed.push(rx.recv_timeout(WAIT).expect("message observed"));
  }

  let expected: Vec<(String, i64)> = vec![
    (String::from("reply"), 2),
    (String::from("reply"), 4),
    (String::from("log"), 1),
    (String::from("log"), 3),
  ];

  assert_eq!(observed, expected);
}

// -----------------------------------------------------------------------------
// S4 - Batching
// -----------------------------------------------------------------------------

#[test]
fn test_batched_receive() {
  init_tracing();

  let universe: Universe = Universe::new().expect("coordinator spawned");
  let (tx, rx): (Sender<Vec<i64>>, Receiver<Vec<i64>>) = mpsc::channel();

  universe.spawn_bundles(1);

  universe.spawn_fiber(
    "batcher",
    move |ctx: FiberContext, _args: Term| async move {
      ctx.receive(Receive::new().kind("callback")).await;

      for value in 1..=5 {
        ctx.send("batcher", "t", value);
      }

      let opts: Receive = Receive::new().kind("t").sender("batcher").batch(3);
      let first: Vec<i64> = ctx
        .receive(opts.clone())
        .await
        .iter()
        .filter_map(|envelope| envelope.content.as_int())
        .collect();

      tx.send(first).ok();

      let rest: Vec<i64> = ctx
        .receive(opts.batch(5))
        .await
        .iter()
        .filter_map(|envelope| envelope.content.as_int())
        .collect();

      tx.send(rest).ok();
    },
    Term::Nil,
  );

  universe.callback("host", "batcher").call(Term::Nil);

  assert_eq!(rx.recv_timeout(WAIT).expect("first batch"), [1, 2, 3]);
  assert_eq!(rx.recv_timeout(WAIT).expect("second batch"), [4, 5]);
}

// -----------------------------------------------------------------------------
// S5 - Inflate & Parallel Map
// -----------------------------------------------------------------------------

#[test]
fn test_inflate_and_parallel_map() {
  init_tracing();

  const TASKS: usize = 48;

  let universe: Universe = Universe::new().expect("coordinator spawned");
  let (tx, rx): (Sender<Vec<i64>>, Receiver<Vec<i64>>) = mpsc::channel();

  universe.inflate();

  universe.spawn_fiber(
    "gather",
    move |ctx: FiberContext, _args: Term| async move {
      ctx.receive(Receive::new().kind("callback")).await;

      for index in 0..TASKS {
        let worker: String = format!("worker-{index}");

        ctx.spawn_fiber(
          &worker,
          |ctx: FiberContext, args: Term| async move {
            for envelope in ctx.receive(Receive::new().kind("task")).await {
              let index: i64 = args.as_int().unwrap_or(0);
              let input: i64 = envelope.content.as_int().unwrap_or(0);

              ctx.send(
                &envelope.sender,
                "result",
                vec![Term::Int(index), Term::Int(input * input)],
              );
            }
          },
          Term::Int(index as i64),
        );

        ctx.send(&worker, "task", index as i64);
      }

      // results are assembled by index, whatever order they arrive in
      let mut results: Vec<i64> = vec![0; TASKS];
      let mut seen: usize = 0;

      while seen < TASKS {
        for envelope in ctx.receive(Receive::new().kind("result").batch(8)).await {
          if let Some([Term::Int(index), Term::Int(value)]) = envelope.content.as_list() {
            results[*index as usize] = *value;
            seen += 1;
          }
        }
      }

      tx.send(results).ok();
    },
    Term::Nil,
  );

  universe.callback("host", "gather").call(Term::Nil);

  let results: Vec<i64> = rx.recv_timeout(WAIT).expect("all results gathered");

  for (index, value) in results.iter().enumerate() {
    assert_eq!(*value, (index * index) as i64);
  }
}

// -----------------------------------------------------------------------------
// S6 - Wait Forever
// -----------------------------------------------------------------------------

#[test]
fn test_wait_forever_parks_without_rerunning() {
  init_tracing();

  let universe: Universe = Universe::new().expect("coordinator spawned");
  let (tx, rx): (Sender<&str>, Receiver<&str>) = mpsc::channel();
  let (echo_tx, echo_rx): (Sender<&str>, Receiver<&str>) = mpsc::channel();

  universe.spawn_bundles(1);

  universe.spawn_fiber(
    "sleeper",
    move |ctx: FiberContext, _args: Term| async move {
      tx.send("alive").ok();
      ctx.wait_forever().await;
      tx.send("unreachable").ok();
    },
    Term::Nil,
  );

  universe.callback("host", "sleeper").call(Term::Nil);

  assert_eq!(rx.recv_timeout(WAIT), Ok("alive"));

  // a further delivery parks it again without resuming the body
  universe.callback("host", "sleeper").call(Term::Nil);

  assert!(rx.recv_timeout(SETTLE).is_err());

  // the bundle stays responsive for co-located fibers
  universe.spawn_fiber(
    "echo",
    move |_ctx: FiberContext, _args: Term| async move {
      echo_tx.send("echoed").ok();
    },
    Term::Nil,
  );

  universe.callback("host", "echo").call(Term::Nil);

  assert_eq!(echo_rx.recv_timeout(WAIT), Ok("echoed"));
  assert!(rx.try_recv().is_err());
}

// -----------------------------------------------------------------------------
// FIFO Per Sender-Receiver Pair
// -----------------------------------------------------------------------------

#[test]
fn test_fifo_across_the_relay() {
  init_tracing();

  const COUNT: i64 = 20;

  let universe: Universe = Universe::new().expect("coordinator spawned");
  let (tx, rx): (Sender<i64>, Receiver<i64>) = mpsc::channel();

  universe.spawn_bundles(2);

  universe.spawn_fiber_in(
    "sink",
    move |ctx: FiberContext, _args: Term| async move {
      ctx
        .receive_forever(Receive::new().kind("n"), async |envelope: Envelope| {
          tx.send(envelope.content.as_int().unwrap_or(-1)).ok();
        })
        .await;
    },
    BundleId::new(1),
    Term::Nil,
  );

  universe.spawn_fiber_in(
    "source",
    |ctx: FiberContext, _args: Term| async move {
      ctx.receive(Receive::new().kind("callback")).await;

      for value in 0..COUNT {
        ctx.send("sink", "n", value);
      }
    },
    BundleId::new(0),
    Term::Nil,
  );

  universe.callback("host", "source").call(Term::Nil);

  for expected in 0..COUNT {
    assert_eq!(rx.recv_timeout(WAIT), Ok(expected));
  }
}

// -----------------------------------------------------------------------------
// Co-Location
// -----------------------------------------------------------------------------

#[test]
fn test_spawn_fiber_in_reports_owning_bundle() {
  init_tracing();

  let universe: Universe = Universe::new().expect("coordinator spawned");
  let (tx, rx): (Sender<BundleId>, Receiver<BundleId>) = mpsc::channel();

  universe.spawn_bundles(2);

  for name in ["co-a", "co-b"] {
    let tx: Sender<BundleId> = tx.clone();

    universe.spawn_fiber_in(
      name,
      move |ctx: FiberContext, _args: Term| async move {
        tx.send(ctx.bundle()).ok();
      },
      BundleId::new(1),
      Term::Nil,
    );

    universe.callback("host", name).call(Term::Nil);
  }

  for _ in 0..2 {
    assert_eq!(rx.recv_timeout(WAIT), Ok(BundleId::new(1)));
  }
}

// -----------------------------------------------------------------------------
// Inflate With An Explicit Fallback
// -----------------------------------------------------------------------------

#[test]
fn test_inflate_with_explicit_fallback() {
  init_tracing();

  let universe: Universe = Universe::new().expect("coordinator spawned");
  let (tx, rx): (Sender<Term>, Receiver<Term>) = mpsc::channel();

  universe.inflate_with(2);

  universe.spawn_fiber(
    "probe",
    move |ctx: FiberContext, _args: Term| async move {
      let envelope: Envelope = ctx.recv().await;

      tx.send(envelope.content).ok();
    },
    Term::Nil,
  );

  universe.callback("host", "probe").call(7);

  assert_eq!(rx.recv_timeout(WAIT), Ok(Term::Int(7)));
}

// -----------------------------------------------------------------------------
// PID Uniqueness
// -----------------------------------------------------------------------------

#[test]
fn test_pid_uniqueness_across_bundles() {
  init_tracing();

  let universe: Universe = Universe::new().expect("coordinator spawned");
  let (tx, rx): (Sender<String>, Receiver<String>) = mpsc::channel();

  universe.spawn_bundles(2);

  for (name, bundle) in [("minter-0", 0), ("minter-1", 1)] {
    let tx: Sender<String> = tx.clone();

    universe.spawn_fiber_in(
      name,
      move |ctx: FiberContext, _args: Term| async move {
        for _ in 0..3 {
          tx.send(ctx.new_pid()).ok();
        }
      },
      BundleId::new(bundle),
      Term::Nil,
    );

    universe.callback("host", name).call(Term::Nil);
  }

  let mut minted: HashSet<String> = HashSet::new();

  for _ in 0..6 {
    let pid: String = rx.recv_timeout(WAIT).expect("pid observed");

    assert!(pid.contains('_'));
    assert!(minted.insert(pid), "pid minted twice");
  }
}

// -----------------------------------------------------------------------------
// Callbacks
// -----------------------------------------------------------------------------

#[test]
fn test_callback_synthetic_sender_and_kind() {
  init_tracing();

  let universe: Universe = Universe::new().expect("coordinator spawned");
  let (tx, rx): (Sender<Envelope>, Receiver<Envelope>) = mpsc::channel();

  universe.spawn_bundles(1);

  universe.spawn_fiber(
    "bridge",
    move |ctx: FiberContext, _args: Term| async move {
      tx.send(ctx.recv().await).ok();
    },
    Term::Nil,
  );

  universe
    .callback("ticker", "bridge")
    .call(vec![Term::Int(1), Term::from("tick")]);

  let observed: Envelope = rx.recv_timeout(WAIT).expect("callback delivered");

  assert_eq!(&*observed.sender, "ticker");
  assert_eq!(&*observed.kind, "callback");
  assert_eq!(
    observed.content,
    Term::List(vec![Term::Int(1), Term::from("tick")]),
  );
}

// -----------------------------------------------------------------------------
// Nested Receive Inside A Receive Loop
// -----------------------------------------------------------------------------

#[test]
fn test_nested_receive_inside_forever_loop() {
  init_tracing();

  let universe: Universe = Universe::new().expect("coordinator spawned");
  let (tx, rx): (Sender<i64>, Receiver<i64>) = mpsc::channel();

  universe.spawn_bundles(1);

  universe.spawn_fiber(
    "server",
    |ctx: FiberContext, _args: Term| async move {
      ctx
        .receive_forever(Receive::new().kind("req"), async |envelope: Envelope| {
          // the payload arrives as a separate message; receive it nested
          let mut payload: Vec<Envelope> = ctx.receive(Receive::new().kind("payload")).await;

          if let Some(inner) = payload.pop() {
            ctx.send(&envelope.sender, "done", inner.content);
          }
        })
        .await;
    },
    Term::Nil,
  );

  universe.spawn_fiber(
    "client",
    move |ctx: FiberContext, _args: Term| async move {
      ctx.receive(Receive::new().kind("callback")).await;
      ctx.send("server", "req", Term::Nil);
      ctx.send("server", "payload", 42);

      for envelope in ctx.receive(Receive::new().kind("done")).await {
        tx.send(envelope.content.as_int().unwrap_or(-1)).ok();
      }
    },
    Term::Nil,
  );

  universe.callback("host", "client").call(Term::Nil);

  assert_eq!(rx.recv_timeout(WAIT), Ok(42));
}
