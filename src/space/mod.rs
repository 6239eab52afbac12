use std::ops::ControlFlow;
use std::sync::Arc;
use std::thread;
use std::thread::JoinHandle;

use hashbrown::HashMap;

use crate::bundle;
use crate::bundle::Bundle;
use crate::bundle::BundleCommand;
use crate::bundle::BundleHandle;
use crate::bundle::BundleId;
use crate::consts;
use crate::fiber::FiberBody;
use crate::fiber::FiberName;
use crate::mailbox::Envelope;
use crate::system::System;
use crate::term::Term;
use crate::universe::Bootstrap;

mod command;

pub(crate) use self::command::SpaceCommand;
pub(crate) use self::command::SpaceHandle;
pub(crate) use self::command::SpaceInbox;
pub(crate) use self::command::channel;

// -----------------------------------------------------------------------------
// Bundle Link
// -----------------------------------------------------------------------------

/// Coordinator-side record of one worker thread.
#[derive(Debug)]
struct BundleLink {
  handle: BundleHandle,
  thread: JoinHandle<()>,
}

// -----------------------------------------------------------------------------
// Bundle Space
// -----------------------------------------------------------------------------

/// The coordinator: global routing and placement state for all bundles.
///
/// Lives on a dedicated thread whose event loop is always running. The
/// placement map and bundle registry are read and written only here; every
/// caller, the external facade included, reaches the coordinator by
/// asynchronous post.
pub(crate) struct BundleSpace {
  bundles: HashMap<BundleId, BundleLink>,
  fibers: HashMap<FiberName, BundleId>,
  order: Vec<BundleId>,
  cursor: usize,
  next_bundle_id: u32,
  bootstrap: Option<Bootstrap>,
  handle: SpaceHandle,
}

impl BundleSpace {
  pub(crate) fn new(bootstrap: Option<Bootstrap>, handle: SpaceHandle) -> Self {
    Self {
      bundles: HashMap::with_capacity(consts::CAP_SPACE_BUNDLES),
      fibers: HashMap::with_capacity(consts::CAP_SPACE_FIBERS),
      order: Vec::with_capacity(consts::CAP_SPACE_BUNDLES),
      cursor: 0,
      next_bundle_id: 0,
      bootstrap,
      handle,
    }
  }

  /// The coordinator event loop.
  ///
  /// Returns after a `Shutdown` command or once every command sender is
  /// gone, tearing down all worker threads either way.
  pub(crate) fn run(mut self, mut inbox: SpaceInbox) {
    while let Some(command) = inbox.blocking_recv() {
      tracing::trace!(target: "weft", ?command, "space command");

      if self.handle(command).is_break() {
        break;
      }
    }

    self.shutdown();
  }

  fn handle(&mut self, command: SpaceCommand) -> ControlFlow<()> {
    match command {
      SpaceCommand::SpawnBundles { count } => {
        for _ in 0..count {
          self.spawn_bundle();
        }
      }
      SpaceCommand::Inflate { fallback } => {
        let count: usize = System::available_cpus(fallback);

        for _ in 0..count {
          self.spawn_bundle();
        }
      }
      SpaceCommand::SpawnFiber { name, body, args } => {
        let target: Option<BundleId> = self.next_bundle();
        self.place_fiber(name, body, args, target);
      }
      SpaceCommand::SpawnFiberIn {
        name,
        body,
        args,
        bundle,
      } => {
        self.place_fiber(name, body, args, Some(bundle));
      }
      SpaceCommand::Relay { receiver, envelope } => {
        self.relay(receiver, envelope);
      }
      SpaceCommand::Shutdown => return ControlFlow::Break(()),
    }

    ControlFlow::Continue(())
  }

  // ---------------------------------------------------------------------------
  // Bundle Spawning
  // ---------------------------------------------------------------------------

  /// Creates a worker thread hosting a fresh bundle and registers it.
  ///
  /// The worker runs the bootstrap callback once, then enters its
  /// scheduler; it exits when the coordinator drops its command handle.
  fn spawn_bundle(&mut self) {
    let bundle_id: BundleId = BundleId::new(self.next_bundle_id);
    let (handle, inbox) = bundle::channel();
    let space: SpaceHandle = self.handle.clone();
    let bootstrap: Option<Bootstrap> = self.bootstrap.clone();

    let spawned = thread::Builder::new()
      .name(format!("weft-bundle-{bundle_id}"))
      .spawn(move || {
        if let Some(bootstrap) = bootstrap {
          bootstrap(bundle_id);
        }

        let mut bundle: Bundle = Bundle::new(bundle_id, space, inbox);

        bundle.run();
      });

    match spawned {
      Ok(thread) => {
        self.next_bundle_id += 1;
        self.order.push(bundle_id);
        self.bundles.insert(bundle_id, BundleLink { handle, thread });

        tracing::debug!(target: "weft", bundle = %bundle_id, "bundle spawned");
      }
      Err(error) => {
        tracing::error!(target: "weft", %error, "failed to spawn bundle thread");
      }
    }
  }

  /// Advances the round-robin cursor over live bundles.
  fn next_bundle(&mut self) -> Option<BundleId> {
    if self.order.is_empty() {
      return None;
    }

    let picked: BundleId = self.order[self.cursor % self.order.len()];
    self.cursor = (self.cursor + 1) % self.order.len();

    Some(picked)
  }

  // ---------------------------------------------------------------------------
  // Fiber Placement & Routing
  // ---------------------------------------------------------------------------

  /// Records the fiber's placement, then posts the spawn to its bundle.
  ///
  /// The placement is recorded first so that relays posted right after the
  /// spawn already route; channel FIFO makes the spawn arrive ahead of them.
  fn place_fiber(
    &mut self,
    name: FiberName,
    body: Box<dyn FiberBody>,
    args: Term,
    target: Option<BundleId>,
  ) {
    let Some(bundle_id) = target else {
      tracing::error!(target: "weft", fiber = %name, "fiber spawn with no bundles available");
      return;
    };

    let Some(link) = self.bundles.get(&bundle_id) else {
      tracing::error!(
        target: "weft",
        fiber = %name,
        bundle = %bundle_id,
        "fiber spawn targets unknown bundle",
      );
      return;
    };

    if let Some(previous) = self.fibers.insert(Arc::clone(&name), bundle_id) {
      tracing::warn!(
        target: "weft",
        fiber = %name,
        previous = %previous,
        "fiber name reused; placement replaced",
      );
    }

    link.handle.post(BundleCommand::SpawnFiber { name, body, args });
  }

  /// Routes a message to the bundle owning `receiver`.
  ///
  /// A message for an unknown receiver is dropped.
  fn relay(&mut self, receiver: FiberName, envelope: Envelope) {
    let Some(bundle_id) = self.fibers.get(&receiver) else {
      tracing::debug!(target: "weft", receiver = %receiver, "relay for unknown receiver dropped");
      return;
    };

    let Some(link) = self.bundles.get(bundle_id) else {
      tracing::error!(
        target: "weft",
        receiver = %receiver,
        bundle = %bundle_id,
        "receiver placed on unknown bundle",
      );
      return;
    };

    link.handle.post(BundleCommand::Relayed { receiver, envelope });
  }

  // ---------------------------------------------------------------------------
  // Teardown
  // ---------------------------------------------------------------------------

  /// Closes every bundle's command channel and joins its worker thread.
  fn shutdown(&mut self) {
    tracing::debug!(target: "weft", bundles = self.bundles.len(), "space shutting down");

    for (bundle_id, link) in self.bundles.drain() {
      let BundleLink { handle, thread } = link;

      drop(handle);

      if thread.join().is_err() {
        tracing::error!(target: "weft", bundle = %bundle_id, "bundle thread panicked");
      }
    }

    self.fibers.clear();
    self.order.clear();
  }
}

// -----------------------------------------------------------------------------
// Tests
// -----------------------------------------------------------------------------
