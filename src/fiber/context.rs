use std::cell::RefCell;
use std::rc::Rc;
use std::sync::Arc;

use crate::bundle::BundleCore;
use crate::bundle::BundleId;
use crate::callback::Callback;
use crate::fiber::FiberBody;
use crate::fiber::FiberName;
use crate::fiber::Receive;
use crate::fiber::receive::ReceiveOnce;
use crate::fiber::receive::WaitForever;
use crate::fiber::receive::YieldAlive;
use crate::mailbox::Envelope;
use crate::space::SpaceCommand;
use crate::term::Term;

// -----------------------------------------------------------------------------
// Fiber Context
// -----------------------------------------------------------------------------

/// Capability handed to a fiber body.
///
/// The context identifies the running fiber and gives it message passing,
/// spawning, PID minting, and cooperative yielding. It is bound to the
/// owning bundle's worker thread and never crosses threads; sending to a
/// fiber on another bundle transparently relays through the coordinator.
#[derive(Clone)]
pub struct FiberContext {
  pub(crate) name: FiberName,
  pub(crate) core: Rc<RefCell<BundleCore>>,
}

impl FiberContext {
  // ---------------------------------------------------------------------------
  // Identity
  // ---------------------------------------------------------------------------

  /// Returns the name of this fiber.
  #[inline]
  pub fn name(&self) -> &str {
    &self.name
  }

  /// Returns the identifier of the bundle owning this fiber.
  #[inline]
  pub fn bundle(&self) -> BundleId {
    self.core.borrow().bundle_id()
  }

  /// Mints a globally-unique identifier.
  ///
  /// Uniqueness needs no coordination: bundle identifiers are unique in the
  /// space and each bundle keeps a monotonic local counter.
  #[inline]
  pub fn new_pid(&self) -> String {
    self.core.borrow_mut().new_pid()
  }

  // ---------------------------------------------------------------------------
  // Messaging
  // ---------------------------------------------------------------------------

  /// Sends a message to the named fiber.
  ///
  /// The sender is this fiber. Delivery is asynchronous and fire-and-forget:
  /// a local receiver is appended to directly, a remote one is relayed
  /// through the coordinator. Messages from this fiber to any one receiver
  /// arrive in send order; no order holds across distinct senders.
  pub fn send(&self, receiver: &str, kind: &str, content: impl Into<Term>) {
    let envelope: Envelope = Envelope::new(
      Arc::clone(&self.name),
      Arc::from(kind),
      content.into(),
    );

    self.core.borrow_mut().send(Arc::from(receiver), envelope);
  }

  /// Receives at most `opts.batch` matching messages, suspending until at
  /// least one is available.
  ///
  /// Messages rejected by the whitelists stay in the mailbox in arrival
  /// order, where an enclosing receive may still match them.
  pub async fn receive(&self, opts: Receive) -> Vec<Envelope> {
    ReceiveOnce::new(self, opts).await
  }

  /// Receives the next message of any type from any sender.
  pub async fn recv(&self) -> Envelope {
    loop {
      if let Some(envelope) = self.receive(Receive::new()).await.pop() {
        return envelope;
      }
    }
  }

  /// Receives matching messages forever, yielding to co-bundled fibers
  /// between batches.
  ///
  /// The handler may itself send, receive, or yield. This call never
  /// returns; the fiber terminates only if the enclosing body does.
  pub async fn receive_forever<F>(&self, opts: Receive, mut handler: F)
  where
    F: AsyncFnMut(Envelope),
  {
    loop {
      let batch: Vec<Envelope> = self.receive(opts.clone()).await;

      for envelope in batch {
        handler(envelope).await;
      }

      self.yield_alive().await;
    }
  }

  // ---------------------------------------------------------------------------
  // Yielding
  // ---------------------------------------------------------------------------

  /// Yields to the scheduler while staying ready.
  ///
  /// Long CPU-bound computations call this to share the bundle with
  /// co-located fibers; the scheduler resumes the fiber on its next pass.
  pub async fn yield_alive(&self) {
    YieldAlive::new(self).await
  }

  /// Parks this fiber permanently.
  ///
  /// The fiber leaves the ready set and is never resumed to completion;
  /// it keeps its name and mailbox alive without consuming CPU.
  pub async fn wait_forever(&self) {
    WaitForever::new(self).await
  }

  // ---------------------------------------------------------------------------
  // Spawning
  // ---------------------------------------------------------------------------

  /// Spawns a fiber, placed on a bundle chosen round-robin by the
  /// coordinator.
  ///
  /// The new fiber's body runs when its first message arrives.
  pub fn spawn_fiber(&self, name: &str, body: impl FiberBody, args: impl Into<Term>) {
    self.core.borrow().post(SpaceCommand::SpawnFiber {
      name: Arc::from(name),
      body: Box::new(body),
      args: args.into(),
    });
  }

  /// Spawns a fiber on an explicit bundle, for co-location.
  pub fn spawn_fiber_in(
    &self,
    name: &str,
    body: impl FiberBody,
    bundle: BundleId,
    args: impl Into<Term>,
  ) {
    self.core.borrow().post(SpaceCommand::SpawnFiberIn {
      name: Arc::from(name),
      body: Box::new(body),
      args: args.into(),
      bundle,
    });
  }

  // ---------------------------------------------------------------------------
  // Host Bridging
  // ---------------------------------------------------------------------------

  /// Creates a host-thread function that posts messages to `receiver`.
  ///
  /// The returned value is `Send + Sync` and may be invoked from any
  /// thread; each invocation delivers `(sender = name, type = "callback",
  /// content = args)` through the ordinary relay path.
  pub fn create_callback(&self, name: &str, receiver: &str) -> Callback {
    Callback::new(
      self.core.borrow().space().clone(),
      Arc::from(name),
      Arc::from(receiver),
    )
  }
}
