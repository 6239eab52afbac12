use std::any::Any;
use std::cell::RefCell;
use std::fmt::Display;
use std::fmt::Formatter;
use std::fmt::Result as FmtResult;
use std::panic;
use std::panic::AssertUnwindSafe;
use std::rc::Rc;
use std::sync::Arc;
use std::task::Context;
use std::task::Poll;
use std::task::Waker;

use hashbrown::HashMap;
use tokio::sync::mpsc::error::TryRecvError;

use crate::consts;
use crate::fiber::FiberBody;
use crate::fiber::FiberContext;
use crate::fiber::FiberFuture;
use crate::fiber::FiberName;
use crate::fiber::FiberState;
use crate::fiber::Receive;
use crate::mailbox::Envelope;
use crate::mailbox::Mailbox;
use crate::space::SpaceCommand;
use crate::space::SpaceHandle;
use crate::term::Term;

mod command;
mod ready;

pub(crate) use self::command::BundleCommand;
pub(crate) use self::command::BundleHandle;
pub(crate) use self::command::BundleInbox;
pub(crate) use self::command::channel;
pub(crate) use self::ready::ReadySet;

// -----------------------------------------------------------------------------
// Bundle Id
// -----------------------------------------------------------------------------

/// Identifier of a bundle, unique in its bundle space.
///
/// Bundles are numbered from zero in spawn order.
#[derive(Clone, Copy, Debug, Hash, PartialEq, Eq, PartialOrd, Ord)]
#[repr(transparent)]
pub struct BundleId {
  inner: u32,
}

impl BundleId {
  #[inline]
  pub const fn new(id: u32) -> Self {
    Self { inner: id }
  }

  #[inline]
  pub const fn get(self) -> u32 {
    self.inner
  }
}

impl Display for BundleId {
  #[inline]
  fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
    Display::fmt(&self.inner, f)
  }
}

// -----------------------------------------------------------------------------
// Fiber Slot
// -----------------------------------------------------------------------------

/// Bundle-local record of one fiber.
#[derive(Debug)]
struct FiberSlot {
  mailbox: Mailbox,
  state: FiberState,
}

impl FiberSlot {
  #[inline]
  fn new() -> Self {
    Self {
      mailbox: Mailbox::new(),
      state: FiberState::Running,
    }
  }
}

// -----------------------------------------------------------------------------
// Bundle Core
// -----------------------------------------------------------------------------

/// Shared state of one bundle.
///
/// Owned by the bundle's worker thread and shared between the scheduler and
/// the contexts of its fibers. Only that thread ever touches it, so a
/// [`RefCell`] with transient borrows is all the synchronization needed.
pub(crate) struct BundleCore {
  bundle_id: BundleId,
  fibers: HashMap<FiberName, FiberSlot>,
  ready: ReadySet,
  next_local_pid: u64,
  space: SpaceHandle,
}

impl BundleCore {
  fn new(bundle_id: BundleId, space: SpaceHandle) -> Self {
    Self {
      bundle_id,
      fibers: HashMap::with_capacity(consts::CAP_BUNDLE_FIBERS),
      ready: ReadySet::new(),
      next_local_pid: 0,
      space,
    }
  }

  #[inline]
  pub(crate) fn bundle_id(&self) -> BundleId {
    self.bundle_id
  }

  #[inline]
  pub(crate) fn space(&self) -> &SpaceHandle {
    &self.space
  }

  /// Posts a command to the coordinator thread.
  #[inline]
  pub(crate) fn post(&self, command: SpaceCommand) {
    self.space.post(command);
  }

  /// Mints a globally-unique identifier from local state.
  pub(crate) fn new_pid(&mut self) -> String {
    let minted: u64 = self.next_local_pid;
    self.next_local_pid += 1;

    format!("{}_{}", self.bundle_id, minted)
  }

  // ---------------------------------------------------------------------------
  // Delivery
  // ---------------------------------------------------------------------------

  /// Routes a message sent by a local fiber.
  ///
  /// A local receiver is appended to directly and scheduled; anything else
  /// is relayed through the coordinator.
  pub(crate) fn send(&mut self, receiver: FiberName, envelope: Envelope) {
    if self.fibers.contains_key(&receiver) {
      self.deliver(receiver, envelope);
    } else {
      self.space.post(SpaceCommand::Relay { receiver, envelope });
    }
  }

  /// Appends to a local mailbox and marks the receiver ready.
  ///
  /// Returns `false` if the receiver is unknown in this bundle.
  pub(crate) fn deliver(&mut self, receiver: FiberName, envelope: Envelope) -> bool {
    let Some(slot) = self.fibers.get_mut(&receiver) else {
      return false;
    };

    slot.mailbox.append(envelope);
    self.ready.insert(receiver);

    true
  }

  // ---------------------------------------------------------------------------
  // Receive & Yield Bookkeeping
  // ---------------------------------------------------------------------------

  /// One attempt of a selective receive for `name`.
  ///
  /// An empty result parks the fiber: state `Waiting`, out of the ready
  /// set, until a new delivery schedules it again. A non-empty result keeps
  /// the fiber ready only while its mailbox holds further messages of any
  /// type, so an enclosing receive with a different whitelist still runs.
  pub(crate) fn receive_poll(&mut self, name: &FiberName, opts: &Receive) -> Vec<Envelope> {
    let Some(slot) = self.fibers.get_mut(name) else {
      return Vec::new();
    };

    let taken: Vec<Envelope> = slot.mailbox.pop_matching(&opts.filter, opts.batch);

    if taken.is_empty() {
      slot.state = FiberState::Waiting;
      self.ready.remove(name);
    } else {
      slot.state = FiberState::Running;

      if !slot.mailbox.has_any() {
        self.ready.remove(name);
      }
    }

    taken
  }

  /// Marks `name` alive-for-rescheduling.
  pub(crate) fn mark_alive(&mut self, name: &FiberName) {
    self.ready.insert(Arc::clone(name));
  }

  /// Parks `name` without a wake condition.
  pub(crate) fn park_forever(&mut self, name: &FiberName) {
    if let Some(slot) = self.fibers.get_mut(name) {
      slot.state = FiberState::Waiting;
    }

    self.ready.remove(name);
  }

  // ---------------------------------------------------------------------------
  // Lifecycle
  // ---------------------------------------------------------------------------

  /// Registers a fresh fiber slot under `name`.
  ///
  /// A colliding name is replaced, last writer wins; any stale ready entry
  /// for the old fiber is discarded.
  fn register(&mut self, name: FiberName) {
    self.ready.remove(&name);

    if self.fibers.insert(name, FiberSlot::new()).is_some() {
      tracing::warn!(target: "weft", "fiber name reused; previous fiber replaced");
    }
  }

  /// Marks `name` as exited and unschedules it.
  ///
  /// The slot itself is kept: dead fibers stay in the local map.
  fn retire(&mut self, name: &str) {
    if let Some(slot) = self.fibers.get_mut(name) {
      slot.state = FiberState::Exiting;
    }

    self.ready.remove(name);
  }

  #[inline]
  fn forget_ready(&mut self, name: &str) {
    self.ready.remove(name);
  }

  #[inline]
  fn has_ready(&self) -> bool {
    !self.ready.is_empty()
  }
}

// -----------------------------------------------------------------------------
// Bundle
// -----------------------------------------------------------------------------

/// A worker thread hosting a cooperative scheduler and a set of fibers.
///
/// The bundle owns its fibers' suspended bodies and its half of the command
/// channel. Everything here runs on one thread; cross-thread interaction is
/// restricted to commands posted into [`BundleInbox`].
pub(crate) struct Bundle {
  core: Rc<RefCell<BundleCore>>,
  tasks: HashMap<FiberName, FiberFuture>,
  inbox: Option<BundleInbox>,
  started: bool,
}

impl Bundle {
  pub(crate) fn new(bundle_id: BundleId, space: SpaceHandle, inbox: BundleInbox) -> Self {
    Self {
      core: Rc::new(RefCell::new(BundleCore::new(bundle_id, space))),
      tasks: HashMap::with_capacity(consts::CAP_BUNDLE_FIBERS),
      inbox: Some(inbox),
      started: false,
    }
  }

  /// Runs the bundle's event loop until the command channel closes.
  ///
  /// Strictly non-reentrant: the scheduler is entered exactly once per
  /// bundle lifetime, and a second invocation is a no-op.
  ///
  /// The loop alternates scheduler passes over the ready snapshot with a
  /// drain of pending cross-thread commands, and parks on the inbox when no
  /// fiber is ready. Delivery into a parked bundle wakes it by arriving on
  /// the inbox.
  pub(crate) fn run(&mut self) {
    if self.started {
      tracing::warn!(target: "weft", bundle = %self.bundle_id(), "scheduler already running");
      return;
    }

    self.started = true;

    let Some(mut inbox) = self.inbox.take() else {
      return;
    };

    loop {
      // drain point between passes
      loop {
        match inbox.try_recv() {
          Ok(command) => self.handle(command),
          Err(TryRecvError::Empty) => break,
          Err(TryRecvError::Disconnected) => return,
        }
      }

      let idle: bool = !self.core.borrow().has_ready();

      if idle {
        match inbox.blocking_recv() {
          Some(command) => self.handle(command),
          None => return,
        }
      } else {
        self.pass();
      }
    }
  }

  #[inline]
  fn bundle_id(&self) -> BundleId {
    self.core.borrow().bundle_id()
  }

  /// Executes one cross-thread command on this thread.
  fn handle(&mut self, command: BundleCommand) {
    match command {
      BundleCommand::SpawnFiber { name, body, args } => {
        self.spawn_local(name, body, args);
      }
      BundleCommand::Relayed { receiver, envelope } => {
        let delivered: bool = self.core.borrow_mut().deliver(Arc::clone(&receiver), envelope);

        if !delivered {
          tracing::error!(
            target: "weft",
            bundle = %self.bundle_id(),
            receiver = %receiver,
            "relayed message for unknown fiber",
          );
        }
      }
    }
  }

  /// Creates a fiber and its suspended body.
  ///
  /// The fiber is not scheduled at spawn time; its body runs when the first
  /// message arrives.
  fn spawn_local(&mut self, name: FiberName, body: Box<dyn FiberBody>, args: Term) {
    tracing::trace!(target: "weft", bundle = %self.bundle_id(), fiber = %name, "spawn");

    self.core.borrow_mut().register(Arc::clone(&name));

    let ctx: FiberContext = FiberContext {
      name: Arc::clone(&name),
      core: Rc::clone(&self.core),
    };

    self.tasks.insert(name, body.run(ctx, args));
  }

  /// One scheduler pass: resumes every currently-ready fiber exactly once,
  /// in ready-set insertion order.
  ///
  /// Fibers that become ready during the pass participate in the next one.
  fn pass(&mut self) {
    let snapshot: Vec<FiberName> = self.core.borrow().ready.snapshot();

    for name in snapshot {
      self.resume(&name);
    }
  }

  /// Resumes one fiber until its next suspension point.
  fn resume(&mut self, name: &FiberName) {
    let Some(task) = self.tasks.get_mut(name) else {
      // delivery raced with fiber exit; nothing left to run
      tracing::trace!(target: "weft", fiber = %name, "message for exited fiber");
      self.core.borrow_mut().forget_ready(name);
      return;
    };

    let waker: &Waker = Waker::noop();
    let mut context: Context<'_> = Context::from_waker(waker);
    let polled = panic::catch_unwind(AssertUnwindSafe(|| task.as_mut().poll(&mut context)));

    match polled {
      Ok(Poll::Pending) => {}
      Ok(Poll::Ready(())) => {
        tracing::trace!(target: "weft", fiber = %name, "exit");
        self.retire(name);
      }
      Err(payload) => {
        tracing::error!(
          target: "weft",
          fiber = %name,
          panic = panic_message(payload.as_ref()),
          "fiber body panicked",
        );
        self.retire(name);
      }
    }
  }

  /// Drops the fiber's body and marks it `Exiting`.
  fn retire(&mut self, name: &FiberName) {
    self.tasks.remove(name);
    self.core.borrow_mut().retire(name);
  }
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
  if let Some(message) = payload.downcast_ref::<&str>() {
    message
  } else if let Some(message) = payload.downcast_ref::<String>() {
    message
  } else {
    "opaque panic payload"
  }
}

// -----------------------------------------------------------------------------
// Tests
// -----------------------------------------------------------------------------
