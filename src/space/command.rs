use std::fmt::Debug;
use std::fmt::Formatter;
use std::fmt::Result as FmtResult;

use tokio::sync::mpsc;
use tokio::sync::mpsc::UnboundedReceiver;
use tokio::sync::mpsc::UnboundedSender;
#[cfg(test)]
use tokio::sync::mpsc::error::TryRecvError;

use crate::bundle::BundleId;
use crate::fiber::FiberBody;
use crate::fiber::FiberName;
use crate::mailbox::Envelope;
use crate::term::Term;

// -----------------------------------------------------------------------------
// Space Command
// -----------------------------------------------------------------------------

/// Typed command executed on the coordinator thread.
///
/// Everything reaching the coordinator, including admin calls from the
/// external facade, goes through these; the coordinator's maps are touched
/// by no other thread.
pub(crate) enum SpaceCommand {
  /// Spawn `count` worker threads, each hosting a fresh bundle.
  SpawnBundles { count: usize },
  /// Spawn one bundle per detected CPU core, or `fallback` of them.
  Inflate { fallback: usize },
  /// Spawn a fiber on a bundle chosen round-robin.
  SpawnFiber {
    name: FiberName,
    body: Box<dyn FiberBody>,
    args: Term,
  },
  /// Spawn a fiber on an explicit bundle.
  SpawnFiberIn {
    name: FiberName,
    body: Box<dyn FiberBody>,
    args: Term,
    bundle: BundleId,
  },
  /// Route a message to the bundle owning `receiver`.
  Relay {
    receiver: FiberName,
    envelope: Envelope,
  },
  /// Tear the space down: close every bundle and join its thread.
  Shutdown,
}

impl Debug for SpaceCommand {
  fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
    match self {
      Self::SpawnBundles { count } => f
        .debug_struct("SpawnBundles")
        .field("count", count)
        .finish(),
      Self::Inflate { fallback } => f
        .debug_struct("Inflate")
        .field("fallback", fallback)
        .finish(),
      Self::SpawnFiber { name, .. } => f
        .debug_struct("SpawnFiber")
        .field("name", name)
        .finish_non_exhaustive(),
      Self::SpawnFiberIn { name, bundle, .. } => f
        .debug_struct("SpawnFiberIn")
        .field("name", name)
        .field("bundle", bundle)
        .finish_non_exhaustive(),
      Self::Relay { receiver, envelope } => f
        .debug_struct("Relay")
        .field("receiver", receiver)
        .field("envelope", envelope)
        .finish(),
      Self::Shutdown => f.write_str("Shutdown"),
    }
  }
}

// -----------------------------------------------------------------------------
// Space Handle
// -----------------------------------------------------------------------------

/// Sending half of the coordinator's command channel.
///
/// Held by the facade, by every bundle, and by host callbacks.
#[derive(Clone)]
pub(crate) struct SpaceHandle {
  inner: UnboundedSender<SpaceCommand>,
}

impl SpaceHandle {
  pub(crate) fn post(&self, command: SpaceCommand) {
    if self.inner.send(command).is_err() {
      tracing::debug!(target: "weft", "space command dropped; coordinator is gone");
    }
  }
}

impl Debug for SpaceHandle {
  fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
    f.write_str("SpaceHandle(..)")
  }
}

// -----------------------------------------------------------------------------
// Space Inbox
// -----------------------------------------------------------------------------

/// Receiving half of the coordinator's command channel.
pub(crate) struct SpaceInbox {
  inner: UnboundedReceiver<SpaceCommand>,
}

impl SpaceInbox {
  #[inline]
  pub(crate) fn blocking_recv(&mut self) -> Option<SpaceCommand> {
    self.inner.blocking_recv()
  }

  #[cfg(test)]
  #[inline]
  pub(crate) fn try_recv(&mut self) -> Result<SpaceCommand, TryRecvError> {
    self.inner.try_recv()
  }
}

impl Debug for SpaceInbox {
  fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
    f.write_str("SpaceInbox(..)")
  }
}

// -----------------------------------------------------------------------------
// Misc. Utilities
// -----------------------------------------------------------------------------

#[inline]
pub(crate) fn channel() -> (SpaceHandle, SpaceInbox) {
  let channel: _ = mpsc::unbounded_channel();
  let handle: SpaceHandle = SpaceHandle { inner: channel.0 };
  let inbox: SpaceInbox = SpaceInbox { inner: channel.1 };

  (handle, inbox)
}
