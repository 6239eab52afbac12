use std::fmt::Debug;
use std::fmt::Formatter;
use std::fmt::Result as FmtResult;

use tokio::sync::mpsc;
use tokio::sync::mpsc::UnboundedReceiver;
use tokio::sync::mpsc::UnboundedSender;
use tokio::sync::mpsc::error::TryRecvError;

use crate::fiber::FiberBody;
use crate::fiber::FiberName;
use crate::mailbox::Envelope;
use crate::term::Term;

// -----------------------------------------------------------------------------
// Bundle Command
// -----------------------------------------------------------------------------

/// Typed command executed on a bundle's worker thread.
///
/// All commands are fire-and-forget; replies are ordinary fiber messages.
pub(crate) enum BundleCommand {
  /// Create a fiber in this bundle's local maps.
  SpawnFiber {
    name: FiberName,
    body: Box<dyn FiberBody>,
    args: Term,
  },
  /// Deliver a message relayed by the coordinator.
  Relayed {
    receiver: FiberName,
    envelope: Envelope,
  },
}

impl Debug for BundleCommand {
  fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
    match self {
      Self::SpawnFiber { name, .. } => f
        .debug_struct("SpawnFiber")
        .field("name", name)
        .finish_non_exhaustive(),
      Self::Relayed { receiver, envelope } => f
        .debug_struct("Relayed")
        .field("receiver", receiver)
        .field("envelope", envelope)
        .finish(),
    }
  }
}

// -----------------------------------------------------------------------------
// Bundle Handle
// -----------------------------------------------------------------------------

/// Sending half of a bundle's command channel.
#[derive(Clone)]
pub(crate) struct BundleHandle {
  inner: UnboundedSender<BundleCommand>,
}

impl BundleHandle {
  pub(crate) fn post(&self, command: BundleCommand) {
    if self.inner.send(command).is_err() {
      tracing::debug!(target: "weft", "bundle command dropped; worker is gone");
    }
  }
}

impl Debug for BundleHandle {
  fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
    f.write_str("BundleHandle(..)")
  }
}

// -----------------------------------------------------------------------------
// Bundle Inbox
// -----------------------------------------------------------------------------

/// Receiving half of a bundle's command channel; the wake variable of the
/// bundle's event loop.
pub(crate) struct BundleInbox {
  inner: UnboundedReceiver<BundleCommand>,
}

impl BundleInbox {
  #[inline]
  pub(crate) fn try_recv(&mut self) -> Result<BundleCommand, TryRecvError> {
    self.inner.try_recv()
  }

  #[inline]
  pub(crate) fn blocking_recv(&mut self) -> Option<BundleCommand> {
    self.inner.blocking_recv()
  }
}

impl Debug for BundleInbox {
  fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
    f.write_str("BundleInbox(..)")
  }
}

// -----------------------------------------------------------------------------
// Misc. Utilities
// -----------------------------------------------------------------------------

#[inline]
pub(crate) fn channel() -> (BundleHandle, BundleInbox) {
  let channel: _ = mpsc::unbounded_channel();
  let handle: BundleHandle = BundleHandle { inner: channel.0 };
  let inbox: BundleInbox = BundleInbox { inner: channel.1 };

  (handle, inbox)
}
