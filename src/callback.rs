use std::fmt::Debug;
use std::fmt::Formatter;
use std::fmt::Result as FmtResult;
use std::sync::Arc;

use crate::consts;
use crate::fiber::FiberName;
use crate::mailbox::Envelope;
use crate::space::SpaceCommand;
use crate::space::SpaceHandle;
use crate::term::Term;

// -----------------------------------------------------------------------------
// Callback
// -----------------------------------------------------------------------------

/// Bridge from host-thread event sources into the fiber world.
///
/// A callback captures a synthetic sender name and a receiver; invoking it
/// from any thread delivers `(sender = name, type = "callback", content =
/// args)` through the same relay path as an ordinary remote send, so the
/// receiver may live on any bundle.
#[derive(Clone)]
pub struct Callback {
  space: SpaceHandle,
  name: FiberName,
  receiver: FiberName,
}

impl Callback {
  #[inline]
  pub(crate) fn new(space: SpaceHandle, name: FiberName, receiver: FiberName) -> Self {
    Self {
      space,
      name,
      receiver,
    }
  }

  /// Posts one callback message to the receiver.
  pub fn call(&self, args: impl Into<Term>) {
    let envelope: Envelope = Envelope::new(
      Arc::clone(&self.name),
      Arc::from(consts::CALLBACK_KIND),
      args.into(),
    );

    self.space.post(SpaceCommand::Relay {
      receiver: Arc::clone(&self.receiver),
      envelope,
    });
  }
}

impl Debug for Callback {
  fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
    f.debug_struct("Callback")
      .field("name", &self.name)
      .field("receiver", &self.receiver)
      .finish_non_exhaustive()
  }
}
