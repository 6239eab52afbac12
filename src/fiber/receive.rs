use std::pin::Pin;
use std::task::Context;
use std::task::Poll;

use crate::consts;
use crate::fiber::FiberContext;
use crate::mailbox::Envelope;
use crate::mailbox::MailFilter;

// -----------------------------------------------------------------------------
// Receive Options
// -----------------------------------------------------------------------------

/// Options for a selective receive.
///
/// Whitelists are evaluated per message at extraction time, not at enqueue:
/// messages rejected here stay in the mailbox and may be matched by an
/// enclosing receive.
///
/// ```ignore
/// let batch = ctx.receive(Receive::new().kind("reply").batch(3)).await;
/// ```
#[derive(Clone, Debug)]
pub struct Receive {
  pub(crate) filter: MailFilter,
  pub(crate) batch: usize,
}

impl Receive {
  /// Creates options accepting any message, one at a time.
  #[inline]
  pub fn new() -> Self {
    Self {
      filter: MailFilter::default(),
      batch: consts::DEFAULT_RECV_BATCH,
    }
  }

  /// Adds `kind` to the message type whitelist.
  #[inline]
  pub fn kind(mut self, kind: &str) -> Self {
    self.filter.allow_kind(kind);
    self
  }

  /// Adds `sender` to the sender whitelist.
  #[inline]
  pub fn sender(mut self, sender: &str) -> Self {
    self.filter.allow_sender(sender);
    self
  }

  /// Sets the maximum number of messages extracted at once.
  ///
  /// # Panics
  ///
  /// Panics if `batch` is zero.
  #[inline]
  pub fn batch(mut self, batch: usize) -> Self {
    assert!(batch > 0, "receive batch must be positive");
    self.batch = batch;
    self
  }
}

impl Default for Receive {
  #[inline]
  fn default() -> Self {
    Self::new()
  }
}

// -----------------------------------------------------------------------------
// Receive Once
// -----------------------------------------------------------------------------

/// Suspension point of [`FiberContext::receive`].
///
/// Each poll retries the filtered extraction. An empty result parks the
/// fiber (state `Waiting`, dropped from the ready set) until a new delivery
/// schedules it again.
pub(crate) struct ReceiveOnce<'a> {
  ctx: &'a FiberContext,
  opts: Receive,
}

impl<'a> ReceiveOnce<'a> {
  #[inline]
  pub(crate) fn new(ctx: &'a FiberContext, opts: Receive) -> Self {
    Self { ctx, opts }
  }
}

impl Future for ReceiveOnce<'_> {
  type Output = Vec<Envelope>;

  fn poll(self: Pin<&mut Self>, _context: &mut Context<'_>) -> Poll<Self::Output> {
    let this: &mut Self = self.get_mut();
    let taken: Vec<Envelope> = this
      .ctx
      .core
      .borrow_mut()
      .receive_poll(&this.ctx.name, &this.opts);

    if taken.is_empty() {
      Poll::Pending
    } else {
      Poll::Ready(taken)
    }
  }
}

// -----------------------------------------------------------------------------
// Yield Alive
// -----------------------------------------------------------------------------

/// Suspension point of [`FiberContext::yield_alive`].
///
/// Marks the fiber ready before yielding, so the scheduler resumes it on
/// the next pass even with an empty mailbox.
pub(crate) struct YieldAlive<'a> {
  ctx: &'a FiberContext,
  yielded: bool,
}

impl<'a> YieldAlive<'a> {
  #[inline]
  pub(crate) fn new(ctx: &'a FiberContext) -> Self {
    Self { ctx, yielded: false }
  }
}

impl Future for YieldAlive<'_> {
  type Output = ();

  fn poll(self: Pin<&mut Self>, _context: &mut Context<'_>) -> Poll<Self::Output> {
    let this: &mut Self = self.get_mut();

    if this.yielded {
      Poll::Ready(())
    } else {
      this.yielded = true;
      this.ctx.core.borrow_mut().mark_alive(&this.ctx.name);
      Poll::Pending
    }
  }
}

// -----------------------------------------------------------------------------
// Wait Forever
// -----------------------------------------------------------------------------

/// Suspension point of [`FiberContext::wait_forever`].
///
/// Parks the fiber on every poll and never completes. A delivery re-inserts
/// the fiber into the ready set; the next poll parks it again, so a parked
/// fiber costs nothing between messages.
pub(crate) struct WaitForever<'a> {
  ctx: &'a FiberContext,
}

impl<'a> WaitForever<'a> {
  #[inline]
  pub(crate) fn new(ctx: &'a FiberContext) -> Self {
    Self { ctx }
  }
}

impl Future for WaitForever<'_> {
  type Output = ();

  fn poll(self: Pin<&mut Self>, _context: &mut Context<'_>) -> Poll<Self::Output> {
    self.ctx.core.borrow_mut().park_forever(&self.ctx.name);

    Poll::Pending
  }
}

// -----------------------------------------------------------------------------
// Tests
// -----------------------------------------------------------------------------
