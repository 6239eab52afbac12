use std::pin::Pin;
use std::sync::Arc;

use crate::term::Term;

mod context;
mod receive;

pub use self::context::FiberContext;
pub use self::receive::Receive;

// -----------------------------------------------------------------------------
// @alias - Names & Futures
// -----------------------------------------------------------------------------

/// Unique name identifying a fiber across the whole bundle space.
pub type FiberName = Arc<str>;

/// The suspended body of a fiber, resumable by its bundle scheduler.
pub type FiberFuture = Pin<Box<dyn Future<Output = ()> + 'static>>;

// -----------------------------------------------------------------------------
// @type - FiberState
// -----------------------------------------------------------------------------

/// Execution state of a fiber.
#[derive(Clone, Copy, Debug, Hash, PartialEq, Eq)]
pub enum FiberState {
  /// The fiber is runnable or currently executing.
  Running,
  /// The fiber is suspended at a receive with no matching message.
  Waiting,
  /// The fiber body has returned or panicked.
  Exiting,
}

impl FiberState {
  /// Returns `true` if the fiber is runnable or executing.
  #[inline]
  pub fn is_running(&self) -> bool {
    matches!(self, Self::Running)
  }

  /// Returns `true` if the fiber is suspended at an unsatisfied receive.
  #[inline]
  pub fn is_waiting(&self) -> bool {
    matches!(self, Self::Waiting)
  }

  /// Returns `true` if the fiber body has completed.
  #[inline]
  pub fn is_exiting(&self) -> bool {
    matches!(self, Self::Exiting)
  }
}

// -----------------------------------------------------------------------------
// @trait - FiberBody
// -----------------------------------------------------------------------------

/// The entry point of a fiber.
///
/// A body is created on the caller's thread, shipped to the owning bundle's
/// worker thread, and invoked there exactly once with the fiber's
/// [`FiberContext`] and spawn arguments. The returned future never leaves
/// the worker thread.
///
/// Implemented for any `Send` closure of the right shape, so bodies are
/// usually written inline:
///
/// ```ignore
/// universe.spawn_fiber("echo", |ctx: FiberContext, _args: Term| async move {
///   loop {
///     let envelope = ctx.recv().await;
///     ctx.send(&envelope.sender, "echo", envelope.content);
///   }
/// }, Term::Nil);
/// ```
pub trait FiberBody: Send + 'static {
  /// Consumes the body and produces the fiber's suspended execution.
  fn run(self: Box<Self>, ctx: FiberContext, args: Term) -> FiberFuture;
}

impl<F, T> FiberBody for F
where
  F: FnOnce(FiberContext, Term) -> T + Send + 'static,
  T: Future<Output = ()> + 'static,
{
  #[inline]
  fn run(self: Box<Self>, ctx: FiberContext, args: Term) -> FiberFuture {
    Box::pin((*self)(ctx, args))
  }
}

// -----------------------------------------------------------------------------
// Tests
// -----------------------------------------------------------------------------

#[cfg(test)]
mod tests {
  use crate::fiber::FiberState;

  #[test]
  fn test_state_predicates() {
    assert!(FiberState::Running.is_running());
    assert!(FiberState::Waiting.is_waiting());
    assert!(FiberState::Exiting.is_exiting());
    assert!(!FiberState::Running.is_waiting());
  }
}
