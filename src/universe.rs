use std::io;
use std::sync::Arc;
use std::thread;
use std::thread::JoinHandle;

use crate::bundle::BundleId;
use crate::callback::Callback;
use crate::consts;
use crate::fiber::FiberBody;
use crate::space;
use crate::space::BundleSpace;
use crate::space::SpaceCommand;
use crate::space::SpaceHandle;
use crate::term::Term;

// -----------------------------------------------------------------------------
// Bootstrap
// -----------------------------------------------------------------------------

/// Per-worker initialization callback.
///
/// Each worker thread invokes the bootstrap once at startup, before its
/// scheduler runs, with the identifier of the bundle it hosts. This is the
/// place to install thread-local helpers every bundle should share.
pub type Bootstrap = Arc<dyn Fn(BundleId) + Send + Sync + 'static>;

// -----------------------------------------------------------------------------
// Universe
// -----------------------------------------------------------------------------

/// External facade over a bundle space.
///
/// Owns the coordinator thread; every method posts an asynchronous command
/// to it and returns immediately. Dropping the universe shuts the space
/// down: bundles are closed, worker threads joined, then the coordinator
/// itself.
///
/// ```ignore
/// let universe = Universe::new()?;
///
/// universe.spawn_bundles(2);
/// universe.spawn_fiber("echo", |ctx: FiberContext, _args: Term| async move {
///   loop {
///     let envelope = ctx.recv().await;
///     ctx.send(&envelope.sender, "echo", envelope.content);
///   }
/// }, Term::Nil);
/// ```
#[derive(Debug)]
pub struct Universe {
  handle: SpaceHandle,
  coordinator: Option<JoinHandle<()>>,
}

impl Universe {
  /// Creates a bundle space with no bootstrap.
  pub fn new() -> io::Result<Self> {
    Self::start(None)
  }

  /// Creates a bundle space whose workers run `bootstrap` at startup.
  pub fn with_bootstrap<F>(bootstrap: F) -> io::Result<Self>
  where
    F: Fn(BundleId) + Send + Sync + 'static,
  {
    Self::start(Some(Arc::new(bootstrap)))
  }

  fn start(bootstrap: Option<Bootstrap>) -> io::Result<Self> {
    let (handle, inbox) = space::channel();
    let space_handle: SpaceHandle = handle.clone();

    let coordinator: JoinHandle<()> = thread::Builder::new()
      .name(String::from("weft-space"))
      .spawn(move || BundleSpace::new(bootstrap, space_handle).run(inbox))?;

    Ok(Self {
      handle,
      coordinator: Some(coordinator),
    })
  }

  // ---------------------------------------------------------------------------
  // Admin API
  // ---------------------------------------------------------------------------

  /// Spawns `count` worker threads, each hosting a fresh bundle.
  pub fn spawn_bundles(&self, count: usize) {
    self.handle.post(SpaceCommand::SpawnBundles { count });
  }

  /// Spawns one bundle per detected CPU core, or
  /// [`DEFAULT_INFLATE_FALLBACK`] of them when detection fails.
  ///
  /// [`DEFAULT_INFLATE_FALLBACK`]: crate::consts::DEFAULT_INFLATE_FALLBACK
  pub fn inflate(&self) {
    self.inflate_with(consts::DEFAULT_INFLATE_FALLBACK);
  }

  /// Spawns one bundle per detected CPU core, or `fallback` of them.
  pub fn inflate_with(&self, fallback: usize) {
    self.handle.post(SpaceCommand::Inflate { fallback });
  }

  /// Spawns a fiber on a bundle chosen round-robin by the coordinator.
  ///
  /// The body runs when the fiber's first message arrives; kick it with a
  /// [`callback`] or a message from another fiber.
  ///
  /// [`callback`]: Universe::callback
  pub fn spawn_fiber(&self, name: &str, body: impl FiberBody, args: impl Into<Term>) {
    self.handle.post(SpaceCommand::SpawnFiber {
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
    self.handle.post(SpaceCommand::SpawnFiberIn {
      name: Arc::from(name),
      body: Box::new(body),
      args: args.into(),
      bundle,
    });
  }

  /// Creates a host-thread function delivering messages to `receiver`.
  pub fn callback(&self, name: &str, receiver: &str) -> Callback {
    Callback::new(self.handle.clone(), Arc::from(name), Arc::from(receiver))
  }
}

impl Drop for Universe {
  fn drop(&mut self) {
    self.handle.post(SpaceCommand::Shutdown);

    if let Some(coordinator) = self.coordinator.take() {
      if coordinator.join().is_err() {
        tracing::error!(target: "weft", "coordinator thread panicked");
      }
    }
  }
}
