//! Runtime configuration constants and default values.

// -----------------------------------------------------------------------------
// Spawning
// -----------------------------------------------------------------------------

/// Number of bundles spawned by `inflate` when CPU detection fails.
///
/// This value is only used when a bundle count is not retrievable from the
/// host environment and the caller did not pass an explicit fallback.
pub const DEFAULT_INFLATE_FALLBACK: usize = 32;

// -----------------------------------------------------------------------------
// Messaging
// -----------------------------------------------------------------------------

/// Default number of messages extracted by a single receive.
pub const DEFAULT_RECV_BATCH: usize = 1;

/// Message type used for host-thread callback deliveries.
///
/// Messages posted through a [`Callback`] always carry this type so fiber
/// bodies can whitelist or ignore host events like any other message.
///
/// [`Callback`]: crate::Callback
pub const CALLBACK_KIND: &str = "callback";

// -----------------------------------------------------------------------------
// Memory Allocation
// -----------------------------------------------------------------------------

/// Initial capacity of a fiber mailbox.
pub const CAP_MAILBOX: usize = 8;

/// Initial capacity of a bundle's local fiber map.
pub const CAP_BUNDLE_FIBERS: usize = 16;

/// Initial capacity of a bundle's ready set.
pub const CAP_READY: usize = 16;

/// Initial capacity of the coordinator's fiber placement map.
pub const CAP_SPACE_FIBERS: usize = 64;

/// Initial capacity of the coordinator's bundle registry.
pub const CAP_SPACE_BUNDLES: usize = 8;
