//! Weft - Erlang-style fiber concurrency over cooperative thread bundles.
//!
//! Fibers are named, cooperatively-scheduled units of execution with private
//! mailboxes, partitioned into per-thread bundles and routed through a
//! coordinator thread. Naming and messaging are location-transparent: a send
//! reaches its receiver whichever bundle it lives on.

mod bundle;
mod callback;
mod fiber;
mod mailbox;
mod space;
mod system;
mod term;
mod universe;

pub mod consts;

pub use crate::bundle::BundleId;
pub use crate::callback::Callback;
pub use crate::fiber::FiberBody;
pub use crate::fiber::FiberContext;
pub use crate::fiber::FiberFuture;
pub use crate::fiber::FiberName;
pub use crate::fiber::FiberState;
pub use crate::fiber::Receive;
pub use crate::mailbox::Envelope;
pub use crate::system::System;
pub use crate::term::Term;
pub use crate::universe::Bootstrap;
pub use crate::universe::Universe;
