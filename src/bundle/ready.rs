use std::collections::VecDeque;
use std::sync::Arc;

use hashbrown::HashSet;

use crate::consts;
use crate::fiber::FiberName;

// -----------------------------------------------------------------------------
// Ready Set
// -----------------------------------------------------------------------------

/// Insertion-ordered set of fibers the scheduler should resume next pass.
///
/// Insertion order matters for fairness; a re-insertion of a present name
/// keeps its original position.
#[derive(Debug)]
pub(crate) struct ReadySet {
  order: VecDeque<FiberName>,
  index: HashSet<FiberName>,
}

impl ReadySet {
  #[inline]
  pub(crate) fn new() -> Self {
    Self {
      order: VecDeque::with_capacity(consts::CAP_READY),
      index: HashSet::with_capacity(consts::CAP_READY),
    }
  }

  /// Returns `true` if the name was newly inserted.
  pub(crate) fn insert(&mut self, name: FiberName) -> bool {
    if self.index.insert(Arc::clone(&name)) {
      self.order.push_back(name);
      true
    } else {
      false
    }
  }

  /// Returns `true` if the name was present.
  pub(crate) fn remove(&mut self, name: &str) -> bool {
    if self.index.remove(name) {
      self.order.retain(|entry| &**entry != name);
      true
    } else {
      false
    }
  }

  #[inline]
  pub(crate) fn is_empty(&self) -> bool {
    self.order.is_empty()
  }

  /// Current names in insertion order.
  #[inline]
  pub(crate) fn snapshot(&self) -> Vec<FiberName> {
    self.order.iter().cloned().collect()
  }
}

impl Default for ReadySet {
  #[inline]
  fn default() -> Self {
    Self::new()
  }
}

// -----------------------------------------------------------------------------
// Tests
// -----------------------------------------------------------------------------

#[cfg(test)]
mod tests {
  use std::sync::Arc;

  use crate::bundle::ready::ReadySet;
  use crate::fiber::FiberName;

  fn name(value: &str) -> FiberName {
    Arc::from(value)
  }

  #[test]
  fn test_insertion_order() {
    let mut ready: ReadySet = ReadySet::new();

    assert!(ready.insert(name("c")));
    assert!(ready.insert(name("a")));
    assert!(ready.insert(name("b")));

    let snapshot: Vec<String> = ready.snapshot().iter().map(|n| n.to_string()).collect();

    assert_eq!(snapshot, ["c", "a", "b"]);
  }

  #[test]
  fn test_reinsert_keeps_position() {
    let mut ready: ReadySet = ReadySet::new();

    ready.insert(name("a"));
    ready.insert(name("b"));

    assert!(!ready.insert(name("a")));

    let snapshot: Vec<String> = ready.snapshot().iter().map(|n| n.to_string()).collect();

    assert_eq!(snapshot, ["a", "b"]);
  }

  #[test]
  fn test_remove() {
    let mut ready: ReadySet = ReadySet::new();

    ready.insert(name("a"));
    ready.insert(name("b"));

    assert!(ready.remove("a"));
    assert!(!ready.remove("a"));
    assert!(!ready.is_empty());

    let snapshot: Vec<String> = ready.snapshot().iter().map(|n| n.to_string()).collect();

    assert_eq!(snapshot, ["b"]);

    assert!(ready.remove("b"));
    assert!(ready.is_empty());
  }
}
