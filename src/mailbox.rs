use std::collections::VecDeque;
use std::sync::Arc;

use crate::consts;
use crate::fiber::FiberName;
use crate::term::Term;

// -----------------------------------------------------------------------------
// Envelope
// -----------------------------------------------------------------------------

/// A message awaiting a fiber.
///
/// Envelopes are ordered triples of sender name, message type, and content.
/// All three are opaque to the routing fabric.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Envelope {
  /// Name of the sending fiber (or synthetic callback name).
  pub sender: FiberName,
  /// Message type tag.
  pub kind: Arc<str>,
  /// Message payload.
  pub content: Term,
}

impl Envelope {
  #[inline]
  pub(crate) fn new(sender: FiberName, kind: Arc<str>, content: Term) -> Self {
    Self {
      sender,
      kind,
      content,
    }
  }

  /// Returns `true` if the message carries the given type tag.
  #[inline]
  pub fn is(&self, kind: &str) -> bool {
    &*self.kind == kind
  }
}

// -----------------------------------------------------------------------------
// Mail Filter
// -----------------------------------------------------------------------------

/// Per-message admission filter evaluated at extraction time.
///
/// An absent whitelist accepts all values for that dimension.
#[derive(Clone, Debug, Default)]
pub(crate) struct MailFilter {
  kinds: Option<Vec<Arc<str>>>,
  senders: Option<Vec<FiberName>>,
}

impl MailFilter {
  pub(crate) fn allow_kind(&mut self, kind: &str) {
    self.kinds.get_or_insert_default().push(Arc::from(kind));
  }

  pub(crate) fn allow_sender(&mut self, sender: &str) {
    self.senders.get_or_insert_default().push(Arc::from(sender));
  }

  pub(crate) fn admits(&self, envelope: &Envelope) -> bool {
    if let Some(kinds) = self.kinds.as_deref() {
      if !kinds.contains(&envelope.kind) {
        return false;
      }
    }

    if let Some(senders) = self.senders.as_deref() {
      if !senders.contains(&envelope.sender) {
        return false;
      }
    }

    true
  }
}

// -----------------------------------------------------------------------------
// Mailbox
// -----------------------------------------------------------------------------

/// Ordered FIFO of messages pending for one fiber.
///
/// Messages are appended at the tail in arrival order. Extraction may be
/// filtered; messages rejected by a filter stay in place and keep their
/// relative order, so an enclosing unfiltered receive observes them in
/// their original arrival order.
#[derive(Debug)]
pub(crate) struct Mailbox {
  queue: VecDeque<Envelope>,
}

impl Mailbox {
  #[inline]
  pub(crate) fn new() -> Self {
    Self {
      queue: VecDeque::with_capacity(consts::CAP_MAILBOX),
    }
  }

  /// FIFO enqueue.
  #[inline]
  pub(crate) fn append(&mut self, envelope: Envelope) {
    self.queue.push_back(envelope);
  }

  /// Returns `true` if any message is pending, ignoring filters.
  #[inline]
  pub(crate) fn has_any(&self) -> bool {
    !self.queue.is_empty()
  }

  /// Extracts at most `batch` messages admitted by `filter`.
  ///
  /// Scans from head to tail. Extracted messages are removed in place;
  /// the relative order of the remainder is unchanged.
  pub(crate) fn pop_matching(&mut self, filter: &MailFilter, batch: usize) -> Vec<Envelope> {
    let mut taken: Vec<Envelope> = Vec::new();
    let mut index: usize = 0;

    while index < self.queue.len() && taken.len() < batch {
      if filter.admits(&self.queue[index]) {
        if let Some(envelope) = self.queue.remove(index) {
          taken.push(envelope);
        }
      } else {
        index += 1;
      }
    }

    taken
  }

  /// Full unfiltered read-only view.
  #[cfg(test)]
  pub(crate) fn snapshot(&self) -> impl Iterator<Item = &Envelope> {
    self.queue.iter()
  }
}

impl Default for Mailbox {
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

  use crate::mailbox::Envelope;
  use crate::mailbox::MailFilter;
  use crate::mailbox::Mailbox;
  use crate::term::Term;

  fn envelope(sender: &str, kind: &str, content: i64) -> Envelope {
    Envelope::new(Arc::from(sender), Arc::from(kind), Term::Int(content))
  }

  fn kinds(mailbox: &Mailbox) -> Vec<String> {
    mailbox.snapshot().map(|e| e.kind.to_string()).collect()
  }

  #[test]
  fn test_append_is_fifo() {
    let mut mailbox: Mailbox = Mailbox::new();

    assert!(!mailbox.has_any());

    mailbox.append(envelope("a", "x", 1));
    mailbox.append(envelope("a", "y", 2));
    mailbox.append(envelope("b", "x", 3));

    assert!(mailbox.has_any());
    assert_eq!(kinds(&mailbox), ["x", "y", "x"]);
  }

  #[test]
  fn test_pop_matching_unfiltered() {
    let mut mailbox: Mailbox = Mailbox::new();

    mailbox.append(envelope("a", "x", 1));
    mailbox.append(envelope("a", "y", 2));

    let taken: Vec<Envelope> = mailbox.pop_matching(&MailFilter::default(), 1);

    assert_eq!(taken.len(), 1);
    assert_eq!(taken[0].content, Term::Int(1));
    assert_eq!(kinds(&mailbox), ["y"]);
  }

  #[test]
  fn test_pop_matching_kind_whitelist() {
    let mut mailbox: Mailbox = Mailbox::new();
    let mut filter: MailFilter = MailFilter::default();

    filter.allow_kind("reply");

    mailbox.append(envelope("a", "log", 1));
    mailbox.append(envelope("a", "reply", 2));
    mailbox.append(envelope("a", "log", 3));
    mailbox.append(envelope("a", "reply", 4));

    let taken: Vec<Envelope> = mailbox.pop_matching(&filter, 8);

    assert_eq!(taken.len(), 2);
    assert_eq!(taken[0].content, Term::Int(2));
    assert_eq!(taken[1].content, Term::Int(4));

    // rejected messages keep their original arrival order
    let rest: Vec<i64> = mailbox.snapshot().filter_map(|e| e.content.as_int()).collect();

    assert_eq!(rest, [1, 3]);
  }

  #[test]
  fn test_pop_matching_sender_whitelist() {
    let mut mailbox: Mailbox = Mailbox::new();
    let mut filter: MailFilter = MailFilter::default();

    filter.allow_sender("b");

    mailbox.append(envelope("a", "x", 1));
    mailbox.append(envelope("b", "x", 2));

    let taken: Vec<Envelope> = mailbox.pop_matching(&filter, 8);

    assert_eq!(taken.len(), 1);
    assert_eq!(taken[0].content, Term::Int(2));
    assert_eq!(kinds(&mailbox), ["x"]);
  }

  #[test]
  fn test_pop_matching_batch_limit() {
    let mut mailbox: Mailbox = Mailbox::new();
    let mut filter: MailFilter = MailFilter::default();

    filter.allow_kind("t");

    for index in 1..=5 {
      mailbox.append(envelope("a", "t", index));
    }

    let taken: Vec<Envelope> = mailbox.pop_matching(&filter, 3);
    let rest: Vec<i64> = mailbox.snapshot().filter_map(|e| e.content.as_int()).collect();

    assert_eq!(taken.len(), 3);
    assert_eq!(taken[0].content, Term::Int(1));
    assert_eq!(taken[2].content, Term::Int(3));
    assert_eq!(rest, [4, 5]);
  }

  #[test]
  fn test_pop_matching_no_match() {
    let mut mailbox: Mailbox = Mailbox::new();
    let mut filter: MailFilter = MailFilter::default();

    filter.allow_kind("missing");

    mailbox.append(envelope("a", "x", 1));

    assert!(mailbox.pop_matching(&filter, 1).is_empty());
    assert!(mailbox.has_any());
  }

  #[test]
  fn test_envelope_kind_predicate() {
    let observed: Envelope = envelope("a", "x", 1);

    assert!(observed.is("x"));
    assert!(!observed.is("y"));
  }

  #[test]
  fn test_filter_requires_both_whitelists() {
    let mut filter: MailFilter = MailFilter::default();

    filter.allow_kind("x");
    filter.allow_sender("a");

    assert!(filter.admits(&envelope("a", "x", 1)));
    assert!(!filter.admits(&envelope("b", "x", 1)));
    assert!(!filter.admits(&envelope("a", "y", 1)));
  }
}
