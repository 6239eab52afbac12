use std::fmt::Display;
use std::fmt::Formatter;
use std::fmt::Result as FmtResult;
use std::sync::Arc;

// -----------------------------------------------------------------------------
// Term
// -----------------------------------------------------------------------------

/// An opaque message value.
///
/// Terms are the payload of every message exchanged between fibers. They are
/// plain values with no sharing semantics: a send clones the term into the
/// receiver's mailbox.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Term {
  /// The empty value.
  Nil,
  /// A signed integer.
  Int(i64),
  /// An immutable string.
  Str(Arc<str>),
  /// An ordered sequence of terms.
  List(Vec<Term>),
}

impl Term {
  /// Returns `true` if the term is [`Nil`].
  ///
  /// [`Nil`]: Term::Nil
  #[inline]
  pub fn is_nil(&self) -> bool {
    matches!(self, Self::Nil)
  }

  /// Returns the integer value, or `None` if the term is not an [`Int`].
  ///
  /// [`Int`]: Term::Int
  #[inline]
  pub fn as_int(&self) -> Option<i64> {
    match self {
      Self::Int(value) => Some(*value),
      _ => None,
    }
  }

  /// Returns the string value, or `None` if the term is not a [`Str`].
  ///
  /// [`Str`]: Term::Str
  #[inline]
  pub fn as_str(&self) -> Option<&str> {
    match self {
      Self::Str(value) => Some(value),
      _ => None,
    }
  }

  /// Returns the list elements, or `None` if the term is not a [`List`].
  ///
  /// [`List`]: Term::List
  #[inline]
  pub fn as_list(&self) -> Option<&[Term]> {
    match self {
      Self::List(value) => Some(value),
      _ => None,
    }
  }
}

impl Display for Term {
  fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
    match self {
      Self::Nil => f.write_str("nil"),
      Self::Int(value) => Display::fmt(value, f),
      Self::Str(value) => Display::fmt(value, f),
      Self::List(value) => {
        f.write_str("[")?;

        for (index, term) in value.iter().enumerate() {
          if index > 0 {
            f.write_str(", ")?;
          }

          Display::fmt(term, f)?;
        }

        f.write_str("]")
      }
    }
  }
}

impl From<i64> for Term {
  #[inline]
  fn from(other: i64) -> Self {
    Self::Int(other)
  }
}

impl From<&str> for Term {
  #[inline]
  fn from(other: &str) -> Self {
    Self::Str(Arc::from(other))
  }
}

impl From<String> for Term {
  #[inline]
  fn from(other: String) -> Self {
    Self::Str(Arc::from(other))
  }
}

impl From<Arc<str>> for Term {
  #[inline]
  fn from(other: Arc<str>) -> Self {
    Self::Str(other)
  }
}

impl From<Vec<Term>> for Term {
  #[inline]
  fn from(other: Vec<Term>) -> Self {
    Self::List(other)
  }
}

// -----------------------------------------------------------------------------
// Tests
// -----------------------------------------------------------------------------

#[cfg(test)]
mod tests {
  use crate::term::Term;

  #[test]
  fn test_accessors() {
    assert!(Term::Nil.is_nil());
    assert_eq!(Term::Int(7).as_int(), Some(7));
    assert_eq!(Term::from("seven").as_str(), Some("seven"));
    assert_eq!(Term::Int(7).as_str(), None);
    assert_eq!(Term::from(vec![Term::Int(1)]).as_list(), Some(&[Term::Int(1)][..]));
  }

  #[test]
  fn test_display() {
    let term: Term = Term::List(vec![Term::Nil, Term::Int(2), Term::from("x")]);

    assert_eq!(term.to_string(), "[nil, 2, x]");
  }

  #[test]
  fn test_from_conversions() {
    assert_eq!(Term::from(3), Term::Int(3));
    assert_eq!(Term::from("a"), Term::from(String::from("a")));
  }
}
