//! Classify failures against a strategy's interest set.
//!
//! Callers describe their error type through [`Classify`]; the engine turns
//! every failure into a [`FailureDescriptor`] and asks each strategy's
//! [`Classifier`] whether it claims it.

use std::borrow::Cow;
use std::collections::BTreeSet;
use std::fmt;
use std::sync::Arc;

/// Named tag identifying the concrete kind of an error (e.g. `"timeout"`).
///
/// Matching is exact string equality.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ErrorKind(Cow<'static, str>);

impl ErrorKind {
    pub const fn new(name: &'static str) -> Self {
        Self(Cow::Borrowed(name))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&'static str> for ErrorKind {
    fn from(name: &'static str) -> Self {
        Self(Cow::Borrowed(name))
    }
}

impl From<String> for ErrorKind {
    fn from(name: String) -> Self {
        Self(Cow::Owned(name))
    }
}

/// Extraction hook: tells the engine what kind of failure an error is and,
/// if it came from a response, which status code it carried.
pub trait Classify {
    fn kind(&self) -> ErrorKind;

    fn status_code(&self) -> Option<u16> {
        None
    }
}

impl Classify for std::io::Error {
    /// The `io::ErrorKind` variant name, e.g. `TimedOut` or `ConnectionReset`.
    fn kind(&self) -> ErrorKind {
        ErrorKind::from(format!("{:?}", std::io::Error::kind(self)))
    }
}

impl<E: Classify + ?Sized> Classify for Box<E> {
    fn kind(&self) -> ErrorKind {
        (**self).kind()
    }

    fn status_code(&self) -> Option<u16> {
        (**self).status_code()
    }
}

/// What every classifier sees for one failed attempt.
#[derive(Debug)]
pub struct FailureDescriptor<'a, E> {
    error: &'a E,
    kind: ErrorKind,
    status: Option<u16>,
}

impl<'a, E: Classify> FailureDescriptor<'a, E> {
    pub fn new(error: &'a E) -> Self {
        Self {
            kind: error.kind(),
            status: error.status_code(),
            error,
        }
    }
}

impl<'a, E> FailureDescriptor<'a, E> {
    pub fn error(&self) -> &'a E {
        self.error
    }

    pub fn kind(&self) -> &ErrorKind {
        &self.kind
    }

    pub fn status_code(&self) -> Option<u16> {
        self.status
    }
}

/// Caller-supplied replacement for [`MatchCriteria`].
pub type Predicate<E> = Arc<dyn Fn(&FailureDescriptor<'_, E>) -> bool + Send + Sync>;

/// Error kinds and status codes a strategy is interested in.
///
/// Inclusive (the default) claims only failures in the sets; exclusive claims
/// everything outside them. Inclusive with both sets empty never matches.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MatchCriteria {
    pub error_kinds: BTreeSet<ErrorKind>,
    pub status_codes: BTreeSet<u16>,
    pub exclusive: bool,
}

impl MatchCriteria {
    fn in_sets<E>(&self, descriptor: &FailureDescriptor<'_, E>) -> bool {
        if self.error_kinds.contains(descriptor.kind()) {
            return true;
        }
        descriptor
            .status_code()
            .is_some_and(|code| self.status_codes.contains(&code))
    }

    pub fn matches<E>(&self, descriptor: &FailureDescriptor<'_, E>) -> bool {
        self.in_sets(descriptor) != self.exclusive
    }
}

/// Decides whether a strategy claims a failure.
pub enum Classifier<E> {
    Criteria(MatchCriteria),
    Custom(Predicate<E>),
}

impl<E> Classifier<E> {
    pub fn custom<F>(predicate: F) -> Self
    where
        F: Fn(&FailureDescriptor<'_, E>) -> bool + Send + Sync + 'static,
    {
        Classifier::Custom(Arc::new(predicate))
    }

    pub fn matches(&self, descriptor: &FailureDescriptor<'_, E>) -> bool {
        match self {
            Classifier::Criteria(criteria) => criteria.matches(descriptor),
            Classifier::Custom(predicate) => predicate(descriptor),
        }
    }

    /// Short label for log lines.
    pub fn describe(&self) -> &'static str {
        match self {
            Classifier::Criteria(c) if c.exclusive => "exclusive",
            Classifier::Criteria(_) => "inclusive",
            Classifier::Custom(_) => "custom",
        }
    }
}

impl<E> Clone for Classifier<E> {
    fn clone(&self) -> Self {
        match self {
            Classifier::Criteria(c) => Classifier::Criteria(c.clone()),
            Classifier::Custom(p) => Classifier::Custom(Arc::clone(p)),
        }
    }
}

impl<E> fmt::Debug for Classifier<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Classifier::Criteria(c) => f.debug_tuple("Criteria").field(c).finish(),
            Classifier::Custom(_) => f.write_str("Custom(..)"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::retry::testing::TestError;

    fn criteria(kinds: &[&'static str], codes: &[u16], exclusive: bool) -> MatchCriteria {
        MatchCriteria {
            error_kinds: kinds.iter().map(|k| ErrorKind::new(*k)).collect(),
            status_codes: codes.iter().copied().collect(),
            exclusive,
        }
    }

    #[test]
    fn inclusive_matches_kind() {
        let c = criteria(&["timeout"], &[], false);
        let err = TestError::of("timeout");
        assert!(c.matches(&FailureDescriptor::new(&err)));
        let other = TestError::of("refused");
        assert!(!c.matches(&FailureDescriptor::new(&other)));
    }

    #[test]
    fn inclusive_matches_status_only_when_present() {
        let c = criteria(&[], &[404, 503], false);
        assert!(c.matches(&FailureDescriptor::new(&TestError::http(404))));
        assert!(!c.matches(&FailureDescriptor::new(&TestError::http(500))));
        assert!(!c.matches(&FailureDescriptor::new(&TestError::of("http"))));
    }

    #[test]
    fn exclusive_inverts_match() {
        let c = criteria(&["fatal"], &[], true);
        assert!(!c.matches(&FailureDescriptor::new(&TestError::of("fatal"))));
        assert!(c.matches(&FailureDescriptor::new(&TestError::of("timeout"))));
        assert!(c.matches(&FailureDescriptor::new(&TestError::http(500))));
    }

    #[test]
    fn empty_inclusive_is_inert_and_empty_exclusive_matches_all() {
        let inert = criteria(&[], &[], false);
        let all = criteria(&[], &[], true);
        for err in [TestError::of("timeout"), TestError::http(404)] {
            let d = FailureDescriptor::new(&err);
            assert!(!inert.matches(&d));
            assert!(all.matches(&d));
        }
    }

    #[test]
    fn custom_predicate_sees_error_and_ignores_criteria() {
        let classifier: Classifier<TestError> =
            Classifier::custom(|d: &FailureDescriptor<'_, TestError>| {
                d.error().message.contains("flaky") && d.status_code().is_none()
            });
        assert!(classifier.matches(&FailureDescriptor::new(&TestError::with_message(
            "x",
            "flaky link"
        ))));
        assert!(!classifier.matches(&FailureDescriptor::new(&TestError::http(503))));
        assert_eq!(classifier.describe(), "custom");
    }

    #[test]
    fn io_error_kind_uses_variant_name() {
        let err = std::io::Error::new(std::io::ErrorKind::TimedOut, "slow");
        assert_eq!(Classify::kind(&err).as_str(), "TimedOut");
        assert_eq!(Classify::status_code(&err), None);
    }
}
