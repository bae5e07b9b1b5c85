//! Three-state outcome wrapper used instead of exceptions for pattern work.
//!
//! `Value` is the happy path, `Failure` an expected domain mismatch (with the
//! full breadcrumbed failure tree), `Exception` an engine fault such as a
//! cycle or an unresolvable row reference. Kept as three arms because cycle
//! propagation must be distinguishable from ordinary mismatches: a nullable
//! ancestor swallows a cycle but never a mismatch.

use crate::error::EngineError;
use crate::result::{MatchFailure, MatchResult};

#[derive(Debug, Clone, PartialEq)]
pub enum Outcome<T> {
    Value(T),
    Failure(MatchFailure),
    Exception(EngineError),
}

impl<T> Outcome<T> {
    pub fn is_value(&self) -> bool {
        matches!(self, Outcome::Value(_))
    }

    pub fn value(self) -> Option<T> {
        match self {
            Outcome::Value(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_value(&self) -> Option<&T> {
        match self {
            Outcome::Value(v) => Some(v),
            _ => None,
        }
    }

    pub fn is_cycle(&self) -> bool {
        matches!(self, Outcome::Exception(e) if e.is_cycle())
    }

    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> Outcome<U> {
        match self {
            Outcome::Value(v) => Outcome::Value(f(v)),
            Outcome::Failure(e) => Outcome::Failure(e),
            Outcome::Exception(e) => Outcome::Exception(e),
        }
    }

    pub fn and_then<U>(self, f: impl FnOnce(T) -> Outcome<U>) -> Outcome<U> {
        match self {
            Outcome::Value(v) => f(v),
            Outcome::Failure(e) => Outcome::Failure(e),
            Outcome::Exception(e) => Outcome::Exception(e),
        }
    }

    /// Prefix a breadcrumb onto the failure arm; no effect otherwise.
    pub fn prefixed(self, crumb: impl Into<String>) -> Self {
        match self {
            Outcome::Failure(f) => Outcome::Failure(f.prefixed(crumb)),
            other => other,
        }
    }

    /// Annotate the failure arm with additional context.
    pub fn with_detail(self, detail: &str) -> Self {
        match self {
            Outcome::Failure(mut f) => {
                if f.message.is_empty() {
                    f.message = detail.to_string();
                } else {
                    f.message = format!("{detail}: {}", f.message);
                }
                Outcome::Failure(f)
            }
            other => other,
        }
    }

    /// Lift a match result: success becomes `value`, failure carries over.
    pub fn from_match(result: MatchResult, value: T) -> Outcome<T> {
        match result {
            MatchResult::Success => Outcome::Value(value),
            MatchResult::Failure(f) => Outcome::Failure(f),
        }
    }

    /// Sequence outcomes, stopping at the first failure or exception. Use when
    /// later elements depend on earlier ones.
    pub fn sequence(items: impl IntoIterator<Item = Outcome<T>>) -> Outcome<Vec<T>> {
        let mut out = Vec::new();
        for item in items {
            match item {
                Outcome::Value(v) => out.push(v),
                Outcome::Failure(f) => return Outcome::Failure(f),
                Outcome::Exception(e) => return Outcome::Exception(e),
            }
        }
        Outcome::Value(out)
    }

    /// Collect values, aggregating every failure instead of stopping at the
    /// first. Exceptions still propagate immediately.
    pub fn collect_all(items: impl IntoIterator<Item = Outcome<T>>) -> Outcome<Vec<T>> {
        let mut values = Vec::new();
        let mut failures = Vec::new();
        for item in items {
            match item {
                Outcome::Value(v) => values.push(v),
                Outcome::Failure(f) => failures.push(f),
                Outcome::Exception(e) => return Outcome::Exception(e),
            }
        }
        if failures.is_empty() {
            Outcome::Value(values)
        } else {
            Outcome::Failure(MatchFailure::from_failures(failures))
        }
    }
}

impl<T> From<EngineError> for Outcome<T> {
    fn from(e: EngineError) -> Self {
        Outcome::Exception(e)
    }
}

impl<T> From<MatchFailure> for Outcome<T> {
    fn from(f: MatchFailure) -> Self {
        Outcome::Failure(f)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sequence_short_circuits_on_first_failure() {
        let items = vec![
            Outcome::Value(1),
            Outcome::Failure(MatchFailure::new("first")),
            Outcome::Failure(MatchFailure::new("second")),
        ];
        match Outcome::sequence(items) {
            Outcome::Failure(f) => assert_eq!(f.message, "first"),
            other => panic!("expected failure, got {other:?}"),
        }
    }

    #[test]
    fn collect_all_aggregates_failures() {
        let items = vec![
            Outcome::Value(1),
            Outcome::Failure(MatchFailure::new("first")),
            Outcome::Failure(MatchFailure::new("second")),
        ];
        match Outcome::collect_all(items) {
            Outcome::Failure(f) => {
                let report = f.report();
                assert!(report.contains("first") && report.contains("second"));
            }
            other => panic!("expected failure, got {other:?}"),
        }
    }

    #[test]
    fn exception_beats_failure_in_collect_all() {
        let items: Vec<Outcome<i32>> = vec![
            Outcome::Failure(MatchFailure::new("mismatch")),
            Outcome::Exception(EngineError::Cycle("Node".into())),
        ];
        assert!(Outcome::collect_all(items).is_cycle());
    }
}
