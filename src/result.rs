//! Match outcomes: breadcrumbed, reason-tagged failure trees.
//!
//! Every structural check in the engine reports through [`MatchResult`].
//! Failures carry the path at which they occurred (breadcrumbs), a human
//! message, an optional cause list (for aggregated composite failures), and a
//! machine-readable [`FailureReason`] so callers can special-case e.g.
//! discriminator problems without string matching.

use serde_json::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FailureReason {
    /// Generic structural mismatch: wrong type, wrong value, constraint violation.
    Mismatch,
    MissingKey,
    UnexpectedKey,
    /// The union tag was missing, unknown, or resolved to no schema.
    DiscriminatorMismatch,
    /// A union alternative matched the object's shape but a field inside failed.
    ObjectMatchOccurred,
    /// Recursion into a self-referential schema was cut off.
    Cycle,
}

#[derive(Debug, Clone, PartialEq)]
pub struct MatchFailure {
    /// Path segments, outermost first. Index segments look like `[2]`.
    pub breadcrumbs: Vec<String>,
    pub message: String,
    pub causes: Vec<MatchFailure>,
    pub reason: FailureReason,
}

#[derive(Debug, Clone, PartialEq)]
pub enum MatchResult {
    Success,
    Failure(MatchFailure),
}

impl MatchFailure {
    pub fn new(message: impl Into<String>) -> Self {
        MatchFailure {
            breadcrumbs: Vec::new(),
            message: message.into(),
            causes: Vec::new(),
            reason: FailureReason::Mismatch,
        }
    }

    pub fn with_reason(mut self, reason: FailureReason) -> Self {
        self.reason = reason;
        self
    }

    /// One failure summarizing many; the parts stay reachable as causes.
    pub fn from_failures(mut failures: Vec<MatchFailure>) -> Self {
        if failures.len() == 1 {
            return failures.remove(0);
        }
        // The aggregate inherits the most specific reason among its causes so
        // tags like DiscriminatorMismatch survive aggregation.
        let reason = failures
            .iter()
            .map(|f| f.reason)
            .find(|r| *r != FailureReason::Mismatch)
            .unwrap_or(FailureReason::Mismatch);
        MatchFailure {
            breadcrumbs: Vec::new(),
            message: String::new(),
            causes: failures,
            reason,
        }
    }

    /// Prepend a path segment (field name, `[index]`, or union alias).
    pub fn prefixed(mut self, crumb: impl Into<String>) -> Self {
        self.breadcrumbs.insert(0, crumb.into());
        self
    }

    pub fn has_reason(&self, reason: FailureReason) -> bool {
        self.reason == reason || self.causes.iter().any(|c| c.has_reason(reason))
    }

    /// All leaf failures, with breadcrumbs accumulated from their ancestors.
    pub fn leaves(&self) -> Vec<MatchFailure> {
        if self.causes.is_empty() {
            return vec![self.clone()];
        }
        let mut out = Vec::new();
        for cause in &self.causes {
            for mut leaf in cause.leaves() {
                let mut crumbs = self.breadcrumbs.clone();
                crumbs.extend(leaf.breadcrumbs);
                leaf.breadcrumbs = crumbs;
                if leaf.message.is_empty() && !self.message.is_empty() {
                    leaf.message = self.message.clone();
                }
                out.push(leaf);
            }
        }
        out
    }

    /// Render as one line per leaf: `a.b[0].c: message`.
    pub fn report(&self) -> String {
        let mut lines = Vec::new();
        for leaf in self.leaves() {
            let path = join_breadcrumbs(&leaf.breadcrumbs);
            if path.is_empty() {
                lines.push(leaf.message);
            } else {
                lines.push(format!("{path}: {}", leaf.message));
            }
        }
        lines.join("\n")
    }
}

impl MatchResult {
    pub fn is_success(&self) -> bool {
        matches!(self, MatchResult::Success)
    }

    pub fn failure(self) -> Option<MatchFailure> {
        match self {
            MatchResult::Success => None,
            MatchResult::Failure(f) => Some(f),
        }
    }

    /// Success when the list is empty, otherwise one aggregated failure.
    pub fn from_failures(failures: Vec<MatchFailure>) -> Self {
        if failures.is_empty() {
            MatchResult::Success
        } else {
            MatchResult::Failure(MatchFailure::from_failures(failures))
        }
    }

    /// Collect every failure; never short-circuits.
    pub fn combine(results: impl IntoIterator<Item = MatchResult>) -> Self {
        let failures: Vec<MatchFailure> = results
            .into_iter()
            .filter_map(MatchResult::failure)
            .collect();
        MatchResult::from_failures(failures)
    }

    pub fn prefixed(self, crumb: impl Into<String>) -> Self {
        match self {
            MatchResult::Success => MatchResult::Success,
            MatchResult::Failure(f) => MatchResult::Failure(f.prefixed(crumb)),
        }
    }

    pub fn has_reason(&self, reason: FailureReason) -> bool {
        match self {
            MatchResult::Success => false,
            MatchResult::Failure(f) => f.has_reason(reason),
        }
    }

    pub fn report(&self) -> String {
        match self {
            MatchResult::Success => "Success".to_string(),
            MatchResult::Failure(f) => f.report(),
        }
    }
}

/// `["a", "b", "[0]", "c"]` → `a.b[0].c`. Index segments attach without a dot.
pub fn join_breadcrumbs(segments: &[String]) -> String {
    let mut out = String::new();
    for seg in segments {
        if seg.is_empty() {
            continue;
        }
        if !out.is_empty() && !seg.starts_with('[') {
            out.push('.');
        }
        out.push_str(seg);
    }
    out
}

/// Short rendering of a value for mismatch messages: type plus literal.
pub fn display_value(v: &Value) -> String {
    match v {
        Value::Null => "null".to_string(),
        Value::Bool(b) => format!("boolean {b}"),
        Value::Number(n) => format!("number {n}"),
        Value::String(s) => {
            if s.chars().count() > 40 {
                let head: String = s.chars().take(40).collect();
                format!("string \"{head}…\"")
            } else {
                format!("string {s:?}")
            }
        }
        Value::Array(xs) => format!("array of {} items", xs.len()),
        Value::Object(m) => format!("object with {} keys", m.len()),
    }
}
