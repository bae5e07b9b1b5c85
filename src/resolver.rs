//! The ambient context threaded through every pattern operation.
//!
//! A `Resolver` is cheap to clone and never mutated in place: operations that
//! need a different view (cycle scope entered, flags toggled) clone and
//! adjust. It carries the name→pattern table, the example dictionary, the
//! in-flight cycle set, mode flags, the mismatch-message strategy, and the
//! string generator plus RNG seed for deterministic generation.

use std::collections::BTreeSet;
use std::sync::Arc;

use indexmap::IndexMap;
use rand::rngs::StdRng;
use rand::SeedableRng;
use serde_json::Value;

use crate::error::EngineError;
use crate::outcome::Outcome;
use crate::pattern::Pattern;
use crate::result::{display_value, MatchFailure};
use crate::strgen::{RandRegexGen, StringGen};

/// Phrasing strategy for mismatch messages, injectable so different report
/// surfaces (contract vs stub) can word things their own way.
pub trait MismatchMessages: Send + Sync {
    fn mismatch(&self, expected: &str, actual: &str) -> String {
        format!("expected {expected}, got {actual}")
    }

    fn missing_key(&self, kind: &str, name: &str) -> String {
        format!("{kind} {name:?} was missing")
    }

    fn unexpected_key(&self, kind: &str, name: &str) -> String {
        format!("{kind} {name:?} was unexpected")
    }
}

pub struct DefaultMessages;

impl MismatchMessages for DefaultMessages {}

#[derive(Clone)]
pub struct Resolver {
    patterns: IndexMap<String, Pattern>,
    dictionary: IndexMap<String, Value>,
    /// Names currently being dereferenced on this call chain. Re-entry means
    /// a cycle. Local to one chain: clones diverge, nothing is popped.
    in_flight: BTreeSet<String>,
    pub all_patterns_mandatory: bool,
    pub is_negative: bool,
    /// When set, dictionary lookups that fail produce an error instead of
    /// falling back to algorithmic generation.
    pub strict_dictionary: bool,
    pub seed: u64,
    messages: Arc<dyn MismatchMessages>,
    string_gen: Arc<dyn StringGen>,
}

impl Default for Resolver {
    fn default() -> Self {
        Resolver {
            patterns: IndexMap::new(),
            dictionary: IndexMap::new(),
            in_flight: BTreeSet::new(),
            all_patterns_mandatory: false,
            is_negative: false,
            strict_dictionary: false,
            seed: 0,
            messages: Arc::new(DefaultMessages),
            string_gen: Arc::new(RandRegexGen::default()),
        }
    }
}

impl Resolver {
    pub fn new() -> Self {
        Resolver::default()
    }

    pub fn with_patterns(mut self, patterns: IndexMap<String, Pattern>) -> Self {
        self.patterns = patterns;
        self
    }

    pub fn add_pattern(mut self, name: impl Into<String>, pattern: Pattern) -> Self {
        self.patterns.insert(name.into(), pattern);
        self
    }

    pub fn with_dictionary(mut self, dictionary: IndexMap<String, Value>) -> Self {
        self.dictionary = dictionary;
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    pub fn with_messages(mut self, messages: Arc<dyn MismatchMessages>) -> Self {
        self.messages = messages;
        self
    }

    pub fn with_string_gen(mut self, string_gen: Arc<dyn StringGen>) -> Self {
        self.string_gen = string_gen;
        self
    }

    pub fn with_mandatory_patterns(mut self, on: bool) -> Self {
        self.all_patterns_mandatory = on;
        self
    }

    pub fn with_negative(mut self, on: bool) -> Self {
        self.is_negative = on;
        self
    }

    pub fn with_strict_dictionary(mut self, on: bool) -> Self {
        self.strict_dictionary = on;
        self
    }

    pub fn pattern_names(&self) -> impl Iterator<Item = &str> {
        self.patterns.keys().map(String::as_str)
    }

    /// Look up a pattern by name. Accepts both `Name` and the token form
    /// `(Name)`; builtin type tokens resolve to their scalar patterns.
    pub fn get_pattern(&self, name: &str) -> Outcome<Pattern> {
        let bare = strip_token(name);
        if let Some(p) = Pattern::builtin(bare) {
            return Outcome::Value(p);
        }
        match self.patterns.get(bare) {
            Some(p) => Outcome::Value(p.clone()),
            None => Outcome::Exception(EngineError::UnknownPattern(bare.to_string())),
        }
    }

    pub fn has_pattern(&self, name: &str) -> bool {
        let bare = strip_token(name);
        Pattern::builtin(bare).is_some() || self.patterns.contains_key(bare)
    }

    /// True if `name` is already being resolved on this call chain.
    pub fn has_seen(&self, name: &str) -> bool {
        self.in_flight.contains(strip_token(name))
    }

    /// Run `f` with `key` marked in flight. Re-entering the same key signals
    /// a cycle: escapable (`nullable`) callers get `Value(None)` so they can
    /// omit the branch; mandatory callers get the cycle exception.
    pub fn with_cycle_prevention<T>(
        &self,
        key: &str,
        nullable: bool,
        f: impl FnOnce(&Resolver) -> Outcome<T>,
    ) -> Outcome<Option<T>> {
        let bare = strip_token(key);
        if self.in_flight.contains(bare) {
            log::debug!("cycle detected through {bare}");
            if nullable {
                return Outcome::Value(None);
            }
            return Outcome::Exception(EngineError::Cycle(bare.to_string()));
        }
        let mut scoped = self.clone();
        scoped.in_flight.insert(bare.to_string());
        f(&scoped).map(Some)
    }

    /// Dictionary/explicit-example lookup, consulted before algorithmic
    /// generation. Keys are pattern tokens like `(Name)` or `(number)`.
    pub fn resolve_example(&self, token: &str) -> Option<Value> {
        self.dictionary
            .get(token)
            .or_else(|| self.dictionary.get(strip_token(token)))
            .cloned()
    }

    pub fn generate(&self, pattern: &Pattern) -> Outcome<Value> {
        pattern.generate(self)
    }

    pub fn string_gen(&self) -> &dyn StringGen {
        self.string_gen.as_ref()
    }

    /// A deterministic sample string matching `regex` within the length
    /// bounds, drawn through the configured generator.
    pub fn provide_string(
        &self,
        regex: &str,
        min_len: usize,
        max_len: usize,
    ) -> Result<String, EngineError> {
        self.string_gen.random(regex, min_len, max_len, self.seed)
    }

    pub fn messages(&self) -> &dyn MismatchMessages {
        self.messages.as_ref()
    }

    pub fn rng(&self) -> StdRng {
        StdRng::seed_from_u64(self.seed)
    }

    /// Standard mismatch failure phrased through the message strategy.
    pub fn mismatch(&self, expected: &str, actual: &Value) -> MatchFailure {
        MatchFailure::new(self.messages.mismatch(expected, &display_value(actual)))
    }
}

/// `(Name)` → `Name`; anything else passes through.
pub fn strip_token(name: &str) -> &str {
    name.strip_prefix('(')
        .and_then(|rest| rest.strip_suffix(')'))
        .unwrap_or(name)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn token_stripping() {
        assert_eq!(strip_token("(Address)"), "Address");
        assert_eq!(strip_token("Address"), "Address");
        assert_eq!(strip_token("(string)"), "string");
    }

    #[test]
    fn cycle_prevention_blocks_reentry() {
        let resolver = Resolver::new();
        let outcome = resolver.with_cycle_prevention("Node", false, |r| {
            r.with_cycle_prevention("Node", false, |_| Outcome::Value(1))
        });
        assert!(outcome.is_cycle());
    }

    #[test]
    fn nullable_reentry_yields_omission() {
        let resolver = Resolver::new();
        let outcome = resolver.with_cycle_prevention("Node", false, |r| {
            r.with_cycle_prevention("Node", true, |_| Outcome::Value(1))
        });
        assert_eq!(outcome, Outcome::Value(Some(None)));
    }

    #[test]
    fn sibling_chains_do_not_see_each_other() {
        let resolver = Resolver::new();
        let first = resolver.with_cycle_prevention("Node", false, |_| Outcome::Value(1));
        let second = resolver.with_cycle_prevention("Node", false, |_| Outcome::Value(2));
        assert_eq!(first, Outcome::Value(Some(1)));
        assert_eq!(second, Outcome::Value(Some(2)));
    }

    #[test]
    fn builtin_tokens_resolve_without_a_table() {
        let resolver = Resolver::new();
        assert!(resolver.get_pattern("(string)").is_value());
        assert!(resolver.get_pattern("(number)").is_value());
        assert!(!resolver.get_pattern("(Missing)").is_value());
    }
}
