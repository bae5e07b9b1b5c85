//! String-from-regex generation, treated as a pluggable black box.
//!
//! Scalar string patterns with a `pattern` constraint need sample strings
//! matching the regex. The engine only depends on the [`StringGen`] trait;
//! the default implementation samples from the compiled regex HIR via
//! `rand_regex`, seeded for determinism.

use rand::distributions::Distribution;
use rand::rngs::StdRng;
use rand::SeedableRng;
use regex_syntax::hir::{Hir, HirKind};

use crate::error::EngineError;

pub trait StringGen: Send + Sync {
    /// A random matching string with length in `[min_len, max_len]`.
    fn random(
        &self,
        regex: &str,
        min_len: usize,
        max_len: usize,
        seed: u64,
    ) -> Result<String, EngineError>;

    /// A shortest-effort matching string.
    fn shortest(&self, regex: &str) -> Result<String, EngineError>;

    /// A longest matching string not exceeding `max` chars, if one exists.
    fn longest(&self, regex: &str, max: usize) -> Result<Option<String>, EngineError>;

    /// True when the regex admits unboundedly long strings.
    fn is_infinite(&self, regex: &str) -> bool;
}

/// Default generator backed by `rand_regex`.
pub struct RandRegexGen {
    /// Extra repeat count granted to unbounded quantifiers during sampling.
    pub max_repeat: u32,
}

impl Default for RandRegexGen {
    fn default() -> Self {
        RandRegexGen { max_repeat: 8 }
    }
}

impl RandRegexGen {
    fn compile(&self, regex: &str, max_repeat: u32) -> Result<rand_regex::Regex, EngineError> {
        // rand_regex rejects anchors; strip the conventional ones first.
        let mut trimmed = regex;
        if let Some(rest) = trimmed.strip_prefix('^') {
            trimmed = rest;
        }
        if let Some(rest) = trimmed.strip_suffix('$') {
            trimmed = rest;
        }
        rand_regex::Regex::compile(trimmed, max_repeat)
            .map_err(|e| EngineError::StringGen(format!("cannot sample from {regex:?}: {e}")))
    }

    fn samples(
        &self,
        regex: &str,
        max_repeat: u32,
        seed: u64,
        count: usize,
    ) -> Result<Vec<String>, EngineError> {
        let gen = self.compile(regex, max_repeat)?;
        let mut rng = StdRng::seed_from_u64(seed);
        Ok((0..count).map(|_| gen.sample(&mut rng)).collect())
    }
}

impl StringGen for RandRegexGen {
    fn random(
        &self,
        regex: &str,
        min_len: usize,
        max_len: usize,
        seed: u64,
    ) -> Result<String, EngineError> {
        let candidates = self.samples(regex, self.max_repeat, seed, 64)?;
        candidates
            .into_iter()
            .find(|s| {
                let n = s.chars().count();
                n >= min_len && n <= max_len
            })
            .ok_or_else(|| {
                EngineError::StringGen(format!(
                    "no sample of {regex:?} fits length bounds [{min_len}, {max_len}]"
                ))
            })
    }

    fn shortest(&self, regex: &str) -> Result<String, EngineError> {
        let candidates = self.samples(regex, 0, 0, 16)?;
        candidates
            .into_iter()
            .min_by_key(|s| s.chars().count())
            .ok_or_else(|| EngineError::StringGen(format!("no sample of {regex:?}")))
    }

    fn longest(&self, regex: &str, max: usize) -> Result<Option<String>, EngineError> {
        let candidates = self.samples(regex, max.min(u32::MAX as usize) as u32, 0, 16)?;
        Ok(candidates
            .into_iter()
            .filter(|s| s.chars().count() <= max)
            .max_by_key(|s| s.chars().count()))
    }

    fn is_infinite(&self, regex: &str) -> bool {
        match regex_syntax::Parser::new().parse(regex) {
            Ok(hir) => hir_is_infinite(&hir),
            Err(_) => false,
        }
    }
}

fn hir_is_infinite(hir: &Hir) -> bool {
    match hir.kind() {
        HirKind::Repetition(rep) => rep.max.is_none() || hir_is_infinite(&rep.sub),
        HirKind::Capture(cap) => hir_is_infinite(&cap.sub),
        HirKind::Concat(parts) | HirKind::Alternation(parts) => {
            parts.iter().any(hir_is_infinite)
        }
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use regex::Regex;

    #[test]
    fn random_sample_matches_its_own_regex() {
        let gen = RandRegexGen::default();
        let rx = "[a-z]{3,6}";
        let s = gen.random(rx, 0, 100, 7).unwrap();
        assert!(Regex::new("^[a-z]{3,6}$").unwrap().is_match(&s), "{s:?}");
    }

    #[test]
    fn anchored_regexes_are_accepted() {
        let gen = RandRegexGen::default();
        let s = gen.random("^[0-9]{4}$", 0, 10, 1).unwrap();
        assert_eq!(s.chars().count(), 4);
    }

    #[test]
    fn infinity_detection() {
        let gen = RandRegexGen::default();
        assert!(gen.is_infinite("[a-z]+"));
        assert!(gen.is_infinite("ab(cd)*"));
        assert!(!gen.is_infinite("[a-z]{3,6}"));
        assert!(!gen.is_infinite("abc"));
    }

    #[test]
    fn shortest_respects_zero_repeats() {
        let gen = RandRegexGen::default();
        let s = gen.shortest("ab[0-9]*").unwrap();
        assert_eq!(s, "ab");
    }
}
