//! Structural schema matching, generation, and compatibility checking for
//! JSON-like values.
//!
//! The core of the crate is the [`pattern::Pattern`] algebra: a closed sum
//! type over schema shapes supporting validation (`matches`), deterministic
//! example generation (`generate`), positive/negative test-variant streams
//! (`new_based_on` / `negative_based_on`), subtype checking (`encompasses`),
//! and partial-value completion (`fill_in_the_blanks`,
//! `resolve_substitutions`). Operations are threaded through a
//! [`resolver::Resolver`], the copy-on-write context holding named pattern
//! definitions, the example dictionary, and the cycle-detection state that
//! makes self-referential schemas safe.

pub mod cli;
pub mod error;
pub mod outcome;
pub mod parse;
pub mod pattern;
pub mod resolver;
pub mod result;
pub mod row;
pub mod strgen;
pub mod substitution;

pub use error::{EngineError, PatternError};
pub use outcome::Outcome;
pub use parse::{parse_schema, ParsedSchema};
pub use pattern::{NegativeConfig, Pattern};
pub use resolver::Resolver;
pub use result::{FailureReason, MatchFailure, MatchResult};
pub use row::Row;
pub use substitution::Substitution;
