//! The value-pattern contract (C1). Per-argument validation lives outside
//! this crate in the general case — the analyser only ever calls
//! [`Pattern::validate`]. A handful of built-in patterns are provided so the
//! grammar can be exercised without an external pattern library.

use std::fmt;

/// Outcome of validating one token against a [`Pattern`].
#[derive(Debug, Clone, PartialEq)]
pub enum Validation {
    Valid(String),
    Invalid(String),
}

impl Validation {
    pub fn is_valid(&self) -> bool {
        matches!(self, Validation::Valid(_))
    }
}

/// A value-pattern: validates (and optionally coerces) one raw token.
///
/// Implementors are the external "value-pattern library" collaborator
/// described in the purpose section; this crate only ever calls `validate`.
pub trait Pattern: fmt::Debug + Send + Sync {
    fn validate(&self, text: &str) -> Validation;

    /// Display name used in unmatch/missing diagnostics and completion hints.
    fn display(&self) -> String;
}

/// Accepts any non-empty token verbatim.
#[derive(Debug, Clone, Copy, Default)]
pub struct AnyStr;

impl Pattern for AnyStr {
    fn validate(&self, text: &str) -> Validation {
        Validation::Valid(text.to_string())
    }

    fn display(&self) -> String {
        "str".to_string()
    }
}

/// Accepts a token that parses as an `i64`.
#[derive(Debug, Clone, Copy, Default)]
pub struct IntPattern;

impl Pattern for IntPattern {
    fn validate(&self, text: &str) -> Validation {
        match text.parse::<i64>() {
            Ok(_) => Validation::Valid(text.to_string()),
            Err(_) => Validation::Invalid(format!("`{text}` is not an integer")),
        }
    }

    fn display(&self) -> String {
        "int".to_string()
    }
}

/// Accepts a token that parses as an `f64`.
#[derive(Debug, Clone, Copy, Default)]
pub struct FloatPattern;

impl Pattern for FloatPattern {
    fn validate(&self, text: &str) -> Validation {
        match text.parse::<f64>() {
            Ok(_) => Validation::Valid(text.to_string()),
            Err(_) => Validation::Invalid(format!("`{text}` is not a number")),
        }
    }

    fn display(&self) -> String {
        "float".to_string()
    }
}

/// Matches one of a fixed set of literal values.
#[derive(Debug, Clone)]
pub struct LiteralSet(pub Vec<String>);

impl Pattern for LiteralSet {
    fn validate(&self, text: &str) -> Validation {
        if self.0.iter().any(|v| v == text) {
            Validation::Valid(text.to_string())
        } else {
            Validation::Invalid(format!("`{text}` is not one of {:?}", self.0))
        }
    }

    fn display(&self) -> String {
        self.0.join("|")
    }
}

/// The wildcard pattern (`AllParam`, spelled `*` in the grammar). Always
/// valid; the args analyser special-cases its alias to absorb every
/// remaining token rather than treating it as an ordinary normal slot.
#[derive(Debug, Clone, Copy, Default)]
pub struct AllParam;

impl Pattern for AllParam {
    fn validate(&self, text: &str) -> Validation {
        Validation::Valid(text.to_string())
    }

    fn display(&self) -> String {
        "*".to_string()
    }
}
