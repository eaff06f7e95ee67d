//! Error taxonomy: eager compile-time failures vs. the in-band parse signal sum.
//!
//! `AlconnaError` is a real `std::error::Error` — it surfaces at grammar
//! registration time, before any input is ever parsed. Everything that can
//! happen *during* a parse (expected failures and the control-flow
//! interrupts like fuzzy-match or completion) is instead a plain value,
//! [`ParseSignal`], so the analyser can match over it exhaustively instead
//! of relying on panics or a boxed `dyn Error`.

use thiserror::Error;

/// Errors raised eagerly when a grammar is compiled or registered.
#[derive(Debug, Error)]
pub enum AlconnaError {
    #[error("command name must not be empty")]
    EmptyCommandName,

    #[error("option `{0}` has no aliases")]
    EmptyOptionAliases(String),

    #[error("duplicate param id `{0}` within the same scope")]
    DuplicateParamId(String),

    #[error("args slot `{0}` is out of order: normals must precede variadics")]
    ArgsOutOfOrder(String),

    #[error("args may declare at most one `unpack` slot, found a second at `{0}`")]
    MultipleUnpackSlots(String),

    #[error("invalid header pattern: {0}")]
    InvalidHeaderPattern(String),

    #[error("command manager exceeded max_count ({0})")]
    ExceedMaxCount(usize),

    #[error("no command registered under id {0}")]
    UnknownCommand(String),
}

/// A single positional/keyword token that failed to validate.
#[derive(Debug, Clone, PartialEq)]
pub struct ParseFailure {
    /// The raw token that caused the failure, if the input hadn't been exhausted.
    pub token: Option<String>,
    /// Localized-ish, user-facing message.
    pub message: String,
    /// Tokens that remained unconsumed when the failure was raised.
    pub remaining: Vec<String>,
}

impl ParseFailure {
    pub fn new(token: Option<String>, message: impl Into<String>, remaining: Vec<String>) -> Self {
        Self {
            token,
            message: message.into(),
            remaining,
        }
    }
}

/// Non-fatal control-flow interrupts: these short-circuit the parse and
/// produce a `matched = false` [`crate::result::Arparma`] carrying their
/// payload, rather than propagating like an error.
#[derive(Debug, Clone, PartialEq)]
pub enum ControlSignal {
    /// A special keyword (help/shortcut/completion) was seen.
    SpecialOptionTriggered(SpecialOption),
    /// The input's head was close enough to a known header to suggest a fix.
    FuzzyMatchSuccess { source: String, target: String },
    /// A completion context requested a prompt list instead of finishing the parse.
    PauseTriggered(Vec<String>),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpecialOption {
    Help,
    Shortcut,
    Completion,
}

/// The sum every fallible parse step returns: either it consumed tokens
/// cleanly (`Ok`), hit an expected failure, or raised a control signal.
#[derive(Debug, Clone, PartialEq)]
pub enum ParseSignal {
    Failure(ParseFailure),
    Control(ControlSignal),
}

impl From<ParseFailure> for ParseSignal {
    fn from(f: ParseFailure) -> Self {
        ParseSignal::Failure(f)
    }
}

impl From<ControlSignal> for ParseSignal {
    fn from(c: ControlSignal) -> Self {
        ParseSignal::Control(c)
    }
}

pub type ParseResult<T> = Result<T, ParseSignal>;
