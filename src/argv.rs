//! C2 — the streaming, rewindable token vector (`Argv`).
//!
//! Input is a sequence of [`Segment`]s: some are text to be tokenized, some
//! are opaque values (images, mentions, ...) that must ride through parsing
//! untouched. Tokenization is separator- and quote-aware; the resulting
//! stream supports speculative consumption via `checkpoint`/`restore`.

use std::any::Any;
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::sync::Arc;

use crate::error::SpecialOption;

/// One opaque, non-text element of the input. Preserved untouched —
/// the analyser never inspects `payload`, only ever moves it around.
#[derive(Clone)]
pub struct Opaque {
    pub label: String,
    pub payload: Arc<dyn Any + Send + Sync>,
}

impl Opaque {
    pub fn new(label: impl Into<String>, payload: Arc<dyn Any + Send + Sync>) -> Self {
        Self {
            label: label.into(),
            payload,
        }
    }
}

impl fmt::Debug for Opaque {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Opaque({})", self.label)
    }
}

impl PartialEq for Opaque {
    fn eq(&self, other: &Self) -> bool {
        self.label == other.label && Arc::ptr_eq(&self.payload, &other.payload)
    }
}

/// A segment of the raw, pre-tokenization input.
#[derive(Debug, Clone, PartialEq)]
pub enum Segment {
    Text(String),
    Opaque(Opaque),
}

impl From<&str> for Segment {
    fn from(s: &str) -> Self {
        Segment::Text(s.to_string())
    }
}

impl From<String> for Segment {
    fn from(s: String) -> Self {
        Segment::Text(s)
    }
}

/// One token in the stream: either a string slice produced by tokenizing a
/// text segment, or an opaque value carried through in place.
#[derive(Debug, Clone, PartialEq)]
pub enum Token {
    Str(String),
    Opaque(Opaque),
}

impl Token {
    pub fn is_str(&self) -> bool {
        matches!(self, Token::Str(_))
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Token::Str(s) => Some(s.as_str()),
            Token::Opaque(_) => None,
        }
    }
}

pub type Separators = HashSet<char>;

pub fn separators(chars: &str) -> Separators {
    chars.chars().collect()
}

fn default_separators() -> Separators {
    separators(" ")
}

/// Which Arg/Option was being matched when a failure or completion request
/// was raised. Threaded explicitly rather than hidden in a global, per
/// the "ambient context" design note.
#[derive(Debug, Clone, Default)]
pub struct ParseContext {
    pub current_arg: Option<String>,
    pub current_option: Option<String>,
    pub path: Vec<String>,
}

/// A checkpoint of the stream's mutable state, for speculative matching.
#[derive(Debug, Clone)]
pub struct Checkpoint {
    raw_data: Vec<Token>,
    current_index: usize,
}

/// The streaming, rewindable token vector.
pub struct Argv {
    raw_data: Vec<Token>,
    current_index: usize,
    separators: Separators,
    filter_crlf: bool,
    pub special: HashMap<String, SpecialOption>,
    pub param_ids: HashSet<String>,
    pub namespace: String,
    pub fuzzy_match: bool,
    pub fuzzy_threshold: f64,
    pub context: ParseContext,
    /// Set by a caller that wants an unresolvable head to produce a
    /// completion prompt list (`PauseTriggered`) instead of an ordinary
    /// parse failure. See `Alconna::parse_with_completion`.
    pub comp_ctx: bool,
}

impl Argv {
    /// Tokenize `segments` into the stream. Text segments are split honoring
    /// `seps`; paired quotes (`'`, `"`) suppress splitting inside them, and a
    /// backslash escapes the following character (including a quote).
    /// Opaque segments become a single token each, untouched.
    pub fn build(segments: &[Segment], seps: &Separators, filter_crlf: bool) -> Self {
        let mut raw_data = Vec::new();
        for segment in segments {
            match segment {
                Segment::Text(text) => {
                    let text = if filter_crlf {
                        text.replace('\r', "")
                    } else {
                        text.clone()
                    };
                    for word in tokenize(&text, seps) {
                        raw_data.push(Token::Str(word));
                    }
                }
                Segment::Opaque(o) => raw_data.push(Token::Opaque(o.clone())),
            }
        }

        Self {
            raw_data,
            current_index: 0,
            separators: seps.clone(),
            filter_crlf,
            special: HashMap::new(),
            param_ids: HashSet::new(),
            namespace: String::new(),
            fuzzy_match: false,
            fuzzy_threshold: 0.6,
            context: ParseContext::default(),
            comp_ctx: false,
        }
    }

    pub fn with_default_separators(segments: &[Segment]) -> Self {
        Self::build(segments, &default_separators(), true)
    }

    pub fn current_index(&self) -> usize {
        self.current_index
    }

    /// Count of tokens remaining in the stream, recomputed live: a one-shot
    /// sub-split in `next` can grow this past whatever was counted at build
    /// time, so it is a view, not a field frozen at construction.
    pub fn ndata(&self) -> usize {
        self.raw_data.len()
    }

    pub fn is_exhausted(&self) -> bool {
        self.current_index >= self.raw_data.len()
    }

    /// Look at the next token without consuming it.
    pub fn peek(&self) -> Option<&Token> {
        self.raw_data.get(self.current_index)
    }

    /// Consume and return the next token. If `seps` differs from the
    /// stream's own separators, perform a one-shot sub-split of the pending
    /// string token against `seps` and push the remainder back in place.
    pub fn next(&mut self, seps: Option<&Separators>) -> Option<(Token, bool)> {
        let tok = self.raw_data.get(self.current_index)?.clone();
        match tok {
            Token::Opaque(o) => {
                self.current_index += 1;
                Some((Token::Opaque(o), false))
            }
            Token::Str(s) => {
                let use_seps = seps.filter(|s| *s != &self.separators);
                if let Some(use_seps) = use_seps {
                    if let Some(pos) = s.find(|c| use_seps.contains(&c)) {
                        let head = s[..pos].to_string();
                        let rest = s[pos + 1..].to_string();
                        self.current_index += 1;
                        if !rest.is_empty() {
                            self.raw_data.insert(self.current_index, Token::Str(rest));
                        }
                        return Some((Token::Str(head), true));
                    }
                }
                self.current_index += 1;
                Some((Token::Str(s), true))
            }
        }
    }

    /// Undo the most recent `next()`. If `replace` is set, overwrite the
    /// slot now at `current_index` (used when that slot already holds a
    /// remainder pushed back by a prior sub-split, e.g. re-merging the tail
    /// of a compact option like `-vvv` rather than inserting a duplicate).
    /// Otherwise the token is reinserted ahead of whatever is there.
    pub fn rollback(&mut self, token: Token, replace: bool) {
        if self.current_index == 0 {
            self.raw_data.insert(0, token);
            return;
        }
        self.current_index -= 1;
        if replace && self.current_index < self.raw_data.len() {
            self.raw_data[self.current_index] = token;
        } else {
            self.raw_data.insert(self.current_index, token);
        }
    }

    /// Return the remaining tokens. When `recover` is true the stream is
    /// left untouched; otherwise the tokens are consumed.
    pub fn release(&mut self, seps: Option<&Separators>, recover: bool) -> Vec<Token> {
        let _ = seps; // remaining tokens are returned as-is, already tokenized
        if recover {
            self.raw_data[self.current_index..].to_vec()
        } else {
            let rest = self.raw_data.split_off(self.current_index);
            rest
        }
    }

    /// Snapshot the mutable state for speculative matching.
    pub fn checkpoint(&self) -> Checkpoint {
        Checkpoint {
            raw_data: self.raw_data.clone(),
            current_index: self.current_index,
        }
    }

    /// Restore a prior snapshot, discarding any speculative mutation.
    pub fn restore(&mut self, checkpoint: Checkpoint) {
        self.raw_data = checkpoint.raw_data;
        self.current_index = checkpoint.current_index;
    }

    /// Alias for `checkpoint`, matching the spec's naming.
    pub fn data_set(&self) -> Checkpoint {
        self.checkpoint()
    }

    /// Alias for `restore`, matching the spec's naming.
    pub fn data_reset(&mut self, checkpoint: Checkpoint) {
        self.restore(checkpoint)
    }

    /// Render the remaining tokens back into a shell-ish string, joined by
    /// a single space — used by the tokenization round-trip property test.
    pub fn render_remaining(&self) -> String {
        self.raw_data[self.current_index..]
            .iter()
            .filter_map(|t| t.as_str())
            .collect::<Vec<_>>()
            .join(" ")
    }
}

/// Quote- and escape-aware tokenizer shared by `Argv::build` and the
/// shortcut engine's re-tokenization of rewritten input.
pub fn tokenize(input: &str, seps: &Separators) -> Vec<String> {
    let mut tokens = Vec::new();
    let mut current = String::new();
    let mut in_single_quote = false;
    let mut in_double_quote = false;
    let mut escaped = false;
    let mut seen_quote = false;

    for ch in input.chars() {
        if escaped {
            current.push(ch);
            escaped = false;
            continue;
        }

        match ch {
            '\\' if !in_single_quote => {
                escaped = true;
            }
            '\'' if !in_double_quote => {
                in_single_quote = !in_single_quote;
                seen_quote = true;
            }
            '"' if !in_single_quote => {
                in_double_quote = !in_double_quote;
                seen_quote = true;
            }
            c if seps.contains(&c) && !in_single_quote && !in_double_quote => {
                if !current.is_empty() || seen_quote {
                    tokens.push(std::mem::take(&mut current));
                    seen_quote = false;
                }
            }
            _ => {
                current.push(ch);
            }
        }
    }

    if !current.is_empty() || seen_quote {
        tokens.push(current);
    }

    tokens
}

#[cfg(test)]
mod tests {
    use super::*;

    fn seg(s: &str) -> Vec<Segment> {
        vec![Segment::Text(s.to_string())]
    }

    #[test]
    fn tokenizes_on_default_separator() {
        let toks = tokenize("echo hello world", &default_separators());
        assert_eq!(toks, vec!["echo", "hello", "world"]);
    }

    #[test]
    fn quotes_suppress_splitting() {
        let toks = tokenize(r#"say "hello world""#, &default_separators());
        assert_eq!(toks, vec!["say", "hello world"]);
    }

    #[test]
    fn backslash_escapes_quote() {
        let toks = tokenize(r#"say \"hi"#, &default_separators());
        assert_eq!(toks, vec!["say", "\"hi"]);
    }

    #[test]
    fn tokenization_round_trips() {
        let input = "add 2 3";
        let argv = Argv::with_default_separators(&seg(input));
        assert_eq!(argv.render_remaining(), input);
    }

    #[test]
    fn next_then_rollback_is_a_no_op() {
        let mut argv = Argv::with_default_separators(&seg("echo hello world"));
        let (first, is_str) = argv.next(None).unwrap();
        assert_eq!(first, Token::Str("echo".into()));
        assert!(is_str);
        argv.rollback(first.clone(), false);
        let (again, is_str_again) = argv.next(None).unwrap();
        assert_eq!(first, again);
        assert_eq!(is_str, is_str_again);
    }

    #[test]
    fn opaque_segments_pass_through_untouched() {
        let payload: Arc<dyn Any + Send + Sync> = Arc::new(42i32);
        let segs = vec![
            Segment::Text("send".to_string()),
            Segment::Opaque(Opaque::new("image", payload)),
        ];
        let mut argv = Argv::with_default_separators(&segs);
        let (_first, _) = argv.next(None).unwrap();
        let (second, is_str) = argv.next(None).unwrap();
        assert!(!is_str);
        match second {
            Token::Opaque(o) => assert_eq!(o.label, "image"),
            Token::Str(_) => panic!("expected opaque token"),
        }
    }

    #[test]
    fn next_with_alternate_separator_splits_in_place() {
        let mut argv = Argv::with_default_separators(&seg("--opt=value rest"));
        let eq_seps = separators("=");
        let (head, _) = argv.next(Some(&eq_seps)).unwrap();
        assert_eq!(head, Token::Str("--opt".into()));
        let (tail, _) = argv.next(None).unwrap();
        assert_eq!(tail, Token::Str("value".into()));
        let (rest, _) = argv.next(None).unwrap();
        assert_eq!(rest, Token::Str("rest".into()));
    }
}
