//! C3 — the header matcher: compiles prefixes + command name into a union
//! of literal-set / regex / pattern / `Double`-pair matchers, with a compact
//! (glued-prefix) variant.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use regex::Regex;

use crate::argv::{Argv, Token};
use crate::error::{ControlSignal, ParseFailure, ParseResult};
use crate::pattern::Pattern;

/// A prefix token: either literal text or the label of an opaque value
/// (e.g. a platform-specific "at-mention" object) that must precede the
/// command name.
#[derive(Debug, Clone, PartialEq)]
pub enum Prefix {
    Text(String),
    Opaque(String),
}

/// How the command name itself was declared by the grammar author.
#[derive(Debug, Clone)]
pub enum HeaderCommand {
    /// A plain name, or one containing `{name}`/`{name:type}` braces, or
    /// prefixed with `re:` to force a raw regex.
    Literal(String),
    /// A value-level pattern validates the head token directly.
    Pattern(Arc<dyn Pattern>),
}

#[derive(Debug, Clone)]
pub enum HeaderContent {
    LiteralSet(HashSet<String>),
    Regex {
        pattern: Regex,
        group_names: Vec<String>,
    },
    Pattern(Arc<dyn Pattern>),
    DoublePairs(Vec<(Prefix, String)>),
}

#[derive(Debug, Clone)]
pub struct Header {
    pub command_name: String,
    pub prefixes: Vec<Prefix>,
    pub content: HeaderContent,
    pub compact: bool,
}

#[derive(Debug, Clone, Default)]
pub struct HeadResult {
    pub origin: (String, Vec<String>),
    pub result: String,
    pub matched: bool,
    pub groups: HashMap<String, String>,
    /// Diagnostic notes about any compaction/auto-correction applied while matching.
    pub fixes: Vec<String>,
}

fn has_only_text_prefixes(prefixes: &[Prefix]) -> bool {
    prefixes.iter().all(|p| matches!(p, Prefix::Text(_)))
}

/// Translate `{name}`/`{name:type}` braces into a named regex group.
/// `int` maps to `\d+`; anything else (including no type) maps to `\S+`.
fn brace_type_to_fragment(ty: &str) -> &'static str {
    match ty {
        "int" => r"\d+",
        "float" => r"\d+(?:\.\d+)?",
        _ => r"\S+",
    }
}

fn compile_braced_regex(literal: &str) -> (String, Vec<String>) {
    let mut pattern = String::from("^");
    let mut group_names = Vec::new();
    let mut rest = literal;

    while let Some(open) = rest.find('{') {
        let Some(close) = rest[open..].find('}') else {
            pattern.push_str(&regex::escape(rest));
            rest = "";
            break;
        };
        let close = open + close;
        pattern.push_str(&regex::escape(&rest[..open]));

        let inner = &rest[open + 1..close];
        let (name, ty) = match inner.split_once(':') {
            Some((n, t)) => (n, t),
            None => (inner, ""),
        };
        group_names.push(name.to_string());
        pattern.push_str(&format!(
            "(?P<{name}>{})",
            brace_type_to_fragment(ty),
            name = name
        ));

        rest = &rest[close + 1..];
    }
    pattern.push_str(&regex::escape(rest));
    pattern.push('$');
    (pattern, group_names)
}

impl Header {
    pub fn compile(
        command: HeaderCommand,
        prefixes: Vec<Prefix>,
        compact: bool,
    ) -> Result<Header, crate::error::AlconnaError> {
        let command_name = match &command {
            HeaderCommand::Literal(s) => s.clone(),
            HeaderCommand::Pattern(p) => p.display(),
        };
        if command_name.is_empty() {
            return Err(crate::error::AlconnaError::EmptyCommandName);
        }

        let content = match &command {
            HeaderCommand::Pattern(p) => HeaderContent::Pattern(p.clone()),
            HeaderCommand::Literal(literal) => {
                if let Some(raw) = literal.strip_prefix("re:") {
                    let pattern = Regex::new(&format!("^(?:{raw})$")).map_err(|e| {
                        crate::error::AlconnaError::InvalidHeaderPattern(e.to_string())
                    })?;
                    HeaderContent::Regex {
                        pattern,
                        group_names: Vec::new(),
                    }
                } else if literal.contains('{') && literal.contains('}') {
                    let (pattern_str, group_names) = compile_braced_regex(literal);
                    let pattern = Regex::new(&pattern_str).map_err(|e| {
                        crate::error::AlconnaError::InvalidHeaderPattern(e.to_string())
                    })?;
                    HeaderContent::Regex {
                        pattern,
                        group_names,
                    }
                } else if has_only_text_prefixes(&prefixes) {
                    let mut set = HashSet::new();
                    if prefixes.is_empty() {
                        set.insert(literal.clone());
                    } else {
                        for p in &prefixes {
                            if let Prefix::Text(t) = p {
                                set.insert(format!("{t}{literal}"));
                            }
                        }
                    }
                    HeaderContent::LiteralSet(set)
                } else {
                    let pairs = prefixes
                        .iter()
                        .cloned()
                        .map(|p| (p, literal.clone()))
                        .collect();
                    HeaderContent::DoublePairs(pairs)
                }
            }
        };

        Ok(Header {
            command_name,
            prefixes,
            content,
            compact,
        })
    }

    /// All fully-qualified literal forms of this header, used for fuzzy
    /// suggestion comparisons.
    fn literal_candidates(&self) -> Vec<String> {
        match &self.content {
            HeaderContent::LiteralSet(set) => set.iter().cloned().collect(),
            _ => vec![self.command_name.clone()],
        }
    }

    /// Attempt to match the stream's head token. Consumes on success;
    /// restores the stream on failure.
    pub fn match_head(&self, argv: &mut Argv) -> ParseResult<HeadResult> {
        let checkpoint = argv.checkpoint();

        match &self.content {
            HeaderContent::LiteralSet(set) => {
                let Some((Token::Str(text), true)) = argv.next(None) else {
                    argv.restore(checkpoint);
                    return Err(self.fail_or_fuzzy(argv, None));
                };

                if set.contains(&text) {
                    return Ok(HeadResult {
                        origin: (self.command_name.clone(), prefix_labels(&self.prefixes)),
                        result: text,
                        matched: true,
                        groups: HashMap::new(),
                        fixes: Vec::new(),
                    });
                }

                if self.compact {
                    if let Some(head) = set.iter().find(|h| text.starts_with(h.as_str())) {
                        let remainder = text[head.len()..].to_string();
                        if !remainder.is_empty() {
                            argv.rollback(Token::Str(remainder), false);
                        }
                        return Ok(HeadResult {
                            origin: (self.command_name.clone(), prefix_labels(&self.prefixes)),
                            result: head.clone(),
                            matched: true,
                            groups: HashMap::new(),
                            fixes: vec!["compact-split".to_string()],
                        });
                    }
                }

                let failure = self.fail_or_fuzzy(argv, Some(&text));
                argv.restore(checkpoint);
                Err(failure)
            }
            HeaderContent::Regex {
                pattern,
                group_names,
            } => {
                let Some((Token::Str(text), true)) = argv.next(None) else {
                    argv.restore(checkpoint);
                    return Err(self.fail_or_fuzzy(argv, None));
                };

                if let Some(caps) = pattern.captures(&text) {
                    let mut groups = HashMap::new();
                    for name in group_names {
                        if let Some(m) = caps.name(name) {
                            groups.insert(name.clone(), m.as_str().to_string());
                        }
                    }
                    return Ok(HeadResult {
                        origin: (self.command_name.clone(), prefix_labels(&self.prefixes)),
                        result: text,
                        matched: true,
                        groups,
                        fixes: Vec::new(),
                    });
                }

                let failure = self.fail_or_fuzzy(argv, Some(&text));
                argv.restore(checkpoint);
                Err(failure)
            }
            HeaderContent::Pattern(p) => {
                let Some((Token::Str(text), true)) = argv.next(None) else {
                    argv.restore(checkpoint);
                    return Err(self.fail_or_fuzzy(argv, None));
                };

                match p.validate(&text) {
                    crate::pattern::Validation::Valid(_) => Ok(HeadResult {
                        origin: (self.command_name.clone(), prefix_labels(&self.prefixes)),
                        result: text,
                        matched: true,
                        groups: HashMap::new(),
                        fixes: Vec::new(),
                    }),
                    crate::pattern::Validation::Invalid(_) => {
                        let failure = self.fail_or_fuzzy(argv, Some(&text));
                        argv.restore(checkpoint);
                        Err(failure)
                    }
                }
            }
            HeaderContent::DoublePairs(pairs) => {
                for (prefix, name) in pairs {
                    let attempt = argv.checkpoint();
                    if self.try_double(argv, prefix, name) {
                        return Ok(HeadResult {
                            origin: (self.command_name.clone(), prefix_labels(&self.prefixes)),
                            result: name.clone(),
                            matched: true,
                            groups: HashMap::new(),
                            fixes: Vec::new(),
                        });
                    }
                    argv.restore(attempt);
                }
                let failure = self.fail_or_fuzzy(argv, None);
                argv.restore(checkpoint);
                Err(failure)
            }
        }
    }

    fn try_double(&self, argv: &mut Argv, prefix: &Prefix, name: &str) -> bool {
        let Some((first, _)) = argv.next(None) else {
            return false;
        };
        let prefix_ok = match (prefix, &first) {
            (Prefix::Text(t), Token::Str(s)) => t == s,
            (Prefix::Opaque(label), Token::Opaque(o)) => label == &o.label,
            _ => false,
        };
        if !prefix_ok {
            return false;
        }
        matches!(argv.next(None), Some((Token::Str(s), true)) if s == name)
    }

    fn fail_or_fuzzy(&self, argv: &Argv, head_text: Option<&str>) -> crate::error::ParseSignal {
        if let Some(text) = head_text {
            if argv.fuzzy_match {
                let mut best: Option<(String, f64)> = None;
                for candidate in self.literal_candidates() {
                    let score = strsim::normalized_levenshtein(text, &candidate);
                    if best.as_ref().map_or(true, |(_, b)| score > *b) {
                        best = Some((candidate, score));
                    }
                }
                if let Some((target, score)) = best {
                    if score >= argv.fuzzy_threshold {
                        return ControlSignal::FuzzyMatchSuccess {
                            source: text.to_string(),
                            target,
                        }
                        .into();
                    }
                }
            }
        }
        ParseFailure::new(
            head_text.map(str::to_string),
            format!("expected header `{}`", self.command_name),
            Vec::new(),
        )
        .into()
    }
}

fn prefix_labels(prefixes: &[Prefix]) -> Vec<String> {
    prefixes
        .iter()
        .map(|p| match p {
            Prefix::Text(t) => t.clone(),
            Prefix::Opaque(l) => l.clone(),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::argv::{Argv, Segment};

    fn argv_for(input: &str) -> Argv {
        Argv::with_default_separators(&[Segment::Text(input.to_string())])
    }

    #[test]
    fn literal_prefixes_both_match() {
        let header = Header::compile(
            HeaderCommand::Literal("hi".to_string()),
            vec![Prefix::Text("!".into()), Prefix::Text("?".into())],
            false,
        )
        .unwrap();

        assert!(header.match_head(&mut argv_for("!hi")).is_ok());
        assert!(header.match_head(&mut argv_for("?hi")).is_ok());
        assert!(header.match_head(&mut argv_for("hi")).is_err());
    }

    #[test]
    fn compact_header_splits_glued_argument() {
        let header =
            Header::compile(HeaderCommand::Literal("ping".to_string()), vec![Prefix::Text("!".into())], true)
                .unwrap();

        let mut argv = argv_for("!pingFOO");
        let result = header.match_head(&mut argv).unwrap();
        assert_eq!(result.result, "!ping");
        let (tok, _) = argv.next(None).unwrap();
        assert_eq!(tok, Token::Str("FOO".to_string()));
    }

    #[test]
    fn braces_compile_to_named_regex_groups() {
        let header =
            Header::compile(HeaderCommand::Literal("name.{ver:int}".to_string()), vec![], false).unwrap();
        let mut argv = argv_for("name.3");
        let result = header.match_head(&mut argv).unwrap();
        assert_eq!(result.groups.get("ver"), Some(&"3".to_string()));
    }

    #[test]
    fn fuzzy_match_suggests_close_header() {
        let header = Header::compile(HeaderCommand::Literal("ping".to_string()), vec![], false).unwrap();
        let mut argv = argv_for("pign");
        argv.fuzzy_match = true;
        argv.fuzzy_threshold = 0.5;
        let err = header.match_head(&mut argv).unwrap_err();
        match err {
            crate::error::ParseSignal::Control(ControlSignal::FuzzyMatchSuccess { source, target }) => {
                assert_eq!(source, "pign");
                assert_eq!(target, "ping");
            }
            other => panic!("expected fuzzy match signal, got {other:?}"),
        }
    }
}
