//! C6 — shortcut registration and expansion: rewrite a short alias into a
//! full token stream via `{%N}`/`{*<sep>}`/`{N}`/`{name}` slot substitution,
//! then hand the rewritten stream back to the normal analyser.

use std::collections::HashMap;
use std::sync::Arc;

use regex::Regex;

use crate::argv::{separators, Argv, Segment};

pub type Wrapper = Arc<dyn Fn(&str) -> String + Send + Sync>;

#[derive(Clone)]
enum Key {
    Literal(String),
    Regex(Regex),
}

#[derive(Clone)]
pub struct ShortcutArgs {
    /// The expansion's leading command text, e.g. `"git"` or `"/pip install"`.
    pub command: String,
    /// Template pieces appended after `command`; each may contain a
    /// `{%N}`/`{*}`/`{*<sep>}`/`{N}`/`{name}` placeholder.
    pub arguments: Vec<String>,
    pub fuzzy: bool,
    pub prefix: bool,
    pub wrapper: Option<Wrapper>,
}

impl ShortcutArgs {
    pub fn new(command: impl Into<String>, arguments: Vec<String>) -> Self {
        Self {
            command: command.into(),
            arguments,
            fuzzy: false,
            prefix: false,
            wrapper: None,
        }
    }

    pub fn fuzzy(mut self, fuzzy: bool) -> Self {
        self.fuzzy = fuzzy;
        self
    }

    pub fn prefix(mut self, prefix: bool) -> Self {
        self.prefix = prefix;
        self
    }

    pub fn with_wrapper(mut self, wrapper: Wrapper) -> Self {
        self.wrapper = Some(wrapper);
        self
    }
}

#[derive(Clone, Default)]
pub struct ShortcutTable {
    display: HashMap<String, ShortcutArgs>,
    match_table: HashMap<String, (Key, ShortcutArgs)>,
}

impl ShortcutTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `key` (a plain name, or a regex when `fuzzy` is set).
    /// With `prefixes` non-empty and `args.prefix` set, prefix-prepended
    /// match-table variants are added alongside the bare key.
    pub fn register(&mut self, key: &str, args: ShortcutArgs, prefixes: &[String]) -> Result<(), crate::error::AlconnaError> {
        self.display.insert(key.to_string(), args.clone());

        let parsed_key = if args.fuzzy {
            Key::Regex(
                Regex::new(key)
                    .map_err(|e| crate::error::AlconnaError::InvalidHeaderPattern(e.to_string()))?,
            )
        } else {
            Key::Literal(key.to_string())
        };

        self.match_table.insert(key.to_string(), (parsed_key.clone(), args.clone()));
        if args.prefix {
            for p in prefixes {
                let prefixed = format!("{p}{key}");
                self.match_table.insert(prefixed, (parsed_key.clone(), args.clone()));
            }
        }
        Ok(())
    }

    pub fn delete(&mut self, key: &str) {
        self.display.remove(key);
        self.match_table.retain(|k, _| k != key && !k.ends_with(key));
    }

    pub fn display_entries(&self) -> impl Iterator<Item = (&String, &ShortcutArgs)> {
        self.display.iter()
    }
}

/// A successful lookup, ready to be rendered into a new token stream.
struct Matched<'a> {
    args: &'a ShortcutArgs,
    captures: HashMap<String, String>,
    tail: Vec<String>,
}

/// Try every registered shortcut against the stream's remaining text.
/// Exact literal match is tried before regex (`fuzzy`) entries, matching
/// the spec's "exact, then fuzzy `re.match`, else `re.fullmatch`" order.
fn find_match<'a>(table: &'a ShortcutTable, query: &str) -> Option<Matched<'a>> {
    for (key, args) in table.match_table.values().filter_map(|(k, a)| match k {
        Key::Literal(s) => Some((s, a)),
        Key::Regex(_) => None,
    }) {
        if let Some(rest) = query.strip_prefix(key.as_str()) {
            if rest.is_empty() || rest.starts_with(' ') {
                let tail: Vec<String> = rest.split_whitespace().map(str::to_string).collect();
                return Some(Matched {
                    args,
                    captures: HashMap::new(),
                    tail,
                });
            }
        }
    }

    for (key, args) in table.match_table.values().filter_map(|(k, a)| match k {
        Key::Regex(re) => Some((re, a)),
        Key::Literal(_) => None,
    }) {
        if args.fuzzy {
            if let Some(m) = key.find(query) {
                let caps = key.captures(query).expect("find succeeded");
                let captures = named_captures(key, &caps);
                let tail: Vec<String> = query[m.end()..].split_whitespace().map(str::to_string).collect();
                return Some(Matched {
                    args,
                    captures,
                    tail,
                });
            }
        } else if let Some(caps) = key.captures(query) {
            if caps.get(0).map(|m| m.as_str() == query).unwrap_or(false) {
                let captures = named_captures(key, &caps);
                return Some(Matched {
                    args,
                    captures,
                    tail: Vec::new(),
                });
            }
        }
    }

    None
}

fn named_captures(re: &Regex, caps: &regex::Captures) -> HashMap<String, String> {
    re.capture_names()
        .flatten()
        .filter_map(|name| caps.name(name).map(|m| (name.to_string(), m.as_str().to_string())))
        .collect()
}

/// Substitute `{%N}`/`{*<sep>}`/`{N}`/`{name}` placeholders in `template`
/// against the matched shortcut's tail tokens and regex captures.
fn render_template(template: &str, tail: &[String], captures: &HashMap<String, String>, wrapper: Option<&Wrapper>) -> String {
    let mut out = String::new();
    let mut rest = template;

    while let Some(open) = rest.find('{') {
        let Some(close_rel) = rest[open..].find('}') else {
            out.push_str(rest);
            return out;
        };
        let close = open + close_rel;
        out.push_str(&rest[..open]);

        let inner = &rest[open + 1..close];
        let value = resolve_placeholder(inner, tail, captures);
        let value = match wrapper {
            Some(w) => w(&value),
            None => value,
        };
        out.push_str(&value);

        rest = &rest[close + 1..];
    }
    out.push_str(rest);
    out
}

fn resolve_placeholder(inner: &str, tail: &[String], captures: &HashMap<String, String>) -> String {
    if let Some(rest) = inner.strip_prefix('%') {
        return rest
            .parse::<usize>()
            .ok()
            .and_then(|n| tail.get(n))
            .cloned()
            .unwrap_or_default();
    }
    if let Some(sep) = inner.strip_prefix('*') {
        let sep = if sep.is_empty() { " " } else { sep };
        return tail.join(sep);
    }
    if let Ok(n) = inner.parse::<usize>() {
        return tail.get(n).cloned().unwrap_or_default();
    }
    captures.get(inner).cloned().unwrap_or_default()
}

/// Attempt to expand a shortcut at the current stream position. Returns a
/// freshly-tokenized `Argv` (preserving the caller's namespace/fuzzy/param
/// settings) when a shortcut matched, or `None` to fall through to the
/// normal analyser.
pub fn try_expand(table: &ShortcutTable, argv: &Argv) -> Option<Argv> {
    let query = argv.render_remaining();
    if query.is_empty() {
        return None;
    }
    let matched = find_match(table, &query)?;

    let mut pieces = vec![matched.args.command.clone()];
    for template in &matched.args.arguments {
        pieces.push(render_template(
            template,
            &matched.tail,
            &matched.captures,
            matched.args.wrapper.as_ref(),
        ));
    }
    let rewritten = pieces.join(" ");

    let mut expanded = Argv::build(&[Segment::Text(rewritten)], &separators(" "), true);
    expanded.special = argv.special.clone();
    expanded.param_ids = argv.param_ids.clone();
    expanded.namespace = argv.namespace.clone();
    expanded.fuzzy_match = argv.fuzzy_match;
    expanded.fuzzy_threshold = argv.fuzzy_threshold;
    expanded.comp_ctx = argv.comp_ctx;
    Some(expanded)
}
