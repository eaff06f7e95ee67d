//! C4 — the positional/keyword/variadic argument analyser.
//!
//! Slots are processed in strict order: normals → unpack → var-positional →
//! keyword-only → var-keyword (the invariant called out by the grammar
//! model; see `DESIGN.md` for how this was resolved against the looser
//! prose ordering in the per-slot algorithm descriptions).

use std::collections::HashMap;
use std::sync::Arc;

use regex::Regex;

use crate::argv::{separators, Argv, Opaque, Separators, Token};
use crate::error::{ParseFailure, ParseResult};
use crate::pattern::{Pattern, Validation};

#[derive(Debug, Clone, PartialEq)]
pub enum ArgValue {
    Single(String),
    Opaque(Opaque),
    Multiple(Vec<String>),
    KeywordMap(HashMap<String, String>),
    Nested(ArgsResult),
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ArgsResult(pub HashMap<String, ArgValue>);

impl ArgsResult {
    pub fn get(&self, name: &str) -> Option<&ArgValue> {
        self.0.get(name)
    }

    fn insert(&mut self, name: impl Into<String>, value: ArgValue) {
        self.0.insert(name.into(), value);
    }
}

/// Per-argument metadata: default value, whether the slot may be skipped,
/// completion hints, and the diagnostic strings to surface on failure.
#[derive(Debug, Clone, Default)]
pub struct Field {
    pub default: Option<String>,
    pub optional: bool,
    pub completion: Vec<String>,
    pub missing_tips: Option<String>,
    pub unmatch_tips: Option<String>,
}

impl Field {
    pub fn required() -> Self {
        Self::default()
    }

    pub fn with_default(default: impl Into<String>) -> Self {
        Self {
            default: Some(default.into()),
            optional: true,
            ..Default::default()
        }
    }

    pub fn optional() -> Self {
        Self {
            optional: true,
            ..Default::default()
        }
    }
}

/// A single positional or keyword-only argument slot.
#[derive(Clone)]
pub struct Arg {
    pub name: String,
    pub value: Arc<dyn Pattern>,
    pub separators: Separators,
    pub field: Field,
}

impl Arg {
    pub fn new(name: impl Into<String>, value: Arc<dyn Pattern>) -> Self {
        Self {
            name: name.into(),
            value,
            separators: separators(" "),
            field: Field::default(),
        }
    }

    pub fn with_field(mut self, field: Field) -> Self {
        self.field = field;
        self
    }

    fn is_wildcard(&self) -> bool {
        self.value.display() == "*"
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VarFlag {
    /// `+`: at least one match required.
    AtLeastOne,
    /// `*`: zero matches is fine, yields an empty collection.
    ZeroOrMore,
    /// No flag: an explicit default is used if nothing matched.
    Default,
}

#[derive(Clone)]
pub struct VarPositional {
    pub name: String,
    pub value: Arc<dyn Pattern>,
    pub flag: VarFlag,
    pub separators: Separators,
    pub limit: Option<usize>,
    pub default: Option<Vec<String>>,
}

#[derive(Clone)]
pub struct VarKeyword {
    pub name: String,
    pub value: Arc<dyn Pattern>,
    pub flag: VarFlag,
    pub separators: Separators,
    pub kv_sep: char,
    pub limit: Option<usize>,
    pub default: Option<HashMap<String, String>>,
}

/// A nested `Args` slot that is parsed recursively; at most one per `Args`.
#[derive(Clone)]
pub struct UnpackSlot {
    pub name: String,
    pub args: Box<Args>,
    pub default: Option<ArgsResult>,
}

#[derive(Clone, Default)]
pub struct Args {
    pub normal: Vec<Arg>,
    pub keyword_only: Vec<(String, Arg)>,
    pub vars_positional: Option<VarPositional>,
    pub vars_keyword: Option<VarKeyword>,
    pub unpack: Option<UnpackSlot>,
    pub keyword_separator: char,
}

impl Args {
    pub fn new() -> Self {
        Self {
            keyword_separator: '=',
            ..Default::default()
        }
    }

    pub fn add(mut self, arg: Arg) -> Self {
        self.normal.push(arg);
        self
    }

    pub fn add_keyword_only(mut self, name: impl Into<String>, arg: Arg) -> Self {
        self.keyword_only.push((name.into(), arg));
        self
    }

    pub fn with_vars_positional(mut self, vars: VarPositional) -> Self {
        self.vars_positional = Some(vars);
        self
    }

    pub fn with_vars_keyword(mut self, vars: VarKeyword) -> Self {
        self.vars_keyword = Some(vars);
        self
    }

    pub fn with_unpack(mut self, slot: UnpackSlot) -> Self {
        self.unpack = Some(slot);
        self
    }

    fn keyword_only_names(&self) -> impl Iterator<Item = &str> {
        self.keyword_only.iter().map(|(n, _)| n.as_str())
    }

    fn find_keyword_only(&self, name: &str) -> Option<&Arg> {
        self.keyword_only
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, a)| a)
    }

    /// Is `token` shaped like `key<sep>value` for the var-keyword slot?
    fn looks_like_var_keyword(&self, token: &str) -> bool {
        match &self.vars_keyword {
            Some(vk) => token.contains(vk.kv_sep),
            None => false,
        }
    }

    /// Does `token` name one of the keyword-only slots (ignoring any
    /// `key=value` tail)?
    fn looks_like_keyword_only(&self, token: &str) -> bool {
        let key = token.split(self.keyword_separator).next().unwrap_or(token);
        let name = normalize_keyword_name(key);
        self.keyword_only_names().any(|n| n == name.as_str())
    }
}

fn sep_opt(seps: &Separators) -> Option<&Separators> {
    if seps.is_empty() {
        None
    } else {
        Some(seps)
    }
}

fn keyword_name_regex() -> &'static Regex {
    use std::sync::OnceLock;
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^(?:-*no)?-*(?P<name>.+)$").unwrap())
}

struct NormalizedKeyword {
    name: String,
    negated: bool,
}

fn normalize_keyword(raw: &str) -> NormalizedKeyword {
    let caps = keyword_name_regex().captures(raw);
    let name = caps
        .as_ref()
        .and_then(|c| c.name("name"))
        .map(|m| m.as_str().to_string())
        .unwrap_or_else(|| raw.to_string());
    let negated = raw.starts_with("--no-")
        || raw.starts_with("-no-")
        || (raw.starts_with("no-") && raw != name);
    NormalizedKeyword { name, negated }
}

fn normalize_keyword_name(raw: &str) -> String {
    normalize_keyword(raw).name
}

/// Does `text` look like a compact repeated-flag form (`-vvv`) of some
/// registered single-char alias (`-v`)? Variadic collection loops use this
/// so a count-style option interleaved after greedily-collected values
/// still halts the collection, even though `-vvv` itself is never a
/// literal member of `param_ids`.
fn looks_like_compact_repetition(argv: &Argv, text: &str) -> bool {
    let Some(body) = text.strip_prefix('-') else {
        return false;
    };
    if body.is_empty() || text.starts_with("--") {
        return false;
    }
    let flag_char = body.chars().next().unwrap();
    if !body.chars().all(|c| c == flag_char) {
        return false;
    }
    argv.param_ids.contains(&format!("-{flag_char}"))
}

fn is_stop_token(args: &Args, argv: &Argv, text: &str) -> bool {
    argv.param_ids.contains(text)
        || argv.special.contains_key(text)
        || args.looks_like_keyword_only(text)
        || args.looks_like_var_keyword(text)
        || looks_like_compact_repetition(argv, text)
}

/// Top-level entry point: validate/consume tokens for every slot in `args`.
pub fn analyse_args(args: &Args, argv: &mut Argv) -> ParseResult<ArgsResult> {
    let mut result = ArgsResult::default();

    if analyse_normals(args, argv, &mut result)? {
        // Wildcard absorbed the rest of the stream; nothing else to do.
        return Ok(result);
    }

    if let Some(unpack) = &args.unpack {
        analyse_unpack(unpack, argv, &mut result)?;
    }

    if let Some(vars) = &args.vars_positional {
        analyse_vars_positional(args, vars, argv, &mut result)?;
    }

    analyse_keyword_only(args, argv, &mut result)?;

    if let Some(vars) = &args.vars_keyword {
        analyse_vars_keyword(args, vars, argv, &mut result)?;
    }

    Ok(result)
}

/// Returns `Ok(true)` if a wildcard arg absorbed the remainder of the stream.
fn analyse_normals(args: &Args, argv: &mut Argv, result: &mut ArgsResult) -> ParseResult<bool> {
    for arg in &args.normal {
        argv.context.current_arg = Some(arg.name.clone());

        if arg.is_wildcard() {
            let rest: Vec<String> = argv
                .release(None, false)
                .into_iter()
                .filter_map(|t| t.as_str().map(str::to_string))
                .collect();
            result.insert(arg.name.clone(), ArgValue::Multiple(rest));
            return Ok(true);
        }

        match argv.next(sep_opt(&arg.separators)) {
            None => {
                if arg.field.optional {
                    if let Some(default) = &arg.field.default {
                        result.insert(arg.name.clone(), ArgValue::Single(default.clone()));
                    }
                } else {
                    return Err(missing_arg(arg));
                }
            }
            Some((Token::Opaque(o), false)) => {
                result.insert(arg.name.clone(), ArgValue::Opaque(o));
            }
            Some((Token::Str(text), true)) => {
                if arg.field.optional && argv.param_ids.contains(&text) {
                    argv.rollback(Token::Str(text), false);
                    if let Some(default) = &arg.field.default {
                        result.insert(arg.name.clone(), ArgValue::Single(default.clone()));
                    }
                    continue;
                }

                match arg.value.validate(&text) {
                    Validation::Valid(v) => {
                        result.insert(arg.name.clone(), ArgValue::Single(v));
                    }
                    Validation::Invalid(msg) => {
                        if arg.field.optional {
                            argv.rollback(Token::Str(text), false);
                            if let Some(default) = &arg.field.default {
                                result.insert(arg.name.clone(), ArgValue::Single(default.clone()));
                            }
                        } else {
                            argv.rollback(Token::Str(text), false);
                            return Err(ParseFailure::new(
                                Some(arg.name.clone()),
                                arg.field
                                    .unmatch_tips
                                    .clone()
                                    .unwrap_or(msg),
                                Vec::new(),
                            )
                            .into());
                        }
                    }
                }
            }
        }
    }
    Ok(false)
}

fn missing_arg(arg: &Arg) -> crate::error::ParseSignal {
    ParseFailure::new(
        None,
        arg.field
            .missing_tips
            .clone()
            .unwrap_or_else(|| format!("missing required argument `{}`", arg.name)),
        Vec::new(),
    )
    .into()
}

fn analyse_unpack(slot: &UnpackSlot, argv: &mut Argv, result: &mut ArgsResult) -> ParseResult<()> {
    let checkpoint = argv.checkpoint();
    match analyse_args(&slot.args, argv) {
        Ok(nested) => {
            result.insert(slot.name.clone(), ArgValue::Nested(nested));
            Ok(())
        }
        Err(e) => {
            argv.restore(checkpoint);
            if let Some(default) = &slot.default {
                result.insert(slot.name.clone(), ArgValue::Nested(default.clone()));
                Ok(())
            } else {
                Err(e)
            }
        }
    }
}

fn analyse_vars_positional(
    args: &Args,
    vars: &VarPositional,
    argv: &mut Argv,
    result: &mut ArgsResult,
) -> ParseResult<()> {
    let mut collected = Vec::new();

    loop {
        if let Some(limit) = vars.limit {
            if collected.len() >= limit {
                break;
            }
        }

        let checkpoint = argv.checkpoint();
        match argv.next(sep_opt(&vars.separators)) {
            Some((Token::Str(text), true)) => {
                if is_stop_token(args, argv, &text) || !vars.value.validate(&text).is_valid() {
                    argv.restore(checkpoint);
                    break;
                }
                collected.push(text);
            }
            _ => {
                argv.restore(checkpoint);
                break;
            }
        }
    }

    if collected.is_empty() {
        match vars.flag {
            VarFlag::AtLeastOne => {
                return Err(ParseFailure::new(
                    None,
                    format!("missing required argument `{}`", vars.name),
                    Vec::new(),
                )
                .into());
            }
            VarFlag::ZeroOrMore => {
                result.insert(vars.name.clone(), ArgValue::Multiple(Vec::new()));
            }
            VarFlag::Default => {
                let default = vars.default.clone().unwrap_or_default();
                result.insert(vars.name.clone(), ArgValue::Multiple(default));
            }
        }
    } else {
        result.insert(vars.name.clone(), ArgValue::Multiple(collected));
    }

    Ok(())
}

fn analyse_keyword_only(args: &Args, argv: &mut Argv, result: &mut ArgsResult) -> ParseResult<()> {
    if args.keyword_only.is_empty() {
        return Ok(());
    }

    let mut seen: HashMap<String, String> = HashMap::new();
    let budget = args.keyword_only.len();
    let kv_seps = separators(&args.keyword_separator.to_string());

    for _ in 0..budget {
        let checkpoint = argv.checkpoint();

        let Some(Token::Str(peeked)) = argv.peek() else {
            break;
        };
        let has_value_tail = peeked.contains(args.keyword_separator);

        let Some((Token::Str(key_part), true)) = argv.next(Some(&kv_seps)) else {
            argv.restore(checkpoint);
            break;
        };

        let normalized = normalize_keyword(&key_part);
        let Some(arg) = args.find_keyword_only(&normalized.name) else {
            argv.restore(checkpoint);
            if argv.fuzzy_match {
                if let Some(best) = best_fuzzy_match(&normalized.name, args.keyword_only_names(), argv.fuzzy_threshold)
                {
                    return Err(crate::error::ControlSignal::FuzzyMatchSuccess {
                        source: normalized.name,
                        target: best,
                    }
                    .into());
                }
            }
            break;
        };

        let value = if has_value_tail {
            match argv.next(None) {
                Some((Token::Str(v), true)) => match arg.value.validate(&v) {
                    Validation::Valid(v) => v,
                    Validation::Invalid(msg) => {
                        return Err(ParseFailure::new(Some(normalized.name.clone()), msg, Vec::new()).into());
                    }
                },
                _ => {
                    return Err(ParseFailure::new(
                        Some(normalized.name.clone()),
                        format!("missing value for `{}`", normalized.name),
                        Vec::new(),
                    )
                    .into());
                }
            }
        } else {
            // KWBool: literal key presence is truthy (or falsy when negated).
            if normalized.negated {
                "false".to_string()
            } else {
                "true".to_string()
            }
        };

        seen.insert(normalized.name.clone(), value);
    }

    for (name, arg) in &args.keyword_only {
        if let Some(value) = seen.remove(name) {
            result.insert(name.clone(), ArgValue::Single(value));
        } else if let Some(default) = &arg.field.default {
            result.insert(name.clone(), ArgValue::Single(default.clone()));
        } else if !arg.field.optional {
            return Err(missing_arg(arg));
        }
    }

    Ok(())
}

fn best_fuzzy_match<'a>(
    source: &str,
    candidates: impl Iterator<Item = &'a str>,
    threshold: f64,
) -> Option<String> {
    let mut best: Option<(String, f64)> = None;
    for candidate in candidates {
        let score = strsim::normalized_levenshtein(source, candidate);
        if best.as_ref().map_or(true, |(_, b)| score > *b) {
            best = Some((candidate.to_string(), score));
        }
    }
    best.filter(|(_, score)| *score >= threshold).map(|(c, _)| c)
}

fn analyse_vars_keyword(
    args: &Args,
    vars: &VarKeyword,
    argv: &mut Argv,
    result: &mut ArgsResult,
) -> ParseResult<()> {
    let mut collected = HashMap::new();

    loop {
        if let Some(limit) = vars.limit {
            if collected.len() >= limit {
                break;
            }
        }

        let checkpoint = argv.checkpoint();
        match argv.next(sep_opt(&vars.separators)) {
            Some((Token::Str(text), true)) => {
                if argv.param_ids.contains(&text) || argv.special.contains_key(&text) {
                    argv.restore(checkpoint);
                    break;
                }
                let Some((key, value)) = text.split_once(vars.kv_sep) else {
                    argv.restore(checkpoint);
                    break;
                };
                if args.looks_like_keyword_only(key) {
                    argv.restore(checkpoint);
                    break;
                }
                if !vars.value.validate(value).is_valid() {
                    argv.restore(checkpoint);
                    break;
                }
                collected.insert(key.to_string(), value.to_string());
            }
            _ => {
                argv.restore(checkpoint);
                break;
            }
        }
    }

    if collected.is_empty() {
        match vars.flag {
            VarFlag::AtLeastOne => {
                return Err(ParseFailure::new(
                    None,
                    format!("missing required argument `{}`", vars.name),
                    Vec::new(),
                )
                .into());
            }
            VarFlag::ZeroOrMore => {
                result.insert(vars.name.clone(), ArgValue::KeywordMap(HashMap::new()));
            }
            VarFlag::Default => {
                let default = vars.default.clone().unwrap_or_default();
                result.insert(vars.name.clone(), ArgValue::KeywordMap(default));
            }
        }
    } else {
        result.insert(vars.name.clone(), ArgValue::KeywordMap(collected));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::argv::Segment;
    use crate::pattern::{AllParam, IntPattern};

    fn argv_for(input: &str) -> Argv {
        Argv::with_default_separators(&[Segment::Text(input.to_string())])
    }

    #[test]
    fn two_normal_ints() {
        let args = Args::new()
            .add(Arg::new("x", Arc::new(IntPattern)))
            .add(Arg::new("y", Arc::new(IntPattern)));
        let mut argv = argv_for("2 3");
        let result = analyse_args(&args, &mut argv).unwrap();
        assert_eq!(result.get("x"), Some(&ArgValue::Single("2".into())));
        assert_eq!(result.get("y"), Some(&ArgValue::Single("3".into())));
    }

    #[test]
    fn invalid_second_arg_fails() {
        let args = Args::new()
            .add(Arg::new("x", Arc::new(IntPattern)))
            .add(Arg::new("y", Arc::new(IntPattern)));
        let mut argv = argv_for("2 foo");
        let err = analyse_args(&args, &mut argv).unwrap_err();
        match err {
            crate::error::ParseSignal::Failure(f) => assert!(f.message.contains("foo")),
            other => panic!("unexpected signal: {other:?}"),
        }
    }

    #[test]
    fn optional_missing_uses_default() {
        let args = Args::new().add(
            Arg::new("x", Arc::new(IntPattern)).with_field(Field::with_default("7")),
        );
        let mut argv = argv_for("");
        let result = analyse_args(&args, &mut argv).unwrap();
        assert_eq!(result.get("x"), Some(&ArgValue::Single("7".into())));
    }

    #[test]
    fn optional_missing_without_default_is_absent() {
        let args = Args::new().add(Arg::new("x", Arc::new(IntPattern)).with_field(Field::optional()));
        let mut argv = argv_for("");
        let result = analyse_args(&args, &mut argv).unwrap();
        assert_eq!(result.get("x"), None);
    }

    #[test]
    fn wildcard_absorbs_remainder() {
        let args = Args::new().add(Arg::new("*", Arc::new(AllParam)));
        let mut argv = argv_for("a b c");
        let result = analyse_args(&args, &mut argv).unwrap();
        assert_eq!(
            result.get("*"),
            Some(&ArgValue::Multiple(vec!["a".into(), "b".into(), "c".into()]))
        );
    }

    #[test]
    fn variadic_positional_star_allows_zero() {
        let args = Args::new().with_vars_positional(VarPositional {
            name: "pkg".into(),
            value: Arc::new(crate::pattern::AnyStr),
            flag: VarFlag::ZeroOrMore,
            separators: separators(" "),
            limit: None,
            default: None,
        });
        let mut argv = argv_for("");
        let result = analyse_args(&args, &mut argv).unwrap();
        assert_eq!(result.get("pkg"), Some(&ArgValue::Multiple(Vec::new())));
    }

    #[test]
    fn variadic_positional_collects_until_option() {
        let mut argv = argv_for("a b -U");
        argv.param_ids.insert("-U".to_string());
        let args = Args::new().with_vars_positional(VarPositional {
            name: "pkg".into(),
            value: Arc::new(crate::pattern::AnyStr),
            flag: VarFlag::ZeroOrMore,
            separators: separators(" "),
            limit: None,
            default: None,
        });
        let result = analyse_args(&args, &mut argv).unwrap();
        assert_eq!(
            result.get("pkg"),
            Some(&ArgValue::Multiple(vec!["a".into(), "b".into()]))
        );
        let (tok, _) = argv.next(None).unwrap();
        assert_eq!(tok, Token::Str("-U".into()));
    }

    #[test]
    fn keyword_only_bool_presence_is_truthy() {
        let args = Args::new().add_keyword_only(
            "verbose",
            Arg::new("verbose", Arc::new(crate::pattern::AnyStr)).with_field(Field::optional()),
        );
        let mut argv = argv_for("--verbose");
        let result = analyse_args(&args, &mut argv).unwrap();
        assert_eq!(result.get("verbose"), Some(&ArgValue::Single("true".into())));
    }

    #[test]
    fn keyword_only_explicit_value() {
        let args = Args::new().add_keyword_only(
            "name",
            Arg::new("name", Arc::new(crate::pattern::AnyStr)).with_field(Field::optional()),
        );
        let mut argv = argv_for("--name=foo");
        let result = analyse_args(&args, &mut argv).unwrap();
        assert_eq!(result.get("name"), Some(&ArgValue::Single("foo".into())));
    }

    #[test]
    fn keyword_only_missing_required_errors() {
        let args = Args::new().add_keyword_only(
            "name",
            Arg::new("name", Arc::new(crate::pattern::AnyStr)),
        );
        let mut argv = argv_for("");
        assert!(analyse_args(&args, &mut argv).is_err());
    }
}
