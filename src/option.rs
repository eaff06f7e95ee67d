//! C5 (option half) — alias matching, compact options (`-vvv`), action
//! kinds (store/count/append), and duplicate merging.

use std::collections::HashSet;

use crate::args::{analyse_args, Args, ArgValue, ArgsResult};
use crate::argv::{Argv, Separators, Token};
use crate::error::{ParseFailure, ParseResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActionKind {
    Store,
    Append,
    Count,
}

#[derive(Debug, Clone)]
pub struct Action {
    pub kind: ActionKind,
    /// The value stored for a bare `store`/`count` option with no args
    /// (e.g. a flag's truthy marker).
    pub value: Option<String>,
}

impl Action {
    pub fn store() -> Self {
        Self {
            kind: ActionKind::Store,
            value: Some("true".to_string()),
        }
    }

    pub fn append() -> Self {
        Self {
            kind: ActionKind::Append,
            value: None,
        }
    }

    pub fn count() -> Self {
        Self {
            kind: ActionKind::Count,
            value: None,
        }
    }
}

#[derive(Clone)]
pub struct Opt {
    pub name: String,
    pub aliases: Vec<String>,
    pub dest: String,
    pub args: Args,
    pub separators: Separators,
    pub action: Action,
    pub compact: bool,
    pub soft_keyword: bool,
    pub allow_duplicate: bool,
}

impl Opt {
    pub fn new(name_or_aliases: &str) -> Self {
        let aliases: Vec<String> = name_or_aliases.split('|').map(str::to_string).collect();
        let dest = aliases
            .iter()
            .max_by_key(|a| a.trim_start_matches('-').len())
            .cloned()
            .unwrap_or_default()
            .trim_start_matches('-')
            .to_string();
        Self {
            name: name_or_aliases.to_string(),
            aliases,
            dest,
            args: Args::new(),
            separators: crate::argv::separators(" "),
            action: Action::store(),
            compact: false,
            soft_keyword: false,
            allow_duplicate: false,
        }
    }

    pub fn with_args(mut self, args: Args) -> Self {
        self.args = args;
        self
    }

    pub fn with_action(mut self, action: Action) -> Self {
        self.action = action;
        self
    }

    pub fn with_compact(mut self, compact: bool) -> Self {
        self.compact = compact;
        self
    }

    pub fn allow_duplicate(mut self) -> Self {
        self.allow_duplicate = true;
        self
    }

    /// Mark this option as a soft keyword (glossary: "Soft keyword") —
    /// it only dispatches once the scope's required args are already
    /// bound; until then a matching token is left for the args step.
    pub fn soft_keyword(mut self) -> Self {
        self.soft_keyword = true;
        self
    }

    pub fn nargs(&self) -> usize {
        self.args.normal.len()
            + self.args.keyword_only.len()
            + usize::from(self.args.vars_positional.is_some())
            + usize::from(self.args.vars_keyword.is_some())
    }

    fn compact_prefix<'a>(&self, text: &'a str) -> Option<(&'a str, &'a str)> {
        self.aliases
            .iter()
            .filter(|a| text.len() > a.len() && text.starts_with(a.as_str()))
            .map(|a| text.split_at(a.len()))
            .next()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct OptionResult {
    pub value: Option<String>,
    /// Ordered, per-occurrence values accumulated by an `append`-kind
    /// option across its appearances. Empty for `store`/`count` options,
    /// where `value` alone carries the result (invariant (c): append
    /// merging must never drop earlier values — see `merge_duplicate`).
    pub values: Vec<String>,
    pub args: ArgsResult,
}

impl OptionResult {
    fn bare(value: Option<String>) -> Self {
        Self {
            value,
            values: Vec::new(),
            args: ArgsResult::default(),
        }
    }
}

/// Attempt to dispatch the stream's head token against `opt`. Returns
/// `Ok(None)` (with the stream untouched) if the token does not name this
/// option at all, so the dispatch loop can try the next candidate.
pub fn analyse_option(opt: &Opt, argv: &mut Argv) -> ParseResult<Option<OptionResult>> {
    let checkpoint = argv.checkpoint();
    argv.context.current_option = Some(opt.name.clone());

    let Some((token, is_str)) = argv.next(None) else {
        return Ok(None);
    };

    if !is_str {
        argv.restore(checkpoint);
        return Ok(None);
    }
    let Token::Str(text) = token else {
        unreachable!("is_str implies Token::Str")
    };

    // Exact alias match.
    if opt.aliases.iter().any(|a| a == &text) {
        return finish_match(opt, argv, None);
    }

    // Count-kind compact repetition: `-vvv` for alias `-v`.
    if opt.action.kind == ActionKind::Count {
        if let Some(rep) = count_repetition(opt, &text) {
            return Ok(Some(OptionResult::bare(Some(rep.to_string()))));
        }
    }

    // Compact form: `--opt=value` or `-fBAR` — consume the alias prefix,
    // push the tail back in place of the original token.
    if opt.compact {
        if let Some((_head, tail)) = opt.compact_prefix(&text) {
            let tail = tail.trim_start_matches('=').to_string();
            if !tail.is_empty() {
                argv.rollback(Token::Str(tail), true);
            }
            return finish_match(opt, argv, None);
        }
    }

    argv.restore(checkpoint);
    Ok(None)
}

fn count_repetition(opt: &Opt, text: &str) -> Option<usize> {
    for alias in &opt.aliases {
        let Some(flag_char) = alias.strip_prefix('-').and_then(|s| s.chars().next()) else {
            continue;
        };
        if !alias.starts_with('-') || alias.starts_with("--") {
            continue;
        }
        let Some(body) = text.strip_prefix('-') else {
            continue;
        };
        if !body.is_empty() && body.chars().all(|c| c == flag_char) {
            return Some(body.len());
        }
    }
    None
}

fn finish_match(
    opt: &Opt,
    argv: &mut Argv,
    precomputed: Option<ArgsResult>,
) -> ParseResult<Option<OptionResult>> {
    if opt.nargs() > 0 {
        let args_result = match precomputed {
            Some(r) => r,
            None => analyse_args(&opt.args, argv)?,
        };
        Ok(Some(OptionResult {
            value: None,
            values: Vec::new(),
            args: args_result,
        }))
    } else {
        Ok(Some(OptionResult::bare(opt.action.value.clone())))
    }
}

/// Merge a newly-matched occurrence of an option into its prior result
/// (if any), per the option's action kind. Returns an error if the option
/// disallows duplicates and this is a repeat appearance.
pub fn merge_duplicate(
    opt: &Opt,
    previous: Option<OptionResult>,
    incoming: OptionResult,
) -> ParseResult<OptionResult> {
    let Some(previous) = previous else {
        // The first occurrence of an `append` option seeds its ordered
        // list immediately, so invariant (c) (length N for N occurrences)
        // holds from N=1 rather than only once a second occurrence merges.
        if opt.action.kind == ActionKind::Append {
            return Ok(OptionResult {
                value: None,
                values: into_list(incoming.value),
                args: incoming.args,
            });
        }
        return Ok(incoming);
    };

    if !opt.allow_duplicate && opt.action.kind != ActionKind::Append && opt.action.kind != ActionKind::Count {
        return Err(ParseFailure::new(
            None,
            format!("option `{}` does not allow duplicates", opt.name),
            Vec::new(),
        )
        .into());
    }

    match opt.action.kind {
        ActionKind::Store => Ok(incoming),
        ActionKind::Append => {
            let mut values = previous.values;
            values.extend(into_list(incoming.value));
            values.extend(incoming.values);
            let merged_args = merge_args_lists(previous.args, incoming.args);
            Ok(OptionResult {
                value: None,
                values,
                args: merged_args,
            })
        }
        ActionKind::Count => {
            if incoming.args.0.is_empty() && previous.args.0.is_empty() {
                let prev_count: usize = previous.value.as_deref().and_then(|v| v.parse().ok()).unwrap_or(0);
                let incoming_count: usize =
                    incoming.value.as_deref().and_then(|v| v.parse().ok()).unwrap_or(1);
                Ok(OptionResult::bare(Some((prev_count + incoming_count).to_string())))
            } else {
                Ok(incoming)
            }
        }
    }
}

fn into_list(value: Option<String>) -> Vec<String> {
    match value {
        Some(v) => vec![v],
        None => Vec::new(),
    }
}

fn merge_args_lists(previous: ArgsResult, incoming: ArgsResult) -> ArgsResult {
    let mut merged = previous;
    for (key, value) in incoming.0 {
        merged
            .0
            .entry(key)
            .and_modify(|existing| {
                let mut list = match existing {
                    ArgValue::Multiple(list) => std::mem::take(list),
                    other => vec![format!("{other:?}")],
                };
                if let ArgValue::Single(s) = &value {
                    list.push(s.clone());
                }
                *existing = ArgValue::Multiple(list);
            })
            .or_insert(value);
    }
    merged
}

/// Collect every alias of `opts` into a flat set (invariant (e)).
pub fn collect_param_ids(opts: &[Opt]) -> HashSet<String> {
    let mut ids = HashSet::new();
    for opt in opts {
        ids.extend(opt.aliases.iter().cloned());
    }
    ids
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::argv::Segment;

    fn argv_for(input: &str) -> Argv {
        Argv::with_default_separators(&[Segment::Text(input.to_string())])
    }

    #[test]
    fn exact_alias_match() {
        let opt = Opt::new("--verbose|-v");
        let mut argv = argv_for("-v rest");
        let result = analyse_option(&opt, &mut argv).unwrap();
        assert!(result.is_some());
    }

    #[test]
    fn count_action_compact_repetition_matches_repeated_flags() {
        let opt = Opt::new("-U").with_action(Action::count());
        let mut argv = argv_for("-UUU");
        let single_shot = analyse_option(&opt, &mut argv).unwrap().unwrap();
        assert_eq!(single_shot.value, Some("3".to_string()));

        let mut argv2 = argv_for("-U -U -U");
        let mut total: Option<OptionResult> = None;
        for _ in 0..3 {
            let r = analyse_option(&opt, &mut argv2).unwrap().unwrap();
            total = Some(merge_duplicate(&opt, total, r).unwrap());
        }
        assert_eq!(total.unwrap().value, Some("3".to_string()));
    }

    #[test]
    fn append_action_preserves_order_and_length() {
        let opt = Opt::new("--tag").with_action(Action::append());
        let mut total: Option<OptionResult> = None;
        for v in ["a", "b", "c"] {
            let incoming = OptionResult::bare(Some(v.to_string()));
            total = Some(merge_duplicate(&opt, total, incoming).unwrap());
        }
        let values = total.unwrap().values;
        assert_eq!(values, vec!["a".to_string(), "b".to_string(), "c".to_string()]);
    }

    #[test]
    fn compact_form_splits_equals_value() {
        let opt = Opt::new("--opt")
            .with_compact(true)
            .with_args(Args::new().add(crate::args::Arg::new("v", std::sync::Arc::new(crate::pattern::AnyStr))));
        let mut argv = argv_for("--opt=value");
        let result = analyse_option(&opt, &mut argv).unwrap().unwrap();
        assert_eq!(result.args.get("v"), Some(&ArgValue::Single("value".into())));
    }
}
