//! The tagged sum over everything a scope's head token might dispatch to:
//! an option, a subcommand, or a bare literal "sentence" token. Using
//! `enum_dispatch` here instead of a trait object keeps the match exhaustive
//! and avoids an extra vtable hop on the hot per-token dispatch path.

use std::collections::HashMap;

use enum_dispatch::enum_dispatch;

use crate::argv::{Argv, Token};
use crate::error::ParseResult;
use crate::option::{analyse_option, merge_duplicate, Opt, OptionResult};
use crate::subcommand::{analyse_subcommand, Subcommand, SubcommandResult};

/// A bare literal token matched for its own sake (no args, no action) —
/// used for things like a required mode keyword ahead of an option block.
#[derive(Clone)]
pub struct Sentence {
    pub text: String,
}

impl Sentence {
    pub fn new(text: impl Into<String>) -> Self {
        Self { text: text.into() }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ParamOutcome {
    Option(OptionResult),
    Subcommand(SubcommandResult),
    Sentence,
}

#[enum_dispatch]
pub trait ParamDispatch {
    fn id(&self) -> &str;
    fn try_match(&self, argv: &mut Argv) -> ParseResult<Option<ParamOutcome>>;
}

impl ParamDispatch for Opt {
    fn id(&self) -> &str {
        &self.dest
    }

    fn try_match(&self, argv: &mut Argv) -> ParseResult<Option<ParamOutcome>> {
        Ok(analyse_option(self, argv)?.map(ParamOutcome::Option))
    }
}

impl ParamDispatch for Subcommand {
    fn id(&self) -> &str {
        &self.name
    }

    fn try_match(&self, argv: &mut Argv) -> ParseResult<Option<ParamOutcome>> {
        Ok(analyse_subcommand(self, argv)?.map(ParamOutcome::Subcommand))
    }
}

impl ParamDispatch for Sentence {
    fn id(&self) -> &str {
        &self.text
    }

    fn try_match(&self, argv: &mut Argv) -> ParseResult<Option<ParamOutcome>> {
        let checkpoint = argv.checkpoint();
        match argv.next(None) {
            Some((Token::Str(text), true)) if text == self.text => Ok(Some(ParamOutcome::Sentence)),
            _ => {
                argv.restore(checkpoint);
                Ok(None)
            }
        }
    }
}

#[enum_dispatch(ParamDispatch)]
#[derive(Clone)]
pub enum Param {
    Opt(Opt),
    Subcommand(Subcommand),
    Sentence(Sentence),
}

/// Build the "exact" dispatch table: every param keyed by every alias/name
/// it answers to, for O(1) lookup on the common case of a token that
/// literally equals one of them.
pub fn compile_params(params: &[Param]) -> HashMap<String, usize> {
    let mut table = HashMap::new();
    for (idx, param) in params.iter().enumerate() {
        for key in param_keys(param) {
            table.entry(key).or_insert(idx);
        }
    }
    table
}

/// The subset of params worth trying via compact/speculative matching —
/// options that declare `compact` (glued `--opt=value`/alias-prefix forms)
/// or that use the count action (repeated-flag forms like `-vvv`, which
/// `analyse_option` recognizes regardless of the `compact` flag). Tried
/// only after the exact table misses, since each attempt needs its own
/// checkpoint/restore.
pub fn compact_params(params: &[Param]) -> Vec<usize> {
    params
        .iter()
        .enumerate()
        .filter_map(|(idx, p)| match p {
            Param::Opt(o) if o.compact || o.action.kind == crate::option::ActionKind::Count => Some(idx),
            _ => None,
        })
        .collect()
}

fn param_keys(param: &Param) -> Vec<String> {
    match param {
        Param::Opt(o) => o.aliases.clone(),
        Param::Subcommand(s) => vec![s.name.clone()],
        Param::Sentence(s) => vec![s.text.clone()],
    }
}

/// Invariant (e): every alias/name across every param in a scope must be
/// unique — collisions are a grammar authoring bug, caught eagerly.
pub fn validate_unique_ids(params: &[Param]) -> Result<(), crate::error::AlconnaError> {
    let mut seen = std::collections::HashSet::new();
    for param in params {
        for key in param_keys(param) {
            if !seen.insert(key.clone()) {
                return Err(crate::error::AlconnaError::DuplicateParamId(key));
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn compile_params_indexes_every_alias() {
        let params = vec![
            Param::Opt(Opt::new("--verbose|-v")),
            Param::Subcommand(Subcommand::new("install")),
        ];
        let table = compile_params(&params);
        assert_eq!(table.get("-v"), Some(&0));
        assert_eq!(table.get("--verbose"), Some(&0));
        assert_eq!(table.get("install"), Some(&1));
    }

    #[test]
    fn duplicate_ids_are_rejected() {
        let params = vec![Param::Opt(Opt::new("--x")), Param::Opt(Opt::new("--x"))];
        assert!(validate_unique_ids(&params).is_err());
    }

    #[test]
    fn compact_params_only_lists_compact_options() {
        let params = vec![
            Param::Opt(Opt::new("--a")),
            Param::Opt(Opt::new("--b").with_compact(true)),
        ];
        assert_eq!(compact_params(&params), vec![1]);
    }
}
