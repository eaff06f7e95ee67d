//! C5 (subcommand half) — a recursive node in the grammar tree: its own
//! header-free name match, its own `Args`, its own nested options and
//! subcommands, each carrying an independently-scoped result.

use std::collections::HashMap;

use crate::analyser::Analyser;
use crate::args::{Args, ArgsResult};
use crate::argv::{separators, Argv, Separators, Token};
use crate::error::ParseResult;
use crate::option::{collect_param_ids, Opt, OptionResult};
use crate::param::Param;

#[derive(Clone)]
pub struct Subcommand {
    pub name: String,
    pub args: Args,
    pub options: Vec<Opt>,
    pub subcommands: Vec<Subcommand>,
    pub separators: Separators,
    /// Glossary "Soft keyword": when set, this subcommand's name only
    /// dispatches once the enclosing scope's own args are satisfied
    /// (gated jointly with `satisfy_previous`, see `analyser::is_soft_gated`);
    /// otherwise its name token is left for the enclosing scope's args/extra
    /// steps, i.e. treated as data.
    pub soft_keyword: bool,
    /// Whether the soft-keyword gate above actually checks the enclosing
    /// scope's satisfaction. A subcommand can be named `soft_keyword` for
    /// documentation/display purposes without requiring it — set this to
    /// `false` to keep it always eligible for dispatch.
    pub satisfy_previous: bool,
}

impl Subcommand {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            args: Args::new(),
            options: Vec::new(),
            subcommands: Vec::new(),
            separators: separators(" "),
            soft_keyword: false,
            satisfy_previous: false,
        }
    }

    pub fn with_args(mut self, args: Args) -> Self {
        self.args = args;
        self
    }

    pub fn with_option(mut self, opt: Opt) -> Self {
        self.options.push(opt);
        self
    }

    pub fn with_subcommand(mut self, sub: Subcommand) -> Self {
        self.subcommands.push(sub);
        self
    }

    pub fn with_separators(mut self, separators: Separators) -> Self {
        self.separators = separators;
        self
    }

    /// Mark this subcommand as a soft keyword gated on the enclosing
    /// scope's satisfaction (sets both `soft_keyword` and
    /// `satisfy_previous`; see their doc comments for the distinction).
    pub fn soft_keyword(mut self) -> Self {
        self.soft_keyword = true;
        self.satisfy_previous = true;
        self
    }

    pub fn param_ids(&self) -> std::collections::HashSet<String> {
        let mut ids = collect_param_ids(&self.options);
        ids.insert(self.name.clone());
        for sub in &self.subcommands {
            ids.insert(sub.name.clone());
        }
        ids
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct SubcommandResult {
    pub args: ArgsResult,
    pub options: HashMap<String, OptionResult>,
    pub subcommands: HashMap<String, SubcommandResult>,
}

/// Attempt to match `sub`'s own name at the stream head, then run its own
/// dispatch loop (its args, options, nested subcommands) exactly like a
/// miniature top-level parse — without a header, since a subcommand's name
/// is a plain literal token rather than a prefix+command pair.
pub fn analyse_subcommand(sub: &Subcommand, argv: &mut Argv) -> ParseResult<Option<SubcommandResult>> {
    let checkpoint = argv.checkpoint();
    match argv.next(Some(&sub.separators)) {
        Some((Token::Str(text), true)) if text == sub.name => {}
        _ => {
            argv.restore(checkpoint);
            return Ok(None);
        }
    }

    let saved_ids: Vec<String> = argv.param_ids.iter().cloned().collect();
    argv.param_ids.extend(sub.param_ids());

    let outcome = run_scope(sub, argv);

    argv.param_ids.clear();
    argv.param_ids.extend(saved_ids);

    outcome.map(Some)
}

/// The per-scope dispatch loop shared with the top-level analyser: reuse
/// `Analyser::analyse` over this subcommand's own options/subcommands/args
/// so a compact option interleaved with variadic positionals (e.g. `-UUU`
/// after greedily-collected packages) stops the variadic the same way it
/// would at the top level, rather than being swallowed as a stray value.
fn run_scope(sub: &Subcommand, argv: &mut Argv) -> ParseResult<SubcommandResult> {
    let params: Vec<Param> = sub
        .options
        .iter()
        .cloned()
        .map(Param::Opt)
        .chain(sub.subcommands.iter().cloned().map(Param::Subcommand))
        .collect();

    let analyser = Analyser::new(params, sub.args.clone());
    let outcome = analyser.analyse(argv)?;

    Ok(SubcommandResult {
        args: outcome.args,
        options: outcome.options,
        subcommands: outcome.subcommands,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::argv::Segment;
    use crate::pattern::IntPattern;
    use std::sync::Arc;

    fn argv_for(input: &str) -> Argv {
        Argv::with_default_separators(&[Segment::Text(input.to_string())])
    }

    #[test]
    fn matches_own_name_and_args() {
        let sub = Subcommand::new("install").with_args(Args::new().add(crate::args::Arg::new(
            "count",
            Arc::new(IntPattern),
        )));
        let mut argv = argv_for("install 3");
        let result = analyse_subcommand(&sub, &mut argv).unwrap().unwrap();
        assert_eq!(
            result.args.get("count"),
            Some(&crate::args::ArgValue::Single("3".into()))
        );
    }

    #[test]
    fn non_matching_name_leaves_stream_untouched() {
        let sub = Subcommand::new("install");
        let mut argv = argv_for("remove");
        let result = analyse_subcommand(&sub, &mut argv).unwrap();
        assert!(result.is_none());
        let (tok, _) = argv.next(None).unwrap();
        assert_eq!(tok, Token::Str("remove".into()));
    }

    #[test]
    fn nested_subcommand_matches_recursively() {
        let leaf = Subcommand::new("list");
        let sub = Subcommand::new("pkg").with_subcommand(leaf);
        let mut argv = argv_for("pkg list");
        let result = analyse_subcommand(&sub, &mut argv).unwrap().unwrap();
        assert!(result.subcommands.contains_key("list"));
    }

    #[test]
    fn nested_option_is_collected_under_subcommand_scope() {
        let sub = Subcommand::new("pkg").with_option(Opt::new("--quiet|-q"));
        let mut argv = argv_for("pkg -q");
        let result = analyse_subcommand(&sub, &mut argv).unwrap().unwrap();
        assert!(result.options.contains_key("quiet"));
    }
}
