//! C5's top-level dispatch loop (`analyse_param`) — the algorithm shared
//! by the command's own scope and mirrored structurally by
//! `subcommand::run_scope` for nested scopes.

use std::collections::HashMap;

use crate::args::{analyse_args, Args, ArgsResult, Field};
use crate::argv::{Argv, Token};
use crate::error::{ControlSignal, ParseResult, SpecialOption};
use crate::option::{merge_duplicate, OptionResult};
use crate::param::{compact_params, compile_params, Param, ParamDispatch, ParamOutcome};
use crate::subcommand::SubcommandResult;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct AnalyseResult {
    pub args: ArgsResult,
    pub options: HashMap<String, OptionResult>,
    pub subcommands: HashMap<String, SubcommandResult>,
    pub extra: Vec<String>,
}

pub struct Analyser {
    pub params: Vec<Param>,
    pub main_args: Args,
    pub extra_allow: bool,
}

impl Analyser {
    pub fn new(params: Vec<Param>, main_args: Args) -> Self {
        Self {
            params,
            main_args,
            extra_allow: false,
        }
    }

    pub fn with_extra_allow(mut self, allow: bool) -> Self {
        self.extra_allow = allow;
        self
    }

    /// Run the six-step dispatch loop until the scope terminates (stream
    /// exhausted, or no step could make progress on the head token).
    pub fn analyse(&self, argv: &mut Argv) -> ParseResult<AnalyseResult> {
        let exact = compile_params(&self.params);
        let compact = compact_params(&self.params);
        let mut result = AnalyseResult::default();
        let mut args_filled = false;

        loop {
            if argv.is_exhausted() {
                break;
            }

            let Some(head) = peek_text(argv) else {
                break;
            };

            // Step 1: special keyword interrupt. Under `comp_ctx`, a
            // completion trigger builds the prompt list in place of the
            // generic signal (§4.7's "special keyword" completion path).
            if let Some(special) = argv.special.get(&head).copied() {
                if special == SpecialOption::Completion && argv.comp_ctx {
                    let prompts = self.build_prompts(argv, None, &result);
                    return Err(ControlSignal::PauseTriggered(prompts).into());
                }
                return Err(ControlSignal::SpecialOptionTriggered(special).into());
            }

            // Step 2: exact compile_params dispatch. A soft-keyword param
            // is skipped here while the scope isn't yet satisfied, so it
            // falls through to the args/extra steps and is treated as data.
            if let Some(&idx) = exact.get(&head) {
                if !self.is_soft_gated(&self.params[idx], &result)
                    && self.dispatch_one(&self.params[idx], argv, &mut result)?
                {
                    continue;
                }
            }

            // Step 3: speculative compact dispatch.
            if self.try_compact(&compact, argv, &mut result)? {
                continue;
            }

            // Step 4: main args, once.
            if !args_filled {
                args_filled = true;
                let before = argv.current_index();
                result.args = analyse_args(&self.main_args, argv)?;
                if argv.current_index() != before {
                    continue;
                }
            }

            // Step 5: extra collection.
            if self.extra_allow {
                let (token, _) = argv.next(None).expect("peeked above");
                if let Token::Str(text) = token {
                    result.extra.push(text);
                }
                continue;
            }

            // Step 6: terminate. Under `comp_ctx` the unresolvable head is
            // treated as a partial completion query instead (§4.7's
            // "partial string" path), filtering `compile_params` by it.
            if argv.comp_ctx {
                let prompts = self.build_prompts(argv, Some(&head), &result);
                return Err(ControlSignal::PauseTriggered(prompts).into());
            }
            break;
        }

        Ok(result)
    }

    /// Is `param` a soft keyword that is currently gated off because the
    /// scope's required positional/keyword args aren't bound yet? A
    /// soft-keyword param only dispatches once the scope is satisfied;
    /// until then the matching token is left for the args/extra steps.
    fn is_soft_gated(&self, param: &Param, result: &AnalyseResult) -> bool {
        let gated = match param {
            Param::Opt(o) => o.soft_keyword,
            Param::Subcommand(s) => s.soft_keyword && s.satisfy_previous,
            Param::Sentence(_) => false,
        };
        gated && !scope_satisfied(&self.main_args, result)
    }

    /// Build a completion prompt list per §4.7:
    /// - if the stream's ambient context names an `Arg` being matched,
    ///   list that arg's completion hints (or its display form);
    /// - else if `partial` is set (an unresolvable head token), filter
    ///   every param's names by substring, skipping already-seen ones;
    /// - else list every not-yet-seen param plus the next expected
    ///   positional.
    ///
    /// A nested subcommand's own `Analyser` runs this same method over
    /// its own `params`, so the "context is a Subcommand: list its
    /// compile_params" case falls out naturally rather than needing a
    /// separate branch here.
    fn build_prompts(&self, argv: &Argv, partial: Option<&str>, result: &AnalyseResult) -> Vec<String> {
        if let Some(arg_name) = &argv.context.current_arg {
            if let Some(field) = self.find_arg_field(arg_name) {
                if !field.completion.is_empty() {
                    return field.completion.clone();
                }
                return vec![arg_name.clone()];
            }
        }

        let mut prompts = Vec::new();
        for param in &self.params {
            let (names, already_seen) = match param {
                Param::Opt(o) => (o.aliases.clone(), result.options.contains_key(&o.dest) && !o.allow_duplicate),
                Param::Subcommand(s) => (vec![s.name.clone()], result.subcommands.contains_key(&s.name)),
                Param::Sentence(s) => (vec![s.text.clone()], false),
            };
            if already_seen {
                continue;
            }
            for name in names {
                match partial {
                    Some(text) if !name.contains(text) => continue,
                    _ => prompts.push(name),
                }
            }
        }

        if partial.is_none() {
            if let Some(first_normal) = self.main_args.normal.first() {
                prompts.push(first_normal.name.clone());
            }
        }

        prompts
    }

    fn find_arg_field(&self, name: &str) -> Option<&Field> {
        self.main_args
            .normal
            .iter()
            .find(|a| a.name == name)
            .map(|a| &a.field)
            .or_else(|| {
                self.main_args
                    .keyword_only
                    .iter()
                    .find(|(n, _)| n == name)
                    .map(|(_, a)| &a.field)
            })
    }

    fn dispatch_one(&self, param: &Param, argv: &mut Argv, result: &mut AnalyseResult) -> ParseResult<bool> {
        match param.try_match(argv)? {
            Some(ParamOutcome::Option(opt_result)) => {
                let Param::Opt(opt) = param else {
                    unreachable!("ParamOutcome::Option only comes from Param::Opt")
                };
                let merged = merge_duplicate(opt, result.options.remove(&opt.dest), opt_result)?;
                result.options.insert(opt.dest.clone(), merged);
                Ok(true)
            }
            Some(ParamOutcome::Subcommand(sub_result)) => {
                let Param::Subcommand(sub) = param else {
                    unreachable!("ParamOutcome::Subcommand only comes from Param::Subcommand")
                };
                result.subcommands.insert(sub.name.clone(), sub_result);
                Ok(true)
            }
            Some(ParamOutcome::Sentence) => Ok(true),
            None => Ok(false),
        }
    }

    fn try_compact(&self, compact: &[usize], argv: &mut Argv, result: &mut AnalyseResult) -> ParseResult<bool> {
        for &idx in compact {
            if self.is_soft_gated(&self.params[idx], result) {
                continue;
            }
            let checkpoint = argv.checkpoint();
            match self.dispatch_one(&self.params[idx], argv, result) {
                Ok(true) => return Ok(true),
                Ok(false) => {
                    argv.restore(checkpoint);
                }
                Err(crate::error::ParseSignal::Failure(_)) => {
                    argv.restore(checkpoint);
                }
                Err(signal) => return Err(signal),
            }
        }
        Ok(false)
    }
}

/// Is every required positional and non-optional keyword-only arg of
/// `main_args` already bound in `result`? (the glossary's "Satisfied".)
fn scope_satisfied(main_args: &Args, result: &AnalyseResult) -> bool {
    main_args
        .normal
        .iter()
        .all(|a| a.field.optional || result.args.get(&a.name).is_some())
        && main_args
            .keyword_only
            .iter()
            .all(|(name, a)| a.field.optional || result.args.get(name).is_some())
}

fn peek_text(argv: &Argv) -> Option<String> {
    match argv.peek()? {
        Token::Str(s) => Some(s.clone()),
        Token::Opaque(_) => None,
    }
}

pub fn register_special(argv: &mut Argv, token: &str, special: SpecialOption) {
    argv.special.insert(token.to_string(), special);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::args::Arg;
    use crate::argv::Segment;
    use crate::option::Opt;
    use crate::pattern::{AnyStr, IntPattern};
    use std::sync::Arc;

    fn argv_for(input: &str) -> Argv {
        Argv::with_default_separators(&[Segment::Text(input.to_string())])
    }

    #[test]
    fn dispatches_option_then_fills_main_args() {
        let params = vec![Param::Opt(Opt::new("--verbose|-v"))];
        let main_args = Args::new().add(Arg::new("name", Arc::new(AnyStr)));
        let analyser = Analyser::new(params, main_args);
        let mut argv = argv_for("-v bob");
        let result = analyser.analyse(&mut argv).unwrap();
        assert!(result.options.contains_key("verbose"));
        assert_eq!(
            result.args.get("name"),
            Some(&crate::args::ArgValue::Single("bob".into()))
        );
    }

    #[test]
    fn unrecognized_trailing_token_without_extra_allow_halts_scope() {
        let params: Vec<Param> = vec![];
        let main_args = Args::new().add(Arg::new("count", Arc::new(IntPattern)));
        let analyser = Analyser::new(params, main_args);
        let mut argv = argv_for("3 bogus");
        let result = analyser.analyse(&mut argv).unwrap();
        assert_eq!(result.args.get("count"), Some(&crate::args::ArgValue::Single("3".into())));
        assert!(result.extra.is_empty());
        let (tok, _) = argv.next(None).unwrap();
        assert_eq!(tok, Token::Str("bogus".into()));
    }

    #[test]
    fn extra_allow_collects_unmatched_tail() {
        let params: Vec<Param> = vec![];
        let analyser = Analyser::new(params, Args::new()).with_extra_allow(true);
        let mut argv = argv_for("a b c");
        let result = analyser.analyse(&mut argv).unwrap();
        assert_eq!(result.extra, vec!["a", "b", "c"]);
    }

    #[test]
    fn soft_keyword_option_is_gated_until_scope_satisfied() {
        let params = vec![Param::Opt(Opt::new("--done").soft_keyword())];
        let main_args = Args::new().add(Arg::new("name", Arc::new(AnyStr)));
        let analyser = Analyser::new(params, main_args);

        // `--done` appears before `name` is bound, so it's treated as data
        // for the positional slot rather than dispatched as an option.
        let mut argv = argv_for("--done bob");
        let result = analyser.analyse(&mut argv).unwrap();
        assert!(!result.options.contains_key("done"));
        assert_eq!(
            result.args.get("name"),
            Some(&crate::args::ArgValue::Single("--done".into()))
        );
    }

    #[test]
    fn soft_keyword_option_dispatches_once_scope_satisfied() {
        let params = vec![Param::Opt(Opt::new("--done").soft_keyword())];
        let main_args = Args::new().add(Arg::new("name", Arc::new(AnyStr)));
        let analyser = Analyser::new(params, main_args);

        let mut argv = argv_for("bob --done");
        let result = analyser.analyse(&mut argv).unwrap();
        assert!(result.options.contains_key("done"));
        assert_eq!(
            result.args.get("name"),
            Some(&crate::args::ArgValue::Single("bob".into()))
        );
    }

    #[test]
    fn special_keyword_interrupts_with_control_signal() {
        let params: Vec<Param> = vec![];
        let analyser = Analyser::new(params, Args::new());
        let mut argv = argv_for("--help");
        register_special(&mut argv, "--help", SpecialOption::Help);
        let err = analyser.analyse(&mut argv).unwrap_err();
        match err {
            crate::error::ParseSignal::Control(ControlSignal::SpecialOptionTriggered(SpecialOption::Help)) => {}
            other => panic!("unexpected signal: {other:?}"),
        }
    }
}
