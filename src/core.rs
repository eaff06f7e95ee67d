//! The user-facing grammar builder: `Alconna(*elements, ...)`, `Option(...)`,
//! `Subcommand(...)` per the external interface section, plus the top-level
//! `parse` entry point that wires header match → dispatch loop → result
//! assembly → the special-option/fuzzy short-circuit paths.

use tracing::{debug, instrument, trace};

use crate::analyser::Analyser;
use crate::args::Args;
use crate::argv::{Argv, Segment};
use crate::builtin;
use crate::config::NamespaceConfig;
use crate::error::{ControlSignal, ParseSignal, SpecialOption};
use crate::header::{Header, HeaderCommand, Prefix};
use crate::option::Opt;
use crate::param::Param;
use crate::result::Arparma;
use crate::shortcut::{try_expand, ShortcutArgs, ShortcutTable};
use crate::subcommand::Subcommand;

pub use crate::option::Opt as OptionBuilder;
pub use crate::subcommand::Subcommand as SubcommandBuilder;

/// Re-export constructors under the spec's naming (`Option(...)`,
/// `Subcommand(...)`) without shadowing `std::option::Option`.
pub fn option(name_or_aliases: &str) -> Opt {
    Opt::new(name_or_aliases)
}

pub fn subcommand(name: impl Into<String>) -> Subcommand {
    Subcommand::new(name)
}

/// A compiled command grammar: header, main args, options, subcommands,
/// and the command's own shortcut table.
pub struct Alconna {
    pub header: Header,
    pub main_args: Args,
    pub options: Vec<Opt>,
    pub subcommands: Vec<Subcommand>,
    pub namespace: String,
    pub extra_allow: bool,
    pub raise_exception: bool,
    pub config: NamespaceConfig,
    shortcuts: ShortcutTable,
}

impl Alconna {
    pub fn new(command: HeaderCommand, prefixes: Vec<Prefix>) -> Result<Self, crate::error::AlconnaError> {
        Ok(Self {
            header: Header::compile(command, prefixes, false)?,
            main_args: Args::new(),
            options: Vec::new(),
            subcommands: Vec::new(),
            namespace: String::new(),
            extra_allow: false,
            raise_exception: false,
            config: NamespaceConfig::default(),
            shortcuts: ShortcutTable::new(),
        })
    }

    pub fn with_main_args(mut self, args: Args) -> Self {
        self.main_args = args;
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

    pub fn with_namespace(mut self, namespace: impl Into<String>) -> Self {
        self.namespace = namespace.into();
        self
    }

    pub fn with_config(mut self, config: NamespaceConfig) -> Self {
        self.config = config;
        self
    }

    /// Register (or replace) a shortcut, matching the spec's
    /// `shortcut(key, {command, arguments, fuzzy, prefix, wrapper})` surface.
    /// Passing `delete=true` removes an existing shortcut instead.
    pub fn shortcut(&mut self, key: &str, args: Option<ShortcutArgs>, delete: bool) -> Result<(), crate::error::AlconnaError> {
        if delete {
            self.shortcuts.delete(key);
            return Ok(());
        }
        let args = args.unwrap_or_else(|| ShortcutArgs::new(self.header.command_name.clone(), Vec::new()));
        self.shortcuts.register(key, args, &prefix_strings(&self.header.prefixes))
    }

    fn params(&self) -> Vec<Param> {
        let mut params: Vec<Param> = self.options.iter().cloned().map(Param::Opt).collect();
        params.extend(self.subcommands.iter().cloned().map(Param::Subcommand));
        params
    }

    /// Parse `segments` against this grammar. Never panics on malformed
    /// input: expected failures and control-flow signals both become a
    /// `matched = false` `Arparma`, unless `raise_exception` is set, in
    /// which case the signal is returned as `Err`.
    #[instrument(skip(self, segments), fields(command = %self.header.command_name))]
    pub fn parse(&self, segments: &[Segment]) -> Result<Arparma, ParseSignal> {
        self.parse_inner(segments, false)
    }

    /// Like `parse`, but sets the stream's `comp_ctx` so an unresolvable
    /// head token raises `PauseTriggered` with a built prompt list (§4.7)
    /// instead of an ordinary parse failure. Used by hosts driving an
    /// interactive completion UI.
    pub fn parse_with_completion(&self, segments: &[Segment]) -> Result<Arparma, ParseSignal> {
        self.parse_inner(segments, true)
    }

    fn parse_inner(&self, segments: &[Segment], comp_ctx: bool) -> Result<Arparma, ParseSignal> {
        let mut argv = Argv::build(
            segments,
            &crate::argv::separators(&self.config.default_separators),
            self.config.filter_crlf,
        );
        argv.namespace = self.namespace.clone();
        argv.fuzzy_match = self.config.fuzzy_match;
        argv.fuzzy_threshold = self.config.fuzzy_threshold;
        argv.comp_ctx = comp_ctx;
        argv.param_ids = crate::option::collect_param_ids(&self.options);
        for sub in &self.subcommands {
            argv.param_ids.insert(sub.name.clone());
        }
        builtin::install(&mut argv, &self.config);

        if let Some(expanded) = try_expand(&self.shortcuts, &argv) {
            trace!("shortcut expanded input");
            argv = expanded;
            argv.namespace = self.namespace.clone();
            argv.fuzzy_match = self.config.fuzzy_match;
            argv.fuzzy_threshold = self.config.fuzzy_threshold;
            argv.comp_ctx = comp_ctx;
            builtin::install(&mut argv, &self.config);
        }

        match self.run(&mut argv) {
            Ok(arparma) => Ok(arparma),
            Err(signal) => self.handle_signal(signal),
        }
    }

    fn run(&self, argv: &mut Argv) -> Result<Arparma, ParseSignal> {
        let head = self.header.match_head(argv)?;
        debug!(header = %head.result, "header matched");

        let params = self.params();
        let analyser = Analyser::new(params, self.main_args.clone()).with_extra_allow(self.extra_allow);
        let outcome = analyser.analyse(argv)?;

        Ok(Arparma::success(head, outcome.args, outcome.options, outcome.subcommands))
    }

    fn handle_signal(&self, signal: ParseSignal) -> Result<Arparma, ParseSignal> {
        if self.raise_exception {
            return Err(signal);
        }
        match signal {
            ParseSignal::Failure(failure) => Ok(Arparma::failure(failure)),
            ParseSignal::Control(ControlSignal::FuzzyMatchSuccess { source, target }) => {
                Ok(Arparma::failure(crate::error::ParseFailure::new(
                    Some(source),
                    format!("did you mean `{target}`?"),
                    Vec::new(),
                )))
            }
            ParseSignal::Control(ControlSignal::SpecialOptionTriggered(special)) => {
                Ok(Arparma::failure(crate::error::ParseFailure::new(
                    None,
                    format!("{special:?} triggered"),
                    Vec::new(),
                )))
            }
            ParseSignal::Control(ControlSignal::PauseTriggered(prompts)) => {
                Ok(Arparma::failure(crate::error::ParseFailure::new(
                    None,
                    format!("completion paused: {}", prompts.join(", ")),
                    prompts,
                )))
            }
        }
    }
}

fn prefix_strings(prefixes: &[Prefix]) -> Vec<String> {
    prefixes
        .iter()
        .filter_map(|p| match p {
            Prefix::Text(t) => Some(t.clone()),
            Prefix::Opaque(_) => None,
        })
        .collect()
}
