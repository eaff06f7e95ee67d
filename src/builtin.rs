//! Special built-in option tokens (help/shortcut-management/completion),
//! toggleable per namespace via `AlconnaConfig`.

use crate::argv::Argv;
use crate::config::NamespaceConfig;
use crate::error::SpecialOption;

pub const HELP_ALIASES: [&str; 2] = ["--help", "-h"];
pub const SHORTCUT_ALIASES: [&str; 1] = ["--shortcut"];
pub const COMPLETION_ALIASES: [&str; 2] = ["--comp", "?"];

/// Register the enabled built-ins' tokens into `argv.special`, so the
/// dispatch loop's step 1 can recognize them without the grammar author
/// declaring them as ordinary options.
pub fn install(argv: &mut Argv, config: &NamespaceConfig) {
    if config.enable_help {
        for alias in HELP_ALIASES {
            argv.special.insert(alias.to_string(), SpecialOption::Help);
        }
    }
    if config.enable_shortcut {
        for alias in SHORTCUT_ALIASES {
            argv.special.insert(alias.to_string(), SpecialOption::Shortcut);
        }
    }
    if config.enable_completion {
        for alias in COMPLETION_ALIASES {
            argv.special.insert(alias.to_string(), SpecialOption::Completion);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::argv::Segment;

    #[test]
    fn disabled_namespace_options_omit_their_tokens() {
        let mut config = NamespaceConfig::default();
        config.enable_completion = false;
        let mut argv = Argv::with_default_separators(&[Segment::Text("--help".to_string())]);
        install(&mut argv, &config);
        assert_eq!(argv.special.get("--help"), Some(&SpecialOption::Help));
        assert_eq!(argv.special.get("--comp"), None);
    }
}
