//! Thin demo binary: registers the `/pip install` grammar from the
//! worked example and parses one line of argv or stdin through it.

use std::io::{self, Read};
use std::sync::Arc;

use clap::Parser;

use alconna::args::{Args, VarFlag, VarPositional};
use alconna::argv::{separators, Segment};
use alconna::core::Alconna;
use alconna::header::HeaderCommand;
use alconna::option::{Action, Opt};
use alconna::pattern::AnyStr;
use alconna::subcommand::Subcommand;

#[derive(Parser, Debug)]
#[command(about = "Exercises the alconna parser against the /pip install sample grammar")]
struct Cli {
    /// The line to parse; reads stdin if omitted.
    line: Option<String>,
}

fn build_grammar() -> anyhow::Result<Alconna> {
    let install = Subcommand::new("install")
        .with_args(Args::new().with_vars_positional(VarPositional {
            name: "pkg".to_string(),
            value: Arc::new(AnyStr),
            flag: VarFlag::ZeroOrMore,
            separators: separators(" "),
            limit: None,
            default: None,
        }))
        .with_option(Opt::new("-U").with_action(Action::count()));

    let alc = Alconna::new(HeaderCommand::Literal("/pip".to_string()), vec![])
        .map_err(|e| anyhow::anyhow!(e))?
        .with_subcommand(install);
    Ok(alc)
}

fn main() -> anyhow::Result<()> {
    alconna::logging::init_tracing("info");

    let cli = Cli::parse();
    let line = match cli.line {
        Some(l) => l,
        None => {
            let mut buf = String::new();
            io::stdin().read_to_string(&mut buf)?;
            buf.trim().to_string()
        }
    };

    let alc = build_grammar()?;
    let result = alc
        .parse(&[Segment::Text(line)])
        .map_err(|e| anyhow::anyhow!("{e:?}"))?;

    let rendered = serde_json::json!({
        "matched": result.matched,
        "error_info": result.error_info,
        "subcommands": result.subcommands.keys().collect::<Vec<_>>(),
    });
    println!("{}", serde_json::to_string_pretty(&rendered)?);
    Ok(())
}
