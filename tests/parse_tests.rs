//! End-to-end parses from the worked examples: echo/add/pip-install,
//! prefix lists, and the duplicate-option rejection property.

use std::sync::Arc;

use alconna::args::{Arg, ArgValue, Args, VarFlag, VarPositional};
use alconna::argv::{separators, Segment};
use alconna::core::Alconna;
use alconna::header::{HeaderCommand, Prefix};
use alconna::option::{Action, Opt};
use alconna::pattern::{AnyStr, IntPattern};
use alconna::subcommand::Subcommand;

fn seg(s: &str) -> Vec<Segment> {
    vec![Segment::Text(s.to_string())]
}

#[test]
fn echo_matches_single_message() {
    let alc = Alconna::new(HeaderCommand::Literal("echo".into()), vec![])
        .unwrap()
        .with_main_args(Args::new().add(Arg::new("msg", Arc::new(AnyStr))));

    let result = alc.parse(&seg("echo hello")).unwrap();
    assert!(result.matched);
    assert_eq!(result.main_args.get("msg"), Some(&ArgValue::Single("hello".into())));
}

#[test]
fn add_matches_two_ints_and_fails_on_non_numeric() {
    let alc = Alconna::new(HeaderCommand::Literal("add".into()), vec![])
        .unwrap()
        .with_main_args(
            Args::new()
                .add(Arg::new("x", Arc::new(IntPattern)))
                .add(Arg::new("y", Arc::new(IntPattern))),
        );

    let ok = alc.parse(&seg("add 2 3")).unwrap();
    assert!(ok.matched);
    assert_eq!(ok.main_args.get("x"), Some(&ArgValue::Single("2".into())));
    assert_eq!(ok.main_args.get("y"), Some(&ArgValue::Single("3".into())));

    let bad = alc.parse(&seg("add 2 foo")).unwrap();
    assert!(!bad.matched);
    assert!(bad.error_info.unwrap().contains("foo"));
}

#[test]
fn pip_install_collects_packages_and_counts_flag() {
    let install = Subcommand::new("install")
        .with_args(Args::new().with_vars_positional(VarPositional {
            name: "pkg".into(),
            value: Arc::new(AnyStr),
            flag: VarFlag::ZeroOrMore,
            separators: separators(" "),
            limit: None,
            default: None,
        }))
        .with_option(Opt::new("-U").with_action(Action::count()));

    let alc = Alconna::new(HeaderCommand::Literal("/pip".into()), vec![])
        .unwrap()
        .with_subcommand(install);

    let result = alc.parse(&seg("/pip install a b -UUU")).unwrap();
    assert!(result.matched);
    let install_result = result.subcommands.get("install").unwrap();
    assert_eq!(
        install_result.args.get("pkg"),
        Some(&ArgValue::Multiple(vec!["a".into(), "b".into()]))
    );
    assert_eq!(
        install_result.options.get("U").unwrap().value,
        Some("3".to_string())
    );
}

#[test]
fn prefix_list_accepts_either_and_rejects_bare_command() {
    let alc = Alconna::new(
        HeaderCommand::Literal("hi".into()),
        vec![Prefix::Text("!".into()), Prefix::Text("?".into())],
    )
    .unwrap();

    assert!(alc.parse(&seg("!hi")).unwrap().matched);
    assert!(alc.parse(&seg("?hi")).unwrap().matched);
    assert!(!alc.parse(&seg("hi")).unwrap().matched);
}

#[test]
fn completion_on_partial_subcommand_name_prompts_full_name() {
    let install = Subcommand::new("install");
    let alc = Alconna::new(HeaderCommand::Literal("/pip".into()), vec![])
        .unwrap()
        .with_subcommand(install);

    let result = alc.parse_with_completion(&seg("/pip ins")).unwrap();
    assert!(!result.matched);
    assert!(result.error_data.iter().any(|p| p == "install"));
}

#[test]
fn non_duplicate_option_rejects_second_appearance() {
    let alc = Alconna::new(HeaderCommand::Literal("run".into()), vec![])
        .unwrap()
        .with_option(Opt::new("--mode"));

    let result = alc.parse(&seg("run --mode --mode"));
    match result {
        Ok(arp) => assert!(!arp.matched, "duplicate option should not silently succeed"),
        Err(_) => {}
    }
}
