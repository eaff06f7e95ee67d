//! The structured result tree (`Arparma`) and its dotted-path lookup.

use std::collections::HashMap;

use crate::args::{ArgValue, ArgsResult};
use crate::error::ParseFailure;
use crate::header::HeadResult;
use crate::option::OptionResult;
use crate::subcommand::SubcommandResult;

#[derive(Debug, Clone, Default)]
pub struct Arparma {
    pub matched: bool,
    pub header_match: Option<HeadResult>,
    pub main_args: ArgsResult,
    pub options: HashMap<String, OptionResult>,
    pub subcommands: HashMap<String, SubcommandResult>,
    pub error_info: Option<String>,
    /// Remaining unconsumed tokens when a parse failed mid-stream.
    pub error_data: Vec<String>,
}

impl Arparma {
    pub fn success(
        header_match: HeadResult,
        main_args: ArgsResult,
        options: HashMap<String, OptionResult>,
        subcommands: HashMap<String, SubcommandResult>,
    ) -> Self {
        Self {
            matched: true,
            header_match: Some(header_match),
            main_args,
            options,
            subcommands,
            error_info: None,
            error_data: Vec::new(),
        }
    }

    pub fn failure(failure: ParseFailure) -> Self {
        Self {
            matched: false,
            header_match: None,
            main_args: ArgsResult::default(),
            options: HashMap::new(),
            subcommands: HashMap::new(),
            error_info: Some(failure.message),
            error_data: failure.remaining,
        }
    }

    /// Dotted-path lookup, e.g. `"install.pkg"` reaches into a subcommand's
    /// own args, `"verbose"` reaches a top-level option's stored value.
    pub fn query(&self, path: &str) -> Option<QueryValue<'_>> {
        let mut segments = path.split('.');
        let first = segments.next()?;

        if let Some(value) = self.main_args.get(first) {
            if let Some(rest) = segments.next() {
                let _ = rest; // main args are not nested by dotted path
                return None;
            }
            return Some(QueryValue::Arg(value));
        }

        if let Some(opt) = self.options.get(first) {
            let remainder: Vec<&str> = segments.collect();
            if remainder.is_empty() {
                return Some(QueryValue::Option(opt));
            }
            return opt.args.get(&remainder.join(".")).map(QueryValue::Arg);
        }

        if let Some(sub) = self.subcommands.get(first) {
            let remainder: Vec<&str> = segments.collect();
            if remainder.is_empty() {
                return Some(QueryValue::Subcommand(sub));
            }
            let sub_path = remainder.join(".");
            return query_subcommand(sub, &sub_path);
        }

        None
    }

    /// Typed convenience wrapper over `query`, mirroring `.query[T](path)`.
    pub fn query_as<T: std::str::FromStr>(&self, path: &str) -> Option<T> {
        match self.query(path)? {
            QueryValue::Arg(ArgValue::Single(s)) => s.parse().ok(),
            _ => None,
        }
    }
}

fn query_subcommand<'a>(sub: &'a SubcommandResult, path: &str) -> Option<QueryValue<'a>> {
    let mut segments = path.split('.');
    let first = segments.next()?;

    if let Some(value) = sub.args.get(first) {
        return Some(QueryValue::Arg(value));
    }
    if let Some(opt) = sub.options.get(first) {
        return Some(QueryValue::Option(opt));
    }
    if let Some(nested) = sub.subcommands.get(first) {
        let remainder: Vec<&str> = segments.collect();
        if remainder.is_empty() {
            return Some(QueryValue::Subcommand(nested));
        }
        return query_subcommand(nested, &remainder.join("."));
    }
    None
}

#[derive(Debug, Clone, PartialEq)]
pub enum QueryValue<'a> {
    Arg(&'a ArgValue),
    Option(&'a OptionResult),
    Subcommand(&'a SubcommandResult),
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::header::{Header, HeaderCommand};

    #[test]
    fn query_reaches_top_level_main_arg() {
        let mut main_args = ArgsResult::default();
        main_args.0.insert("msg".into(), ArgValue::Single("hello".into()));
        let header = Header::compile(HeaderCommand::Literal("echo".into()), vec![], false).unwrap();
        let head = header.match_head(&mut crate::argv::Argv::with_default_separators(&[
            crate::argv::Segment::Text("echo".into()),
        ]))
        .unwrap();
        let arp = Arparma::success(head, main_args, HashMap::new(), HashMap::new());
        assert_eq!(arp.query("msg"), Some(QueryValue::Arg(&ArgValue::Single("hello".into()))));
    }

    #[test]
    fn query_reaches_nested_subcommand_arg() {
        let mut sub_args = ArgsResult::default();
        sub_args.0.insert("pkg".into(), ArgValue::Multiple(vec!["a".into(), "b".into()]));
        let mut subcommands = HashMap::new();
        subcommands.insert(
            "install".to_string(),
            SubcommandResult {
                args: sub_args,
                options: HashMap::new(),
                subcommands: HashMap::new(),
            },
        );
        let header = Header::compile(HeaderCommand::Literal("pip".into()), vec![], false).unwrap();
        let head = header.match_head(&mut crate::argv::Argv::with_default_separators(&[
            crate::argv::Segment::Text("pip".into()),
        ]))
        .unwrap();
        let arp = Arparma::success(head, ArgsResult::default(), HashMap::new(), subcommands);
        assert_eq!(
            arp.query("install.pkg"),
            Some(QueryValue::Arg(&ArgValue::Multiple(vec!["a".into(), "b".into()])))
        );
    }

    #[test]
    fn failure_carries_remaining_tokens() {
        let failure = ParseFailure::new(Some("foo".into()), "bad token".into(), vec!["bar".into()]);
        let arp = Arparma::failure(failure);
        assert!(!arp.matched);
        assert_eq!(arp.error_data, vec!["bar".to_string()]);
    }
}
