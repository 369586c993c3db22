//! Parser for the side-channel command grammar
//!
//! Format (one command per write):
//! - `exit`                    shut the host down
//! - `{ <code> }`              compile and run inline code
//! - `+ <path>[:arg1[:arg2]]`  compile a script and queue it for admission
//! - `- <id>` / `- 0x<id>`     remove a running unit
//! - `^`                       print engine status
//! - `get_vm_start_time()`     print the engine start timestamp
//!
//! Anything else is `Unrecognized`. Parsing never fails.

use std::path::PathBuf;

use crate::engine::UnitId;
use crate::error::IdParseError;

/// A parsed side-channel command
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Shutdown,
    EvalCode { source: String },
    AddScript { path: PathBuf, args: Vec<String> },
    RemoveScript { id: UnitId },
    QueryStatus,
    StartTime,
    Unrecognized { raw: String },
}

impl Command {
    /// Short name used in log records
    pub fn kind(&self) -> &'static str {
        match self {
            Command::Shutdown => "exit",
            Command::EvalCode { .. } => "eval",
            Command::AddScript { .. } => "add",
            Command::RemoveScript { .. } => "remove",
            Command::QueryStatus => "status",
            Command::StartTime => "start-time",
            Command::Unrecognized { .. } => "unrecognized",
        }
    }
}

/// Parse a unit id: `0x`-prefixed tokens are base 16, everything else base 10
pub fn parse_id(text: &str) -> Result<UnitId, IdParseError> {
    let text = text.trim();
    if text.is_empty() {
        return Err(IdParseError::Empty);
    }

    let parsed = match text.strip_prefix("0x") {
        Some(hex) => u64::from_str_radix(hex, 16),
        None => text.parse::<u64>(),
    };

    parsed
        .map(UnitId)
        .map_err(|_| IdParseError::Invalid(text.to_string()))
}

/// Split `path:arg1:arg2` into the path and its positional arguments
pub fn split_script_spec(spec: &str) -> (PathBuf, Vec<String>) {
    let mut segments = spec.split(':');
    let path = PathBuf::from(segments.next().unwrap_or_default());
    let args = segments.map(str::to_string).collect();
    (path, args)
}

/// Classify one trimmed command record
pub fn parse(text: &str) -> Command {
    if text == "exit" {
        return Command::Shutdown;
    }

    if text.len() >= 2 && text.starts_with('{') && text.ends_with('}') {
        return Command::EvalCode {
            source: text[1..text.len() - 1].to_string(),
        };
    }

    if let Some(spec) = text.strip_prefix("+ ") {
        let spec = spec.trim();
        if spec.is_empty() || spec.starts_with(':') {
            return Command::Unrecognized {
                raw: text.to_string(),
            };
        }
        let (path, args) = split_script_spec(spec);
        return Command::AddScript { path, args };
    }

    if let Some(id_text) = text.strip_prefix("- ") {
        return match parse_id(id_text) {
            Ok(id) => Command::RemoveScript { id },
            Err(_) => Command::Unrecognized {
                raw: text.to_string(),
            },
        };
    }

    if text.starts_with('^') {
        return Command::QueryStatus;
    }

    if text == "get_vm_start_time()" {
        return Command::StartTime;
    }

    Command::Unrecognized {
        raw: text.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_parse_exit() {
        assert_eq!(parse("exit"), Command::Shutdown);
        // Exact match only
        assert!(matches!(parse("exit now"), Command::Unrecognized { .. }));
    }

    #[test]
    fn test_parse_eval() {
        assert_eq!(
            parse("{ sine 440 0.2 }"),
            Command::EvalCode {
                source: " sine 440 0.2 ".to_string()
            }
        );
        assert_eq!(
            parse("{}"),
            Command::EvalCode {
                source: String::new()
            }
        );
        // Unbalanced
        assert!(matches!(parse("{ sine 440"), Command::Unrecognized { .. }));
        assert!(matches!(parse("}"), Command::Unrecognized { .. }));
    }

    #[test]
    fn test_parse_add_with_args() {
        assert_eq!(
            parse("+ demo.ck:440:0.5"),
            Command::AddScript {
                path: PathBuf::from("demo.ck"),
                args: args(&["440", "0.5"]),
            }
        );
    }

    #[test]
    fn test_parse_add_segment_counts() {
        for n in 0..6 {
            let list: Vec<String> = (0..n).map(|i| format!("a{}", i)).collect();
            let mut text = "+ /tmp/patch.ck".to_string();
            for a in &list {
                text.push(':');
                text.push_str(a);
            }

            match parse(&text) {
                Command::AddScript { path, args } => {
                    assert_eq!(path, PathBuf::from("/tmp/patch.ck"));
                    assert_eq!(args, list);
                }
                other => panic!("expected AddScript, got {:?}", other),
            }
        }
    }

    #[test]
    fn test_parse_add_empty_args_kept() {
        assert_eq!(
            parse("+ a.ck::x"),
            Command::AddScript {
                path: PathBuf::from("a.ck"),
                args: args(&["", "x"]),
            }
        );
    }

    #[test]
    fn test_parse_add_missing_path() {
        assert!(matches!(parse("+ "), Command::Unrecognized { .. }));
        assert!(matches!(parse("+ :440"), Command::Unrecognized { .. }));
        // No space after '+'
        assert!(matches!(parse("+demo.ck"), Command::Unrecognized { .. }));
    }

    #[test]
    fn test_parse_remove() {
        assert_eq!(parse("- 0x2a"), Command::RemoveScript { id: UnitId(42) });
        assert_eq!(parse("- 42"), Command::RemoveScript { id: UnitId(42) });
        assert_eq!(parse("- 0xff"), Command::RemoveScript { id: UnitId(255) });
        assert_eq!(parse("- 010"), Command::RemoveScript { id: UnitId(10) });
    }

    #[test]
    fn test_parse_remove_invalid_keeps_text() {
        assert_eq!(
            parse("- banana"),
            Command::Unrecognized {
                raw: "- banana".to_string()
            }
        );
        assert!(matches!(parse("- 0xzz"), Command::Unrecognized { .. }));
        assert!(matches!(parse("- -3"), Command::Unrecognized { .. }));
        assert!(matches!(parse("- "), Command::Unrecognized { .. }));
    }

    #[test]
    fn test_parse_status_and_start_time() {
        assert_eq!(parse("^"), Command::QueryStatus);
        assert_eq!(parse("^ anything"), Command::QueryStatus);
        assert_eq!(parse("get_vm_start_time()"), Command::StartTime);
    }

    #[test]
    fn test_parse_unrecognized() {
        assert_eq!(
            parse("not a real command"),
            Command::Unrecognized {
                raw: "not a real command".to_string()
            }
        );
        assert!(matches!(parse(""), Command::Unrecognized { .. }));
    }

    #[test]
    fn test_parse_id() {
        assert_eq!(parse_id("0x2a"), Ok(UnitId(42)));
        // Only lowercase prefix is recognized
        assert!(parse_id("0X2a").is_err());
        assert_eq!(parse_id(" 17 "), Ok(UnitId(17)));
        assert_eq!(parse_id(""), Err(IdParseError::Empty));
        assert_eq!(
            parse_id("0x"),
            Err(IdParseError::Invalid("0x".to_string()))
        );
        assert!(parse_id("99999999999999999999999").is_err());
    }
}
