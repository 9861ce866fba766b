//! Slash-command parsing for the chat input line.
//!
//! Commands never reach the session record; they mutate the stores and
//! report back through the status line. Anything that does not start with
//! `/` is a chat submission.

use crate::persistence::ThemeMode;

#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    Help,
    New,
    Model(String),
    Temperature(f64),
    MaxTokens(u32),
    TopP(f64),
    ResetParams,
    TemplateList,
    TemplateAdd { name: String, content: String },
    TemplateRemove(String),
    TemplateUse(String),
    /// `None` toggles, `Some` sets explicitly.
    Theme(Option<ThemeMode>),
}

pub const HELP_TEXT: &str = "/new /model <id> /temp <v> /tokens <n> /topp <v> /reset \
/template list|add <name> :: <content>|rm <id>|use <id> /theme [light|dark]";

/// Parse one input line. `None` when the line is not a command at all;
/// `Some(Err(..))` carries a usage message for malformed commands.
pub fn parse(input: &str) -> Option<Result<Command, String>> {
    let rest = input.trim().strip_prefix('/')?;
    let mut words = rest.split_whitespace();
    let name = words.next().unwrap_or_default();
    let args: Vec<&str> = words.collect();

    let parsed = match name {
        "help" => Ok(Command::Help),
        "new" => Ok(Command::New),
        "model" => match args.first() {
            Some(id) => Ok(Command::Model(id.to_string())),
            None => Err("Usage: /model <id>".to_string()),
        },
        "temp" => parse_number(&args, "/temp <value>").map(Command::Temperature),
        "topp" => parse_number(&args, "/topp <value>").map(Command::TopP),
        "tokens" => match args.first().and_then(|v| v.parse::<u32>().ok()) {
            Some(n) => Ok(Command::MaxTokens(n)),
            None => Err("Usage: /tokens <count>".to_string()),
        },
        "reset" => Ok(Command::ResetParams),
        "template" => parse_template(rest, &args),
        "theme" => match args.first() {
            None => Ok(Command::Theme(None)),
            Some(&"light") => Ok(Command::Theme(Some(ThemeMode::Light))),
            Some(&"dark") => Ok(Command::Theme(Some(ThemeMode::Dark))),
            Some(other) => Err(format!("Unknown theme: {other}")),
        },
        other => Err(format!("Unknown command: /{other} (try /help)")),
    };

    Some(parsed)
}

fn parse_number(args: &[&str], usage: &str) -> Result<f64, String> {
    args.first()
        .and_then(|v| v.parse::<f64>().ok())
        .ok_or_else(|| format!("Usage: {usage}"))
}

fn parse_template(rest: &str, args: &[&str]) -> Result<Command, String> {
    match args.first().copied() {
        Some("list") => Ok(Command::TemplateList),
        Some("add") => {
            // `/template add <name> :: <content>`; the name may contain spaces.
            let after_add = rest
                .split_once("add")
                .map(|(_, tail)| tail.trim())
                .unwrap_or_default();
            match after_add.split_once("::") {
                Some((name, content)) if !name.trim().is_empty() && !content.trim().is_empty() => {
                    Ok(Command::TemplateAdd {
                        name: name.trim().to_string(),
                        content: content.trim().to_string(),
                    })
                }
                _ => Err("Usage: /template add <name> :: <content>".to_string()),
            }
        }
        Some("rm") => match args.get(1) {
            Some(id) => Ok(Command::TemplateRemove(id.to_string())),
            None => Err("Usage: /template rm <id>".to_string()),
        },
        Some("use") => match args.get(1) {
            Some(id) => Ok(Command::TemplateUse(id.to_string())),
            None => Err("Usage: /template use <id>".to_string()),
        },
        _ => Err("Usage: /template list|add|rm|use".to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_text_is_not_a_command() {
        assert!(parse("hello world").is_none());
        assert!(parse("  leading spaces").is_none());
    }

    #[test]
    fn simple_commands_parse() {
        assert_eq!(parse("/new"), Some(Ok(Command::New)));
        assert_eq!(parse("/help"), Some(Ok(Command::Help)));
        assert_eq!(parse("/reset"), Some(Ok(Command::ResetParams)));
        assert_eq!(
            parse("/model gemini-pro"),
            Some(Ok(Command::Model("gemini-pro".to_string())))
        );
    }

    #[test]
    fn numeric_arguments_accept_zero() {
        assert_eq!(parse("/temp 0"), Some(Ok(Command::Temperature(0.0))));
        assert_eq!(parse("/tokens 0"), Some(Ok(Command::MaxTokens(0))));
        assert_eq!(parse("/topp 0.5"), Some(Ok(Command::TopP(0.5))));
    }

    #[test]
    fn malformed_arguments_yield_usage_errors() {
        assert!(matches!(parse("/temp warm"), Some(Err(_))));
        assert!(matches!(parse("/model"), Some(Err(_))));
        assert!(matches!(parse("/frobnicate"), Some(Err(_))));
    }

    #[test]
    fn template_add_splits_name_and_content_on_double_colon() {
        let parsed = parse("/template add Bug Report :: Describe the bug in {area}").unwrap();
        assert_eq!(
            parsed,
            Ok(Command::TemplateAdd {
                name: "Bug Report".to_string(),
                content: "Describe the bug in {area}".to_string(),
            })
        );
    }

    #[test]
    fn template_subcommands_parse() {
        assert_eq!(parse("/template list"), Some(Ok(Command::TemplateList)));
        assert_eq!(
            parse("/template rm 3"),
            Some(Ok(Command::TemplateRemove("3".to_string())))
        );
        assert_eq!(
            parse("/template use 2"),
            Some(Ok(Command::TemplateUse("2".to_string())))
        );
        assert!(matches!(parse("/template add no-content"), Some(Err(_))));
    }

    #[test]
    fn theme_parses_explicit_and_toggle_forms() {
        assert_eq!(parse("/theme"), Some(Ok(Command::Theme(None))));
        assert_eq!(
            parse("/theme light"),
            Some(Ok(Command::Theme(Some(ThemeMode::Light))))
        );
        assert!(matches!(parse("/theme sepia"), Some(Err(_))));
    }
}
