//! The command interpreter: tokenizes an i3-style command line, substitutes
//! `$variable` references, and dispatches each semicolon-separated
//! statement through a sorted command table. The handler signature
//! (`Result<(), TreeError>`-shaped) is generalized here into a typed
//! `CommandOutcome` that can carry a user-facing error message, with
//! dispatch done by binary search over a table built once and looked up by
//! name.

pub mod handlers;

use std::collections::HashMap;

use crate::error::{Error, Result};

pub use handlers::CommandContext;

/// Outcome of running a single (post-`;`-split) command, mirroring the
/// i3-ipc `RUN_COMMAND` reply shape.
#[derive(Debug, Clone, PartialEq)]
pub struct CommandOutcome {
    pub success: bool,
    pub error: Option<String>,
}

impl CommandOutcome {
    pub fn ok() -> CommandOutcome {
        CommandOutcome {
            success: true,
            error: None,
        }
    }

    pub fn fail(message: impl Into<String>) -> CommandOutcome {
        CommandOutcome {
            success: false,
            error: Some(message.into()),
        }
    }
}

type Handler = fn(&mut CommandContext, &[String]) -> Result<()>;

/// Command names in strict ascending order (binary-search precondition),
/// compared case-insensitively.
const TABLE: &[(&str, Handler)] = &[
    ("bindsym", handlers::cmd_bindsym),
    ("exec", handlers::cmd_exec),
    ("exec_always", handlers::cmd_exec_always),
    ("floating", handlers::cmd_floating),
    ("focus", handlers::cmd_focus),
    ("fullscreen", handlers::cmd_fullscreen),
    ("kill", handlers::cmd_kill),
    ("layout", handlers::cmd_layout),
    ("mode", handlers::cmd_mode),
    ("reload", handlers::cmd_reload),
    ("split", handlers::cmd_split),
    ("splith", handlers::cmd_splith),
    ("splitv", handlers::cmd_splitv),
    ("workspace", handlers::cmd_workspace),
];

fn lookup(name: &str) -> Option<Handler> {
    TABLE
        .binary_search_by(|(candidate, _)| candidate.cmp(&&*name.to_ascii_lowercase()))
        .ok()
        .map(|i| TABLE[i].1)
}

/// Splits `input` into tokens, honoring both double- and single-quoted
/// strings (spaces preserved inside quotes, the other quote character
/// treated as a literal while one kind is open) and backslash-escaping of
/// the next character, the way i3/sway's own config/command parsing treats
/// quoted arguments (`exec "some program --flag"`, `exec 'other --flag'`).
pub fn tokenize(input: &str) -> Vec<String> {
    let mut tokens = Vec::new();
    let mut current = String::new();
    let mut quote: Option<char> = None;
    let mut has_token = false;
    let mut chars = input.chars().peekable();

    while let Some(c) = chars.next() {
        match c {
            '\\' => {
                if let Some(next) = chars.next() {
                    current.push(next);
                    has_token = true;
                }
            }
            '"' | '\'' if quote == Some(c) => {
                quote = None;
                has_token = true;
            }
            '"' | '\'' if quote.is_none() => {
                quote = Some(c);
                has_token = true;
            }
            c if c.is_whitespace() && quote.is_none() => {
                if has_token {
                    tokens.push(std::mem::take(&mut current));
                    has_token = false;
                }
            }
            c => {
                current.push(c);
                has_token = true;
            }
        }
    }
    if has_token {
        tokens.push(current);
    }
    tokens
}

/// Splits a full command string on top-level `;` (not inside quotes) into
/// individual statements.
fn split_statements(input: &str) -> Vec<String> {
    let mut statements = Vec::new();
    let mut current = String::new();
    let mut in_quotes = false;
    let mut escape = false;

    for c in input.chars() {
        if escape {
            current.push(c);
            escape = false;
            continue;
        }
        match c {
            '\\' => {
                current.push(c);
                escape = true;
            }
            '"' => {
                in_quotes = !in_quotes;
                current.push(c);
            }
            ';' if !in_quotes => {
                statements.push(std::mem::take(&mut current));
            }
            _ => current.push(c),
        }
    }
    if !current.trim().is_empty() {
        statements.push(current);
    }
    statements
}

/// Replaces `$name` references in `tokens` with the longest matching entry
/// in `vars`. Longest-match disambiguates `$ws1` from `$ws` when both are
/// defined.
pub fn substitute_vars(tokens: &mut [String], vars: &HashMap<String, String>) {
    let mut names: Vec<&String> = vars.keys().collect();
    names.sort_by_key(|n| std::cmp::Reverse(n.len()));

    for token in tokens.iter_mut() {
        if !token.contains('$') {
            continue;
        }
        let mut result = String::with_capacity(token.len());
        let mut rest = token.as_str();
        'outer: while !rest.is_empty() {
            if let Some(stripped) = rest.strip_prefix('$') {
                for name in &names {
                    if let Some(after) = stripped.strip_prefix(name.as_str()) {
                        result.push_str(&vars[*name]);
                        rest = after;
                        continue 'outer;
                    }
                }
            }
            let mut chars = rest.chars();
            result.push(chars.next().unwrap());
            rest = chars.as_str();
        }
        *token = result;
    }
}

/// Runs a full (possibly multi-statement) command line against `ctx`,
/// returning one `CommandOutcome` per top-level `;`-separated statement.
pub fn run(ctx: &mut CommandContext, input: &str, vars: &HashMap<String, String>) -> Vec<CommandOutcome> {
    split_statements(input)
        .into_iter()
        .map(|statement| run_one(ctx, &statement, vars))
        .collect()
}

fn run_one(ctx: &mut CommandContext, statement: &str, vars: &HashMap<String, String>) -> CommandOutcome {
    let mut tokens = tokenize(statement);
    if tokens.is_empty() {
        return CommandOutcome::fail("empty command");
    }
    substitute_vars(&mut tokens, vars);

    let name = tokens.remove(0);
    match lookup(&name) {
        Some(handler) => match handler(ctx, &tokens) {
            Ok(()) => CommandOutcome::ok(),
            Err(Error::CommandFailure(msg)) => CommandOutcome::fail(msg),
            Err(err) => CommandOutcome::fail(err.to_string()),
        },
        None => CommandOutcome::fail(format!("unknown command {name:?}")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tokenize_handles_quotes_and_escapes() {
        let tokens = tokenize(r#"exec "foo bar" baz\ qux"#);
        assert_eq!(tokens, vec!["exec", "foo bar", "baz qux"]);
    }

    #[test]
    fn tokenize_handles_single_quotes() {
        let tokens = tokenize(r#"exec 'foo bar' baz"#);
        assert_eq!(tokens, vec!["exec", "foo bar", "baz"]);
    }

    #[test]
    fn tokenize_treats_opposite_quote_as_literal_inside() {
        let tokens = tokenize(r#"exec "it's fine""#);
        assert_eq!(tokens, vec!["exec", "it's fine"]);
    }

    #[test]
    fn split_statements_ignores_semicolons_in_quotes() {
        let statements = split_statements(r#"exec "a;b"; kill"#);
        assert_eq!(statements.len(), 2);
        assert!(statements[0].contains("a;b"));
    }

    #[test]
    fn substitute_vars_prefers_longest_match() {
        let mut vars = HashMap::new();
        vars.insert("$ws".to_string(), "WS".to_string());
        vars.insert("$ws1".to_string(), "WS-ONE".to_string());
        let mut tokens = vec!["$ws1".to_string()];
        // keys are stored with the leading '$' stripped for matching
        let vars: HashMap<String, String> = vars
            .into_iter()
            .map(|(k, v)| (k.trim_start_matches('$').to_string(), v))
            .collect();
        substitute_vars(&mut tokens, &vars);
        assert_eq!(tokens[0], "WS-ONE");
    }

    #[test]
    fn lookup_is_case_insensitive() {
        assert!(lookup("Kill").is_some());
        assert!(lookup("KILL").is_some());
        assert!(lookup("bogus").is_none());
    }
}
