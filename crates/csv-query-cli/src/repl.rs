//! Interactive REPL.
//!
//! Launch with `csv-query` or `csv-query repl`. A request may span several
//! lines and is sent once it contains `;`. Lines starting with `/` are
//! commands. Type `/help` for the list, Tab for completion.

use rustyline::completion::{Completer, Pair};
use rustyline::config::CompletionType;
use rustyline::error::ReadlineError;
use rustyline::highlight::Highlighter;
use rustyline::hint::Hinter;
use rustyline::validate::{ValidationContext, ValidationResult, Validator};
use rustyline::{
    Cmd, ConditionalEventHandler, Editor, Event, EventContext, EventHandler, Helper, KeyEvent,
    RepeatCount,
};
use tokio::runtime::Handle;

use crate::config::Config;
use crate::session;

/// Available REPL commands.
const COMMANDS: &[(&str, &str)] = &[
    ("/help", "Show available commands"),
    ("/config", "Show the effective configuration"),
    ("/history", "List previous requests"),
    ("/clear", "Clear the screen"),
    ("/exit", "Quit the REPL"),
];

const KEYWORDS: &[&str] = &["SELECT", "FROM", "WHERE", "AND", "OR", "NOT"];

/// REPL helper for completion, hints, and multi-line input.
#[derive(Default)]
struct QueryHelper;

impl Completer for QueryHelper {
    type Candidate = Pair;

    fn complete(
        &self,
        line: &str,
        pos: usize,
        _ctx: &rustyline::Context<'_>,
    ) -> rustyline::Result<(usize, Vec<Pair>)> {
        let input = &line[..pos];

        if input.starts_with('/') && !input.contains(' ') {
            let matches: Vec<Pair> = COMMANDS
                .iter()
                .filter(|(cmd, _)| cmd.starts_with(input))
                .map(|(cmd, desc)| Pair {
                    display: format!("{cmd:<12} {desc}"),
                    replacement: cmd.to_string(),
                })
                .collect();
            return Ok((0, matches));
        }

        // keyword completion for the word under the cursor
        let start = input
            .rfind(|c: char| c.is_whitespace())
            .map(|i| i + 1)
            .unwrap_or(0);
        let word = &input[start..];
        if word.is_empty() {
            return Ok((pos, Vec::new()));
        }
        let upper = word.to_uppercase();
        let matches: Vec<Pair> = KEYWORDS
            .iter()
            .filter(|kw| kw.starts_with(&upper) && **kw != word)
            .map(|kw| Pair {
                display: kw.to_string(),
                replacement: format!("{kw} "),
            })
            .collect();
        Ok((start, matches))
    }
}

impl Hinter for QueryHelper {
    type Hint = String;

    fn hint(&self, line: &str, pos: usize, _ctx: &rustyline::Context<'_>) -> Option<String> {
        if pos < line.len() || line.is_empty() {
            return None;
        }
        if line.starts_with('/') && !line.contains(' ') {
            for (cmd, _) in COMMANDS {
                if cmd.starts_with(line) && *cmd != line {
                    return Some(cmd[line.len()..].to_string());
                }
            }
        }
        None
    }
}

impl Validator for QueryHelper {
    fn validate(&self, ctx: &mut ValidationContext<'_>) -> rustyline::Result<ValidationResult> {
        if is_complete(ctx.input()) {
            Ok(ValidationResult::Valid(None))
        } else {
            Ok(ValidationResult::Incomplete)
        }
    }
}

impl Highlighter for QueryHelper {}
impl Helper for QueryHelper {}

/// A request is complete once it has a `;`. Commands and blank lines are
/// always complete.
fn is_complete(input: &str) -> bool {
    let input = input.trim_start();
    input.is_empty() || input.starts_with('/') || input.contains(';')
}

/// The request text up to and including the first `;`.
fn request_text(input: &str) -> &str {
    match input.find(';') {
        Some(at) => &input[..=at],
        None => input,
    }
}

struct TabCompleteOrAcceptHint;

impl ConditionalEventHandler for TabCompleteOrAcceptHint {
    fn handle(
        &self,
        _evt: &Event,
        _n: RepeatCount,
        _positive: bool,
        ctx: &EventContext<'_>,
    ) -> Option<Cmd> {
        if ctx.has_hint() {
            Some(Cmd::CompleteHint)
        } else {
            Some(Cmd::Complete)
        }
    }
}

/// Run the interactive REPL. Blocks the calling thread; requests run on
/// `runtime`.
pub fn run(config: &Config, runtime: &Handle) -> anyhow::Result<()> {
    eprintln!();
    eprintln!(
        "  \x1b[32m\u{25c9}\x1b[0m \x1b[1mcsv-query v{}\x1b[0m \x1b[90m: SQL-like queries over CSV files\x1b[0m",
        env!("CARGO_PKG_VERSION")
    );
    eprintln!();
    eprintln!(
        "    End a request with \x1b[36m;\x1b[0m, press \x1b[36m/\x1b[0m for commands, \x1b[90m/exit\x1b[0m to quit."
    );
    eprintln!();

    let rl_config = rustyline::Config::builder()
        .history_ignore_space(true)
        .auto_add_history(true)
        .completion_type(CompletionType::List)
        .completion_prompt_limit(20)
        .build();

    let mut rl: Editor<QueryHelper, rustyline::history::DefaultHistory> =
        Editor::with_config(rl_config)?;
    rl.set_helper(Some(QueryHelper));
    rl.bind_sequence(
        KeyEvent::from('\t'),
        EventHandler::Conditional(Box::new(TabCompleteOrAcceptHint)),
    );

    let home = std::env::var("HOME")
        .or_else(|_| std::env::var("USERPROFILE"))
        .unwrap_or_else(|_| ".".to_string());
    let hist_path = std::path::PathBuf::from(&home).join(".csv_query_history");
    if hist_path.exists() {
        let _ = rl.load_history(&hist_path);
    }

    let prompt = " \x1b[36mquery>\x1b[0m ";

    loop {
        match rl.readline(prompt) {
            Ok(line) => {
                let line = line.trim();
                if line.is_empty() {
                    continue;
                }

                if let Some(input) = line.strip_prefix('/') {
                    let cmd = input.split_whitespace().next().unwrap_or("");
                    match cmd {
                        "exit" | "quit" => {
                            eprintln!("  \x1b[90m\u{2728}\x1b[0m Goodbye!");
                            break;
                        }
                        "" | "help" | "h" | "?" => cmd_help(),
                        "clear" | "cls" => eprint!("\x1b[2J\x1b[H"),
                        "config" => cmd_config(config),
                        "history" => cmd_history(&rl),
                        _ => {
                            eprintln!("  Unknown command '/{cmd}'. Type /help for commands.");
                        }
                    }
                    continue;
                }

                cmd_query(request_text(line), config, runtime);
            }
            Err(ReadlineError::Interrupted) => {
                eprintln!("  \x1b[90m(Ctrl+C)\x1b[0m Type \x1b[1m/exit\x1b[0m to quit.");
            }
            Err(ReadlineError::Eof) => {
                eprintln!("  \x1b[90m\u{2728}\x1b[0m Goodbye!");
                break;
            }
            Err(err) => {
                eprintln!("  Error: {err}");
                break;
            }
        }
    }

    let _ = rl.save_history(&hist_path);

    Ok(())
}

fn cmd_query(text: &str, config: &Config, runtime: &Handle) {
    match runtime.block_on(session::run_interruptible(text, config)) {
        Ok(report) => {
            if let Some(message) = report.error_message() {
                eprintln!("  \x1b[33m{message}\x1b[0m");
            }
            print!("{}", report.table);
            eprintln!(
                "  \x1b[90mrequest done in {:?} ({} rows)\x1b[0m",
                report.elapsed, report.rows
            );
        }
        Err(err) => {
            eprintln!("  \x1b[31merror:\x1b[0m {err}");
        }
    }
}

fn cmd_help() {
    eprintln!();
    eprintln!("  Requests:");
    eprintln!();
    eprintln!("    SELECT <col,col|*> FROM <file> [WHERE <cond> [AND|OR <cond>]...];");
    eprintln!("    Comparators: = NOT > < >= <=");
    eprintln!();
    eprintln!("  Commands:");
    eprintln!();
    for (cmd, desc) in COMMANDS {
        eprintln!("    {cmd:<12} {desc}");
    }
    eprintln!();
    eprintln!("  Tip: Ctrl+C cancels a running request.");
    eprintln!();
}

fn cmd_config(config: &Config) {
    eprintln!();
    eprintln!("  Separator:  {:?}", config.separator);
    eprintln!("  Timeout:    {}s", config.request_timeout.as_secs());
    eprintln!("  Log folder: {}", config.log_folder.display());
    eprintln!();
}

fn cmd_history(rl: &Editor<QueryHelper, rustyline::history::DefaultHistory>) {
    eprintln!();
    for (i, entry) in rl.history().iter().enumerate() {
        eprintln!("  {:>4}  {}", i + 1, entry.replace('\n', " "));
    }
    eprintln!();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_needs_semicolon() {
        assert!(!is_complete("SELECT a FROM b"));
        assert!(!is_complete("SELECT a\nFROM b\nWHERE"));
        assert!(is_complete("SELECT a FROM b;"));
        assert!(is_complete("SELECT a\nFROM b WHERE c=1;"));
    }

    #[test]
    fn test_commands_and_blank_are_complete() {
        assert!(is_complete(""));
        assert!(is_complete("   "));
        assert!(is_complete("/help"));
        assert!(is_complete("  /exit"));
    }

    #[test]
    fn test_request_text_stops_at_semicolon() {
        assert_eq!(request_text("SELECT a FROM b; junk"), "SELECT a FROM b;");
        assert_eq!(request_text("SELECT a FROM b"), "SELECT a FROM b");
    }
}
