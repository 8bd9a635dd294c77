//! Interactive session over one conversation at a time.

use std::borrow::Cow::{self, Borrowed, Owned};

use anyhow::Result;
use colored::Colorize;
use rustyline::completion::{Completer, Pair};
use rustyline::error::ReadlineError;
use rustyline::highlight::Highlighter;
use rustyline::hint::Hinter;
use rustyline::validate::Validator;
use rustyline::{Context, Editor, Helper};
use statline_application::App;
use statline_core::event::AskEvent;
use statline_infrastructure::StatlinePaths;

use super::{history, render};

const COMMANDS: &[&str] = &["/new", "/history", "/id", "/quit"];

/// Completion, highlighting and hints for slash commands.
#[derive(Clone)]
struct ChatHelper;

impl Helper for ChatHelper {}

impl Completer for ChatHelper {
    type Candidate = Pair;

    fn complete(
        &self,
        line: &str,
        pos: usize,
        _ctx: &Context<'_>,
    ) -> rustyline::Result<(usize, Vec<Pair>)> {
        let line = &line[..pos];
        if !line.starts_with('/') {
            return Ok((0, vec![]));
        }
        let candidates = COMMANDS
            .iter()
            .filter(|cmd| cmd.starts_with(line))
            .map(|cmd| Pair {
                display: cmd.to_string(),
                replacement: cmd.to_string(),
            })
            .collect();
        Ok((0, candidates))
    }
}

impl Highlighter for ChatHelper {
    fn highlight<'l>(&self, line: &'l str, _pos: usize) -> Cow<'l, str> {
        if line.starts_with('/') {
            Owned(line.bright_cyan().to_string())
        } else {
            Borrowed(line)
        }
    }

    fn highlight_char(&self, _line: &str, _pos: usize, _forced: bool) -> bool {
        true
    }
}

impl Hinter for ChatHelper {
    type Hint = String;

    fn hint(&self, line: &str, pos: usize, _ctx: &Context<'_>) -> Option<String> {
        let line = &line[..pos];
        if line.starts_with('/') && !line.contains(' ') {
            COMMANDS
                .iter()
                .find(|cmd| cmd.starts_with(line) && cmd.len() > line.len())
                .map(|cmd| cmd[line.len()..].to_string())
        } else {
            None
        }
    }
}

impl Validator for ChatHelper {}

enum Command {
    New,
    History,
    Id,
    Quit,
    Unknown,
}

fn parse_command(line: &str) -> Option<Command> {
    if !line.starts_with('/') {
        return match line {
            "quit" | "exit" => Some(Command::Quit),
            _ => None,
        };
    }
    Some(match line {
        "/new" => Command::New,
        "/history" => Command::History,
        "/id" => Command::Id,
        "/quit" | "/exit" => Command::Quit,
        _ => Command::Unknown,
    })
}

pub async fn run(app: &App, mut conversation: Option<String>) -> Result<()> {
    let mut rl = Editor::new()?;
    rl.set_helper(Some(ChatHelper));
    let history_file = StatlinePaths::chat_history_file().ok();
    if let Some(path) = &history_file {
        let _ = rl.load_history(path);
    }

    println!("{}", "=== Statline ===".bright_magenta().bold());
    println!(
        "{}",
        "Ask about AFL teams, seasons and matches. /new starts over, /quit exits.".bright_black()
    );
    println!();

    loop {
        match rl.readline(">> ") {
            Ok(line) => {
                let trimmed = line.trim();
                if trimmed.is_empty() {
                    continue;
                }
                let _ = rl.add_history_entry(trimmed);

                match parse_command(trimmed) {
                    Some(Command::Quit) => {
                        println!("{}", "Goodbye!".bright_green());
                        break;
                    }
                    Some(Command::New) => {
                        conversation = None;
                        println!("{}", "Started a new conversation.".bright_black());
                    }
                    Some(Command::Id) => match &conversation {
                        Some(id) => println!("{}", id),
                        None => println!("{}", "No conversation yet.".bright_black()),
                    },
                    Some(Command::History) => match &conversation {
                        Some(id) => match app.service.get_conversation(id).await {
                            Ok(turns) => history::print_turns(&turns),
                            Err(e) => eprintln!("{}", format!("Error: {}", e).red()),
                        },
                        None => println!("{}", "No conversation yet.".bright_black()),
                    },
                    Some(Command::Unknown) => {
                        println!("{}", format!("Commands: {}", COMMANDS.join(", ")).bright_black());
                    }
                    None => {
                        if let Some(id) = ask(app, trimmed, conversation.as_deref()).await {
                            conversation = Some(id);
                        }
                    }
                }
            }
            Err(ReadlineError::Interrupted) => {
                println!("{}", "CTRL-C detected. Type /quit to exit.".yellow());
            }
            Err(ReadlineError::Eof) => {
                println!("{}", "CTRL-D detected. Exiting...".bright_green());
                break;
            }
            Err(err) => {
                eprintln!("{}", format!("Error: {:?}", err).red());
                break;
            }
        }
    }

    if let Some(path) = &history_file {
        if let Err(e) = rl.save_history(path) {
            tracing::debug!(target: "statline::cli", error = %e, "[Chat] failed to save input history");
        }
    }
    Ok(())
}

/// Asks one question and returns the conversation id once it is stored.
async fn ask(app: &App, question: &str, conversation: Option<&str>) -> Option<String> {
    let mut handle = app.service.ask(question, conversation);
    let mut stored = None;
    while let Some(event) = handle.recv().await {
        render::print_event(&event);
        if let AskEvent::Complete { conversation_id } = &event {
            stored = Some(conversation_id.clone());
        }
        if event.is_terminal() {
            break;
        }
    }
    println!();
    stored.or_else(|| conversation.map(String::from))
}
