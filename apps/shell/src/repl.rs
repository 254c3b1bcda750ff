//! Line-oriented front end over the session controller.

use std::{
    fmt,
    sync::{Arc, Mutex, MutexGuard},
};

use anyhow::{anyhow, Context};
use session_core::{
    Navigation, RouteGuard, SessionController, SessionObserver, SessionSnapshot, SessionStatus,
};
use shared::domain::PasswordEntry;
use thiserror::Error;
use tokio::io::{AsyncBufRead, AsyncBufReadExt};
use tracing::debug;

pub const HELP: &str = "\
commands:
  open <path> <password>       open an existing database
  create <path> <password>     create a new database and open it
  save [password]              save, reusing the open password when omitted
  close                        close the open database
  list                         list entries of the open database
  add <name> <username> <password> [url]
  edit <index> <name> <username> <password> [url]
  remove <index>
  go <route>                   navigate, e.g. go /database
  status                       show session state
  help
  quit";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ParseError {
    #[error("unknown command `{0}`, try `help`")]
    UnknownCommand(String),
    #[error("usage: {0}")]
    Usage(&'static str),
    #[error("`{0}` is not an entry number")]
    InvalidIndex(String),
}

#[derive(Clone, PartialEq, Eq)]
pub enum ShellCommand {
    Open { path: String, password: String },
    Create { path: String, password: String },
    Save { password: Option<String> },
    Close,
    List,
    Add(PasswordEntry),
    Edit { index: usize, entry: PasswordEntry },
    Remove { index: usize },
    Go { route: String },
    Status,
    Help,
    Quit,
}

impl fmt::Debug for ShellCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Open { path, .. } => f.debug_struct("Open").field("path", path).finish(),
            Self::Create { path, .. } => f.debug_struct("Create").field("path", path).finish(),
            Self::Save { password } => f
                .debug_struct("Save")
                .field("cached", &password.is_none())
                .finish(),
            Self::Close => f.write_str("Close"),
            Self::List => f.write_str("List"),
            Self::Add(entry) => f.debug_tuple("Add").field(entry).finish(),
            Self::Edit { index, entry } => f
                .debug_struct("Edit")
                .field("index", index)
                .field("entry", entry)
                .finish(),
            Self::Remove { index } => f.debug_struct("Remove").field("index", index).finish(),
            Self::Go { route } => f.debug_struct("Go").field("route", route).finish(),
            Self::Status => f.write_str("Status"),
            Self::Help => f.write_str("Help"),
            Self::Quit => f.write_str("Quit"),
        }
    }
}

impl ShellCommand {
    /// Parses one input line. Blank lines yield `None`.
    pub fn parse(line: &str) -> Result<Option<Self>, ParseError> {
        let words: Vec<&str> = line.split_whitespace().collect();
        let Some((&verb, rest)) = words.split_first() else {
            return Ok(None);
        };

        let command = match (verb, rest) {
            ("open", [path, password]) => Self::Open {
                path: path.to_string(),
                password: password.to_string(),
            },
            ("open", _) => return Err(ParseError::Usage("open <path> <password>")),
            ("create", [path, password]) => Self::Create {
                path: path.to_string(),
                password: password.to_string(),
            },
            ("create", _) => return Err(ParseError::Usage("create <path> <password>")),
            ("save", []) => Self::Save { password: None },
            ("save", [password]) => Self::Save {
                password: Some(password.to_string()),
            },
            ("save", _) => return Err(ParseError::Usage("save [password]")),
            ("close", []) => Self::Close,
            ("list", []) => Self::List,
            ("add", fields) => Self::Add(
                parse_entry(fields)
                    .ok_or(ParseError::Usage("add <name> <username> <password> [url]"))?,
            ),
            ("edit", [index, fields @ ..]) => {
                let entry = parse_entry(fields).ok_or(ParseError::Usage(
                    "edit <index> <name> <username> <password> [url]",
                ))?;
                Self::Edit {
                    index: parse_index(index)?,
                    entry,
                }
            }
            ("edit", []) => {
                return Err(ParseError::Usage(
                    "edit <index> <name> <username> <password> [url]",
                ))
            }
            ("remove", [index]) => Self::Remove {
                index: parse_index(index)?,
            },
            ("remove", _) => return Err(ParseError::Usage("remove <index>")),
            ("go", [route]) => Self::Go {
                route: route.to_string(),
            },
            ("go", _) => return Err(ParseError::Usage("go <route>")),
            ("status", []) => Self::Status,
            ("help", _) => Self::Help,
            ("quit" | "exit", []) => Self::Quit,
            ("close" | "list" | "status" | "quit" | "exit", _) => {
                return Err(ParseError::Usage("the command takes no arguments"))
            }
            (other, _) => return Err(ParseError::UnknownCommand(other.to_string())),
        };
        Ok(Some(command))
    }
}

fn parse_entry(fields: &[&str]) -> Option<PasswordEntry> {
    match fields {
        [name, username, password] => Some(PasswordEntry::new(*name, *username, *password)),
        [name, username, password, url] => {
            Some(PasswordEntry::new(*name, *username, *password).with_url(*url))
        }
        _ => None,
    }
}

/// Entry numbers are shown starting at 1.
fn parse_index(raw: &str) -> Result<usize, ParseError> {
    match raw.parse::<usize>() {
        Ok(index) if index > 0 => Ok(index),
        _ => Err(ParseError::InvalidIndex(raw.to_string())),
    }
}

/// Routes are synced from the controller right before each use, so the guard
/// needs no event subscription of its own.
pub struct Shell {
    controller: Arc<SessionController>,
    routes: Mutex<RouteGuard>,
}

impl Shell {
    pub fn new(controller: Arc<SessionController>, routes: RouteGuard) -> Self {
        Self {
            controller,
            routes: Mutex::new(routes),
        }
    }

    /// Runs one command and returns the lines to show the user.
    pub async fn execute(&self, command: ShellCommand) -> anyhow::Result<Vec<String>> {
        debug!(?command, "executing shell command");
        let controller = &self.controller;
        let lines = match command {
            ShellCommand::Open { path, password } => {
                controller.open(&path, &password).await?;
                vec![format!("opened {path}")]
            }
            ShellCommand::Create { path, password } => {
                controller.create(&path, &password).await?;
                vec![format!("created {path}")]
            }
            ShellCommand::Save { password: Some(password) } => {
                controller.save(&password).await?;
                vec!["saved".to_string()]
            }
            ShellCommand::Save { password: None } => {
                controller.save_with_cached_credential().await?;
                vec!["saved".to_string()]
            }
            ShellCommand::Close => {
                controller.close().await?;
                vec!["closed".to_string()]
            }
            ShellCommand::List => {
                let dataset = controller
                    .dataset()
                    .await
                    .ok_or_else(|| anyhow!("no database is open"))?;
                if dataset.is_empty() {
                    vec!["(no entries)".to_string()]
                } else {
                    dataset
                        .iter()
                        .enumerate()
                        .map(|(i, entry)| describe_entry(i + 1, entry))
                        .collect()
                }
            }
            ShellCommand::Add(entry) => {
                controller.add_entry(&entry).await?;
                vec![format!("added {}", entry.name)]
            }
            ShellCommand::Edit { index, entry } => {
                let old = self.entry_at(index).await?;
                controller.edit_entry(&old, &entry).await?;
                vec![format!("updated entry {index}")]
            }
            ShellCommand::Remove { index } => {
                let old = self.entry_at(index).await?;
                controller.remove_entry(&old).await?;
                vec![format!("removed {}", old.name)]
            }
            ShellCommand::Go { route } => vec![self.go(&route).await],
            ShellCommand::Status => {
                let snapshot = controller.snapshot().await;
                let state = match snapshot.status {
                    SessionStatus::Closed => "closed".to_string(),
                    SessionStatus::Clean => format!("open {}", snapshot.source_path),
                    SessionStatus::Dirty => {
                        format!("open {} (unsaved changes)", snapshot.source_path)
                    }
                };
                let route = self.synced_routes(&snapshot).current().to_string();
                vec![
                    format!("session: {state}"),
                    format!("entries: {}", snapshot.entry_count),
                    format!("route: {route}"),
                ]
            }
            ShellCommand::Help => vec![HELP.to_string()],
            ShellCommand::Quit => Vec::new(),
        };
        Ok(lines)
    }

    async fn entry_at(&self, index: usize) -> anyhow::Result<PasswordEntry> {
        let dataset = self
            .controller
            .dataset()
            .await
            .ok_or_else(|| anyhow!("no database is open"))?;
        index
            .checked_sub(1)
            .and_then(|i| dataset.entries.get(i))
            .cloned()
            .with_context(|| format!("no entry number {index}"))
    }

    async fn go(&self, route: &str) -> String {
        let snapshot = self.controller.snapshot().await;
        let mut guard = self.synced_routes(&snapshot);
        match guard.navigate(route) {
            Navigation::Allowed(route) => format!("at {route}"),
            Navigation::Redirected { from, to } => {
                format!("{from} needs an open database, back at {to}")
            }
        }
    }

    fn synced_routes(&self, snapshot: &SessionSnapshot) -> MutexGuard<'_, RouteGuard> {
        let mut guard = match self.routes.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        guard.session_changed(snapshot);
        guard
    }
}

fn describe_entry(number: usize, entry: &PasswordEntry) -> String {
    match &entry.url {
        Some(url) => format!("{number:>3}. {} ({}) {url}", entry.name, entry.username),
        None => format!("{number:>3}. {} ({})", entry.name, entry.username),
    }
}

/// Reads commands until `quit` or end of input. Failed commands are reported
/// and the loop carries on.
pub async fn run<R>(shell: &Shell, input: R) -> anyhow::Result<()>
where
    R: AsyncBufRead + Unpin,
{
    let mut lines = input.lines();
    while let Some(line) = lines.next_line().await? {
        let command = match ShellCommand::parse(&line) {
            Ok(Some(command)) => command,
            Ok(None) => continue,
            Err(err) => {
                eprintln!("{err}");
                continue;
            }
        };
        if command == ShellCommand::Quit {
            break;
        }
        match shell.execute(command).await {
            Ok(output) => {
                for line in output {
                    println!("{line}");
                }
            }
            Err(err) => eprintln!("error: {err:#}"),
        }
    }
    Ok(())
}

#[cfg(test)]
#[path = "tests/repl_tests.rs"]
mod tests;
