//! Line-oriented chat loop over a session view.
//!
//! Plain lines become user turns. There is no model behind the loop, so each
//! line is optionally echoed back as the assistant turn. Lines starting with
//! `/` are commands.

use std::io::Write;

use anyhow::{Context, Result};
use strand_session::{MemorySession, ResponseItem, Session};
use tokio::io::{AsyncBufRead, AsyncBufReadExt};
use tracing::debug;

use crate::render::render_item;

/// Chat loop options.
#[derive(Clone, Debug)]
pub struct ChatOptions {
    /// Echo each user line back as an assistant turn.
    pub echo: bool,
    /// Namespace template used by `/recall`.
    pub namespace: String,
    /// Records retrieved by `/recall`.
    pub top_k: usize,
}

/// One parsed input line.
#[derive(Debug, PartialEq, Eq)]
pub enum ReplCommand {
    /// A user turn.
    Say(String),
    /// `/history [n]`
    History(Option<usize>),
    /// `/pop`
    Pop,
    /// `/clear`
    Clear,
    /// `/branch`
    Branch,
    /// `/recall <query>`
    Recall(String),
    /// `/quit`
    Quit,
    /// Blank line.
    Empty,
    /// Malformed command, with the usage line to show.
    Usage(&'static str),
    /// Unrecognized `/command`.
    Unknown(String),
}

/// Parse one input line.
pub fn parse_line(line: &str) -> ReplCommand {
    let line = line.trim();
    if line.is_empty() {
        return ReplCommand::Empty;
    }
    let Some(command) = line.strip_prefix('/') else {
        return ReplCommand::Say(line.to_string());
    };
    let (name, rest) = command
        .split_once(char::is_whitespace)
        .map_or((command, ""), |(n, r)| (n, r.trim()));
    match name {
        "history" if rest.is_empty() => ReplCommand::History(None),
        "history" => rest
            .parse()
            .map_or(ReplCommand::Usage("/history [n]"), |n| {
                ReplCommand::History(Some(n))
            }),
        "pop" => ReplCommand::Pop,
        "clear" => ReplCommand::Clear,
        "branch" => ReplCommand::Branch,
        "recall" if rest.is_empty() => ReplCommand::Usage("/recall <query>"),
        "recall" => ReplCommand::Recall(rest.to_string()),
        "quit" | "exit" => ReplCommand::Quit,
        other => ReplCommand::Unknown(other.to_string()),
    }
}

/// Run the loop until `/quit` or end of input.
pub async fn run_chat<R, W>(
    session: &MemorySession,
    input: R,
    out: &mut W,
    options: &ChatOptions,
) -> Result<()>
where
    R: AsyncBufRead + Unpin,
    W: Write,
{
    let mut lines = input.lines();
    while let Some(line) = lines.next_line().await.context("Failed to read input")? {
        let command = parse_line(&line);
        debug!(?command, "repl command");
        match command {
            ReplCommand::Empty => {}
            ReplCommand::Quit => break,
            ReplCommand::Say(text) => {
                let mut turns = vec![ResponseItem::user(text.clone())];
                if options.echo {
                    turns.push(ResponseItem::assistant(text));
                }
                let reply = turns.last().filter(|_| options.echo).map(render_item);
                session.add_items(turns).await?;
                if let Some(reply) = reply {
                    writeln!(out, "{reply}")?;
                }
            }
            ReplCommand::History(limit) => {
                let items = session.get_items(limit).await?;
                if items.is_empty() {
                    writeln!(out, "(no history)")?;
                }
                for item in &items {
                    writeln!(out, "{}", render_item(item))?;
                }
            }
            ReplCommand::Pop => match session.pop_item().await? {
                Some(item) => writeln!(out, "popped {}", render_item(&item))?,
                None => writeln!(out, "nothing to pop")?,
            },
            ReplCommand::Clear => {
                session.clear_session().await?;
                writeln!(out, "history hidden; the log keeps every event")?;
            }
            ReplCommand::Branch => {
                let branch = session.current_branch();
                let pending = if session.pending_fork().is_some() {
                    " (fork pending)"
                } else {
                    ""
                };
                writeln!(out, "{}{pending}", branch.as_deref().unwrap_or("main"))?;
            }
            ReplCommand::Recall(query) => {
                let items = session
                    .build_long_term_context(&options.namespace, &query, options.top_k)
                    .await?;
                match items.first() {
                    Some(item) => writeln!(out, "{}", item.text().unwrap_or_default())?,
                    None => writeln!(out, "no relevant memories")?,
                }
            }
            ReplCommand::Usage(usage) => writeln!(out, "usage: {usage}")?,
            ReplCommand::Unknown(name) => writeln!(
                out,
                "unknown command /{name} (try /history, /pop, /clear, /branch, /recall, /quit)"
            )?,
        }
        out.flush()?;
    }
    Ok(())
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
