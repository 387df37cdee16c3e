//! strand: chat over a session view and inspect the event log behind it.
//!
//! Settings come from `~/.strand/settings.json` and `STRAND_*` variables;
//! command-line flags override both.

#![deny(unsafe_code)]

mod render;
mod repl;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use strand_events::{ConnectionConfig, EventScope, SqliteEventLog};
use strand_session::context::resolve_namespace;
use strand_session::{MemorySession, Session, SessionConfig};
use strand_settings::{StrandSettings, load_settings, strand_home};
use tracing::info;

use crate::render::{render_branch, render_item};
use crate::repl::{ChatOptions, run_chat};

#[derive(Parser, Debug)]
#[command(
    name = "strand",
    version,
    about = "Conversation history with undo over an append-only event log"
)]
struct Cli {
    /// Database file (default: ~/.strand/strand.db).
    #[arg(long, global = true)]
    db_path: Option<PathBuf>,

    /// Memory resource id.
    #[arg(long, global = true)]
    memory_id: Option<String>,

    /// End-user id.
    #[arg(long, global = true)]
    actor_id: Option<String>,

    /// Conversation id.
    #[arg(long, global = true)]
    session_id: Option<String>,

    /// Open this branch instead of the default lineage.
    #[arg(long, global = true)]
    branch: Option<String>,

    /// Log level or filter directive.
    #[arg(long, global = true)]
    log_level: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Interactive chat; plain lines are user turns.
    Chat {
        /// Do not echo user lines back as assistant turns.
        #[arg(long)]
        no_echo: bool,
        /// Namespace searched by `/recall`.
        #[arg(long, default_value = "facts/{sessionId}")]
        namespace: String,
        /// Facts returned by `/recall`.
        #[arg(long, default_value_t = 3)]
        top_k: usize,
    },
    /// Print the visible history.
    History {
        /// Only the most recent N items.
        #[arg(long)]
        limit: Option<usize>,
        /// Print items as JSON.
        #[arg(long)]
        json: bool,
    },
    /// List branches of the conversation.
    Branches,
    /// Store a long-term fact.
    Remember {
        /// Namespace; `{sessionId}` and `{actorId}` are substituted.
        namespace: String,
        /// Fact text.
        text: String,
    },
    /// Search long-term facts.
    Recall {
        /// Namespace; `{sessionId}` and `{actorId}` are substituted.
        namespace: String,
        /// Free-text query.
        query: String,
        /// Maximum facts returned.
        #[arg(long, default_value_t = 3)]
        top_k: usize,
    },
}

impl Cli {
    /// Fold flag values over loaded settings.
    fn apply_to(&self, settings: &mut StrandSettings) {
        if let Some(ref v) = self.memory_id {
            settings.memory.memory_id.clone_from(v);
        }
        if let Some(ref v) = self.actor_id {
            settings.memory.actor_id.clone_from(v);
        }
        if let Some(ref v) = self.session_id {
            settings.memory.session_id.clone_from(v);
        }
        if self.branch.is_some() {
            settings.memory.branch_name.clone_from(&self.branch);
        }
        if let Some(ref v) = self.db_path {
            settings.storage.db_path = v.display().to_string();
        }
        if let Some(ref v) = self.log_level {
            settings.logging.level.clone_from(v);
        }
    }
}

/// Ensure the parent directory of a path exists.
fn ensure_parent_dir(path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create directory {}", parent.display()))?;
    }
    Ok(())
}

fn scope_of(settings: &StrandSettings) -> EventScope {
    EventScope::new(
        settings.memory.memory_id.as_str(),
        settings.memory.actor_id.as_str(),
        settings.memory.session_id.as_str(),
    )
}

fn session_config(settings: &StrandSettings) -> SessionConfig {
    SessionConfig::new(scope_of(settings))
        .with_page_size(settings.session.page_size)
        .with_branch_prefix(settings.session.branch_prefix.clone())
        .with_branch(settings.memory.branch_name.clone())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut settings = load_settings().context("Failed to load settings")?;
    cli.apply_to(&mut settings);

    strand_core::logging::init_subscriber(&settings.logging.level);

    let db_path = settings.storage.resolve_db_path(&strand_home());
    ensure_parent_dir(&db_path)?;
    let connection = ConnectionConfig {
        pool_size: settings.storage.pool_size,
        ..ConnectionConfig::default()
    };
    let log = Arc::new(
        SqliteEventLog::open(&db_path, &connection)
            .with_context(|| format!("Failed to open event log at {}", db_path.display()))?,
    );
    let scope = scope_of(&settings);
    info!(
        db_path = %db_path.display(),
        session_id = %scope.session_id,
        "strand starting"
    );

    match cli.command {
        Command::Chat {
            no_echo,
            namespace,
            top_k,
        } => {
            let session = MemorySession::new(log, session_config(&settings));
            let options = ChatOptions {
                echo: !no_echo,
                namespace,
                top_k,
            };
            let stdin = tokio::io::BufReader::new(tokio::io::stdin());
            run_chat(&session, stdin, &mut std::io::stdout(), &options).await?;
        }
        Command::History { limit, json } => {
            let session = MemorySession::new(log, session_config(&settings));
            let items = session.get_items(limit).await?;
            if json {
                println!("{}", serde_json::to_string_pretty(&items)?);
            } else {
                for item in &items {
                    println!("{}", render_item(item));
                }
            }
        }
        Command::Branches => {
            for branch in log.list_branches(&scope)? {
                println!("{}", render_branch(&branch));
            }
        }
        Command::Remember { namespace, text } => {
            let namespace = resolve_namespace(&namespace, &scope);
            let record = log.insert_memory_record(&scope.memory_id, &namespace, &text)?;
            println!("stored {} in {namespace}", record.record_id);
        }
        Command::Recall {
            namespace,
            query,
            top_k,
        } => {
            let session = MemorySession::new(log, session_config(&settings));
            let items = session
                .build_long_term_context(&namespace, &query, top_k)
                .await?;
            match items.first() {
                Some(item) => println!("{}", item.text().unwrap_or_default()),
                None => println!("no relevant memories"),
            }
        }
    }
    Ok(())
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
