//! Settings schema.
//!
//! Every struct uses `#[serde(rename_all = "camelCase", default)]` so a
//! settings file only needs the keys it changes.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

/// Root settings object.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct StrandSettings {
    /// Settings schema version.
    pub version: String,
    /// Which conversation to open.
    pub memory: MemorySettings,
    /// Session view behaviour.
    pub session: SessionSettings,
    /// Local event log storage.
    pub storage: StorageSettings,
    /// Log output.
    pub logging: LoggingSettings,
}

impl Default for StrandSettings {
    fn default() -> Self {
        Self {
            version: "0.1.0".to_string(),
            memory: MemorySettings::default(),
            session: SessionSettings::default(),
            storage: StorageSettings::default(),
            logging: LoggingSettings::default(),
        }
    }
}

/// Identifiers that scope the conversation.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct MemorySettings {
    /// Memory resource id.
    pub memory_id: String,
    /// End-user id.
    pub actor_id: String,
    /// Conversation/thread id.
    pub session_id: String,
    /// Branch to open instead of the default lineage.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub branch_name: Option<String>,
}

impl Default for MemorySettings {
    fn default() -> Self {
        Self {
            memory_id: "local".to_string(),
            actor_id: "default-user".to_string(),
            session_id: "default".to_string(),
            branch_name: None,
        }
    }
}

/// Session view behaviour.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SessionSettings {
    /// Events requested per listing page.
    pub page_size: usize,
    /// Prefix of branches created by pop and clear.
    pub branch_prefix: String,
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            page_size: 100,
            branch_prefix: "fix".to_string(),
        }
    }
}

/// Local event log storage.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct StorageSettings {
    /// Database file; relative paths resolve against the strand home.
    pub db_path: String,
    /// Connection pool size.
    pub pool_size: u32,
}

impl Default for StorageSettings {
    fn default() -> Self {
        Self {
            db_path: "strand.db".to_string(),
            pool_size: 8,
        }
    }
}

impl StorageSettings {
    /// Absolute database path, resolving relative paths against `home`.
    pub fn resolve_db_path(&self, home: &Path) -> PathBuf {
        let path = Path::new(&self.db_path);
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            home.join(path)
        }
    }
}

/// Log output.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct LoggingSettings {
    /// Minimum level or `EnvFilter` directive.
    pub level: String,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: "warn".to_string(),
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
