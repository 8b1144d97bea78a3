//! A record of what was sent to the engine, in the spirit of the engine's
//! own command history.

pub mod sqlite;

use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;

/// How a recorded call ended.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Outcome {
    Ok,
    Failed(String),
}

/// One call made through an interactor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryEntry {
    /// Operation name, e.g. `eval` or `feval`.
    pub kind: String,
    /// The command, function or variable name the call was about.
    pub text: String,
    pub outcome: Outcome,
}

impl HistoryEntry {
    pub fn new(kind: &str, text: &str, outcome: Outcome) -> Self {
        Self {
            kind: kind.to_string(),
            text: text.to_string(),
            outcome,
        }
    }
}

impl fmt::Display for HistoryEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.outcome {
            Outcome::Ok => write!(f, "[{}] {}", self.kind, self.text),
            Outcome::Failed(err) => write!(f, "[{}] {}  ✗ {}", self.kind, self.text, err),
        }
    }
}

/// Where calls get recorded. Could be in-memory, SQLite, etc.
#[async_trait]
pub trait History: Send + Sync {
    async fn record(&self, entry: HistoryEntry) -> Result<()>;
    /// The last `limit` entries, oldest first.
    async fn recent(&self, limit: usize) -> Result<Vec<HistoryEntry>>;
    async fn search(&self, query: &str) -> Result<Vec<HistoryEntry>>;
    async fn clear(&self) -> Result<()>;
}
