use anyhow::{Context, Result};
use async_trait::async_trait;
use rusqlite::Connection;
use std::sync::Mutex;

use super::{History, HistoryEntry};

/// SQLite-backed command history.
pub struct SqliteHistory {
    conn: Mutex<Connection>,
}

impl SqliteHistory {
    /// Open or create the history table. Shares the database with
    /// [`Config`](crate::config::Config).
    pub fn new(path: &str) -> Result<Self> {
        let conn = Connection::open(path).context("failed to open history database")?;
        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS history (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                timestamp TEXT NOT NULL DEFAULT (datetime('now')),
                kind TEXT NOT NULL,
                text TEXT NOT NULL,
                entry TEXT NOT NULL
            );",
        )
        .context("failed to create history table")?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    pub fn in_memory() -> Result<Self> {
        Self::new(":memory:")
    }
}

fn decode(jsons: Vec<String>) -> Result<Vec<HistoryEntry>> {
    jsons
        .iter()
        .map(|json| serde_json::from_str(json).context("corrupt history entry"))
        .collect()
}

/// Make `%`, `_` and `\` match literally in a `LIKE ... ESCAPE '\'` pattern.
fn escape_like(query: &str) -> String {
    let mut escaped = String::with_capacity(query.len());
    for c in query.chars() {
        if matches!(c, '%' | '_' | '\\') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

#[async_trait]
impl History for SqliteHistory {
    async fn record(&self, entry: HistoryEntry) -> Result<()> {
        let json = serde_json::to_string(&entry)?;
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "INSERT INTO history (kind, text, entry) VALUES (?1, ?2, ?3)",
            [&entry.kind, &entry.text, &json],
        )?;
        Ok(())
    }

    async fn recent(&self, limit: usize) -> Result<Vec<HistoryEntry>> {
        let jsons = {
            let conn = self.conn.lock().unwrap();
            let mut stmt = conn.prepare(
                "SELECT entry FROM (
                    SELECT entry, id FROM history ORDER BY id DESC LIMIT ?1
                ) ORDER BY id ASC",
            )?;
            let rows = stmt
                .query_map([limit as i64], |row| row.get::<_, String>(0))?
                .collect::<Result<Vec<_>, _>>()?;
            rows
        };
        decode(jsons)
    }

    async fn search(&self, query: &str) -> Result<Vec<HistoryEntry>> {
        let jsons = {
            let conn = self.conn.lock().unwrap();
            let mut stmt = conn.prepare(
                "SELECT entry FROM history WHERE text LIKE ?1 ESCAPE '\\' ORDER BY id ASC",
            )?;
            let pattern = format!("%{}%", escape_like(query));
            let rows = stmt
                .query_map([&pattern], |row| row.get::<_, String>(0))?
                .collect::<Result<Vec<_>, _>>()?;
            rows
        };
        decode(jsons)
    }

    async fn clear(&self) -> Result<()> {
        let conn = self.conn.lock().unwrap();
        conn.execute("DELETE FROM history", [])?;
        Ok(())
    }
}
