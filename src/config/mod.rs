//! Persistent CLI settings backed by SQLite.
//!
//! Shares a database with [`SqliteHistory`](crate::history::sqlite::SqliteHistory).
//! Command-line flags override whatever is stored here.

use anyhow::{Context, Result, bail};
use rusqlite::Connection;
use std::sync::Mutex;
use std::time::Duration;

/// Bridge executable used when `--bridge` is not given.
pub const BRIDGE_KEY: &str = "bridge";
/// Request timeout in whole seconds.
pub const TIMEOUT_KEY: &str = "timeout";

const KNOWN_KEYS: &[&str] = &[BRIDGE_KEY, TIMEOUT_KEY];

pub struct Config {
    conn: Mutex<Connection>,
}

impl Config {
    /// Open or create the settings table in the given database.
    /// Use `":memory:"` for tests.
    pub fn open(path: &str) -> Result<Self> {
        let conn = Connection::open(path).context("failed to open config database")?;
        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS settings (
                key   TEXT PRIMARY KEY,
                value TEXT NOT NULL
            )",
        )
        .context("failed to create settings table")?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    pub fn get(&self, key: &str) -> Result<Option<String>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare("SELECT value FROM settings WHERE key = ?1")?;
        let mut rows = stmt.query([key])?;
        match rows.next()? {
            Some(row) => Ok(Some(row.get(0)?)),
            None => Ok(None),
        }
    }

    /// Store a setting. Only known keys are accepted and values are checked.
    pub fn set(&self, key: &str, value: &str) -> Result<()> {
        validate(key, value)?;
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "INSERT INTO settings (key, value) VALUES (?1, ?2)
             ON CONFLICT(key) DO UPDATE SET value = excluded.value",
            [key, value],
        )?;
        Ok(())
    }

    pub fn remove(&self, key: &str) -> Result<()> {
        let conn = self.conn.lock().unwrap();
        conn.execute("DELETE FROM settings WHERE key = ?1", [key])?;
        Ok(())
    }

    /// The stored bridge executable, if any.
    pub fn bridge(&self) -> Result<Option<String>> {
        self.get(BRIDGE_KEY)
    }

    /// The stored request timeout, if any.
    pub fn timeout(&self) -> Result<Option<Duration>> {
        match self.get(TIMEOUT_KEY)? {
            Some(secs) => {
                let secs: u64 = secs
                    .parse()
                    .with_context(|| format!("stored timeout is not a number: {secs}"))?;
                Ok(Some(Duration::from_secs(secs)))
            }
            None => Ok(None),
        }
    }
}

fn validate(key: &str, value: &str) -> Result<()> {
    if !KNOWN_KEYS.contains(&key) {
        bail!("unknown setting: {key} (known: {})", KNOWN_KEYS.join(", "));
    }
    if value.trim().is_empty() {
        bail!("{key} cannot be empty");
    }
    if key == TIMEOUT_KEY {
        match value.parse::<u64>() {
            Ok(secs) if secs > 0 => {}
            _ => bail!("timeout must be a positive number of seconds"),
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mem_config() -> Config {
        Config::open(":memory:").unwrap()
    }

    #[test]
    fn missing_key_is_none() {
        let config = mem_config();
        assert!(config.get(BRIDGE_KEY).unwrap().is_none());
        assert!(config.timeout().unwrap().is_none());
    }

    #[test]
    fn bridge_round_trip() {
        let config = mem_config();
        config.set(BRIDGE_KEY, "/opt/bridge/matlab-bridge").unwrap();
        assert_eq!(
            config.bridge().unwrap().as_deref(),
            Some("/opt/bridge/matlab-bridge")
        );
    }

    #[test]
    fn timeout_is_parsed() {
        let config = mem_config();
        config.set(TIMEOUT_KEY, "90").unwrap();
        assert_eq!(config.timeout().unwrap(), Some(Duration::from_secs(90)));
    }

    #[test]
    fn bad_values_are_rejected() {
        let config = mem_config();
        assert!(config.set(TIMEOUT_KEY, "soon").is_err());
        assert!(config.set(TIMEOUT_KEY, "0").is_err());
        assert!(config.set(BRIDGE_KEY, "  ").is_err());
        assert!(config.set("theme", "dark").is_err());
    }

    #[test]
    fn set_overwrites_and_remove_deletes() {
        let config = mem_config();
        config.set(BRIDGE_KEY, "old").unwrap();
        config.set(BRIDGE_KEY, "new").unwrap();
        assert_eq!(config.bridge().unwrap().as_deref(), Some("new"));
        config.remove(BRIDGE_KEY).unwrap();
        assert!(config.bridge().unwrap().is_none());
        config.remove(BRIDGE_KEY).unwrap();
    }

    #[test]
    fn persists_to_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.db");
        let path_str = path.to_str().unwrap();

        {
            let config = Config::open(path_str).unwrap();
            config.set(TIMEOUT_KEY, "15").unwrap();
        }

        let config = Config::open(path_str).unwrap();
        assert_eq!(config.timeout().unwrap(), Some(Duration::from_secs(15)));
    }
}
