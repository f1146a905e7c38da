use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{anyhow, bail, Context, Result};
use chrono::{DateTime, TimeZone, Utc};
use parking_lot::Mutex;
use rusqlite::{params, Connection, OptionalExtension};

/// Key under which the last-used API base address is kept.
pub const BASE_URL_KEY: &str = "api_base_url";

#[derive(Debug, Clone)]
pub struct Store {
    conn: Arc<Mutex<Connection>>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Preference {
    pub key: String,
    pub value: String,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Default, Clone)]
pub struct Options {
    pub path: Option<PathBuf>,
}

impl Store {
    pub fn open(opts: Options) -> Result<Self> {
        let path = if let Some(path) = opts.path {
            path
        } else {
            default_path().context("storage: resolve default path")?
        };

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("storage: create directory {}", parent.display()))?;
        }

        let conn = Connection::open(&path)
            .with_context(|| format!("storage: open database at {}", path.display()))?;
        conn.pragma_update(None, "journal_mode", "WAL")
            .context("storage: set WAL")?;
        conn.pragma_update(None, "busy_timeout", 5000)
            .context("storage: set busy timeout")?;
        migrate(&conn)?;

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    pub fn close(self) -> Result<()> {
        let conn = Arc::try_unwrap(self.conn)
            .map_err(|_| anyhow!("storage: connection still in use"))?
            .into_inner();
        conn.close()
            .map_err(|(_, err)| err)
            .context("storage: close connection")
    }

    pub fn get_preference(&self, key: &str) -> Result<Option<Preference>> {
        let conn = self.conn.lock();
        conn.query_row(
            r#"
SELECT key, value, updated_at
FROM preferences
WHERE key = ?1
"#,
            params![key],
            |row| {
                let updated: i64 = row.get(2)?;
                Ok(Preference {
                    key: row.get(0)?,
                    value: row.get(1)?,
                    updated_at: Utc
                        .timestamp_opt(updated, 0)
                        .single()
                        .unwrap_or_else(Utc::now),
                })
            },
        )
        .optional()
        .context("storage: query preference")
    }

    /// Overwrites the stored value, even when it is unchanged.
    pub fn set_preference(&self, key: &str, value: &str) -> Result<()> {
        if key.is_empty() {
            bail!("storage: preference key required");
        }
        let conn = self.conn.lock();
        conn.execute(
            r#"
INSERT INTO preferences (key, value, updated_at)
VALUES (?1, ?2, ?3)
ON CONFLICT(key) DO UPDATE SET
  value = excluded.value,
  updated_at = excluded.updated_at
"#,
            params![key, value, Utc::now().timestamp()],
        )
        .context("storage: upsert preference")?;
        Ok(())
    }

    pub fn base_url(&self) -> Result<Option<String>> {
        Ok(self
            .get_preference(BASE_URL_KEY)?
            .map(|pref| pref.value)
            .filter(|value| !value.is_empty()))
    }

    pub fn set_base_url(&self, value: &str) -> Result<()> {
        self.set_preference(BASE_URL_KEY, value)
    }
}

pub fn default_path() -> Option<PathBuf> {
    dirs::data_dir().map(|dir| dir.join("blog-tui").join("state.db"))
}

fn migrate(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        r#"
CREATE TABLE IF NOT EXISTS preferences (
  key TEXT PRIMARY KEY,
  value TEXT NOT NULL,
  updated_at INTEGER NOT NULL
);
"#,
    )
    .context("storage: migrate schema")
}
