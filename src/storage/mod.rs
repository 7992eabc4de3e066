//! Issue catalog backed by SQLite
//!
//! Every archived issue gets a row pointing at its file in the archive
//! directory, together with the SHA-256 of its content so that byte-identical
//! re-deliveries can be recognised.

use chrono::{DateTime, NaiveDate, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use std::path::Path;
use std::sync::Mutex;

use crate::sources::Issue;

/// Date format stored in the catalog
const DATE_FORMAT: &str = "%Y-%m-%d";

/// Result type for catalog operations
pub type CatalogResult<T> = Result<T, CatalogError>;

/// Errors raised by the issue catalog
#[derive(Debug, thiserror::Error)]
pub enum CatalogError {
    /// SQLite failure
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// Catalog directory could not be created
    #[error("Cannot create catalog directory: {0}")]
    Io(#[from] std::io::Error),

    /// Stored row could not be decoded
    #[error("Corrupted catalog row: {0}")]
    Corrupted(String),

    /// Connection lock poisoned by a panicking thread
    #[error("Catalog connection lock poisoned")]
    Poisoned,
}

/// Issue row as stored in the catalog
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArchivedIssue {
    pub id: i64,
    pub title: String,
    pub date: NaiveDate,
    pub newspaper: String,
    pub path: String,
    pub sha256: String,
    pub archived_at: DateTime<Utc>,
}

/// SQLite issue catalog
pub struct IssueCatalog {
    conn: Mutex<Connection>,
}

impl IssueCatalog {
    /// Open (and create if needed) the catalog at `path`
    pub fn open(path: &Path) -> CatalogResult<Self> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        Self::with_connection(Connection::open(path)?)
    }

    /// In-memory catalog, for tests and dry runs
    pub fn open_in_memory() -> CatalogResult<Self> {
        Self::with_connection(Connection::open_in_memory()?)
    }

    fn with_connection(conn: Connection) -> CatalogResult<Self> {
        create_schema(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn lock(&self) -> CatalogResult<std::sync::MutexGuard<'_, Connection>> {
        self.conn.lock().map_err(|_| CatalogError::Poisoned)
    }

    /// Record an archived issue and return its row id
    pub fn add_issue(&self, issue: &Issue, path: &str, sha256: &str) -> CatalogResult<i64> {
        let conn = self.lock()?;

        conn.execute(
            "INSERT OR IGNORE INTO newspaper (name) VALUES (?1)",
            params![issue.newspaper],
        )?;
        conn.execute(
            "INSERT INTO issue (title, date, newspaper, path, sha256, archived_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                issue.title,
                issue.date.format(DATE_FORMAT).to_string(),
                issue.newspaper,
                path,
                sha256,
                Utc::now().to_rfc3339(),
            ],
        )?;

        Ok(conn.last_insert_rowid())
    }

    /// Whether `newspaper` already has an issue with this content hash
    pub fn contains_hash(&self, newspaper: &str, sha256: &str) -> CatalogResult<bool> {
        let conn = self.lock()?;
        let found = conn
            .query_row(
                "SELECT 1 FROM issue WHERE newspaper = ?1 AND sha256 = ?2 LIMIT 1",
                params![newspaper, sha256],
                |_| Ok(()),
            )
            .optional()?;
        Ok(found.is_some())
    }

    /// Names of all newspapers with at least one archived issue
    pub fn newspapers(&self) -> CatalogResult<Vec<String>> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare("SELECT name FROM newspaper ORDER BY name")?;
        let names = stmt
            .query_map([], |row| row.get(0))?
            .collect::<Result<Vec<String>, _>>()?;
        Ok(names)
    }

    /// Archived issues, newest first
    pub fn issues(
        &self,
        newspaper: Option<&str>,
        limit: Option<usize>,
    ) -> CatalogResult<Vec<ArchivedIssue>> {
        let conn = self.lock()?;
        let limit = limit.map_or(-1, |l| i64::try_from(l).unwrap_or(i64::MAX));

        let mut stmt = conn.prepare(
            "SELECT id, title, date, newspaper, path, sha256, archived_at FROM issue
             WHERE (?1 IS NULL OR newspaper = ?1)
             ORDER BY date DESC, id DESC
             LIMIT ?2",
        )?;

        let rows = stmt
            .query_map(params![newspaper, limit], |row| {
                Ok((
                    row.get::<_, i64>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, String>(2)?,
                    row.get::<_, String>(3)?,
                    row.get::<_, String>(4)?,
                    row.get::<_, String>(5)?,
                    row.get::<_, String>(6)?,
                ))
            })?
            .collect::<Result<Vec<_>, _>>()?;

        rows.into_iter()
            .map(|(id, title, date, newspaper, path, sha256, archived_at)| {
                let date = NaiveDate::parse_from_str(&date, DATE_FORMAT)
                    .map_err(|e| CatalogError::Corrupted(format!("issue {id}: date '{date}': {e}")))?;
                let archived_at = DateTime::parse_from_rfc3339(&archived_at)
                    .map_err(|e| CatalogError::Corrupted(format!("issue {id}: {e}")))?
                    .with_timezone(&Utc);
                Ok(ArchivedIssue {
                    id,
                    title,
                    date,
                    newspaper,
                    path,
                    sha256,
                    archived_at,
                })
            })
            .collect()
    }
}

fn create_schema(conn: &Connection) -> CatalogResult<()> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS newspaper (
            name TEXT PRIMARY KEY
        );
        CREATE TABLE IF NOT EXISTS issue (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            title TEXT NOT NULL,
            date TEXT NOT NULL,
            newspaper TEXT NOT NULL REFERENCES newspaper(name),
            path TEXT NOT NULL,
            sha256 TEXT NOT NULL,
            archived_at TEXT NOT NULL
        );
        CREATE INDEX IF NOT EXISTS idx_issue_newspaper_date ON issue(newspaper, date);
        CREATE INDEX IF NOT EXISTS idx_issue_sha256 ON issue(sha256);",
    )?;
    Ok(())
}
