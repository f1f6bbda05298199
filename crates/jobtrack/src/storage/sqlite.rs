//! SQLite-backed application store and checkpoint log

use std::path::Path;
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use anyhow::{Context, Result, anyhow};
use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::{Connection, OptionalExtension, TransactionBehavior, params};
use rusqlite_migration::{M, Migrations};

use super::{ApplicationStore, CheckpointLog};
use crate::models::{
    ApplicationKey, ApplicationStatus, ApplicationUpdate, CheckpointEntry, JobApplication,
};

/// How long a writer waits on another process holding the write lock
const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// Database migrations
///
/// Each migration is applied in order. The user_version pragma tracks which
/// migrations have been applied.
fn migrations() -> Migrations<'static> {
    Migrations::new(vec![
        // Migration 1: Initial schema
        M::up(
            r#"
            CREATE TABLE job_applications (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                owner TEXT NOT NULL,
                job_title TEXT NOT NULL,
                company TEXT NOT NULL,
                status TEXT NOT NULL,
                sender_email TEXT NOT NULL,
                row_number INTEGER NOT NULL,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL,
                UNIQUE (owner, job_title, company),
                UNIQUE (owner, row_number)
            );

            -- Last row number handed out per owner; never decremented
            CREATE TABLE owner_row_sequences (
                owner TEXT PRIMARY KEY,
                last_row INTEGER NOT NULL
            );

            CREATE TABLE fetch_log (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                owner TEXT NOT NULL,
                fetched_at TEXT NOT NULL
            );

            CREATE INDEX idx_fetch_log_owner ON fetch_log(owner, fetched_at DESC);
            "#,
        ),
    ])
}

/// Fixed-width UTC timestamps so text ordering matches time ordering
fn format_timestamp(ts: &DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Nanos, true)
}

fn parse_timestamp(value: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .with_context(|| format!("Invalid timestamp in database: {:?}", value))
}

type ApplicationRow = (String, String, String, String, String, u32, String, String);

const APPLICATION_COLUMNS: &str =
    "owner, job_title, company, status, sender_email, row_number, created_at, updated_at";

fn read_application_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<ApplicationRow> {
    Ok((
        row.get(0)?,
        row.get(1)?,
        row.get(2)?,
        row.get(3)?,
        row.get(4)?,
        row.get(5)?,
        row.get(6)?,
        row.get(7)?,
    ))
}

fn application_from_row(row: ApplicationRow) -> Result<JobApplication> {
    let (owner, job_title, company, status, sender_email, row_number, created_at, updated_at) = row;
    Ok(JobApplication {
        owner,
        job_title,
        company,
        status: status.parse::<ApplicationStatus>()?,
        sender_email,
        row_number,
        created_at: parse_timestamp(&created_at)?,
        updated_at: parse_timestamp(&updated_at)?,
    })
}

/// SQLite implementation of [`ApplicationStore`] and [`CheckpointLog`]
///
/// Upserts run in `BEGIN IMMEDIATE` transactions, so separate processes
/// sharing one database file serialize on the row sequence as well.
pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    /// Open (or create) the database at `db_path` and run migrations
    pub fn new(db_path: impl AsRef<Path>) -> Result<Self> {
        let conn = Connection::open(db_path.as_ref())
            .with_context(|| format!("Failed to open database at {:?}", db_path.as_ref()))?;
        Self::from_connection(conn)
    }

    /// In-memory database, mainly for tests
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().context("Failed to open in-memory database")?;
        Self::from_connection(conn)
    }

    fn from_connection(mut conn: Connection) -> Result<Self> {
        // WAL lets readers proceed during a run's writes
        conn.execute_batch(
            r#"
            PRAGMA journal_mode = WAL;
            PRAGMA synchronous = NORMAL;
            PRAGMA temp_store = MEMORY;
            "#,
        )?;
        conn.busy_timeout(BUSY_TIMEOUT)?;

        migrations()
            .to_latest(&mut conn)
            .context("Failed to run database migrations")?;

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| anyhow!("SQLite connection lock poisoned"))
    }
}

impl ApplicationStore for SqliteStore {
    fn upsert(&self, owner: &str, update: ApplicationUpdate) -> Result<(JobApplication, bool)> {
        let mut conn = self.lock()?;
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        let now = Utc::now();
        let now_str = format_timestamp(&now);

        let existing = tx
            .query_row(
                &format!(
                    "SELECT {} FROM job_applications
                     WHERE owner = ? AND job_title = ? AND company = ?",
                    APPLICATION_COLUMNS
                ),
                params![owner, update.job_title, update.company],
                read_application_row,
            )
            .optional()?;

        let result = match existing {
            Some(row) => {
                tx.execute(
                    "UPDATE job_applications
                     SET status = ?, sender_email = ?, updated_at = ?
                     WHERE owner = ? AND job_title = ? AND company = ?",
                    params![
                        update.status.as_str(),
                        update.sender_email,
                        now_str,
                        owner,
                        update.job_title,
                        update.company,
                    ],
                )?;

                let mut application = application_from_row(row)?;
                application.status = update.status;
                application.sender_email = update.sender_email;
                application.updated_at = now;
                (application, false)
            }
            None => {
                let row_number: u32 = tx.query_row(
                    "INSERT INTO owner_row_sequences (owner, last_row) VALUES (?, 1)
                     ON CONFLICT(owner) DO UPDATE SET last_row = last_row + 1
                     RETURNING last_row",
                    [owner],
                    |row| row.get(0),
                )?;

                tx.execute(
                    &format!(
                        "INSERT INTO job_applications ({}) VALUES (?, ?, ?, ?, ?, ?, ?, ?)",
                        APPLICATION_COLUMNS
                    ),
                    params![
                        owner,
                        update.job_title,
                        update.company,
                        update.status.as_str(),
                        update.sender_email,
                        row_number,
                        now_str,
                        now_str,
                    ],
                )?;

                let application = JobApplication {
                    owner: owner.to_string(),
                    job_title: update.job_title,
                    company: update.company,
                    status: update.status,
                    sender_email: update.sender_email,
                    row_number,
                    created_at: now,
                    updated_at: now,
                };
                (application, true)
            }
        };

        tx.commit()?;
        Ok(result)
    }

    fn count(&self, owner: &str) -> Result<usize> {
        let conn = self.lock()?;
        let count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM job_applications WHERE owner = ?",
            [owner],
            |row| row.get(0),
        )?;
        Ok(count as usize)
    }

    fn get(&self, key: &ApplicationKey) -> Result<Option<JobApplication>> {
        let conn = self.lock()?;
        let row = conn
            .query_row(
                &format!(
                    "SELECT {} FROM job_applications
                     WHERE owner = ? AND job_title = ? AND company = ?",
                    APPLICATION_COLUMNS
                ),
                params![key.owner, key.job_title, key.company],
                read_application_row,
            )
            .optional()?;

        row.map(application_from_row).transpose()
    }

    fn list(&self, owner: &str) -> Result<Vec<JobApplication>> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM job_applications WHERE owner = ? ORDER BY row_number",
            APPLICATION_COLUMNS
        ))?;

        let rows = stmt
            .query_map([owner], read_application_row)?
            .collect::<Result<Vec<_>, _>>()?;

        rows.into_iter().map(application_from_row).collect()
    }

    fn delete(&self, key: &ApplicationKey) -> Result<bool> {
        let conn = self.lock()?;
        let deleted = conn.execute(
            "DELETE FROM job_applications WHERE owner = ? AND job_title = ? AND company = ?",
            params![key.owner, key.job_title, key.company],
        )?;
        Ok(deleted > 0)
    }
}

impl CheckpointLog for SqliteStore {
    fn latest(&self, owner: &str) -> Result<Option<DateTime<Utc>>> {
        let conn = self.lock()?;
        let value: Option<String> = conn
            .query_row(
                "SELECT fetched_at FROM fetch_log WHERE owner = ? ORDER BY fetched_at DESC LIMIT 1",
                [owner],
                |row| row.get(0),
            )
            .optional()?;

        value.as_deref().map(parse_timestamp).transpose()
    }

    fn record(&self, owner: &str, fetched_at: DateTime<Utc>) -> Result<()> {
        let conn = self.lock()?;
        conn.execute(
            "INSERT INTO fetch_log (owner, fetched_at) VALUES (?, ?)",
            params![owner, format_timestamp(&fetched_at)],
        )?;
        Ok(())
    }

    fn history(&self, owner: &str) -> Result<Vec<CheckpointEntry>> {
        let conn = self.lock()?;
        let mut stmt =
            conn.prepare("SELECT fetched_at FROM fetch_log WHERE owner = ? ORDER BY fetched_at")?;

        let values = stmt
            .query_map([owner], |row| row.get::<_, String>(0))?
            .collect::<Result<Vec<_>, _>>()?;

        values
            .iter()
            .map(|v| Ok(CheckpointEntry::new(owner, parse_timestamp(v)?)))
            .collect()
    }
}
