use crate::clock::Clock;
use crate::error::StoreError;
use chrono::NaiveDate;
use rusqlite::{OptionalExtension, TransactionBehavior};
use std::fmt;
use std::path::Path;
use std::sync::Arc;
use tokio_rusqlite::Connection;

const DATE_FORMAT: &str = "%Y-%m-%d";
const TIME_FORMAT: &str = "%H:%M:%S";

/// Outcome of marking attendance for a user.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PunchAction {
    /// First mark of the day: a record was created.
    PunchIn,
    /// Second mark of the day: the record's punch-out was set.
    PunchOut,
    /// The day's record is already closed; nothing changed.
    AlreadyMarked,
}

impl PunchAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            PunchAction::PunchIn => "PUNCH-IN",
            PunchAction::PunchOut => "PUNCH-OUT",
            PunchAction::AlreadyMarked => "ALREADY MARKED",
        }
    }
}

impl fmt::Display for PunchAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One row of the attendance table.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct AttendanceRecord {
    pub user: String,
    pub date: String,
    pub punch_in: Option<String>,
    pub punch_out: Option<String>,
}

/// SQLite-backed attendance ledger.
///
/// Each (user, date) pair moves through NoRecord → PunchedIn → PunchedOut.
/// The lookup and the write for one mark share a single `BEGIN IMMEDIATE`
/// transaction, and a unique index on (user, date) rejects a second row for
/// the same day, so two processes sharing the database cannot both punch in.
#[derive(Clone)]
pub struct AttendanceLedger {
    conn: Connection,
    clock: Arc<dyn Clock>,
}

impl AttendanceLedger {
    /// Open (or create) the database at the given path and run migrations.
    pub async fn open(db_path: &Path, clock: Arc<dyn Clock>) -> Result<Self, StoreError> {
        let unavailable = |source: tokio_rusqlite::Error| StoreError::Unavailable {
            path: db_path.to_path_buf(),
            source: source.into(),
        };

        if let Some(parent) = db_path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|source| StoreError::Unavailable {
                path: db_path.to_path_buf(),
                source: source.into(),
            })?;
        }

        let conn = Connection::open(db_path).await.map_err(unavailable)?;

        // Columns match the legacy table so existing files open unchanged;
        // the index fails to build if a legacy file already holds duplicates.
        conn.call(|conn| {
            conn.execute_batch(
                "PRAGMA journal_mode = WAL;
                 CREATE TABLE IF NOT EXISTS attendance (
                     user TEXT,
                     date TEXT,
                     punch_in TEXT,
                     punch_out TEXT
                 );
                 CREATE UNIQUE INDEX IF NOT EXISTS idx_attendance_user_date
                     ON attendance(user, date);",
            )?;
            Ok(())
        })
        .await
        .map_err(unavailable)?;

        tracing::debug!(path = %db_path.display(), "attendance ledger opened");
        Ok(Self { conn, clock })
    }

    /// Record a punch for `user` at the current clock time.
    pub async fn mark_attendance(&self, user: &str) -> Result<PunchAction, StoreError> {
        let now = self.clock.now();
        let today = now.format(DATE_FORMAT).to_string();
        let time_now = now.format(TIME_FORMAT).to_string();

        let user_owned = user.to_string();
        let date = today.clone();
        let time = time_now.clone();

        let action = self
            .conn
            .call(move |conn| {
                let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

                let existing: Option<Option<String>> = tx
                    .query_row(
                        "SELECT punch_out FROM attendance WHERE user = ?1 AND date = ?2",
                        [&user_owned, &date],
                        |row| row.get(0),
                    )
                    .optional()?;

                let action = match existing {
                    None => {
                        tx.execute(
                            "INSERT INTO attendance (user, date, punch_in, punch_out)
                             VALUES (?1, ?2, ?3, NULL)",
                            [&user_owned, &date, &time],
                        )?;
                        PunchAction::PunchIn
                    }
                    Some(None) => {
                        tx.execute(
                            "UPDATE attendance SET punch_out = ?1
                             WHERE user = ?2 AND date = ?3 AND punch_out IS NULL",
                            [&time, &user_owned, &date],
                        )?;
                        PunchAction::PunchOut
                    }
                    Some(Some(_)) => PunchAction::AlreadyMarked,
                };

                tx.commit()?;
                Ok(action)
            })
            .await?;

        match action {
            PunchAction::AlreadyMarked => {
                tracing::info!(user, date = %today, "attendance already marked")
            }
            _ => tracing::info!(user, date = %today, time = %time_now, action = %action, "attendance marked"),
        }

        Ok(action)
    }

    /// The record for (`user`, `date`), if any.
    pub async fn record(
        &self,
        user: &str,
        date: NaiveDate,
    ) -> Result<Option<AttendanceRecord>, StoreError> {
        let user = user.to_string();
        let date = date.format(DATE_FORMAT).to_string();
        self.conn
            .call(move |conn| {
                let record = conn
                    .query_row(
                        "SELECT user, date, punch_in, punch_out
                         FROM attendance WHERE user = ?1 AND date = ?2",
                        [&user, &date],
                        |row| {
                            Ok(AttendanceRecord {
                                user: row.get(0)?,
                                date: row.get(1)?,
                                punch_in: row.get(2)?,
                                punch_out: row.get(3)?,
                            })
                        },
                    )
                    .optional()?;
                Ok(record)
            })
            .await
            .map_err(StoreError::from)
    }

    /// Number of rows for (`user`, `date`). At most 1.
    pub async fn count_for(&self, user: &str, date: NaiveDate) -> Result<u64, StoreError> {
        let user = user.to_string();
        let date = date.format(DATE_FORMAT).to_string();
        self.conn
            .call(move |conn| {
                let count: u64 = conn.query_row(
                    "SELECT COUNT(*) FROM attendance WHERE user = ?1 AND date = ?2",
                    [&user, &date],
                    |row| row.get(0),
                )?;
                Ok(count)
            })
            .await
            .map_err(StoreError::from)
    }

    /// Total number of attendance rows.
    pub async fn count_all(&self) -> Result<u64, StoreError> {
        self.conn
            .call(|conn| {
                let count: u64 =
                    conn.query_row("SELECT COUNT(*) FROM attendance", [], |row| row.get(0))?;
                Ok(count)
            })
            .await
            .map_err(StoreError::from)
    }
}
