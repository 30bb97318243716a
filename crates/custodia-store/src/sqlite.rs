//! SQLite implementation of the ChainBackend trait.
//!
//! The persistent backend. Uses rusqlite with bundled SQLite; every call
//! runs on `tokio::task::spawn_blocking` so the runtime is never blocked.
//!
//! File databases run in WAL mode. Commits go through a single writer
//! connection inside a `BEGIN IMMEDIATE` transaction, while reads take a
//! connection from a small pool of read-only connections, so a read of one
//! case never waits behind an append to another.

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use async_trait::async_trait;
use rusqlite::{params, Connection, OpenFlags, OptionalExtension, TransactionBehavior};

use custodia_core::{
    ActionType, ActorId, AuditEntry, CaseId, Clock, EntryDigest, Role, SystemClock,
};

use crate::backend::{next_position, ChainBackend, ChainTail, CommitResult};
use crate::error::{Result, StoreError};
use crate::migration;

/// How long a connection waits on a database lock before giving up.
const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// Idle read connections kept around for reuse.
const MAX_IDLE_READERS: usize = 4;

/// SQLite-based backend.
///
/// Cloning is cheap; clones share the writer and the reader pool.
#[derive(Debug, Clone)]
pub struct SqliteBackend {
    writer: Arc<Mutex<Connection>>,
    readers: Option<Arc<ReaderPool>>,
}

/// Read-only connections to a database file.
#[derive(Debug)]
struct ReaderPool {
    path: PathBuf,
    idle: Mutex<Vec<Connection>>,
}

impl ReaderPool {
    fn checkout(&self) -> Result<Connection> {
        if let Some(conn) = lock(&self.idle)?.pop() {
            return Ok(conn);
        }

        let conn = Connection::open_with_flags(
            &self.path,
            OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX,
        )?;
        conn.busy_timeout(BUSY_TIMEOUT)?;
        Ok(conn)
    }

    fn checkin(&self, conn: Connection) {
        if let Ok(mut idle) = self.idle.lock() {
            if idle.len() < MAX_IDLE_READERS {
                idle.push(conn);
            }
        }
    }
}

fn lock<T>(mutex: &Mutex<T>) -> Result<MutexGuard<'_, T>> {
    mutex.lock().map_err(|e| {
        StoreError::Database(rusqlite::Error::SqliteFailure(
            rusqlite::ffi::Error::new(rusqlite::ffi::SQLITE_LOCKED),
            Some(format!("mutex poisoned: {}", e)),
        ))
    })
}

impl SqliteBackend {
    /// Open a SQLite database at the given path, creating and migrating it
    /// as needed.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let mut conn = Connection::open(&path)?;
        conn.busy_timeout(BUSY_TIMEOUT)?;

        let mode: String =
            conn.query_row("PRAGMA journal_mode=WAL", [], |row| row.get(0))?;
        if !mode.eq_ignore_ascii_case("wal") {
            tracing::warn!(path = %path.display(), mode = %mode, "database did not switch to WAL");
        }

        migration::migrate(&mut conn, SystemClock.now_millis())?;
        Ok(Self {
            writer: Arc::new(Mutex::new(conn)),
            readers: Some(Arc::new(ReaderPool {
                path,
                idle: Mutex::new(Vec::new()),
            })),
        })
    }

    /// Open an in-memory SQLite database.
    ///
    /// A private in-memory database has only the one connection, so reads
    /// share it with commits.
    pub fn open_memory() -> Result<Self> {
        let mut conn = Connection::open_in_memory()?;
        migration::migrate(&mut conn, SystemClock.now_millis())?;
        Ok(Self {
            writer: Arc::new(Mutex::new(conn)),
            readers: None,
        })
    }

    /// Run a blocking operation on the writer connection off the async runtime.
    async fn write<F, T>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&mut Connection) -> Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let writer = self.writer.clone();

        tokio::task::spawn_blocking(move || {
            let mut conn = lock(&writer)?;
            f(&mut conn)
        })
        .await
        .map_err(|e| StoreError::Task(format!("spawn_blocking failed: {}", e)))?
    }

    /// Run a blocking read on a pooled read-only connection.
    async fn read<F, T>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&Connection) -> Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let Some(readers) = self.readers.clone() else {
            return self.write(move |conn| f(conn)).await;
        };

        tokio::task::spawn_blocking(move || {
            let conn = readers.checkout()?;
            let result = f(&conn);
            readers.checkin(conn);
            result
        })
        .await
        .map_err(|e| StoreError::Task(format!("spawn_blocking failed: {}", e)))?
    }
}

const ENTRY_COLUMNS: &str = "case_id, seq, timestamp, actor_id, actor_role, action_type, \
                             details, prev_digest, digest";

fn conversion_error<E>(idx: usize, e: E) -> rusqlite::Error
where
    E: std::error::Error + Send + Sync + 'static,
{
    rusqlite::Error::FromSqlConversionFailure(idx, rusqlite::types::Type::Text, Box::new(e))
}

fn digest_column(row: &rusqlite::Row<'_>, idx: usize, name: &str) -> rusqlite::Result<EntryDigest> {
    let bytes: Vec<u8> = row.get(idx)?;
    let bytes: [u8; 32] = bytes.try_into().map_err(|_| {
        rusqlite::Error::InvalidColumnType(idx, name.into(), rusqlite::types::Type::Blob)
    })?;
    Ok(EntryDigest::from_bytes(bytes))
}

// Helper to convert a row to an AuditEntry
fn row_to_entry(row: &rusqlite::Row<'_>) -> rusqlite::Result<AuditEntry> {
    let case_id: String = row.get(0)?;
    let seq: i64 = row.get(1)?;
    let actor_id: String = row.get(3)?;
    let actor_role: String = row.get(4)?;
    let action_type: String = row.get(5)?;

    Ok(AuditEntry {
        case_id: CaseId::new(case_id).map_err(|e| conversion_error(0, e))?,
        seq: seq as u64,
        timestamp: row.get(2)?,
        actor_id: ActorId::new(actor_id).map_err(|e| conversion_error(3, e))?,
        actor_role: actor_role
            .parse::<Role>()
            .map_err(|e| conversion_error(4, e))?,
        action_type: ActionType::new(action_type).map_err(|e| conversion_error(5, e))?,
        details: row.get(6)?,
        prev_digest: digest_column(row, 7, "prev_digest")?,
        digest: digest_column(row, 8, "digest")?,
    })
}

fn read_tail(conn: &Connection, case_id: &CaseId) -> Result<Option<ChainTail>> {
    let tail = conn
        .query_row(
            "SELECT seq, digest FROM audit_entries WHERE case_id = ?1
             ORDER BY seq DESC LIMIT 1",
            params![case_id.as_str()],
            |row| {
                let seq: i64 = row.get(0)?;
                Ok(ChainTail {
                    seq: seq as u64,
                    digest: digest_column(row, 1, "digest")?,
                })
            },
        )
        .optional()?;
    Ok(tail)
}

#[async_trait]
impl ChainBackend for SqliteBackend {
    async fn commit(&self, entry: &AuditEntry) -> Result<CommitResult> {
        let entry = entry.clone();

        self.write(move |conn| {
            let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

            let tail = read_tail(&tx, &entry.case_id)?;
            let (expected_seq, expected_prev) = next_position(tail.as_ref());
            if entry.seq != expected_seq || entry.prev_digest != expected_prev {
                return Ok(CommitResult::Conflict {
                    expected_seq,
                    expected_prev,
                });
            }

            tx.execute(
                "INSERT INTO audit_entries (
                    case_id, seq, timestamp, actor_id, actor_role, action_type,
                    details, prev_digest, digest, committed_at
                ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
                params![
                    entry.case_id.as_str(),
                    entry.seq as i64,
                    entry.timestamp,
                    entry.actor_id.as_str(),
                    entry.actor_role.as_str(),
                    entry.action_type.as_str(),
                    entry.details,
                    entry.prev_digest.as_bytes().as_slice(),
                    entry.digest.as_bytes().as_slice(),
                    SystemClock.now_millis(),
                ],
            )?;
            tx.commit()?;

            Ok(CommitResult::Committed)
        })
        .await
    }

    async fn tail(&self, case_id: &CaseId) -> Result<Option<ChainTail>> {
        let case_id = case_id.clone();
        self.read(move |conn| read_tail(conn, &case_id)).await
    }

    async fn entries(
        &self,
        case_id: &CaseId,
        from: u64,
        to: Option<u64>,
    ) -> Result<Vec<AuditEntry>> {
        let case_id = case_id.clone();

        self.read(move |conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {} FROM audit_entries
                 WHERE case_id = ?1 AND seq >= ?2 AND (?3 IS NULL OR seq < ?3)
                 ORDER BY seq",
                ENTRY_COLUMNS
            ))?;

            let entries = stmt
                .query_map(
                    params![case_id.as_str(), from as i64, to.map(|t| t as i64)],
                    row_to_entry,
                )?
                .collect::<rusqlite::Result<Vec<_>>>()?;

            Ok(entries)
        })
        .await
    }

    async fn count(&self, case_id: &CaseId) -> Result<u64> {
        let case_id = case_id.clone();

        self.read(move |conn| {
            let count: i64 = conn.query_row(
                "SELECT COUNT(*) FROM audit_entries WHERE case_id = ?1",
                params![case_id.as_str()],
                |row| row.get(0),
            )?;
            Ok(count as u64)
        })
        .await
    }

    async fn list_cases(&self) -> Result<Vec<CaseId>> {
        self.read(|conn| {
            let mut stmt =
                conn.prepare("SELECT DISTINCT case_id FROM audit_entries ORDER BY case_id")?;
            let ids = stmt
                .query_map([], |row| row.get::<_, String>(0))?
                .collect::<rusqlite::Result<Vec<_>>>()?;

            ids.into_iter()
                .map(|id| CaseId::new(id).map_err(StoreError::from))
                .collect()
        })
        .await
    }
}
