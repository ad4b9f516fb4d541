//! SQLite store
//!
//! - `expenses` - Expense CRUD, bulk delete, tags
//! - `expense_filter` - WHERE clause builder for expense listing
//! - `users` - Users, sessions, admin aggregates
//! - `audit` - Audit trail of mutations
//!
//! A [`Database`] is opened once at startup and cloned into every component
//! that needs persistence. SQLite serializes writers, so concurrent handlers
//! share the pool without application-level locks; conflicting updates to
//! one row are last-write-wins.

use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};

use chrono::{DateTime, NaiveDateTime, SecondsFormat, Utc};
use r2d2::{Pool, PooledConnection};
use r2d2_sqlite::SqliteConnectionManager;
use tracing::{debug, info};

use crate::error::{Error, Result};

mod audit;
mod expense_filter;
mod expenses;
mod users;

pub use audit::AuditEntry;
pub use expense_filter::{ExpenseFilter, FilterResult};
pub use expenses::{AGGREGATE_LIMIT, LIST_LIMIT};
pub use users::SESSION_TTL_DAYS;

pub type DbPool = Pool<SqliteConnectionManager>;
pub type DbConn = PooledConnection<SqliteConnectionManager>;

/// Environment variable holding the database passphrase
pub const DB_KEY_ENV: &str = "TALLY_DB_KEY";

const POOL_SIZE: u32 = 10;

/// Stretch a passphrase into a raw 256-bit SQLCipher key
///
/// The salt is fixed so a database keeps opening after it is moved or
/// renamed. Changing it locks out every existing encrypted database.
fn derive_key(passphrase: &str) -> Result<String> {
    const KEY_SALT: &[u8] = b"tally.sqlcipher.v1";

    let mut key = [0u8; 32];
    argon2::Argon2::default()
        .hash_password_into(passphrase.as_bytes(), KEY_SALT, &mut key)
        .map_err(|e| Error::Encryption(format!("Failed to derive key: {}", e)))?;
    Ok(hex::encode(key))
}

/// Stored timestamps are fixed-width RFC 3339 so they sort as text
pub(crate) fn format_timestamp(dt: DateTime<Utc>) -> String {
    dt.to_rfc3339_opts(SecondsFormat::Micros, true)
}

pub(crate) fn parse_datetime(s: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .or_else(|_| NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S").map(|dt| dt.and_utc()))
        .unwrap_or_else(|_| Utc::now())
}

/// Opaque id such as `exp_1a2b3c4d5e6f`
pub(crate) fn new_id(prefix: &str) -> String {
    let hex = uuid::Uuid::new_v4().simple().to_string();
    format!("{}_{}", prefix, &hex[..12])
}

/// Pooled handle to the expense store
#[derive(Clone)]
pub struct Database {
    pool: DbPool,
    db_path: String,
    encrypted: bool,
}

impl Database {
    /// Open an encrypted database keyed from `TALLY_DB_KEY`
    ///
    /// Fails when the variable is unset; use [`Database::new_unencrypted`]
    /// for local development.
    pub fn new(path: &str) -> Result<Self> {
        let passphrase = std::env::var(DB_KEY_ENV).map_err(|_| {
            Error::Encryption(format!(
                "{} is not set. Export a passphrase to open the encrypted database, \
                 or pass --no-encrypt for a plain one (development only).",
                DB_KEY_ENV
            ))
        })?;
        Self::new_with_key(path, Some(&passphrase))
    }

    pub fn new_unencrypted(path: &str) -> Result<Self> {
        Self::new_with_key(path, None)
    }

    /// Open `path`, keying every pooled connection when a passphrase is given
    pub fn new_with_key(path: &str, passphrase: Option<&str>) -> Result<Self> {
        let key_pragma = passphrase
            .map(derive_key)
            .transpose()?
            .map(|key| format!("PRAGMA key = \"x'{}'\";", key));
        let encrypted = key_pragma.is_some();

        let manager = SqliteConnectionManager::file(path).with_init(move |conn| {
            if let Some(pragma) = &key_pragma {
                conn.execute_batch(pragma)?;
            }
            conn.execute_batch("PRAGMA foreign_keys = ON;")
        });
        let pool = Pool::builder().max_size(POOL_SIZE).build(manager)?;

        let db = Self {
            pool,
            db_path: path.to_string(),
            encrypted,
        };
        db.migrate()?;

        info!(path, encrypted, "Database opened");
        Ok(db)
    }

    /// Fresh throwaway database for tests
    ///
    /// Backed by a unique temp file: with `:memory:` each pooled
    /// connection would see its own empty database.
    pub fn in_memory() -> Result<Self> {
        static NEXT: AtomicU64 = AtomicU64::new(0);

        let path: PathBuf = std::env::temp_dir().join(format!(
            "tally_test_{}_{}.db",
            std::process::id(),
            NEXT.fetch_add(1, Ordering::Relaxed)
        ));
        let _ = std::fs::remove_file(&path);

        Self::new_unencrypted(&path.to_string_lossy())
    }

    pub fn path(&self) -> &str {
        &self.db_path
    }

    /// Whether connections are keyed with a SQLCipher key
    pub fn is_encrypted(&self) -> bool {
        self.encrypted
    }

    pub fn conn(&self) -> Result<DbConn> {
        Ok(self.pool.get()?)
    }

    fn migrate(&self) -> Result<()> {
        let conn = self.conn()?;
        conn.execute_batch(SCHEMA)?;
        debug!("Schema up to date");
        Ok(())
    }
}

const SCHEMA: &str = r#"
PRAGMA journal_mode = WAL;
PRAGMA synchronous = NORMAL;

CREATE TABLE IF NOT EXISTS users (
    user_id TEXT PRIMARY KEY,
    email TEXT NOT NULL UNIQUE,
    name TEXT NOT NULL,
    picture TEXT,
    password_hash TEXT,
    created_at TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS sessions (
    session_token TEXT PRIMARY KEY,
    user_id TEXT NOT NULL REFERENCES users(user_id) ON DELETE CASCADE,
    expires_at TEXT NOT NULL,
    created_at TEXT NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_sessions_user ON sessions(user_id);

-- line_items and tags hold JSON arrays; date is YYYY-MM-DD
CREATE TABLE IF NOT EXISTS expenses (
    expense_id TEXT PRIMARY KEY,
    user_id TEXT NOT NULL REFERENCES users(user_id),
    vendor TEXT NOT NULL,
    date TEXT NOT NULL,
    amount REAL NOT NULL,
    currency TEXT NOT NULL DEFAULT 'USD',
    category TEXT NOT NULL,
    payment_method TEXT,
    receipt_number TEXT,
    line_items TEXT NOT NULL DEFAULT '[]',
    tags TEXT NOT NULL DEFAULT '[]',
    notes TEXT,
    receipt_image TEXT,
    confidence_score REAL,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_expenses_user_date ON expenses(user_id, date);
CREATE INDEX IF NOT EXISTS idx_expenses_user_category ON expenses(user_id, category);

CREATE TABLE IF NOT EXISTS audit_log (
    id INTEGER PRIMARY KEY,
    timestamp TEXT NOT NULL,
    user_email TEXT NOT NULL,
    action TEXT NOT NULL,
    entity_type TEXT,
    entity_id TEXT,
    details TEXT
);
CREATE INDEX IF NOT EXISTS idx_audit_timestamp ON audit_log(timestamp);
"#;

#[cfg(test)]
mod tests;
