//! Audit trail
//!
//! One row per mutation, keyed by the acting user's email so entries
//! survive the user being removed.

use chrono::{DateTime, Utc};
use rusqlite::{params, Row};
use serde::Serialize;
use tracing::debug;

use super::{format_timestamp, parse_datetime, Database};
use crate::error::Result;

#[derive(Debug, Clone, Serialize)]
pub struct AuditEntry {
    pub id: i64,
    pub timestamp: DateTime<Utc>,
    pub user_email: String,
    pub action: String,
    pub entity_type: Option<String>,
    pub entity_id: Option<String>,
    pub details: Option<String>,
}

fn row_to_entry(row: &Row) -> rusqlite::Result<AuditEntry> {
    let timestamp: String = row.get("timestamp")?;
    Ok(AuditEntry {
        id: row.get("id")?,
        timestamp: parse_datetime(&timestamp),
        user_email: row.get("user_email")?,
        action: row.get("action")?,
        entity_type: row.get("entity_type")?,
        entity_id: row.get("entity_id")?,
        details: row.get("details")?,
    })
}

impl Database {
    /// Append an entry; returns its id
    pub fn log_audit(
        &self,
        user_email: &str,
        action: &str,
        entity_type: Option<&str>,
        entity_id: Option<&str>,
        details: Option<&str>,
    ) -> Result<i64> {
        let conn = self.conn()?;
        conn.execute(
            "INSERT INTO audit_log (timestamp, user_email, action, entity_type, entity_id, details)
             VALUES (?, ?, ?, ?, ?, ?)",
            params![
                format_timestamp(Utc::now()),
                user_email,
                action,
                entity_type,
                entity_id,
                details
            ],
        )?;

        let id = conn.last_insert_rowid();
        debug!(id, user = user_email, action, "Audit entry recorded");
        Ok(id)
    }

    /// The `limit` most recent entries, newest first
    pub fn list_audit_log(&self, limit: i64) -> Result<Vec<AuditEntry>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            "SELECT id, timestamp, user_email, action, entity_type, entity_id, details
             FROM audit_log ORDER BY id DESC LIMIT ?",
        )?;
        let entries = stmt
            .query_map(params![limit], row_to_entry)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(entries)
    }
}
