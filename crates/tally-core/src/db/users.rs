//! User, session and admin operations

use argon2::password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
use argon2::Argon2;
use chrono::{DateTime, Duration, Utc};
use rusqlite::{params, OptionalExtension, Row};
use tracing::{debug, info};

use super::{format_timestamp, new_id, parse_datetime, Database};
use crate::error::{Error, Result};
use crate::models::{AdminStats, Session, User, UserWithStats};

/// Sessions last a week
pub const SESSION_TTL_DAYS: i64 = 7;

fn hash_password(password: &str) -> Result<String> {
    // 16 random bytes from a v4 uuid make the per-user salt
    let salt = SaltString::encode_b64(uuid::Uuid::new_v4().as_bytes())
        .map_err(|e| Error::Auth(format!("Failed to create salt: {}", e)))?;
    let hash = Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map_err(|e| Error::Auth(format!("Failed to hash password: {}", e)))?;
    Ok(hash.to_string())
}

fn verify_password(password: &str, stored: &str) -> bool {
    match PasswordHash::new(stored) {
        Ok(parsed) => Argon2::default()
            .verify_password(password.as_bytes(), &parsed)
            .is_ok(),
        Err(_) => false,
    }
}

fn row_to_user(row: &Row) -> rusqlite::Result<User> {
    let created_at: String = row.get(4)?;
    Ok(User {
        user_id: row.get(0)?,
        email: row.get(1)?,
        name: row.get(2)?,
        picture: row.get(3)?,
        created_at: parse_datetime(&created_at),
    })
}

impl Database {
    /// Create a user; `password` may be omitted for accounts that only
    /// receive sessions from the CLI
    pub fn create_user(&self, email: &str, name: &str, password: Option<&str>) -> Result<User> {
        let email = email.trim().to_lowercase();
        if email.is_empty() || !email.contains('@') {
            return Err(Error::InvalidData(format!("Invalid email: {}", email)));
        }
        if self.get_user_by_email(&email)?.is_some() {
            return Err(Error::InvalidData(format!("User already exists: {}", email)));
        }

        let password_hash = password.map(hash_password).transpose()?;
        let user_id = new_id("user");
        let now = Utc::now();

        let conn = self.conn()?;
        conn.execute(
            r#"
            INSERT INTO users (user_id, email, name, password_hash, created_at)
            VALUES (?, ?, ?, ?, ?)
            "#,
            params![user_id, email, name, password_hash, format_timestamp(now)],
        )?;

        info!(user_id = %user_id, email = %email, "Created user");

        Ok(User {
            user_id,
            email,
            name: name.to_string(),
            picture: None,
            created_at: now,
        })
    }

    pub fn get_user(&self, user_id: &str) -> Result<Option<User>> {
        let conn = self.conn()?;
        let user = conn
            .query_row(
                "SELECT user_id, email, name, picture, created_at FROM users WHERE user_id = ?",
                params![user_id],
                row_to_user,
            )
            .optional()?;
        Ok(user)
    }

    pub fn get_user_by_email(&self, email: &str) -> Result<Option<User>> {
        let conn = self.conn()?;
        let user = conn
            .query_row(
                "SELECT user_id, email, name, picture, created_at FROM users WHERE email = ?",
                params![email.trim().to_lowercase()],
                row_to_user,
            )
            .optional()?;
        Ok(user)
    }

    pub fn list_users(&self) -> Result<Vec<User>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            "SELECT user_id, email, name, picture, created_at FROM users ORDER BY created_at",
        )?;
        let users = stmt
            .query_map([], row_to_user)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(users)
    }

    /// Check an email/password pair
    ///
    /// Unknown emails, accounts without a password and wrong passwords all
    /// return `None`.
    pub fn authenticate(&self, email: &str, password: &str) -> Result<Option<User>> {
        let conn = self.conn()?;
        let stored: Option<Option<String>> = conn
            .query_row(
                "SELECT password_hash FROM users WHERE email = ?",
                params![email.trim().to_lowercase()],
                |row| row.get(0),
            )
            .optional()?;

        match stored.flatten() {
            Some(hash) if verify_password(password, &hash) => self.get_user_by_email(email),
            _ => Ok(None),
        }
    }

    /// Open a new session for a user
    pub fn create_session(&self, user_id: &str) -> Result<Session> {
        let token = format!(
            "{}{}",
            uuid::Uuid::new_v4().simple(),
            uuid::Uuid::new_v4().simple()
        );
        let now = Utc::now();
        let expires_at = now + Duration::days(SESSION_TTL_DAYS);

        let conn = self.conn()?;
        conn.execute(
            r#"
            INSERT INTO sessions (session_token, user_id, expires_at, created_at)
            VALUES (?, ?, ?, ?)
            "#,
            params![
                token,
                user_id,
                format_timestamp(expires_at),
                format_timestamp(now)
            ],
        )?;

        debug!(user_id = %user_id, "Created session");

        Ok(Session {
            session_token: token,
            user_id: user_id.to_string(),
            expires_at,
            created_at: now,
        })
    }

    /// Resolve a session token to its user
    ///
    /// Expired sessions are deleted on sight and resolve to `None`.
    pub fn get_session_user(&self, token: &str, now: DateTime<Utc>) -> Result<Option<User>> {
        let conn = self.conn()?;
        let found: Option<(String, String)> = conn
            .query_row(
                "SELECT user_id, expires_at FROM sessions WHERE session_token = ?",
                params![token],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .optional()?;

        let Some((user_id, expires_at)) = found else {
            return Ok(None);
        };

        if parse_datetime(&expires_at) <= now {
            conn.execute(
                "DELETE FROM sessions WHERE session_token = ?",
                params![token],
            )?;
            debug!(user_id = %user_id, "Session expired");
            return Ok(None);
        }

        self.get_user(&user_id)
    }

    /// Delete a session; returns false if it did not exist
    pub fn delete_session(&self, token: &str) -> Result<bool> {
        let conn = self.conn()?;
        let deleted = conn.execute(
            "DELETE FROM sessions WHERE session_token = ?",
            params![token],
        )?;
        Ok(deleted > 0)
    }

    /// Remove every session that has expired by `now`
    pub fn purge_expired_sessions(&self, now: DateTime<Utc>) -> Result<usize> {
        let conn = self.conn()?;
        let deleted = conn.execute(
            "DELETE FROM sessions WHERE expires_at <= ?",
            params![format_timestamp(now)],
        )?;
        Ok(deleted)
    }

    /// Platform-wide counters
    pub fn admin_stats(&self, now: DateTime<Utc>) -> Result<AdminStats> {
        let conn = self.conn()?;

        let total_users: i64 = conn.query_row("SELECT COUNT(*) FROM users", [], |row| row.get(0))?;
        let (total_expenses, total_amount): (i64, f64) = conn.query_row(
            "SELECT COUNT(*), COALESCE(SUM(amount), 0.0) FROM expenses",
            [],
            |row| Ok((row.get(0)?, row.get(1)?)),
        )?;
        let active_sessions: i64 = conn.query_row(
            "SELECT COUNT(*) FROM sessions WHERE expires_at > ?",
            params![format_timestamp(now)],
            |row| row.get(0),
        )?;

        Ok(AdminStats {
            total_users,
            total_expenses,
            total_amount: crate::models::round_cents(total_amount),
            active_sessions,
        })
    }

    /// Every user with their expense count and total
    pub fn list_users_with_stats(&self) -> Result<Vec<UserWithStats>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            r#"
            SELECT u.user_id, u.email, u.name, u.created_at,
                   COUNT(e.expense_id), COALESCE(SUM(e.amount), 0.0)
            FROM users u
            LEFT JOIN expenses e ON e.user_id = u.user_id
            GROUP BY u.user_id
            ORDER BY u.created_at
            "#,
        )?;

        let users = stmt
            .query_map([], |row| {
                let created_at: String = row.get(3)?;
                let total: f64 = row.get(5)?;
                Ok(UserWithStats {
                    user_id: row.get(0)?,
                    email: row.get(1)?,
                    name: row.get(2)?,
                    created_at: parse_datetime(&created_at),
                    expense_count: row.get(4)?,
                    total_amount: crate::models::round_cents(total),
                })
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(users)
    }
}
