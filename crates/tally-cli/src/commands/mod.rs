//! CLI command implementations
//!
//! Commands are organized by domain:
//! - `core` - Database setup (init) and shared utilities (open_db)
//! - `users` - User provisioning
//! - `receipts` - Receipt scanning
//! - `reports` - Analytics summary and report files
//! - `serve` - Web server command

pub mod core;
pub mod receipts;
pub mod reports;
pub mod serve;
pub mod users;

// Re-export command functions for main.rs
pub use self::core::*;
pub use receipts::*;
pub use reports::*;
pub use serve::*;
pub use users::*;

use anyhow::{anyhow, Result};
use tally_core::db::Database;
use tally_core::models::User;

/// Truncate a string to a maximum length, adding "..." if truncated
pub fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let kept: String = s.chars().take(max.saturating_sub(3)).collect();
        format!("{}...", kept)
    }
}

/// Look up the user a command acts on behalf of
pub fn require_user(db: &Database, email: &str) -> Result<User> {
    db.get_user_by_email(email)?
        .ok_or_else(|| anyhow!("No user with email {}. Add one with 'tally users add'", email))
}
