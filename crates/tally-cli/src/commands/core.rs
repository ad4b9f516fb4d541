//! Database setup shared by every command

use std::path::Path;

use anyhow::{anyhow, Context, Result};
use tally_core::db::{Database, DB_KEY_ENV};

/// Open the store, keyed from the environment unless `--no-encrypt` was given
pub fn open_db(db_path: &Path, no_encrypt: bool) -> Result<Database> {
    let path = db_path
        .to_str()
        .ok_or_else(|| anyhow!("Database path is not valid UTF-8: {}", db_path.display()))?;

    let opened = if no_encrypt {
        Database::new_unencrypted(path)
    } else {
        Database::new(path)
    };
    opened.with_context(|| format!("Could not open database at {}", db_path.display()))
}

pub fn cmd_init(db_path: &Path, no_encrypt: bool) -> Result<()> {
    // Opening creates the schema
    let db = open_db(db_path, no_encrypt)?;
    let user_count = db.list_users().context("Failed to read users")?.len();

    println!("Database ready: {}", db.path());
    if db.is_encrypted() {
        println!("  encryption: on (key from {})", DB_KEY_ENV);
    } else {
        println!("  encryption: OFF (--no-encrypt, development only)");
    }
    println!("  users:      {}", user_count);

    if user_count == 0 {
        println!();
        println!("Add someone with: tally users add --email you@example.com --name You");
    }

    Ok(())
}
