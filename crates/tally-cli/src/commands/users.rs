//! User provisioning commands

use anyhow::{Context, Result};
use tally_core::db::Database;

use super::truncate;

pub fn cmd_users_add(db: &Database, email: &str, name: &str, password: Option<&str>) -> Result<()> {
    let user = db
        .create_user(email, name, password)
        .with_context(|| format!("Failed to create user {}", email))?;
    db.log_audit("cli", "create", Some("user"), Some(&user.user_id), Some(&user.email))?;

    println!("✅ Created user {} ({})", user.email, user.user_id);
    if password.is_none() {
        println!("   ⚠️  No password set - this user cannot log in to the web UI");
    }
    Ok(())
}

pub fn cmd_users_list(db: &Database) -> Result<()> {
    let users = db.list_users_with_stats()?;

    if users.is_empty() {
        println!("No users. Add one with 'tally users add'");
        return Ok(());
    }

    println!();
    println!(
        "{:<32} {:<20} {:>8} {:>12}  {}",
        "Email", "Name", "Expenses", "Total", "Created"
    );
    println!("{}", "─".repeat(90));
    for user in &users {
        println!(
            "{:<32} {:<20} {:>8} {:>12.2}  {}",
            truncate(&user.email, 32),
            truncate(&user.name, 20),
            user.expense_count,
            user.total_amount,
            user.created_at.format("%Y-%m-%d")
        );
    }
    println!();

    Ok(())
}
