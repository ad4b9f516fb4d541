//! CLI argument definitions using clap
//!
//! This module contains all the clap structs and enums for parsing CLI arguments.
//! The actual command implementations are in the `commands` module.

use std::path::PathBuf;

use chrono::NaiveDate;
use clap::{Parser, Subcommand};

/// Tally - Turn receipt photos into a reviewed expense ledger
#[derive(Parser)]
#[command(name = "tally")]
#[command(about = "Self-hosted receipt scanning expense tracker", long_about = None)]
#[command(version)]
pub struct Cli {
    /// Database path
    #[arg(long, default_value = "tally.db", env = "TALLY_DB_PATH", global = true)]
    pub db: PathBuf,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Disable database encryption (not recommended for production)
    ///
    /// By default, the database is encrypted using SQLCipher.
    /// Set TALLY_DB_KEY environment variable with your passphrase.
    /// Use --no-encrypt only for development or testing.
    #[arg(long, global = true)]
    pub no_encrypt: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Initialize the database
    Init,

    /// Manage users
    Users {
        #[command(subcommand)]
        action: UsersAction,
    },

    /// Start the web server
    Serve {
        /// Host to bind to
        #[arg(long, default_value = "127.0.0.1")]
        host: String,

        /// Port to listen on
        #[arg(short, long, default_value = "8001")]
        port: u16,

        /// Directory containing static files to serve (e.g., ui/dist)
        #[arg(long)]
        static_dir: Option<PathBuf>,

        /// Allowed CORS origin (repeatable)
        ///
        /// Needed when the UI is served from a different origin than the API.
        #[arg(long)]
        cors_origin: Vec<String>,

        /// Send the session cookie without the Secure attribute
        ///
        /// WARNING: for local http development only.
        #[arg(long)]
        insecure_cookies: bool,
    },

    /// Extract a draft expense from a receipt image or PDF
    ///
    /// Prints the draft as JSON. Nothing is saved.
    Scan {
        /// Receipt file (PNG, JPEG, WEBP or PDF)
        file: PathBuf,
    },

    /// Show the analytics summary for a user
    Summary {
        /// User email
        #[arg(long)]
        email: String,

        /// Start date (YYYY-MM-DD)
        #[arg(long)]
        from: Option<NaiveDate>,

        /// End date (YYYY-MM-DD)
        #[arg(long)]
        to: Option<NaiveDate>,
    },

    /// Write an expense report file
    Report {
        /// User email
        #[arg(long)]
        email: String,

        /// Start date (YYYY-MM-DD)
        #[arg(long)]
        from: NaiveDate,

        /// End date (YYYY-MM-DD)
        #[arg(long)]
        to: NaiveDate,

        /// Output format: pdf, excel
        #[arg(short, long, default_value = "pdf")]
        format: String,

        /// Only include these categories (repeatable)
        #[arg(long)]
        category: Vec<String>,

        /// Output path (defaults to the report's own file name)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

#[derive(Subcommand)]
pub enum UsersAction {
    /// Create a user who can log in to the web UI
    Add {
        #[arg(long)]
        email: String,

        #[arg(long)]
        name: String,

        /// Login password (omit to create a user without password login)
        #[arg(long, env = "TALLY_USER_PASSWORD", hide_env_values = true)]
        password: Option<String>,
    },

    /// List users
    List,
}
