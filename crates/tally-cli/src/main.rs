//! Tally CLI - Receipt scanning expense tracker
//!
//! Usage:
//!   tally init                                 Initialize database
//!   tally users add --email E --name N         Provision a user
//!   tally scan receipt.jpg                     Extract a draft from a receipt
//!   tally report --email E --from D --to D     Write a PDF or Excel report
//!   tally serve --port 8001                    Start web server

mod cli;
mod commands;


use anyhow::Result;
use clap::Parser;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use cli::*;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Priority: RUST_LOG env var > --verbose flag > default (info)
    let filter = if std::env::var("RUST_LOG").is_ok() {
        EnvFilter::from_default_env()
    } else if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_target(false).compact())
        .init();

    match cli.command {
        Commands::Init => commands::cmd_init(&cli.db, cli.no_encrypt),
        Commands::Users { action } => {
            let db = commands::open_db(&cli.db, cli.no_encrypt)?;
            match action {
                UsersAction::Add {
                    email,
                    name,
                    password,
                } => commands::cmd_users_add(&db, &email, &name, password.as_deref()),
                UsersAction::List => commands::cmd_users_list(&db),
            }
        }
        Commands::Serve {
            host,
            port,
            static_dir,
            cors_origin,
            insecure_cookies,
        } => {
            commands::cmd_serve(
                &cli.db,
                &host,
                port,
                cli.no_encrypt,
                static_dir.as_deref(),
                cors_origin,
                insecure_cookies,
            )
            .await
        }
        Commands::Scan { file } => {
            let scanner = commands::scanner_from_env()?;
            commands::cmd_scan(&scanner, &file).await.map(|_| ())
        }
        Commands::Summary { email, from, to } => {
            let db = commands::open_db(&cli.db, cli.no_encrypt)?;
            commands::cmd_summary(&db, &email, from, to).map(|_| ())
        }
        Commands::Report {
            email,
            from,
            to,
            format,
            category,
            output,
        } => {
            let db = commands::open_db(&cli.db, cli.no_encrypt)?;
            commands::cmd_report(
                &db,
                &email,
                from,
                to,
                &format,
                category,
                output.as_deref(),
            )
            .map(|_| ())
        }
    }
}
