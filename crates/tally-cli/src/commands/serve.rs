//! `tally serve`

use std::path::Path;

use anyhow::{anyhow, Result};
use tally_server::{ServerConfig, ADMIN_EMAILS_ENV};

use super::open_db;

pub async fn cmd_serve(
    db_path: &Path,
    host: &str,
    port: u16,
    no_encrypt: bool,
    static_dir: Option<&Path>,
    cors_origins: Vec<String>,
    insecure_cookies: bool,
) -> Result<()> {
    let config = ServerConfig {
        allowed_origins: cors_origins,
        secure_cookies: !insecure_cookies,
        ..Default::default()
    }
    .with_admin_emails_from_env();

    let static_dir = static_dir
        .map(|dir| {
            dir.to_str()
                .ok_or_else(|| anyhow!("Static directory is not valid UTF-8: {}", dir.display()))
        })
        .transpose()?;

    println!("🚀 Tally on http://{}:{}", host, port);
    println!("   database:  {}", db_path.display());
    if let Some(dir) = static_dir {
        println!("   static:    {}", dir);
    }
    if !config.allowed_origins.is_empty() {
        println!("   cors:      {}", config.allowed_origins.join(", "));
    }
    match config.admin_emails.as_slice() {
        [] => println!("   admins:    none ({} is empty)", ADMIN_EMAILS_ENV),
        admins => println!("   admins:    {}", admins.join(", ")),
    }
    if insecure_cookies {
        println!("   ⚠️  cookies are not Secure; keep this on localhost");
    }
    if no_encrypt {
        println!("   ⚠️  database encryption is OFF");
    }

    let db = open_db(db_path, no_encrypt)?;
    tally_server::serve_with_config(db, host, port, static_dir, config).await
}
