//! Receipt scanning command

use std::path::Path;

use anyhow::{anyhow, Context, Result};
use chrono::Local;
use tally_core::ai::{AIBackend, AIClient};
use tally_core::models::{ExtractionDraft, ReviewLevel};
use tally_core::Scanner;

/// Build a scanner from AI_BACKEND / ANTHROPIC_* settings
pub fn scanner_from_env() -> Result<Scanner> {
    let ai = AIClient::from_env();
    match &ai {
        Some(client) => println!("🤖 AI backend: {} ({})", client.host(), client.model()),
        None => println!("💡 Tip: Set ANTHROPIC_API_KEY (or AI_BACKEND=mock) to enable scanning"),
    }
    Scanner::new(ai).context("Failed to set up receipt scanner")
}

/// Scan a receipt file and print the draft as JSON
pub async fn cmd_scan(scanner: &Scanner, file: &Path) -> Result<ExtractionDraft> {
    if !file.exists() {
        return Err(anyhow!("File not found: {}", file.display()));
    }
    let upload = std::fs::read(file).context("Failed to read receipt file")?;

    println!("🔍 Scanning {}...", file.display());

    let draft = scanner
        .scan(&upload, Local::now().date_naive())
        .await
        .map_err(|e| {
            let message = e.user_message();
            anyhow::Error::new(e).context(message)
        })?;

    println!("{}", serde_json::to_string_pretty(&draft)?);
    println!();

    match draft.review {
        ReviewLevel::Ok => println!("✅ Confidence {:.0}%", draft.confidence_score * 100.0),
        ReviewLevel::ReviewCarefully => println!(
            "⚠️  Confidence {:.0}% - review the fields carefully",
            draft.confidence_score * 100.0
        ),
        ReviewLevel::LowConfidence => println!(
            "❗ Confidence {:.0}% - low confidence, check every field",
            draft.confidence_score * 100.0
        ),
    }
    if !draft.defaulted_fields.is_empty() {
        println!("   Defaulted: {}", draft.defaulted_fields.join(", "));
    }

    Ok(draft)
}
