//! Analytics summary and report file commands

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::NaiveDate;
use tally_core::db::Database;
use tally_core::models::Summary;
use tally_core::report::{self, ReportFormat};
use tally_core::summarize;

use super::{require_user, truncate};

pub fn cmd_summary(
    db: &Database,
    email: &str,
    from: Option<NaiveDate>,
    to: Option<NaiveDate>,
) -> Result<Summary> {
    let user = require_user(db, email)?;
    let expenses = db.expenses_in_range(&user.user_id, from, to, None)?;
    let summary = summarize(&expenses);

    let period = match (from, to) {
        (None, None) => "all time".to_string(),
        (from, to) => format!(
            "{} to {}",
            from.map(|d| d.to_string()).unwrap_or_else(|| "start".into()),
            to.map(|d| d.to_string()).unwrap_or_else(|| "today".into())
        ),
    };

    println!();
    println!("📊 Expense Summary for {} ({})", user.name, period);
    println!("{}", "─".repeat(50));
    println!("  Total:     {}", report::format_money(summary.total_expenses));
    println!("  Receipts:  {}", summary.expense_count);
    println!("  Average:   {}", report::format_money(summary.average_expense));

    if !summary.category_breakdown.is_empty() {
        println!();
        println!("  By category:");
        for c in &summary.category_breakdown {
            println!(
                "    {:<28} {:>12} {:>6.1}%",
                truncate(&c.category, 28),
                report::format_money(c.amount),
                c.percentage
            );
        }
    }

    if !summary.top_vendors.is_empty() {
        println!();
        println!("  Top vendors:");
        for v in &summary.top_vendors {
            println!(
                "    {:<28} {:>12}",
                truncate(&v.vendor, 28),
                report::format_money(v.amount)
            );
        }
    }

    if !summary.monthly_trend.is_empty() {
        println!();
        println!("  By month:");
        for m in &summary.monthly_trend {
            println!("    {:<28} {:>12}", m.month, report::format_money(m.amount));
        }
    }
    println!();

    Ok(summary)
}

/// Render a report and write it to `output` (or the report's file name)
pub fn cmd_report(
    db: &Database,
    email: &str,
    from: NaiveDate,
    to: NaiveDate,
    format: &str,
    categories: Vec<String>,
    output: Option<&Path>,
) -> Result<PathBuf> {
    let format: ReportFormat = format.parse()?;
    if from > to {
        anyhow::bail!("--from must not be after --to");
    }

    let user = require_user(db, email)?;
    let categories = (!categories.is_empty()).then_some(categories);
    let expenses = db.expenses_in_range(&user.user_id, Some(from), Some(to), categories)?;

    let file = report::generate(&expenses, from, to, &user.name, format)
        .context("Failed to generate report")?;

    let path = output
        .map(Path::to_path_buf)
        .unwrap_or_else(|| PathBuf::from(&file.filename));
    std::fs::write(&path, &file.bytes)
        .with_context(|| format!("Failed to write {}", path.display()))?;

    db.log_audit(
        &user.email,
        "report",
        Some("report"),
        None,
        Some(&format!("format={}, source=cli", format)),
    )?;

    println!(
        "✅ Wrote {} report with {} expense(s) to {}",
        format,
        expenses.len(),
        path.display()
    );

    Ok(path)
}
