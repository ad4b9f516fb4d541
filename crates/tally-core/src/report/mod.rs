//! Expense report rendering
//!
//! Both formats share the same header block (title, period, who generated
//! it) and the same total/count, taken from [`crate::analytics::summarize`].
//! Rows are written in the order given; callers sort by date first.
//!
//! Output is deterministic: identical input yields identical bytes.

mod pdf;
mod xlsx;

use std::fmt;
use std::str::FromStr;

use chrono::NaiveDate;
use num_format::{Locale, ToFormattedString};
use tracing::info;

use crate::analytics;
use crate::error::{Error, Result};
use crate::models::Expense;

pub const REPORT_TITLE: &str = "Expense Report";

/// Output format for a report
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReportFormat {
    Pdf,
    Excel,
}

impl ReportFormat {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pdf => "pdf",
            Self::Excel => "excel",
        }
    }

    pub fn extension(&self) -> &'static str {
        match self {
            Self::Pdf => "pdf",
            Self::Excel => "xlsx",
        }
    }

    pub fn content_type(&self) -> &'static str {
        match self {
            Self::Pdf => "application/pdf",
            Self::Excel => "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet",
        }
    }
}

impl FromStr for ReportFormat {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "pdf" => Ok(Self::Pdf),
            "excel" | "xlsx" => Ok(Self::Excel),
            other => Err(Error::InvalidData(format!(
                "Unknown report format '{}', expected pdf or excel",
                other
            ))),
        }
    }
}

impl fmt::Display for ReportFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A rendered report ready to be downloaded or written to disk
#[derive(Debug, Clone)]
pub struct ReportFile {
    pub bytes: Vec<u8>,
    pub content_type: &'static str,
    pub filename: String,
}

/// Everything above the table, shared by both renderers
pub(crate) struct ReportHeader<'a> {
    pub start: NaiveDate,
    pub end: NaiveDate,
    pub generated_by: &'a str,
    pub total: f64,
    pub count: usize,
}

impl ReportHeader<'_> {
    pub fn period(&self) -> String {
        format!("{} to {}", self.start, self.end)
    }
}

/// Render `expenses` as a report for the period `start..=end`
pub fn generate(
    expenses: &[Expense],
    start: NaiveDate,
    end: NaiveDate,
    generated_by: &str,
    format: ReportFormat,
) -> Result<ReportFile> {
    let summary = analytics::summarize(expenses);
    let header = ReportHeader {
        start,
        end,
        generated_by,
        total: summary.total_expenses,
        count: summary.expense_count,
    };

    let bytes = match format {
        ReportFormat::Pdf => pdf::render(&header, expenses)?,
        ReportFormat::Excel => xlsx::render(&header, expenses)?,
    };

    info!(
        format = format.as_str(),
        rows = expenses.len(),
        bytes = bytes.len(),
        "Report generated"
    );

    Ok(ReportFile {
        bytes,
        content_type: format.content_type(),
        filename: format!("expense_report_{}_{}.{}", start, end, format.extension()),
    })
}

/// Format a money value as `$1,234.50`
pub fn format_money(value: f64) -> String {
    let cents = (value.abs() * 100.0).round() as i64;
    let sign = if value < 0.0 && cents > 0 { "-" } else { "" };
    format!(
        "{}${}.{:02}",
        sign,
        (cents / 100).to_formatted_string(&Locale::en),
        cents % 100
    )
}
