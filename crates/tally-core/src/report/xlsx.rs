//! Spreadsheet rendering with rust_xlsxwriter

use chrono::Datelike;
use rust_xlsxwriter::{
    Color, DocProperties, ExcelDateTime, Format, FormatAlign, FormatBorder, Workbook, XlsxError,
};

use super::{format_money, ReportHeader, REPORT_TITLE};
use crate::error::{Error, Result};
use crate::models::Expense;

const HEADERS: [&str; 8] = [
    "Date",
    "Vendor",
    "Category",
    "Amount",
    "Payment Method",
    "Receipt #",
    "Notes",
    "Tags",
];
const WIDTHS: [f64; 8] = [12.0, 25.0, 20.0, 12.0, 15.0, 15.0, 30.0, 20.0];
const MONEY: &str = "$#,##0.00";

const CATEGORY_COL: u16 = 2;
const AMOUNT_COL: u16 = 3;

impl From<XlsxError> for Error {
    fn from(err: XlsxError) -> Self {
        Error::Report(err.to_string())
    }
}

pub(super) fn render(header: &ReportHeader<'_>, expenses: &[Expense]) -> Result<Vec<u8>> {
    let mut workbook = Workbook::new();

    let created = ExcelDateTime::from_ymd(
        header.end.year() as u16,
        header.end.month() as u8,
        header.end.day() as u8,
    )?
    .and_hms(0, 0, 0)?;
    workbook.set_properties(
        &DocProperties::new()
            .set_title(REPORT_TITLE)
            .set_author(header.generated_by)
            .set_creation_datetime(&created),
    );

    let header_format = Format::new()
        .set_bold()
        .set_font_color(Color::White)
        .set_background_color(Color::RGB(0x1A3C34))
        .set_border(FormatBorder::Thin);
    let money = Format::new().set_num_format(MONEY);
    let total_label = Format::new().set_bold().set_align(FormatAlign::Right);
    let total_money = Format::new().set_bold().set_num_format(MONEY);
    let bold = Format::new().set_bold();

    let sheet = workbook.add_worksheet();
    sheet.set_name("Expenses")?;

    for (col, (title, width)) in HEADERS.iter().zip(WIDTHS).enumerate() {
        let col = col as u16;
        sheet.write_string_with_format(0, col, *title, &header_format)?;
        sheet.set_column_width(col, width)?;
    }

    let mut row = 1u32;
    for expense in expenses {
        sheet.write_string(row, 0, expense.date.to_string())?;
        sheet.write_string(row, 1, &expense.vendor)?;
        sheet.write_string(row, CATEGORY_COL, &expense.category)?;
        sheet.write_number_with_format(row, AMOUNT_COL, expense.amount, &money)?;
        sheet.write_string(row, 4, expense.payment_method.as_deref().unwrap_or(""))?;
        sheet.write_string(row, 5, expense.receipt_number.as_deref().unwrap_or(""))?;
        sheet.write_string(row, 6, expense.notes.as_deref().unwrap_or(""))?;
        sheet.write_string(row, 7, expense.tags.join(", "))?;
        row += 1;
    }

    // Blank row, then the total
    row += 1;
    sheet.write_string_with_format(row, CATEGORY_COL, "TOTAL:", &total_label)?;
    sheet.write_number_with_format(row, AMOUNT_COL, header.total, &total_money)?;

    let summary = workbook.add_worksheet();
    summary.set_name("Summary")?;
    summary.set_column_width(0, 22)?;
    summary.set_column_width(1, 30)?;
    summary.write_string_with_format(0, 0, REPORT_TITLE, &bold)?;
    let rows = [
        ("Period", header.period()),
        ("Generated by", header.generated_by.to_string()),
        ("Total Expenses", format_money(header.total)),
        ("Number of Receipts", header.count.to_string()),
    ];
    for (i, (label, value)) in rows.iter().enumerate() {
        let r = i as u32 + 2;
        summary.write_string_with_format(r, 0, *label, &bold)?;
        summary.write_string(r, 1, value)?;
    }

    let bytes = workbook.save_to_buffer()?;
    tracing::debug!(rows = expenses.len(), "Spreadsheet report rendered");
    Ok(bytes)
}
