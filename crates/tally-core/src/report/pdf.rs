//! PDF rendering with printpdf's builtin Helvetica
//!
//! US Letter, one table of Date / Vendor / Category / Amount. When a row
//! would cross the bottom margin a new page starts and the table header row
//! is drawn again; the title block appears on the first page only.

use printpdf::path::PaintMode;
use printpdf::{
    BuiltinFont, Color, CustomPdfConformance, IndirectFontRef, Line, Mm, OffsetDateTime,
    PdfConformance, PdfDocument, PdfLayerReference, Point, Rect, Rgb,
};

use super::{format_money, ReportHeader, REPORT_TITLE};
use crate::error::{Error, Result};
use crate::models::Expense;

const PAGE_WIDTH: f32 = 215.9;
const PAGE_HEIGHT: f32 = 279.4;
const INCH: f32 = 25.4;
const TOP: f32 = PAGE_HEIGHT - INCH;
const BOTTOM: f32 = INCH;
const ROW_HEIGHT: f32 = 0.3 * INCH;
const CELL_PADDING: f32 = 2.0;
const TEXT_SIZE: f32 = 10.0;

/// Column widths in inches: Date, Vendor, Category, Amount
const COLUMNS: [f32; 4] = [1.2, 2.5, 1.8, 1.2];
const HEADERS: [&str; 4] = ["Date", "Vendor", "Category", "Amount"];
const VENDOR_CHARS: usize = 30;

const HEADER_FILL: (u8, u8, u8) = (0x1A, 0x3C, 0x34);
const STRIPE_FILL: (u8, u8, u8) = (0xF9, 0xF9, 0xF7);
const GRID: (u8, u8, u8) = (0xE5, 0xE7, 0xEB);

/// Document id, also written over the random strings printpdf puts in
/// the trailer `/ID`
const TRAILER_ID: &[u8] = b"tallyexpensereportdocument000001";

fn rgb((r, g, b): (u8, u8, u8)) -> Color {
    Color::Rgb(Rgb::new(
        r as f32 / 255.0,
        g as f32 / 255.0,
        b as f32 / 255.0,
        None,
    ))
}

fn table_width() -> f32 {
    COLUMNS.iter().sum::<f32>() * INCH
}

fn table_left() -> f32 {
    (PAGE_WIDTH - table_width()) / 2.0
}

/// Helvetica advance width in mm, good enough to right-align amounts
fn text_width(text: &str, size: f32) -> f32 {
    let units: u32 = text
        .chars()
        .map(|c| match c {
            ',' | '.' | ' ' => 278,
            '-' => 333,
            _ => 556,
        })
        .sum();
    units as f32 / 1000.0 * size * 0.352_778
}

fn truncate(text: &str, max: usize) -> String {
    if text.chars().count() <= max {
        text.to_string()
    } else {
        let mut cut: String = text.chars().take(max.saturating_sub(3)).collect();
        cut.push_str("...");
        cut
    }
}

/// Draws rows top-down, adding pages as needed
struct TableWriter<'a> {
    doc: &'a printpdf::PdfDocumentReference,
    layer: PdfLayerReference,
    regular: IndirectFontRef,
    bold: IndirectFontRef,
    y: f32,
    pages: usize,
}

impl TableWriter<'_> {
    fn text(&self, text: &str, size: f32, x: f32, y: f32, bold: bool) {
        let font = if bold { &self.bold } else { &self.regular };
        self.layer.use_text(text, size, Mm(x), Mm(y), font);
    }

    fn new_page(&mut self) {
        let (page, layer) = self.doc.add_page(Mm(PAGE_WIDTH), Mm(PAGE_HEIGHT), "Layer 1");
        self.layer = self.doc.get_page(page).get_layer(layer);
        self.y = TOP;
        self.pages += 1;
        self.header_row();
    }

    fn ensure_room(&mut self) {
        if self.y - ROW_HEIGHT < BOTTOM {
            self.new_page();
        }
    }

    fn row(&mut self, cells: [&str; 4], fill: Option<(u8, u8, u8)>, header: bool) {
        let left = table_left();
        let bottom = self.y - ROW_HEIGHT;

        if let Some(fill) = fill {
            self.layer.set_fill_color(rgb(fill));
            self.layer.add_rect(
                Rect::new(Mm(left), Mm(bottom), Mm(left + table_width()), Mm(self.y))
                    .with_mode(PaintMode::Fill),
            );
        }

        self.layer.set_outline_color(rgb(GRID));
        self.layer.set_outline_thickness(0.5);
        self.layer.set_fill_color(if header {
            rgb((0xFF, 0xFF, 0xFF))
        } else {
            rgb((0, 0, 0))
        });

        let baseline = bottom + (ROW_HEIGHT - TEXT_SIZE * 0.352_778) / 2.0 + 0.5;
        let mut x = left;
        for (i, (cell, width)) in cells.iter().zip(COLUMNS).enumerate() {
            let width = width * INCH;
            self.layer.add_line(Line {
                points: vec![
                    (Point::new(Mm(x), Mm(bottom)), false),
                    (Point::new(Mm(x + width), Mm(bottom)), false),
                    (Point::new(Mm(x + width), Mm(self.y)), false),
                    (Point::new(Mm(x), Mm(self.y)), false),
                ],
                is_closed: true,
            });

            // Amount column is right-aligned
            let text_x = if i == 3 {
                x + width - CELL_PADDING - text_width(cell, TEXT_SIZE)
            } else {
                x + CELL_PADDING
            };
            self.text(cell, TEXT_SIZE, text_x, baseline, header);
            x += width;
        }

        self.y = bottom;
    }

    fn header_row(&mut self) {
        self.row(HEADERS, Some(HEADER_FILL), true);
    }
}

pub(super) fn render(header: &ReportHeader<'_>, expenses: &[Expense]) -> Result<Vec<u8>> {
    let fixed_date = header
        .end
        .and_hms_opt(0, 0, 0)
        .map(|dt| dt.and_utc().timestamp())
        .and_then(|ts| OffsetDateTime::from_unix_timestamp(ts).ok())
        .ok_or_else(|| Error::Report(format!("Invalid report end date {}", header.end)))?;

    let (doc, page, layer) =
        PdfDocument::new(REPORT_TITLE, Mm(PAGE_WIDTH), Mm(PAGE_HEIGHT), "Layer 1");
    let doc = doc
        .with_document_id(String::from_utf8_lossy(TRAILER_ID).into_owned())
        .with_creation_date(fixed_date)
        .with_mod_date(fixed_date)
        .with_metadata_date(fixed_date)
        .with_conformance(PdfConformance::Custom(CustomPdfConformance {
            requires_xmp_metadata: false,
            requires_icc_profile: false,
            ..Default::default()
        }));

    let regular = doc
        .add_builtin_font(BuiltinFont::Helvetica)
        .map_err(|e| Error::Report(e.to_string()))?;
    let bold = doc
        .add_builtin_font(BuiltinFont::HelveticaBold)
        .map_err(|e| Error::Report(e.to_string()))?;

    let mut table = TableWriter {
        doc: &doc,
        layer: doc.get_page(page).get_layer(layer),
        regular,
        bold,
        y: TOP,
        pages: 1,
    };

    // Title block
    let left = table_left();
    table.layer.set_fill_color(rgb(HEADER_FILL));
    table.text(REPORT_TITLE, 20.0, left, table.y - 7.0, true);
    table.y -= 16.0;

    table.layer.set_fill_color(rgb((0, 0, 0)));
    for line in &title_lines(header) {
        table.text(line, 11.0, left, table.y - 4.0, false);
        table.y -= 6.5;
    }
    table.y -= 6.0;

    table.header_row();
    let rows = table_rows(expenses);
    for (i, cells) in rows.iter().enumerate() {
        table.ensure_room();
        let fill = if i % 2 == 1 { Some(STRIPE_FILL) } else { None };
        let [date, vendor, category, amount] = cells;
        table.row(
            [date.as_str(), vendor.as_str(), category.as_str(), amount.as_str()],
            fill,
            false,
        );
    }

    let pages = table.pages;
    drop(table);

    let mut bytes = doc
        .save_to_bytes()
        .map_err(|e| Error::Report(e.to_string()))?;
    pin_trailer_id(&mut bytes);

    tracing::debug!(pages, rows = expenses.len(), "PDF report rendered");
    Ok(bytes)
}

/// Lines printed under the title on the first page
fn title_lines(header: &ReportHeader<'_>) -> [String; 4] {
    [
        format!("Period: {}", header.period()),
        format!("Generated by: {}", header.generated_by),
        format!("Total Expenses: {}", format_money(header.total)),
        format!("Number of Receipts: {}", header.count),
    ]
}

/// Cells for each table row, in input order
fn table_rows(expenses: &[Expense]) -> Vec<[String; 4]> {
    expenses
        .iter()
        .map(|expense| {
            [
                expense.date.to_string(),
                truncate(&expense.vendor, VENDOR_CHARS),
                expense.category.clone(),
                format_money(expense.amount),
            ]
        })
        .collect()
}

/// Overwrite both strings of the trailer `/ID [(..)(..)]` array in place
///
/// Lengths are kept so the xref offsets stay valid.
fn pin_trailer_id(bytes: &mut [u8]) {
    let Some(mut pos) = rfind(bytes, b"/ID") else {
        return;
    };
    pos += 3;
    pos = skip_spaces(bytes, pos);
    if bytes.get(pos) != Some(&b'[') {
        return;
    }
    pos += 1;

    for _ in 0..2 {
        pos = skip_spaces(bytes, pos);
        if bytes.get(pos) != Some(&b'(') {
            return;
        }
        let start = pos + 1;
        let Some(len) = bytes[start..].iter().position(|b| *b == b')') else {
            return;
        };
        for (i, b) in bytes[start..start + len].iter_mut().enumerate() {
            *b = TRAILER_ID[i % TRAILER_ID.len()];
        }
        pos = start + len + 1;
    }
}

fn skip_spaces(bytes: &[u8], mut pos: usize) -> usize {
    while bytes.get(pos).is_some_and(u8::is_ascii_whitespace) {
        pos += 1;
    }
    pos
}

fn rfind(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack
        .windows(needle.len())
        .rposition(|window| window == needle)
}
