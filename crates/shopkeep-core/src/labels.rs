//! # Labels Module
//!
//! Price label sheets rendered as PDF.
//!
//! ## Sheet Layout
//! ```text
//! ┌──────────────────────────── A4 (595 × 842 pt) ───────────────────────────┐
//! │ margin                                                                    │
//! │   ┌───────────┐ gap ┌───────────┐ gap ┌───────────┐                       │
//! │   │ Store     │     │           │     │           │                       │
//! │   │ Name...   │     │           │     │           │   columns × rows      │
//! │   │ R$ 12,90  │     │           │     │           │   labels per page     │
//! │   │ SKU-123   │     │           │     │           │                       │
//! │   └───────────┘     └───────────┘     └───────────┘                       │
//! │        ⋮                                                                  │
//! └───────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! The PDF writer is deliberately small: PDF 1.4, the two standard Helvetica
//! fonts with WinAnsi encoding, uncompressed content streams. No font
//! embedding is needed because standard fonts are built into every viewer.

use std::fmt::Write as _;

use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::error::{CoreError, CoreResult, ValidationError};
use crate::money::{CurrencyFormat, Money};

/// A4 portrait in points.
pub const PAGE_WIDTH_PT: f64 = 595.28;
pub const PAGE_HEIGHT_PT: f64 = 841.89;

/// Upper bound on labels per document.
pub const MAX_LABELS: u32 = 2000;

const MM_TO_PT: f64 = 72.0 / 25.4;
const MIN_CELL_PT: f64 = 40.0;

// =============================================================================
// Layout
// =============================================================================

/// Grid of labels on an A4 sheet.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct LabelLayout {
    pub columns: u32,
    pub rows: u32,
    /// Page margin on every side, in millimetres.
    pub margin_mm: f64,
    /// Space between labels, in millimetres.
    pub gap_mm: f64,
    /// Print the store name at the top of each label.
    pub show_store_name: bool,
    /// Draw a thin cut border around each label.
    pub show_border: bool,
}

impl Default for LabelLayout {
    fn default() -> Self {
        LabelLayout {
            columns: 3,
            rows: 8,
            margin_mm: 10.0,
            gap_mm: 2.0,
            show_store_name: true,
            show_border: true,
        }
    }
}

/// Position of one label cell in PDF coordinates (origin bottom-left).
#[derive(Debug, Clone, Copy, PartialEq)]
struct Cell {
    x: f64,
    y: f64,
    width: f64,
    height: f64,
}

impl LabelLayout {
    pub fn per_page(&self) -> u32 {
        self.columns * self.rows
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        if !(1..=8).contains(&self.columns) {
            return Err(ValidationError::OutOfRange {
                field: "label.columns".to_string(),
                min: 1,
                max: 8,
            });
        }
        if !(1..=20).contains(&self.rows) {
            return Err(ValidationError::OutOfRange {
                field: "label.rows".to_string(),
                min: 1,
                max: 20,
            });
        }
        if !(0.0..=30.0).contains(&self.margin_mm) || !(0.0..=10.0).contains(&self.gap_mm) {
            return Err(ValidationError::invalid_format(
                "label.margin_mm",
                "margin must be 0-30 mm and gap 0-10 mm",
            ));
        }
        let (width, height) = self.cell_size();
        if width < MIN_CELL_PT || height < MIN_CELL_PT {
            return Err(ValidationError::invalid_format(
                "label.layout",
                "labels would be too small to print",
            ));
        }
        Ok(())
    }

    fn cell_size(&self) -> (f64, f64) {
        let margin = self.margin_mm * MM_TO_PT;
        let gap = self.gap_mm * MM_TO_PT;
        let cols = f64::from(self.columns);
        let rows = f64::from(self.rows);
        (
            (PAGE_WIDTH_PT - 2.0 * margin - (cols - 1.0) * gap) / cols,
            (PAGE_HEIGHT_PT - 2.0 * margin - (rows - 1.0) * gap) / rows,
        )
    }

    /// Cell for the `slot`-th label of a page, filling rows left to right.
    fn cell(&self, slot: u32) -> Cell {
        let margin = self.margin_mm * MM_TO_PT;
        let gap = self.gap_mm * MM_TO_PT;
        let (width, height) = self.cell_size();
        let col = f64::from(slot % self.columns);
        let row = f64::from(slot / self.columns);
        Cell {
            x: margin + col * (width + gap),
            y: PAGE_HEIGHT_PT - margin - (row + 1.0) * height - row * gap,
            width,
            height,
        }
    }
}

// =============================================================================
// Label Content
// =============================================================================

/// One product to print, `copies` times.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct LabelItem {
    pub name: String,
    pub price: Money,
    /// Barcode when present, otherwise SKU.
    pub code: String,
    pub unit: String,
    pub copies: u32,
}

/// Renders a label sheet.
///
/// ## Errors
/// - no labels requested
/// - more than `MAX_LABELS` copies in total
/// - invalid layout
pub fn render_labels(
    layout: &LabelLayout,
    items: &[LabelItem],
    currency: &CurrencyFormat,
    store_name: Option<&str>,
) -> CoreResult<Vec<u8>> {
    layout.validate()?;

    let total: u64 = items.iter().map(|i| u64::from(i.copies)).sum();
    if total == 0 {
        return Err(CoreError::Validation(ValidationError::required("labels")));
    }
    if total > u64::from(MAX_LABELS) {
        return Err(CoreError::Validation(ValidationError::OutOfRange {
            field: "copies".to_string(),
            min: 1,
            max: i64::from(MAX_LABELS),
        }));
    }

    let header = if layout.show_store_name { store_name } else { None };
    let labels: Vec<&LabelItem> = items
        .iter()
        .flat_map(|item| std::iter::repeat(item).take(item.copies as usize))
        .collect();

    let pages: Vec<String> = labels
        .chunks(layout.per_page() as usize)
        .map(|page| {
            let mut content = String::new();
            for (slot, item) in page.iter().enumerate() {
                draw_label(&mut content, layout, layout.cell(slot as u32), item, currency, header);
            }
            content
        })
        .collect();

    Ok(write_pdf(&pages))
}

/// Appends the drawing operators for one label.
fn draw_label(
    out: &mut String,
    layout: &LabelLayout,
    cell: Cell,
    item: &LabelItem,
    currency: &CurrencyFormat,
    store_name: Option<&str>,
) {
    const PAD: f64 = 5.0;
    let text_width = cell.width - 2.0 * PAD;
    let x = cell.x + PAD;
    let mut baseline = cell.y + cell.height - PAD;

    if layout.show_border {
        let _ = writeln!(
            out,
            "q 0.6 G 0.4 w {:.2} {:.2} {:.2} {:.2} re S Q",
            cell.x, cell.y, cell.width, cell.height
        );
    }

    if let Some(store) = store_name {
        baseline -= 6.0;
        text(out, Font::Regular, 6.0, x, baseline, &fit(store, 6.0, text_width));
    }

    let name_size = (cell.height / 6.0).clamp(7.0, 11.0);
    baseline -= name_size + 1.0;
    text(out, Font::Bold, name_size, x, baseline, &fit(&item.name, name_size, text_width));

    let price_size = (cell.height / 3.5).clamp(10.0, 22.0);
    let price = format!("{} /{}", currency.format(item.price), item.unit);
    baseline -= price_size + 2.0;
    text(out, Font::Bold, price_size, x, baseline, &fit(&price, price_size, text_width));

    text(out, Font::Regular, 7.0, x, cell.y + PAD, &fit(&item.code, 7.0, text_width));
}

// =============================================================================
// PDF Writer
// =============================================================================

#[derive(Debug, Clone, Copy)]
enum Font {
    Regular,
    Bold,
}

impl Font {
    fn resource(&self) -> &'static str {
        match self {
            Font::Regular => "F1",
            Font::Bold => "F2",
        }
    }
}

fn text(out: &mut String, font: Font, size: f64, x: f64, y: f64, value: &str) {
    let _ = writeln!(
        out,
        "BT /{} {:.1} Tf {:.2} {:.2} Td ({}) Tj ET",
        font.resource(),
        size,
        x,
        y,
        escape(value)
    );
}

/// Truncates `value` with "..." so that it fits `width` points at `size`.
///
/// Uses an average Helvetica advance of 0.55 em; close enough for labels.
pub fn fit(value: &str, size: f64, width: f64) -> String {
    let max_chars = (width / (size * 0.55)).floor().max(0.0) as usize;
    let chars: Vec<char> = value.trim().chars().collect();
    if chars.len() <= max_chars {
        return chars.into_iter().collect();
    }
    if max_chars <= 3 {
        return ".".repeat(max_chars);
    }
    let mut truncated: String = chars[..max_chars - 3].iter().collect::<String>().trim_end().to_string();
    truncated.push_str("...");
    truncated
}

/// Escapes a string for a PDF literal and maps it to WinAnsi.
///
/// Characters outside WinAnsi become `?`.
pub fn escape(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for ch in value.chars() {
        match ch {
            '\\' | '(' | ')' => {
                out.push('\\');
                out.push(ch);
            }
            ' '..='~' => out.push(ch),
            '€' => out.push_str("\\200"),
            '\u{a0}'..='\u{ff}' => {
                let _ = write!(out, "\\{:03o}", ch as u32);
            }
            _ => out.push('?'),
        }
    }
    out
}

/// Serializes pages of content streams into a complete PDF document.
///
/// Object layout: 1 catalog, 2 page tree, 3-4 fonts, then a page object and
/// its content stream for every page.
fn write_pdf(pages: &[String]) -> Vec<u8> {
    let page_count = pages.len();
    let object_count = 4 + 2 * page_count;
    let mut buf: Vec<u8> = Vec::new();
    let mut offsets: Vec<usize> = Vec::with_capacity(object_count);

    buf.extend_from_slice(b"%PDF-1.4\n%\xe2\xe3\xcf\xd3\n");

    let kids: Vec<String> = (0..page_count).map(|i| format!("{} 0 R", 5 + 2 * i)).collect();

    let mut objects: Vec<Vec<u8>> = vec![
        b"<< /Type /Catalog /Pages 2 0 R >>".to_vec(),
        format!("<< /Type /Pages /Kids [{}] /Count {} >>", kids.join(" "), page_count).into_bytes(),
        b"<< /Type /Font /Subtype /Type1 /BaseFont /Helvetica /Encoding /WinAnsiEncoding >>".to_vec(),
        b"<< /Type /Font /Subtype /Type1 /BaseFont /Helvetica-Bold /Encoding /WinAnsiEncoding >>"
            .to_vec(),
    ];

    for (i, content) in pages.iter().enumerate() {
        objects.push(
            format!(
                "<< /Type /Page /Parent 2 0 R /MediaBox [0 0 {:.2} {:.2}] \
                 /Resources << /Font << /F1 3 0 R /F2 4 0 R >> >> /Contents {} 0 R >>",
                PAGE_WIDTH_PT,
                PAGE_HEIGHT_PT,
                6 + 2 * i
            )
            .into_bytes(),
        );
        let mut stream = format!("<< /Length {} >>\nstream\n", content.len()).into_bytes();
        stream.extend_from_slice(content.as_bytes());
        stream.extend_from_slice(b"\nendstream");
        objects.push(stream);
    }

    for (i, body) in objects.iter().enumerate() {
        offsets.push(buf.len());
        buf.extend_from_slice(format!("{} 0 obj\n", i + 1).as_bytes());
        buf.extend_from_slice(body);
        buf.extend_from_slice(b"\nendobj\n");
    }

    let xref_offset = buf.len();
    let mut xref = format!("xref\n0 {}\n0000000000 65535 f \n", object_count + 1);
    for offset in &offsets {
        let _ = writeln!(xref, "{:010} 00000 n ", offset);
    }
    let _ = write!(
        xref,
        "trailer\n<< /Size {} /Root 1 0 R >>\nstartxref\n{}\n%%EOF\n",
        object_count + 1,
        xref_offset
    );
    buf.extend_from_slice(xref.as_bytes());
    buf
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn item(name: &str, copies: u32) -> LabelItem {
        LabelItem {
            name: name.to_string(),
            price: Money::from_cents(1290),
            code: "7891234567890".to_string(),
            unit: "un".to_string(),
            copies,
        }
    }

    fn as_text(pdf: &[u8]) -> String {
        String::from_utf8_lossy(pdf).into_owned()
    }

    #[test]
    fn test_escape_and_winansi() {
        assert_eq!(escape("a(b)c\\"), "a\\(b\\)c\\\\");
        assert_eq!(escape("Pão"), "P\\343o");
        assert_eq!(escape("€ 5"), "\\200 5");
        assert_eq!(escape("日本"), "??");
    }

    #[test]
    fn test_fit_truncates() {
        assert_eq!(fit("Short", 10.0, 100.0), "Short");
        // 56 pt / 5.5 pt per char = 10 chars
        assert_eq!(fit("Cesta de Café da Manhã", 10.0, 56.0), "Cesta d...");
        assert_eq!(fit("Anything", 10.0, 10.0), ".");
    }

    #[test]
    fn test_layout_cells() {
        let layout = LabelLayout::default();
        assert!(layout.validate().is_ok());
        assert_eq!(layout.per_page(), 24);

        let first = layout.cell(0);
        let second = layout.cell(1);
        let next_row = layout.cell(3);
        assert!(second.x > first.x);
        assert!((next_row.x - first.x).abs() < 1e-9);
        assert!(next_row.y < first.y);
        assert!(first.y + first.height <= PAGE_HEIGHT_PT);

        let bad = LabelLayout { columns: 9, ..LabelLayout::default() };
        assert!(bad.validate().is_err());
        let cramped = LabelLayout { columns: 8, rows: 20, margin_mm: 30.0, gap_mm: 10.0, ..LabelLayout::default() };
        assert!(cramped.validate().is_err());
    }

    #[test]
    fn test_render_pages_and_content() {
        let layout = LabelLayout::default();
        let pdf = render_labels(
            &layout,
            &[item("Cesta P", 20), item("Cesta (G)", 10)],
            &CurrencyFormat::default(),
            Some("Loja"),
        )
        .unwrap();
        let text = as_text(&pdf);

        assert!(text.starts_with("%PDF-1.4"));
        assert!(text.ends_with("%%EOF\n"));
        assert!(text.contains("/Count 2"));
        assert!(text.contains("(Cesta \\(G\\)) Tj"));
        assert!(text.contains("(R$ 12,90 /un) Tj"));
        assert!(text.contains("(Loja) Tj"));
        assert_eq!(text.matches("(7891234567890) Tj").count(), 30);
    }

    #[test]
    fn test_xref_offsets_point_at_objects() {
        let pdf = render_labels(&LabelLayout::default(), &[item("A", 1)], &CurrencyFormat::default(), None).unwrap();

        // Offsets are byte positions; the binary header comment is not UTF-8
        let find = |needle: &[u8]| pdf.windows(needle.len()).rposition(|w| w == needle).unwrap();
        let tail = as_text(&pdf[find(b"startxref\n")..]);
        let startxref: usize = tail.lines().nth(1).unwrap().parse().unwrap();
        assert!(pdf[startxref..].starts_with(b"xref\n"));

        let xref = as_text(&pdf[startxref..]);
        let entries: Vec<usize> = xref
            .lines()
            .skip(3)
            .take_while(|l| l.ends_with(" n "))
            .map(|l| l[..10].parse().unwrap())
            .collect();
        assert_eq!(entries.len(), 6);
        for (i, offset) in entries.iter().enumerate() {
            assert!(pdf[*offset..].starts_with(format!("{} 0 obj", i + 1).as_bytes()));
        }
    }

    #[test]
    fn test_render_rejects_empty_and_oversized() {
        let layout = LabelLayout::default();
        let currency = CurrencyFormat::default();
        assert!(render_labels(&layout, &[], &currency, None).is_err());
        assert!(render_labels(&layout, &[item("A", 0)], &currency, None).is_err());
        assert!(render_labels(&layout, &[item("A", MAX_LABELS + 1)], &currency, None).is_err());
    }
}
