use crate::insights::InsightReport;
use crate::storage_utils::AsyncStorageManager;
use anyhow::Result;
use chrono::{DateTime, TimeZone};
use printpdf::{BuiltinFont, IndirectFontRef, Mm, PdfDocument, PdfDocumentReference, PdfLayerReference};
use regex::Regex;
use std::path::PathBuf;
use std::sync::LazyLock;
use tracing::info;

const PAGE_WIDTH: f32 = 210.0;
const PAGE_HEIGHT: f32 = 297.0;
const MARGIN: f32 = 10.0;
const LINE_HEIGHT: f32 = 10.0;
const FONT_SIZE: f32 = 12.0;
// Rough Helvetica 12pt glyph width, used for wrapping and centering.
const CHAR_WIDTH: f32 = 2.2;

static UNSAFE_FILENAME_CHARS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"[/\\:*?"<>|\s]"#).expect("valid filename regex"));

/// Replaces path separators and other characters that are not valid in a
/// file name with `_`.
pub fn sanitize_symbol(symbol: &str) -> String {
    UNSAFE_FILENAME_CHARS.replace_all(symbol, "_").into_owned()
}

/// Run timestamp at seconds precision, as used in the title and file name.
pub fn format_run_timestamp<Tz: TimeZone>(now: &DateTime<Tz>) -> String
where
    Tz::Offset: std::fmt::Display,
{
    now.format("%Y-%m-%d_%H-%M-%S").to_string()
}

pub fn report_file_name(symbol: &str, stamp: &str) -> String {
    format!("insight_{}_{}.pdf", sanitize_symbol(symbol), stamp)
}

/// Greedy word wrap to at most `width` characters per line. Words longer
/// than the width are kept whole on their own line.
pub fn wrap_text(text: &str, width: usize) -> Vec<String> {
    let mut lines = Vec::new();
    let mut current = String::new();
    for word in text.split_whitespace() {
        if !current.is_empty() && current.len() + 1 + word.len() > width {
            lines.push(std::mem::take(&mut current));
        }
        if !current.is_empty() {
            current.push(' ');
        }
        current.push_str(word);
    }
    if !current.is_empty() || lines.is_empty() {
        lines.push(current);
    }
    lines
}

/// Writes lines top to bottom, starting a new page when the current one is
/// full.
struct PageCursor<'a> {
    doc: &'a PdfDocumentReference,
    layer: PdfLayerReference,
    font: IndirectFontRef,
    y: f32,
}

impl PageCursor<'_> {
    fn write_line(&mut self, text: &str, x: f32) {
        if self.y < MARGIN + LINE_HEIGHT {
            let (page, layer) = self.doc.add_page(Mm(PAGE_WIDTH), Mm(PAGE_HEIGHT), "Layer 1");
            self.layer = self.doc.get_page(page).get_layer(layer);
            self.y = PAGE_HEIGHT - MARGIN - LINE_HEIGHT;
        }
        self.layer.use_text(text, FONT_SIZE, Mm(x), Mm(self.y), &self.font);
        self.y -= LINE_HEIGHT;
    }

    fn skip(&mut self) {
        self.y -= LINE_HEIGHT;
    }
}

/// Lays out the title and one paragraph per insight line.
pub fn render_pdf(title: &str, report: &InsightReport) -> Result<Vec<u8>> {
    let (doc, page, layer) = PdfDocument::new(title, Mm(PAGE_WIDTH), Mm(PAGE_HEIGHT), "Layer 1");
    let font = doc.add_builtin_font(BuiltinFont::Helvetica)?;
    let layer = doc.get_page(page).get_layer(layer);

    let max_chars = ((PAGE_WIDTH - 2.0 * MARGIN) / CHAR_WIDTH) as usize;
    let mut cursor = PageCursor {
        doc: &doc,
        layer,
        font,
        y: PAGE_HEIGHT - MARGIN - LINE_HEIGHT,
    };

    let title_x = ((PAGE_WIDTH - title.len() as f32 * CHAR_WIDTH) / 2.0).max(MARGIN);
    cursor.write_line(title, title_x);
    cursor.skip();

    for line in report.lines() {
        for wrapped in wrap_text(line, max_chars) {
            cursor.write_line(&wrapped, MARGIN);
        }
        cursor.skip();
    }
    drop(cursor);

    Ok(doc.save_to_bytes()?)
}

/// Writes `insights/insight_{symbol}_{stamp}.pdf` under the storage root and
/// returns its path.
pub async fn save_insights_as_pdf(
    storage: &AsyncStorageManager,
    report: &InsightReport,
    symbol: &str,
    stamp: &str,
) -> Result<PathBuf> {
    let dir = storage.ensure_dir("insights").await?;
    let title = format!("Insights for {} - {}", symbol, stamp);
    let bytes = render_pdf(&title, report)?;

    let path = dir.join(report_file_name(symbol, stamp));
    storage.write_atomic(&path, &bytes).await?;
    info!(path = %path.display(), "insight report written");
    Ok(path)
}
