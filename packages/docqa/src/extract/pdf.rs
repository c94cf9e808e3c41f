//! PDF text extraction.
//!
//! The structured pass walks each page's content stream with `lopdf`,
//! decoding shown strings through the font selected by `Tf` and recording
//! their vertical position, and starts a new line whenever consecutive runs
//! move vertically by more than the threshold. Pages that fail are replaced
//! by a notice line. A page showing glyph ids that cannot be mapped back to
//! text counts as having no text.
//!
//! When the structured pass yields nothing usable, the raw bytes are scanned:
//! first for `(...) Tj` operators inside `BT`/`ET` blocks, then for runs of
//! printable ASCII that do not look like PDF syntax.

use lazy_static::lazy_static;
use lopdf::content::Content;
use lopdf::{Document as PdfDocument, Object};
use regex::Regex;
use tracing::{debug, warn};

use super::fonts::{GlyphDecoder, PageFonts};
use super::{title_header, ExtractionMethod, Extracted};

pub(super) const DEFAULT_LINE_BREAK_THRESHOLD: f32 = 5.0;

/// Structured output with fewer non-empty lines than this had no page text.
const MIN_STRUCTURED_LINES: usize = 4;

/// Kerning (thousandths of an em) wide enough to read as a word gap in `TJ`.
const TJ_SPACE_THRESHOLD: f32 = -200.0;

const PAGE_ERROR_NOTICE: &str = "Error extracting text from this page.";

const NO_TEXT_NOTICE: &str = "This PDF document appears to contain primarily non-text content \
such as images or scanned pages, or uses an encoding that cannot be directly extracted.\n\n\
For best results, please use a PDF with searchable text content.";

const STRUCTURAL_KEYWORDS: &[&str] = &[
    "obj", "endobj", "stream", "endstream", "xref", "startxref", "/Type", "/Length", "/Filter",
];

lazy_static! {
    static ref TEXT_BLOCK_REGEX: Regex = Regex::new(r"(?s)BT\s*(.*?)\s*ET").unwrap();
    static ref SHOW_TEXT_REGEX: Regex = Regex::new(r"\(\s*([^)]+)\s*\)\s*Tj").unwrap();
    static ref PRINTABLE_RUN_REGEX: Regex = Regex::new(r"[\x20-\x7E]{5,}").unwrap();
    static ref DIGITS_ONLY_REGEX: Regex = Regex::new(r"^[0-9\s]+$").unwrap();
}

pub(super) fn extract(file_name: &str, bytes: &[u8], threshold: f32) -> Extracted {
    match PdfDocument::load_mem(bytes) {
        Ok(mut document) => {
            if document.is_encrypted() && document.decrypt("").is_err() {
                warn!(file_name = %file_name, "Encrypted PDF, trying pattern fallback");
                return fallback(file_name, bytes);
            }
            let pages = read_pages(&document, threshold);
            let text = assemble(file_name, &pages);
            if is_degenerate(&text) {
                debug!(file_name = %file_name, "Structured parse found no text, trying pattern fallback");
                fallback(file_name, bytes)
            } else {
                Extracted::new(text, ExtractionMethod::PdfStructured)
            }
        }
        Err(e) => {
            warn!(file_name = %file_name, error = %e, "PDF parse failed, trying pattern fallback");
            fallback(file_name, bytes)
        }
    }
}

/// Page number paired with its text or the reason it could not be read.
type PageText = (u32, std::result::Result<String, String>);

fn read_pages(document: &PdfDocument, threshold: f32) -> Vec<PageText> {
    document
        .get_pages()
        .into_iter()
        .map(|(number, page_id)| {
            let fonts = PageFonts::load(document, page_id);
            let text = document
                .get_page_content(page_id)
                .map_err(|e| e.to_string())
                .and_then(|data| Content::decode(&data).map_err(|e| e.to_string()))
                .map(|content| page_text(&content, &fonts, threshold));
            match &text {
                Err(reason) => warn!(page = number, error = %reason, "Failed to extract page"),
                Ok(text) if text.is_empty() => debug!(page = number, "No decodable text on page"),
                Ok(_) => {}
            }
            (number, text)
        })
        .collect()
}

fn assemble(file_name: &str, pages: &[PageText]) -> String {
    let mut output = title_header(file_name);
    output.push_str(&format!("PDF Document - {} pages\n\n", pages.len()));

    for (number, text) in pages {
        match text {
            Ok(text) if !text.trim().is_empty() => {
                output.push_str(&format!("## Page {}\n\n{}\n\n", number, text.trim()));
            }
            Ok(_) => {}
            Err(_) => {
                output.push_str(&format!("## Page {}\n\n{}\n\n", number, PAGE_ERROR_NOTICE));
            }
        }
    }
    output
}

fn is_degenerate(text: &str) -> bool {
    text.lines().filter(|line| !line.trim().is_empty()).count() < MIN_STRUCTURED_LINES
}

/// A shown string and the baseline it was drawn on.
#[derive(Debug, PartialEq)]
struct TextRun {
    text: String,
    y: f32,
}

/// Tracks the vertical text position through the text operators.
#[derive(Debug, Default)]
struct TextCursor {
    line_y: f32,
    leading: f32,
}

impl TextCursor {
    fn next_line(&mut self) {
        self.line_y -= self.leading;
    }
}

/// Shown strings in drawing order, or `None` if any of them is in a font
/// whose codes cannot be decoded.
fn text_runs(content: &Content, fonts: &PageFonts) -> Option<Vec<TextRun>> {
    let undeclared = GlyphDecoder::default();
    let mut decoder = &undeclared;
    let mut cursor = TextCursor::default();
    let mut runs = Vec::new();

    for op in &content.operations {
        let operand = |i: usize| op.operands.get(i).and_then(|o| o.as_float().ok());
        let shown = match op.operator.as_str() {
            "BT" => {
                cursor.line_y = 0.0;
                None
            }
            "Tf" => {
                decoder = op
                    .operands
                    .first()
                    .and_then(|name| name.as_name().ok())
                    .and_then(|name| fonts.get(name))
                    .unwrap_or(&undeclared);
                None
            }
            "Tm" => {
                if let Some(y) = operand(5) {
                    cursor.line_y = y;
                }
                None
            }
            "Td" => {
                if let Some(ty) = operand(1) {
                    cursor.line_y += ty;
                }
                None
            }
            "TD" => {
                if let Some(ty) = operand(1) {
                    cursor.leading = -ty;
                    cursor.line_y += ty;
                }
                None
            }
            "TL" => {
                if let Some(leading) = operand(0) {
                    cursor.leading = leading;
                }
                None
            }
            "T*" => {
                cursor.next_line();
                None
            }
            "Tj" | "TJ" => op.operands.first(),
            "'" => {
                cursor.next_line();
                op.operands.first()
            }
            "\"" => {
                cursor.next_line();
                op.operands.get(2)
            }
            _ => None,
        };

        if let Some(obj) = shown {
            runs.push(TextRun {
                text: shown_text(obj, decoder)?,
                y: cursor.line_y,
            });
        }
    }
    Some(runs)
}

/// Join runs into lines, breaking when the baseline jumps past `threshold`.
fn join_runs(runs: &[TextRun], threshold: f32) -> String {
    let mut text = String::new();
    let mut last_y: Option<f32> = None;

    for run in runs {
        if run.text.trim().is_empty() {
            continue;
        }
        if let Some(y) = last_y {
            if (y - run.y).abs() > threshold {
                text.push('\n');
            }
        }
        if !text.is_empty() && !text.ends_with('\n') {
            text.push(' ');
        }
        text.push_str(&run.text);
        last_y = Some(run.y);
    }
    text
}

/// Page text, empty when the page shows no decodable text.
fn page_text(content: &Content, fonts: &PageFonts, threshold: f32) -> String {
    text_runs(content, fonts)
        .map(|runs| join_runs(&runs, threshold))
        .unwrap_or_default()
}

fn shown_text(obj: &Object, decoder: &GlyphDecoder) -> Option<String> {
    match obj {
        Object::String(bytes, _) => decoder.decode(bytes),
        Object::Array(items) => {
            let mut text = String::new();
            for item in items {
                match item {
                    Object::String(bytes, _) => text.push_str(&decoder.decode(bytes)?),
                    other => {
                        if other.as_float().map(|k| k < TJ_SPACE_THRESHOLD).unwrap_or(false) {
                            text.push(' ');
                        }
                    }
                }
            }
            Some(text)
        }
        _ => Some(String::new()),
    }
}

fn fallback(file_name: &str, bytes: &[u8]) -> Extracted {
    let content = String::from_utf8_lossy(bytes);
    let mut output = title_header(file_name);
    output.push_str("PDF Document (processed with alternative method)\n\n");

    let shown: Vec<&str> = TEXT_BLOCK_REGEX
        .captures_iter(&content)
        .filter_map(|block| block.get(1))
        .flat_map(|block| {
            SHOW_TEXT_REGEX
                .captures_iter(block.as_str())
                .filter_map(|caps| caps.get(1))
                .map(|m| m.as_str().trim())
                .filter(|s| !s.is_empty())
                .collect::<Vec<_>>()
        })
        .collect();

    if !shown.is_empty() {
        let joined = shown.join(" ");
        output.push_str(&joined.split_whitespace().collect::<Vec<_>>().join(" "));
        return Extracted::new(output, ExtractionMethod::PdfFallbackPattern);
    }

    let printable: Vec<&str> = PRINTABLE_RUN_REGEX
        .find_iter(&content)
        .map(|m| m.as_str().trim())
        .filter(|run| {
            run.len() > 5
                && !DIGITS_ONLY_REGEX.is_match(run)
                && !STRUCTURAL_KEYWORDS.iter().any(|kw| run.contains(kw))
        })
        .collect();

    if !printable.is_empty() {
        output.push_str(&printable.join("\n"));
        return Extracted::new(output, ExtractionMethod::PdfFallbackPattern);
    }

    let mut placeholder = title_header(file_name);
    placeholder.push_str(NO_TEXT_NOTICE);
    Extracted::new(placeholder, ExtractionMethod::Placeholder)
}
