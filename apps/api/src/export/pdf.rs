//! PDF builder.
//!
//! Plain-text export on A4 with the standard Type1 Times fonts. Wrapping uses
//! the same AFM width tables as the pagination measurer but its own geometry
//! (50pt margins, 12pt body, 1.4 line height), so page breaks here are not
//! expected to match the editor preview.

use lopdf::content::{Content, Operation};
use lopdf::{dictionary, Document, Object, StringFormat, Stream};
use once_cell::sync::Lazy;
use regex::Regex;
use tracing::debug;

use super::ExportError;
use crate::layout::font_metrics::{get_metrics, FontFamily};

pub const CONTENT_TYPE: &str = "application/pdf";

pub const PAGE_WIDTH_PT: f32 = 595.28;
pub const PAGE_HEIGHT_PT: f32 = 841.89;
pub const MARGIN_PT: f32 = 50.0;
pub const TITLE_SIZE_PT: f32 = 18.0;
pub const BODY_SIZE_PT: f32 = 12.0;
/// Extra space below the title line, on top of its own size.
const TITLE_GAP_PT: f32 = 14.0;
const LINE_HEIGHT_FACTOR: f32 = 1.4;
const PARAGRAPH_GAP_FACTOR: f32 = 0.6;
pub const MAX_TITLE_CHARS: usize = 200;

static PARAGRAPH_BREAK: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\n{2,}").expect("paragraph pattern is valid"));

/// One positioned line of text, in PDF user space (origin bottom-left).
#[derive(Debug, Clone, PartialEq)]
pub struct TextLine {
    pub text: String,
    pub font: FontFamily,
    pub size: f32,
    pub x: f32,
    pub y: f32,
}

/// Lines grouped by page.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PdfLayout {
    pub pages: Vec<Vec<TextLine>>,
}

impl PdfLayout {
    pub fn page_count(&self) -> usize {
        self.pages.len()
    }
}

/// Truncates the title the way the exporter draws it.
pub fn display_title(title: &str) -> String {
    title.chars().take(MAX_TITLE_CHARS).collect()
}

/// Lays out the centered bold title and the wrapped body paragraphs.
///
/// Paragraphs are separated by blank lines. A new page starts whenever the
/// cursor would drop below the bottom margin plus one line.
pub fn layout_pdf(title: &str, content: &str) -> PdfLayout {
    let bold = get_metrics(FontFamily::TimesBold);
    let regular = get_metrics(FontFamily::TimesRoman);

    let line_height = BODY_SIZE_PT * LINE_HEIGHT_FACTOR;
    let max_line_em = (PAGE_WIDTH_PT - MARGIN_PT * 2.0) / BODY_SIZE_PT;
    let top = PAGE_HEIGHT_PT - MARGIN_PT;

    let mut pages: Vec<Vec<TextLine>> = vec![Vec::new()];
    let mut cursor_y = top;

    let title = display_title(title);
    let title_width = bold.measure_str(&title) * TITLE_SIZE_PT;
    pages[0].push(TextLine {
        x: (PAGE_WIDTH_PT - title_width) / 2.0,
        y: cursor_y,
        text: title,
        font: FontFamily::TimesBold,
        size: TITLE_SIZE_PT,
    });
    cursor_y -= TITLE_SIZE_PT + TITLE_GAP_PT;

    let content = content.replace('\r', "");
    for paragraph in PARAGRAPH_BREAK.split(&content) {
        for line in regular.wrap(paragraph.trim(), max_line_em) {
            if cursor_y < MARGIN_PT + line_height {
                pages.push(Vec::new());
                cursor_y = top;
            }
            if let Some(page) = pages.last_mut() {
                page.push(TextLine {
                    text: line,
                    font: FontFamily::TimesRoman,
                    size: BODY_SIZE_PT,
                    x: MARGIN_PT,
                    y: cursor_y,
                });
            }
            cursor_y -= line_height;
        }
        cursor_y -= line_height * PARAGRAPH_GAP_FACTOR;
    }

    PdfLayout { pages }
}

/// Builds the PDF bytes for `title` and plain-text `content`.
pub fn build_pdf(title: &str, content: &str) -> Result<Vec<u8>, ExportError> {
    let layout = layout_pdf(title, content);

    let mut doc = Document::with_version("1.7");
    let pages_id = doc.new_object_id();

    let regular_id = doc.add_object(type1_font(FontFamily::TimesRoman));
    let bold_id = doc.add_object(type1_font(FontFamily::TimesBold));
    let resources_id = doc.add_object(dictionary! {
        "Font" => dictionary! {
            "F1" => regular_id,
            "F2" => bold_id,
        },
    });

    let mut kids: Vec<Object> = Vec::with_capacity(layout.pages.len());
    for lines in &layout.pages {
        let content = page_content(lines);
        let encoded = content
            .encode()
            .map_err(|e| ExportError::Pdf(e.to_string()))?;
        let content_id = doc.add_object(Stream::new(lopdf::Dictionary::new(), encoded));
        let page_id = doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "MediaBox" => vec![0.into(), 0.into(), PAGE_WIDTH_PT.into(), PAGE_HEIGHT_PT.into()],
            "Contents" => content_id,
            "Resources" => resources_id,
        });
        kids.push(page_id.into());
    }

    let page_count = kids.len() as i64;
    doc.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Kids" => kids,
            "Count" => page_count,
        }),
    );
    let catalog_id = doc.add_object(dictionary! { "Type" => "Catalog", "Pages" => pages_id });
    doc.trailer.set("Root", catalog_id);

    let mut out = Vec::new();
    doc.save_to(&mut out)
        .map_err(|e| ExportError::Pdf(e.to_string()))?;
    debug!(pages = page_count, bytes = out.len(), "PDF built");
    Ok(out)
}

fn type1_font(font: FontFamily) -> lopdf::Dictionary {
    dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => font.postscript_name(),
        "Encoding" => "WinAnsiEncoding",
    }
}

fn font_resource(font: FontFamily) -> &'static str {
    match font {
        FontFamily::TimesRoman => "F1",
        FontFamily::TimesBold => "F2",
    }
}

fn page_content(lines: &[TextLine]) -> Content {
    let mut operations = vec![Operation::new("rg", vec![0.into(), 0.into(), 0.into()])];
    for line in lines {
        operations.push(Operation::new("BT", vec![]));
        operations.push(Operation::new(
            "Tf",
            vec![font_resource(line.font).into(), line.size.into()],
        ));
        operations.push(Operation::new("Td", vec![line.x.into(), line.y.into()]));
        operations.push(Operation::new(
            "Tj",
            vec![Object::String(to_win_ansi(&line.text), StringFormat::Literal)],
        ));
        operations.push(Operation::new("ET", vec![]));
    }
    Content { operations }
}

/// Encodes text for the WinAnsi standard fonts. Latin-1 maps directly, a few
/// common typographic characters use their cp1252 slots, anything else
/// becomes `?`.
pub fn to_win_ansi(s: &str) -> Vec<u8> {
    s.chars()
        .map(|c| match c {
            '\u{20}'..='\u{7E}' | '\u{A0}'..='\u{FF}' => c as u8,
            '\u{2026}' => 0x85,
            '\u{2018}' => 0x91,
            '\u{2019}' => 0x92,
            '\u{201C}' => 0x93,
            '\u{201D}' => 0x94,
            '\u{2022}' => 0x95,
            '\u{2013}' => 0x96,
            '\u{2014}' => 0x97,
            '\t' => b' ',
            _ => b'?',
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn long_content(paragraphs: usize) -> String {
        let para = "Kalimat ini mengisi halaman dengan teks yang cukup panjang untuk dibungkus. ".repeat(12);
        vec![para; paragraphs].join("\n\n")
    }

    #[test]
    fn test_title_is_centered_and_bold() {
        let layout = layout_pdf("Makalah", "");
        let title = &layout.pages[0][0];
        assert_eq!(title.font, FontFamily::TimesBold);
        assert_eq!(title.size, TITLE_SIZE_PT);
        let width = get_metrics(FontFamily::TimesBold).measure_str("Makalah") * TITLE_SIZE_PT;
        assert!((title.x - (PAGE_WIDTH_PT - width) / 2.0).abs() < 1e-3);
        assert!((title.y - (PAGE_HEIGHT_PT - MARGIN_PT)).abs() < 1e-3);
    }

    #[test]
    fn test_first_body_line_sits_below_title() {
        let layout = layout_pdf("T", "Paragraf pertama.");
        let body = &layout.pages[0][1];
        assert_eq!(body.text, "Paragraf pertama.");
        assert_eq!(body.x, MARGIN_PT);
        let expected = PAGE_HEIGHT_PT - MARGIN_PT - TITLE_SIZE_PT - TITLE_GAP_PT;
        assert!((body.y - expected).abs() < 1e-3);
    }

    #[test]
    fn test_paragraph_gap_between_paragraphs() {
        let layout = layout_pdf("T", "Satu.\n\n\n\nDua.");
        let lines = &layout.pages[0];
        assert_eq!(lines.len(), 3);
        let gap = lines[1].y - lines[2].y;
        let line_height = BODY_SIZE_PT * LINE_HEIGHT_FACTOR;
        assert!((gap - line_height * (1.0 + PARAGRAPH_GAP_FACTOR)).abs() < 1e-3);
    }

    #[test]
    fn test_lines_fit_between_margins() {
        let layout = layout_pdf("T", &long_content(1));
        let regular = get_metrics(FontFamily::TimesRoman);
        for line in layout.pages[0].iter().skip(1) {
            let width = regular.measure_str(&line.text) * BODY_SIZE_PT;
            assert!(width <= PAGE_WIDTH_PT - 2.0 * MARGIN_PT + 1e-3, "{}", line.text);
        }
    }

    #[test]
    fn test_overflow_starts_new_page_at_top() {
        let layout = layout_pdf("T", &long_content(12));
        assert!(layout.page_count() > 1);
        let first_on_second = &layout.pages[1][0];
        assert!((first_on_second.y - (PAGE_HEIGHT_PT - MARGIN_PT)).abs() < 1e-3);
        let line_height = BODY_SIZE_PT * LINE_HEIGHT_FACTOR;
        for line in layout.pages.iter().flatten() {
            assert!(line.y >= MARGIN_PT + line_height - 1e-3);
        }
    }

    #[test]
    fn test_title_truncated_to_limit() {
        let title = "x".repeat(250);
        let layout = layout_pdf(&title, "");
        assert_eq!(layout.pages[0][0].text.chars().count(), MAX_TITLE_CHARS);
    }

    #[test]
    fn test_win_ansi_mapping() {
        assert_eq!(to_win_ansi("Aé—ж"), vec![b'A', 0xE9, 0x97, b'?']);
    }

    #[test]
    fn test_build_pdf_emits_document_with_standard_fonts() {
        let bytes = build_pdf("Makalah", "Isi.").unwrap();
        assert!(bytes.starts_with(b"%PDF-1.7"));
        let has = |needle: &[u8]| bytes.windows(needle.len()).any(|w| w == needle);
        assert!(has(b"Times-Roman"));
        assert!(has(b"Times-Bold"));
        assert!(has(b"(Makalah) Tj"));
    }
}
