//! DOCX builder.
//!
//! Writes a minimal WordprocessingML package: content types, package and
//! document relationships, styles, one footer with a centered PAGE field, and
//! the document body. Page size and margins come from the editor layout
//! (A4 in twips, margins `px × 15`).

use std::io::{Cursor, Write};

use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event};
use quick_xml::Writer;
use tracing::debug;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

use super::ExportError;
use crate::layout::geometry::{Margins, PageSize};
use crate::layout::Block;

pub const CONTENT_TYPE: &str =
    "application/vnd.openxmlformats-officedocument.wordprocessingml.document";

const NS_W: &str = "http://schemas.openxmlformats.org/wordprocessingml/2006/main";
const NS_R: &str = "http://schemas.openxmlformats.org/officeDocument/2006/relationships";

/// Header/footer distance from the page edge, in twips (0.5 in).
const HEADER_FOOTER_TWIPS: &str = "720";

const CONTENT_TYPES_XML: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Types xmlns="http://schemas.openxmlformats.org/package/2006/content-types"><Default Extension="rels" ContentType="application/vnd.openxmlformats-package.relationships+xml"/><Default Extension="xml" ContentType="application/xml"/><Override PartName="/word/document.xml" ContentType="application/vnd.openxmlformats-officedocument.wordprocessingml.document.main+xml"/><Override PartName="/word/styles.xml" ContentType="application/vnd.openxmlformats-officedocument.wordprocessingml.styles+xml"/><Override PartName="/word/footer1.xml" ContentType="application/vnd.openxmlformats-officedocument.wordprocessingml.footer+xml"/></Types>"#;

const PACKAGE_RELS_XML: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships"><Relationship Id="rId1" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/officeDocument" Target="word/document.xml"/></Relationships>"#;

const DOCUMENT_RELS_XML: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships"><Relationship Id="rId1" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/styles" Target="styles.xml"/><Relationship Id="rId2" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/footer" Target="footer1.xml"/></Relationships>"#;

const FOOTER_REL_ID: &str = "rId2";

/// Times New Roman 12pt body; headings 20/16/14pt bold; 8pt after paragraphs.
/// Sizes are in half-points, spacing in twips.
const STYLES_XML: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<w:styles xmlns:w="http://schemas.openxmlformats.org/wordprocessingml/2006/main"><w:docDefaults><w:rPrDefault><w:rPr><w:rFonts w:ascii="Times New Roman" w:hAnsi="Times New Roman" w:cs="Times New Roman" w:eastAsia="Times New Roman"/><w:sz w:val="24"/><w:szCs w:val="24"/><w:lang w:val="id-ID"/></w:rPr></w:rPrDefault><w:pPrDefault><w:pPr><w:spacing w:after="160"/></w:pPr></w:pPrDefault></w:docDefaults><w:style w:type="paragraph" w:default="1" w:styleId="Normal"><w:name w:val="Normal"/><w:qFormat/></w:style><w:style w:type="paragraph" w:styleId="Heading1"><w:name w:val="heading 1"/><w:basedOn w:val="Normal"/><w:next w:val="Normal"/><w:qFormat/><w:pPr><w:keepNext/><w:spacing w:before="0" w:after="320"/><w:outlineLvl w:val="0"/></w:pPr><w:rPr><w:b/><w:bCs/><w:sz w:val="40"/><w:szCs w:val="40"/></w:rPr></w:style><w:style w:type="paragraph" w:styleId="Heading2"><w:name w:val="heading 2"/><w:basedOn w:val="Normal"/><w:next w:val="Normal"/><w:qFormat/><w:pPr><w:keepNext/><w:spacing w:before="320" w:after="160"/><w:outlineLvl w:val="1"/></w:pPr><w:rPr><w:b/><w:bCs/><w:sz w:val="32"/><w:szCs w:val="32"/></w:rPr></w:style><w:style w:type="paragraph" w:styleId="Heading3"><w:name w:val="heading 3"/><w:basedOn w:val="Normal"/><w:next w:val="Normal"/><w:qFormat/><w:pPr><w:keepNext/><w:spacing w:before="240" w:after="120"/><w:outlineLvl w:val="2"/></w:pPr><w:rPr><w:b/><w:bCs/><w:sz w:val="28"/><w:szCs w:val="28"/></w:rPr></w:style><w:style w:type="paragraph" w:styleId="ListParagraph"><w:name w:val="List Paragraph"/><w:basedOn w:val="Normal"/><w:pPr><w:ind w:left="440" w:hanging="220"/></w:pPr></w:style><w:style w:type="paragraph" w:styleId="Quote"><w:name w:val="Quote"/><w:basedOn w:val="Normal"/><w:pPr><w:pBdr><w:left w:val="single" w:sz="24" w:space="6" w:color="CCCCCC"/></w:pBdr><w:spacing w:before="160" w:after="160"/><w:ind w:left="240"/></w:pPr></w:style><w:style w:type="paragraph" w:styleId="Code"><w:name w:val="Code"/><w:basedOn w:val="Normal"/><w:pPr><w:shd w:val="clear" w:color="auto" w:fill="F3F3F3"/></w:pPr><w:rPr><w:rFonts w:ascii="Consolas" w:hAnsi="Consolas" w:cs="Consolas"/><w:sz w:val="20"/></w:rPr></w:style><w:style w:type="paragraph" w:styleId="Footer"><w:name w:val="footer"/><w:basedOn w:val="Normal"/><w:pPr><w:spacing w:after="0"/></w:pPr></w:style><w:style w:type="table" w:styleId="TableGrid"><w:name w:val="Table Grid"/><w:tblPr><w:tblBorders><w:top w:val="single" w:sz="4" w:space="0" w:color="auto"/><w:left w:val="single" w:sz="4" w:space="0" w:color="auto"/><w:bottom w:val="single" w:sz="4" w:space="0" w:color="auto"/><w:right w:val="single" w:sz="4" w:space="0" w:color="auto"/><w:insideH w:val="single" w:sz="4" w:space="0" w:color="auto"/><w:insideV w:val="single" w:sz="4" w:space="0" w:color="auto"/></w:tblBorders></w:tblPr></w:style></w:styles>"#;

const FOOTER_XML: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<w:ftr xmlns:w="http://schemas.openxmlformats.org/wordprocessingml/2006/main"><w:p><w:pPr><w:pStyle w:val="Footer"/><w:jc w:val="center"/></w:pPr><w:fldSimple w:instr=" PAGE "><w:r><w:t>1</w:t></w:r></w:fldSimple></w:p></w:ftr>"#;

// ────────────────────────────────────────────────────────────────────────────
// XML helper
// ────────────────────────────────────────────────────────────────────────────

struct XmlOut {
    writer: Writer<Vec<u8>>,
}

impl XmlOut {
    fn new() -> Self {
        Self {
            writer: Writer::new(Vec::new()),
        }
    }

    fn emit(&mut self, event: Event<'_>) -> Result<(), ExportError> {
        self.writer
            .write_event(event)
            .map_err(|e| ExportError::Xml(e.to_string()))
    }

    fn decl(&mut self) -> Result<(), ExportError> {
        self.emit(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), Some("yes"))))
    }

    fn start(&mut self, name: &str, attrs: &[(&str, &str)]) -> Result<(), ExportError> {
        self.emit(Event::Start(
            BytesStart::new(name).with_attributes(attrs.iter().copied()),
        ))
    }

    fn end(&mut self, name: &str) -> Result<(), ExportError> {
        self.emit(Event::End(BytesEnd::new(name)))
    }

    fn empty(&mut self, name: &str, attrs: &[(&str, &str)]) -> Result<(), ExportError> {
        self.emit(Event::Empty(
            BytesStart::new(name).with_attributes(attrs.iter().copied()),
        ))
    }

    /// Drops characters XML 1.0 cannot carry, then escapes the rest.
    fn text(&mut self, s: &str) -> Result<(), ExportError> {
        let clean: String = s.chars().filter(|c| is_xml_char(*c)).collect();
        self.emit(Event::Text(BytesText::new(&clean)))
    }

    fn finish(self) -> Vec<u8> {
        self.writer.into_inner()
    }
}

/// C0 controls other than tab, LF and CR are not allowed in XML 1.0 documents.
fn is_xml_char(c: char) -> bool {
    c >= ' ' || matches!(c, '\t' | '\n' | '\r')
}

#[derive(Debug, Clone, Copy, Default)]
struct ParagraphStyle<'a> {
    style_id: Option<&'a str>,
    centered: bool,
    italic: bool,
}

impl<'a> ParagraphStyle<'a> {
    fn styled(style_id: &'a str) -> Self {
        Self {
            style_id: Some(style_id),
            ..Default::default()
        }
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Builder
// ────────────────────────────────────────────────────────────────────────────

/// Builds the complete `.docx` package for `title` followed by `blocks`.
pub fn build_docx(
    title: &str,
    blocks: &[Block],
    page_size: PageSize,
    margins: Margins,
) -> Result<Vec<u8>, ExportError> {
    let document_xml = document_xml(title, blocks, page_size, margins)?;

    let mut zip = ZipWriter::new(Cursor::new(Vec::new()));
    let options = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);

    let parts: [(&str, &[u8]); 6] = [
        ("[Content_Types].xml", CONTENT_TYPES_XML.as_bytes()),
        ("_rels/.rels", PACKAGE_RELS_XML.as_bytes()),
        ("word/document.xml", document_xml.as_slice()),
        ("word/_rels/document.xml.rels", DOCUMENT_RELS_XML.as_bytes()),
        ("word/styles.xml", STYLES_XML.as_bytes()),
        ("word/footer1.xml", FOOTER_XML.as_bytes()),
    ];
    for (name, bytes) in parts {
        zip.start_file(name, options)?;
        zip.write_all(bytes)?;
    }

    let bytes = zip.finish()?.into_inner();
    debug!(blocks = blocks.len(), bytes = bytes.len(), "DOCX package built");
    Ok(bytes)
}

/// `word/document.xml`: title, blocks, then the section properties.
pub fn document_xml(
    title: &str,
    blocks: &[Block],
    page_size: PageSize,
    margins: Margins,
) -> Result<Vec<u8>, ExportError> {
    let (page_w, page_h) = page_size.dimensions_twips();
    let margins = margins.to_twips();
    let content_width = page_w.saturating_sub(margins.left + margins.right);

    let mut xml = XmlOut::new();
    xml.decl()?;
    xml.start("w:document", &[("xmlns:w", NS_W), ("xmlns:r", NS_R)])?;
    xml.start("w:body", &[])?;

    write_paragraph(
        &mut xml,
        ParagraphStyle {
            style_id: Some("Heading1"),
            centered: true,
            italic: false,
        },
        title,
    )?;

    for block in blocks {
        write_block(&mut xml, block, content_width)?;
    }

    let (w, h) = (page_w.to_string(), page_h.to_string());
    let (top, right, bottom, left) = (
        margins.top.to_string(),
        margins.right.to_string(),
        margins.bottom.to_string(),
        margins.left.to_string(),
    );

    xml.start("w:sectPr", &[])?;
    xml.empty(
        "w:footerReference",
        &[("w:type", "default"), ("r:id", FOOTER_REL_ID)],
    )?;
    if page_size.is_landscape() {
        xml.empty("w:pgSz", &[("w:w", w.as_str()), ("w:h", h.as_str()), ("w:orient", "landscape")])?;
    } else {
        xml.empty("w:pgSz", &[("w:w", w.as_str()), ("w:h", h.as_str())])?;
    }
    xml.empty(
        "w:pgMar",
        &[
            ("w:top", top.as_str()),
            ("w:right", right.as_str()),
            ("w:bottom", bottom.as_str()),
            ("w:left", left.as_str()),
            ("w:header", HEADER_FOOTER_TWIPS),
            ("w:footer", HEADER_FOOTER_TWIPS),
            ("w:gutter", "0"),
        ],
    )?;
    xml.end("w:sectPr")?;

    xml.end("w:body")?;
    xml.end("w:document")?;
    Ok(xml.finish())
}

fn write_block(xml: &mut XmlOut, block: &Block, content_width: u32) -> Result<(), ExportError> {
    match block {
        Block::Heading { level, text } => {
            let style = match level {
                0 | 1 => "Heading1",
                2 => "Heading2",
                _ => "Heading3",
            };
            write_paragraph(xml, ParagraphStyle::styled(style), text)
        }
        Block::Paragraph { text } => write_paragraph(xml, ParagraphStyle::default(), text),
        Block::List { ordered, items } => {
            for (i, item) in items.iter().enumerate() {
                let line = if *ordered {
                    format!("{}. {item}", i + 1)
                } else {
                    format!("\u{2022} {item}")
                };
                write_paragraph(xml, ParagraphStyle::styled("ListParagraph"), &line)?;
            }
            Ok(())
        }
        Block::Table { rows } => write_table(xml, rows, content_width),
        Block::Image { src, alt, .. } => {
            let label = if alt.trim().is_empty() { src } else { alt };
            write_paragraph(
                xml,
                ParagraphStyle {
                    italic: true,
                    ..Default::default()
                },
                &format!("[Gambar: {label}]"),
            )
        }
        Block::Quote { text } => write_paragraph(xml, ParagraphStyle::styled("Quote"), text),
        Block::Code { text } => write_paragraph(xml, ParagraphStyle::styled("Code"), text),
        Block::PageBreak => {
            xml.start("w:p", &[])?;
            xml.start("w:r", &[])?;
            xml.empty("w:br", &[("w:type", "page")])?;
            xml.end("w:r")?;
            xml.end("w:p")
        }
    }
}

/// One paragraph. Newlines inside `text` become line breaks within it.
fn write_paragraph(xml: &mut XmlOut, style: ParagraphStyle<'_>, text: &str) -> Result<(), ExportError> {
    xml.start("w:p", &[])?;
    if style.style_id.is_some() || style.centered {
        xml.start("w:pPr", &[])?;
        if let Some(id) = style.style_id {
            xml.empty("w:pStyle", &[("w:val", id)])?;
        }
        if style.centered {
            xml.empty("w:jc", &[("w:val", "center")])?;
        }
        xml.end("w:pPr")?;
    }

    xml.start("w:r", &[])?;
    if style.italic {
        xml.start("w:rPr", &[])?;
        xml.empty("w:i", &[])?;
        xml.end("w:rPr")?;
    }
    for (i, line) in text.split('\n').enumerate() {
        if i > 0 {
            xml.empty("w:br", &[])?;
        }
        xml.start("w:t", &[("xml:space", "preserve")])?;
        xml.text(line)?;
        xml.end("w:t")?;
    }
    xml.end("w:r")?;

    xml.end("w:p")
}

fn write_table(xml: &mut XmlOut, rows: &[Vec<String>], content_width: u32) -> Result<(), ExportError> {
    let columns = rows.iter().map(Vec::len).max().unwrap_or(0);
    if columns == 0 {
        return Ok(());
    }
    let cell_width = (content_width / columns as u32).to_string();

    xml.start("w:tbl", &[])?;
    xml.start("w:tblPr", &[])?;
    xml.empty("w:tblStyle", &[("w:val", "TableGrid")])?;
    xml.empty("w:tblW", &[("w:w", "0"), ("w:type", "auto")])?;
    xml.end("w:tblPr")?;

    xml.start("w:tblGrid", &[])?;
    for _ in 0..columns {
        xml.empty("w:gridCol", &[("w:w", cell_width.as_str())])?;
    }
    xml.end("w:tblGrid")?;

    for row in rows {
        xml.start("w:tr", &[])?;
        xml.start("w:trPr", &[])?;
        xml.empty("w:cantSplit", &[])?;
        xml.end("w:trPr")?;
        for col in 0..columns {
            xml.start("w:tc", &[])?;
            xml.start("w:tcPr", &[])?;
            xml.empty("w:tcW", &[("w:w", cell_width.as_str()), ("w:type", "dxa")])?;
            xml.end("w:tcPr")?;
            let text = row.get(col).map(String::as_str).unwrap_or("");
            write_paragraph(xml, ParagraphStyle::default(), text)?;
            xml.end("w:tc")?;
        }
        xml.end("w:tr")?;
    }

    xml.end("w:tbl")
}
