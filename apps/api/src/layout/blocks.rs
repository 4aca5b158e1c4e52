//! Document blocks: the virtual block tree the pagination pass flows onto pages.
//!
//! Blocks come from two sources:
//! - authored HTML from the editor surface (`parse_html`, a tolerant quick-xml pass
//!   that accepts unclosed void elements and mismatched end tags), and
//! - the markdown-lite plain text the AI services produce (`parse_plain_text`).
//!
//! Inline formatting is flattened to text; only block structure survives.

use std::borrow::Cow;

use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use serde::{Deserialize, Deserializer, Serialize};
use thiserror::Error;
use tracing::warn;

/// Plain-text page-break marker (form feed on its own line).
pub const PLAIN_PAGE_BREAK: char = '\u{000C}';

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum Block {
    Heading { level: u8, text: String },
    /// Text is kept whitespace-collapsed so page fragments rejoin with single spaces.
    Paragraph {
        #[serde(deserialize_with = "collapsed_string")]
        text: String,
    },
    List { ordered: bool, items: Vec<String> },
    Table { rows: Vec<Vec<String>> },
    #[serde(rename_all = "camelCase")]
    Image {
        src: String,
        alt: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        height_px: Option<f32>,
    },
    Quote { text: String },
    Code { text: String },
    PageBreak,
}

impl Block {
    pub fn paragraph(text: impl AsRef<str>) -> Self {
        Block::Paragraph {
            text: collapse_whitespace(text.as_ref()),
        }
    }

    pub fn heading(level: u8, text: impl Into<String>) -> Self {
        Block::Heading {
            level: level.clamp(1, 6),
            text: text.into(),
        }
    }

    pub fn is_page_break(&self) -> bool {
        matches!(self, Block::PageBreak)
    }

    /// Text content of the block, flattened. Lists are newline-joined; tables are
    /// tab-separated per row.
    pub fn text(&self) -> String {
        match self {
            Block::Heading { text, .. }
            | Block::Paragraph { text }
            | Block::Quote { text }
            | Block::Code { text } => text.clone(),
            Block::List { ordered, items } => items
                .iter()
                .enumerate()
                .map(|(i, item)| {
                    if *ordered {
                        format!("{}. {item}", i + 1)
                    } else {
                        format!("- {item}")
                    }
                })
                .collect::<Vec<_>>()
                .join("\n"),
            Block::Table { rows } => rows
                .iter()
                .map(|r| r.join("\t"))
                .collect::<Vec<_>>()
                .join("\n"),
            Block::Image { alt, .. } => alt.clone(),
            Block::PageBreak => String::new(),
        }
    }

    /// Serializes the block back to editor HTML.
    pub fn to_html(&self) -> String {
        match self {
            Block::Heading { level, text } => format!("<h{level}>{}</h{level}>", escape_html(text)),
            Block::Paragraph { text } if text.is_empty() => "<p><br></p>".to_string(),
            Block::Paragraph { text } => format!("<p>{}</p>", escape_html(text)),
            Block::List { ordered, items } => {
                let tag = if *ordered { "ol" } else { "ul" };
                let lis: String = items
                    .iter()
                    .map(|i| format!("<li>{}</li>", escape_html(i)))
                    .collect();
                format!("<{tag}>{lis}</{tag}>")
            }
            Block::Table { rows } => {
                let trs: String = rows
                    .iter()
                    .map(|row| {
                        let tds: String = row
                            .iter()
                            .map(|c| format!("<td>{}</td>", escape_html(c)))
                            .collect();
                        format!("<tr>{tds}</tr>")
                    })
                    .collect();
                format!("<table>{trs}</table>")
            }
            Block::Image { src, alt, height_px } => match height_px {
                Some(h) => format!(
                    "<img src=\"{}\" alt=\"{}\" height=\"{}\">",
                    escape_html(src),
                    escape_html(alt),
                    h.round()
                ),
                None => format!("<img src=\"{}\" alt=\"{}\">", escape_html(src), escape_html(alt)),
            },
            Block::Quote { text } => format!("<blockquote>{}</blockquote>", escape_html(text)),
            Block::Code { text } => format!("<pre>{}</pre>", escape_html(text)),
            Block::PageBreak => "<hr class=\"page-break\">".to_string(),
        }
    }
}

/// Renders a block list as editor HTML.
pub fn blocks_to_html(blocks: &[Block]) -> String {
    blocks.iter().map(Block::to_html).collect()
}

/// Renders a block list as plain text: blocks separated by blank lines,
/// page breaks as a form feed line.
pub fn blocks_to_plain_text(blocks: &[Block]) -> String {
    blocks
        .iter()
        .map(|b| match b {
            Block::PageBreak => PLAIN_PAGE_BREAK.to_string(),
            other => other.text(),
        })
        .collect::<Vec<_>>()
        .join("\n\n")
}

pub fn escape_html(s: &str) -> Cow<'_, str> {
    quick_xml::escape::escape(s)
}

// ────────────────────────────────────────────────────────────────────────────
// Plain text (markdown-lite) parsing
// ────────────────────────────────────────────────────────────────────────────

/// Parses the plain text the AI endpoints return.
///
/// Recognized line forms: `#`..`######` headings, `- ` / `* ` / `• ` unordered
/// items, `1. ` / `1) ` ordered items, a lone form feed as a page break. Every other
/// non-blank line is its own paragraph; consecutive list lines form one list.
pub fn parse_plain_text(text: &str) -> Vec<Block> {
    let mut blocks = Vec::new();
    let mut list: Option<(bool, Vec<String>)> = None;

    let flush_list = |list: &mut Option<(bool, Vec<String>)>, blocks: &mut Vec<Block>| {
        if let Some((ordered, items)) = list.take() {
            blocks.push(Block::List { ordered, items });
        }
    };

    for raw in text.lines() {
        if raw.contains(PLAIN_PAGE_BREAK) && raw.chars().all(char::is_whitespace) {
            flush_list(&mut list, &mut blocks);
            blocks.push(Block::PageBreak);
            continue;
        }
        let line = raw.trim();
        if line.is_empty() {
            flush_list(&mut list, &mut blocks);
            continue;
        }
        if let Some((level, rest)) = heading_prefix(line) {
            flush_list(&mut list, &mut blocks);
            blocks.push(Block::heading(level, rest));
            continue;
        }
        if let Some((ordered, rest)) = list_prefix(line) {
            match list.as_mut() {
                Some((o, items)) if *o == ordered => items.push(rest.to_string()),
                _ => {
                    flush_list(&mut list, &mut blocks);
                    list = Some((ordered, vec![rest.to_string()]));
                }
            }
            continue;
        }
        flush_list(&mut list, &mut blocks);
        blocks.push(Block::paragraph(line));
    }
    flush_list(&mut list, &mut blocks);
    blocks
}

fn heading_prefix(line: &str) -> Option<(u8, &str)> {
    let hashes = line.chars().take_while(|c| *c == '#').count();
    if hashes == 0 || hashes > 6 {
        return None;
    }
    let rest = line[hashes..].strip_prefix(' ')?;
    Some((hashes as u8, rest.trim()))
}

fn list_prefix(line: &str) -> Option<(bool, &str)> {
    for marker in ["- ", "* ", "• "] {
        if let Some(rest) = line.strip_prefix(marker) {
            return Some((false, rest.trim()));
        }
    }
    let digits = line.chars().take_while(|c| c.is_ascii_digit()).count();
    if digits == 0 {
        return None;
    }
    let rest = &line[digits..];
    let rest = rest.strip_prefix(". ").or_else(|| rest.strip_prefix(") "))?;
    Some((true, rest.trim()))
}

pub fn collapse_whitespace(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn collapsed_string<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = String::deserialize(deserializer)?;
    Ok(collapse_whitespace(&raw))
}

// ────────────────────────────────────────────────────────────────────────────
// HTML parsing
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Error)]
#[error("HTML parse error at byte {position}: {message}")]
pub struct HtmlParseError {
    pub position: u64,
    pub message: String,
}

/// Parses editor HTML into blocks.
///
/// Tolerates contenteditable output: bare top-level text, `<br>` line breaks,
/// unclosed void elements. Manual page breaks are any element carrying the
/// `page-break` class, a `data-page-break` attribute, or a CSS page-break style.
pub fn parse_html(html: &str) -> Result<Vec<Block>, HtmlParseError> {
    let mut reader = Reader::from_str(html);
    {
        let config = reader.config_mut();
        config.trim_text(false);
        config.check_end_names = false;
        config.allow_unmatched_ends = true;
    }

    let mut builder = HtmlBlockBuilder::default();

    loop {
        let event = reader.read_event().map_err(|e| HtmlParseError {
            position: reader.buffer_position() as u64,
            message: e.to_string(),
        })?;
        match event {
            Event::Start(e) => {
                let name = tag_name(&e);
                builder.start(&name, &e);
                if is_void(&name) {
                    builder.end(&name);
                }
            }
            Event::Empty(e) => {
                let name = tag_name(&e);
                builder.start(&name, &e);
                builder.end(&name);
            }
            Event::End(e) => {
                let name = String::from_utf8_lossy(e.name().as_ref()).to_ascii_lowercase();
                if !is_void(&name) {
                    builder.end(&name);
                }
            }
            Event::Text(t) => {
                let raw = String::from_utf8_lossy(&t).into_owned();
                let text = match quick_xml::escape::unescape_with(&raw, resolve_html_entity) {
                    Ok(unescaped) => unescaped.into_owned(),
                    Err(_) => raw.clone(),
                };
                builder.text(&text);
            }
            Event::CData(t) => {
                builder.text(&String::from_utf8_lossy(&t));
            }
            Event::Eof => break,
            _ => {}
        }
    }

    Ok(builder.finish())
}

/// Blocks for a document sent as optional HTML plus plain text. Non-blank HTML
/// wins; HTML that fails to parse falls back to its tag-stripped text.
pub fn document_blocks(html: Option<&str>, text: &str) -> Vec<Block> {
    match html.filter(|h| !h.trim().is_empty()) {
        Some(html) => match parse_html(html) {
            Ok(blocks) => blocks,
            Err(e) => {
                warn!(error = %e, "Unparseable document HTML, falling back to plain text");
                parse_plain_text(&strip_tags(html))
            }
        },
        None => parse_plain_text(text),
    }
}

/// Strips tags, the same way the editor derives plain text for export.
pub fn strip_tags(html: &str) -> String {
    let mut out = String::with_capacity(html.len());
    let mut in_tag = false;
    for c in html.chars() {
        match c {
            '<' => in_tag = true,
            '>' if in_tag => in_tag = false,
            _ if !in_tag => out.push(c),
            _ => {}
        }
    }
    out
}

fn tag_name(e: &BytesStart<'_>) -> String {
    String::from_utf8_lossy(e.name().as_ref()).to_ascii_lowercase()
}

fn is_void(name: &str) -> bool {
    matches!(
        name,
        "br" | "img" | "hr" | "meta" | "link" | "input" | "wbr" | "col" | "source"
    )
}

fn resolve_html_entity(entity: &str) -> Option<&'static str> {
    match entity {
        "amp" => Some("&"),
        "lt" => Some("<"),
        "gt" => Some(">"),
        "quot" => Some("\""),
        "apos" => Some("'"),
        "nbsp" => Some("\u{a0}"),
        "mdash" => Some("\u{2014}"),
        "ndash" => Some("\u{2013}"),
        "hellip" => Some("\u{2026}"),
        "laquo" => Some("\u{ab}"),
        "raquo" => Some("\u{bb}"),
        "ldquo" => Some("\u{201c}"),
        "rdquo" => Some("\u{201d}"),
        "lsquo" => Some("\u{2018}"),
        "rsquo" => Some("\u{2019}"),
        "bull" => Some("\u{2022}"),
        "copy" => Some("\u{a9}"),
        _ => None,
    }
}

/// Attribute lookup over HTML-style attributes (unquoted / valueless allowed).
fn attr(e: &BytesStart<'_>, key: &str) -> Option<String> {
    e.html_attributes().flatten().find_map(|a| {
        if a.key.as_ref().eq_ignore_ascii_case(key.as_bytes()) {
            Some(String::from_utf8_lossy(&a.value).into_owned())
        } else {
            None
        }
    })
}

fn is_page_break_marker(e: &BytesStart<'_>) -> bool {
    if attr(e, "data-page-break").is_some() {
        return true;
    }
    if let Some(class) = attr(e, "class") {
        if class.split_whitespace().any(|c| c == "page-break") {
            return true;
        }
    }
    if let Some(style) = attr(e, "style") {
        let style: String = style
            .to_ascii_lowercase()
            .chars()
            .filter(|c| !c.is_whitespace())
            .collect();
        return style.contains("page-break-after:always")
            || style.contains("page-break-before:always")
            || style.contains("break-after:page")
            || style.contains("break-before:page");
    }
    false
}

/// Parses `"240"`, `"240px"` or a `height: 240px` style declaration.
fn parse_px(value: &str) -> Option<f32> {
    let v = value.trim().trim_end_matches("px").trim();
    v.parse::<f32>().ok().filter(|h| h.is_finite() && *h >= 0.0)
}

fn image_height(e: &BytesStart<'_>) -> Option<f32> {
    if let Some(h) = attr(e, "height").and_then(|h| parse_px(&h)) {
        return Some(h);
    }
    let style = attr(e, "style")?;
    style.split(';').find_map(|decl| {
        let (k, v) = decl.split_once(':')?;
        if k.trim().eq_ignore_ascii_case("height") {
            parse_px(v)
        } else {
            None
        }
    })
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum Capture {
    /// `implicit` marks bare top-level text not wrapped in any block element.
    Paragraph { implicit: bool },
    Heading(u8),
    Quote,
    Code,
    ListItem,
    Cell,
}

#[derive(Debug, Default)]
struct ListBuilder {
    ordered: bool,
    items: Vec<String>,
    depth: u32,
}

#[derive(Debug, Default)]
struct TableBuilder {
    rows: Vec<Vec<String>>,
    depth: u32,
}

#[derive(Debug, Default)]
struct HtmlBlockBuilder {
    blocks: Vec<Block>,
    capture: Option<Capture>,
    text: String,
    saw_line_break: bool,
    list: Option<ListBuilder>,
    table: Option<TableBuilder>,
    skip_depth: u32,
}

impl HtmlBlockBuilder {
    fn in_container(&self) -> bool {
        self.list.is_some() || self.table.is_some()
    }

    /// Closes the current capture and emits whatever it produced.
    fn flush(&mut self) {
        let Some(capture) = self.capture.take() else {
            self.text.clear();
            return;
        };
        let raw = std::mem::take(&mut self.text);
        let saw_break = std::mem::replace(&mut self.saw_line_break, false);
        let text = collapse_whitespace(&raw);

        match capture {
            Capture::Paragraph { .. } => {
                if !text.is_empty() || saw_break {
                    self.blocks.push(Block::paragraph(text));
                }
            }
            Capture::Heading(level) if !text.is_empty() => {
                self.blocks.push(Block::heading(level, text));
            }
            Capture::Quote if !text.is_empty() => self.blocks.push(Block::Quote { text }),
            Capture::Code => {
                let code = raw.trim_matches('\n').to_string();
                if !code.trim().is_empty() {
                    self.blocks.push(Block::Code { text: code });
                }
            }
            Capture::ListItem => {
                if let (Some(list), false) = (self.list.as_mut(), text.is_empty()) {
                    list.items.push(text);
                }
            }
            Capture::Cell => {
                if let Some(table) = self.table.as_mut() {
                    if table.rows.is_empty() {
                        table.rows.push(Vec::new());
                    }
                    if let Some(row) = table.rows.last_mut() {
                        row.push(text);
                    }
                }
            }
            _ => {}
        }
    }

    fn begin(&mut self, capture: Capture) {
        if self.in_container() {
            // Block markup nested in list items or cells flattens to text.
            self.text.push(' ');
            return;
        }
        self.flush();
        self.capture = Some(capture);
    }

    fn start(&mut self, name: &str, e: &BytesStart<'_>) {
        if self.skip_depth > 0 || matches!(name, "script" | "style" | "head" | "title") {
            self.skip_depth += 1;
            return;
        }

        if is_page_break_marker(e) {
            if !self.in_container() {
                self.flush();
                self.blocks.push(Block::PageBreak);
            }
            return;
        }

        match name {
            "h1" | "h2" | "h3" | "h4" | "h5" | "h6" => {
                let level = name[1..].parse::<u8>().unwrap_or(1);
                self.begin(Capture::Heading(level));
            }
            "p" | "div" | "section" | "article" | "header" | "footer" => {
                self.begin(Capture::Paragraph { implicit: false })
            }
            "blockquote" => self.begin(Capture::Quote),
            "pre" => self.begin(Capture::Code),
            "ul" | "ol" => {
                if self.table.is_some() {
                    self.text.push(' ');
                } else if let Some(list) = self.list.as_mut() {
                    list.depth += 1;
                } else {
                    self.flush();
                    self.list = Some(ListBuilder {
                        ordered: name == "ol",
                        items: Vec::new(),
                        depth: 1,
                    });
                }
            }
            "li" => {
                if self.list.is_some() {
                    if self.capture == Some(Capture::ListItem) {
                        self.flush();
                    }
                    self.capture = Some(Capture::ListItem);
                }
            }
            "table" => {
                if let Some(table) = self.table.as_mut() {
                    table.depth += 1;
                } else if self.list.is_none() {
                    self.flush();
                    self.table = Some(TableBuilder {
                        rows: Vec::new(),
                        depth: 1,
                    });
                }
            }
            "tr" => {
                if self.table.as_ref().is_some_and(|t| t.depth == 1) {
                    if self.capture == Some(Capture::Cell) {
                        self.flush();
                    }
                    if let Some(table) = self.table.as_mut() {
                        table.rows.push(Vec::new());
                    }
                }
            }
            "td" | "th" => {
                if self.table.as_ref().is_some_and(|t| t.depth == 1) {
                    if self.capture == Some(Capture::Cell) {
                        self.flush();
                    }
                    self.capture = Some(Capture::Cell);
                }
            }
            "br" => {
                if self.capture == Some(Capture::Code) {
                    self.text.push('\n');
                } else if self.capture == Some(Capture::Paragraph { implicit: true }) {
                    // Bare text lines separated by <br> render as separate lines.
                    self.saw_line_break = self.text.trim().is_empty();
                    self.flush();
                    self.capture = Some(Capture::Paragraph { implicit: true });
                } else if self.capture.is_none() && !self.in_container() {
                    self.saw_line_break = true;
                    self.capture = Some(Capture::Paragraph { implicit: true });
                    self.flush();
                } else {
                    self.text.push(' ');
                    self.saw_line_break = true;
                }
            }
            "img" => {
                let src = attr(e, "src").unwrap_or_default();
                let alt = attr(e, "alt").unwrap_or_default();
                if self.in_container() {
                    self.text.push_str(&alt);
                } else {
                    self.flush();
                    self.blocks.push(Block::Image {
                        src,
                        alt,
                        height_px: image_height(e),
                    });
                }
            }
            _ => {}
        }
    }

    fn end(&mut self, name: &str) {
        if self.skip_depth > 0 {
            self.skip_depth -= 1;
            return;
        }
        match name {
            "h1" | "h2" | "h3" | "h4" | "h5" | "h6" | "p" | "div" | "section" | "article"
            | "header" | "footer" | "blockquote" | "pre" => {
                if !self.in_container() {
                    self.flush();
                }
            }
            "li" => {
                if self.capture == Some(Capture::ListItem) {
                    self.flush();
                }
            }
            "ul" | "ol" => {
                let done = match self.list.as_mut() {
                    Some(list) => {
                        list.depth = list.depth.saturating_sub(1);
                        list.depth == 0
                    }
                    None => false,
                };
                if done {
                    self.flush();
                    if let Some(list) = self.list.take() {
                        if !list.items.is_empty() {
                            self.blocks.push(Block::List {
                                ordered: list.ordered,
                                items: list.items,
                            });
                        }
                    }
                }
            }
            "td" | "th" => {
                if self.capture == Some(Capture::Cell) {
                    self.flush();
                }
            }
            "table" => {
                let done = match self.table.as_mut() {
                    Some(table) => {
                        table.depth = table.depth.saturating_sub(1);
                        table.depth == 0
                    }
                    None => false,
                };
                if done {
                    self.flush();
                    if let Some(table) = self.table.take() {
                        let rows: Vec<Vec<String>> =
                            table.rows.into_iter().filter(|r| !r.is_empty()).collect();
                        if !rows.is_empty() {
                            self.blocks.push(Block::Table { rows });
                        }
                    }
                }
            }
            _ => {}
        }
    }

    fn text(&mut self, text: &str) {
        if self.skip_depth > 0 {
            return;
        }
        if self.capture.is_none() {
            if self.in_container() || text.trim().is_empty() {
                return;
            }
            self.capture = Some(Capture::Paragraph { implicit: true });
        }
        self.text.push_str(text);
    }

    fn finish(mut self) -> Vec<Block> {
        self.flush();
        if let Some(list) = self.list.take() {
            if !list.items.is_empty() {
                self.blocks.push(Block::List {
                    ordered: list.ordered,
                    items: list.items,
                });
            }
        }
        if let Some(table) = self.table.take() {
            let rows: Vec<Vec<String>> = table.rows.into_iter().filter(|r| !r.is_empty()).collect();
            if !rows.is_empty() {
                self.blocks.push(Block::Table { rows });
            }
        }
        self.blocks
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Tests
// ────────────────────────────────────────────────────────────────────────────
