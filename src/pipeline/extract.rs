//! Text extraction for structured (word-processor) documents.
//!
//! [`DocxExtractor`] reads `word/document.xml` out of the OOXML container and
//! emits one HTML-ish line per paragraph: `<h1>`..`<h6>` for heading styles,
//! `<li>` for numbered/bulleted paragraphs and `<p>` otherwise. Run
//! formatting is dropped; the restructure pass only needs the block outline.

use crate::error::CapabilityError;
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use std::io::{Cursor, Read};
use zip::ZipArchive;

/// Turns a structured document into text the restructure pass can work on.
pub trait DocumentExtractor: Send + Sync {
    fn extract(&self, bytes: &[u8]) -> Result<String, CapabilityError>;
}

/// Extractor for `.docx` (OOXML) documents.
#[derive(Debug, Default, Clone, Copy)]
pub struct DocxExtractor;

impl DocumentExtractor for DocxExtractor {
    fn extract(&self, bytes: &[u8]) -> Result<String, CapabilityError> {
        let mut archive = ZipArchive::new(Cursor::new(bytes))
            .map_err(|e| CapabilityError::Malformed(format!("not an OOXML container: {e}")))?;

        let mut xml = String::new();
        archive
            .by_name("word/document.xml")
            .map_err(|e| CapabilityError::Malformed(format!("word/document.xml: {e}")))?
            .read_to_string(&mut xml)
            .map_err(|e| CapabilityError::Malformed(format!("word/document.xml: {e}")))?;

        let blocks = parse_document_xml(&xml)?;
        if blocks.is_empty() {
            return Err(CapabilityError::EmptyResponse);
        }
        Ok(blocks
            .iter()
            .map(Block::to_html)
            .collect::<Vec<_>>()
            .join("\n"))
    }
}

#[derive(Debug, Default, Clone, PartialEq, Eq)]
enum BlockStyle {
    #[default]
    Paragraph,
    Heading(u8),
    ListItem,
}

#[derive(Debug, Default, Clone, PartialEq, Eq)]
struct Block {
    style: BlockStyle,
    text: String,
}

impl Block {
    fn to_html(&self) -> String {
        let text = escape_text(self.text.trim());
        match self.style {
            BlockStyle::Paragraph => format!("<p>{text}</p>"),
            BlockStyle::Heading(level) => format!("<h{level}>{text}</h{level}>"),
            BlockStyle::ListItem => format!("<li>{text}</li>"),
        }
    }
}

fn parse_document_xml(xml: &str) -> Result<Vec<Block>, CapabilityError> {
    let mut reader = Reader::from_str(xml);
    let mut buf = Vec::new();
    let mut blocks = Vec::new();
    let mut current = Block::default();
    let mut in_paragraph = false;
    let mut in_text = false;

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(ref e)) => match e.local_name().as_ref() {
                b"p" => {
                    in_paragraph = true;
                    current = Block::default();
                }
                b"t" => in_text = true,
                b"pStyle" if in_paragraph => apply_style(e, &mut current),
                b"numPr" if in_paragraph => current.style = BlockStyle::ListItem,
                _ => {}
            },
            Ok(Event::Empty(ref e)) => match e.local_name().as_ref() {
                b"pStyle" if in_paragraph => apply_style(e, &mut current),
                b"numPr" if in_paragraph => current.style = BlockStyle::ListItem,
                b"tab" if in_paragraph => current.text.push('\t'),
                b"br" if in_paragraph => current.text.push(' '),
                _ => {}
            },
            Ok(Event::End(ref e)) => match e.local_name().as_ref() {
                b"p" => {
                    in_paragraph = false;
                    if !current.text.trim().is_empty() {
                        blocks.push(std::mem::take(&mut current));
                    }
                }
                b"t" => in_text = false,
                _ => {}
            },
            Ok(Event::Text(e)) => {
                if in_text && in_paragraph {
                    current.text.push_str(&e.unescape().unwrap_or_default());
                }
            }
            Ok(Event::Eof) => break,
            Err(e) => {
                return Err(CapabilityError::Malformed(format!(
                    "XML parse error at {}: {e}",
                    reader.buffer_position()
                )))
            }
            _ => {}
        }
        buf.clear();
    }

    Ok(blocks)
}

/// `Heading1`..`Heading6` and `Title` become headings.
fn apply_style(e: &BytesStart, block: &mut Block) {
    let Some(val) = get_attribute(e, "val") else {
        return;
    };
    if val.eq_ignore_ascii_case("title") {
        block.style = BlockStyle::Heading(1);
    } else if let Some(level) = val
        .strip_prefix("Heading")
        .or_else(|| val.strip_prefix("heading"))
        .and_then(|n| n.trim().parse::<u8>().ok())
    {
        block.style = BlockStyle::Heading(level.clamp(1, 6));
    } else if val.starts_with("List") {
        block.style = BlockStyle::ListItem;
    }
}

fn get_attribute(e: &BytesStart, name: &str) -> Option<String> {
    for attr in e.attributes().flatten() {
        if attr.key.local_name().as_ref() == name.as_bytes() {
            return Some(String::from_utf8_lossy(&attr.value).to_string());
        }
    }
    None
}

fn escape_text(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}
