//! Text extraction from Office Open XML packages (`.docx`, `.pptx`).
//!
//! Both formats are zip archives of XML parts. Word keeps the body in `word/document.xml`;
//! PowerPoint keeps one `ppt/slides/slideN.xml` part per slide. Paragraph text lives in `t`
//! elements inside `p` elements in either dialect, so one walker serves both.

use super::ParseError;
use quick_xml::{Reader, events::Event};
use std::io::{Cursor, Read};
use zip::ZipArchive;

const WORD_BODY: &str = "word/document.xml";
const SLIDE_PREFIX: &str = "ppt/slides/slide";

/// Non-empty paragraphs of a Word document, one per line.
pub(crate) fn docx_text(bytes: &[u8]) -> Result<String, ParseError> {
    let mut archive = ZipArchive::new(Cursor::new(bytes))?;
    let xml = read_part(&mut archive, WORD_BODY)?;
    Ok(paragraphs(&xml)?.join("\n"))
}

/// Slide text in slide order: paragraphs joined by newlines, slides separated by a blank line.
pub(crate) fn pptx_text(bytes: &[u8]) -> Result<String, ParseError> {
    let mut archive = ZipArchive::new(Cursor::new(bytes))?;
    let mut slides: Vec<(u32, String)> = archive
        .file_names()
        .filter_map(|name| slide_number(name).map(|number| (number, name.to_string())))
        .collect();
    slides.sort_unstable();

    let mut rendered = Vec::with_capacity(slides.len());
    for (_, name) in slides {
        let xml = read_part(&mut archive, &name)?;
        rendered.push(paragraphs(&xml)?.join("\n"));
    }
    Ok(rendered.join("\n\n"))
}

fn slide_number(name: &str) -> Option<u32> {
    name.strip_prefix(SLIDE_PREFIX)?
        .strip_suffix(".xml")?
        .parse()
        .ok()
}

fn read_part(archive: &mut ZipArchive<Cursor<&[u8]>>, name: &str) -> Result<String, ParseError> {
    let mut xml = String::new();
    archive.by_name(name)?.read_to_string(&mut xml)?;
    Ok(xml)
}

/// Collect the text of every `p` element that contains something besides whitespace.
fn paragraphs(xml: &str) -> Result<Vec<String>, ParseError> {
    let mut reader = Reader::from_str(xml);
    let mut paragraphs = Vec::new();
    let mut current = String::new();
    let mut in_text = false;

    loop {
        match reader.read_event()? {
            Event::Start(tag) if tag.local_name().as_ref() == b"t" => in_text = true,
            Event::End(tag) if tag.local_name().as_ref() == b"t" => in_text = false,
            Event::Empty(tag) if tag.local_name().as_ref() == b"br" => current.push('\n'),
            Event::Text(text) if in_text => current.push_str(&text.unescape()?),
            Event::End(tag) if tag.local_name().as_ref() == b"p" => {
                let paragraph = std::mem::take(&mut current);
                if !paragraph.trim().is_empty() {
                    paragraphs.push(paragraph);
                }
            }
            Event::Eof => break,
            _ => {}
        }
    }
    Ok(paragraphs)
}
