//! Publisher metadata parsing

use crate::error::{TransferError, TransferResult};
use chrono::NaiveDate;
use quick_xml::events::Event;
use quick_xml::Reader;
use std::fs;
use std::path::Path;

/// Reads the publication date from a publisher metadata XML file
///
/// The date is the trimmed text of the first element whose local name is
/// `element`, parsed with the chrono `format` string. Namespace prefixes are
/// ignored when matching the element.
pub fn publication_date(path: &Path, element: &str, format: &str) -> TransferResult<NaiveDate> {
    let content = fs::read_to_string(path).map_err(|e| TransferError::io(path, e))?;
    let text = element_text(&content, element)?.ok_or_else(|| {
        TransferError::Metadata(format!(
            "no <{}> element in {}",
            element,
            path.display()
        ))
    })?;

    NaiveDate::parse_from_str(text.trim(), format).map_err(|e| {
        TransferError::Metadata(format!(
            "unparsable publication date {:?} in {}: {}",
            text.trim(),
            path.display(),
            e
        ))
    })
}

/// Text content of the first `element` in `content`
fn element_text(content: &str, element: &str) -> TransferResult<Option<String>> {
    let mut reader = Reader::from_str(content);
    reader.config_mut().trim_text(true);

    let mut inside = false;
    let mut text = String::new();
    let mut buf = Vec::new();

    loop {
        match reader.read_event_into(&mut buf)? {
            Event::Start(e) if !inside && e.local_name().as_ref() == element.as_bytes() => {
                inside = true;
            }
            Event::Empty(e) if !inside && e.local_name().as_ref() == element.as_bytes() => {
                return Ok(Some(String::new()));
            }
            Event::Text(e) if inside => {
                text.push_str(&e.unescape()?);
            }
            Event::CData(e) if inside => {
                text.push_str(&String::from_utf8_lossy(&e.into_inner()));
            }
            Event::End(e) if inside && e.local_name().as_ref() == element.as_bytes() => {
                return Ok(Some(text));
            }
            Event::Eof => {
                if inside {
                    return Err(TransferError::Metadata(format!(
                        "unterminated <{}> element",
                        element
                    )));
                }
                return Ok(None);
            }
            _ => {}
        }
        buf.clear();
    }
}
