//! MediaWiki XML export reader
//!
//! Reads an export file (optionally gzip-compressed), decodes it with the
//! requested charset and parses the `<mediawiki>` document into pages and
//! revisions. All of this happens before any text is normalized, so file,
//! charset and XML errors surface before a single record is produced.

use crate::error::{IngestError, Result};
use crate::types::{Page, Revision};
use chrono::{DateTime, Utc};
use encoding_rs::Encoding;
use flate2::read::GzDecoder;
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use std::io::Read;
use std::path::Path;

const GZIP_MAGIC: [u8; 2] = [0x1f, 0x8b];

/// Read, decode and parse a dump file
pub fn read_dump(path: &Path, encoding: &str) -> Result<Vec<Page>> {
    let xml = read_dump_text(path, encoding)?;
    parse_dump(&xml)
}

/// Read a dump file into a string using the given charset label
pub fn read_dump_text(path: &Path, encoding: &str) -> Result<String> {
    let raw = std::fs::read(path).map_err(|e| IngestError::file_access(path, e))?;

    let bytes = if raw.starts_with(&GZIP_MAGIC) {
        let mut inflated = Vec::with_capacity(raw.len() * 4);
        GzDecoder::new(raw.as_slice())
            .read_to_end(&mut inflated)
            .map_err(|e| IngestError::file_access(path, e))?;
        tracing::debug!("Inflated {} -> {} bytes from {}", raw.len(), inflated.len(), path.display());
        inflated
    } else {
        raw
    };

    decode(&bytes, encoding)
}

/// Decode bytes with a WHATWG charset label ("utf8", "utf-8", "latin1", ...)
pub fn decode(bytes: &[u8], label: &str) -> Result<String> {
    let encoding = Encoding::for_label(label.trim().as_bytes()).ok_or_else(|| IngestError::Encoding {
        encoding: label.to_string(),
        reason: "unknown encoding label".to_string(),
    })?;

    let text = encoding
        .decode_without_bom_handling_and_without_replacement(bytes)
        .ok_or_else(|| IngestError::Encoding {
            encoding: label.to_string(),
            reason: format!("input is not valid {}", encoding.name()),
        })?;

    Ok(text.trim_start_matches('\u{feff}').to_string())
}

/// Parse a `<mediawiki>` export into pages, in document order
pub fn parse_dump(xml: &str) -> Result<Vec<Page>> {
    let mut reader = Reader::from_str(xml);
    let mut stack: Vec<String> = Vec::new();
    let mut pages = Vec::new();
    let mut page: Option<Page> = None;
    let mut buf = String::new();
    let mut saw_root = false;

    loop {
        match reader.read_event()? {
            Event::Start(e) => {
                let name = local_name(&e);
                if stack.is_empty() {
                    check_root(&name)?;
                    saw_root = true;
                }
                open_element(stack.last().map(String::as_str), &name, &e, &mut page)?;
                buf.clear();
                stack.push(name);
            }
            Event::Empty(e) => {
                let name = local_name(&e);
                if stack.is_empty() {
                    check_root(&name)?;
                    saw_root = true;
                }
                open_element(stack.last().map(String::as_str), &name, &e, &mut page)?;
            }
            Event::Text(e) => buf.push_str(&e.unescape()?),
            Event::CData(e) => buf.push_str(&String::from_utf8_lossy(&e.into_inner())),
            Event::End(_) => {
                let name = stack.pop().unwrap_or_default();
                let parent = stack.last().map(String::as_str);
                close_element(parent, &name, std::mem::take(&mut buf), &mut page, &mut pages);
            }
            Event::Eof => break,
            _ => {}
        }
    }

    if let Some(open) = stack.last() {
        return Err(IngestError::Parse(format!("unexpected end of dump inside <{open}>")));
    }
    if !saw_root {
        return Err(IngestError::Parse("no <mediawiki> root element".to_string()));
    }

    tracing::debug!("Parsed {} pages from dump", pages.len());
    Ok(pages)
}

fn local_name(e: &BytesStart) -> String {
    String::from_utf8_lossy(e.local_name().as_ref()).into_owned()
}

fn check_root(name: &str) -> Result<()> {
    if name == "mediawiki" {
        Ok(())
    } else {
        Err(IngestError::Parse(format!("expected <mediawiki> root element, found <{name}>")))
    }
}

fn open_element(parent: Option<&str>, name: &str, e: &BytesStart, page: &mut Option<Page>) -> Result<()> {
    match (parent, name) {
        (Some("mediawiki"), "page") => *page = Some(Page::default()),
        (Some("page"), "redirect") => {
            if let Some(page) = page.as_mut() {
                page.redirect = Some(redirect_target(e)?);
            }
        }
        (Some("page"), "revision") => {
            if let Some(page) = page.as_mut() {
                page.revisions.push(Revision::default());
            }
        }
        _ => {}
    }
    Ok(())
}

fn close_element(
    parent: Option<&str>,
    name: &str,
    content: String,
    page: &mut Option<Page>,
    pages: &mut Vec<Page>,
) {
    if let (Some("mediawiki"), "page") = (parent, name) {
        if let Some(done) = page.take() {
            pages.push(done);
        }
        return;
    }

    let Some(page) = page.as_mut() else {
        return;
    };

    match (parent, name) {
        (Some("page"), "title") => page.title = content,
        (Some("page"), "ns") => page.namespace = content.trim().parse().ok(),
        (Some("revision"), field) => {
            let Some(revision) = page.revisions.last_mut() else {
                return;
            };
            match field {
                "id" => revision.id = Some(content.trim().to_string()),
                "timestamp" => revision.timestamp = parse_timestamp(&content),
                "text" => revision.text = Some(content),
                _ => {}
            }
        }
        _ => {}
    }
}

fn redirect_target(e: &BytesStart) -> Result<String> {
    let attr = e
        .try_get_attribute("title")
        .map_err(|err| IngestError::Parse(format!("bad <redirect> attribute: {err}")))?;
    match attr {
        Some(attr) => Ok(attr.unescape_value()?.into_owned()),
        None => Ok(String::new()),
    }
}

fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    match DateTime::parse_from_rfc3339(raw.trim()) {
        Ok(ts) => Some(ts.with_timezone(&Utc)),
        Err(e) => {
            tracing::debug!("Ignoring malformed revision timestamp '{}': {}", raw, e);
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    const SAMPLE_XML: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<mediawiki xmlns="http://www.mediawiki.org/xml/export-0.10/" version="0.10" xml:lang="en">
  <siteinfo>
    <sitename>Test Wiki</sitename>
  </siteinfo>
  <page>
    <title>Test Article</title>
    <ns>0</ns>
    <id>12345</id>
    <revision>
      <id>100</id>
      <timestamp>2024-01-15T10:30:00Z</timestamp>
      <contributor><username>Alice</username><id>7</id></contributor>
      <text xml:space="preserve">First &amp; '''bold''' &lt;b&gt;</text>
    </revision>
    <revision>
      <id>101</id>
      <text bytes="0" />
    </revision>
  </page>
  <page>
    <title>Old Name</title>
    <ns>0</ns>
    <redirect title="Test &amp; Article" />
    <revision>
      <id>102</id>
      <text>#REDIRECT [[Test Article]]</text>
    </revision>
  </page>
</mediawiki>
"#;

    #[test]
    fn test_parse_pages_and_revisions() {
        let pages = parse_dump(SAMPLE_XML).unwrap();
        assert_eq!(pages.len(), 2);

        let first = &pages[0];
        assert_eq!(first.title, "Test Article");
        assert_eq!(first.namespace, Some(0));
        assert!(!first.is_redirect());
        assert_eq!(first.revisions.len(), 2);

        let rev = &first.revisions[0];
        assert_eq!(rev.id.as_deref(), Some("100"));
        assert_eq!(rev.text.as_deref(), Some("First & '''bold''' <b>"));
        assert_eq!(rev.timestamp.unwrap().to_rfc3339(), "2024-01-15T10:30:00+00:00");

        // Self-closing <text/> marks a deleted revision
        assert_eq!(first.revisions[1].id.as_deref(), Some("101"));
        assert!(first.revisions[1].text.is_none());
    }

    #[test]
    fn test_redirect_target() {
        let pages = parse_dump(SAMPLE_XML).unwrap();
        assert_eq!(pages[1].redirect.as_deref(), Some("Test & Article"));
        assert!(pages[1].is_redirect());
    }

    #[test]
    fn test_page_without_revisions() {
        let xml = "<mediawiki><page><title>Empty</title></page></mediawiki>";
        let pages = parse_dump(xml).unwrap();
        assert_eq!(pages.len(), 1);
        assert!(pages[0].revisions.is_empty());
    }

    #[test]
    fn test_cdata_text() {
        let xml = "<mediawiki><page><title>C</title><revision><text><![CDATA[a < b]]></text></revision></page></mediawiki>";
        let pages = parse_dump(xml).unwrap();
        assert_eq!(pages[0].revisions[0].text.as_deref(), Some("a < b"));
    }

    #[test]
    fn test_truncated_dump_is_parse_error() {
        let xml = "<mediawiki><page><title>Cut";
        let err = parse_dump(xml).unwrap_err();
        assert!(matches!(err, IngestError::Parse(_)));
    }

    #[test]
    fn test_mismatched_tags_is_parse_error() {
        let xml = "<mediawiki><page><title>X</page></title></mediawiki>";
        assert!(matches!(parse_dump(xml), Err(IngestError::Parse(_))));
    }

    #[test]
    fn test_wrong_root_is_parse_error() {
        assert!(matches!(parse_dump("<html></html>"), Err(IngestError::Parse(_))));
        assert!(matches!(parse_dump(""), Err(IngestError::Parse(_))));
    }

    #[test]
    fn test_decode_labels() {
        assert_eq!(decode("héllo".as_bytes(), "utf8").unwrap(), "héllo");
        assert_eq!(decode(&[0x68, 0xe9], "latin1").unwrap(), "hé");
        assert_eq!(decode(b"\xef\xbb\xbf<x/>", "utf-8").unwrap(), "<x/>");
    }

    #[test]
    fn test_decode_errors() {
        let err = decode(b"abc", "no-such-charset").unwrap_err();
        assert!(matches!(err, IngestError::Encoding { .. }));

        let err = decode(&[0x68, 0xe9, 0x28], "utf8").unwrap_err();
        assert!(matches!(err, IngestError::Encoding { .. }));
    }

    #[test]
    fn test_read_gzip_dump() {
        use flate2::write::GzEncoder;
        use flate2::Compression;

        let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(SAMPLE_XML.as_bytes()).unwrap();
        let compressed = encoder.finish().unwrap();

        let mut file = tempfile::Builder::new().suffix(".xml.gz").tempfile().unwrap();
        file.write_all(&compressed).unwrap();

        let pages = read_dump(file.path(), "utf8").unwrap();
        assert_eq!(pages.len(), 2);
        assert_eq!(pages[0].title, "Test Article");
    }

    #[test]
    fn test_missing_file_is_file_access_error() {
        let err = read_dump(Path::new("/nonexistent/dump.xml"), "utf8").unwrap_err();
        assert!(matches!(err, IngestError::FileAccess { .. }));
    }
}
