use crate::types::Document;
use std::path::Path;

/// Supported output formats
pub const FORMATS: [&str; 3] = ["json", "jsonl", "text"];

/// Pretty JSON array of records
pub fn to_json(docs: &[Document]) -> serde_json::Result<String> {
    serde_json::to_string_pretty(docs)
}

/// One JSON record per line
pub fn to_jsonl(docs: &[Document]) -> serde_json::Result<String> {
    let mut out = String::new();
    for doc in docs {
        out.push_str(&serde_json::to_string(doc)?);
        out.push('\n');
    }
    Ok(out)
}

/// Record contents separated by blank lines
pub fn to_text(docs: &[Document]) -> String {
    let mut out = String::new();
    for (i, doc) in docs.iter().enumerate() {
        if i > 0 {
            out.push_str("\n\n");
        }
        out.push_str(&doc.page_content);
    }
    if !docs.is_empty() {
        out.push('\n');
    }
    out
}

/// Render records in the named format. Unknown formats fall back to json.
pub fn render(docs: &[Document], format: &str) -> crate::Result<String> {
    let rendered = match format {
        "jsonl" => to_jsonl(docs)?,
        "text" => to_text(docs),
        "json" => to_json(docs)?,
        other => {
            tracing::warn!("Unknown output format '{}', using json", other);
            to_json(docs)?
        }
    };
    Ok(rendered)
}

pub fn save_with_format(docs: &[Document], path: &Path, format: &str) -> crate::Result<()> {
    let rendered = render(docs, format)?;
    std::fs::write(path, rendered)?;
    tracing::debug!("Wrote {} records to {} as {}", docs.len(), path.display(), format);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn docs() -> Vec<Document> {
        vec![
            Document::new("Alpha").with_metadata("source", "A"),
            Document::new("Beta").with_metadata("source", "B"),
        ]
    }

    #[test]
    fn test_jsonl_one_record_per_line() {
        let out = to_jsonl(&docs()).unwrap();
        let lines: Vec<&str> = out.lines().collect();
        assert_eq!(lines.len(), 2);
        let first: Document = serde_json::from_str(lines[0]).unwrap();
        assert_eq!(first.page_content, "Alpha");
        assert_eq!(first.source(), Some("A"));
    }

    #[test]
    fn test_text_format() {
        assert_eq!(to_text(&docs()), "Alpha\n\nBeta\n");
        assert_eq!(to_text(&[]), "");
    }

    #[test]
    fn test_unknown_format_falls_back_to_json() {
        let out = render(&docs(), "yaml").unwrap();
        let parsed: Vec<Document> = serde_json::from_str(&out).unwrap();
        assert_eq!(parsed, docs());
    }

    #[test]
    fn test_save_with_format() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.jsonl");
        save_with_format(&docs(), &path, "jsonl").unwrap();
        let written = std::fs::read_to_string(&path).unwrap();
        assert_eq!(written.lines().count(), 2);
    }
}
