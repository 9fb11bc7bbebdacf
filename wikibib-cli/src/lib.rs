// All loading functionality is in wikibib-core
// This CLI acts as a thin wrapper around the core library

use anyhow::{Context, Result};
use std::io::Write;
use std::path::Path;
use wikibib_core::serialization;

// Re-export core types for convenience
pub use wikibib_core::*;

/// Write records to `output`, or to stdout when no path is given
pub fn write_output(docs: &[Document], output: Option<&Path>, format: &str) -> Result<()> {
    match output {
        Some(path) => serialization::save_with_format(docs, path, format)
            .with_context(|| format!("failed to write {}", path.display())),
        None => {
            let rendered = serialization::render(docs, format)?;
            let mut stdout = std::io::stdout().lock();
            stdout.write_all(rendered.as_bytes())?;
            stdout.flush()?;
            Ok(())
        }
    }
}

/// Bibliography entries as records: raw fields as metadata, no content
pub fn entries_as_documents(entries: Vec<BibEntry>) -> Vec<Document> {
    entries
        .into_iter()
        .map(|entry| Document {
            page_content: String::new(),
            metadata: entry,
        })
        .collect()
}
