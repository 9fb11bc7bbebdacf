// Loader abstraction for document ingestion
//
// A loader owns everything format-specific: reading the file, decoding it and
// turning its contents into Documents. Everything downstream only sees
// Documents.

use crate::error::Result;
use crate::types::Document;
use std::path::Path;

/// Loader trait - converts one source file into Documents
pub trait DocumentLoader {
    /// Load every document from the source, in source order
    fn load(&self) -> Result<Vec<Document>>;

    /// Get loader name for debugging/logging
    fn name(&self) -> &str;

    /// Check if loader supports the given file type
    fn supports_file_type(&self, path: &Path) -> bool;
}

/// Lower-cased file name, for suffix checks like ".xml.gz"
pub(crate) fn lowercase_file_name(path: &Path) -> String {
    path.file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("")
        .to_lowercase()
}
