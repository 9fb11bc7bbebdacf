// Error kinds for document loading
//
// Fatal errors (file access, decoding, malformed structure) are returned to the
// caller. Revision-level errors are recovered inside the dump loader according
// to its stop_on_error policy and only surface through logging.

use crate::loaders::mediawiki::wikitext::WikitextError;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum IngestError {
    #[error("cannot read {}: {source}", path.display())]
    FileAccess {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("cannot decode input as {encoding}: {reason}")]
    Encoding { encoding: String, reason: String },

    #[error("parse error: {0}")]
    Parse(String),

    #[error("failed to parse revision of page '{title}': {source}")]
    RevisionParse {
        title: String,
        #[source]
        source: WikitextError,
    },

    #[error("no loader supports {}", .0.display())]
    UnsupportedFormat(PathBuf),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl IngestError {
    pub fn file_access(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        IngestError::FileAccess {
            path: path.into(),
            source,
        }
    }
}

impl From<quick_xml::Error> for IngestError {
    fn from(e: quick_xml::Error) -> Self {
        IngestError::Parse(format!("XML: {e}"))
    }
}

impl From<biblatex::ParseError> for IngestError {
    fn from(e: biblatex::ParseError) -> Self {
        IngestError::Parse(format!("BibTeX: {e}"))
    }
}

pub type Result<T> = std::result::Result<T, IngestError>;
