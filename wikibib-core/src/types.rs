use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

// ===== OUTPUT RECORDS =====

/// A loaded document: normalized plain text plus string metadata.
///
/// Dump records always carry a `source` key holding the page title.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Document {
    pub page_content: String,
    #[serde(default)]
    pub metadata: BTreeMap<String, String>,
}

impl Document {
    pub fn new(page_content: impl Into<String>) -> Self {
        Self {
            page_content: page_content.into(),
            metadata: BTreeMap::new(),
        }
    }

    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }

    /// The `source` metadata value, if any
    pub fn source(&self) -> Option<&str> {
        self.metadata.get("source").map(String::as_str)
    }
}

// ===== MEDIAWIKI DUMP MODEL =====

/// One page of a MediaWiki XML export
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Page {
    pub title: String,
    /// `<ns>` value; exports without it are treated as main namespace by filters
    pub namespace: Option<i32>,
    /// Redirect target from `<redirect title="..."/>`. An empty string still
    /// marks the page as a redirect.
    pub redirect: Option<String>,
    pub revisions: Vec<Revision>,
}

impl Page {
    pub fn is_redirect(&self) -> bool {
        self.redirect.is_some()
    }
}

/// One revision of a page. Deleted revisions have no text.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Revision {
    pub id: Option<String>,
    pub timestamp: Option<DateTime<Utc>>,
    pub text: Option<String>,
}

impl Revision {
    pub fn text_or_empty(&self) -> &str {
        self.text.as_deref().unwrap_or("")
    }
}

// ===== BIBTEX MODEL =====

/// Raw BibTeX entry: `ID`, `ENTRYTYPE` and every field under its lower-cased name
pub type BibEntry = BTreeMap<String, String>;

/// Normalized metadata for one entry. Never holds keys for absent values.
pub type EntryMetadata = BTreeMap<String, String>;
