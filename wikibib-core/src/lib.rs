// Wikibib Core Library
//
// Loads MediaWiki XML dumps and BibTeX bibliographies into plain-text
// documents with string metadata, ready for downstream indexing.

pub mod config;
pub mod error;
pub mod loaders;
pub mod processor;
pub mod serialization;
pub mod types;

// Re-export main types and functions for easy use
pub use config::{BibtexConfig, LoaderConfig, MwDumpConfig};
pub use error::{IngestError, Result};
pub use loaders::mediawiki::wikitext::{strip_code, StripOptions, WikitextError};
pub use loaders::{BibtexLoader, BibtexParser, DocumentLoader, MwDumpLoader, OPTIONAL_FIELDS};
pub use processor::DocumentProcessor;
pub use serialization::FORMATS;
pub use types::*;
