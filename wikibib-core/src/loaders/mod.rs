//! Document Loaders
//!
//! This module provides the loading layer for turning source files into
//! plain-text Documents with string metadata.
//!
//! ## Architecture
//!
//! ```text
//! Source file (.xml, .xml.gz, .bib)
//!     ↓
//! [Format-specific Loader]
//!     ↓
//! Vec<Document> (page_content + metadata)
//!     ↓
//! [Serialization / downstream chunking]
//! ```
//!
//! ## Available Loaders
//!
//! - `MwDumpLoader` - MediaWiki XML exports, one Document per page revision
//! - `BibtexLoader` - BibTeX files, one Document per entry

pub mod bibtex;
pub mod mediawiki;
pub mod traits;

// Re-export main types
pub use bibtex::{BibtexLoader, BibtexParser, OPTIONAL_FIELDS};
pub use mediawiki::MwDumpLoader;
pub use traits::DocumentLoader;
