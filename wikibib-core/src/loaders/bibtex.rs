//! BibTeX Loader
//!
//! Reads `.bib` files into flat entry maps and extracts normalized metadata
//! per entry. Parsing goes through the `biblatex` crate; every field value is
//! taken verbatim, without LaTeX interpretation.

use crate::config::BibtexConfig;
use crate::error::{IngestError, Result};
use crate::loaders::traits::{lowercase_file_name, DocumentLoader};
use crate::types::{BibEntry, Document, EntryMetadata};
use biblatex::{Bibliography, ChunksExt};
use regex::Regex;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

/// Fields copied into metadata only when extra fields are requested
pub const OPTIONAL_FIELDS: [&str; 15] = [
    "annotate",
    "booktitle",
    "editor",
    "howpublished",
    "journal",
    "keywords",
    "note",
    "organization",
    "publisher",
    "school",
    "series",
    "type",
    "doi",
    "issn",
    "isbn",
];

const DOI_RESOLVER: &str = "https://doi.org/";

/// `@type{key,` at the start of an entry
static ENTRY_HEAD_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?m)^[ \t]*@[ \t]*([A-Za-z]+)[ \t]*[{(][ \t]*([^,\s{}()]+)[ \t]*,").unwrap()
});

/// Stateless BibTeX reader and metadata extractor
#[derive(Debug, Default, Clone, Copy)]
pub struct BibtexParser;

impl BibtexParser {
    pub fn new() -> Self {
        Self
    }

    /// Load all entries from a .bib file, in file order
    pub fn load_entries(&self, path: &Path) -> Result<Vec<BibEntry>> {
        let raw = std::fs::read(path).map_err(|e| IngestError::file_access(path, e))?;
        let src = String::from_utf8(raw).map_err(|e| IngestError::Encoding {
            encoding: "utf-8".to_string(),
            reason: e.to_string(),
        })?;

        let entries = parse_entries(&src)?;
        tracing::debug!("Parsed {} BibTeX entries from {}", entries.len(), path.display());
        Ok(entries)
    }

    /// Normalize one entry into metadata. Absent values never appear as keys.
    pub fn get_metadata(&self, entry: &BibEntry, load_extra: bool) -> EntryMetadata {
        let field = |name: &str| entry.get(name).cloned();

        let url = field("url").or_else(|| field("doi").map(|doi| format!("{DOI_RESOLVER}{doi}")));

        let mut candidates: Vec<(&str, Option<String>)> = vec![
            ("id", field("ID")),
            ("published_year", field("year")),
            ("title", field("title")),
            (
                "publication",
                field("journal")
                    .filter(|journal| !journal.is_empty())
                    .or_else(|| field("booktitle")),
            ),
            ("authors", field("author")),
            ("abstract", field("abstract")),
            ("url", url),
        ];

        if load_extra {
            candidates.extend(OPTIONAL_FIELDS.iter().map(|name| (*name, field(*name))));
        }

        candidates
            .into_iter()
            .filter_map(|(key, value)| value.map(|v| (key.to_string(), v)))
            .collect()
    }
}

/// Parse BibTeX source into flat entry maps, in file order. Entries sharing a
/// citation key are all kept.
pub fn parse_entries(src: &str) -> Result<Vec<BibEntry>> {
    let (src, renamed) = disambiguate_keys(src);
    let bibliography = Bibliography::parse(&src)?;

    Ok(bibliography
        .iter()
        .map(|entry| {
            let mut flat = BibEntry::new();
            for (name, chunks) in &entry.fields {
                flat.insert(name.to_lowercase(), chunks.format_verbatim());
            }
            let key = renamed.get(&entry.key).unwrap_or(&entry.key);
            flat.insert("ID".to_string(), key.clone());
            flat.insert("ENTRYTYPE".to_string(), entry.entry_type.to_string().to_lowercase());
            flat
        })
        .collect())
}

/// Rewrite repeated citation keys to unique stand-ins. Returns the new source
/// and a map from each stand-in back to its key.
fn disambiguate_keys(src: &str) -> (String, HashMap<String, String>) {
    let mut seen: HashMap<&str, usize> = HashMap::new();
    let mut renamed = HashMap::new();
    let mut out = String::with_capacity(src.len());
    let mut copied = 0;

    for caps in ENTRY_HEAD_REGEX.captures_iter(src) {
        let kind = caps[1].to_ascii_lowercase();
        if matches!(kind.as_str(), "string" | "comment" | "preamble") {
            continue;
        }
        let Some(key) = caps.get(2) else { continue };

        let count = seen.entry(key.as_str()).or_insert(0);
        *count += 1;
        if *count == 1 {
            continue;
        }

        let stand_in = format!("{}__dup{}", key.as_str(), count);
        tracing::warn!("Duplicate BibTeX key '{}', keeping both entries", key.as_str());
        out.push_str(&src[copied..key.start()]);
        out.push_str(&stand_in);
        copied = key.end();
        renamed.insert(stand_in, key.as_str().to_string());
    }

    out.push_str(&src[copied..]);
    (out, renamed)
}

/// BibTeX document loader - one Document per entry, abstract as content
pub struct BibtexLoader {
    path: PathBuf,
    config: BibtexConfig,
    parser: BibtexParser,
}

impl BibtexLoader {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self::with_config(path, BibtexConfig::default())
    }

    pub fn with_config(path: impl Into<PathBuf>, config: BibtexConfig) -> Self {
        Self {
            path: path.into(),
            config,
            parser: BibtexParser::new(),
        }
    }

    pub fn with_load_extra(mut self, load_extra: bool) -> Self {
        self.config.load_extra = load_extra;
        self
    }

    pub fn with_max_docs(mut self, max_docs: Option<usize>) -> Self {
        self.config.max_docs = max_docs;
        self
    }

    pub fn config(&self) -> &BibtexConfig {
        &self.config
    }
}

impl DocumentLoader for BibtexLoader {
    fn load(&self) -> Result<Vec<Document>> {
        let entries = self.parser.load_entries(&self.path)?;
        let limit = self.config.max_docs.unwrap_or(usize::MAX);

        let docs: Vec<Document> = entries
            .iter()
            .take(limit)
            .map(|entry| Document {
                page_content: entry.get("abstract").cloned().unwrap_or_default(),
                metadata: self.parser.get_metadata(entry, self.config.load_extra),
            })
            .collect();

        tracing::info!(
            "Loaded {} of {} BibTeX entries from {}",
            docs.len(),
            entries.len(),
            self.path.display()
        );
        Ok(docs)
    }

    fn name(&self) -> &str {
        "BibtexLoader"
    }

    fn supports_file_type(&self, path: &Path) -> bool {
        lowercase_file_name(path).ends_with(".bib")
    }
}
