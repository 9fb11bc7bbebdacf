//! MediaWiki Dump Loader
//!
//! Loads a MediaWiki XML export and turns every revision of every kept page
//! into a plain-text Document whose `source` metadata is the page title.

pub mod dump;
pub mod wikitext;

use crate::config::MwDumpConfig;
use crate::error::{IngestError, Result};
use crate::loaders::traits::{lowercase_file_name, DocumentLoader};
use crate::types::{Document, Page};
use std::path::{Path, PathBuf};
use wikitext::StripOptions;

/// MediaWiki XML dump loader
///
/// ```ignore
/// let docs = MwDumpLoader::new("myWiki.xml")
///     .with_encoding("utf8")
///     .with_stop_on_error(true)
///     .load()?;
/// ```
pub struct MwDumpLoader {
    path: PathBuf,
    config: MwDumpConfig,
}

impl MwDumpLoader {
    /// Loader with defaults: utf8, skip redirects, keep going on errors
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self::with_config(path, MwDumpConfig::default())
    }

    pub fn with_config(path: impl Into<PathBuf>, config: MwDumpConfig) -> Self {
        Self {
            path: path.into(),
            config,
        }
    }

    pub fn with_encoding(mut self, encoding: impl Into<String>) -> Self {
        self.config.encoding = encoding.into();
        self
    }

    pub fn with_skip_redirects(mut self, skip_redirects: bool) -> Self {
        self.config.skip_redirects = skip_redirects;
        self
    }

    pub fn with_stop_on_error(mut self, stop_on_error: bool) -> Self {
        self.config.stop_on_error = stop_on_error;
        self
    }

    /// Set allowed namespaces (None = all namespaces)
    pub fn with_namespaces(mut self, namespaces: Option<Vec<i32>>) -> Self {
        self.config.namespaces = namespaces;
        self
    }

    /// Add `revision_id` and `timestamp` metadata to each record
    pub fn with_revision_metadata(mut self, revision_metadata: bool) -> Self {
        self.config.revision_metadata = revision_metadata;
        self
    }

    pub fn config(&self) -> &MwDumpConfig {
        &self.config
    }

    /// Turn parsed pages into Documents, applying redirect/namespace filters
    /// and the stop_on_error policy
    pub fn documents_from_pages(&self, pages: &[Page]) -> Vec<Document> {
        let options = StripOptions::default();
        let mut docs = Vec::new();
        let mut skipped_pages = 0usize;

        for page in pages {
            if self.config.skip_redirects && page.is_redirect() {
                tracing::debug!("Skipping redirect page '{}'", page.title);
                continue;
            }
            if !self.namespace_allowed(page) {
                tracing::debug!("Skipping page '{}' outside allowed namespaces", page.title);
                continue;
            }

            match page_documents(page, &options, self.config.revision_metadata, &mut docs) {
                Ok(()) => {}
                Err(e) => {
                    tracing::warn!("Parsing error: {}", e);
                    if self.config.stop_on_error {
                        tracing::warn!("Stopping dump load at page '{}'", page.title);
                        break;
                    }
                    skipped_pages += 1;
                }
            }
        }

        if skipped_pages > 0 {
            tracing::info!("Skipped {} pages with unparseable revisions", skipped_pages);
        }
        docs
    }

    fn namespace_allowed(&self, page: &Page) -> bool {
        match &self.config.namespaces {
            Some(allowed) => allowed.contains(&page.namespace.unwrap_or(0)),
            None => true,
        }
    }
}

/// Push one Document per revision, stopping at the first revision that fails
fn page_documents(
    page: &Page,
    options: &StripOptions,
    revision_metadata: bool,
    docs: &mut Vec<Document>,
) -> Result<()> {
    for revision in &page.revisions {
        let text = wikitext::strip_code(revision.text_or_empty(), *options).map_err(|source| {
            IngestError::RevisionParse {
                title: page.title.clone(),
                source,
            }
        })?;

        let mut doc = Document::new(text).with_metadata("source", page.title.as_str());
        if revision_metadata {
            if let Some(id) = &revision.id {
                doc = doc.with_metadata("revision_id", id.as_str());
            }
            if let Some(timestamp) = &revision.timestamp {
                doc = doc.with_metadata("timestamp", timestamp.to_rfc3339());
            }
        }
        docs.push(doc);
    }
    Ok(())
}

impl DocumentLoader for MwDumpLoader {
    fn load(&self) -> Result<Vec<Document>> {
        let pages = dump::read_dump(&self.path, &self.config.encoding)?;
        let docs = self.documents_from_pages(&pages);
        tracing::info!(
            "Loaded {} documents from {} pages in {}",
            docs.len(),
            pages.len(),
            self.path.display()
        );
        Ok(docs)
    }

    fn name(&self) -> &str {
        "MwDumpLoader"
    }

    fn supports_file_type(&self, path: &Path) -> bool {
        let name = lowercase_file_name(path);
        name.ends_with(".xml") || name.ends_with(".xml.gz")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Revision;
    use chrono::{TimeZone, Utc};

    fn page(title: &str, texts: &[&str]) -> Page {
        Page {
            title: title.to_string(),
            namespace: Some(0),
            redirect: None,
            revisions: texts
                .iter()
                .map(|t| Revision {
                    text: Some(t.to_string()),
                    ..Revision::default()
                })
                .collect(),
        }
    }

    fn too_deep() -> String {
        let n = wikitext::MAX_DEPTH + 5;
        format!("{}x{}", "{{x|".repeat(n), "}}".repeat(n))
    }

    #[test]
    fn test_one_record_per_revision() {
        let loader = MwDumpLoader::new("unused.xml");
        let docs = loader.documents_from_pages(&[page("T", &["A", "B"])]);
        assert_eq!(
            docs,
            vec![
                Document::new("A").with_metadata("source", "T"),
                Document::new("B").with_metadata("source", "T"),
            ]
        );
    }

    #[test]
    fn test_redirects_skipped_by_default() {
        let mut redirect = page("R", &["#REDIRECT [[T]]"]);
        redirect.redirect = Some("T".to_string());
        let pages = vec![redirect, page("T", &["body"])];

        let docs = MwDumpLoader::new("unused.xml").documents_from_pages(&pages);
        assert_eq!(docs.len(), 1);
        assert_eq!(docs[0].source(), Some("T"));

        let docs = MwDumpLoader::new("unused.xml")
            .with_skip_redirects(false)
            .documents_from_pages(&pages);
        assert_eq!(docs.len(), 2);
        assert_eq!(docs[0].source(), Some("R"));
    }

    #[test]
    fn test_failing_page_skipped_when_not_stopping() {
        let pages = vec![
            page("P1", &["one"]),
            page("P2", &[&too_deep(), "never"]),
            page("P3", &["three"]),
        ];
        let docs = MwDumpLoader::new("unused.xml").documents_from_pages(&pages);
        let sources: Vec<_> = docs.iter().filter_map(|d| d.source()).collect();
        assert_eq!(sources, vec!["P1", "P3"]);
    }

    #[test]
    fn test_failing_page_stops_run() {
        let pages = vec![
            page("P1", &["one"]),
            page("P2", &[&too_deep()]),
            page("P3", &["three"]),
        ];
        let docs = MwDumpLoader::new("unused.xml")
            .with_stop_on_error(true)
            .documents_from_pages(&pages);
        assert_eq!(docs.len(), 1);
        assert_eq!(docs[0].source(), Some("P1"));
    }

    #[test]
    fn test_earlier_revisions_of_failing_page_are_kept() {
        let pages = vec![page("P", &["good", &too_deep(), "after"])];
        let docs = MwDumpLoader::new("unused.xml").documents_from_pages(&pages);
        assert_eq!(docs.len(), 1);
        assert_eq!(docs[0].page_content, "good");
    }

    #[test]
    fn test_namespace_filter() {
        let mut talk = page("Talk:T", &["chat"]);
        talk.namespace = Some(1);
        let mut untagged = page("U", &["u"]);
        untagged.namespace = None;
        let pages = vec![page("T", &["t"]), talk, untagged];

        let docs = MwDumpLoader::new("unused.xml")
            .with_namespaces(Some(vec![0]))
            .documents_from_pages(&pages);
        let sources: Vec<_> = docs.iter().filter_map(|d| d.source()).collect();
        assert_eq!(sources, vec!["T", "U"]);
    }

    #[test]
    fn test_deleted_revision_yields_empty_text() {
        let mut p = page("D", &[]);
        p.revisions.push(Revision::default());
        let docs = MwDumpLoader::new("unused.xml").documents_from_pages(&[p]);
        assert_eq!(docs.len(), 1);
        assert_eq!(docs[0].page_content, "");
    }

    #[test]
    fn test_revision_metadata_on_request() {
        let mut p = page("T", &["a", "b"]);
        p.revisions[0].id = Some("101".to_string());
        p.revisions[0].timestamp = Some(Utc.with_ymd_and_hms(2021, 3, 4, 5, 6, 7).unwrap());

        let plain = MwDumpLoader::new("unused.xml").documents_from_pages(&[p.clone()]);
        assert_eq!(plain[0].metadata.len(), 1);

        let docs = MwDumpLoader::new("unused.xml")
            .with_revision_metadata(true)
            .documents_from_pages(&[p]);
        assert_eq!(docs[0].metadata["revision_id"], "101");
        assert_eq!(docs[0].metadata["timestamp"], "2021-03-04T05:06:07+00:00");
        assert_eq!(docs[0].source(), Some("T"));
        assert_eq!(docs[1].metadata.len(), 1);
    }

    #[test]
    fn test_supports_file_type() {
        let loader = MwDumpLoader::new("unused.xml");
        assert!(loader.supports_file_type(Path::new("enwiki-pages.XML")));
        assert!(loader.supports_file_type(Path::new("dump.xml.gz")));
        assert!(!loader.supports_file_type(Path::new("refs.bib")));
    }
}
