use crate::config::LoaderConfig;
use crate::error::{IngestError, Result};
use crate::loaders::{BibtexLoader, DocumentLoader, MwDumpLoader};
use crate::types::Document;
use std::path::Path;
use std::time::Instant;

/// Picks a loader by file type and runs it
pub struct DocumentProcessor {
    config: LoaderConfig,
}

impl DocumentProcessor {
    pub fn new(config: LoaderConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &LoaderConfig {
        &self.config
    }

    /// Every loader configured for `path`, in dispatch order
    fn loaders_for(&self, path: &Path) -> Vec<Box<dyn DocumentLoader>> {
        let mediawiki = MwDumpLoader::with_config(path, self.config.mediawiki.clone());
        let bibtex = BibtexLoader::with_config(path, self.config.bibtex.clone());
        let loaders: Vec<Box<dyn DocumentLoader>> = vec![Box::new(mediawiki), Box::new(bibtex)];
        loaders
    }

    /// Name of the loader that would handle `path`, if any
    pub fn loader_name(&self, path: &Path) -> Option<String> {
        self.loaders_for(path)
            .into_iter()
            .find(|l| l.supports_file_type(path))
            .map(|l| l.name().to_string())
    }

    /// Load documents from `path` with the first loader that supports it
    pub fn load_path(&self, path: &Path) -> Result<Vec<Document>> {
        let loader = self
            .loaders_for(path)
            .into_iter()
            .find(|l| l.supports_file_type(path))
            .ok_or_else(|| IngestError::UnsupportedFormat(path.to_path_buf()))?;

        tracing::info!("Loading {} with {}", path.display(), loader.name());
        let start = Instant::now();
        let docs = loader.load()?;
        tracing::debug!("{} finished in {}ms", loader.name(), start.elapsed().as_millis());
        Ok(docs)
    }
}

impl Default for DocumentProcessor {
    fn default() -> Self {
        Self::new(LoaderConfig::default())
    }
}
