use anyhow::Result;
use serde::{Deserialize, Serialize};

// Default value functions for serde
fn default_true() -> bool {
    true
}

fn default_encoding() -> String {
    "utf8".to_string()
}

/// Loader configuration, one section per source format
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LoaderConfig {
    #[serde(default)]
    pub mediawiki: MwDumpConfig,
    #[serde(default)]
    pub bibtex: BibtexConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MwDumpConfig {
    /// Charset label of the dump file (WHATWG label, e.g. "utf8", "latin1")
    #[serde(default = "default_encoding")]
    pub encoding: String,
    /// Skip pages that redirect to other pages
    #[serde(default = "default_true")]
    pub skip_redirects: bool,
    /// Abort the whole load on the first revision that fails to parse.
    /// When false the failing page is skipped and loading continues.
    #[serde(default)]
    pub stop_on_error: bool,
    /// Namespace allow-list (None = every namespace)
    #[serde(default)]
    pub namespaces: Option<Vec<i32>>,
    /// Add `revision_id` and `timestamp` to each record's metadata
    #[serde(default)]
    pub revision_metadata: bool,
}

impl Default for MwDumpConfig {
    fn default() -> Self {
        Self {
            encoding: default_encoding(),
            skip_redirects: true,
            stop_on_error: false,
            namespaces: None,
            revision_metadata: false,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BibtexConfig {
    /// Include the optional fields (editor, publisher, doi, ...) in metadata
    #[serde(default)]
    pub load_extra: bool,
    /// Cap on documents produced by BibtexLoader (None = all entries)
    #[serde(default)]
    pub max_docs: Option<usize>,
}

impl LoaderConfig {
    /// Load config from a YAML file
    pub fn load_from_file(path: &str) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: LoaderConfig = serde_yaml::from_str(&content)?;
        Ok(config)
    }

    /// Load config with fallback to default
    pub fn load_with_fallback(path: Option<&str>) -> Self {
        match path {
            Some(p) => Self::load_from_file(p).unwrap_or_else(|e| {
                tracing::warn!("Failed to load config from {}: {}, using defaults", p, e);
                Self::default()
            }),
            None => Self::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = LoaderConfig::default();
        assert_eq!(config.mediawiki.encoding, "utf8");
        assert!(config.mediawiki.skip_redirects);
        assert!(!config.mediawiki.stop_on_error);
        assert!(config.mediawiki.namespaces.is_none());
        assert!(!config.mediawiki.revision_metadata);
        assert!(!config.bibtex.load_extra);
        assert!(config.bibtex.max_docs.is_none());
    }

    #[test]
    fn test_partial_yaml_keeps_defaults() {
        let yaml = "mediawiki:\n  stop_on_error: true\n";
        let config: LoaderConfig = serde_yaml::from_str(yaml).unwrap();
        assert!(config.mediawiki.stop_on_error);
        assert!(config.mediawiki.skip_redirects);
        assert_eq!(config.mediawiki.encoding, "utf8");
        assert_eq!(config.bibtex, BibtexConfig::default());
    }

    #[test]
    fn test_full_yaml() {
        let yaml = r#"
mediawiki:
  encoding: latin1
  skip_redirects: false
  namespaces: [0, 14]
  revision_metadata: true
bibtex:
  load_extra: true
  max_docs: 5
"#;
        let config: LoaderConfig = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(config.mediawiki.encoding, "latin1");
        assert!(!config.mediawiki.skip_redirects);
        assert_eq!(config.mediawiki.namespaces, Some(vec![0, 14]));
        assert!(config.mediawiki.revision_metadata);
        assert!(config.bibtex.load_extra);
        assert_eq!(config.bibtex.max_docs, Some(5));
    }

    #[test]
    fn test_fallback_on_missing_file() {
        let config = LoaderConfig::load_with_fallback(Some("/nonexistent/wikibib.yaml"));
        assert_eq!(config.mediawiki, MwDumpConfig::default());
    }
}
