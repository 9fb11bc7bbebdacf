use anyhow::{Context, Result};
use clap::builder::PossibleValuesParser;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

use wikibib::{
    entries_as_documents, write_output, BibtexConfig, BibtexLoader, BibtexParser, DocumentLoader,
    DocumentProcessor, LoaderConfig, MwDumpConfig, MwDumpLoader, FORMATS,
};

#[derive(Parser)]
#[command(name = "wikibib")]
#[command(about = "Turn MediaWiki dumps and BibTeX files into plain-text documents")]
struct Args {
    /// Path to custom config file (YAML format)
    #[arg(short, long, global = true)]
    config: Option<String>,

    /// Output file path (stdout if not specified)
    #[arg(short, long, global = true)]
    output: Option<PathBuf>,

    /// Output format
    #[arg(
        short = 'f',
        long,
        global = true,
        default_value = "json",
        value_parser = PossibleValuesParser::new(FORMATS)
    )]
    format: String,

    #[command(subcommand)]
    command: Command,
}

// Boolean options take an optional `=true|false` so they can override the
// config file in either direction. A bare flag means true.
#[derive(Subcommand)]
enum Command {
    /// Load a MediaWiki XML dump (.xml or .xml.gz)
    Wiki {
        path: PathBuf,

        /// Text encoding of the dump file
        #[arg(long)]
        encoding: Option<String>,

        /// Emit redirect pages instead of skipping them
        #[arg(long, num_args = 0..=1, require_equals = true, default_missing_value = "true")]
        keep_redirects: Option<bool>,

        /// Stop at the first page whose wikitext cannot be parsed
        #[arg(long, num_args = 0..=1, require_equals = true, default_missing_value = "true")]
        stop_on_error: Option<bool>,

        /// Only keep pages in these namespaces (repeatable)
        #[arg(long = "namespace")]
        namespaces: Vec<i32>,

        /// Add revision id and timestamp to each record's metadata
        #[arg(long, num_args = 0..=1, require_equals = true, default_missing_value = "true")]
        revision_metadata: Option<bool>,
    },

    /// Load a BibTeX file, one document per entry
    Bib {
        path: PathBuf,

        /// Include the extended optional fields in metadata
        #[arg(long, num_args = 0..=1, require_equals = true, default_missing_value = "true")]
        load_extra: Option<bool>,

        /// Output raw entries instead of normalized metadata
        #[arg(long)]
        entries_only: bool,
    },

    /// Load any supported file, picking the loader by file type
    Load { path: PathBuf },
}

impl Command {
    /// Apply `wiki` flags on top of the configured dump options
    fn mediawiki_config(&self, mut mw: MwDumpConfig) -> MwDumpConfig {
        if let Command::Wiki {
            encoding,
            keep_redirects,
            stop_on_error,
            namespaces,
            revision_metadata,
            ..
        } = self
        {
            if let Some(encoding) = encoding {
                mw.encoding = encoding.clone();
            }
            if let Some(keep) = keep_redirects {
                mw.skip_redirects = !keep;
            }
            if let Some(stop) = stop_on_error {
                mw.stop_on_error = *stop;
            }
            if !namespaces.is_empty() {
                mw.namespaces = Some(namespaces.clone());
            }
            if let Some(revision_metadata) = revision_metadata {
                mw.revision_metadata = *revision_metadata;
            }
        }
        mw
    }

    /// Apply `bib` flags on top of the configured BibTeX options
    fn bibtex_config(&self, mut bib: BibtexConfig) -> BibtexConfig {
        if let Command::Bib {
            load_extra: Some(load_extra),
            ..
        } = self
        {
            bib.load_extra = *load_extra;
        }
        bib
    }
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();

    let config = LoaderConfig::load_with_fallback(args.config.as_deref());
    match &args.config {
        Some(path) => tracing::info!("Loaded config from: {}", path),
        None => tracing::debug!("Using default config"),
    }

    let docs = match &args.command {
        Command::Wiki { path, .. } => {
            // CLI flags override config values
            let mw = args.command.mediawiki_config(config.mediawiki);
            MwDumpLoader::with_config(path, mw)
                .load()
                .with_context(|| format!("failed to load dump {}", path.display()))?
        }
        Command::Bib {
            path, entries_only, ..
        } => {
            if *entries_only {
                let entries = BibtexParser::new()
                    .load_entries(path)
                    .with_context(|| format!("failed to load bibliography {}", path.display()))?;
                entries_as_documents(entries)
            } else {
                let bib = args.command.bibtex_config(config.bibtex);
                BibtexLoader::with_config(path, bib)
                    .load()
                    .with_context(|| format!("failed to load bibliography {}", path.display()))?
            }
        }
        Command::Load { path } => DocumentProcessor::new(config)
            .load_path(path)
            .with_context(|| format!("failed to load {}", path.display()))?,
    };

    write_output(&docs, args.output.as_deref(), &args.format)?;

    match &args.output {
        Some(path) => tracing::info!("{} records saved to: {}", docs.len(), path.display()),
        None => tracing::debug!("{} records written to stdout", docs.len()),
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(argv: &[&str]) -> Args {
        Args::try_parse_from(argv).unwrap()
    }

    #[test]
    fn test_flags_override_config_both_ways() {
        let configured = MwDumpConfig {
            stop_on_error: true,
            skip_redirects: false,
            ..MwDumpConfig::default()
        };

        let args = parse(&[
            "wikibib",
            "wiki",
            "dump.xml",
            "--stop-on-error=false",
            "--keep-redirects=false",
        ]);
        let mw = args.command.mediawiki_config(configured.clone());
        assert!(!mw.stop_on_error);
        assert!(mw.skip_redirects);

        let args = parse(&["wikibib", "wiki", "dump.xml"]);
        assert_eq!(args.command.mediawiki_config(configured.clone()), configured);
    }

    #[test]
    fn test_bare_flags_mean_true() {
        let args = parse(&[
            "wikibib",
            "wiki",
            "dump.xml",
            "--stop-on-error",
            "--keep-redirects",
            "--revision-metadata",
            "--namespace",
            "0",
            "--namespace",
            "14",
        ]);
        let mw = args.command.mediawiki_config(MwDumpConfig::default());
        assert!(mw.stop_on_error);
        assert!(!mw.skip_redirects);
        assert!(mw.revision_metadata);
        assert_eq!(mw.namespaces, Some(vec![0, 14]));
    }

    #[test]
    fn test_load_extra_override() {
        let enabled = BibtexConfig {
            load_extra: true,
            ..BibtexConfig::default()
        };
        let args = parse(&["wikibib", "bib", "refs.bib", "--load-extra=false"]);
        assert!(!args.command.bibtex_config(enabled.clone()).load_extra);

        let args = parse(&["wikibib", "bib", "refs.bib", "--load-extra"]);
        assert!(args.command.bibtex_config(BibtexConfig::default()).load_extra);
    }

    #[test]
    fn test_format_must_be_known() {
        assert_eq!(parse(&["wikibib", "-f", "jsonl", "load", "x.bib"]).format, "jsonl");
        assert_eq!(parse(&["wikibib", "load", "x.bib"]).format, "json");
        assert!(Args::try_parse_from(["wikibib", "--format", "yaml", "load", "x.bib"]).is_err());
    }
}
