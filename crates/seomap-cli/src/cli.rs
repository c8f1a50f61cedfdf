//! # CLI Structure and Argument Parsing
//!
//! This module defines the command-line interface for `seomap`. The CLI is
//! built using `clap` with derive macros for help generation and argument
//! validation.
//!
//! ## Usage Patterns
//!
//! ```bash
//! # Regenerate and print the sitemap of the `en` site, then scan for media
//! seomap generate --catalog content.toml --site en
//!
//! # Write the image sitemap to a file
//! seomap generate --catalog content.toml --site en --kind images --output sitemap_images.xml
//!
//! # Inspect stored items
//! seomap list --catalog content.toml --site en --format json
//!
//! # Scan one page immediately
//! seomap scan --catalog content.toml https://example.com/blog/hello
//!
//! # Force every page to be refreshed on the next run
//! seomap reset-cache
//! ```

use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};
use seomap_core::SitemapKind;

use crate::output::OutputFormat;

/// Main CLI structure for the `seomap` command
#[derive(Parser, Clone, Debug)]
#[command(name = "seomap")]
#[command(version)]
#[command(about = "Incremental sitemap generation with image and video discovery", long_about = None)]
pub struct Cli {
    /// Enable verbose output
    #[arg(short = 'v', long, global = true)]
    pub verbose: bool,

    /// Suppress informational messages (only errors are logged)
    #[arg(short = 'q', long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Show debug logging
    #[arg(long, global = true)]
    pub debug: bool,

    /// Disable colored output
    #[arg(long, global = true)]
    pub no_color: bool,

    /// Path to the configuration file
    #[arg(long, global = true, value_name = "FILE", env = "SEOMAP_CONFIG")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

/// Available subcommands
#[derive(Subcommand, Clone, Debug)]
pub enum Commands {
    /// Regenerate a site and print one of its sitemap documents
    Generate {
        /// Content catalog (TOML, or JSON with a `.json` extension)
        #[arg(long, value_name = "FILE")]
        catalog: PathBuf,

        /// Site code
        #[arg(long)]
        site: String,

        /// Document to produce
        #[arg(long, value_enum, default_value = "sitemap")]
        kind: KindArg,

        /// Write the document to a file instead of stdout
        #[arg(short, long, value_name = "FILE")]
        output: Option<PathBuf>,

        /// Skip the media scans queued by the regeneration
        #[arg(long)]
        no_scan: bool,
    },

    /// List the enabled sitemap items stored for a site
    List {
        /// Content catalog the site is defined in
        #[arg(long, value_name = "FILE")]
        catalog: PathBuf,

        /// Site code
        #[arg(long)]
        site: String,

        /// Output format
        #[arg(short = 'f', long, value_enum, default_value = "text")]
        format: OutputFormat,
    },

    /// Run the media scan for one location immediately
    Scan {
        /// Content catalog supplying site locales
        #[arg(long, value_name = "FILE")]
        catalog: PathBuf,

        /// Absolute location of the page to scan
        loc: String,

        /// Output format
        #[arg(short = 'f', long, value_enum, default_value = "text")]
        format: OutputFormat,
    },

    /// Clear the content-hash cache so every page is refreshed next run
    ResetCache,
}

/// Sitemap document selector
#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum KindArg {
    /// Plain sitemap
    Sitemap,
    /// Image sitemap
    Images,
    /// Video sitemap
    Videos,
    /// Sitemap index
    Index,
}

impl From<KindArg> for SitemapKind {
    fn from(kind: KindArg) -> Self {
        match kind {
            KindArg::Sitemap => Self::Sitemap,
            KindArg::Images => Self::Images,
            KindArg::Videos => Self::Videos,
            KindArg::Index => Self::Index,
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::panic)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_generate_defaults() {
        let cli = Cli::try_parse_from([
            "seomap", "generate", "--catalog", "c.toml", "--site", "en",
        ])
        .unwrap();

        match cli.command {
            Commands::Generate {
                kind,
                output,
                no_scan,
                ..
            } => {
                assert_eq!(kind, KindArg::Sitemap);
                assert!(output.is_none());
                assert!(!no_scan);
            },
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn test_global_flags_after_subcommand() {
        let cli = Cli::try_parse_from(["seomap", "reset-cache", "--quiet", "--no-color"]).unwrap();
        assert!(cli.quiet);
        assert!(cli.no_color);
    }

    #[test]
    fn test_kind_maps_to_document() {
        assert_eq!(SitemapKind::from(KindArg::Videos), SitemapKind::Videos);
        assert_eq!(SitemapKind::from(KindArg::Index).file_name(), "sitemap_index.xml");
    }

    #[test]
    fn test_verbose_conflicts_with_quiet() {
        assert!(Cli::try_parse_from(["seomap", "-v", "-q", "reset-cache"]).is_err());
    }
}
