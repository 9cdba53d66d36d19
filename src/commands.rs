//! Command-line interface for `arec`, defined with `clap`.
//!
//! ```no_run
//! use clap::Parser;
//! use assessment_recommender::commands::{Cli, Commands};
//!
//! let cli = Cli::parse();
//! if let Commands::Search { query, .. } = &cli.command {
//!     println!("searching for {query}");
//! }
//! ```

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Parsed command-line arguments.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None, propagate_version = true, color = clap::ColorChoice::Always)]
pub struct Cli {
    /// Configuration file (defaults to `<config dir>/config.yaml`).
    #[arg(long, short = 'c', global = true, env = "AREC_CONFIG")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

/// Artifact path overrides shared by the subcommands that read or write them.
#[derive(clap::Args, Debug, Clone, Default)]
pub struct ArtifactArgs {
    /// Binary index file.
    #[arg(long)]
    pub index: Option<PathBuf>,

    /// JSON metadata file.
    #[arg(long)]
    pub metadata: Option<PathBuf>,
}

#[derive(Subcommand, Debug)]
#[command(about, long_about = None, color = clap::ColorChoice::Always)]
pub enum Commands {
    /// Write a default config file to the config directory.
    Init,

    /// Turn raw scraped pages (JSON array of {name, url, content}) into structured records.
    #[clap(name = "structure")]
    Structure {
        /// Raw pages file.
        input: PathBuf,

        /// Structured records output file.
        #[arg(long, short = 'o', default_value = "structured_assessments.json")]
        output: PathBuf,
    },

    /// Embed structured records and write the index/metadata pair.
    #[clap(name = "build", alias = "b")]
    Build {
        /// Structured records file (JSON array).
        input: PathBuf,

        #[command(flatten)]
        artifacts: ArtifactArgs,
    },

    /// Print the nearest assessments for a text query.
    #[clap(name = "search", alias = "s")]
    Search {
        query: String,

        /// Result count, clamped to 5..=10.
        #[arg(short = 'k', long, default_value_t = 5, allow_negative_numbers = true)]
        top_k: i64,

        #[command(flatten)]
        artifacts: ArtifactArgs,
    },

    /// Run one recommendation and print the JSON response.
    #[clap(name = "recommend", alias = "r")]
    Recommend {
        /// Query text (takes priority over --url).
        #[arg(long)]
        text: Option<String>,

        /// Job description page to fetch.
        #[arg(long)]
        url: Option<String>,

        #[arg(short = 'k', long, default_value_t = 5, allow_negative_numbers = true)]
        top_k: i64,

        #[command(flatten)]
        artifacts: ArtifactArgs,
    },

    /// Serve the HTTP API.
    Serve {
        /// Listen address (overrides `bind` from the config).
        #[arg(long)]
        bind: Option<String>,

        #[command(flatten)]
        artifacts: ArtifactArgs,
    },

    /// Measure Recall@k over labeled queries (JSON Lines of {query, relevant_urls}).
    Eval {
        cases: PathBuf,

        /// Neighbors retrieved per query (not clamped).
        #[arg(short = 'k', long, default_value_t = 10)]
        k: usize,

        /// Write the full report as JSON.
        #[arg(long)]
        report: Option<PathBuf>,

        #[command(flatten)]
        artifacts: ArtifactArgs,
    },
}
