//! CLI argument parsing for the `embed` binary.
//!
//! CLI flags override all other config sources.

use clap::{Args, Parser, Subcommand};
use embed_types::ModelVariant;

/// Sentence embeddings from the command line
///
/// Embeds sentences with a local transformer model and scores them by
/// cosine similarity and dot product.
#[derive(Parser, Debug)]
#[command(name = "embed")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Path to config file (overrides default ~/.config/sentence-embeddings/config.toml)
    #[arg(short, long, global = true)]
    pub config: Option<String>,

    /// Set log level (trace, debug, info, warn, error)
    #[arg(short, long, global = true)]
    pub log_level: Option<String>,

    #[command(subcommand)]
    pub command: Commands,
}

/// Model selection shared by every embedding command.
#[derive(Args, Debug, Clone, Default)]
pub struct ModelArgs {
    /// Model variant (see `embed models`)
    #[arg(short, long)]
    pub model: Option<ModelVariant>,

    /// Tokens per sentence after padding/truncation
    #[arg(long)]
    pub max_seq_len: Option<usize>,

    /// Skip L2 normalization of sentence embeddings
    #[arg(long)]
    pub no_normalize: bool,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Embed two sentences and print their similarity
    Compare {
        /// First sentence
        query1: String,

        /// Second sentence
        query2: String,

        /// Decimal places for percentages
        #[arg(short, long)]
        decimals: Option<u32>,

        #[command(flatten)]
        model: ModelArgs,
    },

    /// Rank corpus sentences against a query
    Rank {
        /// Query sentence
        #[arg(short, long)]
        query: String,

        /// Corpus sentences
        #[arg(required = true)]
        corpus: Vec<String>,

        /// Number of matches to report
        #[arg(short = 'k', long)]
        top_k: Option<usize>,

        /// Decimal places for percentages
        #[arg(short, long)]
        decimals: Option<u32>,

        /// Output as JSON
        #[arg(long)]
        json: bool,

        #[command(flatten)]
        model: ModelArgs,
    },

    /// Print sentence embeddings
    Embed {
        /// Sentences to embed
        #[arg(required = true)]
        sentences: Vec<String>,

        /// Output as JSON
        #[arg(long)]
        json: bool,

        #[command(flatten)]
        model: ModelArgs,
    },

    /// List supported model variants
    Models,

    /// Print the effective configuration as TOML
    Config,
}
