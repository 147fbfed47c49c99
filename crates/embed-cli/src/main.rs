//! Sentence embeddings CLI
//!
//! Embeds sentences with a local transformer model and scores them.
//!
//! # Usage
//!
//! ```bash
//! embed compare "That is a happy person" "That is a very happy person"
//! embed rank --query "A man is eating pasta." "A man is eating food." "A monkey plays drums."
//! embed embed "Hello, world!" --json
//! embed models
//! ```
//!
//! # Configuration
//!
//! Configuration is loaded in order (later sources override earlier):
//! 1. Built-in defaults
//! 2. Config file (~/.config/sentence-embeddings/config.toml)
//! 3. Environment variables (EMBED_*)
//! 4. CLI flags

use anyhow::Result;
use clap::Parser;

use embed_cli::{compare, embed, rank, show_config, show_models, Cli, Commands};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = cli.config.as_deref();
    let log_level = cli.log_level.as_deref();

    match cli.command {
        Commands::Compare {
            query1,
            query2,
            decimals,
            model,
        } => {
            compare(config, log_level, &query1, &query2, decimals, &model).await?;
        }
        Commands::Rank {
            query,
            corpus,
            top_k,
            decimals,
            json,
            model,
        } => {
            rank(config, log_level, &query, &corpus, top_k, decimals, json, &model).await?;
        }
        Commands::Embed {
            sentences,
            json,
            model,
        } => {
            embed(config, log_level, &sentences, json, &model).await?;
        }
        Commands::Models => {
            show_models();
        }
        Commands::Config => {
            show_config(config, log_level)?;
        }
    }

    Ok(())
}
