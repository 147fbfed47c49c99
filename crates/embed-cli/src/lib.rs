//! Sentence embeddings command-line library exports.
//!
//! # Modules
//!
//! - `cli`: Command-line argument parsing with clap
//! - `commands`: Command implementations (compare, rank, embed, models, config)

pub mod cli;
pub mod commands;

pub use cli::{Cli, Commands, ModelArgs};
pub use commands::{
    compare, embed, init_logging, load_settings, rank, rank_corpus, render_comparison,
    render_models, show_config, show_models, RankedSentence,
};
