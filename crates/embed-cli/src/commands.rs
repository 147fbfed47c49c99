//! Command implementations for the `embed` binary.
//!
//! Handles:
//! - compare: embed two sentences, print both vectors and their scores
//! - rank: score corpus sentences against a query
//! - embed: print raw sentence embeddings
//! - models / config: inspect variants and effective settings

use anyhow::{bail, Context, Result};
use serde::Serialize;
use tracing::{info, warn};

use embed_core::{
    dot_product, format_vector, to_percentage_truncated, top_k_by_cosine_similarity,
    EmbeddingMatrix, SimilarityResult,
};
use embed_model::{EmbeddingOutput, ModelCache, SentenceEmbedder};
use embed_types::{ModelVariant, SentencePooling, Settings};

use crate::cli::ModelArgs;

/// Load settings and apply CLI overrides (highest precedence).
pub fn load_settings(
    config_path: Option<&str>,
    log_level_override: Option<&str>,
    model_args: &ModelArgs,
) -> Result<Settings> {
    let mut settings = Settings::load(config_path).context("Failed to load configuration")?;

    if let Some(model) = model_args.model {
        settings.model = model;
        if model_args.max_seq_len.is_none() {
            settings.max_sequence_length = settings
                .max_sequence_length
                .min(model.spec().max_sequence_length);
        }
    }
    if let Some(max_seq_len) = model_args.max_seq_len {
        settings.max_sequence_length = max_seq_len;
    }
    if model_args.no_normalize {
        settings.normalize = false;
    }
    if let Some(log_level) = log_level_override {
        settings.log_level = log_level.to_string();
    }

    settings.validate().context("Invalid configuration")?;
    Ok(settings)
}

/// Install the global tracing subscriber. `RUST_LOG` wins over the
/// configured level. Logs go to stderr so stdout stays machine-readable.
pub fn init_logging(settings: &Settings) -> Result<()> {
    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&settings.log_level)),
        )
        .with_writer(std::io::stderr)
        .finish();
    tracing::subscriber::set_global_default(subscriber)
        .context("Failed to set tracing subscriber")?;
    Ok(())
}

async fn load_embedder(settings: &Settings) -> Result<SentenceEmbedder> {
    info!(model = %settings.model, cache_dir = %settings.cache_dir, "Loading model");
    let cache = ModelCache::from_settings(settings);
    let embedder = SentenceEmbedder::load_async(settings.model, cache)
        .await
        .with_context(|| format!("Failed to load model {}", settings.model))?;
    Ok(embedder.with_options(settings.max_sequence_length, settings.normalize))
}

fn embed_all(
    embedder: &SentenceEmbedder,
    settings: &Settings,
    sentences: &[String],
) -> Result<EmbeddingOutput> {
    let refs: Vec<&str> = sentences.iter().map(String::as_str).collect();
    embedder
        .generate_embeddings(&refs, settings.max_sequence_length, settings.normalize)
        .context("Failed to generate embeddings")
}

/// Compare two sentences by cosine similarity and dot product.
pub async fn compare(
    config_path: Option<&str>,
    log_level: Option<&str>,
    query1: &str,
    query2: &str,
    decimals: Option<u32>,
    model_args: &ModelArgs,
) -> Result<()> {
    let mut settings = load_settings(config_path, log_level, model_args)?;
    if let Some(decimals) = decimals {
        settings.decimal_places = decimals;
        settings.validate().context("Invalid configuration")?;
    }
    init_logging(&settings)?;

    let embedder = load_embedder(&settings).await?;
    let output = embed_all(&embedder, &settings, &[query1.to_string(), query2.to_string()])?;

    print!(
        "{}",
        render_comparison(query1, query2, &output, settings.decimal_places)?
    );
    Ok(())
}

/// Text report for `compare`.
pub fn render_comparison(
    query1: &str,
    query2: &str,
    output: &EmbeddingOutput,
    decimal_places: u32,
) -> Result<String> {
    let (Some(first), Some(second)) = (output.row(0), output.row(1)) else {
        bail!("expected two embeddings, got {}", output.batch_size());
    };

    let corpus = EmbeddingMatrix::from_vector(first.to_vec());
    let query = EmbeddingMatrix::from_vector(second.to_vec());
    let cosine = top_k_by_cosine_similarity(&corpus, &query, 1)?
        .first()
        .and_then(SimilarityResult::best)
        .map(|m| m.score)
        .unwrap_or(0.0);
    let dot = dot_product(first, second)?;

    let mut report = String::new();
    report.push_str(&format!("Embedding 1 ({}): {}\n", query1, format_vector(first)));
    report.push_str(&format!("Embedding 2 ({}): {}\n", query2, format_vector(second)));
    report.push_str(&format!(
        "Cosine similarity: {}\n",
        to_percentage_truncated(cosine, decimal_places)
    ));
    report.push_str(&format!(
        "Dot product: {}\n",
        to_percentage_truncated(dot, decimal_places)
    ));
    Ok(report)
}

/// One ranked corpus sentence.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RankedSentence {
    pub rank: usize,
    pub index: usize,
    pub sentence: String,
    pub score: f32,
}

/// Score corpus sentences against a query.
#[allow(clippy::too_many_arguments)]
pub async fn rank(
    config_path: Option<&str>,
    log_level: Option<&str>,
    query: &str,
    corpus: &[String],
    top_k: Option<usize>,
    decimals: Option<u32>,
    json: bool,
    model_args: &ModelArgs,
) -> Result<()> {
    let mut settings = load_settings(config_path, log_level, model_args)?;
    if let Some(top_k) = top_k {
        settings.top_k = top_k;
    }
    if let Some(decimals) = decimals {
        settings.decimal_places = decimals;
    }
    settings.validate().context("Invalid configuration")?;
    init_logging(&settings)?;

    let embedder = load_embedder(&settings).await?;
    let corpus_output = embed_all(&embedder, &settings, corpus)?;
    let query_output = embed_all(&embedder, &settings, &[query.to_string()])?;

    let limit = if settings.top_k > corpus.len() {
        warn!(
            top_k = settings.top_k,
            corpus = corpus.len(),
            "top_k exceeds corpus size, reporting all"
        );
        corpus.len()
    } else {
        settings.top_k
    };

    let ranked = rank_corpus(corpus, &corpus_output, &query_output, limit)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&ranked)?);
    } else {
        println!("Query: {}", query);
        for entry in &ranked {
            println!(
                "{:>3}. {:>10}  [{}] {}",
                entry.rank,
                to_percentage_truncated(entry.score, settings.decimal_places),
                entry.index,
                entry.sentence
            );
        }
    }
    Ok(())
}

/// Top `limit` corpus sentences for a single query embedding.
pub fn rank_corpus(
    corpus: &[String],
    corpus_output: &EmbeddingOutput,
    query_output: &EmbeddingOutput,
    limit: usize,
) -> Result<Vec<RankedSentence>> {
    let results = top_k_by_cosine_similarity(
        &corpus_output.to_matrix()?,
        &query_output.to_matrix()?,
        limit,
    )?;
    let Some(result) = results.into_iter().next() else {
        bail!("no query embedding produced");
    };

    result
        .into_iter()
        .enumerate()
        .map(|(position, m)| {
            let sentence = corpus
                .get(m.index)
                .with_context(|| format!("match index {} outside corpus", m.index))?;
            Ok(RankedSentence {
                rank: position + 1,
                index: m.index,
                sentence: sentence.clone(),
                score: m.score,
            })
        })
        .collect()
}

#[derive(Debug, Serialize)]
struct EmbedReport<'a> {
    model: ModelVariant,
    sentences: &'a [String],
    #[serde(flatten)]
    output: &'a EmbeddingOutput,
}

/// Print sentence embeddings.
pub async fn embed(
    config_path: Option<&str>,
    log_level: Option<&str>,
    sentences: &[String],
    json: bool,
    model_args: &ModelArgs,
) -> Result<()> {
    let settings = load_settings(config_path, log_level, model_args)?;
    init_logging(&settings)?;

    let embedder = load_embedder(&settings).await?;
    let output = embed_all(&embedder, &settings, sentences)?;

    if json {
        let report = EmbedReport {
            model: settings.model,
            sentences,
            output: &output,
        };
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        println!("Dimensions: [{}, {}]", output.batch_size(), output.hidden_dim());
        for (i, sentence) in sentences.iter().enumerate() {
            if let Some(row) = output.row(i) {
                println!("{}: {}", sentence, format_vector(row));
            }
        }
    }
    Ok(())
}

/// Table of supported variants.
pub fn render_models() -> String {
    let mut table = format!(
        "{:<20} {:<40} {:>5} {:>7}  {:<9} {:<18} {}\n",
        "ID", "REPOSITORY", "DIM", "MAX_SEQ", "INPUTS", "OUTPUTS", "POOLING"
    );
    for variant in ModelVariant::ALL {
        let spec = variant.spec();
        let pooling = match spec.pooling {
            SentencePooling::InGraph => "in-graph".to_string(),
            SentencePooling::Reduce(strategy) => format!("{:?}", strategy).to_lowercase(),
        };
        table.push_str(&format!(
            "{:<20} {:<40} {:>5} {:>7}  {:<9} {:<18} {}\n",
            variant.id(),
            spec.repo_id,
            spec.hidden_dim,
            spec.max_sequence_length,
            format!("{:?}", spec.inputs).to_lowercase(),
            spec.outputs.output_names().join(","),
            pooling
        ));
    }
    table
}

pub fn show_models() {
    print!("{}", render_models());
}

/// Print the effective configuration.
pub fn show_config(config_path: Option<&str>, log_level: Option<&str>) -> Result<()> {
    let settings = load_settings(config_path, log_level, &ModelArgs::default())?;
    let rendered = toml::to_string_pretty(&settings).context("Failed to render configuration")?;
    print!("{}", rendered);
    Ok(())
}
