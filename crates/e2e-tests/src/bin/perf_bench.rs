use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Instant;

use clap::{Parser, ValueEnum};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};

use e2e_tests::TestHarness;
use embed_core::{
    l2_normalize, mean_pooling, top_k_by_cosine_similarity, EmbeddingMatrix, TensorShape,
};
use embed_model::{ModelCache, SentenceEmbedder};
use embed_types::ModelVariant;

const SMALL_BATCH: usize = 8;
const MEDIUM_BATCH: usize = 64;
const SMALL_CORPUS: usize = 1_000;
const MEDIUM_CORPUS: usize = 10_000;
const SEQUENCE_LENGTH: usize = 128;
const DEFAULT_ITERATIONS: usize = 5;

#[derive(Parser, Debug)]
#[command(name = "perf_bench", about = "Sentence embedding performance benchmark harness")]
struct Args {
    #[arg(long, value_enum, default_value = "small")]
    tier: DatasetTier,
    #[arg(long, value_enum, default_value = "mock")]
    engine: EngineKind,
    #[arg(long, default_value = "all-minilm-l6-v2")]
    model: ModelVariant,
    #[arg(long, default_value_t = DEFAULT_ITERATIONS)]
    iterations: usize,
    #[arg(long, default_value = "crates/e2e-tests/benchmarks")]
    out_dir: PathBuf,
}

#[derive(Clone, Copy, Debug, Serialize, Deserialize, ValueEnum, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
enum DatasetTier {
    Small,
    Medium,
}

impl DatasetTier {
    fn batch_size(&self) -> usize {
        match self {
            DatasetTier::Small => SMALL_BATCH,
            DatasetTier::Medium => MEDIUM_BATCH,
        }
    }

    fn corpus_size(&self) -> usize {
        match self {
            DatasetTier::Small => SMALL_CORPUS,
            DatasetTier::Medium => MEDIUM_CORPUS,
        }
    }
}

#[derive(Clone, Copy, Debug, Serialize, Deserialize, ValueEnum, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
enum EngineKind {
    /// Deterministic in-process engine, no download
    Mock,
    /// Real Candle model from the cache
    Model,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
struct StepMetrics {
    p50_ms: f64,
    p90_ms: f64,
    p99_ms: f64,
    samples: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    sentences_per_sec: Option<f64>,
}

#[derive(Debug, Serialize, Deserialize)]
struct BenchmarkOutput {
    tier: DatasetTier,
    engine: EngineKind,
    model: ModelVariant,
    iterations: usize,
    steps: BTreeMap<String, StepMetrics>,
}

#[derive(Default)]
struct SampleCollector {
    durations: HashMap<String, Vec<f64>>,
    throughput: HashMap<String, Vec<f64>>,
}

impl SampleCollector {
    fn record(&mut self, step: &str, duration_ms: f64, items: Option<usize>) {
        self.durations
            .entry(step.to_string())
            .or_default()
            .push(duration_ms);
        if let Some(items) = items {
            self.throughput
                .entry(step.to_string())
                .or_default()
                .push(items_per_second(items, duration_ms));
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), String> {
    let args = Args::parse();
    fs::create_dir_all(&args.out_dir).map_err(|e| format!("Failed to create out dir: {e}"))?;

    // Harness must outlive the embedder it owns.
    let harness;
    let loaded;
    let embedder: &SentenceEmbedder = match args.engine {
        EngineKind::Mock => {
            harness = TestHarness::for_variant(args.model);
            &harness.embedder
        }
        EngineKind::Model => {
            let cache = ModelCache::for_variant(ModelCache::default().cache_dir, args.model);
            loaded = SentenceEmbedder::load_async(args.model, cache)
                .await
                .map_err(|e| format!("Failed to load model: {e}"))?;
            &loaded
        }
    };

    let mut rng = StdRng::seed_from_u64(7);
    let mut collector = SampleCollector::default();

    for iteration in 0..args.iterations {
        run_iteration(embedder, args.tier, iteration, &mut rng, &mut collector)?;
    }

    let output = BenchmarkOutput {
        tier: args.tier,
        engine: args.engine,
        model: args.model,
        iterations: args.iterations,
        steps: build_metrics(&collector),
    };

    let json = serde_json::to_string_pretty(&output).map_err(|e| e.to_string())?;
    let table = render_table(&output);
    write_outputs(&args.out_dir, &json, &table)?;

    println!("{}", table);
    println!("\n{}", json);
    Ok(())
}

fn run_iteration(
    embedder: &SentenceEmbedder,
    tier: DatasetTier,
    iteration: usize,
    rng: &mut StdRng,
    collector: &mut SampleCollector,
) -> Result<(), String> {
    let batch = tier.batch_size();
    let hidden = embedder.spec().hidden_dim;

    // Full pipeline: tokenize, infer, pool, normalize
    let sentences: Vec<String> = (0..batch)
        .map(|i| synthetic_sentence(rng, iteration, i))
        .collect();
    let refs: Vec<&str> = sentences.iter().map(String::as_str).collect();
    let start = Instant::now();
    let output = embedder
        .generate_embeddings(&refs, SEQUENCE_LENGTH, true)
        .map_err(|e| e.to_string())?;
    collector.record("generate_embeddings", elapsed_ms(start), Some(batch));

    // Pooling alone on a random hidden state
    let token_shape = TensorShape::from([batch, SEQUENCE_LENGTH, hidden]);
    let tokens = random_values(rng, token_shape.num_elements());
    let mask: Vec<i64> = (0..batch * SEQUENCE_LENGTH)
        .map(|i| i64::from(i % SEQUENCE_LENGTH < SEQUENCE_LENGTH / 2))
        .collect();
    let mask_shape = TensorShape::from([batch, SEQUENCE_LENGTH]);
    let start = Instant::now();
    let pooled =
        mean_pooling(&tokens, &token_shape, &mask, &mask_shape).map_err(|e| e.to_string())?;
    collector.record("mean_pooling", elapsed_ms(start), Some(batch));

    let start = Instant::now();
    l2_normalize(&pooled).map_err(|e| e.to_string())?;
    collector.record("l2_normalize", elapsed_ms(start), Some(batch));

    // Ranking the batch against a random corpus
    let corpus_rows = tier.corpus_size();
    let corpus_data = random_values(rng, corpus_rows * hidden);
    let corpus = EmbeddingMatrix::new(corpus_data, corpus_rows, hidden).map_err(|e| e.to_string())?;
    let queries = output.to_matrix().map_err(|e| e.to_string())?;
    let start = Instant::now();
    top_k_by_cosine_similarity(&corpus, &queries, 10).map_err(|e| e.to_string())?;
    collector.record("top_k_cosine", elapsed_ms(start), Some(batch));

    Ok(())
}

fn synthetic_sentence(rng: &mut StdRng, iteration: usize, index: usize) -> String {
    const WORDS: &[&str] = &[
        "rust", "memory", "safety", "borrow", "checker", "pasta", "recipe", "neural", "network",
        "training", "vector", "search", "query", "sentence", "embedding", "model",
    ];
    let len = rng.random_range(6..24);
    let mut words: Vec<&str> = (0..len)
        .map(|_| WORDS[rng.random_range(0..WORDS.len())])
        .collect();
    let tag = format!("i{}s{}", iteration, index);
    words.push(&tag);
    words.join(" ")
}

fn random_values(rng: &mut StdRng, len: usize) -> Vec<f32> {
    (0..len).map(|_| rng.random_range(-1.0f32..1.0)).collect()
}

fn elapsed_ms(start: Instant) -> f64 {
    start.elapsed().as_secs_f64() * 1000.0
}

fn items_per_second(count: usize, duration_ms: f64) -> f64 {
    if duration_ms <= 0.0 {
        return 0.0;
    }
    count as f64 / (duration_ms / 1000.0)
}

fn build_metrics(collector: &SampleCollector) -> BTreeMap<String, StepMetrics> {
    let mut steps = BTreeMap::new();
    for (step, durations) in &collector.durations {
        let mut sorted = durations.clone();
        sorted.sort_by(f64::total_cmp);

        let throughput = collector.throughput.get(step).map(|values| {
            let mut values = values.clone();
            values.sort_by(f64::total_cmp);
            percentile(&values, 50.0)
        });

        steps.insert(
            step.clone(),
            StepMetrics {
                p50_ms: percentile(&sorted, 50.0),
                p90_ms: percentile(&sorted, 90.0),
                p99_ms: percentile(&sorted, 99.0),
                samples: durations.len(),
                sentences_per_sec: throughput,
            },
        );
    }
    steps
}

fn percentile(values: &[f64], percentile: f64) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    let rank = (percentile / 100.0) * (values.len() as f64 - 1.0);
    let low = rank.floor() as usize;
    let high = rank.ceil() as usize;
    if low == high {
        values[low]
    } else {
        let weight = rank - low as f64;
        values[low] + (values[high] - values[low]) * weight
    }
}

fn render_table(output: &BenchmarkOutput) -> String {
    let mut lines = Vec::new();
    lines.push(format!(
        "Benchmark Results (tier={:?}, engine={:?}, model={}, iterations={})",
        output.tier, output.engine, output.model, output.iterations
    ));
    lines.push("step\tp50_ms\tp90_ms\tp99_ms\tsentences_per_sec".to_string());

    for (step, metrics) in &output.steps {
        let throughput = metrics
            .sentences_per_sec
            .map(|t| format!("{:.2}", t))
            .unwrap_or_else(|| "-".to_string());
        lines.push(format!(
            "{}\t{:.2}\t{:.2}\t{:.2}\t{}",
            step, metrics.p50_ms, metrics.p90_ms, metrics.p99_ms, throughput
        ));
    }
    lines.join("\n")
}

fn write_outputs(out_dir: &Path, json: &str, table: &str) -> Result<(), String> {
    fs::write(out_dir.join("latest.json"), json).map_err(|e| e.to_string())?;
    fs::write(out_dir.join("latest.txt"), table).map_err(|e| e.to_string())?;
    Ok(())
}
