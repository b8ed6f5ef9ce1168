use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

use mave_dataset::{engine, JoinConfig, PipelineConfig, DEFAULT_BATCH_SIZE};

#[derive(Parser, Debug)]
#[command(
    name = "mave_dataset",
    about = "Join product metadata with attribute labels into cleaned training records"
)]
struct Cli {
    /// Product metadata, one JSON object per line
    #[arg(long)]
    metadata: PathBuf,

    /// Positive attribute labels (JSON lines)
    #[arg(long)]
    positive_labels: PathBuf,

    /// Negative attribute labels (JSON lines)
    #[arg(long)]
    negative_labels: PathBuf,

    /// Output file for positive records
    #[arg(long)]
    positive_output: PathBuf,

    /// Output file for negative records
    #[arg(long)]
    negative_output: PathBuf,

    /// Write a statistics summary to this file
    #[arg(long)]
    stats_output: Option<PathBuf>,

    /// JSON join configuration; flags below override it
    #[arg(long, value_name = "FILE")]
    rules: Option<PathBuf>,

    /// Leave character references undecoded
    #[arg(long)]
    keep_entities: bool,

    /// Skip NFC normalization
    #[arg(long)]
    no_unicode_normalization: bool,

    /// Leave markup in place
    #[arg(long)]
    keep_markup: bool,

    /// Leave whitespace runs as they are
    #[arg(long)]
    keep_whitespace: bool,

    /// Keep script, stylesheet and markup-debris paragraphs
    #[arg(long)]
    no_filters: bool,

    /// Keep products without a title paragraph
    #[arg(long)]
    allow_untitled: bool,

    /// Extra metadata key to read as a paragraph source (repeatable)
    #[arg(long = "extra-source", value_name = "KEY")]
    extra_sources: Vec<String>,

    /// Metadata records per parallel batch
    #[arg(long, default_value_t = DEFAULT_BATCH_SIZE)]
    batch_size: usize,

    /// Worker threads (0 = one per core)
    #[arg(long, default_value_t = 0)]
    threads: usize,
}

impl Cli {
    fn join_config(&self) -> Result<JoinConfig> {
        let mut join = match &self.rules {
            Some(path) => JoinConfig::from_file(path)
                .with_context(|| format!("failed to load rules from {}", path.display()))?,
            None => JoinConfig::default(),
        };
        if self.keep_entities {
            join.rules.decode_entities = false;
        }
        if self.no_unicode_normalization {
            join.rules.normalize_unicode = false;
        }
        if self.keep_markup {
            join.rules.strip_markup = false;
        }
        if self.keep_whitespace {
            join.rules.collapse_whitespace = false;
        }
        if self.no_filters {
            join.filter_paragraphs = false;
        }
        if self.allow_untitled {
            join.require_title = false;
        }
        join.extra_sources.extend(self.extra_sources.iter().cloned());
        Ok(join)
    }
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = PipelineConfig {
        join: cli.join_config()?,
        metadata_path: cli.metadata,
        positive_labels_path: cli.positive_labels,
        negative_labels_path: cli.negative_labels,
        positive_output_path: cli.positive_output,
        negative_output_path: cli.negative_output,
        stats_output_path: cli.stats_output,
        batch_size: cli.batch_size,
        threads: cli.threads,
    };

    let stats = engine::run(&config).context("pipeline failed")?;
    println!(
        "positive: {} products, {} pairs; negative: {} products, {} pairs",
        stats.positive.products, stats.positive.pairs, stats.negative.products, stats.negative.pairs
    );
    Ok(())
}
