use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use engine::feedback::FeedbackStore;
use engine::generation::Generation;
use engine::persist::{self, IndexPaths};
use engine::{Engine, EngineConfig, Matcher, RawDoc};
use figment::providers::{Env, Format, Serialized, Toml};
use figment::Figment;
use std::path::Path;
use time::format_description::well_known::Rfc3339;
use time::OffsetDateTime;
use tracing_subscriber::{fmt, EnvFilter};
use walkdir::WalkDir;

#[derive(Parser)]
#[command(name = "docmatch")]
#[command(about = "Match error messages against a documentation corpus", long_about = None)]
struct Cli {
    /// TOML config file; DOCMATCH_* environment variables override it
    #[arg(long, default_value = "docmatch.toml")]
    config: String,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Build an index snapshot from a documentation directory
    Build {
        /// Directory of .md / .txt documentation files
        #[arg(long)]
        docs: String,
        /// Output snapshot directory
        #[arg(long, default_value = "./index")]
        index: String,
    },
    /// Match a query against a built snapshot
    Search {
        #[arg(long, default_value = "./index")]
        index: String,
        /// Feedback database directory
        #[arg(long, default_value = "./feedback")]
        feedback: String,
        /// Ranking strategy: tfidf, bm25, hybrid, ensemble
        #[arg(long, default_value = "hybrid")]
        engine: String,
        query: String,
    },
    /// Match a query with every strategy and print the ranked list
    Multi {
        #[arg(long, default_value = "./index")]
        index: String,
        #[arg(long, default_value = "./feedback")]
        feedback: String,
        query: String,
    },
    /// Record the correct document for an earlier prediction
    Feedback {
        #[arg(long, default_value = "./feedback")]
        feedback: String,
        #[arg(long, default_value = "hybrid")]
        engine: String,
        #[arg(long)]
        predicted: String,
        #[arg(long)]
        actual: String,
        query: String,
    },
}

fn main() -> Result<()> {
    fmt().with_env_filter(EnvFilter::from_default_env()).init();
    let cli = Cli::parse();
    let config = load_config(&cli.config)?;

    match cli.command {
        Commands::Build { docs, index } => build(&config, &docs, &index),
        Commands::Search {
            index,
            feedback,
            engine,
            query,
        } => search(&config, &index, &feedback, &engine, &query),
        Commands::Multi {
            index,
            feedback,
            query,
        } => multi(&config, &index, &feedback, &query),
        Commands::Feedback {
            feedback,
            engine,
            predicted,
            actual,
            query,
        } => record_feedback(&config, &feedback, &engine, &predicted, &actual, &query),
    }
}

fn load_config(path: &str) -> Result<EngineConfig> {
    let config: EngineConfig = Figment::new()
        .merge(Serialized::defaults(EngineConfig::default()))
        .merge(Toml::file(path))
        .merge(Env::prefixed("DOCMATCH_"))
        .extract()
        .context("loading configuration")?;
    config.validate()?;
    Ok(config)
}

fn build(config: &EngineConfig, docs_dir: &str, index_dir: &str) -> Result<()> {
    let corpus = read_corpus(Path::new(docs_dir))?;
    if corpus.is_empty() {
        bail!("no .md or .txt documents under {docs_dir}");
    }
    let (generation, skipped) = Generation::build(1, &corpus, config.bm25)?;
    let created_at = OffsetDateTime::now_utc().format(&Rfc3339)?;
    persist::save_generation(&IndexPaths::new(index_dir), &generation, &created_at)?;
    tracing::info!(
        documents = generation.len(),
        terms = generation.vocab.len(),
        skipped_empty = skipped,
        index = index_dir,
        "snapshot written"
    );
    println!(
        "{}",
        serde_json::json!({
            "documents": generation.len(),
            "terms": generation.vocab.len(),
            "skipped_empty": skipped,
            "index": index_dir,
        })
    );
    Ok(())
}

fn open_matcher(config: &EngineConfig, index: &str, feedback: &str) -> Result<Matcher> {
    let generation = persist::load_generation(&IndexPaths::new(index))
        .with_context(|| format!("loading index snapshot from {index}"))?;
    let store = FeedbackStore::open(feedback, config.feedback)?;
    let matcher = Matcher::new(config.clone(), store)?;
    matcher.install_generation(generation);
    Ok(matcher)
}

fn search(config: &EngineConfig, index: &str, feedback: &str, engine: &str, query: &str) -> Result<()> {
    let matcher = open_matcher(config, index, feedback)?;
    let engine: Engine = engine.parse()?;
    let result = matcher.search(query, engine)?;
    println!("{}", serde_json::to_string_pretty(&result)?);
    Ok(())
}

fn multi(config: &EngineConfig, index: &str, feedback: &str, query: &str) -> Result<()> {
    let matcher = open_matcher(config, index, feedback)?;
    let results = matcher.search_multi(query)?;
    println!("{}", serde_json::to_string_pretty(&results)?);
    Ok(())
}

fn record_feedback(
    config: &EngineConfig,
    feedback: &str,
    engine: &str,
    predicted: &str,
    actual: &str,
    query: &str,
) -> Result<()> {
    let store = FeedbackStore::open(feedback, config.feedback)?;
    let engine: Engine = engine.parse()?;
    let outcome = store.record_feedback(query, predicted, actual, engine)?;
    println!("{}", serde_json::to_string_pretty(&outcome)?);
    Ok(())
}

/// Walk a documentation directory into a corpus snapshot. Document ids are
/// forward-slashed paths relative to the root, stable across rebuilds.
fn read_corpus(root: &Path) -> Result<Vec<RawDoc>> {
    let mut corpus = Vec::new();
    for entry in WalkDir::new(root).into_iter().filter_map(|e| e.ok()) {
        let path = entry.path();
        if !path.is_file() {
            continue;
        }
        let Some(ext) = path.extension().and_then(|s| s.to_str()) else {
            continue;
        };
        if !matches!(ext, "md" | "txt") {
            continue;
        }
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("reading {}", path.display()))?;
        let id = path
            .strip_prefix(root)
            .unwrap_or(path)
            .to_string_lossy()
            .replace('\\', "/");
        corpus.push(RawDoc { id, text });
    }
    Ok(corpus)
}
