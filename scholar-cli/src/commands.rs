//! Command handlers.
//!
//! Each handler returns data; [`run`] does the printing, so the handlers can
//! be exercised from tests without capturing stdout.

use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, bail};
use scholar_rag::anthropic::AnthropicGenerationProvider;
use scholar_rag::ollama::OllamaEmbeddingProvider;
use scholar_rag::openai::OpenAIEmbeddingProvider;
use scholar_rag::{
    Answer, Chunker, CollectionStats, EmbeddingProvider, FixedSizeChunker, GenerationProvider,
    HashEmbeddingProvider, InMemoryVectorStore, IngestReport, RagConfig, RagPipeline,
    SentenceChunker, VectorStore,
};
use tracing::info;

use crate::cli::{AskArgs, Cli, Command, EmbedderKind, IngestArgs};
use crate::lock::IndexLock;
use crate::manifest::{IndexManifest, MANIFEST_FILE};
use crate::render::{render_answer, render_report, render_stats};

/// File name of the vector snapshot inside the index directory.
pub const VECTORS_FILE: &str = "vectors.json";

/// Execute a parsed command line, printing results to stdout.
pub async fn run(cli: Cli) -> anyhow::Result<()> {
    match cli.command {
        Command::Ingest(args) => {
            let report = ingest(&cli.index_dir, &args).await?;
            print!("{}", render_report(&report));
            if report.all_failed() {
                bail!("none of the {} documents could be ingested", report.failures.len());
            }
        }
        Command::Ask(args) => {
            let answer = ask(&cli.index_dir, &args).await?;
            print!("{}", render_answer(&answer));
        }
        Command::Stats { collection } => {
            let stats = stats(&cli.index_dir, collection.as_deref()).await?;
            print!("{}", render_stats(&stats));
        }
    }
    Ok(())
}

/// Build the embedding backend selected on the command line.
pub fn build_embedder(kind: EmbedderKind) -> anyhow::Result<Arc<dyn EmbeddingProvider>> {
    let provider: Arc<dyn EmbeddingProvider> = match kind {
        EmbedderKind::Hash => Arc::new(HashEmbeddingProvider::default()),
        EmbedderKind::Openai => Arc::new(OpenAIEmbeddingProvider::from_env()?),
        EmbedderKind::Ollama => Arc::new(OllamaEmbeddingProvider::from_env()?),
    };
    Ok(provider)
}

fn vectors_path(index_dir: &Path) -> PathBuf {
    index_dir.join(VECTORS_FILE)
}

/// Ingest `args.dir` into the index and persist it.
///
/// Holds the [`IndexLock`] throughout. Nothing is written when every
/// document fails.
pub async fn ingest(index_dir: &Path, args: &IngestArgs) -> anyhow::Result<IngestReport> {
    let _lock = IndexLock::acquire(index_dir)?;
    if args.reset {
        reset_index(index_dir).await?;
    }

    let embedder = build_embedder(args.embedder)?;
    let mut manifest = IndexManifest::load(index_dir)?;
    manifest.check(&args.collection, args.embedder.as_str(), embedder.dimensions())?;

    let store = Arc::new(InMemoryVectorStore::open(vectors_path(index_dir)).await?);
    let config = RagConfig::builder()
        .chunk_size(args.chunk_size)
        .chunk_overlap(args.chunk_overlap)
        .build()?;
    let chunker: Arc<dyn Chunker> = if args.sentence {
        Arc::new(SentenceChunker::new(config.chunk_size, config.chunk_overlap)?)
    } else {
        Arc::new(FixedSizeChunker::new(config.chunk_size, config.chunk_overlap)?)
    };

    let pipeline = RagPipeline::builder()
        .config(config)
        .embedding_provider(embedder.clone())
        .vector_store(store.clone())
        .chunker(chunker)
        .build()?;
    pipeline.create_collection(&args.collection).await?;

    let report = pipeline.ingest_directory(&args.collection, &args.dir).await?;
    if report.documents.is_empty() && report.failures.is_empty() {
        bail!("no documents found in {}; add .txt, .md or .pdf files", args.dir.display());
    }

    if !report.documents.is_empty() {
        store.persist(vectors_path(index_dir)).await?;
        manifest.record(&args.collection, args.embedder.as_str(), embedder.dimensions());
        manifest.save(index_dir)?;
    }
    Ok(report)
}

/// Delete the snapshot and manifest in `index_dir`, if present.
pub async fn reset_index(index_dir: &Path) -> anyhow::Result<()> {
    for name in [VECTORS_FILE, MANIFEST_FILE] {
        let path = index_dir.join(name);
        match tokio::fs::remove_file(&path).await {
            Ok(()) => info!(path = %path.display(), "removed existing index file"),
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => {
                return Err(e).with_context(|| format!("failed to remove {}", path.display()));
            }
        }
    }
    Ok(())
}

/// Answer `args.question` from the persisted index using Anthropic.
pub async fn ask(index_dir: &Path, args: &AskArgs) -> anyhow::Result<Answer> {
    let path = vectors_path(index_dir);
    if !path.exists() {
        bail!("no index at {}; run `scholar ingest` first", path.display());
    }

    let embedder = build_embedder(args.embedder)?;
    IndexManifest::load(index_dir)?.check(
        &args.collection,
        args.embedder.as_str(),
        embedder.dimensions(),
    )?;

    let mut generator = AnthropicGenerationProvider::from_env()?;
    if let Some(model) = &args.model {
        generator = generator.with_model(model);
    }

    let store = Arc::new(InMemoryVectorStore::load(&path).await?);
    answer_question(store, embedder, Arc::new(generator), &args.collection, &args.question, args.k)
        .await
}

/// Retrieve `k` chunks from `store` and have `generator` answer from them.
pub async fn answer_question(
    store: Arc<InMemoryVectorStore>,
    embedder: Arc<dyn EmbeddingProvider>,
    generator: Arc<dyn GenerationProvider>,
    collection: &str,
    question: &str,
    k: usize,
) -> anyhow::Result<Answer> {
    if !store.collection_names().await.iter().any(|name| name == collection) {
        bail!("collection '{collection}' has not been ingested");
    }

    let pipeline = RagPipeline::builder()
        .config(RagConfig::builder().top_k(k).build()?)
        .embedding_provider(embedder)
        .vector_store(store)
        .generation_provider(generator)
        .build()?;

    Ok(pipeline.ask(collection, question).await?)
}

/// Entry counts for one collection, or all of them.
pub async fn stats(
    index_dir: &Path,
    collection: Option<&str>,
) -> anyhow::Result<Vec<(String, CollectionStats)>> {
    let store = InMemoryVectorStore::open(vectors_path(index_dir)).await?;
    let names = match collection {
        Some(name) => vec![name.to_string()],
        None => store.collection_names().await,
    };

    let mut stats = Vec::with_capacity(names.len());
    for name in names {
        let entry = store.stats(&name).await?;
        stats.push((name, entry));
    }
    Ok(stats)
}
