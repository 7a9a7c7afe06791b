//! Command-line arguments.

use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};

/// Ask questions about your own documents.
#[derive(Parser, Debug)]
#[command(name = "scholar", version, about, long_about = None)]
pub struct Cli {
    /// Directory holding the vector index and its manifest
    #[arg(long, global = true, default_value = "index")]
    pub index_dir: PathBuf,

    /// Increase log verbosity (-v, -vv)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Load, chunk, embed and index every document in a directory
    Ingest(IngestArgs),
    /// Answer a question from the indexed documents
    Ask(AskArgs),
    /// Show what the index holds
    Stats {
        /// Only show this collection
        #[arg(long)]
        collection: Option<String>,
    },
}

#[derive(clap::Args, Debug)]
pub struct IngestArgs {
    /// Directory of .txt, .md and .pdf files
    #[arg(default_value = "data")]
    pub dir: PathBuf,

    /// Collection to ingest into
    #[arg(long, default_value = DEFAULT_COLLECTION)]
    pub collection: String,

    /// Maximum chunk size in characters
    #[arg(long, default_value_t = 512)]
    pub chunk_size: usize,

    /// Characters shared by consecutive chunks
    #[arg(long, default_value_t = 50)]
    pub chunk_overlap: usize,

    /// Split on paragraph and sentence boundaries instead of fixed windows
    #[arg(long)]
    pub sentence: bool,

    /// Delete the existing index before ingesting
    #[arg(long)]
    pub reset: bool,

    /// Embedding backend
    #[arg(long, value_enum, default_value_t = EmbedderKind::Hash)]
    pub embedder: EmbedderKind,
}

#[derive(clap::Args, Debug)]
pub struct AskArgs {
    /// The question to answer
    pub question: String,

    /// Collection to search
    #[arg(long, default_value = DEFAULT_COLLECTION)]
    pub collection: String,

    /// Number of chunks to retrieve
    #[arg(short, long, default_value_t = 2)]
    pub k: usize,

    /// Embedding backend; must match the one used to ingest
    #[arg(long, value_enum, default_value_t = EmbedderKind::Hash)]
    pub embedder: EmbedderKind,

    /// Anthropic model used to write the answer
    #[arg(long)]
    pub model: Option<String>,
}

/// Collection used when none is given.
pub const DEFAULT_COLLECTION: &str = "documents";

/// Embedding backends selectable from the command line.
#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum EmbedderKind {
    /// Local feature hashing, no model or network needed
    Hash,
    /// OpenAI embeddings API (`OPENAI_API_KEY`)
    Openai,
    /// Local Ollama server (`OLLAMA_HOST`)
    Ollama,
}

impl EmbedderKind {
    /// Name recorded in the index manifest.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Hash => "hash",
            Self::Openai => "openai",
            Self::Ollama => "ollama",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_ingest_with_options() {
        let cli = Cli::parse_from([
            "scholar",
            "--index-dir",
            "/tmp/idx",
            "ingest",
            "notes",
            "--chunk-size",
            "50",
            "--chunk-overlap",
            "10",
            "--sentence",
            "--reset",
        ]);
        assert_eq!(cli.index_dir, PathBuf::from("/tmp/idx"));
        let Command::Ingest(args) = cli.command else { panic!("expected ingest") };
        assert_eq!(args.dir, PathBuf::from("notes"));
        assert_eq!((args.chunk_size, args.chunk_overlap), (50, 10));
        assert!(args.sentence && args.reset);
        assert_eq!(args.embedder, EmbedderKind::Hash);
        assert_eq!(args.collection, DEFAULT_COLLECTION);
    }

    #[test]
    fn parses_ask() {
        let cli = Cli::parse_from(["scholar", "ask", "What is RAG?", "-k", "5", "-v"]);
        assert_eq!(cli.verbose, 1);
        let Command::Ask(args) = cli.command else { panic!("expected ask") };
        assert_eq!(args.question, "What is RAG?");
        assert_eq!(args.k, 5);
        assert!(args.model.is_none());
    }

    #[test]
    fn rejects_unknown_embedder() {
        assert!(Cli::try_parse_from(["scholar", "ask", "q", "--embedder", "bert"]).is_err());
    }
}
