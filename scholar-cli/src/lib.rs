//! # scholar-cli
//!
//! The `scholar` command: ingest a directory of notes, then ask questions
//! and get answers that cite the chunks they came from.
//!
//! ```text
//! scholar ingest data/ --chunk-size 512 --chunk-overlap 50
//! scholar ask "What helps reduce cognitive load?" -k 3
//! scholar stats
//! ```
//!
//! The index lives in `--index-dir` (default `./index`) as a JSON vector
//! snapshot plus a manifest recording which embedder built each collection.
//! An `ingest.lock` file keeps concurrent ingests out of the same directory.

pub mod cli;
pub mod commands;
pub mod lock;
pub mod manifest;
pub mod render;

pub use cli::{Cli, Command, EmbedderKind};
pub use commands::run;
