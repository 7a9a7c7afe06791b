//! In-memory vector store using cosine similarity, with JSON snapshots.
//!
//! This module provides [`InMemoryVectorStore`], a vector store backed by a
//! `HashMap` protected by a `tokio::sync::RwLock`. Every mutating call holds
//! the write lock for the whole batch, so readers never see a partial
//! upsert. [`InMemoryVectorStore::persist`] writes a snapshot that
//! [`InMemoryVectorStore::load`] restores without re-embedding.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::io::{self, Write};
use std::path::Path;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tempfile::NamedTempFile;
use tokio::sync::RwLock;
use tracing::{debug, info};

use crate::document::{Chunk, SearchResult};
use crate::error::{RagError, Result};
use crate::vectorstore::{CollectionStats, VectorStore};

const BACKEND: &str = "InMemory";

/// Snapshot format version written by [`InMemoryVectorStore::persist`].
pub const SNAPSHOT_VERSION: u32 = 1;

#[derive(Debug, Default)]
struct Collection {
    dimensions: usize,
    entries: HashMap<String, Entry>,
    next_seq: u64,
}

/// A stored chunk plus its first-insertion sequence number, used to break
/// score ties in insertion order.
#[derive(Debug, Clone)]
struct Entry {
    seq: u64,
    chunk: Chunk,
}

impl Collection {
    fn new(dimensions: usize) -> Self {
        Self { dimensions, ..Self::default() }
    }

    fn check(&self, chunks: &[Chunk]) -> Result<()> {
        match chunks.iter().find(|c| c.embedding.len() != self.dimensions) {
            Some(bad) => Err(RagError::DimensionMismatch {
                expected: self.dimensions,
                actual: bad.embedding.len(),
            }),
            None => Ok(()),
        }
    }

    /// Replacing an id keeps its original position in insertion order.
    fn insert(&mut self, chunk: Chunk) {
        match self.entries.get_mut(&chunk.id) {
            Some(entry) => entry.chunk = chunk,
            None => {
                let seq = self.next_seq;
                self.next_seq += 1;
                self.entries.insert(chunk.id.clone(), Entry { seq, chunk });
            }
        }
    }

    fn ordered(&self) -> Vec<&Entry> {
        let mut entries: Vec<&Entry> = self.entries.values().collect();
        entries.sort_by_key(|e| e.seq);
        entries
    }
}

/// An in-memory vector store using cosine similarity for search.
///
/// Collections are stored as nested maps: collection name → chunk ID → chunk.
/// All operations are async-safe via `tokio::sync::RwLock`.
///
/// # Example
///
/// ```rust,ignore
/// use scholar_rag::{InMemoryVectorStore, VectorStore};
///
/// let store = InMemoryVectorStore::new();
/// store.create_collection("docs", 384).await?;
/// store.persist("index/vectors.json").await?;
/// let restored = InMemoryVectorStore::load("index/vectors.json").await?;
/// ```
#[derive(Debug, Default)]
pub struct InMemoryVectorStore {
    collections: RwLock<HashMap<String, Collection>>,
}

impl InMemoryVectorStore {
    /// Create a new empty in-memory vector store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Write a snapshot of every collection to `path`.
    ///
    /// The snapshot is written to a uniquely named temporary file in the
    /// same directory and renamed into place, so an interrupted write leaves
    /// the previous snapshot intact and concurrent writers never share a
    /// temporary file.
    pub async fn persist(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let data = {
            let collections = self.collections.read().await;
            let snapshot = Snapshot {
                version: SNAPSHOT_VERSION,
                collections: collections
                    .iter()
                    .map(|(name, collection)| {
                        let entries =
                            collection.ordered().into_iter().map(|e| e.chunk.clone()).collect();
                        (
                            name.clone(),
                            CollectionSnapshot { dimensions: collection.dimensions, entries },
                        )
                    })
                    .collect(),
            };
            serde_json::to_vec(&snapshot).map_err(|e| store_error(format!("serialize: {e}")))?
        };

        let bytes = data.len();
        let target = path.to_path_buf();
        tokio::task::spawn_blocking(move || write_snapshot(&target, &data))
            .await
            .map_err(|e| store_error(format!("snapshot writer failed: {e}")))??;

        info!(path = %path.display(), bytes, "persisted vector index");
        Ok(())
    }

    /// Restore a store from a snapshot written by [`persist`](Self::persist).
    ///
    /// # Errors
    ///
    /// - [`RagError::ReadError`] if the file cannot be read.
    /// - [`RagError::IndexCorruption`] if it is not a valid snapshot.
    pub async fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let data = tokio::fs::read(path).await.map_err(|e| RagError::read(path, e))?;
        let corrupt =
            |message: String| RagError::IndexCorruption { path: path.to_path_buf(), message };

        let snapshot: Snapshot =
            serde_json::from_slice(&data).map_err(|e| corrupt(format!("invalid snapshot: {e}")))?;
        if snapshot.version != SNAPSHOT_VERSION {
            return Err(corrupt(format!(
                "unsupported snapshot version {} (expected {SNAPSHOT_VERSION})",
                snapshot.version
            )));
        }

        let mut collections = HashMap::new();
        let mut total = 0;
        for (name, stored) in snapshot.collections {
            let mut collection = Collection::new(stored.dimensions);
            collection
                .check(&stored.entries)
                .map_err(|e| corrupt(format!("collection '{name}': {e}")))?;
            for chunk in stored.entries {
                if collection.entries.contains_key(&chunk.id) {
                    return Err(corrupt(format!(
                        "collection '{name}': duplicate chunk id '{}'",
                        chunk.id
                    )));
                }
                collection.insert(chunk);
            }
            total += collection.entries.len();
            collections.insert(name, collection);
        }

        info!(path = %path.display(), chunks = total, "loaded vector index");
        Ok(Self { collections: RwLock::new(collections) })
    }

    /// [`load`](Self::load) the snapshot at `path`, or start empty if there is none.
    pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        match tokio::fs::try_exists(path).await {
            Ok(true) => Self::load(path).await,
            Ok(false) => {
                debug!(path = %path.display(), "no snapshot, starting empty");
                Ok(Self::new())
            }
            Err(e) => Err(RagError::read(path, e)),
        }
    }

    /// Names of all collections, sorted.
    pub async fn collection_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.collections.read().await.keys().cloned().collect();
        names.sort();
        names
    }
}

#[derive(Serialize, Deserialize)]
struct Snapshot {
    version: u32,
    collections: BTreeMap<String, CollectionSnapshot>,
}

#[derive(Serialize, Deserialize)]
struct CollectionSnapshot {
    dimensions: usize,
    /// In insertion order.
    entries: Vec<Chunk>,
}

fn store_error(message: impl Into<String>) -> RagError {
    RagError::VectorStoreError { backend: BACKEND.to_string(), message: message.into() }
}

fn missing(collection: &str) -> RagError {
    store_error(format!("collection '{collection}' does not exist"))
}

fn write_error(path: &Path, e: io::Error) -> RagError {
    store_error(format!("failed to write {}: {e}", path.display()))
}

fn write_snapshot(path: &Path, data: &[u8]) -> Result<()> {
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    std::fs::create_dir_all(dir).map_err(|e| write_error(dir, e))?;

    let mut tmp = NamedTempFile::new_in(dir).map_err(|e| write_error(dir, e))?;
    tmp.write_all(data).map_err(|e| write_error(tmp.path(), e))?;
    tmp.as_file().sync_all().map_err(|e| write_error(tmp.path(), e))?;
    tmp.persist(path).map_err(|e| write_error(path, e.error))?;
    Ok(())
}

/// Compute cosine similarity between two vectors.
///
/// Returns 0.0 if either vector has zero magnitude. The result is clamped
/// to `[-1.0, 1.0]` against rounding.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    let dot: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    (dot / (norm_a * norm_b)).clamp(-1.0, 1.0)
}

#[async_trait]
impl VectorStore for InMemoryVectorStore {
    async fn create_collection(&self, name: &str, dimensions: usize) -> Result<()> {
        let mut collections = self.collections.write().await;
        match collections.get(name) {
            Some(existing) if existing.dimensions != dimensions => Err(
                RagError::DimensionMismatch { expected: existing.dimensions, actual: dimensions },
            ),
            Some(_) => Ok(()),
            None => {
                collections.insert(name.to_string(), Collection::new(dimensions));
                Ok(())
            }
        }
    }

    async fn delete_collection(&self, name: &str) -> Result<()> {
        let mut collections = self.collections.write().await;
        collections.remove(name);
        Ok(())
    }

    async fn upsert(&self, collection: &str, chunks: &[Chunk]) -> Result<()> {
        let mut collections = self.collections.write().await;
        let store = collections.get_mut(collection).ok_or_else(|| missing(collection))?;
        store.check(chunks)?;
        for chunk in chunks {
            store.insert(chunk.clone());
        }
        Ok(())
    }

    async fn delete(&self, collection: &str, ids: &[&str]) -> Result<()> {
        let mut collections = self.collections.write().await;
        let store = collections.get_mut(collection).ok_or_else(|| missing(collection))?;
        for id in ids {
            store.entries.remove(*id);
        }
        Ok(())
    }

    async fn replace_document(
        &self,
        collection: &str,
        document_id: &str,
        chunks: &[Chunk],
    ) -> Result<()> {
        let mut collections = self.collections.write().await;
        let store = collections.get_mut(collection).ok_or_else(|| missing(collection))?;
        store.check(chunks)?;

        let keep: HashSet<&str> = chunks.iter().map(|c| c.id.as_str()).collect();
        store
            .entries
            .retain(|id, e| e.chunk.document_id != document_id || keep.contains(id.as_str()));
        for chunk in chunks {
            store.insert(chunk.clone());
        }
        Ok(())
    }

    async fn search(
        &self,
        collection: &str,
        embedding: &[f32],
        top_k: usize,
    ) -> Result<Vec<SearchResult>> {
        let collections = self.collections.read().await;
        let store = collections.get(collection).ok_or_else(|| missing(collection))?;
        if store.entries.is_empty() || top_k == 0 {
            return Ok(Vec::new());
        }
        if embedding.len() != store.dimensions {
            return Err(RagError::DimensionMismatch {
                expected: store.dimensions,
                actual: embedding.len(),
            });
        }

        let mut scored: Vec<(f32, &Entry)> = store
            .entries
            .values()
            .map(|entry| (cosine_similarity(&entry.chunk.embedding, embedding), entry))
            .collect();

        scored.sort_by(|(sa, a), (sb, b)| sb.total_cmp(sa).then(a.seq.cmp(&b.seq)));
        scored.truncate(top_k);

        Ok(scored
            .into_iter()
            .map(|(score, entry)| SearchResult { chunk: entry.chunk.clone(), score })
            .collect())
    }

    async fn stats(&self, collection: &str) -> Result<CollectionStats> {
        let collections = self.collections.read().await;
        let store = collections.get(collection).ok_or_else(|| missing(collection))?;
        let documents: HashSet<&str> =
            store.entries.values().map(|e| e.chunk.document_id.as_str()).collect();
        Ok(CollectionStats {
            dimensions: store.dimensions,
            chunks: store.entries.len(),
            documents: documents.len(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chunk(id: &str, doc: &str, embedding: Vec<f32>) -> Chunk {
        Chunk {
            id: id.into(),
            text: format!("text of {id}"),
            embedding,
            metadata: HashMap::new(),
            document_id: doc.into(),
            start_offset: 0,
            end_offset: 10,
        }
    }

    #[test]
    fn cosine_handles_zero_vectors() {
        assert_eq!(cosine_similarity(&[0.0, 0.0], &[1.0, 0.0]), 0.0);
        assert!((cosine_similarity(&[2.0, 0.0], &[1.0, 0.0]) - 1.0).abs() < 1e-6);
    }

    #[test]
    fn cosine_stays_within_unit_range() {
        for seed in 1..200u32 {
            let a: Vec<f32> =
                (0..7u32).map(|i| ((seed * 31 + i * 17) % 97) as f32 / 13.0).collect();
            let b: Vec<f32> = a.iter().map(|x| -x).collect();
            let opposite = cosine_similarity(&a, &b);
            assert!(opposite >= -1.0 && opposite < -0.99999, "seed {seed}: {opposite}");
            assert!(cosine_similarity(&a, &a) <= 1.0);
        }
    }

    #[tokio::test]
    async fn create_collection_rejects_other_dimension() {
        let store = InMemoryVectorStore::new();
        store.create_collection("c", 3).await.unwrap();
        store.create_collection("c", 3).await.unwrap();
        let err = store.create_collection("c", 4).await.unwrap_err();
        assert!(matches!(err, RagError::DimensionMismatch { expected: 3, actual: 4 }));
    }

    #[tokio::test]
    async fn upsert_with_bad_dimension_writes_nothing() {
        let store = InMemoryVectorStore::new();
        store.create_collection("c", 2).await.unwrap();
        let batch = vec![chunk("a", "d", vec![1.0, 0.0]), chunk("b", "d", vec![1.0])];
        let err = store.upsert("c", &batch).await.unwrap_err();
        assert!(matches!(err, RagError::DimensionMismatch { expected: 2, actual: 1 }));
        assert_eq!(store.stats("c").await.unwrap().chunks, 0);
    }

    #[tokio::test]
    async fn ties_break_by_insertion_order() {
        let store = InMemoryVectorStore::new();
        store.create_collection("c", 2).await.unwrap();
        store
            .upsert(
                "c",
                &[
                    chunk("z", "d", vec![1.0, 0.0]),
                    chunk("a", "d", vec![1.0, 0.0]),
                    chunk("m", "d", vec![0.0, 1.0]),
                ],
            )
            .await
            .unwrap();
        // Re-upserting keeps the original position.
        store.upsert("c", &[chunk("z", "d", vec![1.0, 0.0])]).await.unwrap();

        let ids: Vec<String> = store
            .search("c", &[1.0, 0.0], 3)
            .await
            .unwrap()
            .into_iter()
            .map(|r| r.chunk.id)
            .collect();
        assert_eq!(ids, vec!["z", "a", "m"]);
    }

    #[tokio::test]
    async fn replace_document_drops_stale_chunks() {
        let store = InMemoryVectorStore::new();
        store.create_collection("c", 1).await.unwrap();
        store
            .upsert(
                "c",
                &[
                    chunk("d_0", "d", vec![1.0]),
                    chunk("d_1", "d", vec![1.0]),
                    chunk("e_0", "e", vec![1.0]),
                ],
            )
            .await
            .unwrap();

        store.replace_document("c", "d", &[chunk("d_0", "d", vec![1.0])]).await.unwrap();

        let ids: Vec<String> = store
            .search("c", &[1.0], 10)
            .await
            .unwrap()
            .into_iter()
            .map(|r| r.chunk.id)
            .collect();
        assert_eq!(ids, vec!["d_0", "e_0"]);
        let stats = store.stats("c").await.unwrap();
        assert_eq!((stats.chunks, stats.documents), (2, 2));
    }

    #[tokio::test]
    async fn search_query_dimension_checked() {
        let store = InMemoryVectorStore::new();
        store.create_collection("c", 2).await.unwrap();
        store.upsert("c", &[chunk("a", "d", vec![1.0, 0.0])]).await.unwrap();
        assert!(matches!(
            store.search("c", &[1.0], 1).await,
            Err(RagError::DimensionMismatch { .. })
        ));
    }

    #[tokio::test]
    async fn missing_collection_is_error() {
        let store = InMemoryVectorStore::new();
        assert!(matches!(
            store.search("nope", &[1.0], 1).await,
            Err(RagError::VectorStoreError { .. })
        ));
    }

    #[tokio::test]
    async fn open_without_snapshot_is_empty() {
        let temp = tempfile::tempdir().unwrap();
        let store = InMemoryVectorStore::open(temp.path().join("vectors.json")).await.unwrap();
        assert!(store.collection_names().await.is_empty());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_persists_leave_one_whole_snapshot() {
        let temp = tempfile::tempdir().unwrap();
        let path = temp.path().join("index").join("vectors.json");

        let mut writers = Vec::new();
        for n in 1..=8usize {
            let path = path.clone();
            writers.push(tokio::spawn(async move {
                let store = InMemoryVectorStore::new();
                store.create_collection("c", 1).await.unwrap();
                let chunks: Vec<Chunk> =
                    (0..n).map(|i| chunk(&format!("c{i}"), "d", vec![1.0])).collect();
                store.upsert("c", &chunks).await.unwrap();
                store.persist(&path).await.unwrap();
            }));
        }
        for writer in writers {
            writer.await.unwrap();
        }

        let restored = InMemoryVectorStore::load(&path).await.unwrap();
        let chunks = restored.stats("c").await.unwrap().chunks;
        assert!((1..=8).contains(&chunks));
        let leftovers: Vec<_> = std::fs::read_dir(path.parent().unwrap())
            .unwrap()
            .map(|e| e.unwrap().file_name())
            .collect();
        assert_eq!(leftovers, vec![std::ffi::OsString::from("vectors.json")]);
    }

    #[tokio::test]
    async fn load_rejects_garbage_and_unknown_version() {
        let temp = tempfile::tempdir().unwrap();
        let path = temp.path().join("vectors.json");

        tokio::fs::write(&path, b"{not json").await.unwrap();
        assert!(matches!(
            InMemoryVectorStore::load(&path).await,
            Err(RagError::IndexCorruption { .. })
        ));

        tokio::fs::write(&path, br#"{"version":99,"collections":{}}"#).await.unwrap();
        assert!(matches!(
            InMemoryVectorStore::load(&path).await,
            Err(RagError::IndexCorruption { .. })
        ));
    }

    #[tokio::test]
    async fn load_rejects_inconsistent_vectors() {
        let temp = tempfile::tempdir().unwrap();
        let path = temp.path().join("vectors.json");
        let snapshot = serde_json::json!({
            "version": SNAPSHOT_VERSION,
            "collections": {
                "c": { "dimensions": 3, "entries": [chunk("a", "d", vec![1.0])] }
            }
        });
        tokio::fs::write(&path, serde_json::to_vec(&snapshot).unwrap()).await.unwrap();

        let err = InMemoryVectorStore::load(&path).await.unwrap_err();
        assert!(matches!(err, RagError::IndexCorruption { .. }));
    }
}
