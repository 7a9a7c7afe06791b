//! Records which embedder built each collection.
//!
//! Vectors from different embedders are not comparable, so `ask` refuses to
//! query a collection with an embedder other than the one that filled it.

use std::collections::BTreeMap;
use std::io;
use std::path::Path;

use anyhow::Context;
use scholar_rag::{RagError, Result};
use serde::{Deserialize, Serialize};

/// File name of the manifest inside the index directory.
pub const MANIFEST_FILE: &str = "manifest.json";

/// Embedder identity for one collection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CollectionManifest {
    /// Embedder name as given on the command line.
    pub embedder: String,
    /// Vector dimensionality it produced.
    pub dimensions: usize,
}

/// Per-collection embedder records, stored next to the vector snapshot.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexManifest {
    pub collections: BTreeMap<String, CollectionManifest>,
}

impl IndexManifest {
    /// Read the manifest from `index_dir`, or start empty if there is none.
    pub fn load(index_dir: &Path) -> anyhow::Result<Self> {
        let path = index_dir.join(MANIFEST_FILE);
        match std::fs::read_to_string(&path) {
            Ok(data) => serde_json::from_str(&data).map_err(|e| {
                RagError::IndexCorruption { path, message: format!("invalid manifest: {e}") }.into()
            }),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(Self::default()),
            Err(e) => Err(RagError::read(path, e).into()),
        }
    }

    /// Write the manifest into `index_dir`.
    pub fn save(&self, index_dir: &Path) -> anyhow::Result<()> {
        let path = index_dir.join(MANIFEST_FILE);
        let data = serde_json::to_string_pretty(self)?;
        std::fs::create_dir_all(index_dir)
            .with_context(|| format!("failed to create {}", index_dir.display()))?;
        std::fs::write(&path, data).with_context(|| format!("failed to write {}", path.display()))
    }

    /// Fail with [`RagError::InvalidConfig`] if `collection` was built by
    /// another embedder. Unknown collections pass.
    pub fn check(&self, collection: &str, embedder: &str, dimensions: usize) -> Result<()> {
        let Some(recorded) = self.collections.get(collection) else {
            return Ok(());
        };
        if recorded.embedder == embedder && recorded.dimensions == dimensions {
            return Ok(());
        }
        Err(RagError::InvalidConfig(format!(
            "collection '{collection}' was built with the '{}' embedder ({} dimensions); \
             re-run with --embedder {} or re-ingest with --reset",
            recorded.embedder, recorded.dimensions, recorded.embedder
        )))
    }

    /// Record the embedder used for `collection`.
    pub fn record(&mut self, collection: &str, embedder: &str, dimensions: usize) {
        self.collections.insert(
            collection.to_string(),
            CollectionManifest { embedder: embedder.to_string(), dimensions },
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_through_index_dir() {
        let temp = tempfile::tempdir().unwrap();
        let dir = temp.path().join("index");

        assert_eq!(IndexManifest::load(&dir).unwrap(), IndexManifest::default());

        let mut manifest = IndexManifest::default();
        manifest.record("documents", "hash", 384);
        manifest.save(&dir).unwrap();
        assert_eq!(IndexManifest::load(&dir).unwrap(), manifest);
    }

    #[test]
    fn mismatched_embedder_is_invalid_config() {
        let mut manifest = IndexManifest::default();
        manifest.record("documents", "hash", 384);

        assert!(manifest.check("documents", "hash", 384).is_ok());
        assert!(manifest.check("other", "openai", 1536).is_ok());
        let err = manifest.check("documents", "openai", 1536).unwrap_err();
        assert!(matches!(err, RagError::InvalidConfig(ref m) if m.contains("--embedder hash")));
    }

    #[test]
    fn garbage_manifest_is_corruption() {
        let temp = tempfile::tempdir().unwrap();
        std::fs::write(temp.path().join(MANIFEST_FILE), "{").unwrap();
        let err = IndexManifest::load(temp.path()).unwrap_err();
        assert!(matches!(err.downcast_ref::<RagError>(), Some(RagError::IndexCorruption { .. })));
    }
}
