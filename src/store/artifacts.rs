//! artifacts.rs
//! Computed artifacts and the storage layer they are persisted into.

use super::types::{ColumnRef, NodeId};
use crate::error::{OptimizerError, Result};
use std::collections::HashMap;
use std::sync::Arc;

#[derive(Debug, Clone, PartialEq)]
pub struct Column {
    pub hash: String,
    pub data: Arc<[u8]>,
}

/// The payload produced by executing a node.
#[derive(Debug, Clone, PartialEq)]
pub enum Artifact {
    /// Dataset or Feature content, one entry per column.
    Columns(Vec<Column>),
    /// Any other object (trained models, aggregates).
    Object(Arc<[u8]>),
}

impl Artifact {
    pub fn size(&self) -> usize {
        match self {
            Artifact::Columns(cols) => cols.iter().map(|c| c.data.len()).sum(),
            Artifact::Object(bytes) => bytes.len(),
        }
    }

    pub fn column_refs(&self) -> Vec<ColumnRef> {
        match self {
            Artifact::Columns(cols) => cols
                .iter()
                .map(|c| ColumnRef { hash: c.hash.clone(), size: c.data.len() as f64 })
                .collect(),
            Artifact::Object(_) => Vec::new(),
        }
    }
}

/// Persistent storage for materialized artifacts.
pub trait ArtifactStore {
    fn store(&mut self, id: &NodeId, artifact: &Artifact) -> Result<()>;
    fn evict(&mut self, id: &NodeId) -> Result<()>;
    fn fetch(&self, id: &NodeId) -> Option<Artifact>;
    /// Bytes physically held by the store.
    fn stored_bytes(&self) -> usize;
}

#[derive(Debug, Clone)]
enum Entry {
    Columns(Vec<String>),
    Object(Arc<[u8]>),
}

/// In-memory store that keeps every distinct column once, shared by all
/// artifacts that reference it.
#[derive(Debug, Clone, Default)]
pub struct DedupedStore {
    columns: HashMap<String, (Arc<[u8]>, usize)>,
    entries: HashMap<NodeId, Entry>,
}

impl DedupedStore {
    pub fn new() -> Self { Self::default() }
    pub fn contains(&self, id: &NodeId) -> bool { self.entries.contains_key(id) }
    pub fn column_count(&self) -> usize { self.columns.len() }

    fn release(&mut self, entry: Entry) {
        if let Entry::Columns(hashes) = entry {
            for hash in hashes {
                if let Some((_, refs)) = self.columns.get_mut(&hash) {
                    *refs -= 1;
                    if *refs == 0 {
                        self.columns.remove(&hash);
                    }
                }
            }
        }
    }
}

impl ArtifactStore for DedupedStore {
    fn store(&mut self, id: &NodeId, artifact: &Artifact) -> Result<()> {
        let entry = match artifact {
            Artifact::Columns(cols) => {
                for col in cols {
                    self.columns
                        .entry(col.hash.clone())
                        .and_modify(|(_, refs)| *refs += 1)
                        .or_insert_with(|| (col.data.clone(), 1));
                }
                Entry::Columns(cols.iter().map(|c| c.hash.clone()).collect())
            }
            Artifact::Object(bytes) => Entry::Object(bytes.clone()),
        };
        if let Some(previous) = self.entries.insert(id.clone(), entry) {
            self.release(previous);
        }
        Ok(())
    }

    fn evict(&mut self, id: &NodeId) -> Result<()> {
        let entry = self
            .entries
            .remove(id)
            .ok_or_else(|| OptimizerError::MissingArtifact(id.clone()))?;
        self.release(entry);
        Ok(())
    }

    fn fetch(&self, id: &NodeId) -> Option<Artifact> {
        match self.entries.get(id)? {
            Entry::Columns(hashes) => {
                let cols = hashes
                    .iter()
                    .map(|h| {
                        self.columns
                            .get(h)
                            .map(|(data, _)| Column { hash: h.clone(), data: data.clone() })
                    })
                    .collect::<Option<Vec<_>>>()?;
                Some(Artifact::Columns(cols))
            }
            Entry::Object(bytes) => Some(Artifact::Object(bytes.clone())),
        }
    }

    fn stored_bytes(&self) -> usize {
        let cols: usize = self.columns.values().map(|(data, _)| data.len()).sum();
        let objects: usize = self
            .entries
            .values()
            .map(|e| match e {
                Entry::Object(bytes) => bytes.len(),
                Entry::Columns(_) => 0,
            })
            .sum();
        cols + objects
    }
}
