// src/collection.rs
//! An ordered sequence of documents plus its dirty flag
//!
//! Documents are appended in insertion order and never reordered; the dirty
//! flag tracks whether the in-memory state has diverged from the backing
//! file since the last successful flush.

use serde_json::Value;

#[derive(Debug, Clone)]
pub struct Collection {
    documents: Vec<Value>,
    dirty: bool,
}

impl Collection {
    /// New empty collection, created through the API and not yet persisted
    pub fn new() -> Self {
        Collection {
            documents: Vec::new(),
            dirty: true,
        }
    }

    /// Collection loaded from its backing file; clean until mutated
    pub fn loaded(documents: Vec<Value>) -> Self {
        Collection {
            documents,
            dirty: false,
        }
    }

    /// Collection seeded from a source document; has no backing file yet
    pub fn seeded(documents: Vec<Value>) -> Self {
        Collection {
            documents,
            dirty: true,
        }
    }

    pub fn documents(&self) -> &[Value] {
        &self.documents
    }

    /// Append documents in the given order and mark the collection dirty
    pub fn append(&mut self, docs: Vec<Value>) {
        self.documents.extend(docs);
        self.dirty = true;
    }

    /// Swap in a fully rebuilt document list (post-update commit)
    pub fn replace_documents(&mut self, documents: Vec<Value>) {
        self.documents = documents;
        self.dirty = true;
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    pub fn mark_clean(&mut self) {
        self.dirty = false;
    }

    pub fn len(&self) -> usize {
        self.documents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.documents.is_empty()
    }
}

impl Default for Collection {
    fn default() -> Self {
        Self::new()
    }
}
