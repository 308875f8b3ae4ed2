// src/database.rs
//! The database facade
//!
//! `Bison` owns the file storage, the collection map, and the query cache,
//! and exposes the public verbs. Mutating verbs take `&mut self`; one
//! instance must have exclusive ownership of its root directory for its
//! whole lifetime (two instances on the same directory are unsupported).
//! Everything returned to callers is a deep copy of the in-memory state.

use std::collections::BTreeMap;
use std::path::Path;

use serde_json::{Map, Value};

use crate::collection::Collection;
use crate::error::{BisonError, Result};
use crate::query;
use crate::query_cache::{CacheStats, QueryCache, QueryKey};
use crate::storage::FileStorage;
use crate::update;
use crate::{log_debug, log_trace};

pub struct Bison {
    storage: FileStorage,
    collections: BTreeMap<String, Collection>,
    cache: QueryCache,
}

impl Bison {
    /// Open a database rooted at a directory
    ///
    /// Existing `<name>.json` files are loaded as collections; a missing
    /// directory is an empty database, created on the first flush.
    pub fn open<P: AsRef<Path>>(root: P) -> Result<Self> {
        Self::open_inner(root.as_ref(), None)
    }

    /// Open a database and seed collections from a source document
    ///
    /// The file at `source` must hold a JSON object; each top-level key
    /// becomes a collection whose single document is the corresponding
    /// value, overwriting a loaded collection of the same name.
    pub fn open_with_source<P: AsRef<Path>, Q: AsRef<Path>>(root: P, source: Q) -> Result<Self> {
        Self::open_inner(root.as_ref(), Some(source.as_ref()))
    }

    fn open_inner(root: &Path, source: Option<&Path>) -> Result<Self> {
        let storage = FileStorage::new(root);
        let mut collections = BTreeMap::new();
        for (name, docs) in storage.scan()? {
            collections.insert(name, Collection::loaded(docs));
        }
        if let Some(source) = source {
            for (name, docs) in FileStorage::load_source_document(source)? {
                collections.insert(name, Collection::seeded(docs));
            }
        }
        log_debug!(
            "opened database at {:?} ({} collections)",
            root,
            collections.len()
        );
        Ok(Bison {
            storage,
            collections,
            cache: QueryCache::default(),
        })
    }

    /// Names of all collections
    pub fn collections(&self) -> Vec<String> {
        self.collections.keys().cloned().collect()
    }

    /// Create an empty collection; existing collections keep their contents
    pub fn create_collection(&mut self, name: &str) -> Result<()> {
        validate_collection_name(name)?;
        self.collections
            .entry(name.to_string())
            .or_insert_with(Collection::new);
        Ok(())
    }

    /// Remove a collection and its backing file
    ///
    /// Dropping a name that does not exist is a no-op.
    pub fn drop_collection(&mut self, name: &str) -> Result<()> {
        if self.collections.remove(name).is_some() {
            self.cache.invalidate_collection(name);
            log_debug!("dropped collection '{}'", name);
        }
        self.storage.remove(name)
    }

    /// Remove every collection and every file under the root
    pub fn drop_all(&mut self) -> Result<()> {
        let names: Vec<String> = self.collections.keys().cloned().collect();
        for name in &names {
            self.storage.remove(name)?;
        }
        self.collections.clear();
        self.cache.clear();
        log_debug!("dropped all collections");
        Ok(())
    }

    /// Append one document, creating the collection if absent
    pub fn insert(&mut self, name: &str, document: Value) -> Result<()> {
        self.insert_many(name, vec![document])
    }

    /// Append documents in the given order, creating the collection if absent
    pub fn insert_many(&mut self, name: &str, documents: Vec<Value>) -> Result<()> {
        validate_collection_name(name)?;
        for doc in &documents {
            if !doc.is_object() {
                return Err(BisonError::InvalidDocument(
                    "documents must be JSON objects".to_string(),
                ));
            }
        }
        self.collections
            .entry(name.to_string())
            .or_insert_with(Collection::new)
            .append(documents);
        self.cache.invalidate_collection(name);
        Ok(())
    }

    /// Append the documents of a JSON array file
    pub fn insert_many_from_document<P: AsRef<Path>>(&mut self, name: &str, path: P) -> Result<()> {
        let documents = FileStorage::load_document_array(path)?;
        self.insert_many(name, documents)
    }

    /// Documents matching a filter, in insertion order
    ///
    /// `None` (or an empty filter) matches the whole collection. Results are
    /// memoized per (collection, canonical filter) until the collection is
    /// next mutated.
    pub fn find(&self, name: &str, filter: Option<&Value>) -> Result<Vec<Value>> {
        let collection = self
            .collections
            .get(name)
            .ok_or_else(|| BisonError::CollectionNotFound(name.to_string()))?;

        let empty = Value::Object(Map::new());
        let filter = filter.unwrap_or(&empty);
        query::validate_filter(filter)?;

        let key = QueryKey::new(name, filter);
        if let Some(results) = self.cache.get(&key) {
            log_trace!("cache hit on '{}'", name);
            return Ok(results);
        }
        log_trace!("cache miss on '{}'", name);

        let mut results = Vec::new();
        for doc in collection.documents() {
            if query::matches_filter(doc, filter)? {
                results.push(doc.clone());
            }
        }
        self.cache.insert(name, key, results.clone());
        Ok(results)
    }

    /// Apply an update expression to every document matching the filter
    ///
    /// Without a filter every document is updated. Returns the updated
    /// documents in insertion order, or the full post-update collection
    /// when `return_result` is set. The update runs against a scratch copy
    /// and commits only if every document succeeds, so a failed update
    /// leaves collection and cache untouched; a successful one marks the
    /// collection dirty and invalidates its cache entries even when nothing
    /// matched.
    pub fn update(
        &mut self,
        name: &str,
        update_expr: &Value,
        filter: Option<&Value>,
        return_result: bool,
    ) -> Result<Vec<Value>> {
        let collection = self
            .collections
            .get_mut(name)
            .ok_or_else(|| BisonError::CollectionNotFound(name.to_string()))?;

        let empty = Value::Object(Map::new());
        let filter = filter.unwrap_or(&empty);
        query::validate_filter(filter)?;
        let ops = update::parse_update(update_expr)?;

        let mut documents = collection.documents().to_vec();
        let mut updated = Vec::new();
        for (idx, doc) in documents.iter_mut().enumerate() {
            if query::matches_filter(doc, filter)? {
                update::apply_update(doc, &ops)?;
                updated.push(idx);
            }
        }

        let results = if return_result {
            documents.clone()
        } else {
            updated.iter().map(|&i| documents[i].clone()).collect()
        };

        collection.replace_documents(documents);
        self.cache.invalidate_collection(name);
        log_debug!("updated {} documents in '{}'", updated.len(), name);
        Ok(results)
    }

    /// Persist one collection
    pub fn write(&mut self, name: &str) -> Result<()> {
        let collection = self
            .collections
            .get_mut(name)
            .ok_or_else(|| BisonError::CollectionNotFound(name.to_string()))?;
        self.storage.flush(name, collection.documents())?;
        collection.mark_clean();
        Ok(())
    }

    /// Persist every dirty collection
    ///
    /// A flush failure surfaces immediately and leaves that collection's
    /// dirty flag set, so the call can be retried.
    pub fn write_all(&mut self) -> Result<()> {
        for (name, collection) in self.collections.iter_mut() {
            if collection.is_dirty() {
                self.storage.flush(name, collection.documents())?;
                collection.mark_clean();
            }
        }
        Ok(())
    }

    /// Empty the query cache
    ///
    /// Observationally a no-op: only the next reads' cost changes.
    pub fn clear_cache(&self) {
        self.cache.clear();
    }

    pub fn cache_stats(&self) -> CacheStats {
        self.cache.stats()
    }

    /// The backing directory
    pub fn root(&self) -> &Path {
        self.storage.root()
    }
}

fn validate_collection_name(name: &str) -> Result<()> {
    if name.is_empty() {
        return Err(BisonError::InvalidCollectionName(name.to_string()));
    }
    // names become file stems under the root
    if name.starts_with('.') || name.contains('/') || name.contains('\\') {
        return Err(BisonError::InvalidCollectionName(name.to_string()));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::TempDir;

    fn open_db() -> (TempDir, Bison) {
        let temp = TempDir::new().unwrap();
        let db = Bison::open(temp.path()).unwrap();
        (temp, db)
    }

    #[test]
    fn test_create_collection_idempotent() {
        let (_temp, mut db) = open_db();
        db.create_collection("test").unwrap();
        db.insert("test", json!({"a": 1})).unwrap();
        db.create_collection("test").unwrap();
        assert_eq!(db.find("test", None).unwrap().len(), 1);
    }

    #[test]
    fn test_invalid_collection_names() {
        let (_temp, mut db) = open_db();
        assert!(matches!(
            db.create_collection(""),
            Err(BisonError::InvalidCollectionName(_))
        ));
        assert!(matches!(
            db.insert("../evil", json!({})),
            Err(BisonError::InvalidCollectionName(_))
        ));
        assert!(matches!(
            db.create_collection(".hidden"),
            Err(BisonError::InvalidCollectionName(_))
        ));
    }

    #[test]
    fn test_insert_creates_collection() {
        let (_temp, mut db) = open_db();
        db.insert("users", json!({"name": "Alice"})).unwrap();
        assert_eq!(db.collections(), vec!["users"]);
    }

    #[test]
    fn test_insert_rejects_non_object() {
        let (_temp, mut db) = open_db();
        assert!(matches!(
            db.insert("t", json!([1, 2])),
            Err(BisonError::InvalidDocument(_))
        ));
        assert!(matches!(
            db.insert_many("t", vec![json!({"a": 1}), json!(5)]),
            Err(BisonError::InvalidDocument(_))
        ));
        // nothing was created by the failed inserts
        assert!(db.collections().is_empty());
    }

    #[test]
    fn test_find_missing_collection() {
        let (_temp, db) = open_db();
        assert!(matches!(
            db.find("nope", None),
            Err(BisonError::CollectionNotFound(_))
        ));
    }

    #[test]
    fn test_update_missing_collection() {
        let (_temp, mut db) = open_db();
        assert!(matches!(
            db.update("nope", &json!({"a": 1}), None, false),
            Err(BisonError::CollectionNotFound(_))
        ));
    }

    #[test]
    fn test_write_missing_collection() {
        let (_temp, mut db) = open_db();
        assert!(matches!(
            db.write("nope"),
            Err(BisonError::CollectionNotFound(_))
        ));
    }

    #[test]
    fn test_drop_missing_collection_is_noop() {
        let (_temp, mut db) = open_db();
        db.drop_collection("nope").unwrap();
    }

    #[test]
    fn test_update_returns_only_matched() {
        let (_temp, mut db) = open_db();
        db.insert_many(
            "t",
            vec![json!({"a": 1}), json!({"a": 2}), json!({"a": 3})],
        )
        .unwrap();
        let updated = db
            .update("t", &json!({"b": {"$set": true}}), Some(&json!({"a": {"$gt": 1}})), false)
            .unwrap();
        assert_eq!(updated, vec![json!({"a": 2, "b": true}), json!({"a": 3, "b": true})]);
        // non-matching document untouched
        assert_eq!(db.find("t", Some(&json!({"a": 1}))).unwrap(), vec![json!({"a": 1})]);
    }

    #[test]
    fn test_update_return_result_snapshot() {
        let (_temp, mut db) = open_db();
        db.insert_many("t", vec![json!({"a": 10}), json!({"a": 1})])
            .unwrap();
        let snapshot = db
            .update("t", &json!({"a": {"$inc": ""}}), None, true)
            .unwrap();
        assert_eq!(snapshot, vec![json!({"a": 11}), json!({"a": 2})]);
    }

    #[test]
    fn test_update_invalidates_cache_without_matches() {
        let (_temp, mut db) = open_db();
        db.insert("t", json!({"a": 1})).unwrap();
        db.find("t", None).unwrap();
        assert_eq!(db.cache_stats().size, 1);
        db.update("t", &json!({"x": {"$set": 1}}), Some(&json!({"a": 99})), false)
            .unwrap();
        assert_eq!(db.cache_stats().size, 0);
    }

    #[test]
    fn test_failed_update_leaves_state_untouched() {
        let (_temp, mut db) = open_db();
        db.insert_many("t", vec![json!({"n": 1}), json!({"n": "two"})])
            .unwrap();
        let before = db.find("t", None).unwrap();
        // second document fails the numeric op after the first succeeded
        let err = db
            .update("t", &json!({"n": {"$inc": ""}}), None, false)
            .unwrap_err();
        assert!(matches!(err, BisonError::InvalidUpdate(_)));
        assert_eq!(db.find("t", None).unwrap(), before);
    }

    #[test]
    fn test_cache_hit_and_invalidation() {
        let (_temp, mut db) = open_db();
        db.insert("t", json!({"a": 1})).unwrap();

        let first = db.find("t", Some(&json!({"a": 1}))).unwrap();
        assert_eq!(db.cache_stats().size, 1);
        let second = db.find("t", Some(&json!({"a": 1}))).unwrap();
        assert_eq!(first, second);

        db.insert("t", json!({"a": 1})).unwrap();
        assert_eq!(db.cache_stats().size, 0);
        assert_eq!(db.find("t", Some(&json!({"a": 1}))).unwrap().len(), 2);
    }

    #[test]
    fn test_find_with_and_without_filter_share_entry() {
        let (_temp, mut db) = open_db();
        db.insert("t", json!({"a": 1})).unwrap();
        db.find("t", None).unwrap();
        assert_eq!(db.cache_stats().size, 1);
        db.find("t", Some(&json!({}))).unwrap();
        assert_eq!(db.cache_stats().size, 1);
    }

    #[test]
    fn test_errors_are_not_cached() {
        let (_temp, mut db) = open_db();
        db.insert("t", json!({"a": 1})).unwrap();
        let _ = db.find("t", Some(&json!({"a": {"$bad": 1}}))).unwrap_err();
        assert_eq!(db.cache_stats().size, 0);
    }

    #[test]
    fn test_returned_documents_are_copies() {
        let (_temp, mut db) = open_db();
        db.insert("t", json!({"a": 1})).unwrap();
        let mut out = db.find("t", None).unwrap();
        out[0]["a"] = json!(999);
        assert_eq!(db.find("t", None).unwrap(), vec![json!({"a": 1})]);
    }
}
