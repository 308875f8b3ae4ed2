// src/storage.rs
//! File-backed persistence: one JSON file per collection
//!
//! A database root directory holds `<collection>.json` files, each a JSON
//! array of documents. Flushes go through a temp file in the same directory
//! and a rename, so a crash mid-write can never leave a torn file behind.
//! A missing root directory is an empty database; it is created on the
//! first flush.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use serde_json::Value;

use crate::error::{BisonError, Result};
use crate::log_debug;

pub struct FileStorage {
    root: PathBuf,
}

impl FileStorage {
    pub fn new<P: Into<PathBuf>>(root: P) -> Self {
        FileStorage { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn collection_path(&self, name: &str) -> PathBuf {
        self.root.join(format!("{}.json", name))
    }

    /// Scan the root directory for collection files
    ///
    /// Returns `(name, documents)` pairs in file-name order. A missing root
    /// is an empty database; a file that is not a JSON array of documents
    /// is a `Parse` error fatal for the open.
    pub fn scan(&self) -> Result<Vec<(String, Vec<Value>)>> {
        let mut out = Vec::new();
        if !self.root.is_dir() {
            return Ok(out);
        }

        let mut paths: Vec<PathBuf> = Vec::new();
        for entry in fs::read_dir(&self.root)? {
            let path = entry?.path();
            if path.is_file() && path.extension().is_some_and(|ext| ext == "json") {
                paths.push(path);
            }
        }
        // directory iteration order is platform-dependent
        paths.sort();

        for path in paths {
            let name = match path.file_stem().and_then(|s| s.to_str()) {
                Some(stem) => stem.to_string(),
                None => continue,
            };
            let data = fs::read_to_string(&path)?;
            let value: Value = serde_json::from_str(&data)
                .map_err(|e| BisonError::Parse(format!("{}: {}", path.display(), e)))?;
            let docs = match value {
                Value::Array(docs) => docs,
                _ => {
                    return Err(BisonError::Parse(format!(
                        "{}: expected a JSON array of documents",
                        path.display()
                    )))
                }
            };
            out.push((name, docs));
        }
        log_debug!("scanned {:?}: {} collections", self.root, out.len());
        Ok(out)
    }

    /// Load a source document whose top-level keys become collections
    ///
    /// Each key maps to a collection holding the corresponding value as its
    /// single document.
    pub fn load_source_document<P: AsRef<Path>>(path: P) -> Result<Vec<(String, Vec<Value>)>> {
        let path = path.as_ref();
        let data = fs::read_to_string(path)?;
        let value: Value = serde_json::from_str(&data)
            .map_err(|e| BisonError::Parse(format!("{}: {}", path.display(), e)))?;
        match value {
            Value::Object(map) => Ok(map.into_iter().map(|(k, v)| (k, vec![v])).collect()),
            _ => Err(BisonError::Parse(format!(
                "{}: source document must be a JSON object",
                path.display()
            ))),
        }
    }

    /// Load a JSON array of Object documents (the `insert_many` file path)
    pub fn load_document_array<P: AsRef<Path>>(path: P) -> Result<Vec<Value>> {
        let path = path.as_ref();
        let data = fs::read_to_string(path)?;
        let value: Value = serde_json::from_str(&data)
            .map_err(|e| BisonError::Parse(format!("{}: {}", path.display(), e)))?;
        let docs = match value {
            Value::Array(docs) => docs,
            _ => {
                return Err(BisonError::Parse(format!(
                    "{}: expected a JSON array of documents",
                    path.display()
                )))
            }
        };
        for doc in &docs {
            if !doc.is_object() {
                return Err(BisonError::Parse(format!(
                    "{}: every document in the array must be a JSON object",
                    path.display()
                )));
            }
        }
        Ok(docs)
    }

    /// Write one collection to disk atomically
    ///
    /// Serializes to `<name>.json.tmp` in the root and renames it onto
    /// `<name>.json`. The root directory is created on demand.
    pub fn flush(&self, name: &str, documents: &[Value]) -> Result<()> {
        fs::create_dir_all(&self.root)?;
        let final_path = self.collection_path(name);
        let tmp_path = self.root.join(format!("{}.json.tmp", name));

        let data = serde_json::to_vec(documents)?;
        fs::write(&tmp_path, data)?;
        fs::rename(&tmp_path, &final_path)?;
        log_debug!("flushed collection '{}' ({} documents)", name, documents.len());
        Ok(())
    }

    /// Delete one collection file; missing files are not an error
    pub fn remove(&self, name: &str) -> Result<()> {
        match fs::remove_file(self.collection_path(name)) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}
