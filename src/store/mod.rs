//!
//! clinica record store
//! --------------------
//! This module implements the flat-file store for clinica: one JSON document
//! holding a fixed set of named record collections (`roles`, `usuarios`,
//! `perfiles`, `empleados`, `pacientes`, `tareas`, `insumos`), each an array
//! of records carrying a monotonically assigned integer `id`.
//!
//! Key responsibilities:
//! - Lazy load of the document on first access, resident for the process
//!   lifetime (no automatic reload of externally modified files).
//! - Generic CRUD over any collection plus entity-specific creators with
//!   required-field validation.
//! - Relational joins ("complete" views) and collection statistics.
//! - Full read-modify-write persistence on every mutation, serialized behind
//!   a single writer lock so concurrent mutations cannot lose writes.
//!
//! The public API centers around the `Store` type, which is usually wrapped
//! in a thread-safe `SharedStore` (`Arc<Store>`) elsewhere in the codebase.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use parking_lot::{Mutex, RwLock};
use serde_json::{Map, Value};
use tracing::debug;

use crate::config::Config;
use crate::error::{AppError, AppResult};

mod model;
mod queries;

pub use model::{
    CompleteTask, CompleteUser, Employee, Patient, Profile, ProfileKind, Role, Statistics,
    Supply, Task, User,
};

/// One persisted JSON document: collection name -> array of records.
type Document = Map<String, Value>;

/// The fixed set of collections the store knows about. Any other name is an
/// unknown collection and is rejected with `NotFound`.
pub const COLLECTIONS: [&str; 7] = [
    "roles", "usuarios", "perfiles", "empleados", "pacientes", "tareas", "insumos",
];

/// Flat-file record store over a single JSON document.
///
/// Reads serve from the resident document; every mutation clones the
/// document, applies the change, persists the whole file and then commits
/// the clone as the new resident copy. Mutations are serialized behind
/// `write_lock`, which closes the lost-update race a bare
/// read-modify-write cycle would have between concurrent writers.
pub struct Store {
    path: PathBuf,
    low_stock_threshold: f64,
    doc: RwLock<Option<Document>>,
    write_lock: Mutex<()>,
}

/// Cheaply cloneable handle shared across callers.
#[derive(Clone)]
pub struct SharedStore(pub Arc<Store>);

impl std::ops::Deref for SharedStore {
    type Target = Store;
    fn deref(&self) -> &Store { &self.0 }
}

impl SharedStore {
    pub fn new<P: AsRef<Path>>(path: P) -> Self { SharedStore(Arc::new(Store::new(path))) }

    pub fn from_config(cfg: &Config) -> Self { SharedStore(Arc::new(Store::from_config(cfg))) }
}

impl Store {
    /// Create a store handle over the given document path. Nothing is read
    /// until first access.
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            low_stock_threshold: 50.0,
            doc: RwLock::new(None),
            write_lock: Mutex::new(()),
        }
    }

    pub fn from_config(cfg: &Config) -> Self {
        let mut store = Self::new(&cfg.store_path);
        store.low_stock_threshold = cfg.low_stock_threshold;
        store
    }

    pub fn path(&self) -> &PathBuf { &self.path }

    pub(crate) fn low_stock_threshold(&self) -> f64 { self.low_stock_threshold }

    /// Write an empty document (all collections present, no records) if the
    /// file does not exist yet. Loading still fails on a missing file, so
    /// first-run callers invoke this before anything else.
    pub fn initialize(&self) -> AppResult<()> {
        if self.path.exists() {
            return Ok(());
        }
        let mut doc = Document::new();
        for name in COLLECTIONS {
            doc.insert(name.to_string(), Value::Array(Vec::new()));
        }
        self.persist(&doc)?;
        debug!(target: "clinica::store", "initialize: empty document written to '{}'", self.path.display());
        Ok(())
    }

    /// Read the persisted document into memory, replacing any resident copy.
    pub fn load(&self) -> AppResult<()> {
        let doc = self.read_document()?;
        *self.doc.write() = Some(doc);
        debug!(target: "clinica::store", "load: document '{}' resident", self.path.display());
        Ok(())
    }

    /// Load on first use; idempotent for the process lifetime.
    pub fn ensure_loaded(&self) -> AppResult<()> {
        if self.doc.read().is_some() {
            return Ok(());
        }
        self.load()
    }

    fn read_document(&self) -> AppResult<Document> {
        let text = fs::read_to_string(&self.path).map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound => AppError::storage(
                "missing_document".into(),
                format!("store file '{}' does not exist", self.path.display()),
            ),
            _ => AppError::from(e),
        })?;
        let value: Value = serde_json::from_str(&text)
            .map_err(|e| AppError::storage("malformed_document", &e.to_string()))?;
        validate_document(value)
    }

    fn persist(&self, doc: &Document) -> AppResult<()> {
        if let Some(dir) = self.path.parent() {
            if !dir.as_os_str().is_empty() {
                fs::create_dir_all(dir).ok();
            }
        }
        let text = serde_json::to_string_pretty(&Value::Object(doc.clone()))
            .map_err(|e| AppError::storage("serialize_error", &e.to_string()))?;
        fs::write(&self.path, text)?;
        Ok(())
    }

    fn with_doc<R>(&self, f: impl FnOnce(&Document) -> AppResult<R>) -> AppResult<R> {
        self.ensure_loaded()?;
        let guard = self.doc.read();
        match guard.as_ref() {
            Some(doc) => f(doc),
            None => Err(AppError::internal("store_state", "document vanished after load")),
        }
    }

    /// Run one serialized read-modify-write cycle. The resident copy is only
    /// replaced after the new document has been persisted, so a failed write
    /// leaves both the file and the cache untouched.
    fn mutate<R>(&self, f: impl FnOnce(&mut Document) -> AppResult<R>) -> AppResult<R> {
        let _writer = self.write_lock.lock();
        self.ensure_loaded()?;
        let mut doc = match self.doc.read().clone() {
            Some(doc) => doc,
            None => return Err(AppError::internal("store_state", "document vanished after load")),
        };
        let out = f(&mut doc)?;
        self.persist(&doc)?;
        *self.doc.write() = Some(doc);
        Ok(out)
    }

    /// All records of a collection, in stored order.
    pub fn get_all(&self, collection: &str) -> AppResult<Vec<Value>> {
        check_collection(collection)?;
        self.with_doc(|doc| Ok(records_of(doc, collection).to_vec()))
    }

    pub fn get_by_id(&self, collection: &str, id: i64) -> AppResult<Value> {
        check_collection(collection)?;
        self.with_doc(|doc| {
            records_of(doc, collection)
                .iter()
                .find(|r| record_id(r) == Some(id))
                .cloned()
                .ok_or_else(|| not_found_record(collection, id))
        })
    }

    /// Append a record, assigning the next identifier (`max(existing)+1`, or
    /// 1 for an empty collection; deleted ids are never reused within a
    /// loaded document's history). Returns the stored record.
    pub fn create(&self, collection: &str, mut fields: Map<String, Value>) -> AppResult<Value> {
        check_collection(collection)?;
        if collection == "usuarios" {
            hash_password_field(&mut fields)?;
        }
        self.mutate(|doc| {
            let records = records_of_mut(doc, collection)?;
            let id = next_id(records);
            fields.insert("id".to_string(), Value::from(id));
            let record = Value::Object(fields);
            records.push(record.clone());
            debug!(target: "clinica::store", "create: collection='{}' id={}", collection, id);
            Ok(record)
        })
    }

    /// Merge partial fields over an existing record. The identifier is
    /// re-pinned after the merge: an update can never change a record's id,
    /// even if the caller supplies one.
    pub fn update(&self, collection: &str, id: i64, mut partial: Map<String, Value>) -> AppResult<Value> {
        check_collection(collection)?;
        if collection == "usuarios" {
            hash_password_field(&mut partial)?;
        }
        self.mutate(|doc| {
            let records = records_of_mut(doc, collection)?;
            let record = records
                .iter_mut()
                .find(|r| record_id(r) == Some(id))
                .ok_or_else(|| not_found_record(collection, id))?;
            let obj = record
                .as_object_mut()
                .ok_or_else(|| AppError::storage("malformed_record", &format!("{}#{} is not an object", collection, id)))?;
            for (k, v) in partial {
                obj.insert(k, v);
            }
            obj.insert("id".to_string(), Value::from(id));
            debug!(target: "clinica::store", "update: collection='{}' id={}", collection, id);
            Ok(record.clone())
        })
    }

    /// Remove a record and return it.
    pub fn delete(&self, collection: &str, id: i64) -> AppResult<Value> {
        check_collection(collection)?;
        self.mutate(|doc| {
            let records = records_of_mut(doc, collection)?;
            let idx = records
                .iter()
                .position(|r| record_id(r) == Some(id))
                .ok_or_else(|| not_found_record(collection, id))?;
            let removed = records.remove(idx);
            debug!(target: "clinica::store", "delete: collection='{}' id={}", collection, id);
            Ok(removed)
        })
    }
}

fn check_collection(name: &str) -> AppResult<()> {
    if COLLECTIONS.contains(&name) {
        Ok(())
    } else {
        Err(AppError::not_found(
            "unknown_collection".into(),
            format!("no such collection '{}'", name),
        ))
    }
}

fn not_found_record(collection: &str, id: i64) -> AppError {
    AppError::not_found(
        "record_not_found".into(),
        format!("no record with id {} in '{}'", id, collection),
    )
}

fn record_id(record: &Value) -> Option<i64> {
    record.get("id").and_then(Value::as_i64)
}

fn next_id(records: &[Value]) -> i64 {
    records.iter().filter_map(record_id).max().unwrap_or(0) + 1
}

/// Known collections absent from the document read as empty.
fn records_of<'a>(doc: &'a Document, name: &str) -> &'a [Value] {
    static EMPTY: Vec<Value> = Vec::new();
    doc.get(name).and_then(Value::as_array).map(|v| v.as_slice()).unwrap_or(&EMPTY)
}

fn records_of_mut<'a>(doc: &'a mut Document, name: &str) -> AppResult<&'a mut Vec<Value>> {
    doc.entry(name.to_string())
        .or_insert_with(|| Value::Array(Vec::new()))
        .as_array_mut()
        .ok_or_else(|| AppError::storage("malformed_document", &format!("collection '{}' is not an array", name)))
}

/// Secrets never reach the document in the clear: any `password` field is
/// replaced by its PHC hash on the way in, at creation and update alike.
fn hash_password_field(fields: &mut Map<String, Value>) -> AppResult<()> {
    if let Some(v) = fields.get("password") {
        let plain = v
            .as_str()
            .ok_or_else(|| AppError::validation("invalid_field", "password must be a string"))?;
        let phc = crate::security::hash_password(plain)?;
        fields.insert("password".to_string(), Value::String(phc));
    }
    Ok(())
}

fn validate_document(value: Value) -> AppResult<Document> {
    let doc = match value {
        Value::Object(map) => map,
        other => {
            return Err(AppError::storage(
                "malformed_document".into(),
                format!("expected a JSON object at the top level, found {}", json_kind(&other)),
            ))
        }
    };
    for name in COLLECTIONS {
        if let Some(v) = doc.get(name) {
            let records = v.as_array().ok_or_else(|| {
                AppError::storage(
                    "malformed_document".into(),
                    format!("collection '{}' must be an array, found {}", name, json_kind(v)),
                )
            })?;
            if let Some(bad) = records.iter().find(|r| !r.is_object()) {
                return Err(AppError::storage(
                    "malformed_document".into(),
                    format!("collection '{}' holds a non-object record: {}", name, json_kind(bad)),
                ));
            }
        }
    }
    Ok(doc)
}

fn json_kind(v: &Value) -> &'static str {
    match v {
        Value::Null => "null",
        Value::Bool(_) => "a bool",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
