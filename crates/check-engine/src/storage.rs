//! Blob storage for persisted state
//!
//! A [`BlobStore`] maps string data ids to JSON object payloads. Every key a
//! store writes is namespaced by its attribute prefix, so several stores can
//! live side by side in one host container.
//!
//! Payloads themselves live in a [`PayloadRegistry`] with explicit reference
//! counts. A shallow duplicate of a store shares payloads with the original
//! (a write through one is visible through the other); a deep duplicate
//! copies them. Dropping a store releases its references and the registry
//! frees payloads nobody references any more.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{QaError, Result};

/// A stored payload
pub type Payload = serde_json::Map<String, Value>;

/// Registry shared by every store created from the same root
pub type SharedRegistry = Arc<Mutex<PayloadRegistry>>;

/// zstd compression level for binary exports
const COMPRESSION_LEVEL: i32 = 3;

/// Identity of a payload within its registry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PayloadId(u64);

struct Entry {
    payload: Payload,
    refs: usize,
}

/// Reference-counted payload table
#[derive(Default)]
pub struct PayloadRegistry {
    entries: HashMap<PayloadId, Entry>,
    next_id: u64,
}

impl PayloadRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a shared registry handle
    pub fn shared() -> SharedRegistry {
        Arc::new(Mutex::new(Self::new()))
    }

    /// Store a payload with one reference
    pub fn create(&mut self, payload: Payload) -> PayloadId {
        self.next_id += 1;
        let id = PayloadId(self.next_id);
        self.entries.insert(id, Entry { payload, refs: 1 });
        id
    }

    /// Add a reference to an existing payload
    pub fn retain(&mut self, id: PayloadId) -> bool {
        match self.entries.get_mut(&id) {
            Some(entry) => {
                entry.refs += 1;
                true
            }
            None => false,
        }
    }

    /// Drop a reference; returns whether the payload was freed
    pub fn release(&mut self, id: PayloadId) -> bool {
        let Some(entry) = self.entries.get_mut(&id) else {
            return false;
        };
        entry.refs -= 1;
        if entry.refs == 0 {
            self.entries.remove(&id);
            true
        } else {
            false
        }
    }

    pub fn get(&self, id: PayloadId) -> Option<&Payload> {
        self.entries.get(&id).map(|e| &e.payload)
    }

    pub fn get_mut(&mut self, id: PayloadId) -> Option<&mut Payload> {
        self.entries.get_mut(&id).map(|e| &mut e.payload)
    }

    pub fn ref_count(&self, id: PayloadId) -> usize {
        self.entries.get(&id).map(|e| e.refs).unwrap_or(0)
    }

    /// Number of live payloads
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Export format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Encoding {
    /// Pretty-printed JSON text
    Ascii,
    /// zstd-compressed JSON
    Binary,
}

/// Payload store keyed by string data id
pub struct BlobStore {
    prefix: String,
    slots: BTreeMap<String, PayloadId>,
    registry: SharedRegistry,
}

impl BlobStore {
    /// Create a store with its own registry
    pub fn new(prefix: impl Into<String>) -> Self {
        Self::with_registry(prefix, PayloadRegistry::shared())
    }

    /// Create a store on an existing registry
    pub fn with_registry(prefix: impl Into<String>, registry: SharedRegistry) -> Self {
        Self {
            prefix: prefix.into(),
            slots: BTreeMap::new(),
            registry,
        }
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    pub fn registry(&self) -> &SharedRegistry {
        &self.registry
    }

    fn key(&self, data_id: &str) -> String {
        format!("{}{}", self.prefix, data_id)
    }

    /// Data ids in this store, without the prefix
    pub fn data_ids(&self) -> Vec<String> {
        self.slots
            .keys()
            .filter_map(|k| k.strip_prefix(&self.prefix))
            .map(str::to_string)
            .collect()
    }

    pub fn contains(&self, data_id: &str) -> bool {
        self.slots.contains_key(&self.key(data_id))
    }

    /// Copy of the payload stored under `data_id`
    pub fn get(&self, data_id: &str) -> Option<Payload> {
        let id = *self.slots.get(&self.key(data_id))?;
        self.registry.lock().get(id).cloned()
    }

    /// Payload under `data_id`, creating an empty one when missing
    pub fn get_or_create(&mut self, data_id: &str) -> Payload {
        let id = self.slot_or_create(data_id);
        self.registry.lock().get(id).cloned().unwrap_or_default()
    }

    fn slot_or_create(&mut self, data_id: &str) -> PayloadId {
        let key = self.key(data_id);
        if let Some(id) = self.slots.get(&key) {
            return *id;
        }
        let id = self.registry.lock().create(Payload::new());
        self.slots.insert(key, id);
        id
    }

    /// Single value of a payload
    pub fn value(&self, data_id: &str, key: &str) -> Option<Value> {
        let id = *self.slots.get(&self.key(data_id))?;
        self.registry.lock().get(id)?.get(key).cloned()
    }

    /// Set one value, creating the payload when missing
    ///
    /// Writes go to the shared payload, so shallow duplicates see them.
    pub fn set_value(&mut self, data_id: &str, key: impl Into<String>, value: Value) {
        let id = self.slot_or_create(data_id);
        if let Some(payload) = self.registry.lock().get_mut(id) {
            payload.insert(key.into(), value);
        }
    }

    /// Replace the whole payload under `data_id`
    pub fn set_payload(&mut self, data_id: &str, payload: Payload) {
        let key = self.key(data_id);
        let mut registry = self.registry.lock();
        let fresh = registry.create(payload);
        if let Some(old) = self.slots.insert(key, fresh) {
            registry.release(old);
        }
    }

    /// Give `data_id` a fresh empty payload
    ///
    /// Stores sharing the old payload keep it. Returns whether the id existed.
    pub fn clear_data(&mut self, data_id: &str) -> bool {
        let key = self.key(data_id);
        if !self.slots.contains_key(&key) {
            return false;
        }
        self.set_payload(data_id, Payload::new());
        true
    }

    /// Remove `data_id` and release its payload
    pub fn remove(&mut self, data_id: &str) -> bool {
        match self.slots.remove(&self.key(data_id)) {
            Some(id) => {
                self.registry.lock().release(id);
                true
            }
            None => false,
        }
    }

    /// Remove every data id
    pub fn clear_all(&mut self) {
        let mut registry = self.registry.lock();
        for (_, id) in std::mem::take(&mut self.slots) {
            registry.release(id);
        }
    }

    /// Duplicate this store on the same registry
    pub fn duplicate(&self, shallow: bool) -> BlobStore {
        let mut registry = self.registry.lock();
        let slots = self
            .slots
            .iter()
            .filter_map(|(key, id)| {
                let id = if shallow {
                    registry.retain(*id).then_some(*id)?
                } else {
                    let payload = registry.get(*id)?.clone();
                    registry.create(payload)
                };
                Some((key.clone(), id))
            })
            .collect();
        BlobStore {
            prefix: self.prefix.clone(),
            slots,
            registry: self.registry.clone(),
        }
    }

    /// Replace this store's contents with a copy of `other`
    ///
    /// Both stores must use the same prefix. A shallow copy additionally
    /// requires a shared registry.
    pub fn copy_from(&mut self, other: &BlobStore, shallow: bool) -> Result<()> {
        if other.prefix != self.prefix {
            return Err(QaError::storage(format!(
                "Cannot copy from store with prefix '{}' into store with prefix '{}'",
                other.prefix, self.prefix
            )));
        }
        let same_registry = Arc::ptr_eq(&self.registry, &other.registry);
        if shallow && !same_registry {
            return Err(QaError::storage(
                "Shallow copies require stores sharing one payload registry",
            ));
        }

        let mut copy = if same_registry {
            other.duplicate(shallow)
        } else {
            let mut copy = BlobStore::with_registry(self.prefix.clone(), self.registry.clone());
            for data_id in other.data_ids() {
                if let Some(payload) = other.get(&data_id) {
                    copy.set_payload(&data_id, payload);
                }
            }
            copy
        };
        self.clear_all();
        self.slots = std::mem::take(&mut copy.slots);
        Ok(())
    }

    /// Serialize every payload keyed by data id
    pub fn export(&self, encoding: Encoding) -> Result<Vec<u8>> {
        let mut document = Payload::new();
        for data_id in self.data_ids() {
            if let Some(payload) = self.get(&data_id) {
                document.insert(data_id, Value::Object(payload));
            }
        }
        let json = serde_json::to_vec_pretty(&document)?;
        match encoding {
            Encoding::Ascii => Ok(json),
            Encoding::Binary => zstd::encode_all(&json[..], COMPRESSION_LEVEL)
                .map_err(|e| QaError::Compression(e.to_string())),
        }
    }

    /// Load payloads produced by [`BlobStore::export`]
    ///
    /// Existing data ids with the same name are replaced. Returns the
    /// number of imported payloads.
    pub fn import(&mut self, bytes: &[u8], encoding: Encoding) -> Result<usize> {
        let json = match encoding {
            Encoding::Ascii => bytes.to_vec(),
            Encoding::Binary => {
                zstd::decode_all(bytes).map_err(|e| QaError::Compression(e.to_string()))?
            }
        };
        let document: Payload = serde_json::from_slice(&json)?;
        let mut imported = 0;
        for (data_id, value) in document {
            match value {
                Value::Object(payload) => {
                    self.set_payload(&data_id, payload);
                    imported += 1;
                }
                other => {
                    return Err(QaError::storage(format!(
                        "Data id '{}' holds {} instead of an object",
                        data_id, other
                    )))
                }
            }
        }
        Ok(imported)
    }
}

impl Drop for BlobStore {
    fn drop(&mut self) {
        self.clear_all();
    }
}
