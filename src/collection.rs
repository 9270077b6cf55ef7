//! Generic persisted collection.
//!
//! A [`Collection`] keeps an ordered list of records in memory and mirrors it
//! to a [`KeyValueStore`] as one JSON array under a fixed key. Specialised
//! collections (see [`crate::task_collection`]) wrap it and add ordering and
//! side effects.
//!
//! Array entries that do not decode as a record are kept verbatim and
//! written back after the records on every save. Their ids stay reserved.

use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use serde::de::DeserializeOwned;
use serde::{Serialize, Serializer};
use serde_json::Value;
use tracing::{debug, warn};

use crate::error::{Error, Result};
use crate::store::{self, KeyValueStore};

/// Id value meaning "assign one on insert".
pub const UNASSIGNED_ID: u32 = 0;

/// A record that can live in a [`Collection`].
pub trait Record: Serialize + DeserializeOwned + Send + 'static {
    fn id(&self) -> u32;
    fn set_id(&mut self, id: u32);
}

/// Shared handle to a collection item.
///
/// Clones point at the same item; equality of handles is identity, which is
/// how collections find the item a caller is holding.
pub struct Shared<T>(Arc<Mutex<T>>);

impl<T> Shared<T> {
    pub fn new(value: T) -> Self {
        Self(Arc::new(Mutex::new(value)))
    }

    fn lock(&self) -> MutexGuard<'_, T> {
        self.0.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn read<R>(&self, f: impl FnOnce(&T) -> R) -> R {
        f(&self.lock())
    }

    pub fn update<R>(&self, f: impl FnOnce(&mut T) -> R) -> R {
        f(&mut self.lock())
    }

    pub fn ptr_eq(&self, other: &Shared<T>) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

impl<T: Clone> Shared<T> {
    /// Copy of the current value.
    pub fn snapshot(&self) -> T {
        self.lock().clone()
    }
}

impl<T> Clone for Shared<T> {
    fn clone(&self) -> Self {
        Self(Arc::clone(&self.0))
    }
}

impl<T: Serialize> Serialize for Shared<T> {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        self.lock().serialize(serializer)
    }
}

impl<T: fmt::Debug> fmt::Debug for Shared<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Shared").field(&*self.lock()).finish()
    }
}

/// Ordered, persisted list of records.
pub struct Collection<T: Record> {
    key: String,
    store: Arc<dyn KeyValueStore>,
    items: Vec<Shared<T>>,
    unreadable: Vec<Value>,
}

/// One element of the stored array.
#[derive(Serialize)]
#[serde(untagged)]
enum Stored<'a, T> {
    Record(&'a Shared<T>),
    Raw(&'a Value),
}

impl<T: Record> Collection<T> {
    /// Empty collection persisted under `key`.
    pub fn new(store: Arc<dyn KeyValueStore>, key: impl Into<String>) -> Result<Self> {
        let key = key.into();
        store::validate_key(&key)?;
        Ok(Self {
            key,
            store,
            items: Vec::new(),
            unreadable: Vec::new(),
        })
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn list(&self) -> &[Shared<T>] {
        &self.items
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Stored entries that did not decode and are carried through saves.
    pub fn unreadable_count(&self) -> usize {
        self.unreadable.len()
    }

    /// Largest id in use, `0` when empty. Ids of unreadable entries count.
    pub fn max_id(&self) -> u32 {
        let listed = self.items.iter().map(|item| item.read(Record::id));
        let reserved = self
            .unreadable
            .iter()
            .filter_map(|value| value.get("id")?.as_u64())
            .map(|id| u32::try_from(id).unwrap_or(u32::MAX));
        listed.chain(reserved).max().unwrap_or(UNASSIGNED_ID)
    }

    /// Replace the in-memory list with what the store holds.
    ///
    /// Missing data or a payload that is not a JSON array yields an empty
    /// list. Entries that do not deserialize are set aside, not dropped.
    /// Returns the number of records loaded.
    pub fn load(&mut self) -> Result<usize> {
        self.items.clear();
        let payload = self.store.get(&self.key)?;
        let decoded = payload
            .as_deref()
            .map(|raw| decode_records::<T>(&self.key, raw))
            .unwrap_or_default();
        self.unreadable = decoded.unreadable;
        let count = decoded.records.len();
        for record in decoded.records {
            self.add_item(Shared::new(record))?;
        }
        debug!(
            key = %self.key,
            count,
            unreadable = self.unreadable.len(),
            "collection loaded"
        );
        Ok(count)
    }

    /// Append `item`, assigning `max_id() + 1` when its id is unassigned.
    pub fn add_item(&mut self, item: Shared<T>) -> Result<()> {
        if item.read(Record::id) == UNASSIGNED_ID {
            let next = self.max_id().checked_add(1).ok_or_else(|| {
                Error::OperationFailed(format!("no task ids left in '{}'", self.key))
            })?;
            item.update(|record| record.set_id(next));
        }
        self.items.push(item);
        Ok(())
    }

    /// Remove `item` by identity and persist. `false` if it was not listed.
    pub fn remove_item(&mut self, item: &Shared<T>) -> Result<bool> {
        match self.position(item) {
            Some(index) => {
                self.items.remove(index);
                self.save()?;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// Write the full list, then any unreadable entries, to the store.
    pub fn save(&self) -> Result<()> {
        let entries: Vec<Stored<'_, T>> = self
            .items
            .iter()
            .map(Stored::Record)
            .chain(self.unreadable.iter().map(Stored::Raw))
            .collect();
        let payload = serde_json::to_string(&entries)?;
        self.store.set(&self.key, &payload)
    }

    pub fn position(&self, item: &Shared<T>) -> Option<usize> {
        self.items.iter().position(|entry| entry.ptr_eq(item))
    }

    pub fn contains(&self, item: &Shared<T>) -> bool {
        self.position(item).is_some()
    }

    pub fn find(&self, id: u32) -> Option<Shared<T>> {
        self.items
            .iter()
            .find(|item| item.read(Record::id) == id)
            .cloned()
    }

    /// Stable sort; equal keys keep their current order.
    pub fn sort_by_key<K: Ord>(&mut self, mut f: impl FnMut(&T) -> K) {
        self.items.sort_by_cached_key(|item| item.read(&mut f));
    }
}

struct Decoded<T> {
    records: Vec<T>,
    unreadable: Vec<Value>,
}

impl<T> Default for Decoded<T> {
    fn default() -> Self {
        Self {
            records: Vec::new(),
            unreadable: Vec::new(),
        }
    }
}

fn decode_records<T: Record>(key: &str, raw: &str) -> Decoded<T> {
    let mut decoded = Decoded::default();
    if raw.trim().is_empty() {
        return decoded;
    }
    let values: Vec<Value> = match serde_json::from_str(raw) {
        Ok(values) => values,
        Err(err) => {
            warn!(key, error = %err, "stored data is not a JSON array, starting empty");
            return decoded;
        }
    };
    for (index, value) in values.into_iter().enumerate() {
        match serde_json::from_value::<T>(value.clone()) {
            Ok(record) => decoded.records.push(record),
            Err(err) => {
                warn!(key, index, error = %err, "keeping unreadable record as is");
                decoded.unreadable.push(value);
            }
        }
    }
    decoded
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;
    use serde::Deserialize;

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    struct Note {
        id: u32,
        text: String,
    }

    impl Record for Note {
        fn id(&self) -> u32 {
            self.id
        }

        fn set_id(&mut self, id: u32) {
            self.id = id;
        }
    }

    fn note(id: u32, text: &str) -> Shared<Note> {
        Shared::new(Note {
            id,
            text: text.to_string(),
        })
    }

    fn collection(store: Arc<MemoryStore>) -> Collection<Note> {
        Collection::new(store, "notes").expect("collection")
    }

    #[test]
    fn add_item_assigns_ids_after_max() {
        let mut notes = collection(Arc::new(MemoryStore::new()));
        assert_eq!(notes.max_id(), 0);

        let first = note(0, "a");
        notes.add_item(first.clone()).expect("add");
        assert_eq!(first.read(|n| n.id), 1);

        notes.add_item(note(7, "b")).expect("add");
        let third = note(0, "c");
        notes.add_item(third.clone()).expect("add");
        assert_eq!(third.read(|n| n.id), 8);
        assert_eq!(notes.max_id(), 8);
    }

    #[test]
    fn remove_item_uses_identity_and_persists() {
        let store = Arc::new(MemoryStore::new());
        let mut notes = collection(store.clone());
        let kept = note(0, "kept");
        let removed = note(0, "removed");
        notes.add_item(kept.clone()).expect("add");
        notes.add_item(removed.clone()).expect("add");

        let lookalike = note(2, "removed");
        assert!(!notes.remove_item(&lookalike).expect("remove"));
        assert_eq!(notes.len(), 2);

        assert!(notes.remove_item(&removed).expect("remove"));
        assert_eq!(notes.len(), 1);
        assert!(notes.contains(&kept));
        let stored = store.get("notes").expect("get").expect("payload");
        assert_eq!(stored, r#"[{"id":1,"text":"kept"}]"#);
    }

    #[test]
    fn save_then_load_round_trips() {
        let store = Arc::new(MemoryStore::new());
        let mut notes = collection(store.clone());
        notes.add_item(note(0, "one")).expect("add");
        notes.add_item(note(0, "two")).expect("add");
        notes.save().expect("save");

        let mut reloaded = collection(store);
        assert_eq!(reloaded.load().expect("load"), 2);
        let texts: Vec<String> = reloaded.list().iter().map(|n| n.read(|n| n.text.clone())).collect();
        assert_eq!(texts, vec!["one", "two"]);
        assert_eq!(reloaded.find(2).expect("find").snapshot().text, "two");
    }

    #[test]
    fn load_treats_missing_and_corrupt_data_as_empty() {
        let mut notes = collection(Arc::new(MemoryStore::new()));
        assert_eq!(notes.load().expect("load"), 0);

        let mut blank = collection(Arc::new(MemoryStore::with_value("notes", "  ")));
        assert_eq!(blank.load().expect("load"), 0);

        let mut corrupt = collection(Arc::new(MemoryStore::with_value("notes", "{not json")));
        assert_eq!(corrupt.load().expect("load"), 0);
        assert!(corrupt.is_empty());
    }

    #[test]
    fn load_sets_bad_records_aside_and_assigns_missing_ids() {
        let raw = r#"[{"id":3,"text":"ok"},{"id":"x"},{"id":0,"text":"fresh"}]"#;
        let mut notes = collection(Arc::new(MemoryStore::with_value("notes", raw)));
        assert_eq!(notes.load().expect("load"), 2);
        assert_eq!(notes.unreadable_count(), 1);
        let ids: Vec<u32> = notes.list().iter().map(|n| n.read(|n| n.id)).collect();
        assert_eq!(ids, vec![3, 4]);
    }

    #[test]
    fn unreadable_records_survive_save_and_keep_their_id() {
        let raw = r#"[{"id":1,"text":"keep"},{"id":2,"body":"older shape"}]"#;
        let store = Arc::new(MemoryStore::with_value("notes", raw));
        let mut notes = collection(store.clone());
        assert_eq!(notes.load().expect("load"), 1);
        assert_eq!(notes.max_id(), 2);

        let added = note(0, "new");
        notes.add_item(added.clone()).expect("add");
        assert_eq!(added.read(|n| n.id), 3);
        notes.save().expect("save");

        let stored = store.get("notes").expect("get").expect("payload");
        assert_eq!(
            stored,
            r#"[{"id":1,"text":"keep"},{"id":3,"text":"new"},{"id":2,"body":"older shape"}]"#
        );
    }

    #[test]
    fn save_keeps_field_declaration_order() {
        #[derive(Serialize, Deserialize)]
        struct Entry {
            id: u32,
            zeta: u8,
            alpha: u8,
        }

        impl Record for Entry {
            fn id(&self) -> u32 {
                self.id
            }

            fn set_id(&mut self, id: u32) {
                self.id = id;
            }
        }

        let store = Arc::new(MemoryStore::new());
        let mut entries = Collection::<Entry>::new(store.clone(), "entries").expect("collection");
        entries
            .add_item(Shared::new(Entry { id: 0, zeta: 1, alpha: 2 }))
            .expect("add");
        entries.save().expect("save");
        let stored = store.get("entries").expect("get").expect("payload");
        assert_eq!(stored, r#"[{"id":1,"zeta":1,"alpha":2}]"#);
    }

    #[test]
    fn add_item_fails_when_ids_run_out() {
        let raw = format!(r#"[{{"id":{},"text":"last"}}]"#, u32::MAX);
        let mut notes = collection(Arc::new(MemoryStore::with_value("notes", &raw)));
        assert_eq!(notes.load().expect("load"), 1);

        let err = notes.add_item(note(0, "overflow")).expect_err("no ids left");
        assert!(matches!(err, Error::OperationFailed(_)));
        assert_eq!(notes.len(), 1);

        notes.add_item(note(9, "explicit")).expect("explicit id");
        assert_eq!(notes.len(), 2);
    }

    #[test]
    fn sort_by_key_is_stable() {
        let mut notes = collection(Arc::new(MemoryStore::new()));
        notes.add_item(note(1, "b")).expect("add");
        notes.add_item(note(2, "a")).expect("add");
        notes.add_item(note(3, "b")).expect("add");
        notes.add_item(note(4, "a")).expect("add");
        notes.sort_by_key(|n| n.text.clone());
        let ids: Vec<u32> = notes.list().iter().map(|n| n.read(|n| n.id)).collect();
        assert_eq!(ids, vec![2, 4, 1, 3]);
    }

    #[test]
    fn new_rejects_invalid_key() {
        let result = Collection::<Note>::new(Arc::new(MemoryStore::new()), "../notes");
        assert!(result.is_err());
    }
}
