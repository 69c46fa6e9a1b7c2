// Concurrency-safe keyed store for one entity kind

use std::collections::HashMap;

use tokio::sync::Mutex;

use crate::error::{Error, Result};

use super::entry::Entry;

/// All entries of one kind for one router, keyed by entry id. The lock
/// covers every read and write; each operation holds it only for its
/// own duration.
#[derive(Debug, Default)]
pub struct Table {
    entries: Mutex<HashMap<String, Entry>>,
}

impl Table {
    pub fn new() -> Self {
        Table::default()
    }

    /// Insert a new entry; the id must not already be present.
    pub async fn add(&self, id: &str, entry: Entry) -> Result<()> {
        let mut entries = self.entries.lock().await;
        if entries.contains_key(id) {
            return Err(Error::FieldPresence);
        }
        entries.insert(id.to_string(), entry);
        Ok(())
    }

    /// Replace a stored entry wholesale; the id must be present.
    pub async fn change(&self, id: &str, entry: Entry) -> Result<()> {
        let mut entries = self.entries.lock().await;
        if !entries.contains_key(id) {
            return Err(Error::FieldAbsence);
        }
        entries.insert(id.to_string(), entry);
        Ok(())
    }

    /// Remove a stored entry; the id must be present.
    pub async fn flush(&self, id: &str) -> Result<()> {
        let mut entries = self.entries.lock().await;
        if entries.remove(id).is_none() {
            return Err(Error::FieldAbsence);
        }
        Ok(())
    }

    /// Visit every entry in unspecified order. The lock is held across
    /// the callbacks of this table only.
    pub async fn for_each(&self, mut f: impl FnMut(&str, &Entry)) {
        let entries = self.entries.lock().await;
        for (id, entry) in entries.iter() {
            f(id, entry);
        }
    }

    /// True when, for every field the stored entry has, the incoming
    /// entry carries a deep-equal value. Fields only the incoming entry
    /// has are not compared; an id with no stored entry compares as
    /// identical. Both asymmetries are inherited protocol behavior.
    pub async fn is_same(&self, id: &str, incoming: &Entry) -> bool {
        let entries = self.entries.lock().await;
        let Some(stored) = entries.get(id) else {
            return true;
        };
        stored
            .field_names()
            .all(|name| stored.get(name) == incoming.get(name))
    }
}
