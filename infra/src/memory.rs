//! An in-process document store with the same observable behaviour as the
//! postgres `Documents`: JSON bodies keyed by typed id, optimistic versions,
//! and a migration ledger. Used for tests and for running without a database.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use anyhow::{anyhow, Result};
use log::*;
use serde::{de::DeserializeOwned, Serialize};

use crate::documents::{HasMeta, Version};
use crate::ids::{Entity, Id};
use crate::persistence::{
    collection_prefix, pending_of, ConcurrencyError, Migrations, Storage, StoreUnavailable,
    MIGRATIONS,
};

#[derive(Debug, Clone, Default)]
pub struct MemStore {
    inner: Arc<Inner>,
}

#[derive(Debug, Default)]
struct Inner {
    docs: Mutex<BTreeMap<String, serde_json::Value>>,
    applied: Mutex<BTreeSet<u32>>,
    next_version: AtomicU64,
    writes: AtomicUsize,
    write_budget: Mutex<Option<usize>>,
    offline: AtomicBool,
}

#[derive(Debug, Clone, Default)]
pub struct MemoryConnectionManager {
    store: MemStore,
}

impl MemStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Simulates losing (or regaining) the backing store.
    pub fn set_offline(&self, offline: bool) {
        self.inner.offline.store(offline, Ordering::SeqCst);
    }

    pub fn is_offline(&self) -> bool {
        self.inner.offline.load(Ordering::SeqCst)
    }

    /// Number of successful saves and deletes so far.
    pub fn write_count(&self) -> usize {
        self.inner.writes.load(Ordering::SeqCst)
    }

    /// Allows only `remaining` more writes before saves and deletes fail
    /// with `StoreUnavailable`. `None` lifts the limit.
    pub fn limit_writes(&self, remaining: Option<usize>) {
        *self.inner.write_budget.lock().unwrap_or_else(|e| e.into_inner()) = remaining;
    }

    fn take_write(&self) -> Result<()> {
        let mut budget = self.inner.write_budget.lock().unwrap_or_else(|e| e.into_inner());
        match &mut *budget {
            Some(0) => {
                warn!("Write budget exhausted");
                Err(StoreUnavailable.into())
            }
            Some(n) => {
                *n -= 1;
                Ok(())
            }
            None => Ok(()),
        }
    }

    fn docs(&self) -> Result<MutexGuard<'_, BTreeMap<String, serde_json::Value>>> {
        if self.is_offline() {
            return Err(StoreUnavailable.into());
        }
        Ok(self.inner.docs.lock().unwrap_or_else(|e| e.into_inner()))
    }

    fn applied(&self) -> Result<MutexGuard<'_, BTreeSet<u32>>> {
        if self.is_offline() {
            return Err(StoreUnavailable.into());
        }
        Ok(self.inner.applied.lock().unwrap_or_else(|e| e.into_inner()))
    }

    fn stored_version(body: &serde_json::Value) -> Option<&str> {
        body.get("_version").and_then(serde_json::Value::as_str)
    }
}

impl Storage for MemStore {
    fn load<D: DeserializeOwned + Entity>(&self, id: &Id<D>) -> Result<Option<D>> {
        let docs = self.docs()?;
        let res = match docs.get(&id.to_string()) {
            Some(body) => Some(serde_json::from_value(body.clone())?),
            None => None,
        };
        Ok(res)
    }

    fn save<D: Serialize + Entity + HasMeta>(&self, document: &mut D) -> Result<()> {
        let mut json = serde_json::to_value(&*document)?;
        let key = document.meta().id.to_string();
        let mut docs = self.docs()?;

        let expected = &document.meta().version;
        let current = docs.get(&key).map(MemStore::stored_version);
        let fresh = match current {
            None => expected.is_new(),
            Some(stored) => !expected.is_new() && stored == Some(expected.as_str()),
        };
        if !fresh {
            warn!("Save of {} against stale version {:?}", key, expected);
            return Err(ConcurrencyError.into());
        }
        self.take_write()?;

        let version = Version::from(format!(
            "{:x}",
            self.inner.next_version.fetch_add(1, Ordering::SeqCst) + 1
        ));
        json.as_object_mut()
            .ok_or_else(|| anyhow!("Document {} is not an object", key))?
            .insert(
                "_version".to_string(),
                serde_json::Value::String(version.to_string()),
            );
        debug!("Save {} at version {}", key, version);
        docs.insert(key, json);
        self.inner.writes.fetch_add(1, Ordering::SeqCst);
        document.meta_mut().version = version;
        Ok(())
    }

    fn delete<D: Entity + HasMeta>(&self, document: &D) -> Result<()> {
        let meta = document.meta();
        let key = meta.id.to_string();
        let mut docs = self.docs()?;
        let current = docs.get(&key).and_then(MemStore::stored_version);
        if current != Some(meta.version.as_str()) {
            warn!("Delete of {} against stale version {:?}", key, meta.version);
            return Err(ConcurrencyError.into());
        }
        self.take_write()?;
        docs.remove(&key);
        self.inner.writes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn list<D: DeserializeOwned + Entity>(&self) -> Result<Vec<D>> {
        let prefix = collection_prefix::<D>();
        let docs = self.docs()?;
        docs.range(prefix.clone()..)
            .take_while(|(key, _)| key.starts_with(&prefix))
            .map(|(_, body)| serde_json::from_value(body.clone()).map_err(anyhow::Error::from))
            .collect()
    }

    fn any<D: Entity>(&self) -> Result<bool> {
        let prefix = collection_prefix::<D>();
        let docs = self.docs()?;
        let found = docs
            .range(prefix.clone()..)
            .next()
            .map(|(key, _)| key.starts_with(&prefix))
            .unwrap_or(false);
        Ok(found)
    }
}

impl Migrations for MemStore {
    fn can_connect(&self) -> bool {
        !self.is_offline()
    }

    fn pending_upgrades(&self) -> Result<Vec<u32>> {
        Ok(pending_of(&*self.applied()?))
    }

    fn apply_upgrades(&self) -> Result<()> {
        let mut applied = self.applied()?;
        for (version, _) in MIGRATIONS.iter() {
            if applied.insert(*version) {
                info!("Applying schema upgrade {}", version);
            }
        }
        Ok(())
    }
}

impl MemoryConnectionManager {
    pub fn new(store: MemStore) -> Self {
        MemoryConnectionManager { store }
    }

    pub fn store(&self) -> &MemStore {
        &self.store
    }
}

impl r2d2::ManageConnection for MemoryConnectionManager {
    type Connection = MemStore;
    type Error = StoreUnavailable;

    fn connect(&self) -> Result<MemStore, StoreUnavailable> {
        if self.store.is_offline() {
            return Err(StoreUnavailable);
        }
        Ok(self.store.clone())
    }

    fn is_valid(&self, conn: &mut MemStore) -> Result<(), StoreUnavailable> {
        if conn.is_offline() {
            return Err(StoreUnavailable);
        }
        Ok(())
    }

    fn has_broken(&self, conn: &mut MemStore) -> bool {
        conn.is_offline()
    }
}
