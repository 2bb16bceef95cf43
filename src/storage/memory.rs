//! In-memory collaborators for tests: a [`Storage`] wired to a registry and
//! an [`AuditSink`] that records what it receives. Both support failure
//! injection.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use async_trait::async_trait;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use parking_lot::Mutex;

use crate::command::{CreationCause, DeletionCause};
use crate::error::StorageError;
use crate::node::Node;
use crate::registry::SharedRegistry;
use crate::storage::audit::{AuditSink, LogEntry};
use crate::storage::Storage;
use crate::subject::{Group, Subject};

/// Persistence backed by a map of group name to saved node set.
pub struct MemoryStorage {
    registry: SharedRegistry,
    persisted: DashMap<String, Vec<Node>>,
    calls: AtomicUsize,
    fail_all: AtomicBool,
    refuse_creates: AtomicBool,
    refuse_saves: AtomicBool,
}

impl MemoryStorage {
    pub fn new(registry: SharedRegistry) -> Self {
        MemoryStorage {
            registry,
            persisted: DashMap::new(),
            calls: AtomicUsize::new(0),
            fail_all: AtomicBool::new(false),
            refuse_creates: AtomicBool::new(false),
            refuse_saves: AtomicBool::new(false),
        }
    }

    /// Stores `nodes` under `name` without touching the registry.
    pub fn seed(&self, name: &str, nodes: Vec<Node>) {
        self.persisted.insert(name.to_lowercase(), nodes);
    }

    /// Every operation returns `StorageError::Backend` while enabled.
    pub fn fail_all(&self, enabled: bool) {
        self.fail_all.store(enabled, Ordering::SeqCst);
    }

    /// `create_and_load_group` answers `Ok(false)` while enabled.
    pub fn refuse_creates(&self, enabled: bool) {
        self.refuse_creates.store(enabled, Ordering::SeqCst);
    }

    /// `save_group` answers `Ok(false)` while enabled.
    pub fn refuse_saves(&self, enabled: bool) {
        self.refuse_saves.store(enabled, Ordering::SeqCst);
    }

    /// Number of backend calls made so far.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn is_persisted(&self, name: &str) -> bool {
        self.persisted.contains_key(&name.to_lowercase())
    }

    pub fn persisted_nodes(&self, name: &str) -> Vec<Node> {
        self.persisted.get(&name.to_lowercase()).map(|n| n.value().clone()).unwrap_or_default()
    }

    fn enter(&self) -> Result<(), StorageError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_all.load(Ordering::SeqCst) {
            Err(StorageError::Backend("injected failure".into()))
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl Storage for MemoryStorage {
    async fn load_group(&self, name: &str) -> Result<bool, StorageError> {
        self.enter()?;
        let Some(nodes) = self.persisted.get(name).map(|n| n.value().clone()) else {
            return Ok(false);
        };
        self.registry.insert_group(name).subject_data().replace_nodes(nodes);
        Ok(true)
    }

    async fn create_and_load_group(&self, name: &str, _cause: CreationCause) -> Result<bool, StorageError> {
        self.enter()?;
        if self.refuse_creates.load(Ordering::SeqCst) {
            return Ok(false);
        }
        match self.persisted.entry(name.to_owned()) {
            Entry::Occupied(_) => Ok(false),
            Entry::Vacant(slot) => {
                slot.insert(Vec::new());
                self.registry.insert_group(name);
                Ok(true)
            }
        }
    }

    async fn delete_group(&self, group: &Group, _cause: DeletionCause) -> Result<bool, StorageError> {
        self.enter()?;
        Ok(self.persisted.remove(group.name()).is_some())
    }

    async fn save_group(&self, group: &Group) -> Result<bool, StorageError> {
        self.enter()?;
        if self.refuse_saves.load(Ordering::SeqCst) {
            return Ok(false);
        }
        self.persisted.insert(group.name().to_owned(), group.subject_data().nodes().to_vec());
        Ok(true)
    }
}

/// Audit sink that keeps every accepted entry.
#[derive(Debug, Default)]
pub struct RecordingAuditSink {
    entries: Mutex<Vec<LogEntry>>,
    fail: AtomicBool,
}

impl RecordingAuditSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rejects submissions while enabled.
    pub fn fail(&self, enabled: bool) {
        self.fail.store(enabled, Ordering::SeqCst);
    }

    pub fn entries(&self) -> Vec<LogEntry> {
        self.entries.lock().clone()
    }

    /// Yields to the runtime until at least `n` entries arrived (or a bounded
    /// number of yields passed), then returns what was recorded.
    pub async fn wait_for(&self, n: usize) -> Vec<LogEntry> {
        for _ in 0..1000 {
            if self.entries.lock().len() >= n {
                break;
            }
            tokio::task::yield_now().await;
        }
        self.entries()
    }
}

#[async_trait]
impl AuditSink for RecordingAuditSink {
    async fn submit(&self, entry: LogEntry) -> Result<(), StorageError> {
        if self.fail.load(Ordering::SeqCst) {
            return Err(StorageError::Unavailable);
        }
        self.entries.lock().push(entry);
        Ok(())
    }
}
