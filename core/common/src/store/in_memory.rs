/* Licensed to the Apache Software Foundation (ASF) under one
 * or more contributor license agreements.  See the NOTICE file
 * distributed with this work for additional information
 * regarding copyright ownership.  The ASF licenses this file
 * to you under the Apache License, Version 2.0 (the
 * "License"); you may not use this file except in compliance
 * with the License.  You may obtain a copy of the License at
 *
 *   http://www.apache.org/licenses/LICENSE-2.0
 *
 * Unless required by applicable law or agreed to in writing,
 * software distributed under the License is distributed on an
 * "AS IS" BASIS, WITHOUT WARRANTIES OR CONDITIONS OF ANY
 * KIND, either express or implied.  See the License for the
 * specific language governing permissions and limitations
 * under the License.
 */

//! In-process coordination store.
//!
//! Writers use `InMemoryStore` directly; readers connect through an
//! `InMemoryClient`, which carries its own connection state so a test can
//! cut one reader off while the rest of the cluster keeps writing. Events
//! raised while a client is disconnected are lost for that client, the same
//! way watches are lost across a real session loss.

use super::{
    CoordinationClient, SessionState, Stat, StoreEvent, VersionedRecord, WatchId, WatchSink,
    is_under, parent_of,
};
use crate::{Record, StoreError};
use async_trait::async_trait;
use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use tracing::{debug, trace};

#[derive(Debug, Clone, Default)]
pub struct InMemoryStore {
    inner: Arc<Shared>,
}

#[derive(Debug, Default)]
struct Shared {
    tree: RwLock<Tree>,
    watchers: Mutex<HashMap<WatchId, Watcher>>,
    next_watch_id: AtomicU64,
    next_client_id: AtomicU64,
}

#[derive(Debug, Default)]
struct Tree {
    nodes: BTreeMap<String, Node>,
    next_seq: u64,
}

#[derive(Debug, Clone)]
struct Node {
    data: Vec<u8>,
    stat: Stat,
}

#[derive(Debug)]
struct Watcher {
    client_id: u64,
    prefix: String,
    sink: WatchSink,
    connected: Arc<AtomicBool>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Opens a reader connection with its own session.
    pub fn connect(&self) -> InMemoryClient {
        let id = self.inner.next_client_id.fetch_add(1, Ordering::SeqCst);
        InMemoryClient {
            id,
            store: self.clone(),
            connected: Arc::new(AtomicBool::new(true)),
        }
    }

    /// Creates a node, failing if it already exists. Missing parents are created empty.
    pub fn create(&self, path: &str, record: &Record) -> Result<Stat, StoreError> {
        let data = record.to_bytes()?;
        let mut tree = self.write_tree();
        if tree.nodes.contains_key(path) {
            return Err(StoreError::NodeExists(path.to_owned()));
        }
        let mut events = Vec::new();
        let stat = tree.upsert(path, data, &mut events);
        self.notify(&events);
        Ok(stat)
    }

    /// Creates or overwrites a node.
    pub fn set(&self, path: &str, record: &Record) -> Result<Stat, StoreError> {
        let data = record.to_bytes()?;
        Ok(self.set_raw(path, data))
    }

    /// Writes raw payload bytes, bypassing record encoding.
    pub fn set_raw(&self, path: &str, data: Vec<u8>) -> Stat {
        let mut tree = self.write_tree();
        let mut events = Vec::new();
        let stat = tree.upsert(path, data, &mut events);
        self.notify(&events);
        stat
    }

    /// Read-modify-write of a record under the tree lock. A missing node starts as an empty record.
    pub fn update<F>(&self, path: &str, update: F) -> Result<Stat, StoreError>
    where
        F: FnOnce(&mut Record),
    {
        let mut tree = self.write_tree();
        let mut record = match tree.nodes.get(path) {
            Some(node) => decode(path, &node.data)?,
            None => Record::new(last_segment(path)),
        };
        update(&mut record);
        let data = record.to_bytes()?;
        let mut events = Vec::new();
        let stat = tree.upsert(path, data, &mut events);
        self.notify(&events);
        Ok(stat)
    }

    /// Creates an empty node (and parents) if missing.
    pub fn ensure_path(&self, path: &str) -> Stat {
        let mut tree = self.write_tree();
        if let Some(node) = tree.nodes.get(path) {
            return node.stat;
        }
        let mut events = Vec::new();
        let stat = tree.upsert(path, Vec::new(), &mut events);
        self.notify(&events);
        stat
    }

    /// Removes a leaf node.
    pub fn delete(&self, path: &str) -> Result<(), StoreError> {
        let mut tree = self.write_tree();
        if !tree.nodes.contains_key(path) {
            return Err(StoreError::NoNode(path.to_owned()));
        }
        if !tree.children(path).is_empty() {
            return Err(StoreError::NotEmpty(path.to_owned()));
        }
        let mut events = Vec::new();
        tree.remove(path, &mut events);
        self.notify(&events);
        Ok(())
    }

    /// Removes a node and everything below it. Returns whether anything was removed.
    pub fn delete_recursive(&self, path: &str) -> bool {
        let mut tree = self.write_tree();
        let mut events = Vec::new();
        let removed = tree.remove(path, &mut events);
        self.notify(&events);
        removed
    }

    pub fn read_record(&self, path: &str) -> Result<Option<VersionedRecord>, StoreError> {
        let tree = self.read_tree();
        tree.nodes
            .get(path)
            .map(|node| {
                Ok(VersionedRecord {
                    record: decode(path, &node.data)?,
                    stat: node.stat,
                })
            })
            .transpose()
    }

    pub fn children_of(&self, path: &str) -> Vec<String> {
        self.read_tree().children(path)
    }

    pub fn exists_at(&self, path: &str) -> Option<Stat> {
        self.read_tree().nodes.get(path).map(|node| node.stat)
    }

    /// Loads a batch of records, overwriting existing nodes.
    pub fn seed(&self, records: BTreeMap<String, Record>) -> Result<(), StoreError> {
        for (path, record) in records {
            self.set(&path, &record)?;
        }
        Ok(())
    }

    pub fn watchers_count(&self) -> usize {
        self.lock_watchers().len()
    }

    fn register(&self, client: &InMemoryClient, prefix: &str, sink: WatchSink) -> WatchId {
        let id = WatchId(self.inner.next_watch_id.fetch_add(1, Ordering::SeqCst));
        self.lock_watchers().insert(
            id,
            Watcher {
                client_id: client.id,
                prefix: prefix.to_owned(),
                sink,
                connected: client.connected.clone(),
            },
        );
        debug!("Registered {id} on prefix {prefix} for client {}", client.id);
        id
    }

    fn unregister(&self, id: WatchId) {
        if self.lock_watchers().remove(&id).is_some() {
            debug!("Released {id}");
        }
    }

    // Called with the tree write lock held so notifications follow write order.
    fn notify(&self, events: &[StoreEvent]) {
        if events.is_empty() {
            return;
        }
        let mut watchers = self.lock_watchers();
        watchers.retain(|_, watcher| {
            if !watcher.connected.load(Ordering::SeqCst) {
                return true;
            }
            for event in events {
                let Some(path) = event.path() else { continue };
                if is_under(path, &watcher.prefix) && watcher.sink.send(event.clone()).is_err() {
                    return false;
                }
            }
            true
        });
        trace!("Delivered {} store events", events.len());
    }

    fn notify_session(&self, client_id: u64, state: SessionState) {
        let mut watchers = self.lock_watchers();
        watchers.retain(|_, watcher| {
            watcher.client_id != client_id
                || watcher.sink.send(StoreEvent::Session(state)).is_ok()
        });
    }

    fn read_tree(&self) -> RwLockReadGuard<'_, Tree> {
        self.inner.tree.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write_tree(&self) -> RwLockWriteGuard<'_, Tree> {
        self.inner.tree.write().unwrap_or_else(PoisonError::into_inner)
    }

    fn lock_watchers(&self) -> MutexGuard<'_, HashMap<WatchId, Watcher>> {
        self.inner
            .watchers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }
}

impl Tree {
    fn upsert(&mut self, path: &str, data: Vec<u8>, events: &mut Vec<StoreEvent>) -> Stat {
        self.ensure_parents(path, events);
        if let Some(node) = self.nodes.get_mut(path) {
            node.data = data;
            node.stat.version += 1;
            events.push(StoreEvent::NodeChanged {
                path: path.to_owned(),
            });
            return node.stat;
        }
        self.insert_new(path, data, events)
    }

    fn insert_new(&mut self, path: &str, data: Vec<u8>, events: &mut Vec<StoreEvent>) -> Stat {
        self.next_seq += 1;
        let stat = Stat {
            version: 0,
            created_seq: self.next_seq,
        };
        self.nodes.insert(path.to_owned(), Node { data, stat });
        events.push(StoreEvent::NodeChanged {
            path: path.to_owned(),
        });
        if let Some(parent) = parent_of(path) {
            events.push(StoreEvent::ChildrenChanged {
                path: parent.to_owned(),
            });
        }
        stat
    }

    fn ensure_parents(&mut self, path: &str, events: &mut Vec<StoreEvent>) {
        let mut missing = Vec::new();
        let mut current = parent_of(path);
        while let Some(parent) = current {
            if parent == "/" || self.nodes.contains_key(parent) {
                break;
            }
            missing.push(parent.to_owned());
            current = parent_of(parent);
        }
        for parent in missing.into_iter().rev() {
            self.insert_new(&parent, Vec::new(), events);
        }
    }

    fn remove(&mut self, path: &str, events: &mut Vec<StoreEvent>) -> bool {
        let doomed: Vec<String> = self
            .nodes
            .range(path.to_owned()..)
            .take_while(|(key, _)| key.starts_with(path))
            .filter(|(key, _)| is_under(key, path))
            .map(|(key, _)| key.clone())
            .collect();
        if doomed.is_empty() {
            return false;
        }
        // Deepest first, so watchers see children disappear before their parents.
        for key in doomed.iter().rev() {
            self.nodes.remove(key);
            events.push(StoreEvent::NodeChanged { path: key.clone() });
        }
        if let Some(parent) = parent_of(path) {
            events.push(StoreEvent::ChildrenChanged {
                path: parent.to_owned(),
            });
        }
        true
    }

    fn children(&self, path: &str) -> Vec<String> {
        let prefix = if path.ends_with('/') {
            path.to_owned()
        } else {
            format!("{path}/")
        };
        self.nodes
            .range(prefix.clone()..)
            .take_while(|(key, _)| key.starts_with(&prefix))
            .filter_map(|(key, _)| {
                let rest = &key[prefix.len()..];
                (!rest.is_empty() && !rest.contains('/')).then(|| rest.to_owned())
            })
            .collect()
    }
}

fn decode(path: &str, data: &[u8]) -> Result<Record, StoreError> {
    if data.is_empty() {
        return Ok(Record::new(last_segment(path)));
    }
    Record::from_bytes(path, data)
}

fn last_segment(path: &str) -> &str {
    path.rsplit('/').next().unwrap_or(path)
}

/// Reader connection to an [`InMemoryStore`].
#[derive(Debug, Clone)]
pub struct InMemoryClient {
    id: u64,
    store: InMemoryStore,
    connected: Arc<AtomicBool>,
}

impl InMemoryClient {
    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    /// Drops the connection. Reads fail with `ConnectionLoss` until `reconnect`.
    pub fn disconnect(&self) {
        if self.connected.swap(false, Ordering::SeqCst) {
            debug!("Client {} disconnected", self.id);
            self.store
                .notify_session(self.id, SessionState::Disconnected);
        }
    }

    /// Drops the connection and reports the session as expired.
    pub fn expire_session(&self) {
        self.connected.store(false, Ordering::SeqCst);
        debug!("Client {} session expired", self.id);
        self.store.notify_session(self.id, SessionState::Expired);
    }

    pub fn reconnect(&self) {
        if !self.connected.swap(true, Ordering::SeqCst) {
            debug!("Client {} reconnected", self.id);
            self.store.notify_session(self.id, SessionState::Connected);
        }
    }

    fn ensure_connected(&self) -> Result<(), StoreError> {
        if self.is_connected() {
            Ok(())
        } else {
            Err(StoreError::ConnectionLoss)
        }
    }
}

#[async_trait]
impl CoordinationClient for InMemoryClient {
    async fn read(&self, path: &str) -> Result<Option<VersionedRecord>, StoreError> {
        self.ensure_connected()?;
        self.store.read_record(path)
    }

    async fn exists(&self, path: &str) -> Result<Option<Stat>, StoreError> {
        self.ensure_connected()?;
        Ok(self.store.exists_at(path))
    }

    async fn children(&self, path: &str) -> Result<Vec<String>, StoreError> {
        self.ensure_connected()?;
        Ok(self.store.children_of(path))
    }

    fn watch(&self, prefix: &str, sink: WatchSink) -> WatchId {
        self.store.register(self, prefix, sink)
    }

    fn unwatch(&self, id: WatchId) {
        self.store.unregister(id);
    }
}
