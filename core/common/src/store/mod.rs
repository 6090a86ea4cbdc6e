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

//! Contract of the coordination service consumed by the routing table.
//!
//! The service keeps a tree of versioned nodes. Clients read nodes and
//! children lists and register prefix watchers; every change below a watched
//! prefix is pushed to the watcher's sink without blocking the store.

pub mod in_memory;

use crate::{Record, StoreError};
use async_trait::async_trait;
use std::fmt::Display;
use tokio::sync::mpsc::UnboundedSender;

/// Node metadata maintained by the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Stat {
    /// Bumped on every write of the node, starting at 0 on creation.
    pub version: u64,
    /// Store-wide creation order; later creations get larger values.
    pub created_seq: u64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VersionedRecord {
    pub record: Record,
    pub stat: Stat,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SessionState {
    Connected,
    Disconnected,
    Expired,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreEvent {
    /// The node was created, written or deleted.
    NodeChanged { path: String },
    /// A child was added to or removed from the node.
    ChildrenChanged { path: String },
    /// Connection state of the client that registered the watcher changed.
    Session(SessionState),
}

impl StoreEvent {
    pub fn path(&self) -> Option<&str> {
        match self {
            StoreEvent::NodeChanged { path } | StoreEvent::ChildrenChanged { path } => Some(path),
            StoreEvent::Session(_) => None,
        }
    }
}

/// Non-blocking destination of watch notifications.
pub type WatchSink = UnboundedSender<StoreEvent>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct WatchId(pub u64);

impl Display for WatchId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "watch-{}", self.0)
    }
}

#[async_trait]
pub trait CoordinationClient: Send + Sync + 'static {
    /// Reads and decodes a node. `Ok(None)` when the node does not exist.
    async fn read(&self, path: &str) -> Result<Option<VersionedRecord>, StoreError>;

    /// Returns the node's stat without decoding its payload.
    async fn exists(&self, path: &str) -> Result<Option<Stat>, StoreError>;

    /// Child names of a node, sorted. Empty when the node does not exist.
    async fn children(&self, path: &str) -> Result<Vec<String>, StoreError>;

    /// Registers a watcher for every change at or below `prefix`.
    fn watch(&self, prefix: &str, sink: WatchSink) -> WatchId;

    /// Releases a watcher. Unknown ids are ignored.
    fn unwatch(&self, id: WatchId);
}

pub(crate) fn is_under(path: &str, prefix: &str) -> bool {
    match path.strip_prefix(prefix) {
        Some(rest) => rest.is_empty() || rest.starts_with('/') || prefix.ends_with('/'),
        None => false,
    }
}

pub(crate) fn parent_of(path: &str) -> Option<&str> {
    match path.rfind('/') {
        Some(0) if path.len() > 1 => Some("/"),
        Some(0) | None => None,
        Some(index) => Some(&path[..index]),
    }
}
