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

use async_trait::async_trait;
use spectator_common::{
    CoordinationClient, InMemoryClient, Stat, StoreError, VersionedRecord, WatchId, WatchSink,
};
use std::collections::BTreeSet;
use std::sync::Mutex;

/// Client whose first read of each listed path fails with `ConnectionLoss`.
#[derive(Debug)]
pub struct FlakyClient {
    inner: InMemoryClient,
    failing: Mutex<BTreeSet<String>>,
}

impl FlakyClient {
    pub fn new(inner: InMemoryClient, failing: &[&str]) -> Self {
        Self {
            inner,
            failing: Mutex::new(failing.iter().map(|path| (*path).to_owned()).collect()),
        }
    }

    pub fn fail_next_read(&self, path: &str) {
        self.failing.lock().unwrap().insert(path.to_owned());
    }

    pub fn pending_failures(&self) -> usize {
        self.failing.lock().unwrap().len()
    }
}

#[async_trait]
impl CoordinationClient for FlakyClient {
    async fn read(&self, path: &str) -> Result<Option<VersionedRecord>, StoreError> {
        if self.failing.lock().unwrap().remove(path) {
            return Err(StoreError::ConnectionLoss);
        }
        self.inner.read(path).await
    }

    async fn exists(&self, path: &str) -> Result<Option<Stat>, StoreError> {
        self.inner.exists(path).await
    }

    async fn children(&self, path: &str) -> Result<Vec<String>, StoreError> {
        self.inner.children(path).await
    }

    fn watch(&self, prefix: &str, sink: WatchSink) -> WatchId {
        self.inner.watch(prefix, sink)
    }

    fn unwatch(&self, id: WatchId) {
        self.inner.unwatch(id)
    }
}
