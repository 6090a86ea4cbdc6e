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

use super::{Delta, ResourceAssignment};
use crate::provider::ProviderStats;
use futures::future::join_all;
use spectator_common::{
    CoordinationClient, PropertyKeys, PropertyType, Stat, StoreError, VersionedRecord,
};
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use tracing::{debug, warn};

/// Node stats the adapter has already acted on.
#[derive(Debug, Clone, Default)]
struct Versions {
    // Stat of the node each emitted assignment came from.
    emitted: BTreeMap<String, Stat>,
    // Stat of nodes that failed to decode, reported once per write.
    malformed: BTreeMap<String, Stat>,
}

/// Changes computed from one batch of reads, committed only if every read succeeded.
#[derive(Debug)]
struct Batch {
    versions: Versions,
    deltas: Vec<Delta>,
    data_errors: u64,
}

impl Batch {
    fn new(versions: &Versions) -> Self {
        Self {
            versions: versions.clone(),
            deltas: Vec::new(),
            data_errors: 0,
        }
    }

    fn remove(&mut self, resource: String) {
        self.versions.malformed.remove(&resource);
        if self.versions.emitted.remove(&resource).is_some() {
            self.deltas.push(Delta::Removed(resource));
        }
    }
}

/// Reads one node per resource under `EXTERNALVIEW` or `TARGETEXTERNALVIEW`.
#[derive(Debug)]
pub struct ViewAdapter {
    keys: PropertyKeys,
    property: PropertyType,
    root: String,
    stats: Arc<ProviderStats>,
    versions: Versions,
}

impl ViewAdapter {
    pub fn new(keys: PropertyKeys, property: PropertyType, stats: Arc<ProviderStats>) -> Self {
        let root = keys.property_root(property);
        Self {
            keys,
            property,
            root,
            stats,
            versions: Versions::default(),
        }
    }

    pub fn root(&self) -> &str {
        &self.root
    }

    pub async fn resync(&mut self, client: &dyn CoordinationClient) -> Result<Vec<Delta>, StoreError> {
        let resources = client.children(&self.root).await?;
        let mut batch = Batch::new(&self.versions);
        self.drop_missing(&mut batch, &resources);
        self.refresh(client, &mut batch, resources).await?;
        Ok(self.commit(batch))
    }

    pub async fn apply(
        &mut self,
        client: &dyn CoordinationClient,
        paths: &BTreeSet<String>,
    ) -> Result<Vec<Delta>, StoreError> {
        let mut listing_changed = false;
        let mut dirty = BTreeSet::new();
        for path in paths {
            let Some(segments) = self.keys.segments(path) else {
                continue;
            };
            match segments.as_slice() {
                [property] if *property == self.root_segment() => listing_changed = true,
                [property, resource, ..] if *property == self.root_segment() => {
                    dirty.insert((*resource).to_owned());
                }
                _ => {}
            }
        }

        let mut batch = Batch::new(&self.versions);
        if listing_changed {
            let resources = client.children(&self.root).await?;
            self.drop_missing(&mut batch, &resources);
            dirty.extend(
                resources
                    .into_iter()
                    .filter(|resource| !batch.versions.emitted.contains_key(resource)),
            );
        }
        self.refresh(client, &mut batch, dirty.into_iter().collect())
            .await?;
        Ok(self.commit(batch))
    }

    fn root_segment(&self) -> String {
        self.property.to_string()
    }

    fn commit(&mut self, batch: Batch) -> Vec<Delta> {
        for _ in 0..batch.data_errors {
            self.stats.record_data_error();
        }
        self.versions = batch.versions;
        batch.deltas
    }

    fn drop_missing(&self, batch: &mut Batch, present: &[String]) {
        let present: BTreeSet<&str> = present.iter().map(String::as_str).collect();
        batch
            .versions
            .malformed
            .retain(|resource, _| present.contains(resource.as_str()));
        let gone: Vec<String> = batch
            .versions
            .emitted
            .keys()
            .filter(|resource| !present.contains(resource.as_str()))
            .cloned()
            .collect();
        for resource in gone {
            debug!("Resource {resource} disappeared from {}", self.root);
            batch.remove(resource);
        }
    }

    async fn refresh(
        &self,
        client: &dyn CoordinationClient,
        batch: &mut Batch,
        resources: Vec<String>,
    ) -> Result<(), StoreError> {
        let paths: Vec<String> = resources
            .iter()
            .map(|resource| format!("{}/{resource}", self.root))
            .collect();
        let reads = join_all(paths.iter().map(|path| client.read(path))).await;

        for (resource, read) in resources.into_iter().zip(reads) {
            self.on_read(client, batch, resource, read).await?;
        }
        Ok(())
    }

    async fn on_read(
        &self,
        client: &dyn CoordinationClient,
        batch: &mut Batch,
        resource: String,
        read: Result<Option<VersionedRecord>, StoreError>,
    ) -> Result<(), StoreError> {
        match read {
            Ok(Some(node)) => {
                batch.versions.malformed.remove(&resource);
                if batch.versions.emitted.get(&resource) == Some(&node.stat) {
                    return Ok(());
                }
                batch.versions.emitted.insert(resource.clone(), node.stat);
                batch
                    .deltas
                    .push(Delta::FullResync(ResourceAssignment::from_view_record(
                        &resource,
                        &node.record,
                    )));
            }
            Ok(None) => batch.remove(resource),
            Err(StoreError::Malformed { path, reason }) => {
                let Some(stat) = client.exists(&path).await? else {
                    batch.remove(resource);
                    return Ok(());
                };
                if batch.versions.malformed.get(&resource) == Some(&stat) {
                    return Ok(());
                }
                warn!("Ignoring malformed {} node {path}: {reason}", self.property);
                batch.data_errors += 1;
                batch.versions.emitted.remove(&resource);
                batch.versions.malformed.insert(resource.clone(), stat);
                batch.deltas.push(Delta::Removed(resource));
            }
            Err(error) => return Err(error),
        }
        Ok(())
    }
}
