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

use crate::adapters::{CurrentStatesAdapter, Delta, PartitionMap, ResourceAssignment};
use crate::registry::InstanceRegistry;
use spectator_common::{ClusterConfig, CoordinationClient, PropertyKeys, StoreError};
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{Instant, interval};
use tracing::debug;

/// Checks that the controller has converged: the external view of every
/// resource matches what live instances report under their current
/// sessions, and so does the target external view when it is enabled.
pub struct BestPossibleExternalViewVerifier {
    client: Arc<dyn CoordinationClient>,
    keys: PropertyKeys,
    resources: Option<BTreeSet<String>>,
}

impl BestPossibleExternalViewVerifier {
    pub fn new(client: Arc<dyn CoordinationClient>, cluster: &str) -> Self {
        Self {
            client,
            keys: PropertyKeys::new(cluster),
            resources: None,
        }
    }

    /// Restricts verification to the given resources.
    pub fn with_resources<I, S>(mut self, resources: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.resources = Some(resources.into_iter().map(Into::into).collect());
        self
    }

    /// Polls until converged (`Ok(true)`) or `timeout` elapses (`Ok(false)`).
    /// Transient store errors count as not converged yet.
    pub async fn verify_by_polling(
        &self,
        timeout: Duration,
        tick: Duration,
    ) -> Result<bool, StoreError> {
        let deadline = Instant::now() + timeout;
        let mut ticker = interval(tick);
        loop {
            ticker.tick().await;
            match self.verify().await {
                Ok(true) => return Ok(true),
                Ok(false) => {}
                Err(error) if error.is_transient() => {
                    debug!("Verification attempt failed: {error}");
                }
                Err(error) => return Err(error),
            }
            if Instant::now() >= deadline {
                return Ok(false);
            }
        }
    }

    /// One verification pass.
    pub async fn verify(&self) -> Result<bool, StoreError> {
        let client = self.client.as_ref();
        let ideal: BTreeSet<String> = client
            .children(&self.keys.ideal_states())
            .await?
            .into_iter()
            .collect();
        let mut resources = ideal.clone();
        resources.extend(client.children(&self.keys.external_views()).await?);

        let expected = self.best_possible(client).await?;
        resources.extend(expected.keys().cloned());
        if let Some(selected) = &self.resources {
            resources.retain(|resource| selected.contains(resource));
        }

        let target_enabled = client
            .read(&self.keys.cluster_config())
            .await?
            .map(|node| ClusterConfig::from_record(self.keys.cluster(), &node.record))
            .is_some_and(|config| config.target_external_view_enabled);

        let empty = PartitionMap::new();
        for resource in &resources {
            let wanted = expected.get(resource).unwrap_or(&empty);
            let external_view = client.read(&self.keys.external_view(resource)).await?;
            let Some(external_view) = external_view else {
                if ideal.contains(resource) {
                    debug!("Resource {resource} has no external view yet");
                    return Ok(false);
                }
                if !wanted.is_empty() {
                    return Ok(false);
                }
                continue;
            };
            let observed = ResourceAssignment::from_view_record(resource, &external_view.record);
            if observed.partitions != *wanted {
                debug!("External view of {resource} differs from current states");
                return Ok(false);
            }

            if target_enabled {
                let target = client
                    .read(&self.keys.target_external_view(resource))
                    .await?
                    .map(|node| ResourceAssignment::from_view_record(resource, &node.record));
                if target.is_none_or(|target| target.partitions != *wanted) {
                    debug!("Target external view of {resource} differs from current states");
                    return Ok(false);
                }
            }
        }
        Ok(true)
    }

    async fn best_possible(
        &self,
        client: &dyn CoordinationClient,
    ) -> Result<BTreeMap<String, PartitionMap>, StoreError> {
        let mut registry = InstanceRegistry::new(self.keys.clone());
        registry.resync(client).await?;
        let mut adapter = CurrentStatesAdapter::new(self.keys.clone(), Arc::default());
        let deltas = adapter.resync(client, &registry).await?;
        Ok(deltas
            .into_iter()
            .filter_map(|delta| match delta {
                Delta::FullResync(assignment) => Some((assignment.resource, assignment.partitions)),
                Delta::Removed(_) => None,
            })
            .collect())
    }
}
