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

use crate::harness::{HarnessError, MockController, MockParticipant, ResourceSpec};
use spectator::{BestPossibleExternalViewVerifier, ProviderConfig, RoutingTableProvider};
use spectator_common::{
    ClusterConfig, CoordinationClient, InMemoryStore, PropertyKeys, PropertyType,
};
use std::collections::BTreeMap;
use std::ops::RangeInclusive;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

const VERIFY_TICK: Duration = Duration::from_millis(20);

/// A cluster living in an in-memory store, with a controller and a set of
/// participants that tests start, stop and rebalance at will.
#[derive(Debug)]
pub struct ClusterHarness {
    keys: PropertyKeys,
    store: InMemoryStore,
    controller: MockController,
    participants: BTreeMap<String, MockParticipant>,
}

#[derive(Debug)]
pub struct ClusterHarnessBuilder {
    cluster: String,
    ports: RangeInclusive<u16>,
    target_external_view: bool,
}

impl Default for ClusterHarnessBuilder {
    fn default() -> Self {
        Self {
            cluster: "CLUSTER_Test".to_owned(),
            ports: 12918..=12927,
            target_external_view: false,
        }
    }
}

impl ClusterHarnessBuilder {
    pub fn cluster(mut self, cluster: &str) -> Self {
        self.cluster = cluster.to_owned();
        self
    }

    /// One participant per port, named `participant_{port}`.
    pub fn participants(mut self, ports: RangeInclusive<u16>) -> Self {
        self.ports = ports;
        self
    }

    pub fn target_external_view(mut self, enabled: bool) -> Self {
        self.target_external_view = enabled;
        self
    }

    /// Lays out the cluster and starts every participant.
    pub fn build(self) -> Result<ClusterHarness, HarnessError> {
        let keys = PropertyKeys::new(&self.cluster);
        let store = InMemoryStore::new();
        store.ensure_path(keys.root());
        let mut cluster_config = ClusterConfig::new(&self.cluster);
        cluster_config.enable_target_external_view(self.target_external_view);
        store.set(&keys.cluster_config(), &cluster_config.to_record())?;
        for property in [
            PropertyType::IdealStates,
            PropertyType::ExternalView,
            PropertyType::LiveInstances,
            PropertyType::Instances,
        ] {
            store.ensure_path(&keys.property_root(property));
        }

        let mut participants = BTreeMap::new();
        for port in self.ports {
            let mut participant = MockParticipant::new(port);
            participant.register(&store, &keys)?;
            participant.start(&store, &keys)?;
            participants.insert(participant.name().to_owned(), participant);
        }
        info!(
            "Cluster {} is up with {} participants",
            self.cluster,
            participants.len()
        );
        Ok(ClusterHarness {
            controller: MockController::new(keys.clone(), self.target_external_view),
            keys,
            store,
            participants,
        })
    }
}

impl ClusterHarness {
    pub fn builder() -> ClusterHarnessBuilder {
        ClusterHarnessBuilder::default()
    }

    pub fn cluster(&self) -> &str {
        self.keys.cluster()
    }

    pub fn keys(&self) -> &PropertyKeys {
        &self.keys
    }

    pub fn store(&self) -> &InMemoryStore {
        &self.store
    }

    /// A new store session for a provider or verifier.
    pub fn client(&self) -> Arc<dyn CoordinationClient> {
        Arc::new(self.store.connect())
    }

    pub fn participant_names(&self) -> Vec<String> {
        self.participants.keys().cloned().collect()
    }

    pub fn live_participant_names(&self) -> Vec<String> {
        self.participants
            .values()
            .filter(|participant| participant.is_live())
            .map(|participant| participant.name().to_owned())
            .collect()
    }

    pub fn resource(&self, name: &str) -> Option<&ResourceSpec> {
        self.controller.resource(name)
    }

    pub fn resources(&self) -> Vec<ResourceSpec> {
        self.controller.resources().cloned().collect()
    }

    /// Adds a resource and rebalances the cluster.
    pub fn add_resource(&mut self, spec: ResourceSpec) -> Result<(), HarnessError> {
        if self.controller.resource(&spec.name).is_some() {
            return Err(HarnessError::ResourceExists(spec.name));
        }
        info!(
            "Adding resource {} with {} partitions and {} replicas",
            spec.name, spec.partitions, spec.replicas
        );
        self.controller.add_resource(&self.store, spec)?;
        self.rebalance()
    }

    pub fn start_participant(&mut self, name: &str) -> Result<(), HarnessError> {
        let participant = self
            .participants
            .get_mut(name)
            .ok_or_else(|| HarnessError::UnknownParticipant(name.to_owned()))?;
        participant.start(&self.store, &self.keys)?;
        self.rebalance()
    }

    /// Takes a participant down and moves its replicas to the remaining ones.
    pub fn stop_participant(&mut self, name: &str) -> Result<(), HarnessError> {
        let participant = self
            .participants
            .get_mut(name)
            .ok_or_else(|| HarnessError::UnknownParticipant(name.to_owned()))?;
        participant.stop(&self.store, &self.keys)?;
        self.rebalance()
    }

    pub fn rebalance(&self) -> Result<(), HarnessError> {
        self.controller.rebalance(&self.store, &self.participants)?;
        Ok(())
    }

    pub async fn start_provider(
        &self,
        source: PropertyType,
    ) -> Result<RoutingTableProvider, HarnessError> {
        let provider =
            RoutingTableProvider::new(self.client(), ProviderConfig::new(self.cluster(), source))
                .await?;
        Ok(provider)
    }

    pub fn verifier(&self) -> BestPossibleExternalViewVerifier {
        BestPossibleExternalViewVerifier::new(self.client(), self.cluster())
    }

    /// Waits until the external view matches what live participants report.
    pub async fn await_converged(&self, timeout: Duration) -> Result<(), HarnessError> {
        if self.verifier().verify_by_polling(timeout, VERIFY_TICK).await? {
            return Ok(());
        }
        Err(HarnessError::Timeout {
            context: format!("cluster {} did not converge", self.cluster()),
        })
    }
}
