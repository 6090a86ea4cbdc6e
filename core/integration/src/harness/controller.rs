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

use crate::harness::MockParticipant;
use spectator::ResourceAssignment;
use spectator::adapters::{
    CURRENT_STATE_FIELD, REPLICAS_FIELD, STATE_MODEL_DEF_FIELD, STATE_MODEL_DEF_REF_FIELD,
};
use spectator_common::{InMemoryStore, PropertyKeys, Record, SESSION_ID_FIELD, StoreError};
use std::collections::BTreeMap;
use tracing::debug;

pub const MASTER: &str = "MASTER";
pub const SLAVE: &str = "SLAVE";
pub const MASTER_SLAVE: &str = "MasterSlave";

const NUM_PARTITIONS_FIELD: &str = "NUM_PARTITIONS";
const REBALANCE_MODE_FIELD: &str = "REBALANCE_MODE";
const FULL_AUTO: &str = "FULL_AUTO";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourceSpec {
    pub name: String,
    pub partitions: u32,
    pub replicas: u32,
    pub state_model: String,
}

impl ResourceSpec {
    pub fn master_slave(name: &str, partitions: u32, replicas: u32) -> Self {
        Self {
            name: name.to_owned(),
            partitions,
            replicas,
            state_model: MASTER_SLAVE.to_owned(),
        }
    }

    pub fn partition(&self, index: u32) -> String {
        format!("{}_{index}", self.name)
    }

    pub fn partition_names(&self) -> Vec<String> {
        (0..self.partitions).map(|index| self.partition(index)).collect()
    }

    fn ideal_state(&self) -> Record {
        let mut record = Record::new(&self.name);
        record.set_simple_field(STATE_MODEL_DEF_REF_FIELD, &self.state_model);
        record.set_simple_field(REPLICAS_FIELD, self.replicas.to_string());
        record.set_simple_field(NUM_PARTITIONS_FIELD, self.partitions.to_string());
        record.set_simple_field(REBALANCE_MODE_FIELD, FULL_AUTO);
        record
    }

    /// Deterministic placement over the sorted live instances: replica `k`
    /// of partition `i` goes to `live[(i + k) % n]`, replica 0 is the master.
    pub fn placement(&self, live: &[&str]) -> ResourceAssignment {
        let mut assignment = ResourceAssignment::new(&self.name);
        assignment.state_model = Some(self.state_model.clone());
        if live.is_empty() {
            return assignment;
        }
        let replicas = (self.replicas as usize).min(live.len());
        for index in 0..self.partitions {
            let partition = self.partition(index);
            for replica in 0..replicas {
                let instance = live[(index as usize + replica) % live.len()];
                let role = if replica == 0 { MASTER } else { SLAVE };
                assignment.assign(&partition, instance, role);
            }
        }
        assignment
    }
}

/// Stand-in for the cluster controller: keeps the resource list and, on
/// every rebalance, tells live participants what to host and publishes the
/// resulting external view.
#[derive(Debug)]
pub struct MockController {
    keys: PropertyKeys,
    target_external_view: bool,
    resources: BTreeMap<String, ResourceSpec>,
}

impl MockController {
    pub fn new(keys: PropertyKeys, target_external_view: bool) -> Self {
        Self {
            keys,
            target_external_view,
            resources: BTreeMap::new(),
        }
    }

    pub fn resources(&self) -> impl Iterator<Item = &ResourceSpec> {
        self.resources.values()
    }

    pub fn resource(&self, name: &str) -> Option<&ResourceSpec> {
        self.resources.get(name)
    }

    pub fn add_resource(&mut self, store: &InMemoryStore, spec: ResourceSpec) -> Result<(), StoreError> {
        store.set(&self.keys.ideal_state(&spec.name), &spec.ideal_state())?;
        self.resources.insert(spec.name.clone(), spec);
        Ok(())
    }

    /// Recomputes placement over live participants. Current states are
    /// written before the views, like participants finishing transitions
    /// ahead of the controller aggregating them.
    pub fn rebalance(
        &self,
        store: &InMemoryStore,
        participants: &BTreeMap<String, MockParticipant>,
    ) -> Result<(), StoreError> {
        let live: Vec<&MockParticipant> = participants.values().filter(|p| p.is_live()).collect();
        let names: Vec<&str> = live.iter().map(|participant| participant.name()).collect();
        for spec in self.resources.values() {
            let assignment = spec.placement(&names);
            for participant in &live {
                let Some(session) = participant.session() else {
                    continue;
                };
                self.report_current_state(store, spec, &assignment, participant.name(), session)?;
            }

            let mut view = assignment.to_view_record();
            view.set_simple_field(REPLICAS_FIELD, spec.replicas.to_string());
            store.set(&self.keys.external_view(&spec.name), &view)?;
            if self.target_external_view {
                store.set(&self.keys.target_external_view(&spec.name), &view)?;
            }
            debug!(
                "Rebalanced {} over {} live participants",
                spec.name,
                names.len()
            );
        }
        Ok(())
    }

    fn report_current_state(
        &self,
        store: &InMemoryStore,
        spec: &ResourceSpec,
        assignment: &ResourceAssignment,
        instance: &str,
        session: &str,
    ) -> Result<(), StoreError> {
        let path = self.keys.current_state(instance, session, &spec.name);
        let mut record = Record::new(&spec.name);
        record.set_simple_field(SESSION_ID_FIELD, session);
        record.set_simple_field(STATE_MODEL_DEF_FIELD, &spec.state_model);
        for (partition, instances) in &assignment.partitions {
            if let Some(role) = instances.get(instance) {
                record.set_map_entry(partition, CURRENT_STATE_FIELD, role);
            }
        }
        if record.map_fields.is_empty() {
            return match store.delete(&path) {
                Ok(()) | Err(StoreError::NoNode(_)) => Ok(()),
                Err(error) => Err(error),
            };
        }
        store.set(&path, &record)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn placement_should_rotate_masters_over_live_instances() {
        let spec = ResourceSpec::master_slave("db", 4, 3);
        let assignment = spec.placement(&["a", "b", "c", "d"]);

        let roles = |partition: &str| assignment.partitions[partition].clone();
        assert_eq!(roles("db_0")["a"], MASTER);
        assert_eq!(roles("db_0")["b"], SLAVE);
        assert_eq!(roles("db_0")["c"], SLAVE);
        assert!(!roles("db_0").contains_key("d"));
        assert_eq!(roles("db_3")["d"], MASTER);
        assert_eq!(roles("db_3")["a"], SLAVE);
    }

    #[test]
    fn placement_should_cap_replicas_at_live_count() {
        let spec = ResourceSpec::master_slave("db", 2, 3);
        let assignment = spec.placement(&["a", "b"]);
        assert_eq!(assignment.partitions["db_0"].len(), 2);
        assert!(spec.placement(&[]).partitions.is_empty());
    }
}
