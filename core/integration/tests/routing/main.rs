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

mod convergence_scenario;
mod lifecycle_scenario;
mod session_scenario;

use integration::harness::{
    ClusterHarness, DEFAULT_POLL_TICK, HarnessError, MASTER, ResourceSpec, SLAVE, eventually,
};
use spectator::RoutingTableProvider;
use std::collections::BTreeMap;
use std::time::Duration;

pub(crate) const TEST_DB_1: &str = "TestDB-1";
pub(crate) const TEST_DB_2: &str = "TestDB-2";
pub(crate) const PARTITIONS: u32 = 20;
pub(crate) const REPLICAS: u32 = 3;
pub(crate) const FIRST_PARTICIPANT: &str = "participant_12918";
pub(crate) const WAIT: Duration = Duration::from_secs(10);

/// `(resource, partition, role) -> instance names`
pub(crate) type RoutingTable = BTreeMap<(String, String, String), Vec<String>>;

pub(crate) fn routing_table(
    provider: &RoutingTableProvider,
    resources: &[ResourceSpec],
) -> RoutingTable {
    let mut table = RoutingTable::new();
    for spec in resources {
        for partition in spec.partition_names() {
            for role in [MASTER, SLAVE] {
                let instances = provider
                    .get_instances_for_resource(&spec.name, &partition, role)
                    .into_iter()
                    .map(|config| config.name)
                    .collect();
                table.insert((spec.name.clone(), partition.clone(), role.to_owned()), instances);
            }
        }
    }
    table
}

/// Every partition has one master and `replicas - 1` slaves.
pub(crate) fn is_master_slave(table: &RoutingTable, resources: &[ResourceSpec]) -> bool {
    resources.iter().all(|spec| {
        spec.partition_names().into_iter().all(|partition| {
            let count = |role: &str| {
                table
                    .get(&(spec.name.clone(), partition.clone(), role.to_owned()))
                    .map_or(0, Vec::len)
            };
            count(MASTER) == 1 && count(SLAVE) == spec.replicas as usize - 1
        })
    })
}

/// Waits until `provider` routes every resource of the harness as a
/// complete master/slave layout satisfying `condition`.
pub(crate) async fn await_routing<F>(
    provider: &RoutingTableProvider,
    harness: &ClusterHarness,
    condition: F,
) -> Result<RoutingTable, HarnessError>
where
    F: Fn(&RoutingTable) -> bool,
{
    let resources = harness.resources();
    let (resources, condition) = (&resources, &condition);
    eventually(WAIT, DEFAULT_POLL_TICK, move || async move {
        let table = routing_table(provider, resources);
        if is_master_slave(&table, resources) && condition(&table) {
            Ok(Some(table))
        } else {
            Ok(None)
        }
    })
    .await
}

pub(crate) fn mentions(table: &RoutingTable, instance: &str) -> bool {
    table
        .values()
        .any(|instances| instances.iter().any(|name| name == instance))
}
