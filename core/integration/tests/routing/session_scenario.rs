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

use crate::{FIRST_PARTICIPANT, PARTITIONS, REPLICAS, TEST_DB_1, WAIT, await_routing, mentions};
use integration::harness::{
    ClusterHarness, DEFAULT_POLL_TICK, HarnessError, ResourceSpec, eventually, init_tracing,
};
use spectator::{ProviderConfig, ProviderState, RoutingTableProvider};
use spectator_common::PropertyType;
use std::sync::Arc;
use test_case::test_case;

#[test_case(PropertyType::ExternalView; "external view")]
#[test_case(PropertyType::CurrentStates; "current states")]
#[tokio::test]
async fn restarted_participant_should_route_again_under_new_session(source: PropertyType) {
    init_tracing();
    let mut harness = ClusterHarness::builder()
        .cluster("CLUSTER_Sessions")
        .participants(12918..=12921)
        .build()
        .unwrap();
    harness
        .add_resource(ResourceSpec::master_slave(TEST_DB_1, PARTITIONS, REPLICAS))
        .unwrap();
    harness.await_converged(WAIT).await.unwrap();
    let provider = harness.start_provider(source).await.unwrap();

    harness.stop_participant(FIRST_PARTICIPANT).unwrap();
    harness.await_converged(WAIT).await.unwrap();
    await_routing(&provider, &harness, |table| !mentions(table, FIRST_PARTICIPANT))
        .await
        .unwrap();

    harness.start_participant(FIRST_PARTICIPANT).unwrap();
    harness.await_converged(WAIT).await.unwrap();
    await_routing(&provider, &harness, |table| mentions(table, FIRST_PARTICIPANT))
        .await
        .unwrap();

    provider.shutdown().await;
}

#[tokio::test]
async fn lost_connection_should_go_stale_and_recover() {
    init_tracing();
    let mut harness = ClusterHarness::builder()
        .cluster("CLUSTER_Stale")
        .participants(12918..=12921)
        .build()
        .unwrap();
    harness
        .add_resource(ResourceSpec::master_slave(TEST_DB_1, PARTITIONS, REPLICAS))
        .unwrap();
    let client = Arc::new(harness.store().connect());
    let provider = RoutingTableProvider::new(
        client.clone(),
        ProviderConfig::new(harness.cluster(), PropertyType::CurrentStates),
    )
    .await
    .unwrap();
    let before = await_routing(&provider, &harness, |_| true).await.unwrap();

    client.disconnect();
    let mut state = provider.subscribe_state();
    tokio::time::timeout(
        WAIT,
        state.wait_for(|state| *state == ProviderState::Stale),
    )
    .await
    .unwrap()
    .unwrap();
    assert!(provider.is_stale());
    let stale = crate::routing_table(&provider, &harness.resources());
    assert_eq!(stale, before);

    harness.stop_participant(FIRST_PARTICIPANT).unwrap();
    client.reconnect();

    let provider_ref = &provider;
    eventually(WAIT, DEFAULT_POLL_TICK, move || async move {
        Ok::<_, HarnessError>((provider_ref.state() == ProviderState::Live).then_some(()))
    })
    .await
    .unwrap();
    await_routing(&provider, &harness, |table| !mentions(table, FIRST_PARTICIPANT))
        .await
        .unwrap();
    assert!(provider.stats().publishes > 1);

    provider.shutdown().await;
}
