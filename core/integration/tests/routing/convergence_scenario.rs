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

use crate::{
    FIRST_PARTICIPANT, PARTITIONS, REPLICAS, TEST_DB_1, TEST_DB_2, WAIT, await_routing, mentions,
};
use integration::harness::{ClusterHarness, ResourceSpec, init_tracing};
use spectator::RoutingTableProvider;
use spectator_common::PropertyType;
use std::collections::BTreeSet;

async fn converged_cluster(
    resources: &[&str],
) -> (ClusterHarness, RoutingTableProvider, RoutingTableProvider) {
    init_tracing();
    let mut harness = ClusterHarness::builder()
        .cluster("CLUSTER_Routing")
        .build()
        .unwrap();
    for resource in resources {
        harness
            .add_resource(ResourceSpec::master_slave(resource, PARTITIONS, REPLICAS))
            .unwrap();
    }
    harness.await_converged(WAIT).await.unwrap();
    let external_view = harness
        .start_provider(PropertyType::ExternalView)
        .await
        .unwrap();
    let current_states = harness
        .start_provider(PropertyType::CurrentStates)
        .await
        .unwrap();
    (harness, external_view, current_states)
}

#[tokio::test]
async fn providers_should_agree_on_single_resource() {
    let (harness, external_view, current_states) = converged_cluster(&[TEST_DB_1]).await;

    let from_view = await_routing(&external_view, &harness, |_| true)
        .await
        .unwrap();
    let from_states = await_routing(&current_states, &harness, |_| true)
        .await
        .unwrap();

    assert_eq!(from_view, from_states);
    assert_eq!(from_view.len(), PARTITIONS as usize * 2);
    assert_eq!(
        external_view.get_resources(),
        BTreeSet::from([TEST_DB_1.to_owned()])
    );
    assert_eq!(external_view.get_live_instances().len(), 10);

    external_view.shutdown().await;
    current_states.shutdown().await;
}

#[tokio::test]
async fn providers_should_pick_up_added_resource() {
    let (mut harness, external_view, current_states) = converged_cluster(&[TEST_DB_1]).await;

    harness
        .add_resource(ResourceSpec::master_slave(TEST_DB_2, PARTITIONS, REPLICAS))
        .unwrap();
    harness.await_converged(WAIT).await.unwrap();

    let from_view = await_routing(&external_view, &harness, |_| true)
        .await
        .unwrap();
    let from_states = await_routing(&current_states, &harness, |_| true)
        .await
        .unwrap();

    let both = BTreeSet::from([TEST_DB_1.to_owned(), TEST_DB_2.to_owned()]);
    assert_eq!(from_view, from_states);
    assert_eq!(external_view.get_resources(), both);
    assert_eq!(current_states.get_resources(), both);

    external_view.shutdown().await;
    current_states.shutdown().await;
}

#[tokio::test]
async fn stopped_participant_should_disappear_from_routing() {
    let (mut harness, external_view, current_states) =
        converged_cluster(&[TEST_DB_1, TEST_DB_2]).await;
    let before = await_routing(&external_view, &harness, |_| true)
        .await
        .unwrap();
    assert!(mentions(&before, FIRST_PARTICIPANT));

    harness.stop_participant(FIRST_PARTICIPANT).unwrap();
    harness.await_converged(WAIT).await.unwrap();

    let gone = |table: &crate::RoutingTable| !mentions(table, FIRST_PARTICIPANT);
    let from_view = await_routing(&external_view, &harness, gone).await.unwrap();
    let from_states = await_routing(&current_states, &harness, gone)
        .await
        .unwrap();

    assert_eq!(from_view, from_states);
    for provider in [&external_view, &current_states] {
        assert!(
            provider
                .get_live_instances()
                .iter()
                .all(|config| config.name != FIRST_PARTICIPANT)
        );
        assert!(
            provider
                .get_instances()
                .iter()
                .all(|config| config.name != FIRST_PARTICIPANT)
        );
    }

    external_view.shutdown().await;
    current_states.shutdown().await;
}
