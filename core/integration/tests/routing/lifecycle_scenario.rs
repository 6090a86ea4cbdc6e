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

use crate::{PARTITIONS, REPLICAS, TEST_DB_1, WAIT, await_routing};
use integration::harness::{ClusterHarness, HarnessError, MASTER, ResourceSpec, init_tracing};
use spectator::{ProviderState, RoutingError};
use spectator_common::PropertyType;
use std::sync::Arc;
use test_case::test_case;

#[test_case(PropertyType::IdealStates; "ideal states")]
#[test_case(PropertyType::LiveInstances; "live instances")]
#[test_case(PropertyType::Configs; "configs")]
#[tokio::test]
async fn unsupported_source_should_be_rejected(source: PropertyType) {
    init_tracing();
    let harness = ClusterHarness::builder().build().unwrap();

    let error = harness.start_provider(source).await.err().unwrap();

    assert!(matches!(
        &error,
        HarnessError::Routing(RoutingError::UnsupportedSourceType(_))
    ));
    assert!(error.to_string().contains("Unsupported source data type"));
    assert!(error.to_string().contains(&source.to_string()));
}

#[tokio::test]
async fn target_external_view_provider_should_go_live_when_enabled() {
    init_tracing();
    let mut harness = ClusterHarness::builder()
        .cluster("CLUSTER_Target")
        .target_external_view(true)
        .build()
        .unwrap();
    harness
        .add_resource(ResourceSpec::master_slave(TEST_DB_1, PARTITIONS, REPLICAS))
        .unwrap();
    harness.await_converged(WAIT).await.unwrap();

    let provider = harness
        .start_provider(PropertyType::TargetExternalView)
        .await
        .unwrap();
    await_routing(&provider, &harness, |_| true).await.unwrap();

    assert_eq!(provider.state(), ProviderState::Live);
    assert!(
        !provider
            .get_instances_for_resource(TEST_DB_1, &format!("{TEST_DB_1}_0"), MASTER)
            .is_empty()
    );
    provider.shutdown().await;
}

#[tokio::test]
async fn target_external_view_provider_should_be_refused_when_disabled() {
    init_tracing();
    let harness = ClusterHarness::builder().build().unwrap();

    let error = harness
        .start_provider(PropertyType::TargetExternalView)
        .await
        .err()
        .unwrap();

    assert!(matches!(
        error,
        HarnessError::Routing(RoutingError::TargetExternalViewDisabled(_))
    ));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn shutdown_from_two_threads_should_leave_empty_routing() {
    init_tracing();
    let mut harness = ClusterHarness::builder().build().unwrap();
    harness
        .add_resource(ResourceSpec::master_slave(TEST_DB_1, PARTITIONS, REPLICAS))
        .unwrap();
    let provider = Arc::new(
        harness
            .start_provider(PropertyType::ExternalView)
            .await
            .unwrap(),
    );
    await_routing(&provider, &harness, |_| true).await.unwrap();

    let runtime = tokio::runtime::Handle::current();
    let threads: Vec<_> = (0..2)
        .map(|_| {
            let provider = provider.clone();
            let runtime = runtime.clone();
            std::thread::spawn(move || runtime.block_on(provider.shutdown()))
        })
        .collect();
    for thread in threads {
        tokio::task::spawn_blocking(move || thread.join())
            .await
            .unwrap()
            .unwrap();
    }

    let partition = format!("{TEST_DB_1}_0");
    assert_eq!(provider.state(), ProviderState::Shutdown);
    for _ in 0..3 {
        assert!(
            provider
                .get_instances_for_resource(TEST_DB_1, &partition, MASTER)
                .is_empty()
        );
        assert!(provider.get_resources().is_empty());
        assert!(provider.get_instances().is_empty());
        assert!(provider.get_partitions_for_instance(TEST_DB_1, "participant_12918").is_empty());
    }
    assert!(matches!(provider.refresh().await, Err(RoutingError::Closed)));
    assert_eq!(harness.store().watchers_count(), 0);
}
