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

//! Store layout under a cluster root.
//!
//! ```text
//! /{cluster}/EXTERNALVIEW/{resource}
//! /{cluster}/TARGETEXTERNALVIEW/{resource}
//! /{cluster}/IDEALSTATES/{resource}
//! /{cluster}/LIVEINSTANCES/{instance}
//! /{cluster}/INSTANCES/{instance}/CURRENTSTATES/{session}/{resource}
//! /{cluster}/CONFIGS/PARTICIPANT/{instance}
//! /{cluster}/CONFIGS/CLUSTER/{cluster}
//! ```

use crate::PropertyType;

const PARTICIPANT: &str = "PARTICIPANT";
const CLUSTER: &str = "CLUSTER";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PropertyKeys {
    cluster: String,
    root: String,
}

impl PropertyKeys {
    pub fn new(cluster: &str) -> Self {
        Self {
            cluster: cluster.to_owned(),
            root: format!("/{cluster}"),
        }
    }

    /// A cluster name becomes one path segment, so it cannot be empty or contain separators.
    pub fn is_valid_cluster_name(cluster: &str) -> bool {
        !cluster.trim().is_empty()
            && !cluster.contains('/')
            && !cluster.chars().any(char::is_whitespace)
    }

    pub fn cluster(&self) -> &str {
        &self.cluster
    }

    pub fn root(&self) -> &str {
        &self.root
    }

    pub fn property_root(&self, property: PropertyType) -> String {
        format!("{}/{property}", self.root)
    }

    pub fn external_views(&self) -> String {
        self.property_root(PropertyType::ExternalView)
    }

    pub fn external_view(&self, resource: &str) -> String {
        format!("{}/{resource}", self.external_views())
    }

    pub fn target_external_views(&self) -> String {
        self.property_root(PropertyType::TargetExternalView)
    }

    pub fn target_external_view(&self, resource: &str) -> String {
        format!("{}/{resource}", self.target_external_views())
    }

    pub fn ideal_states(&self) -> String {
        self.property_root(PropertyType::IdealStates)
    }

    pub fn ideal_state(&self, resource: &str) -> String {
        format!("{}/{resource}", self.ideal_states())
    }

    pub fn live_instances(&self) -> String {
        self.property_root(PropertyType::LiveInstances)
    }

    pub fn live_instance(&self, instance: &str) -> String {
        format!("{}/{instance}", self.live_instances())
    }

    pub fn instances(&self) -> String {
        self.property_root(PropertyType::Instances)
    }

    pub fn instance(&self, instance: &str) -> String {
        format!("{}/{instance}", self.instances())
    }

    /// Parent of all session directories of an instance.
    pub fn current_states(&self, instance: &str) -> String {
        format!("{}/{}", self.instance(instance), PropertyType::CurrentStates)
    }

    pub fn session_current_states(&self, instance: &str, session: &str) -> String {
        format!("{}/{session}", self.current_states(instance))
    }

    pub fn current_state(&self, instance: &str, session: &str, resource: &str) -> String {
        format!(
            "{}/{resource}",
            self.session_current_states(instance, session)
        )
    }

    pub fn participant_configs(&self) -> String {
        format!("{}/{PARTICIPANT}", self.property_root(PropertyType::Configs))
    }

    pub fn participant_config(&self, instance: &str) -> String {
        format!("{}/{instance}", self.participant_configs())
    }

    pub fn cluster_config(&self) -> String {
        format!(
            "{}/{CLUSTER}/{}",
            self.property_root(PropertyType::Configs),
            self.cluster
        )
    }

    /// Splits `path` into the segments below the cluster root.
    /// Returns `None` for paths outside this cluster.
    pub fn segments<'a>(&self, path: &'a str) -> Option<Vec<&'a str>> {
        let rest = path.strip_prefix(self.root.as_str())?;
        if rest.is_empty() {
            return Some(Vec::new());
        }
        let rest = rest.strip_prefix('/')?;
        Some(rest.split('/').filter(|s| !s.is_empty()).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn should_build_paths_under_cluster_root() {
        let keys = PropertyKeys::new("CLUSTER_TestRouting");
        assert_eq!(keys.external_view("TestDB-1"), "/CLUSTER_TestRouting/EXTERNALVIEW/TestDB-1");
        assert_eq!(
            keys.target_external_view("TestDB-1"),
            "/CLUSTER_TestRouting/TARGETEXTERNALVIEW/TestDB-1"
        );
        assert_eq!(
            keys.current_state("p_1", "s1", "TestDB-1"),
            "/CLUSTER_TestRouting/INSTANCES/p_1/CURRENTSTATES/s1/TestDB-1"
        );
        assert_eq!(
            keys.participant_config("p_1"),
            "/CLUSTER_TestRouting/CONFIGS/PARTICIPANT/p_1"
        );
        assert_eq!(
            keys.cluster_config(),
            "/CLUSTER_TestRouting/CONFIGS/CLUSTER/CLUSTER_TestRouting"
        );
        assert_eq!(keys.live_instance("p_1"), "/CLUSTER_TestRouting/LIVEINSTANCES/p_1");
    }

    #[test]
    fn should_split_segments_only_inside_cluster() {
        let keys = PropertyKeys::new("c1");
        assert_eq!(
            keys.segments("/c1/EXTERNALVIEW/db"),
            Some(vec!["EXTERNALVIEW", "db"])
        );
        assert_eq!(keys.segments("/c1"), Some(vec![]));
        assert_eq!(keys.segments("/c10/EXTERNALVIEW"), None);
        assert_eq!(keys.segments("/c2/EXTERNALVIEW"), None);
    }

    #[test]
    fn should_validate_cluster_names() {
        assert!(PropertyKeys::is_valid_cluster_name("CLUSTER_1"));
        assert!(!PropertyKeys::is_valid_cluster_name(""));
        assert!(!PropertyKeys::is_valid_cluster_name("a/b"));
        assert!(!PropertyKeys::is_valid_cluster_name("a b"));
    }
}
