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

use crate::Record;

pub const TARGET_EXTERNAL_VIEW_ENABLED_FIELD: &str = "TARGET_EXTERNALVIEW_ENABLED";

/// Cluster-wide settings the routing table cares about.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ClusterConfig {
    pub cluster: String,
    pub target_external_view_enabled: bool,
}

impl ClusterConfig {
    pub fn new(cluster: impl Into<String>) -> Self {
        Self {
            cluster: cluster.into(),
            target_external_view_enabled: false,
        }
    }

    pub fn from_record(cluster: &str, record: &Record) -> Self {
        Self {
            cluster: cluster.to_owned(),
            target_external_view_enabled: record
                .simple_field(TARGET_EXTERNAL_VIEW_ENABLED_FIELD)
                .is_some_and(|value| value.eq_ignore_ascii_case("true")),
        }
    }

    pub fn to_record(&self) -> Record {
        let mut record = Record::new(&self.cluster);
        record.set_simple_field(
            TARGET_EXTERNAL_VIEW_ENABLED_FIELD,
            self.target_external_view_enabled.to_string(),
        );
        record
    }

    pub fn enable_target_external_view(&mut self, enabled: bool) {
        self.target_external_view_enabled = enabled;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flag_should_default_to_disabled() {
        let config = ClusterConfig::from_record("c", &Record::new("c"));
        assert!(!config.target_external_view_enabled);
    }

    #[test]
    fn flag_should_round_trip_through_record() {
        let mut config = ClusterConfig::new("c");
        config.enable_target_external_view(true);
        assert_eq!(ClusterConfig::from_record("c", &config.to_record()), config);
    }
}
