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
use serde::{Deserialize, Serialize};

pub const HOST_FIELD: &str = "HELIX_HOST";
pub const PORT_FIELD: &str = "HELIX_PORT";
pub const ENABLED_FIELD: &str = "HELIX_ENABLED";
pub const TAG_LIST_FIELD: &str = "TAG_LIST";

/// Participant metadata joined into routing results.
///
/// Ordering and equality cover every field, with `name` first, so sorted
/// lists of configs are ordered by instance name.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct InstanceConfig {
    pub name: String,
    pub host: String,
    pub port: Option<u16>,
    pub tags: Vec<String>,
    pub enabled: bool,
}

impl InstanceConfig {
    pub fn new(name: impl Into<String>, host: impl Into<String>, port: Option<u16>) -> Self {
        Self {
            name: name.into(),
            host: host.into(),
            port,
            tags: Vec::new(),
            enabled: true,
        }
    }

    /// Stand-in for an instance that shows up in an assignment before its
    /// config is visible. Carries the name only and is reported as disabled.
    pub fn sentinel(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            host: String::new(),
            port: None,
            tags: Vec::new(),
            enabled: false,
        }
    }

    /// Reads a config record. Missing host/port fall back to the
    /// `host_port` naming convention; a missing enabled flag means enabled.
    pub fn from_record(name: &str, record: &Record) -> Self {
        let (default_host, default_port) = split_host_port(name);
        let host = record
            .simple_field(HOST_FIELD)
            .map(str::to_owned)
            .unwrap_or(default_host);
        let port = record
            .simple_field(PORT_FIELD)
            .and_then(|port| port.parse().ok())
            .or(default_port);
        let enabled = record
            .simple_field(ENABLED_FIELD)
            .map(|value| !value.eq_ignore_ascii_case("false"))
            .unwrap_or(true);
        let mut tags = record
            .list_field(TAG_LIST_FIELD)
            .map(<[String]>::to_vec)
            .unwrap_or_default();
        tags.sort();
        tags.dedup();
        Self {
            name: name.to_owned(),
            host,
            port,
            tags,
            enabled,
        }
    }

    pub fn to_record(&self) -> Record {
        let mut record = Record::new(&self.name);
        record.set_simple_field(HOST_FIELD, &self.host);
        if let Some(port) = self.port {
            record.set_simple_field(PORT_FIELD, port.to_string());
        }
        record.set_simple_field(ENABLED_FIELD, self.enabled.to_string());
        if !self.tags.is_empty() {
            record.set_list_field(TAG_LIST_FIELD, self.tags.clone());
        }
        record
    }

    pub fn with_tags(mut self, tags: &[&str]) -> Self {
        self.tags = tags.iter().map(|tag| (*tag).to_owned()).collect();
        self.tags.sort();
        self.tags.dedup();
        self
    }

    pub fn with_enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }
}

fn split_host_port(name: &str) -> (String, Option<u16>) {
    match name.rsplit_once('_') {
        Some((host, port)) => match port.parse() {
            Ok(port) => (host.to_owned(), Some(port)),
            Err(_) => (name.to_owned(), None),
        },
        None => (name.to_owned(), None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn should_derive_host_and_port_from_instance_name() {
        let config = InstanceConfig::from_record("participant_12918", &Record::new("participant_12918"));
        assert_eq!(config.host, "participant");
        assert_eq!(config.port, Some(12918));
        assert!(config.enabled);
    }

    #[test]
    fn should_prefer_explicit_fields() {
        let mut record = Record::new("node-a");
        record.set_simple_field(HOST_FIELD, "10.0.0.1");
        record.set_simple_field(PORT_FIELD, "9000");
        record.set_simple_field(ENABLED_FIELD, "false");
        record.set_list_field(TAG_LIST_FIELD, vec!["b".to_owned(), "a".to_owned(), "a".to_owned()]);

        let config = InstanceConfig::from_record("node-a", &record);
        assert_eq!(config.host, "10.0.0.1");
        assert_eq!(config.port, Some(9000));
        assert!(!config.enabled);
        assert_eq!(config.tags, vec!["a", "b"]);
    }

    #[test]
    fn should_survive_record_round_trip() {
        let config = InstanceConfig::new("localhost_12000", "localhost", Some(12000))
            .with_tags(&["ssd"])
            .with_enabled(false);
        let restored = InstanceConfig::from_record(&config.name, &config.to_record());
        assert_eq!(restored, config);
    }

    #[test]
    fn sentinel_should_be_disabled() {
        let sentinel = InstanceConfig::sentinel("ghost");
        assert_eq!(sentinel.name, "ghost");
        assert!(!sentinel.enabled);
    }

    #[test]
    fn should_order_by_name_first() {
        let mut configs = vec![
            InstanceConfig::new("p_2", "z", Some(1)),
            InstanceConfig::new("p_10", "a", Some(9)),
            InstanceConfig::new("p_1", "m", Some(5)),
        ];
        configs.sort();
        let names: Vec<_> = configs.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, vec!["p_1", "p_10", "p_2"]);
    }
}
