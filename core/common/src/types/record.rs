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

use crate::StoreError;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Generic payload of a coordination store node.
///
/// Every property (external view, current state, instance config, ...) is a
/// record with three field families. Keys are kept in `BTreeMap`s so the JSON
/// encoding is stable and two records with the same content compare equal.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Record {
    pub id: String,
    #[serde(default)]
    pub simple_fields: BTreeMap<String, String>,
    #[serde(default)]
    pub list_fields: BTreeMap<String, Vec<String>>,
    #[serde(default)]
    pub map_fields: BTreeMap<String, BTreeMap<String, String>>,
}

impl Record {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            ..Default::default()
        }
    }

    pub fn simple_field(&self, key: &str) -> Option<&str> {
        self.simple_fields.get(key).map(String::as_str)
    }

    pub fn set_simple_field(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.simple_fields.insert(key.into(), value.into());
    }

    pub fn list_field(&self, key: &str) -> Option<&[String]> {
        self.list_fields.get(key).map(Vec::as_slice)
    }

    pub fn set_list_field(&mut self, key: impl Into<String>, value: Vec<String>) {
        self.list_fields.insert(key.into(), value);
    }

    pub fn map_field(&self, key: &str) -> Option<&BTreeMap<String, String>> {
        self.map_fields.get(key)
    }

    pub fn set_map_field(&mut self, key: impl Into<String>, value: BTreeMap<String, String>) {
        self.map_fields.insert(key.into(), value);
    }

    /// Sets a single entry inside a map field, creating the map when missing.
    pub fn set_map_entry(
        &mut self,
        key: impl Into<String>,
        inner_key: impl Into<String>,
        value: impl Into<String>,
    ) {
        self.map_fields
            .entry(key.into())
            .or_default()
            .insert(inner_key.into(), value.into());
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>, StoreError> {
        Ok(serde_json::to_vec(self)?)
    }

    /// Decodes a node payload. `path` only feeds the error message.
    pub fn from_bytes(path: &str, bytes: &[u8]) -> Result<Self, StoreError> {
        serde_json::from_slice(bytes).map_err(|error| StoreError::Malformed {
            path: path.to_owned(),
            reason: error.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn should_use_camel_case_field_families() {
        let mut record = Record::new("TestDB-1");
        record.set_simple_field("REPLICAS", "3");
        record.set_map_entry("TestDB-1_0", "participant_12918", "MASTER");

        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(json["id"], "TestDB-1");
        assert_eq!(json["simpleFields"]["REPLICAS"], "3");
        assert_eq!(json["mapFields"]["TestDB-1_0"]["participant_12918"], "MASTER");
        assert!(json["listFields"].as_object().unwrap().is_empty());
    }

    #[test]
    fn should_accept_records_with_missing_field_families() {
        let record = Record::from_bytes("/c/EXTERNALVIEW/db", br#"{"id":"db"}"#).unwrap();
        assert_eq!(record, Record::new("db"));
    }

    #[test]
    fn should_report_malformed_payload_with_path() {
        let error = Record::from_bytes("/c/EXTERNALVIEW/db", b"{not json").unwrap_err();
        match error {
            StoreError::Malformed { path, .. } => assert_eq!(path, "/c/EXTERNALVIEW/db"),
            other => panic!("unexpected error: {other}"),
        }
    }
}
