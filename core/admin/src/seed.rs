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

use crate::error::AdminError;
use spectator_common::{InMemoryStore, Record};
use std::collections::BTreeMap;
use tracing::info;

/// Loads a JSON object mapping store paths to records into `store`.
pub fn load(store: &InMemoryStore, path: &str) -> Result<usize, AdminError> {
    let content = std::fs::read_to_string(path)?;
    let records: BTreeMap<String, Record> =
        serde_json::from_str(&content).map_err(|error| AdminError::Seed {
            path: path.to_owned(),
            reason: error.to_string(),
        })?;
    if let Some(invalid) = records.keys().find(|node| !node.starts_with('/')) {
        return Err(AdminError::Seed {
            path: path.to_owned(),
            reason: format!("store path '{invalid}' is not absolute"),
        });
    }
    let count = records.len();
    store.seed(records)?;
    info!("Seeded {count} nodes from {path}");
    Ok(count)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn seed_file(content: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(content.as_bytes()).unwrap();
        file
    }

    #[test]
    fn should_seed_records() {
        let file = seed_file(
            r#"{
                "/CLUSTER_Seed/LIVEINSTANCES/node_1": {
                    "id": "node_1",
                    "simpleFields": { "SESSION_ID": "s-1" }
                },
                "/CLUSTER_Seed/IDEALSTATES/db": { "id": "db" }
            }"#,
        );
        let store = InMemoryStore::new();

        let count = load(&store, file.path().to_str().unwrap()).unwrap();

        assert_eq!(count, 2);
        let live = store
            .read_record("/CLUSTER_Seed/LIVEINSTANCES/node_1")
            .unwrap()
            .unwrap();
        assert_eq!(live.record.simple_field("SESSION_ID"), Some("s-1"));
        assert_eq!(store.children_of("/CLUSTER_Seed/IDEALSTATES"), vec!["db"]);
    }

    #[test]
    fn should_reject_relative_paths() {
        let file = seed_file(r#"{ "CLUSTER_Seed/IDEALSTATES/db": { "id": "db" } }"#);
        let error = load(&InMemoryStore::new(), file.path().to_str().unwrap())
            .err()
            .unwrap();
        assert!(matches!(error, AdminError::Seed { .. }));
    }

    #[test]
    fn should_reject_invalid_json() {
        let file = seed_file("not json");
        let error = load(&InMemoryStore::new(), file.path().to_str().unwrap())
            .err()
            .unwrap();
        assert!(matches!(error, AdminError::Seed { .. }));
    }
}
