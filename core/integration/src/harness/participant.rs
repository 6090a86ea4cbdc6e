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

use spectator_common::{InMemoryStore, InstanceConfig, LiveInstance, PropertyKeys, StoreError};
use tracing::info;

/// A participant process: registers itself, goes live under a fresh session
/// and reports the current states the controller hands it.
#[derive(Debug, Clone)]
pub struct MockParticipant {
    name: String,
    port: u16,
    session: Option<String>,
    sessions_started: u32,
}

impl MockParticipant {
    pub fn new(port: u16) -> Self {
        Self {
            name: format!("participant_{port}"),
            port,
            session: None,
            sessions_started: 0,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn session(&self) -> Option<&str> {
        self.session.as_deref()
    }

    pub fn is_live(&self) -> bool {
        self.session.is_some()
    }

    pub fn config(&self) -> InstanceConfig {
        InstanceConfig::new(&self.name, "localhost", Some(self.port))
    }

    /// Writes the participant's config and instance node.
    pub fn register(&self, store: &InMemoryStore, keys: &PropertyKeys) -> Result<(), StoreError> {
        store.set(&keys.participant_config(&self.name), &self.config().to_record())?;
        store.ensure_path(&keys.current_states(&self.name));
        Ok(())
    }

    /// Connects under a new session and publishes the liveness marker.
    pub fn start(&mut self, store: &InMemoryStore, keys: &PropertyKeys) -> Result<(), StoreError> {
        self.sessions_started += 1;
        let session = format!("{}-session-{}", self.name, self.sessions_started);
        store.ensure_path(&keys.session_current_states(&self.name, &session));
        store.set(
            &keys.live_instance(&self.name),
            &LiveInstance::new(&self.name, &session).to_record(),
        )?;
        info!("Participant {} is live with session {session}", self.name);
        self.session = Some(session);
        Ok(())
    }

    /// Drops the liveness marker. Current states of the old session stay behind.
    pub fn stop(&mut self, store: &InMemoryStore, keys: &PropertyKeys) -> Result<(), StoreError> {
        match store.delete(&keys.live_instance(&self.name)) {
            Ok(()) | Err(StoreError::NoNode(_)) => {}
            Err(error) => return Err(error),
        }
        info!("Participant {} stopped", self.name);
        self.session = None;
        Ok(())
    }
}
