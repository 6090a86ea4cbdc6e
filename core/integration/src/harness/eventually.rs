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

use super::HarnessError;
use std::time::Duration;
use tokio::time::{Instant, interval};

pub const DEFAULT_POLL_TICK: Duration = Duration::from_millis(20);

/// Calls `probe` once per `tick` until it yields a value. `Ok(None)` and
/// retryable errors (see [`HarnessError::is_retryable`]) keep polling; any
/// other error is returned as is. Fails with `Timeout` once `timeout` has
/// elapsed.
pub async fn eventually<F, Fut, T>(
    timeout: Duration,
    tick: Duration,
    mut probe: F,
) -> Result<T, HarnessError>
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = Result<Option<T>, HarnessError>>,
{
    let deadline = Instant::now() + timeout;
    let mut ticker = interval(tick);
    loop {
        ticker.tick().await;
        match probe().await {
            Ok(Some(value)) => return Ok(value),
            Ok(None) => {}
            Err(error) if error.is_retryable() => {}
            Err(error) => return Err(error),
        }
        if Instant::now() >= deadline {
            return Err(HarnessError::Timeout {
                context: "eventually: condition not met within timeout".into(),
            });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use spectator_common::StoreError;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[tokio::test]
    async fn should_retry_until_probe_succeeds() {
        let calls = AtomicU32::new(0);
        let calls = &calls;
        let value = eventually(Duration::from_secs(5), Duration::from_millis(1), move || async move {
            match calls.fetch_add(1, Ordering::SeqCst) {
                0 => Err(HarnessError::Store(StoreError::ConnectionLoss)),
                1 => Ok(None),
                attempt => Ok(Some(attempt)),
            }
        })
        .await
        .unwrap();
        assert_eq!(value, 2);
    }

    #[tokio::test]
    async fn should_propagate_permanent_errors() {
        let error = eventually(Duration::from_secs(5), Duration::from_millis(1), || async {
            Err::<Option<()>, _>(HarnessError::UnknownParticipant("p".to_owned()))
        })
        .await
        .unwrap_err();
        assert!(matches!(error, HarnessError::UnknownParticipant(_)));
    }

    #[tokio::test]
    async fn should_time_out() {
        let error = eventually(Duration::from_millis(20), Duration::from_millis(5), || async {
            Ok::<Option<()>, HarnessError>(None)
        })
        .await
        .unwrap_err();
        assert!(matches!(error, HarnessError::Timeout { .. }));
    }
}
