//! Generic retry-until-terminal-state polling.
//!
//! CloudFormation mutations are asynchronous: the API acknowledges a request
//! and the caller watches the resource until it settles. [`Poller`] is the
//! single retry mechanism in this crate; it waits out in-progress operations
//! and never retries a failure.

use std::future::Future;
use std::time::Duration;

use tracing::{debug, info};

use crate::error::{CfError, Result};

/// What a single observation of the remote resource means.
pub enum PollVerdict<T> {
    /// Operation still running; the status is logged and the probe retried
    /// after the configured interval.
    Pending(String),
    /// Terminal success.
    Done(T),
    /// Terminal failure. Polling stops and the error propagates.
    Failed(CfError),
}

/// Probes a remote resource until it reaches a terminal state.
///
/// There is deliberately no iteration ceiling or overall timeout: slow
/// provider operations (large stack creates, certificate validation) can
/// legitimately run for a very long time, so polling continues until a
/// terminal state or an error. Callers that need a bound must wrap the
/// returned future themselves.
#[derive(Debug, Clone, Copy)]
pub struct Poller {
    interval: Duration,
}

impl Poller {
    pub fn new(interval: Duration) -> Self {
        Self { interval }
    }

    /// Repeatedly invoke `probe`, classifying each observation, until a
    /// terminal verdict is reached.
    ///
    /// `probe` yielding `Ok(None)` means the resource does not exist: with
    /// `not_found_is_success` this resolves to `Ok(None)` (the expected end
    /// of a delete), otherwise it is fatal. Any error from `probe` is fatal
    /// immediately; unexpected failures are never retried.
    pub async fn until_terminal<S, T, P, Fut, C>(
        &self,
        resource: &'static str,
        name: &str,
        mut probe: P,
        mut classify: C,
        not_found_is_success: bool,
    ) -> Result<Option<T>>
    where
        P: FnMut() -> Fut,
        Fut: Future<Output = Result<Option<S>>>,
        C: FnMut(S) -> PollVerdict<T>,
    {
        loop {
            let observed = probe().await?;

            let state = match observed {
                Some(state) => state,
                None if not_found_is_success => {
                    debug!(resource, name, "resource absent, treating as terminal");
                    return Ok(None);
                }
                None => {
                    return Err(CfError::NotFound {
                        resource,
                        name: name.to_string(),
                    })
                }
            };

            match classify(state) {
                PollVerdict::Done(value) => return Ok(Some(value)),
                PollVerdict::Failed(err) => return Err(err),
                PollVerdict::Pending(status) => {
                    info!(resource, name, status = %status, "waiting for terminal status");
                    tokio::time::sleep(self.interval).await;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::VecDeque;
    use std::sync::{Arc, Mutex};

    fn scripted(
        states: Vec<Result<Option<&'static str>>>,
    ) -> (
        Arc<Mutex<VecDeque<Result<Option<&'static str>>>>>,
        Arc<Mutex<usize>>,
    ) {
        (
            Arc::new(Mutex::new(states.into_iter().collect())),
            Arc::new(Mutex::new(0)),
        )
    }

    fn classify(state: &'static str) -> PollVerdict<&'static str> {
        match state {
            "DONE" => PollVerdict::Done(state),
            "BROKEN" => PollVerdict::Failed(CfError::InvalidRequest("broken".into())),
            other => PollVerdict::Pending(other.to_string()),
        }
    }

    #[tokio::test]
    async fn test_resolves_only_on_terminal_status() {
        let (script, probes) = scripted(vec![
            Ok(Some("IN_PROGRESS")),
            Ok(Some("IN_PROGRESS")),
            Ok(Some("DONE")),
        ]);

        let poller = Poller::new(Duration::ZERO);
        let result = poller
            .until_terminal(
                "stack",
                "s",
                || {
                    let script = Arc::clone(&script);
                    let probes = Arc::clone(&probes);
                    async move {
                        *probes.lock().unwrap() += 1;
                        script.lock().unwrap().pop_front().unwrap()
                    }
                },
                classify,
                false,
            )
            .await
            .unwrap();

        assert_eq!(result, Some("DONE"));
        assert_eq!(*probes.lock().unwrap(), 3);
    }

    #[tokio::test]
    async fn test_not_found_is_success_resolves_empty() {
        let (script, probes) = scripted(vec![Ok(Some("IN_PROGRESS")), Ok(None)]);

        let poller = Poller::new(Duration::ZERO);
        let result = poller
            .until_terminal(
                "stack",
                "s",
                || {
                    let script = Arc::clone(&script);
                    let probes = Arc::clone(&probes);
                    async move {
                        *probes.lock().unwrap() += 1;
                        script.lock().unwrap().pop_front().unwrap()
                    }
                },
                classify,
                true,
            )
            .await
            .unwrap();

        assert_eq!(result, None);
        assert_eq!(*probes.lock().unwrap(), 2);
    }

    #[tokio::test]
    async fn test_unexpected_absence_is_fatal() {
        let (script, probes) = scripted(vec![Ok(None)]);

        let poller = Poller::new(Duration::ZERO);
        let err = poller
            .until_terminal(
                "change set",
                "cs",
                || {
                    let script = Arc::clone(&script);
                    let probes = Arc::clone(&probes);
                    async move {
                        *probes.lock().unwrap() += 1;
                        script.lock().unwrap().pop_front().unwrap()
                    }
                },
                classify,
                false,
            )
            .await
            .unwrap_err();

        assert!(matches!(err, CfError::NotFound { resource: "change set", .. }));
    }

    #[tokio::test]
    async fn test_probe_error_terminates_immediately() {
        let (script, probes) = scripted(vec![Err(CfError::Aws {
            context: "DescribeStacks",
            message: "throttled".into(),
        })]);

        let poller = Poller::new(Duration::ZERO);
        let err = poller
            .until_terminal(
                "stack",
                "s",
                || {
                    let script = Arc::clone(&script);
                    let probes = Arc::clone(&probes);
                    async move {
                        *probes.lock().unwrap() += 1;
                        script.lock().unwrap().pop_front().unwrap()
                    }
                },
                classify,
                false,
            )
            .await
            .unwrap_err();

        assert!(matches!(err, CfError::Aws { .. }));
        assert_eq!(*probes.lock().unwrap(), 1);
    }

    #[tokio::test]
    async fn test_failed_verdict_propagates() {
        let (script, _) = scripted(vec![Ok(Some("BROKEN"))]);

        let poller = Poller::new(Duration::ZERO);
        let err = poller
            .until_terminal(
                "stack",
                "s",
                || {
                    let script = Arc::clone(&script);
                    async move { script.lock().unwrap().pop_front().unwrap() }
                },
                classify,
                false,
            )
            .await
            .unwrap_err();

        assert!(matches!(err, CfError::InvalidRequest(_)));
    }
}
