//! Ordered test-step sequencer.
//!
//! A [`Sequencer`] runs its [`Step`]s in order against one shared
//! [`McpClient`]. Under [`FailurePolicy::StopOnFirstFailure`] the first
//! failing step ends the run and the remaining steps are reported as
//! skipped. A step that returns `Err` or panics is an unexpected fault; it is
//! recorded as a failed step and never escapes the sequencer.
//!
//! [`run_session`] wraps a run with unconditional teardown of the session.

use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::time::Instant;

use async_trait::async_trait;
use futures::FutureExt;
use serde::{Deserialize, Serialize};

use crate::protocol::McpClient;
use crate::report::{RunReport, StepOutcome, StepReport};

/// One named unit of the run order.
#[async_trait]
pub trait Step: Send + Sync {
    /// Display name.
    fn name(&self) -> &str;

    /// Exercise the server through `client` and judge the result.
    ///
    /// Expected failures (error responses, wrong shapes) are returned as
    /// [`StepOutcome::Failed`]. `Err` is reserved for faults in the step itself.
    async fn run(&self, client: &mut McpClient) -> anyhow::Result<StepOutcome>;
}

/// What to do after a step fails.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FailurePolicy {
    /// Skip every remaining step.
    #[default]
    StopOnFirstFailure,
    /// Keep running; the verdict is still a failure.
    ContinueOnFailure,
}

type Observer = Box<dyn FnMut(&StepReport) + Send>;

/// Fixed, ordered list of steps plus a failure policy.
pub struct Sequencer {
    steps: Vec<Box<dyn Step>>,
    policy: FailurePolicy,
    observer: Option<Observer>,
}

impl std::fmt::Debug for Sequencer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Sequencer")
            .field("steps", &self.step_names())
            .field("policy", &self.policy)
            .finish()
    }
}

impl Sequencer {
    /// Sequencer over `steps` that stops on the first failure.
    pub fn new(steps: Vec<Box<dyn Step>>) -> Self {
        Self {
            steps,
            policy: FailurePolicy::default(),
            observer: None,
        }
    }

    /// Set the failure policy.
    pub fn with_policy(mut self, policy: FailurePolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Call `observer` as soon as each step finishes, e.g. for live output.
    pub fn with_observer(mut self, observer: impl FnMut(&StepReport) + Send + 'static) -> Self {
        self.observer = Some(Box::new(observer));
        self
    }

    /// Names of the steps, in run order.
    pub fn step_names(&self) -> Vec<&str> {
        self.steps.iter().map(|s| s.name()).collect()
    }

    /// The failure policy.
    pub fn policy(&self) -> FailurePolicy {
        self.policy
    }

    /// Run every step in order against `client`.
    pub async fn run(&mut self, client: &mut McpClient) -> RunReport {
        let mut report = RunReport::default();
        let mut remaining = self.steps.iter();

        while let Some(step) = remaining.next() {
            let started = Instant::now();
            let outcome = match AssertUnwindSafe(step.run(client)).catch_unwind().await {
                Ok(Ok(outcome)) => outcome,
                Ok(Err(e)) => {
                    tracing::error!(step = step.name(), "step faulted: {e:#}");
                    StepOutcome::failed(format!("unexpected fault: {e:#}"))
                }
                Err(payload) => {
                    let message = panic_message(payload.as_ref());
                    tracing::error!(step = step.name(), "step panicked: {message}");
                    StepOutcome::failed(format!("step panicked: {message}"))
                }
            };
            let step_report = StepReport {
                name: step.name().to_string(),
                outcome,
                elapsed_ms: started.elapsed().as_millis() as u64,
            };
            tracing::info!(
                step = %step_report.name,
                passed = step_report.outcome.is_passed(),
                elapsed_ms = step_report.elapsed_ms,
                "step finished"
            );
            if let Some(observer) = self.observer.as_mut() {
                observer(&step_report);
            }

            let failed = !step_report.outcome.is_passed();
            report.steps.push(step_report);

            if failed && self.policy == FailurePolicy::StopOnFirstFailure {
                report.skipped = remaining.by_ref().map(|s| s.name().to_string()).collect();
                break;
            }
        }

        report
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s
    } else {
        "non-string panic payload"
    }
}

/// Run `sequencer` against `client`, then shut the session down.
///
/// Teardown runs whatever the steps did; its exit status is recorded in the
/// report. The session is consumed so it cannot be used after teardown.
pub async fn run_session(mut client: McpClient, sequencer: &mut Sequencer) -> RunReport {
    let mut report = sequencer.run(&mut client).await;

    match client.shutdown().await {
        Ok(Some(status)) => report.exit_status = Some(status.to_string()),
        Ok(None) => {}
        Err(e) => {
            tracing::warn!("server teardown failed: {e}");
            report.exit_status = Some(format!("teardown failed: {e}"));
        }
    }

    report
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rpc::RpcClient;
    use crate::transport::{MockTransport, MockTransportHandle};
    use std::sync::{Arc, Mutex};

    type Canned = fn() -> anyhow::Result<StepOutcome>;

    struct Fixed {
        name: &'static str,
        result: Canned,
    }

    #[async_trait]
    impl Step for Fixed {
        fn name(&self) -> &str {
            self.name
        }

        async fn run(&self, _client: &mut McpClient) -> anyhow::Result<StepOutcome> {
            (self.result)()
        }
    }

    fn pass() -> anyhow::Result<StepOutcome> {
        Ok(StepOutcome::passed(vec![]))
    }

    fn fail() -> anyhow::Result<StepOutcome> {
        Ok(StepOutcome::failed("checked and failed"))
    }

    fn fault() -> anyhow::Result<StepOutcome> {
        anyhow::bail!("step blew up")
    }

    fn explode() -> anyhow::Result<StepOutcome> {
        panic!("index out of range in step")
    }

    fn fixed(name: &'static str, result: Canned) -> Box<dyn Step> {
        Box::new(Fixed { name, result })
    }

    fn session() -> (McpClient, MockTransportHandle) {
        let (transport, handle) = MockTransport::new_with_handle();
        (McpClient::new(RpcClient::new(Box::new(transport))), handle)
    }

    #[tokio::test]
    async fn all_pass() {
        let (mut client, _handle) = session();
        let mut seq = Sequencer::new(vec![fixed("a", pass), fixed("b", pass)]);
        let report = seq.run(&mut client).await;
        assert!(report.passed());
        assert_eq!(report.steps.len(), 2);
        assert!(report.skipped.is_empty());
    }

    #[tokio::test]
    async fn stops_on_first_failure() {
        let (mut client, _handle) = session();
        let mut seq = Sequencer::new(vec![
            fixed("a", pass),
            fixed("b", fail),
            fixed("c", pass),
            fixed("d", pass),
        ]);
        let report = seq.run(&mut client).await;
        assert!(!report.passed());
        assert_eq!(report.steps.len(), 2);
        assert_eq!(report.skipped, vec!["c", "d"]);
    }

    #[tokio::test]
    async fn continue_policy_runs_everything() {
        let (mut client, _handle) = session();
        let mut seq = Sequencer::new(vec![fixed("a", fail), fixed("b", pass)])
            .with_policy(FailurePolicy::ContinueOnFailure);
        let report = seq.run(&mut client).await;
        assert!(!report.passed());
        assert_eq!(report.steps.len(), 2);
        assert!(report.steps[1].outcome.is_passed());
    }

    #[tokio::test]
    async fn fault_becomes_failed_step() {
        let (mut client, _handle) = session();
        let mut seq = Sequencer::new(vec![fixed("boom", fault), fixed("after", pass)]);
        let report = seq.run(&mut client).await;
        match &report.steps[0].outcome {
            StepOutcome::Failed { reason, .. } => assert!(reason.contains("step blew up")),
            other => panic!("expected failure, got {other:?}"),
        }
        assert_eq!(report.skipped, vec!["after"]);
    }

    #[tokio::test]
    async fn observer_sees_each_step() {
        let (mut client, _handle) = session();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        let mut seq = Sequencer::new(vec![fixed("a", pass), fixed("b", pass)])
            .with_observer(move |r| sink.lock().unwrap().push(r.name.clone()));
        seq.run(&mut client).await;
        assert_eq!(*seen.lock().unwrap(), vec!["a", "b"]);
    }

    #[tokio::test]
    async fn run_session_always_tears_down() {
        let (client, handle) = session();
        let mut seq = Sequencer::new(vec![fixed("boom", fault)]);
        let report = run_session(client, &mut seq).await;
        assert!(!report.passed());
        assert_eq!(handle.shutdown_count(), 1);
    }

    #[tokio::test]
    async fn panicking_step_is_failed_and_session_still_torn_down() {
        let (client, handle) = session();
        let mut seq = Sequencer::new(vec![fixed("a", pass), fixed("panics", explode), fixed("c", pass)]);
        let report = run_session(client, &mut seq).await;

        assert_eq!(report.steps.len(), 2);
        match &report.steps[1].outcome {
            StepOutcome::Failed { reason, .. } => {
                assert_eq!(reason, "step panicked: index out of range in step");
            }
            other => panic!("expected failure, got {other:?}"),
        }
        assert_eq!(report.skipped, vec!["c"]);
        assert_eq!(handle.shutdown_count(), 1);
    }
}
