//! Run report: per-step outcomes plus rendering for operators and machines.

use serde::Serialize;

use crate::rpc::Response;

/// Outcome of one step.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum StepOutcome {
    /// The step's checks held.
    Passed {
        /// Extracted fields worth showing (tool count, echoed text, ...)
        details: Vec<String>,
    },
    /// The step failed.
    Failed {
        /// One-line reason
        reason: String,
        /// Extra diagnostic lines
        details: Vec<String>,
    },
}

impl StepOutcome {
    /// Passed with the given details.
    pub fn passed(details: Vec<String>) -> Self {
        Self::Passed { details }
    }

    /// Failed with a reason and no details.
    pub fn failed(reason: impl Into<String>) -> Self {
        Self::Failed {
            reason: reason.into(),
            details: Vec::new(),
        }
    }

    /// Failed because `response` carried an error. The envelope is kept as a
    /// detail line for diagnostics.
    pub fn from_error_response(response: &Response) -> Self {
        Self::Failed {
            reason: response
                .error_message()
                .unwrap_or_else(|| "unexpected success".to_string()),
            details: vec![format!("response: {}", response.to_envelope())],
        }
    }

    /// Whether the step passed.
    pub fn is_passed(&self) -> bool {
        matches!(self, Self::Passed { .. })
    }

    /// Detail lines of either variant.
    pub fn details(&self) -> &[String] {
        match self {
            Self::Passed { details } | Self::Failed { details, .. } => details,
        }
    }
}

/// Record of one executed step.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StepReport {
    /// Step name
    pub name: String,
    /// What happened
    #[serde(flatten)]
    pub outcome: StepOutcome,
    /// Wall-clock duration
    pub elapsed_ms: u64,
}

impl StepReport {
    /// One-line indicator plus indented detail lines.
    pub fn render(&self) -> String {
        let mut out = match &self.outcome {
            StepOutcome::Passed { .. } => format!("✓ {} ({}ms)", self.name, self.elapsed_ms),
            StepOutcome::Failed { reason, .. } => {
                format!("✗ {} ({}ms): {reason}", self.name, self.elapsed_ms)
            }
        };
        for line in self.outcome.details() {
            out.push_str("\n    ");
            out.push_str(line);
        }
        out
    }
}

/// Aggregate result of a harness run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RunReport {
    /// Server program that was launched
    pub server: String,
    /// Set when the server could not be started; no step ran
    #[serde(skip_serializing_if = "Option::is_none")]
    pub startup_error: Option<String>,
    /// Executed steps, in order
    pub steps: Vec<StepReport>,
    /// Steps not run because an earlier one failed
    pub skipped: Vec<String>,
    /// Server exit status after teardown
    #[serde(skip_serializing_if = "Option::is_none")]
    pub exit_status: Option<String>,
    /// Tail of the server's stderr, attached when the run failed
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub server_stderr: Vec<String>,
}

impl RunReport {
    /// Report for a run that never got past startup.
    pub fn startup_failed(server: impl Into<String>, error: impl Into<String>) -> Self {
        Self {
            server: server.into(),
            startup_error: Some(error.into()),
            ..Default::default()
        }
    }

    /// Overall verdict: started, and every executed step passed.
    pub fn passed(&self) -> bool {
        self.startup_error.is_none()
            && self.skipped.is_empty()
            && self.steps.iter().all(|s| s.outcome.is_passed())
    }

    /// Number of passed steps.
    pub fn passed_count(&self) -> usize {
        self.steps.iter().filter(|s| s.outcome.is_passed()).count()
    }

    /// Closing summary block (the per-step lines are printed as steps finish).
    pub fn render_summary(&self) -> String {
        let mut out = String::new();
        if let Some(err) = &self.startup_error {
            out.push_str(&format!("✗ startup: {err}\n"));
        }
        for name in &self.skipped {
            out.push_str(&format!("- {name} (skipped)\n"));
        }
        if !self.server_stderr.is_empty() {
            out.push_str("server stderr (tail):\n");
            for line in &self.server_stderr {
                out.push_str(&format!("    {line}\n"));
            }
        }
        let verdict = if self.passed() { "PASS" } else { "FAIL" };
        out.push_str(&format!(
            "{verdict}: {}/{} steps passed",
            self.passed_count(),
            self.steps.len() + self.skipped.len()
        ));
        if let Some(status) = &self.exit_status {
            out.push_str(&format!(" (server {status})"));
        }
        out
    }

    /// Full text rendering: every step line, then the summary.
    pub fn render_text(&self) -> String {
        let mut out = String::new();
        for step in &self.steps {
            out.push_str(&step.render());
            out.push('\n');
        }
        out.push_str(&self.render_summary());
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rpc::TransportError;

    fn step(name: &str, outcome: StepOutcome) -> StepReport {
        StepReport {
            name: name.to_string(),
            outcome,
            elapsed_ms: 1,
        }
    }

    #[test]
    fn verdict_requires_all_steps() {
        let mut report = RunReport {
            server: "srv".to_string(),
            steps: vec![step("a", StepOutcome::passed(vec![]))],
            ..Default::default()
        };
        assert!(report.passed());

        report.skipped.push("b".to_string());
        assert!(!report.passed());

        report.skipped.clear();
        report.steps.push(step("c", StepOutcome::failed("nope")));
        assert!(!report.passed());
    }

    #[test]
    fn startup_failure_is_never_a_pass() {
        let report = RunReport::startup_failed("srv", "no such file");
        assert!(!report.passed());
        assert!(report.render_summary().starts_with("✗ startup: no such file"));
    }

    #[test]
    fn step_render_includes_details() {
        let rendered = step(
            "tools/list",
            StepOutcome::passed(vec!["3 tools".to_string()]),
        )
        .render();
        assert_eq!(rendered, "✓ tools/list (1ms)\n    3 tools");
    }

    #[test]
    fn error_response_keeps_envelope() {
        let outcome =
            StepOutcome::from_error_response(&Response::TransportError(TransportError::NotRunning));
        match outcome {
            StepOutcome::Failed { reason, details } => {
                assert_eq!(reason, "server process is not running");
                assert!(details[0].contains(r#""error":"server process is not running""#));
            }
            other => panic!("expected failure, got {other:?}"),
        }
    }

    #[test]
    fn json_shape_is_flat_per_step() {
        let report = RunReport {
            server: "srv".to_string(),
            steps: vec![step("ping", StepOutcome::failed("timeout"))],
            ..Default::default()
        };
        let value = serde_json::to_value(&report).unwrap();
        assert_eq!(value["steps"][0]["name"], "ping");
        assert_eq!(value["steps"][0]["status"], "failed");
        assert_eq!(value["steps"][0]["reason"], "timeout");
        assert!(value.get("startup_error").is_none());
    }
}
