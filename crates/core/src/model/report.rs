use serde::Serialize;
use serde_json::Value;
use std::time::Duration;

/// Result class of a single test vector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Verdict {
    Pass,
    Mismatch,
    Error,
    Timeout,
    Unparseable,
    /// Task has no automated vectors; a human has to look at it.
    ManualReview,
}

impl Verdict {
    #[must_use]
    pub fn is_pass(self) -> bool {
        matches!(self, Verdict::Pass | Verdict::ManualReview)
    }
}

/// Outcome of running one test vector against a submission.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TestOutcome {
    pub expression: String,
    pub verdict: Verdict,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub actual: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expected: Option<Value>,
    pub message: String,
}

impl TestOutcome {
    #[must_use]
    pub fn pass(expression: impl Into<String>, actual: Value, expected: Value) -> Self {
        Self {
            expression: expression.into(),
            verdict: Verdict::Pass,
            message: String::new(),
            actual: Some(actual),
            expected: Some(expected),
        }
    }

    #[must_use]
    pub fn mismatch(expression: impl Into<String>, actual: Value, expected: Value) -> Self {
        Self {
            expression: expression.into(),
            verdict: Verdict::Mismatch,
            message: format!("expected {expected}, got {actual}"),
            actual: Some(actual),
            expected: Some(expected),
        }
    }

    #[must_use]
    pub fn error(expression: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            expression: expression.into(),
            verdict: Verdict::Error,
            actual: None,
            expected: None,
            message: message.into(),
        }
    }

    #[must_use]
    pub fn timeout(expression: impl Into<String>, limit: Duration) -> Self {
        Self {
            expression: expression.into(),
            verdict: Verdict::Timeout,
            actual: None,
            expected: None,
            message: format!("time limit of {:.1}s exceeded", limit.as_secs_f64()),
        }
    }

    #[must_use]
    pub fn unparseable(expression: impl Into<String>, detail: impl Into<String>) -> Self {
        Self {
            expression: expression.into(),
            verdict: Verdict::Unparseable,
            actual: None,
            expected: None,
            message: detail.into(),
        }
    }

    #[must_use]
    pub fn manual_review() -> Self {
        Self {
            expression: String::new(),
            verdict: Verdict::ManualReview,
            actual: None,
            expected: None,
            message: "no automated tests, manual review required".to_owned(),
        }
    }

    /// Human-readable line used in submission results and advisor prompts.
    #[must_use]
    pub fn summary_line(&self) -> String {
        let actual = self.actual.as_ref().map(Value::to_string).unwrap_or_default();
        match self.verdict {
            Verdict::Pass => format!("✓ {} → {actual}", self.expression),
            Verdict::Mismatch => format!("✗ {} → {}", self.expression, self.message),
            Verdict::Error => format!("✗ {} → error: {}", self.expression, self.message),
            Verdict::Timeout => format!("✗ {} → {}", self.expression, self.message),
            Verdict::Unparseable => {
                if self.message.is_empty() {
                    format!("✗ {} → no result produced", self.expression)
                } else {
                    format!("✗ {} → no result produced: {}", self.expression, self.message)
                }
            }
            Verdict::ManualReview => format!("• {}", self.message),
        }
    }
}

/// Aggregated grading result for one submission, in test-vector order.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GradingReport {
    pub success: bool,
    pub outcomes: Vec<TestOutcome>,
}

impl GradingReport {
    /// `success` is the AND over all outcomes (true for an empty list).
    #[must_use]
    pub fn from_outcomes(outcomes: Vec<TestOutcome>) -> Self {
        let success = outcomes.iter().all(|o| o.verdict.is_pass());
        Self { success, outcomes }
    }

    /// Report for a task that carries no test vectors.
    #[must_use]
    pub fn manual_review() -> Self {
        Self {
            success: true,
            outcomes: vec![TestOutcome::manual_review()],
        }
    }

    #[must_use]
    pub fn passed(&self) -> usize {
        self.outcomes
            .iter()
            .filter(|o| o.verdict == Verdict::Pass)
            .count()
    }

    #[must_use]
    pub fn lines(&self) -> Vec<String> {
        self.outcomes.iter().map(TestOutcome::summary_line).collect()
    }
}
