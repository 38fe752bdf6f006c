//! Grading sandbox: runs a submission against a task's test vectors, one fresh
//! interpreter process per vector, strictly in order.

mod harness;

use std::env;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::{Duration, Instant};

use interview_core::model::{GradingReport, Task, TestOutcome, TestVector};
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::Command;

use crate::error::SandboxError;
use harness::{Harness, HarnessOutput, ResourceCaps, values_match};

const DEFAULT_INTERPRETER: &str = "python3";
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(3);
const DEFAULT_MEMORY_LIMIT: u64 = 256 * 1024 * 1024;
/// Only the tail of each stream is kept; the result marker is printed last.
const MAX_CAPTURED_OUTPUT: usize = 64 * 1024;
/// Upper bound for the final line, which carries the result marker.
const MAX_LINE_BYTES: usize = 4 * 1024 * 1024;
const SCRIPT_NAME: &str = "submission.py";

#[derive(Debug, Clone)]
pub struct SandboxConfig {
    pub interpreter: PathBuf,
    pub timeout: Duration,
    pub memory_limit_bytes: Option<u64>,
    pub cpu_limit_secs: Option<u64>,
}

impl Default for SandboxConfig {
    fn default() -> Self {
        Self {
            interpreter: PathBuf::from(DEFAULT_INTERPRETER),
            timeout: DEFAULT_TIMEOUT,
            memory_limit_bytes: Some(DEFAULT_MEMORY_LIMIT),
            cpu_limit_secs: Some(cpu_budget(DEFAULT_TIMEOUT)),
        }
    }
}

impl SandboxConfig {
    /// Defaults overridden by `INTERVIEW_SANDBOX_*` variables.
    #[must_use]
    pub fn from_env() -> Self {
        let mut config = Self::default();
        if let Ok(python) = env::var("INTERVIEW_SANDBOX_PYTHON") {
            if !python.trim().is_empty() {
                config.interpreter = PathBuf::from(python);
            }
        }
        if let Some(secs) = env::var("INTERVIEW_SANDBOX_TIMEOUT_SECS")
            .ok()
            .and_then(|value| value.parse::<f64>().ok())
            .filter(|secs| secs.is_finite() && *secs > 0.0)
        {
            config = config.with_timeout(Duration::from_secs_f64(secs));
        }
        if let Some(mb) = env::var("INTERVIEW_SANDBOX_MEMORY_MB")
            .ok()
            .and_then(|value| value.parse::<u64>().ok())
        {
            config.memory_limit_bytes = (mb > 0).then(|| mb * 1024 * 1024);
        }
        config
    }

    /// Change the wall-clock limit; the CPU cap follows it.
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        if self.cpu_limit_secs.is_some() {
            self.cpu_limit_secs = Some(cpu_budget(timeout));
        }
        self
    }

    fn caps(&self) -> ResourceCaps {
        ResourceCaps {
            memory_bytes: self.memory_limit_bytes,
            cpu_secs: self.cpu_limit_secs,
        }
    }
}

fn cpu_budget(timeout: Duration) -> u64 {
    timeout.as_secs() + u64::from(timeout.subsec_nanos() > 0)
}

enum RunOutcome {
    Finished { stdout: String, stderr: String },
    TimedOut,
}

#[derive(Debug, Clone, Default)]
pub struct GradingSandbox {
    config: SandboxConfig,
}

impl GradingSandbox {
    #[must_use]
    pub fn new(config: SandboxConfig) -> Self {
        Self { config }
    }

    #[must_use]
    pub fn config(&self) -> &SandboxConfig {
        &self.config
    }

    /// Grade `source` against every test vector of `task`, in order.
    ///
    /// # Errors
    ///
    /// Returns `SandboxError` only when the sandbox itself cannot run (workspace
    /// or interpreter failures). Candidate failures are recorded as verdicts.
    pub async fn grade(&self, source: &str, task: &Task) -> Result<GradingReport, SandboxError> {
        if task.tests().is_empty() {
            tracing::info!(task = %task.id(), "no test vectors, manual review");
            return Ok(GradingReport::manual_review());
        }

        let mut outcomes = Vec::with_capacity(task.tests().len());
        for vector in task.tests() {
            let outcome = self.run_vector(source, vector).await?;
            tracing::debug!(
                task = %task.id(),
                expression = %vector.expression,
                verdict = ?outcome.verdict,
                "test vector graded"
            );
            outcomes.push(outcome);
        }

        let report = GradingReport::from_outcomes(outcomes);
        tracing::info!(
            task = %task.id(),
            success = report.success,
            passed = report.passed(),
            total = report.outcomes.len(),
            "submission graded"
        );
        Ok(report)
    }

    async fn run_vector(
        &self,
        source: &str,
        vector: &TestVector,
    ) -> Result<TestOutcome, SandboxError> {
        let workspace = tempfile::Builder::new()
            .prefix("grading-")
            .tempdir()
            .map_err(SandboxError::Workspace)?;
        let harness = Harness::new();
        let script = workspace.path().join(SCRIPT_NAME);
        tokio::fs::write(
            &script,
            harness.program(source, &vector.expression, self.config.caps()),
        )
        .await
        .map_err(SandboxError::Workspace)?;

        let outcome = match self.execute(workspace.path(), &script).await? {
            RunOutcome::TimedOut => TestOutcome::timeout(&vector.expression, self.config.timeout),
            RunOutcome::Finished { stdout, stderr } => match harness.parse(&stdout) {
                HarnessOutput::Value(actual) => {
                    if values_match(&actual, &vector.expected) {
                        TestOutcome::pass(&vector.expression, actual, vector.expected.clone())
                    } else {
                        TestOutcome::mismatch(&vector.expression, actual, vector.expected.clone())
                    }
                }
                HarnessOutput::Raised(message) => TestOutcome::error(&vector.expression, message),
                HarnessOutput::Garbled(raw) => {
                    TestOutcome::unparseable(&vector.expression, format!("unreadable result {raw}"))
                }
                HarnessOutput::Missing => {
                    TestOutcome::unparseable(&vector.expression, last_line(&stderr))
                }
            },
        };
        Ok(outcome)
    }

    async fn execute(&self, dir: &Path, script: &Path) -> Result<RunOutcome, SandboxError> {
        let mut command = Command::new(&self.config.interpreter);
        command
            .arg("-I")
            .arg(script)
            .current_dir(dir)
            .env_clear()
            .env("PYTHONIOENCODING", "utf-8")
            .env("PYTHONDONTWRITEBYTECODE", "1")
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        if let Some(path) = env::var_os("PATH") {
            command.env("PATH", path);
        }

        let started = Instant::now();
        let mut child = command.spawn().map_err(|source| SandboxError::Spawn {
            interpreter: self.config.interpreter.display().to_string(),
            source,
        })?;

        let stdout = child.stdout.take().map(|out| tokio::spawn(drain_tail(out)));
        let stderr = child.stderr.take().map(|err| tokio::spawn(drain_tail(err)));

        match tokio::time::timeout(self.config.timeout, child.wait()).await {
            Ok(status) => {
                let status = status?;
                tracing::trace!(?status, elapsed = ?started.elapsed(), "sandbox process exited");
                Ok(RunOutcome::Finished {
                    stdout: collect(stdout).await,
                    stderr: collect(stderr).await,
                })
            }
            Err(_) => {
                if let Err(err) = child.kill().await {
                    tracing::warn!(error = %err, "failed to kill timed-out sandbox process");
                }
                for reader in [stdout, stderr].into_iter().flatten() {
                    reader.abort();
                }
                tracing::debug!(limit = ?self.config.timeout, "sandbox process timed out");
                Ok(RunOutcome::TimedOut)
            }
        }
    }
}

/// Read a stream to the end, keeping its tail. The last line survives whole up
/// to `MAX_LINE_BYTES`; earlier lines are dropped past `MAX_CAPTURED_OUTPUT`.
async fn drain_tail<R: AsyncRead + Unpin>(mut reader: R) -> std::io::Result<Vec<u8>> {
    let mut kept = Vec::new();
    let mut line_start = 0;
    let mut chunk = [0_u8; 8192];
    loop {
        let read = reader.read(&mut chunk).await?;
        if read == 0 {
            break;
        }
        if let Some(newline) = chunk[..read].iter().rposition(|byte| *byte == b'\n') {
            line_start = kept.len() + newline + 1;
        }
        kept.extend_from_slice(&chunk[..read]);

        let cut = tail_cut(kept.len(), line_start);
        if cut > 0 {
            kept.drain(..cut);
            line_start = line_start.saturating_sub(cut);
        }
    }
    Ok(kept)
}

/// Bytes to drop from the front of a buffer of `len` bytes whose last line
/// starts at `line_start`.
fn tail_cut(len: usize, line_start: usize) -> usize {
    if len - line_start > MAX_LINE_BYTES {
        len - MAX_LINE_BYTES
    } else if len > MAX_CAPTURED_OUTPUT {
        (len - MAX_CAPTURED_OUTPUT).min(line_start)
    } else {
        0
    }
}

async fn collect(reader: Option<tokio::task::JoinHandle<std::io::Result<Vec<u8>>>>) -> String {
    let Some(reader) = reader else {
        return String::new();
    };
    match reader.await {
        Ok(Ok(bytes)) => String::from_utf8_lossy(&bytes).into_owned(),
        Ok(Err(err)) => {
            tracing::warn!(error = %err, "failed to read sandbox output");
            String::new()
        }
        Err(err) => {
            tracing::warn!(error = %err, "sandbox output reader panicked");
            String::new()
        }
    }
}

fn last_line(text: &str) -> String {
    text.lines()
        .rev()
        .map(str::trim)
        .find(|line| !line.is_empty())
        .unwrap_or_default()
        .to_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn timeout_drives_cpu_cap() {
        let config = SandboxConfig::default().with_timeout(Duration::from_millis(4500));
        assert_eq!(config.cpu_limit_secs, Some(5));

        let uncapped = SandboxConfig {
            cpu_limit_secs: None,
            ..SandboxConfig::default()
        }
        .with_timeout(Duration::from_secs(5));
        assert_eq!(uncapped.cpu_limit_secs, None);
    }

    #[test]
    fn tail_cut_keeps_the_last_line_whole() {
        assert_eq!(tail_cut(1000, 900), 0);

        let len = MAX_CAPTURED_OUTPUT + 10;
        assert_eq!(tail_cut(len, len), 10);
        assert_eq!(tail_cut(len, 4), 4);

        let huge = MAX_LINE_BYTES + 100;
        assert_eq!(tail_cut(huge, 0), 100);
    }

    #[tokio::test]
    async fn drain_tail_keeps_long_final_line() {
        let mut input = "noise line\n".repeat(10_000).into_bytes();
        let last = format!("RESULT{}", "7,".repeat(50_000));
        input.extend_from_slice(last.as_bytes());

        let kept = drain_tail(input.as_slice()).await.unwrap();

        assert!(kept.ends_with(last.as_bytes()));
        assert!(kept.starts_with(b"RESULT"));
    }

    #[tokio::test]
    async fn drain_tail_caps_terminated_output() {
        let input = format!("{}\n", "x".repeat(99)).repeat(2_000).into_bytes();
        let kept = drain_tail(input.as_slice()).await.unwrap();
        assert_eq!(kept.len(), MAX_CAPTURED_OUTPUT);
        assert!(kept.ends_with(b"x\n"));
    }

    #[test]
    fn last_line_skips_trailing_blanks() {
        let stderr = "Traceback (most recent call last):\n  File \"x\"\nSyntaxError: invalid syntax\n\n";
        assert_eq!(last_line(stderr), "SyntaxError: invalid syntax");
        assert_eq!(last_line(""), "");
    }

    #[tokio::test]
    async fn missing_interpreter_is_an_infrastructure_error() {
        let sandbox = GradingSandbox::new(SandboxConfig {
            interpreter: PathBuf::from("/nonexistent/python-for-grading"),
            ..SandboxConfig::default()
        });
        let task: Task = serde_json::from_value(serde_json::json!({
            "id": "sum_array", "level": 1, "title": "Sum", "description": "", "template": "",
            "tests": [{ "expr": "sum_array([1])", "expected": 1 }]
        }))
        .unwrap();

        let err = sandbox.grade("", &task).await.unwrap_err();
        assert!(matches!(err, SandboxError::Spawn { .. }));
    }
}
