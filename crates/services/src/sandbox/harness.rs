//! Evaluation harness wrapped around the candidate source.
//!
//! The harness caps resources, compiles the candidate source as its own
//! module body, evaluates one test expression and reports on stdout through a
//! nonce-tagged marker carrying a JSON payload. The marker is always the final,
//! unterminated line of stdout.

use serde_json::Value;
use uuid::Uuid;

/// Filename the candidate source is compiled under; shows up in tracebacks.
const SOURCE_NAME: &str = "<submission>";

/// Parsed harness output for one run.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum HarnessOutput {
    Value(Value),
    Raised(String),
    Garbled(String),
    Missing,
}

/// Resource caps applied inside the child before the candidate code runs.
#[derive(Debug, Clone, Copy, Default)]
pub(crate) struct ResourceCaps {
    pub memory_bytes: Option<u64>,
    pub cpu_secs: Option<u64>,
}

#[derive(Debug, Clone)]
pub(crate) struct Harness {
    ok_marker: String,
    err_marker: String,
}

impl Harness {
    pub(crate) fn new() -> Self {
        let nonce = Uuid::new_v4().simple().to_string();
        Self {
            ok_marker: format!("__GRADER_OK_{nonce}__"),
            err_marker: format!("__GRADER_ERR_{nonce}__"),
        }
    }

    /// Candidate source followed by the evaluation wrapper for `expression`.
    ///
    /// The source is embedded as a string and run through `exec(compile(...))`,
    /// so its `from __future__` imports stay first in their own module body.
    pub(crate) fn program(&self, source: &str, expression: &str, caps: ResourceCaps) -> String {
        // JSON string literals are valid Python string literals.
        let literal = serde_json::to_string(expression).unwrap_or_else(|_| "\"\"".to_owned());
        let source = serde_json::to_string(source).unwrap_or_else(|_| "\"\"".to_owned());
        let mut program = String::with_capacity(source.len() + 1024);

        program.push_str("import json as __grader_json\n");
        if caps.memory_bytes.is_some() || caps.cpu_secs.is_some() {
            program.push_str("try:\n    import resource as __grader_resource\n");
            if let Some(bytes) = caps.memory_bytes {
                program.push_str(&format!(
                    "    __grader_resource.setrlimit(__grader_resource.RLIMIT_AS, ({bytes}, {bytes}))\n"
                ));
            }
            if let Some(secs) = caps.cpu_secs {
                program.push_str(&format!(
                    "    __grader_resource.setrlimit(__grader_resource.RLIMIT_CPU, ({secs}, {secs}))\n"
                ));
            }
            program.push_str("except (ImportError, ValueError, OSError):\n    pass\n");
        }

        program.push_str(&format!(
            r#"
__grader_source = {source}
exec(compile(__grader_source, "{SOURCE_NAME}", "exec", dont_inherit=True))

try:
    __grader_result = eval({literal})
    try:
        __grader_payload = __grader_json.dumps(__grader_result)
    except (TypeError, ValueError):
        __grader_payload = __grader_json.dumps(repr(__grader_result))
    print("\n{ok}" + __grader_payload, end="", flush=True)
except BaseException as __grader_exc:
    __grader_message = type(__grader_exc).__name__ + ": " + str(__grader_exc)
    print("\n{err}" + __grader_json.dumps(__grader_message), end="", flush=True)
"#,
            ok = self.ok_marker,
            err = self.err_marker,
        ));
        program
    }

    /// Interpret captured stdout; the last marker line wins.
    pub(crate) fn parse(&self, stdout: &str) -> HarnessOutput {
        for line in stdout.lines().rev() {
            if let Some(payload) = line.strip_prefix(&self.ok_marker) {
                return match serde_json::from_str::<Value>(payload) {
                    Ok(value) => HarnessOutput::Value(value),
                    Err(_) => HarnessOutput::Garbled(payload.trim().to_owned()),
                };
            }
            if let Some(payload) = line.strip_prefix(&self.err_marker) {
                let message = serde_json::from_str::<String>(payload)
                    .unwrap_or_else(|_| payload.trim().to_owned());
                return HarnessOutput::Raised(message);
            }
        }
        HarnessOutput::Missing
    }
}

/// Structural JSON equality where `6` and `6.0` are the same number.
pub(crate) fn values_match(actual: &Value, expected: &Value) -> bool {
    match (actual, expected) {
        (Value::Number(a), Value::Number(b)) => {
            if a.is_f64() || b.is_f64() {
                a.as_f64() == b.as_f64()
            } else {
                a == b
            }
        }
        (Value::Array(a), Value::Array(b)) => {
            a.len() == b.len() && a.iter().zip(b).all(|(x, y)| values_match(x, y))
        }
        (Value::Object(a), Value::Object(b)) => {
            a.len() == b.len()
                && a
                    .iter()
                    .all(|(key, x)| b.get(key).is_some_and(|y| values_match(x, y)))
        }
        _ => actual == expected,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn program_embeds_source_and_expression_as_literals() {
        let harness = Harness::new();
        let program = harness.program(
            "from __future__ import annotations\ndef f(s):\n    return s",
            "f(\"a\\nb\")",
            ResourceCaps::default(),
        );

        assert!(program.contains(
            r#"__grader_source = "from __future__ import annotations\ndef f(s):\n    return s""#
        ));
        assert!(program.contains("exec(compile(__grader_source, \"<submission>\""));
        assert!(!program.lines().any(|line| line.starts_with("from __future__")));
        assert!(program.contains(r#"eval("f(\"a\\nb\")")"#));
        assert!(!program.contains("setrlimit"));
    }

    #[test]
    fn program_applies_caps_when_configured() {
        let harness = Harness::new();
        let caps = ResourceCaps {
            memory_bytes: Some(1024),
            cpu_secs: Some(2),
        };
        let program = harness.program("x = 1", "x", caps);
        assert!(program.contains("RLIMIT_AS, (1024, 1024)"));
        assert!(program.contains("RLIMIT_CPU, (2, 2)"));
    }

    #[test]
    fn parse_reads_last_marker() {
        let harness = Harness::new();
        let stdout = format!("noise\n{ok}[1, 2]", ok = harness.ok_marker);
        assert_eq!(harness.parse(&stdout), HarnessOutput::Value(json!([1, 2])));

        let stdout = format!("{err}\"ZeroDivisionError: division by zero\"\n", err = harness.err_marker);
        assert_eq!(
            harness.parse(&stdout),
            HarnessOutput::Raised("ZeroDivisionError: division by zero".into())
        );
    }

    #[test]
    fn forged_markers_from_another_run_are_ignored() {
        let real = Harness::new();
        let forged = Harness::new();
        let stdout = format!("{}42\n", forged.ok_marker);
        assert_eq!(real.parse(&stdout), HarnessOutput::Missing);
    }

    #[test]
    fn numbers_compare_numerically() {
        assert!(values_match(&json!(6), &json!(6.0)));
        assert!(values_match(&json!([[1, 6]]), &json!([[1.0, 6]])));
        assert!(!values_match(&json!(6), &json!("6")));
        assert!(!values_match(&json!([1, 2]), &json!([2, 1])));
        assert!(values_match(&json!({"a": 1}), &json!({"a": 1.0})));
    }
}
