use std::time::Duration;

use interview_core::model::{Task, TaskId, TaskLevel, TestVector, Verdict};
use serde_json::json;
use services::{GradingSandbox, SandboxConfig};

fn python_available() -> bool {
    std::process::Command::new("python3")
        .arg("--version")
        .output()
        .is_ok_and(|out| out.status.success())
}

macro_rules! require_python {
    () => {
        if !python_available() {
            eprintln!("python3 not found, skipping");
            return;
        }
    };
}

fn task(id: &str, tests: Vec<TestVector>) -> Task {
    Task::new(
        TaskId::new(id).unwrap(),
        TaskLevel::default(),
        id,
        "",
        "",
        tests,
    )
    .unwrap()
}

fn sandbox(timeout: Duration) -> GradingSandbox {
    GradingSandbox::new(SandboxConfig::default().with_timeout(timeout))
}

#[tokio::test]
async fn correct_sum_array_passes() {
    require_python!();
    let task = task(
        "sum_array",
        vec![TestVector::new("sum_array([1, 2, 3])", json!(6))],
    );
    let source = "def sum_array(arr):\n    return sum(arr)\n";

    let report = sandbox(Duration::from_secs(3)).grade(source, &task).await.unwrap();

    assert!(report.success);
    assert_eq!(report.outcomes.len(), 1);
    assert_eq!(report.outcomes[0].verdict, Verdict::Pass);
    assert_eq!(report.lines(), vec!["✓ sum_array([1, 2, 3]) → 6".to_owned()]);
}

#[tokio::test]
async fn infinite_loop_times_out_and_batch_continues() {
    require_python!();
    let task = task(
        "spin",
        vec![
            TestVector::new("spin(True)", json!(1)),
            TestVector::new("spin(False)", json!(1)),
        ],
    );
    let source = "def spin(forever):\n    while forever:\n        pass\n    return 1\n";

    let report = sandbox(Duration::from_millis(700)).grade(source, &task).await.unwrap();

    assert!(!report.success);
    assert_eq!(report.outcomes[0].verdict, Verdict::Timeout);
    assert_eq!(report.outcomes[1].verdict, Verdict::Pass);
}

#[tokio::test]
async fn exceptions_mismatches_and_garbage_are_verdicts() {
    require_python!();
    let task = task(
        "divide",
        vec![
            TestVector::new("divide(6, 3)", json!(2)),
            TestVector::new("divide(1, 0)", json!(0)),
            TestVector::new("divide(7, 2)", json!(3)),
        ],
    );
    let source = "print('__GRADER_OK_forged__99')\ndef divide(a, b):\n    return a / b\n";

    let report = sandbox(Duration::from_secs(3)).grade(source, &task).await.unwrap();
    let verdicts: Vec<_> = report.outcomes.iter().map(|outcome| outcome.verdict).collect();

    assert_eq!(verdicts, vec![Verdict::Pass, Verdict::Error, Verdict::Mismatch]);
    assert!(report.outcomes[1].message.contains("ZeroDivisionError"));
    assert_eq!(report.outcomes[2].actual, Some(json!(3.5)));
}

#[tokio::test]
async fn syntax_error_is_unparseable() {
    require_python!();
    let task = task("broken", vec![TestVector::new("broken()", json!(null))]);

    let report = sandbox(Duration::from_secs(3))
        .grade("def broken(:\n    pass\n", &task)
        .await
        .unwrap();

    assert_eq!(report.outcomes[0].verdict, Verdict::Unparseable);
    assert!(report.outcomes[0].message.contains("SyntaxError"));
}

#[tokio::test]
async fn task_without_vectors_needs_manual_review() {
    let task = task("lru_cache", Vec::new());

    let report = sandbox(Duration::from_secs(3)).grade("", &task).await.unwrap();

    assert!(report.success);
    assert_eq!(report.outcomes.len(), 1);
    assert_eq!(report.outcomes[0].verdict, Verdict::ManualReview);
}

#[tokio::test]
async fn future_imports_in_submission_are_accepted() {
    require_python!();
    let task = task("ident", vec![TestVector::new("ident(1)", json!(1))]);
    let source = "from __future__ import annotations\n\ndef ident(x: int) -> int:\n    return x\n";

    let report = sandbox(Duration::from_secs(3)).grade(source, &task).await.unwrap();

    assert_eq!(report.outcomes[0].verdict, Verdict::Pass, "{}", report.outcomes[0].message);
}

#[tokio::test]
async fn large_results_survive_output_capture() {
    require_python!();
    let expected: Vec<u32> = (0..30_000).collect();
    let task = task("big", vec![TestVector::new("big()", json!(expected))]);
    let source = "print('warming up\\n' * 5000)\ndef big():\n    return list(range(30000))\n";

    let report = sandbox(Duration::from_secs(5)).grade(source, &task).await.unwrap();

    assert_eq!(report.outcomes[0].verdict, Verdict::Pass, "{}", report.outcomes[0].message);
}
