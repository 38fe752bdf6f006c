//! System prompts and one-off instructions sent to the advisor.

use interview_core::model::{
    CodingStats, GradingReport, InterviewMode, TaskLevel, TaskSummary, TheoryStats,
};

/// System prompt for the given mode and, when known, the candidate's level.
#[must_use]
pub fn system_prompt(mode: InterviewMode, level: Option<TaskLevel>) -> String {
    let mut prompt = match mode {
        InterviewMode::Tech => String::from(
            "You are a friendly but rigorous technical interviewer for a Python developer \
             position. Ask exactly one question at a time, wait for the answer, briefly \
             evaluate it and then move on. Never reveal full solutions to coding tasks.",
        ),
        InterviewMode::Hr => String::from(
            "You are an HR interviewer. Discuss the candidate's experience, motivation and \
             soft skills. Ask one question at a time and keep a warm, professional tone.",
        ),
    };
    if let Some(level) = level {
        prompt.push_str(&format!(
            "\nThe candidate is interviewing for the {} level; match the depth of your \
             questions to it.",
            level.name()
        ));
    }
    prompt
}

/// Instruction embedding the grading outcome.
///
/// `next_tasks` are catalog tasks the advisor may hand out next.
#[must_use]
pub fn feedback_instruction(report: &GradingReport, next_tasks: &[TaskSummary]) -> String {
    let mut text = String::from("Here are the results of running the candidate's code:\n\n");
    for line in report.lines() {
        text.push_str(&line);
        text.push('\n');
    }
    text.push_str(
        "\nIf every test passed, praise the candidate briefly and hand out the next task. \
         Put the task on its own at the end of your reply in exactly this form:\n\
         <next_task>{\"task_id\": \"<id>\", \"description\": \"<text>\", \"template\": \"<python code>\"}</next_task>\n\
         If some tests failed, give exactly ONE gentle hint (start with 'Maybe...') and do \
         not include a next task.\n",
    );
    if !next_tasks.is_empty() {
        text.push_str("\nPrefer one of these task ids for the next task:\n");
        for task in next_tasks {
            text.push_str(&format!("- {}: {}\n", task.id, task.title));
        }
    }
    text
}

/// Instruction for the closing assessment of the whole session.
#[must_use]
pub fn closing_report_instruction(theory: TheoryStats, coding: CodingStats) -> String {
    format!(
        "Write the final summary of this technical interview.\n\n\
         Session statistics: {} theory answers, {} code submissions ({} passed, {} failed).\n\n\
         Use strictly this format:\n\
         **Theory:** X%\n\
         **Practice:** Y%\n\
         **Strengths:**\n\
         - item 1\n\
         - item 2\n\
         **Growth areas:**\n\
         - item 1\n\
         - item 2\n\
         **Verdict:** <text>\n",
        theory.answers, coding.submissions, coding.passed, coding.failed
    )
}
