use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

use crate::model::{Role, TaskId, TaskLevel, Turn};

/// Default sliding-window size for the conversation history.
pub const DEFAULT_MAX_HISTORY: usize = 12;

//
// ─── MODE ──────────────────────────────────────────────────────────────────────
//

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("unknown interview mode: {0}")]
pub struct ModeParseError(pub String);

/// Interview mode. Only `Tech` runs the stage machine; other modes are free chat.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum InterviewMode {
    #[default]
    Tech,
    Hr,
}

impl InterviewMode {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            InterviewMode::Tech => "TECH",
            InterviewMode::Hr => "HR",
        }
    }

    #[must_use]
    pub fn is_staged(self) -> bool {
        matches!(self, InterviewMode::Tech)
    }
}

impl FromStr for InterviewMode {
    type Err = ModeParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "" | "TECH" => Ok(InterviewMode::Tech),
            "HR" => Ok(InterviewMode::Hr),
            _ => Err(ModeParseError(s.to_owned())),
        }
    }
}

impl fmt::Display for InterviewMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

//
// ─── STAGE ─────────────────────────────────────────────────────────────────────
//

/// Interview phase that governs how the next input is dispatched.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    #[default]
    Intro,
    LevelSelect,
    Theory,
    PracticeConfirm,
    Coding,
    Feedback,
}

impl Stage {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Stage::Intro => "intro",
            Stage::LevelSelect => "level_select",
            Stage::Theory => "theory",
            Stage::PracticeConfirm => "practice_confirm",
            Stage::Coding => "coding",
            Stage::Feedback => "feedback",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

//
// ─── COUNTERS ──────────────────────────────────────────────────────────────────
//

/// Aggregate outcomes of the theory part.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct TheoryStats {
    pub answers: u32,
    pub early_readiness: u32,
}

/// Aggregate outcomes of graded submissions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct CodingStats {
    pub submissions: u32,
    pub passed: u32,
    pub failed: u32,
}

//
// ─── SESSION ───────────────────────────────────────────────────────────────────
//

/// Mutable record of one candidate's interview progress.
///
/// The history is a sliding window of at most `max_history` turns; the oldest
/// turn is evicted first.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    max_history: usize,
    mode: InterviewMode,
    stage: Stage,
    interview_level: Option<TaskLevel>,
    coding_level: TaskLevel,
    current_task: Option<TaskId>,
    hint_count: u32,
    theory_questions_asked: u32,
    theory: TheoryStats,
    coding: CodingStats,
    history: VecDeque<Turn>,
}

impl Default for Session {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_HISTORY)
    }
}

impl Session {
    /// Create a session with the given history window (at least one turn).
    #[must_use]
    pub fn new(max_history: usize) -> Self {
        let max_history = max_history.max(1);
        Self {
            max_history,
            mode: InterviewMode::default(),
            stage: Stage::default(),
            interview_level: None,
            coding_level: TaskLevel::default(),
            current_task: None,
            hint_count: 0,
            theory_questions_asked: 0,
            theory: TheoryStats::default(),
            coding: CodingStats::default(),
            history: VecDeque::with_capacity(max_history),
        }
    }

    /// Restore every field to its default, keeping the history window size.
    pub fn reset(&mut self) {
        *self = Self::new(self.max_history);
    }

    /// Append a turn, evicting from the front to stay within `max_history`.
    pub fn append_turn(&mut self, role: Role, content: impl Into<String>) {
        self.history.push_back(Turn::new(role, content));
        while self.history.len() > self.max_history {
            self.history.pop_front();
        }
    }

    pub fn set_mode(&mut self, mode: InterviewMode) {
        self.mode = mode;
    }

    pub fn set_stage(&mut self, stage: Stage) {
        self.stage = stage;
    }

    /// Pin both the interview and coding level.
    pub fn select_level(&mut self, level: TaskLevel) {
        self.interview_level = Some(level);
        self.coding_level = level;
    }

    pub fn set_interview_level(&mut self, level: TaskLevel) {
        self.interview_level = Some(level);
    }

    /// Assign a new coding task; the hint counter always starts over.
    pub fn begin_task(&mut self, task_id: TaskId) {
        self.current_task = Some(task_id);
        self.hint_count = 0;
    }

    /// Returns the hint count after increment.
    pub fn record_hint(&mut self) -> u32 {
        self.hint_count = self.hint_count.saturating_add(1);
        self.hint_count
    }

    pub fn set_theory_questions_asked(&mut self, asked: u32) {
        self.theory_questions_asked = asked;
    }

    /// Count one more theory question; returns the new total.
    pub fn record_theory_question(&mut self) -> u32 {
        self.theory_questions_asked = self.theory_questions_asked.saturating_add(1);
        self.theory.answers = self.theory.answers.saturating_add(1);
        self.theory_questions_asked
    }

    pub fn record_early_readiness(&mut self) {
        self.theory.early_readiness = self.theory.early_readiness.saturating_add(1);
    }

    pub fn record_submission(&mut self, success: bool) {
        self.coding.submissions = self.coding.submissions.saturating_add(1);
        if success {
            self.coding.passed = self.coding.passed.saturating_add(1);
        } else {
            self.coding.failed = self.coding.failed.saturating_add(1);
        }
    }

    #[must_use]
    pub fn max_history(&self) -> usize {
        self.max_history
    }

    #[must_use]
    pub fn mode(&self) -> InterviewMode {
        self.mode
    }

    #[must_use]
    pub fn stage(&self) -> Stage {
        self.stage
    }

    #[must_use]
    pub fn interview_level(&self) -> Option<TaskLevel> {
        self.interview_level
    }

    #[must_use]
    pub fn coding_level(&self) -> TaskLevel {
        self.coding_level
    }

    #[must_use]
    pub fn current_task(&self) -> Option<&TaskId> {
        self.current_task.as_ref()
    }

    #[must_use]
    pub fn hint_count(&self) -> u32 {
        self.hint_count
    }

    #[must_use]
    pub fn theory_questions_asked(&self) -> u32 {
        self.theory_questions_asked
    }

    #[must_use]
    pub fn theory_stats(&self) -> TheoryStats {
        self.theory
    }

    #[must_use]
    pub fn coding_stats(&self) -> CodingStats {
        self.coding
    }

    /// Chronological conversation window.
    pub fn history(&self) -> impl ExactSizeIterator<Item = &Turn> + '_ {
        self.history.iter()
    }

    #[must_use]
    pub fn history_len(&self) -> usize {
        self.history.len()
    }

    #[must_use]
    pub fn is_history_empty(&self) -> bool {
        self.history.is_empty()
    }

    /// Snapshot of the history as an owned list.
    #[must_use]
    pub fn turns(&self) -> Vec<Turn> {
        self.history.iter().cloned().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn history_is_bounded_and_evicts_oldest_first() {
        let mut session = Session::new(3);
        for i in 0..10 {
            session.append_turn(Role::User, format!("m{i}"));
            assert!(session.history_len() <= 3);
        }

        let contents: Vec<_> = session.history().map(Turn::content).collect();
        assert_eq!(contents, vec!["m7", "m8", "m9"]);
    }

    #[test]
    fn reset_is_idempotent() {
        let mut session = Session::new(5);
        session.set_mode(InterviewMode::Hr);
        session.set_stage(Stage::Coding);
        session.select_level(TaskLevel::try_from(3).unwrap());
        session.begin_task(TaskId::new("two_sum").unwrap());
        session.record_hint();
        session.record_submission(false);
        session.append_turn(Role::Assistant, "hello");

        session.reset();
        let once = session.clone();
        session.reset();

        assert_eq!(once, session);
        assert_eq!(session, Session::new(5));
        assert_eq!(session.stage(), Stage::Intro);
        assert_eq!(session.mode(), InterviewMode::Tech);
        assert!(session.is_history_empty());
    }

    #[test]
    fn begin_task_resets_hints() {
        let mut session = Session::default();
        session.record_hint();
        session.record_hint();
        assert_eq!(session.hint_count(), 2);

        session.begin_task(TaskId::new("lcp").unwrap());
        assert_eq!(session.hint_count(), 0);
        assert_eq!(session.current_task().map(TaskId::as_str), Some("lcp"));
    }

    #[test]
    fn mode_parses_case_insensitively() {
        assert_eq!("tech".parse::<InterviewMode>(), Ok(InterviewMode::Tech));
        assert_eq!(" Hr ".parse::<InterviewMode>(), Ok(InterviewMode::Hr));
        assert!("sales".parse::<InterviewMode>().is_err());
    }

    #[test]
    fn submissions_update_coding_stats() {
        let mut session = Session::default();
        session.record_submission(true);
        session.record_submission(false);
        session.record_submission(false);

        let stats = session.coding_stats();
        assert_eq!(stats.submissions, 3);
        assert_eq!(stats.passed, 1);
        assert_eq!(stats.failed, 2);
    }
}
