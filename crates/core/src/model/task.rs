use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use thiserror::Error;

use crate::model::ids::TaskId;

//
// ─── ERRORS ────────────────────────────────────────────────────────────────────
//

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum TaskError {
    #[error("task id cannot be empty")]
    EmptyId,

    #[error("task level must be between 1 and 4, got {0}")]
    InvalidLevel(u8),

    #[error("task title cannot be empty")]
    EmptyTitle,
}

//
// ─── LEVEL ─────────────────────────────────────────────────────────────────────
//

/// Difficulty level shared by the interview and the task catalog.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub struct TaskLevel(u8);

impl TaskLevel {
    pub const MIN: u8 = 1;
    pub const MAX: u8 = 4;

    /// Level the interview jumps to when practice is entered directly.
    pub const MIDDLE: Self = Self(2);

    /// Parse the digits `"1"` through `"4"`, ignoring surrounding whitespace.
    #[must_use]
    pub fn from_digit(input: &str) -> Option<Self> {
        match input.trim() {
            "1" => Some(Self(1)),
            "2" => Some(Self(2)),
            "3" => Some(Self(3)),
            "4" => Some(Self(4)),
            _ => None,
        }
    }

    #[must_use]
    pub fn value(self) -> u8 {
        self.0
    }

    /// Human-readable grade name.
    #[must_use]
    pub fn name(self) -> &'static str {
        match self.0 {
            1 => "Junior",
            2 => "Middle",
            3 => "Senior",
            _ => "Expert",
        }
    }

    /// All levels in ascending order.
    pub fn all() -> impl Iterator<Item = Self> {
        (Self::MIN..=Self::MAX).map(Self)
    }
}

impl Default for TaskLevel {
    fn default() -> Self {
        Self(Self::MIN)
    }
}

impl TryFrom<u8> for TaskLevel {
    type Error = TaskError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        if (Self::MIN..=Self::MAX).contains(&value) {
            Ok(Self(value))
        } else {
            Err(TaskError::InvalidLevel(value))
        }
    }
}

impl From<TaskLevel> for u8 {
    fn from(level: TaskLevel) -> Self {
        level.0
    }
}

impl fmt::Display for TaskLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

//
// ─── TASK ──────────────────────────────────────────────────────────────────────
//

/// One `(expression, expected)` check run against a submission.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TestVector {
    #[serde(alias = "expr")]
    pub expression: String,
    pub expected: Value,
}

impl TestVector {
    #[must_use]
    pub fn new(expression: impl Into<String>, expected: Value) -> Self {
        Self {
            expression: expression.into(),
            expected,
        }
    }
}

/// A leveled live-coding exercise. Immutable once loaded into a catalog.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Task {
    id: TaskId,
    level: TaskLevel,
    title: String,
    description: String,
    template: String,
    #[serde(default)]
    tests: Vec<TestVector>,
}

impl Task {
    /// Build a task.
    ///
    /// # Errors
    ///
    /// Returns `TaskError::EmptyTitle` if the title is blank.
    pub fn new(
        id: TaskId,
        level: TaskLevel,
        title: impl Into<String>,
        description: impl Into<String>,
        template: impl Into<String>,
        tests: Vec<TestVector>,
    ) -> Result<Self, TaskError> {
        let title = title.into();
        if title.trim().is_empty() {
            return Err(TaskError::EmptyTitle);
        }
        Ok(Self {
            id,
            level,
            title,
            description: description.into(),
            template: template.into(),
            tests,
        })
    }

    #[must_use]
    pub fn id(&self) -> &TaskId {
        &self.id
    }

    #[must_use]
    pub fn level(&self) -> TaskLevel {
        self.level
    }

    #[must_use]
    pub fn title(&self) -> &str {
        &self.title
    }

    #[must_use]
    pub fn description(&self) -> &str {
        &self.description
    }

    #[must_use]
    pub fn template(&self) -> &str {
        &self.template
    }

    #[must_use]
    pub fn tests(&self) -> &[TestVector] {
        &self.tests
    }

    #[must_use]
    pub fn summary(&self) -> TaskSummary {
        TaskSummary {
            id: self.id.clone(),
            level: self.level,
            title: self.title.clone(),
            description: self.description.clone(),
        }
    }
}

/// List-view projection of a task.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TaskSummary {
    pub id: TaskId,
    pub level: TaskLevel,
    pub title: String,
    pub description: String,
}
