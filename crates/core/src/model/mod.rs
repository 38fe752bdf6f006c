mod ids;
mod report;
mod session;
mod task;
mod turn;

pub use ids::{SessionId, SessionIdError, TaskId};
pub use report::{GradingReport, TestOutcome, Verdict};
pub use session::{
    CodingStats, DEFAULT_MAX_HISTORY, InterviewMode, ModeParseError, Session, Stage, TheoryStats,
};
pub use task::{Task, TaskError, TaskLevel, TaskSummary, TestVector};
pub use turn::{Role, Turn};
