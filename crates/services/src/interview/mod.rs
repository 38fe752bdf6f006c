pub mod config;
pub mod machine;
pub mod workflow;

pub use config::InterviewConfig;
pub use machine::{ChatReply, StageMachine};
pub use workflow::{InterviewService, SubmissionReply};
