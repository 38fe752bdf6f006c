#![forbid(unsafe_code)]

pub mod ai;
pub mod error;
pub mod interview;
pub mod sandbox;

pub use interview_core::Clock;

pub use ai::{Advisor, AdvisorConfig, AdvisorRequest, Assessment, GenerationParams, OpenAiAdvisor, TaskOffer};
pub use error::{AdvisorError, InterviewError, SandboxError};
pub use interview::{ChatReply, InterviewConfig, InterviewService, StageMachine, SubmissionReply};
pub use sandbox::{GradingSandbox, SandboxConfig};
