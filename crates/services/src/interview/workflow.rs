use std::sync::Arc;

use interview_core::model::{
    InterviewMode, Session, SessionId, Task, TaskId, TaskLevel, TaskSummary,
};
use interview_core::Clock;
use serde::Serialize;
use storage::repository::{Storage, StorageError};

use super::config::InterviewConfig;
use super::machine::{ChatReply, StageMachine};
use crate::ai::{Advisor, Assessment, TaskOffer};
use crate::error::InterviewError;
use crate::sandbox::GradingSandbox;

/// Result of grading one submission and the feedback round that followed.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SubmissionReply {
    pub success: bool,
    /// Human-readable per-test lines.
    pub results: Vec<String>,
    pub llm_feedback: String,
    pub next_task: Option<TaskOffer>,
    pub is_final: bool,
    pub assessment: Option<Assessment>,
}

/// Entry points of the interview: chat turns, code submissions, resets and
/// catalog reads, all keyed by session id.
#[derive(Clone)]
pub struct InterviewService {
    storage: Storage,
    advisor: Arc<dyn Advisor>,
    sandbox: GradingSandbox,
    config: InterviewConfig,
    clock: Clock,
}

impl InterviewService {
    #[must_use]
    pub fn new(storage: Storage, advisor: Arc<dyn Advisor>, sandbox: GradingSandbox) -> Self {
        Self {
            storage,
            advisor,
            sandbox,
            config: InterviewConfig::default(),
            clock: Clock::default(),
        }
    }

    #[must_use]
    pub fn with_config(mut self, config: InterviewConfig) -> Self {
        self.config = config;
        self
    }

    #[must_use]
    pub fn with_clock(mut self, clock: Clock) -> Self {
        self.clock = clock;
        self
    }

    #[must_use]
    pub fn config(&self) -> &InterviewConfig {
        &self.config
    }

    fn machine(&self) -> StageMachine<'_> {
        StageMachine::new(
            self.advisor.as_ref(),
            self.storage.tasks.as_ref(),
            &self.config,
        )
    }

    /// Handle one chat message. `mode`, when given, replaces the session's mode
    /// before dispatch.
    ///
    /// # Errors
    ///
    /// Returns `InterviewError` when the advisor or storage fails; the stored
    /// session is left as it was.
    pub async fn chat(
        &self,
        id: SessionId,
        message: &str,
        mode: Option<InterviewMode>,
    ) -> Result<ChatReply, InterviewError> {
        let mut session = self.storage.sessions.load(id).await?;
        if let Some(mode) = mode {
            session.set_mode(mode);
        }
        tracing::debug!(session = %id, stage = %session.stage(), mode = session.mode().as_str(), "chat turn");

        let reply = self.machine().handle_chat(&mut session, message).await?;
        self.storage.sessions.save(id, &session).await?;
        Ok(reply)
    }

    /// Grade `code` against `task_id` and run the feedback round.
    ///
    /// # Errors
    ///
    /// Returns `InterviewError::UnknownTask` for an id missing from the catalog,
    /// without touching the session. Sandbox infrastructure, advisor and storage
    /// failures propagate as well.
    pub async fn submit_code(
        &self,
        id: SessionId,
        code: &str,
        task_id: &TaskId,
    ) -> Result<SubmissionReply, InterviewError> {
        let task = self.task(task_id).await?;
        let report = self.sandbox.grade(code, &task).await?;

        let mut session = self.storage.sessions.load(id).await?;
        let reply = self.machine().handle_feedback(&mut session, &report).await?;
        self.storage.sessions.save(id, &session).await?;

        Ok(SubmissionReply {
            success: report.success,
            results: report.lines(),
            llm_feedback: reply.answer,
            next_task: reply.next_task,
            is_final: reply.is_final,
            assessment: reply.assessment,
        })
    }

    /// Restore the default session state.
    ///
    /// # Errors
    ///
    /// Returns `InterviewError::Storage` if the session cannot be stored.
    pub async fn reset(&self, id: SessionId) -> Result<Session, InterviewError> {
        tracing::info!(session = %id, "session reset");
        Ok(self.storage.sessions.reset(id).await?)
    }

    /// Switch the session to the mode named `mode` (case-insensitive).
    ///
    /// # Errors
    ///
    /// Returns `InterviewError::Mode` for an unknown mode name, leaving the
    /// session untouched, and `InterviewError::Storage` if the session cannot be
    /// read or stored.
    pub async fn set_mode(&self, id: SessionId, mode: &str) -> Result<InterviewMode, InterviewError> {
        let mode: InterviewMode = mode.parse()?;
        let mut session = self.storage.sessions.load(id).await?;
        session.set_mode(mode);
        self.storage.sessions.save(id, &session).await?;
        tracing::debug!(session = %id, mode = mode.as_str(), "mode changed");
        Ok(mode)
    }

    /// Snapshot of the current session state.
    ///
    /// # Errors
    ///
    /// Returns `InterviewError::Storage` if the session cannot be read.
    pub async fn session(&self, id: SessionId) -> Result<Session, InterviewError> {
        Ok(self.storage.sessions.load(id).await?)
    }

    /// # Errors
    ///
    /// Returns `InterviewError::Storage` if the catalog cannot be read.
    pub async fn list_tasks(&self) -> Result<Vec<TaskSummary>, InterviewError> {
        Ok(self.storage.tasks.list().await?)
    }

    /// Random task, optionally restricted to one level.
    ///
    /// # Errors
    ///
    /// Returns `InterviewError::Storage` if the catalog cannot be read.
    pub async fn random_task(&self, level: Option<TaskLevel>) -> Result<Option<Task>, InterviewError> {
        let task = match level {
            Some(level) => self.storage.tasks.random_by_level(level).await?,
            None => self.storage.tasks.random().await?,
        };
        Ok(task)
    }

    /// # Errors
    ///
    /// Returns `InterviewError::UnknownTask` for an id missing from the catalog.
    pub async fn task(&self, id: &TaskId) -> Result<Task, InterviewError> {
        match self.storage.tasks.get(id).await {
            Ok(task) => Ok(task),
            Err(StorageError::NotFound) => Err(InterviewError::UnknownTask(id.clone())),
            Err(err) => Err(err.into()),
        }
    }

    /// Drop sessions idle for longer than `max_idle`.
    ///
    /// # Errors
    ///
    /// Returns `InterviewError::Storage` if the store cannot be accessed.
    pub async fn evict_idle(&self, max_idle: chrono::Duration) -> Result<usize, InterviewError> {
        let before = self.clock.now() - max_idle;
        Ok(self.storage.sessions.evict_idle(before).await?)
    }
}
