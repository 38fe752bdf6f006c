//! Stage machine driving one interview session.
//!
//! Every transition works on a borrowed `Session`; callers persist the session
//! only when the transition returned `Ok`, so a failed advisor call never leaves a
//! half-applied state behind.

use interview_core::model::{GradingReport, InterviewMode, Role, Session, Stage, TaskLevel};
use serde::Serialize;
use storage::repository::{StorageError, TaskCatalog};

use super::config::{self, InterviewConfig};
use crate::ai::{prompts, Advisor, AdvisorRequest, Assessment, GenerationParams, TaskOffer};
use crate::error::InterviewError;

/// Outcome of one chat turn or feedback round.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChatReply {
    pub answer: String,
    pub next_task: Option<TaskOffer>,
    pub is_final: bool,
    pub assessment: Option<Assessment>,
}

impl ChatReply {
    fn text(answer: impl Into<String>) -> Self {
        Self {
            answer: answer.into(),
            next_task: None,
            is_final: false,
            assessment: None,
        }
    }

    fn with_task(answer: impl Into<String>, offer: TaskOffer) -> Self {
        Self {
            next_task: Some(offer),
            ..Self::text(answer)
        }
    }
}

pub struct StageMachine<'a> {
    advisor: &'a dyn Advisor,
    catalog: &'a dyn TaskCatalog,
    config: &'a InterviewConfig,
}

impl<'a> StageMachine<'a> {
    #[must_use]
    pub fn new(
        advisor: &'a dyn Advisor,
        catalog: &'a dyn TaskCatalog,
        config: &'a InterviewConfig,
    ) -> Self {
        Self {
            advisor,
            catalog,
            config,
        }
    }

    /// Dispatch one chat message.
    ///
    /// # Errors
    ///
    /// Returns `InterviewError::Advisor` when a required advisor call fails and
    /// `InterviewError::Storage` when the catalog cannot be read.
    pub async fn handle_chat(
        &self,
        session: &mut Session,
        message: &str,
    ) -> Result<ChatReply, InterviewError> {
        if self.config.is_secret_phrase(message) {
            session.reset();
            session.set_interview_level(TaskLevel::MIDDLE);
            session.set_stage(Stage::PracticeConfirm);
            session.append_turn(Role::Assistant, config::SECRET_CONFIRMATION);
            tracing::info!("secret phrase, jumping to practice");
            return Ok(ChatReply::text(config::SECRET_CONFIRMATION));
        }

        if !session.mode().is_staged() {
            return self.free_chat(session, message).await;
        }

        if session.is_history_empty() {
            session.reset();
        }

        let before = session.stage();
        let reply = match before {
            Stage::Intro => self.intro(session, message).await?,
            Stage::LevelSelect => Self::level_select(session, message),
            Stage::Theory => self.theory(session, message).await?,
            Stage::PracticeConfirm => self.practice_confirm(session, message).await?,
            Stage::Coding | Stage::Feedback => {
                session.append_turn(Role::User, message);
                session.append_turn(Role::Assistant, config::RUNNING_SUBMISSION);
                ChatReply::text(config::RUNNING_SUBMISSION)
            }
        };
        if session.stage() != before {
            tracing::info!(from = %before, to = %session.stage(), "stage transition");
        }
        Ok(reply)
    }

    /// Turn a grading report into feedback, a next task or the closing report.
    ///
    /// # Errors
    ///
    /// Returns `InterviewError::Advisor` when the feedback or closing report
    /// cannot be generated.
    pub async fn handle_feedback(
        &self,
        session: &mut Session,
        report: &GradingReport,
    ) -> Result<ChatReply, InterviewError> {
        session.set_stage(Stage::Feedback);
        session.record_submission(report.success);

        let level = session.coding_level();
        let candidates: Vec<_> = self
            .catalog
            .list()
            .await?
            .into_iter()
            .filter(|task| task.level == level && Some(&task.id) != session.current_task())
            .collect();

        let request = AdvisorRequest::new(
            prompts::system_prompt(InterviewMode::Tech, session.interview_level()),
            session.turns(),
            GenerationParams::FEEDBACK,
        )
        .with_instruction(prompts::feedback_instruction(report, &candidates));
        let answer = self.advisor.complete(&request).await?;
        session.append_turn(Role::Assistant, answer.as_str());

        if let Some(offer) = TaskOffer::extract(&answer) {
            let offer = self.resolve_offer(offer, level).await?;
            session.begin_task(offer.task_id.clone());
            session.set_stage(Stage::Coding);
            tracing::info!(task = %offer.task_id, "next task assigned");
            return Ok(ChatReply::with_task(answer, offer));
        }

        let hints = session.record_hint();
        session.set_stage(Stage::Coding);
        tracing::debug!(hints, success = report.success, "feedback without next task");

        if hints >= self.config.hint_limit && !report.success {
            return self.close(session).await;
        }
        Ok(ChatReply::text(answer))
    }

    async fn intro(&self, session: &mut Session, message: &str) -> Result<ChatReply, InterviewError> {
        session.append_turn(Role::User, message);
        if self.config.is_greeting(message) {
            let menu = config::level_menu();
            session.append_turn(Role::Assistant, menu.as_str());
            session.set_stage(Stage::LevelSelect);
            return Ok(ChatReply::text(menu));
        }

        let answer = self.ask(session, GenerationParams::INTRO).await?;
        session.append_turn(Role::Assistant, answer.as_str());
        Ok(ChatReply::text(answer))
    }

    fn level_select(session: &mut Session, message: &str) -> ChatReply {
        session.append_turn(Role::User, message);
        let Some(level) = TaskLevel::from_digit(message) else {
            session.append_turn(Role::Assistant, config::LEVEL_PROMPT);
            return ChatReply::text(config::LEVEL_PROMPT);
        };

        session.select_level(level);
        session.set_stage(Stage::Theory);
        session.set_theory_questions_asked(1);
        let answer = config::level_confirmation(level);
        session.append_turn(Role::Assistant, answer.as_str());
        ChatReply::text(answer)
    }

    async fn theory(&self, session: &mut Session, message: &str) -> Result<ChatReply, InterviewError> {
        session.append_turn(Role::User, message);
        let target = self.config.theory_question_target;

        if self.config.is_ready(message) {
            let answer = if session.theory_questions_asked() >= target {
                session.set_stage(Stage::PracticeConfirm);
                config::PRACTICE_HANDOFF.to_owned()
            } else {
                session.record_early_readiness();
                config::theory_reminder(session.theory_questions_asked(), target)
            };
            session.append_turn(Role::Assistant, answer.as_str());
            return Ok(ChatReply::text(answer));
        }

        let mut answer = self.ask(session, GenerationParams::THEORY).await?;
        session.append_turn(Role::Assistant, answer.as_str());
        if session.record_theory_question() >= target {
            answer.push_str(config::THEORY_WRAP_UP);
        }
        Ok(ChatReply::text(answer))
    }

    async fn practice_confirm(
        &self,
        session: &mut Session,
        message: &str,
    ) -> Result<ChatReply, InterviewError> {
        session.append_turn(Role::User, message);
        if !self.config.is_affirmative(message) {
            session.append_turn(Role::Assistant, config::PRACTICE_REPROMPT);
            return Ok(ChatReply::text(config::PRACTICE_REPROMPT));
        }

        let level = session.coding_level();
        let Some(task) = self.catalog.random_by_level(level).await? else {
            tracing::warn!(%level, "no task available at coding level");
            let answer = config::no_task_at_level(level);
            session.append_turn(Role::Assistant, answer.as_str());
            return Ok(ChatReply::text(answer));
        };

        session.begin_task(task.id().clone());
        session.set_stage(Stage::Coding);
        let answer = config::task_announcement(level, task.description(), task.template());
        session.append_turn(Role::Assistant, answer.as_str());
        Ok(ChatReply::with_task(answer, TaskOffer::from_task(&task)))
    }

    async fn free_chat(&self, session: &mut Session, message: &str) -> Result<ChatReply, InterviewError> {
        session.append_turn(Role::User, message);
        let answer = self.ask(session, GenerationParams::FREE_CHAT).await?;
        session.append_turn(Role::Assistant, answer.as_str());
        Ok(ChatReply::text(answer))
    }

    async fn close(&self, session: &mut Session) -> Result<ChatReply, InterviewError> {
        let request = AdvisorRequest::new(
            prompts::closing_report_instruction(session.theory_stats(), session.coding_stats()),
            session.turns(),
            GenerationParams::CLOSING_REPORT,
        );
        let report = self.advisor.complete(&request).await?;
        let assessment = Assessment::parse(&report);
        if let Some(assessment) = assessment {
            tracing::info!(
                score = assessment.overall(),
                band = assessment.band().label(),
                "interview finished"
            );
        } else {
            tracing::info!("interview finished without parsable scores");
        }
        session.append_turn(Role::Assistant, report.as_str());
        session.reset();

        Ok(ChatReply {
            answer: report,
            next_task: None,
            is_final: true,
            assessment,
        })
    }

    async fn ask(&self, session: &Session, params: GenerationParams) -> Result<String, InterviewError> {
        let request = AdvisorRequest::new(
            prompts::system_prompt(session.mode(), session.interview_level()),
            session.turns(),
            params,
        );
        Ok(self.advisor.complete(&request).await?)
    }

    /// Fill the offer from the catalog; an id the catalog does not know is
    /// replaced by a random task at `level` so it can be graded later.
    async fn resolve_offer(
        &self,
        mut offer: TaskOffer,
        level: TaskLevel,
    ) -> Result<TaskOffer, InterviewError> {
        match self.catalog.get(&offer.task_id).await {
            Ok(task) => {
                offer.complete_from(&task);
                Ok(offer)
            }
            Err(StorageError::NotFound) => {
                tracing::warn!(task = %offer.task_id, "advisor offered a task outside the catalog");
                Ok(self
                    .catalog
                    .random_by_level(level)
                    .await?
                    .map_or(offer, |task| TaskOffer::from_task(&task)))
            }
            Err(err) => Err(err.into()),
        }
    }
}
