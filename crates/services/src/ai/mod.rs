pub mod assessment;
pub mod client;
pub mod offer;
pub mod prompts;

use async_trait::async_trait;
use interview_core::model::Turn;

use crate::error::AdvisorError;

pub use assessment::{Assessment, AssessmentBand};
pub use client::{AdvisorConfig, OpenAiAdvisor};
pub use offer::TaskOffer;

/// Size and randomness knobs for one generation call.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GenerationParams {
    pub max_tokens: u32,
    pub temperature: f32,
}

impl GenerationParams {
    pub const INTRO: Self = Self::new(500, 0.7);
    pub const THEORY: Self = Self::new(800, 0.6);
    pub const FEEDBACK: Self = Self::new(1200, 0.4);
    pub const CLOSING_REPORT: Self = Self::new(900, 0.4);
    pub const FREE_CHAT: Self = Self::new(900, 0.7);

    #[must_use]
    pub const fn new(max_tokens: u32, temperature: f32) -> Self {
        Self {
            max_tokens,
            temperature,
        }
    }
}

/// Everything the advisor needs to produce one reply.
#[derive(Debug, Clone, PartialEq)]
pub struct AdvisorRequest {
    pub system_prompt: String,
    pub turns: Vec<Turn>,
    pub params: GenerationParams,
}

impl AdvisorRequest {
    #[must_use]
    pub fn new(system_prompt: impl Into<String>, turns: Vec<Turn>, params: GenerationParams) -> Self {
        Self {
            system_prompt: system_prompt.into(),
            turns,
            params,
        }
    }

    /// Append an instruction that is sent once but never stored in the history.
    #[must_use]
    pub fn with_instruction(mut self, instruction: impl Into<String>) -> Self {
        self.turns.push(Turn::user(instruction));
        self
    }
}

/// External text-generation collaborator.
#[async_trait]
pub trait Advisor: Send + Sync {
    /// Generate a reply for the given request.
    ///
    /// # Errors
    ///
    /// Returns `AdvisorError` on transport, authorization or empty-response failures.
    async fn complete(&self, request: &AdvisorRequest) -> Result<String, AdvisorError>;
}
