use std::env;
use std::time::Duration;

use async_trait::async_trait;
use interview_core::model::Turn;
use reqwest::Client;
use serde::{Deserialize, Serialize};

use super::{Advisor, AdvisorRequest};
use crate::error::AdvisorError;

const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";
const DEFAULT_MODEL: &str = "gpt-4o-mini";
const DEFAULT_TIMEOUT_SECS: u64 = 60;
const DEFAULT_RETRIES: u32 = 1;
const RETRY_BACKOFF: Duration = Duration::from_millis(500);

#[derive(Clone, Debug)]
pub struct AdvisorConfig {
    pub base_url: String,
    pub api_key: String,
    pub model: String,
    pub timeout: Duration,
    pub retries: u32,
}

impl AdvisorConfig {
    #[must_use]
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.into(),
            api_key: api_key.into(),
            model: DEFAULT_MODEL.into(),
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            retries: DEFAULT_RETRIES,
        }
    }

    /// Read `INTERVIEW_AI_*` variables; `None` when no API key is set.
    #[must_use]
    pub fn from_env() -> Option<Self> {
        let api_key = env::var("INTERVIEW_AI_API_KEY").ok()?;
        if api_key.trim().is_empty() {
            return None;
        }
        let mut config = Self::new(api_key);
        if let Ok(base_url) = env::var("INTERVIEW_AI_BASE_URL") {
            config.base_url = base_url;
        }
        if let Ok(model) = env::var("INTERVIEW_AI_MODEL") {
            config.model = model;
        }
        if let Some(secs) = env::var("INTERVIEW_AI_TIMEOUT_SECS")
            .ok()
            .and_then(|value| value.parse::<u64>().ok())
        {
            config.timeout = Duration::from_secs(secs.max(1));
        }
        if let Some(retries) = env::var("INTERVIEW_AI_RETRIES")
            .ok()
            .and_then(|value| value.parse::<u32>().ok())
        {
            config.retries = retries;
        }
        Some(config)
    }
}

/// Advisor backed by an OpenAI-compatible `/chat/completions` endpoint.
#[derive(Clone)]
pub struct OpenAiAdvisor {
    client: Client,
    config: Option<AdvisorConfig>,
}

impl OpenAiAdvisor {
    #[must_use]
    pub fn from_env() -> Self {
        Self::new(AdvisorConfig::from_env())
    }

    #[must_use]
    pub fn new(config: Option<AdvisorConfig>) -> Self {
        Self {
            client: Client::new(),
            config,
        }
    }

    #[must_use]
    pub fn enabled(&self) -> bool {
        self.config.is_some()
    }

    async fn send_once(
        &self,
        config: &AdvisorConfig,
        payload: &ChatRequest<'_>,
    ) -> Result<String, AdvisorError> {
        let url = format!(
            "{}/chat/completions",
            config.base_url.trim_end_matches('/')
        );

        let response = self
            .client
            .post(url)
            .bearer_auth(&config.api_key)
            .timeout(config.timeout)
            .json(payload)
            .send()
            .await
            .map_err(|err| {
                if err.is_timeout() {
                    AdvisorError::Timeout(config.timeout)
                } else {
                    AdvisorError::Http(err)
                }
            })?;

        if !response.status().is_success() {
            return Err(AdvisorError::HttpStatus(response.status()));
        }

        let body: ChatResponse = response.json().await?;
        let content = body
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .filter(|content| !content.trim().is_empty())
            .ok_or(AdvisorError::EmptyResponse)?;

        Ok(content.trim().to_string())
    }
}

#[async_trait]
impl Advisor for OpenAiAdvisor {
    async fn complete(&self, request: &AdvisorRequest) -> Result<String, AdvisorError> {
        let config = self.config.as_ref().ok_or(AdvisorError::Disabled)?;
        let payload = ChatRequest::build(&config.model, request);

        let mut attempt = 0;
        loop {
            match self.send_once(config, &payload).await {
                Ok(content) => {
                    tracing::debug!(
                        model = %config.model,
                        attempt,
                        chars = content.len(),
                        "advisor reply received"
                    );
                    return Ok(content);
                }
                Err(err) if err.is_retryable() && attempt < config.retries => {
                    attempt += 1;
                    tracing::warn!(error = %err, attempt, "advisor request failed, retrying");
                    tokio::time::sleep(RETRY_BACKOFF * attempt).await;
                }
                Err(err) => {
                    tracing::error!(error = %err, attempt, "advisor request failed");
                    return Err(err);
                }
            }
        }
    }
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    max_tokens: u32,
    temperature: f32,
}

impl<'a> ChatRequest<'a> {
    fn build(model: &'a str, request: &'a AdvisorRequest) -> Self {
        let mut messages = Vec::with_capacity(request.turns.len() + 1);
        messages.push(ChatMessage {
            role: "system",
            content: &request.system_prompt,
        });
        messages.extend(request.turns.iter().map(ChatMessage::from_turn));
        Self {
            model,
            messages,
            max_tokens: request.params.max_tokens,
            temperature: request.params.temperature,
        }
    }
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'static str,
    content: &'a str,
}

impl<'a> ChatMessage<'a> {
    fn from_turn(turn: &'a Turn) -> Self {
        Self {
            role: turn.role().as_str(),
            content: turn.content(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatMessageResponse,
}

#[derive(Debug, Deserialize)]
struct ChatMessageResponse {
    content: Option<String>,
}
