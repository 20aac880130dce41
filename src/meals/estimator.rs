use std::time::Duration;

use async_trait::async_trait;
use rand::Rng;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, error, instrument, warn};

use crate::{
    config::{EstimatorConfig, RetryPolicy},
    error::MealError,
};

/// Instruction sent ahead of every meal description.
pub const SYSTEM_PROMPT: &str = r#"You are a strict, expert nutritional analyst.
The user will give you a natural language description of a meal they ate.
You must estimate the absolute best guess for the nutritional macros of that meal.
You MUST reply ONLY with a valid JSON object matching this exact structure, with NO surrounding markdown or text:
{
  "calories": number,
  "protein": number,
  "fat": number,
  "fibre": number,
  "sugar": number
}"#;

/// Produces raw completion text for a meal description. Parsing the text is
/// the caller's job.
#[async_trait]
pub trait MacroEstimator: Send + Sync {
    async fn complete(&self, description: &str) -> Result<String, MealError>;
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: [ChatMessage<'a>; 2],
    temperature: f32,
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChatChoiceMessage {
    content: Option<String>,
}

/// OpenAI-compatible chat-completion client.
#[derive(Clone)]
pub struct ChatCompletionEstimator {
    client: Client,
    config: EstimatorConfig,
}

impl ChatCompletionEstimator {
    pub fn new(config: EstimatorConfig) -> Result<Self, MealError> {
        if config.api_key.trim().is_empty() {
            return Err(MealError::MissingCredential);
        }
        Ok(Self {
            client: Client::new(),
            config,
        })
    }

    fn endpoint(&self) -> String {
        format!("{}/chat/completions", self.config.base_url.trim_end_matches('/'))
    }

    async fn attempt(&self, description: &str) -> Result<String, MealError> {
        let body = ChatRequest {
            model: &self.config.model,
            messages: [
                ChatMessage {
                    role: "system",
                    content: SYSTEM_PROMPT,
                },
                ChatMessage {
                    role: "user",
                    content: description,
                },
            ],
            temperature: self.config.temperature,
        };

        let response = self
            .client
            .post(self.endpoint())
            .bearer_auth(&self.config.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| MealError::UpstreamUnavailable(format!("request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            error!(%status, body = %error_text, "estimator API error");
            return Err(MealError::UpstreamUnavailable(format!("status {status}")));
        }

        let parsed: ChatResponse = response
            .json()
            .await
            .map_err(|e| MealError::UpstreamUnavailable(format!("unreadable envelope: {e}")))?;

        parsed
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .map(|s| s.trim().to_string())
            .ok_or_else(|| MealError::UpstreamUnavailable("completion had no content".into()))
    }
}

#[async_trait]
impl MacroEstimator for ChatCompletionEstimator {
    #[instrument(skip(self, description), fields(model = %self.config.model))]
    async fn complete(&self, description: &str) -> Result<String, MealError> {
        let policy = self.config.retry;
        let mut attempt = 1;
        loop {
            match self.attempt(description).await {
                Ok(text) => {
                    debug!(attempt, chars = text.len(), "completion received");
                    return Ok(text);
                }
                Err(e) if e.is_transient() && attempt < policy.max_attempts => {
                    let wait = jittered(&policy, attempt);
                    warn!(attempt, error = ?e, wait_ms = wait.as_millis() as u64, "estimator attempt failed; retrying");
                    tokio::time::sleep(wait).await;
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }
}

/// Full jitter: uniform in `[0, ceiling]`.
fn jittered(policy: &RetryPolicy, attempt: u32) -> Duration {
    let ceiling = policy.backoff_ceiling(attempt).as_millis() as u64;
    if ceiling == 0 {
        return Duration::ZERO;
    }
    Duration::from_millis(rand::thread_rng().gen_range(0..=ceiling))
}
