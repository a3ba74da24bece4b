use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::provider::{CompletionProvider, SYSTEM_PROMPT};
use crate::settings::Settings;

#[derive(Debug, Serialize)]
struct ChatRequest {
    messages: Vec<RequestMessage>,
}

#[derive(Debug, Serialize)]
struct RequestMessage {
    role: String,
    content: String,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: AssistantMessage,
}

#[derive(Debug, Deserialize)]
struct AssistantMessage {
    content: Option<String>,
}

/// Client for the Azure OpenAI chat completions REST API.
///
/// Endpoint, key, deployment and API version all come from [`Settings`] at
/// call time, so edits made in the settings modal take effect on the next
/// send without rebuilding the client.
#[derive(Debug, Clone)]
pub struct AzureClient {
    client: reqwest::Client,
}

impl AzureClient {
    pub fn new() -> Self {
        Self {
            client: reqwest::Client::new(),
        }
    }

    fn completions_url(settings: &Settings) -> String {
        format!(
            "{}/openai/deployments/{}/chat/completions?api-version={}",
            settings.api_url.trim_end_matches('/'),
            settings.deployment,
            settings.api_version
        )
    }

    fn build_request(user_text: &str) -> ChatRequest {
        ChatRequest {
            messages: vec![
                RequestMessage {
                    role: "system".to_string(),
                    content: SYSTEM_PROMPT.to_string(),
                },
                RequestMessage {
                    role: "user".to_string(),
                    content: user_text.to_string(),
                },
            ],
        }
    }

    fn extract_reply(response: ChatResponse) -> Result<String> {
        let choice = response
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| anyhow!("response contained no choices"))?;
        choice
            .message
            .content
            .ok_or_else(|| anyhow!("response choice had no message content"))
    }
}

impl Default for AzureClient {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl CompletionProvider for AzureClient {
    async fn complete(&self, settings: &Settings, user_text: &str) -> Result<String> {
        let url = Self::completions_url(settings);
        let request = Self::build_request(user_text);

        let response = self
            .client
            .post(&url)
            .header("api-key", &settings.api_key)
            .header("Content-Type", "application/json")
            .json(&request)
            .send()
            .await
            .context("failed to reach Azure OpenAI endpoint")?;

        let status = response.status();
        let body = response
            .text()
            .await
            .context("failed to read Azure OpenAI response body")?;

        if !status.is_success() {
            return Err(anyhow!("Azure OpenAI error {}: {}", status, body));
        }

        let parsed: ChatResponse =
            serde_json::from_str(&body).context("failed to parse Azure OpenAI response")?;
        Self::extract_reply(parsed)
    }
}
