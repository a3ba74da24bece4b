use anyhow::Result;
use async_trait::async_trait;

use crate::settings::Settings;

/// System prompt sent ahead of every user message.
pub const SYSTEM_PROMPT: &str = "You are an AI assistant that helps people find information.";

/// A chat completion backend.
///
/// `complete` takes the settings as they are at the moment the send starts
/// and a single user message, and resolves to the assistant's reply text.
/// Implementations must be shareable across the send tasks the session
/// spawns, hence the `Send + Sync` bound.
#[async_trait]
pub trait CompletionProvider: Send + Sync {
    async fn complete(&self, settings: &Settings, user_text: &str) -> Result<String>;
}

/// Offline provider used by the `--mock` flag. Replies instantly with a
/// canned message so the UI can be exercised without an Azure deployment.
pub struct MockProvider {
    reply: String,
}

impl MockProvider {
    pub fn new() -> Self {
        Self {
            reply: "This is a mock reply. Run without --mock and configure an \
                    endpoint in settings (Ctrl+S) to talk to Azure OpenAI."
                .to_string(),
        }
    }

    pub fn with_reply(reply: &str) -> Self {
        Self {
            reply: reply.to_string(),
        }
    }
}

impl Default for MockProvider {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl CompletionProvider for MockProvider {
    async fn complete(&self, _settings: &Settings, _user_text: &str) -> Result<String> {
        Ok(self.reply.clone())
    }
}
