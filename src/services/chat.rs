//! Chat-completion client used for prompt enhancement.
//! Docs: https://platform.openai.com/docs/api-reference/chat/create

use serde::{Deserialize, Serialize};
use tracing::{debug, info};
use url::Url;

use super::{BoxFuture, PromptEnhancer, read_success_body};
use crate::constants::ENHANCEMENT_INSTRUCTION;
use crate::error::ChitrakarError;

const SERVICE_NAME: &str = "chat-completion";

/// Where and how to reach the chat-completion service.
#[derive(Clone, Debug)]
pub struct ChatSettings {
    /// Base URL, ending in a slash, e.g. `https://api.openai.com/v1/`
    pub base_url: Url,
    /// Bearer token; requests go out unauthenticated without one
    pub api_key: Option<String>,
    /// Model identifier
    pub model: String,
    /// Token cap for the completion
    pub max_tokens: u32,
}

#[derive(Serialize, Debug)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: [ChatMessage<'a>; 2],
    max_tokens: u32,
}

#[derive(Serialize, Debug)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Deserialize, Debug)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Deserialize, Debug)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Deserialize, Debug)]
struct ChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}

/// [`PromptEnhancer`] backed by an OpenAI-compatible `/chat/completions`
/// endpoint.
#[derive(Clone, Debug)]
pub struct OpenAiEnhancer {
    client: reqwest::Client,
    endpoint: Url,
    settings: ChatSettings,
}

impl OpenAiEnhancer {
    /// Builds the client, resolving the endpoint against the base URL.
    pub fn new(client: reqwest::Client, settings: ChatSettings) -> Result<Self, ChitrakarError> {
        let endpoint = settings.base_url.join("chat/completions")?;
        Ok(Self {
            client,
            endpoint,
            settings,
        })
    }

    /// Full URL requests are posted to.
    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }

    async fn complete(&self, text: &str) -> Result<String, ChitrakarError> {
        let body = ChatRequest {
            model: &self.settings.model,
            messages: [
                ChatMessage {
                    role: "system",
                    content: ENHANCEMENT_INSTRUCTION,
                },
                ChatMessage {
                    role: "user",
                    content: text,
                },
            ],
            max_tokens: self.settings.max_tokens,
        };

        info!("Enhancing prompt with model {}", self.settings.model);
        let mut request = self.client.post(self.endpoint.clone()).json(&body);
        if let Some(api_key) = &self.settings.api_key {
            request = request.bearer_auth(api_key);
        }
        let response = request.send().await?;
        let bytes = read_success_body(SERVICE_NAME, response).await?;

        let parsed: ChatResponse = serde_json::from_slice(&bytes)?;
        let content = parsed
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .ok_or_else(|| {
                ChitrakarError::MalformedResponse("completion has no choices".to_string())
            })?;
        debug!("Enhanced prompt: {content}");
        Ok(content)
    }
}

impl PromptEnhancer for OpenAiEnhancer {
    fn enhance<'a>(&'a self, text: &'a str) -> BoxFuture<'a, Result<String, ChitrakarError>> {
        Box::pin(self.complete(text))
    }
}
