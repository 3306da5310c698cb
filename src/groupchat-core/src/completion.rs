//! The completion backend boundary.
//!
//! The orchestrator only sees [`CompletionClient`]; the OpenAI-compatible
//! adapter lives here too so both binaries share it.

use std::sync::LazyLock;
use std::time::Duration;

use async_openai::Client;
use async_openai::config::OpenAIConfig;
use async_openai::types::chat::{
    ChatCompletionRequestMessage, ChatCompletionRequestSystemMessage,
    ChatCompletionRequestUserMessage, CreateChatCompletionRequest,
    CreateChatCompletionRequestArgs,
};
use async_trait::async_trait;
use regex::Regex;
use tracing::{debug, warn};

use crate::config::BackendConfig;
use crate::error::{BackendError, GroupChatError};

/// One completion call: a system instruction plus a single user block.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompletionRequest {
    pub model: String,
    /// System instruction; omitted from the call when empty.
    pub system: String,
    pub user: String,
    /// Output length hint passed to the backend.
    pub max_tokens: u32,
}

/// Something that turns (instruction, context) into generated text.
#[async_trait]
pub trait CompletionClient: Send + Sync {
    async fn complete(&self, request: &CompletionRequest) -> Result<String, BackendError>;
}

/// Client for any OpenAI-compatible chat completions endpoint.
///
/// Each call is made once; wrap it in [`RetryingClient`] for retries.
pub struct OpenAiCompletionClient {
    client: Client<OpenAIConfig>,
    strip_reasoning: bool,
}

impl OpenAiCompletionClient {
    /// Build a client from backend settings. Fails if the API key is unset.
    pub fn from_config(backend: &BackendConfig, strip_reasoning: bool) -> Result<Self, GroupChatError> {
        let api_key = backend.api_key().ok_or_else(|| {
            GroupChatError::ConfigError(format!("{} is not set", backend.api_key_env))
        })?;

        let http_client = reqwest::Client::builder()
            .timeout(Duration::from_secs(backend.timeout_secs))
            .connect_timeout(Duration::from_secs(backend.connect_timeout_secs))
            .build()
            .map_err(|e| {
                GroupChatError::ConfigError(format!("Failed to create HTTP client: {}", e))
            })?;

        let config = OpenAIConfig::new()
            .with_api_key(api_key)
            .with_api_base(&backend.api_base);

        Ok(Self {
            client: Client::with_config(config).with_http_client(http_client),
            strip_reasoning,
        })
    }

    /// The backend client the binaries use: the OpenAI adapter behind
    /// `backend.max_retries` retries.
    pub fn with_retries(
        backend: &BackendConfig,
        strip_reasoning: bool,
    ) -> Result<RetryingClient<Self>, GroupChatError> {
        let client = Self::from_config(backend, strip_reasoning)?;
        Ok(RetryingClient::new(client, backend.max_retries))
    }
}

#[async_trait]
impl CompletionClient for OpenAiCompletionClient {
    async fn complete(&self, request: &CompletionRequest) -> Result<String, BackendError> {
        let chat_request = build_chat_request(request)?;
        let response = self.client.chat().create(chat_request).await?;
        let content = response
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content);
        finish_reply(content, self.strip_reasoning)
    }
}

/// Translate a [`CompletionRequest`] into the chat completions body.
///
/// The output limit goes out as `max_tokens`, which OpenAI-compatible hosts
/// such as SiliconFlow honour; `max_completion_tokens` is OpenAI-only.
#[allow(deprecated)]
pub fn build_chat_request(
    request: &CompletionRequest,
) -> Result<CreateChatCompletionRequest, BackendError> {
    let mut messages = Vec::with_capacity(2);
    if !request.system.is_empty() {
        messages.push(ChatCompletionRequestMessage::System(
            ChatCompletionRequestSystemMessage {
                content: request.system.clone().into(),
                name: None,
            },
        ));
    }
    messages.push(ChatCompletionRequestMessage::User(
        ChatCompletionRequestUserMessage {
            content: request.user.clone().into(),
            name: None,
        },
    ));

    Ok(CreateChatCompletionRequestArgs::default()
        .model(&request.model)
        .max_tokens(request.max_tokens)
        .messages(messages)
        .build()?)
}

/// Clean up the text of a reply. Missing or blank content, including content
/// that was nothing but reasoning, is an error.
pub fn finish_reply(content: Option<String>, strip: bool) -> Result<String, BackendError> {
    let content = content.unwrap_or_default();
    let content = if strip {
        strip_reasoning(&content)
    } else {
        content.trim().to_string()
    };

    if content.is_empty() {
        return Err(BackendError::new("empty response"));
    }
    Ok(content)
}

/// Retries a failing [`CompletionClient`] with exponential backoff.
pub struct RetryingClient<C> {
    inner: C,
    max_retries: u32,
}

impl<C: CompletionClient> RetryingClient<C> {
    /// `max_retries` extra attempts after the first; zero calls `inner` once.
    pub fn new(inner: C, max_retries: u32) -> Self {
        Self { inner, max_retries }
    }
}

/// Wait before retry number `attempt` (1-based): 1s, 2s, 4s, capped at 64s.
pub fn backoff_delay(attempt: u32) -> Duration {
    Duration::from_secs(1 << attempt.saturating_sub(1).min(6))
}

#[async_trait]
impl<C: CompletionClient> CompletionClient for RetryingClient<C> {
    async fn complete(&self, request: &CompletionRequest) -> Result<String, BackendError> {
        let mut attempt = 0;
        loop {
            match self.inner.complete(request).await {
                Ok(text) => return Ok(text),
                Err(e) if attempt < self.max_retries => {
                    attempt += 1;
                    warn!(
                        model = %request.model,
                        attempt,
                        max_retries = self.max_retries,
                        error = %e,
                        "completion failed, retrying"
                    );
                    tokio::time::sleep(backoff_delay(attempt)).await;
                }
                Err(e) => {
                    debug!(model = %request.model, error = %e, "completion failed");
                    return Err(e);
                }
            }
        }
    }
}

static REASONING_BLOCK: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?is)<(think|thinking|reasoning|reflection|scratchpad)\b[^>]*>.*?</(?:think|thinking|reasoning|reflection|scratchpad)>")
        .expect("reasoning pattern is valid")
});

// Some reasoning models emit only the closing tag when the opening one is
// part of the chat template.
static DANGLING_THINK: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?is)^.*?</think>").expect("dangling pattern is valid"));

/// Remove reasoning blocks such as `<think>...</think>` and trim the result.
pub fn strip_reasoning(response: &str) -> String {
    let result = REASONING_BLOCK.replace_all(response, "");
    let result = DANGLING_THINK.replace(&result, "");
    result.trim().to_string()
}
