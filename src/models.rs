use async_openai::{
    Client,
    config::{Config, OpenAIConfig},
    types::chat::{
        ChatCompletionRequestSystemMessage, ChatCompletionRequestUserMessage,
        CreateChatCompletionRequestArgs, ResponseFormat, ResponseFormatJsonSchema,
    },
};
use async_trait::async_trait;
use serde_json::{Value, json};

use crate::{configs::LlmConfig, errors::AssistantError};

/// Everything the remote model sees for one call.
#[derive(Debug, Clone)]
pub struct ModelRequest {
    pub system_instruction: &'static str,
    /// JSON-encoded [`RequestEnvelope`](crate::prompts::RequestEnvelope).
    pub prompt: String,
    pub schema_name: &'static str,
    pub schema: Value,
}

/// A generative model that answers a prompt with text shaped by a JSON schema.
///
/// Implementations report transport problems as `Err`; they do not validate
/// the returned text.
#[async_trait]
pub trait ModelBackend: Send + Sync {
    async fn generate(&self, request: &ModelRequest) -> Result<String, AssistantError>;
}

pub struct OpenAiBackend<T: Config> {
    pub client: Client<T>,
    pub model: String,
}

impl OpenAiBackend<OpenAIConfig> {
    /// Fails fast when no API key can be found.
    pub fn from_config(config: &LlmConfig) -> Result<Self, AssistantError> {
        Self::from_config_with(config, |name| std::env::var(name).ok())
    }

    /// As [`from_config`](Self::from_config), reading environment variables
    /// through `lookup`.
    pub fn from_config_with<F>(config: &LlmConfig, lookup: F) -> Result<Self, AssistantError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let api_key = config.resolve_api_key_with(lookup)?;
        let client = Client::with_config(
            OpenAIConfig::new()
                .with_api_base(&config.api_base)
                .with_api_key(api_key),
        );

        Ok(Self {
            client,
            model: config.model.clone(),
        })
    }
}

#[async_trait]
impl<M> ModelBackend for OpenAiBackend<M>
where
    M: Config,
{
    async fn generate(&self, request: &ModelRequest) -> Result<String, AssistantError> {
        let schema = ResponseFormat::JsonSchema {
            json_schema: ResponseFormatJsonSchema {
                description: None,
                name: request.schema_name.into(),
                schema: Some(request.schema.clone()),
                strict: Some(true),
            },
        };

        let chat_request = CreateChatCompletionRequestArgs::default()
            .model(&self.model)
            .messages([
                ChatCompletionRequestSystemMessage::from(request.system_instruction).into(),
                ChatCompletionRequestUserMessage::from(request.prompt.as_str()).into(),
            ])
            .response_format(schema)
            .build()
            .map_err(|e| AssistantError::Transport(format!("failed to build API request: {e}")))?;

        let response = self
            .client
            .chat()
            .create(chat_request)
            .await
            .map_err(|e| AssistantError::Transport(e.to_string()))?;

        Ok(response
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .unwrap_or_default())
    }
}

/// Offline backend that answers every request with a schema-valid echo of
/// its input.
pub struct DryRunBackend;

#[async_trait]
impl ModelBackend for DryRunBackend {
    async fn generate(&self, request: &ModelRequest) -> Result<String, AssistantError> {
        let envelope: Value = serde_json::from_str(&request.prompt)
            .map_err(|e| AssistantError::Transport(format!("dry run got a non-JSON prompt: {e}")))?;
        let field = |name: &str| envelope[name].as_str().unwrap_or_default().to_string();

        let reply = match envelope["mode"].as_str() {
            Some("predict") => {
                let source = field("source_language");
                let input = field("user_input");
                let suggestions: Vec<Value> = ["formal", "casual", "contextual"]
                    .iter()
                    .map(|register| {
                        json!({
                            "native_script": format!("[DRY:{source}] {input}"),
                            "anglicised_script": format!("[DRY:{register}] {input}"),
                            "english_intent": format!("{input} ({register})"),
                        })
                    })
                    .collect();
                json!({ "suggestions": suggestions })
            }
            Some("translate") => {
                let target = field("target_language");
                let sentence = field("selected_sentence");
                json!({
                    "translation": {
                        "native_script": format!("[DRY:{target}] {sentence}"),
                        "anglicised_script": format!("[DRY:{target}] {sentence}"),
                        "meaning": sentence,
                        "learning_note": "Dry run: no model was called.",
                    }
                })
            }
            other => {
                return Err(AssistantError::Transport(format!(
                    "dry run cannot answer mode {other:?}"
                )));
            }
        };

        Ok(reply.to_string())
    }
}
