use std::time::Duration;

use schemars::{JsonSchema, schema_for};
use serde::de::DeserializeOwned;

use crate::{
    errors::AssistantError,
    languages::Language,
    models::{ModelBackend, ModelRequest},
    prompts::{RequestEnvelope, SYSTEM_INSTRUCTION},
    translations::{PredictionResponse, TranslationResponse, TranslationResult},
};

/// The only component that talks to the remote model.
///
/// `try_*` methods report every failure; `predict` and `translate` are the
/// best-effort variants used while the user is interacting, which log the
/// failure and fall back to an empty result.
pub struct AssistantClient<B> {
    backend: B,
    timeout: Duration,
}

impl<B: ModelBackend> AssistantClient<B> {
    pub fn new(backend: B, timeout: Duration) -> Self {
        Self { backend, timeout }
    }

    pub async fn try_predict(
        &self,
        input: &str,
        source_language: Language,
    ) -> Result<PredictionResponse, AssistantError> {
        let envelope = RequestEnvelope::Predict {
            source_language,
            user_input: input,
        };
        self.generate("suggestions", &envelope).await
    }

    pub async fn predict(&self, input: &str, source_language: Language) -> PredictionResponse {
        match self.try_predict(input, source_language).await {
            Ok(response) => response,
            Err(e) => {
                tracing::warn!(language = %source_language, error = %e, "prediction failed");
                PredictionResponse::default()
            }
        }
    }

    pub async fn try_translate(
        &self,
        sentence: &str,
        source_language: Language,
        target_language: Language,
    ) -> Result<TranslationResult, AssistantError> {
        let envelope = RequestEnvelope::Translate {
            source_language,
            target_language,
            selected_sentence: sentence,
        };
        let response: TranslationResponse = self.generate("translation", &envelope).await?;
        Ok(response.translation)
    }

    pub async fn translate(
        &self,
        sentence: &str,
        source_language: Language,
        target_language: Language,
    ) -> Option<TranslationResult> {
        match self
            .try_translate(sentence, source_language, target_language)
            .await
        {
            Ok(result) => Some(result),
            Err(e) => {
                tracing::warn!(
                    source = %source_language,
                    target = %target_language,
                    error = %e,
                    "translation failed"
                );
                None
            }
        }
    }

    async fn generate<T>(
        &self,
        schema_name: &'static str,
        envelope: &RequestEnvelope<'_>,
    ) -> Result<T, AssistantError>
    where
        T: DeserializeOwned + JsonSchema,
    {
        let request = ModelRequest {
            system_instruction: SYSTEM_INSTRUCTION,
            prompt: serde_json::to_string(envelope)?,
            schema_name,
            schema: schema_for!(T).to_value(),
        };

        tracing::debug!(mode = envelope.mode(), prompt = %request.prompt, "calling model");

        let content = tokio::time::timeout(self.timeout, self.backend.generate(&request))
            .await
            .map_err(|_| AssistantError::Timeout(self.timeout))??;

        parse_reply(schema_name, &content)
    }
}

/// Parses model output against the expected shape, tolerating a Markdown
/// code fence around the JSON.
fn parse_reply<T: DeserializeOwned>(schema: &'static str, content: &str) -> Result<T, AssistantError> {
    let body = strip_code_fence(content.trim());
    if body.is_empty() {
        return Err(AssistantError::EmptyResponse);
    }

    serde_json::from_str(body).map_err(|source| {
        tracing::debug!(
            preview = %body.chars().take(500).collect::<String>(),
            "unparseable model reply"
        );
        AssistantError::SchemaViolation { schema, source }
    })
}

fn strip_code_fence(body: &str) -> &str {
    let Some(rest) = body.strip_prefix("```") else {
        return body;
    };
    // Drop the info string ("json") on the opening line.
    let rest = rest.split_once('\n').map_or("", |(_, tail)| tail);
    rest.trim_end()
        .strip_suffix("```")
        .unwrap_or(rest)
        .trim()
}
