use std::time::Duration;

/// Failures at the boundary with the remote model.
///
/// Only `Configuration` ever reaches a caller of the public client API;
/// everything else is folded into an empty result by
/// [`AssistantClient`](crate::assistants::AssistantClient).
#[derive(Debug, thiserror::Error)]
pub enum AssistantError {
    #[error("configuration error: {0}")]
    Configuration(String),

    #[error("model call failed: {0}")]
    Transport(String),

    #[error("model call timed out after {0:?}")]
    Timeout(Duration),

    #[error("model returned an empty response")]
    EmptyResponse,

    #[error("response does not match the {schema} schema: {source}")]
    SchemaViolation {
        schema: &'static str,
        #[source]
        source: serde_json::Error,
    },

    #[error("failed to encode request: {0}")]
    Encode(#[from] serde_json::Error),
}
