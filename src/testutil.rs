//! Scripted model backend shared by unit tests.

use std::{
    collections::VecDeque,
    sync::{Arc, Mutex},
    time::Duration,
};

use async_trait::async_trait;
use serde_json::{Value, json};

use crate::{
    errors::AssistantError,
    models::{ModelBackend, ModelRequest},
    translations::{Suggestion, TranslationResult},
};

#[derive(Debug, Clone)]
pub(crate) struct Reply {
    body: Result<String, String>,
    delay: Duration,
}

impl Reply {
    pub fn text(body: &str) -> Self {
        Self {
            body: Ok(body.to_string()),
            delay: Duration::ZERO,
        }
    }

    pub fn failure(message: &str) -> Self {
        Self {
            body: Err(message.to_string()),
            delay: Duration::ZERO,
        }
    }

    pub fn predictions(suggestions: &[Suggestion]) -> Self {
        Self::text(&json!({ "suggestions": suggestions }).to_string())
    }

    pub fn translation(result: &TranslationResult) -> Self {
        Self::text(&json!({ "translation": result }).to_string())
    }

    /// Holds the reply back for `delay` of (tokio) time.
    pub fn after(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }
}

#[derive(Debug, Clone)]
pub(crate) struct RecordedCall {
    pub system_instruction: &'static str,
    pub envelope: Value,
    pub schema_name: &'static str,
    pub schema: Value,
}

#[derive(Default)]
struct Script {
    replies: VecDeque<Reply>,
    fallback: Option<Reply>,
    calls: Vec<RecordedCall>,
}

/// Answers calls from a queue of canned replies, in call order, and records
/// every request it receives.
#[derive(Clone, Default)]
pub(crate) struct ScriptedBackend {
    script: Arc<Mutex<Script>>,
}

impl ScriptedBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Answers every call with `reply`.
    pub fn repeating(reply: Reply) -> Self {
        let backend = Self::new();
        backend.script.lock().unwrap().fallback = Some(reply);
        backend
    }

    pub fn push(&self, reply: Reply) {
        self.script.lock().unwrap().replies.push_back(reply);
    }

    pub fn calls(&self) -> Vec<RecordedCall> {
        self.script.lock().unwrap().calls.clone()
    }

    /// `user_input` / `selected_sentence` of every call so far.
    pub fn inputs(&self) -> Vec<String> {
        self.calls()
            .iter()
            .map(|call| {
                let envelope = &call.envelope;
                envelope["user_input"]
                    .as_str()
                    .or_else(|| envelope["selected_sentence"].as_str())
                    .unwrap_or_default()
                    .to_string()
            })
            .collect()
    }
}

#[async_trait]
impl ModelBackend for ScriptedBackend {
    async fn generate(&self, request: &ModelRequest) -> Result<String, AssistantError> {
        let reply = {
            let mut script = self.script.lock().unwrap();
            script.calls.push(RecordedCall {
                system_instruction: request.system_instruction,
                envelope: serde_json::from_str(&request.prompt).unwrap(),
                schema_name: request.schema_name,
                schema: request.schema.clone(),
            });
            script
                .replies
                .pop_front()
                .or_else(|| script.fallback.clone())
        };

        let Some(reply) = reply else {
            return Err(AssistantError::Transport("no scripted reply left".into()));
        };
        if !reply.delay.is_zero() {
            tokio::time::sleep(reply.delay).await;
        }
        reply.body.map_err(AssistantError::Transport)
    }
}

pub(crate) fn suggestion(native: &str) -> Suggestion {
    Suggestion {
        native_script: native.to_string(),
        anglicised_script: format!("{native} (phonetic)"),
        english_intent: format!("{native} (meaning)"),
    }
}

pub(crate) fn translation(native: &str) -> TranslationResult {
    TranslationResult {
        native_script: native.to_string(),
        anglicised_script: format!("{native} (phonetic)"),
        meaning: format!("{native} (meaning)"),
        learning_note: format!("{native} (note)"),
    }
}
