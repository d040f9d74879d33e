use std::fmt;

use serde::{Deserialize, Serialize};

// Plain comments only below: doc comments end up in the schema the model reads.

// One candidate completion of what the user is trying to say, written in the
// source language.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, schemars::JsonSchema)]
#[serde(deny_unknown_fields)]
pub struct Suggestion {
    pub native_script: String,
    pub anglicised_script: String,
    pub english_intent: String,
}

impl fmt::Display for Suggestion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} ({}) => {}",
            self.native_script, self.anglicised_script, self.english_intent
        )
    }
}

// A finished translation into the target language, with a short lesson.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, schemars::JsonSchema)]
#[serde(deny_unknown_fields)]
pub struct TranslationResult {
    pub native_script: String,
    pub anglicised_script: String,
    pub meaning: String,
    pub learning_note: String,
}

// Reply shape for `mode = "predict"`. Order is the model's ranking.
#[derive(
    Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, schemars::JsonSchema,
)]
#[serde(deny_unknown_fields)]
pub struct PredictionResponse {
    pub suggestions: Vec<Suggestion>,
}

// Reply shape for `mode = "translate"`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, schemars::JsonSchema)]
#[serde(deny_unknown_fields)]
pub struct TranslationResponse {
    pub translation: TranslationResult,
}
